//! `number:` entities, `template` platform

use espgen_core::{Margin, PlacementRequest, Placed};
use serde::Deserialize;

use super::automation::{emit_automation, Action};
use super::{emit_placement, report_extra, setup_entity, shared_references, validate_entity, Component};
use crate::codegen::{CodeGen, Expr};
use crate::config::{EntityConfig, Extra, ForcedPlacement};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{Lambda, TimePeriod};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

pub(crate) fn default_update_interval() -> TimePeriod {
    TimePeriod::from_secs(60)
}

/// `number: - platform: template`
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateNumberConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    pub min_value: f64,
    pub max_value: f64,
    pub step: f64,

    /// Returns the current value, `{}` for "unchanged"
    #[serde(default)]
    pub lambda: Option<Lambda>,

    #[serde(default)]
    pub optimistic: bool,

    #[serde(default)]
    pub set_action: Vec<Action>,

    /// Falls back to `min_value` when there is no lambda
    #[serde(default)]
    pub initial_value: Option<f64>,

    #[serde(default)]
    pub restore_value: Option<bool>,

    #[serde(default = "default_update_interval")]
    pub update_interval: TimePeriod,

    #[serde(default)]
    pub unit_of_measurement: Option<String>,

    #[serde(flatten)]
    pub placement: ForcedPlacement,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Placed for TemplateNumberConfig {
    const MARGIN: Margin = Margin::SINGLE_VALUE;

    fn placement(&self) -> PlacementRequest {
        self.placement.request()
    }
}

/// `number:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum NumberConfig {
    Template(TemplateNumberConfig),
}

impl NumberConfig {
    /// Shared entity options
    pub fn entity(&self) -> &EntityConfig {
        let Self::Template(config) = self;
        &config.entity
    }

    /// As a module
    pub fn as_component(&self) -> &dyn Component {
        let Self::Template(config) = self;
        config
    }

    /// As a mutable module
    pub fn as_component_mut(&mut self) -> &mut dyn Component {
        let Self::Template(config) = self;
        config
    }
}

impl Component for TemplateNumberConfig {
    fn domain(&self) -> &'static str {
        "number"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        let mut fields = vec![IdField::Declare {
            id: &mut self.entity.id,
            kind: IdKind::Number,
            prefix: "template__templatenumber",
            path: path.clone(),
        }];
        fields.extend(shared_references(&self.entity.web_server, Some(&self.placement), path));
        fields
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        validate_entity(ctx, path, &self.entity);
        let values = [
            ("min_value", Some(self.min_value)),
            ("max_value", Some(self.max_value)),
            ("step", Some(self.step)),
            ("initial_value", self.initial_value),
        ];
        for (key, value) in values {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                ctx.error(IssueType::InvalidValue, path.key(key), format!("{key} must be a finite number, got {value}"));
            }
        }
        if self.step.is_finite() && !(self.step > 0.0) {
            ctx.error(IssueType::OutOfRange, path.key("step"), format!("step must be positive, got {}", self.step));
        }
        if self.max_value <= self.min_value {
            ctx.error(IssueType::Conflict, path.key("max_value"), "max_value must be greater than min_value");
        }

        if self.lambda.is_some() {
            if self.optimistic {
                ctx.error(IssueType::Conflict, path.key("optimistic"), "optimistic cannot be used with lambda");
            }
            if self.initial_value.is_some() {
                ctx.error(IssueType::Conflict, path.key("initial_value"), "initial_value cannot be used with lambda");
            }
            if self.restore_value.is_some() {
                ctx.error(IssueType::Conflict, path.key("restore_value"), "restore_value cannot be used with lambda");
            }
        } else if self.initial_value.is_none() {
            self.initial_value = Some(self.min_value);
        }

        if !self.optimistic && self.set_action.is_empty() {
            ctx.error(
                IssueType::MissingField,
                path.clone(),
                "Either optimistic mode must be enabled, or set_action must be set, to handle the number being set.",
            );
        }
        report_extra(ctx, path, &self.extra, "number.template", &[]);
    }

    fn forced_placement(&self) -> Option<(PlacementRequest, Margin)> {
        Some((Placed::placement(self), Self::MARGIN))
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.entity.id, path)?;
        let var = cg.new_pvariable(id, "template_::TemplateNumber", vec![]);
        cg.register_component(&var);
        cg.call(&var, "set_update_interval", vec![self.update_interval.as_millis().into()]);
        setup_entity(cg, &var, &self.entity);
        cg.register_entity("number", &var);
        cg.call(&var, "traits.set_min_value", vec![self.min_value.into()]);
        cg.call(&var, "traits.set_max_value", vec![self.max_value.into()]);
        cg.call(&var, "traits.set_step", vec![self.step.into()]);
        if let Some(unit) = &self.unit_of_measurement {
            cg.call(&var, "traits.set_unit_of_measurement", vec![unit.as_str().into()]);
        }

        if let Some(lambda) = &self.lambda {
            cg.call(&var, "set_template", vec![Expr::raw(lambda.render("", Some("optional<float>")))]);
        } else {
            cg.call(&var, "set_optimistic", vec![self.optimistic.into()]);
            let initial = self.initial_value.unwrap_or(self.min_value);
            cg.call(&var, "set_initial_value", vec![initial.into()]);
            if let Some(restore) = self.restore_value {
                cg.call(&var, "set_restore_value", vec![restore.into()]);
            }
        }

        emit_automation(
            cg,
            Expr::raw(format!("{var}->get_set_trigger()")),
            "float",
            "float x",
            &self.set_action,
        );
        emit_placement(cg, &var, &self.placement);
        cg.add_define("USE_NUMBER");
        Ok(())
    }
}
