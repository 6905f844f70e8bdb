//! `select:` entities, `template` platform

use std::collections::BTreeSet;

use espgen_core::{Margin, PlacementRequest, Placed};
use serde::Deserialize;

use super::automation::{emit_automation, Action};
use super::number::default_update_interval;
use super::{emit_placement, report_extra, setup_entity, shared_references, validate_entity, Component};
use crate::codegen::{CodeGen, Expr};
use crate::config::{EntityConfig, Extra, ForcedPlacement};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{one_or_many, Lambda, TimePeriod};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

/// Update interval that never fires
const SCHEDULER_DONT_RUN: u32 = u32::MAX;

/// `select: - platform: template`
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSelectConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    #[serde(deserialize_with = "one_or_many")]
    pub options: Vec<String>,

    #[serde(default)]
    pub lambda: Option<Lambda>,

    #[serde(default)]
    pub optimistic: bool,

    #[serde(default)]
    pub set_action: Vec<Action>,

    /// First option when not written
    #[serde(default)]
    pub initial_option: Option<String>,

    #[serde(default)]
    pub restore_value: Option<bool>,

    #[serde(default = "default_update_interval")]
    pub update_interval: TimePeriod,

    #[serde(flatten)]
    pub placement: ForcedPlacement,

    #[serde(flatten)]
    pub extra: Extra,
}

impl TemplateSelectConfig {
    fn initial_index(&self) -> usize {
        if self.lambda.is_some() {
            return 0;
        }
        self.initial_option
            .as_ref()
            .and_then(|initial| self.options.iter().position(|option| option == initial))
            .unwrap_or(0)
    }
}

impl Placed for TemplateSelectConfig {
    const MARGIN: Margin = Margin::SINGLE_VALUE;

    fn placement(&self) -> PlacementRequest {
        self.placement.request()
    }
}

/// `select:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum SelectConfig {
    Template(TemplateSelectConfig),
}

impl SelectConfig {
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

impl Component for TemplateSelectConfig {
    fn domain(&self) -> &'static str {
        "select"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        let mut fields = vec![IdField::Declare {
            id: &mut self.entity.id,
            kind: IdKind::Select,
            prefix: "template__templateselect",
            path: path.clone(),
        }];
        fields.extend(shared_references(&self.entity.web_server, Some(&self.placement), path));
        fields
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        validate_entity(ctx, path, &self.entity);
        ctx.check_len(path.key("options"), self.options.len(), 1, usize::MAX, "options");
        let mut seen = BTreeSet::new();
        for (i, option) in self.options.iter().enumerate() {
            if !seen.insert(option.as_str()) {
                ctx.error(
                    IssueType::Duplicate,
                    path.key("options").index(i),
                    format!("Option '{option}' is listed twice"),
                );
            }
        }

        if self.lambda.is_some() {
            if self.optimistic {
                ctx.error(IssueType::Conflict, path.key("optimistic"), "optimistic cannot be used with lambda");
            }
            if self.initial_option.is_some() {
                ctx.error(IssueType::Conflict, path.key("initial_option"), "initial_value cannot be used with lambda");
            }
            if self.restore_value.is_some() {
                ctx.error(IssueType::Conflict, path.key("restore_value"), "restore_value cannot be used with lambda");
            }
        } else if let Some(initial) = &self.initial_option {
            if !self.options.contains(initial) {
                ctx.error(
                    IssueType::InvalidValue,
                    path.key("initial_option"),
                    format!("initial_option '{initial}' is not a valid option [{}]", self.options.join(", ")),
                );
            }
        } else {
            self.initial_option = self.options.first().cloned();
        }

        if !self.optimistic && self.set_action.is_empty() {
            ctx.error(
                IssueType::MissingField,
                path.clone(),
                "Either optimistic mode must be enabled, or set_action must be set, to handle the option being set.",
            );
        }
        report_extra(ctx, path, &self.extra, "select.template", &[]);
    }

    fn forced_placement(&self) -> Option<(PlacementRequest, Margin)> {
        Some((Placed::placement(self), Self::MARGIN))
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.entity.id, path)?;
        let base = if self.set_action.is_empty() {
            "template_::TemplateSelect"
        } else {
            "template_::TemplateSelectWithSetAction"
        };
        let class = format!(
            "{base}<{}, {}, {}, {}>",
            self.lambda.is_some(),
            self.optimistic,
            self.restore_value.unwrap_or(false),
            self.initial_index()
        );
        let var = cg.new_pvariable(id, &class, vec![]);
        cg.register_component(&var);
        let interval = if self.lambda.is_some() {
            Expr::from(self.update_interval.as_millis())
        } else {
            // polling only makes sense with a lambda
            Expr::from(SCHEDULER_DONT_RUN)
        };
        cg.call(&var, "set_update_interval", vec![interval]);
        setup_entity(cg, &var, &self.entity);
        cg.register_entity("select", &var);
        let options = self.options.iter().map(|o| Expr::from(o.as_str())).collect();
        cg.call(&var, "traits.set_options", vec![Expr::List(options)]);

        if let Some(lambda) = &self.lambda {
            cg.call(&var, "set_lambda", vec![Expr::raw(lambda.render("", Some("optional<std::string>")))]);
        }
        emit_automation(
            cg,
            Expr::raw(format!("{var}->get_set_trigger()")),
            "StringRef",
            "StringRef x",
            &self.set_action,
        );
        emit_placement(cg, &var, &self.placement);
        cg.add_define("USE_SELECT");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use crate::validation::ValidationReport;

    fn parse(yaml: &str) -> TemplateSelectConfig {
        let SelectConfig::Template(config) = serde_yaml::from_str(yaml).unwrap();
        config
    }

    fn validate(config: &mut TemplateSelectConfig) -> ValidationReport {
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(Platform::Esp8266, "dev", &mut report);
        config.validate(&mut ctx, &ConfigPath::section("select").index(0));
        report
    }

    #[test]
    fn initial_option_defaults_to_first() {
        let mut config = parse("{platform: template, name: Mode, options: [Low, High], optimistic: true}");
        assert!(validate(&mut config).is_valid());
        assert_eq!(config.initial_option.as_deref(), Some("Low"));
    }

    #[test]
    fn all_violations_reported() {
        let mut config = parse("{platform: template, name: Mode, options: [Low, High], initial_option: Mid}");
        let report = validate(&mut config);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].message, "initial_option 'Mid' is not a valid option [Low, High]");
        assert_eq!(report.errors[0].path.to_string(), "select[0].initial_option");
        assert!(report.errors[1].message.ends_with("to handle the option being set."));
    }

    #[test]
    fn options_are_unique() {
        let mut config = parse("{platform: template, name: Mode, options: [Low, Low], optimistic: true}");
        assert_eq!(validate(&mut config).errors_of(IssueType::Duplicate).count(), 1);
    }

    #[test]
    fn emission() {
        let mut config = parse(
            "{platform: template, id: mode, name: Mode, options: [Low, Mid, High], initial_option: High, \
             restore_value: true, set_action: [{lambda: 'ESP_LOGD(\"x\", \"%s\", x.c_str());'}], forced_addr: 7, \
             global_addr: alloc}",
        );
        assert!(validate(&mut config).is_valid());
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        config.to_code(&mut cg, &ConfigPath::section("select").index(0)).unwrap();
        let program = cg.finish("dev", ValidationReport::new());
        let main = program.main_cpp();
        assert!(main.contains("mode = new template_::TemplateSelectWithSetAction<false, false, true, 2>();"));
        assert!(main.contains("mode->set_update_interval(4294967295UL);"));
        assert!(main.contains("mode->traits.set_options({\"Low\", \"Mid\", \"High\"});"));
        assert!(main.contains("new Automation<StringRef>(mode->get_set_trigger());"));
        assert!(main.contains("mode->set_global_addr(alloc);"));
    }
}
