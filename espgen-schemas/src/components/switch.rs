//! `switch:` entities, `gpio` platform
//!
//! A switch persists one value, so its forced placement uses
//! [`Margin::SINGLE_VALUE`].

use espgen_core::{Margin, PlacementRequest, Placed};
use serde::Deserialize;

use super::automation::{emit_automation, Action};
use super::{
    emit_placement, pin_expression, report_extra, setup_entity, shared_references, validate_entity,
    validate_pin, Component,
};
use crate::codegen::{CodeGen, Expr, Statement, Target};
use crate::config::{EntityConfig, Extra, ForcedPlacement};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{one_or_many, Pin, PinUsage, TimePeriod};
use crate::validation::SchemaContext;
use crate::ConfigResult;

/// What the switch does at boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchRestoreMode {
    RestoreDefaultOff,
    RestoreDefaultOn,
    #[default]
    AlwaysOff,
    AlwaysOn,
    RestoreInvertedDefaultOff,
    RestoreInvertedDefaultOn,
    Disabled,
}

impl SwitchRestoreMode {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::RestoreDefaultOff => "switch_::SWITCH_RESTORE_DEFAULT_OFF",
            Self::RestoreDefaultOn => "switch_::SWITCH_RESTORE_DEFAULT_ON",
            Self::AlwaysOff => "switch_::SWITCH_ALWAYS_OFF",
            Self::AlwaysOn => "switch_::SWITCH_ALWAYS_ON",
            Self::RestoreInvertedDefaultOff => "switch_::SWITCH_RESTORE_INVERTED_DEFAULT_OFF",
            Self::RestoreInvertedDefaultOn => "switch_::SWITCH_RESTORE_INVERTED_DEFAULT_ON",
            Self::Disabled => "switch_::SWITCH_RESTORE_DISABLED",
        }
    }
}

/// Device class shown by frontends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchDeviceClass {
    Outlet,
    Switch,
}

impl SwitchDeviceClass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Outlet => "outlet",
            Self::Switch => "switch",
        }
    }
}

/// `switch: - platform: gpio`
#[derive(Debug, Clone, Deserialize)]
pub struct GpioSwitchConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    pub pin: Pin,

    /// Switches turned off before this one turns on
    #[serde(default, deserialize_with = "one_or_many")]
    pub interlock: Vec<String>,

    #[serde(default)]
    pub interlock_wait_time: TimePeriod,

    #[serde(default)]
    pub restore_mode: SwitchRestoreMode,

    #[serde(default)]
    pub inverted: bool,

    #[serde(default)]
    pub device_class: Option<SwitchDeviceClass>,

    #[serde(default)]
    pub on_turn_on: Vec<Action>,

    #[serde(default)]
    pub on_turn_off: Vec<Action>,

    /// Runs on every state change with the new state as `x`
    #[serde(default)]
    pub on_state: Vec<Action>,

    #[serde(flatten)]
    pub placement: ForcedPlacement,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Placed for GpioSwitchConfig {
    const MARGIN: Margin = Margin::SINGLE_VALUE;

    fn placement(&self) -> PlacementRequest {
        self.placement.request()
    }
}

/// `switch:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum SwitchConfig {
    Gpio(GpioSwitchConfig),
}

impl SwitchConfig {
    /// Shared entity options
    pub fn entity(&self) -> &EntityConfig {
        let Self::Gpio(config) = self;
        &config.entity
    }

    /// As a module
    pub fn as_component(&self) -> &dyn Component {
        let Self::Gpio(config) = self;
        config
    }

    /// As a mutable module
    pub fn as_component_mut(&mut self) -> &mut dyn Component {
        let Self::Gpio(config) = self;
        config
    }
}

impl Component for GpioSwitchConfig {
    fn domain(&self) -> &'static str {
        "switch"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        let mut fields = vec![IdField::Declare {
            id: &mut self.entity.id,
            kind: IdKind::Switch,
            prefix: "gpio_switch",
            path: path.clone(),
        }];
        fields.extend(self.interlock.iter().enumerate().map(|(i, id)| IdField::Reference {
            id,
            kind: IdKind::Switch,
            path: path.key("interlock").index(i),
        }));
        fields.extend(shared_references(&self.entity.web_server, Some(&self.placement), path));
        fields
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        validate_entity(ctx, path, &self.entity);
        validate_pin(ctx, path.key("pin"), &self.pin, PinUsage::Output);
        report_extra(ctx, path, &self.extra, "switch.gpio", &[]);
    }

    fn forced_placement(&self) -> Option<(PlacementRequest, Margin)> {
        Some((Placed::placement(self), Self::MARGIN))
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.entity.id, path)?;
        let var = cg.new_pvariable(id, "gpio::GPIOSwitch", vec![]);
        setup_entity(cg, &var, &self.entity);
        cg.register_entity("switch", &var);
        if self.inverted {
            cg.call(&var, "set_inverted", vec![true.into()]);
        }
        if let Some(class) = self.device_class {
            cg.call(&var, "set_device_class", vec![class.as_str().into()]);
        }
        cg.call(&var, "set_restore_mode", vec![Expr::raw(self.restore_mode.cpp())]);
        emit_placement(cg, &var, &self.placement);
        cg.register_component(&var);

        let pin = pin_expression(cg, &self.pin, PinUsage::Output);
        cg.call(&var, "set_pin", vec![Expr::var(pin)]);

        emit_automation(cg, Expr::raw(format!("{var}->get_turn_on_trigger()")), "", "", &self.on_turn_on);
        emit_automation(cg, Expr::raw(format!("{var}->get_turn_off_trigger()")), "", "", &self.on_turn_off);
        emit_automation(cg, Expr::raw(format!("{var}->get_state_trigger()")), "bool", "bool x", &self.on_state);

        if !self.interlock.is_empty() {
            // other switches of the group may be declared further down
            let group = self.interlock.iter().map(Expr::var).collect();
            cg.defer(Statement::Call {
                target: Target::Pointer(var.clone()),
                method: "set_interlock".into(),
                args: vec![Expr::List(group)],
            });
            cg.defer(Statement::Call {
                target: Target::Pointer(var.clone()),
                method: "set_interlock_wait_time".into(),
                args: vec![Expr::from(self.interlock_wait_time.as_millis())],
            });
        }
        cg.add_define("USE_SWITCH");
        Ok(())
    }
}
