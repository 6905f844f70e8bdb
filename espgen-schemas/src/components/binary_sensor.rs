//! `binary_sensor:` entities, `gpio` and `switch` platforms

use serde::Deserialize;

use super::{pin_expression, report_extra, setup_entity, shared_references, validate_entity, validate_pin, Component};
use crate::codegen::{CodeGen, Expr};
use crate::config::{EntityConfig, Extra};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{Pin, PinUsage};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

/// Edge that triggers the pin interrupt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterruptType {
    Rising,
    Falling,
    #[default]
    Any,
}

impl InterruptType {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::Rising => "gpio::INTERRUPT_RISING_EDGE",
            Self::Falling => "gpio::INTERRUPT_FALLING_EDGE",
            Self::Any => "gpio::INTERRUPT_ANY_EDGE",
        }
    }
}

fn default_true() -> bool {
    true
}

/// `binary_sensor: - platform: gpio`
#[derive(Debug, Clone, Deserialize)]
pub struct GpioBinarySensorConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    pub pin: Pin,

    #[serde(default = "default_true")]
    pub use_interrupt: bool,

    #[serde(default)]
    pub interrupt_type: InterruptType,

    #[serde(default)]
    pub device_class: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// `binary_sensor: - platform: switch`
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchBinarySensorConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    /// Switch whose state is mirrored
    pub source_id: String,

    #[serde(default)]
    pub device_class: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// `binary_sensor:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum BinarySensorConfig {
    Gpio(GpioBinarySensorConfig),
    Switch(SwitchBinarySensorConfig),
}

impl BinarySensorConfig {
    /// Shared entity options
    pub fn entity(&self) -> &EntityConfig {
        match self {
            Self::Gpio(config) => &config.entity,
            Self::Switch(config) => &config.entity,
        }
    }

    /// As a module
    pub fn as_component(&self) -> &dyn Component {
        self
    }

    /// As a mutable module
    pub fn as_component_mut(&mut self) -> &mut dyn Component {
        self
    }
}

fn check_device_class(ctx: &mut SchemaContext<'_>, path: &ConfigPath, class: &Option<String>) {
    if let Some(class) = class {
        if class.is_empty() || !class.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            ctx.error(
                IssueType::InvalidValue,
                path.key("device_class"),
                format!("Invalid device class '{class}'"),
            );
        }
    }
}

impl Component for BinarySensorConfig {
    fn domain(&self) -> &'static str {
        "binary_sensor"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        match self {
            Self::Gpio(config) => {
                let mut fields = vec![IdField::Declare {
                    id: &mut config.entity.id,
                    kind: IdKind::BinarySensor,
                    prefix: "gpio_binarysensor",
                    path: path.clone(),
                }];
                fields.extend(shared_references(&config.entity.web_server, None, path));
                fields
            }
            Self::Switch(config) => {
                let mut fields = vec![
                    IdField::Declare {
                        id: &mut config.entity.id,
                        kind: IdKind::BinarySensor,
                        prefix: "switch__switchbinarysensor",
                        path: path.clone(),
                    },
                    IdField::Reference { id: &config.source_id, kind: IdKind::Switch, path: path.key("source_id") },
                ];
                fields.extend(shared_references(&config.entity.web_server, None, path));
                fields
            }
        }
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        match self {
            Self::Gpio(config) => {
                validate_entity(ctx, path, &config.entity);
                validate_pin(ctx, path.key("pin"), &config.pin, PinUsage::Input);
                check_device_class(ctx, path, &config.device_class);
                report_extra(ctx, path, &config.extra, "binary_sensor.gpio", &[]);
            }
            Self::Switch(config) => {
                validate_entity(ctx, path, &config.entity);
                check_device_class(ctx, path, &config.device_class);
                report_extra(ctx, path, &config.extra, "binary_sensor.switch", &[]);
            }
        }
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let (class, entity, device_class) = match self {
            Self::Gpio(c) => ("gpio::GPIOBinarySensor", &c.entity, &c.device_class),
            Self::Switch(c) => ("switch_::SwitchBinarySensor", &c.entity, &c.device_class),
        };
        let id = super::required_id(&entity.id, path)?;
        let var = cg.new_pvariable(id, class, vec![]);
        setup_entity(cg, &var, entity);
        cg.register_entity("binary_sensor", &var);
        if let Some(device_class) = device_class {
            cg.call(&var, "set_device_class", vec![device_class.as_str().into()]);
        }
        cg.register_component(&var);

        match self {
            Self::Gpio(config) => {
                let pin = pin_expression(cg, &config.pin, PinUsage::Input);
                cg.call(&var, "set_pin", vec![Expr::var(pin)]);
                cg.call(&var, "set_use_interrupt", vec![config.use_interrupt.into()]);
                if config.use_interrupt {
                    cg.call(&var, "set_interrupt_type", vec![Expr::raw(config.interrupt_type.cpp())]);
                }
            }
            Self::Switch(config) => {
                cg.call(&var, "set_source", vec![Expr::var(&config.source_id)]);
            }
        }
        cg.add_define("USE_BINARY_SENSOR");
        Ok(())
    }
}
