//! `sensor:` entities, `template`, `kauf_hlw8012` and `total_daily_energy` platforms
//!
//! An energy total reads a power sensor. It inherits the power sensor's icon,
//! unit and precision when it does not set its own, and is always emitted
//! after every source sensor.

use std::collections::BTreeMap;

use espgen_core::{Margin, PlacementRequest, Placed};
use serde::Deserialize;

use super::kauf_hlw8012::PowerMonitorConfig;
use super::number::default_update_interval;
use super::{emit_placement, report_extra, setup_entity, shared_references, validate_entity, Component};
use crate::codegen::{CodeGen, Expr};
use crate::config::{EntityConfig, Extra, ForcedPlacement};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{Lambda, TimePeriod};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

const REMOVED_KEYS: &[(&str, &str)] = &[(
    "min_save_interval",
    "`min_save_interval` was removed in 2022.6.0. Please use the `preferences` -> `flash_write_interval` to adjust.",
)];

/// How frontends aggregate readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

impl StateClass {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::Measurement => "sensor::STATE_CLASS_MEASUREMENT",
            Self::Total => "sensor::STATE_CLASS_TOTAL",
            Self::TotalIncreasing => "sensor::STATE_CLASS_TOTAL_INCREASING",
        }
    }
}

/// Options every sensor accepts on top of the entity fragment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorProperties {
    #[serde(default)]
    pub unit_of_measurement: Option<String>,

    #[serde(default)]
    pub accuracy_decimals: Option<i8>,

    #[serde(default)]
    pub device_class: Option<String>,

    #[serde(default)]
    pub state_class: Option<StateClass>,
}

/// `sensor: - platform: template`
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSensorConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    #[serde(flatten)]
    pub properties: SensorProperties,

    /// Returns the new reading, `{}` for none
    #[serde(default)]
    pub lambda: Option<Lambda>,

    #[serde(default = "default_update_interval")]
    pub update_interval: TimePeriod,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Integration method of an energy total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMethod {
    Trapezoid,
    Left,
    #[default]
    Right,
}

impl IntegrationMethod {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::Trapezoid => "total_daily_energy::TOTAL_DAILY_ENERGY_METHOD_TRAPEZOID",
            Self::Left => "total_daily_energy::TOTAL_DAILY_ENERGY_METHOD_LEFT",
            Self::Right => "total_daily_energy::TOTAL_DAILY_ENERGY_METHOD_RIGHT",
        }
    }
}

fn default_true() -> bool {
    true
}

/// `sensor: - platform: total_daily_energy`
#[derive(Debug, Clone, Deserialize)]
pub struct TotalDailyEnergyConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    #[serde(flatten)]
    pub properties: SensorProperties,

    /// Power sensor being integrated
    pub power_id: String,

    /// Clock that marks midnight; the only `time` entry when not written
    #[serde(default)]
    pub time_id: Option<String>,

    #[serde(default = "default_true")]
    pub restore: bool,

    #[serde(default)]
    pub method: IntegrationMethod,

    #[serde(flatten)]
    pub placement: ForcedPlacement,

    #[serde(flatten)]
    pub extra: Extra,
}

impl TotalDailyEnergyConfig {
    /// Fill in icon, unit and precision from the power sensor
    pub fn inherit_from(&mut self, icon: Option<&str>, power: &SensorProperties) {
        if self.entity.icon.is_none() {
            self.entity.icon = icon.map(str::to_string);
        }
        if self.properties.unit_of_measurement.is_none() {
            self.properties.unit_of_measurement = power.unit_of_measurement.as_ref().map(|unit| format!("{unit}h"));
        }
        if self.properties.accuracy_decimals.is_none() {
            self.properties.accuracy_decimals = power.accuracy_decimals.map(|d| d.saturating_add(2));
        }
    }
}

impl Placed for TotalDailyEnergyConfig {
    const MARGIN: Margin = Margin::SINGLE_VALUE;

    fn placement(&self) -> PlacementRequest {
        self.placement.request()
    }
}

/// `sensor:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum SensorConfig {
    Template(TemplateSensorConfig),
    #[serde(rename = "kauf_hlw8012")]
    KaufHlw8012(PowerMonitorConfig),
    TotalDailyEnergy(TotalDailyEnergyConfig),
}

/// One sensor entity of a list entry; `key` is set for sub-sensors
pub struct Published<'a> {
    pub key: Option<&'static str>,
    pub entity: &'a EntityConfig,
    pub properties: &'a SensorProperties,
}

impl SensorConfig {
    /// Every sensor entity this entry publishes
    pub fn published(&self) -> Vec<Published<'_>> {
        match self {
            Self::Template(config) => {
                vec![Published { key: None, entity: &config.entity, properties: &config.properties }]
            }
            Self::TotalDailyEnergy(config) => {
                vec![Published { key: None, entity: &config.entity, properties: &config.properties }]
            }
            Self::KaufHlw8012(config) => config
                .channels()
                .into_iter()
                .map(|(key, channel)| Published {
                    key: Some(key),
                    entity: &channel.entity,
                    properties: &channel.properties,
                })
                .collect(),
        }
    }

    /// Whether this sensor reads another sensor
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::TotalDailyEnergy(_))
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

/// Let every energy total inherit from its power sensor
///
/// Runs after IDs are resolved, so every sensor has an ID to be looked up by.
pub fn inherit_power_properties(sensors: &mut [SensorConfig]) {
    let sources: BTreeMap<String, (Option<String>, SensorProperties)> = sensors
        .iter()
        .flat_map(SensorConfig::published)
        .filter_map(|sensor| {
            let id = sensor.entity.id.clone()?;
            Some((id, (sensor.entity.icon.clone(), sensor.properties.clone())))
        })
        .collect();

    for sensor in sensors.iter_mut() {
        if let SensorConfig::TotalDailyEnergy(energy) = sensor {
            if let Some((icon, power)) = sources.get(&energy.power_id) {
                log::debug!("{} inherits from {}", energy.entity.name, energy.power_id);
                energy.inherit_from(icon.as_deref(), power);
            }
        }
    }
}

pub(super) fn validate_properties(ctx: &mut SchemaContext<'_>, path: &ConfigPath, properties: &SensorProperties) {
    if let Some(decimals) = properties.accuracy_decimals {
        if decimals < 0 {
            ctx.error(
                IssueType::OutOfRange,
                path.key("accuracy_decimals"),
                format!("accuracy_decimals must not be negative, got {decimals}"),
            );
        }
    }
    if let Some(class) = &properties.device_class {
        if class.is_empty() || !class.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            ctx.error(IssueType::InvalidValue, path.key("device_class"), format!("Invalid device class '{class}'"));
        }
    }
}

/// `sensor::Sensor` setters shared by every platform
pub(super) fn setup_sensor(cg: &mut CodeGen, var: &str, entity: &EntityConfig, properties: &SensorProperties) {
    setup_entity(cg, var, entity);
    cg.register_entity("sensor", var);
    if let Some(unit) = &properties.unit_of_measurement {
        cg.call(var, "set_unit_of_measurement", vec![unit.as_str().into()]);
    }
    if let Some(decimals) = properties.accuracy_decimals {
        cg.call(var, "set_accuracy_decimals", vec![Expr::Int(i64::from(decimals))]);
    }
    if let Some(class) = &properties.device_class {
        cg.call(var, "set_device_class", vec![class.as_str().into()]);
    }
    if let Some(state_class) = properties.state_class {
        cg.call(var, "set_state_class", vec![Expr::raw(state_class.cpp())]);
    }
    cg.add_define("USE_SENSOR");
}

impl Component for SensorConfig {
    fn domain(&self) -> &'static str {
        "sensor"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        match self {
            Self::Template(config) => {
                let mut fields = vec![IdField::Declare {
                    id: &mut config.entity.id,
                    kind: IdKind::Sensor,
                    prefix: "template__templatesensor",
                    path: path.clone(),
                }];
                fields.extend(shared_references(&config.entity.web_server, None, path));
                fields
            }
            Self::KaufHlw8012(config) => config.id_fields(path),
            Self::TotalDailyEnergy(config) => {
                let mut fields = vec![
                    IdField::Declare {
                        id: &mut config.entity.id,
                        kind: IdKind::Sensor,
                        prefix: "total_daily_energy_totaldailyenergy",
                        path: path.clone(),
                    },
                    IdField::Reference { id: &config.power_id, kind: IdKind::Sensor, path: path.key("power_id") },
                    IdField::Implicit { id: &mut config.time_id, kind: IdKind::Time, path: path.key("time_id") },
                ];
                fields.extend(shared_references(&config.entity.web_server, Some(&config.placement), path));
                fields
            }
        }
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        match self {
            Self::Template(config) => {
                validate_entity(ctx, path, &config.entity);
                validate_properties(ctx, path, &config.properties);
                report_extra(ctx, path, &config.extra, "sensor.template", &[]);
            }
            Self::KaufHlw8012(config) => config.validate(ctx, path),
            Self::TotalDailyEnergy(config) => {
                validate_entity(ctx, path, &config.entity);
                validate_properties(ctx, path, &config.properties);
                if config.entity.id.as_deref() == Some(config.power_id.as_str()) {
                    ctx.error(IssueType::Reference, path.key("power_id"), "An energy total cannot read itself");
                }
                config.properties.device_class.get_or_insert_with(|| "energy".to_string());
                config.properties.state_class.get_or_insert(StateClass::TotalIncreasing);
                report_extra(ctx, path, &config.extra, "sensor.total_daily_energy", REMOVED_KEYS);
            }
        }
    }

    fn forced_placement(&self) -> Option<(PlacementRequest, Margin)> {
        match self {
            Self::Template(_) | Self::KaufHlw8012(_) => None,
            Self::TotalDailyEnergy(config) => Some((Placed::placement(config), TotalDailyEnergyConfig::MARGIN)),
        }
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        match self {
            Self::Template(config) => {
                let id = super::required_id(&config.entity.id, path)?;
                let var = cg.new_pvariable(id, "template_::TemplateSensor", vec![]);
                setup_sensor(cg, &var, &config.entity, &config.properties);
                cg.register_component(&var);
                cg.call(&var, "set_update_interval", vec![config.update_interval.as_millis().into()]);
                if let Some(lambda) = &config.lambda {
                    cg.call(&var, "set_template", vec![Expr::raw(lambda.render("", Some("optional<float>")))]);
                }
            }
            Self::KaufHlw8012(config) => config.to_code(cg, path)?,
            Self::TotalDailyEnergy(config) => {
                let id = super::required_id(&config.entity.id, path)?;
                let time = super::required_id(&config.time_id, path)?;
                let var = cg.new_pvariable(id, "total_daily_energy::TotalDailyEnergy", vec![]);
                setup_sensor(cg, &var, &config.entity, &config.properties);
                cg.register_component(&var);
                cg.call(&var, "set_parent", vec![Expr::var(&config.power_id)]);
                cg.call(&var, "set_time", vec![Expr::var(time)]);
                cg.call(&var, "set_restore", vec![config.restore.into()]);
                cg.call(&var, "set_method", vec![Expr::raw(config.method.cpp())]);
                emit_placement(cg, &var, &config.placement);
            }
        }
        Ok(())
    }
}
