//! `sensor: - platform: kauf_hlw8012`, the plug's power monitoring chip
//!
//! One polling component publishes up to three sensors. Each one is a full
//! sensor entity and can be the `power_id` of an energy total.

use serde::Deserialize;

use super::sensor::{setup_sensor, validate_properties, SensorProperties, StateClass};
use super::{pin_expression, report_extra, shared_references, validate_entity, validate_pin};
use crate::codegen::{CodeGen, Expr};
use crate::config::{EntityConfig, Extra};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{Pin, PinUsage, TimePeriod};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

/// Chip variant, which sets the conversion constants in the firmware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorModel {
    #[default]
    Hlw8012,
    Cse7759,
    Bl0937,
}

impl SensorModel {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::Hlw8012 => "kauf_hlw8012::HLW8012_SENSOR_MODEL_HLW8012",
            Self::Cse7759 => "kauf_hlw8012::HLW8012_SENSOR_MODEL_CSE7759",
            Self::Bl0937 => "kauf_hlw8012::HLW8012_SENSOR_MODEL_BL0937",
        }
    }
}

/// Shunt resistance in ohms, written as `0.001`, `1mΩ` or `0.001ohm`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawResistance")]
pub struct Resistance(pub f64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawResistance {
    Number(f64),
    Text(String),
}

impl TryFrom<RawResistance> for Resistance {
    type Error = String;

    fn try_from(raw: RawResistance) -> Result<Self, Self::Error> {
        let text = match raw {
            RawResistance::Number(ohms) => return Ok(Self(ohms)),
            RawResistance::Text(text) => text,
        };
        let number = text.trim().trim_end_matches('Ω').trim_end_matches("ohm").trim_end_matches("Ohm");
        let (number, scale) = match number.strip_suffix('m') {
            Some(milli) => (milli, 1e-3),
            None => match number.strip_suffix('k') {
                Some(kilo) => (kilo, 1e3),
                None => (number, 1.0),
            },
        };
        number
            .trim()
            .parse::<f64>()
            .map(|value| Self(value * scale))
            .map_err(|_| format!("Invalid resistance '{text}', expected a value like '1mΩ'"))
    }
}

/// One published reading of the chip
#[derive(Debug, Clone, Deserialize)]
pub struct PowerChannel {
    #[serde(flatten)]
    pub entity: EntityConfig,

    #[serde(flatten)]
    pub properties: SensorProperties,

    #[serde(flatten)]
    pub extra: Extra,
}

fn default_current_resistor() -> Resistance {
    Resistance(0.001)
}

fn default_voltage_divider() -> f64 {
    2351.0
}

fn default_timeout() -> TimePeriod {
    TimePeriod::from_secs(9)
}

/// `sensor: - platform: kauf_hlw8012`
#[derive(Debug, Clone, Deserialize)]
pub struct PowerMonitorConfig {
    #[serde(default)]
    pub id: Option<String>,

    /// Switches the CF1 output between current and voltage
    pub sel_pin: Pin,

    /// Active power pulse train
    pub cf_pin: Pin,

    /// Current or voltage pulse train
    pub cf1_pin: Pin,

    #[serde(default)]
    pub voltage: Option<PowerChannel>,

    #[serde(default)]
    pub current: Option<PowerChannel>,

    #[serde(default)]
    pub power: Option<PowerChannel>,

    #[serde(default = "default_current_resistor")]
    pub current_resistor: Resistance,

    #[serde(default = "default_voltage_divider")]
    pub voltage_divider: f64,

    #[serde(default)]
    pub model: SensorModel,

    /// Readings drop to zero when no pulse arrives for this long
    #[serde(default = "default_timeout")]
    pub timeout: TimePeriod,

    #[serde(default)]
    pub early_publish_percent: Option<f64>,

    #[serde(default)]
    pub early_publish_percent_min_power: Option<f64>,

    #[serde(default)]
    pub early_publish_absolute: Option<f64>,

    #[serde(default = "super::number::default_update_interval")]
    pub update_interval: TimePeriod,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Unit, precision, device class and the setter each channel is wired with
const CHANNELS: [(&str, &str, i8, &str); 3] = [
    ("voltage", "V", 1, "set_voltage_sensor"),
    ("current", "A", 2, "set_current_sensor"),
    ("power", "W", 1, "set_power_sensor"),
];

impl PowerMonitorConfig {
    /// Configured channels with the key each one sits under
    pub fn channels(&self) -> Vec<(&'static str, &PowerChannel)> {
        [("voltage", &self.voltage), ("current", &self.current), ("power", &self.power)]
            .into_iter()
            .filter_map(|(key, channel)| channel.as_ref().map(|c| (key, c)))
            .collect()
    }

    pub(super) fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        let mut fields = vec![IdField::Declare {
            id: &mut self.id,
            kind: IdKind::PowerMonitor,
            prefix: "kauf_hlw8012_kauf_hlw8012component",
            path: path.clone(),
        }];
        let channels = [("voltage", &mut self.voltage), ("current", &mut self.current), ("power", &mut self.power)];
        for (key, channel) in channels {
            if let Some(channel) = channel {
                let channel_path = path.key(key);
                fields.push(IdField::Declare {
                    id: &mut channel.entity.id,
                    kind: IdKind::Sensor,
                    prefix: "sensor_sensor",
                    path: channel_path.clone(),
                });
                fields.extend(shared_references(&channel.entity.web_server, None, &channel_path));
            }
        }
        fields
    }

    pub(super) fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        validate_pin(ctx, path.key("sel_pin"), &self.sel_pin, PinUsage::Output);
        validate_pin(ctx, path.key("cf_pin"), &self.cf_pin, PinUsage::InputPullup);
        validate_pin(ctx, path.key("cf1_pin"), &self.cf1_pin, PinUsage::InputPullup);

        if !(self.current_resistor.0 > 0.0 && self.current_resistor.0.is_finite()) {
            ctx.error(IssueType::OutOfRange, path.key("current_resistor"), "current_resistor must be positive");
        }
        if !(self.voltage_divider >= 0.0 && self.voltage_divider.is_finite()) {
            ctx.error(IssueType::OutOfRange, path.key("voltage_divider"), "Value must be at least 0");
        }
        let early = [
            ("early_publish_percent", self.early_publish_percent),
            ("early_publish_percent_min_power", self.early_publish_percent_min_power),
            ("early_publish_absolute", self.early_publish_absolute),
        ];
        for (key, value) in early {
            if let Some(value) = value {
                if !(value >= 0.0 && value.is_finite()) {
                    ctx.error(IssueType::OutOfRange, path.key(key), "Value must be at least 0");
                }
            }
        }
        if self.timeout.is_zero() {
            ctx.error(IssueType::OutOfRange, path.key("timeout"), "timeout must be positive");
        }

        let channels = [&mut self.voltage, &mut self.current, &mut self.power];
        for (channel, (key, unit, decimals, _)) in channels.into_iter().zip(CHANNELS) {
            let Some(channel) = channel else {
                continue;
            };
            let channel_path = path.key(key);
            let properties = &mut channel.properties;
            properties.unit_of_measurement.get_or_insert_with(|| unit.to_string());
            properties.accuracy_decimals.get_or_insert(decimals);
            properties.device_class.get_or_insert_with(|| key.to_string());
            properties.state_class.get_or_insert(StateClass::Measurement);

            validate_entity(ctx, &channel_path, &channel.entity);
            validate_properties(ctx, &channel_path, &channel.properties);
            report_extra(ctx, &channel_path, &channel.extra, &format!("sensor.kauf_hlw8012.{key}"), &[]);
        }
        report_extra(ctx, path, &self.extra, "sensor.kauf_hlw8012", &[]);
    }

    pub(super) fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.id, path)?;
        let var = cg.new_pvariable(id, "kauf_hlw8012::Kauf_HLW8012Component", vec![]);
        cg.register_component(&var);
        cg.call(&var, "set_update_interval", vec![self.update_interval.as_millis().into()]);

        let pins = [
            ("set_sel_pin", &self.sel_pin, PinUsage::Output),
            ("set_cf_pin", &self.cf_pin, PinUsage::InputPullup),
            ("set_cf1_pin", &self.cf1_pin, PinUsage::InputPullup),
        ];
        for (setter, pin, usage) in pins {
            let pin = pin_expression(cg, pin, usage);
            cg.call(&var, setter, vec![Expr::var(pin)]);
        }

        let channels = [&self.voltage, &self.current, &self.power];
        for (channel, (key, _, _, setter)) in channels.into_iter().zip(CHANNELS) {
            let Some(channel) = channel else {
                continue;
            };
            let sensor_id = super::required_id(&channel.entity.id, &path.key(key))?;
            let sensor = cg.new_pvariable(sensor_id, "sensor::Sensor", vec![]);
            setup_sensor(cg, &sensor, &channel.entity, &channel.properties);
            cg.call(&var, setter, vec![Expr::var(sensor)]);
        }

        if let Some(percent) = self.early_publish_percent {
            cg.call(&var, "set_early_publish_percent", vec![percent.into()]);
        }
        if let Some(min_power) = self.early_publish_percent_min_power {
            cg.call(&var, "set_early_publish_percent_min_power", vec![min_power.into()]);
        }
        if let Some(absolute) = self.early_publish_absolute {
            cg.call(&var, "set_early_publish_absolute", vec![absolute.into()]);
        }
        cg.call(&var, "set_current_resistor", vec![self.current_resistor.0.into()]);
        cg.call(&var, "set_voltage_divider", vec![self.voltage_divider.into()]);
        cg.call(&var, "set_sensor_model", vec![Expr::raw(self.model.cpp())]);
        cg.call(&var, "set_timeout", vec![self.timeout.as_millis().into()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::sensor::SensorConfig;
    use crate::components::Component;
    use crate::types::Platform;
    use crate::validation::ValidationReport;

    const PLUG: &str = "
platform: kauf_hlw8012
id: hlw
sel_pin:
  number: GPIO12
  inverted: true
cf_pin: GPIO5
cf1_pin: GPIO4
voltage:
  id: volts
  name: Voltage
current:
  id: amps
  name: Current
power:
  id: watts
  name: Power
  accuracy_decimals: 0
current_resistor: 1mΩ
model: BL0937
early_publish_percent: 5
";

    fn validated(yaml: &str) -> (SensorConfig, ValidationReport) {
        let mut config: SensorConfig = serde_yaml::from_str(yaml).unwrap();
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(Platform::Esp8266, "plug", &mut report);
        config.validate(&mut ctx, &ConfigPath::section("sensor").index(0));
        (config, report)
    }

    #[test]
    fn defaults() {
        let (config, report) = validated("{platform: kauf_hlw8012, sel_pin: 12, cf_pin: 5, cf1_pin: 4}");
        assert!(report.is_valid(), "{}", report.summary());
        let SensorConfig::KaufHlw8012(chip) = &config else { panic!("expected kauf_hlw8012") };
        assert_eq!(chip.current_resistor, Resistance(0.001));
        assert_eq!(chip.voltage_divider, 2351.0);
        assert_eq!(chip.model, SensorModel::Hlw8012);
        assert_eq!(chip.timeout, TimePeriod::from_secs(9));
        assert_eq!(chip.update_interval, TimePeriod::from_secs(60));
        assert!(chip.channels().is_empty());
    }

    #[test]
    fn resistance_units() {
        assert_eq!(Resistance::try_from(RawResistance::Text("1mΩ".into())), Ok(Resistance(0.001)));
        assert_eq!(Resistance::try_from(RawResistance::Text("0.5 ohm".into())), Ok(Resistance(0.5)));
        assert!(Resistance::try_from(RawResistance::Text("lots".into())).is_err());
    }

    #[test]
    fn channel_defaults() {
        let (config, report) = validated(PLUG);
        assert!(report.is_valid(), "{}", report.summary());
        let SensorConfig::KaufHlw8012(chip) = &config else { panic!("expected kauf_hlw8012") };
        let voltage = &chip.voltage.as_ref().unwrap().properties;
        assert_eq!(voltage.unit_of_measurement.as_deref(), Some("V"));
        assert_eq!(voltage.device_class.as_deref(), Some("voltage"));
        assert_eq!(chip.current.as_ref().unwrap().properties.accuracy_decimals, Some(2));
        assert_eq!(chip.power.as_ref().unwrap().properties.accuracy_decimals, Some(0));
        assert_eq!(chip.model, SensorModel::Bl0937);
    }

    #[test]
    fn field_checks() {
        let (_, report) = validated(
            "{platform: kauf_hlw8012, sel_pin: 12, cf_pin: 16, cf1_pin: 4, current_resistor: 0, \
             early_publish_absolute: -1, power: {name: Power, colour: red}}",
        );
        let paths: Vec<String> = report.errors.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(
            paths,
            [
                "sensor[0].cf_pin",
                "sensor[0].current_resistor",
                "sensor[0].early_publish_absolute",
                "sensor[0].power.colour",
            ]
        );
    }

    #[test]
    fn channels_declare_sensor_ids() {
        let (mut config, _) = validated("{platform: kauf_hlw8012, sel_pin: 12, cf_pin: 5, cf1_pin: 4, power: {name: Power}}");
        let path = ConfigPath::section("sensor").index(0);
        let fields = config.id_fields(&path);
        let sensors = fields
            .iter()
            .filter(|field| matches!(field, IdField::Declare { kind: IdKind::Sensor, .. }))
            .count();
        assert_eq!(sensors, 1);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn emission() {
        let (config, _) = validated(PLUG);
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        config.to_code(&mut cg, &ConfigPath::section("sensor").index(0)).unwrap();
        let program = cg.finish("plug", ValidationReport::new());
        let main = program.main_cpp();
        assert!(main.contains("hlw = new kauf_hlw8012::Kauf_HLW8012Component();"));
        assert!(main.contains("hlw->set_update_interval(60000);"));
        assert!(main.contains("hlw->set_sel_pin(esp8266_esp8266gpiopin_id);"));
        assert!(main.contains("hlw->set_cf_pin(esp8266_esp8266gpiopin_id_2);"));
        assert!(main.contains("esp8266_esp8266gpiopin_id_2->set_flags(gpio::Flags::FLAG_INPUT | gpio::Flags::FLAG_PULLUP);"));
        assert!(main.contains("watts = new sensor::Sensor();"));
        assert!(main.contains("watts->set_unit_of_measurement(\"W\");"));
        assert!(main.contains("hlw->set_power_sensor(watts);"));
        assert!(main.contains("hlw->set_voltage_sensor(volts);"));
        assert!(main.contains("hlw->set_early_publish_percent(5.0f);"));
        assert!(main.contains("hlw->set_current_resistor(0.001f);"));
        assert!(main.contains("hlw->set_voltage_divider(2351.0f);"));
        assert!(main.contains("hlw->set_sensor_model(kauf_hlw8012::HLW8012_SENSOR_MODEL_BL0937);"));
        assert!(main.contains("hlw->set_timeout(9000);"));
    }
}
