//! Value types shared by several modules
//!
//! Each type parses itself from YAML once, so module code never handles raw
//! strings for durations, pins or MAC addresses.

use std::fmt;

use serde::Deserialize;

/// Target platform of the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// ESP8266, the only platform with a static memory frontier
    Esp8266,
    /// ESP32 family
    Esp32,
}

impl Platform {
    /// Configuration key of the platform block
    pub const fn key(self) -> &'static str {
        match self {
            Self::Esp8266 => "esp8266",
            Self::Esp32 => "esp32",
        }
    }

    /// Highest GPIO number the platform exposes
    pub const fn max_gpio(self) -> u8 {
        match self {
            Self::Esp8266 => 17,
            Self::Esp32 => 39,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Esp8266 => "ESP8266",
            Self::Esp32 => "ESP32",
        })
    }
}

const MICROS_PER_MILLI: u64 = 1_000;
const MICROS_PER_SECOND: u64 = 1_000_000;

/// Non-negative duration written with a unit (`500ms`, `1.5s`, `15min`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct TimePeriod {
    micros: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPeriod {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TimePeriod {
    /// Zero-length period
    pub const ZERO: TimePeriod = TimePeriod { micros: 0 };

    /// Period of `ms` milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Self { micros: ms * MICROS_PER_MILLI }
    }

    /// Period of `secs` seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self { micros: secs * MICROS_PER_SECOND }
    }

    /// Length in milliseconds, truncated
    pub const fn as_millis(&self) -> u64 {
        self.micros / MICROS_PER_MILLI
    }

    /// Length in microseconds
    pub const fn as_micros(&self) -> u64 {
        self.micros
    }

    /// Whether the period is empty
    pub const fn is_zero(&self) -> bool {
        self.micros == 0
    }

    /// Parse `<number><unit>`
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let split = text
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(text.len());
        let (number, unit) = (text[..split].trim(), text[split..].trim());

        let value: f64 = number
            .parse()
            .map_err(|_| format!("Expected a time period like '60s', got '{text}'"))?;
        if !value.is_finite() {
            return Err(format!("Expected a time period like '60s', got '{text}'"));
        }
        if value < 0.0 {
            return Err("Negative time periods are not allowed".to_string());
        }

        let scale = match unit {
            "" if value == 0.0 => 0,
            "" => {
                return Err(format!(
                    "Don't know what '{number}' means as it has no time *unit*! Did you mean '{number}s'?"
                ))
            }
            "us" => 1,
            "ms" => MICROS_PER_MILLI,
            "s" | "sec" => MICROS_PER_SECOND,
            "min" => 60 * MICROS_PER_SECOND,
            "h" => 3_600 * MICROS_PER_SECOND,
            "d" => 86_400 * MICROS_PER_SECOND,
            other => return Err(format!("Unknown time unit '{other}'")),
        };

        Ok(Self { micros: (value * scale as f64).round() as u64 })
    }
}

impl TryFrom<RawPeriod> for TimePeriod {
    type Error = String;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        match raw {
            RawPeriod::Int(0) => Ok(Self::ZERO),
            RawPeriod::Int(n) => Self::parse(&n.to_string()),
            RawPeriod::Float(n) => Self::parse(&n.to_string()),
            RawPeriod::Text(text) => Self::parse(&text),
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.micros % MICROS_PER_SECOND == 0 {
            write!(f, "{}s", self.micros / MICROS_PER_SECOND)
        } else if self.micros % MICROS_PER_MILLI == 0 {
            write!(f, "{}ms", self.micros / MICROS_PER_MILLI)
        } else {
            write!(f, "{}us", self.micros)
        }
    }
}

/// Electrical mode flags of a pin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PinMode {
    /// Digital input
    pub input: bool,
    /// Digital output
    pub output: bool,
    /// Internal pull-up
    pub pullup: bool,
    /// Internal pull-down
    pub pulldown: bool,
    /// Open-drain output
    pub open_drain: bool,
}

impl PinMode {
    /// Mode of an output pin
    pub const OUTPUT: PinMode =
        PinMode { input: false, output: true, pullup: false, pulldown: false, open_drain: false };
    /// Mode of an input pin
    pub const INPUT: PinMode =
        PinMode { input: true, output: false, pullup: false, pulldown: false, open_drain: false };
    /// Mode of an input pin held high internally
    pub const INPUT_PULLUP: PinMode =
        PinMode { input: true, output: false, pullup: true, pulldown: false, open_drain: false };

    /// `gpio::Flags` expression for code emission
    pub fn flags_expr(&self) -> String {
        let flags: Vec<&str> = [
            (self.input, "gpio::Flags::FLAG_INPUT"),
            (self.output, "gpio::Flags::FLAG_OUTPUT"),
            (self.pullup, "gpio::Flags::FLAG_PULLUP"),
            (self.pulldown, "gpio::Flags::FLAG_PULLDOWN"),
            (self.open_drain, "gpio::Flags::FLAG_OPEN_DRAIN"),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect();

        if flags.is_empty() {
            "gpio::Flags::FLAG_NONE".to_string()
        } else {
            flags.join(" | ")
        }
    }
}

/// How a module drives a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinUsage {
    /// Driven by the firmware
    Output,
    /// Read by the firmware
    Input,
    /// Read by the firmware with the internal pull-up on
    InputPullup,
}

/// GPIO pin, written as `5`, `GPIO5` or `{number: GPIO5, inverted: true}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPin")]
pub struct Pin {
    /// GPIO number
    pub number: u8,
    /// Invert the logic level
    pub inverted: bool,
    /// Mode flags; filled from the usage when not written
    pub mode: Option<PinMode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPin {
    Number(u8),
    Name(String),
    Full(FullPin),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FullPin {
    number: PinNumber,
    #[serde(default)]
    inverted: bool,
    #[serde(default)]
    mode: Option<PinMode>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PinNumber {
    Number(u8),
    Name(String),
}

fn parse_gpio_name(name: &str) -> Result<u8, String> {
    let upper = name.trim().to_ascii_uppercase();
    upper
        .strip_prefix("GPIO")
        .unwrap_or(&upper)
        .parse()
        .map_err(|_| format!("Invalid pin '{name}', expected a GPIO number like 'GPIO5'"))
}

impl TryFrom<RawPin> for Pin {
    type Error = String;

    fn try_from(raw: RawPin) -> Result<Self, Self::Error> {
        let (number, inverted, mode) = match raw {
            RawPin::Number(n) => (n, false, None),
            RawPin::Name(name) => (parse_gpio_name(&name)?, false, None),
            RawPin::Full(full) => {
                let number = match full.number {
                    PinNumber::Number(n) => n,
                    PinNumber::Name(name) => parse_gpio_name(&name)?,
                };
                (number, full.inverted, full.mode)
            }
        };
        Ok(Self { number, inverted, mode })
    }
}

impl Pin {
    /// Plain output pin
    pub const fn output(number: u8) -> Self {
        Self { number, inverted: false, mode: Some(PinMode::OUTPUT) }
    }

    /// Mode the pin ends up with
    pub fn effective_mode(&self, usage: PinUsage) -> PinMode {
        self.mode.unwrap_or(match usage {
            PinUsage::Output => PinMode::OUTPUT,
            PinUsage::Input => PinMode::INPUT,
            PinUsage::InputPullup => PinMode::INPUT_PULLUP,
        })
    }

    /// Check the pin against the platform's GPIO matrix
    pub fn check(&self, platform: Platform, usage: PinUsage) -> Result<(), String> {
        let n = self.number;
        let mode = self.effective_mode(usage);

        if n > platform.max_gpio() {
            return Err(format!("{platform}: Invalid pin number: {n}"));
        }
        if (6..=11).contains(&n) {
            return Err(format!(
                "GPIO{n} is used by the flash interface and cannot be used on {platform}s"
            ));
        }

        match platform {
            Platform::Esp8266 => {
                if n == 17 {
                    return Err("GPIO17 (TOUT) is an analog-only pin".to_string());
                }
                if mode.pullup && n == 16 {
                    return Err("GPIO16 does not support pullup pin mode".to_string());
                }
                if mode.pulldown && n != 16 {
                    return Err("Only GPIO16 supports pulldown pin mode".to_string());
                }
            }
            Platform::Esp32 => {
                if matches!(n, 20 | 24 | 28..=31) {
                    return Err(format!("The pin GPIO{n} is not usable on ESP32s"));
                }
                if (34..=39).contains(&n) {
                    if mode.output {
                        return Err(format!("GPIO{n} (34-39) does not support output pin mode"));
                    }
                    if mode.pullup || mode.pulldown {
                        return Err(format!(
                            "GPIO{n} (34-39) does not support pullup/pulldown pin mode"
                        ));
                    }
                }
            }
        }

        if usage == PinUsage::Output && !mode.output {
            return Err(format!("GPIO{n} must be configured with output mode here"));
        }
        if matches!(usage, PinUsage::Input | PinUsage::InputPullup) && !mode.input {
            return Err(format!("GPIO{n} must be configured with input mode here"));
        }
        Ok(())
    }
}

/// 48-bit hardware address, `AA:BB:CC:DD:EE:FF`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct MacAddress(pub [u8; 6]);

impl TryFrom<String> for MacAddress {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 6 {
            return Err("MAC Address must consist of 6 : (colon) separated parts".to_string());
        }
        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| format!("MAC Address parts must be hexadecimal values, got '{part}'"))?;
        }
        Ok(Self(bytes))
    }
}

impl MacAddress {
    /// Brace initializer used by the C++ setters
    pub fn to_initializer(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|b| format!("0x{b:02X}")).collect();
        format!("{{{}}}", parts.join(", "))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Inline C++ body, emitted inside a lambda
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Lambda(pub String);

impl Lambda {
    /// Full lambda expression with the given parameters and return type
    pub fn render(&self, params: &str, return_type: Option<&str>) -> String {
        let body = self.0.trim_end();
        match return_type {
            Some(ret) => format!("[=]({params}) -> {ret} {{\n{body}\n}}"),
            None => format!("[=]({params}) -> void {{\n{body}\n}}"),
        }
    }
}

/// Treat an empty value (`pulse:`) as the type's default
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A key written with an empty body (`captive_portal:`) still enables the module
pub fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?.unwrap_or_default()))
}

/// Accept a single value where a list is expected
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}

/// Icon reference such as `mdi:power-plug`
pub fn check_icon(icon: &str) -> Result<(), String> {
    let valid_part = |part: &str| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    };
    match icon.split_once(':') {
        Some((prefix, name)) if valid_part(prefix) && valid_part(name) => Ok(()),
        _ => Err(format!("Icons must match the format '[icon pack]:[icon]', e.g. 'mdi:home-assistant', got '{icon}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_units() {
        assert_eq!(TimePeriod::parse("60s").map(|p| p.as_millis()), Ok(60_000));
        assert_eq!(TimePeriod::parse("15min").map(|p| p.as_millis()), Ok(900_000));
        assert_eq!(TimePeriod::parse("1.5s").map(|p| p.as_millis()), Ok(1_500));
        assert_eq!(TimePeriod::parse("250 ms").map(|p| p.as_millis()), Ok(250));
        assert_eq!(TimePeriod::parse("500us").map(|p| p.as_micros()), Ok(500));
        assert_eq!(TimePeriod::parse("0"), Ok(TimePeriod::ZERO));
    }

    #[test]
    fn time_rejects_bare_numbers_and_negatives() {
        assert!(TimePeriod::parse("5").unwrap_err().contains("no time *unit*"));
        assert!(TimePeriod::parse("-1s").is_err());
        assert!(TimePeriod::parse("3 fortnights").is_err());
    }

    #[test]
    fn time_from_yaml() {
        let p: TimePeriod = serde_yaml::from_str("90s").unwrap();
        assert_eq!(p, TimePeriod::from_secs(90));
        let zero: TimePeriod = serde_yaml::from_str("0").unwrap();
        assert!(zero.is_zero());
        assert!(serde_yaml::from_str::<TimePeriod>("12").is_err());
        assert_eq!(TimePeriod::from_millis(1500).to_string(), "1500ms");
    }

    #[test]
    fn pin_forms() {
        let a: Pin = serde_yaml::from_str("12").unwrap();
        let b: Pin = serde_yaml::from_str("GPIO12").unwrap();
        let c: Pin = serde_yaml::from_str("{number: GPIO12, inverted: true}").unwrap();
        assert_eq!(a.number, 12);
        assert_eq!(b.number, 12);
        assert!(c.inverted);
        assert!(serde_yaml::from_str::<Pin>("D9X").is_err());
    }

    #[test]
    fn esp8266_pin_rules() {
        assert!(Pin::output(12).check(Platform::Esp8266, PinUsage::Output).is_ok());
        assert!(Pin::output(7).check(Platform::Esp8266, PinUsage::Output).is_err());
        assert!(Pin::output(18).check(Platform::Esp8266, PinUsage::Output).is_err());
        let pulled = Pin {
            number: 16,
            inverted: false,
            mode: Some(PinMode { input: true, pullup: true, ..PinMode::default() }),
        };
        assert!(pulled.check(Platform::Esp8266, PinUsage::Input).is_err());
    }

    #[test]
    fn esp32_input_only_pins() {
        let pin = Pin { number: 35, inverted: false, mode: None };
        assert!(pin.check(Platform::Esp32, PinUsage::Input).is_ok());
        assert!(pin.check(Platform::Esp32, PinUsage::Output).is_err());
    }

    #[test]
    fn flags() {
        assert_eq!(PinMode::OUTPUT.flags_expr(), "gpio::Flags::FLAG_OUTPUT");
        let mode = PinMode { input: true, pullup: true, ..PinMode::default() };
        assert_eq!(mode.flags_expr(), "gpio::Flags::FLAG_INPUT | gpio::Flags::FLAG_PULLUP");
    }

    #[test]
    fn mac_address() {
        let mac: MacAddress = serde_yaml::from_str("\"AA:bb:0C:DD:EE:01\"").unwrap();
        assert_eq!(mac.to_string(), "AA:BB:0C:DD:EE:01");
        assert_eq!(mac.to_initializer(), "{0xAA, 0xBB, 0x0C, 0xDD, 0xEE, 0x01}");
        assert!(MacAddress::try_from("AA:BB".to_string()).is_err());
    }

    #[test]
    fn single_value_as_list() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "one_or_many")]
            ids: Vec<String>,
        }
        let one: Holder = serde_yaml::from_str("ids: relay_a").unwrap();
        let many: Holder = serde_yaml::from_str("ids: [relay_a, relay_b]").unwrap();
        assert_eq!(one.ids, vec!["relay_a"]);
        assert_eq!(many.ids.len(), 2);
    }

    #[test]
    fn icons() {
        assert!(check_icon("mdi:power-plug").is_ok());
        assert!(check_icon("power-plug").is_err());
        assert!(check_icon("mdi:").is_err());
    }
}
