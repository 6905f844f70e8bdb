//! Float outputs driving lights: `esp8266_pwm` and `ledc`

use serde::Deserialize;

use super::platform::WAVEFORM_FEATURE;
use super::{pin_expression, validate_pin, Component};
use crate::codegen::{CodeGen, Expr};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{Pin, PinUsage, Platform};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

/// PWM frequency in Hz, written as `1000`, `1000Hz` or `1kHz`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawFrequency")]
pub struct Frequency(pub f64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrequency {
    Number(f64),
    Text(String),
}

impl TryFrom<RawFrequency> for Frequency {
    type Error = String;

    fn try_from(raw: RawFrequency) -> Result<Self, Self::Error> {
        let hz = match raw {
            RawFrequency::Number(hz) => hz,
            RawFrequency::Text(text) => {
                let trimmed = text.trim();
                let (number, scale) = if let Some(n) = trimmed.strip_suffix("kHz") {
                    (n, 1_000.0)
                } else if let Some(n) = trimmed.strip_suffix("Hz") {
                    (n, 1.0)
                } else {
                    (trimmed, 1.0)
                };
                let value: f64 = number
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid frequency '{text}', expected a value like '1000Hz'"))?;
                value * scale
            }
        };
        if !(hz.is_finite() && hz > 0.0) {
            return Err(format!("Frequency must be positive, got {hz}"));
        }
        Ok(Self(hz))
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self(1_000.0)
    }
}

/// Options shared by both output platforms
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PwmOutputConfig {
    pub id: String,

    pub pin: Pin,

    #[serde(default)]
    pub frequency: Frequency,

    #[serde(default)]
    pub inverted: bool,
}

/// `output:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum OutputConfig {
    Esp8266Pwm(PwmOutputConfig),
    Ledc(PwmOutputConfig),
}

impl OutputConfig {
    /// As a module
    pub fn as_component(&self) -> &dyn Component {
        self
    }

    /// As a mutable module
    pub fn as_component_mut(&mut self) -> &mut dyn Component {
        self
    }

    fn inner(&self) -> &PwmOutputConfig {
        match self {
            Self::Esp8266Pwm(config) | Self::Ledc(config) => config,
        }
    }

    fn inner_mut(&mut self) -> &mut PwmOutputConfig {
        match self {
            Self::Esp8266Pwm(config) | Self::Ledc(config) => config,
        }
    }

    fn required_platform(&self) -> (Platform, &'static str) {
        match self {
            Self::Esp8266Pwm(_) => (Platform::Esp8266, "esp8266_pwm"),
            Self::Ledc(_) => (Platform::Esp32, "ledc"),
        }
    }
}

impl Component for OutputConfig {
    fn domain(&self) -> &'static str {
        "output"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        vec![IdField::Fixed { id: &self.inner_mut().id, kind: IdKind::Output, path: path.key("id") }]
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        let (platform, name) = self.required_platform();
        if ctx.platform != platform {
            ctx.error(
                IssueType::PlatformMismatch,
                path.key("platform"),
                format!("{name} is only available on {platform}"),
            );
            return;
        }
        validate_pin(ctx, path.key("pin"), &self.inner().pin, PinUsage::Output);
    }

    fn to_code(&self, cg: &mut CodeGen, _path: &ConfigPath) -> ConfigResult<()> {
        let config = self.inner();
        let pin = pin_expression(cg, &config.pin, PinUsage::Output);
        let class = match self {
            Self::Esp8266Pwm(_) => {
                cg.require_feature(WAVEFORM_FEATURE);
                "esp8266_pwm::ESP8266PWM"
            }
            Self::Ledc(_) => "ledc::LEDCOutput",
        };
        let var = cg.new_pvariable(&config.id, class, vec![Expr::var(pin)]);
        cg.register_component(&var);
        if config.inverted {
            cg.call(&var, "set_inverted", vec![true.into()]);
        }
        cg.call(&var, "set_frequency", vec![config.frequency.0.into()]);
        Ok(())
    }
}
