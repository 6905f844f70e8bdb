//! `light:` entities, `monochromatic` and `rgb` platforms
//!
//! A light state persists its on/off state, brightness, colour channels and
//! the active effect, so forced placement reserves [`Margin::LIGHT_STATE`].

use std::collections::BTreeSet;

use espgen_core::{Margin, PlacementRequest, Placed};
use serde::Deserialize;

use super::{emit_placement, report_extra, setup_entity, shared_references, validate_entity, Component};
use crate::codegen::{CodeGen, Expr};
use crate::config::{EntityConfig, Extra, ForcedPlacement};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{or_default, TimePeriod};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

/// What the light does at boot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightRestoreMode {
    #[default]
    RestoreDefaultOff,
    RestoreDefaultOn,
    AlwaysOff,
    AlwaysOn,
    RestoreInvertedDefaultOff,
    RestoreInvertedDefaultOn,
    RestoreAndOff,
    RestoreAndOn,
}

impl LightRestoreMode {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::RestoreDefaultOff => "light::LIGHT_RESTORE_DEFAULT_OFF",
            Self::RestoreDefaultOn => "light::LIGHT_RESTORE_DEFAULT_ON",
            Self::AlwaysOff => "light::LIGHT_ALWAYS_OFF",
            Self::AlwaysOn => "light::LIGHT_ALWAYS_ON",
            Self::RestoreInvertedDefaultOff => "light::LIGHT_RESTORE_INVERTED_DEFAULT_OFF",
            Self::RestoreInvertedDefaultOn => "light::LIGHT_RESTORE_INVERTED_DEFAULT_ON",
            Self::RestoreAndOff => "light::LIGHT_RESTORE_AND_OFF",
            Self::RestoreAndOn => "light::LIGHT_RESTORE_AND_ON",
        }
    }
}

/// How DDP packet brightness is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BrightnessScaling {
    Pixel,
    Strip,
    Packet,
    Multiply,
    None,
}

impl BrightnessScaling {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::Pixel => "ddp::DDP_SCALE_PIXEL",
            Self::Strip => "ddp::DDP_SCALE_STRIP",
            Self::Packet => "ddp::DDP_SCALE_PACKET",
            Self::Multiply => "ddp::DDP_SCALE_MULTIPLY",
            Self::None => "ddp::DDP_NO_SCALING",
        }
    }
}

/// `effects: - pulse:`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PulseEffect {
    pub name: String,
    pub transition_length: TimePeriod,
    pub update_interval: TimePeriod,
}

impl Default for PulseEffect {
    fn default() -> Self {
        Self {
            name: "Pulse".to_string(),
            transition_length: TimePeriod::from_secs(1),
            update_interval: TimePeriod::from_secs(1),
        }
    }
}

/// `effects: - ddp:`, colours streamed over the network
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DdpEffect {
    pub name: String,
    /// Receiver; the only `ddp` block when not written
    pub ddp_id: Option<String>,
    pub timeout: Option<TimePeriod>,
    pub disable_gamma: Option<bool>,
    pub brightness_scaling: Option<BrightnessScaling>,
}

impl Default for DdpEffect {
    fn default() -> Self {
        Self {
            name: "DDP".to_string(),
            ddp_id: None,
            timeout: None,
            disable_gamma: None,
            brightness_scaling: None,
        }
    }
}

/// One entry of `effects:`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectConfig {
    #[serde(deserialize_with = "or_default")]
    Pulse(PulseEffect),
    #[serde(deserialize_with = "or_default")]
    Ddp(DdpEffect),
}

impl EffectConfig {
    /// Name shown in the effect list
    pub fn name(&self) -> &str {
        match self {
            Self::Pulse(effect) => &effect.name,
            Self::Ddp(effect) => &effect.name,
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Pulse(_) => "pulse",
            Self::Ddp(_) => "ddp",
        }
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<String> {
        match self {
            Self::Pulse(effect) => {
                let id = cg.unique_id("light_pulselighteffect");
                let var = cg.new_pvariable(&id, "light::PulseLightEffect", vec![effect.name.as_str().into()]);
                let transition = effect.transition_length.as_millis();
                cg.call(&var, "set_transition_on_length", vec![transition.into()]);
                cg.call(&var, "set_transition_off_length", vec![transition.into()]);
                cg.call(&var, "set_update_interval", vec![effect.update_interval.as_millis().into()]);
                Ok(var)
            }
            Self::Ddp(effect) => {
                let parent = super::required_id(&effect.ddp_id, path)?;
                let id = cg.unique_id("ddp_ddplighteffect");
                let var = cg.new_pvariable(&id, "ddp::DDPLightEffect", vec![effect.name.as_str().into()]);
                cg.call(&var, "set_ddp", vec![Expr::var(parent)]);
                if let Some(timeout) = effect.timeout {
                    cg.call(&var, "set_timeout", vec![timeout.as_millis().into()]);
                }
                if let Some(disable) = effect.disable_gamma {
                    cg.call(&var, "set_disable_gamma", vec![disable.into()]);
                }
                if let Some(scaling) = effect.brightness_scaling {
                    cg.call(&var, "set_scaling_mode", vec![Expr::raw(scaling.cpp())]);
                }
                Ok(var)
            }
        }
    }
}

fn default_transition() -> TimePeriod {
    TimePeriod::from_secs(1)
}

fn default_gamma() -> f64 {
    2.8
}

/// Options of the light state shared by every light platform
#[derive(Debug, Clone, Deserialize)]
pub struct LightStateConfig {
    /// ID of the platform's output driver
    #[serde(default)]
    pub output_id: Option<String>,

    #[serde(default)]
    pub restore_mode: LightRestoreMode,

    #[serde(default = "default_transition")]
    pub default_transition_length: TimePeriod,

    #[serde(default = "default_gamma")]
    pub gamma_correct: f64,

    #[serde(default)]
    pub effects: Vec<EffectConfig>,
}

/// `light: - platform: monochromatic`
#[derive(Debug, Clone, Deserialize)]
pub struct MonochromaticLightConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    #[serde(flatten)]
    pub state: LightStateConfig,

    /// Float output driving the brightness
    pub output: String,

    #[serde(flatten)]
    pub placement: ForcedPlacement,

    #[serde(flatten)]
    pub extra: Extra,
}

/// `light: - platform: rgb`
#[derive(Debug, Clone, Deserialize)]
pub struct RgbLightConfig {
    #[serde(flatten)]
    pub entity: EntityConfig,

    #[serde(flatten)]
    pub state: LightStateConfig,

    pub red: String,
    pub green: String,
    pub blue: String,

    #[serde(flatten)]
    pub placement: ForcedPlacement,

    #[serde(flatten)]
    pub extra: Extra,
}

/// `light:` list entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum LightConfig {
    Monochromatic(MonochromaticLightConfig),
    Rgb(RgbLightConfig),
}

impl LightConfig {
    /// Shared entity options
    pub fn entity(&self) -> &EntityConfig {
        match self {
            Self::Monochromatic(config) => &config.entity,
            Self::Rgb(config) => &config.entity,
        }
    }

    /// Light state options
    pub fn state(&self) -> &LightStateConfig {
        match self {
            Self::Monochromatic(config) => &config.state,
            Self::Rgb(config) => &config.state,
        }
    }

    fn placement_fields(&self) -> &ForcedPlacement {
        match self {
            Self::Monochromatic(config) => &config.placement,
            Self::Rgb(config) => &config.placement,
        }
    }

    fn platform_name(&self) -> &'static str {
        match self {
            Self::Monochromatic(_) => "monochromatic",
            Self::Rgb(_) => "rgb",
        }
    }

    fn output_class(&self) -> &'static str {
        match self {
            Self::Monochromatic(_) => "monochromatic::MonochromaticLightOutput",
            Self::Rgb(_) => "rgb::RGBLightOutput",
        }
    }

    /// Output setters of the driver, with the output each one takes
    fn channels(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::Monochromatic(config) => vec![("set_output", config.output.as_str())],
            Self::Rgb(config) => vec![
                ("set_red", config.red.as_str()),
                ("set_green", config.green.as_str()),
                ("set_blue", config.blue.as_str()),
            ],
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

impl Placed for LightConfig {
    const MARGIN: Margin = Margin::LIGHT_STATE;

    fn placement(&self) -> PlacementRequest {
        self.placement_fields().request()
    }
}

fn light_id_fields<'a>(
    entity: &'a mut EntityConfig,
    state: &'a mut LightStateConfig,
    placement: &'a ForcedPlacement,
    channels: Vec<(&'static str, &'a str)>,
    platform: &'static str,
    output_prefix: &'static str,
    path: &ConfigPath,
) -> Vec<IdField<'a>> {
    let mut fields = vec![
        IdField::Declare { id: &mut entity.id, kind: IdKind::Light, prefix: platform, path: path.clone() },
        IdField::Declare {
            id: &mut state.output_id,
            kind: IdKind::LightOutput,
            prefix: output_prefix,
            path: path.key("output_id"),
        },
    ];
    for (key, output) in channels {
        fields.push(IdField::Reference { id: output, kind: IdKind::Output, path: path.key(key) });
    }
    for (i, effect) in state.effects.iter_mut().enumerate() {
        if let EffectConfig::Ddp(ddp) = effect {
            fields.push(IdField::Implicit {
                id: &mut ddp.ddp_id,
                kind: IdKind::Ddp,
                path: path.key("effects").index(i).key("ddp").key("ddp_id"),
            });
        }
    }
    fields.extend(shared_references(&entity.web_server, Some(placement), path));
    fields
}

impl Component for LightConfig {
    fn domain(&self) -> &'static str {
        "light"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        match self {
            Self::Monochromatic(c) => light_id_fields(
                &mut c.entity,
                &mut c.state,
                &c.placement,
                vec![("output", c.output.as_str())],
                "monochromatic_light",
                "monochromatic_monochromaticlightoutput",
                path,
            ),
            Self::Rgb(c) => light_id_fields(
                &mut c.entity,
                &mut c.state,
                &c.placement,
                vec![("red", c.red.as_str()), ("green", c.green.as_str()), ("blue", c.blue.as_str())],
                "rgb_light",
                "rgb_rgblightoutput",
                path,
            ),
        }
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        validate_entity(ctx, path, self.entity());
        let state = self.state();
        if !(state.gamma_correct >= 0.0) {
            ctx.error(
                IssueType::OutOfRange,
                path.key("gamma_correct"),
                format!("gamma_correct must be at least 0, got {}", state.gamma_correct),
            );
        }

        let mut names = BTreeSet::new();
        for (i, effect) in state.effects.iter().enumerate() {
            let effect_path = path.key("effects").index(i);
            if !names.insert(effect.name().to_string()) {
                ctx.error(
                    IssueType::Duplicate,
                    effect_path.key(effect.key()).key("name"),
                    format!(
                        "Found the effect name '{}' twice. All effects must have unique names",
                        effect.name()
                    ),
                );
            }
            if matches!(effect, EffectConfig::Ddp(_)) && matches!(self, Self::Monochromatic(_)) {
                ctx.error(
                    IssueType::InvalidValue,
                    effect_path.key("ddp"),
                    "The ddp effect needs a light with RGB channels",
                );
            }
        }

        let owner = format!("light.{}", self.platform_name());
        let extra = match self {
            Self::Monochromatic(c) => &c.extra,
            Self::Rgb(c) => &c.extra,
        };
        report_extra(ctx, path, extra, &owner, &[]);
    }

    fn forced_placement(&self) -> Option<(PlacementRequest, Margin)> {
        Some((Placed::placement(self), Self::MARGIN))
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let entity = self.entity();
        let state = self.state();
        let output_id = super::required_id(&state.output_id, &path.key("output_id"))?;
        let output = cg.new_pvariable(output_id, self.output_class(), vec![]);

        let id = super::required_id(&entity.id, path)?;
        let var = cg.new_pvariable(id, "light::LightState", vec![Expr::var(&output)]);
        cg.register_entity("light", &var);
        cg.register_component(&var);
        setup_entity(cg, &var, entity);
        cg.call(&var, "set_restore_mode", vec![Expr::raw(state.restore_mode.cpp())]);
        cg.call(
            &var,
            "set_default_transition_length",
            vec![state.default_transition_length.as_millis().into()],
        );
        cg.call(&var, "set_gamma_correct", vec![state.gamma_correct.into()]);

        let mut effects = Vec::with_capacity(state.effects.len());
        for (i, effect) in state.effects.iter().enumerate() {
            let effect_path = path.key("effects").index(i).key(effect.key());
            effects.push(Expr::var(effect.to_code(cg, &effect_path)?));
        }
        if !effects.is_empty() {
            cg.call(&var, "add_effects", vec![Expr::List(effects)]);
        }
        emit_placement(cg, &var, self.placement_fields());

        for (setter, channel) in self.channels() {
            cg.call(&output, setter, vec![Expr::var(channel)]);
        }
        cg.add_define("USE_LIGHT");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use crate::validation::ValidationReport;
    use espgen_core::{PlacementError, ValidationContext};

    const RGB: &str = "
platform: rgb
id: bulb
name: Bulb
red: pwm_r
green: pwm_g
blue: pwm_b
output_id: bulb_out
effects:
  - pulse:
  - ddp:
      ddp_id: receiver
      brightness_scaling: STRIP
forced_addr: 20
global_addr: alloc
";

    fn validate(config: &mut LightConfig) -> ValidationReport {
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(Platform::Esp8266, "dev", &mut report);
        config.validate(&mut ctx, &ConfigPath::section("light").index(0));
        report
    }

    #[test]
    fn defaults() {
        let config: LightConfig = serde_yaml::from_str("{platform: monochromatic, name: Lamp, output: pwm}").unwrap();
        let state = config.state();
        assert_eq!(state.restore_mode, LightRestoreMode::RestoreDefaultOff);
        assert_eq!(state.default_transition_length, TimePeriod::from_secs(1));
        assert_eq!(state.gamma_correct, 2.8);
        let LightConfig::Monochromatic(mono) = &config else { panic!("expected monochromatic") };
        assert!(mono.extra.is_empty());
    }

    #[test]
    fn light_margin_is_eleven() {
        let config: LightConfig = serde_yaml::from_str(RGB).unwrap();
        assert!(matches!(
            config.check_placement(&ValidationContext::esp8266(31)),
            Err(PlacementError::FrontierOverlap { forced_addr: 20, margin: 11, start_free: 31 })
        ));
        assert!(config.check_placement(&ValidationContext::esp8266(32)).is_ok());
    }

    #[test]
    fn rgb_emission() {
        let mut config: LightConfig = serde_yaml::from_str(RGB).unwrap();
        let report = validate(&mut config);
        assert!(report.is_valid(), "{}", report.summary());

        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        config.to_code(&mut cg, &ConfigPath::section("light").index(0)).unwrap();
        let program = cg.finish("dev", ValidationReport::new());
        let main = program.main_cpp();
        assert!(main.contains("bulb_out = new rgb::RGBLightOutput();"));
        assert!(main.contains("bulb = new light::LightState(bulb_out);"));
        assert!(main.contains("bulb->set_gamma_correct(2.8f);"));
        assert!(main.contains("light_pulselighteffect_id = new light::PulseLightEffect(\"Pulse\");"));
        assert!(main.contains("ddp_ddplighteffect_id = new ddp::DDPLightEffect(\"DDP\");"));
        assert!(main.contains("ddp_ddplighteffect_id->set_ddp(receiver);"));
        assert!(main.contains("ddp_ddplighteffect_id->set_scaling_mode(ddp::DDP_SCALE_STRIP);"));
        assert!(main.contains("bulb->add_effects({light_pulselighteffect_id, ddp_ddplighteffect_id});"));
        assert!(main.contains("bulb->set_forced_addr(20);"));
        assert!(main.contains("bulb_out->set_red(pwm_r);"));
        assert!(main.contains("bulb_out->set_blue(pwm_b);"));
    }

    #[test]
    fn duplicate_effect_names() {
        let mut config: LightConfig = serde_yaml::from_str(
            "{platform: rgb, name: Bulb, red: r, green: g, blue: b, effects: [{pulse: {name: Fx}}, {pulse: {name: Fx}}]}",
        )
        .unwrap();
        let report = validate(&mut config);
        assert_eq!(report.errors_of(IssueType::Duplicate).count(), 1);
    }

    #[test]
    fn ddp_needs_rgb() {
        let mut config: LightConfig =
            serde_yaml::from_str("{platform: monochromatic, name: Lamp, output: pwm, effects: [{ddp: {}}]}").unwrap();
        let report = validate(&mut config);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path.to_string(), "light[0].effects[0].ddp");
    }
}
