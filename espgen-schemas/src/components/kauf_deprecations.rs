//! `kauf_deprecations:` block
//!
//! Packages forward their old substitutions here. Every removed option that
//! shows up is an error carrying the YAML that replaces it. Anything else is
//! accepted and ignored, and the block emits no code.

use serde::Deserialize;

use super::{report_extra, Component};
use crate::codegen::CodeGen;
use crate::config::Extra;
use crate::path::ConfigPath;
use crate::validation::SchemaContext;
use crate::ConfigResult;

const DETAILS: &str = "https://github.com/KaufHA/common/DEPRECATED_SUBSTITUTIONS.md";

/// Removed option, what replaces it, and the replacement YAML with `{value}`
const REMOVED: &[(&str, &str, &str)] = &[
    ("disable_webserver", "'!remove'", "web_server: !remove"),
    ("light_restore_mode", "'!extend'", "light:\n  - id: !extend kauf_light\n    restore_mode: {value}"),
    ("default_button_config", "'!extend'", "select:\n  - id: !extend select_button\n    initial_option: {value}"),
    ("sub_reboot_timeout", "native ESPHome config", "api:\n  reboot_timeout: {value}"),
    ("sub_api_reboot_timeout", "native ESPHome config", "api:\n  reboot_timeout: {value}"),
    ("sub_ota_num_attempts", "native ESPHome config", "safe_mode:\n  num_attempts: {value}"),
    (
        "sub_default_transition_length",
        "'!extend'",
        "light:\n  - id: !extend kauf_light\n    default_transition_length: {value}",
    ),
    (
        "sub_warm_white_temp",
        "'!extend'",
        "light:\n  - id: !extend kauf_light\n    warm_white_color_temperature: {value}",
    ),
    (
        "sub_cold_white_temp",
        "'!extend'",
        "light:\n  - id: !extend kauf_light\n    cold_white_color_temperature: {value}",
    ),
];

/// `kauf_deprecations:` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeprecationsConfig {
    #[serde(flatten)]
    pub options: Extra,
}

/// Scalar as it was written, for pasting back into YAML
fn plain(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(text) => text.clone(),
        serde_yaml::Value::Number(number) => number.to_string(),
        serde_yaml::Value::Bool(flag) => flag.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other).map(|text| text.trim_end().to_string()).unwrap_or_default(),
    }
}

/// Error message for a removed option set to `value`
pub fn removal_hint(key: &str, value: &serde_yaml::Value) -> Option<String> {
    let (_, replacement, yaml) = REMOVED.iter().find(|(name, _, _)| *name == key)?;
    Some(format!(
        "'{key}' has been removed. Use {replacement} instead by removing the substitution and adding the following YAML.\n\n\
         {}\n\nMore details: {DETAILS}#{key}",
        yaml.replace("{value}", &plain(value))
    ))
}

impl Component for DeprecationsConfig {
    fn domain(&self) -> &'static str {
        "kauf_deprecations"
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        let hints: Vec<(&str, String)> = self
            .options
            .iter()
            .filter_map(|(key, value)| Some((key.as_str(), removal_hint(key, value)?)))
            .collect();
        if hints.is_empty() {
            return;
        }
        let removed: Extra = self
            .options
            .iter()
            .filter(|(key, _)| hints.iter().any(|(name, _)| name == key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let hints: Vec<(&str, &str)> = hints.iter().map(|(key, hint)| (*key, hint.as_str())).collect();
        report_extra(ctx, path, &removed, "kauf_deprecations", &hints);
    }

    fn to_code(&self, _cg: &mut CodeGen, _path: &ConfigPath) -> ConfigResult<()> {
        Ok(())
    }
}
