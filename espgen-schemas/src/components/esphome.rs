//! `esphome:` block, the device identity

use serde::Deserialize;

use super::Component;
use crate::codegen::CodeGen;
use crate::path::ConfigPath;
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

const MAX_NAME_LEN: usize = 31;

/// Device identity
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Hostname, lowercase
    pub name: String,

    #[serde(default)]
    pub friendly_name: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,
}

impl Component for CoreConfig {
    fn domain(&self) -> &'static str {
        "esphome"
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        if self.name.is_empty() {
            ctx.error(IssueType::MissingField, path.key("name"), "Name must not be empty");
            return;
        }
        if self.name.len() > MAX_NAME_LEN {
            ctx.error(
                IssueType::OutOfRange,
                path.key("name"),
                format!("Name must be at most {MAX_NAME_LEN} characters long"),
            );
        }
        if let Some(bad) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_'))
        {
            ctx.error(
                IssueType::InvalidValue,
                path.key("name"),
                format!(
                    "Name contains invalid character '{bad}'. Allowed characters are lowercase letters, digits, '-' and '_'"
                ),
            );
        }
    }

    fn to_code(&self, cg: &mut CodeGen, _path: &ConfigPath) -> ConfigResult<()> {
        let friendly = self.friendly_name.as_deref().unwrap_or_default();
        let comment = self.comment.as_deref().unwrap_or_default();
        cg.call_on("App", "pre_setup", vec![self.name.as_str().into(), friendly.into(), comment.into()]);
        if let Some(friendly) = &self.friendly_name {
            cg.add_define_value("ESPHOME_FRIENDLY_NAME", friendly.as_str());
        }
        Ok(())
    }
}
