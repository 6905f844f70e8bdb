//! `ddp:` receiver for the light effect of the same name

use serde::Deserialize;

use super::{report_extra, Component, FinalContext};
use crate::codegen::CodeGen;
use crate::config::Extra;
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::TimePeriod;
use crate::validation::SchemaContext;
use crate::{ConfigError, ConfigResult};

/// `ddp:` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DdpConfig {
    #[serde(default)]
    pub id: Option<String>,

    /// How often packet statistics are logged; `0s` disables them
    #[serde(default)]
    pub stats_interval: TimePeriod,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Component for DdpConfig {
    fn domain(&self) -> &'static str {
        "ddp"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        vec![IdField::Declare { id: &mut self.id, kind: IdKind::Ddp, prefix: "ddp_ddpcomponent", path: path.clone() }]
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        report_extra(ctx, path, &self.extra, "ddp", &[]);
    }

    fn final_validate(&self, ctx: &mut FinalContext<'_>, path: &ConfigPath) -> ConfigResult<()> {
        if ctx.config.wifi.is_none() {
            return Err(ConfigError::invalid(path.clone(), "Component ddp requires component wifi"));
        }
        Ok(())
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.id, path)?;
        let var = cg.new_pvariable(id, "ddp::DDPComponent", vec![]);
        cg.register_component(&var);
        cg.call(&var, "set_stats_interval", vec![self.stats_interval.as_millis().into()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use crate::validation::ValidationReport;
    use espgen_core::ValidationContext;

    #[test]
    fn needs_wifi() {
        let config = crate::load_str("esphome: {name: plug}\nesp8266: {board: esp01_1m}\nddp:\n").unwrap();
        let mut report = ValidationReport::new();
        let mut ctx = FinalContext::new(&config, Platform::Esp8266, ValidationContext::esp8266(0), &mut report);
        let ddp = config.ddp.as_ref().unwrap();
        let err = ddp.final_validate(&mut ctx, &ConfigPath::section("ddp")).unwrap_err();
        assert_eq!(err.to_string(), "ddp: Component ddp requires component wifi");
    }

    #[test]
    fn emission() {
        let ddp: DdpConfig = serde_yaml::from_str("{id: ddp_rx, stats_interval: 30s}").unwrap();
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        ddp.to_code(&mut cg, &ConfigPath::section("ddp")).unwrap();
        let program = cg.finish("plug", ValidationReport::new());
        assert!(program.main_cpp().contains("ddp_rx = new ddp::DDPComponent();"));
        assert!(program.main_cpp().contains("ddp_rx->set_stats_interval(30000);"));
    }
}
