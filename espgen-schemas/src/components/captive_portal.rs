//! `captive_portal:` block

use serde::Deserialize;

use super::web_server::{web_server_base, Compression, KaufProduct};
use super::{report_extra, Component, FinalContext};
use crate::codegen::{CodeGen, Expr};
use crate::config::Extra;
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::Platform;
use crate::validation::{IssueType, SchemaContext};
use crate::{ConfigError, ConfigResult};

/// `captive_portal:` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptivePortalConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub compression: Compression,

    /// Must agree with `web_server.product`
    #[serde(default)]
    pub product: Option<KaufProduct>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Component for CaptivePortalConfig {
    fn domain(&self) -> &'static str {
        "captive_portal"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        vec![IdField::Declare {
            id: &mut self.id,
            kind: IdKind::CaptivePortal,
            prefix: "captive_portal_captiveportal",
            path: path.clone(),
        }]
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        report_extra(ctx, path, &self.extra, "captive_portal", &[]);
    }

    fn final_validate(&self, ctx: &mut FinalContext<'_>, path: &ConfigPath) -> ConfigResult<()> {
        let config = ctx.config;
        let Some(wifi) = &config.wifi else {
            return Err(ConfigError::invalid(
                path.clone(),
                "Captive portal requires the wifi component to be configured",
            ));
        };
        if wifi.ap.is_none() {
            ctx.warning(
                IssueType::MissingField,
                ConfigPath::section("wifi").key("ap"),
                "Captive portal is enabled but no WiFi AP is configured. \
                 The captive portal will not be accessible. \
                 Add 'ap:' to your WiFi configuration to enable the captive portal.",
            );
        }

        let web_product = config.web_server.as_ref().and_then(|ws| ws.product);
        if let (Some(ours), Some(theirs)) = (self.product, web_product) {
            if ours != theirs {
                return Err(ConfigError::invalid(
                    path.key("product"),
                    format!(
                        "captive_portal product '{}' conflicts with web_server product '{}'.",
                        ours.as_str(),
                        theirs.as_str()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.id, path)?;
        let base = web_server_base(cg);
        let var = cg.new_pvariable(id, "captive_portal::CaptivePortal", vec![Expr::var(&base)]);
        cg.register_component(&var);
        cg.add_define("USE_CAPTIVE_PORTAL");
        if self.compression == Compression::Gzip {
            cg.add_define("USE_CAPTIVE_PORTAL_GZIP");
        }
        if let Some(product) = self.product {
            cg.add_define(product.define());
        }
        if cg.platform() == Platform::Esp8266 {
            cg.add_library("DNSServer", None);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationReport;
    use espgen_core::ValidationContext;

    const BASE: &str = "
esphome:
  name: plug
esp8266:
  board: esp01_1m
";

    fn final_check(yaml: &str) -> (ConfigResult<()>, ValidationReport) {
        let config = crate::load_str(&format!("{BASE}{yaml}")).unwrap();
        let mut report = ValidationReport::new();
        let portal = config.captive_portal.clone().unwrap();
        let result = {
            let mut ctx = FinalContext::new(&config, Platform::Esp8266, ValidationContext::esp8266(0), &mut report);
            portal.final_validate(&mut ctx, &ConfigPath::section("captive_portal"))
        };
        (result, report)
    }

    #[test]
    fn requires_wifi() {
        let (result, _) = final_check("captive_portal:\n");
        assert!(result.unwrap_err().to_string().contains("requires the wifi component"));
    }

    #[test]
    fn warns_without_access_point() {
        let (result, report) = final_check("wifi:\n  ssid: home\ncaptive_portal:\n");
        assert!(result.is_ok());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].path.to_string(), "wifi.ap");

        let (_, report) = final_check("wifi:\n  ssid: home\n  ap:\ncaptive_portal:\n");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn product_must_agree_with_web_server() {
        let yaml = "wifi:\n  ap: {}\nweb_server:\n  product: plf10\ncaptive_portal:\n  product: rgbww\n";
        let (result, _) = final_check(yaml);
        assert_eq!(
            result.unwrap_err().to_string(),
            "captive_portal.product: captive_portal product 'rgbww' conflicts with web_server product 'plf10'."
        );
        let same = "wifi:\n  ap: {}\nweb_server:\n  product: plf10\ncaptive_portal:\n  product: plf10\n";
        assert!(final_check(same).0.is_ok());
    }

    #[test]
    fn shares_the_web_server_base() {
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        let first = web_server_base(&mut cg);
        let portal = CaptivePortalConfig { id: Some("portal".into()), ..CaptivePortalConfig::default() };
        portal.to_code(&mut cg, &ConfigPath::section("captive_portal")).unwrap();
        let program = cg.finish("plug", ValidationReport::new());
        let main = program.main_cpp();
        assert_eq!(main.matches("new web_server_base::WebServerBase()").count(), 1);
        assert!(main.contains(&format!("portal = new captive_portal::CaptivePortal({first});")));
        assert!(program.defines().contains_key("USE_CAPTIVE_PORTAL_GZIP"));
        assert!(program.libraries().contains_key("DNSServer"));
    }
}
