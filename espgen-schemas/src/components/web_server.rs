//! `web_server:` block
//!
//! Version 1 pages load their stylesheet and script from `css_url`/`js_url`
//! at runtime. Versions 2 and 3 serve a small index page compiled into flash
//! that pulls in the frontend bundle.

use serde::Deserialize;

use super::{report_extra, Component, FinalContext};
use crate::codegen::{fnv1_hash, CodeGen, Expr};
use crate::config::Extra;
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::one_or_many;
use crate::validation::{IssueType, SchemaContext};
use crate::{ConfigError, ConfigResult};

/// Weight of entities and groups that do not set one
pub const DEFAULT_SORTING_WEIGHT: f64 = 50.0;

const WEB_SERVER_BASE_ID: &str = "web_server_base_id";

const UNSUPPORTED_KEYS: &[(&str, &str)] = &[
    ("css_include", "Embedding local stylesheets is not supported; host the file and use css_url instead."),
    ("js_include", "Embedding local scripts is not supported; host the file and use js_url instead."),
];

const OTA_ONLY_FALSE: &str = "The 'ota' option in 'web_server' only accepts 'false' to disable OTA. \
     To enable OTA, please use the new OTA platform structure instead:\n\n\
     ota:\n  - platform: web_server\n\n\
     See https://esphome.io/components/ota for more information.";

/// Kauf device the firmware is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KaufProduct {
    Plf10,
    Plf12,
    Rgbww,
    Rgbsw,
}

impl KaufProduct {
    /// Define selecting the product page
    pub const fn define(self) -> &'static str {
        match self {
            Self::Plf10 => "KAUF_PRODUCT_PLF10",
            Self::Plf12 => "KAUF_PRODUCT_PLF12",
            Self::Rgbww => "KAUF_PRODUCT_RGBWW",
            Self::Rgbsw => "KAUF_PRODUCT_RGBSW",
        }
    }

    /// Configuration spelling
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plf10 => "plf10",
            Self::Plf12 => "plf12",
            Self::Rgbww => "rgbww",
            Self::Rgbsw => "rgbsw",
        }
    }
}

/// Encoding of the bundled assets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    Br,
}

/// HTTP basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Auth {
    pub username: String,
    pub password: String,
}

/// Named section of the version 3 page
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortingGroup {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub sorting_weight: Option<f64>,
}

/// `web_server:` block
#[derive(Debug, Clone, Deserialize)]
pub struct WebServerConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_version")]
    pub version: u8,

    /// Filled with the version default during validation
    #[serde(default)]
    pub css_url: Option<String>,

    #[serde(default)]
    pub js_url: Option<String>,

    #[serde(default = "default_true")]
    pub enable_private_network_access: bool,

    #[serde(default)]
    pub auth: Option<Auth>,

    #[serde(default)]
    pub include_internal: bool,

    /// Only `false` is accepted
    #[serde(default)]
    pub ota: Option<bool>,

    #[serde(default = "default_true")]
    pub log: bool,

    #[serde(default)]
    pub sensor_4m: Option<bool>,

    #[serde(default)]
    pub product: Option<KaufProduct>,

    #[serde(default)]
    pub factory: bool,

    /// Entity shown at the top of the Kauf page
    #[serde(default)]
    pub featured_entity: Option<String>,

    #[serde(default)]
    pub local: Option<bool>,

    #[serde(default)]
    pub compression: Compression,

    #[serde(default, deserialize_with = "one_or_many")]
    pub sorting_groups: Vec<SortingGroup>,

    #[serde(flatten)]
    pub extra: Extra,
}

fn default_port() -> u16 {
    80
}

fn default_version() -> u8 {
    2
}

fn default_true() -> bool {
    true
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            id: None,
            port: default_port(),
            version: default_version(),
            css_url: None,
            js_url: None,
            enable_private_network_access: true,
            auth: None,
            include_internal: false,
            ota: None,
            log: true,
            sensor_4m: None,
            product: None,
            factory: false,
            featured_entity: None,
            local: None,
            compression: Compression::default(),
            sorting_groups: Vec::new(),
            extra: Extra::new(),
        }
    }
}

/// Frontend URLs a page version loads when none are given
fn default_urls(version: u8) -> (&'static str, &'static str) {
    match version {
        1 => (
            "https://oi.esphome.io/v1/webserver-v1.min.css",
            "https://oi.esphome.io/v1/webserver-v1.min.js",
        ),
        2 => ("", "https://oi.esphome.io/v2/www.js"),
        _ => ("", "https://oi.esphome.io/v3/www.js"),
    }
}

impl WebServerConfig {
    /// Index page served by versions 2 and 3
    pub fn index_html(&self) -> String {
        let mut html = String::from("<!DOCTYPE html><html><head><meta charset=UTF-8><link rel=icon href=data:>");
        if let Some(css) = self.css_url.as_deref().filter(|url| !url.is_empty()) {
            html.push_str(&format!("<link rel=stylesheet href=\"{css}\">"));
        }
        html.push_str("</head><body><esp-app></esp-app>");
        if let Some(js) = self.js_url.as_deref().filter(|url| !url.is_empty()) {
            html.push_str(&format!("<script src=\"{js}\"></script>"));
        }
        html.push_str("</body></html>");
        html
    }

    fn add_progmem(cg: &mut CodeGen, name: &str, content: &[u8]) {
        let bytes: Vec<String> = content.iter().map(u8::to_string).collect();
        cg.add_global(format!(
            "const uint8_t ESPHOME_WEBSERVER_{name}[{}] PROGMEM = {{{}}}",
            content.len(),
            bytes.join(", ")
        ));
        cg.add_global(format!("const size_t ESPHOME_WEBSERVER_{name}_SIZE = {}", content.len()));
    }
}

/// The shared HTTP server, created by whichever module needs it first
pub(crate) fn web_server_base(cg: &mut CodeGen) -> String {
    if cg.is_declared(WEB_SERVER_BASE_ID) {
        return WEB_SERVER_BASE_ID.to_string();
    }
    let base = cg.new_pvariable(WEB_SERVER_BASE_ID, "web_server_base::WebServerBase", vec![]);
    cg.register_component(&base);
    cg.add_define("USE_WEBSERVER_BASE");
    base
}

impl Component for WebServerConfig {
    fn domain(&self) -> &'static str {
        "web_server"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        let mut fields = vec![IdField::Declare {
            id: &mut self.id,
            kind: IdKind::WebServer,
            prefix: "web_server_webserver",
            path: path.clone(),
        }];
        for (i, group) in self.sorting_groups.iter().enumerate() {
            fields.push(IdField::Fixed {
                id: &group.id,
                kind: IdKind::SortingGroup,
                path: path.key("sorting_groups").index(i).key("id"),
            });
        }
        fields
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        if self.port == 0 {
            ctx.error(IssueType::OutOfRange, path.key("port"), "Port must be between 1 and 65535");
        }
        if !ctx.check_range(path.key("version"), self.version, 1, 3) {
            return;
        }

        let (css, js) = default_urls(self.version);
        self.css_url.get_or_insert_with(|| css.to_string());
        self.js_url.get_or_insert_with(|| js.to_string());

        if self.local.is_some() && self.version == 1 {
            ctx.error(IssueType::Conflict, path.key("local"), "'local' is not supported in version 1");
        }
        if !self.sorting_groups.is_empty() && self.version != 3 {
            ctx.error(
                IssueType::Conflict,
                path.key("sorting_groups"),
                "'sorting_groups' is only supported in 'web_server' version 3",
            );
        }
        if self.ota == Some(true) {
            ctx.error(IssueType::InvalidValue, path.key("ota"), OTA_ONLY_FALSE);
        }
        if let Some(auth) = &self.auth {
            let auth_path = path.key("auth");
            ctx.check_len(auth_path.key("username"), auth.username.len(), 1, usize::MAX, "username");
            ctx.check_len(auth_path.key("password"), auth.password.len(), 1, usize::MAX, "password");
        }
        report_extra(ctx, path, &self.extra, "web_server", UNSUPPORTED_KEYS);
    }

    fn final_validate(&self, ctx: &mut FinalContext<'_>, path: &ConfigPath) -> ConfigResult<()> {
        if self.version != 3 {
            for (entity_path, entity) in ctx.config.entities() {
                let Some(layout) = &entity.web_server else {
                    continue;
                };
                let key = if layout.sorting_weight.is_some() {
                    "sorting_weight"
                } else if layout.sorting_group_id.is_some() {
                    "sorting_group_id"
                } else {
                    continue;
                };
                return Err(ConfigError::invalid(
                    entity_path.key("web_server").key(key),
                    format!("{key} on entities is not supported in web_server version {}", self.version),
                ));
            }
        }

        if let Some(featured) = self.featured_entity.as_deref().filter(|name| !name.is_empty()) {
            let known = ctx.config.entity_names().iter().any(|(_, name)| *name == featured);
            if !known {
                return Err(ConfigError::invalid(
                    path.key("featured_entity"),
                    "'featured_entity' must match the name of an entity in the configuration",
                ));
            }
        }
        Ok(())
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.id, path)?;
        let base = web_server_base(cg);
        let var = cg.new_pvariable(id, "web_server::WebServer", vec![Expr::var(&base)]);
        cg.register_component(&var);

        cg.call(&base, "set_port", vec![self.port.into()]);
        cg.add_define("USE_WEBSERVER");
        cg.add_define_value("USE_WEBSERVER_PORT", self.port);
        cg.add_define_value("USE_WEBSERVER_VERSION", self.version);
        if self.version >= 2 {
            // served as-is, gzip barely shrinks a page this small
            Self::add_progmem(cg, "INDEX_HTML", self.index_html().as_bytes());
        } else {
            cg.call(&var, "set_css_url", vec![self.css_url.clone().unwrap_or_default().into()]);
            cg.call(&var, "set_js_url", vec![self.js_url.clone().unwrap_or_default().into()]);
        }

        if self.ota == Some(false) {
            cg.add_define("USE_WEBSERVER_OTA_DISABLED");
        }
        cg.call(&var, "set_expose_log", vec![self.log.into()]);
        if self.enable_private_network_access {
            cg.add_define("USE_WEBSERVER_PRIVATE_NETWORK_ACCESS");
        }
        if let Some(auth) = &self.auth {
            cg.add_define("USE_WEBSERVER_AUTH");
            cg.call(&base, "set_auth_username", vec![auth.username.as_str().into()]);
            cg.call(&base, "set_auth_password", vec![auth.password.as_str().into()]);
        }
        cg.call(&var, "set_include_internal", vec![self.include_internal.into()]);
        if self.local == Some(true) {
            cg.add_define("USE_WEBSERVER_LOCAL");
        }
        if self.compression == Compression::Gzip {
            cg.add_define("USE_WEBSERVER_GZIP");
        }

        if !self.sorting_groups.is_empty() {
            cg.add_define("USE_WEBSERVER_SORTING");
            for group in &self.sorting_groups {
                cg.call(
                    &var,
                    "add_sorting_group",
                    vec![
                        fnv1_hash(&group.id).into(),
                        group.name.as_str().into(),
                        group.sorting_weight.unwrap_or(DEFAULT_SORTING_WEIGHT).into(),
                    ],
                );
            }
        }

        if let Some(sensor_4m) = self.sensor_4m {
            cg.add_define_value("SENSOR_4M", sensor_4m);
        }
        if let Some(product) = self.product {
            cg.add_define(product.define());
        }
        if self.factory {
            cg.add_define("KAUF_FACTORY_FIRMWARE");
        }
        if let Some(featured) = &self.featured_entity {
            cg.call(&var, "set_featured_name", vec![featured.as_str().into()]);
        }

        cg.provide("web_server", &var);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use crate::validation::ValidationReport;
    use espgen_core::ValidationContext;

    fn validated(yaml: &str) -> (WebServerConfig, ValidationReport) {
        let mut config: WebServerConfig = serde_yaml::from_str(yaml).unwrap();
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(Platform::Esp8266, "plug", &mut report);
        config.validate(&mut ctx, &ConfigPath::section("web_server"));
        (config, report)
    }

    #[test]
    fn url_defaults_follow_version() {
        let (v1, _) = validated("{version: 1}");
        assert_eq!(v1.css_url.as_deref(), Some("https://oi.esphome.io/v1/webserver-v1.min.css"));
        let (v3, _) = validated("{version: 3, js_url: 'http://lan/app.js'}");
        assert_eq!(v3.css_url.as_deref(), Some(""));
        assert_eq!(v3.js_url.as_deref(), Some("http://lan/app.js"));
    }

    #[test]
    fn version_rules() {
        let (_, report) = validated(
            "{version: 1, local: true, ota: true, sorting_groups: [{id: g, name: Group}], css_include: a.css}",
        );
        let messages: Vec<&str> = report.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages[0], "'local' is not supported in version 1");
        assert_eq!(messages[1], "'sorting_groups' is only supported in 'web_server' version 3");
        assert!(messages[2].starts_with("The 'ota' option in 'web_server' only accepts 'false'"));
        assert_eq!(report.errors_of(IssueType::RemovedKey).count(), 1);
    }

    #[test]
    fn auth_needs_both_fields() {
        let (_, report) = validated("{auth: {username: admin, password: ''}}");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path.to_string(), "web_server.auth.password");
    }

    #[test]
    fn index_page() {
        let (config, _) = validated("{version: 2}");
        assert_eq!(
            config.index_html(),
            "<!DOCTYPE html><html><head><meta charset=UTF-8><link rel=icon href=data:></head><body>\
             <esp-app></esp-app><script src=\"https://oi.esphome.io/v2/www.js\"></script></body></html>"
        );
    }

    fn final_check(yaml: &str) -> ConfigResult<()> {
        let config = crate::load_str(yaml).unwrap();
        let mut report = ValidationReport::new();
        let web_server = config.web_server.clone().unwrap();
        let mut ctx = FinalContext::new(&config, Platform::Esp8266, ValidationContext::esp8266(0), &mut report);
        web_server.final_validate(&mut ctx, &ConfigPath::section("web_server"))
    }

    const DEVICE: &str = "
esphome:
  name: plug
esp8266:
  board: esp01_1m
switch:
  - platform: gpio
    name: Relay
    pin: GPIO12
    web_server:
      sorting_weight: 10
";

    #[test]
    fn entity_sorting_needs_version_3() {
        let err = final_check(&format!("{DEVICE}web_server:\n  version: 2\n")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "switch[0].web_server.sorting_weight: sorting_weight on entities is not supported in web_server version 2"
        );
        assert!(final_check(&format!("{DEVICE}web_server:\n  version: 3\n")).is_ok());
    }

    #[test]
    fn featured_entity_must_exist() {
        let ok = format!("{DEVICE}web_server:\n  version: 3\n  featured_entity: Relay\n");
        assert!(final_check(&ok).is_ok());
        let missing = format!("{DEVICE}web_server:\n  version: 3\n  featured_entity: Lamp\n");
        let err = final_check(&missing).unwrap_err();
        assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("web_server.featured_entity"));
    }

    #[test]
    fn emission() {
        let (mut config, report) = validated(
            "{version: 3, port: 8080, auth: {username: admin, password: pw}, product: plf12, factory: true, \
             sorting_groups: [{id: power, name: Power, sorting_weight: 5}], featured_entity: Relay, sensor_4m: true}",
        );
        assert!(report.is_valid(), "{}", report.summary());
        config.id = Some("web_server_webserver_id".into());
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        config.to_code(&mut cg, &ConfigPath::section("web_server")).unwrap();
        assert_eq!(cg.provided("web_server"), Some("web_server_webserver_id"));
        let program = cg.finish("plug", ValidationReport::new());
        let main = program.main_cpp();
        assert!(main.contains("web_server_webserver_id = new web_server::WebServer(web_server_base_id);"));
        assert!(main.contains("web_server_base_id->set_port(8080);"));
        assert!(main.contains("web_server_base_id->set_auth_username(\"admin\");"));
        assert!(main.contains("const uint8_t ESPHOME_WEBSERVER_INDEX_HTML["));
        assert!(main.contains(&format!("add_sorting_group({}, \"Power\", 5.0f);", Expr::from(fnv1_hash("power")))));
        assert!(main.contains("web_server_webserver_id->set_featured_name(\"Relay\");"));
        let defines = program.defines();
        assert_eq!(defines["USE_WEBSERVER_PORT"].as_deref(), Some("8080"));
        assert_eq!(defines["USE_WEBSERVER_VERSION"].as_deref(), Some("3"));
        assert_eq!(defines["SENSOR_4M"].as_deref(), Some("true"));
        assert!(defines.contains_key("KAUF_PRODUCT_PLF12"));
        assert!(defines.contains_key("KAUF_FACTORY_FIRMWARE"));
        assert!(defines.contains_key("USE_WEBSERVER_GZIP"));
    }
}
