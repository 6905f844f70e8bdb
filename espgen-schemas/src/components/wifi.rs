//! `wifi:` station networks, fallback access point and radio options
//!
//! The WiFi component saves credentials and the fast-connect block, so its
//! forced placement reserves [`Margin::WIFI`].

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use espgen_core::{Margin, PlacementRequest, Placed};
use serde::Deserialize;

use super::automation::{emit_automation, Action};
use super::{emit_placement, report_extra, Component, FinalContext};
use crate::codegen::{CodeGen, Expr, Statement};
use crate::config::{Extra, ForcedPlacement};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{one_or_many, present, MacAddress, Platform, TimePeriod};
use crate::validation::{IssueType, SchemaContext};
use crate::{ConfigError, ConfigResult};

/// Networks are indexed by an `int8_t` in the firmware
const MAX_NETWORKS: usize = 127;
const MAX_SSID_LEN: usize = 32;

const REMOVED_KEYS: &[(&str, &str)] = &[(
    "enable_mdns",
    "This option has been removed. Please use the [disabled] option under the new mdns component instead.",
)];

const MIN_AUTH_MODE_WARNING: &str = "The minimum WiFi authentication mode (wifi -> min_auth_mode) is not set. \
     Currently defaults to WPA (less secure), but will change to WPA2 (more secure) in 2026.6.0. \
     To silence this warning, explicitly set min_auth_mode under 'wifi:'.";

/// Static IP settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualIp {
    pub static_ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,

    #[serde(default = "unspecified")]
    pub dns1: Ipv4Addr,

    #[serde(default = "unspecified")]
    pub dns2: Ipv4Addr,
}

fn unspecified() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn ip_expr(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("network::IPAddress({a}, {b}, {c}, {d})")
}

impl ManualIp {
    fn to_initializer(&self) -> Expr {
        Expr::raw(format!(
            "wifi::ManualIP{{.static_ip = {}, .gateway = {}, .subnet = {}, .dns1 = {}, .dns2 = {}}}",
            ip_expr(self.static_ip),
            ip_expr(self.gateway),
            ip_expr(self.subnet),
            ip_expr(self.dns1),
            ip_expr(self.dns2),
        ))
    }
}

/// One station network
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WifiNetwork {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub ssid: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub bssid: Option<MacAddress>,

    #[serde(default)]
    pub hidden: Option<bool>,

    #[serde(default)]
    pub channel: Option<u8>,

    #[serde(default)]
    pub priority: i16,

    #[serde(default)]
    pub manual_ip: Option<ManualIp>,
}

fn default_ap_timeout() -> TimePeriod {
    TimePeriod::from_secs(90)
}

/// Fallback access point
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessPoint {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub ssid: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub channel: Option<u8>,

    #[serde(default)]
    pub manual_ip: Option<ManualIp>,

    #[serde(default = "default_ap_timeout")]
    pub ap_timeout: TimePeriod,
}

impl Default for AccessPoint {
    fn default() -> Self {
        Self { id: None, ssid: None, password: None, channel: None, manual_ip: None, ap_timeout: default_ap_timeout() }
    }
}

/// Radio power saving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerSaveMode {
    None,
    Light,
    High,
}

impl PowerSaveMode {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::None => "wifi::WIFI_POWER_SAVE_NONE",
            Self::Light => "wifi::WIFI_POWER_SAVE_LIGHT",
            Self::High => "wifi::WIFI_POWER_SAVE_HIGH",
        }
    }
}

/// Weakest encryption accepted from an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MinAuthMode {
    Wpa,
    Wpa2,
    Wpa3,
}

impl MinAuthMode {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::Wpa => "wifi::WIFI_MIN_AUTH_MODE_WPA",
            Self::Wpa2 => "wifi::WIFI_MIN_AUTH_MODE_WPA2",
            Self::Wpa3 => "wifi::WIFI_MIN_AUTH_MODE_WPA3",
        }
    }
}

/// 802.11 PHY mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhyMode {
    #[default]
    N,
    G,
    B,
}

impl PhyMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::N => "n",
            Self::G => "g",
            Self::B => "b",
        }
    }
}

/// Transmit power in dB, written as `17` or `17dB`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawDecibel")]
pub struct Decibel(pub f64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecibel {
    Number(f64),
    Text(String),
}

impl TryFrom<RawDecibel> for Decibel {
    type Error = String;

    fn try_from(raw: RawDecibel) -> Result<Self, Self::Error> {
        match raw {
            RawDecibel::Number(db) => Ok(Self(db)),
            RawDecibel::Text(text) => {
                let number = text.trim().trim_end_matches("dBm").trim_end_matches("dB").trim();
                number
                    .parse()
                    .map(Self)
                    .map_err(|_| format!("Invalid decibel value '{text}', expected a value like '17dB'"))
            }
        }
    }
}

/// `wifi:` block
#[derive(Debug, Clone, Deserialize)]
pub struct WifiConfig {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "one_or_many")]
    pub networks: Vec<WifiNetwork>,

    /// Single network shorthand, merged into `networks`
    #[serde(default)]
    pub ssid: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Applies to every network without its own
    #[serde(default)]
    pub manual_ip: Option<ManualIp>,

    #[serde(default, deserialize_with = "present")]
    pub ap: Option<AccessPoint>,

    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_reboot_timeout")]
    pub reboot_timeout: TimePeriod,

    /// Platform default when not written
    #[serde(default)]
    pub power_save_mode: Option<PowerSaveMode>,

    #[serde(default)]
    pub fast_connect: bool,

    /// Derived from the device name, domain and static IPs when not written
    #[serde(default)]
    pub use_address: Option<String>,

    #[serde(default)]
    pub min_auth_mode: Option<MinAuthMode>,

    #[serde(default)]
    pub output_power: Option<Decibel>,

    #[serde(default)]
    pub passive_scan: bool,

    #[serde(default = "default_true")]
    pub enable_on_boot: bool,

    #[serde(default)]
    pub on_connect: Vec<Action>,

    #[serde(default)]
    pub on_disconnect: Vec<Action>,

    #[serde(default)]
    pub disable_scanning: bool,

    /// Drop the shorthand network when `networks` is given
    #[serde(default)]
    pub only_networks: bool,

    #[serde(default)]
    pub phy_mode: PhyMode,

    #[serde(flatten)]
    pub placement: ForcedPlacement,

    #[serde(flatten)]
    pub extra: Extra,
}

fn default_domain() -> String {
    ".local".to_string()
}

fn default_reboot_timeout() -> TimePeriod {
    TimePeriod::from_secs(15 * 60)
}

fn default_true() -> bool {
    true
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            id: None,
            networks: Vec::new(),
            ssid: None,
            password: None,
            manual_ip: None,
            ap: None,
            domain: default_domain(),
            reboot_timeout: default_reboot_timeout(),
            power_save_mode: None,
            fast_connect: false,
            use_address: None,
            min_auth_mode: None,
            output_power: None,
            passive_scan: false,
            enable_on_boot: true,
            on_connect: Vec::new(),
            on_disconnect: Vec::new(),
            disable_scanning: false,
            only_networks: false,
            phy_mode: PhyMode::default(),
            placement: ForcedPlacement::default(),
            extra: Extra::new(),
        }
    }
}

fn check_ssid(ctx: &mut SchemaContext<'_>, path: ConfigPath, ssid: &str) {
    if ssid.is_empty() {
        ctx.error(IssueType::InvalidValue, path, "SSID can't be empty.");
    } else if ssid.len() > MAX_SSID_LEN {
        ctx.error(IssueType::OutOfRange, path, format!("SSID can't be longer than {MAX_SSID_LEN} characters"));
    }
}

fn check_password(ctx: &mut SchemaContext<'_>, path: ConfigPath, password: &str) {
    if password.is_empty() {
        return;
    }
    if password.len() < 8 {
        ctx.error(IssueType::OutOfRange, path, "WPA password must be at least 8 characters long");
    } else if password.len() > 64 {
        ctx.error(IssueType::OutOfRange, path, "WPA password must be at most 64 characters long");
    }
}

fn check_channel(ctx: &mut SchemaContext<'_>, path: ConfigPath, channel: Option<u8>) {
    match channel {
        Some(0) => ctx.error(IssueType::OutOfRange, path, "Minimum WiFi channel is 1"),
        Some(c) if c > 14 => ctx.error(IssueType::OutOfRange, path, "Maximum WiFi channel is 14"),
        _ => {}
    }
}

fn check_network(ctx: &mut SchemaContext<'_>, path: &ConfigPath, network: &WifiNetwork) {
    if let Some(ssid) = &network.ssid {
        check_ssid(ctx, path.key("ssid"), ssid);
    }
    if let Some(password) = &network.password {
        check_password(ctx, path.key("password"), password);
    }
    check_channel(ctx, path.key("channel"), network.channel);
    ctx.check_range(path.key("priority"), network.priority, -128, 127);
}

impl WifiConfig {
    /// Every static IP a station network would use
    fn static_ips(&self) -> BTreeSet<Ipv4Addr> {
        self.networks.iter().filter_map(|n| n.manual_ip.map(|ip| ip.static_ip)).collect()
    }

    fn uses_manual_ip(&self) -> bool {
        self.manual_ip.is_some()
            || self.networks.iter().any(|n| n.manual_ip.is_some())
            || self.ap.as_ref().is_some_and(|ap| ap.manual_ip.is_some())
    }

    /// Fold the `ssid`/`password` shorthand into `networks`
    fn merge_shorthand(&mut self) {
        let Some(ssid) = self.ssid.take() else {
            return;
        };
        let network = WifiNetwork { ssid: Some(ssid), password: self.password.take(), ..WifiNetwork::default() };
        if self.networks.is_empty() || !self.only_networks {
            self.networks.push(network);
        }
    }

    fn derive_use_address(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        if self.use_address.is_some() {
            return;
        }
        let address = if let Some(manual) = &self.manual_ip {
            manual.static_ip.to_string()
        } else {
            let ips = self.static_ips();
            match ips.len() {
                0 => format!("{}{}", ctx.device_name, self.domain),
                1 => ips.iter().map(Ipv4Addr::to_string).collect(),
                _ => {
                    ctx.error(
                        IssueType::MissingField,
                        path.key("use_address"),
                        "Must specify use_address when using multiple static IP addresses.",
                    );
                    return;
                }
            }
        };
        self.use_address = Some(address);
    }

    fn emit_network(
        &self,
        cg: &mut CodeGen,
        local: &str,
        network: &WifiNetwork,
        manual_ip: Option<&ManualIp>,
    ) {
        if let Some(ssid) = &network.ssid {
            cg.call_on(local, "set_ssid", vec![ssid.as_str().into()]);
        }
        if let Some(password) = &network.password {
            cg.call_on(local, "set_password", vec![password.as_str().into()]);
        }
        if let Some(bssid) = network.bssid {
            cg.call_on(local, "set_bssid", vec![Expr::raw(bssid.to_initializer())]);
        }
        if let Some(hidden) = network.hidden {
            cg.call_on(local, "set_hidden", vec![hidden.into()]);
        }
        if let Some(channel) = network.channel {
            cg.call_on(local, "set_channel", vec![channel.into()]);
        }
        if let Some(ip) = manual_ip {
            cg.call_on(local, "set_manual_ip", vec![ip.to_initializer()]);
        }
        cg.call_on(local, "set_priority", vec![Expr::Int(i64::from(network.priority))]);
    }
}

impl Placed for WifiConfig {
    const MARGIN: Margin = Margin::WIFI;

    fn placement(&self) -> PlacementRequest {
        self.placement.request()
    }
}

impl Component for WifiConfig {
    fn domain(&self) -> &'static str {
        "wifi"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        let mut fields = vec![IdField::Declare {
            id: &mut self.id,
            kind: IdKind::Wifi,
            prefix: "wifi_wificomponent",
            path: path.clone(),
        }];
        for (i, network) in self.networks.iter().enumerate() {
            if let Some(id) = &network.id {
                fields.push(IdField::Fixed { id, kind: IdKind::WifiAp, path: path.key("networks").index(i).key("id") });
            }
        }
        if let Some(id) = self.ap.as_ref().and_then(|ap| ap.id.as_deref()) {
            fields.push(IdField::Fixed { id, kind: IdKind::WifiAp, path: path.key("ap").key("id") });
        }
        if let Some(global) = self.placement.global_addr.as_deref() {
            fields.push(IdField::Reference { id: global, kind: IdKind::Globals, path: path.key("global_addr") });
        }
        fields
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        if self.password.is_some() && self.ssid.is_none() {
            ctx.error(IssueType::MissingField, path.key("ssid"), "Cannot have WiFi password without SSID!");
        }
        if let Some(ssid) = &self.ssid {
            check_ssid(ctx, path.key("ssid"), ssid);
        }
        if let Some(password) = &self.password {
            check_password(ctx, path.key("password"), password);
        }
        ctx.check_len(path.key("networks"), self.networks.len(), 0, MAX_NETWORKS, "networks");
        for (i, network) in self.networks.iter().enumerate() {
            check_network(ctx, &path.key("networks").index(i), network);
        }
        if let Some(ap) = &self.ap {
            let ap_path = path.key("ap");
            if let Some(ssid) = &ap.ssid {
                check_ssid(ctx, ap_path.key("ssid"), ssid);
            }
            if let Some(password) = &ap.password {
                check_password(ctx, ap_path.key("password"), password);
            }
            check_channel(ctx, ap_path.key("channel"), ap.channel);
        }
        if let Some(power) = self.output_power {
            ctx.check_range(path.key("output_power"), power.0, 8.5, 20.5);
        }

        match ctx.platform {
            Platform::Esp8266 => {
                self.power_save_mode.get_or_insert(PowerSaveMode::None);
                self.output_power.get_or_insert(Decibel(17.0));
                if self.min_auth_mode.is_none() {
                    ctx.warning(IssueType::Deprecation, path.key("min_auth_mode"), MIN_AUTH_MODE_WARNING);
                    self.min_auth_mode = Some(MinAuthMode::Wpa);
                }
            }
            Platform::Esp32 => {
                self.power_save_mode.get_or_insert(PowerSaveMode::Light);
                self.min_auth_mode.get_or_insert(MinAuthMode::Wpa2);
            }
        }

        self.merge_shorthand();
        if self.fast_connect && self.networks.is_empty() {
            ctx.error(IssueType::MissingField, path.key("fast_connect"), "At least one network required for fast_connect!");
        }
        self.derive_use_address(ctx, path);
        report_extra(ctx, path, &self.extra, "wifi", REMOVED_KEYS);
    }

    fn forced_placement(&self) -> Option<(PlacementRequest, Margin)> {
        Some((Placed::placement(self), Self::MARGIN))
    }

    fn final_validate(&self, ctx: &mut FinalContext<'_>, path: &ConfigPath) -> ConfigResult<()> {
        if self.networks.is_empty() && self.ap.is_none() {
            return Err(ConfigError::invalid(
                path.clone(),
                "Please specify at least an SSID or an Access Point to create.",
            ));
        }
        if let Some(esp32) = &ctx.config.esp32 {
            if !esp32.variant.has_wifi() {
                return Err(ConfigError::invalid(
                    path.clone(),
                    format!("WiFi requires component esp32_hosted on {}", esp32.variant.display_name()),
                ));
            }
        }
        super::check_forced_placement(self, ctx, path)
    }

    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()> {
        let id = super::required_id(&self.id, path)?;
        let var = cg.new_pvariable(id, "wifi::WiFiComponent", vec![]);
        if let Some(address) = &self.use_address {
            cg.call(&var, "set_use_address", vec![address.as_str().into()]);
        }

        if !self.networks.is_empty() {
            cg.call(&var, "init_sta", vec![self.networks.len().into()]);
        }
        for network in &self.networks {
            let manual_ip = network.manual_ip.as_ref().or(self.manual_ip.as_ref());
            cg.block(|cg| {
                let local = match &network.id {
                    Some(id) => {
                        cg.add(Statement::Local { id: id.clone(), class: "wifi::WiFiAP".into() });
                        id.clone()
                    }
                    None => cg.local("wifi::WiFiAP", "wifi_wifiap"),
                };
                self.emit_network(cg, &local, network, manual_ip);
                cg.call(&var, "add_sta", vec![Expr::var(&local)]);
                Ok(())
            })?;
        }

        if let Some(ap) = &self.ap {
            let as_network = WifiNetwork {
                id: ap.id.clone(),
                ssid: ap.ssid.clone(),
                password: ap.password.clone(),
                channel: ap.channel,
                ..WifiNetwork::default()
            };
            cg.block(|cg| {
                let local = cg.local("wifi::WiFiAP", "wifi_wifiap");
                self.emit_network(cg, &local, &as_network, ap.manual_ip.as_ref());
                cg.call(&var, "set_ap", vec![Expr::var(&local)]);
                Ok(())
            })?;
            cg.call(&var, "set_ap_timeout", vec![ap.ap_timeout.as_millis().into()]);
            cg.add_define("USE_WIFI_AP");
        }
        if self.uses_manual_ip() {
            cg.add_define("USE_WIFI_MANUAL_IP");
        }

        cg.call(&var, "set_reboot_timeout", vec![self.reboot_timeout.as_millis().into()]);
        if let Some(mode) = self.power_save_mode {
            cg.call(&var, "set_power_save_mode", vec![Expr::raw(mode.cpp())]);
        }
        if let Some(mode) = self.min_auth_mode {
            cg.call(&var, "set_min_auth_mode", vec![Expr::raw(mode.cpp())]);
        }
        if self.fast_connect {
            cg.add_define("USE_WIFI_FAST_CONNECT");
        }
        cg.call(&var, "set_passive_scan", vec![self.passive_scan.into()]);
        if let Some(power) = self.output_power {
            cg.call(&var, "set_output_power", vec![power.0.into()]);
        }
        cg.call(&var, "set_enable_on_boot", vec![self.enable_on_boot.into()]);
        if cg.platform() == Platform::Esp8266 {
            cg.add_library("ESP8266WiFi", None);
        }
        cg.add_define("USE_WIFI");
        cg.register_component(&var);

        emit_automation(cg, Expr::raw(format!("{var}->get_connect_trigger()")), "", "", &self.on_connect);
        emit_automation(cg, Expr::raw(format!("{var}->get_disconnect_trigger()")), "", "", &self.on_disconnect);

        emit_placement(cg, &var, &self.placement);
        cg.call(&var, "set_disable_scanning", vec![self.disable_scanning.into()]);
        cg.call(&var, "set_phy_mode", vec![self.phy_mode.as_str().into()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationReport;
    use espgen_core::{PlacementError, ValidationContext};

    fn validated(yaml: &str, platform: Platform) -> (WifiConfig, ValidationReport) {
        let mut config: WifiConfig = serde_yaml::from_str(yaml).unwrap();
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(platform, "plug", &mut report);
        config.validate(&mut ctx, &ConfigPath::section("wifi"));
        (config, report)
    }

    #[test]
    fn shorthand_is_appended() {
        let (config, report) = validated(
            "{ssid: home, password: secretpass, networks: [{ssid: office}], min_auth_mode: WPA2}",
            Platform::Esp8266,
        );
        assert!(report.is_valid(), "{}", report.summary());
        let ssids: Vec<_> = config.networks.iter().map(|n| n.ssid.as_deref().unwrap()).collect();
        assert_eq!(ssids, ["office", "home"]);
        assert_eq!(config.use_address.as_deref(), Some("plug.local"));
    }

    #[test]
    fn only_networks_drops_shorthand() {
        let (config, _) = validated(
            "{ssid: home, networks: [{ssid: office}], only_networks: true}",
            Platform::Esp8266,
        );
        assert_eq!(config.networks.len(), 1);
    }

    #[test]
    fn platform_defaults() {
        let (esp8266, report) = validated("{ssid: home}", Platform::Esp8266);
        assert_eq!(esp8266.power_save_mode, Some(PowerSaveMode::None));
        assert_eq!(esp8266.output_power, Some(Decibel(17.0)));
        assert_eq!(esp8266.min_auth_mode, Some(MinAuthMode::Wpa));
        assert_eq!(report.warnings.len(), 1);

        let (esp32, report) = validated("{ssid: home}", Platform::Esp32);
        assert_eq!(esp32.power_save_mode, Some(PowerSaveMode::Light));
        assert_eq!(esp32.min_auth_mode, Some(MinAuthMode::Wpa2));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn use_address_from_static_ips() {
        let one = "{networks: [{ssid: a, manual_ip: {static_ip: 10.0.0.5, gateway: 10.0.0.1, subnet: 255.255.255.0}}]}";
        let (config, _) = validated(one, Platform::Esp32);
        assert_eq!(config.use_address.as_deref(), Some("10.0.0.5"));

        let two = "{networks: [
            {ssid: a, manual_ip: {static_ip: 10.0.0.5, gateway: 10.0.0.1, subnet: 255.255.255.0}},
            {ssid: b, manual_ip: {static_ip: 10.0.0.6, gateway: 10.0.0.1, subnet: 255.255.255.0}}]}";
        let (_, report) = validated(two, Platform::Esp32);
        assert_eq!(report.errors[0].message, "Must specify use_address when using multiple static IP addresses.");
    }

    #[test]
    fn field_checks() {
        let (_, report) = validated(
            "{password: short, networks: [{ssid: a, channel: 15, priority: 200}], output_power: 30dB, enable_mdns: true}",
            Platform::Esp32,
        );
        let messages: Vec<&str> = report.errors.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"Cannot have WiFi password without SSID!"));
        assert!(messages.contains(&"WPA password must be at least 8 characters long"));
        assert!(messages.contains(&"Maximum WiFi channel is 14"));
        assert_eq!(report.errors_of(IssueType::RemovedKey).count(), 1);
        assert_eq!(report.errors_of(IssueType::OutOfRange).count(), 4);
    }

    #[test]
    fn wifi_margin_is_25() {
        let (config, _) = validated("{ssid: home, forced_addr: 75, global_addr: alloc}", Platform::Esp8266);
        assert!(matches!(
            config.check_placement(&ValidationContext::esp8266(100)),
            Err(PlacementError::FrontierOverlap { margin: 25, .. })
        ));
        assert!(config.check_placement(&ValidationContext::esp8266(101)).is_ok());
    }

    #[test]
    fn emission() {
        let (mut config, _) = validated(
            "{ssid: home, password: secretpass, ap: {ssid: fallback}, on_connect: [{lambda: 'ESP_LOGI(\"wifi\", \"up\");'}], \
             fast_connect: true, forced_addr: 3, global_addr: alloc}",
            Platform::Esp8266,
        );
        config.id = Some("wifi_wificomponent_id".into());
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        config.to_code(&mut cg, &ConfigPath::section("wifi")).unwrap();
        let program = cg.finish("plug", ValidationReport::new());
        let main = program.main_cpp();
        assert!(main.contains("wifi_wificomponent_id->set_use_address(\"plug.local\");"));
        assert!(main.contains("wifi_wificomponent_id->init_sta(1);"));
        assert!(main.contains("wifi::WiFiAP wifi_wifiap_id;"));
        assert!(main.contains("wifi_wifiap_id.set_ssid(\"home\");"));
        assert!(main.contains("wifi_wificomponent_id->add_sta(wifi_wifiap_id);"));
        assert!(main.contains("wifi_wificomponent_id->set_ap(wifi_wifiap_id_2);"));
        assert!(main.contains("wifi_wificomponent_id->set_ap_timeout(90000);"));
        assert!(main.contains("wifi_wificomponent_id->set_reboot_timeout(900000);"));
        assert!(main.contains("wifi_wificomponent_id->set_output_power(17.0f);"));
        assert!(main.contains("new Automation<>(wifi_wificomponent_id->get_connect_trigger());"));
        assert!(main.contains("wifi_wificomponent_id->set_forced_addr(3);"));
        assert!(main.contains("wifi_wificomponent_id->set_phy_mode(\"n\");"));
        assert!(program.defines().contains_key("USE_WIFI_FAST_CONNECT"));
        assert!(program.libraries().contains_key("ESP8266WiFi"));
    }
}
