//! Typed device configuration
//!
//! One struct per module, deserialized in a single `serde_yaml` pass. Lists
//! of entities are tagged by their `platform:` key. Entity structs flatten
//! the shared [`EntityConfig`] and [`ForcedPlacement`] fragments and keep any
//! remaining keys in an [`Extra`] map that the owning module reports on.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::components::binary_sensor::BinarySensorConfig;
use crate::components::captive_portal::CaptivePortalConfig;
use crate::components::ddp::DdpConfig;
use crate::components::esphome::CoreConfig;
use crate::components::globals::GlobalsConfig;
use crate::components::kauf_deprecations::DeprecationsConfig;
use crate::components::light::LightConfig;
use crate::components::number::NumberConfig;
use crate::components::output::OutputConfig;
use crate::components::platform::{Esp32Config, Esp8266Config};
use crate::components::select::SelectConfig;
use crate::components::sensor::SensorConfig;
use crate::components::switch::SwitchConfig;
use crate::components::time::TimeConfig;
use crate::components::web_server::WebServerConfig;
use crate::components::wifi::WifiConfig;
use crate::components::Component;
use crate::path::ConfigPath;
use crate::types::{present, Platform};
use crate::{ConfigError, ConfigResult};

/// Keys a module did not recognise
pub type Extra = BTreeMap<String, serde_yaml::Value>;

/// Whole device configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Device identity
    pub esphome: CoreConfig,

    #[serde(default)]
    pub esp8266: Option<Esp8266Config>,

    #[serde(default)]
    pub esp32: Option<Esp32Config>,

    #[serde(default)]
    pub globals: Vec<GlobalsConfig>,

    #[serde(default)]
    pub output: Vec<OutputConfig>,

    #[serde(default)]
    pub time: Vec<TimeConfig>,

    #[serde(default, deserialize_with = "present")]
    pub wifi: Option<WifiConfig>,

    #[serde(default, deserialize_with = "present")]
    pub web_server: Option<WebServerConfig>,

    #[serde(default, deserialize_with = "present")]
    pub captive_portal: Option<CaptivePortalConfig>,

    #[serde(default, deserialize_with = "present")]
    pub ddp: Option<DdpConfig>,

    /// Guards for substitutions that packages no longer accept
    #[serde(default, deserialize_with = "present")]
    pub kauf_deprecations: Option<DeprecationsConfig>,

    #[serde(default, rename = "switch")]
    pub switches: Vec<SwitchConfig>,

    #[serde(default)]
    pub binary_sensor: Vec<BinarySensorConfig>,

    #[serde(default)]
    pub light: Vec<LightConfig>,

    #[serde(default)]
    pub number: Vec<NumberConfig>,

    #[serde(default)]
    pub select: Vec<SelectConfig>,

    #[serde(default)]
    pub sensor: Vec<SensorConfig>,
}

/// Options every entity accepts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityConfig {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub internal: bool,

    #[serde(default)]
    pub icon: Option<String>,

    #[serde(default)]
    pub disabled_by_default: bool,

    #[serde(default)]
    pub entity_category: Option<EntityCategory>,

    #[serde(default)]
    pub web_server: Option<EntityWebServer>,
}

/// Category shown by frontends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

impl EntityCategory {
    /// Firmware enum constant
    pub const fn cpp(self) -> &'static str {
        match self {
            Self::Config => "ENTITY_CATEGORY_CONFIG",
            Self::Diagnostic => "ENTITY_CATEGORY_DIAGNOSTIC",
        }
    }
}

/// Per-entity web page layout (web_server version 3)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityWebServer {
    #[serde(default)]
    pub sorting_weight: Option<f64>,

    #[serde(default)]
    pub sorting_group_id: Option<String>,
}

/// Forced-placement options of an entity
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForcedPlacement {
    /// Fixed preference address
    #[serde(default)]
    pub forced_addr: Option<u32>,

    /// Fixed preference hash
    #[serde(default)]
    pub forced_hash: Option<u32>,

    /// `globals` entry used as the address allocator
    #[serde(default)]
    pub global_addr: Option<String>,
}

impl ForcedPlacement {
    /// Request for the core validator
    pub fn request(&self) -> espgen_core::PlacementRequest {
        espgen_core::PlacementRequest {
            forced_addr: self.forced_addr,
            forced_hash: self.forced_hash,
            has_global_addr: self.global_addr.is_some(),
        }
    }
}

impl DeviceConfig {
    /// The one platform this configuration targets
    pub fn platform(&self) -> ConfigResult<Platform> {
        match (&self.esp8266, &self.esp32) {
            (Some(_), None) => Ok(Platform::Esp8266),
            (None, Some(_)) => Ok(Platform::Esp32),
            (None, None) => Err(ConfigError::invalid(
                ConfigPath::root(),
                "Platform missing. You must include one of the available platform keys: esp8266, esp32",
            )),
            (Some(_), Some(_)) => Err(ConfigError::invalid(
                ConfigPath::root(),
                "Found multiple target platform blocks: esp8266, esp32. Only one is allowed.",
            )),
        }
    }

    /// Every module in emission order
    pub fn components(&self) -> Vec<(ConfigPath, &dyn Component)> {
        let mut out: Vec<(ConfigPath, &dyn Component)> =
            vec![(ConfigPath::section("esphome"), &self.esphome as &dyn Component)];
        out.extend(list("globals", &self.globals).map(|(p, c)| (p, c as &dyn Component)));
        if let Some(esp8266) = &self.esp8266 {
            out.push((ConfigPath::section("esp8266"), esp8266 as &dyn Component));
        }
        if let Some(esp32) = &self.esp32 {
            out.push((ConfigPath::section("esp32"), esp32 as &dyn Component));
        }
        out.extend(list("output", &self.output).map(|(p, c)| (p, c.as_component())));
        out.extend(list("time", &self.time).map(|(p, c)| (p, c.as_component())));
        if let Some(wifi) = &self.wifi {
            out.push((ConfigPath::section("wifi"), wifi as &dyn Component));
        }
        if let Some(web_server) = &self.web_server {
            out.push((ConfigPath::section("web_server"), web_server as &dyn Component));
        }
        if let Some(captive_portal) = &self.captive_portal {
            out.push((ConfigPath::section("captive_portal"), captive_portal as &dyn Component));
        }
        if let Some(ddp) = &self.ddp {
            out.push((ConfigPath::section("ddp"), ddp as &dyn Component));
        }
        if let Some(deprecations) = &self.kauf_deprecations {
            out.push((ConfigPath::section("kauf_deprecations"), deprecations as &dyn Component));
        }
        out.extend(list("switch", &self.switches).map(|(p, c)| (p, c.as_component())));
        out.extend(list("binary_sensor", &self.binary_sensor).map(|(p, c)| (p, c.as_component())));
        out.extend(list("light", &self.light).map(|(p, c)| (p, c.as_component())));
        out.extend(list("number", &self.number).map(|(p, c)| (p, c.as_component())));
        out.extend(list("select", &self.select).map(|(p, c)| (p, c.as_component())));
        out.extend(sensors_in_order(&self.sensor).map(|(p, c)| (p, c.as_component())));
        out
    }

    /// Every module in emission order, mutably
    pub fn components_mut(&mut self) -> Vec<(ConfigPath, &mut dyn Component)> {
        let mut out: Vec<(ConfigPath, &mut dyn Component)> =
            vec![(ConfigPath::section("esphome"), &mut self.esphome as &mut dyn Component)];
        out.extend(list_mut("globals", &mut self.globals).map(|(p, c)| (p, c as &mut dyn Component)));
        if let Some(esp8266) = &mut self.esp8266 {
            out.push((ConfigPath::section("esp8266"), esp8266 as &mut dyn Component));
        }
        if let Some(esp32) = &mut self.esp32 {
            out.push((ConfigPath::section("esp32"), esp32 as &mut dyn Component));
        }
        out.extend(list_mut("output", &mut self.output).map(|(p, c)| (p, c.as_component_mut())));
        out.extend(list_mut("time", &mut self.time).map(|(p, c)| (p, c.as_component_mut())));
        if let Some(wifi) = &mut self.wifi {
            out.push((ConfigPath::section("wifi"), wifi as &mut dyn Component));
        }
        if let Some(web_server) = &mut self.web_server {
            out.push((ConfigPath::section("web_server"), web_server as &mut dyn Component));
        }
        if let Some(captive_portal) = &mut self.captive_portal {
            out.push((ConfigPath::section("captive_portal"), captive_portal as &mut dyn Component));
        }
        if let Some(ddp) = &mut self.ddp {
            out.push((ConfigPath::section("ddp"), ddp as &mut dyn Component));
        }
        if let Some(deprecations) = &mut self.kauf_deprecations {
            out.push((ConfigPath::section("kauf_deprecations"), deprecations as &mut dyn Component));
        }
        out.extend(list_mut("switch", &mut self.switches).map(|(p, c)| (p, c.as_component_mut())));
        out.extend(
            list_mut("binary_sensor", &mut self.binary_sensor).map(|(p, c)| (p, c.as_component_mut())),
        );
        out.extend(list_mut("light", &mut self.light).map(|(p, c)| (p, c.as_component_mut())));
        out.extend(list_mut("number", &mut self.number).map(|(p, c)| (p, c.as_component_mut())));
        out.extend(list_mut("select", &mut self.select).map(|(p, c)| (p, c.as_component_mut())));
        out.extend(list_mut("sensor", &mut self.sensor).map(|(p, c)| (p, c.as_component_mut())));
        out
    }

    /// Names of every entity, with their domain
    pub fn entity_names(&self) -> Vec<(&'static str, &str)> {
        let mut names = Vec::new();
        names.extend(self.switches.iter().map(|s| ("switch", s.entity().name.as_str())));
        names.extend(self.binary_sensor.iter().map(|s| ("binary_sensor", s.entity().name.as_str())));
        names.extend(self.light.iter().map(|s| ("light", s.entity().name.as_str())));
        names.extend(self.number.iter().map(|s| ("number", s.entity().name.as_str())));
        names.extend(self.select.iter().map(|s| ("select", s.entity().name.as_str())));
        names.extend(
            self.sensor.iter().flat_map(SensorConfig::published).map(|s| ("sensor", s.entity.name.as_str())),
        );
        names
    }

    /// Entity fragments with their paths
    pub fn entities(&self) -> Vec<(ConfigPath, &EntityConfig)> {
        let mut out = Vec::new();
        out.extend(list("switch", &self.switches).map(|(p, c)| (p, c.entity())));
        out.extend(list("binary_sensor", &self.binary_sensor).map(|(p, c)| (p, c.entity())));
        out.extend(list("light", &self.light).map(|(p, c)| (p, c.entity())));
        out.extend(list("number", &self.number).map(|(p, c)| (p, c.entity())));
        out.extend(list("select", &self.select).map(|(p, c)| (p, c.entity())));
        for (path, sensor) in list("sensor", &self.sensor) {
            out.extend(sensor.published().into_iter().map(|s| match s.key {
                Some(key) => (path.key(key), s.entity),
                None => (path.clone(), s.entity),
            }));
        }
        out
    }
}

fn list<'a, T>(section: &'static str, items: &'a [T]) -> impl Iterator<Item = (ConfigPath, &'a T)> {
    items.iter().enumerate().map(move |(i, item)| (ConfigPath::section(section).index(i), item))
}

fn list_mut<'a, T>(
    section: &'static str,
    items: &'a mut [T],
) -> impl Iterator<Item = (ConfigPath, &'a mut T)> {
    items.iter_mut().enumerate().map(move |(i, item)| (ConfigPath::section(section).index(i), item))
}

/// Power sensors are set up before the energy totals that read them
fn sensors_in_order(sensors: &[SensorConfig]) -> impl Iterator<Item = (ConfigPath, &SensorConfig)> {
    let sources = list("sensor", sensors).filter(|(_, s)| !s.is_derived());
    let derived = list("sensor", sensors).filter(|(_, s)| s.is_derived());
    sources.chain(derived)
}
