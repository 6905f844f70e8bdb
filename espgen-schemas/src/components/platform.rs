//! Platform blocks: `esp8266:` and `esp32:`
//!
//! Only the esp8266 block has a static preference layout, so it is the
//! only one that yields a [`MemoryFrontier`](espgen_core::MemoryFrontier).

use espgen_core::ValidationContext;
use serde::Deserialize;

use super::Component;
use crate::codegen::{CodeGen, Expr};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

/// Feature name esp8266 outputs require to keep the waveform generator
pub const WAVEFORM_FEATURE: &str = "waveform";

/// SPI flash access mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    Qio,
    Qout,
    Dio,
    #[default]
    Dout,
}

impl FlashMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Qio => "qio",
            Self::Qout => "qout",
            Self::Dio => "dio",
            Self::Dout => "dout",
        }
    }
}

fn default_true() -> bool {
    true
}

/// `esp8266:` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Esp8266Config {
    pub board: String,

    /// First preference address free for dynamic allocation
    #[serde(default)]
    pub start_free: u32,

    /// `globals` entry the firmware allocates forced addresses from
    #[serde(default)]
    pub global_addr: Option<String>,

    #[serde(default)]
    pub restore_from_flash: bool,

    #[serde(default = "default_true")]
    pub early_pin_init: bool,

    #[serde(default)]
    pub board_flash_mode: FlashMode,

    #[serde(default)]
    pub enable_serial: Option<bool>,

    #[serde(default)]
    pub enable_serial1: Option<bool>,
}

impl Esp8266Config {
    /// Placement context for this build
    pub fn placement_context(&self) -> ValidationContext {
        ValidationContext::esp8266(self.start_free)
    }
}

impl Component for Esp8266Config {
    fn domain(&self) -> &'static str {
        "esp8266"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        self.global_addr
            .as_deref()
            .map(|id| IdField::Reference { id, kind: IdKind::Globals, path: path.key("global_addr") })
            .into_iter()
            .collect()
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        if self.board.trim().is_empty() {
            ctx.error(IssueType::MissingField, path.key("board"), "A board must be specified");
        }
    }

    fn to_code(&self, cg: &mut CodeGen, _path: &ConfigPath) -> ConfigResult<()> {
        cg.call_free("esp8266::setup_preferences", vec![self.start_free.into()]);

        cg.add_platformio_option("lib_ldf_mode", "off");
        cg.add_platformio_option("lib_compat_mode", "strict");
        cg.add_platformio_option("board", &self.board);
        cg.add_platformio_option("framework", "arduino");
        cg.add_platformio_option("board_build.flash_mode", self.board_flash_mode.as_str());

        cg.add_build_flag("-DUSE_ESP8266");
        cg.add_build_flag("-DUSE_ARDUINO");
        cg.add_build_flag("-DUSE_ESP8266_FRAMEWORK_ARDUINO");
        cg.add_build_flag("-DPIO_FRAMEWORK_ARDUINO_LWIP2_HIGHER_BANDWIDTH_LOW_FLASH");
        cg.add_build_flag("-DNEW_OOM_ABORT");
        if !self.enable_serial.unwrap_or(false) {
            cg.add_build_flag("-DNO_GLOBAL_SERIAL");
        }
        if !self.enable_serial1.unwrap_or(false) {
            cg.add_build_flag("-DNO_GLOBAL_SERIAL1");
        }
        cg.add_fallback_flag(WAVEFORM_FEATURE, "-DUSE_ESP8266_WAVEFORM_STUBS");

        cg.add_define_value("ESPHOME_BOARD", self.board.as_str());
        cg.add_define_value("ESPHOME_VARIANT", "ESP8266");
        if self.restore_from_flash {
            cg.add_define("USE_ESP8266_PREFERENCES_FLASH");
        }
        if self.early_pin_init {
            cg.add_define("USE_ESP8266_EARLY_PIN_INIT");
        }

        if let Some(global) = &self.global_addr {
            cg.call_free("esp8266::set_global_addr", vec![Expr::var(global)]);
        }
        Ok(())
    }
}

/// ESP32 chip family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Esp32Variant {
    #[default]
    Esp32,
    Esp32s2,
    Esp32s3,
    Esp32c3,
    Esp32c6,
    Esp32h2,
    Esp32p4,
}

impl Esp32Variant {
    /// Lowercase key, as written in YAML
    pub const fn key(self) -> &'static str {
        match self {
            Self::Esp32 => "esp32",
            Self::Esp32s2 => "esp32s2",
            Self::Esp32s3 => "esp32s3",
            Self::Esp32c3 => "esp32c3",
            Self::Esp32c6 => "esp32c6",
            Self::Esp32h2 => "esp32h2",
            Self::Esp32p4 => "esp32p4",
        }
    }

    /// Marketing name, used for `ESPHOME_VARIANT`
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Esp32 => "ESP32",
            Self::Esp32s2 => "ESP32-S2",
            Self::Esp32s3 => "ESP32-S3",
            Self::Esp32c3 => "ESP32-C3",
            Self::Esp32c6 => "ESP32-C6",
            Self::Esp32h2 => "ESP32-H2",
            Self::Esp32p4 => "ESP32-P4",
        }
    }

    /// Whether the chip has a WiFi radio of its own
    pub const fn has_wifi(self) -> bool {
        !matches!(self, Self::Esp32h2 | Self::Esp32p4)
    }
}

/// ESP32 SDK
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum FrameworkKind {
    #[default]
    #[serde(rename = "arduino")]
    Arduino,
    #[serde(rename = "esp-idf")]
    EspIdf,
}

/// `esp32.framework`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Esp32Framework {
    #[serde(rename = "type", default)]
    pub kind: FrameworkKind,
}

/// `esp32:` block
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Esp32Config {
    pub board: String,

    #[serde(default)]
    pub variant: Esp32Variant,

    #[serde(default)]
    pub framework: Esp32Framework,
}

impl Component for Esp32Config {
    fn domain(&self) -> &'static str {
        "esp32"
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        if self.board.trim().is_empty() {
            ctx.error(IssueType::MissingField, path.key("board"), "A board must be specified");
        }
    }

    fn to_code(&self, cg: &mut CodeGen, _path: &ConfigPath) -> ConfigResult<()> {
        cg.add_platformio_option("board", &self.board);
        cg.add_build_flag("-DUSE_ESP32");
        cg.add_build_flag(&format!("-DUSE_ESP32_VARIANT_{}", self.variant.key().to_ascii_uppercase()));
        match self.framework.kind {
            FrameworkKind::Arduino => {
                cg.add_platformio_option("framework", "arduino");
                cg.add_build_flag("-DUSE_ARDUINO");
                cg.add_build_flag("-DUSE_ESP32_FRAMEWORK_ARDUINO");
            }
            FrameworkKind::EspIdf => {
                cg.add_platformio_option("framework", "espidf");
                cg.add_build_flag("-DUSE_ESP_IDF");
                cg.add_build_flag("-DUSE_ESP32_FRAMEWORK_ESP_IDF");
            }
        }
        cg.add_define_value("ESPHOME_BOARD", self.board.as_str());
        cg.add_define_value("ESPHOME_VARIANT", self.variant.display_name());
        Ok(())
    }
}
