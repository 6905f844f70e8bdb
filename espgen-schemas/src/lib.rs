//! Device Configuration Schemas and Code Emission
//!
//! ## Overview
//!
//! A device is described by one YAML document: the platform block, the
//! network stack, and a list of entities (switches, lights, numbers,
//! selects, sensors). This crate turns that document into C++ glue against
//! the firmware's component library.
//!
//! ## Pipeline
//!
//! ```text
//! YAML ──parse──▶ DeviceConfig ──ids──▶ schema pass ──▶ final pass ──▶ Program
//!                 (typed)         (declare,  (collect all  (fail fast,    (main.cpp,
//!                                  resolve)   errors)       placement)     defines.h)
//! ```
//!
//! 1. **Parse**: `serde_yaml` into strongly typed structs, one per module.
//!    Unknown keys are kept aside and reported by the owning module.
//! 2. **IDs**: explicit IDs are declared, missing ones generated, references
//!    checked for existence and type.
//! 3. **Schema pass**: every module checks ranges, enums and cross-field
//!    rules, and applies platform-dependent defaults. All errors are
//!    collected into one [`ValidationReport`].
//! 4. **Final pass**: modules look at the whole configuration. The first
//!    failure aborts the build. This is where forced placement is checked
//!    against the esp8266 memory frontier.
//! 5. **Emission**: each module appends statements, defines, build flags and
//!    libraries to a [`CodeGen`](codegen::CodeGen).
//!
//! ## Forced Placement
//!
//! Switches, lights, template numbers and selects, energy totals and WiFi
//! can pin their saved state at a fixed address:
//!
//! ```yaml
//! esp8266:
//!   board: esp01_1m
//!   start_free: 100
//! globals:
//!   - id: addr_alloc
//!     type: int
//! switch:
//!   - platform: gpio
//!     name: Relay
//!     pin: GPIO12
//!     forced_addr: 90
//!     global_addr: addr_alloc
//! ```
//!
//! The check itself lives in `espgen-core`; each module only contributes
//! its margin.
//!
//! ## Usage Example
//!
//! ```rust
//! let yaml = r#"
//! esphome:
//!   name: plug
//! esp8266:
//!   board: esp01_1m
//! wifi:
//!   ssid: home
//!   password: secretpass
//! "#;
//!
//! let program = espgen_schemas::compile_str(yaml)?;
//! assert!(program.defines_h().contains("#define USE_WIFI"));
//! # Ok::<(), espgen_schemas::ConfigError>(())
//! ```

use std::path::Path;

use espgen_core::PlacementError;

pub mod codegen;
pub mod components;
pub mod config;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod types;
pub mod validation;

pub use codegen::{CodeGen, Program};
pub use config::DeviceConfig;
pub use path::ConfigPath;
pub use pipeline::Compiler;
pub use types::Platform;
pub use validation::{IssueType, Severity, ValidationIssue, ValidationReport};

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, thiserror_no_std::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to read configuration: {0}")]
    Io(String),

    #[error("{path}: {message}")]
    Invalid { path: ConfigPath, message: String },

    #[error("{path}: {source}")]
    Placement {
        path: ConfigPath,
        #[source]
        source: PlacementError,
    },

    #[error("Invalid configuration: {}", .0.summary())]
    Schema(ValidationReport),

    #[error("Failed to emit build files: {0}")]
    Emit(String),
}

impl ConfigError {
    /// Error at `path` with a free-form message
    pub fn invalid(path: ConfigPath, message: impl Into<String>) -> Self {
        Self::Invalid { path, message: message.into() }
    }

    /// Key path the error points at, if any
    pub fn path(&self) -> Option<&ConfigPath> {
        match self {
            Self::Invalid { path, .. } | Self::Placement { path, .. } => Some(path),
            Self::Schema(report) => report.errors.first().map(|issue| &issue.path),
            Self::Parse(_) | Self::Io(_) | Self::Emit(_) => None,
        }
    }

    /// The forced-placement failure behind this error, if that is what it is
    pub fn placement(&self) -> Option<&PlacementError> {
        match self {
            Self::Placement { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Parse a YAML document into a [`DeviceConfig`]
pub fn load_str(yaml: &str) -> ConfigResult<DeviceConfig> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Read and parse a YAML file
pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<DeviceConfig> {
    let text = std::fs::read_to_string(path.as_ref())?;
    log::debug!("loaded {} ({} bytes)", path.as_ref().display(), text.len());
    load_str(&text)
}

/// Parse, validate and emit in one go
pub fn compile_str(yaml: &str) -> ConfigResult<Program> {
    Compiler::new(load_str(yaml)?).compile()
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn yaml_errors_become_parse_errors() {
        let err = load_str("esphome: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.path().is_none());
    }

    #[test]
    fn placement_error_is_source() {
        use std::error::Error;
        let err = ConfigError::Placement {
            path: ConfigPath::section("wifi"),
            source: PlacementError::UnsupportedPlatform { forced_addr: 10 },
        };
        assert_eq!(err.to_string(), "wifi: Forced_addr is only compatible with esp8266 platform");
        assert!(err.source().is_some());
        assert!(err.placement().is_some());
    }
}
