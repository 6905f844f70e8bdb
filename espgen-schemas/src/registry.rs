//! ID Registry
//!
//! Every C++ object the build creates has an ID. Users write some of them;
//! the rest are generated. References between modules (`global_addr`,
//! `power_id`, `interlock`, ...) are checked here for existence and type.
//!
//! The registry is built fresh for every compile and handed down the
//! pipeline, so two builds never share state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::path::ConfigPath;
use crate::{ConfigError, ConfigResult};

/// C++ identifiers that cannot be used as IDs
const RESERVED_IDS: &[&str] = &[
    "auto", "bool", "break", "case", "catch", "char", "class", "const", "continue", "default",
    "delete", "do", "double", "else", "enum", "explicit", "extern", "false", "float", "for",
    "friend", "goto", "if", "inline", "int", "long", "namespace", "new", "nullptr", "operator",
    "private", "protected", "public", "register", "return", "short", "signed", "sizeof",
    "static", "struct", "switch", "template", "this", "throw", "true", "try", "typedef",
    "union", "unsigned", "using", "virtual", "void", "volatile", "while", "App", "esphome",
];

/// Kind of object an ID names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdKind {
    /// `globals` entry, also the forced-placement allocator
    Globals,
    /// Float output (`esp8266_pwm`, `ledc`)
    Output,
    /// Switch entity
    Switch,
    /// Binary sensor entity
    BinarySensor,
    /// Light state
    Light,
    /// Light output driver
    LightOutput,
    /// Number entity
    Number,
    /// Select entity
    Select,
    /// Sensor entity
    Sensor,
    /// Real-time clock
    Time,
    /// WiFi component
    Wifi,
    /// WiFi network entry
    WifiAp,
    /// Web server
    WebServer,
    /// Web server sorting group
    SortingGroup,
    /// Captive portal
    CaptivePortal,
    /// DDP receiver
    Ddp,
    /// HLW8012 power monitoring chip
    PowerMonitor,
}

impl IdKind {
    /// C++ type name used in messages
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Globals => "globals::GlobalsComponent",
            Self::Output => "output::FloatOutput",
            Self::Switch => "switch_::Switch",
            Self::BinarySensor => "binary_sensor::BinarySensor",
            Self::Light => "light::LightState",
            Self::LightOutput => "light::LightOutput",
            Self::Number => "number::Number",
            Self::Select => "select::Select",
            Self::Sensor => "sensor::Sensor",
            Self::Time => "time::RealTimeClock",
            Self::Wifi => "wifi::WiFiComponent",
            Self::WifiAp => "wifi::WiFiAP",
            Self::WebServer => "web_server::WebServer",
            Self::SortingGroup => "int",
            Self::CaptivePortal => "captive_portal::CaptivePortal",
            Self::Ddp => "ddp::DDPComponent",
            Self::PowerMonitor => "kauf_hlw8012::Kauf_HLW8012Component",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// One ID-bearing field of a module, handed to the registry
pub enum IdField<'a> {
    /// Declares an ID, generating one from `prefix` when absent
    Declare {
        id: &'a mut Option<String>,
        kind: IdKind,
        prefix: &'static str,
        path: ConfigPath,
    },
    /// Declares an ID the user had to write
    Fixed {
        id: &'a str,
        kind: IdKind,
        path: ConfigPath,
    },
    /// Refers to an ID declared elsewhere
    Reference {
        id: &'a str,
        kind: IdKind,
        path: ConfigPath,
    },
    /// Refers to the single declaration of `kind` when not written
    Implicit {
        id: &'a mut Option<String>,
        kind: IdKind,
        path: ConfigPath,
    },
}

#[derive(Debug, Clone)]
struct Declaration {
    kind: IdKind,
    path: ConfigPath,
}

/// Declared IDs of one build
#[derive(Debug, Default)]
pub struct IdRegistry {
    declared: BTreeMap<String, Declaration>,
}

impl IdRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare, generate and resolve every field, in that order
    pub fn resolve(&mut self, mut fields: Vec<IdField<'_>>) -> ConfigResult<()> {
        for field in &fields {
            match field {
                IdField::Declare { id, kind, path, .. } => {
                    if let Some(id) = id.as_deref() {
                        self.declare(id, *kind, path.key("id"))?;
                    }
                }
                IdField::Fixed { id, kind, path } => self.declare(id, *kind, path.clone())?,
                _ => {}
            }
        }

        for field in &mut fields {
            if let IdField::Declare { id, kind, prefix, path } = field {
                if id.is_none() {
                    let generated = self.generate(*prefix, *kind, path.clone());
                    **id = Some(generated);
                }
            }
        }

        for field in &mut fields {
            match field {
                IdField::Reference { id, kind, path } => self.require(id, *kind, path)?,
                IdField::Implicit { id, kind, path } => {
                    if let Some(explicit) = id.as_deref() {
                        self.require(explicit, *kind, path)?;
                    } else {
                        **id = Some(self.sole(*kind, path)?);
                    }
                }
                _ => {}
            }
        }

        log::debug!("resolved {} ids", self.declared.len());
        Ok(())
    }

    /// Declare `id` of `kind` at `path`
    pub fn declare(&mut self, id: &str, kind: IdKind, path: ConfigPath) -> ConfigResult<()> {
        check_identifier(id).map_err(|message| ConfigError::invalid(path.clone(), message))?;
        if let Some(previous) = self.declared.get(id) {
            return Err(ConfigError::invalid(
                path,
                format!("ID {id} redefined! Check {}", previous.path),
            ));
        }
        self.declared.insert(id.to_string(), Declaration { kind, path });
        Ok(())
    }

    /// Generate a fresh ID of the form `<prefix>_id`, `<prefix>_id_2`, ...
    pub fn generate(&mut self, prefix: &str, kind: IdKind, path: ConfigPath) -> String {
        let base = format!("{prefix}_id");
        let mut candidate = base.clone();
        let mut n = 2;
        while self.declared.contains_key(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        self.declared.insert(candidate.clone(), Declaration { kind, path });
        candidate
    }

    /// Check that `id` exists and names a `kind`
    pub fn require(&self, id: &str, kind: IdKind, path: &ConfigPath) -> ConfigResult<()> {
        match self.declared.get(id) {
            None => Err(ConfigError::invalid(
                path.clone(),
                format!(
                    "Couldn't find ID '{id}'. Please check you have defined an ID with that name in your configuration."
                ),
            )),
            Some(found) if found.kind != kind => Err(ConfigError::invalid(
                path.clone(),
                format!(
                    "ID '{id}' of type {} doesn't inherit from {kind}. Please double check your ID is pointing to the correct value",
                    found.kind
                ),
            )),
            Some(_) => Ok(()),
        }
    }

    /// The single declared ID of `kind`
    pub fn sole(&self, kind: IdKind, path: &ConfigPath) -> ConfigResult<String> {
        let candidates: Vec<&String> = self
            .declared
            .iter()
            .filter(|(_, declaration)| declaration.kind == kind)
            .map(|(id, _)| id)
            .collect();
        match candidates.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(ConfigError::invalid(
                path.clone(),
                format!("Couldn't find any component that can be used for '{kind}'. Are you missing a hub declaration?"),
            )),
            many => {
                let names: Vec<&str> = many.iter().take(3).map(|id| id.as_str()).collect();
                Err(ConfigError::invalid(
                    path.clone(),
                    format!(
                        "Too many candidates found for '{kind}'. Please specify the ID explicitly. Some are '{}'.",
                        names.join("', '")
                    ),
                ))
            }
        }
    }

    /// Kind of a declared ID
    pub fn kind_of(&self, id: &str) -> Option<IdKind> {
        self.declared.get(id).map(|declaration| declaration.kind)
    }

    /// All declared IDs
    pub fn ids(&self) -> BTreeSet<String> {
        self.declared.keys().cloned().collect()
    }

    /// Number of declared IDs
    pub fn len(&self) -> usize {
        self.declared.len()
    }

    /// Whether nothing was declared
    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}

/// Valid C++ identifier that is not a keyword
pub fn check_identifier(id: &str) -> Result<(), String> {
    let mut chars = id.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "Invalid ID '{id}': IDs must start with a letter or underscore and contain only letters, digits and underscores"
        ));
    }
    if RESERVED_IDS.contains(&id) {
        return Err(format!("ID '{id}' is reserved internally and cannot be used"));
    }
    Ok(())
}
