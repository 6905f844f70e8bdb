//! C++ code emission
//!
//! Modules never write C++ text directly. They append [`Statement`]s,
//! defines, build flags and libraries to a [`CodeGen`], which renders them
//! in a fixed order once every module is done. Output is deterministic:
//! the same configuration always produces byte-identical files.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::types::Platform;
use crate::validation::ValidationReport;
use crate::{ConfigError, ConfigResult};

/// C++ expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Signed integer literal
    Int(i64),
    /// Unsigned integer literal
    UInt(u64),
    /// Float literal, rendered with an `f` suffix
    Float(f64),
    /// `true` / `false`
    Bool(bool),
    /// String literal, escaped on render
    Str(String),
    /// Reference to a declared variable
    Var(String),
    /// Verbatim expression (enum constants, lambdas)
    Raw(String),
    /// Brace initializer list
    List(Vec<Expr>),
}

impl Expr {
    /// Variable reference
    pub fn var(id: impl Into<String>) -> Self {
        Self::Var(id.into())
    }

    /// Verbatim expression
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u8> for Expr {
    fn from(value: u8) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u16> for Expr {
    fn from(value: u16) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u64> for Expr {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<usize> for Expr {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::UInt(n) if *n > i32::MAX as u64 => write!(f, "{n}UL"),
            Self::UInt(n) => write!(f, "{n}"),
            Self::Float(v) if v.is_nan() => f.write_str("NAN"),
            Self::Float(v) if v.is_infinite() => f.write_str(if *v > 0.0 { "INFINITY" } else { "-INFINITY" }),
            Self::Float(v) => {
                let text = v.to_string();
                if text.contains(['.', 'e']) {
                    write!(f, "{text}f")
                } else {
                    write!(f, "{text}.0f")
                }
            }
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => f.write_str(&cpp_string_escape(s)),
            Self::Var(id) | Self::Raw(id) => f.write_str(id),
            Self::List(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Quote and escape a string for C++ source
pub fn cpp_string_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for byte in text.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(byte as char),
            other => out.push_str(&format!("\\{other:03o}")),
        }
    }
    out.push('"');
    out
}

/// 32-bit FNV-1 hash, matching the firmware's `fnv1_hash`
pub fn fnv1_hash(text: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in text.bytes() {
        hash = hash.wrapping_mul(16_777_619);
        hash ^= u32::from(byte);
    }
    hash
}

/// Receiver of a call
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// `ptr->method(..)`
    Pointer(String),
    /// `obj.method(..)`
    Object(String),
    /// `ns::function(..)`
    Free,
}

/// One line (or block) of `setup()`
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `id = new Class(args);`, with a global `Class *id;`
    New { id: String, class: String, args: Vec<Expr> },
    /// Method or free-function call
    Call { target: Target, method: String, args: Vec<Expr> },
    /// Stack variable inside a block
    Local { id: String, class: String },
    /// Braced scope
    Block(Vec<Statement>),
    /// Verbatim statement
    Raw(String),
}

fn join_args(args: &[Expr]) -> String {
    args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl Statement {
    fn render(&self, indent: usize, out: &mut impl fmt::Write) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Self::New { id, class, args } => writeln!(out, "{pad}{id} = new {class}({});", join_args(args)),
            Self::Call { target, method, args } => {
                let args = join_args(args);
                match target {
                    Target::Pointer(var) => writeln!(out, "{pad}{var}->{method}({args});"),
                    Target::Object(var) => writeln!(out, "{pad}{var}.{method}({args});"),
                    Target::Free => writeln!(out, "{pad}{method}({args});"),
                }
            }
            Self::Local { id, class } => writeln!(out, "{pad}{class} {id};"),
            Self::Block(body) => {
                writeln!(out, "{pad}{{")?;
                for statement in body {
                    statement.render(indent + 1, out)?;
                }
                writeln!(out, "{pad}}}")
            }
            Self::Raw(text) => {
                for line in text.lines() {
                    writeln!(out, "{pad}{line}")?;
                }
                Ok(())
            }
        }
    }
}

/// Accumulates everything modules emit
#[derive(Debug)]
pub struct CodeGen {
    platform: Platform,
    declarations: Vec<(String, String)>,
    globals: Vec<String>,
    scopes: Vec<Vec<Statement>>,
    deferred: Vec<Statement>,
    defines: BTreeMap<String, Option<String>>,
    build_flags: BTreeSet<String>,
    libraries: BTreeMap<String, Option<String>>,
    platformio_options: BTreeMap<String, String>,
    taken: BTreeSet<String>,
    features: BTreeSet<&'static str>,
    fallback_flags: Vec<(&'static str, String)>,
    provided: BTreeMap<&'static str, String>,
}

impl CodeGen {
    /// Emitter for `platform`; `taken` are IDs already claimed by the config
    pub fn new(platform: Platform, taken: BTreeSet<String>) -> Self {
        Self {
            platform,
            declarations: Vec::new(),
            globals: Vec::new(),
            scopes: vec![Vec::new()],
            deferred: Vec::new(),
            defines: BTreeMap::new(),
            build_flags: BTreeSet::new(),
            libraries: BTreeMap::new(),
            platformio_options: BTreeMap::new(),
            taken,
            features: BTreeSet::new(),
            fallback_flags: Vec::new(),
            provided: BTreeMap::new(),
        }
    }

    /// Target platform
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Append a statement to the current scope
    pub fn add(&mut self, statement: Statement) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(statement);
        }
    }

    /// Append a statement that runs after every module's own statements
    pub fn defer(&mut self, statement: Statement) {
        self.deferred.push(statement);
    }

    /// Heap-allocate `class` as global pointer `id`
    pub fn new_pvariable(&mut self, id: &str, class: &str, args: Vec<Expr>) -> String {
        self.taken.insert(id.to_string());
        self.declarations.push((class.to_string(), id.to_string()));
        self.add(Statement::New { id: id.to_string(), class: class.to_string(), args });
        id.to_string()
    }

    /// Whether a global pointer named `id` was already emitted
    pub fn is_declared(&self, id: &str) -> bool {
        self.declarations.iter().any(|(_, declared)| declared == id)
    }

    /// `var->method(args);`
    pub fn call(&mut self, var: &str, method: &str, args: Vec<Expr>) {
        self.add(Statement::Call {
            target: Target::Pointer(var.to_string()),
            method: method.to_string(),
            args,
        });
    }

    /// `object.method(args);` for stack objects
    pub fn call_on(&mut self, object: &str, method: &str, args: Vec<Expr>) {
        self.add(Statement::Call {
            target: Target::Object(object.to_string()),
            method: method.to_string(),
            args,
        });
    }

    /// `ns::function(args);`
    pub fn call_free(&mut self, function: &str, args: Vec<Expr>) {
        self.add(Statement::Call { target: Target::Free, method: function.to_string(), args });
    }

    /// `App.register_component(var);`
    pub fn register_component(&mut self, var: &str) {
        self.call_on("App", "register_component", vec![Expr::var(var)]);
    }

    /// `App.register_<domain>(var);`
    pub fn register_entity(&mut self, domain: &str, var: &str) {
        self.call_on("App", &format!("register_{domain}"), vec![Expr::var(var)]);
    }

    /// Run `body` inside a braced scope
    pub fn block(&mut self, body: impl FnOnce(&mut CodeGen) -> ConfigResult<()>) -> ConfigResult<()> {
        self.scopes.push(Vec::new());
        let result = body(self);
        let statements = self.scopes.pop().unwrap_or_default();
        self.add(Statement::Block(statements));
        result
    }

    /// Declare a stack variable in the current scope and return its name
    pub fn local(&mut self, class: &str, prefix: &str) -> String {
        let id = self.unique_id(prefix);
        self.add(Statement::Local { id: id.clone(), class: class.to_string() });
        id
    }

    /// Fresh identifier that clashes with nothing emitted so far
    pub fn unique_id(&mut self, prefix: &str) -> String {
        let base = format!("{prefix}_id");
        let mut candidate = base.clone();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    /// Verbatim top-level declaration
    pub fn add_global(&mut self, declaration: impl Into<String>) {
        self.globals.push(declaration.into());
    }

    /// `#define NAME`
    pub fn add_define(&mut self, name: &str) {
        self.defines.entry(name.to_string()).or_insert(None);
    }

    /// `#define NAME value`
    pub fn add_define_value(&mut self, name: &str, value: impl Into<Expr>) {
        self.defines.insert(name.to_string(), Some(value.into().to_string()));
    }

    /// Whether `name` has been defined
    pub fn has_define(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    /// Compiler flag
    pub fn add_build_flag(&mut self, flag: &str) {
        self.build_flags.insert(flag.to_string());
    }

    /// Library dependency, optionally pinned
    pub fn add_library(&mut self, name: &str, version: Option<&str>) {
        self.libraries.insert(name.to_string(), version.map(str::to_string));
    }

    /// `platformio.ini` option
    pub fn add_platformio_option(&mut self, key: &str, value: &str) {
        self.platformio_options.insert(key.to_string(), value.to_string());
    }

    /// Publish the variable of a singleton module for later modules
    pub fn provide(&mut self, role: &'static str, var: &str) {
        self.provided.insert(role, var.to_string());
    }

    /// Variable published under `role`
    pub fn provided(&self, role: &str) -> Option<&str> {
        self.provided.get(role).map(String::as_str)
    }

    /// Mark a platform feature as used
    pub fn require_feature(&mut self, feature: &'static str) {
        self.features.insert(feature);
    }

    /// Build flag added at the end unless `feature` was required
    pub fn add_fallback_flag(&mut self, feature: &'static str, flag: &str) {
        self.fallback_flags.push((feature, flag.to_string()));
    }

    /// Collect everything into a [`Program`]
    pub fn finish(mut self, name: &str, report: ValidationReport) -> Program {
        for (feature, flag) in std::mem::take(&mut self.fallback_flags) {
            if !self.features.contains(feature) {
                self.build_flags.insert(flag);
            }
        }

        let setup = self.scopes.into_iter().flatten().chain(self.deferred).collect();
        Program {
            name: name.to_string(),
            platform: self.platform,
            declarations: self.declarations,
            globals: self.globals,
            setup,
            defines: self.defines,
            build_flags: self.build_flags,
            libraries: self.libraries,
            platformio_options: self.platformio_options,
            report,
        }
    }
}

/// Machine-readable summary of a build
#[derive(Debug, Clone, Serialize)]
pub struct BuildManifest<'a> {
    pub name: &'a str,
    pub platform: Platform,
    pub defines: &'a BTreeMap<String, Option<String>>,
    pub build_flags: &'a BTreeSet<String>,
    pub libraries: &'a BTreeMap<String, Option<String>>,
    pub platformio_options: &'a BTreeMap<String, String>,
    pub warnings: usize,
}

/// One build file of a [`Program`], rendered through `Display`
struct Rendered<'a>(&'a Program, fn(&Program, &mut fmt::Formatter<'_>) -> fmt::Result);

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.1)(self.0, f)
    }
}

/// The generated build files
#[derive(Debug, Clone)]
pub struct Program {
    name: String,
    platform: Platform,
    declarations: Vec<(String, String)>,
    globals: Vec<String>,
    setup: Vec<Statement>,
    defines: BTreeMap<String, Option<String>>,
    build_flags: BTreeSet<String>,
    libraries: BTreeMap<String, Option<String>>,
    platformio_options: BTreeMap<String, String>,
    report: ValidationReport,
}

impl Program {
    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target platform
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// `src/main.cpp`
    pub fn main_cpp(&self) -> String {
        Rendered(self, Self::write_main_cpp).to_string()
    }

    /// `src/esphome/core/defines.h`
    pub fn defines_h(&self) -> String {
        Rendered(self, Self::write_defines_h).to_string()
    }

    /// `platformio.ini`
    pub fn platformio_ini(&self) -> String {
        Rendered(self, Self::write_platformio_ini).to_string()
    }

    fn write_main_cpp(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        out.write_str("// Auto generated code by espgen\n")?;
        out.write_str("// ========== AUTO GENERATED INCLUDE BLOCK BEGIN ===========\n")?;
        out.write_str("#include \"esphome.h\"\n")?;
        out.write_str("using namespace esphome;\n")?;
        for (class, id) in &self.declarations {
            writeln!(out, "{class} *{id};")?;
        }
        for global in &self.globals {
            writeln!(out, "{global};")?;
        }
        out.write_str("// ========== AUTO GENERATED INCLUDE BLOCK END ===========\n\n")?;
        out.write_str("void setup() {\n")?;
        out.write_str("  // ========== AUTO GENERATED CODE BEGIN ===========\n")?;
        for statement in &self.setup {
            statement.render(1, out)?;
        }
        out.write_str("  // =========== AUTO GENERATED CODE END ============\n")?;
        out.write_str("  App.setup();\n}\n\n")?;
        out.write_str("void loop() {\n  App.loop();\n}\n")
    }

    fn write_defines_h(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        out.write_str("#pragma once\n")?;
        for (name, value) in &self.defines {
            match value {
                Some(value) => writeln!(out, "#define {name} {value}")?,
                None => writeln!(out, "#define {name}")?,
            }
        }
        Ok(())
    }

    fn write_platformio_ini(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(out, "[env:{}]", self.name)?;
        for (key, value) in &self.platformio_options {
            writeln!(out, "{key} = {value}")?;
        }
        if !self.build_flags.is_empty() {
            out.write_str("build_flags =\n")?;
            for flag in &self.build_flags {
                writeln!(out, "    {flag}")?;
            }
        }
        if !self.libraries.is_empty() {
            out.write_str("lib_deps =\n")?;
            for (name, version) in &self.libraries {
                match version {
                    Some(version) => writeln!(out, "    {name}@{version}")?,
                    None => writeln!(out, "    {name}")?,
                }
            }
        }
        Ok(())
    }

    /// Defines, keyed by name
    pub fn defines(&self) -> &BTreeMap<String, Option<String>> {
        &self.defines
    }

    /// Compiler flags
    pub fn build_flags(&self) -> &BTreeSet<String> {
        &self.build_flags
    }

    /// Library dependencies
    pub fn libraries(&self) -> &BTreeMap<String, Option<String>> {
        &self.libraries
    }

    /// Warnings and notes from validation
    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    /// Summary for tooling
    pub fn manifest(&self) -> BuildManifest<'_> {
        BuildManifest {
            name: &self.name,
            platform: self.platform,
            defines: &self.defines,
            build_flags: &self.build_flags,
            libraries: &self.libraries,
            platformio_options: &self.platformio_options,
            warnings: self.report.warnings.len(),
        }
    }

    /// Manifest as pretty-printed JSON
    pub fn manifest_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(&self.manifest()).map_err(|e| ConfigError::Emit(e.to_string()))
    }

    /// Write all build files under `dir`
    pub fn write_to(&self, dir: impl AsRef<Path>) -> ConfigResult<()> {
        let dir = dir.as_ref();
        let core_dir = dir.join("src").join("esphome").join("core");
        std::fs::create_dir_all(&core_dir)?;
        std::fs::write(dir.join("src").join("main.cpp"), self.main_cpp())?;
        std::fs::write(core_dir.join("defines.h"), self.defines_h())?;
        std::fs::write(dir.join("platformio.ini"), self.platformio_ini())?;
        std::fs::write(dir.join("manifest.json"), self.manifest_json()?)?;
        log::info!("wrote build files for {} to {}", self.name, dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(Expr::from(17.0).to_string(), "17.0f");
        assert_eq!(Expr::from(2.8).to_string(), "2.8f");
        assert_eq!(Expr::from(90u32).to_string(), "90");
        assert_eq!(Expr::from(u32::MAX).to_string(), "4294967295UL");
        assert_eq!(Expr::from(-5).to_string(), "-5");
        assert_eq!(Expr::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Expr::List(vec![Expr::var("a"), Expr::var("b")]).to_string(), "{a, b}");
    }

    #[test]
    fn non_finite_floats() {
        assert_eq!(Expr::from(f64::NAN).to_string(), "NAN");
        assert_eq!(Expr::from(f64::INFINITY).to_string(), "INFINITY");
        assert_eq!(Expr::from(f64::NEG_INFINITY).to_string(), "-INFINITY");
        assert_eq!(Expr::from(1e-7).to_string(), "0.0000001f");
    }

    #[test]
    fn nested_blocks_indent() {
        let statement = Statement::Block(vec![
            Statement::Raw("int a = 1;\nint b = 2;".into()),
            Statement::Block(vec![Statement::Local { id: "ap".into(), class: "wifi::WiFiAP".into() }]),
        ]);
        let mut out = String::new();
        statement.render(1, &mut out).unwrap();
        assert_eq!(out, "  {\n    int a = 1;\n    int b = 2;\n    {\n      wifi::WiFiAP ap;\n    }\n  }\n");
    }

    #[test]
    fn platformio_ini_layout() {
        let mut cg = CodeGen::new(Platform::Esp8266, BTreeSet::new());
        cg.add_library("DNSServer", None);
        cg.add_define_value("USE_API_PORT", 6053u32);
        let program = cg.finish("plug", ValidationReport::new());
        assert_eq!(program.platformio_ini(), "[env:plug]\nlib_deps =\n    DNSServer\n");
        assert_eq!(program.defines_h(), "#pragma once\n#define USE_API_PORT 6053\n");
    }

    #[test]
    fn escapes_non_ascii() {
        assert_eq!(cpp_string_escape("°"), "\"\\302\\260\"");
    }

    #[test]
    fn fnv1_known_values() {
        assert_eq!(fnv1_hash(""), 2_166_136_261);
        assert_ne!(fnv1_hash("group_a"), fnv1_hash("group_b"));
    }

    #[test]
    fn unique_ids_skip_taken() {
        let mut cg = CodeGen::new(Platform::Esp8266, BTreeSet::from(["pin_id".to_string()]));
        assert_eq!(cg.unique_id("pin"), "pin_id_2");
        assert_eq!(cg.unique_id("pin"), "pin_id_3");
    }

    #[test]
    fn renders_setup_in_order() {
        let mut cg = CodeGen::new(Platform::Esp8266, BTreeSet::new());
        let relay = cg.new_pvariable("relay", "gpio::GPIOSwitch", vec![]);
        cg.defer(Statement::Raw("relay->set_interlock({});".into()));
        cg.register_component(&relay);
        cg.block(|cg| {
            let ap = cg.local("wifi::WiFiAP", "wifi_wifiap");
            cg.call_on(&ap, "set_ssid", vec!["home".into()]);
            Ok(())
        })
        .unwrap();
        cg.add_define("USE_SWITCH");
        cg.add_fallback_flag("waveform", "-DUSE_ESP8266_WAVEFORM_STUBS");

        let program = cg.finish("dev", ValidationReport::new());
        let main = program.main_cpp();
        assert!(main.contains("gpio::GPIOSwitch *relay;\n"));
        assert!(main.contains("  relay = new gpio::GPIOSwitch();\n"));
        assert!(main.contains("    wifi::WiFiAP wifi_wifiap_id;\n"));
        assert!(main.contains("    wifi_wifiap_id.set_ssid(\"home\");\n"));
        let register = main.find("App.register_component(relay)").unwrap();
        let interlock = main.find("relay->set_interlock").unwrap();
        assert!(register < interlock);
        assert!(program.defines_h().contains("#define USE_SWITCH\n"));
        assert!(program.build_flags().contains("-DUSE_ESP8266_WAVEFORM_STUBS"));
    }

    #[test]
    fn required_feature_suppresses_fallback() {
        let mut cg = CodeGen::new(Platform::Esp8266, BTreeSet::new());
        cg.add_fallback_flag("waveform", "-DUSE_ESP8266_WAVEFORM_STUBS");
        cg.require_feature("waveform");
        let program = cg.finish("dev", ValidationReport::new());
        assert!(program.build_flags().is_empty());
    }
}
