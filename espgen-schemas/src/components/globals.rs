//! `globals:` entries
//!
//! Besides user state, a `globals` entry serves as the address allocator
//! that forced placement refers to through `global_addr`.

use serde::Deserialize;

use super::Component;
use crate::codegen::{fnv1_hash, CodeGen, Expr};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::validation::{IssueType, SchemaContext};
use crate::ConfigResult;

/// Initial value, kept as the C++ expression the user wrote
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InitialValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl InitialValue {
    fn to_expr(&self) -> Expr {
        match self {
            Self::Int(n) => Expr::Int(*n),
            Self::Float(v) => Expr::Float(*v),
            Self::Bool(b) => Expr::Bool(*b),
            Self::Text(text) => Expr::raw(text.clone()),
        }
    }
}

/// One `globals` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalsConfig {
    pub id: String,

    /// C++ type of the value
    #[serde(rename = "type")]
    pub value_type: String,

    #[serde(default)]
    pub restore_value: bool,

    #[serde(default)]
    pub initial_value: Option<InitialValue>,

    /// Only for restored `std::string` values
    #[serde(default)]
    pub max_restore_data_length: Option<u8>,
}

impl GlobalsConfig {
    fn is_string(&self) -> bool {
        self.value_type.trim() == "std::string"
    }

    fn class(&self) -> String {
        let ty = self.value_type.trim();
        match (self.restore_value, self.max_restore_data_length) {
            (false, _) => format!("globals::GlobalsComponent<{ty}>"),
            (true, Some(len)) if self.is_string() => {
                format!("globals::RestoringGlobalStringComponent<{ty}, {len}>")
            }
            (true, _) => format!("globals::RestoringGlobalsComponent<{ty}>"),
        }
    }
}

impl Component for GlobalsConfig {
    fn domain(&self) -> &'static str {
        "globals"
    }

    fn id_fields(&mut self, path: &ConfigPath) -> Vec<IdField<'_>> {
        vec![IdField::Fixed { id: &self.id, kind: IdKind::Globals, path: path.key("id") }]
    }

    fn validate(&mut self, ctx: &mut SchemaContext<'_>, path: &ConfigPath) {
        if self.value_type.trim().is_empty() {
            ctx.error(IssueType::MissingField, path.key("type"), "A C++ type is required");
        }
        if let Some(len) = self.max_restore_data_length {
            if !self.is_string() || !self.restore_value {
                ctx.error(
                    IssueType::Conflict,
                    path.key("max_restore_data_length"),
                    "max_restore_data_length is only valid for restored std::string globals",
                );
            } else {
                ctx.check_range(path.key("max_restore_data_length"), len, 1, 254);
            }
        }
    }

    fn to_code(&self, cg: &mut CodeGen, _path: &ConfigPath) -> ConfigResult<()> {
        let args: Vec<Expr> = self.initial_value.iter().map(InitialValue::to_expr).collect();
        let var = cg.new_pvariable(&self.id, &self.class(), args);
        cg.register_component(&var);
        if self.restore_value {
            cg.call(&var, "set_name_hash", vec![fnv1_hash(&self.id).into()]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use crate::validation::ValidationReport;

    #[test]
    fn allocator_global() {
        let config: GlobalsConfig = serde_yaml::from_str("{id: addr_alloc, type: int, initial_value: '0'}").unwrap();
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        config.to_code(&mut cg, &ConfigPath::section("globals").index(0)).unwrap();
        let program = cg.finish("dev", ValidationReport::new());
        assert!(program.main_cpp().contains("globals::GlobalsComponent<int> *addr_alloc;"));
        assert!(program.main_cpp().contains("addr_alloc = new globals::GlobalsComponent<int>(0);"));
    }

    #[test]
    fn string_restore_length() {
        let mut config: GlobalsConfig = serde_yaml::from_str(
            "{id: label, type: std::string, restore_value: true, max_restore_data_length: 32}",
        )
        .unwrap();
        assert_eq!(config.class(), "globals::RestoringGlobalStringComponent<std::string, 32>");

        config.restore_value = false;
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(Platform::Esp8266, "dev", &mut report);
        config.validate(&mut ctx, &ConfigPath::section("globals").index(0));
        assert_eq!(report.errors_of(IssueType::Conflict).count(), 1);
    }
}
