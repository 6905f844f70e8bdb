//! Compile Pipeline
//!
//! Runs the stages over one [`DeviceConfig`]:
//!
//! 1. platform resolution (exactly one platform block)
//! 2. ID declaration, generation and reference resolution
//! 3. per-module schema pass, collecting every error
//! 4. sensor property inheritance
//! 5. final pass in declaration order, stopping at the first failure
//! 6. code emission
//!
//! The configuration is owned by the compiler and not touched after the
//! final pass starts.

use espgen_core::{PlacementValidator, ValidationContext, Validator};

use crate::codegen::{CodeGen, Program};
use crate::components::sensor::inherit_power_properties;
use crate::components::{check_entity_names, check_entity_web_server, FinalContext};
use crate::config::DeviceConfig;
use crate::registry::IdRegistry;
use crate::types::Platform;
use crate::validation::{from_placement_error, SchemaContext, ValidationReport};
use crate::{ConfigError, ConfigResult};

/// Turns a parsed configuration into a [`Program`]
pub struct Compiler {
    config: DeviceConfig,
}

/// Outcome of the validation stages
pub struct Validated {
    /// Configuration with generated IDs and defaults filled in
    pub config: DeviceConfig,

    /// Target platform
    pub platform: Platform,

    /// Warnings and notes gathered on the way
    pub report: ValidationReport,

    registry: IdRegistry,
}

impl Compiler {
    /// Compiler over `config`
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    /// Run every stage and emit the build files
    pub fn compile(self) -> ConfigResult<Program> {
        let validated = self.validate()?;
        emit(validated)
    }

    /// Run the validation stages only
    pub fn validate(mut self) -> ConfigResult<Validated> {
        let platform = self.config.platform()?;
        log::debug!("compiling {} for {platform}", self.config.esphome.name);

        let registry = self.resolve_ids()?;
        let mut report = self.validate_schema(platform)?;

        inherit_power_properties(&mut self.config.sensor);

        self.validate_final(platform, &mut report)?;
        log::info!(
            "{} validated: {} ids, {} warnings",
            self.config.esphome.name,
            registry.len(),
            report.warnings.len()
        );

        Ok(Validated { config: self.config, platform, report, registry })
    }

    fn resolve_ids(&mut self) -> ConfigResult<IdRegistry> {
        let mut fields = Vec::new();
        for (path, component) in self.config.components_mut() {
            fields.extend(component.id_fields(&path));
        }
        let mut registry = IdRegistry::new();
        registry.resolve(fields)?;
        Ok(registry)
    }

    fn validate_schema(&mut self, platform: Platform) -> ConfigResult<ValidationReport> {
        let mut report = ValidationReport::new();
        let name = self.config.esphome.name.clone();
        {
            let mut ctx = SchemaContext::new(platform, &name, &mut report);
            for (path, component) in self.config.components_mut() {
                component.validate(&mut ctx, &path);
            }
        }
        check_entity_names(&self.config, &mut report);

        if !report.is_valid() {
            log::debug!("schema pass failed with {} errors", report.errors.len());
            return Err(ConfigError::Schema(report));
        }
        Ok(report)
    }

    fn validate_final(&self, platform: Platform, report: &mut ValidationReport) -> ConfigResult<()> {
        check_entity_web_server(&self.config)?;
        let mut ctx = FinalContext::new(&self.config, platform, placement_context(&self.config), report);
        for (path, component) in self.config.components() {
            component.final_validate(&mut ctx, &path)?;
        }
        Ok(())
    }
}

fn emit(validated: Validated) -> ConfigResult<Program> {
    let Validated { config, platform, report, registry } = validated;
    let mut cg = CodeGen::new(platform, registry.ids());
    for (path, component) in config.components() {
        component.to_code(&mut cg, &path)?;
    }
    Ok(cg.finish(&config.esphome.name, report))
}

fn placement_context(config: &DeviceConfig) -> ValidationContext {
    config
        .esp8266
        .as_ref()
        .map_or_else(ValidationContext::without_frontier, |esp8266| esp8266.placement_context())
}

/// Every forced-placement problem of `config`, not just the first
///
/// The compile pipeline stops at the first failing module; this is for
/// tooling that wants the full list.
pub fn audit_placements(config: &DeviceConfig) -> ValidationReport {
    let context = placement_context(config);
    let mut report = ValidationReport::new();
    for (path, component) in config.components() {
        let Some((request, margin)) = component.forced_placement() else {
            continue;
        };
        if let Err(error) = PlacementValidator::new(margin).validate(request, &context) {
            report.add_error(from_placement_error(&path, &error));
        }
    }
    report
}
