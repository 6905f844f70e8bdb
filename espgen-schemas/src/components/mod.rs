//! Configuration modules
//!
//! Each module owns its config struct and implements [`Component`]: which
//! IDs it declares, how it validates itself, what it checks against the
//! whole configuration, and the C++ it emits.
//!
//! The helpers below are shared by the entity modules: common entity setup,
//! pin expressions, forced-placement checks and setters, unknown-key
//! reporting.

pub mod automation;
pub mod binary_sensor;
pub mod captive_portal;
pub mod ddp;
pub mod esphome;
pub mod globals;
pub mod kauf_deprecations;
pub mod kauf_hlw8012;
pub mod light;
pub mod number;
pub mod output;
pub mod platform;
pub mod select;
pub mod sensor;
pub mod switch;
pub mod time;
pub mod web_server;
pub mod wifi;

use std::collections::BTreeMap;

use espgen_core::{Margin, PlacementRequest, PlacementValidator, ValidationContext, Validator};

use crate::codegen::{fnv1_hash, CodeGen, Expr};
use crate::config::{DeviceConfig, EntityConfig, EntityWebServer, Extra, ForcedPlacement};
use crate::path::ConfigPath;
use crate::registry::{IdField, IdKind};
use crate::types::{check_icon, Pin, PinUsage, Platform};
use crate::validation::{IssueType, SchemaContext, ValidationIssue, ValidationReport};
use crate::{ConfigError, ConfigResult};

/// One configuration module
pub trait Component {
    /// Domain name, e.g. `switch`
    fn domain(&self) -> &'static str;

    /// IDs this module declares or references
    fn id_fields(&mut self, _path: &ConfigPath) -> Vec<IdField<'_>> {
        Vec::new()
    }

    /// Schema pass. Record every problem; never stop early.
    fn validate(&mut self, _ctx: &mut SchemaContext<'_>, _path: &ConfigPath) {}

    /// Forced-placement fields and margin, for modules that support them
    fn forced_placement(&self) -> Option<(PlacementRequest, Margin)> {
        None
    }

    /// Whole-configuration checks. The first error aborts the build.
    fn final_validate(&self, ctx: &mut FinalContext<'_>, path: &ConfigPath) -> ConfigResult<()> {
        check_forced_placement(self, ctx, path)
    }

    /// Emit C++
    fn to_code(&self, cg: &mut CodeGen, path: &ConfigPath) -> ConfigResult<()>;
}

/// Read-only view of the configuration for the final pass
pub struct FinalContext<'a> {
    /// The validated configuration
    pub config: &'a DeviceConfig,

    /// Target platform
    pub platform: Platform,

    /// Memory frontier, when the platform has one
    pub placement: ValidationContext,

    report: &'a mut ValidationReport,
}

impl<'a> FinalContext<'a> {
    /// Context over `config`, writing warnings into `report`
    pub fn new(
        config: &'a DeviceConfig,
        platform: Platform,
        placement: ValidationContext,
        report: &'a mut ValidationReport,
    ) -> Self {
        Self { config, platform, placement, report }
    }

    /// Non-fatal finding
    pub fn warning(&mut self, issue_type: IssueType, path: ConfigPath, message: impl Into<String>) {
        self.report.add_warning(ValidationIssue::warning(issue_type, path, message));
    }
}

/// Run the shared placement check for `component`
pub fn check_forced_placement<C: Component + ?Sized>(
    component: &C,
    ctx: &FinalContext<'_>,
    path: &ConfigPath,
) -> ConfigResult<()> {
    let Some((request, margin)) = component.forced_placement() else {
        return Ok(());
    };
    PlacementValidator::new(margin).validate(request, &ctx.placement).map_err(|source| {
        log::debug!("{path}: {} ({source})", source.kind());
        ConfigError::Placement { path: path.key(source.key()), source }
    })
}

/// `set_forced_hash`, `set_forced_addr` and `set_global_addr`, when configured
pub fn emit_placement(cg: &mut CodeGen, var: &str, placement: &ForcedPlacement) {
    if let Some(hash) = placement.forced_hash {
        cg.call(var, "set_forced_hash", vec![hash.into()]);
    }
    if let Some(addr) = placement.forced_addr {
        cg.call(var, "set_forced_addr", vec![addr.into()]);
    }
    if let Some(global) = &placement.global_addr {
        cg.call(var, "set_global_addr", vec![Expr::var(global)]);
    }
}

/// References made by the placement fragment and the entity's web page layout
pub fn shared_references<'a>(
    layout: &'a Option<EntityWebServer>,
    placement: Option<&'a ForcedPlacement>,
    path: &ConfigPath,
) -> Vec<IdField<'a>> {
    let mut fields = Vec::new();
    if let Some(global) = placement.and_then(|p| p.global_addr.as_deref()) {
        fields.push(IdField::Reference { id: global, kind: IdKind::Globals, path: path.key("global_addr") });
    }
    if let Some(group) = layout.as_ref().and_then(|ws| ws.sorting_group_id.as_deref()) {
        fields.push(IdField::Reference {
            id: group,
            kind: IdKind::SortingGroup,
            path: path.key("web_server").key("sorting_group_id"),
        });
    }
    fields
}

/// Report keys the module does not know, with a hint for removed ones
pub fn report_extra(
    ctx: &mut SchemaContext<'_>,
    path: &ConfigPath,
    extra: &Extra,
    owner: &str,
    removed: &[(&str, &str)],
) {
    for key in extra.keys() {
        match removed.iter().find(|(name, _)| name == key) {
            Some((_, hint)) => ctx.error(IssueType::RemovedKey, path.key(key), *hint),
            None => ctx.error(
                IssueType::UnknownKey,
                path.key(key),
                format!("[{key}] is an invalid option for [{owner}]."),
            ),
        }
    }
}

/// Checks shared by every entity
pub fn validate_entity(ctx: &mut SchemaContext<'_>, path: &ConfigPath, entity: &EntityConfig) {
    if entity.name.trim().is_empty() {
        ctx.error(IssueType::MissingField, path.key("name"), "Entity name must not be empty");
    }
    if let Some(icon) = &entity.icon {
        if let Err(message) = check_icon(icon) {
            ctx.error(IssueType::InvalidValue, path.key("icon"), message);
        }
    }
}

/// Object ID the firmware derives from an entity name
pub fn object_id(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            'a'..='z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

/// Two entities of one domain may not share a name
pub fn check_entity_names(config: &DeviceConfig, report: &mut ValidationReport) {
    let mut seen: BTreeMap<(String, String), usize> = BTreeMap::new();
    for (path, entity) in config.entities() {
        let domain = path.domain().unwrap_or_default().to_string();
        let key = (domain.clone(), object_id(&entity.name));
        let count = seen.entry(key).or_insert(0);
        *count += 1;
        if *count == 2 {
            report.add_error(ValidationIssue::error(
                IssueType::Duplicate,
                path.key("name"),
                format!(
                    "Duplicate {domain} entity with name '{}' found. Each entity must have a unique name within its domain.",
                    entity.name
                ),
            ));
        }
    }
}

/// Entity options that only make sense with a web server
pub fn check_entity_web_server(config: &DeviceConfig) -> ConfigResult<()> {
    if config.web_server.is_some() {
        return Ok(());
    }
    for (path, entity) in config.entities() {
        if entity.web_server.is_some() {
            return Err(ConfigError::invalid(
                path.key("web_server"),
                "Entity web_server options require the web_server component",
            ));
        }
    }
    Ok(())
}

/// Name, visibility, icon and category setters shared by every entity
pub fn setup_entity(cg: &mut CodeGen, var: &str, entity: &EntityConfig) {
    cg.call(var, "set_name", vec![entity.name.as_str().into()]);
    cg.call(var, "set_object_id", vec![object_id(&entity.name).into()]);
    if entity.disabled_by_default {
        cg.call(var, "set_disabled_by_default", vec![true.into()]);
    }
    if entity.internal {
        cg.call(var, "set_internal", vec![true.into()]);
    }
    if let Some(icon) = &entity.icon {
        cg.call(var, "set_icon", vec![icon.as_str().into()]);
    }
    if let Some(category) = entity.entity_category {
        cg.call(var, "set_entity_category", vec![Expr::raw(category.cpp())]);
    }
    let web_server = cg.provided("web_server").map(str::to_string);
    if let (Some(layout), Some(web_server)) = (&entity.web_server, web_server) {
        let weight = layout.sorting_weight.unwrap_or(web_server::DEFAULT_SORTING_WEIGHT);
        let group = layout.sorting_group_id.as_deref().map(fnv1_hash).unwrap_or(0);
        cg.add_define("USE_WEBSERVER_SORTING");
        cg.call(
            &web_server,
            "add_entity_config",
            vec![Expr::var(var), weight.into(), group.into()],
        );
    }
}

/// Allocate a GPIO pin object and return its variable
pub fn pin_expression(cg: &mut CodeGen, pin: &Pin, usage: PinUsage) -> String {
    let mode = pin.effective_mode(usage);
    let (class, prefix, number) = match cg.platform() {
        Platform::Esp8266 => ("esp8266::ESP8266GPIOPin", "esp8266_esp8266gpiopin", Expr::from(pin.number)),
        Platform::Esp32 => (
            "esp32::ESP32InternalGPIOPin",
            "esp32_esp32internalgpiopin",
            Expr::raw(format!("::GPIO_NUM_{}", pin.number)),
        ),
    };
    let id = cg.unique_id(prefix);
    let var = cg.new_pvariable(&id, class, vec![]);
    cg.call(&var, "set_pin", vec![number]);
    cg.call(&var, "set_inverted", vec![pin.inverted.into()]);
    cg.call(&var, "set_flags", vec![Expr::raw(mode.flags_expr())]);
    var
}

/// Record a pin problem at `path`
pub fn validate_pin(ctx: &mut SchemaContext<'_>, path: ConfigPath, pin: &Pin, usage: PinUsage) {
    if let Err(message) = pin.check(ctx.platform, usage) {
        ctx.error(IssueType::PlatformMismatch, path, message);
    }
}

/// ID filled in by the registry
pub fn required_id<'a>(id: &'a Option<String>, path: &ConfigPath) -> ConfigResult<&'a str> {
    id.as_deref()
        .ok_or_else(|| ConfigError::invalid(path.key("id"), "ID was not resolved before code generation"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids() {
        assert_eq!(object_id("Living Room Lamp"), "living_room_lamp");
        assert_eq!(object_id("Plug #1 (Kitchen)"), "plug__1__kitchen_");
        assert_eq!(object_id("wifi-signal"), "wifi-signal");
    }

    #[test]
    fn unknown_and_removed_keys() {
        let mut report = ValidationReport::new();
        let mut ctx = SchemaContext::new(Platform::Esp8266, "dev", &mut report);
        let mut extra = Extra::new();
        extra.insert("bogus".into(), serde_yaml::Value::Null);
        extra.insert("enable_mdns".into(), serde_yaml::Value::Bool(true));
        report_extra(&mut ctx, &ConfigPath::section("wifi"), &extra, "wifi", &[("enable_mdns", "gone")]);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors_of(IssueType::RemovedKey).count(), 1);
        assert_eq!(report.errors[0].message, "[bogus] is an invalid option for [wifi].");
    }

    #[test]
    fn placement_setters_in_order() {
        let mut cg = CodeGen::new(Platform::Esp8266, Default::default());
        let placement = ForcedPlacement {
            forced_addr: Some(12),
            forced_hash: Some(77),
            global_addr: Some("alloc".into()),
        };
        emit_placement(&mut cg, "relay", &placement);
        let program = cg.finish("dev", ValidationReport::new());
        let main = program.main_cpp();
        let hash = main.find("relay->set_forced_hash(77);").unwrap();
        let addr = main.find("relay->set_forced_addr(12);").unwrap();
        let global = main.find("relay->set_global_addr(alloc);").unwrap();
        assert!(hash < addr && addr < global);
    }

    #[test]
    fn esp32_pins_use_gpio_num() {
        let mut cg = CodeGen::new(Platform::Esp32, Default::default());
        let var = pin_expression(&mut cg, &Pin::output(4), PinUsage::Output);
        assert_eq!(var, "esp32_esp32internalgpiopin_id");
        let program = cg.finish("dev", ValidationReport::new());
        assert!(program.main_cpp().contains("esp32_esp32internalgpiopin_id->set_pin(::GPIO_NUM_4);"));
    }
}
