//! End-to-end compiles of complete Kauf device configurations

mod common;

use common::{write_config, PLF10, RGB_BULB};
use espgen_schemas::{compile_str, load_file, Compiler, ConfigError, IssueType, Platform};

#[test]
fn plug_compiles_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, PLF10);

    let config = load_file(&path).unwrap();
    let program = Compiler::new(config).compile().unwrap();
    assert_eq!(program.name(), "kauf-plug");
    assert_eq!(program.platform(), Platform::Esp8266);

    let out = dir.path().join("build");
    program.write_to(&out).unwrap();
    let main = std::fs::read_to_string(out.join("src").join("main.cpp")).unwrap();
    assert_eq!(main, program.main_cpp());
    let defines = std::fs::read_to_string(out.join("src/esphome/core/defines.h")).unwrap();
    assert!(defines.starts_with("#pragma once\n"));
    assert!(defines.contains("#define KAUF_PRODUCT_PLF10\n"));
    assert!(out.join("platformio.ini").is_file());
    assert!(out.join("manifest.json").is_file());
}

#[test]
fn plug_pins_every_entity() {
    let program = compile_str(PLF10).unwrap();
    let main = program.main_cpp();
    assert!(main.contains("esp8266::setup_preferences(100);"));
    assert!(main.contains("relay->set_forced_addr(2);"));
    assert!(main.contains("relay->set_global_addr(addr_alloc);"));
    for addr in [4, 6, 8, 12] {
        assert!(main.contains(&format!("->set_forced_addr({addr});")), "missing forced_addr {addr}");
    }
}

#[test]
fn plug_defines() {
    let program = compile_str(PLF10).unwrap();
    let defines = program.defines();
    for name in [
        "USE_WIFI",
        "USE_WIFI_AP",
        "USE_WEBSERVER",
        "USE_CAPTIVE_PORTAL",
        "USE_SWITCH",
        "USE_SELECT",
        "KAUF_PRODUCT_PLF10",
    ] {
        assert!(defines.contains_key(name), "missing define {name}");
    }
    assert!(program.libraries().contains_key("ESP8266WiFi"));
    assert!(program.libraries().contains_key("DNSServer"));
}

#[test]
fn energy_is_set_up_after_its_power_sensor() {
    let program = compile_str(PLF10).unwrap();
    let main = program.main_cpp();
    let power = main.find("power = new sensor::Sensor();").unwrap();
    let energy = main.find("->set_parent(power);").unwrap();
    assert!(power < energy);
}

#[test]
fn plug_monitors_power() {
    let program = compile_str(PLF10).unwrap();
    let main = program.main_cpp();
    let chip = "kauf_hlw8012_kauf_hlw8012component_id";
    assert!(main.contains(&format!("{chip} = new kauf_hlw8012::Kauf_HLW8012Component();")));
    assert!(main.contains(&format!("{chip}->set_update_interval(10000);")));
    assert!(main.contains(&format!("{chip}->set_power_sensor(power);")));
    assert!(main.contains(&format!("{chip}->set_voltage_divider(2351.0f);")));
    assert!(main.contains(&format!("{chip}->set_timeout(9000);")));
    assert!(main.contains("power->set_unit_of_measurement(\"W\");"));
    assert!(main.contains("set_unit_of_measurement(\"Wh\");"));
    assert!(main.contains("set_accuracy_decimals(3);"));
}

#[test]
fn removed_substitution_is_rejected() {
    let yaml = PLF10.replace("  sub_on_turn_on: \"\"\n", "  light_restore_mode: ALWAYS_ON\n");
    let Err(ConfigError::Schema(report)) = compile_str(&yaml) else {
        panic!("expected a schema error");
    };
    let removed: Vec<_> = report.errors_of(IssueType::RemovedKey).collect();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].path.to_string(), "kauf_deprecations.light_restore_mode");
    assert!(removed[0].message.contains("    restore_mode: ALWAYS_ON\n"));
}

#[test]
fn manifest_summarises_the_build() {
    let program = compile_str(PLF10).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&program.manifest_json().unwrap()).unwrap();
    assert_eq!(manifest["name"], "kauf-plug");
    assert_eq!(manifest["platform"], "esp8266");
    assert!(manifest["defines"].get("USE_WEBSERVER").is_some());
    assert_eq!(manifest["warnings"], program.report().warnings.len());
}

#[test]
fn bulb_streams_over_ddp() {
    let program = compile_str(RGB_BULB).unwrap();
    let main = program.main_cpp();
    assert!(main.contains("bulb->set_forced_addr(40);"));
    assert!(main.contains("new ddp::DDPComponent();"));
    assert!(main.contains("->set_scaling_mode(ddp::DDP_SCALE_STRIP);"));
    assert!(main.contains("new light::PulseLightEffect(\"Pulse\");"));
    assert!(program.defines().contains_key("USE_LIGHT"));
}

#[test]
fn bulb_light_too_close_to_the_frontier() {
    let yaml = RGB_BULB.replace("forced_addr: 40", "forced_addr: 53");
    let err = compile_str(&yaml).unwrap_err();
    assert_eq!(err.path().map(ToString::to_string).as_deref(), Some("light[0].forced_addr"));
    assert_eq!(
        err.to_string(),
        "light[0].forced_addr: Forced address (53) conflicts with esp8266: start_free (64)"
    );
}

#[test]
fn schema_errors_are_reported_together() {
    let yaml = PLF10.replace("pin: GPIO14", "pin: GPIO7").replace("password: secretpass", "password: short");
    let err = compile_str(&yaml).unwrap_err();
    let ConfigError::Schema(report) = err else {
        panic!("expected a schema report, got {err}");
    };
    assert!(report.errors.len() >= 2);
    let paths: Vec<String> = report.errors.iter().map(|e| e.path.to_string()).collect();
    assert!(paths.iter().any(|p| p == "wifi.password"), "{paths:?}");
    assert!(paths.iter().any(|p| p.starts_with("switch[0].pin")), "{paths:?}");
}

#[test]
fn unknown_keys_are_flagged() {
    let yaml = PLF10.replace("    optimistic: true\n    forced_addr: 8", "    optimistic: true\n    colour: red\n    forced_addr: 8");
    let err = compile_str(&yaml).unwrap_err();
    let ConfigError::Schema(report) = err else {
        panic!("expected a schema report, got {err}");
    };
    assert_eq!(report.errors_of(IssueType::UnknownKey).count(), 1);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
