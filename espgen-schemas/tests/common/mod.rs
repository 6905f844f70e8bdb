//! Shared device configurations for integration tests

#![allow(dead_code)]

use std::path::PathBuf;

/// Kauf PLF10 smart plug: relay, button, power monitoring, WiFi with a
/// fallback access point and every placement-capable entity pinned.
pub const PLF10: &str = r#"
esphome:
  name: kauf-plug
  friendly_name: Kauf Plug
esp8266:
  board: esp01_1m
  start_free: 100
  global_addr: addr_alloc
globals:
  - id: addr_alloc
    type: int
    restore_value: false
    initial_value: 0
time:
  - platform: sntp
    id: sntp_time
wifi:
  ssid: home
  password: secretpass
  min_auth_mode: WPA2
  forced_addr: 12
  global_addr: addr_alloc
  ap:
    ssid: Kauf Plug
web_server:
  version: 3
  product: plf10
  featured_entity: Relay
  sorting_groups:
    - id: group_power
      name: Power
captive_portal:
  product: plf10
kauf_deprecations:
  sub_on_turn_on: ""
switch:
  - platform: gpio
    id: relay
    name: Relay
    pin: GPIO14
    restore_mode: RESTORE_DEFAULT_OFF
    forced_addr: 2
    global_addr: addr_alloc
    web_server:
      sorting_group_id: group_power
binary_sensor:
  - platform: gpio
    name: Button
    pin:
      number: GPIO13
      inverted: true
      mode:
        input: true
        pullup: true
  - platform: switch
    name: Relay State
    source_id: relay
sensor:
  - platform: total_daily_energy
    name: Energy Today
    power_id: power
    forced_addr: 4
    global_addr: addr_alloc
  - platform: kauf_hlw8012
    sel_pin:
      number: GPIO12
      inverted: true
    cf_pin: GPIO4
    cf1_pin: GPIO5
    voltage:
      name: Voltage
    current:
      name: Current
    power:
      id: power
      name: Power
    update_interval: 10s
    early_publish_percent: 5
number:
  - platform: template
    name: Max Power
    min_value: 0
    max_value: 1800
    step: 1
    optimistic: true
    restore_value: true
    forced_addr: 6
    global_addr: addr_alloc
select:
  - platform: template
    name: LED Mode
    options: [Off, Linked, Inverted]
    optimistic: true
    forced_addr: 8
    global_addr: addr_alloc
"#;

/// Kauf RGB bulb streaming colours over DDP
pub const RGB_BULB: &str = r#"
esphome:
  name: kauf-bulb
esp8266:
  board: esp01_1m
  start_free: 64
globals:
  - id: addr_alloc
    type: int
wifi:
  networks:
    - ssid: home
      password: secretpass
      priority: 5
  min_auth_mode: WPA2
ddp:
output:
  - platform: esp8266_pwm
    id: out_red
    pin: GPIO4
  - platform: esp8266_pwm
    id: out_green
    pin: GPIO12
  - platform: esp8266_pwm
    id: out_blue
    pin: GPIO14
light:
  - platform: rgb
    id: bulb
    name: Bulb
    red: out_red
    green: out_green
    blue: out_blue
    effects:
      - pulse:
      - ddp:
          brightness_scaling: STRIP
    forced_addr: 40
    global_addr: addr_alloc
"#;

/// Smallest valid esp8266 device with an allocator and the given frontier
pub fn esp8266_device(start_free: u32) -> String {
    format!(
        "
esphome:
  name: fixture
esp8266:
  board: esp01_1m
  start_free: {start_free}
globals:
  - id: addr_alloc
    type: int
"
    )
}

/// Smallest valid esp32 device with an allocator
pub fn esp32_device() -> String {
    "
esphome:
  name: fixture
esp32:
  board: esp32dev
globals:
  - id: addr_alloc
    type: int
"
    .to_string()
}

/// One gpio switch pinned at `addr`
pub fn pinned_switch(addr: u32) -> String {
    format!(
        "switch:
  - platform: gpio
    name: Relay
    pin: GPIO12
    forced_addr: {addr}
    global_addr: addr_alloc
"
    )
}

/// Write `yaml` into `dir` and return its path
pub fn write_config(dir: &tempfile::TempDir, yaml: &str) -> PathBuf {
    let path = dir.path().join("device.yaml");
    std::fs::write(&path, yaml).expect("write fixture");
    path
}
