//! Persisted-state footprints per entity type.
//!
//! A forced address pins the first byte of an entity's saved state. The margin
//! is how far past that byte the state extends, and the whole span has to stay
//! below the platform's `start_free`.

/// Switches, numbers, selects and energy totals: one preference slot.
pub const SINGLE_VALUE_MARGIN: u32 = 1;

/// Lights: on/off, brightness, color channels and color mode.
pub const LIGHT_STATE_MARGIN: u32 = 11;

/// WiFi: saved credentials and the fast-connect BSSID/channel block.
pub const WIFI_MARGIN: u32 = 25;

/// Platform name that exposes a static memory frontier.
pub const FRONTIER_PLATFORM: &str = "esp8266";
