//! Forced-placement validator
//!
//! One shared predicate used by every entity module that can pin its state
//! at a fixed address. Modules differ only in their [`Margin`].
//!
//! ## Rules
//!
//! Checked in this order, first failure wins:
//!
//! ```text
//! forced_addr absent             -> Ok, nothing else is looked at
//! global_addr absent             -> MissingGlobalAddr
//! no frontier (not esp8266)      -> UnsupportedPlatform
//! forced_addr + margin >= start  -> FrontierOverlap
//! otherwise                      -> Ok
//! ```
//!
//! The sum is taken in `u64` so `u32::MAX` addresses compare correctly.
//! `forced_hash` is carried along for code emission and never checked.
//! Two entities asking for overlapping addresses are not detected here: the
//! check only consults the single frontier value.

use crate::constants::{LIGHT_STATE_MARGIN, SINGLE_VALUE_MARGIN, WIFI_MARGIN};
use crate::errors::{PlacementError, PlacementResult};
use crate::traits::{ValidationContext, Validator};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Lowest address not yet claimed by statically placed objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemoryFrontier {
    /// First free address
    pub start_free: u32,
}

impl MemoryFrontier {
    /// Frontier at `start_free`
    pub const fn new(start_free: u32) -> Self {
        Self { start_free }
    }

    /// Whether `[forced_addr, forced_addr + margin]` stays strictly below the frontier
    pub fn admits(&self, forced_addr: u32, margin: Margin) -> bool {
        end_of(forced_addr, margin) < u64::from(self.start_free)
    }

    /// Bytes left between the end of the pinned range and the frontier
    pub fn headroom(&self, forced_addr: u32, margin: Margin) -> Option<u64> {
        u64::from(self.start_free).checked_sub(end_of(forced_addr, margin) + 1)
    }
}

fn end_of(forced_addr: u32, margin: Margin) -> u64 {
    u64::from(forced_addr) + u64::from(margin.get())
}

/// Footprint of an entity type's persisted state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Margin(u32);

impl Margin {
    /// Single-variable entities (switch, number, select, energy total)
    pub const SINGLE_VALUE: Margin = Margin(SINGLE_VALUE_MARGIN);
    /// Lights, which keep brightness and color state
    pub const LIGHT_STATE: Margin = Margin(LIGHT_STATE_MARGIN);
    /// WiFi, the largest reserved block
    pub const WIFI: Margin = Margin(WIFI_MARGIN);

    /// Custom footprint
    pub const fn new(bytes: u32) -> Self {
        Self(bytes)
    }

    /// Footprint in address units
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// What one entity instance asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacementRequest {
    /// Requested fixed address
    pub forced_addr: Option<u32>,
    /// Requested fixed identity hash
    pub forced_hash: Option<u32>,
    /// Whether a `global_addr` allocator is referenced
    pub has_global_addr: bool,
}

impl PlacementRequest {
    /// Request with no placement at all
    pub const fn none() -> Self {
        Self { forced_addr: None, forced_hash: None, has_global_addr: false }
    }

    /// Request pinning `forced_addr`, without an allocator yet
    pub const fn forced(forced_addr: u32) -> Self {
        Self { forced_addr: Some(forced_addr), forced_hash: None, has_global_addr: false }
    }

    /// Mark the allocator reference as present
    pub const fn with_global_addr(mut self) -> Self {
        self.has_global_addr = true;
        self
    }

    /// Attach a fixed identity hash
    pub const fn with_hash(mut self, forced_hash: u32) -> Self {
        self.forced_hash = Some(forced_hash);
        self
    }
}

/// Validator for one entity type, parameterized by its margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementValidator {
    margin: Margin,
}

impl PlacementValidator {
    /// Validator for entities with the given footprint
    pub const fn new(margin: Margin) -> Self {
        Self { margin }
    }
}

impl Validator for PlacementValidator {
    type Value = PlacementRequest;

    fn validate(&self, request: PlacementRequest, context: &ValidationContext) -> PlacementResult<()> {
        check_forced_placement(request, context.frontier, self.margin)
    }

    fn margin(&self) -> Margin {
        self.margin
    }
}

/// Check one request against the platform frontier
pub fn check_forced_placement(
    request: PlacementRequest,
    frontier: Option<MemoryFrontier>,
    margin: Margin,
) -> PlacementResult<()> {
    let Some(forced_addr) = request.forced_addr else {
        return Ok(());
    };

    if !request.has_global_addr {
        return Err(PlacementError::MissingGlobalAddr { forced_addr });
    }

    let Some(frontier) = frontier else {
        return Err(PlacementError::UnsupportedPlatform { forced_addr });
    };

    if !frontier.admits(forced_addr, margin) {
        return Err(PlacementError::FrontierOverlap {
            forced_addr,
            margin: margin.get(),
            start_free: frontier.start_free,
        });
    }

    log_debug!(
        "forced_addr {} (+{}) fits below start_free {}",
        forced_addr,
        margin.get(),
        frontier.start_free
    );
    Ok(())
}
