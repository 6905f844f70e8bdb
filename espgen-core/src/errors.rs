//! Error Types for Forced-Placement Failures
//!
//! ## Design Philosophy
//!
//! Placement checks run once per entity during the final validation pass of a
//! build, so the errors follow the same rules as the rest of the core:
//!
//! 1. **Small Size**: every variant carries at most three `u32` operands.
//!
//! 2. **No Heap Allocation**: messages are produced by `Display`, never stored.
//!
//! 3. **Copy Semantics**: errors implement Copy so callers can keep them in a
//!    report and still return them.
//!
//! 4. **Actionable Information**: a frontier overlap carries both numbers in
//!    conflict so the user can move either the entity or the frontier.
//!
//! ## Error Categories
//!
//! All three are user-configuration errors. None is transient, none is retried,
//! and any one of them aborts code generation for the whole build.
//!
//! - `MissingGlobalAddr`: `forced_addr` without the allocator it needs
//! - `UnsupportedPlatform`: `forced_addr` on a platform without a frontier
//! - `FrontierOverlap`: the pinned range reaches into free memory
//!
//! ## Handling
//!
//! ```rust
//! use espgen_core::{PlacementError, PlacementRequest, PlacementValidator, Margin, Validator, ValidationContext};
//!
//! let validator = PlacementValidator::new(Margin::SINGLE_VALUE);
//! let request = PlacementRequest::forced(99).with_global_addr();
//! let ctx = ValidationContext::esp8266(100);
//!
//! match validator.validate(request, &ctx) {
//!     Ok(()) => {}
//!     Err(PlacementError::FrontierOverlap { forced_addr, start_free, .. }) => {
//!         assert_eq!((forced_addr, start_free), (99, 100));
//!     }
//!     Err(other) => panic!("unexpected {other}"),
//! }
//! ```

use thiserror_no_std::Error;

use crate::constants::FRONTIER_PLATFORM;

/// Result type for placement checks
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Forced-placement errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    /// `forced_addr` is set but no `global_addr` allocator is referenced
    #[error("Forced_addr requires global_addr")]
    MissingGlobalAddr {
        /// The requested address
        forced_addr: u32,
    },

    /// `forced_addr` is set but the platform declares no memory frontier
    #[error("Forced_addr is only compatible with {} platform", FRONTIER_PLATFORM)]
    UnsupportedPlatform {
        /// The requested address
        forced_addr: u32,
    },

    /// The pinned range `[forced_addr, forced_addr + margin]` reaches the frontier
    #[error("Forced address ({forced_addr}) conflicts with {}: start_free ({start_free})", FRONTIER_PLATFORM)]
    FrontierOverlap {
        /// The requested address
        forced_addr: u32,
        /// Footprint of the entity type that asked for the address
        margin: u32,
        /// First free address declared by the platform
        start_free: u32,
    },
}

impl PlacementError {
    /// Stable kind name, suitable for matching in tooling output
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingGlobalAddr { .. } => "ForcedAddrRequiresGlobalAddr",
            Self::UnsupportedPlatform { .. } => "ForcedAddrWrongPlatform",
            Self::FrontierOverlap { .. } => "ForcedAddrOverlapsFrontier",
        }
    }

    /// The address that was rejected
    pub const fn forced_addr(&self) -> u32 {
        match self {
            Self::MissingGlobalAddr { forced_addr }
            | Self::UnsupportedPlatform { forced_addr }
            | Self::FrontierOverlap { forced_addr, .. } => *forced_addr,
        }
    }

    /// The configuration key the user has to edit to fix this error
    pub const fn key(&self) -> &'static str {
        match self {
            Self::MissingGlobalAddr { .. } => "global_addr",
            Self::UnsupportedPlatform { .. } | Self::FrontierOverlap { .. } => "forced_addr",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            PlacementError::MissingGlobalAddr { forced_addr: 1 }.kind(),
            "ForcedAddrRequiresGlobalAddr"
        );
        assert_eq!(
            PlacementError::UnsupportedPlatform { forced_addr: 1 }.kind(),
            "ForcedAddrWrongPlatform"
        );
        assert_eq!(
            PlacementError::FrontierOverlap { forced_addr: 1, margin: 1, start_free: 2 }.kind(),
            "ForcedAddrOverlapsFrontier"
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn overlap_message_names_both_operands() {
        let err = PlacementError::FrontierOverlap { forced_addr: 99, margin: 1, start_free: 100 };
        assert_eq!(
            err.to_string(),
            "Forced address (99) conflicts with esp8266: start_free (100)"
        );
        assert_eq!(err.forced_addr(), 99);
        assert_eq!(err.key(), "forced_addr");
    }

    #[cfg(feature = "std")]
    #[test]
    fn wrong_platform_message_names_the_frontier_platform() {
        let err = PlacementError::UnsupportedPlatform { forced_addr: 10 };
        assert_eq!(err.to_string(), "Forced_addr is only compatible with esp8266 platform");
        assert_eq!(err.key(), "forced_addr");
    }

    #[test]
    fn error_is_small() {
        assert!(core::mem::size_of::<PlacementError>() <= 16);
    }
}
