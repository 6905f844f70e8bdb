//! Forced-placement checks for espgen
//!
//! Some entities can pin their persisted state at a fixed address so saved
//! values survive firmware rebuilds. The platform declares where free memory
//! starts, and every pinned range has to end before it.
//!
//! Key constraints:
//! - One predicate shared by every entity type, parameterized by margin
//! - Fail fast with exactly one error per entity
//! - `no_std` without alloc
//!
//! ```no_run
//! use espgen_core::{Margin, PlacementRequest, PlacementValidator, ValidationContext, Validator};
//!
//! let validator = PlacementValidator::new(Margin::WIFI);
//! let context = ValidationContext::esp8266(100);
//!
//! match validator.validate(PlacementRequest::forced(74).with_global_addr(), &context) {
//!     Ok(_) => {},  // 74 + 25 < 100
//!     Err(e) => {}, // Report to the user
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod errors;
pub mod placement;
pub mod traits;

// Public API
pub use errors::{PlacementError, PlacementResult};
pub use placement::{check_forced_placement, Margin, MemoryFrontier, PlacementRequest, PlacementValidator};
pub use traits::{Placed, ValidationContext, Validator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
