//! Core traits for placement checks
//!
//! Keep them simple: a validator sees one request and the build-wide context,
//! nothing else.

use crate::errors::PlacementResult;
use crate::placement::{check_forced_placement, Margin, MemoryFrontier, PlacementRequest};

/// Build-wide facts a placement check may consult
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Memory frontier, present only on the esp8266 platform
    pub frontier: Option<MemoryFrontier>,
}

impl ValidationContext {
    /// Context for an esp8266 build with the given `start_free`
    pub const fn esp8266(start_free: u32) -> Self {
        Self { frontier: Some(MemoryFrontier::new(start_free)) }
    }

    /// Context for a platform without a static frontier
    pub const fn without_frontier() -> Self {
        Self { frontier: None }
    }
}

/// Core validator trait
pub trait Validator {
    /// The type of value this validator handles
    type Value;

    /// Validate a single request
    fn validate(&self, value: Self::Value, context: &ValidationContext) -> PlacementResult<()>;

    /// Footprint this validator checks with
    fn margin(&self) -> Margin;
}

/// Implemented by every entity that can pin its persisted state
pub trait Placed {
    /// Footprint of this entity type
    const MARGIN: Margin;

    /// The entity's placement fields
    fn placement(&self) -> PlacementRequest;

    /// Run the shared check with this entity's margin
    fn check_placement(&self, context: &ValidationContext) -> PlacementResult<()> {
        check_forced_placement(self.placement(), context.frontier, Self::MARGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PlacementError;

    struct Relay {
        forced_addr: Option<u32>,
        global_addr: Option<&'static str>,
    }

    impl Placed for Relay {
        const MARGIN: Margin = Margin::SINGLE_VALUE;

        fn placement(&self) -> PlacementRequest {
            PlacementRequest {
                forced_addr: self.forced_addr,
                forced_hash: None,
                has_global_addr: self.global_addr.is_some(),
            }
        }
    }

    #[test]
    fn placed_uses_its_margin() {
        let relay = Relay { forced_addr: Some(99), global_addr: Some("addr") };
        assert!(matches!(
            relay.check_placement(&ValidationContext::esp8266(100)),
            Err(PlacementError::FrontierOverlap { margin: 1, .. })
        ));
        assert!(relay.check_placement(&ValidationContext::esp8266(101)).is_ok());
    }

    #[test]
    fn default_context_has_no_frontier() {
        assert_eq!(ValidationContext::default(), ValidationContext::without_frontier());
    }
}
