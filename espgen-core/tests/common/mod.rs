//! Shared fixtures for placement integration tests

#![allow(dead_code)]

use espgen_core::{Margin, PlacementRequest};

/// Every footprint an entity module can declare
pub const ALL_MARGINS: [Margin; 3] = [Margin::SINGLE_VALUE, Margin::LIGHT_STATE, Margin::WIFI];

/// Well-formed request for `addr`
pub fn pinned(addr: u32) -> PlacementRequest {
    PlacementRequest::forced(addr).with_global_addr()
}

/// Request for `addr` that forgot its allocator
pub fn unanchored(addr: u32) -> PlacementRequest {
    PlacementRequest::forced(addr)
}
