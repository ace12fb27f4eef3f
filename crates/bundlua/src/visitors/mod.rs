//! Visitors over Lua source
//!
//! Contains the `require` discovery pass that classifies each call site as a
//! static dependency or a dynamic reference.

mod require_discovery;

pub use require_discovery::{
    DynamicReference, RequireDiscoveryVisitor, RequireReference, discover_requires,
};
