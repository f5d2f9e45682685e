//! Domain layer value types and invariants.

pub mod identity;
pub mod tenant;
pub mod url;
