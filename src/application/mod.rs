//! Application layer: handler contracts' collaborators and built-in pages.

pub mod builtin;
pub mod error;
pub mod messages;
pub mod repos;
