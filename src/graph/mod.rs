//! Module dependency graph: ordering, cycle detection and link closures.

pub mod closure;
pub mod resolver;

pub use closure::{LinkClosure, LinkEntry};
pub use resolver::Resolver;
