//! Entities held by the registry.

pub mod env;
pub mod library;
pub mod module;

pub use env::{keys, ConfigValue, Configuration, Scalar};
pub use library::{link_name, Library, LinkName};
pub use module::{Module, ModuleConfig, ModuleKind};

/// Handle to a module in a [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// Handle to a library in a [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibraryId(pub usize);
