pub mod compose;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod graph;
pub mod includes;
pub mod manifest;
pub mod model;
pub mod plan;
pub mod profiles;
pub mod registry;
pub mod settings;
pub mod sources;

pub use diagnostics::{Diagnostic, Diagnostics, Level};
pub use engine::{Engine, RunSummary};
pub use error::{BuildError, Result};
pub use graph::{LinkClosure, LinkEntry, Resolver};
pub use includes::{analyze, IncludeReport, ReferenceGraph, ScanOptions, SourceTree};
pub use manifest::Manifest;
pub use model::{ConfigValue, Configuration, Library, LibraryId, Module, ModuleConfig, ModuleId, ModuleKind};
pub use plan::{BuildPlan, CommandLineEmitter, EmitEvent, PlanEmitter, RecordingEmitter};
pub use profiles::ProfileSelection;
pub use registry::Registry;
pub use settings::{BuildSettings, SettingsOverrides};
