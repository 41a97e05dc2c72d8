//! Integration tests for module dependency resolution.
//!
//! Each test writes a small project to a temp directory, loads its manifest
//! and runs the engine against a recording emitter.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use modgraph::{
    BuildError, BuildSettings, EmitEvent, Engine, Library, LibraryId, LinkClosure, Manifest, RecordingEmitter,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("Failed to create dirs");
    fs::write(path, content).expect("Failed to write file");
}

/// Creates a project with one source file per module and the given manifest.
fn create_project(manifest: &str, modules: &[&str]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    for module in modules {
        create_file(
            temp_dir.path(),
            &format!("modules/{}/src/{}.c", module, module),
            "int x;\n",
        );
    }
    create_file(temp_dir.path(), "modgraph.toml", manifest);
    temp_dir
}

fn load_engine(dir: &TempDir) -> Engine {
    let manifest = Manifest::load(&dir.path().join("modgraph.toml")).expect("Failed to load manifest");
    let settings = manifest.configure(BuildSettings::default());
    Engine::new(manifest, settings)
}

const DIAMOND: &str = r#"
[targets]
modules = ["app"]

[[module]]
name = "app"
kind = "executable"
depends = ["ui", "net"]

[[module]]
name = "ui"
kind = "static"
depends = ["core"]

[[module]]
name = "net"
kind = "static"
depends = ["core"]

[[module]]
name = "core"
kind = "static"
"#;

// ============================================================================
// Build Order Tests
// ============================================================================

mod build_order {
    use super::*;

    #[test]
    fn test_dependencies_emitted_before_dependents() {
        let dir = create_project(DIAMOND, &["app", "ui", "net", "core"]);
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        let summary = engine.run(&mut emitter).expect("run should succeed");

        assert_eq!(summary.order, vec!["core", "ui", "net", "app"]);
        assert_eq!(emitter.emitted_modules(), vec!["core", "ui", "net", "app"]);
    }

    #[test]
    fn test_shared_dependency_built_once() {
        let dir = create_project(DIAMOND, &["app", "ui", "net", "core"]);
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        engine.run(&mut emitter).expect("run should succeed");

        let core_builds = emitter
            .emitted_modules()
            .into_iter()
            .filter(|m| *m == "core")
            .count();
        assert_eq!(core_builds, 1);
    }

    #[test]
    fn test_naming_a_module_twice_resolves_it_once() {
        let dir = create_project(DIAMOND, &["app", "ui", "net", "core"]);
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        let names = vec!["core".to_string(), "app".to_string(), "core".to_string()];
        let summary = engine.run_named(&names, &mut emitter).expect("run should succeed");

        assert_eq!(summary.order, vec!["core", "ui", "net", "app"]);
        assert_eq!(emitter.plans().len(), 4);
    }

    #[test]
    fn test_post_action_announces_artifact() {
        let dir = create_project(
            r#"
[[module]]
name = "core"
kind = "static"
pre_actions = ["echo start"]
post_actions = ["echo end"]
"#,
            &["core"],
        );
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        engine.run(&mut emitter).expect("run should succeed");

        let events = emitter.events();
        assert!(matches!(&events[0], EmitEvent::PreAction { command, .. } if command == "echo start"));
        assert!(matches!(&events[1], EmitEvent::Emit { plan } if plan.module == "core"));
        assert!(matches!(&events[2], EmitEvent::PostAction { command, .. } if command == "echo end"));
        assert!(matches!(&events[3], EmitEvent::PostAction { command, .. } if command.starts_with("echo Done building")));
    }
}

// ============================================================================
// Cycle Detection Tests
// ============================================================================

mod cycles {
    use super::*;

    #[test]
    fn test_two_module_cycle_fails_with_chain() {
        let dir = create_project(
            r#"
[targets]
modules = ["a"]

[[module]]
name = "a"
kind = "static"
depends = ["b"]

[[module]]
name = "b"
kind = "static"
depends = ["a"]
"#,
            &["a", "b"],
        );
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        let err = engine.run(&mut emitter).expect_err("cycle must fail");

        match &err {
            BuildError::CircularDependency { module, chain } => {
                assert_eq!(module, "a");
                assert_eq!(chain, &vec!["a".to_string(), "b".to_string(), "a".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(
            err.to_string(),
            "Circular dependency detected when processing module 'a': a -> b -> a"
        );
        assert!(emitter.events().is_empty());
    }

    #[test]
    fn test_cycle_below_acyclic_branch_emits_nothing() {
        let dir = create_project(
            r#"
[targets]
modules = ["app"]

[[module]]
name = "app"
kind = "executable"
depends = ["core", "a"]

[[module]]
name = "core"
kind = "static"

[[module]]
name = "a"
kind = "static"
depends = ["b"]

[[module]]
name = "b"
kind = "static"
depends = ["a"]
"#,
            &["app", "core", "a", "b"],
        );
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        let err = engine.run(&mut emitter).expect_err("cycle must fail");

        assert!(matches!(err, BuildError::CircularDependency { .. }));
        assert!(emitter.events().is_empty(), "core must not be emitted either");
    }

    #[test]
    fn test_unknown_dependency_suggests_similar_name() {
        let dir = create_project(
            r#"
[[module]]
name = "app"
kind = "executable"
depends = ["coer"]

[[module]]
name = "core"
kind = "static"
"#,
            &["app", "core"],
        );
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        let err = engine.run(&mut emitter).expect_err("unknown dependency must fail");

        assert_eq!(
            err.to_string(),
            "Couldn't find module 'coer' required by module 'app' (did you mean 'core'?)"
        );
    }
}

// ============================================================================
// Link Closure Tests
// ============================================================================

mod link_closure {
    use super::*;

    #[test]
    fn test_closure_follows_declaration_order() {
        let dir = create_project(DIAMOND, &["app", "ui", "net", "core"]);
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        engine.run(&mut emitter).expect("run should succeed");

        let plans = emitter.plans();
        let app = plans.iter().find(|p| p.module == "app").expect("app plan");
        assert_eq!(app.libraries, vec!["ui", "core", "net"]);

        let out = engine.output_root().clone();
        assert!(app.library_paths.contains(&out.join("core").display().to_string()));
        assert!(app
            .include_paths
            .contains(&dir.path().join("modules/core/src").display().to_string()));
    }

    #[test]
    fn test_first_library_occurrence_wins() {
        let mut from_x = Library::new(LibraryId(0), "z");
        from_x.add_library_path(PathBuf::from("/x/lib"));
        let mut from_y = Library::new(LibraryId(1), "z");
        from_y.add_library_path(PathBuf::from("/y/lib"));

        let mut x = LinkClosure::new();
        x.absorb(&from_x);
        let mut y = LinkClosure::new();
        y.absorb(&from_y);

        let mut m = LinkClosure::new();
        m.extend_from(&x);
        m.extend_from(&y);

        assert_eq!(m.library_paths(), vec![PathBuf::from("/x/lib")]);
    }

    #[test]
    fn test_prebuilt_library_dependency() {
        let dir = create_project(
            r#"
[[module]]
name = "app"
kind = "executable"
depends = ["png"]

[[library]]
name = "png"
include_paths = ["third_party/png/include"]
library_paths = ["third_party/png/lib"]
binaries = ["png"]
prebuilt = true
"#,
            &["app"],
        );
        create_file(dir.path(), "third_party/png/include/png.h", "");
        create_file(dir.path(), "third_party/png/lib/libpng.a", "");
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        engine.run(&mut emitter).expect("run should succeed");

        let plans = emitter.plans();
        assert_eq!(plans[0].libraries, vec!["png"]);
        assert_eq!(
            plans[0].library_paths,
            vec![dir.path().join("third_party/png/lib").display().to_string()]
        );
        assert!(engine
            .diagnostics()
            .entries()
            .iter()
            .any(|d| d.message.contains("Assuming library('png') was meant instead")));
    }
}

// ============================================================================
// Composition Tests
// ============================================================================

mod composition {
    use super::*;

    const COMPILERS: &str = r#"
[[profile]]
name = "fast"

[profile.env]
CC = "fast-cc"
CCFLAGS = ["-O3"]

[[module]]
name = "custom"
kind = "static"
inherits = ["fast"]

[module.env]
CC = "custom-cc"
CCFLAGS = ["-g"]

[[module]]
name = "plain"
kind = "static"
inherits = ["fast"]
"#;

    #[test]
    fn test_local_compiler_survives_inheritance() {
        let dir = create_project(COMPILERS, &["custom", "plain"]);
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        engine.run(&mut emitter).expect("run should succeed");

        let plans = emitter.plans();
        let custom = plans.iter().find(|p| p.module == "custom").expect("custom plan");
        let plain = plans.iter().find(|p| p.module == "plain").expect("plain plan");
        assert_eq!(custom.compiler.as_deref(), Some("custom-cc"));
        assert_eq!(plain.compiler.as_deref(), Some("fast-cc"));
    }

    #[test]
    fn test_collections_append_inherited_values() {
        let dir = create_project(COMPILERS, &["custom", "plain"]);
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        engine.run(&mut emitter).expect("run should succeed");

        let plans = emitter.plans();
        let custom = plans.iter().find(|p| p.module == "custom").expect("custom plan");
        assert_eq!(custom.cc_flags, vec!["-g", "-O3"]);
    }

    #[test]
    fn test_diamond_inheritance_merges_shared_ancestor_once() {
        let dir = create_project(
            r#"
[[profile]]
name = "base"
[profile.env]
CPPDEFINES = ["BASE"]

[[profile]]
name = "left"
inherits = ["base"]
[profile.env]
CPPDEFINES = ["LEFT"]

[[profile]]
name = "right"
inherits = ["base"]
[profile.env]
CPPDEFINES = ["RIGHT"]

[[module]]
name = "core"
kind = "static"
inherits = ["left", "right"]
"#,
            &["core"],
        );
        let mut engine = load_engine(&dir);
        let mut emitter = RecordingEmitter::new();

        engine.run(&mut emitter).expect("run should succeed");

        let plans = emitter.plans();
        let base_count = plans[0].defines.iter().filter(|d| *d == "BASE").count();
        assert_eq!(base_count, 1);
        assert!(plans[0].defines.contains(&"LEFT".to_string()));
        assert!(plans[0].defines.contains(&"RIGHT".to_string()));
    }
}
