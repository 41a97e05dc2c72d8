//! Integration tests for CLI commands.
//!
//! These run the built binary against small projects in temp directories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn create_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("Failed to create dirs");
    fs::write(path, content).expect("Failed to write file");
}

fn create_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    create_file(
        dir.path(),
        "modgraph.toml",
        r#"
[project]
name = "demo"
platform = "linux"

[profiles]
available = ["Debug", "Release"]
selected = ["Release"]

[[profile]]
name = "release"
[profile.env]
CPPDEFINES = ["NDEBUG"]

[targets]
modules = ["app"]

[[module]]
name = "app"
kind = "executable"
depends = ["core"]

[[module]]
name = "core"
kind = "static"
"#,
    );
    create_file(dir.path(), "modules/core/src/core.c", "#include \"core.h\"\n");
    create_file(dir.path(), "modules/core/src/core.h", "#include \"util.h\"\n");
    create_file(dir.path(), "modules/core/src/util.h", "#include \"core.h\"\n");
    create_file(dir.path(), "modules/app/src/main.c", "#include <core.h>\n");
    dir
}

fn modgraph(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_modgraph"))
        .arg("--manifest")
        .arg(dir.path().join("modgraph.toml"))
        .args(args)
        .output()
        .expect("Failed to run modgraph")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ============================================================================
// Plan Command Tests
// ============================================================================

mod plan_command {
    use super::*;

    #[test]
    fn test_plan_prints_command_lines_in_order() {
        let dir = create_project();
        let output = modgraph(&dir, &["plan"]);
        assert!(output.status.success());

        let text = stdout(&output);
        let core = text.find("# core").expect("core section");
        let app = text.find("# app").expect("app section");
        assert!(core < app);
        assert!(text.contains("-DNDEBUG"));
        assert!(text.contains("ar rcs"));
        assert!(text.contains("-lcore"));
        assert!(text.contains("profile Release"));
    }

    #[test]
    fn test_plan_json_is_parseable() {
        let dir = create_project();
        let output = modgraph(&dir, &["plan", "--format", "json"]);
        assert!(output.status.success());

        let events: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("valid JSON");
        let plans: Vec<&serde_json::Value> = events
            .as_array()
            .expect("array of events")
            .iter()
            .filter(|e| e["event"] == "emit")
            .collect();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0]["plan"]["module"], "core");
        assert_eq!(plans[1]["plan"]["kind"], "executable");
    }

    #[test]
    fn test_unknown_format_fails() {
        let dir = create_project();
        let output = modgraph(&dir, &["plan", "--format", "xml"]);
        assert!(!output.status.success());
    }

    #[test]
    fn test_unknown_module_fails_with_suggestion() {
        let dir = create_project();
        let output = modgraph(&dir, &["plan", "apps"]);
        assert!(!output.status.success());
        let err = String::from_utf8_lossy(&output.stderr);
        assert!(err.contains("did you mean 'app'"));
    }
}

// ============================================================================
// Query Command Tests
// ============================================================================

mod query_commands {
    use super::*;

    #[test]
    fn test_order_lists_modules() {
        let dir = create_project();
        let output = modgraph(&dir, &["order"]);
        assert!(output.status.success());
        assert_eq!(stdout(&output), "  1. core\n  2. app\n");
    }

    #[test]
    fn test_sources_lists_discovered_files() {
        let dir = create_project();
        let output = modgraph(&dir, &["sources", "core"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("core.c"));
    }

    #[test]
    fn test_profile_override() {
        let dir = create_project();
        let output = modgraph(&dir, &["--profile", "Debug", "plan"]);
        assert!(output.status.success());
        let text = stdout(&output);
        assert!(text.contains("profile Debug"));
        assert!(!text.contains("-DNDEBUG"));
    }
}

// ============================================================================
// Includes Command Tests
// ============================================================================

mod includes_command {
    use super::*;

    #[test]
    fn test_includes_writes_dot_file() {
        let dir = create_project();
        let dot = dir.path().join("cycles.dot");
        let output = modgraph(&dir, &["includes", "--output", dot.to_str().expect("utf-8 path")]);
        assert!(output.status.success());

        let text = fs::read_to_string(&dot).expect("dot file written");
        assert!(text.starts_with("digraph \"cyclic_dependencies\""));
        assert!(text.contains("\"core\" -> \"util\""));
        assert!(String::from_utf8_lossy(&output.stderr).contains("1 include cycle(s)"));
    }

    #[test]
    fn test_includes_on_explicit_root() {
        let dir = create_project();
        let root = dir.path().join("modules/app/src");
        let output = modgraph(
            &dir,
            &["includes", root.to_str().expect("utf-8 path"), "--view", "detailed"],
        );
        assert!(output.status.success());
        assert!(stdout(&output).contains("\"main\" [label=\"main\", shape=box];"));
    }

    #[test]
    fn test_includes_internal_view_filtered_to_folder() {
        let dir = create_project();
        let root = dir.path().join("modules");
        let output = modgraph(
            &dir,
            &[
                "includes",
                root.to_str().expect("utf-8 path"),
                "--view",
                "internal",
                "--filter",
                "core/src",
            ],
        );
        assert!(output.status.success());

        let text = stdout(&output);
        assert!(text.contains("\"core/src/core\" -> \"core/src/util\";"));
        assert!(!text.contains("app"));
    }

    #[test]
    fn test_includes_unknown_filter_fails() {
        let dir = create_project();
        let root = dir.path().join("modules");
        let output = modgraph(
            &dir,
            &["includes", root.to_str().expect("utf-8 path"), "--filter", "nope"],
        );
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("No folder 'nope'"));
    }

    #[test]
    fn test_includes_split_writes_one_graph_per_folder() {
        let dir = create_project();
        let root = dir.path().join("modules");
        let split = dir.path().join("graphs");
        let output = modgraph(
            &dir,
            &[
                "includes",
                root.to_str().expect("utf-8 path"),
                "--view",
                "internal",
                "--split",
                split.to_str().expect("utf-8 path"),
            ],
        );
        assert!(output.status.success());

        let core = fs::read_to_string(split.join("core/src.dot")).expect("per-folder graph written");
        assert!(core.contains("\"core/src/util\" -> \"core/src/core\";"));
        assert!(split.join("app.dot").is_file());
    }
}
