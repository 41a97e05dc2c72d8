//! Plan emitters: the boundary to the underlying build tool.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::model::ModuleKind;

use super::BuildPlan;

/// Receives resolved modules in build order.
///
/// For each buildable module the resolver calls `pre_action` for every
/// pre-action, then `emit`, then `post_action` for every post-action. An error
/// aborts the whole run.
pub trait PlanEmitter {
    /// Returns a short name for logs.
    fn name(&self) -> &str;

    /// Runs or records a shell action before the module is built.
    fn pre_action(&mut self, _module: &str, _command: &str) -> Result<()> {
        Ok(())
    }

    /// Hands the module's plan to the build tool.
    fn emit(&mut self, plan: &BuildPlan) -> Result<()>;

    /// Runs or records a shell action after the module is built.
    fn post_action(&mut self, _module: &str, _command: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EmitEvent {
    PreAction { module: String, command: String },
    Emit { plan: Box<BuildPlan> },
    PostAction { module: String, command: String },
}

/// Keeps every event in order, for inspection and JSON output.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Vec<EmitEvent>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[EmitEvent] {
        &self.events
    }

    pub fn plans(&self) -> Vec<&BuildPlan> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EmitEvent::Emit { plan } => Some(plan.as_ref()),
                _ => None,
            })
            .collect()
    }

    /// Names of the emitted modules, in emission order.
    pub fn emitted_modules(&self) -> Vec<&str> {
        self.plans().into_iter().map(|p| p.module.as_str()).collect()
    }
}

impl PlanEmitter for RecordingEmitter {
    fn name(&self) -> &str {
        "recording"
    }

    fn pre_action(&mut self, module: &str, command: &str) -> Result<()> {
        self.events.push(EmitEvent::PreAction {
            module: module.to_string(),
            command: command.to_string(),
        });
        Ok(())
    }

    fn emit(&mut self, plan: &BuildPlan) -> Result<()> {
        self.events.push(EmitEvent::Emit {
            plan: Box::new(plan.clone()),
        });
        Ok(())
    }

    fn post_action(&mut self, module: &str, command: &str) -> Result<()> {
        self.events.push(EmitEvent::PostAction {
            module: module.to_string(),
            command: command.to_string(),
        });
        Ok(())
    }
}

/// Command lines of one module, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleScript {
    pub module: String,
    pub commands: Vec<String>,
}

/// Renders plans into compiler, archiver and linker command lines without
/// running anything.
#[derive(Debug, Default)]
pub struct CommandLineEmitter {
    scripts: Vec<ModuleScript>,
}

impl CommandLineEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripts(&self) -> &[ModuleScript] {
        &self.scripts
    }

    /// All command lines, one per line, grouped under `# <module>` headers.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for script in &self.scripts {
            out.push_str(&format!("# {}\n", script.module));
            for command in &script.commands {
                out.push_str(command);
                out.push('\n');
            }
        }
        out
    }

    fn script_for(&mut self, module: &str) -> &mut ModuleScript {
        let position = match self.scripts.iter().position(|s| s.module == module) {
            Some(position) => position,
            None => {
                self.scripts.push(ModuleScript {
                    module: module.to_string(),
                    commands: Vec::new(),
                });
                self.scripts.len() - 1
            }
        };
        &mut self.scripts[position]
    }

    fn compile_commands(plan: &BuildPlan) -> (Vec<String>, Vec<PathBuf>) {
        let mut commands = Vec::new();
        let mut objects = Vec::new();
        for source in &plan.sources {
            let is_cxx = source
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e != "c")
                .unwrap_or(false);
            let object = object_path(&plan.output_path, source);

            let mut parts = Vec::new();
            if is_cxx {
                parts.push(plan.cxx_compiler.clone().unwrap_or_else(|| "c++".to_string()));
            } else {
                parts.push(plan.compiler.clone().unwrap_or_else(|| "cc".to_string()));
            }
            parts.extend(plan.cc_flags.iter().cloned());
            if is_cxx {
                parts.extend(plan.cxx_flags.iter().cloned());
            }
            parts.extend(plan.defines.iter().map(|d| format!("-D{}", d)));
            parts.extend(plan.include_paths.iter().map(|p| format!("-I{}", p)));
            parts.push("-c".to_string());
            parts.push(source.display().to_string());
            parts.push("-o".to_string());
            parts.push(object.display().to_string());

            commands.push(parts.join(" "));
            objects.push(object);
        }
        (commands, objects)
    }

    fn link_command(plan: &BuildPlan, objects: &[PathBuf]) -> String {
        let objects: Vec<String> = objects.iter().map(|o| o.display().to_string()).collect();
        let artifact = plan.artifact.display().to_string();

        if plan.kind == ModuleKind::StaticLibrary {
            let archiver = plan.archiver.clone().unwrap_or_else(|| "ar".to_string());
            return format!("{} rcs {} {}", archiver, artifact, objects.join(" "));
        }

        let mut parts = vec![plan
            .linker
            .clone()
            .or_else(|| plan.cxx_compiler.clone())
            .unwrap_or_else(|| "c++".to_string())];
        if plan.kind == ModuleKind::SharedLibrary {
            parts.push("-shared".to_string());
        }
        parts.push("-o".to_string());
        parts.push(artifact);
        parts.extend(objects);
        parts.extend(plan.link_flags.iter().cloned());
        parts.extend(plan.library_paths.iter().map(|p| format!("-L{}", p)));
        parts.extend(plan.libraries.iter().map(|l| format!("-l{}", l)));
        parts.join(" ")
    }
}

fn object_path(output_path: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_path.join(format!("{}.o", stem))
}

impl PlanEmitter for CommandLineEmitter {
    fn name(&self) -> &str {
        "command-line"
    }

    fn pre_action(&mut self, module: &str, command: &str) -> Result<()> {
        self.script_for(module).commands.push(command.to_string());
        Ok(())
    }

    fn emit(&mut self, plan: &BuildPlan) -> Result<()> {
        let (mut commands, objects) = Self::compile_commands(plan);
        commands.push(Self::link_command(plan, &objects));
        if let Some(installed) = &plan.installed {
            commands.push(format!(
                "cp {} {}",
                plan.artifact.display(),
                installed.display()
            ));
        }
        self.script_for(&plan.module).commands.extend(commands);
        Ok(())
    }

    fn post_action(&mut self, module: &str, command: &str) -> Result<()> {
        self.script_for(module).commands.push(command.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(kind: ModuleKind) -> BuildPlan {
        BuildPlan {
            module: "core".into(),
            kind,
            artifact: PathBuf::from("/out/core/libcore.a"),
            output_path: PathBuf::from("/out/core"),
            installed: None,
            sources: vec![PathBuf::from("/src/a.c"), PathBuf::from("/src/b.cpp")],
            compiler: Some("gcc".into()),
            cxx_compiler: Some("g++".into()),
            archiver: None,
            linker: None,
            cc_flags: vec!["-O2".into()],
            cxx_flags: vec!["-std=c++11".into()],
            defines: vec!["NDEBUG".into()],
            include_paths: vec!["/src".into()],
            link_flags: Vec::new(),
            library_paths: vec!["/libs".into()],
            libraries: vec!["png".into()],
            pre_actions: Vec::new(),
            post_actions: Vec::new(),
        }
    }

    #[test]
    fn test_static_library_commands() {
        let mut emitter = CommandLineEmitter::new();
        emitter.pre_action("core", "echo start").unwrap();
        emitter.emit(&plan(ModuleKind::StaticLibrary)).unwrap();

        let commands = &emitter.scripts()[0].commands;
        assert_eq!(commands[0], "echo start");
        assert_eq!(commands[1], "gcc -O2 -DNDEBUG -I/src -c /src/a.c -o /out/core/a.o");
        assert_eq!(
            commands[2],
            "g++ -O2 -std=c++11 -DNDEBUG -I/src -c /src/b.cpp -o /out/core/b.o"
        );
        assert_eq!(commands[3], "ar rcs /out/core/libcore.a /out/core/a.o /out/core/b.o");
    }

    #[test]
    fn test_executable_links_libraries() {
        let mut emitter = CommandLineEmitter::new();
        let mut exe = plan(ModuleKind::Executable);
        exe.artifact = PathBuf::from("/out/core/core");
        emitter.emit(&exe).unwrap();

        let link = emitter.scripts()[0].commands.last().unwrap().clone();
        assert_eq!(link, "g++ -o /out/core/core /out/core/a.o /out/core/b.o -L/libs -lpng");
        assert!(emitter.render().starts_with("# core\n"));
    }

    #[test]
    fn test_recording_emitter_keeps_order() {
        let mut emitter = RecordingEmitter::new();
        emitter.pre_action("core", "prep").unwrap();
        emitter.emit(&plan(ModuleKind::StaticLibrary)).unwrap();
        emitter.post_action("core", "done").unwrap();

        assert_eq!(emitter.events().len(), 3);
        assert!(matches!(emitter.events()[0], EmitEvent::PreAction { .. }));
        assert!(matches!(emitter.events()[2], EmitEvent::PostAction { .. }));
        assert_eq!(emitter.emitted_modules(), vec!["core"]);
    }
}
