use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};

use modgraph::includes::{self, GraphView, ScanOptions};
use modgraph::{
    BuildSettings, CommandLineEmitter, Diagnostics, Engine, Manifest, RecordingEmitter, SettingsOverrides,
};

#[derive(Parser)]
#[command(name = "modgraph")]
#[command(about = "Resolve module declarations into ordered build plans")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Print the command lines of every target
    modgraph plan

    # Same, as JSON, for the release profile of a single module
    modgraph --profile Release plan app --format json

    # Show the build order
    modgraph order

    # List the sources picked for a module
    modgraph sources core

    # Write the include cycles of the project as a Graphviz file
    modgraph includes --output cycles.dot

    # Folder-level references around one folder
    modgraph includes --view internal --filter core
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the declarations manifest (TOML or YAML)
    #[arg(long, short = 'm', default_value = "modgraph.toml", global = true)]
    pub manifest: PathBuf,

    /// Profiles to build with; replaces the manifest's selection
    #[arg(long = "profile", short = 'p', global = true)]
    pub profiles: Vec<String>,

    /// Platform name
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// Output root directory
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Project root directory
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Engine root directory, searched after the project
    #[arg(long, global = true)]
    pub engine: Option<PathBuf>,

    /// Maximum inheritance and dependency depth
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Treat configuration errors as failures
    #[arg(long, global = true)]
    pub strict: bool,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve modules and print their build plans
    Plan {
        /// Modules to plan (default: targets, or every module)
        modules: Vec<String>,

        /// Output format: text (command lines) or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Print the build order
    Order {
        /// Modules to order (default: targets, or every module)
        modules: Vec<String>,
    },

    /// Print the sources found for a module
    Sources {
        /// Module name
        module: String,
    },

    /// Print composed module configurations
    Modules {
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Analyze include cycles in source trees
    Includes(IncludesArgs),
}

#[derive(Args)]
pub struct IncludesArgs {
    /// Source roots to scan (default: every module's source paths)
    pub roots: Vec<PathBuf>,

    /// Write the graph here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Output format: dot or json
    #[arg(long, default_value = "dot")]
    pub format: String,

    /// cyclic (only files in cycles), detailed (every reference) or
    /// internal (references lifted to folders)
    #[arg(long, default_value = "cyclic")]
    pub view: String,

    /// Keep only the links around this folder
    #[arg(long)]
    pub filter: Option<String>,

    /// Write one filtered graph per folder under this directory
    #[arg(long, conflicts_with = "filter")]
    pub split: Option<PathBuf>,

    /// Write collapsed duplicate references to this file
    #[arg(long)]
    pub duplicates_log: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            project: self.project.clone(),
            engine: self.engine.clone(),
            platform: self.platform.clone(),
            output: self.output.clone(),
            max_depth: self.max_depth,
        }
    }

    /// Default log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "modgraph=info",
            1 => "modgraph=debug",
            _ => "modgraph=trace",
        }
    }
}

/// Loads the manifest, layers the settings and prepares an engine.
pub fn load_engine(cli: &Cli) -> anyhow::Result<Engine> {
    let manifest = Manifest::load(&cli.manifest)
        .with_context(|| format!("Failed to load manifest {}", cli.manifest.display()))?;
    let settings = cli.overrides().apply(manifest.configure(BuildSettings::default()));

    let mut engine = Engine::new(manifest, settings).strict(cli.strict);
    let profiles = (!cli.profiles.is_empty()).then_some(cli.profiles.as_slice());
    engine.prepare(profiles)?;
    Ok(engine)
}

pub fn plan(cli: &Cli, modules: &[String], format: &str) -> anyhow::Result<()> {
    let mut engine = load_engine(cli)?;

    match format {
        "json" => {
            let mut emitter = RecordingEmitter::new();
            run(&mut engine, modules, &mut emitter)?;
            println!("{}", serde_json::to_string_pretty(emitter.events())?);
        }
        "text" => {
            let mut emitter = CommandLineEmitter::new();
            let summary = run(&mut engine, modules, &mut emitter)?;
            print!("{}", emitter.render());
            println!(
                "# {} modules, profile {}, {} warnings",
                summary.order.len(),
                summary.profile,
                summary.warnings
            );
        }
        other => bail!("Unknown format '{}', expected text or json", other),
    }
    Ok(())
}

fn run(
    engine: &mut Engine,
    modules: &[String],
    emitter: &mut dyn modgraph::PlanEmitter,
) -> anyhow::Result<modgraph::RunSummary> {
    let summary = if modules.is_empty() {
        engine.run(emitter)?
    } else {
        engine.run_named(modules, emitter)?
    };
    Ok(summary)
}

pub fn order(cli: &Cli, modules: &[String]) -> anyhow::Result<()> {
    let mut engine = load_engine(cli)?;
    let mut emitter = RecordingEmitter::new();
    let summary = run(&mut engine, modules, &mut emitter)?;
    for (i, name) in summary.order.iter().enumerate() {
        println!("{:>3}. {}", i + 1, name);
    }
    Ok(())
}

pub fn sources(cli: &Cli, module: &str) -> anyhow::Result<()> {
    let engine = load_engine(cli)?;
    let registry = engine.registry();
    let Some(id) = registry.find_module(module) else {
        match registry.suggest(module) {
            Some(similar) => bail!("Unknown module '{}' (did you mean '{}'?)", module, similar),
            None => bail!("Unknown module '{}'", module),
        }
    };

    let module = registry.module(id);
    println!("{}", module);
    for path in &module.source_paths {
        println!("  source path: {}", path.display());
    }
    if module.sources.is_empty() {
        println!("  no sources");
    }
    for source in &module.sources {
        println!("  {}", source.display());
    }
    Ok(())
}

pub fn modules(cli: &Cli, format: &str) -> anyhow::Result<()> {
    let engine = load_engine(cli)?;
    let registry = engine.registry();

    match format {
        "json" => {
            let modules: Vec<_> = registry.modules().collect();
            println!("{}", serde_json::to_string_pretty(&modules)?);
        }
        "text" => {
            for module in registry.modules() {
                let config = module.config();
                let kind = config.kind.map(|k| k.as_str()).unwrap_or("-");
                println!("{} [{}]", module.name, kind);
                if !module.inherits.is_empty() {
                    println!("  inherits: {}", module.inherits.join(", "));
                }
                if !config.depends.is_empty() {
                    println!("  depends: {}", config.depends.join(", "));
                }
                for (key, value) in config.env.iter() {
                    println!("  {} = {}", key, value.items().join(" "));
                }
            }
        }
        other => bail!("Unknown format '{}', expected text or json", other),
    }
    Ok(())
}

pub fn includes(cli: &Cli, args: &IncludesArgs) -> anyhow::Result<()> {
    let (roots, options) = if args.roots.is_empty() {
        let engine = load_engine(cli)?;
        let mut found: Vec<PathBuf> = Vec::new();
        for module in engine.registry().modules() {
            for path in &module.source_paths {
                if !found.contains(path) {
                    found.push(path.clone());
                }
            }
        }
        (found, ScanOptions::from_settings(engine.settings()))
    } else {
        (args.roots.clone(), ScanOptions::default())
    };
    if roots.is_empty() {
        bail!("No source roots to scan");
    }

    let mut diagnostics = Diagnostics::new();
    let report = includes::analyze(&roots, &options, &mut diagnostics)?;

    let graph = match args.view.as_str() {
        "cyclic" => report.cyclic_view(),
        "detailed" => report.detailed_view(),
        "internal" => report.internal_view(),
        other => bail!("Unknown view '{}', expected cyclic, detailed or internal", other),
    };
    let extension = match args.format.as_str() {
        "dot" | "json" => args.format.as_str(),
        other => bail!("Unknown format '{}', expected dot or json", other),
    };

    if let Some(dir) = &args.split {
        let views = includes::cluster_views(&graph);
        for (folder, view) in &views {
            let path = dir.join(format!("{}.{}", folder, extension));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&path, render_graph(view, extension)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        println!("Wrote {} folder graphs to {}", views.len(), dir.display());
    } else {
        let graph = match &args.filter {
            Some(folder) => includes::filtered_view(&graph, folder)
                .with_context(|| format!("No folder '{}' in the {} view", folder, args.view))?,
            None => graph,
        };
        let rendered = render_graph(&graph, extension)?;
        match &args.output {
            Some(path) => {
                fs::write(path, rendered).with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
            None => print!("{}", rendered),
        }
    }

    if let Some(path) = &args.duplicates_log {
        fs::write(path, report.duplicates_log())
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if report.has_cycles() {
        eprintln!(
            "{} include cycle(s) across {} files",
            report.components.len(),
            report.members.len()
        );
    }
    Ok(())
}

fn render_graph(graph: &GraphView, format: &str) -> anyhow::Result<String> {
    Ok(match format {
        "json" => serde_json::to_string_pretty(graph)?,
        _ => includes::to_dot(graph),
    })
}
