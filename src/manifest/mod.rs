//! Declarations manifest.
//!
//! A manifest declares the project settings, profiles, modules, libraries and
//! targets of one build. TOML and YAML are accepted; both are read into a
//! `toml::Value` tree and walked by hand so errors can name the offending
//! entry.
//!
//! ```toml
//! [project]
//! name = "demo"
//! platform = "linux"
//!
//! [profiles]
//! available = ["Debug", "Release"]
//! required = [["Debug", "Release"]]
//! selected = ["Release"]
//!
//! [defaults.env]
//! CC = "gcc"
//!
//! [targets]
//! modules = ["app"]
//!
//! [[module]]
//! name = "app"
//! kind = "executable"
//! depends = ["core"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, Result};
use crate::model::{ConfigValue, Configuration, ModuleId, ModuleKind, Scalar};
use crate::profiles::ProfileSelection;
use crate::registry::Registry;
use crate::settings::BuildSettings;

/// Project and layout values; `None` keeps the current setting.
#[derive(Debug, Clone, Default)]
pub struct SettingsDecl {
    pub name: Option<String>,
    pub root: Option<PathBuf>,
    pub engine: Option<PathBuf>,
    pub platform: Option<String>,
    pub platform_attributes: Option<Vec<String>>,
    pub output: Option<PathBuf>,
    pub max_depth: Option<usize>,
    pub source_dirs: Option<Vec<String>>,
    pub header_dirs: Option<Vec<String>>,
    pub module_dirs: Option<Vec<String>>,
    pub library_dirs: Option<Vec<String>>,
    pub source_extensions: Option<Vec<String>>,
    pub header_extensions: Option<Vec<String>>,
    pub library_extensions: Option<Vec<String>>,
    pub vcs_dirs: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub remove_duplicate_sources: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilesDecl {
    pub available: Vec<String>,
    pub required: Vec<Vec<String>>,
    pub selected: Vec<String>,
}

/// One module, profile, `[defaults]` or `[targets]` declaration.
#[derive(Debug, Clone, Default)]
pub struct ModuleDecl {
    pub name: String,
    pub kind: Option<ModuleKind>,
    pub roots: Vec<PathBuf>,
    pub inherits: Vec<String>,
    pub depends: Vec<String>,
    pub used_libraries: Vec<String>,
    pub sources: Vec<PathBuf>,
    pub exclude: Vec<String>,
    pub binary_name: Option<String>,
    pub install_dir: Option<PathBuf>,
    pub pre_actions: Vec<String>,
    pub post_actions: Vec<String>,
    pub search_for_sources: Option<bool>,
    pub env: Configuration,
    /// Module-specific profiles, in declaration order.
    pub profiles: Vec<ModuleDecl>,
}

#[derive(Debug, Clone, Default)]
pub struct LibraryDecl {
    pub name: String,
    pub include_paths: Vec<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    pub binaries: Vec<String>,
    /// Binaries must already exist under the library paths.
    pub prebuilt: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// File the manifest was read from; relative paths resolve against its directory.
    pub path: PathBuf,
    pub settings: SettingsDecl,
    pub profiles: ProfilesDecl,
    pub defaults: ModuleDecl,
    pub targets_config: ModuleDecl,
    pub targets: Vec<String>,
    pub global_profiles: Vec<ModuleDecl>,
    pub modules: Vec<ModuleDecl>,
    pub libraries: Vec<LibraryDecl>,
}

impl Manifest {
    /// Reads a manifest, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Manifest> {
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_yaml(&content, path),
            _ => Self::parse_toml(&content, path),
        }
    }

    pub fn parse_toml(content: &str, path: &Path) -> Result<Manifest> {
        let value: Value = content
            .parse()
            .map_err(|e: toml::de::Error| BuildError::manifest(path, format!("Invalid TOML: {}", e)))?;
        Self::from_value(&value, path)
    }

    pub fn parse_yaml(content: &str, path: &Path) -> Result<Manifest> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| BuildError::manifest(path, format!("Invalid YAML: {}", e)))?;
        Self::from_value(&value, path)
    }

    fn from_value(value: &Value, path: &Path) -> Result<Manifest> {
        let ctx = Ctx { path };
        let root = value
            .as_table()
            .ok_or_else(|| BuildError::manifest(path, "Top level must be a table"))?;

        let mut manifest = Manifest {
            path: path.to_path_buf(),
            ..Default::default()
        };

        if let Some(project) = root.get("project") {
            ctx.project(project, &mut manifest.settings)?;
        }
        if let Some(layout) = root.get("layout") {
            ctx.layout(layout, &mut manifest.settings)?;
        }
        if let Some(profiles) = root.get("profiles") {
            manifest.profiles = ctx.profiles(profiles)?;
        }
        if let Some(defaults) = root.get("defaults") {
            manifest.defaults = ctx.module(defaults, "defaults", false)?;
        }
        if let Some(targets) = root.get("targets") {
            manifest.targets = ctx.strings(targets.get("modules"), "targets.modules")?;
            manifest.targets_config = ctx.module(targets, "targets", false)?;
        }
        for (i, profile) in ctx.array(root.get("profile"), "profile")?.iter().enumerate() {
            manifest
                .global_profiles
                .push(ctx.module(profile, &format!("profile[{}]", i), true)?);
        }
        for (i, module) in ctx.array(root.get("module"), "module")?.iter().enumerate() {
            manifest.modules.push(ctx.module(module, &format!("module[{}]", i), true)?);
        }
        for (i, library) in ctx.array(root.get("library"), "library")?.iter().enumerate() {
            manifest.libraries.push(ctx.library(library, &format!("library[{}]", i))?);
        }

        tracing::debug!(
            "Loaded manifest {}: {} modules, {} libraries, {} profiles",
            path.display(),
            manifest.modules.len(),
            manifest.libraries.len(),
            manifest.global_profiles.len()
        );
        Ok(manifest)
    }

    fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    /// Layers the manifest's `[project]` and `[layout]` values over `settings`.
    pub fn configure(&self, mut settings: BuildSettings) -> BuildSettings {
        let decl = &self.settings;
        settings.project_root = match &decl.root {
            Some(root) => self.resolve(root),
            None => self.base_dir(),
        };
        if let Some(name) = &decl.name {
            settings.project_name = name.clone();
        }
        if let Some(engine) = &decl.engine {
            settings = settings.with_engine_root(self.resolve(engine));
        }
        if let Some(platform) = &decl.platform {
            settings = settings.with_platform(platform.clone());
        }
        if let Some(attributes) = &decl.platform_attributes {
            settings = settings.with_platform_attributes(attributes.clone());
        }
        if let Some(output) = &decl.output {
            settings = settings.with_output_root(self.resolve(output));
        }
        if let Some(depth) = decl.max_depth {
            settings = settings.with_max_depth(depth);
        }

        let lists = [
            (&decl.source_dirs, &mut settings.source_dir_names),
            (&decl.header_dirs, &mut settings.header_dir_names),
            (&decl.module_dirs, &mut settings.module_dir_names),
            (&decl.library_dirs, &mut settings.library_dir_names),
            (&decl.source_extensions, &mut settings.source_extensions),
            (&decl.header_extensions, &mut settings.header_extensions),
            (&decl.library_extensions, &mut settings.library_extensions),
            (&decl.vcs_dirs, &mut settings.vcs_dir_names),
            (&decl.exclude, &mut settings.exclude_patterns),
        ];
        for (declared, target) in lists {
            if let Some(values) = declared {
                *target = values.clone();
            }
        }
        if let Some(flag) = decl.remove_duplicate_sources {
            settings.remove_duplicate_sources = flag;
        }
        settings
    }

    /// Profile selection declared in `[profiles]`, before any request is applied.
    pub fn profile_selection(&self) -> ProfileSelection {
        ProfileSelection::new(self.profiles.available.clone(), self.profiles.required.clone())
    }

    /// Creates every declared entity in the registry.
    pub fn apply(&self, registry: &mut Registry, settings: &BuildSettings, diagnostics: &mut Diagnostics) {
        for profile in &self.global_profiles {
            let id = registry.get_or_create_profile(&profile.name);
            self.fill(registry, id, profile);
        }

        let default = registry.default_module();
        self.fill(registry, default, &self.defaults);
        let targets = registry.targets_module();
        self.fill(registry, targets, &self.targets_config);

        for decl in &self.modules {
            let id = registry.get_or_create_module(&decl.name);
            self.fill(registry, id, decl);
            for profile in &decl.profiles {
                let scoped = registry.module_profile(id, &profile.name);
                self.fill(registry, scoped, profile);
            }
        }

        for name in &self.targets {
            registry.add_target(name);
        }

        for decl in &self.libraries {
            let id = registry.get_or_create_library(&decl.name);
            let library = registry.library_mut(id);
            for path in &decl.include_paths {
                library.add_include_path(self.resolve(path));
            }
            if library.has_library_paths() && (!decl.library_paths.is_empty() || !decl.binaries.is_empty()) {
                diagnostics.warn(
                    None,
                    format!(
                        "library('{}') is declared more than once; keeping the library paths and binaries of its first declaration",
                        decl.name
                    ),
                );
            } else {
                for path in &decl.library_paths {
                    library.add_library_path(self.resolve(path));
                }
                for binary in &decl.binaries {
                    library.add_binary(binary.clone());
                }
            }
            if !library.validate(decl.prebuilt, &settings.library_extensions, diagnostics) {
                diagnostics.warn(None, format!("{} doesn't look usable, check its paths", library));
            }
        }
    }

    fn fill(&self, registry: &mut Registry, id: ModuleId, decl: &ModuleDecl) {
        let module = registry.module_mut(id);
        for parent in &decl.inherits {
            module.add_inherit(parent.clone());
        }
        for root in &decl.roots {
            module.roots.push(self.resolve(root));
        }
        if let Some(binary_name) = &decl.binary_name {
            module.binary_name = Some(binary_name.clone());
        }
        if let Some(search) = decl.search_for_sources {
            module.search_for_sources = search;
        }
        module.explicit_sources.extend(decl.sources.iter().cloned());

        let config = &mut module.declared;
        if decl.kind.is_some() {
            config.kind = decl.kind;
        }
        config.depends.extend(decl.depends.iter().cloned());
        config.used_libraries.extend(decl.used_libraries.iter().cloned());
        config.exclude_patterns.extend(decl.exclude.iter().cloned());
        config.pre_actions.extend(decl.pre_actions.iter().cloned());
        config.post_actions.extend(decl.post_actions.iter().cloned());
        if decl.install_dir.is_some() {
            config.install_dir = decl.install_dir.clone();
        }
        for (key, value) in decl.env.iter() {
            config.env.set(key, value.clone());
        }
    }
}

/// Parsing helpers carrying the manifest path for error messages.
struct Ctx<'a> {
    path: &'a Path,
}

impl Ctx<'_> {
    fn error(&self, message: impl ToString) -> BuildError {
        BuildError::manifest(self.path, message)
    }

    fn table<'v>(&self, value: &'v Value, field: &str) -> Result<&'v toml::Table> {
        value
            .as_table()
            .ok_or_else(|| self.error(format!("{} must be a table", field)))
    }

    fn array<'v>(&self, value: Option<&'v Value>, field: &str) -> Result<&'v [Value]> {
        match value {
            None => Ok(&[]),
            Some(Value::Array(items)) => Ok(items.as_slice()),
            Some(_) => Err(self.error(format!("{} must be an array of tables", field))),
        }
    }

    fn string(&self, value: Option<&Value>, field: &str) -> Result<Option<String>> {
        match value {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.error(format!("{} must be a string", field))),
        }
    }

    fn boolean(&self, value: Option<&Value>, field: &str) -> Result<Option<bool>> {
        match value {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(_) => Err(self.error(format!("{} must be true or false", field))),
        }
    }

    /// A string or an array of strings.
    fn strings(&self, value: Option<&Value>, field: &str) -> Result<Vec<String>> {
        match value {
            None => Ok(Vec::new()),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.error(format!("{} must contain only strings", field)))
                })
                .collect(),
            Some(_) => Err(self.error(format!("{} must be a string or a list of strings", field))),
        }
    }

    fn opt_strings(&self, value: Option<&Value>, field: &str) -> Result<Option<Vec<String>>> {
        match value {
            None => Ok(None),
            some => self.strings(some, field).map(Some),
        }
    }

    fn paths(&self, value: Option<&Value>, field: &str) -> Result<Vec<PathBuf>> {
        Ok(self.strings(value, field)?.into_iter().map(PathBuf::from).collect())
    }

    fn project(&self, value: &Value, settings: &mut SettingsDecl) -> Result<()> {
        let table = self.table(value, "project")?;
        settings.name = self.string(table.get("name"), "project.name")?;
        settings.root = self.string(table.get("root"), "project.root")?.map(PathBuf::from);
        settings.engine = self.string(table.get("engine"), "project.engine")?.map(PathBuf::from);
        settings.platform = self.string(table.get("platform"), "project.platform")?;
        settings.platform_attributes =
            self.opt_strings(table.get("platform_attributes"), "project.platform_attributes")?;
        settings.output = self.string(table.get("output"), "project.output")?.map(PathBuf::from);
        settings.max_depth = match table.get("max_depth") {
            None => None,
            Some(Value::Integer(n)) if *n > 0 => Some(*n as usize),
            Some(_) => return Err(self.error("project.max_depth must be a positive integer")),
        };
        Ok(())
    }

    fn layout(&self, value: &Value, settings: &mut SettingsDecl) -> Result<()> {
        let table = self.table(value, "layout")?;
        settings.source_dirs = self.opt_strings(table.get("source_dirs"), "layout.source_dirs")?;
        settings.header_dirs = self.opt_strings(table.get("header_dirs"), "layout.header_dirs")?;
        settings.module_dirs = self.opt_strings(table.get("module_dirs"), "layout.module_dirs")?;
        settings.library_dirs = self.opt_strings(table.get("library_dirs"), "layout.library_dirs")?;
        settings.source_extensions =
            self.opt_strings(table.get("source_extensions"), "layout.source_extensions")?;
        settings.header_extensions =
            self.opt_strings(table.get("header_extensions"), "layout.header_extensions")?;
        settings.library_extensions =
            self.opt_strings(table.get("library_extensions"), "layout.library_extensions")?;
        settings.vcs_dirs = self.opt_strings(table.get("vcs_dirs"), "layout.vcs_dirs")?;
        settings.exclude = self.opt_strings(table.get("exclude"), "layout.exclude")?;
        settings.remove_duplicate_sources =
            self.boolean(table.get("remove_duplicate_sources"), "layout.remove_duplicate_sources")?;
        Ok(())
    }

    fn profiles(&self, value: &Value) -> Result<ProfilesDecl> {
        let table = self.table(value, "profiles")?;
        let mut required = Vec::new();
        if let Some(groups) = table.get("required") {
            let groups = groups
                .as_array()
                .ok_or_else(|| self.error("profiles.required must be a list of groups"))?;
            for group in groups {
                required.push(self.strings(Some(group), "profiles.required")?);
            }
        }
        Ok(ProfilesDecl {
            available: self.strings(table.get("available"), "profiles.available")?,
            required,
            selected: self.strings(table.get("selected"), "profiles.selected")?,
        })
    }

    fn module(&self, value: &Value, field: &str, named: bool) -> Result<ModuleDecl> {
        let table = self.table(value, field)?;
        let name = match self.string(table.get("name"), &format!("{}.name", field))? {
            Some(name) if !name.is_empty() => name,
            _ if named => return Err(self.error(format!("{} needs a name", field))),
            _ => String::new(),
        };
        let field = if name.is_empty() { field.to_string() } else { name.clone() };
        let at = |key: &str| format!("{}.{}", field, key);

        let kind = match self.string(table.get("kind"), &at("kind"))? {
            Some(kind) => Some(
                ModuleKind::from_str(&kind)
                    .ok_or_else(|| self.error(format!("{}: unknown module kind '{}'", at("kind"), kind)))?,
            ),
            None => None,
        };

        let mut profiles = Vec::new();
        if let Some(declared) = table.get("profiles") {
            for (profile, body) in self.table(declared, &at("profiles"))? {
                let mut decl = self.module(body, &format!("{}.profiles.{}", field, profile), false)?;
                decl.name = profile.clone();
                profiles.push(decl);
            }
        }

        Ok(ModuleDecl {
            kind,
            roots: self.paths(table.get("root"), &at("root"))?,
            inherits: self.strings(table.get("inherits"), &at("inherits"))?,
            depends: self.strings(table.get("depends"), &at("depends"))?,
            used_libraries: self.strings(table.get("used_libraries"), &at("used_libraries"))?,
            sources: self.paths(table.get("sources"), &at("sources"))?,
            exclude: self.strings(table.get("exclude"), &at("exclude"))?,
            binary_name: self.string(table.get("binary_name"), &at("binary_name"))?,
            install_dir: self.string(table.get("install_dir"), &at("install_dir"))?.map(PathBuf::from),
            pre_actions: self.strings(table.get("pre_actions"), &at("pre_actions"))?,
            post_actions: self.strings(table.get("post_actions"), &at("post_actions"))?,
            search_for_sources: self.boolean(table.get("search_for_sources"), &at("search_for_sources"))?,
            env: match table.get("env") {
                Some(env) => self.env(env, &at("env"))?,
                None => Configuration::new(),
            },
            profiles,
            name,
        })
    }

    fn env(&self, value: &Value, field: &str) -> Result<Configuration> {
        let mut env = Configuration::new();
        for (key, value) in self.table(value, field)? {
            env.set(key.clone(), self.env_value(value, &format!("{}.{}", field, key))?);
        }
        Ok(env)
    }

    /// Strings, numbers and switches are scalars; arrays are lists;
    /// `{ set = [...] }` is a set; any other table is a mapping.
    fn env_value(&self, value: &Value, field: &str) -> Result<ConfigValue> {
        Ok(match value {
            Value::String(s) => ConfigValue::Scalar(Scalar::Text(s.clone())),
            Value::Boolean(b) => ConfigValue::Scalar(Scalar::Bool(*b)),
            Value::Integer(i) => ConfigValue::Scalar(Scalar::Integer(*i)),
            Value::Float(x) => ConfigValue::Scalar(Scalar::Float(*x)),
            Value::Datetime(d) => ConfigValue::Scalar(Scalar::Text(d.to_string())),
            Value::Array(items) => ConfigValue::List(self.items(items, field)?),
            Value::Table(table) => match table.get("set") {
                Some(Value::Array(items)) if table.len() == 1 => {
                    ConfigValue::set(self.items(items, field)?)
                }
                _ => {
                    let mut mapping = BTreeMap::new();
                    for (key, item) in table {
                        mapping.insert(key.clone(), self.item(item, field)?);
                    }
                    ConfigValue::Mapping(mapping)
                }
            },
        })
    }

    fn items(&self, items: &[Value], field: &str) -> Result<Vec<String>> {
        items.iter().map(|item| self.item(item, field)).collect()
    }

    fn item(&self, item: &Value, field: &str) -> Result<String> {
        match item {
            Value::String(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Float(x) => Ok(x.to_string()),
            Value::Boolean(b) => Ok(b.to_string()),
            _ => Err(self.error(format!("{} may only hold strings, numbers or switches", field))),
        }
    }

    fn library(&self, value: &Value, field: &str) -> Result<LibraryDecl> {
        let table = self.table(value, field)?;
        let name = self
            .string(table.get("name"), &format!("{}.name", field))?
            .filter(|n| !n.is_empty())
            .ok_or_else(|| self.error(format!("{} needs a name", field)))?;
        let at = |key: &str| format!("{}.{}", name, key);

        Ok(LibraryDecl {
            include_paths: self.paths(table.get("include_paths"), &at("include_paths"))?,
            library_paths: self.paths(table.get("library_paths"), &at("library_paths"))?,
            binaries: self.strings(table.get("binaries"), &at("binaries"))?,
            prebuilt: self.boolean(table.get("prebuilt"), &at("prebuilt"))?.unwrap_or(false),
            name,
        })
    }
}
