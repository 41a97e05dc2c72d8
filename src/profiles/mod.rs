//! Build profile selection.
//!
//! Profiles are configuration fragments (debug/release, API variants) picked
//! per invocation. Required groups are in conjunctive normal form: each group
//! needs at least one selected member.

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, Result};
use crate::registry::Registry;

/// Profile string used when nothing was selected.
pub const UNDEFINED_PROFILE: &str = "undefined_profile";

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileSelection {
    available: Vec<String>,
    required: Vec<Vec<String>>,
    selected: Vec<String>,
}

impl ProfileSelection {
    pub fn new(available: Vec<String>, required: Vec<Vec<String>>) -> Self {
        Self {
            available,
            required,
            selected: Vec::new(),
        }
    }

    /// Selects the requested profiles and checks the required groups.
    ///
    /// Matching is case-insensitive and keeps the spelling from the available
    /// list; the selection follows the available order. Returns the requested
    /// names that matched no available profile.
    pub fn select(&mut self, requested: &[String]) -> Result<Vec<String>> {
        self.selected = self
            .available
            .iter()
            .filter(|p| requested.iter().any(|r| r.eq_ignore_ascii_case(p)))
            .cloned()
            .collect();

        let unmatched: Vec<String> = requested
            .iter()
            .filter(|r| !self.available.iter().any(|p| p.eq_ignore_ascii_case(r)))
            .cloned()
            .collect();

        tracing::debug!("Profiles: {:?}", self.selected);
        self.check_required()?;
        Ok(unmatched)
    }

    fn check_required(&self) -> Result<()> {
        for group in &self.required {
            if group.is_empty() {
                tracing::debug!("Ignoring empty profile requirement");
                continue;
            }
            if group.iter().any(|p| self.is_selected(p)) {
                continue;
            }
            let message = match group.as_slice() {
                [only] => format!("You need to specify {}", only),
                [init @ .., last] => format!("You need to specify either {} or {}", init.join(", "), last),
                [] => continue,
            };
            return Err(BuildError::Profile(message));
        }
        Ok(())
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    /// `"_"`-joined selected profiles, used in default output paths.
    pub fn profile_string(&self) -> String {
        if self.selected.is_empty() {
            UNDEFINED_PROFILE.to_string()
        } else {
            self.selected.join("_")
        }
    }

    /// Wires the selection into the registry.
    ///
    /// Declared global profiles are appended to `default`'s inherits. Module
    /// profiles with a selected name are appended to their module's inherits.
    pub fn apply(&self, registry: &mut Registry, diagnostics: &mut Diagnostics) {
        let default = registry.default_module();
        for profile in &self.selected {
            let name = profile.to_lowercase();
            match registry.find_module(&name) {
                Some(id) if registry.module(id).is_profile => {
                    registry.module_mut(default).add_inherit(name);
                }
                _ => diagnostics.warn(
                    None,
                    format!("Profile {} was marked to be used but wasn't defined", profile),
                ),
            }
        }

        let ids: Vec<_> = registry.module_ids().collect();
        for id in ids {
            let matches: Vec<String> = registry
                .module(id)
                .profiles
                .iter()
                .filter(|(profile, _)| self.is_selected(profile))
                .map(|(_, scoped)| scoped.clone())
                .collect();
            for scoped in matches {
                tracing::debug!("  Profile {} applies to {}", scoped, registry.module(id));
                registry.module_mut(id).add_inherit(scoped);
            }
        }
    }
}
