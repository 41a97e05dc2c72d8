//! Configuration composition along the inheritance tree.
//!
//! Every non-marker module receives the merged configuration of all its
//! ancestors. Ancestors are visited depth-first with grandparents before
//! parents, each node at most once, so diamond inheritance merges a shared
//! ancestor a single time. Merging reads the ancestors' declared snapshots and
//! writes a new composed snapshot, so the result does not depend on the order
//! in which modules are composed.

use crate::diagnostics::Diagnostics;
use crate::error::{BuildError, Result};
use crate::model::ModuleId;
use crate::registry::Registry;

struct Frame {
    id: ModuleId,
    parents: Vec<ModuleId>,
    next: usize,
}

/// Ancestors of `module` in merge order (grandparents first, each once).
///
/// Unknown ancestor names are reported as configuration errors and skipped.
/// An inheritance chain may hold at most `max_depth` modules, `module` included.
pub fn ancestors(
    registry: &Registry,
    module: ModuleId,
    max_depth: usize,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ModuleId>> {
    let mut visited = vec![module];
    let mut order = Vec::new();
    let mut stack = vec![Frame {
        id: module,
        parents: parents_of(registry, module, diagnostics),
        next: 0,
    }];

    while let Some(top) = stack.last_mut() {
        if top.next < top.parents.len() {
            let parent = top.parents[top.next];
            top.next += 1;
            if visited.contains(&parent) {
                continue;
            }
            visited.push(parent);
            if stack.len() >= max_depth {
                return Err(BuildError::MaxDepthExceeded {
                    module: registry.module(parent).name.clone(),
                    depth: max_depth,
                });
            }
            stack.push(Frame {
                id: parent,
                parents: parents_of(registry, parent, diagnostics),
                next: 0,
            });
        } else if let Some(done) = stack.pop() {
            if done.id != module {
                order.push(done.id);
            }
        }
    }

    Ok(order)
}

fn parents_of(registry: &Registry, id: ModuleId, diagnostics: &mut Diagnostics) -> Vec<ModuleId> {
    let module = registry.module(id);
    module
        .inherits
        .iter()
        .filter_map(|name| match registry.find_module(name) {
            Some(parent) => Some(parent),
            None => {
                diagnostics.config_error(
                    &module.name,
                    "inherits",
                    format!("unknown module or profile '{}'", name),
                );
                None
            }
        })
        .collect()
}

/// Composes every non-marker module in creation order.
pub fn compose_all(registry: &mut Registry, max_depth: usize, diagnostics: &mut Diagnostics) -> Result<()> {
    let ids: Vec<ModuleId> = registry
        .modules()
        .filter(|m| !m.is_marker)
        .map(|m| m.id)
        .collect();

    for id in ids {
        let order = ancestors(registry, id, max_depth, diagnostics)?;
        let module = registry.module(id);
        tracing::debug!(
            "Composing {} from {} ancestor(s)",
            module,
            order.len()
        );

        let mut config = module.declared.clone();
        for ancestor in &order {
            let parent = registry.module(*ancestor);
            tracing::trace!("  {} <= {}", module.name, parent.name);
            config = config.inherit_from(&parent.declared, &module.name, diagnostics);
        }
        registry.module_mut(id).set_composed(config);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{keys, ConfigValue};

    fn names(registry: &Registry, ids: &[ModuleId]) -> Vec<String> {
        ids.iter().map(|id| registry.module(*id).name.clone()).collect()
    }

    #[test]
    fn test_grandparents_before_parents() {
        let mut registry = Registry::new();
        let base = registry.get_or_create_profile("base");
        let mid = registry.get_or_create_profile("mid");
        registry.module_mut(mid).add_inherit("base");
        let app = registry.get_or_create_module("app");
        registry.module_mut(app).inherits = vec!["mid".into()];

        let order = ancestors(&registry, app, 16, &mut Diagnostics::new()).unwrap();
        assert_eq!(order, vec![base, mid]);
    }

    #[test]
    fn test_diamond_visits_shared_ancestor_once() {
        let mut registry = Registry::new();
        registry.get_or_create_profile("c");
        for name in ["a", "b"] {
            let id = registry.get_or_create_profile(name);
            registry.module_mut(id).add_inherit("c");
        }
        let m = registry.get_or_create_module("m");
        registry.module_mut(m).inherits = vec!["a".into(), "b".into()];

        let order = ancestors(&registry, m, 16, &mut Diagnostics::new()).unwrap();
        assert_eq!(names(&registry, &order), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_default_inherited_by_modules() {
        let mut registry = Registry::new();
        let default = registry.default_module();
        registry
            .module_mut(default)
            .declared
            .env
            .set(keys::CC_FLAGS, ConfigValue::list(["-Wall"]));
        let core = registry.get_or_create_module("core");

        compose_all(&mut registry, 16, &mut Diagnostics::new()).unwrap();
        assert_eq!(registry.module(core).config().env.items(keys::CC_FLAGS), vec!["-Wall"]);
    }

    #[test]
    fn test_explicit_scalar_survives_profile() {
        let mut registry = Registry::new();
        let release = registry.get_or_create_profile("release");
        registry
            .module_mut(release)
            .declared
            .env
            .set(keys::CC, ConfigValue::text("gcc"));

        let m = registry.get_or_create_module("m");
        registry.module_mut(m).add_inherit("release");
        registry
            .module_mut(m)
            .declared
            .env
            .set(keys::CC, ConfigValue::text("custom-cc"));

        compose_all(&mut registry, 16, &mut Diagnostics::new()).unwrap();
        assert_eq!(registry.module(m).config().env.text(keys::CC), Some("custom-cc"));
    }

    #[test]
    fn test_first_declared_sibling_wins() {
        let mut registry = Registry::new();
        for (name, cc) in [("first", "cc-1"), ("second", "cc-2")] {
            let id = registry.get_or_create_profile(name);
            registry.module_mut(id).declared.env.set(keys::CC, ConfigValue::text(cc));
        }
        let m = registry.get_or_create_module("m");
        registry.module_mut(m).inherits = vec!["first".into(), "second".into()];

        compose_all(&mut registry, 16, &mut Diagnostics::new()).unwrap();
        assert_eq!(registry.module(m).config().env.text(keys::CC), Some("cc-1"));
    }

    #[test]
    fn test_unknown_ancestor_is_config_error() {
        let mut registry = Registry::new();
        let m = registry.get_or_create_module("m");
        registry.module_mut(m).add_inherit("ghost");

        let mut diagnostics = Diagnostics::new();
        compose_all(&mut registry, 16, &mut diagnostics).unwrap();
        assert!(registry.module(m).is_composed());
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut registry = Registry::new();
        let mut previous = registry.get_or_create_profile("p0");
        for i in 1..10 {
            let id = registry.get_or_create_profile(&format!("p{}", i));
            let name = registry.module(previous).name.clone();
            registry.module_mut(id).add_inherit(name);
            previous = id;
        }
        let m = registry.get_or_create_module("m");
        registry.module_mut(m).inherits = vec!["p9".into()];

        let err = ancestors(&registry, m, 4, &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err, BuildError::MaxDepthExceeded { depth: 4, .. }));
        assert!(ancestors(&registry, m, 64, &mut Diagnostics::new()).is_ok());
    }

    #[test]
    fn test_depth_limit_boundary() {
        let mut registry = Registry::new();
        registry.get_or_create_profile("p0");
        let p1 = registry.get_or_create_profile("p1");
        registry.module_mut(p1).add_inherit("p0");
        let p2 = registry.get_or_create_profile("p2");
        registry.module_mut(p2).add_inherit("p1");
        let m = registry.get_or_create_module("m");
        registry.module_mut(m).inherits = vec!["p2".into()];

        assert_eq!(ancestors(&registry, m, 4, &mut Diagnostics::new()).unwrap().len(), 3);
        let err = ancestors(&registry, m, 3, &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err, BuildError::MaxDepthExceeded { ref module, depth: 3 } if module == "p0"));
    }

    #[test]
    fn test_markers_are_not_composed() {
        let mut registry = Registry::new();
        let release = registry.get_or_create_profile("release");
        compose_all(&mut registry, 16, &mut Diagnostics::new()).unwrap();
        assert!(!registry.module(release).is_composed());
    }
}
