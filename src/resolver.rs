use crate::ast::{HoconObject, HoconValue, Substitution, SubstitutionSite};
use crate::config::Config;
use crate::error::ResolverError;
use crate::path::join_path;
use std::collections::HashMap;
use std::sync::Arc;

/// A substitution site tagged with the fallback layer it came from.
///
/// Layer 0 is the config's own document, layer 1 its fallback, and so on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayeredSite {
    pub layer: usize,
    pub site: SubstitutionSite,
}

/// Rewrites every substitution site of a merged tree into a concrete value.
///
/// Sites are visited in order. The value at each site's location is
/// evaluated against the working tree, resolving the targets it depends on
/// first, and written back in place. A lookup that misses the tree is retried
/// against the fallback chain. A substitution that names the key holding it
/// was not bound to an earlier definition by the parser, so it is looked up
/// in the layer below the one that defined it. The same layer below supplies
/// the value when an optional substitution making up a whole value misses.
pub(crate) struct Resolver<'a> {
    tree: Arc<HoconObject>,
    sites: &'a [LayeredSite],
    fallback: Option<&'a Config>,
    // Lowest layer that placed a site at each location.
    layers: HashMap<&'a [String], usize>,
    // Stack of locations being evaluated, to detect cycles.
    resolving_stack: Vec<Vec<String>>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        tree: Arc<HoconObject>,
        sites: &'a [LayeredSite],
        fallback: Option<&'a Config>,
    ) -> Self {
        let mut layers: HashMap<&'a [String], usize> = HashMap::new();
        for layered in sites {
            let entry = layers
                .entry(layered.site.location.as_slice())
                .or_insert(layered.layer);
            *entry = (*entry).min(layered.layer);
        }
        Resolver {
            tree,
            sites,
            fallback,
            layers,
            resolving_stack: Vec::new(),
        }
    }

    /// Resolves every site and returns the resulting tree.
    ///
    /// # Errors
    /// Returns the first `ResolverError` met: a mandatory substitution with
    /// no target, a cycle, or a concatenation of incompatible values.
    pub(crate) fn resolve(mut self) -> Result<Arc<HoconObject>, ResolverError> {
        log::debug!("resolving {} substitution sites", self.sites.len());
        for layered in self.sites {
            let location = &layered.site.location;
            let pending = self
                .tree
                .get_path(location)
                .is_some_and(HoconValue::is_unresolved);
            if pending {
                log::trace!(
                    "resolving `{}` from layer {}",
                    join_path(location),
                    layered.layer
                );
                self.resolve_location(location)?;
            }
        }
        Ok(self.tree)
    }

    /// Evaluates the value stored at `location` and writes the result back.
    /// An absent result removes the key.
    fn resolve_location(&mut self, location: &[String]) -> Result<Option<HoconValue>, ResolverError> {
        if self.resolving_stack.iter().any(|p| p == location) {
            let cycle = self
                .resolving_stack
                .iter()
                .skip_while(|p| p.as_slice() != location)
                .map(|p| join_path(p))
                .chain(std::iter::once(join_path(location)))
                .collect::<Vec<String>>()
                .join(" -> ");
            return Err(ResolverError::CircularSubstitution { cycle });
        }

        let Some(node) = self.tree.get_path(location).cloned() else {
            return Ok(None);
        };
        if !node.is_unresolved() {
            return Ok(Some(node));
        }

        self.resolving_stack.push(location.to_vec());
        let result = self.evaluate(node, location, true);
        self.resolving_stack.pop();
        let result = result?;

        self.tree = Arc::new(self.tree.with_path(location, result.clone()));
        Ok(result)
    }

    /// Evaluates `value`, found at `location`. `addressable` is false inside
    /// arrays, where nested values cannot be written back by path.
    fn evaluate(
        &mut self,
        value: HoconValue,
        location: &[String],
        addressable: bool,
    ) -> Result<Option<HoconValue>, ResolverError> {
        match value {
            HoconValue::Substitution(substitution) => {
                self.lookup(&substitution, location, addressable)
            }
            HoconValue::Concatenation(parts) => {
                let mut resolved = Vec::with_capacity(parts.len());
                for part in parts {
                    if let Some(part) = self.evaluate(part, location, false)? {
                        resolved.push(part);
                    }
                }
                let found = resolved
                    .iter()
                    .find(|part| !part.is_string())
                    .map(|part| part.kind_name().to_string());
                HoconValue::concatenate(resolved).map_err(|_| ResolverError::InvalidConcatenation {
                    location: join_path(location),
                    found: found.unwrap_or_else(|| "a value".to_string()),
                })
            }
            HoconValue::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(item) = self.evaluate(item, location, false)? {
                        resolved.push(item);
                    }
                }
                Ok(Some(HoconValue::Array(resolved)))
            }
            HoconValue::Object(object) if addressable => {
                let mut child_location = location.to_vec();
                for (key, child) in object.iter() {
                    if child.is_unresolved() {
                        child_location.push(key.clone());
                        self.resolve_location(&child_location)?;
                        child_location.pop();
                    }
                }
                Ok(self.tree.get_path(location).cloned())
            }
            HoconValue::Object(object) => {
                let mut resolved = HoconObject::new();
                for (key, child) in object.iter() {
                    if let Some(child) = self.evaluate(child.clone(), location, false)? {
                        resolved.insert(key.clone(), child);
                    }
                }
                Ok(Some(HoconValue::object(resolved)))
            }
            other => Ok(Some(other)),
        }
    }

    /// Looks up the target of `substitution`, held at `location`.
    ///
    /// `whole` is set when the substitution is the entire value of the key at
    /// `location`. An optional miss then keeps the definition it shadows:
    /// the earlier value in the same document, or else the layer below.
    fn lookup(
        &mut self,
        substitution: &Substitution,
        location: &[String],
        whole: bool,
    ) -> Result<Option<HoconValue>, ResolverError> {
        let layer = self.layers.get(location).copied().unwrap_or(0);
        let found = if substitution.path == location {
            self.lookup_below(layer, &substitution.path)?
        } else {
            match self.find(&substitution.path)? {
                Some(value) => Some(value),
                None => self.lookup_in_fallback(self.fallback, &substitution.path)?,
            }
        };

        match found {
            Some(value) => Ok(Some(value)),
            None if substitution.optional && whole => {
                if let Some(shadowed) = substitution.shadowed() {
                    if let Some(value) = self.evaluate(shadowed.clone(), location, false)? {
                        return Ok(Some(value));
                    }
                }
                self.lookup_below(layer, location)
            }
            None if substitution.optional => Ok(None),
            None => Err(ResolverError::UnresolvedSubstitution {
                path: join_path(&substitution.path),
                location: join_path(location),
            }),
        }
    }

    /// Walks `path` through the working tree, resolving what lies on the way.
    fn find(&mut self, path: &[String]) -> Result<Option<HoconValue>, ResolverError> {
        for depth in 1..=path.len() {
            let prefix = &path[..depth];
            let Some(node) = self.tree.get_path(prefix) else {
                return Ok(None);
            };
            let is_target = depth == path.len();
            let pending = node.is_unresolved() && (is_target || !node.is_object());
            if pending && self.resolve_location(prefix)?.is_none() {
                return Ok(None);
            }
        }
        Ok(self.tree.get_path(path).cloned())
    }

    /// Looks `path` up in the fallback link below `layer`.
    fn lookup_below(
        &self,
        layer: usize,
        path: &[String],
    ) -> Result<Option<HoconValue>, ResolverError> {
        let mut link = self.fallback;
        for _ in 0..layer {
            link = link.and_then(Config::fallback);
        }
        self.lookup_in_fallback(link, path)
    }

    fn lookup_in_fallback(
        &self,
        fallback: Option<&Config>,
        path: &[String],
    ) -> Result<Option<HoconValue>, ResolverError> {
        match fallback {
            Some(config) => Ok(config.lookup_resolved(path)?.cloned()),
            None => Ok(None),
        }
    }
}
