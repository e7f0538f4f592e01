use crate::api::parse_string;
use crate::ast::{HoconObject, HoconRoot, HoconValue};
use crate::error::{ConfigError, ConversionError, HoconError, ResolverError};
use crate::path::split_dotted_path;
use crate::resolver::{LayeredSite, Resolver};
use crate::serialization::{to_value, Value};
use indexmap::IndexMap;
use serde::{ser::Error as _, Serialize, Serializer};
use std::fmt::{self, Display};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// An immutable, queryable configuration.
///
/// A `Config` owns the document it was built from, the tree obtained by
/// merging that document over its fallback chain, and an optional link to
/// the fallback itself. Substitutions are resolved on the first query and the
/// result is cached, so a `Config` can be shared freely between threads.
///
/// Every getter takes a dotted path. A path that is not present yields the
/// getter's default; a value of the wrong shape is a `ConfigError::WrongType`.
#[derive(Debug, Clone)]
pub struct Config {
    own: HoconRoot,
    root: Arc<HoconObject>,
    fallback: Option<Arc<Config>>,
    resolved: OnceLock<Result<HoconValue, ResolverError>>,
}

impl Config {
    pub fn from_root(root: HoconRoot) -> Self {
        Self::layered(root, None)
    }

    fn layered(own: HoconRoot, fallback: Option<Arc<Config>>) -> Self {
        let root = match &fallback {
            Some(fallback) => Arc::new(own.object().merge_immutable(&fallback.root)),
            None => own.object().clone(),
        };
        Config {
            own,
            root,
            fallback,
            resolved: OnceLock::new(),
        }
    }

    /// Builds a config holding the resolved contents of `source`, backed by
    /// `fallback`.
    ///
    /// # Errors
    /// Returns an error if `source` cannot be resolved.
    pub fn from_config(source: &Config, fallback: Option<&Config>) -> Result<Self, HoconError> {
        let own = HoconRoot::new(source.resolved()?.clone())?;
        Ok(Self::layered(own, fallback.map(|f| Arc::new(f.clone()))))
    }

    /// Parses `text` and layers it over `fallback`.
    ///
    /// # Errors
    /// Returns an error if `text` does not parse.
    pub fn add_config(text: &str, fallback: &Config) -> Result<Self, HoconError> {
        Ok(parse_string(text)?.with_fallback(fallback)?)
    }

    /// Parses `text` and layers `config` over it.
    ///
    /// # Errors
    /// Returns an error if `text` does not parse.
    pub fn add_config_with_text_fallback(config: &Config, text: &str) -> Result<Self, HoconError> {
        Ok(config.with_fallback(&parse_string(text)?)?)
    }

    /// Returns a new config with `fallback` layered below this one.
    ///
    /// The merged tree is computed now; substitutions are resolved against it
    /// on first use. If this config already has a fallback, `fallback` is
    /// layered below that one in turn.
    ///
    /// # Errors
    /// Returns `ConfigError::SelfFallback` if `fallback` is this very instance.
    pub fn with_fallback(&self, fallback: &Config) -> Result<Self, ConfigError> {
        if std::ptr::eq(self, fallback) {
            return Err(ConfigError::SelfFallback);
        }
        let link = match &self.fallback {
            Some(existing) if std::ptr::eq(existing.as_ref(), fallback) => existing.clone(),
            Some(existing) => Arc::new(existing.with_fallback(fallback)?),
            None => Arc::new(fallback.clone()),
        };
        log::debug!(
            "layering config ({} keys) over fallback ({} keys)",
            self.own.object().len(),
            link.root.len()
        );
        Ok(Self::layered(self.own.clone(), Some(link)))
    }

    /// Duplicates this config. An owned fallback chain is copied as well;
    /// a config without one adopts `fallback` as its lookup fallback.
    #[must_use]
    pub fn copy(&self, fallback: Option<&Config>) -> Self {
        let fallback = match &self.fallback {
            Some(existing) => Some(Arc::new(existing.copy(None))),
            None => fallback.map(|f| Arc::new(f.clone())),
        };
        Config {
            own: self.own.clone(),
            root: self.root.clone(),
            fallback,
            resolved: OnceLock::new(),
        }
    }

    pub fn fallback(&self) -> Option<&Config> {
        self.fallback.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The resolved root object.
    ///
    /// # Errors
    /// Returns a `ResolverError` if substitutions cannot be resolved.
    pub fn root(&self) -> Result<&HoconValue, HoconError> {
        Ok(self.resolved()?)
    }

    fn resolved(&self) -> Result<&HoconValue, ResolverError> {
        self.resolved
            .get_or_init(|| self.resolve())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn resolve(&self) -> Result<HoconValue, ResolverError> {
        let sites = self.layered_sites();
        let tree = Resolver::new(self.root.clone(), &sites, self.fallback()).resolve()?;
        Ok(HoconValue::Object(tree))
    }

    fn layered_sites(&self) -> Vec<LayeredSite> {
        let mut sites = Vec::new();
        let mut link = Some(self);
        let mut layer = 0;
        while let Some(config) = link {
            sites.extend(
                config
                    .own
                    .substitutions()
                    .iter()
                    .cloned()
                    .map(|site| LayeredSite { layer, site }),
            );
            link = config.fallback();
            layer += 1;
        }
        sites
    }

    /// Walks `path` through the resolved tree, retrying the whole path
    /// against the fallback on the first miss.
    pub(crate) fn lookup_resolved(&self, path: &[String]) -> Result<Option<&HoconValue>, ResolverError> {
        let mut node = self.resolved()?;
        for key in path {
            match node.get_child_object(key) {
                Some(child) => node = child,
                None => {
                    return match self.fallback() {
                        Some(fallback) => fallback.lookup_resolved(path),
                        None => Ok(None),
                    };
                }
            }
        }
        Ok(Some(node))
    }

    /// Looks up the node at `path`. The empty path yields the root.
    ///
    /// # Errors
    /// Returns an error for a malformed path or a failed resolution.
    pub fn get_node(&self, path: &str) -> Result<Option<&HoconValue>, HoconError> {
        let segments = split_dotted_path(path)?;
        Ok(self.lookup_resolved(&segments)?)
    }

    fn get_with<'a, T>(
        &'a self,
        path: &str,
        convert: impl FnOnce(&'a HoconValue) -> Result<T, ConversionError>,
    ) -> Result<Option<T>, HoconError> {
        match self.get_node(path)? {
            Some(node) => convert(node)
                .map(Some)
                .map_err(|e| HoconError::from(e.at(path))),
            None => Ok(None),
        }
    }

    /// Whether a value exists at `path`. Absence is `Ok(false)`.
    ///
    /// # Errors
    /// Only a malformed `path` or a failed resolution of this config.
    pub fn has_path(&self, path: &str) -> Result<bool, HoconError> {
        Ok(self.get_node(path)?.is_some())
    }

    /// Whether `path` holds an object. Absence is `Ok(false)`; errors as for
    /// [`Config::has_path`].
    pub fn is_object(&self, path: &str) -> Result<bool, HoconError> {
        Ok(self.get_node(path)?.is_some_and(HoconValue::is_object))
    }

    /// Whether `path` holds an array. Absence is `Ok(false)`; errors as for
    /// [`Config::has_path`].
    pub fn is_array(&self, path: &str) -> Result<bool, HoconError> {
        Ok(self.get_node(path)?.is_some_and(HoconValue::is_array))
    }

    // === Scalars ===

    pub fn get_boolean(&self, path: &str) -> Result<bool, HoconError> {
        self.get_boolean_or(path, false)
    }

    pub fn get_boolean_or(&self, path: &str, default: bool) -> Result<bool, HoconError> {
        Ok(self.get_with(path, HoconValue::get_boolean)?.unwrap_or(default))
    }

    pub fn get_int32(&self, path: &str) -> Result<i32, HoconError> {
        self.get_int32_or(path, 0)
    }

    pub fn get_int32_or(&self, path: &str, default: i32) -> Result<i32, HoconError> {
        Ok(self.get_with(path, HoconValue::get_int32)?.unwrap_or(default))
    }

    pub fn get_int64(&self, path: &str) -> Result<i64, HoconError> {
        self.get_int64_or(path, 0)
    }

    pub fn get_int64_or(&self, path: &str, default: i64) -> Result<i64, HoconError> {
        Ok(self.get_with(path, HoconValue::get_int64)?.unwrap_or(default))
    }

    pub fn get_float32(&self, path: &str) -> Result<f32, HoconError> {
        self.get_float32_or(path, 0.0)
    }

    pub fn get_float32_or(&self, path: &str, default: f32) -> Result<f32, HoconError> {
        Ok(self.get_with(path, HoconValue::get_float32)?.unwrap_or(default))
    }

    pub fn get_float64(&self, path: &str) -> Result<f64, HoconError> {
        self.get_float64_or(path, 0.0)
    }

    pub fn get_float64_or(&self, path: &str, default: f64) -> Result<f64, HoconError> {
        Ok(self.get_with(path, HoconValue::get_float64)?.unwrap_or(default))
    }

    pub fn get_string(&self, path: &str) -> Result<String, HoconError> {
        self.get_string_or(path, "")
    }

    pub fn get_string_or(&self, path: &str, default: &str) -> Result<String, HoconError> {
        Ok(self
            .get_with(path, HoconValue::get_string)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Reads a duration; `infinite` yields `Duration::MAX`.
    pub fn get_time_duration(&self, path: &str) -> Result<Duration, HoconError> {
        self.get_time_duration_or(path, Duration::ZERO)
    }

    pub fn get_time_duration_or(&self, path: &str, default: Duration) -> Result<Duration, HoconError> {
        Ok(self
            .get_with(path, |v| v.get_time_duration(true))?
            .unwrap_or(default))
    }

    /// Reads a duration, rejecting `infinite` with `ConfigError::InfiniteDuration`.
    pub fn get_time_duration_infinite_not_allowed(&self, path: &str) -> Result<Duration, HoconError> {
        self.get_time_duration_infinite_not_allowed_or(path, Duration::ZERO)
    }

    pub fn get_time_duration_infinite_not_allowed_or(
        &self,
        path: &str,
        default: Duration,
    ) -> Result<Duration, HoconError> {
        Ok(self
            .get_with(path, |v| v.get_time_duration(false))?
            .unwrap_or(default))
    }

    /// Reads a size in bytes, or `-1` when the path is absent.
    pub fn get_byte_size(&self, path: &str) -> Result<i128, HoconError> {
        self.get_byte_size_or(path, -1)
    }

    pub fn get_byte_size_or(&self, path: &str, default: i128) -> Result<i128, HoconError> {
        Ok(self.get_with(path, HoconValue::get_byte_size)?.unwrap_or(default))
    }

    // === Lists ===

    fn get_list<T>(
        &self,
        path: &str,
        convert: impl Fn(&HoconValue) -> Result<T, ConversionError>,
    ) -> Result<Vec<T>, HoconError> {
        Ok(self
            .get_with(path, |v| v.get_list(convert))?
            .unwrap_or_default())
    }

    pub fn get_boolean_list(&self, path: &str) -> Result<Vec<bool>, HoconError> {
        self.get_list(path, HoconValue::get_boolean)
    }

    pub fn get_int32_list(&self, path: &str) -> Result<Vec<i32>, HoconError> {
        self.get_list(path, HoconValue::get_int32)
    }

    pub fn get_int64_list(&self, path: &str) -> Result<Vec<i64>, HoconError> {
        self.get_list(path, HoconValue::get_int64)
    }

    pub fn get_float32_list(&self, path: &str) -> Result<Vec<f32>, HoconError> {
        self.get_list(path, HoconValue::get_float32)
    }

    pub fn get_float64_list(&self, path: &str) -> Result<Vec<f64>, HoconError> {
        self.get_list(path, HoconValue::get_float64)
    }

    pub fn get_byte_list(&self, path: &str) -> Result<Vec<u8>, HoconError> {
        self.get_list(path, HoconValue::get_byte)
    }

    pub fn get_string_list(&self, path: &str) -> Result<Vec<String>, HoconError> {
        self.get_list(path, HoconValue::get_string)
    }

    // === Maps ===

    fn get_map<T>(
        &self,
        path: &str,
        convert: impl Fn(&HoconValue) -> Result<T, ConversionError>,
    ) -> Result<IndexMap<String, T>, HoconError> {
        Ok(self
            .get_with(path, |v| v.get_map(convert))?
            .unwrap_or_default())
    }

    pub fn get_string_map_string(&self, path: &str) -> Result<IndexMap<String, String>, HoconError> {
        self.get_map(path, HoconValue::get_string)
    }

    pub fn get_string_map_bool(&self, path: &str) -> Result<IndexMap<String, bool>, HoconError> {
        self.get_map(path, HoconValue::get_boolean)
    }

    pub fn get_string_map_int32(&self, path: &str) -> Result<IndexMap<String, i32>, HoconError> {
        self.get_map(path, HoconValue::get_int32)
    }

    pub fn get_string_map_int64(&self, path: &str) -> Result<IndexMap<String, i64>, HoconError> {
        self.get_map(path, HoconValue::get_int64)
    }

    pub fn get_string_map_float32(&self, path: &str) -> Result<IndexMap<String, f32>, HoconError> {
        self.get_map(path, HoconValue::get_float32)
    }

    pub fn get_string_map_float64(&self, path: &str) -> Result<IndexMap<String, f64>, HoconError> {
        self.get_map(path, HoconValue::get_float64)
    }

    // === Raw values and sub-configs ===

    pub fn get_value(&self, path: &str) -> Result<Option<&HoconValue>, HoconError> {
        self.get_node(path)
    }

    pub fn get_array_value(&self, path: &str) -> Result<&[HoconValue], HoconError> {
        Ok(self.get_with(path, HoconValue::get_array)?.unwrap_or(&[]))
    }

    pub fn get_map_value(&self, path: &str) -> Result<IndexMap<String, HoconValue>, HoconError> {
        self.get_map(path, |v| Ok(v.clone()))
    }

    /// Projects the object at `path` into its own config.
    ///
    /// When the fallback also holds `path`, the projection of the fallback
    /// becomes the new config's fallback, recursively.
    pub fn get_config(&self, path: &str) -> Result<Option<Config>, HoconError> {
        let primary = self.get_with(path, object_config)?;
        let fallback = match self.fallback() {
            Some(fallback) => fallback.get_config(path)?,
            None => None,
        };
        match (primary, fallback) {
            (Some(primary), Some(fallback)) => Ok(Some(primary.with_fallback(&fallback)?)),
            (primary, None) => Ok(primary),
            (None, fallback) => Ok(fallback),
        }
    }

    pub fn get_object(&self, path: &str) -> Result<Option<Config>, HoconError> {
        self.get_config(path)
    }

    pub fn get_object_array(&self, path: &str) -> Result<Vec<Config>, HoconError> {
        self.get_list(path, object_config)
    }

    pub fn get_object_map(&self, path: &str) -> Result<IndexMap<String, Config>, HoconError> {
        self.get_map(path, object_config)
    }

    // === Serialization ===

    /// Converts the resolved tree into a generic, serializable `Value`.
    ///
    /// # Errors
    /// Returns an error if substitutions cannot be resolved.
    pub fn to_value(&self) -> Result<Value, HoconError> {
        Ok(to_value(self.resolved()?))
    }

    /// Serializes the resolved tree into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization or resolution fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the resolved tree into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization or resolution fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }
}

fn object_config(value: &HoconValue) -> Result<Config, ConversionError> {
    match value {
        HoconValue::Object(object) => Ok(Config::from_root(HoconRoot::from_object(object.clone()))),
        other => Err(ConversionError::mismatch("an object", other.kind_name())),
    }
}

impl Serialize for Config {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let root = self.resolved().map_err(S::Error::custom)?;
        to_value(root).serialize(serializer)
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved() {
            Ok(root) => write!(f, "{root}"),
            Err(_) => write!(f, "{}", self.root),
        }
    }
}
