use crate::ast::HoconRoot;
use crate::config::Config;
use crate::error::{ConfigError, HoconError, IncludeError};
use crate::parser::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Supplies the documents named by `include "name"` members.
pub trait IncludeResolver {
    /// Returns the parsed document for `name`.
    ///
    /// # Errors
    /// Returns an error if the document cannot be found or parsed.
    fn resolve_include(&self, name: &str) -> Result<HoconRoot, HoconError>;
}

impl<F> IncludeResolver for F
where
    F: Fn(&str) -> Result<HoconRoot, HoconError>,
{
    fn resolve_include(&self, name: &str) -> Result<HoconRoot, HoconError> {
        self(name)
    }
}

/// Resolves includes against the file system, relative to the including
/// file. Included files may include further files.
pub struct FileIncludeResolver {
    base_dir: PathBuf,
    // Files currently being included, outermost first.
    resolving_stack: Vec<PathBuf>,
}

impl FileIncludeResolver {
    /// A resolver for documents that are not files; includes are relative to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FileIncludeResolver {
            base_dir: base_dir.into(),
            resolving_stack: Vec::new(),
        }
    }

    fn for_file(path: &Path, resolving_stack: Vec<PathBuf>) -> Self {
        let base_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        FileIncludeResolver {
            base_dir,
            resolving_stack,
        }
    }

    fn load(&self, path: &Path) -> Result<HoconRoot, HoconError> {
        let path = canonical(path)?;
        if self.resolving_stack.contains(&path) {
            let cycle = self
                .resolving_stack
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| p.to_string_lossy().to_string())
                .collect::<Vec<String>>()
                .join(" -> ");
            return Err(IncludeError::Circular { cycle }.into());
        }

        let source = read(&path)?;
        let mut stack = self.resolving_stack.clone();
        stack.push(path.clone());
        let nested = FileIncludeResolver::for_file(&path, stack);

        log::debug!("loading `{}`", path.display());
        let mut parser = Parser::new_with_name(&source, path.to_string_lossy().to_string())?
            .with_include_resolver(&nested);
        parser.parse_document()
    }
}

impl IncludeResolver for FileIncludeResolver {
    fn resolve_include(&self, name: &str) -> Result<HoconRoot, HoconError> {
        self.load(&self.base_dir.join(name))
    }
}

fn canonical(path: &Path) -> Result<PathBuf, HoconError> {
    std::fs::canonicalize(path).map_err(|e| {
        IncludeError::NotFound {
            path: path.to_string_lossy().to_string(),
            source: Arc::new(e),
        }
        .into()
    })
}

fn read(path: &Path) -> Result<String, HoconError> {
    std::fs::read_to_string(path).map_err(|e| {
        IncludeError::NotFound {
            path: path.to_string_lossy().to_string(),
            source: Arc::new(e),
        }
        .into()
    })
}

/// Parses `source` into a document root, without resolving substitutions.
///
/// `include` members are only accepted when an `include_resolver` is given.
///
/// # Errors
/// Returns a `HoconError` if parsing or an include fails.
pub fn parse(
    source: &str,
    include_resolver: Option<&dyn IncludeResolver>,
) -> Result<HoconRoot, HoconError> {
    let mut parser = Parser::new(source)?;
    if let Some(resolver) = include_resolver {
        parser = parser.with_include_resolver(resolver);
    }
    parser.parse_document()
}

/// Parses `source` into a [`Config`].
///
/// This is the primary entry point for configuration held in memory.
/// Substitutions are resolved lazily, on the first query.
///
/// # Errors
/// Returns a `HoconError` if parsing fails.
pub fn parse_string(source: &str) -> Result<Config, HoconError> {
    Ok(Config::from_root(parse(source, None)?))
}

/// Parses `source` into a [`Config`], taking `include` members from `include_resolver`.
///
/// # Errors
/// Returns a `HoconError` if parsing or an include fails.
pub fn parse_string_with(
    source: &str,
    include_resolver: &dyn IncludeResolver,
) -> Result<Config, HoconError> {
    Ok(Config::from_root(parse(source, Some(include_resolver))?))
}

/// Reads and parses the file at `path`. Includes are resolved relative to
/// the including file.
///
/// # Errors
/// Returns a `HoconError` if the file or one of its includes cannot be read
/// or parsed, or if includes form a cycle.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, HoconError> {
    let root = FileIncludeResolver::new(".").load(path.as_ref())?;
    Ok(Config::from_root(root))
}

/// Builds a [`Config`] from any serializable value whose serialized form is
/// an object, such as a struct or a map.
///
/// # Errors
/// Returns `ConfigError::InvalidRoot` if `value` does not serialize to an
/// object, or `IncludeError::Serialization` if it cannot be serialized.
pub fn from_object<T: Serialize>(value: &T) -> Result<Config, HoconError> {
    let serialization = |e: serde_json::Error| IncludeError::Serialization {
        message: e.to_string(),
    };
    let json = serde_json::to_value(value).map_err(serialization)?;
    if !json.is_object() {
        let found = match json {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        };
        return Err(ConfigError::InvalidRoot {
            found: found.to_string(),
        }
        .into());
    }
    let text = serde_json::to_string(&json).map_err(serialization)?;
    parse_string(&text)
}
