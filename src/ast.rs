use crate::error::{ConfigError, ConversionError};
use crate::lexer::is_unquoted_char;
use crate::path::join_path;
use crate::units;
use indexmap::IndexMap;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

/// A node of the configuration tree.
///
/// `Substitution` and `Concatenation` only exist between parsing and
/// resolution; a resolved tree never contains them.
#[derive(Debug, PartialEq, Clone)]
pub enum HoconValue {
    /// Any scalar text, including numbers, which are kept verbatim.
    String(String),
    Boolean(bool),
    Object(Arc<HoconObject>),
    Array(Vec<HoconValue>),
    Substitution(Substitution),
    /// Juxtaposed parts that make up one value, e.g. `${home}"/bin"`.
    Concatenation(Vec<HoconValue>),
}

/// A reference to another path, written `${path}` or `${?path}`.
#[derive(Debug, PartialEq, Clone)]
pub struct Substitution {
    pub path: Vec<String>,
    pub optional: bool,
    // Earlier definition of the same key in the same document. An optional
    // substitution that finds nothing leaves this value in place.
    pub(crate) shadowed: Option<Box<HoconValue>>,
}

/// Where a substitution was found: `location` is the path of the key whose
/// value contains it.
#[derive(Debug, PartialEq, Clone)]
pub struct SubstitutionSite {
    pub location: Vec<String>,
    pub substitution: Substitution,
}

/// An ordered mapping from keys to values.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct HoconObject {
    pub(crate) items: IndexMap<String, HoconValue>,
}

/// A parsed document: the top-level object plus every substitution site
/// discovered in it, in document order.
#[derive(Debug, PartialEq, Clone)]
pub struct HoconRoot {
    object: Arc<HoconObject>,
    substitutions: Vec<SubstitutionSite>,
}

impl Substitution {
    pub fn new(path: Vec<String>, optional: bool) -> Self {
        Self {
            path,
            optional,
            shadowed: None,
        }
    }

    /// The definition this substitution replaced, if it was assigned over one.
    pub fn shadowed(&self) -> Option<&HoconValue> {
        self.shadowed.as_deref()
    }
}

impl HoconRoot {
    /// Wraps a value as a document root, discovering its substitution sites.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidRoot` if `value` is not an object.
    pub fn new(value: HoconValue) -> Result<Self, ConfigError> {
        match value {
            HoconValue::Object(object) => Ok(Self::from_object(object)),
            other => Err(ConfigError::InvalidRoot {
                found: other.kind_name().to_string(),
            }),
        }
    }

    pub fn from_object(object: impl Into<Arc<HoconObject>>) -> Self {
        let object = object.into();
        let mut substitutions = Vec::new();
        let mut location = Vec::new();
        for (key, value) in object.iter() {
            location.push(key.clone());
            collect_sites(value, &mut location, false, &mut substitutions);
            location.pop();
        }
        Self {
            object,
            substitutions,
        }
    }

    /// Builds a root from an object and the sites a parser recorded for it.
    pub fn with_substitutions(
        object: impl Into<Arc<HoconObject>>,
        substitutions: Vec<SubstitutionSite>,
    ) -> Self {
        Self {
            object: object.into(),
            substitutions,
        }
    }

    pub fn value(&self) -> HoconValue {
        HoconValue::Object(self.object.clone())
    }

    pub fn object(&self) -> &Arc<HoconObject> {
        &self.object
    }

    pub fn substitutions(&self) -> &[SubstitutionSite] {
        &self.substitutions
    }

    pub(crate) fn into_parts(self) -> (Arc<HoconObject>, Vec<SubstitutionSite>) {
        (self.object, self.substitutions)
    }
}

/// Records every substitution below `value`. Inside arrays the location
/// stays at the key holding the array, since elements have no path.
fn collect_sites(
    value: &HoconValue,
    location: &mut Vec<String>,
    in_array: bool,
    out: &mut Vec<SubstitutionSite>,
) {
    match value {
        HoconValue::Substitution(substitution) => out.push(SubstitutionSite {
            location: location.clone(),
            substitution: substitution.clone(),
        }),
        HoconValue::Object(object) => {
            for (key, child) in object.iter() {
                if !in_array {
                    location.push(key.clone());
                }
                collect_sites(child, location, in_array, out);
                if !in_array {
                    location.pop();
                }
            }
        }
        HoconValue::Array(items) => {
            for item in items {
                collect_sites(item, location, true, out);
            }
        }
        HoconValue::Concatenation(parts) => {
            for part in parts {
                collect_sites(part, location, in_array, out);
            }
        }
        HoconValue::String(_) | HoconValue::Boolean(_) => {}
    }
}

impl HoconObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&HoconValue> {
        self.items.get(key)
    }

    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&HoconValue> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.get(first.as_ref())?, |node, key| {
                node.get_child_object(key.as_ref())
            })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HoconValue)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The key/value pairs in insertion order.
    pub fn get_map_value(&self) -> &IndexMap<String, HoconValue> {
        &self.items
    }

    /// Inserts or replaces a single key. The position of an existing key is kept.
    pub fn insert(&mut self, key: impl Into<String>, value: HoconValue) {
        self.items.insert(key.into(), value);
    }

    /// Assigns `value` at `path` below this object, creating intermediate
    /// objects as needed. `prefix` is the absolute path of this object and is
    /// used to bind self-references to the value being replaced.
    ///
    /// An object assigned over an object is merged on top of it; anything
    /// else replaces what was there.
    pub(crate) fn assign(&mut self, prefix: &mut Vec<String>, path: &[String], value: HoconValue) {
        let Some((key, rest)) = path.split_first() else {
            return;
        };
        prefix.push(key.clone());

        if rest.is_empty() {
            let value = match self.items.get(key) {
                Some(prior) => {
                    let bound = bind_self_references(value, prefix, prior);
                    match (prior, bound) {
                        (HoconValue::Object(prior), HoconValue::Object(new)) => {
                            HoconValue::Object(Arc::new(new.merge_immutable(prior)))
                        }
                        (prior, HoconValue::Object(new)) if prior.is_pending() => {
                            append_part(prior, HoconValue::Object(new))
                        }
                        (prior, HoconValue::Substitution(mut substitution)) => {
                            substitution.shadowed = Some(Box::new(prior.clone()));
                            HoconValue::Substitution(substitution)
                        }
                        (_, bound) => bound,
                    }
                }
                None => value,
            };
            self.items.insert(key.clone(), value);
        } else {
            let value = match self.items.get(key) {
                Some(HoconValue::Object(existing)) => {
                    let mut child = (**existing).clone();
                    child.assign(prefix, rest, value);
                    HoconValue::object(child)
                }
                Some(prior) if prior.is_pending() => {
                    let mut child = HoconObject::new();
                    child.assign(prefix, rest, value);
                    append_part(prior, HoconValue::object(child))
                }
                _ => {
                    let mut child = HoconObject::new();
                    child.assign(prefix, rest, value);
                    HoconValue::object(child)
                }
            };
            self.items.insert(key.clone(), value);
        }

        prefix.pop();
    }

    /// Returns a copy of this object with `path` set to `value`, or removed
    /// when `value` is `None`. Missing or non-object parents are left alone.
    pub(crate) fn with_path(&self, path: &[String], value: Option<HoconValue>) -> HoconObject {
        let Some((key, rest)) = path.split_first() else {
            return self.clone();
        };
        let mut copy = self.clone();
        if rest.is_empty() {
            match value {
                Some(value) => {
                    copy.items.insert(key.clone(), value);
                }
                None => {
                    copy.items.shift_remove(key);
                }
            }
        } else if let Some(HoconValue::Object(child)) = self.items.get(key) {
            let child = child.with_path(rest, value);
            copy.items
                .insert(key.clone(), HoconValue::Object(Arc::new(child)));
        }
        copy
    }
}

impl FromIterator<(String, HoconValue)> for HoconObject {
    fn from_iter<T: IntoIterator<Item = (String, HoconValue)>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Extends a pending value with an object to merge over it once resolved.
fn append_part(prior: &HoconValue, part: HoconValue) -> HoconValue {
    let mut parts = match prior {
        HoconValue::Concatenation(parts) => parts.clone(),
        other => vec![other.clone()],
    };
    parts.push(part);
    HoconValue::Concatenation(parts)
}

/// Replaces substitutions that point at `owner`, the key being redefined,
/// with the definition they shadow.
fn bind_self_references(value: HoconValue, owner: &mut Vec<String>, prior: &HoconValue) -> HoconValue {
    match value {
        HoconValue::Substitution(substitution) if substitution.path == *owner => prior.clone(),
        HoconValue::Concatenation(parts) => HoconValue::Concatenation(
            parts
                .into_iter()
                .map(|part| bind_self_references(part, owner, prior))
                .collect(),
        ),
        HoconValue::Object(object) => {
            let HoconValue::Object(prior_object) = prior else {
                return HoconValue::Object(object);
            };
            let bound = object
                .iter()
                .map(|(key, child)| {
                    let child = match prior_object.get(key) {
                        Some(prior_child) => {
                            owner.push(key.clone());
                            let bound = bind_self_references(child.clone(), owner, prior_child);
                            owner.pop();
                            bound
                        }
                        None => child.clone(),
                    };
                    (key.clone(), child)
                })
                .collect();
            HoconValue::Object(Arc::new(bound))
        }
        other => other,
    }
}

impl HoconValue {
    pub fn object(object: HoconObject) -> Self {
        HoconValue::Object(Arc::new(object))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            HoconValue::String(_) => "string",
            HoconValue::Boolean(_) => "boolean",
            HoconValue::Object(_) => "object",
            HoconValue::Array(_) => "array",
            HoconValue::Substitution(_) => "unresolved substitution",
            HoconValue::Concatenation(_) => "unresolved concatenation",
        }
    }

    /// Whether the value can be read as a string: strings and booleans.
    pub fn is_string(&self) -> bool {
        matches!(self, HoconValue::String(_) | HoconValue::Boolean(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, HoconValue::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, HoconValue::Array(_))
    }

    /// Whether this value is an empty object, array or string.
    pub fn is_empty(&self) -> bool {
        match self {
            HoconValue::String(s) => s.is_empty(),
            HoconValue::Object(o) => o.is_empty(),
            HoconValue::Array(a) | HoconValue::Concatenation(a) => a.is_empty(),
            HoconValue::Boolean(_) | HoconValue::Substitution(_) => false,
        }
    }

    /// Whether this value itself is a substitution or concatenation.
    fn is_pending(&self) -> bool {
        matches!(self, HoconValue::Substitution(_) | HoconValue::Concatenation(_))
    }

    /// Whether a substitution or concatenation is reachable from this value.
    pub fn is_unresolved(&self) -> bool {
        match self {
            HoconValue::Substitution(_) | HoconValue::Concatenation(_) => true,
            HoconValue::Object(o) => o.iter().any(|(_, v)| v.is_unresolved()),
            HoconValue::Array(a) => a.iter().any(HoconValue::is_unresolved),
            HoconValue::String(_) | HoconValue::Boolean(_) => false,
        }
    }

    pub fn get_child_object(&self, key: &str) -> Option<&HoconValue> {
        match self {
            HoconValue::Object(object) => object.get(key),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HoconObject> {
        match self {
            HoconValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HoconValue]> {
        match self {
            HoconValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn get_object(&self) -> Result<&HoconObject, ConversionError> {
        self.as_object()
            .ok_or_else(|| ConversionError::mismatch("an object", self.kind_name()))
    }

    pub fn get_array(&self) -> Result<&[HoconValue], ConversionError> {
        self.as_array()
            .ok_or_else(|| ConversionError::mismatch("an array", self.kind_name()))
    }

    pub fn get_string(&self) -> Result<String, ConversionError> {
        match self {
            HoconValue::String(s) => Ok(s.clone()),
            HoconValue::Boolean(b) => Ok(b.to_string()),
            other => Err(ConversionError::mismatch("a string", other.kind_name())),
        }
    }

    fn scalar_text(&self, expected: &str) -> Result<String, ConversionError> {
        self.get_string()
            .map_err(|_| ConversionError::mismatch(expected, self.kind_name()))
    }

    pub fn get_boolean(&self) -> Result<bool, ConversionError> {
        if let HoconValue::Boolean(b) = self {
            return Ok(*b);
        }
        let text = self.scalar_text("a boolean")?;
        match text.trim() {
            "true" | "on" | "yes" => Ok(true),
            "false" | "off" | "no" => Ok(false),
            other => Err(ConversionError::mismatch("a boolean", format!("`{other}`"))),
        }
    }

    fn parse_number<T: std::str::FromStr>(&self, expected: &str) -> Result<T, ConversionError> {
        let text = self.scalar_text(expected)?;
        text.trim()
            .parse::<T>()
            .map_err(|_| ConversionError::mismatch(expected, format!("`{text}`")))
    }

    pub fn get_int32(&self) -> Result<i32, ConversionError> {
        self.parse_number("a 32-bit integer")
    }

    pub fn get_int64(&self) -> Result<i64, ConversionError> {
        self.parse_number("a 64-bit integer")
    }

    pub fn get_float32(&self) -> Result<f32, ConversionError> {
        self.parse_number("a 32-bit float")
    }

    pub fn get_float64(&self) -> Result<f64, ConversionError> {
        self.parse_number("a 64-bit float")
    }

    pub fn get_byte(&self) -> Result<u8, ConversionError> {
        self.parse_number("a byte")
    }

    /// Reads a duration such as `10s` or `250ms`; a bare number is
    /// milliseconds. `infinite` maps to `Duration::MAX` when allowed.
    pub fn get_time_duration(&self, allow_infinite: bool) -> Result<Duration, ConversionError> {
        units::parse_duration(&self.scalar_text("a duration")?, allow_infinite)
    }

    /// Reads a size such as `512MiB` or `10kB` as a number of bytes.
    pub fn get_byte_size(&self) -> Result<i128, ConversionError> {
        units::parse_byte_size(&self.scalar_text("a byte size")?)
    }

    /// Converts every element of an array with `convert`, in order.
    pub fn get_list<T>(
        &self,
        convert: impl Fn(&HoconValue) -> Result<T, ConversionError>,
    ) -> Result<Vec<T>, ConversionError> {
        self.get_array()?.iter().map(convert).collect()
    }

    /// Converts every value of an object with `convert`, keeping key order.
    pub fn get_map<T>(
        &self,
        convert: impl Fn(&HoconValue) -> Result<T, ConversionError>,
    ) -> Result<IndexMap<String, T>, ConversionError> {
        self.get_object()?
            .iter()
            .map(|(key, value)| Ok((key.clone(), convert(value)?)))
            .collect()
    }

    /// Joins resolved concatenation parts into one value.
    ///
    /// A single part passes through unchanged; scalars are joined as text and
    /// objects are merged, later parts over earlier ones. Whitespace-only
    /// parts next to an object or array are dropped; any other mix with a
    /// non-scalar is an error. No parts at all is absence.
    pub fn concatenate(mut parts: Vec<HoconValue>) -> Result<Option<HoconValue>, ConversionError> {
        if parts.iter().any(|part| !part.is_string()) {
            parts.retain(|part| !matches!(part, HoconValue::String(s) if s.trim().is_empty()));
        }
        if parts.len() <= 1 {
            return Ok(parts.pop());
        }
        if parts.iter().all(HoconValue::is_object) {
            let merged = parts
                .iter()
                .filter_map(HoconValue::as_object)
                .fold(HoconObject::new(), |under, over| over.merge_immutable(&under));
            return Ok(Some(HoconValue::object(merged)));
        }
        let mut text = String::new();
        for part in &parts {
            match part {
                HoconValue::String(s) => text.push_str(s),
                HoconValue::Boolean(b) => text.push_str(if *b { "true" } else { "false" }),
                other => return Err(ConversionError::mismatch("a scalar", other.kind_name())),
            }
        }
        Ok(Some(HoconValue::String(text)))
    }
}

impl From<&str> for HoconValue {
    fn from(value: &str) -> Self {
        HoconValue::String(value.to_string())
    }
}

impl From<String> for HoconValue {
    fn from(value: String) -> Self {
        HoconValue::String(value)
    }
}

impl From<bool> for HoconValue {
    fn from(value: bool) -> Self {
        HoconValue::Boolean(value)
    }
}

impl From<HoconObject> for HoconValue {
    fn from(value: HoconObject) -> Self {
        HoconValue::object(value)
    }
}

impl From<Vec<HoconValue>> for HoconValue {
    fn from(value: Vec<HoconValue>) -> Self {
        HoconValue::Array(value)
    }
}

// --- Rendering back to HOCON text ---

fn write_string(f: &mut fmt::Formatter<'_>, s: &str, is_key: bool) -> fmt::Result {
    let bare = !s.is_empty()
        && s.chars().all(is_unquoted_char)
        && !(is_key && s.contains('.'))
        && !s.contains("//")
        && !matches!(s, "true" | "false" | "include");
    if bare {
        return write!(f, "{s}");
    }
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

impl Display for HoconValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoconValue::String(s) => write_string(f, s, false),
            HoconValue::Boolean(b) => write!(f, "{b}"),
            HoconValue::Object(object) => write!(f, "{object}"),
            HoconValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            HoconValue::Substitution(substitution) => write!(f, "{substitution}"),
            HoconValue::Concatenation(parts) => {
                for part in parts {
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl Display for HoconObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_string(f, key, true)?;
            write!(f, " = {value}")?;
        }
        write!(f, "}}")
    }
}

impl Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.optional { "?" } else { "" };
        write!(f, "${{{marker}{}}}", join_path(&self.path))
    }
}
