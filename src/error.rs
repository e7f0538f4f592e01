use miette::{Diagnostic, NamedSource, SourceSpan};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum HoconError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Include(#[from] IncludeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParserError {
    #[error("Unexpected token")]
    #[diagnostic(
        code(parser::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
    },

    #[error("Unexpected end of file")]
    #[diagnostic(
        code(parser::unexpected_eof),
        help("The file ended unexpectedly. The parser expected more tokens.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("File ended unexpectedly here")]
        span: SourceSpan,
    },

    #[error("Invalid path expression: {reason}")]
    #[diagnostic(
        code(parser::invalid_path),
        help("Keys and substitution paths are dot-separated; quote a segment to keep a '.' inside it.")
    )]
    InvalidPath {
        #[source_code]
        src: NamedSource<String>,
        #[label("in this path")]
        span: SourceSpan,
        reason: String,
    },

    #[error("Values of different kinds cannot be concatenated")]
    #[diagnostic(
        code(parser::invalid_concatenation),
        help("Only strings, numbers and booleans can be joined; an object or array must stand alone.")
    )]
    InvalidConcatenation {
        #[source_code]
        src: NamedSource<String>,
        #[label("this value mixes an object or array with other values")]
        span: SourceSpan,
    },

    #[error("Include directives are not enabled for this parser")]
    #[diagnostic(
        code(parser::include_unsupported),
        help("Construct the parser with an include resolver to use `include`.")
    )]
    IncludeUnsupported {
        #[source_code]
        src: NamedSource<String>,
        #[label("include found here")]
        span: SourceSpan,
    },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum IncludeError {
    #[error("Included document not found: {path}")]
    #[diagnostic(
        code(include::not_found),
        help("Check that the file exists and is readable.")
    )]
    NotFound {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Circular include detected: {cycle}")]
    #[diagnostic(
        code(include::circular),
        help("A document cannot include itself, directly or through other documents.")
    )]
    Circular { cycle: String },

    #[error("Failed to serialize object for ingestion: {message}")]
    #[diagnostic(code(include::serialization))]
    Serialization { message: String },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ResolverError {
    #[error("Unresolved substitution ${{{path}}} in `{location}`")]
    #[diagnostic(
        code(resolver::unresolved_substitution),
        help("Define `{path}` in this document or a fallback, or mark the substitution optional with `?`.")
    )]
    UnresolvedSubstitution { path: String, location: String },

    #[error("Circular substitution detected: {cycle}")]
    #[diagnostic(
        code(resolver::circular_substitution),
        help("A value cannot depend on itself through a chain of substitutions.")
    )]
    CircularSubstitution { cycle: String },

    #[error("Invalid concatenation in `{location}`: cannot join {found} with other values")]
    #[diagnostic(
        code(resolver::invalid_concatenation),
        help("A substitution that resolves to an object or array must be the whole value.")
    )]
    InvalidConcatenation { location: String, found: String },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Config can not have itself as fallback")]
    #[diagnostic(code(config::self_fallback))]
    SelfFallback,

    #[error("The root value must be an object, found {found}")]
    #[diagnostic(code(config::invalid_root))]
    InvalidRoot { found: String },

    #[error("Invalid path `{path}`: {reason}")]
    #[diagnostic(code(config::invalid_path))]
    InvalidPath { path: String, reason: String },

    #[error("Value at `{path}` cannot be read as {expected}: found {found}")]
    #[diagnostic(
        code(config::wrong_type),
        help("The stored value has a different shape than the one requested.")
    )]
    WrongType {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Value at `{path}` is `infinite`, which is not allowed here")]
    #[diagnostic(code(config::infinite_duration))]
    InfiniteDuration { path: String },
}

/// Failure to project a single value into a host type. Carries no path; the
/// config facade attaches one when it surfaces the error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("infinite duration not allowed")]
    InfiniteDuration,
}

impl ConversionError {
    pub(crate) fn mismatch(expected: &str, found: impl Into<String>) -> Self {
        ConversionError::Mismatch {
            expected: expected.to_string(),
            found: found.into(),
        }
    }

    pub(crate) fn at(self, path: &str) -> ConfigError {
        match self {
            ConversionError::Mismatch { expected, found } => ConfigError::WrongType {
                path: path.to_string(),
                expected,
                found,
            },
            ConversionError::InfiniteDuration => ConfigError::InfiniteDuration {
                path: path.to_string(),
            },
        }
    }
}
