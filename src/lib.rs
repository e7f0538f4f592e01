pub mod api;
pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
mod merge;
pub mod parser;
pub mod path;
mod resolver;
mod serialization;
pub mod units;

pub use api::{from_object, load_config, parse, parse_string, parse_string_with};
pub use api::{FileIncludeResolver, IncludeResolver};
pub use ast::{HoconObject, HoconRoot, HoconValue, Substitution, SubstitutionSite};
pub use config::Config;
pub use error::HoconError;
pub use serialization::Value;
