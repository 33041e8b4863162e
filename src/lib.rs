//! strata - layered configuration with lazy interpolation resolvers.
//!
//! Documents (YAML/JSON) may embed `${resolver:argument,k=v}` tokens that
//! are resolved on demand: environment variables (`${env:VAR}`), file
//! includes (`${file:./other.yaml}`), sibling keys (`${db.host}`), or any
//! resolver registered through [`register_resolver`]. Several documents
//! deep-merge into one tree, schemas validate the raw or resolved tree,
//! and serialization can redact values a resolver marked sensitive.
//!
//! ```no_run
//! use strata::{Config, Schema};
//!
//! let config = Config::load("app.yaml")?;
//! let url = config.get("db.url")?;
//! let schema = Schema::load("schema.yaml")?;
//! config.validate(&schema)?;
//! # Ok::<(), strata::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod interp;
pub mod merge;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod serialize;
pub mod value;

pub use config::{Config, FileSpec};
pub use error::Error;
pub use registry::{register_resolver, reset_registry, Resolver, ResolverFailure, ResolverFn};
pub use schema::{Schema, Violation};
pub use value::{ResolvedValue, Value};
