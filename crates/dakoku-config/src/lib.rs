//! Settings for the dakoku worker.
//!
//! A run reads `dakoku.toml` (or built-in defaults), expands `${VAR}`
//! references, then lets `JOBCAN_*`, `SLACKWF_*` and `DAKOKU_*` variables
//! override individual fields. [`ConfigValidator`] reports what is off.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{parse_hhmm, ConfigValidator, Finding, ValidationResult};
