//! Automation document loading
//!
//! Automation documents are JSON. They may also be authored as YAML, in
//! which case the loader supports these custom tags:
//!
//! - `!include path` - Include another YAML or JSON file
//! - `!include_dir_merge_list dir` - Merge lists from all files in a directory
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! Whatever the source format, the result is a `serde_json::Value` checked
//! by [`AutomationDocument::from_value`].
//!
//! # Example
//!
//! ```ignore
//! use ae_config::{load_document, AutomationDocument};
//!
//! let document = load_document("/releases/acme", "automations.yaml")?;
//! println!("{} automations", document.automations.len());
//! ```

mod document;
mod error;
mod loader;
mod secrets;

pub use document::{AutomationDocument, SchemaVersion, SUPPORTED_SCHEMA_MAJOR};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_document, load_document_string, DocumentFormat, DocumentLoader};
pub use secrets::Secrets;
