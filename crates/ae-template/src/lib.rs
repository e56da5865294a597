//! Text templates and computed expressions for automation values
//!
//! Built on minijinja. Templates render against a JSON data object (usually
//! a section of the automation's execution context) and expressions evaluate
//! to a JSON value.
//!
//! # Filters
//!
//! - `| int` / `| float` / `| bool` - Type conversion
//! - `| round(2)` - Round to precision
//! - `| to_json` / `| from_json` - JSON serialization
//! - `| regex_replace(pattern, replacement)` - Regex substitution
//!
//! # Example
//!
//! ```ignore
//! use ae_template::TemplateEngine;
//!
//! let engine = TemplateEngine::new();
//! let text = engine.render_with_context(
//!     "Quote {{ quote.number }}",
//!     serde_json::json!({"quote": {"number": "Q-1"}}),
//! )?;
//! ```

mod engine;
mod error;
mod filters;

pub use engine::TemplateEngine;
pub use error::{TemplateError, TemplateResult};
