#![warn(missing_docs)]

//! Engine-agnostic model of a 24-DOF anthropomorphic hand.
//!
//! This crate ties the document format ([`dexhand_ir`]) to the resolution
//! and validation pass ([`dexhand_kernel`]) and ships the built-in hand.
//!
//! # Example
//!
//! ```
//! let model = dexhand::shadow_model().unwrap();
//! assert_eq!(model.dof_count(), 24);
//! assert_eq!(model.dof_index("FFJ1"), Some(4));
//!
//! let json = dexhand::shadow_hand().to_json().unwrap();
//! let reloaded = dexhand::load_json(&json).unwrap();
//! assert_eq!(reloaded.summary(), model.summary());
//! ```

mod shadow;

pub use dexhand_ir as ir;
pub use dexhand_kernel as kernel;

pub use dexhand_ir::Document;
pub use dexhand_kernel::{
    EngineState, LoadOptions, Model, ModelError, ModelSummary, StateSnapshot, UnvalidatedModel,
};
pub use shadow::{shadow_hand, JOINTS};

use thiserror::Error;
use tracing::debug;

/// Errors from parsing and validating a document.
#[derive(Error, Debug)]
pub enum LoadError {
    /// JSON syntax or schema error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML syntax or schema error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The document parsed but failed validation.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Parse and validate a JSON document with default options.
pub fn load_json(json: &str) -> Result<Model, LoadError> {
    load_json_with(json, LoadOptions::default())
}

/// Parse and validate a JSON document.
pub fn load_json_with(json: &str, options: LoadOptions) -> Result<Model, LoadError> {
    debug!(bytes = json.len(), "parsing JSON hand document");
    let document = Document::from_json(json)?;
    Ok(UnvalidatedModel::new(document).with_options(options).validate()?)
}

/// Parse and validate a TOML document with default options.
pub fn load_toml(text: &str) -> Result<Model, LoadError> {
    load_toml_with(text, LoadOptions::default())
}

/// Parse and validate a TOML document.
pub fn load_toml_with(text: &str, options: LoadOptions) -> Result<Model, LoadError> {
    debug!(bytes = text.len(), "parsing TOML hand document");
    let document = Document::from_toml(text)?;
    Ok(UnvalidatedModel::new(document).with_options(options).validate()?)
}

/// The built-in hand, validated.
pub fn shadow_model() -> Result<Model, ModelError> {
    Model::from_document(shadow_hand())
}
