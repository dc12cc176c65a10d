//! Error types for featureplan
//!
//! Every failure the resolution engine can raise is a variant of [`Error`].
//! Errors are fatal at the point they are raised and propagate to the caller;
//! nothing in the core retries.
//!
//! Messages always name the offending entity (view, feature, transform kind)
//! so that a misconfigured definition can be found quickly.

use crate::expr::ExprError;
use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors that can occur while describing and resolving features
#[derive(Error, Debug)]
pub enum Error {
    /// An accessor was called on a feature view that still holds name references
    ///
    /// The caller must have the registry substitute concrete objects and build a
    /// new view before querying keys, output fields or boundedness.
    #[error("Feature view '{0}' is unresolved; build it through a registry first")]
    Unresolved(String),

    /// Two features defined on the same view share a name
    #[error("Feature view '{view}' contains duplicated feature name '{feature}'")]
    DuplicateFeature { view: String, feature: String },

    /// Type inference reached a transform it cannot type
    #[error("Cannot derive data type of feature '{feature}' with {transform}: {reason}")]
    UnsupportedTransform {
        feature: String,
        transform: &'static str,
        reason: String,
    },

    /// The expression oracle rejected an expression while typing a feature
    ///
    /// The oracle's error is kept unchanged as the source.
    #[error("Failed to derive data type of feature '{feature}': {source}")]
    Expression {
        feature: String,
        #[source]
        source: ExprError,
    },

    /// The operation is not supported by this kind of table or processor
    ///
    /// Sinks have no boundedness; processors reject options they cannot honor.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A name reference could not be found in the registry
    #[error("Table descriptor '{0}' not found")]
    TableNotFound(String),

    /// An output field has no backing feature in the view or its source
    #[error("Feature '{feature}' not found in table '{table}'")]
    FeatureNotFound { table: String, feature: String },

    /// A descriptor with the same name is already registered
    #[error("Table descriptor '{0}' already exists")]
    AlreadyExists(String),

    /// Storage backend error (registry persistence)
    #[error("Storage error: {0}")]
    StorageError(#[from] anyhow::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input from user
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error - this should rarely happen
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl Error {
    /// Creates an Expression error for the given feature
    pub fn expression(feature: impl Into<String>, source: ExprError) -> Self {
        Self::Expression {
            feature: feature.into(),
            source,
        }
    }

    /// Creates a NotSupported error from a string
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Creates a ConfigError from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Creates an InvalidInput error from a string
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates an InternalError from a string
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}
