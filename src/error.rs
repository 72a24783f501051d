//! Error types for structure resolution, loading and form transitions.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failure while normalizing a schema/ui-schema pair.
///
/// Raised at construction time (or on a schema swap). The engine never
/// attempts partial rendering after one of these.
#[derive(Debug, Error)]
pub enum SchemaResolutionError {
    #[error("unresolvable $ref \"{reference}\" at {path}")]
    UnresolvedRef { path: String, reference: String },

    #[error("circular $ref \"{reference}\" at {path}")]
    CircularRef { path: String, reference: String },

    #[error("invalid {keyword} at {path}: {message}")]
    InvalidComposition {
        path: String,
        keyword: String,
        message: String,
    },

    #[error("invalid condition at {path}: {message}")]
    InvalidCondition { path: String, message: String },

    #[error("unknown type \"{value}\" at {path}")]
    UnknownType { path: String, value: String },

    #[error("invalid schema at {path}: expected object, got {actual}")]
    NotAnObject { path: String, actual: String },
}

impl SchemaResolutionError {
    /// JSON pointer of the node that could not be resolved.
    pub fn path(&self) -> &str {
        match self {
            Self::UnresolvedRef { path, .. }
            | Self::CircularRef { path, .. }
            | Self::InvalidComposition { path, .. }
            | Self::InvalidCondition { path, .. }
            | Self::UnknownType { path, .. }
            | Self::NotAnObject { path, .. } => path,
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Errors while loading JSON documents.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("fragment not found: {fragment}")]
    FragmentNotFound { fragment: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors surfaced by the form engine to its host.
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Resolution(#[from] SchemaResolutionError),

    #[error("invalid inside-click pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A handler failed and nothing was registered to receive the failure.
    #[error("unhandled rejection in {kind} handler: {failure}")]
    UnhandledRejection {
        kind: crate::event::EventKind,
        failure: crate::event::HandlerFailure,
    },
}

impl FormError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            FormError::Resolution(e) => e.exit_code(),
            FormError::Pattern(_) => 2,
            FormError::UnhandledRejection { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, HandlerFailure};

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::FragmentNotFound {
            fragment: "#/definitions/missing".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn form_error_exit_codes() {
        let err = FormError::from(SchemaResolutionError::UnknownType {
            path: "/properties/age".into(),
            value: "decimal".into(),
        });
        assert_eq!(err.exit_code(), 2);

        let err = FormError::UnhandledRejection {
            kind: EventKind::Change,
            failure: HandlerFailure::message("boom"),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn resolution_error_names_path() {
        let err = SchemaResolutionError::UnresolvedRef {
            path: "/properties/address".into(),
            reference: "#/definitions/address".into(),
        };
        assert_eq!(err.path(), "/properties/address");
        assert_eq!(
            err.to_string(),
            "unresolvable $ref \"#/definitions/address\" at /properties/address"
        );
    }

    #[test]
    fn unhandled_rejection_display() {
        let err = FormError::UnhandledRejection {
            kind: EventKind::Cancel,
            failure: HandlerFailure::message("network down"),
        };
        assert_eq!(
            err.to_string(),
            "unhandled rejection in cancel handler: network down"
        );
    }
}
