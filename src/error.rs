//! Error taxonomy for loading and decoding topology documents.
//!
//! Both `LoadError` and `DecodeError` end in the Failure view state. A
//! property domain that cannot be established is not an error at all: the
//! colorizer and the bar chart return `None` and the view keeps rendering.

use std::ops::Deref;

use thiserror::Error;

/// Failures turning a topology document into features.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("object '{key}' not found in topology (available: {})", available.join(", "))]
    MissingObject { key: String, available: Vec<String> },

    #[error("unsupported geometry type '{0}'")]
    UnsupportedGeometry(String),

    #[error("arc index {index} out of range ({len} arcs)")]
    ArcOutOfRange { index: i64, len: usize },

    #[error("invalid coordinates in {0} geometry")]
    InvalidCoordinates(&'static str),
}

/// Failures fetching or parsing a topology document.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid topology JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(Box::new(figment::Error::from(message.into())))
    }
}

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_object_lists_available_keys() {
        let err = DecodeError::MissingObject {
            key: "land".into(),
            available: vec!["countries".into(), "rivers".into()],
        };
        assert_eq!(
            err.to_string(),
            "object 'land' not found in topology (available: countries, rivers)"
        );
    }

    #[test]
    fn decode_error_is_a_load_error() {
        let err: LoadError = DecodeError::UnsupportedGeometry("Sphere".into()).into();
        assert!(matches!(err, LoadError::Decode(DecodeError::UnsupportedGeometry(_))));
        assert_eq!(err.to_string(), "unsupported geometry type 'Sphere'");
    }

    #[test]
    fn config_error_carries_message() {
        let err = ConfigError::invalid("scale must be positive");
        assert!(err.to_string().contains("scale must be positive"));
    }
}
