//! Engine error taxonomy
//!
//! Expected domain conditions (unknown layer, asset not ready) are logged and
//! surfaced as `Option`/`bool`; this type covers the cases callers must check.

/// Convenience result type used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Missing or invalid construction fields.
    #[error("configuration error: {0}")]
    Config(String),

    /// A named layer, slice or view could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator resource (image, sound) is not loaded yet.
    #[error("resource not ready: {0}")]
    NotReady(String),

    /// The object was already destroyed.
    #[error("object was disposed: {0}")]
    Disposed(String),

    /// Config (de)serialization failed.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// Build an [`EngineError::Config`] and log it, mirroring how the engine
    /// reports misconfigured constructors.
    pub fn config(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("{msg}");
        Self::Config(msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            EngineError::config("tween needs a duration").to_string(),
            "configuration error: tween needs a duration"
        );
        assert_eq!(
            EngineError::not_found("layer 'hud'").to_string(),
            "not found: layer 'hud'"
        );
    }

    #[test]
    fn test_serde_error_converts() {
        let err: EngineError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, EngineError::Serde(_)));
    }
}
