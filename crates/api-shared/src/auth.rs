//! API key authentication.
//!
//! The expected key is read once at startup, before any request is served. Handlers only compare
//! the header they received against the already-resolved [`ApiKey`].

use std::fmt;
use std::sync::Arc;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("API_KEY not set in environment")]
    NotConfigured,
    #[error("Missing x-api-key header")]
    Missing,
    #[error("Invalid API key")]
    Invalid,
}

/// The API key mutating requests must present.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    /// # Errors
    ///
    /// Returns [`AuthError::NotConfigured`] if `key` is blank.
    pub fn new(key: &str) -> Result<Self, AuthError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AuthError::NotConfigured);
        }
        Ok(Self(Arc::from(key)))
    }

    /// Resolve the key from the raw value of `API_KEY`.
    pub fn from_env_value(value: Option<String>) -> Result<Self, AuthError> {
        value.as_deref().map_or(Err(AuthError::NotConfigured), Self::new)
    }

    /// Validates the provided header value against the expected key.
    ///
    /// Returns `Ok(())` if the key is valid, or an error if invalid or missing.
    pub fn validate(&self, provided: Option<&str>) -> Result<(), AuthError> {
        match provided {
            None => Err(AuthError::Missing),
            Some(key) if key == &*self.0 => Ok(()),
            Some(_) => Err(AuthError::Invalid),
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_or_missing_key_is_not_configured() {
        assert_eq!(ApiKey::from_env_value(None).unwrap_err(), AuthError::NotConfigured);
        assert_eq!(
            ApiKey::from_env_value(Some("   ".into())).unwrap_err(),
            AuthError::NotConfigured
        );
    }

    #[test]
    fn validate_compares_the_header() {
        let key = ApiKey::new("s3cret").unwrap();
        assert_eq!(key.validate(Some("s3cret")), Ok(()));
        assert_eq!(key.validate(Some("guess")), Err(AuthError::Invalid));
        assert_eq!(key.validate(None), Err(AuthError::Missing));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let key = ApiKey::new("s3cret").unwrap();
        assert!(!format!("{key:?}").contains("s3cret"));
    }
}
