//! Per-client session settings.

use serde::{Deserialize, Serialize};

/// Options fixed when a [`Client`](crate::Client) is created.
///
/// Deserializes from partial input; missing fields take their defaults, so
/// the struct can be embedded in a larger configuration file.
///
/// ```rust
/// use requests_kit::SessionOptions;
///
/// let options: SessionOptions = serde_json::from_str(r#"{"cookie_jar": true}"#).unwrap();
/// assert_eq!(options, SessionOptions::default().with_cookie_jar());
/// assert!(options.verify_tls);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Keep cookies from `Set-Cookie` headers and send them back on later
    /// requests. Has no effect without the `cookie` feature.
    pub cookie_jar: bool,
    /// Whether the transport should verify server certificates.
    ///
    /// The client only forwards this flag; enforcing it is up to the
    /// [`Transport`](crate::Transport).
    pub verify_tls: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            cookie_jar: false,
            verify_tls: true,
        }
    }
}

impl SessionOptions {
    /// Enables the cookie jar.
    pub const fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = true;
        self
    }

    /// Disables certificate verification.
    pub const fn without_tls_verification(mut self) -> Self {
        self.verify_tls = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = SessionOptions::default();
        assert!(!options.cookie_jar);
        assert!(options.verify_tls);
        assert_eq!(serde_json::from_str::<SessionOptions>("{}").unwrap(), options);
    }

    #[test]
    fn builders_and_serde() {
        let options = SessionOptions::default()
            .with_cookie_jar()
            .without_tls_verification();
        let encoded = serde_json::to_string(&options).unwrap();
        assert_eq!(encoded, r#"{"cookie_jar":true,"verify_tls":false}"#);
        assert_eq!(serde_json::from_str::<SessionOptions>(&encoded).unwrap(), options);
    }
}
