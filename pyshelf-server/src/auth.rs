//! Basic-auth gate for the write path.
//!
//! A single credential pair configured at startup. When no credentials are
//! configured the gate is disabled and uploads are open (private-network
//! deployments behind their own auth proxy).

use base64::Engine;

/// Upload authentication configuration.
#[derive(Clone)]
pub struct BasicAuth {
    pub enabled: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BasicAuth {
    /// Enabled only when both halves of the credential pair are present.
    pub fn from_credentials(username: Option<String>, password: Option<String>) -> Self {
        BasicAuth {
            enabled: username.is_some() && password.is_some(),
            username,
            password,
        }
    }
}

/// Validate an `Authorization` header value against the configured auth.
///
/// Returns Ok(()) on success, or an error message on failure.
pub fn validate_auth(auth: &BasicAuth, authorization: Option<&str>) -> Result<(), &'static str> {
    if !auth.enabled {
        return Ok(());
    }

    let expected_username = match &auth.username {
        Some(u) => u,
        None => return Err("Server authentication is misconfigured"),
    };

    let expected_password = match &auth.password {
        Some(p) => p,
        None => return Err("Server authentication is misconfigured"),
    };

    let header = match authorization {
        Some(h) => h,
        None => return Err("Missing credentials"),
    };

    let encoded = match header.strip_prefix("Basic ") {
        Some(e) => e,
        None => return Err("Only basic authentication is supported"),
    };

    let decoded = match base64::engine::general_purpose::STANDARD.decode(encoded) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => return Err("Wrong username or password"),
        },
        Err(_) => return Err("Wrong username or password"),
    };

    let (username, password) = match decoded.split_once(':') {
        Some(pair) => pair,
        None => return Err("Wrong username or password"),
    };

    if username == expected_username && password == expected_password {
        Ok(())
    } else {
        Err("Wrong username or password")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_enabled(username: &str, password: &str) -> BasicAuth {
        BasicAuth::from_credentials(Some(username.to_string()), Some(password.to_string()))
    }

    fn basic_header(username: &str, password: &str) -> String {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{username}:{password}"));
        format!("Basic {encoded}")
    }

    #[test]
    fn auth_disabled_passes_through() {
        let auth = BasicAuth::from_credentials(None, None);
        assert!(validate_auth(&auth, None).is_ok());
    }

    #[test]
    fn half_configured_credentials_disable_auth() {
        let auth = BasicAuth::from_credentials(Some("admin".to_string()), None);
        assert!(!auth.enabled);
    }

    #[test]
    fn auth_valid_credentials() {
        let auth = auth_enabled("admin", "secret123");
        let header = basic_header("admin", "secret123");
        assert!(validate_auth(&auth, Some(&header)).is_ok());
    }

    #[test]
    fn auth_wrong_password() {
        let auth = auth_enabled("admin", "secret123");
        let header = basic_header("admin", "wrong");
        assert!(validate_auth(&auth, Some(&header)).is_err());
    }

    #[test]
    fn auth_wrong_username() {
        let auth = auth_enabled("admin", "secret123");
        let header = basic_header("other", "secret123");
        assert!(validate_auth(&auth, Some(&header)).is_err());
    }

    #[test]
    fn auth_missing_header() {
        let auth = auth_enabled("admin", "secret123");
        assert_eq!(validate_auth(&auth, None), Err("Missing credentials"));
    }

    #[test]
    fn auth_rejects_non_basic_schemes() {
        let auth = auth_enabled("admin", "secret123");
        assert!(validate_auth(&auth, Some("Bearer token")).is_err());
    }

    #[test]
    fn auth_rejects_malformed_base64() {
        let auth = auth_enabled("admin", "secret123");
        assert!(validate_auth(&auth, Some("Basic !!!not-base64!!!")).is_err());
    }
}
