//! HTTP basic authentication.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clio_config::BasicAuthConfig;
use http::header::{HeaderValue, AUTHORIZATION};
use http::HeaderMap;

/// Value of the `WWW-Authenticate` header on 401 responses.
pub const CHALLENGE: &str = "Basic realm=\"clio\"";

/// Accepted user name and password pairs.
#[derive(Clone, Default)]
pub struct BasicAuth {
    users: Vec<(String, String)>,
}

impl BasicAuth {
    /// Creates an authenticator from `(user, password)` pairs.
    pub fn new<I, U, P>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        Self {
            users: users
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }

    /// Builds an authenticator from configuration.
    ///
    /// Returns `None` when no users are configured, meaning requests are not
    /// authenticated at all.
    pub fn from_config(config: Option<&BasicAuthConfig>) -> Option<Self> {
        let auth = Self::new(
            config
                .into_iter()
                .flat_map(|config| config.credentials())
                .map(|c| (c.username.clone(), c.password.clone())),
        );
        (!auth.users.is_empty()).then_some(auth)
    }

    /// Returns the number of configured users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if no users are configured.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Returns `true` if `headers` carry credentials for a configured user.
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(decode)
            .is_some_and(|(user, password)| {
                self.users
                    .iter()
                    .any(|(u, p)| *u == user && *p == password)
            })
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("users", &self.users.iter().map(|(u, _)| u).collect::<Vec<_>>())
            .finish()
    }
}

/// Decodes `Basic base64(user:password)`. The password is everything after
/// the first `:`.
fn decode(value: &HeaderValue) -> Option<(String, String)> {
    let value = value.to_str().ok()?.trim();
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clio_config::Credential;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(credentials: &str) -> HeaderMap {
        headers(&format!("Basic {}", STANDARD.encode(credentials)))
    }

    #[test]
    fn test_valid_credentials() {
        let auth = BasicAuth::new([("admin", "secret"), ("viewer", "pa:ss")]);
        assert!(auth.authorize(&basic("admin:secret")));
        assert!(auth.authorize(&basic("viewer:pa:ss")));
        assert!(auth.authorize(&headers(&format!("basic {}", STANDARD.encode("admin:secret")))));
    }

    #[test]
    fn test_rejected_credentials() {
        let auth = BasicAuth::new([("admin", "secret")]);
        assert!(!auth.authorize(&HeaderMap::new()));
        assert!(!auth.authorize(&basic("admin:wrong")));
        assert!(!auth.authorize(&basic("admin")));
        assert!(!auth.authorize(&headers("Basic !!not-base64!!")));
        assert!(!auth.authorize(&headers(&format!("Bearer {}", STANDARD.encode("admin:secret")))));
    }

    #[test]
    fn test_from_config_merges_users() {
        let config = BasicAuthConfig {
            user: Some(Credential {
                username: "a".into(),
                password: "1".into(),
            }),
            users: vec![Credential {
                username: "b".into(),
                password: "2".into(),
            }],
        };
        let auth = BasicAuth::from_config(Some(&config)).unwrap();
        assert_eq!(auth.len(), 2);
        assert!(auth.authorize(&basic("b:2")));

        assert!(BasicAuth::from_config(None).is_none());
        assert!(BasicAuth::from_config(Some(&BasicAuthConfig::default())).is_none());
    }

    #[test]
    fn test_debug_hides_passwords() {
        let auth = BasicAuth::new([("admin", "hunter2")]);
        assert!(!format!("{auth:?}").contains("hunter2"));
    }
}
