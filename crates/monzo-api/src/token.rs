//! Token endpoint payloads
//!
//! Both grants POST to `oauth2/token` as a form. Monzo answers with the
//! same JSON shape for either grant. Fields are read leniently: a missing
//! key, a `null`, or a value of an unusable type leaves that field absent
//! instead of failing the whole grant. Scalars of the "wrong" JSON type are
//! coerced where the meaning is unambiguous (`3600.0` seconds, numeric ids).

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Response from the token endpoint for both exchange and refresh.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| secs as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Body of `GET ping/whoami`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WhoAmI {
    pub authenticated: bool,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Form for the `authorization_code` grant.
pub(crate) fn authorization_code_form(
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> Vec<(String, String)> {
    vec![
        ("grant_type".into(), "authorization_code".into()),
        ("client_id".into(), client_id.into()),
        ("client_secret".into(), client_secret.into()),
        ("redirect_uri".into(), redirect_uri.into()),
        ("code".into(), code.into()),
    ]
}

/// Form for the `refresh_token` grant.
///
/// Without a stored refresh token the field is left out and the server
/// rejects the grant.
pub(crate) fn refresh_token_form(
    client_id: &str,
    client_secret: &str,
    refresh_token: Option<&str>,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("grant_type".into(), "refresh_token".into()),
        ("client_id".into(), client_id.into()),
        ("client_secret".into(), client_secret.into()),
    ];
    if let Some(token) = refresh_token {
        form.push(("refresh_token".into(), token.into()));
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn token_response_deserializes_all_fields() {
        let json = r#"{"access_token":"A","refresh_token":"R","expires_in":3600,"user_id":"U","token_type":"Bearer"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token.as_deref(), Some("A"));
        assert_eq!(token.refresh_token.as_deref(), Some("R"));
        assert_eq!(token.expires_in, Some(3600));
        assert_eq!(token.user_id.as_deref(), Some("U"));
    }

    #[test]
    fn token_response_missing_keys_are_absent() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token":"A"}"#).unwrap();
        assert_eq!(token.access_token.as_deref(), Some("A"));
        assert!(token.refresh_token.is_none());
        assert!(token.expires_in.is_none());
        assert!(token.user_id.is_none());
    }

    #[test]
    fn token_response_coerces_scalar_types() {
        let json = r#"{"access_token":"A","refresh_token":"R","expires_in":3600.0,"user_id":12345}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.expires_in, Some(3600));
        assert_eq!(token.user_id.as_deref(), Some("12345"));

        let token: TokenResponse = serde_json::from_str(r#"{"expires_in":"21600"}"#).unwrap();
        assert_eq!(token.expires_in, Some(21600));
    }

    #[test]
    fn token_response_drops_unusable_values() {
        let json = r#"{"access_token":null,"refresh_token":["R"],"expires_in":-5,"user_id":{"id":"U"}}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(token.access_token.is_none());
        assert!(token.refresh_token.is_none());
        assert!(token.expires_in.is_none());
        assert!(token.user_id.is_none());
    }

    #[test]
    fn whoami_deserializes() {
        let json = r#"{"authenticated":true,"client_id":"oauth2client_1","user_id":"user_1"}"#;
        let who: WhoAmI = serde_json::from_str(json).unwrap();
        assert!(who.authenticated);
        assert_eq!(who.user_id.as_deref(), Some("user_1"));
    }

    #[test]
    fn authorization_code_form_carries_credentials() {
        let form = authorization_code_form("cid", "secret", "http://localhost/cb", "code123");
        assert_eq!(field(&form, "grant_type"), Some("authorization_code"));
        assert_eq!(field(&form, "client_id"), Some("cid"));
        assert_eq!(field(&form, "client_secret"), Some("secret"));
        assert_eq!(field(&form, "redirect_uri"), Some("http://localhost/cb"));
        assert_eq!(field(&form, "code"), Some("code123"));
    }

    #[test]
    fn refresh_form_omits_missing_refresh_token() {
        let form = refresh_token_form("cid", "secret", Some("rt_1"));
        assert_eq!(field(&form, "grant_type"), Some("refresh_token"));
        assert_eq!(field(&form, "refresh_token"), Some("rt_1"));
        assert_eq!(field(&form, "redirect_uri"), None);

        let form = refresh_token_form("cid", "secret", None);
        assert_eq!(field(&form, "refresh_token"), None);
    }
}
