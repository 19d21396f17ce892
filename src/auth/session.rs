//! Session management
//!
//! A `Session` is the per-browser login state. It lives in memory in the
//! [`SessionStore`](super::store::SessionStore); the browser only carries an
//! HMAC-signed session id in a cookie.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Opaque browser session identifier (a ULID)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer credential issued by GitHub
///
/// `Debug` is redacted so the token never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// GitHub user profile
///
/// Only the fields the dashboard reads are typed; everything else the
/// API returns is kept untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GitHubUser {
    /// Name to show in the UI, falling back to the login
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.login)
    }
}

/// Validated credential and the profile it was used to fetch
#[derive(Debug, Clone)]
struct Identity {
    access_token: AccessToken,
    user: GitHubUser,
}

/// Per-browser login state
///
/// The token and the user are stored together, so a session can never hold
/// one without the other.
#[derive(Debug)]
pub struct Session {
    state: Option<String>,
    identity: Option<Identity>,
    flash: Option<String>,
    last_seen: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty, unauthenticated session
    pub fn new() -> Self {
        Self {
            state: None,
            identity: None,
            flash: None,
            last_seen: Instant::now(),
        }
    }

    /// Get the CSRF state token, generating it on first use
    ///
    /// The token is a ULID, so it embeds the creation time and 80 random
    /// bits. Repeated calls return the same value until `teardown`.
    pub fn get_or_create_state(&mut self) -> &str {
        self.state
            .get_or_insert_with(|| ulid::Ulid::new().to_string())
            .as_str()
    }

    /// Stored CSRF state token, if one was generated
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Check a callback's `state` against the stored token
    ///
    /// Both values are reduced to HMAC tags and compared with the
    /// constant-time `verify_slice`. Always `false` when no token was
    /// generated.
    pub fn state_matches(&self, received: &str) -> bool {
        use hmac::Mac;

        const DOMAIN: &[u8] = b"octodash oauth state";

        let Some(expected) = self.state.as_deref() else {
            return false;
        };
        let tag = |value: &str| {
            HmacSha256::new_from_slice(DOMAIN).map(|mut mac| {
                mac.update(value.as_bytes());
                mac
            })
        };

        match (tag(expected), tag(received)) {
            (Ok(expected), Ok(received)) => expected
                .verify_slice(&received.finalize().into_bytes())
                .is_ok(),
            _ => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn user(&self) -> Option<&GitHubUser> {
        self.identity.as_ref().map(|identity| &identity.user)
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.identity.as_ref().map(|identity| &identity.access_token)
    }

    /// Commit a successful login
    pub(crate) fn authenticate(&mut self, access_token: AccessToken, user: GitHubUser) {
        self.identity = Some(Identity { access_token, user });
    }

    /// Clear everything, including the state token
    pub fn teardown(&mut self) {
        self.state = None;
        self.identity = None;
        self.flash = None;
    }

    /// Store a message to show on the next render
    pub fn set_flash(&mut self, message: impl Into<String>) {
        self.flash = Some(message.into());
    }

    /// Take the pending message, if any
    pub fn take_flash(&mut self) -> Option<String> {
        self.flash.take()
    }

    /// Record activity on this session
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Time since the last request on this session
    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }
}

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

/// Create a signed session cookie value
///
/// Format: base64(session_id).base64(hmac_sha256(base64(session_id)))
///
/// # Errors
/// Returns error if the HMAC key cannot be used
pub fn sign_session_id(id: &SessionId, secret: &[u8]) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(id.as_str().as_bytes());

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify a signed session cookie value and extract the session id
///
/// # Errors
/// Returns `AppError::Unauthorized` if the value is malformed or the
/// signature does not match
pub fn verify_session_cookie(value: &str, secret: &[u8]) -> Result<SessionId, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::Mac;

    let (payload_b64, signature_b64) = value.split_once('.').ok_or(AppError::Unauthorized)?;

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session key: {e}")))?;
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;
    let id = String::from_utf8(payload).map_err(|_| AppError::Unauthorized)?;

    Ok(SessionId(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn octocat() -> GitHubUser {
        serde_json::from_value(serde_json::json!({
            "login": "octo",
            "name": "Octo Cat",
            "avatar_url": "http://x/a.png",
            "public_repos": 8
        }))
        .unwrap()
    }

    #[test]
    fn state_is_stable_within_a_session() {
        let mut session = Session::new();
        let first = session.get_or_create_state().to_string();
        let second = session.get_or_create_state().to_string();
        assert_eq!(first, second);
        assert_eq!(session.state(), Some(first.as_str()));
    }

    #[test]
    fn state_differs_between_sessions() {
        let mut a = Session::new();
        let mut b = Session::new();
        assert_ne!(a.get_or_create_state(), b.get_or_create_state());
    }

    #[test]
    fn state_matches_only_the_exact_token() {
        let mut session = Session::new();
        assert!(!session.state_matches(""));
        assert!(!session.state_matches("anything"));

        let state = session.get_or_create_state().to_string();
        assert!(session.state_matches(&state));
        assert!(!session.state_matches(&state[1..]));
        assert!(!session.state_matches(&format!("{state}\0")));
        assert!(!session.state_matches(&state.to_lowercase()));
    }

    #[test]
    fn authenticate_stores_token_and_user_together() {
        let mut session = Session::new();
        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert!(session.access_token().is_none());

        session.authenticate(AccessToken::new("tok1"), octocat());

        assert!(session.is_authenticated());
        assert_eq!(session.user().map(|u| u.login.as_str()), Some("octo"));
        assert_eq!(session.access_token().map(AccessToken::secret), Some("tok1"));
    }

    #[test]
    fn teardown_clears_everything() {
        let mut session = Session::new();
        session.get_or_create_state();
        session.authenticate(AccessToken::new("tok1"), octocat());
        session.set_flash("hello");

        session.teardown();

        assert!(session.state().is_none());
        assert!(session.user().is_none());
        assert!(session.access_token().is_none());
        assert!(session.take_flash().is_none());
    }

    #[test]
    fn flash_is_read_once() {
        let mut session = Session::new();
        session.set_flash("boom");
        assert_eq!(session.take_flash().as_deref(), Some("boom"));
        assert_eq!(session.take_flash(), None);
    }

    #[test]
    fn user_keeps_unknown_fields() {
        let user = octocat();
        assert_eq!(user.extra.get("public_repos"), Some(&serde_json::json!(8)));

        let round_trip = serde_json::to_value(&user).unwrap();
        assert_eq!(round_trip["public_repos"], 8);
        assert_eq!(round_trip["login"], "octo");
    }

    #[test]
    fn display_name_falls_back_to_login() {
        let mut user = octocat();
        assert_eq!(user.display_name(), "Octo Cat");
        user.name = None;
        assert_eq!(user.display_name(), "octo");
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let debug = format!("{:?}", AccessToken::new("super-secret"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn signed_cookie_verifies_with_same_key() {
        let secret = [7u8; 32];
        let id = SessionId::generate();
        let value = sign_session_id(&id, &secret).unwrap();
        assert_eq!(verify_session_cookie(&value, &secret).unwrap(), id);
    }

    #[test]
    fn signed_cookie_rejects_other_key_and_tampering() {
        let id = SessionId::generate();
        let value = sign_session_id(&id, &[7u8; 32]).unwrap();
        assert!(verify_session_cookie(&value, &[8u8; 32]).is_err());

        let (_, signature) = value.split_once('.').unwrap();
        let forged = format!("{}.{}", "b3RoZXI", signature);
        assert!(verify_session_cookie(&forged, &[7u8; 32]).is_err());
        assert!(verify_session_cookie("no-dot-here", &[7u8; 32]).is_err());
    }
}
