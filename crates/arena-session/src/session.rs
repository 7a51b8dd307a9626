//! Session state derived from access and refresh tokens.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::claims::{TokenClaims, decode_claims};
use crate::errors::Result;

/// The raw token pair needed to restore a session later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    /// Access token presented on every request and on socket connect.
    pub token: String,
    /// Refresh token exchanged for a new access token (may be empty).
    pub refresh_token: String,
}

/// An authenticated identity held by the client.
///
/// Created at authentication and mutated in place by
/// [`apply_tokens`](Self::apply_tokens) whenever a refresh exchange succeeds.
/// Logout is owned by the caller.
#[derive(Clone)]
pub struct Session {
    token: String,
    refresh_token: String,
    expires_at: i64,
    refresh_expires_at: i64,
    created_at: i64,
    created: bool,
    user_id: String,
    username: String,
    variables: HashMap<String, String>,
}

impl Session {
    /// Build a session from freshly issued tokens.
    ///
    /// `created` is whether the authentication call also created the account.
    pub fn new(token: &str, refresh_token: &str, created: bool) -> Result<Self> {
        Self::new_at(token, refresh_token, created, arena_core::now_secs())
    }

    /// Build a session with an explicit creation timestamp.
    pub fn new_at(token: &str, refresh_token: &str, created: bool, now: i64) -> Result<Self> {
        let mut session = Self {
            token: String::new(),
            refresh_token: String::new(),
            expires_at: 0,
            refresh_expires_at: 0,
            created_at: now,
            created,
            user_id: String::new(),
            username: String::new(),
            variables: HashMap::new(),
        };
        session.apply_tokens(token, refresh_token)?;
        Ok(session)
    }

    /// Rebuild a session from previously issued tokens.
    ///
    /// Decoded state is identical to a fresh session over the same tokens.
    pub fn restore(token: &str, refresh_token: &str) -> Result<Self> {
        Self::new(token, refresh_token, false)
    }

    /// Absorb a new token pair.
    ///
    /// Both tokens are decoded before anything is replaced, so a decode
    /// failure leaves the session untouched. An empty `refresh_token` keeps
    /// the current refresh token and its expiry.
    pub fn apply_tokens(&mut self, token: &str, refresh_token: &str) -> Result<()> {
        let access = decode_claims(token)?;
        let refresh = if refresh_token.is_empty() {
            None
        } else {
            Some(decode_claims(refresh_token)?)
        };

        let TokenClaims {
            expires_at,
            user_id,
            username,
            variables,
        } = access;

        self.token = token.to_owned();
        self.expires_at = expires_at;
        if let Some(user_id) = user_id {
            self.user_id = user_id;
        }
        if let Some(username) = username {
            self.username = username;
        }
        if let Some(variables) = variables {
            self.variables = variables;
        }
        if let Some(refresh) = refresh {
            refresh_token.clone_into(&mut self.refresh_token);
            self.refresh_expires_at = refresh.expires_at;
        }

        debug!(
            user_id = %self.user_id,
            expires_at = self.expires_at,
            refresh_expires_at = self.refresh_expires_at,
            "session tokens applied"
        );
        Ok(())
    }

    /// Whether the access token has expired at `now` (epoch seconds).
    pub fn is_access_expired(&self, now: i64) -> bool {
        self.expires_at - now < 0
    }

    /// Whether the refresh token has expired at `now` (epoch seconds).
    pub fn is_refresh_expired(&self, now: i64) -> bool {
        self.refresh_expires_at - now < 0
    }

    /// Whether the access token expires within `buffer_secs` of `now`.
    pub fn should_refresh(&self, now: i64, buffer_secs: i64) -> bool {
        now + buffer_secs >= self.expires_at
    }

    /// Seconds until the access token expires (negative once expired).
    pub fn expires_in(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Access token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Refresh token (empty if none was ever issued).
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Both tokens, for persisting and later [`restore`](Self::restore).
    pub fn tokens(&self) -> SessionTokens {
        SessionTokens {
            token: self.token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    /// Access token expiry, epoch seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Refresh token expiry, epoch seconds (0 if no refresh token).
    pub fn refresh_expires_at(&self) -> i64 {
        self.refresh_expires_at
    }

    /// When this session object was built, epoch seconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Whether the account was created by the authentication call.
    pub fn created(&self) -> bool {
        self.created
    }

    /// User id from the `uid` claim.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Username from the `usn` claim.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Session variables from the `vrs` claim.
    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }
}

impl fmt::Debug for Session {
    // Tokens are credentials; keep them out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("expires_at", &self.expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("created_at", &self.created_at)
            .field("created", &self.created)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}
