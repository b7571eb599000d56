//! Session registry: token -> verified identity, with expiry.
//!
//! Sessions live only in process memory. A restart, an explicit
//! [`SessionRegistry::end`], or the TTL ends them; the owner must then
//! re-verify.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CapsuleError, Result};

use super::BtcAddress;

/// Opaque handle a caller presents on every owner-scoped request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionToken {
    type Err = CapsuleError;

    fn from_str(value: &str) -> Result<Self> {
        Uuid::parse_str(value.trim())
            .map(SessionToken)
            .map_err(|_| CapsuleError::InvalidInput("Malformed session token".to_string()))
    }
}

/// Proof that the holder controls `address`, valid until `expires_at`.
///
/// Only the identity verifier can mint one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    token: SessionToken,
    address: BtcAddress,
    expires_at: DateTime<Utc>,
}

impl VerifiedIdentity {
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn address(&self) -> &BtcAddress {
        &self.address
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Whether a caller currently holds a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IdentityStatus {
    Unverified,
    Verified {
        address: BtcAddress,
        expires_at: DateTime<Utc>,
    },
}

struct SessionEntry {
    address: BtcAddress,
    expires_at: DateTime<Utc>,
}

/// Process-wide session map.
pub struct SessionRegistry {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a fresh token to `address`.
    pub(crate) fn establish(&self, address: BtcAddress, now: DateTime<Utc>) -> VerifiedIdentity {
        let token = SessionToken::generate();
        let expires_at = now + self.ttl;

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            token,
            SessionEntry {
                address: address.clone(),
                expires_at,
            },
        );

        VerifiedIdentity {
            token,
            address,
            expires_at,
        }
    }

    /// Look up a live session. Missing, unknown and expired tokens all fail
    /// with [`CapsuleError::NotAuthenticated`].
    pub fn resolve(
        &self,
        token: Option<&SessionToken>,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity> {
        let token = token.ok_or(CapsuleError::NotAuthenticated)?;

        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        match sessions.get(token) {
            Some(entry) if entry.expires_at > now => Ok(VerifiedIdentity {
                token: *token,
                address: entry.address.clone(),
                expires_at: entry.expires_at,
            }),
            _ => Err(CapsuleError::NotAuthenticated),
        }
    }

    pub fn status(&self, token: Option<&SessionToken>, now: DateTime<Utc>) -> IdentityStatus {
        match self.resolve(token, now) {
            Ok(identity) => IdentityStatus::Verified {
                address: identity.address,
                expires_at: identity.expires_at,
            },
            Err(_) => IdentityStatus::Unverified,
        }
    }

    /// End a session. Returns false if the token was not live.
    pub fn end(&self, token: &SessionToken) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
