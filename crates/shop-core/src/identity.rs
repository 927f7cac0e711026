//! # Identity Principal Service
//!
//! Resolves bearer credentials to `{user_id, role}` and rotates refresh
//! credentials. Credentials are HMAC-SHA256 signed and carry their own
//! expiry; the refresh credential is additionally pinned to a single slot
//! per user, so only the most recently issued one is ever accepted.
//!
//! A superseded refresh credential and one that was never issued are
//! rejected identically with [`ShopError::Expired`]. Reuse is not treated
//! as theft and does not revoke other sessions.

use crate::config::IdentityConfig;
use crate::error::{ShopError, ShopResult};
use crate::store::MemoryStore;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, instrument};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Authorization role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// The authenticated subject of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Forbidden` unless this principal is an admin
    pub fn require_admin(&self) -> ShopResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ShopError::Forbidden("Not authorized as an admin".to_string()))
        }
    }
}

/// A user as far as the core is concerned (registration is external)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    /// The single valid refresh credential, if any
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
            refresh_token: None,
        }
    }
}

/// A freshly issued credential pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

struct Claims {
    user_id: Uuid,
    expires_at: i64,
}

/// Issues, verifies and rotates credentials
#[derive(Clone)]
pub struct TokenIssuer {
    store: MemoryStore,
    config: IdentityConfig,
}

impl TokenIssuer {
    pub fn new(store: MemoryStore, config: IdentityConfig) -> Self {
        Self { store, config }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.config.access_secret.as_bytes(),
            TokenKind::Refresh => self.config.refresh_secret.as_bytes(),
        }
    }

    fn mac(&self, kind: TokenKind) -> ShopResult<HmacSha256> {
        HmacSha256::new_from_slice(self.secret(kind))
            .map_err(|e| ShopError::Configuration(format!("invalid signing key: {e}")))
    }

    fn sign(&self, kind: TokenKind, user_id: Uuid) -> ShopResult<String> {
        let ttl = match kind {
            TokenKind::Access => self.config.access_ttl,
            TokenKind::Refresh => self.config.refresh_ttl,
        };
        let expires_at = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| Utc::now().timestamp().checked_add(secs))
            .ok_or_else(|| ShopError::Configuration("credential lifetime too large".to_string()))?;
        let payload = format!(
            "{}.{}.{}.{}",
            kind.as_str(),
            user_id.simple(),
            expires_at,
            Uuid::new_v4().simple()
        );

        let mut mac = self.mac(kind)?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Check signature, kind and expiry. The error is the caller's to choose.
    fn verify(&self, kind: TokenKind, token: &str) -> Option<Claims> {
        let (payload, signature) = token.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac(kind).ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let mut parts = payload.split('.');
        let token_kind = parts.next()?;
        let user_id = Uuid::parse_str(parts.next()?).ok()?;
        let expires_at: i64 = parts.next()?.parse().ok()?;
        parts.next()?;
        if token_kind != kind.as_str() || parts.next().is_some() {
            return None;
        }

        Some(Claims {
            user_id,
            expires_at,
        })
    }

    fn issue_pair(&self, user_id: Uuid) -> ShopResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign(TokenKind::Access, user_id)?,
            refresh_token: self.sign(TokenKind::Refresh, user_id)?,
        })
    }

    /// Resolve a bearer credential to the subject it was issued for.
    pub async fn resolve_principal(&self, credential: &str) -> ShopResult<Principal> {
        let claims = self
            .verify(TokenKind::Access, credential.trim())
            .ok_or_else(|| ShopError::Unauthorized("Invalid access token".to_string()))?;

        if claims.expires_at <= Utc::now().timestamp() {
            return Err(ShopError::Unauthorized("Access token expired".to_string()));
        }

        let role = self
            .store
            .read(|t| t.user(claims.user_id).map(|u| u.role))
            .await
            .ok_or_else(|| ShopError::Unauthorized("Invalid access token".to_string()))?;

        Ok(Principal {
            user_id: claims.user_id,
            role,
        })
    }

    /// Issue a new pair, overwriting the user's refresh slot (login).
    #[instrument(skip(self))]
    pub async fn rotate_refresh(&self, user_id: Uuid) -> ShopResult<TokenPair> {
        let pair = self.issue_pair(user_id)?;
        let refresh = pair.refresh_token.clone();
        self.store
            .transaction(|tx| tx.set_refresh_token(user_id, Some(refresh)))
            .await?;

        info!(%user_id, "credentials issued");
        Ok(pair)
    }

    /// Trade the current refresh credential for a new pair.
    ///
    /// The comparison against the stored slot and the overwrite happen in
    /// one transaction, so a credential can be exchanged at most once.
    #[instrument(skip(self, refresh_token))]
    pub async fn exchange_refresh(&self, refresh_token: &str) -> ShopResult<TokenPair> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(ShopError::Validation("Refresh token is required".to_string()));
        }

        let claims = self
            .verify(TokenKind::Refresh, refresh_token)
            .ok_or_else(|| ShopError::Unauthorized("Invalid refresh token".to_string()))?;
        if claims.expires_at <= Utc::now().timestamp() {
            return Err(ShopError::Expired);
        }

        let user_id = claims.user_id;
        let pair = self.issue_pair(user_id)?;
        let next = pair.refresh_token.clone();

        self.store
            .transaction(|tx| {
                let current = tx
                    .user(user_id)
                    .ok_or_else(|| ShopError::Unauthorized("Invalid refresh token".to_string()))?
                    .refresh_token
                    .as_deref();
                match current {
                    Some(stored) if constant_time_compare(stored, refresh_token) => {}
                    _ => return Err(ShopError::Expired),
                }
                tx.set_refresh_token(user_id, Some(next))
            })
            .await?;

        debug!(%user_id, "refresh credential rotated");
        Ok(pair)
    }

    /// Empty the refresh slot (logout).
    #[instrument(skip(self))]
    pub async fn revoke(&self, user_id: Uuid) -> ShopResult<()> {
        self.store
            .transaction(|tx| tx.set_refresh_token(user_id, None))
            .await?;
        info!(%user_id, "refresh credential revoked");
        Ok(())
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn issuer_with(role: Role) -> (TokenIssuer, Uuid) {
        let store = MemoryStore::new();
        let user = UserRecord::new("Ada", role);
        let id = user.id;
        store.insert_user(user).await;
        (
            TokenIssuer::new(store, IdentityConfig::new("access-secret", "refresh-secret")),
            id,
        )
    }

    #[tokio::test]
    async fn test_resolve_principal() {
        let (issuer, user_id) = issuer_with(Role::Admin).await;
        let pair = issuer.rotate_refresh(user_id).await.unwrap();

        let principal = issuer.resolve_principal(&pair.access_token).await.unwrap();
        assert_eq!(principal.user_id, user_id);
        assert!(principal.is_admin());
    }

    #[tokio::test]
    async fn test_bad_credentials_unauthorized() {
        let (issuer, user_id) = issuer_with(Role::User).await;
        let pair = issuer.rotate_refresh(user_id).await.unwrap();

        for credential in ["", "garbage", "a.b.c.d.e", pair.refresh_token.as_str()] {
            assert!(
                matches!(
                    issuer.resolve_principal(credential).await,
                    Err(ShopError::Unauthorized(_))
                ),
                "credential {credential:?}"
            );
        }

        let mut tampered = pair.access_token.clone();
        tampered.replace_range(7..8, if &tampered[7..8] == "0" { "1" } else { "0" });
        assert!(issuer.resolve_principal(&tampered).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_access_token() {
        let store = MemoryStore::new();
        let user = UserRecord::new("Ada", Role::User);
        let user_id = user.id;
        store.insert_user(user).await;
        let mut config = IdentityConfig::new("a", "r");
        config.access_ttl = Duration::from_secs(0);
        let issuer = TokenIssuer::new(store, config);

        let pair = issuer.rotate_refresh(user_id).await.unwrap();
        assert!(matches!(
            issuer.resolve_principal(&pair.access_token).await,
            Err(ShopError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_lifetime_is_configuration_error() {
        let store = MemoryStore::new();
        let user = UserRecord::new("Ada", Role::User);
        let user_id = user.id;
        store.insert_user(user).await;
        let mut config = IdentityConfig::new("a", "r");
        config.refresh_ttl = Duration::from_secs(u64::MAX);
        let issuer = TokenIssuer::new(store, config);

        assert!(matches!(
            issuer.rotate_refresh(user_id).await,
            Err(ShopError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_is_single_use() {
        let (issuer, user_id) = issuer_with(Role::User).await;
        let first = issuer.rotate_refresh(user_id).await.unwrap();

        let second = issuer.exchange_refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        assert!(matches!(
            issuer.exchange_refresh(&first.refresh_token).await,
            Err(ShopError::Expired)
        ));
        assert!(issuer.exchange_refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_superseded_and_unissued_rejected_alike() {
        let (issuer, user_id) = issuer_with(Role::User).await;
        let old = issuer.rotate_refresh(user_id).await.unwrap();
        issuer.rotate_refresh(user_id).await.unwrap();

        let superseded = issuer.exchange_refresh(&old.refresh_token).await.unwrap_err();

        let never_stored = issuer.sign(TokenKind::Refresh, user_id).unwrap();
        let unissued = issuer.exchange_refresh(&never_stored).await.unwrap_err();

        assert!(matches!(superseded, ShopError::Expired));
        assert!(matches!(unissued, ShopError::Expired));
    }

    #[tokio::test]
    async fn test_revoke_logs_out() {
        let (issuer, user_id) = issuer_with(Role::User).await;
        let pair = issuer.rotate_refresh(user_id).await.unwrap();
        issuer.revoke(user_id).await.unwrap();

        assert!(matches!(
            issuer.exchange_refresh(&pair.refresh_token).await,
            Err(ShopError::Expired)
        ));
    }

    #[test]
    fn test_require_admin() {
        let user = Principal {
            user_id: Uuid::new_v4(),
            role: Role::User,
        };
        assert!(matches!(user.require_admin(), Err(ShopError::Forbidden(_))));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
