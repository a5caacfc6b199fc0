/**
 * Session Validation
 *
 * The realtime layer does not issue sessions; it asks a validator whether a
 * credential presented at upgrade time belongs to a live session, and if so
 * which household and user it belongs to.
 *
 * # Validators
 *
 * - `JwtSessionValidator` - stateless HS256 tokens carrying the family and
 *   user ids in their claims
 * - `PgSessionValidator` - looks the session id up in the `sessions` table
 *   maintained by the REST layer
 *
 * Both return `Ok(None)` for a credential that is unknown, malformed or
 * expired, and `Err` only when the validator itself could not answer.
 */

use crate::backend::error::BackendError;
use crate::shared::{FamilyId, UserId};
use futures_util::future::BoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// What a validated credential resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Household the connection will be scoped to
    pub family_id: FamilyId,
    /// Absent for system or anonymous sessions
    pub user_id: Option<UserId>,
}

/// External session lookup used by the upgrade gate
pub trait SessionValidator: Send + Sync {
    /// Resolve a credential to a session
    fn validate<'a>(
        &'a self,
        credential: &'a str,
    ) -> BoxFuture<'a, Result<Option<Session>, BackendError>>;
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<i64>,
    /// Family ID
    pub fam: i64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

impl SessionClaims {
    /// Claims for a session that expires `ttl` from now
    pub fn new(family_id: FamilyId, user_id: Option<UserId>, ttl: Duration) -> Self {
        let now = unix_now();
        Self {
            sub: user_id.map(|u| u.0),
            fam: family_id.0,
            exp: now + ttl.as_secs(),
            iat: now,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Validates HS256 session tokens signed with a shared secret
pub struct JwtSessionValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a session token
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, BackendError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }

    /// Verify and decode a token
    pub fn verify(&self, token: &str) -> Result<SessionClaims, BackendError> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

impl SessionValidator for JwtSessionValidator {
    fn validate<'a>(
        &'a self,
        credential: &'a str,
    ) -> BoxFuture<'a, Result<Option<Session>, BackendError>> {
        Box::pin(async move {
            match self.verify(credential) {
                Ok(claims) => Ok(Some(Session {
                    family_id: FamilyId(claims.fam),
                    user_id: claims.sub.map(UserId),
                })),
                Err(e) => {
                    tracing::debug!("[Sessions] Rejecting token: {}", e);
                    Ok(None)
                }
            }
        })
    }
}

/// Validates session ids against the relational `sessions` table
pub struct PgSessionValidator {
    pool: PgPool,
}

impl PgSessionValidator {
    /// Create a validator over a lazily connected pool
    ///
    /// No connection is opened until the first lookup, so the server starts
    /// even when the database is briefly unavailable.
    pub fn connect_lazy(database_url: &str) -> Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionValidator for PgSessionValidator {
    fn validate<'a>(
        &'a self,
        credential: &'a str,
    ) -> BoxFuture<'a, Result<Option<Session>, BackendError>> {
        Box::pin(async move {
            let session_id = match Uuid::parse_str(credential) {
                Ok(id) => id,
                Err(_) => {
                    tracing::debug!("[Sessions] Session id is not a UUID");
                    return Ok(None);
                }
            };

            let row: Option<(i32, i32)> = sqlx::query_as(
                "SELECT family_id, user_id FROM sessions WHERE id = $1 AND expires_at > NOW()",
            )
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(|(family_id, user_id)| Session {
                family_id: FamilyId(i64::from(family_id)),
                user_id: Some(UserId(i64::from(user_id))),
            }))
        })
    }
}
