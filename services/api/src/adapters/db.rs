//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` and `AnnotationStore` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use problem_dojo_core::domain::{ProblemStatus, User, UserCredentials, UserProfile};
use problem_dojo_core::ports::{AnnotationStore, DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` and `AnnotationStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a database error, turning permission problems into `Unauthorized`.
fn unexpected(e: sqlx::Error) -> PortError {
    if let Some(db_err) = e.as_database_error() {
        // insufficient_privilege
        if db_err.code().as_deref() == Some("42501") {
            return PortError::Unauthorized;
        }
    }
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    atcoder_id: Option<String>,
}
impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            atcoder_id: self.atcoder_id,
        }
    }
}

#[derive(FromRow)]
struct StatusRecord {
    problem_id: String,
    status: String,
}
impl StatusRecord {
    fn to_domain(self) -> (String, ProblemStatus) {
        let status = ProblemStatus::from_key(&self.status).unwrap_or_else(|| {
            warn!(
                "Unknown stored status '{}' for {}, treating as {}",
                self.status,
                self.problem_id,
                ProblemStatus::NoTry
            );
            ProblemStatus::NoTry
        });
        (self.problem_id, status)
    }
}

#[derive(FromRow)]
struct MemoRecord {
    problem_id: String,
    memo: String,
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                PortError::Conflict(format!("Email {} is already registered", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT user_id, atcoder_id FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(ProfileRecord::to_domain).unwrap_or(UserProfile {
            user_id,
            atcoder_id: None,
        }))
    }

    async fn set_atcoder_id(&self, user_id: Uuid, atcoder_id: &str) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "INSERT INTO profiles (user_id, atcoder_id) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE \
             SET atcoder_id = EXCLUDED.atcoder_id, updated_at = now() \
             RETURNING user_id, atcoder_id",
        )
        .bind(user_id)
        .bind(atcoder_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `AnnotationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AnnotationStore for DbAdapter {
    async fn list_statuses(&self, user_id: Uuid) -> PortResult<Vec<(String, ProblemStatus)>> {
        let records = sqlx::query_as::<_, StatusRecord>(
            "SELECT problem_id, status FROM problem_statuses WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(StatusRecord::to_domain).collect())
    }

    async fn list_memos(&self, user_id: Uuid) -> PortResult<Vec<(String, String)>> {
        let records = sqlx::query_as::<_, MemoRecord>(
            "SELECT problem_id, memo FROM problem_memos WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| (r.problem_id, r.memo)).collect())
    }

    async fn upsert_status(
        &self,
        user_id: Uuid,
        problem_id: &str,
        status: ProblemStatus,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO problem_statuses (user_id, problem_id, status) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, problem_id) DO UPDATE \
             SET status = EXCLUDED.status, updated_at = now()",
        )
        .bind(user_id)
        .bind(problem_id)
        .bind(status.key())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn upsert_memo(&self, user_id: Uuid, problem_id: &str, memo: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO problem_memos (user_id, problem_id, memo) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, problem_id) DO UPDATE \
             SET memo = EXCLUDED.memo, updated_at = now()",
        )
        .bind(user_id)
        .bind(problem_id)
        .bind(memo)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
