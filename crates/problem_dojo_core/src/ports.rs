//! crates/problem_dojo_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the public problem API and of the database.

use crate::domain::{
    Annotations, CatalogEntry, DifficultyModels, ProblemStatus, Submission, User,
    UserCredentials, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Public Problem API Ports
//=========================================================================================

#[async_trait]
pub trait ProblemCatalogService: Send + Sync {
    /// Fetches every known problem, in catalog order.
    async fn fetch_catalog(&self) -> PortResult<Vec<CatalogEntry>>;
}

#[async_trait]
pub trait DifficultyModelService: Send + Sync {
    async fn fetch_difficulties(&self) -> PortResult<DifficultyModels>;
}

#[async_trait]
pub trait SubmissionHistoryService: Send + Sync {
    /// Fetches one page of submissions at or after `from_second`.
    /// An empty page marks the end of the history.
    async fn fetch_submissions(
        &self,
        atcoder_id: &str,
        from_second: i64,
    ) -> PortResult<Vec<Submission>>;
}

//=========================================================================================
// Per-User Stores
//=========================================================================================

/// Per-user, per-problem status and memo records.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn list_statuses(&self, user_id: Uuid) -> PortResult<Vec<(String, ProblemStatus)>>;

    async fn list_memos(&self, user_id: Uuid) -> PortResult<Vec<(String, String)>>;

    async fn upsert_status(
        &self,
        user_id: Uuid,
        problem_id: &str,
        status: ProblemStatus,
    ) -> PortResult<()>;

    async fn upsert_memo(&self, user_id: Uuid, problem_id: &str, memo: &str) -> PortResult<()>;

    /// Reads both collections for a user.
    async fn load_annotations(&self, user_id: Uuid) -> PortResult<Annotations> {
        let statuses = self.list_statuses(user_id).await?;
        let memos = self.list_memos(user_id).await?;
        Ok(Annotations {
            statuses: statuses.into_iter().collect(),
            memos: memos.into_iter().collect(),
        })
    }
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Profile ---
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile>;

    async fn set_atcoder_id(&self, user_id: Uuid, atcoder_id: &str) -> PortResult<UserProfile>;
}
