//! In-memory fakes of the ports and a ready-made `AppState` for handler tests.

use crate::config::Config;
use crate::web::state::AppState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use problem_dojo_core::{
    AnnotationStore, BoardRegistry, CatalogEntry, DatabaseService, DifficultyModelService,
    DifficultyModels, DrainSettings, MergeEngine, PortError, PortResult, ProblemCatalogService,
    ProblemStatus, Submission, SubmissionHistoryService, User, UserCredentials, UserProfile,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const ATCODER_ID: &str = "someone";

fn unsupported<T>() -> PortResult<T> {
    Err(PortError::Unexpected("not supported by the fake".to_string()))
}

/// Two problems of one contest and an empty submission history.
pub struct StaticProblemApi;

#[async_trait]
impl ProblemCatalogService for StaticProblemApi {
    async fn fetch_catalog(&self) -> PortResult<Vec<CatalogEntry>> {
        Ok(["abc001_a", "abc001_b"]
            .into_iter()
            .map(|id| CatalogEntry {
                id: id.to_string(),
                contest_id: "abc001".to_string(),
                title: id.to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl DifficultyModelService for StaticProblemApi {
    async fn fetch_difficulties(&self) -> PortResult<DifficultyModels> {
        Ok(HashMap::from([
            ("abc001_a".to_string(), Some(100.0)),
            ("abc001_b".to_string(), Some(400.0)),
        ]))
    }
}

#[async_trait]
impl SubmissionHistoryService for StaticProblemApi {
    async fn fetch_submissions(&self, _: &str, _: i64) -> PortResult<Vec<Submission>> {
        Ok(vec![])
    }
}

/// Sessions and profiles; every linked profile points at [`ATCODER_ID`].
#[derive(Default)]
pub struct FakeDatabase {
    sessions: Mutex<HashMap<String, Uuid>>,
}

impl FakeDatabase {
    pub fn add_session(&self, session_id: &str, user_id: Uuid) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string(), user_id);
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id)
    }
}

#[async_trait]
impl DatabaseService for FakeDatabase {
    async fn create_user_with_email(&self, _: &str, _: &str) -> PortResult<User> {
        unsupported()
    }

    async fn get_user_by_email(&self, _: &str) -> PortResult<UserCredentials> {
        unsupported()
    }

    async fn get_user_by_id(&self, _: Uuid) -> PortResult<User> {
        unsupported()
    }

    async fn create_auth_session(&self, _: &str, _: Uuid, _: DateTime<Utc>) -> PortResult<()> {
        unsupported()
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        Ok(UserProfile {
            user_id,
            atcoder_id: Some(ATCODER_ID.to_string()),
        })
    }

    async fn set_atcoder_id(&self, _: Uuid, _: &str) -> PortResult<UserProfile> {
        unsupported()
    }
}

#[derive(Default)]
pub struct MemoryAnnotations {
    statuses: Mutex<HashMap<(Uuid, String), ProblemStatus>>,
    memos: Mutex<HashMap<(Uuid, String), String>>,
}

impl MemoryAnnotations {
    pub fn status(&self, user_id: Uuid, problem_id: &str) -> Option<ProblemStatus> {
        self.statuses
            .lock()
            .unwrap()
            .get(&(user_id, problem_id.to_string()))
            .copied()
    }
}

#[async_trait]
impl AnnotationStore for MemoryAnnotations {
    async fn list_statuses(&self, user_id: Uuid) -> PortResult<Vec<(String, ProblemStatus)>> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|((_, problem_id), status)| (problem_id.clone(), *status))
            .collect())
    }

    async fn list_memos(&self, user_id: Uuid) -> PortResult<Vec<(String, String)>> {
        Ok(self
            .memos
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|((_, problem_id), memo)| (problem_id.clone(), memo.clone()))
            .collect())
    }

    async fn upsert_status(
        &self,
        user_id: Uuid,
        problem_id: &str,
        status: ProblemStatus,
    ) -> PortResult<()> {
        self.statuses
            .lock()
            .unwrap()
            .insert((user_id, problem_id.to_string()), status);
        Ok(())
    }

    async fn upsert_memo(&self, user_id: Uuid, problem_id: &str, memo: &str) -> PortResult<()> {
        self.memos
            .lock()
            .unwrap()
            .insert((user_id, problem_id.to_string()), memo.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub db: Arc<FakeDatabase>,
    pub annotations: Arc<MemoryAnnotations>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = Config::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost/dojo".to_string())
        })
        .unwrap();
        let db = Arc::new(FakeDatabase::default());
        let annotations = Arc::new(MemoryAnnotations::default());
        let problem_api = Arc::new(StaticProblemApi);
        let engine = MergeEngine::new(
            problem_api.clone(),
            problem_api.clone(),
            problem_api,
            annotations.clone(),
            DrainSettings {
                page_delay: Duration::ZERO,
                ..Default::default()
            },
        );

        let state = Arc::new(AppState {
            db: db.clone(),
            annotations: annotations.clone(),
            engine: Arc::new(engine),
            boards: Arc::new(BoardRegistry::new()),
            config: Arc::new(config),
        });
        Self {
            state,
            db,
            annotations,
        }
    }

    /// Merges the board of `user_id` so edits have something to land on.
    pub async fn load_board(&self, user_id: Uuid) {
        self.state
            .boards
            .ensure(
                &self.state.engine,
                &problem_dojo_core::BoardOwner::Account(user_id),
                ATCODER_ID,
            )
            .await
            .unwrap();
    }
}
