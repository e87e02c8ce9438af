//! In-memory fakes of the ports, shared by the unit tests of this crate.

use crate::domain::{CatalogEntry, DifficultyModels, ProblemStatus, Submission};
use crate::ports::{
    AnnotationStore, DifficultyModelService, PortError, PortResult, ProblemCatalogService,
    SubmissionHistoryService,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

pub fn entry(id: &str, contest_id: &str) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        contest_id: contest_id.to_string(),
        title: format!("Title of {}", id),
    }
}

pub fn submission(problem_id: &str, result: &str, epoch_second: i64) -> Submission {
    Submission {
        problem_id: problem_id.to_string(),
        result: result.to_string(),
        epoch_second,
    }
}

pub struct FakeCatalog(PortResult<Vec<CatalogEntry>>);

impl FakeCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self(Ok(entries))
    }

    pub fn failing(error: PortError) -> Self {
        Self(Err(error))
    }
}

#[async_trait]
impl ProblemCatalogService for FakeCatalog {
    async fn fetch_catalog(&self) -> PortResult<Vec<CatalogEntry>> {
        self.0.clone()
    }
}

pub struct FakeDifficulties(PortResult<DifficultyModels>);

impl FakeDifficulties {
    pub fn new(models: &[(&str, Option<f64>)]) -> Self {
        Self(Ok(models
            .iter()
            .map(|(id, difficulty)| (id.to_string(), *difficulty))
            .collect()))
    }

    pub fn failing(error: PortError) -> Self {
        Self(Err(error))
    }
}

#[async_trait]
impl DifficultyModelService for FakeDifficulties {
    async fn fetch_difficulties(&self) -> PortResult<DifficultyModels> {
        self.0.clone()
    }
}

/// Serves pre-scripted pages, then empty pages. Records every cursor it was asked for.
pub struct ScriptedSubmissions {
    pages: Mutex<VecDeque<Vec<Submission>>>,
    cursors: Mutex<Vec<i64>>,
    endless: bool,
    failure: Option<PortError>,
}

impl ScriptedSubmissions {
    pub fn new(pages: Vec<Vec<Submission>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            cursors: Mutex::new(Vec::new()),
            endless: false,
            failure: None,
        }
    }

    /// Never returns an empty page.
    pub fn endless() -> Self {
        Self {
            endless: true,
            ..Self::new(vec![])
        }
    }

    pub fn failing(error: PortError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(vec![])
        }
    }

    pub fn cursors(&self) -> Vec<i64> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionHistoryService for ScriptedSubmissions {
    async fn fetch_submissions(
        &self,
        _atcoder_id: &str,
        from_second: i64,
    ) -> PortResult<Vec<Submission>> {
        self.cursors.lock().unwrap().push(from_second);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.endless {
            return Ok(vec![submission("abc001_a", "WA", from_second)]);
        }
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// A per-user annotation store held in memory.
#[derive(Default)]
pub struct InMemoryAnnotations {
    statuses: Mutex<HashMap<(Uuid, String), ProblemStatus>>,
    memos: Mutex<HashMap<(Uuid, String), String>>,
    read_failure: Option<PortError>,
    write_failure: Option<PortError>,
}

impl InMemoryAnnotations {
    pub fn failing_reads(error: PortError) -> Self {
        Self {
            read_failure: Some(error),
            ..Default::default()
        }
    }

    pub fn failing_writes(error: PortError) -> Self {
        Self {
            write_failure: Some(error),
            ..Default::default()
        }
    }

    pub fn stored_status(&self, user_id: Uuid, problem_id: &str) -> Option<ProblemStatus> {
        self.statuses
            .lock()
            .unwrap()
            .get(&(user_id, problem_id.to_string()))
            .copied()
    }

    pub fn write_count(&self) -> usize {
        self.statuses.lock().unwrap().len() + self.memos.lock().unwrap().len()
    }
}

#[async_trait]
impl AnnotationStore for InMemoryAnnotations {
    async fn list_statuses(&self, user_id: Uuid) -> PortResult<Vec<(String, ProblemStatus)>> {
        if let Some(error) = &self.read_failure {
            return Err(error.clone());
        }
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
        if let Some(error) = &self.read_failure {
            return Err(error.clone());
        }
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
        if let Some(error) = &self.write_failure {
            return Err(error.clone());
        }
        self.statuses
            .lock()
            .unwrap()
            .insert((user_id, problem_id.to_string()), status);
        Ok(())
    }

    async fn upsert_memo(&self, user_id: Uuid, problem_id: &str, memo: &str) -> PortResult<()> {
        if let Some(error) = &self.write_failure {
            return Err(error.clone());
        }
        self.memos
            .lock()
            .unwrap()
            .insert((user_id, problem_id.to_string()), memo.to_string());
        Ok(())
    }
}
