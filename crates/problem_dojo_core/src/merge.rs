//! crates/problem_dojo_core/src/merge.rs
//!
//! The merge engine: joins the problem catalog, the difficulty models, the user's
//! submission history and the user's stored annotations into one enriched
//! collection of [`Problem`] records.

use crate::domain::{
    Annotations, CatalogEntry, DifficultyModels, Problem, SolveStats, Submission,
};
use crate::ports::{
    AnnotationStore, DifficultyModelService, PortError, ProblemCatalogService,
    SubmissionHistoryService,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

//=========================================================================================
// Errors and Settings
//=========================================================================================

/// Why a merge cycle did not produce a collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("Problem catalog unavailable: {0}")]
    CatalogUnavailable(PortError),
    #[error("Difficulty models unavailable: {0}")]
    DifficultyUnavailable(PortError),
    #[error("Submission history unavailable: {0}")]
    SubmissionsUnavailable(PortError),
    #[error("Access denied reading annotations")]
    AnnotationAccessDenied,
    #[error("Annotations unavailable: {0}")]
    AnnotationsUnavailable(PortError),
    #[error("Submission history did not end within {pages} pages")]
    DrainLimitExceeded { pages: usize },
    #[error("Submission history did not end within {0:?}")]
    DrainTimedOut(Duration),
    #[error("Merge cancelled")]
    Cancelled,
}

/// Bounds and pacing for draining the paginated submission history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSettings {
    /// Pause between two page requests, to stay under the remote rate limit.
    pub page_delay: Duration,
    /// Maximum number of page requests in one drain.
    pub max_pages: usize,
    /// Wall-clock bound for the whole drain.
    pub timeout: Option<Duration>,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            page_delay: Duration::from_millis(500),
            max_pages: 1_000,
            timeout: None,
        }
    }
}

//=========================================================================================
// The Engine
//=========================================================================================

pub struct MergeEngine {
    catalog: Arc<dyn ProblemCatalogService>,
    difficulties: Arc<dyn DifficultyModelService>,
    submissions: Arc<dyn SubmissionHistoryService>,
    annotations: Arc<dyn AnnotationStore>,
    drain: DrainSettings,
}

impl MergeEngine {
    pub fn new(
        catalog: Arc<dyn ProblemCatalogService>,
        difficulties: Arc<dyn DifficultyModelService>,
        submissions: Arc<dyn SubmissionHistoryService>,
        annotations: Arc<dyn AnnotationStore>,
        drain: DrainSettings,
    ) -> Self {
        Self {
            catalog,
            difficulties,
            submissions,
            annotations,
            drain,
        }
    }

    /// Runs one merge cycle for `atcoder_id`.
    ///
    /// Annotations are only read when `user_id` is present; anonymous callers get the
    /// default status and an empty memo on every record. The result is in catalog order.
    pub async fn merge(
        &self,
        atcoder_id: &str,
        user_id: Option<Uuid>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Problem>, MergeError> {
        info!("Starting merge cycle for AtCoder user {}", atcoder_id);

        let (catalog, difficulties) = until_cancelled(cancel, async {
            futures::try_join!(
                async {
                    self.catalog
                        .fetch_catalog()
                        .await
                        .map_err(MergeError::CatalogUnavailable)
                },
                async {
                    self.difficulties
                        .fetch_difficulties()
                        .await
                        .map_err(MergeError::DifficultyUnavailable)
                },
            )
        })
        .await??;
        let problems = attach_difficulties(catalog, &difficulties);

        let submissions = self.drain_submissions(atcoder_id, cancel).await?;
        let stats = reduce_submissions(&submissions);

        let annotations = match user_id {
            Some(user_id) => until_cancelled(cancel, self.annotations.load_annotations(user_id))
                .await?
                .map_err(|e| match e {
                    PortError::Unauthorized => MergeError::AnnotationAccessDenied,
                    other => MergeError::AnnotationsUnavailable(other),
                })?,
            None => Annotations::default(),
        };

        let merged = overlay(problems, &stats, &annotations);
        info!(
            "Merge cycle for {} finished: {} problems, {} submissions",
            atcoder_id,
            merged.len(),
            submissions.len()
        );
        Ok(merged)
    }

    /// Drains the whole submission history for `atcoder_id`, page by page.
    pub async fn drain_submissions(
        &self,
        atcoder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>, MergeError> {
        match self.drain.timeout {
            Some(limit) => tokio::time::timeout(limit, self.drain_pages(atcoder_id, cancel))
                .await
                .map_err(|_| {
                    warn!("Submission drain for {} timed out after {:?}", atcoder_id, limit);
                    MergeError::DrainTimedOut(limit)
                })?,
            None => self.drain_pages(atcoder_id, cancel).await,
        }
    }

    async fn drain_pages(
        &self,
        atcoder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Submission>, MergeError> {
        let mut all = Vec::new();
        let mut cursor: i64 = 0;
        let mut pages = 0;

        loop {
            if pages >= self.drain.max_pages {
                warn!(
                    "Submission drain for {} hit the page limit ({})",
                    atcoder_id, pages
                );
                return Err(MergeError::DrainLimitExceeded { pages });
            }

            let page = until_cancelled(
                cancel,
                self.submissions.fetch_submissions(atcoder_id, cursor),
            )
            .await?
            .map_err(MergeError::SubmissionsUnavailable)?;
            pages += 1;

            let Some(last) = page.last() else {
                break;
            };
            // The cursor never moves backwards, even if a page is out of order.
            cursor = (last.epoch_second + 1).max(cursor + 1);
            debug!(
                "Fetched {} submissions (page {}), next cursor {}",
                page.len(),
                pages,
                cursor
            );
            all.extend(page);

            until_cancelled(cancel, tokio::time::sleep(self.drain.page_delay)).await?;
        }

        Ok(all)
    }
}

/// Awaits `fut` unless `cancel` fires first.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, MergeError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MergeError::Cancelled),
        output = fut => Ok(output),
    }
}

//=========================================================================================
// Pure Merge Steps
//=========================================================================================

/// Builds bare problem records from the catalog, with difficulties joined by id.
pub fn attach_difficulties(
    catalog: Vec<CatalogEntry>,
    difficulties: &DifficultyModels,
) -> Vec<Problem> {
    catalog
        .into_iter()
        .map(|entry| Problem {
            difficulty: difficulties.get(&entry.id).copied().flatten(),
            id: entry.id,
            contest_id: entry.contest_id,
            title: entry.title,
            solve_count: 0,
            last_solved: None,
            status: Default::default(),
            memo: String::new(),
        })
        .collect()
}

/// Counts accepted submissions per problem and keeps the latest accepted timestamp.
pub fn reduce_submissions(submissions: &[Submission]) -> HashMap<String, SolveStats> {
    let mut stats: HashMap<String, SolveStats> = HashMap::new();
    for submission in submissions.iter().filter(|s| s.is_accepted()) {
        let entry = stats.entry(submission.problem_id.clone()).or_default();
        entry.solve_count += 1;
        entry.last_solved = entry
            .last_solved
            .max(Some(submission.epoch_second));
    }
    stats
}

/// Attaches solve statistics and annotations, falling back to defaults.
pub fn overlay(
    problems: Vec<Problem>,
    stats: &HashMap<String, SolveStats>,
    annotations: &Annotations,
) -> Vec<Problem> {
    problems
        .into_iter()
        .map(|mut problem| {
            let solved = stats.get(&problem.id).copied().unwrap_or_default();
            problem.solve_count = solved.solve_count;
            problem.last_solved = solved.last_solved;
            problem.status = annotations
                .statuses
                .get(&problem.id)
                .copied()
                .unwrap_or_default();
            problem.memo = annotations
                .memos
                .get(&problem.id)
                .cloned()
                .unwrap_or_default();
            problem
        })
        .collect()
}
