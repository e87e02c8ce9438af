//! crates/problem_dojo_core/src/board.rs
//!
//! The board is the state container for one owner's merged collection. Edits land
//! on the board immediately and hand back a [`PendingWrite`] that the caller
//! persists in the background; the outcome is recorded on the board per problem.

use crate::domain::{Problem, ProblemStatus};
use crate::ports::AnnotationStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info};
use uuid::Uuid;

/// Write sequence numbers, unique across boards so a write outlives a reload.
static NEXT_WRITE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("Unknown problem: {0}")]
    UnknownProblem(String),
}

/// Who a board belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoardOwner {
    /// A signed-in account. Edits are persisted.
    Account(Uuid),
    /// An anonymous viewer of an AtCoder id. Edits stay in memory.
    Guest(String),
}

impl BoardOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            BoardOwner::Account(user_id) => Some(*user_id),
            BoardOwner::Guest(_) => None,
        }
    }
}

/// A single annotation change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Status(ProblemStatus),
    Memo(String),
}

/// Status and memo of one problem are written independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Status,
    Memo,
}

impl Annotation {
    fn field(&self) -> Field {
        match self {
            Annotation::Status(_) => Field::Status,
            Annotation::Memo(_) => Field::Memo,
        }
    }
}

/// Result of persisting one annotation change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Persisted,
    /// Nobody is signed in, so the change only lives on the board.
    LocalOnly,
    Failed(String),
}

/// Whether the board's copy of a problem's annotations matches the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Synced,
    Pending,
    LocalOnly,
    Failed(String),
}

/// An annotation change that has been applied to a board but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub user_id: Option<Uuid>,
    pub problem_id: String,
    pub annotation: Annotation,
    seq: u64,
}

impl PendingWrite {
    fn key(&self) -> (String, Field) {
        (self.problem_id.clone(), self.annotation.field())
    }

    /// Upserts the change for the signed-in user. Failures are logged and returned,
    /// never raised.
    pub async fn persist(&self, store: &dyn AnnotationStore) -> WriteOutcome {
        let Some(user_id) = self.user_id else {
            return WriteOutcome::LocalOnly;
        };

        let result = match &self.annotation {
            Annotation::Status(status) => {
                store.upsert_status(user_id, &self.problem_id, *status).await
            }
            Annotation::Memo(memo) => store.upsert_memo(user_id, &self.problem_id, memo).await,
        };

        match result {
            Ok(()) => {
                info!("Saved annotation for {} ({})", self.problem_id, user_id);
                WriteOutcome::Persisted
            }
            Err(e) => {
                error!(
                    "Failed to save annotation for {} ({}): {:?}",
                    self.problem_id, user_id, e
                );
                WriteOutcome::Failed(e.to_string())
            }
        }
    }
}

pub struct ProblemBoard {
    owner: BoardOwner,
    atcoder_id: String,
    problems: Vec<Problem>,
    index: HashMap<String, usize>,
    sync: HashMap<(String, Field), SyncState>,
    latest_write: HashMap<(String, Field), u64>,
}

impl ProblemBoard {
    pub fn new(owner: BoardOwner, atcoder_id: impl Into<String>, problems: Vec<Problem>) -> Self {
        let index = problems
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Self {
            owner,
            atcoder_id: atcoder_id.into(),
            problems,
            index,
            sync: HashMap::new(),
            latest_write: HashMap::new(),
        }
    }

    pub fn owner(&self) -> &BoardOwner {
        &self.owner
    }

    pub fn atcoder_id(&self) -> &str {
        &self.atcoder_id
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn get(&self, problem_id: &str) -> Option<&Problem> {
        self.index.get(problem_id).map(|&i| &self.problems[i])
    }

    /// Sync state of a problem's status and memo together: a failure wins over a
    /// pending write, which wins over a local-only edit.
    pub fn sync_state(&self, problem_id: &str) -> SyncState {
        [Field::Status, Field::Memo]
            .into_iter()
            .filter_map(|field| self.sync.get(&(problem_id.to_string(), field)))
            .fold(SyncState::Synced, |acc, state| match (&acc, state) {
                (SyncState::Failed(_), _) => acc,
                (_, SyncState::Failed(_)) => state.clone(),
                (SyncState::Pending, _) => acc,
                (_, SyncState::Pending) => SyncState::Pending,
                (SyncState::LocalOnly, _) => acc,
                (_, other) => other.clone(),
            })
    }

    pub fn set_status(
        &mut self,
        problem_id: &str,
        status: ProblemStatus,
    ) -> Result<PendingWrite, BoardError> {
        self.problem_mut(problem_id)?.status = status;
        Ok(self.pending(problem_id, Annotation::Status(status)))
    }

    pub fn set_memo(&mut self, problem_id: &str, memo: &str) -> Result<PendingWrite, BoardError> {
        self.problem_mut(problem_id)?.memo = memo.to_string();
        Ok(self.pending(problem_id, Annotation::Memo(memo.to_string())))
    }

    /// False once a later edit of the same field on this board has replaced `write`.
    /// Writes made on an earlier board for the same owner count as latest.
    pub fn is_latest(&self, write: &PendingWrite) -> bool {
        self.latest_write
            .get(&write.key())
            .map_or(true, |&seq| seq == write.seq)
    }

    /// Records how a write ended. Outcomes of writes superseded by a later edit
    /// of the same field are ignored. The record itself is never reverted.
    pub fn record_outcome(&mut self, write: &PendingWrite, outcome: WriteOutcome) {
        let key = write.key();
        if self.latest_write.get(&key) != Some(&write.seq) {
            return;
        }
        let state = match outcome {
            WriteOutcome::Persisted => SyncState::Synced,
            WriteOutcome::LocalOnly => SyncState::LocalOnly,
            WriteOutcome::Failed(reason) => SyncState::Failed(reason),
        };
        self.sync.insert(key, state);
    }

    fn problem_mut(&mut self, problem_id: &str) -> Result<&mut Problem, BoardError> {
        let i = *self
            .index
            .get(problem_id)
            .ok_or_else(|| BoardError::UnknownProblem(problem_id.to_string()))?;
        Ok(&mut self.problems[i])
    }

    fn pending(&mut self, problem_id: &str, annotation: Annotation) -> PendingWrite {
        let seq = NEXT_WRITE.fetch_add(1, Ordering::Relaxed);
        let write = PendingWrite {
            user_id: self.owner.user_id(),
            problem_id: problem_id.to_string(),
            annotation,
            seq,
        };
        let state = if write.user_id.is_some() {
            SyncState::Pending
        } else {
            SyncState::LocalOnly
        };
        self.latest_write.insert(write.key(), seq);
        self.sync.insert(write.key(), state);
        write
    }
}
