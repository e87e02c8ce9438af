//! crates/problem_dojo_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Problems and Submissions
//=========================================================================================

/// One entry of the global problem catalog, before any enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub contest_id: String,
    pub title: String,
}

/// Difficulty estimates keyed by problem id. A model may exist without a difficulty.
pub type DifficultyModels = HashMap<String, Option<f64>>;

/// A single submission from a user's history. Only used to derive solve statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub problem_id: String,
    pub result: String,
    pub epoch_second: i64,
}

impl Submission {
    /// The verdict code for a correct solution.
    pub const ACCEPTED: &'static str = "AC";

    pub fn is_accepted(&self) -> bool {
        self.result == Self::ACCEPTED
    }
}

/// Solve statistics for one problem, reduced from accepted submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub solve_count: u32,
    pub last_solved: Option<i64>,
}

/// A fully enriched problem record, rebuilt on every merge cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub id: String,
    pub contest_id: String,
    pub title: String,
    pub difficulty: Option<f64>,
    pub solve_count: u32,
    /// Epoch seconds of the most recent accepted submission.
    pub last_solved: Option<i64>,
    pub status: ProblemStatus,
    pub memo: String,
}

impl Problem {
    /// Link to the task page on AtCoder.
    pub fn url(&self) -> String {
        format!(
            "https://atcoder.jp/contests/{}/tasks/{}",
            self.contest_id, self.id
        )
    }
}

//=========================================================================================
// Status Enumeration
//=========================================================================================

/// Display style attached to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusStyle {
    pub color: &'static str,
    pub background_color: &'static str,
}

/// The user's own progress tag for a problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProblemStatus {
    #[default]
    NoTry,
    /// Solved after reading the editorial.
    KaisekiAc,
    Ac,
    /// Solved within 20 minutes.
    AcWithin20m,
}

impl ProblemStatus {
    pub const ALL: [ProblemStatus; 4] = [
        ProblemStatus::NoTry,
        ProblemStatus::KaisekiAc,
        ProblemStatus::Ac,
        ProblemStatus::AcWithin20m,
    ];

    /// The key this status is stored under in the annotation store.
    pub fn key(self) -> &'static str {
        match self {
            ProblemStatus::NoTry => "No Try",
            ProblemStatus::KaisekiAc => "Kaiseki AC",
            ProblemStatus::Ac => "AC",
            ProblemStatus::AcWithin20m => "AC_within_20m",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            ProblemStatus::NoTry => "No Try",
            ProblemStatus::KaisekiAc => "解説AC",
            ProblemStatus::Ac => "AC",
            ProblemStatus::AcWithin20m => "AC(within 20m)",
        }
    }

    pub fn style(self) -> StatusStyle {
        match self {
            ProblemStatus::NoTry => StatusStyle {
                color: "text.secondary",
                background_color: "transparent",
            },
            ProblemStatus::KaisekiAc => StatusStyle {
                color: "info.main",
                background_color: "#e3f2fd",
            },
            ProblemStatus::Ac => StatusStyle {
                color: "success.main",
                background_color: "#e8f5e9",
            },
            ProblemStatus::AcWithin20m => StatusStyle {
                color: "warning.main",
                background_color: "#fffde7",
            },
        }
    }
}

impl fmt::Display for ProblemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

//=========================================================================================
// Annotations and Users
//=========================================================================================

/// A user's stored statuses and memos, keyed by problem id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    pub statuses: HashMap<String, ProblemStatus>,
    pub memos: HashMap<String, String>,
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// Per-user profile. The AtCoder id gates access to the problem views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub atcoder_id: Option<String>,
}
