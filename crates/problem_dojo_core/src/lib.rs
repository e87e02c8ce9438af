pub mod board;
pub mod domain;
pub mod merge;
pub mod ports;
pub mod registry;
pub mod view;

#[cfg(test)]
mod testing;

pub use board::{
    Annotation, BoardError, BoardOwner, PendingWrite, ProblemBoard, SyncState, WriteOutcome,
};
pub use domain::{
    Annotations, CatalogEntry, DifficultyModels, Problem, ProblemStatus, SolveStats,
    StatusStyle, Submission, User, UserCredentials, UserProfile,
};
pub use merge::{DrainSettings, MergeEngine, MergeError};
pub use ports::{
    AnnotationStore, DatabaseService, DifficultyModelService, PortError, PortResult,
    ProblemCatalogService, SubmissionHistoryService,
};
pub use registry::{BoardRegistry, MergeTicket, DEFAULT_CAPACITY};
pub use view::{filter_and_sort, paginate, DifficultyRange, Page, PAGE_SIZE};
