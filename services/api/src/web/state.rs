//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use problem_dojo_core::ports::{AnnotationStore, DatabaseService};
use problem_dojo_core::{BoardRegistry, MergeEngine};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub annotations: Arc<dyn AnnotationStore>,
    pub engine: Arc<MergeEngine>,
    /// Merged problem collections, one per signed-in user or guest AtCoder id.
    pub boards: Arc<BoardRegistry>,
    pub config: Arc<Config>,
}
