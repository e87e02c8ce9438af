//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the problem endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth::{self, AuthResponse, LoginRequest, SignupRequest},
    profile::{self, is_valid_atcoder_id, require_atcoder_id, ProfileResponse, UpdateProfileRequest},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use problem_dojo_core::{
    filter_and_sort, paginate, BoardError, BoardOwner, DifficultyRange, MergeError,
    PendingWrite, Problem, ProblemBoard, ProblemStatus, SyncState,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::session_handler,
        profile::get_profile_handler,
        profile::update_profile_handler,
        list_statuses_handler,
        list_problems_handler,
        refresh_problems_handler,
        update_status_handler,
        update_memo_handler,
        guest_problems_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AuthResponse,
            UpdateProfileRequest,
            ProfileResponse,
            StatusOptionView,
            ProblemView,
            ProblemPageResponse,
            UpdateStatusRequest,
            UpdateMemoRequest,
        )
    ),
    tags(
        (
            name = "Problem Dojo API",
            description = "Practice tracker over AtCoder problems and submissions."
        )
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One entry of the status enumeration, with its display style.
#[derive(Serialize, ToSchema)]
pub struct StatusOptionView {
    key: String,
    label: String,
    color: String,
    background_color: String,
}

impl From<ProblemStatus> for StatusOptionView {
    fn from(status: ProblemStatus) -> Self {
        let style = status.style();
        Self {
            key: status.key().to_string(),
            label: status.label().to_string(),
            color: style.color.to_string(),
            background_color: style.background_color.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProblemView {
    id: String,
    contest_id: String,
    title: String,
    url: String,
    difficulty: Option<f64>,
    solve_count: u32,
    /// Epoch seconds of the latest accepted submission.
    last_solved: Option<i64>,
    status: StatusOptionView,
    memo: String,
    /// One of `synced`, `pending`, `local_only`, `failed`.
    sync: String,
    sync_error: Option<String>,
}

impl ProblemView {
    fn new(problem: &Problem, sync: SyncState) -> Self {
        let (sync, sync_error) = match sync {
            SyncState::Synced => ("synced", None),
            SyncState::Pending => ("pending", None),
            SyncState::LocalOnly => ("local_only", None),
            SyncState::Failed(reason) => ("failed", Some(reason)),
        };
        Self {
            id: problem.id.clone(),
            contest_id: problem.contest_id.clone(),
            title: problem.title.clone(),
            url: problem.url(),
            difficulty: problem.difficulty,
            solve_count: problem.solve_count,
            last_solved: problem.last_solved,
            status: problem.status.into(),
            memo: problem.memo.clone(),
            sync: sync.to_string(),
            sync_error,
        }
    }

    fn from_board(board: &ProblemBoard, problem: &Problem) -> Self {
        Self::new(problem, board.sync_state(&problem.id))
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProblemPageResponse {
    atcoder_id: String,
    min: i64,
    max: i64,
    page: usize,
    page_count: usize,
    total: usize,
    problems: Vec<ProblemView>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProblemListQuery {
    /// Lowest difficulty, inclusive. Defaults to 0.
    min: Option<i64>,
    /// Highest difficulty, inclusive. Defaults to 8000.
    max: Option<i64>,
    /// 1-based page number. Defaults to 1.
    page: Option<usize>,
}

impl ProblemListQuery {
    fn range(&self) -> DifficultyRange {
        let defaults = DifficultyRange::default();
        DifficultyRange {
            min: self.min.unwrap_or(defaults.min),
            max: self.max.unwrap_or(defaults.max),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// A status key from `GET /statuses`.
    status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateMemoRequest {
    memo: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Maps a failed merge cycle to a response the client can tell apart.
pub fn merge_error_response(e: MergeError) -> (StatusCode, String) {
    match e {
        MergeError::CatalogUnavailable(_)
        | MergeError::DifficultyUnavailable(_)
        | MergeError::SubmissionsUnavailable(_) => (
            StatusCode::BAD_GATEWAY,
            "Failed to fetch problem data".to_string(),
        ),
        MergeError::AnnotationAccessDenied => (
            StatusCode::FORBIDDEN,
            "Access denied reading your saved statuses and memos".to_string(),
        ),
        MergeError::AnnotationsUnavailable(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load your saved statuses and memos".to_string(),
        ),
        MergeError::DrainLimitExceeded { .. } | MergeError::DrainTimedOut(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            "Submission history took too long to load".to_string(),
        ),
        MergeError::Cancelled => (
            StatusCode::CONFLICT,
            "Superseded by a newer load of the problem list".to_string(),
        ),
    }
}

fn render_page(board: &ProblemBoard, query: &ProblemListQuery) -> ProblemPageResponse {
    let range = query.range();
    let selected = filter_and_sort(board.problems(), range);
    let page = paginate(&selected, query.page.unwrap_or(1));
    ProblemPageResponse {
        atcoder_id: board.atcoder_id().to_string(),
        min: range.min,
        max: range.max,
        page: page.page,
        page_count: page.page_count,
        total: page.total,
        problems: page
            .items
            .into_iter()
            .map(|problem| ProblemView::from_board(board, problem))
            .collect(),
    }
}

/// Loads (if needed) and renders the board of `owner`.
async fn board_page(
    state: &AppState,
    owner: &BoardOwner,
    atcoder_id: &str,
    query: &ProblemListQuery,
) -> Result<ProblemPageResponse, (StatusCode, String)> {
    state
        .boards
        .ensure(&state.engine, owner, atcoder_id)
        .await
        .map_err(|e| {
            error!("Failed to merge problems for {}: {}", atcoder_id, e);
            merge_error_response(e)
        })?;

    state
        .boards
        .read(owner, |board| render_page(board, query))
        .await
        .ok_or((
            StatusCode::CONFLICT,
            "Problem list was reset while loading".to_string(),
        ))
}

/// Applies an edit to the signed-in user's board and persists it in the background.
async fn edit_and_persist(
    state: &AppState,
    user_id: Uuid,
    problem_id: &str,
    edit: impl FnOnce(&mut ProblemBoard) -> Result<PendingWrite, BoardError>,
) -> Result<ProblemView, (StatusCode, String)> {
    let owner = BoardOwner::Account(user_id);
    let (write, view) = state
        .boards
        .edit(&owner, |board| {
            let write = edit(board)?;
            let view = board
                .get(problem_id)
                .map(|problem| ProblemView::from_board(board, problem));
            Ok::<_, BoardError>((write, view))
        })
        .await
        .ok_or((
            StatusCode::CONFLICT,
            "Load the problem list before editing".to_string(),
        ))?
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;

    let annotations = state.annotations.clone();
    let boards = state.boards.clone();
    tokio::spawn(async move {
        let problem_id = write.problem_id.clone();
        if boards.persist(&owner, write, annotations.as_ref()).await.is_none() {
            debug!("Write for {} was replaced by a later edit", problem_id);
        }
    });

    view.ok_or((StatusCode::NOT_FOUND, format!("Unknown problem: {}", problem_id)))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List every status a problem can be tagged with.
#[utoipa::path(
    get,
    path = "/statuses",
    responses(
        (status = 200, description = "Status enumeration", body = [StatusOptionView])
    )
)]
pub async fn list_statuses_handler() -> Json<Vec<StatusOptionView>> {
    Json(ProblemStatus::ALL.into_iter().map(Into::into).collect())
}

/// List the signed-in user's problems in a difficulty range, least practised first.
///
/// The first call merges the catalog, difficulty models, submission history and saved
/// annotations, which can take a while for long histories. Later calls reuse the result.
#[utoipa::path(
    get,
    path = "/problems",
    params(ProblemListQuery),
    responses(
        (status = 200, description = "One page of problems", body = ProblemPageResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Access denied reading saved annotations"),
        (status = 412, description = "AtCoder ID not linked"),
        (status = 502, description = "Public problem API unavailable"),
        (status = 504, description = "Submission history too long")
    )
)]
pub async fn list_problems_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ProblemListQuery>,
) -> Result<Json<ProblemPageResponse>, (StatusCode, String)> {
    let atcoder_id = require_atcoder_id(&state, user_id).await?;
    let page = board_page(&state, &BoardOwner::Account(user_id), &atcoder_id, &query).await?;
    Ok(Json(page))
}

/// Start a fresh merge cycle for the signed-in user, replacing any in-flight one.
#[utoipa::path(
    post,
    path = "/problems/refresh",
    responses(
        (status = 204, description = "Problems reloaded"),
        (status = 409, description = "Superseded by a newer refresh"),
        (status = 412, description = "AtCoder ID not linked"),
        (status = 502, description = "Public problem API unavailable")
    )
)]
pub async fn refresh_problems_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let atcoder_id = require_atcoder_id(&state, user_id).await?;
    state
        .boards
        .refresh(&state.engine, &BoardOwner::Account(user_id), &atcoder_id)
        .await
        .map_err(|e| {
            error!("Failed to refresh problems for {}: {}", atcoder_id, e);
            merge_error_response(e)
        })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set the status of a problem. The change is visible at once and saved in the background.
#[utoipa::path(
    put,
    path = "/problems/{problem_id}/status",
    request_body = UpdateStatusRequest,
    params(("problem_id" = String, Path, description = "Problem id, e.g. abc086_a")),
    responses(
        (status = 202, description = "Status updated, save in progress", body = ProblemView),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Unknown problem"),
        (status = 409, description = "Problem list not loaded")
    )
)]
pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(problem_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = ProblemStatus::from_key(&req.status)
        .ok_or((StatusCode::BAD_REQUEST, format!("Unknown status: {}", req.status)))?;

    let view = edit_and_persist(&state, user_id, &problem_id, |board| {
        board.set_status(&problem_id, status)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// Replace the memo of a problem. The change is visible at once and saved in the background.
#[utoipa::path(
    put,
    path = "/problems/{problem_id}/memo",
    request_body = UpdateMemoRequest,
    params(("problem_id" = String, Path, description = "Problem id, e.g. abc086_a")),
    responses(
        (status = 202, description = "Memo updated, save in progress", body = ProblemView),
        (status = 404, description = "Unknown problem"),
        (status = 409, description = "Problem list not loaded")
    )
)]
pub async fn update_memo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(problem_id): Path<String>,
    Json(req): Json<UpdateMemoRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = edit_and_persist(&state, user_id, &problem_id, |board| {
        board.set_memo(&problem_id, &req.memo)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// Read-only problem list for any AtCoder id, without saved statuses or memos.
#[utoipa::path(
    get,
    path = "/guest/{atcoder_id}/problems",
    params(
        ("atcoder_id" = String, Path, description = "AtCoder user name"),
        ProblemListQuery
    ),
    responses(
        (status = 200, description = "One page of problems", body = ProblemPageResponse),
        (status = 400, description = "Invalid AtCoder ID"),
        (status = 502, description = "Public problem API unavailable")
    )
)]
pub async fn guest_problems_handler(
    State(state): State<Arc<AppState>>,
    Path(atcoder_id): Path<String>,
    Query(query): Query<ProblemListQuery>,
) -> Result<Json<ProblemPageResponse>, (StatusCode, String)> {
    if !is_valid_atcoder_id(&atcoder_id) {
        return Err((StatusCode::BAD_REQUEST, "Enter a valid AtCoder ID".to_string()));
    }
    let owner = BoardOwner::Guest(atcoder_id.clone());
    let page = board_page(&state, &owner, &atcoder_id, &query).await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testing::TestApp;
    use axum::response::Response;
    use problem_dojo_core::PortError;

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn put_status(app: &TestApp, user_id: Uuid, problem_id: &str, key: &str) -> Response {
        update_status_handler(
            State(app.state.clone()),
            Extension(user_id),
            Path(problem_id.to_string()),
            Json(UpdateStatusRequest {
                status: key.to_string(),
            }),
        )
        .await
        .into_response()
    }

    fn problem(id: &str, difficulty: Option<f64>, solve_count: u32) -> Problem {
        Problem {
            id: id.to_string(),
            contest_id: "abc100".to_string(),
            title: id.to_string(),
            difficulty,
            solve_count,
            last_solved: None,
            status: ProblemStatus::NoTry,
            memo: String::new(),
        }
    }

    #[test]
    fn merge_errors_map_to_distinct_statuses() {
        let down = PortError::Unexpected("timeout".to_string());
        assert_eq!(
            merge_error_response(MergeError::CatalogUnavailable(down.clone())).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            merge_error_response(MergeError::AnnotationAccessDenied).0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            merge_error_response(MergeError::AnnotationsUnavailable(down)).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            merge_error_response(MergeError::DrainLimitExceeded { pages: 10 }).0,
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            merge_error_response(MergeError::Cancelled).0,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn page_applies_range_order_and_defaults() {
        let board = ProblemBoard::new(
            BoardOwner::Guest("someone".to_string()),
            "someone",
            vec![
                problem("abc100_a", Some(100.0), 3),
                problem("abc100_b", Some(350.0), 0),
                problem("abc100_c", None, 0),
                problem("abc100_d", Some(9000.0), 0),
            ],
        );
        let query = ProblemListQuery {
            min: None,
            max: None,
            page: None,
        };

        let page = render_page(&board, &query);
        assert_eq!((page.min, page.max, page.page), (0, 8000, 1));
        assert_eq!(page.total, 2);
        let ids: Vec<_> = page.problems.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["abc100_b", "abc100_a"]);
        assert_eq!(page.problems[0].sync, "synced");
        assert_eq!(page.problems[0].status.key, "No Try");
    }

    #[tokio::test]
    async fn status_edit_is_accepted_then_saved_in_the_background() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();
        app.load_board(user_id).await;

        let response = put_status(&app, user_id, "abc001_a", "AC").await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["status"]["key"], "AC");
        assert_eq!(body["sync"], "pending");

        let owner = BoardOwner::Account(user_id);
        let mut sync = SyncState::Pending;
        for _ in 0..100 {
            sync = app
                .state
                .boards
                .read(&owner, |board| board.sync_state("abc001_a"))
                .await
                .unwrap();
            if sync != SyncState::Pending {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sync, SyncState::Synced);
        assert_eq!(
            app.annotations.status(user_id, "abc001_a"),
            Some(ProblemStatus::Ac)
        );
    }

    #[tokio::test]
    async fn edits_need_a_loaded_board() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();

        let response = put_status(&app, user_id, "abc001_a", "AC").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = update_memo_handler(
            State(app.state.clone()),
            Extension(user_id),
            Path("abc001_a".to_string()),
            Json(UpdateMemoRequest {
                memo: "dp".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(app.annotations.status(user_id, "abc001_a"), None);
    }

    #[tokio::test]
    async fn unknown_problem_is_not_found() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();
        app.load_board(user_id).await;

        let response = put_status(&app, user_id, "arc999_z", "AC").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_status_key_is_rejected_before_the_board_changes() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();
        app.load_board(user_id).await;

        let response = put_status(&app, user_id, "abc001_a", "WA").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let sync = app
            .state
            .boards
            .read(&BoardOwner::Account(user_id), |board| {
                board.sync_state("abc001_a")
            })
            .await;
        assert_eq!(sync, Some(SyncState::Synced));
    }

    #[tokio::test]
    async fn memo_edit_returns_the_updated_record() {
        let app = TestApp::new();
        let user_id = Uuid::new_v4();
        app.load_board(user_id).await;

        let response = update_memo_handler(
            State(app.state.clone()),
            Extension(user_id),
            Path("abc001_b".to_string()),
            Json(UpdateMemoRequest {
                memo: "binary search".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["memo"], "binary search");
        assert_eq!(body["difficulty"], 400.0);
    }
}
