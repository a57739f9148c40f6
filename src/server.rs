//! Bounty Board Server
//!
//! JSON HTTP API over the bounty board operations.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::auth::Caller;
use crate::board::BountyBoard;
use crate::bounties::CreateBountyInput;
use crate::entries::UpsertEntryInput;
use crate::error::BountyError;
use crate::models::{
    Bounty, BountyBenefactor, BountyDetails, BountyEntry, CompletionCheck, Currency, EntryDetails,
    FileDescriptor, Page,
};

pub struct AppState {
    pub board: Arc<BountyBoard>,
    pub started_at: std::time::Instant,
}

type ApiResult<T> = Result<Json<T>, BountyError>;

impl IntoResponse for BountyError {
    fn into_response(self) -> Response {
        let status = match &self {
            BountyError::NotFound(_) => StatusCode::NOT_FOUND,
            BountyError::InvalidState(_) => StatusCode::BAD_REQUEST,
            BountyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BountyError::Ledger(_) => StatusCode::BAD_GATEWAY,
            BountyError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            BountyError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/bounties", post(create_bounty_handler))
        .route("/api/bounties/:id", get(get_bounty_handler))
        .route("/api/bounties/:id/benefactors", post(pledge_handler))
        .route("/api/bounties/:id/entries", get(list_entries_handler))
        .route("/api/bounties/:id/complete", post(recheck_completion_handler))
        .route("/api/entries", post(upsert_entry_handler))
        .route(
            "/api/entries/:id",
            get(get_entry_handler).delete(delete_entry_handler),
        )
        .route("/api/entries/:id/files", get(list_files_handler))
        .route("/api/entries/:id/award", post(award_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run store and ledger work on the blocking pool
async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, BountyError>
where
    F: FnOnce(&BountyBoard) -> Result<T, BountyError> + Send + 'static,
    T: Send + 'static,
{
    let board = Arc::clone(&state.board);
    tokio::task::spawn_blocking(move || f(&board))
        .await
        .map_err(|e| BountyError::Database(format!("worker task failed: {}", e)))?
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "healthy": true,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// BOUNTIES
// ============================================================================

async fn create_bounty_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<CreateBountyInput>,
) -> ApiResult<Bounty> {
    run_blocking(&state, move |board| board.create_bounty(caller.user_id, &input))
        .await
        .map(Json)
}

async fn get_bounty_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<i64>,
) -> ApiResult<BountyDetails> {
    run_blocking(&state, move |board| board.get_bounty_details(bounty_id))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct PledgeRequest {
    pub amount: i64,
    pub currency: Currency,
}

async fn pledge_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<i64>,
    caller: Caller,
    Json(request): Json<PledgeRequest>,
) -> ApiResult<BountyBenefactor> {
    run_blocking(&state, move |board| {
        board.add_benefactor_amount(bounty_id, caller.user_id, request.amount, request.currency)
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    pub cursor: Option<i64>,
    pub limit: Option<u32>,
}

async fn list_entries_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<i64>,
    Query(query): Query<EntriesQuery>,
) -> ApiResult<Page<BountyEntry>> {
    run_blocking(&state, move |board| {
        board.list_entries(bounty_id, query.cursor, query.limit)
    })
    .await
    .map(Json)
}

async fn recheck_completion_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<i64>,
    caller: Caller,
) -> ApiResult<CompletionCheck> {
    if !caller.is_moderator {
        return Err(BountyError::unauthorized(
            "Only moderators can re-run the completion check",
        ));
    }
    run_blocking(&state, move |board| board.recheck_completion(bounty_id))
        .await
        .map(Json)
}

// ============================================================================
// ENTRIES
// ============================================================================

async fn upsert_entry_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(input): Json<UpsertEntryInput>,
) -> ApiResult<BountyEntry> {
    run_blocking(&state, move |board| board.upsert_entry(caller.user_id, &input))
        .await
        .map(Json)
}

async fn get_entry_handler(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<i64>,
) -> ApiResult<EntryDetails> {
    run_blocking(&state, move |board| board.get_entry(entry_id))
        .await
        .map(Json)
}

async fn list_files_handler(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<i64>,
    caller: Caller,
) -> ApiResult<Vec<FileDescriptor>> {
    run_blocking(&state, move |board| {
        board.list_files(entry_id, caller.user_id, caller.is_moderator)
    })
    .await
    .map(Json)
}

async fn award_handler(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<i64>,
    caller: Caller,
) -> ApiResult<BountyBenefactor> {
    run_blocking(&state, move |board| board.award_entry(entry_id, caller.user_id))
        .await
        .map(Json)
}

async fn delete_entry_handler(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<i64>,
    caller: Caller,
) -> ApiResult<Option<BountyEntry>> {
    run_blocking(&state, move |board| {
        let owner_id = match board.get_entry(entry_id) {
            Ok(details) => details.entry.user_id,
            Err(BountyError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !caller.can_manage(owner_id) {
            return Err(BountyError::unauthorized(
                "Only the entry owner or a moderator can delete it",
            ));
        }
        board.delete_entry(entry_id)
    })
    .await
    .map(Json)
}

/// Run the server
pub async fn run_server(host: &str, port: u16, board: Arc<BountyBoard>) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        board,
        started_at: std::time::Instant::now(),
    });

    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting Bounty Board server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MODERATOR_HEADER, USER_ID_HEADER};
    use crate::testing::{board_with_ledger, seed_bounty, seed_entry, write};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn router_for(board: BountyBoard) -> Router {
        create_router(Arc::new(AppState {
            board: Arc::new(board),
            started_at: std::time::Instant::now(),
        }))
    }

    fn request(method: Method, uri: &str, user: Option<i64>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        builder.body(Body::empty()).unwrap()
    }

    fn moderator_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, "1")
            .header(MODERATOR_HEADER, "true")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (board, _ledger) = board_with_ledger();
        let response = router_for(board)
            .oneshot(request(Method::GET, "/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["healthy"], true);
    }

    #[tokio::test]
    async fn test_award_over_http() {
        let (board, ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(101, 50), (102, 50)]);
        let entry_id = seed_entry(&board, bounty_id, 7, vec![]);
        let app = router_for(board);
        let uri = format!("/api/entries/{}/award", entry_id);

        let response = app
            .clone()
            .oneshot(request(Method::POST, &uri, Some(101)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["awarded_to_id"], entry_id);
        assert_eq!(ledger.balance(7), 50);

        let response = app
            .clone()
            .oneshot(request(Method::POST, &uri, Some(101)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request(Method::POST, &uri, Some(999)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_award_requires_identity() {
        let (board, _ledger) = board_with_ledger();
        let response = router_for(board)
            .oneshot(request(Method::POST, "/api/entries/1/award", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_requires_owner_or_moderator() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(101, 50)]);
        let entry_id = seed_entry(&board, bounty_id, 7, vec![]);
        let app = router_for(board);
        let uri = format!("/api/entries/{}", entry_id);

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, &uri, Some(8)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(moderator_request(Method::DELETE, &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], entry_id);

        let response = app
            .oneshot(request(Method::DELETE, &uri, Some(7)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await.is_null());
    }

    #[tokio::test]
    async fn test_create_bounty_and_list_entries() {
        let (board, ledger) = board_with_ledger();
        ledger.deposit(5, 100).unwrap();
        let app = router_for(board);

        let create = Request::builder()
            .method(Method::POST)
            .uri("/api/bounties")
            .header(USER_ID_HEADER, "5")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"name":"Pixel art","unit_amount":100,"currency":"BUZZ"}"#,
            ))
            .unwrap();
        let response = app.clone().oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bounty_id = body_json(response).await["id"].as_i64().unwrap();
        assert_eq!(ledger.balance(5), 0);

        let response = app
            .oneshot(request(
                Method::GET,
                &format!("/api/bounties/{}/entries?limit=10", bounty_id),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["items"].as_array().unwrap().len(), 0);
        assert!(page["next_cursor"].is_null());
    }

    #[tokio::test]
    async fn test_completion_recheck_is_moderator_only() {
        let (board, _ledger) = board_with_ledger();
        let bounty_id = seed_bounty(&board, &[(101, 50)]);
        let entry_id = seed_entry(&board, bounty_id, 7, vec![]);
        write(board.db(), |conn| {
            Ok(conn.execute(
                "UPDATE bounty_benefactors SET awarded_to_id = ?1 WHERE bounty_id = ?2",
                rusqlite::params![entry_id, bounty_id],
            )?)
        })
        .unwrap();
        let app = router_for(board);
        let uri = format!("/api/bounties/{}/complete", bounty_id);

        let response = app
            .clone()
            .oneshot(request(Method::POST, &uri, Some(101)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(moderator_request(Method::POST, &uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let check = body_json(response).await;
        assert_eq!(check["completed_now"], true);
        assert_eq!(check["complete"], true);

        let response = app
            .oneshot(moderator_request(Method::POST, "/api/bounties/9999/complete"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
