use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::insights::{self, CommentFilter, CommentPage, ListedComment, SentimentCounts, DEFAULT_PER_PAGE};
use crate::ml::Sentiment;
use crate::service::{CommentService, SubmissionOutcome};
use crate::table::CommentRecord;

pub struct AppState {
    pub service: CommentService,
}

#[derive(OpenApi)]
#[openapi(
    paths(submit_comment, list_comments, comment_stats, health),
    components(schemas(
        SubmitCommentRequest,
        SubmissionOutcome,
        CommentRecord,
        Sentiment,
        CommentPage,
        ListedComment,
        SentimentCounts,
        ErrorResponse,
        HealthResponse
    )),
    tags((name = "comments", description = "Comment intake and insights"))
)]
pub struct ApiDoc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .route("/comments", post(submit_comment).get(list_comments))
        .route("/comments/stats", get(comment_stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitCommentRequest {
    #[schema(example = "alice")]
    pub user_id: Option<String>,
    #[schema(example = "The export button is bad and slow")]
    pub comment: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Comma separated sentiments, e.g. `positive,negative`.
    pub sentiment: Option<String>,
    /// Case-insensitive substring of the user id.
    pub user: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
}

/// Analyze a comment and append it to the stored table.
///
/// 201 when the row was committed; 200 with `saved: false` when the comment was
/// analyzed but could not be persisted.
#[utoipa::path(
    post,
    path = "/comments",
    request_body = SubmitCommentRequest,
    responses(
        (status = 201, description = "Analyzed and saved", body = SubmissionOutcome),
        (status = 200, description = "Analyzed but not saved", body = SubmissionOutcome),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 422, description = "Empty or missing comment", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn submit_comment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionOutcome>), ApiError> {
    let Json(req) = payload.map_err(|rejection| api_error(rejection.status(), rejection.body_text()))?;
    let outcome = state
        .service
        .submit(req.user_id.as_deref(), &req.comment)
        .await
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let status = if outcome.saved { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome)))
}

/// Page through stored comments.
#[utoipa::path(
    get,
    path = "/comments",
    params(ListQuery),
    responses(
        (status = 200, description = "Matching comments", body = CommentPage),
        (status = 400, description = "Unknown sentiment in filter", body = ErrorResponse)
    ),
    tag = "comments"
)]
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<CommentPage>, ApiError> {
    let sentiments = match query.sentiment.as_deref() {
        None => Vec::new(),
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Sentiment::parse(s)
                    .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("unknown sentiment {:?}", s)))
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    let filter = CommentFilter {
        sentiments,
        user_query: query.user,
    };

    let snapshot = state.service.store().fetch().await;
    Ok(Json(insights::list_comments(
        &snapshot.table,
        &filter,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(DEFAULT_PER_PAGE),
    )))
}

#[utoipa::path(
    get,
    path = "/comments/stats",
    responses((status = 200, description = "Sentiment counts", body = SentimentCounts)),
    tag = "comments"
)]
pub async fn comment_stats(State(state): State<Arc<AppState>>) -> Json<SentimentCounts> {
    let snapshot = state.service.store().fetch().await;
    Json(SentimentCounts::from_table(&snapshot.table))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
