use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::AdminUser;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_BULK_TERMS, MAX_PAGE_SIZE};
use crate::extractors::JsonBody;
use crate::response::{accepted, ok, paginated, ApiResponse, AppError};
use crate::services::images::{ImageService, WordImageOutcome};
use crate::services::upload::UploadForm;
use crate::state::AppState;
use crate::store::operations::words::{WordEntry, WordQuery};
use crate::validation::clean_terms;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_words).delete(delete_word))
        .route("/define-many", post(define_many))
        .route("/images", post(image_statuses))
        .route("/upload", post(upload_words))
        .route("/:term/image", post(word_image))
}

#[derive(Debug, Deserialize)]
struct ListWordsQuery {
    page: Option<u64>,
    limit: Option<u64>,
    search: Option<String>,
    /// Comma-separated list of fields to keep in each item.
    fields: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteWordQuery {
    word: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TermsRequest {
    #[serde(default)]
    words: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    word: String,
    deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingImage {
    status: &'static str,
    word: String,
    prompt_id: String,
}

fn project(entry: &WordEntry, fields: &[&str]) -> Result<Value, AppError> {
    let value = serde_json::to_value(entry).map_err(|e| AppError::internal(&e.to_string()))?;
    if fields.is_empty() {
        return Ok(value);
    }
    let Value::Object(all) = value else {
        return Ok(value);
    };
    let kept: Map<String, Value> = all
        .into_iter()
        .filter(|(key, _)| fields.contains(&key.as_str()))
        .collect();
    Ok(Value::Object(kept))
}

async fn list_words(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(params): Query<ListWordsQuery>,
) -> Result<Response, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let query = WordQuery {
        page,
        limit,
        search: params.search,
    };
    let (entries, total) = state.store().list_words(&query)?;

    let fields: Vec<&str> = params
        .fields
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    let items = entries
        .iter()
        .map(|entry| project(entry, &fields))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(paginated(items, total, page, limit).into_response())
}

async fn delete_word(
    admin: AdminUser,
    State(state): State<AppState>,
    Query(params): Query<DeleteWordQuery>,
) -> Result<Response, AppError> {
    let word = params
        .word
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .ok_or_else(|| AppError::bad_request("VALIDATION_ERROR", "Word is required"))?;

    let deleted = state.store().delete_word(&word)?;
    tracing::info!(admin = %admin.user_id, word = %word, deleted, "admin word delete");
    // success 字段反映是否真的删除了记录
    Ok(Json(ApiResponse {
        success: deleted,
        data: DeleteResponse { word, deleted },
    })
    .into_response())
}

fn bulk_terms(raw: &[String]) -> Result<Vec<String>, AppError> {
    let terms = clean_terms(raw);
    if terms.is_empty() {
        return Err(AppError::bad_request("NO_VALID_WORDS", "No valid words provided"));
    }
    if terms.len() > MAX_BULK_TERMS {
        return Err(AppError::bad_request(
            "TOO_MANY_WORDS",
            &format!("At most {MAX_BULK_TERMS} words per request"),
        ));
    }
    Ok(terms)
}

async fn define_many(
    _admin: AdminUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TermsRequest>,
) -> Result<Response, AppError> {
    let terms = bulk_terms(&req.words)?;
    let results = ImageService::from_state(&state).define_many(&terms).await;
    Ok(ok(results).into_response())
}

async fn image_statuses(
    _admin: AdminUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TermsRequest>,
) -> Result<Response, AppError> {
    let terms = bulk_terms(&req.words)?;
    let results = ImageService::from_state(&state).image_statuses(&terms).await;
    Ok(ok(results).into_response())
}

async fn upload_words(
    _admin: AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::read(multipart).await?;
    let terms = bulk_terms(&form.terms()?)?;
    let results = ImageService::from_state(&state).define_many(&terms).await;
    Ok(ok(results).into_response())
}

async fn word_image(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Response, AppError> {
    match ImageService::from_state(&state).word_image(&term).await? {
        WordImageOutcome::Ready(entry) => Ok(ok(entry).into_response()),
        WordImageOutcome::Pending { word, prompt_id } => Ok(accepted(PendingImage {
            status: "pending",
            word,
            prompt_id,
        })
        .into_response()),
    }
}
