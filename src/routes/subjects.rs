use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::AdminUser;
use crate::constants::MAX_BULK_TERMS;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::services::images::ImageStatusResult;
use crate::services::subjects::SubjectService;
use crate::services::upload::UploadForm;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add", post(add_words))
        .route("/upload", post(upload_words))
        .route("/assign", post(assign_images))
        .route("/:subject", get(get_subject))
}

#[derive(Debug, Deserialize)]
struct AddWordsRequest {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    words: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AssignResponse {
    subject: String,
    results: Vec<ImageStatusResult>,
}

fn check_bulk_size<T>(terms: &[T]) -> Result<(), AppError> {
    if terms.len() > MAX_BULK_TERMS {
        return Err(AppError::bad_request(
            "TOO_MANY_WORDS",
            &format!("At most {MAX_BULK_TERMS} words per request"),
        ));
    }
    Ok(())
}

async fn get_subject(State(state): State<AppState>, Path(subject): Path<String>) -> Result<Response, AppError> {
    let group = SubjectService::from_state(&state).get(&subject)?;
    Ok(ok(group).into_response())
}

async fn add_words(
    _admin: AdminUser,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AddWordsRequest>,
) -> Result<Response, AppError> {
    check_bulk_size(&req.words)?;
    let update = SubjectService::from_state(&state)
        .add_words(&req.subject, &req.words)
        .await?;
    Ok(ok(update).into_response())
}

async fn upload_words(
    _admin: AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::read(multipart).await?;
    let subject = form.require_subject()?;
    let terms = form.terms()?;
    check_bulk_size(&terms)?;
    let update = SubjectService::from_state(&state).add_words(subject, &terms).await?;
    Ok(ok(update).into_response())
}

async fn assign_images(
    _admin: AdminUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::read(multipart).await?;
    let subject = form.require_subject()?.to_string();
    let terms = form.terms()?;
    check_bulk_size(&terms)?;
    let results = SubjectService::from_state(&state)
        .assign_images(&subject, &terms)
        .await?;
    Ok(ok(AssignResponse { subject, results }).into_response())
}
