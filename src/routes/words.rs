use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::response::{ok, AppError};
use crate::services::dictionary::WordService;
use crate::services::word_of_day::WordOfDayService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:term", get(lookup_word))
}

/// 查词：缓存命中直接返回，否则经 LLM 生成后写入
async fn lookup_word(State(state): State<AppState>, Path(term): Path<String>) -> Result<Response, AppError> {
    let entry = WordService::from_state(&state).lookup(&term).await?;
    Ok(ok(entry).into_response())
}

pub async fn word_of_the_day(State(state): State<AppState>) -> Result<Response, AppError> {
    let pick = WordOfDayService::from_state(&state).today().await?;
    Ok(ok(pick).into_response())
}
