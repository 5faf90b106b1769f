use crate::services::word_of_day::WordOfDayService;
use crate::state::AppState;

pub async fn run(state: &AppState) {
    match WordOfDayService::from_state(state).today().await {
        Ok(pick) => tracing::info!(date = %pick.date, word = %pick.word, "word_of_day_warmup: done"),
        Err(e) => tracing::error!(error = %e.message, "word_of_day_warmup failed"),
    }
}
