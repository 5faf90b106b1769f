use crate::constants::IMAGE_SWEEP_BATCH;
use crate::services::images::ImageService;
use crate::services::relay::RelayOutcome;
use crate::state::AppState;

/// Relay every word that has a job id but no image, one poll attempt each.
pub async fn run(state: &AppState) {
    tracing::debug!("image_sweep: start");
    let pending = match state.store().words_pending_image(IMAGE_SWEEP_BATCH) {
        Ok(words) => words,
        Err(e) => {
            tracing::error!(error = %e, "image_sweep: listing pending words failed");
            return;
        }
    };
    if pending.is_empty() {
        return;
    }

    let base = ImageService::from_state(state);
    let relay = state.relay();
    let single_attempt = relay
        .poller()
        .with_config(relay.poller().config().with_attempts(1));
    let service = base.with_relay(relay.with_poller(single_attempt));

    let (mut uploaded, mut still_pending, mut failed) = (0usize, 0usize, 0usize);
    for entry in pending {
        if state.cancel_token().is_cancelled() {
            break;
        }
        let Some(job_id) = entry.prompt_id.as_deref() else {
            continue;
        };
        match service.relay_word(entry.term(), job_id).await {
            Ok(RelayOutcome::Uploaded { .. }) => uploaded += 1,
            Ok(RelayOutcome::Pending) => still_pending += 1,
            Ok(RelayOutcome::Failed { reason }) => {
                failed += 1;
                tracing::warn!(word = %entry.term(), job_id, reason = %reason, "image_sweep: job failed");
            }
            Err(e) => {
                failed += 1;
                tracing::error!(word = %entry.term(), error = %e.message, "image_sweep: relay error");
            }
        }
    }
    tracing::info!(uploaded, pending = still_pending, failed, "image_sweep: done");
}
