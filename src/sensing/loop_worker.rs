use std::sync::Arc;

use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::Pipeline;
use crate::utils::time::now_ms;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info};

/// Drive the pipeline once per `period` until cancelled. The first sample is
/// taken one full period after start. With `demo_delay` set, a single demo
/// moment is injected after that delay if the moment set is still empty.
pub(crate) async fn sampling_loop(
    pipeline: Arc<Pipeline>,
    period: Duration,
    demo_delay: Option<Duration>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let demo = tokio::time::sleep(demo_delay.unwrap_or(Duration::ZERO));
    tokio::pin!(demo);
    let mut demo_pending = demo_delay.is_some();

    loop {
        tokio::select! {
            // Cancellation wins over a tick that became ready at the same time.
            biased;

            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let sample = pipeline.tick(now_ms());
                log::debug!(
                    "sample hr={} stress={} movement={}",
                    sample.heart_rate, sample.stress_level, sample.movement
                );
            }
            _ = &mut demo, if demo_pending => {
                demo_pending = false;
                match pipeline.inject_demo_moment(now_ms()) {
                    Ok(Some(moment)) => log_info!("generated demo relaxation moment {}", moment.id),
                    Ok(None) => log_info!("moments already present; skipping demo moment"),
                    Err(err) => log_error!("demo moment failed: {err:#}"),
                }
            }
        }
    }
}
