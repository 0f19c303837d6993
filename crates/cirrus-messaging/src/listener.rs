//! Cancellable poll loop behind `add_listener`

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cirrus_core::{CirrusResult, Locator};

use crate::message::Message;
use crate::provider::Listener;

/// Repeatedly poll and hand every message to `listener`.
///
/// Cancellation is checked once per iteration, before polling; the backoff sleep only
/// happens after an empty poll and is cut short by either token. A poll error ends the loop
/// and is returned to the caller.
pub(crate) async fn poll_until_cancelled<P, F>(
    locator: &Locator,
    mut listener: Listener,
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
    backoff: Duration,
    mut poll: P,
) -> CirrusResult<()>
where
    P: FnMut() -> F,
    F: Future<Output = CirrusResult<Vec<Message>>>,
{
    tracing::info!(locator = %locator, "Listener started");
    let mut delivered: u64 = 0;

    loop {
        if cancel.is_cancelled() || shutdown.is_cancelled() {
            break;
        }

        let messages = poll().await.map_err(|e| {
            tracing::error!(error = %e, locator = %locator, "Listener poll failed");
            e
        })?;

        if messages.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            continue;
        }

        for message in messages {
            listener(message);
            delivered += 1;
        }
    }

    tracing::info!(locator = %locator, delivered, "Listener stopped");
    Ok(())
}
