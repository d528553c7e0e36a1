// src/checker/pool.rs
// =============================================================================
// ConcurrentChecker: bounded fan-out of probes over a list of URLs.
//
// How it works:
// 1. Each URL is paired with its position in the input list
// 2. `buffer_unordered(C)` keeps at most C probes in flight; as soon as one
//    finishes the next one is started
// 3. Each finished probe writes into its own slot (indexed by position), so
//    the output order always equals the input order, whatever the
//    completion order was
// 4. The loop stops early if the overall deadline passes or the run is
//    cancelled; dropping the stream cancels the probes still in flight and
//    their slots are filled with "unresolved" (timeout)
//
// No retries happen here. A failing URL only ever affects its own slot.
// =============================================================================

use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::probe::{FailureKind, Probe, ProbeResult};

/// Runs a `Probe` over many URLs with a concurrency cap.
pub struct ConcurrentChecker<P: Probe + ?Sized> {
    probe: Arc<P>,
    concurrency: usize,
    request_timeout: Duration,
}

impl<P: Probe + ?Sized> ConcurrentChecker<P> {
    /// `concurrency` is clamped to at least 1.
    pub fn new(probe: Arc<P>, concurrency: usize, request_timeout: Duration) -> Self {
        Self {
            probe,
            concurrency: concurrency.max(1),
            request_timeout,
        }
    }

    /// Probes every URL and returns one result per URL, in input order.
    ///
    /// The caller is expected to pass unique URLs (see `dedupe_urls`); a
    /// duplicate would simply be probed twice.
    pub async fn check_all(
        &self,
        urls: &[String],
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Vec<ProbeResult> {
        let mut slots: Vec<Option<ProbeResult>> = vec![None; urls.len()];
        if urls.is_empty() {
            return Vec::new();
        }

        let probe = &*self.probe;
        let timeout = self.request_timeout;

        let probes = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move {
                // The probe has its own timeout; this guard also bounds
                // probes that ignore it.
                let result = match tokio::time::timeout(timeout, probe.probe(url, timeout)).await {
                    Ok(result) => result,
                    Err(_) => ProbeResult::unresolved(url.as_str(), FailureKind::Timeout, "Request timed out"),
                };
                (index, result)
            })
            .buffer_unordered(self.concurrency);
        futures::pin_mut!(probes);

        let mut completed = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(completed, total = urls.len(), "Probe batch cancelled");
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(completed, total = urls.len(), "Overall deadline reached during probe batch");
                    break;
                }
                next = probes.next() => match next {
                    Some((index, result)) => {
                        debug!(url = %result.url, status = ?result.status, "Slot filled");
                        slots[index] = Some(result);
                        completed += 1;
                    }
                    None => break,
                },
            }
        }

        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    ProbeResult::unresolved(url.as_str(), FailureKind::Timeout, "Overall deadline exceeded")
                })
            })
            .collect();

        info!(
            total = results.len(),
            unresolved = results.iter().filter(|r| r.is_unresolved()).count(),
            concurrency = self.concurrency,
            "Probe batch finished"
        );
        results
    }
}

/// Removes repeated URLs, keeping the first occurrence's position.
pub fn dedupe_urls<I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    urls.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why buffer_unordered and not buffered?
//    - buffered(C) yields in order, but a slow first URL holds its place in
//      the window and nothing new starts behind it
//    - buffer_unordered(C) starts the next probe as soon as ANY slot frees up
//    - ordering is restored afterwards through the indexed slots
//
// 2. Why no locks?
//    - every probe returns its result; only this loop writes to `slots`
//
// 3. What happens to in-flight probes on deadline?
//    - the stream is dropped when the function returns, which drops the
//      futures and with them the underlying HTTP requests
// -----------------------------------------------------------------------------
