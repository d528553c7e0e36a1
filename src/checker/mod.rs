// src/checker/mod.rs
// =============================================================================
// This module resolves the URLs a page points at.
//
// Submodules:
// - probe: one HEAD-style metadata request, failures classified as data
// - pool: bounded, order-preserving fan-out of probes (ConcurrentChecker)
// - html: extraction of outbound links and embedded resources
// =============================================================================

mod html;
mod pool;
mod probe;

pub use html::{extract_links, extract_resources, is_internal, resolve_url, ResourceKind};
pub use pool::{dedupe_urls, ConcurrentChecker};
pub use probe::{is_cdn_response, FailureKind, HttpProbe, Probe, ProbeResult, ProbeStatus};

pub(crate) use probe::classify_error;

#[cfg(test)]
pub(crate) use pool::tests::ScriptedProbe;
