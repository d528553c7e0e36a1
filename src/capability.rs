// src/capability.rs
// =============================================================================
// Optional machinery some checks depend on.
//
// A spell check needs a word list, Core Web Vitals need a browser, the
// PageSpeed check needs an API key. Instead of probing for these ad hoc
// inside each check, the binary resolves them once into `Capabilities` and
// hands each check the one it needs. A check that receives an Unavailable
// capability reports itself as "not run" with the reason attached.
// =============================================================================

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::checks::browser::BrowserWorker;
use crate::checks::pagespeed::PageSpeedClient;
use crate::checks::spelling::Dictionary;

/// Either the thing is available, or we know why it isn't.
#[derive(Debug, Clone)]
pub enum Capability<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Capability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Capability::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    /// Borrow the inner value, or get the reason it is missing
    pub fn get(&self) -> Result<&T, &str> {
        match self {
            Capability::Available(value) => Ok(value),
            Capability::Unavailable { reason } => Err(reason),
        }
    }
}

/// Where to look for each optional capability.
#[derive(Debug, Clone, Default)]
pub struct CapabilityConfig {
    pub dictionary_path: Option<PathBuf>,
    pub browser_worker: Option<String>,
    pub pagespeed_api_key: Option<String>,
}

/// The resolved set handed to the check registry.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub dictionary: Capability<Arc<Dictionary>>,
    pub browser: Capability<BrowserWorker>,
    pub pagespeed: Capability<PageSpeedClient>,
}

/// Serializable view for the report ("which optional checks could run").
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CapabilityStatus {
    pub name: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::none()
    }
}

impl Capabilities {
    /// Nothing optional is available.
    pub fn none() -> Self {
        Self {
            dictionary: Capability::unavailable("no dictionary configured"),
            browser: Capability::unavailable("no browser worker configured"),
            pagespeed: Capability::unavailable("no PageSpeed API key configured"),
        }
    }

    /// Resolve every capability from configuration. Never fails: a broken
    /// configuration becomes an Unavailable capability with the cause.
    pub fn resolve(config: &CapabilityConfig) -> Self {
        let dictionary = match &config.dictionary_path {
            None => Capability::unavailable("no dictionary configured"),
            Some(path) => match Dictionary::load(path) {
                Ok(dictionary) => {
                    info!(path = %path.display(), words = dictionary.len(), "Loaded dictionary");
                    Capability::Available(Arc::new(dictionary))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Dictionary unavailable");
                    Capability::unavailable(format!("{}: {}", path.display(), e))
                }
            },
        };

        let browser = match &config.browser_worker {
            Some(command) if !command.trim().is_empty() => {
                Capability::Available(BrowserWorker::new(command.trim()))
            }
            _ => Capability::unavailable("no browser worker configured"),
        };

        let pagespeed = match &config.pagespeed_api_key {
            Some(key) if !key.trim().is_empty() => {
                Capability::Available(PageSpeedClient::new(key.trim()))
            }
            _ => Capability::unavailable("no PageSpeed API key configured"),
        };

        Self {
            dictionary,
            browser,
            pagespeed,
        }
    }

    pub fn status(&self) -> Vec<CapabilityStatus> {
        fn entry<T>(name: &'static str, capability: &Capability<T>) -> CapabilityStatus {
            CapabilityStatus {
                name,
                available: capability.is_available(),
                reason: capability.get().err().map(str::to_string),
            }
        }

        vec![
            entry("dictionary", &self.dictionary),
            entry("browser", &self.browser),
            entry("pagespeed", &self.pagespeed),
        ]
    }
}
