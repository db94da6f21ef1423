//! Proxy and user agent selection
//!
//! Each page is fetched with a proxy and a user agent drawn uniformly at random
//! from the configured pools. Pool entries may contain a session placeholder
//! that is replaced by a fresh random number on every pick, which lets rotating
//! proxies hand out a new exit per page.

use crate::url::redact_proxy_url;
use rand::seq::SliceRandom;
use rand::Rng;

/// Token replaced by a random session number at selection time
pub const SESSION_PLACEHOLDER: &str = "{session}";

/// Picks one entry from `pool` and fills in its session placeholder
///
/// Returns `None` for an empty pool.
pub fn select_and_materialize<R: Rng + ?Sized>(pool: &[String], rng: &mut R) -> Option<String> {
    let template = pool.choose(rng)?;
    if template.contains(SESSION_PLACEHOLDER) {
        let session: u32 = rng.gen();
        Some(template.replace(SESSION_PLACEHOLDER, &session.to_string()))
    } else {
        Some(template.clone())
    }
}

/// The proxy and user agent chosen for one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedIdentity {
    pub proxy_url: Option<String>,
    pub user_agent: Option<String>,
}

impl SelectedIdentity {
    pub fn pick<R: Rng + ?Sized>(proxy_urls: &[String], user_agents: &[String], rng: &mut R) -> Self {
        Self {
            proxy_url: select_and_materialize(proxy_urls, rng),
            user_agent: select_and_materialize(user_agents, rng),
        }
    }

    /// Proxy URL safe to persist
    pub fn redacted_proxy_url(&self) -> Option<String> {
        self.proxy_url.as_deref().map(redact_proxy_url)
    }
}
