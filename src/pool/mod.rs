//! Rotating proxy pool with temporary blacklisting.
//!
//! The pool owns the ordered entry list and the rotation cursor behind one
//! mutex. The lock covers cursor and blacklist bookkeeping only; liveness
//! tests and every other network call happen outside it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{ProxyConfig, ProxyMode};
use crate::descriptor::VlessDescriptor;
use crate::engine::EngineSupervisor;

/// One usable proxy endpoint.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub url: String,
    /// Set while the entry is blacklisted; cleared lazily on selection once
    /// the blacklist duration has elapsed.
    pub blacklisted_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct PoolState {
    entries: Vec<PoolEntry>,
    cursor: usize,
    request_count: u32,
}

/// Rotating, blacklist-aware proxy pool shared by all dispatcher callers.
pub struct ProxyPool {
    state: Mutex<PoolState>,
    rotation_interval: u32,
    blacklist_time: Duration,
}

impl ProxyPool {
    pub fn new(rotation_interval: u32, blacklist_time: Duration) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            rotation_interval,
            blacklist_time,
        }
    }

    /// Populate the pool from the configured proxy source, then drop every
    /// candidate that fails the liveness test. An empty usable set is logged,
    /// not an error; callers degrade to direct connections.
    pub async fn initialize(
        &self,
        mode: ProxyMode,
        supervisor: &mut EngineSupervisor,
        config: &ProxyConfig,
    ) {
        let candidates = match mode {
            ProxyMode::Protocol(uris) => {
                let mut descriptors = Vec::new();
                for uri in &uris {
                    match VlessDescriptor::parse(uri) {
                        Ok(d) => descriptors.push(d),
                        Err(e) => warn!(error = %e, "skipping malformed descriptor"),
                    }
                }
                info!("loaded {} VLESS descriptors", descriptors.len());
                supervisor
                    .start_all(descriptors, config.local_port_start)
                    .await;
                supervisor.live_proxy_urls()
            }
            ProxyMode::StaticHttp(urls) => {
                info!("loaded {} static HTTP proxies", urls.len());
                urls
            }
            ProxyMode::StaticSocks5(urls) => {
                info!("loaded {} static SOCKS5 proxies", urls.len());
                urls
            }
        };

        let total = candidates.len();
        let mut usable = Vec::new();
        for url in candidates {
            if test_proxy(&url, &config.test_url, config.timeout()).await {
                usable.push(url);
            }
        }

        info!("proxy test finished, {}/{} usable", usable.len(), total);
        if usable.is_empty() {
            warn!("no usable proxy, outbound requests will go direct");
        }
        self.add_entries(usable);
    }

    /// Append entries without liveness testing.
    pub fn add_entries(&self, urls: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        state.entries.extend(urls.into_iter().map(|url| PoolEntry {
            url,
            blacklisted_at: None,
        }));
    }

    /// Pick a proxy for the next request.
    ///
    /// The cursor advances every `rotation_interval` selections. A
    /// blacklisted entry whose window has elapsed is rehabilitated in place;
    /// one that is still cooling off is skipped by a single cursor step,
    /// without scanning further. The request counter increments on every
    /// call regardless.
    pub fn select(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        if state.entries.is_empty() {
            return None;
        }

        if state.request_count >= self.rotation_interval {
            state.cursor = (state.cursor + 1) % state.entries.len();
            state.request_count = 0;
        }

        let mut cursor = state.cursor;
        let still_blacklisted = {
            let entry = &mut state.entries[cursor];
            match entry.blacklisted_at {
                Some(at) if at.elapsed() >= self.blacklist_time => {
                    entry.blacklisted_at = None;
                    false
                }
                Some(_) => true,
                None => false,
            }
        };
        if still_blacklisted {
            // Single-step skip: take the next entry instead. When most of
            // the pool is blacklisted this can still hand out a blacklisted
            // pick; the caller's retry moves past it.
            cursor = (cursor + 1) % state.entries.len();
            state.cursor = cursor;
        }

        state.request_count += 1;
        let url = state.entries[cursor].url.clone();
        debug!(proxy = %url, "selected proxy");
        Some(url)
    }

    /// Put an entry into the blacklist window starting now.
    pub fn blacklist(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.url == url) {
            entry.blacklisted_at = Some(Instant::now());
            warn!(proxy = %url, "proxy blacklisted");
        }
    }

    /// Number of entries, blacklisted ones included.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the entries for status display.
    pub fn entries(&self) -> Vec<PoolEntry> {
        self.state.lock().unwrap().entries.clone()
    }
}

/// Probe one proxy against the liveness endpoint. Usable means the request
/// goes through and answers 200 OK within the timeout.
async fn test_proxy(proxy_url: &str, test_url: &str, timeout: Duration) -> bool {
    let proxy = match reqwest::Proxy::all(proxy_url) {
        Ok(p) => p,
        Err(e) => {
            warn!(proxy = %proxy_url, error = %e, "unsupported proxy URL");
            return false;
        }
    };
    let client = match reqwest::Client::builder().proxy(proxy).timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => {
            warn!(proxy = %proxy_url, error = %e, "failed to build test client");
            return false;
        }
    };

    match client.get(test_url).send().await {
        Ok(response) if response.status().is_success() => {
            info!(proxy = %proxy_url, "proxy test passed");
            true
        }
        Ok(response) => {
            warn!(proxy = %proxy_url, status = %response.status(), "proxy test failed");
            false
        }
        Err(e) => {
            warn!(proxy = %proxy_url, error = %e, "proxy test failed");
            false
        }
    }
}
