//! Durable per-domain cookie store.
//!
//! Responses update the store after every dispatched attempt and the store
//! is flushed to disk right away, so session continuity survives a process
//! restart. File format is a JSON object keyed by domain, each value a
//! name/value map.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::{debug, warn};

use crate::config::CookieConfig;
use crate::error::{GatemonError, GatemonResult};

type DomainCookies = HashMap<String, HashMap<String, String>>;

pub struct CookieStore {
    config: CookieConfig,
    path: PathBuf,
    cookies: Mutex<DomainCookies>,
}

impl CookieStore {
    /// Open the store, loading any existing jar file. A missing file is an
    /// empty store; a corrupt one is logged and replaced on the next save.
    pub async fn open(config: CookieConfig) -> Self {
        let path = PathBuf::from(&config.save_path);
        let cookies = if config.enabled {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<DomainCookies>(&content) {
                    Ok(map) => {
                        debug!(path = %path.display(), domains = map.len(), "cookie jar loaded");
                        map
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "corrupt cookie jar, starting empty");
                        DomainCookies::new()
                    }
                },
                Err(_) => DomainCookies::new(),
            }
        } else {
            DomainCookies::new()
        };

        Self {
            config,
            path,
            cookies: Mutex::new(cookies),
        }
    }

    fn domain_tracked(&self, host: &str) -> bool {
        self.config.domains.is_empty()
            || self
                .config
                .domains
                .iter()
                .any(|d| host == d || host.ends_with(&format!(".{}", d)))
    }

    /// Cookie request header value for `host`, if anything is stored.
    pub fn header_for(&self, host: &str) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        let cookies = self.cookies.lock().unwrap();
        let domain = cookies.get(host)?;
        if domain.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = domain.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        pairs.sort();
        Some(pairs.join("; "))
    }

    /// Merge `Set-Cookie` response headers for `host` into the store and
    /// flush to disk. Domains outside the configured list are ignored.
    pub async fn store_response(&self, host: &str, headers: &HeaderMap) -> GatemonResult<()> {
        if !self.config.enabled || !self.domain_tracked(host) {
            return Ok(());
        }

        let mut updated = false;
        {
            let mut cookies = self.cookies.lock().unwrap();
            let domain = cookies.entry(host.to_string()).or_default();
            for value in headers.get_all(SET_COOKIE) {
                let Ok(raw) = value.to_str() else { continue };
                // name=value precedes the first attribute separator
                let pair = raw.split(';').next().unwrap_or("");
                if let Some((name, value)) = pair.split_once('=') {
                    domain.insert(name.trim().to_string(), value.trim().to_string());
                    updated = true;
                }
            }
        }

        if updated {
            self.save().await?;
        }
        Ok(())
    }

    /// Write the jar to disk.
    pub async fn save(&self) -> GatemonResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let snapshot = self.cookies.lock().unwrap().clone();
        let json = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| GatemonError::cookie(format!("saving {}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "cookie jar saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn store_config(path: &std::path::Path) -> CookieConfig {
        CookieConfig {
            enabled: true,
            save_path: path.display().to_string(),
            domains: vec!["gate.io".to_string()],
        }
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let store = CookieStore::open(store_config(&path)).await;
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("session=abc; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("lang=en"));
        store.store_response("www.gate.io", &headers).await.unwrap();

        let reopened = CookieStore::open(store_config(&path)).await;
        assert_eq!(
            reopened.header_for("www.gate.io").unwrap(),
            "lang=en; session=abc"
        );
    }

    #[tokio::test]
    async fn test_merge_keeps_existing_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let store = CookieStore::open(store_config(&path)).await;

        let mut first = HeaderMap::new();
        first.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        store.store_response("gate.io", &first).await.unwrap();

        let mut second = HeaderMap::new();
        second.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        second.append(SET_COOKIE, HeaderValue::from_static("a=9"));
        store.store_response("gate.io", &second).await.unwrap();

        assert_eq!(store.header_for("gate.io").unwrap(), "a=9; b=2");
    }

    #[tokio::test]
    async fn test_untracked_domain_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let store = CookieStore::open(store_config(&path)).await;

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("x=1"));
        store.store_response("example.com", &headers).await.unwrap();

        assert!(store.header_for("example.com").is_none());
    }

    #[tokio::test]
    async fn test_disabled_store_is_inert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let mut config = store_config(&path);
        config.enabled = false;
        let store = CookieStore::open(config).await;

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("x=1"));
        store.store_response("gate.io", &headers).await.unwrap();

        assert!(store.header_for("gate.io").is_none());
        assert!(!path.exists());
    }
}
