//! Outbound request dispatch with proxy selection, identity rotation,
//! pacing, cookie persistence and retry-with-failover.

pub mod cookies;
pub mod retry;
pub mod user_agent;

pub use cookies::CookieStore;
pub use retry::{execute_with_retry, BackoffStrategy, RetryPolicy};
pub use user_agent::UserAgentPool;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::{BehaviorConfig, Config, ProxyConfig};
use crate::error::{GatemonError, GatemonResult};
use crate::pool::ProxyPool;

/// Process-wide outbound request wrapper. All concurrent callers share one
/// instance; pool mutations are serialized inside [`ProxyPool`].
pub struct Dispatcher {
    pool: Arc<ProxyPool>,
    proxy_config: ProxyConfig,
    behavior: BehaviorConfig,
    user_agents: UserAgentPool,
    cookies: CookieStore,
    retry_policy: RetryPolicy,
    direct_client: Client,
}

impl Dispatcher {
    pub async fn new(config: &Config, pool: Arc<ProxyPool>) -> Self {
        let cookies = CookieStore::open(config.cookie.clone()).await;
        Self {
            pool,
            proxy_config: config.proxy.clone(),
            behavior: config.behavior.clone(),
            user_agents: UserAgentPool::new(config.user_agent.clone()),
            cookies,
            retry_policy: RetryPolicy::new(config.proxy.retry_times),
            direct_client: Client::new(),
        }
    }

    /// Replace the retry policy. Tests inject a zero-delay one.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// Send `method` `url` through the current proxy.
    ///
    /// `customize` shapes the request (body, query, extra headers) and runs
    /// once per attempt. Proxying disabled or no usable proxy degrades to a
    /// direct call. Transport failures are retried up to the configured
    /// budget on the same proxy; the final failure blacklists it and a
    /// replacement is pulled before the error surfaces. HTTP error statuses
    /// are returned to the caller unretried.
    pub async fn dispatch<F>(&self, method: Method, url: &str, customize: F) -> GatemonResult<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        if !self.proxy_config.enabled {
            return self.send_direct(method, url, &customize).await;
        }

        let Some(proxy_url) = self.pool.select() else {
            warn!("no proxy available, sending direct");
            return self.send_direct(method, url, &customize).await;
        };

        let client = match self.proxied_client(&proxy_url) {
            Ok(client) => client,
            Err(e) => {
                error!(proxy = %proxy_url, error = %e, "unusable proxy URL, sending direct");
                return self.send_direct(method, url, &customize).await;
            }
        };

        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));

        self.pacing_delay().await;

        let max_attempts = self.retry_policy.max_attempts;
        for attempt in 1..=max_attempts {
            let mut request = customize(client.request(method.clone(), url));
            if let Some(agent) = self.user_agents.pick() {
                request = request.header(USER_AGENT, agent);
            }
            if let Some(host) = &host {
                if let Some(cookie) = self.cookies.header_for(host) {
                    request = request.header(COOKIE, cookie);
                }
            }

            match request.send().await {
                Ok(response) => {
                    if let Some(host) = &host {
                        if let Err(e) = self.cookies.store_response(host, response.headers()).await
                        {
                            warn!(error = %e, "failed to persist cookies");
                        }
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        proxy = %proxy_url,
                        error = %e,
                        "request failed"
                    );
                    if let Err(e) = self.cookies.save().await {
                        warn!(error = %e, "failed to persist cookies");
                    }

                    if attempt == max_attempts {
                        self.pool.blacklist(&proxy_url);
                        match self.pool.select() {
                            Some(replacement) if replacement != proxy_url => {
                                debug!(proxy = %replacement, "failover proxy acquired");
                                return Err(GatemonError::transport(&proxy_url, e.to_string()));
                            }
                            _ => return Err(GatemonError::NoProxyAvailable),
                        }
                    }

                    let delay = self.retry_policy.delay_after(attempt);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
        unreachable!("retry loop returns on final attempt")
    }

    /// GET without request customization.
    pub async fn get(&self, url: &str) -> GatemonResult<Response> {
        self.dispatch(Method::GET, url, |r| r).await
    }

    /// POST a JSON body.
    pub async fn post_json<T: serde::Serialize + Sync>(
        &self,
        url: &str,
        body: &T,
    ) -> GatemonResult<Response> {
        self.dispatch(Method::POST, url, |r| r.json(body)).await
    }

    async fn send_direct<F>(&self, method: Method, url: &str, customize: &F) -> GatemonResult<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        customize(self.direct_client.request(method, url))
            .send()
            .await
            .map_err(GatemonError::from)
    }

    fn proxied_client(&self, proxy_url: &str) -> GatemonResult<Client> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| GatemonError::transport(proxy_url, e.to_string()))?;
        Client::builder()
            .proxy(proxy)
            .timeout(self.proxy_config.timeout())
            .build()
            .map_err(|e| GatemonError::transport(proxy_url, e.to_string()))
    }

    /// Uniform random delay in the configured range, before the request
    /// goes out. Applied once per dispatch, not per attempt.
    async fn pacing_delay(&self) {
        if !self.behavior.enabled {
            return;
        }
        let (min, max) = self.behavior.delay_range();
        let delay = if max > min {
            let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
            Duration::from_secs_f64(secs)
        } else {
            min
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}
