//! Cloud region detection.
//!
//! A personal API key is only valid in the region that issued it. When no
//! fixed host is configured the resolver probes every regional host with the
//! same credential and remembers which one answered.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::cache::{CloudRegion, ScopedCache, StateKey};
use crate::config::{EU_BASE_URL, US_BASE_URL};
use crate::error::CacheError;

pub struct RegionResolver {
    cache: Arc<dyn ScopedCache>,
    custom_base_url: Option<String>,
    /// Probe order doubles as priority. The first entry is the fallback.
    endpoints: Vec<(CloudRegion, String)>,
}

impl RegionResolver {
    pub fn new(cache: Arc<dyn ScopedCache>, custom_base_url: Option<String>) -> Self {
        Self {
            cache,
            custom_base_url,
            endpoints: vec![
                (CloudRegion::Us, US_BASE_URL.to_string()),
                (CloudRegion::Eu, EU_BASE_URL.to_string()),
            ],
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<(CloudRegion, String)>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Probe all regions concurrently. The winner is the first region in
    /// priority order that accepted the credential, regardless of which
    /// answered first.
    pub async fn detect(&self, token: &str) -> Result<Option<CloudRegion>, CacheError> {
        let probes = self.endpoints.iter().map(|(region, base_url)| async move {
            let ok = match ApiClient::new(base_url, token) {
                Ok(client) => match client.users().me().await {
                    Ok(_) => true,
                    Err(e) => {
                        debug!(region = region.as_str(), error = %e, "region probe rejected");
                        false
                    }
                },
                Err(e) => {
                    warn!(region = region.as_str(), error = %e, "could not build probe client");
                    false
                }
            };
            (*region, ok)
        });

        let results = join_all(probes).await;
        let detected = results.into_iter().find(|(_, ok)| *ok).map(|(r, _)| r);

        match detected {
            Some(region) => {
                self.cache.set(StateKey::Region, region.as_str()).await?;
                info!(scope = %self.cache.scope(), region = region.as_str(), "detected region");
            }
            None => warn!(scope = %self.cache.scope(), "no region accepted the credential"),
        }
        Ok(detected)
    }

    /// API host to use for `token`.
    pub async fn base_url(&self, token: &str) -> Result<String, CacheError> {
        if let Some(custom) = self
            .custom_base_url
            .as_deref()
            .map(|s| s.trim_end_matches('/'))
            .filter(|s| !s.is_empty())
        {
            return Ok(custom.to_string());
        }

        let cached = self
            .cache
            .get(StateKey::Region)
            .await?
            .and_then(|r| r.parse::<CloudRegion>().ok());
        let region = match cached {
            Some(region) => Some(region),
            None => self.detect(token).await?,
        };

        Ok(self.url_for(region))
    }

    fn url_for(&self, region: Option<CloudRegion>) -> String {
        region
            .and_then(|r| self.endpoints.iter().find(|(er, _)| *er == r))
            .or_else(|| self.endpoints.first())
            .map(|(_, url)| url.clone())
            .unwrap_or_else(|| US_BASE_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, Scope};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn region_server(accepts: bool) -> MockServer {
        let server = MockServer::start().await;
        let response = if accepts {
            ResponseTemplate::new(200).set_body_json(json!({"distinct_id": "user-1"}))
        } else {
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid personal API key."}))
        };
        Mock::given(method("GET"))
            .and(path("/api/users/@me/"))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    fn resolver(us: &MockServer, eu: &MockServer) -> (RegionResolver, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new(Scope::from_token("phx_test").unwrap()));
        let resolver = RegionResolver::new(cache.clone(), None).with_endpoints(vec![
            (CloudRegion::Us, us.uri()),
            (CloudRegion::Eu, eu.uri()),
        ]);
        (resolver, cache)
    }

    #[tokio::test]
    async fn test_primary_wins_when_both_accept() {
        let us = region_server(true).await;
        let eu = region_server(true).await;
        let (resolver, cache) = resolver(&us, &eu);

        assert_eq!(resolver.detect("phx_test").await.unwrap(), Some(CloudRegion::Us));
        assert_eq!(cache.get(StateKey::Region).await.unwrap().as_deref(), Some("us"));
    }

    #[tokio::test]
    async fn test_priority_beats_latency() {
        let us = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/@me/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"distinct_id": "user-1"}))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&us)
            .await;
        let eu = region_server(true).await;
        let (resolver, cache) = resolver(&us, &eu);

        assert_eq!(resolver.detect("phx_test").await.unwrap(), Some(CloudRegion::Us));
        assert_eq!(cache.get(StateKey::Region).await.unwrap().as_deref(), Some("us"));
    }

    #[tokio::test]
    async fn test_secondary_only() {
        let us = region_server(false).await;
        let eu = region_server(true).await;
        let (resolver, _) = resolver(&us, &eu);

        assert_eq!(resolver.base_url("phx_test").await.unwrap(), eu.uri());
    }

    #[tokio::test]
    async fn test_unresolved_falls_back_to_default() {
        let us = region_server(false).await;
        let eu = region_server(false).await;
        let (resolver, cache) = resolver(&us, &eu);

        assert_eq!(resolver.detect("phx_test").await.unwrap(), None);
        assert_eq!(resolver.base_url("phx_test").await.unwrap(), us.uri());
        assert_eq!(cache.get(StateKey::Region).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cached_region_skips_probes() {
        let us = MockServer::start().await;
        let eu = MockServer::start().await;
        for server in [&us, &eu] {
            Mock::given(method("GET"))
                .and(path("/api/users/@me/"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(server)
                .await;
        }
        let (resolver, cache) = resolver(&us, &eu);
        cache.set(StateKey::Region, "eu").await.unwrap();

        assert_eq!(resolver.base_url("phx_test").await.unwrap(), eu.uri());
    }

    #[tokio::test]
    async fn test_custom_base_url_bypasses_detection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let cache = Arc::new(MemoryCache::new(Scope::from_token("phx_test").unwrap()));
        let resolver = RegionResolver::new(cache.clone(), Some("https://posthog.internal/".into()))
            .with_endpoints(vec![(CloudRegion::Us, server.uri())]);

        assert_eq!(
            resolver.base_url("phx_test").await.unwrap(),
            "https://posthog.internal"
        );
        assert_eq!(cache.get(StateKey::Region).await.unwrap(), None);
    }
}
