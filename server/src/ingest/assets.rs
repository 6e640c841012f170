//! External asset existence checks.
//!
//! Assets in uploaded projects are often already hosted by the external
//! asset service. Those are pruned from the archive before it is stored.
//! Only positive answers are cached, so a wrong "exists" can never be
//! produced by the cache itself.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;

use super::report::Reporter;
use crate::config::AssetServiceConfig;
use crate::error::{ServerError, ServerResult};

lazy_static! {
    /// Names that can be placed in a probe URL verbatim.
    static ref PROBEABLE_NAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
}

/// A way to ask the asset service whether an asset exists.
#[async_trait]
pub trait AssetProbe: Send + Sync + Debug {
    /// Returns whether the asset exists.
    ///
    /// An error means the answer is unknown.
    async fn probe(&self, name: &str) -> ServerResult<bool>;
}

/// Probes the asset service with HTTP `HEAD` requests.
#[derive(Debug)]
pub struct HttpAssetProbe {
    client: Client,
    config: AssetServiceConfig,
}

/// Process-wide memo of assets confirmed to exist externally.
#[derive(Debug)]
pub struct AssetExistenceCache {
    probe: Arc<dyn AssetProbe>,
    confirmed: RwLock<HashSet<String>>,
    reporter: Arc<dyn Reporter>,
}

impl HttpAssetProbe {
    pub fn new(config: AssetServiceConfig) -> ServerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::AssetProbeError(e.into()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl AssetProbe for HttpAssetProbe {
    async fn probe(&self, name: &str) -> ServerResult<bool> {
        let res = self
            .client
            .head(self.config.asset_url(name))
            .send()
            .await
            .map_err(|e| ServerError::AssetProbeError(e.into()))?;

        Ok(res.status() == StatusCode::OK)
    }
}

impl AssetExistenceCache {
    pub fn new(probe: Arc<dyn AssetProbe>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            probe,
            confirmed: RwLock::new(HashSet::new()),
            reporter,
        }
    }

    /// Returns whether an asset is confirmed to exist externally.
    ///
    /// Probe failures are reported and answered with `false`.
    pub async fn exists(&self, name: &str) -> bool {
        if self.confirmed.read().await.contains(name) {
            return true;
        }

        if !PROBEABLE_NAME_REGEX.is_match(name) {
            tracing::debug!("Not probing unusual asset name {:?}", name);
            return false;
        }

        // The lock is not held across the probe
        match self.probe.probe(name).await {
            Ok(true) => {
                self.confirmed.write().await.insert(name.to_owned());
                true
            }
            Ok(false) => false,
            Err(e) => {
                self.reporter
                    .report(&e, &format!("probing asset {}", name));
                false
            }
        }
    }

    /// Returns the subset of `names` confirmed to exist externally.
    ///
    /// The names are probed concurrently.
    pub async fn confirmed<'a, I>(&self, names: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let checks = names.into_iter().map(|name| async move {
            if self.exists(name).await {
                Some(name.to_owned())
            } else {
                None
            }
        });

        join_all(checks).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::block_on;

    use crate::testing::{ProbeAnswer, RecordingReporter, ScriptedProbe};

    fn cache(probe: &Arc<ScriptedProbe>, reporter: &Arc<RecordingReporter>) -> AssetExistenceCache {
        AssetExistenceCache::new(probe.clone(), reporter.clone())
    }

    #[test]
    fn test_positive_answers_are_cached() {
        let probe = Arc::new(ScriptedProbe::new(ProbeAnswer::Missing));
        probe.script("a.png", &[ProbeAnswer::Exists, ProbeAnswer::Missing]);
        let reporter = Arc::new(RecordingReporter::default());
        let cache = cache(&probe, &reporter);

        assert!(block_on(cache.exists("a.png")));
        assert!(block_on(cache.exists("a.png")));
        assert_eq!(1, probe.calls("a.png"));
    }

    #[test]
    fn test_negative_answers_are_not_cached() {
        let probe = Arc::new(ScriptedProbe::new(ProbeAnswer::Missing));
        probe.script("b.wav", &[ProbeAnswer::Missing, ProbeAnswer::Exists]);
        let reporter = Arc::new(RecordingReporter::default());
        let cache = cache(&probe, &reporter);

        assert!(!block_on(cache.exists("b.wav")));
        assert!(block_on(cache.exists("b.wav")));
        assert!(block_on(cache.exists("b.wav")));
        assert_eq!(2, probe.calls("b.wav"));
    }

    #[test]
    fn test_failures_are_reported() {
        let probe = Arc::new(ScriptedProbe::new(ProbeAnswer::Fail));
        let reporter = Arc::new(RecordingReporter::default());
        let cache = cache(&probe, &reporter);

        assert!(!block_on(cache.exists("c.mp3")));
        assert!(!block_on(cache.exists("c.mp3")));
        assert_eq!(2, probe.calls("c.mp3"));

        let events = reporter.events();
        assert_eq!(2, events.len());
        assert_eq!("AssetProbeError", events[0].0);
    }

    #[test]
    fn test_unusual_names_are_not_probed() {
        let probe = Arc::new(ScriptedProbe::new(ProbeAnswer::Exists));
        let reporter = Arc::new(RecordingReporter::default());
        let cache = cache(&probe, &reporter);

        assert!(!block_on(cache.exists("../../admin")));
        assert!(!block_on(cache.exists("a b.png")));
        assert_eq!(0, probe.total_calls());
    }

    #[test]
    fn test_confirmed_subset() {
        let probe = Arc::new(ScriptedProbe::new(ProbeAnswer::Missing));
        probe.script("a.png", &[ProbeAnswer::Exists]);
        probe.script("c.png", &[ProbeAnswer::Fail]);
        let reporter = Arc::new(RecordingReporter::default());
        let cache = cache(&probe, &reporter);

        let confirmed = block_on(cache.confirmed(["a.png", "b.png", "c.png"]));
        assert_eq!(
            ["a.png".to_string()].into_iter().collect::<HashSet<_>>(),
            confirmed
        );
    }

    #[test]
    fn test_asset_url() {
        let config = AssetServiceConfig::default();
        assert_eq!(
            "https://assets.scratch.mit.edu/internalapi/83a9787d4cb6f3b7632b4ddfebf74367.wav/get/",
            config.asset_url("83a9787d4cb6f3b7632b4ddfebf74367.wav")
        );
    }
}
