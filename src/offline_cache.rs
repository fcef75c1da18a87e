use anyhow::Result;
use reqwest::Url;

use crate::cache_storage::CacheStorage;
use crate::network::{resolve_url, Network, Request, Response, ResponseType};

pub const CACHE_NAME: &str = "outdoor-tracking-app-v1";

pub const URLS_TO_CACHE: [&str; 6] = [
    "/",
    "https://cdnjs.cloudflare.com/ajax/libs/tailwindcss/2.2.19/tailwind.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.3/leaflet.js",
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.3/leaflet.css",
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.3/images/marker-icon.png",
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.3/images/marker-shadow.png",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
    /// whether a copy of a network response was written to the cache
    pub stored: bool,
}

/// The site's offline cache: pre-caches the app shell on `install`, drops
/// caches of older versions on `activate` and answers `fetch` cache first.
pub struct OfflineAssetCache<N: Network> {
    storage: CacheStorage,
    network: N,
    origin: Url,
    cache_name: String,
    urls_to_cache: Vec<String>,
}

impl<N: Network> OfflineAssetCache<N> {
    pub fn new(storage: CacheStorage, network: N, origin: &str) -> Result<Self> {
        Self::with_assets(storage, network, origin, CACHE_NAME, &URLS_TO_CACHE)
    }

    pub fn with_assets(
        storage: CacheStorage,
        network: N,
        origin: &str,
        cache_name: &str,
        urls_to_cache: &[&str],
    ) -> Result<Self> {
        Ok(Self {
            storage,
            network,
            origin: Url::parse(origin)?,
            cache_name: cache_name.to_string(),
            urls_to_cache: urls_to_cache.iter().map(|x| x.to_string()).collect(),
        })
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Absolute form of `url`, which is what the cache is keyed by.
    pub fn request(&self, url: &str) -> Result<Request> {
        Ok(Request::get(resolve_url(&self.origin, url)?.as_str()))
    }

    pub fn install(&self) -> Result<()> {
        let cache = self.storage.open_cache(&self.cache_name)?;
        info!("[offline_cache] opened cache {}", self.cache_name);
        let requests = self
            .urls_to_cache
            .iter()
            .map(|url| self.request(url))
            .collect::<Result<Vec<_>>>()?;
        cache.add_all(&requests, &self.network)?;
        info!(
            "[offline_cache] installed {} assets into {}",
            requests.len(),
            self.cache_name
        );
        Ok(())
    }

    /// Deletes every cache except the current one. Returns the deleted names.
    pub fn activate(&self) -> Result<Vec<String>> {
        let cache_whitelist = [self.cache_name.as_str()];
        let mut deleted = Vec::new();
        for cache_name in self.storage.keys()? {
            if !cache_whitelist.contains(&cache_name.as_str())
                && self.storage.delete(&cache_name)?
            {
                info!("[offline_cache] deleted stale cache {}", cache_name);
                deleted.push(cache_name);
            }
        }
        Ok(deleted)
    }

    pub fn fetch(&self, request: &Request) -> Result<FetchOutcome> {
        let request = Request {
            method: request.method.clone(),
            url: resolve_url(&self.origin, &request.url)?.to_string(),
        };

        if let Some(response) = self.storage.match_request(&request)? {
            debug!("[offline_cache] cache hit: {}", request.url);
            return Ok(FetchOutcome {
                response,
                source: ResponseSource::Cache,
                stored: false,
            });
        }

        let response = self.network.fetch(&request)?;
        if response.status != 200 || response.response_type != ResponseType::Basic {
            return Ok(FetchOutcome {
                response,
                source: ResponseSource::Network,
                stored: false,
            });
        }

        // storing is opportunistic, a failure here must not fail the fetch.
        let stored = match self
            .storage
            .open_cache(&self.cache_name)
            .and_then(|cache| cache.put(&request, &response))
        {
            Ok(()) => true,
            Err(e) => {
                warn!("[offline_cache] failed to cache {}: {:?}", request.url, e);
                false
            }
        };

        Ok(FetchOutcome {
            response,
            source: ResponseSource::Network,
            stored,
        })
    }
}
