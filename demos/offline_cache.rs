use outdoor_tracking_core::cache_storage::CacheStorage;
use outdoor_tracking_core::config::Settings;
use outdoor_tracking_core::logs;
use outdoor_tracking_core::network::{HttpNetwork, Request};
use outdoor_tracking_core::OfflineAssetCache;
use std::env;

// Installs the app shell from the configured origin, then fetches every url
// given on the command line through the offline cache.
//   OUTDOOR_TRACKING_ORIGIN=http://localhost:5173 cargo run --example offline_cache -- /tracks
pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    std::fs::create_dir_all(&settings.cache_dir)?;
    logs::init(&settings.cache_dir)?;

    let storage = CacheStorage::open(&settings.cache_dir)?;
    let network = HttpNetwork::new(&settings.origin, &settings.user_agent)?;
    let offline_cache = OfflineAssetCache::new(storage, network, &settings.origin)?;

    if let Err(e) = offline_cache.install() {
        eprintln!("install failed, nothing was cached: {e:?}");
        return Ok(());
    }
    let deleted = offline_cache.activate()?;
    println!("deleted stale caches: {deleted:?}");

    for url in env::args().skip(1) {
        let outcome = offline_cache.fetch(&Request::get(&url))?;
        println!(
            "{} -> {} ({:?}, {} bytes, stored: {})",
            url,
            outcome.response.status,
            outcome.source,
            outcome.response.body.len(),
            outcome.stored
        );
    }
    Ok(())
}
