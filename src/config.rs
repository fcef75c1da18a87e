use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::tile_proxy::OSM_TILE_URL_TEMPLATE;

pub const CONFIG_FILE_NAME: &str = "outdoor-tracking";
pub const ENV_PREFIX: &str = "OUTDOOR_TRACKING";

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub upstream_url_template: String,
    pub user_agent: String,
    pub cache_dir: String,
    /// origin the offline asset cache treats as same-origin
    pub origin: String,
}

impl Settings {
    /// Defaults, then `outdoor-tracking.yaml` (if any), then
    /// `OUTDOOR_TRACKING_*` environment variables.
    pub fn load() -> Result<Settings> {
        Self::load_from(CONFIG_FILE_NAME)
    }

    pub fn load_from(file_name: &str) -> Result<Settings> {
        let config = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("upstream_url_template", OSM_TILE_URL_TEMPLATE)?
            .set_default(
                "user_agent",
                concat!("outdoor-tracking/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("cache_dir", "cache")?
            .set_default("origin", "http://localhost:8080")?
            .add_source(File::with_name(file_name).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let settings = Settings::load_from("does-not-exist/outdoor-tracking").unwrap();
        assert_eq!(
            settings.upstream_url_template,
            "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"
        );
        assert!(settings.user_agent.starts_with("outdoor-tracking/"));
    }
}
