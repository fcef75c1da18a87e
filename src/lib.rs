#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod cache_storage;
pub mod config;
pub mod logs;
pub mod network;
pub mod offline_cache;
pub mod server;
pub mod tile_proxy;
pub mod track;

pub use offline_cache::OfflineAssetCache;
pub use server::TileServer;
pub use track::{Position, Track};
