mod cache;
mod config;
mod loader;

pub use cache::{AssetCache, AssetLocation};
pub use config::AssetConfig;
pub use loader::AssetModelLoader;
