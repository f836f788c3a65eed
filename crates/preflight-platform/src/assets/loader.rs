//! [`ModelLoader`] over the asset cache.

use async_trait::async_trait;
use preflight_core::{ModelError, ModelHandle, ModelKind, ModelLoader};
use std::path::Path;

use super::cache::{AssetCache, AssetLocation};
use super::config::AssetConfig;
use crate::error::{PlatformError, PlatformResult};

/// Resolves a model asset and checks it is usable.
pub struct AssetModelLoader {
    cache: AssetCache,
    object_model: AssetLocation,
    gaze_model: AssetLocation,
}

impl AssetModelLoader {
    pub fn new(config: &AssetConfig) -> PlatformResult<Self> {
        Ok(Self {
            cache: AssetCache::new(config.resolved_cache_dir(), config.download_timeout())?,
            object_model: AssetLocation::parse(&config.object_model),
            gaze_model: AssetLocation::parse(&config.gaze_model),
        })
    }

    fn location(&self, kind: ModelKind) -> &AssetLocation {
        match kind {
            ModelKind::ObjectDetection => &self.object_model,
            ModelKind::Gaze => &self.gaze_model,
        }
    }
}

fn model_error(e: PlatformError) -> ModelError {
    match e {
        PlatformError::NotFound(what) => ModelError::NotFound(what),
        PlatformError::InvalidAsset(why) => ModelError::Invalid(why),
        other => ModelError::Fetch(other.to_string()),
    }
}

/// Graph descriptors must be JSON; binary bundles only need content.
pub(crate) fn validate(path: &Path, content: &[u8]) -> PlatformResult<()> {
    if content.is_empty() {
        return Err(PlatformError::InvalidAsset(format!(
            "{} is empty",
            path.display()
        )));
    }
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_slice::<serde_json::Value>(content).map_err(|e| {
            PlatformError::InvalidAsset(format!("{}: {}", path.display(), e))
        })?;
    }
    Ok(())
}

#[async_trait]
impl ModelLoader for AssetModelLoader {
    async fn load(&self, kind: ModelKind) -> Result<ModelHandle, ModelError> {
        let location = self.location(kind);
        tracing::info!("Loading {} from {}", kind, location);

        let path = self.cache.fetch(location).await.map_err(model_error)?;
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| ModelError::Fetch(format!("{}: {}", path.display(), e)))?;
        validate(&path, &content).map_err(model_error)?;

        Ok(ModelHandle {
            kind,
            name: location.file_name(),
            source: location.to_string(),
            size_bytes: content.len() as u64,
        })
    }
}
