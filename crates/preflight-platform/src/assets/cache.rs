//! Asset locations and the download cache.

use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{PlatformError, PlatformResult};

/// A local file or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    Path(PathBuf),
    Url(String),
}

impl AssetLocation {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }

    /// Last path segment, used as the asset's display name.
    pub fn file_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Url(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|base| base.rsplit('/').find(|segment| !segment.is_empty()))
                .unwrap_or(url)
                .to_string(),
        }
    }
}

impl fmt::Display for AssetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// File name a URL is cached under. Distinct URLs with the same last
/// segment do not collide.
pub(crate) fn cache_key(url: &str) -> String {
    let hash = url
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3));
    let name: String = AssetLocation::Url(url.to_string())
        .file_name()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("{:016x}-{}", hash, name)
}

/// Downloads URL assets once and serves them from disk afterwards.
pub struct AssetCache {
    dir: PathBuf,
    client: Client,
}

impl AssetCache {
    pub fn new(dir: PathBuf, timeout: std::time::Duration) -> PlatformResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Client(e.to_string()))?;
        Ok(Self { dir, client })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cached_path(&self, url: &str) -> PathBuf {
        self.dir.join(cache_key(url))
    }

    /// Local file holding the asset, downloading it first if needed.
    pub async fn fetch(&self, location: &AssetLocation) -> PlatformResult<PathBuf> {
        match location {
            AssetLocation::Path(path) => {
                if tokio::fs::try_exists(path).await? {
                    Ok(path.clone())
                } else {
                    Err(PlatformError::NotFound(path.display().to_string()))
                }
            }
            AssetLocation::Url(url) => {
                let target = self.cached_path(url);
                if tokio::fs::try_exists(&target).await? {
                    tracing::debug!("Asset {} served from cache", url);
                    return Ok(target);
                }
                self.download(url, &target).await?;
                Ok(target)
            }
        }
    }

    async fn download(&self, url: &str, target: &Path) -> PlatformResult<()> {
        tracing::info!("Downloading asset {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(PlatformError::Http(format!("{} returned {}", url, status)));
        }
        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let partial = target.with_extension("part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, target).await?;
        tracing::info!("Cached {} ({} bytes)", url, bytes.len());
        Ok(())
    }

    /// Confirm the asset is obtainable without downloading it.
    pub async fn probe(&self, location: &AssetLocation) -> PlatformResult<String> {
        match location {
            AssetLocation::Path(path) => {
                if tokio::fs::try_exists(path).await? {
                    Ok(format!("{} present", path.display()))
                } else {
                    Err(PlatformError::NotFound(path.display().to_string()))
                }
            }
            AssetLocation::Url(url) => {
                if tokio::fs::try_exists(self.cached_path(url)).await? {
                    return Ok(format!("{} cached", location.file_name()));
                }
                let response = self.client.head(url).send().await?;
                if response.status().is_success() {
                    Ok(format!("{} reachable", location.file_name()))
                } else {
                    Err(PlatformError::Http(format!(
                        "{} returned {}",
                        url,
                        response.status()
                    )))
                }
            }
        }
    }
}
