//! GitHub release fetcher: a thin async client over the GitHub REST API for
//! locating and downloading firmware release assets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ReleaseFetchError;

const GITHUB_API_BASE: &str = "https://api.github.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub body: Option<String>,
    pub prerelease: bool,
    pub assets: Vec<Asset>,
    pub zipball_url: String,
    pub tarball_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    pub size: u64,
}

impl Release {
    /// GitHub's `prerelease` flag, plus the `pre-` tag-name convention some
    /// projects use without setting the flag.
    fn is_prerelease(&self) -> bool {
        self.prerelease || self.tag_name.to_lowercase().starts_with("pre-")
    }
}

pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }
}

pub struct GitHubReleases {
    owner: String,
    repo: String,
    client: reqwest::Client,
}

impl GitHubReleases {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self, ReleaseFetchError> {
        let client = reqwest::Client::builder()
            .user_agent("motion-host")
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self { owner: owner.into(), repo: repo.into(), client })
    }

    fn repo_url(&self, endpoint: &str) -> String {
        format!("{GITHUB_API_BASE}/repos/{}/{}{endpoint}", self.owner, self.repo)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> Result<T, ReleaseFetchError> {
        let url = self.repo_url(endpoint);
        debug!(url, "fetching from GitHub");
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn get_all_releases(&self, include_prerelease: bool) -> Result<Vec<Release>, ReleaseFetchError> {
        let releases: Vec<Release> = self.get_json("/releases").await?;
        if include_prerelease {
            return Ok(releases);
        }
        Ok(releases.into_iter().filter(|r| !r.is_prerelease()).collect())
    }

    pub async fn get_latest_release(&self, include_prerelease: bool) -> Result<Release, ReleaseFetchError> {
        if include_prerelease {
            return self.get_json("/releases/latest").await;
        }
        let releases = self.get_all_releases(false).await?;
        releases.into_iter().next().ok_or_else(|| ReleaseFetchError::NoReleases {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
        })
    }

    pub async fn get_release_by_tag(&self, tag: &str) -> Result<Release, ReleaseFetchError> {
        self.get_json(&format!("/releases/tags/{tag}")).await
    }

    pub async fn get_release_notes(&self, tag: &str) -> Result<Option<String>, ReleaseFetchError> {
        Ok(self.get_release_by_tag(tag).await?.body)
    }

    pub fn get_asset_list<'a>(&self, release: &'a Release, extension: Option<&str>) -> Vec<&'a Asset> {
        let Some(extension) = extension else {
            return release.assets.iter().collect();
        };
        let ext = if extension.starts_with('.') {
            extension.to_lowercase()
        } else {
            format!(".{}", extension.to_lowercase())
        };
        release
            .assets
            .iter()
            .filter(|a| a.name.to_lowercase().ends_with(&ext))
            .collect()
    }

    /// Streams `asset_name` from `release` into `output_dir/asset_name`,
    /// creating the directory if needed.
    pub async fn download_asset(
        &self,
        release: &Release,
        asset_name: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, ReleaseFetchError> {
        let asset = release
            .assets
            .iter()
            .find(|a| a.name == asset_name)
            .ok_or_else(|| ReleaseFetchError::AssetNotFound(asset_name.to_string()))?;

        tokio::fs::create_dir_all(output_dir).await?;
        let out_path = output_dir.join(asset_name);

        info!(asset = asset_name, size = asset.size, "downloading release asset");
        let response = self.client.get(&asset.browser_download_url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        tokio::fs::write(&out_path, &bytes).await?;
        Ok(out_path)
    }

    pub async fn download_source_archive(
        &self,
        release: &Release,
        format: ArchiveFormat,
        output_dir: &Path,
    ) -> Result<PathBuf, ReleaseFetchError> {
        let url = match format {
            ArchiveFormat::Zip => &release.zipball_url,
            ArchiveFormat::TarGz => &release.tarball_url,
        };

        tokio::fs::create_dir_all(output_dir).await?;
        let filename = format!("{}-{}.{}", self.repo, release.tag_name, format.extension());
        let out_path = output_dir.join(filename);

        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        tokio::fs::write(&out_path, &bytes).await?;
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str, prerelease: bool) -> Release {
        Release {
            tag_name: tag.to_string(),
            name: None,
            body: None,
            prerelease,
            assets: vec![
                Asset { name: "firmware.bin".to_string(), browser_download_url: "x".to_string(), size: 10 },
                Asset { name: "notes.txt".to_string(), browser_download_url: "y".to_string(), size: 1 },
            ],
            zipball_url: "zip".to_string(),
            tarball_url: "tar".to_string(),
        }
    }

    #[test]
    fn flags_pre_tagged_releases_even_without_the_prerelease_flag() {
        assert!(release("pre-1.4.0", false).is_prerelease());
        assert!(release("1.4.0", true).is_prerelease());
        assert!(!release("1.4.0", false).is_prerelease());
    }

    #[test]
    fn asset_list_filters_by_extension_case_insensitively() {
        let r = release("1.0.0", false);
        let client = GitHubReleases {
            owner: "o".to_string(),
            repo: "r".to_string(),
            client: reqwest::Client::new(),
        };
        let filtered = client.get_asset_list(&r, Some("BIN"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "firmware.bin");
    }

    #[test]
    fn asset_list_with_no_extension_returns_everything() {
        let r = release("1.0.0", false);
        let client = GitHubReleases {
            owner: "o".to_string(),
            repo: "r".to_string(),
            client: reqwest::Client::new(),
        };
        assert_eq!(client.get_asset_list(&r, None).len(), 2);
    }
}
