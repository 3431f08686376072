//! Extension lifecycle: install, uninstall, reload and method dispatch.
//!
//! Extensions are resolved by an [`ExtensionLoader`] into an
//! [`ExtensionEntry`], whose `initialize()` yields a live
//! [`ExtensionInstance`]. The [`ExtensionManager`] validates the instance's
//! metadata once into an [`ExtensionInfo`] and keeps both until uninstall.

mod catalog;
mod manager;

pub use catalog::{CatalogLoader, PackageManifest};
pub use manager::{ExtensionInfo, ExtensionManager, ExtensionScraper, MetadataValue};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExtensionResult;
use crate::scraper::Scraper;

/// Where an extension is installed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionSource {
    /// A package directory or manifest on disk.
    Local(PathBuf),
    /// A package identifier resolved by the loader.
    Package(String),
}

impl ExtensionSource {
    /// Classify a user-supplied source string.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        if is_local_path(source) {
            let path = source.strip_prefix("file://").unwrap_or(source);
            Self::Local(PathBuf::from(path))
        } else {
            Self::Package(source.to_string())
        }
    }

    /// Display form used in log messages.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Package(name) => name.clone(),
        }
    }
}

impl From<&Path> for ExtensionSource {
    fn from(path: &Path) -> Self {
        Self::Local(path.to_path_buf())
    }
}

/// Whether `source` names a filesystem location rather than a package.
#[must_use]
pub fn is_local_path(source: &str) -> bool {
    let bytes = source.as_bytes();
    let windows_drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');

    source.starts_with('/')
        || source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with("~/")
        || source.starts_with("file://")
        || source.starts_with("\\\\")
        || windows_drive
}

/// Metadata an instance reports about itself. Every field but `id` is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionMetadata {
    pub id: String,
    pub name: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
}

/// A live, initialized extension.
#[async_trait]
pub trait ExtensionInstance: Send + Sync {
    fn metadata(&self) -> ExtensionMetadata;

    /// Invoke a named method.
    ///
    /// Unknown names yield [`crate::error::ExtensionError::MethodNotFound`].
    async fn call(&self, method: &str, args: Vec<Value>) -> ExtensionResult<Value>;

    /// Whether [`Self::dispose`] does anything.
    fn can_dispose(&self) -> bool {
        false
    }

    async fn dispose(&self) -> ExtensionResult<()> {
        Ok(())
    }

    /// Metadata source contributed by this extension, if any.
    fn scraper(&self) -> Option<Arc<dyn Scraper>> {
        None
    }
}

/// Entry point of a loaded package.
#[async_trait]
pub trait ExtensionEntry: Send + Sync {
    async fn initialize(&self) -> ExtensionResult<Arc<dyn ExtensionInstance>>;
}

/// A package resolved by a loader, not yet initialized.
#[derive(Clone)]
pub struct LoadedPackage {
    pub name: String,
    pub version: String,
    /// Installed artifact inside the loader's working directory.
    pub location: PathBuf,
    /// Whether the loader vouches for the package.
    pub verified: bool,
    pub entry: Arc<dyn ExtensionEntry>,
}

impl std::fmt::Debug for LoadedPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPackage")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("location", &self.location)
            .finish()
    }
}

/// Resolves and removes packages.
#[async_trait]
pub trait ExtensionLoader: Send + Sync {
    async fn load(&self, source: &ExtensionSource) -> ExtensionResult<LoadedPackage>;

    /// Remove an installed package's artifact.
    async fn unload(&self, package: &str) -> ExtensionResult<()>;
}
