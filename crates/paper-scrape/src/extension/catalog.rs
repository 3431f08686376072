//! Loader backed by a catalog of compiled-in extension entries.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ExtensionEntry, ExtensionLoader, ExtensionSource, LoadedPackage};
use crate::error::{ExtensionError, ExtensionResult};

/// The `package.json` fields the loader reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

struct CatalogEntry {
    version: String,
    entry: Arc<dyn ExtensionEntry>,
}

/// Resolves packages against registered entries.
///
/// A package identifier is looked up directly; a local path is read through
/// its `package.json` and resolved by the manifest's `name`. Installing
/// writes the manifest to `<working_dir>/<package>.json`, which is the
/// artifact reported as the package location.
pub struct CatalogLoader {
    working_dir: PathBuf,
    catalog: HashMap<String, CatalogEntry>,
}

impl CatalogLoader {
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self { working_dir: working_dir.into(), catalog: HashMap::new() }
    }

    /// Builder-style catalog entry.
    #[must_use]
    pub fn with_package(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        entry: Arc<dyn ExtensionEntry>,
    ) -> Self {
        self.catalog.insert(name.into(), CatalogEntry { version: version.into(), entry });
        self
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Artifact path of an installed package.
    #[must_use]
    pub fn location(&self, package: &str) -> PathBuf {
        self.working_dir.join(format!("{}.json", package.replace('/', "+")))
    }

    async fn read_manifest(path: &Path) -> ExtensionResult<PackageManifest> {
        let manifest_path =
            if tokio::fs::metadata(path).await?.is_dir() { path.join("package.json") } else { path.to_path_buf() };
        let text = tokio::fs::read_to_string(&manifest_path).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn write_artifact(&self, manifest: &PackageManifest) -> ExtensionResult<PathBuf> {
        let location = self.location(&manifest.name);
        tokio::fs::create_dir_all(&self.working_dir).await?;
        tokio::fs::write(&location, serde_json::to_vec_pretty(manifest)?).await?;
        Ok(location)
    }
}

impl std::fmt::Debug for CatalogLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut packages: Vec<&String> = self.catalog.keys().collect();
        packages.sort();
        f.debug_struct("CatalogLoader")
            .field("working_dir", &self.working_dir)
            .field("packages", &packages)
            .finish()
    }
}

#[async_trait]
impl ExtensionLoader for CatalogLoader {
    async fn load(&self, source: &ExtensionSource) -> ExtensionResult<LoadedPackage> {
        let manifest = match source {
            ExtensionSource::Package(name) => {
                let known = self
                    .catalog
                    .get(name)
                    .ok_or_else(|| ExtensionError::install(name, "package not found in catalog"))?;
                PackageManifest { name: name.clone(), version: known.version.clone() }
            }
            ExtensionSource::Local(path) => Self::read_manifest(path).await?,
        };

        let known = self.catalog.get(&manifest.name).ok_or_else(|| {
            ExtensionError::install(source.display(), format!("no entry for package {}", manifest.name))
        })?;

        // Reinstalling from the artifact itself must not rewrite it.
        let location = self.location(&manifest.name);
        let location = match source {
            ExtensionSource::Local(path) if *path == location => location,
            _ => self.write_artifact(&manifest).await?,
        };

        tracing::debug!(package = %manifest.name, location = %location.display(), "Loaded package");

        Ok(LoadedPackage {
            verified: manifest.version == known.version,
            name: manifest.name,
            version: manifest.version,
            location,
            entry: Arc::clone(&known.entry),
        })
    }

    async fn unload(&self, package: &str) -> ExtensionResult<()> {
        match tokio::fs::remove_file(self.location(package)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
