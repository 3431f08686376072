//! Installed-extension bookkeeping.

use std::collections::HashMap;
use std::ffi::OsString;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{ExtensionInstance, ExtensionLoader, ExtensionSource, LoadedPackage};
use crate::error::{ExtensionError, ExtensionResult, ScrapeError, ScrapeResult};
use crate::logging::{LogEvent, LogSink, TracingSink};
use crate::preferences::{PreferenceStore, ScraperPreferences};
use crate::record::PaperRecord;
use crate::scraper::{ScrapeContext, ScrapeOutcome, Scraper, ScraperRequest};

const LOG_TAG: &str = "extensionManager";

/// Author recorded when an extension does not name one.
pub const DEFAULT_AUTHOR: &str = "community";

/// A metadata field, marking whether the extension supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "camelCase")]
pub enum MetadataValue {
    Supplied(String),
    Defaulted(String),
}

impl MetadataValue {
    fn or_default(value: Option<String>, default: &str) -> Self {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Self::Supplied(v),
            _ => Self::Defaulted(default.to_string()),
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Supplied(v) | Self::Defaulted(v) => v,
        }
    }

    #[must_use]
    pub const fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted(_))
    }
}

/// Validated capability record of an installed extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInfo {
    pub id: String,
    /// Package the extension was loaded from.
    pub package: String,
    pub name: MetadataValue,
    pub version: String,
    pub author: MetadataValue,
    pub description: MetadataValue,
    pub verified: bool,
    /// Stored preferences of the extension at install time.
    pub preference: Map<String, Value>,
    /// Installed artifact.
    pub location: PathBuf,
    /// Local source the extension was installed from, when it differs from `location`.
    pub origin: Option<PathBuf>,
    pub can_dispose: bool,
    pub installed_at: DateTime<Utc>,
}

impl ExtensionInfo {
    fn validate(
        package: &LoadedPackage,
        source: &ExtensionSource,
        instance: &dyn ExtensionInstance,
        preferences: &dyn PreferenceStore,
    ) -> ExtensionResult<Self> {
        let metadata = std::panic::catch_unwind(AssertUnwindSafe(|| instance.metadata()))
            .map_err(|_| ExtensionError::invalid_metadata(&package.name, "metadata() panicked"))?;

        let id = metadata.id.trim().to_string();
        if id.is_empty() {
            return Err(ExtensionError::invalid_metadata(&package.name, "extension id is empty"));
        }

        let origin = match source {
            ExtensionSource::Local(path) if *path != package.location => Some(path.clone()),
            _ => None,
        };

        Ok(Self {
            preference: preferences.extension(&id),
            id,
            package: package.name.clone(),
            name: MetadataValue::or_default(metadata.name, &package.name),
            version: package.version.clone(),
            author: MetadataValue::or_default(metadata.author, DEFAULT_AUTHOR),
            description: MetadataValue::or_default(metadata.description, ""),
            verified: package.verified,
            location: package.location.clone(),
            origin,
            can_dispose: instance.can_dispose(),
            installed_at: Utc::now(),
        })
    }
}

struct Installed {
    instance: Arc<dyn ExtensionInstance>,
    info: ExtensionInfo,
}

/// Installs, reloads and dispatches to extensions.
///
/// Every failure is reported to the log sink before being returned; panics
/// inside extension code are caught and turned into errors.
pub struct ExtensionManager {
    loader: Arc<dyn ExtensionLoader>,
    preferences: Arc<dyn PreferenceStore>,
    log: Arc<dyn LogSink>,
    installed: RwLock<HashMap<String, Installed>>,
}

impl ExtensionManager {
    #[must_use]
    pub fn new(loader: Arc<dyn ExtensionLoader>) -> Self {
        Self {
            loader,
            preferences: Arc::new(ScraperPreferences::new()),
            log: Arc::new(TracingSink),
            installed: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = preferences;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    /// Install from a local path or a package identifier.
    pub async fn install(&self, source: &str) -> ExtensionResult<ExtensionInfo> {
        self.install_source(&ExtensionSource::parse(source)).await
    }

    pub async fn install_source(&self, source: &ExtensionSource) -> ExtensionResult<ExtensionInfo> {
        let result = self.try_install(source).await;
        match &result {
            Ok(info) => self.log.log(LogEvent::info(
                format!("Installed extension {} ({})", info.id, source.display()),
                LOG_TAG,
            )),
            Err(err) => self.log.log(LogEvent::error(
                format!("Failed to install extension {}", source.display()),
                err,
                LOG_TAG,
            )),
        }
        result
    }

    async fn try_install(&self, source: &ExtensionSource) -> ExtensionResult<ExtensionInfo> {
        let package = self.loader.load(source).await?;

        let (instance, info) = match self.activate(&package, source).await {
            Ok(activated) => activated,
            Err(err) => {
                if let Err(unload) = self.loader.unload(&package.name).await {
                    tracing::debug!(package = %package.name, error = %unload, "Cleanup after failed install");
                }
                return Err(err);
            }
        };

        let mut installed = self.installed.write().await;
        if installed.contains_key(&info.id) {
            tracing::warn!(id = %info.id, "Replacing an installed extension with the same id");
        }
        installed.insert(info.id.clone(), Installed { instance, info: info.clone() });
        Ok(info)
    }

    async fn activate(
        &self,
        package: &LoadedPackage,
        source: &ExtensionSource,
    ) -> ExtensionResult<(Arc<dyn ExtensionInstance>, ExtensionInfo)> {
        let instance = AssertUnwindSafe(package.entry.initialize())
            .catch_unwind()
            .await
            .map_err(|_| ExtensionError::install(&package.name, "initialize() panicked"))??;

        let info = ExtensionInfo::validate(package, source, instance.as_ref(), self.preferences.as_ref())?;
        Ok((instance, info))
    }

    /// Dispose (if supported) and remove an extension.
    ///
    /// A failing `dispose()` is logged and does not stop the removal.
    pub async fn uninstall(&self, id: &str) -> ExtensionResult<()> {
        let result = self.try_uninstall(id).await;
        match &result {
            Ok(()) => self.log.log(LogEvent::info(format!("Uninstalled extension {id}"), LOG_TAG)),
            Err(err) => self.log.log(LogEvent::error(
                format!("Failed to uninstall extension {id}"),
                err,
                LOG_TAG,
            )),
        }
        result
    }

    async fn try_uninstall(&self, id: &str) -> ExtensionResult<()> {
        let removed = self
            .installed
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ExtensionError::NotInstalled(id.to_string()))?;

        if removed.instance.can_dispose() {
            let disposed = AssertUnwindSafe(removed.instance.dispose())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ExtensionError::method_failed(id, "dispose", "panicked")));
            if let Err(err) = disposed {
                self.log.log(LogEvent::warn(format!("Extension {id} failed to dispose: {err}"), LOG_TAG));
            }
        }

        self.loader.unload(&removed.info.package).await
    }

    /// Uninstall and install again.
    ///
    /// Extensions installed from a local source are reinstalled from it.
    /// Otherwise the installed artifact is backed up to `<location>.bak`,
    /// linked back after the uninstall, and reinstalled from there.
    pub async fn reload(&self, id: &str) -> ExtensionResult<ExtensionInfo> {
        let result = self.try_reload(id).await;
        if let Err(err) = &result {
            self.log.log(LogEvent::error(format!("Failed to reload extension {id}"), err, LOG_TAG));
        }
        result
    }

    async fn try_reload(&self, id: &str) -> ExtensionResult<ExtensionInfo> {
        let info = self.info(id).await.ok_or_else(|| ExtensionError::NotInstalled(id.to_string()))?;

        if let Some(origin) = info.origin {
            self.uninstall(id).await?;
            return self.install_source(&ExtensionSource::Local(origin)).await;
        }

        let location = info.location;
        let backup = backup_path(&location);
        tokio::fs::copy(&location, &backup).await?;
        self.uninstall(id).await?;

        if tokio::fs::try_exists(&location).await? {
            tokio::fs::remove_file(&location).await?;
        }
        tokio::fs::hard_link(&backup, &location).await?;

        let result = self.install_source(&ExtensionSource::Local(location)).await;
        if let Err(err) = tokio::fs::remove_file(&backup).await {
            tracing::debug!(backup = %backup.display(), error = %err, "Backup left in place");
        }
        result
    }

    /// Reload every installed extension, in id order.
    ///
    /// Returns the extensions that came back; failures are logged.
    pub async fn reload_all(&self) -> Vec<ExtensionInfo> {
        let mut ids: Vec<String> = self.installed.read().await.keys().cloned().collect();
        ids.sort();

        let mut reloaded = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(info) = self.reload(&id).await {
                reloaded.push(info);
            }
        }
        reloaded
    }

    /// Installed extensions, sorted by id.
    pub async fn installed(&self) -> Vec<ExtensionInfo> {
        let mut infos: Vec<ExtensionInfo> =
            self.installed.read().await.values().map(|i| i.info.clone()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub async fn info(&self, id: &str) -> Option<ExtensionInfo> {
        self.installed.read().await.get(id).map(|i| i.info.clone())
    }

    /// Invoke `method` on an installed extension.
    pub async fn call_method(&self, id: &str, method: &str, args: Vec<Value>) -> ExtensionResult<Value> {
        let instance = self.installed.read().await.get(id).map(|i| Arc::clone(&i.instance));

        let result = match instance {
            None => Err(ExtensionError::NotInstalled(id.to_string())),
            Some(instance) => AssertUnwindSafe(instance.call(method, args))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(ExtensionError::method_failed(id, method, "panicked"))),
        };

        if let Err(err) = &result {
            self.log.log(LogEvent::error(
                format!("Failed to call extension method {method} of extension {id}"),
                err,
                LOG_TAG,
            ));
        }
        result
    }

    /// Sources contributed by installed extensions, sorted by extension id.
    pub async fn scrapers(&self) -> Vec<Arc<dyn Scraper>> {
        let installed = self.installed.read().await;
        let mut ids: Vec<&String> = installed.keys().collect();
        ids.sort();

        ids.into_iter()
            .filter_map(|id| {
                let scraper = installed.get(id)?.instance.scraper()?;
                Some(Arc::new(ExtensionScraper::new(id.clone(), scraper)) as Arc<dyn Scraper>)
            })
            .collect()
    }
}

impl std::fmt::Debug for ExtensionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionManager").finish_non_exhaustive()
    }
}

fn backup_path(location: &Path) -> PathBuf {
    let mut backup = OsString::from(location.as_os_str());
    backup.push(".bak");
    PathBuf::from(backup)
}

/// Source contributed by an extension.
///
/// Behaves like the wrapped source, except that a panic during a run is
/// reported as [`ScrapeError::Extension`].
pub struct ExtensionScraper {
    extension_id: String,
    inner: Arc<dyn Scraper>,
}

impl ExtensionScraper {
    #[must_use]
    pub fn new(extension_id: impl Into<String>, inner: Arc<dyn Scraper>) -> Self {
        Self { extension_id: extension_id.into(), inner }
    }

    #[must_use]
    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }
}

#[async_trait::async_trait]
impl Scraper for ExtensionScraper {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn pre_process(&self, record: &PaperRecord, preferences: &dyn PreferenceStore) -> ScraperRequest {
        self.inner.pre_process(record, preferences)
    }

    fn mirror_host(&self) -> Option<&str> {
        self.inner.mirror_host()
    }

    fn parse(&self, body: &str, record: &mut PaperRecord) {
        self.inner.parse(body, record);
    }

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        record: &mut PaperRecord,
        force: bool,
    ) -> ScrapeResult<ScrapeOutcome> {
        AssertUnwindSafe(self.inner.scrape(ctx, record, force)).catch_unwind().await.unwrap_or_else(|_| {
            Err(ScrapeError::extension(&self.extension_id, format!("source {} panicked", self.inner.name())))
        })
    }
}
