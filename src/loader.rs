use log::{debug, info, warn};
use thiserror::Error;

use crate::bindings::TABLE_VERSION;
use crate::dataset::Dataset;
use crate::store::{KeyValueStore, StoreError};

pub const DEFAULT_DATA_KEY: &str = "lidea_db_v1";
pub const DEFAULT_VERSION_KEY: &str = "lidea_version";

/// When a source dataset is copied over the cached snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Overwrite on every load.
    #[default]
    Always,
    /// Write only when nothing is cached yet.
    IfAbsent,
    /// Write when nothing is cached or the cached version marker differs.
    IfStale,
}

impl RefreshPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "always" => Some(Self::Always),
            "if-absent" | "absent" => Some(Self::IfAbsent),
            "if-stale" | "stale" | "versioned" => Some(Self::IfStale),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::IfAbsent => "if-absent",
            Self::IfStale => "if-stale",
        }
    }
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to serialize dataset: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to the cached snapshot during a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheWrite {
    Written,
    Kept,
    NoSource,
    Failed,
}

impl CacheWrite {
    pub fn label(self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Kept => "kept",
            Self::NoSource => "no-source",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoadOutcome {
    pub write: CacheWrite,
    pub dataset: Option<Dataset>,
}

#[derive(Clone, Debug)]
pub struct Loader {
    pub data_key: String,
    pub version_key: String,
    pub version: String,
    pub policy: RefreshPolicy,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            data_key: DEFAULT_DATA_KEY.to_string(),
            version_key: DEFAULT_VERSION_KEY.to_string(),
            version: TABLE_VERSION.to_string(),
            policy: RefreshPolicy::default(),
        }
    }
}

impl Loader {
    /// Copies `source` into the store according to the refresh policy.
    pub fn refresh(
        &self,
        store: &mut dyn KeyValueStore,
        source: Option<&Dataset>,
    ) -> Result<CacheWrite, LoaderError> {
        let Some(dataset) = source else {
            warn!("dataset source not found, using cached snapshot");
            return Ok(CacheWrite::NoSource);
        };
        if !self.needs_write(store)? {
            debug!(
                "cached snapshot under '{}' kept (policy {})",
                self.data_key,
                self.policy.label()
            );
            return Ok(CacheWrite::Kept);
        }
        let json = serde_json::to_string(dataset).map_err(|source| LoaderError::Serialize { source })?;
        store.set(&self.data_key, &json)?;
        store.set(&self.version_key, &self.version)?;
        info!(
            "dataset cached under '{}' (version {})",
            self.data_key, self.version
        );
        Ok(CacheWrite::Written)
    }

    /// Reads the cached snapshot back. A malformed snapshot counts as absent.
    pub fn read_cached(&self, store: &dyn KeyValueStore) -> Result<Option<Dataset>, LoaderError> {
        let Some(raw) = store.get(&self.data_key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Dataset>(&raw) {
            Ok(dataset) => Ok(Some(dataset)),
            Err(e) => {
                warn!("cached snapshot under '{}' is malformed: {e}", self.data_key);
                Ok(None)
            }
        }
    }

    /// Refresh then read back. Never fails: store errors are logged and the
    /// outcome simply carries no dataset.
    pub fn load(&self, store: &mut dyn KeyValueStore, source: Option<&Dataset>) -> LoadOutcome {
        let write = match self.refresh(store, source) {
            Ok(write) => write,
            Err(e) => {
                warn!("could not cache dataset: {e}");
                CacheWrite::Failed
            }
        };
        let dataset = match self.read_cached(store) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!("could not read cached snapshot: {e}");
                None
            }
        };
        LoadOutcome { write, dataset }
    }

    pub fn cached_version(&self, store: &dyn KeyValueStore) -> Result<Option<String>, LoaderError> {
        Ok(store.get(&self.version_key)?)
    }

    fn needs_write(&self, store: &dyn KeyValueStore) -> Result<bool, LoaderError> {
        Ok(match self.policy {
            RefreshPolicy::Always => true,
            RefreshPolicy::IfAbsent => store.get(&self.data_key)?.is_none(),
            RefreshPolicy::IfStale => {
                store.get(&self.data_key)?.is_none()
                    || store.get(&self.version_key)?.as_deref() != Some(self.version.as_str())
            }
        })
    }
}
