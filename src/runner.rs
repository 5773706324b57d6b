use log::warn;
use thiserror::Error;

use crate::bindings::{Binding, BindingTable, TABLE_VERSION};
use crate::dataset::Dataset;
use crate::format::CurrencyFormat;
use crate::loader::{CacheWrite, Loader, RefreshPolicy, DEFAULT_DATA_KEY, DEFAULT_VERSION_KEY};
use crate::page::{IconRenderer, Page};
use crate::render::{RenderOutcome, Renderer, DEFAULT_NEGATIVE_CLASS, DEFAULT_NEUTRAL_MARKERS};
use crate::store::KeyValueStore;

#[derive(Clone, Debug)]
pub struct Options {
    pub data_key: String,
    pub version_key: String,
    pub version: String,
    pub refresh: RefreshPolicy,
    pub decimals: u8,
    pub negative_class: String,
    pub neutral_markers: Vec<String>,
    pub extra_bindings: Vec<Binding>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            data_key: DEFAULT_DATA_KEY.to_string(),
            version_key: DEFAULT_VERSION_KEY.to_string(),
            version: TABLE_VERSION.to_string(),
            refresh: RefreshPolicy::default(),
            decimals: 0,
            negative_class: DEFAULT_NEGATIVE_CLASS.to_string(),
            neutral_markers: DEFAULT_NEUTRAL_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            extra_bindings: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid decimals {value}, expected 0 or 2")]
    InvalidDecimals { value: u8 },

    #[error("storage key must not be empty")]
    EmptyKey,

    #[error("data key and version key must differ (both '{key}')")]
    SharedKey { key: String },

    #[error("negative class must be a single non-empty class name")]
    InvalidNegativeClass,

    #[error("binding '{id}' has an empty element id or path")]
    InvalidBinding { id: String },
}

/// The result of one page load: what happened to the cache, then what the
/// renderer did with the snapshot read back from it.
#[derive(Clone, Debug)]
pub struct PageLoadReport {
    pub cache: CacheWrite,
    pub outcome: RenderOutcome,
}

#[derive(Clone, Debug)]
pub struct Runner {
    loader: Loader,
    renderer: Renderer,
    table: BindingTable,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        if options.decimals != 0 && options.decimals != 2 {
            return Err(RunnerError::InvalidDecimals {
                value: options.decimals,
            });
        }
        if options.data_key.trim().is_empty() || options.version_key.trim().is_empty() {
            return Err(RunnerError::EmptyKey);
        }
        if options.data_key == options.version_key {
            return Err(RunnerError::SharedKey {
                key: options.data_key,
            });
        }
        let class = options.negative_class.trim();
        if class.is_empty() || class.contains(char::is_whitespace) {
            return Err(RunnerError::InvalidNegativeClass);
        }
        for binding in options.extra_bindings.iter() {
            let bad_path = match &binding.source {
                crate::bindings::Source::Path { path, .. } => path.trim().is_empty(),
                crate::bindings::Source::Extract(_) => false,
            };
            if binding.id.trim().is_empty() || bad_path {
                return Err(RunnerError::InvalidBinding {
                    id: binding.id.clone(),
                });
            }
        }

        let loader = Loader {
            data_key: options.data_key,
            version_key: options.version_key,
            version: options.version,
            policy: options.refresh,
        };
        let renderer = Renderer {
            currency: CurrencyFormat::with_decimals(options.decimals),
            negative_class: class.to_string(),
            neutral_markers: options.neutral_markers,
        };
        let table = BindingTable::standard().with_extra(options.extra_bindings);
        Ok(Self {
            loader,
            renderer,
            table,
        })
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    /// Cache `source` (when given), read the snapshot back and bind it.
    pub fn page_load(
        &self,
        store: &mut dyn KeyValueStore,
        source: Option<&Dataset>,
        page: &mut dyn Page,
        icons: Option<&mut dyn IconRenderer>,
    ) -> PageLoadReport {
        let loaded = self.loader.load(store, source);
        let outcome = self
            .renderer
            .render(loaded.dataset.as_ref(), &self.table, page, icons);
        PageLoadReport {
            cache: loaded.write,
            outcome,
        }
    }

    /// Bind whatever is cached, without touching the store.
    pub fn render_cached(
        &self,
        store: &dyn KeyValueStore,
        page: &mut dyn Page,
        icons: Option<&mut dyn IconRenderer>,
    ) -> RenderOutcome {
        let dataset = match self.loader.read_cached(store) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!("could not read cached snapshot: {e}");
                None
            }
        };
        self.renderer
            .render(dataset.as_ref(), &self.table, page, icons)
    }
}
