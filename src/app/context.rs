use std::path::PathBuf;
use std::sync::Arc;

use crate::app::Result;
use crate::config::Config;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::refresh::Refresher;
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::store::{FileStore, StoreConfig};

pub struct AppContext {
    pub store: Arc<FileStore>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub refresher: Refresher,
    pub normalizer: Normalizer,
    pub config: Config,
}

impl AppContext {
    /// Wire the store and an HTTP fetcher from `config`.
    pub fn new(config: Config, data_dir: Option<PathBuf>) -> Result<Self> {
        let store_config = config.store_config(data_dir)?;
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new()?);
        Ok(Self::with_fetcher(config, store_config, fetcher))
    }

    pub fn with_fetcher(
        config: Config,
        store_config: StoreConfig,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
    ) -> Self {
        let store = Arc::new(FileStore::new(store_config));
        let refresher = Refresher::with_workers(fetcher.clone(), config.daemon.workers);

        Self {
            store,
            fetcher,
            refresher,
            normalizer: Normalizer::new(),
            config,
        }
    }
}
