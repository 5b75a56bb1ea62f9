//! Application state management

use std::sync::Arc;

use crate::auth::{Credentials, TokenStore};
use crate::config::Config;
use crate::library::{Catalog, FilesystemCatalog, MediaLibrary, StoreCatalog};
use crate::upload::ChunkAssembler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    credentials: Credentials,
    tokens: TokenStore,
    library: MediaLibrary,
}

impl AppState {
    /// Build the state around an already selected catalog
    pub fn new(config: Config, catalog: Arc<dyn Catalog>) -> Self {
        let assembler = ChunkAssembler::new(config.storage.staging_root.clone());
        let library = MediaLibrary::new(config.storage.media_root.clone(), assembler, catalog);

        Self {
            inner: Arc::new(AppStateInner {
                credentials: Credentials::new(&config.auth.username, &config.auth.key),
                tokens: TokenStore::with_ttl_hours(config.auth.token_ttl_hours),
                library,
                config,
            }),
        }
    }

    /// Connect the document store if one is configured, otherwise (or if
    /// the connection fails) catalog straight from the media directory.
    pub async fn connect(config: Config) -> Self {
        let catalog: Arc<dyn Catalog> = match &config.database.url {
            Some(url) => match crate::db::create_pool(url).await {
                Ok(pool) => {
                    tracing::info!("Document store connected at {}", url);
                    Arc::new(StoreCatalog::new(pool))
                }
                Err(e) => {
                    tracing::error!(
                        "Document store not connected: {}. Falling back to directory listing",
                        e
                    );
                    Arc::new(FilesystemCatalog::new(config.storage.media_root.clone()))
                }
            },
            None => {
                tracing::warn!("DATABASE_URL not set. Catalog limited to directory listing");
                Arc::new(FilesystemCatalog::new(config.storage.media_root.clone()))
            }
        };

        Self::new(config, catalog)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the login credentials
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    /// Get the session token store
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// Get the media library
    pub fn library(&self) -> &MediaLibrary {
        &self.inner.library
    }
}
