//! Shared request state

use std::sync::Arc;

use burrow_kernel::{ConfigStore, FileSystem, JailedFs};

/// State handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub fs: Arc<dyn FileSystem>,
}

impl AppState {
    /// State backed by a [`JailedFs`] over `store`.
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let fs = Arc::new(JailedFs::new(Arc::clone(&store)));
        Self { store, fs }
    }

    pub fn with_fs(store: Arc<ConfigStore>, fs: Arc<dyn FileSystem>) -> Self {
        Self { store, fs }
    }
}
