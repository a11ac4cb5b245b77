use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::db::{MirrorStore, SyncQueueStore};
use crate::mapper::ProductMapper;
use crate::provider::ProviderApi;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub queue: Arc<dyn SyncQueueStore>,
    pub mirror: Arc<dyn MirrorStore>,
    pub provider: Arc<dyn ProviderApi>,
    pub mapper: Arc<ProductMapper>,
}
