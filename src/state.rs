use crate::{bus::EventBus, config::AppConfig, db::DbPool, kv::KvStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub kv: KvStore,
    pub bus: EventBus,
    pub config: AppConfig,
}
