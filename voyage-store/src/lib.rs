pub mod app_config;
pub mod database;
pub mod error;
pub mod event_repo;
pub mod memory;
pub mod offer_repo;
pub mod redis_repo;

pub use database::DbClient;
pub use event_repo::PgEventRepository;
pub use memory::MemoryStore;
pub use offer_repo::PgOfferSetRepository;
pub use redis_repo::RedisClient;
