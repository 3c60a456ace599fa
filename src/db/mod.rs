pub mod audit_log;
pub mod catalog;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod weather_store;

pub use self::audit_log::{AuditSink, PgAuditLog};
pub use self::catalog::{ClothingCatalog, PgClothingCatalog};
pub use self::memory::{InMemoryAuditSink, InMemoryClothingCatalog, InMemoryWeatherStore};
pub use self::postgres::{create_pool, run_migrations};
pub use self::redis::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
pub use self::weather_store::{PgWeatherStore, WeatherStore};
