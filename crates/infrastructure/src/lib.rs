pub mod in_memory;
pub mod postgres_store;
pub mod redis_store;

pub use in_memory::{InMemoryBroadcaster, InMemoryEventQueue};
pub use postgres_store::PostgresEventStore;
pub use redis_store::{connect_redis, RedisBroadcaster, RedisEventQueue};
