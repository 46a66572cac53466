pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;
pub use traits::*;
