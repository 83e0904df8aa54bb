pub mod mem;
pub mod postgres;
pub mod records;
pub mod traits;

pub use mem::MemoryStore;
pub use postgres::PostgresStore;
pub use traits::*;
