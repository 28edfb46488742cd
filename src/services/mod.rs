pub mod memory_store;
pub mod pg_store;
pub mod store;

pub use memory_store::InMemoryMessageStore;
pub use pg_store::PgMessageStore;
pub use store::{MessageStore, SharedStore, StoreError};
