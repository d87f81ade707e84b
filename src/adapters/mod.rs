pub mod memory;
pub mod postgres_dead_letter_sink;
pub mod postgres_transaction_store;
pub mod retrying_store;

pub use memory::{LogDeadLetterSink, MemoryDeadLetterSink, MemoryTransactionStore};
pub use postgres_dead_letter_sink::PgDeadLetterSink;
pub use postgres_transaction_store::PgTransactionStore;
pub use retrying_store::RetryingStore;
