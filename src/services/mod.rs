pub mod generator;
pub mod ingest;

pub use generator::{CustomerProfile, RandomTransactionGenerator, TransactionGenerator};
pub use ingest::{IngestService, PoolSettings};
