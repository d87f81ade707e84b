pub mod enums;
pub mod transaction;

pub use enums::{Category, Currency, Merchant};
pub use transaction::Transaction;
