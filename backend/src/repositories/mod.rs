pub mod repository;
pub mod transaction;
pub mod user;

pub use repository::{Entity, EntityFields, Repository, SqlValue};
pub use transaction::{TransactionRunner, TxFuture};
pub use user::UserRepository;
