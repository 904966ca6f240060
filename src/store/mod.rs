pub mod balance_repository;
pub mod cursor_repository;
pub mod database;
pub mod delta_repository;
pub mod models;

pub use balance_repository::{BalanceRepository, Holder, HolderPage};
pub use cursor_repository::CursorRepository;
pub use database::Database;
pub use delta_repository::DeltaRepository;
pub use models::{Delta, SignedAmount};
