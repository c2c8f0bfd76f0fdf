//! Infrastructure layer.

pub mod database;
pub mod ledger;

pub use self::{database::Database, ledger::Ledger};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
