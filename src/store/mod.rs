//! Record store: the system-of-record the dispatcher hydrates entities from

pub mod models;
mod postgres;
pub mod traits;

pub use models::*;
pub use postgres::PgRecordStore;
pub use traits::RecordStore;

#[cfg(test)]
pub(crate) mod mock;
