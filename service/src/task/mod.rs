//! Background [`Task`]s definitions.

mod background;
pub mod expire_leases;
pub mod reconcile_pending;

pub use common::Handler as Task;

pub use self::{
    background::Background, expire_leases::ExpireLeases,
    reconcile_pending::ReconcilePending,
};
