//! [`Command`] definition.

pub mod authorize_session;
pub mod cancel_booking;
pub mod create_booking;
pub mod create_payment;
pub mod create_session;
pub mod delist_property;
pub mod list_property;
pub mod reconcile_booking;
pub mod reconcile_payment;
pub mod record_refund;
pub mod sync_property;
pub mod toggle_maintenance;
pub mod update_booking;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    authorize_session::AuthorizeSession, cancel_booking::CancelBooking,
    create_booking::CreateBooking, create_payment::CreatePayment,
    create_session::CreateSession, delist_property::DelistProperty,
    list_property::ListProperty,
    reconcile_booking::ReconcileBooking,
    reconcile_payment::ReconcilePayment, record_refund::RecordRefund,
    sync_property::SyncProperty, toggle_maintenance::ToggleMaintenance,
    update_booking::UpdateBooking,
};
