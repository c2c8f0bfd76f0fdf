//! [`Booking`]-related read definitions.

use crate::domain::{booking, Address};
#[cfg(doc)]
use crate::domain::Booking;

/// Selector of [`Booking`]s placed by a tenant, most recent first.
#[derive(Clone, Debug)]
pub struct TenantBookings {
    /// [`Address`] of the tenant.
    pub tenant: Address,

    /// [`booking::Status`] to narrow the selection to, if any.
    pub status: Option<booking::Status>,
}

/// Selector of [`booking::Status::Pending`] [`Booking`]s created before the
/// provided deadline.
#[derive(Clone, Copy, Debug)]
pub struct PendingBefore(pub booking::CreationDateTime);

/// Sweep of [`Booking`]s whose lease elapsed before the provided deadline.
///
/// Transitions them to [`booking::Status::Expired`] and releases their
/// properties in a single atomic statement.
#[derive(Clone, Copy, Debug)]
pub struct Expiry(pub booking::LeaseEndDateTime);
