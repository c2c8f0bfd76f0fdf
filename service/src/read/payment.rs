//! [`Payment`]-related read definitions.

use derive_more::{Deref, From, Into};

use crate::domain::{payment, Payment};
#[cfg(doc)]
use crate::domain::Booking;

/// [`Payment`] history of a [`Booking`], most recent first.
#[derive(Clone, Debug, Deref, From)]
pub struct History(pub Vec<Payment>);

/// Number of rent periods of a [`Booking`] already covered by
/// [`payment::Status::Confirmed`] [`payment::Kind::Rent`] payments.
#[derive(Clone, Copy, Debug, Eq, From, Into, PartialEq)]
pub struct PaidPeriods(pub u32);

/// Selector of [`payment::Status::Pending`] [`Payment`]s created before the
/// provided deadline.
#[derive(Clone, Copy, Debug)]
pub struct PendingBefore(pub payment::CreationDateTime);
