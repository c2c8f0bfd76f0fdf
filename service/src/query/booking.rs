//! [`Query`] collection related to a single [`Booking`].

use common::operations::By;

use crate::{
    domain::{booking, Booking},
    read,
};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Booking`] by its [`booking::Id`].
pub type ById = DatabaseQuery<By<Option<Booking>, booking::Id>>;

/// Queries the [`Payment`] history of a [`Booking`].
///
/// [`Payment`]: crate::domain::Payment
pub type Payments = DatabaseQuery<By<read::payment::History, booking::Id>>;
