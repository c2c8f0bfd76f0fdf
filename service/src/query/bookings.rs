//! [`Query`] collection related to the multiple [`Booking`].

use common::operations::By;

use crate::{domain::Booking, read};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries [`Booking`]s placed by a tenant.
pub type OfTenant =
    DatabaseQuery<By<Vec<Booking>, read::booking::TenantBookings>>;
