//! [`Query`] collection related to the multiple [`Property`].

use common::operations::By;

use crate::read;
#[cfg(doc)]
use crate::{domain::Property, Query};

use super::DatabaseQuery;

/// Queries a list of [`Property`].
pub type List = DatabaseQuery<
    By<read::property::list::Page, read::property::list::Selector>,
>;

/// Queries total count of [`Property`] list items.
pub type TotalCount = DatabaseQuery<By<read::property::list::TotalCount, ()>>;
