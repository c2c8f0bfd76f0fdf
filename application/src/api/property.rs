//! Property endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query as Params},
    Extension, Json,
};
use common::{pagination::Arguments, Amount};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, ledger, property},
    query::{self, DatabaseQuery, Query as _},
    read,
};

use crate::{context::Session, AsError, Error, Service};

/// Wire representation of a [`domain::Property`].
#[derive(Debug, Serialize)]
pub struct Property {
    /// ID of the property.
    pub id: property::Id,

    /// ID assigned to the property by the settlement contract.
    pub ledger_id: ledger::Id,

    /// Address of the owning account.
    pub owner: domain::Address,

    /// Address of the renting account, if any.
    pub tenant: Option<domain::Address>,

    /// Monthly rent of the property.
    pub rent_per_month: Amount,

    /// Description of the property.
    pub description: String,

    /// Current availability of the property.
    pub availability: property::Availability,

    /// [RFC 3339] timestamp of the active lease end, if rented out.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub lease_end: Option<String>,

    /// [RFC 3339] timestamp of the property creation.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub created_at: String,

    /// [RFC 3339] timestamp of the property deactivation, if deactivated.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub deactivated_at: Option<String>,
}

impl From<domain::Property> for Property {
    fn from(p: domain::Property) -> Self {
        Self {
            id: p.id,
            ledger_id: p.ledger_id,
            owner: p.owner,
            tenant: p.tenant,
            rent_per_month: p.rent_per_month,
            description: p.description.to_string(),
            availability: p.availability,
            lease_end: p.lease_end.map(|d| d.to_rfc3339()),
            created_at: p.created_at.to_rfc3339(),
            deactivated_at: p.deactivated_at.map(|d| d.to_rfc3339()),
        }
    }
}

/// Request of the [`create()`] endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// Monthly rent of the listed property.
    pub rent_per_month: Amount,

    /// Description of the listed property.
    pub description: String,
}

/// `POST /properties` endpoint listing a new property on the ledger and
/// recording it locally.
pub async fn create(
    Extension(service): Extension<Service>,
    session: Session,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Property>), Error> {
    let CreateRequest {
        rent_per_month,
        description,
    } = req;

    let description = property::Description::new(description)
        .ok_or_else(|| Error::validation(&"invalid `description`"))?;

    let property = service
        .execute(command::ListProperty {
            owner: session.address,
            rent_per_month,
            description,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((StatusCode::CREATED, Json(property.into())))
}

/// `GET /properties/:id` endpoint.
pub async fn by_id(
    Extension(service): Extension<Service>,
    Path(id): Path<property::Id>,
) -> Result<Json<Property>, Error> {
    service
        .execute(query::property::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .map(|p| Json(p.into()))
        .ok_or_else(|| not_found(id))
}

/// Parameters of the [`list()`] endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// Number of properties to return from the start.
    pub first: Option<u32>,

    /// Cursor after which to return properties.
    pub after: Option<property::Id>,

    /// Number of properties to return from the end.
    pub last: Option<u32>,

    /// Cursor before which to return properties.
    pub before: Option<property::Id>,

    /// Description (or its part) to fuzzy search for.
    pub description: Option<String>,
}

/// Response of the [`list()`] endpoint.
#[derive(Debug, Serialize)]
pub struct List {
    /// Properties on this page.
    pub items: Vec<Property>,

    /// Cursor of the last property on this page.
    pub end_cursor: Option<property::Id>,

    /// Indicator whether a next page exists.
    pub has_next_page: bool,

    /// Indicator whether a previous page exists.
    pub has_previous_page: bool,

    /// Total count of active properties.
    pub total_count: i32,
}

/// Default page size of the [`list()`] endpoint.
const DEFAULT_PAGE_SIZE: u32 = 20;

/// `GET /properties` endpoint returning a page of the catalogue.
pub async fn list(
    Extension(service): Extension<Service>,
    Params(params): Params<ListParams>,
) -> Result<Json<List>, Error> {
    let ListParams {
        first,
        after,
        last,
        before,
        description,
    } = params;

    let arguments =
        Arguments::new(first, after, last, before, DEFAULT_PAGE_SIZE)
            .ok_or_else(|| {
                Error::validation(&"invalid pagination arguments")
            })?;
    let description = description
        .map(|d| {
            property::Description::new(d)
                .ok_or_else(|| Error::validation(&"invalid `description`"))
        })
        .transpose()?;

    let page = service
        .execute(query::properties::List::by(
            read::property::list::Selector {
                arguments,
                filter: read::property::list::Filter { description },
            },
        ))
        .await
        .map_err(AsError::into_error)?;
    let page_info = page.page_info();

    let ids = page.edges.iter().map(|e| e.node).collect::<Vec<_>>();
    let mut properties: HashMap<property::Id, domain::Property> = service
        .execute(DatabaseQuery::by(ids.clone()))
        .await
        .map_err(AsError::into_error)?;

    let total_count = service
        .execute(query::properties::TotalCount::by(()))
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(List {
        items: ids
            .into_iter()
            .filter_map(|id| properties.remove(&id))
            .map(Into::into)
            .collect(),
        end_cursor: page_info.end_cursor,
        has_next_page: page_info.has_next_page,
        has_previous_page: page_info.has_previous_page,
        total_count: total_count.into(),
    }))
}

/// `POST /properties/:id/sync` endpoint reconciling a property with its
/// on-ledger state.
pub async fn sync(
    Extension(service): Extension<Service>,
    _session: Session,
    Path(id): Path<property::Id>,
) -> Result<Json<Property>, Error> {
    service
        .execute(command::SyncProperty { property_id: id })
        .await
        .map(|p| Json(p.into()))
        .map_err(AsError::into_error)
}

/// `DELETE /properties/:id` endpoint withdrawing a property from the
/// catalogue for good.
pub async fn delist(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<property::Id>,
) -> Result<Json<Property>, Error> {
    service
        .execute(command::DelistProperty {
            property_id: id,
            by: session.address,
        })
        .await
        .map(|p| Json(p.into()))
        .map_err(AsError::into_error)
}

/// Request of the [`maintenance()`] endpoint.
#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    /// Indicator whether maintenance is being enabled or disabled.
    pub enabled: bool,
}

/// `PATCH /properties/:id/maintenance` endpoint toggling the maintenance
/// state of a property.
pub async fn maintenance(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<property::Id>,
    Json(req): Json<MaintenanceRequest>,
) -> Result<Json<Property>, Error> {
    service
        .execute(command::ToggleMaintenance {
            property_id: id,
            enabled: req.enabled,
            by: session.address,
        })
        .await
        .map(|p| Json(p.into()))
        .map_err(AsError::into_error)
}

/// Builds a `NOT_FOUND` [`Error`] for the provided [`property::Id`].
fn not_found(id: property::Id) -> Error {
    Error::new(
        "NOT_FOUND",
        StatusCode::NOT_FOUND,
        &format_args!("`Property(id: {id})` does not exist"),
    )
}

impl AsError for command::list_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Ledger(e) => e.try_as_error(),
            Self::ZeroOwner | Self::ZeroRent => {
                Some(Error::validation(&self))
            }
            Self::Rejected(_) => Some(Error::new(
                "LEDGER_REJECTED",
                StatusCode::CONFLICT,
                &self,
            )),
            Self::TimedOut { .. } => Some(Error::new(
                "LEDGER_TIMEOUT",
                StatusCode::GATEWAY_TIMEOUT,
                &self,
            )),
            Self::Persistence { .. } => Some(Error::new(
                "PERSISTENCE_FAILURE",
                StatusCode::INTERNAL_SERVER_ERROR,
                &self,
            )),
            Self::CountOutOfSync => None,
        }
    }
}

impl AsError for command::sync_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Ledger(e) => e.try_as_error(),
            Self::PropertyNotExists(id) => Some(not_found(*id)),
        }
    }
}

impl AsError for command::delist_property::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::PropertyNotExists(id) => Some(not_found(*id)),
            Self::NotOwner(_) => Some(Error::new(
                "FORBIDDEN",
                StatusCode::FORBIDDEN,
                &self,
            )),
            Self::ActiveLease(_) => Some(Error::new(
                "PROPERTY_UNAVAILABLE",
                StatusCode::CONFLICT,
                &self,
            )),
        }
    }
}

impl AsError for command::toggle_maintenance::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::PropertyNotExists(id) => Some(not_found(*id)),
            Self::NotOwner(_) => Some(Error::new(
                "FORBIDDEN",
                StatusCode::FORBIDDEN,
                &self,
            )),
            Self::Deactivated(_) | Self::InvalidAvailability { .. } => {
                Some(Error::new(
                    "PROPERTY_UNAVAILABLE",
                    StatusCode::CONFLICT,
                    &self,
                ))
            }
        }
    }
}
