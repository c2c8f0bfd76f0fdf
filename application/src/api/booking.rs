//! Booking endpoints.

use axum::{extract::Path, Extension, Json};
use common::{Amount, DateTime};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, booking, ledger, property},
    query::{self, Query as _},
    read,
};

use crate::{context::Session, AsError, Error, Service};

/// Wire representation of a [`domain::Booking`].
#[derive(Debug, Serialize)]
pub struct Booking {
    /// ID of the booking.
    pub id: booking::Id,

    /// ID of the booked property.
    pub property_id: property::Id,

    /// ID assigned to the booked property by the settlement contract.
    pub ledger_property_id: ledger::Id,

    /// Address of the renting account.
    pub tenant: domain::Address,

    /// Address of the account owning the booked property.
    pub owner: domain::Address,

    /// Duration of the lease in months.
    pub duration: u32,

    /// Monthly rent at the moment the booking was placed.
    pub rent_per_month: Amount,

    /// Total amount due over the whole lease.
    pub total_amount: Amount,

    /// [RFC 3339] timestamp of the lease start.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub lease_start: String,

    /// [RFC 3339] timestamp of the lease end.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub lease_end: String,

    /// Current status of the booking.
    pub status: booking::Status,

    /// Hash of the settlement transaction, if known.
    pub tx_hash: Option<String>,

    /// Reason why the booking failed or was cancelled, if it was.
    pub failure_reason: Option<String>,

    /// [RFC 3339] timestamp of the booking creation.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub created_at: String,

    /// [RFC 3339] timestamp of the booking confirmation, if confirmed.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub confirmed_at: Option<String>,

    /// [RFC 3339] timestamp of the booking cancellation, if cancelled.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub cancelled_at: Option<String>,

    /// [RFC 3339] timestamp of the booking expiration, if expired.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub expired_at: Option<String>,
}

impl From<domain::Booking> for Booking {
    fn from(b: domain::Booking) -> Self {
        Self {
            id: b.id,
            property_id: b.property_id,
            ledger_property_id: b.ledger_property_id,
            tenant: b.tenant,
            owner: b.owner,
            duration: b.duration.into(),
            rent_per_month: b.rent_per_month,
            total_amount: b.total_amount,
            lease_start: b.lease_start.to_rfc3339(),
            lease_end: b.lease_end.to_rfc3339(),
            status: b.status,
            tx_hash: b.tx_hash.map(|h| h.to_string()),
            failure_reason: b.failure_reason.map(|r| r.to_string()),
            created_at: b.created_at.to_rfc3339(),
            confirmed_at: b.confirmed_at.map(|d| d.to_rfc3339()),
            cancelled_at: b.cancelled_at.map(|d| d.to_rfc3339()),
            expired_at: b.expired_at.map(|d| d.to_rfc3339()),
        }
    }
}

/// Request of the [`create()`] endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// ID of the property to book.
    pub property_id: property::Id,

    /// [RFC 3339] timestamp of the lease start.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub lease_start: String,

    /// Duration of the lease in months.
    pub duration: u32,
}

/// `POST /bookings` endpoint settling a booking on the ledger.
///
/// Responds with `202 Accepted` when the settlement finality timed out and
/// the booking was recorded as pending.
pub async fn create(
    Extension(service): Extension<Service>,
    session: Session,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Booking>), Error> {
    let CreateRequest {
        property_id,
        lease_start,
        duration,
    } = req;

    let lease_start = DateTime::from_rfc3339(&lease_start)
        .map_err(|_| {
            Error::validation(&"`lease_start` must be an RFC 3339 timestamp")
        })?
        .coerce();
    let duration = booking::Months::new(duration)
        .ok_or_else(|| Error::validation(&"`duration` must be positive"))?;

    let booking = service
        .execute(command::CreateBooking {
            property_id,
            tenant: session.address,
            lease_start,
            duration,
        })
        .await
        .map_err(AsError::into_error)?;

    let status = if booking.status == booking::Status::Pending {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(booking.into())))
}

/// `GET /bookings/:id` endpoint.
///
/// A booking is visible to its participants only.
pub async fn by_id(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<booking::Id>,
) -> Result<Json<Booking>, Error> {
    let booking = service
        .execute(query::booking::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| not_found(id))?;

    if booking.tenant != session.address && booking.owner != session.address {
        return Err(Error::new(
            "FORBIDDEN",
            StatusCode::FORBIDDEN,
            &format_args!("`Booking(id: {id})` is not visible to this account"),
        ));
    }

    Ok(Json(booking.into()))
}

/// Parameters of the [`list()`] endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// Status to narrow the selection to.
    pub status: Option<booking::Status>,
}

/// `GET /bookings` endpoint returning the bookings placed by the
/// authenticated account, most recent first.
pub async fn list(
    Extension(service): Extension<Service>,
    session: Session,
    axum::extract::Query(params): axum::extract::Query<ListParams>,
) -> Result<Json<Vec<Booking>>, Error> {
    service
        .execute(query::bookings::OfTenant::by(
            read::booking::TenantBookings {
                tenant: session.address,
                status: params.status,
            },
        ))
        .await
        .map(|bookings| Json(bookings.into_iter().map(Into::into).collect()))
        .map_err(AsError::into_error)
}

/// Request of the [`update()`] endpoint.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    /// Status to transition the booking into.
    pub status: booking::Status,

    /// Reason of the transition, if any.
    pub reason: Option<String>,
}

/// `PATCH /bookings/:id` endpoint transitioning a booking into the
/// requested status.
pub async fn update(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<booking::Id>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Booking>, Error> {
    let UpdateRequest { status, reason } = req;

    let reason = reason
        .map(|r| {
            booking::FailureReason::new(r)
                .ok_or_else(|| Error::validation(&"invalid `reason`"))
        })
        .transpose()?;

    service
        .execute(command::UpdateBooking {
            booking_id: id,
            status,
            by: session.address,
            reason,
        })
        .await
        .map(|b| Json(b.into()))
        .map_err(AsError::into_error)
}

/// Builds a `NOT_FOUND` [`Error`] for the provided [`booking::Id`].
pub(super) fn not_found(id: booking::Id) -> Error {
    Error::new(
        "NOT_FOUND",
        StatusCode::NOT_FOUND,
        &format_args!("`Booking(id: {id})` does not exist"),
    )
}

impl AsError for command::create_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Ledger(e) => e.try_as_error(),
            Self::PropertyNotExists(_) => Some(Error::new(
                "NOT_FOUND",
                StatusCode::NOT_FOUND,
                &self,
            )),
            Self::PropertyUnavailable(_) => Some(Error::new(
                "PROPERTY_UNAVAILABLE",
                StatusCode::CONFLICT,
                &self,
            )),
            Self::OwnProperty(_) | Self::LeaseOutOfRange => {
                Some(Error::validation(&self))
            }
            Self::Rejected(_) => Some(Error::new(
                "LEDGER_REJECTED",
                StatusCode::CONFLICT,
                &self,
            )),
            Self::Persistence { .. } => Some(Error::new(
                "PERSISTENCE_FAILURE",
                StatusCode::INTERNAL_SERVER_ERROR,
                &self,
            )),
        }
    }
}

impl AsError for command::cancel_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::BookingNotExists(id) => Some(not_found(*id)),
            Self::NotParticipant(_) => Some(Error::new(
                "FORBIDDEN",
                StatusCode::FORBIDDEN,
                &self,
            )),
            Self::InvalidTransition { .. } => Some(Error::new(
                "INVALID_TRANSITION",
                StatusCode::CONFLICT,
                &self,
            )),
        }
    }
}

impl AsError for command::reconcile_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Ledger(e) => e.try_as_error(),
            Self::BookingNotExists(id) => Some(not_found(*id)),
            Self::NoTransaction(_) => Some(Error::new(
                "INVALID_TRANSITION",
                StatusCode::CONFLICT,
                &self,
            )),
        }
    }
}

impl AsError for command::update_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Cancel(e) => e.try_as_error(),
            Self::Reconcile(e) => e.try_as_error(),
            Self::UnreachableStatus(_) => Some(Error::validation(&self)),
        }
    }
}
