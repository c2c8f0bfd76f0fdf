//! Payment endpoints.

use axum::{extract::Path, Extension, Json};
use common::Amount;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, booking, ledger, payment},
    query::{self, Query as _},
};

use crate::{api::booking::not_found as booking_not_found, context::Session, AsError, Error, Service};

/// Wire representation of a [`domain::Payment`].
#[derive(Debug, Serialize)]
pub struct Payment {
    /// ID of the payment.
    pub id: payment::Id,

    /// ID of the booking the payment belongs to.
    pub booking_id: booking::Id,

    /// ID assigned to the paid property by the settlement contract.
    pub ledger_property_id: ledger::Id,

    /// Address of the paying account.
    pub from: domain::Address,

    /// Address of the receiving account.
    pub to: domain::Address,

    /// Amount transferred.
    pub amount: Amount,

    /// Kind of the payment.
    pub kind: payment::Kind,

    /// Current status of the payment.
    pub status: payment::Status,

    /// Hash of the settlement transaction, if known.
    pub tx_hash: Option<String>,

    /// Reason why the payment failed, if it did.
    pub failure_reason: Option<String>,

    /// ID of the original payment being reversed, for reversals.
    pub refund_of: Option<payment::Id>,

    /// [RFC 3339] timestamp the payment was due at, if scheduled.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub due_date: Option<String>,

    /// [RFC 3339] timestamp of the paid rent period start.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub period_start: Option<String>,

    /// [RFC 3339] timestamp of the paid rent period end.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub period_end: Option<String>,

    /// [RFC 3339] timestamp of the payment creation.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub created_at: String,

    /// [RFC 3339] timestamp of the payment confirmation, if confirmed.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub confirmed_at: Option<String>,

    /// [RFC 3339] timestamp of the payment failure, if failed.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub failed_at: Option<String>,
}

impl From<domain::Payment> for Payment {
    fn from(p: domain::Payment) -> Self {
        Self {
            id: p.id,
            booking_id: p.booking_id,
            ledger_property_id: p.ledger_property_id,
            from: p.from,
            to: p.to,
            amount: p.amount,
            kind: p.kind,
            status: p.status,
            tx_hash: p.tx_hash.map(|h| h.to_string()),
            failure_reason: p.failure_reason.map(|r| r.to_string()),
            refund_of: p.refund_of,
            due_date: p.due_date.map(|d| d.to_rfc3339()),
            period_start: p.period_start.map(|d| d.to_rfc3339()),
            period_end: p.period_end.map(|d| d.to_rfc3339()),
            created_at: p.created_at.to_rfc3339(),
            confirmed_at: p.confirmed_at.map(|d| d.to_rfc3339()),
            failed_at: p.failed_at.map(|d| d.to_rfc3339()),
        }
    }
}

/// Request of the [`deposit()`] and [`rent()`] endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    /// Amount to transfer, if it differs from the scheduled one.
    pub amount: Option<Amount>,
}

/// `POST /payments/deposit/:booking_id` endpoint settling a deposit
/// payment on the ledger.
pub async fn deposit(
    service: Extension<Service>,
    session: Session,
    booking_id: Path<booking::Id>,
    req: Json<CreateRequest>,
) -> Result<(StatusCode, Json<Payment>), Error> {
    create(service, session, booking_id, payment::Kind::Deposit, req).await
}

/// `POST /payments/rent/:booking_id` endpoint settling the next rent
/// period on the ledger.
pub async fn rent(
    service: Extension<Service>,
    session: Session,
    booking_id: Path<booking::Id>,
    req: Json<CreateRequest>,
) -> Result<(StatusCode, Json<Payment>), Error> {
    create(service, session, booking_id, payment::Kind::Rent, req).await
}

/// Settles a payment of the provided [`payment::Kind`].
///
/// Responds with `202 Accepted` when the settlement finality timed out and
/// the payment was recorded as pending.
async fn create(
    Extension(service): Extension<Service>,
    session: Session,
    Path(booking_id): Path<booking::Id>,
    kind: payment::Kind,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Payment>), Error> {
    let payment = service
        .execute(command::CreatePayment {
            booking_id,
            kind,
            amount: req.amount,
            by: session.address,
        })
        .await
        .map_err(AsError::into_error)?;

    let status = if payment.status == payment::Status::Pending {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(payment.into())))
}

/// Request of the [`refund()`] endpoint.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Kind of the reversal.
    pub kind: payment::Kind,

    /// Amount reversed, if it differs from the original one.
    #[serde(default)]
    pub amount: Option<Amount>,

    /// Hash of the out-of-band transfer transaction.
    pub tx_hash: String,
}

/// `POST /payments/:id/refund` endpoint recording an out-of-band reversal
/// of a settled payment.
pub async fn refund(
    Extension(service): Extension<Service>,
    session: Session,
    Path(id): Path<payment::Id>,
    Json(req): Json<RefundRequest>,
) -> Result<(StatusCode, Json<Payment>), Error> {
    let RefundRequest {
        kind,
        amount,
        tx_hash,
    } = req;

    let tx_hash = ledger::TxHash::new(tx_hash)
        .ok_or_else(|| Error::validation(&"invalid `tx_hash`"))?;

    let payment = service
        .execute(command::RecordRefund {
            payment_id: id,
            kind,
            amount,
            tx_hash,
            by: session.address,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// `GET /payments/history/:booking_id` endpoint returning the full payment
/// history of a booking, most recent first.
pub async fn history(
    Extension(service): Extension<Service>,
    session: Session,
    Path(booking_id): Path<booking::Id>,
) -> Result<Json<Vec<Payment>>, Error> {
    let booking = service
        .execute(query::booking::ById::by(booking_id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| booking_not_found(booking_id))?;

    if booking.tenant != session.address && booking.owner != session.address {
        return Err(Error::new(
            "FORBIDDEN",
            StatusCode::FORBIDDEN,
            &format_args!(
                "`Booking(id: {booking_id})` is not visible to this account",
            ),
        ));
    }

    service
        .execute(query::booking::Payments::by(booking_id))
        .await
        .map(|history| {
            Json(history.0.into_iter().map(Into::into).collect())
        })
        .map_err(AsError::into_error)
}

impl AsError for command::create_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Ledger(e) => e.try_as_error(),
            Self::BookingNotExists(id) => Some(booking_not_found(*id)),
            Self::BookingNotActive { .. } | Self::FullyPaid(_) => {
                Some(Error::new(
                    "INVALID_TRANSITION",
                    StatusCode::CONFLICT,
                    &self,
                ))
            }
            Self::NotTenant(_) => Some(Error::new(
                "FORBIDDEN",
                StatusCode::FORBIDDEN,
                &self,
            )),
            Self::ReversalKind(_) | Self::PeriodOutOfRange => {
                Some(Error::validation(&self))
            }
            Self::Rejected(_) => Some(Error::new(
                "LEDGER_REJECTED",
                StatusCode::CONFLICT,
                &self,
            )),
        }
    }
}

impl AsError for command::record_refund::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Ledger(e) => e.try_as_error(),
            Self::PaymentNotExists(_) => Some(Error::new(
                "NOT_FOUND",
                StatusCode::NOT_FOUND,
                &self,
            )),
            Self::BookingNotExists(id) => Some(booking_not_found(*id)),
            Self::OriginalNotSettled { .. } => Some(Error::new(
                "INVALID_TRANSITION",
                StatusCode::CONFLICT,
                &self,
            )),
            Self::NotReversal(_) | Self::ExceedsOriginal { .. } => {
                Some(Error::validation(&self))
            }
            Self::NotOwner(_) => Some(Error::new(
                "FORBIDDEN",
                StatusCode::FORBIDDEN,
                &self,
            )),
        }
    }
}
