//! [`Command`] for updating the [`booking::Status`] of a [`Booking`].

use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, Address, Booking},
    Service,
};

use super::{
    cancel_booking, reconcile_booking, CancelBooking, Command,
    ReconcileBooking,
};

/// [`Command`] for updating the [`booking::Status`] of a [`Booking`].
///
/// Dispatches over the requested [`booking::Status`]:
/// [`booking::Status::Cancelled`] is a cancellation,
/// [`booking::Status::Confirmed`] is a reconciliation of a pending
/// settlement. Other targets are not reachable by request:
/// [`booking::Status::Expired`] is assigned by the expiry sweep only.
#[derive(Clone, Debug)]
pub struct UpdateBooking {
    /// ID of the [`Booking`] to update.
    pub booking_id: booking::Id,

    /// [`booking::Status`] to transition the [`Booking`] into.
    pub status: booking::Status,

    /// [`Address`] of the account requesting the update.
    pub by: Address,

    /// Reason of the update, if provided.
    pub reason: Option<booking::FailureReason>,
}

impl<Db, Lg> Command<UpdateBooking> for Service<Db, Lg>
where
    Self: Command<
            CancelBooking,
            Ok = Booking,
            Err = Traced<cancel_booking::ExecutionError>,
        > + Command<
            ReconcileBooking,
            Ok = Booking,
            Err = Traced<reconcile_booking::ExecutionError>,
        >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateBooking {
            booking_id,
            status,
            by,
            reason,
        } = cmd;

        match status {
            booking::Status::Cancelled => self
                .execute(CancelBooking {
                    booking_id,
                    by,
                    reason,
                })
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E)),
            booking::Status::Confirmed => self
                .execute(ReconcileBooking { booking_id })
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E)),
            booking::Status::Pending | booking::Status::Expired => {
                Err(tracerr::new!(E::UnreachableStatus(status)))
            }
        }
    }
}

/// Error of [`UpdateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`CancelBooking`] error.
    #[display("{_0}")]
    Cancel(cancel_booking::ExecutionError),

    /// [`ReconcileBooking`] error.
    #[display("{_0}")]
    Reconcile(reconcile_booking::ExecutionError),

    /// Requested [`booking::Status`] cannot be assigned by request.
    #[display("`Booking` cannot be transitioned into {_0} by request")]
    #[from(ignore)]
    UnreachableStatus(#[error(not(source))] booking::Status),
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{domain::booking, testing};

    use super::{ExecutionError, UpdateBooking};

    #[tokio::test]
    async fn dispatches_cancellation() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        let updated = service
            .execute(UpdateBooking {
                booking_id: booking.id,
                status: booking::Status::Cancelled,
                by: booking.tenant.clone(),
                reason: None,
            })
            .await
            .unwrap();

        assert_eq!(updated.status, booking::Status::Cancelled);
    }

    #[tokio::test]
    async fn rejects_unreachable_status() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        let result = service
            .execute(UpdateBooking {
                booking_id: booking.id,
                status: booking::Status::Expired,
                by: booking.tenant.clone(),
                reason: None,
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::UnreachableStatus(booking::Status::Expired),
        ));
    }
}
