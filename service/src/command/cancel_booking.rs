//! [`Command`] for cancelling a [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, property, Address, Booking, Property},
    infra::database::{self, Database},
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Booking`].
///
/// The settlement contract has no cancellation entrypoint, so the
/// cancellation is recorded locally only: the [`Booking`] becomes
/// [`booking::Status::Cancelled`] and its [`Property`] is released.
///
/// Cancelling an already cancelled [`Booking`] is a no-op.
#[derive(Clone, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to cancel.
    pub booking_id: booking::Id,

    /// [`Address`] of the account requesting the cancellation.
    pub by: Address,

    /// Reason of the cancellation, if provided.
    pub reason: Option<booking::FailureReason>,
}

impl<Db, Lg> Command<CancelBooking> for Service<Db, Lg>
where
    Db: Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Ok = (), Err = Traced<database::Error>>
        + Database<
            Update<property::Release>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CancelBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelBooking {
            booking_id,
            by,
            reason,
        } = cmd;

        let mut booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        if booking.tenant != by && booking.owner != by {
            return Err(tracerr::new!(E::NotParticipant(booking_id)));
        }

        match booking.status {
            booking::Status::Cancelled => return Ok(booking),
            booking::Status::Expired => {
                return Err(tracerr::new!(E::InvalidTransition {
                    from: booking.status,
                    to: booking::Status::Cancelled,
                }));
            }
            booking::Status::Pending | booking::Status::Confirmed => {}
        }
        let released = booking.status == booking::Status::Confirmed;

        booking.status = booking::Status::Cancelled;
        booking.cancelled_at = Some(DateTime::now().coerce());
        booking.failure_reason = reason;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Property`.
        tx.execute(Lock(By::new(booking.property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if released {
            // The gate is conditional, so a property already released (or
            // withdrawn for maintenance) is left untouched.
            _ = tx
                .execute(Update(property::Release {
                    id: booking.property_id,
                }))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(booking)
    }
}

/// Error of [`CancelBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    #[from(ignore)]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// Requester is neither the tenant nor the owner of the [`Booking`].
    ///
    /// [`Booking`]: crate::domain::Booking
    #[display("`Booking(id: {_0})` cannot be cancelled by this account")]
    #[from(ignore)]
    NotParticipant(#[error(not(source))] booking::Id),

    /// [`booking::Status`] forbids the transition.
    #[display("`Booking` cannot become {to} from {from}")]
    InvalidTransition {
        /// Current [`booking::Status`].
        from: booking::Status,

        /// Requested [`booking::Status`].
        to: booking::Status,
    },
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{
        domain::{booking, property},
        testing,
    };

    use super::{CancelBooking, ExecutionError};

    #[tokio::test]
    async fn cancels_and_releases() {
        let service = testing::service();
        let (property, booking) = testing::confirmed_booking(&service).await;

        let cancelled = service
            .execute(CancelBooking {
                booking_id: booking.id,
                by: booking.tenant.clone(),
                reason: None,
            })
            .await
            .unwrap();

        assert_eq!(cancelled.status, booking::Status::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.availability, property::Availability::Available);
        assert_eq!(stored.tenant, None);
    }

    #[tokio::test]
    async fn is_idempotent() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        let first = service
            .execute(CancelBooking {
                booking_id: booking.id,
                by: booking.owner.clone(),
                reason: None,
            })
            .await
            .unwrap();
        let second = service
            .execute(CancelBooking {
                booking_id: booking.id,
                by: booking.owner.clone(),
                reason: None,
            })
            .await
            .unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.cancelled_at, second.cancelled_at);
    }

    #[tokio::test]
    async fn rejects_foreign_account() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        let result = service
            .execute(CancelBooking {
                booking_id: booking.id,
                by: testing::stranger(),
                reason: None,
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::NotParticipant(_),
        ));
    }

    #[tokio::test]
    async fn rejects_expired_booking() {
        let service = testing::service();
        let (_, mut booking) = testing::confirmed_booking(&service).await;
        booking.status = booking::Status::Expired;
        service.database().store_booking(booking.clone());

        let result = service
            .execute(CancelBooking {
                booking_id: booking.id,
                by: booking.tenant.clone(),
                reason: None,
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::InvalidTransition { .. },
        ));
    }
}
