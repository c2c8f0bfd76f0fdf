//! [`Command`] for resolving a [`booking::Status::Pending`] [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, property, Booking, Property},
    infra::{
        self,
        database::{self, Database},
        Ledger,
    },
    Service,
};

use super::Command;

/// [`Command`] for resolving a [`booking::Status::Pending`] [`Booking`]
/// against the ledger.
///
/// Looks up the receipt of the [`Booking`]'s settlement transaction and
/// drives the record to the state the ledger actually reached. A receipt not
/// yet visible leaves the [`Booking`] pending.
///
/// A [`Booking`] already in a non-pending [`booking::Status`] is returned
/// as-is.
#[derive(Clone, Copy, Debug)]
pub struct ReconcileBooking {
    /// ID of the [`Booking`] to reconcile.
    pub booking_id: booking::Id,
}

impl<Db, Lg> Command<ReconcileBooking> for Service<Db, Lg>
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
            Update<property::Occupation>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    Lg: Ledger<
        infra::ledger::view::Receipt,
        Ok = Option<infra::ledger::Execution>,
        Err = Traced<infra::ledger::Error>,
    >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ReconcileBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ReconcileBooking { booking_id } = cmd;

        let mut booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        if booking.status != booking::Status::Pending {
            return Ok(booking);
        }
        let tx_hash = booking
            .tx_hash
            .clone()
            .ok_or(E::NoTransaction(booking_id))
            .map_err(tracerr::wrap!())?;

        let receipt = self
            .ledger()
            .execute(infra::ledger::view::Receipt(tx_hash))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let confirmed = match receipt {
            // Not settled yet: stays pending until the next run.
            None => return Ok(booking),
            Some(infra::ledger::Execution::Succeeded) => {
                booking.status = booking::Status::Confirmed;
                booking.confirmed_at = Some(DateTime::now().coerce());
                true
            }
            Some(infra::ledger::Execution::Reverted(reason)) => {
                booking.status = booking::Status::Cancelled;
                booking.cancelled_at = Some(DateTime::now().coerce());
                booking.failure_reason =
                    Some(booking::FailureReason::truncated(reason));
                false
            }
        };

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

        if confirmed {
            _ = tx
                .execute(Update(property::Occupation {
                    id: booking.property_id,
                    tenant: booking.tenant.clone(),
                    lease_end: booking.lease_end,
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

/// Error of [`ReconcileBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Ledger`] error.
    ///
    /// [`Ledger`]: crate::infra::Ledger
    #[display("`Ledger` invocation failed: {_0}")]
    Ledger(infra::ledger::Error),

    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    #[from(ignore)]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// Pending [`Booking`] has no settlement transaction to check.
    #[display("`Booking(id: {_0})` has no transaction hash")]
    #[from(ignore)]
    NoTransaction(#[error(not(source))] booking::Id),
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{
        domain::{booking, property},
        infra::ledger::Execution,
        testing,
    };

    use super::ReconcileBooking;

    #[tokio::test]
    async fn confirms_settled_booking() {
        let service = testing::service();
        let (property, booking) = testing::pending_booking(&service).await;

        service
            .ledger()
            .push_receipt(Some(Execution::Succeeded));

        let reconciled = service
            .execute(ReconcileBooking {
                booking_id: booking.id,
            })
            .await
            .unwrap();

        assert_eq!(reconciled.status, booking::Status::Confirmed);
        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.availability, property::Availability::Booked);
    }

    #[tokio::test]
    async fn cancels_reverted_booking() {
        let service = testing::service();
        let (property, booking) = testing::pending_booking(&service).await;

        service.ledger().push_receipt(Some(Execution::Reverted(
            "insufficient funds".into(),
        )));

        let reconciled = service
            .execute(ReconcileBooking {
                booking_id: booking.id,
            })
            .await
            .unwrap();

        assert_eq!(reconciled.status, booking::Status::Cancelled);
        assert!(reconciled.failure_reason.is_some());
        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.availability, property::Availability::Available);
    }

    #[tokio::test]
    async fn keeps_unsettled_booking_pending() {
        let service = testing::service();
        let (_, booking) = testing::pending_booking(&service).await;

        service.ledger().push_receipt(None);

        let reconciled = service
            .execute(ReconcileBooking {
                booking_id: booking.id,
            })
            .await
            .unwrap();

        assert_eq!(reconciled.status, booking::Status::Pending);
    }
}
