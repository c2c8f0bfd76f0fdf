//! [`Command`] for booking a [`Property`].

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, ledger, property, Address, Booking, Property},
    infra::{
        self,
        database::{self, Database},
        Ledger,
    },
    Service,
};

use super::Command;

/// [`Command`] for booking a [`Property`].
///
/// The settlement is submitted to the ledger first, and the [`Booking`] is
/// persisted only once its outcome is known. The single exception is a
/// finality timeout: the [`Booking`] is then persisted as
/// [`booking::Status::Pending`] under its transaction hash, to be resolved by
/// reconciliation later.
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// ID of the [`Property`] to book.
    pub property_id: property::Id,

    /// [`Address`] of the renting account.
    pub tenant: Address,

    /// [`DateTime`] when the lease starts.
    pub lease_start: booking::LeaseStartDateTime,

    /// Duration of the lease.
    pub duration: booking::Months,
}

impl CreateBooking {
    /// Number of attempts to persist a settled [`Booking`].
    ///
    /// The ledger invocation is never resubmitted, only the local write is
    /// retried.
    const PERSIST_ATTEMPTS: u32 = 3;
}

impl<Db, Lg> Command<CreateBooking> for Service<Db, Lg>
where
    Db: Database<
            Select<By<Option<Property>, property::Id>>,
            Ok = Option<Property>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Ok = (), Err = Traced<database::Error>>
        + Database<
            Update<property::Occupation>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Update<Property>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    Lg: Ledger<
        infra::ledger::call::Book,
        Ok = infra::ledger::Outcome,
        Err = Traced<infra::ledger::Error>,
    >,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBooking {
            property_id,
            tenant,
            lease_start,
            duration,
        } = cmd;

        let property = self
            .database()
            .execute(Select(By::<Option<Property>, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())?;

        if property.is_deactivated() {
            return Err(tracerr::new!(E::PropertyUnavailable(property_id)));
        }
        if property.availability != property::Availability::Available {
            return Err(tracerr::new!(E::PropertyUnavailable(property_id)));
        }
        if property.owner == tenant {
            return Err(tracerr::new!(E::OwnProperty(property_id)));
        }

        let lease_end = booking::lease_end(lease_start, duration)
            .ok_or(E::LeaseOutOfRange)
            .map_err(tracerr::wrap!())?;
        let total_amount = property
            .rent_per_month
            .checked_mul(duration.into())
            .ok_or(E::LeaseOutOfRange)
            .map_err(tracerr::wrap!())?;

        let outcome = self
            .ledger()
            .execute(infra::ledger::call::Book {
                property_id: property.ledger_id,
                duration,
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let (status, confirmed_at) = match outcome.finality {
            infra::ledger::Finality::Final(
                infra::ledger::Execution::Succeeded,
            ) => (booking::Status::Confirmed, Some(DateTime::now().coerce())),
            infra::ledger::Finality::Final(
                infra::ledger::Execution::Reverted(reason),
            ) => {
                // Definite rejection persists nothing.
                return Err(tracerr::new!(E::Rejected(
                    booking::FailureReason::truncated(reason),
                )));
            }
            infra::ledger::Finality::TimedOut => {
                (booking::Status::Pending, None)
            }
        };

        let booking = Booking {
            id: booking::Id::new(),
            property_id: property.id,
            ledger_property_id: property.ledger_id,
            tenant: tenant.clone(),
            owner: property.owner.clone(),
            duration,
            rent_per_month: property.rent_per_month,
            total_amount,
            lease_start,
            lease_end,
            status,
            tx_hash: Some(outcome.tx_hash.clone()),
            failure_reason: None,
            created_at: DateTime::now().coerce(),
            confirmed_at,
            cancelled_at: None,
            expired_at: None,
        };

        let mut result = Ok(());
        for attempt in 1..=CreateBooking::PERSIST_ATTEMPTS {
            result = persist(self.database(), &property, &booking).await;
            match &result {
                Ok(()) => break,
                Err(e) => {
                    log::warn!(
                        attempt,
                        "failed to persist settled `Booking`: {e}",
                    );
                }
            }
        }
        result.map_err(|source| {
            tracerr::new!(E::Persistence {
                tx_hash: outcome.tx_hash,
                source,
            })
        })?;

        Ok(booking)
    }
}

/// Persists the settled `booking` along with the availability flip of its
/// `property` in a single transaction.
async fn persist<Db>(
    database: &Db,
    property: &Property,
    booking: &Booking,
) -> Result<(), Traced<database::Error>>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Property, property::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Ok = (), Err = Traced<database::Error>>
        + Database<
            Update<property::Occupation>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Update<Property>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    let tx = database
        .execute(Transact)
        .await
        .map_err(tracerr::wrap!())?;

    // Avoid concurrent actions upon the same `Property`.
    tx.execute(Lock(By::new(property.id)))
        .await
        .map_err(tracerr::wrap!())?;

    tx.execute(Insert(booking.clone()))
        .await
        .map_err(tracerr::wrap!())?;

    if booking.status == booking::Status::Confirmed {
        let occupied = tx
            .execute(Update(property::Occupation {
                id: property.id,
                tenant: booking.tenant.clone(),
                lease_end: booking.lease_end,
            }))
            .await
            .map_err(tracerr::wrap!())?;
        if !occupied {
            // Conditional flip missed, but the ledger already settled the
            // lease, so the local row is overwritten to converge.
            tx.execute(Update(Property {
                tenant: Some(booking.tenant.clone()),
                availability: property::Availability::Booked,
                lease_end: Some(booking.lease_end),
                ..property.clone()
            }))
            .await
            .map_err(tracerr::wrap!())?;
        }
    }

    tx.execute(Commit).await.map_err(tracerr::wrap!())
}

/// Error of [`CreateBooking`] [`Command`] execution.
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

    /// [`Property`] with the provided ID does not exist.
    #[display("`Property(id: {_0})` does not exist")]
    #[from(ignore)]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// [`Property`] is not open for booking.
    #[display("`Property(id: {_0})` is not available for booking")]
    #[from(ignore)]
    PropertyUnavailable(#[error(not(source))] property::Id),

    /// Tenant is the owner of the [`Property`].
    #[display("`Property(id: {_0})` cannot be booked by its owner")]
    #[from(ignore)]
    OwnProperty(#[error(not(source))] property::Id),

    /// Lease boundaries are not representable.
    #[display("Lease end or total amount is out of range")]
    LeaseOutOfRange,

    /// Ledger reverted the settlement.
    #[display("Ledger rejected the booking: {_0}")]
    #[from(ignore)]
    Rejected(#[error(not(source))] booking::FailureReason),

    /// Settled [`Booking`] failed to persist.
    #[display(
        "`Booking` settled as `{tx_hash}`, but failed to persist: {source}"
    )]
    Persistence {
        /// Hash of the settled transaction.
        tx_hash: ledger::TxHash,

        /// Persistence failure itself.
        source: Traced<database::Error>,
    },
}

#[cfg(test)]
mod spec {
    use common::{
        operations::Update, DateTime, Handler as _,
    };

    use crate::{
        domain::{booking, property},
        infra::ledger::{Execution, Finality},
        testing,
    };

    use super::{CreateBooking, ExecutionError};

    #[tokio::test]
    async fn confirms_on_ledger_success() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        service.ledger().push_book_outcome(Finality::Final(
            Execution::Succeeded,
        ));

        let booking = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: testing::tenant(),
                lease_start: DateTime::now().coerce(),
                duration: booking::Months::new(6).unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(booking.status, booking::Status::Confirmed);
        assert!(booking.tx_hash.is_some());

        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.availability, property::Availability::Booked);
        assert_eq!(stored.tenant, Some(testing::tenant()));
    }

    #[tokio::test]
    async fn honors_requested_lease_window() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        service.ledger().push_book_outcome(Finality::Final(
            Execution::Succeeded,
        ));

        let lease_start = DateTime::from_rfc3339("2024-09-01T00:00:00Z")
            .unwrap()
            .coerce();
        let booking = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: testing::tenant(),
                lease_start,
                duration: booking::Months::new(6).unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(booking.lease_start, lease_start);
        assert_eq!(
            booking.lease_end,
            DateTime::from_rfc3339("2025-03-01T00:00:00Z").unwrap().coerce(),
        );
        assert_eq!(
            booking.total_amount,
            property.rent_per_month.checked_mul(6).unwrap(),
        );
    }

    #[tokio::test]
    async fn persists_nothing_on_rejection() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        service.ledger().push_book_outcome(Finality::Final(
            Execution::Reverted("property unavailable".into()),
        ));

        let result = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: testing::tenant(),
                lease_start: DateTime::now().coerce(),
                duration: booking::Months::new(6).unwrap(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::Rejected(_),
        ));
        assert!(service.database().bookings().is_empty());
        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.availability, property::Availability::Available);
    }

    #[tokio::test]
    async fn persists_pending_on_timeout() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        service.ledger().push_book_outcome(Finality::TimedOut);

        let booking = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: testing::tenant(),
                lease_start: DateTime::now().coerce(),
                duration: booking::Months::new(3).unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(booking.status, booking::Status::Pending);
        assert!(booking.tx_hash.is_some());

        // Availability is not flipped until the outcome is known.
        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.availability, property::Availability::Available);
    }

    #[tokio::test]
    async fn rejects_unavailable_property() {
        let service = testing::service();
        let property = testing::booked_property(&service).await;

        let result = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: testing::tenant(),
                lease_start: DateTime::now().coerce(),
                duration: booking::Months::new(6).unwrap(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::PropertyUnavailable(_),
        ));
        assert_eq!(service.ledger().submissions(), 0);
    }

    #[tokio::test]
    async fn rejects_owner_as_tenant() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        let result = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: property.owner.clone(),
                lease_start: DateTime::now().coerce(),
                duration: booking::Months::new(6).unwrap(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::OwnProperty(_),
        ));
        assert_eq!(service.ledger().submissions(), 0);
    }

    #[tokio::test]
    async fn admits_single_booking_per_property() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        service.ledger().push_book_outcome(Finality::Final(
            Execution::Succeeded,
        ));

        let first = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: testing::tenant(),
                lease_start: DateTime::now().coerce(),
                duration: booking::Months::new(6).unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(first.status, booking::Status::Confirmed);

        let second = service
            .execute(CreateBooking {
                property_id: property.id,
                tenant: testing::stranger(),
                lease_start: DateTime::now().coerce(),
                duration: booking::Months::new(3).unwrap(),
            })
            .await;

        assert!(matches!(
            second.unwrap_err().as_ref(),
            ExecutionError::PropertyUnavailable(_),
        ));
        assert_eq!(service.ledger().submissions(), 1);

        let confirmed = service
            .database()
            .bookings()
            .into_iter()
            .filter(|b| b.status == booking::Status::Confirmed)
            .count();
        assert_eq!(confirmed, 1);
    }

    #[tokio::test]
    async fn occupation_gate_flips_once() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        let occupation = property::Occupation {
            id: property.id,
            tenant: testing::tenant(),
            lease_end: DateTime::now().add_months(6).unwrap().coerce(),
        };
        let first = service
            .database()
            .execute(Update(occupation.clone()))
            .await
            .unwrap();
        assert!(first);

        let second = service
            .database()
            .execute(Update(property::Occupation {
                tenant: testing::stranger(),
                ..occupation
            }))
            .await
            .unwrap();
        assert!(!second);

        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.tenant, Some(testing::tenant()));
    }
}
