//! [`Command`] for paying within a [`Booking`].

use common::{
    operations::{By, Insert, Select, Update},
    Amount, DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, payment, Address, Booking, Payment},
    infra::{
        self,
        database::{self, Database},
        Ledger,
    },
    read, Service,
};

use super::Command;

/// [`Command`] for paying a deposit or a rent period within a [`Booking`].
///
/// The [`Payment`] record is persisted as [`payment::Status::Pending`] before
/// the ledger invocation, so an operator can always see an in-flight
/// transfer. The record is then driven to its terminal state by the
/// settlement outcome, or left pending under its transaction hash when
/// finality times out.
#[derive(Clone, Debug)]
pub struct CreatePayment {
    /// ID of the [`Booking`] to pay within.
    pub booking_id: booking::Id,

    /// [`payment::Kind`] of the [`Payment`].
    ///
    /// Only [`payment::Kind::Deposit`] and [`payment::Kind::Rent`] can be
    /// requested: reversals are recorded via their own [`Command`].
    pub kind: payment::Kind,

    /// [`Amount`] to transfer, if it differs from the expected one.
    pub amount: Option<Amount>,

    /// [`Address`] of the paying account.
    pub by: Address,
}

impl<Db, Lg> Command<CreatePayment> for Service<Db, Lg>
where
    Db: Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::payment::PaidPeriods, booking::Id>>,
            Ok = read::payment::PaidPeriods,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Ok = (), Err = Traced<database::Error>>
        + Database<Update<Payment>, Ok = (), Err = Traced<database::Error>>,
    Lg: Ledger<
        infra::ledger::call::Pay,
        Ok = infra::ledger::Outcome,
        Err = Traced<infra::ledger::Error>,
    >,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreatePayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreatePayment {
            booking_id,
            kind,
            amount,
            by,
        } = cmd;

        if kind.is_reversal() {
            return Err(tracerr::new!(E::ReversalKind(kind)));
        }

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        if booking.status != booking::Status::Confirmed {
            return Err(tracerr::new!(E::BookingNotActive {
                id: booking_id,
                status: booking.status,
            }));
        }
        if booking.tenant != by {
            return Err(tracerr::new!(E::NotTenant(booking_id)));
        }

        let (due_date, period_start, period_end) = match kind {
            payment::Kind::Rent => {
                let read::payment::PaidPeriods(periods) = self
                    .database()
                    .execute(Select(By::<read::payment::PaidPeriods, _>::new(
                        booking_id,
                    )))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                if periods >= booking.duration.into() {
                    return Err(tracerr::new!(E::FullyPaid(booking_id)));
                }

                let start = booking
                    .lease_start
                    .add_months(periods)
                    .ok_or(E::PeriodOutOfRange)
                    .map_err(tracerr::wrap!())?;
                let end = start
                    .add_months(1)
                    .ok_or(E::PeriodOutOfRange)
                    .map_err(tracerr::wrap!())?;
                (
                    Some(start.coerce()),
                    Some(start.coerce()),
                    Some(end.coerce()),
                )
            }
            payment::Kind::Deposit => (None, None, None),
            payment::Kind::Refund | payment::Kind::Penalty => {
                // Filtered out above.
                return Err(tracerr::new!(E::ReversalKind(kind)));
            }
        };

        // Deposit equals one month of rent.
        let expected = booking.rent_per_month;
        let amount = amount.unwrap_or(expected);
        if amount != expected {
            log::warn!(
                %amount,
                %expected,
                booking_id = %booking_id,
                "`Payment` amount differs from the expected one",
            );
        }

        let mut payment = Payment {
            id: payment::Id::new(),
            booking_id,
            ledger_property_id: booking.ledger_property_id,
            from: booking.tenant.clone(),
            to: booking.owner.clone(),
            amount,
            kind,
            status: payment::Status::Pending,
            tx_hash: None,
            failure_reason: None,
            refund_of: None,
            due_date,
            period_start,
            period_end,
            created_at: DateTime::now().coerce(),
            confirmed_at: None,
            failed_at: None,
        };
        self.database()
            .execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let outcome = match self
            .ledger()
            .execute(infra::ledger::call::Pay {
                property_id: booking.ledger_property_id,
                amount,
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // Nothing was submitted, so the record fails outright.
                payment.status = payment::Status::Failed;
                payment.failed_at = Some(DateTime::now().coerce());
                payment.failure_reason =
                    Some(booking::FailureReason::truncated(e.to_string()));
                self.database()
                    .execute(Update(payment))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                return Err(e).map_err(tracerr::map_from_and_wrap!(=> E));
            }
        };

        payment.tx_hash = Some(outcome.tx_hash);
        match outcome.finality {
            infra::ledger::Finality::Final(
                infra::ledger::Execution::Succeeded,
            ) => {
                payment.status = payment::Status::Confirmed;
                payment.confirmed_at = Some(DateTime::now().coerce());
            }
            infra::ledger::Finality::Final(
                infra::ledger::Execution::Reverted(reason),
            ) => {
                payment.status = payment::Status::Failed;
                payment.failed_at = Some(DateTime::now().coerce());
                payment.failure_reason =
                    Some(booking::FailureReason::truncated(reason));
            }
            // Stays pending under its hash for reconciliation.
            infra::ledger::Finality::TimedOut => {}
        }
        self.database()
            .execute(Update(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if let Some(reason) = &payment.failure_reason {
            return Err(tracerr::new!(E::Rejected(reason.clone())));
        }
        Ok(payment)
    }
}

/// Error of [`CreatePayment`] [`Command`] execution.
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

    /// [`Booking`] is not in the [`booking::Status::Confirmed`] state.
    #[display("`Booking(id: {id})` is {status}, not CONFIRMED")]
    BookingNotActive {
        /// ID of the [`Booking`].
        id: booking::Id,

        /// Current [`booking::Status`].
        status: booking::Status,
    },

    /// Requester is not the tenant of the [`Booking`].
    ///
    /// [`Booking`]: crate::domain::Booking
    #[display("`Booking(id: {_0})` cannot be paid by this account")]
    #[from(ignore)]
    NotTenant(#[error(not(source))] booking::Id),

    /// All rent periods of the [`Booking`] are already paid.
    ///
    /// [`Booking`]: crate::domain::Booking
    #[display("`Booking(id: {_0})` has no unpaid rent periods left")]
    #[from(ignore)]
    FullyPaid(#[error(not(source))] booking::Id),

    /// Requested [`payment::Kind`] is a reversal.
    #[display("{_0} `Payment` cannot be requested directly")]
    #[from(ignore)]
    ReversalKind(#[error(not(source))] payment::Kind),

    /// Rent period boundaries are not representable.
    #[display("Rent period is out of range")]
    PeriodOutOfRange,

    /// Ledger reverted the transfer.
    #[display("Ledger rejected the payment: {_0}")]
    #[from(ignore)]
    Rejected(#[error(not(source))] booking::FailureReason),
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{
        domain::payment,
        infra::ledger::{Execution, Finality},
        testing,
    };

    use super::{CreatePayment, ExecutionError};

    #[tokio::test]
    async fn confirms_rent_payment() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        service
            .ledger()
            .push_pay_outcome(Finality::Final(Execution::Succeeded));

        let payment = service
            .execute(CreatePayment {
                booking_id: booking.id,
                kind: payment::Kind::Rent,
                amount: None,
                by: booking.tenant.clone(),
            })
            .await
            .unwrap();

        assert_eq!(payment.status, payment::Status::Confirmed);
        assert_eq!(payment.amount, booking.rent_per_month);
        assert!(payment.tx_hash.is_some());
        assert!(payment.period_start.is_some());
        assert!(payment.period_end.is_some());
    }

    #[tokio::test]
    async fn records_failure_on_revert() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        service.ledger().push_pay_outcome(Finality::Final(
            Execution::Reverted("insufficient funds".into()),
        ));

        let result = service
            .execute(CreatePayment {
                booking_id: booking.id,
                kind: payment::Kind::Deposit,
                amount: None,
                by: booking.tenant.clone(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::Rejected(_),
        ));
        let stored = service.database().payments();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, payment::Status::Failed);
        assert!(stored[0].failure_reason.is_some());
    }

    #[tokio::test]
    async fn keeps_pending_on_timeout() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        service.ledger().push_pay_outcome(Finality::TimedOut);

        let payment = service
            .execute(CreatePayment {
                booking_id: booking.id,
                kind: payment::Kind::Rent,
                amount: None,
                by: booking.tenant.clone(),
            })
            .await
            .unwrap();

        assert_eq!(payment.status, payment::Status::Pending);
        assert!(payment.tx_hash.is_some());
    }

    #[tokio::test]
    async fn rejects_overpaid_booking() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        for _ in 0..u32::from(booking.duration) {
            service
                .ledger()
                .push_pay_outcome(Finality::Final(Execution::Succeeded));
            _ = service
                .execute(CreatePayment {
                    booking_id: booking.id,
                    kind: payment::Kind::Rent,
                    amount: None,
                    by: booking.tenant.clone(),
                })
                .await
                .unwrap();
        }

        let result = service
            .execute(CreatePayment {
                booking_id: booking.id,
                kind: payment::Kind::Rent,
                amount: None,
                by: booking.tenant.clone(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::FullyPaid(_),
        ));
    }

    #[tokio::test]
    async fn rejects_reversal_kind() {
        let service = testing::service();
        let (_, booking) = testing::confirmed_booking(&service).await;

        let result = service
            .execute(CreatePayment {
                booking_id: booking.id,
                kind: payment::Kind::Refund,
                amount: None,
                by: booking.tenant.clone(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::ReversalKind(payment::Kind::Refund),
        ));
    }
}
