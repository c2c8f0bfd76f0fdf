//! [`Command`] for recording a reversal of a [`Payment`].

use common::{
    operations::{By, Insert, Select},
    Amount, DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, ledger, payment, Address, Booking, Payment},
    infra::{
        self,
        database::{self, Database},
        Ledger,
    },
    Service,
};

use super::Command;

/// [`Command`] for recording a refund or a penalty against a settled
/// [`Payment`].
///
/// The settlement contract has no reversal entrypoint, so the transfer
/// itself happens out-of-band and only its transaction hash is provided
/// here. The receipt is verified through the ledger: the recorded
/// [`Payment`] becomes confirmed, failed or pending strictly by what the
/// ledger reports, never by assumption.
#[derive(Clone, Debug)]
pub struct RecordRefund {
    /// ID of the original [`Payment`] being reversed.
    pub payment_id: payment::Id,

    /// [`payment::Kind`] of the reversal.
    ///
    /// Must be [`payment::Kind::Refund`] or [`payment::Kind::Penalty`].
    pub kind: payment::Kind,

    /// [`Amount`] reversed, if it differs from the original one.
    pub amount: Option<Amount>,

    /// Hash of the out-of-band transfer transaction.
    pub tx_hash: ledger::TxHash,

    /// [`Address`] of the account recording the reversal.
    pub by: Address,
}

impl<Db, Lg> Command<RecordRefund> for Service<Db, Lg>
where
    Db: Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Ok = (), Err = Traced<database::Error>>,
    Lg: Ledger<
        infra::ledger::view::Receipt,
        Ok = Option<infra::ledger::Execution>,
        Err = Traced<infra::ledger::Error>,
    >,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RecordRefund) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RecordRefund {
            payment_id,
            kind,
            amount,
            tx_hash,
            by,
        } = cmd;

        if !kind.is_reversal() {
            return Err(tracerr::new!(E::NotReversal(kind)));
        }

        let original = self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(payment_id))
            .map_err(tracerr::wrap!())?;
        if original.status != payment::Status::Confirmed {
            return Err(tracerr::new!(E::OriginalNotSettled {
                id: payment_id,
                status: original.status,
            }));
        }

        let amount = amount.unwrap_or(original.amount);
        if amount > original.amount {
            return Err(tracerr::new!(E::ExceedsOriginal {
                amount,
                original: original.amount,
            }));
        }

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(original.booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(original.booking_id))
            .map_err(tracerr::wrap!())?;
        if booking.owner != by {
            return Err(tracerr::new!(E::NotOwner(original.booking_id)));
        }

        let receipt = self
            .ledger()
            .execute(infra::ledger::view::Receipt(tx_hash.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let (status, confirmed_at, failed_at, failure_reason) = match receipt {
            None => (payment::Status::Pending, None, None, None),
            Some(infra::ledger::Execution::Succeeded) => (
                payment::Status::Confirmed,
                Some(DateTime::now().coerce()),
                None,
                None,
            ),
            Some(infra::ledger::Execution::Reverted(reason)) => (
                payment::Status::Failed,
                None,
                Some(DateTime::now().coerce()),
                Some(booking::FailureReason::truncated(reason)),
            ),
        };

        // A refund flows back to the payer, a penalty is withheld in the
        // original direction.
        let (from, to) = if kind == payment::Kind::Refund {
            (original.to.clone(), original.from.clone())
        } else {
            (original.from.clone(), original.to.clone())
        };

        let payment = Payment {
            id: payment::Id::new(),
            booking_id: original.booking_id,
            ledger_property_id: original.ledger_property_id,
            from,
            to,
            amount,
            kind,
            status,
            tx_hash: Some(tx_hash),
            failure_reason,
            refund_of: Some(original.id),
            due_date: None,
            period_start: None,
            period_end: None,
            created_at: DateTime::now().coerce(),
            confirmed_at,
            failed_at,
        };
        self.database()
            .execute(Insert(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(payment)
    }
}

/// Error of [`RecordRefund`] [`Command`] execution.
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

    /// [`Payment`] with the provided ID does not exist.
    #[display("`Payment(id: {_0})` does not exist")]
    #[from(ignore)]
    PaymentNotExists(#[error(not(source))] payment::Id),

    /// [`Booking`] of the original [`Payment`] does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    #[from(ignore)]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// Original [`Payment`] is not settled.
    #[display("`Payment(id: {id})` is {status}, not CONFIRMED")]
    OriginalNotSettled {
        /// ID of the original [`Payment`].
        id: payment::Id,

        /// Current [`payment::Status`] of the original [`Payment`].
        status: payment::Status,
    },

    /// Requested [`payment::Kind`] is not a reversal.
    #[display("{_0} `Payment` is not a reversal")]
    #[from(ignore)]
    NotReversal(#[error(not(source))] payment::Kind),

    /// Reversed [`Amount`] exceeds the original one.
    #[display("Reversed amount {amount} exceeds the original {original}")]
    ExceedsOriginal {
        /// Requested [`Amount`].
        amount: Amount,

        /// [`Amount`] of the original [`Payment`].
        original: Amount,
    },

    /// Requester is not the owner within the [`Booking`].
    ///
    /// [`Booking`]: crate::domain::Booking
    #[display("`Booking(id: {_0})` reversals require the owner account")]
    #[from(ignore)]
    NotOwner(#[error(not(source))] booking::Id),
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{domain::payment, infra::ledger::Execution, testing};

    use super::{ExecutionError, RecordRefund};

    #[tokio::test]
    async fn confirms_verified_refund() {
        let service = testing::service();
        let (_, booking, original) =
            testing::confirmed_payment(&service).await;

        service.ledger().push_receipt(Some(Execution::Succeeded));

        let refund = service
            .execute(RecordRefund {
                payment_id: original.id,
                kind: payment::Kind::Refund,
                amount: None,
                tx_hash: testing::tx_hash(),
                by: booking.owner.clone(),
            })
            .await
            .unwrap();

        assert_eq!(refund.status, payment::Status::Confirmed);
        assert_eq!(refund.refund_of, Some(original.id));
        // Funds flow back to the payer.
        assert_eq!(refund.from, original.to);
        assert_eq!(refund.to, original.from);
    }

    #[tokio::test]
    async fn records_pending_without_receipt() {
        let service = testing::service();
        let (_, booking, original) =
            testing::confirmed_payment(&service).await;

        service.ledger().push_receipt(None);

        let refund = service
            .execute(RecordRefund {
                payment_id: original.id,
                kind: payment::Kind::Penalty,
                amount: None,
                tx_hash: testing::tx_hash(),
                by: booking.owner.clone(),
            })
            .await
            .unwrap();

        assert_eq!(refund.status, payment::Status::Pending);
        // A penalty keeps the original direction.
        assert_eq!(refund.from, original.from);
        assert_eq!(refund.to, original.to);
    }

    #[tokio::test]
    async fn rejects_excessive_amount() {
        let service = testing::service();
        let (_, booking, original) =
            testing::confirmed_payment(&service).await;

        let excessive = original.amount.checked_mul(2).unwrap();
        let result = service
            .execute(RecordRefund {
                payment_id: original.id,
                kind: payment::Kind::Refund,
                amount: Some(excessive),
                tx_hash: testing::tx_hash(),
                by: booking.owner.clone(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::ExceedsOriginal { .. },
        ));
    }

    #[tokio::test]
    async fn rejects_non_owner() {
        let service = testing::service();
        let (_, booking, original) =
            testing::confirmed_payment(&service).await;

        service.ledger().push_receipt(Some(Execution::Succeeded));

        let result = service
            .execute(RecordRefund {
                payment_id: original.id,
                kind: payment::Kind::Refund,
                amount: None,
                tx_hash: testing::tx_hash(),
                by: booking.tenant.clone(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::NotOwner(_),
        ));
    }
}
