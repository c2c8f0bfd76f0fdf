//! [`Command`] for resolving a [`payment::Status::Pending`] [`Payment`].

use common::{
    operations::{By, Select, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, payment, Payment},
    infra::{
        self,
        database::{self, Database},
        Ledger,
    },
    Service,
};

use super::Command;

/// [`Command`] for resolving a [`payment::Status::Pending`] [`Payment`]
/// against the ledger.
///
/// Looks up the receipt of the [`Payment`]'s transfer transaction and drives
/// the record to the state the ledger actually reached. A receipt not yet
/// visible leaves the [`Payment`] pending.
///
/// A [`Payment`] already in a terminal [`payment::Status`] is returned
/// as-is.
#[derive(Clone, Copy, Debug)]
pub struct ReconcilePayment {
    /// ID of the [`Payment`] to reconcile.
    pub payment_id: payment::Id,
}

impl<Db, Lg> Command<ReconcilePayment> for Service<Db, Lg>
where
    Db: Database<
            Select<By<Option<Payment>, payment::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Update<Payment>, Ok = (), Err = Traced<database::Error>>,
    Lg: Ledger<
        infra::ledger::view::Receipt,
        Ok = Option<infra::ledger::Execution>,
        Err = Traced<infra::ledger::Error>,
    >,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ReconcilePayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ReconcilePayment { payment_id } = cmd;

        let mut payment = self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(payment_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(payment_id))
            .map_err(tracerr::wrap!())?;

        if payment.status != payment::Status::Pending {
            return Ok(payment);
        }
        let tx_hash = payment
            .tx_hash
            .clone()
            .ok_or(E::NoTransaction(payment_id))
            .map_err(tracerr::wrap!())?;

        let receipt = self
            .ledger()
            .execute(infra::ledger::view::Receipt(tx_hash))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        match receipt {
            // Not settled yet: stays pending until the next run.
            None => return Ok(payment),
            Some(infra::ledger::Execution::Succeeded) => {
                payment.status = payment::Status::Confirmed;
                payment.confirmed_at = Some(DateTime::now().coerce());
            }
            Some(infra::ledger::Execution::Reverted(reason)) => {
                payment.status = payment::Status::Failed;
                payment.failed_at = Some(DateTime::now().coerce());
                payment.failure_reason =
                    Some(booking::FailureReason::truncated(reason));
            }
        }

        self.database()
            .execute(Update(payment.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(payment)
    }
}

/// Error of [`ReconcilePayment`] [`Command`] execution.
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

    /// Pending [`Payment`] has no transfer transaction to check.
    #[display("`Payment(id: {_0})` has no transaction hash")]
    #[from(ignore)]
    NoTransaction(#[error(not(source))] payment::Id),
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{domain::payment, infra::ledger::Execution, testing};

    use super::ReconcilePayment;

    #[tokio::test]
    async fn confirms_settled_payment() {
        let service = testing::service();
        let (_, _, payment) = testing::pending_payment(&service).await;

        service.ledger().push_receipt(Some(Execution::Succeeded));

        let reconciled = service
            .execute(ReconcilePayment {
                payment_id: payment.id,
            })
            .await
            .unwrap();

        assert_eq!(reconciled.status, payment::Status::Confirmed);
        assert!(reconciled.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn fails_reverted_payment() {
        let service = testing::service();
        let (_, _, payment) = testing::pending_payment(&service).await;

        service.ledger().push_receipt(Some(Execution::Reverted(
            "insufficient funds".into(),
        )));

        let reconciled = service
            .execute(ReconcilePayment {
                payment_id: payment.id,
            })
            .await
            .unwrap();

        assert_eq!(reconciled.status, payment::Status::Failed);
        assert!(reconciled.failure_reason.is_some());
    }

    #[tokio::test]
    async fn keeps_unsettled_payment_pending() {
        let service = testing::service();
        let (_, _, payment) = testing::pending_payment(&service).await;

        service.ledger().push_receipt(None);

        let reconciled = service
            .execute(ReconcilePayment {
                payment_id: payment.id,
            })
            .await
            .unwrap();

        assert_eq!(reconciled.status, payment::Status::Pending);
    }
}
