//! [`ReconcilePending`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Perform, Select, Start},
    DateTime,
};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{ReconcileBooking, ReconcilePayment},
    domain::{Booking, Payment},
    infra::{database, Database},
    read, Command, Service,
};

use super::Task;

/// Configuration for [`ReconcilePending`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between reconciliation runs.
    pub interval: time::Duration,

    /// Age a pending record must reach before it's reconciled.
    ///
    /// Keeps the task from racing in-flight requests that are still
    /// awaiting finality themselves.
    pub grace: time::Duration,
}

/// [`Task`] resolving pending [`Booking`]s and [`Payment`]s against the
/// ledger.
///
/// Records left pending by a finality timeout carry their transaction hash,
/// so each run re-checks their receipts and drives them to the terminal
/// state the ledger actually reached. A single failed record doesn't abort
/// the run.
#[derive(Clone, Copy, Debug)]
pub struct ReconcilePending<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Lg> Task<Start<By<ReconcilePending<Self>, Config>>>
    for Service<Db, Lg>
where
    ReconcilePending<Service<Db, Lg>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ReconcilePending<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ReconcilePending {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::ReconcilePending` failed: {e}");
            });
        }
    }
}

impl<Db, Lg> Task<Perform<()>> for ReconcilePending<Service<Db, Lg>>
where
    Db: Database<
            Select<By<Vec<Booking>, read::booking::PendingBefore>>,
            Ok = Vec<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Payment>, read::payment::PendingBefore>>,
            Ok = Vec<Payment>,
            Err = Traced<database::Error>,
        >,
    Service<Db, Lg>: Command<ReconcileBooking, Ok = Booking, Err: Error>
        + Command<ReconcilePayment, Ok = Payment, Err: Error>,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline = DateTime::now() - self.config.grace;

        let bookings = self
            .service
            .database()
            .execute(Select(By::new(read::booking::PendingBefore(
                deadline.coerce(),
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        for booking in bookings {
            _ = self
                .service
                .execute(ReconcileBooking {
                    booking_id: booking.id,
                })
                .await
                .map_err(|e| {
                    log::warn!(
                        booking_id = %booking.id,
                        "failed to reconcile pending `Booking`: {e}",
                    );
                });
        }

        let payments = self
            .service
            .database()
            .execute(Select(By::new(read::payment::PendingBefore(
                deadline.coerce(),
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        for payment in payments {
            _ = self
                .service
                .execute(ReconcilePayment {
                    payment_id: payment.id,
                })
                .await
                .map_err(|e| {
                    log::warn!(
                        payment_id = %payment.id,
                        "failed to reconcile pending `Payment`: {e}",
                    );
                });
        }

        Ok(())
    }
}

/// Error of [`ReconcilePending`] execution.
pub type ExecutionError = Traced<database::Error>;
