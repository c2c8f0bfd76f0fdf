//! [`ExpireLeases`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Perform, Start},
    DateTime,
};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Booking;
use crate::{
    infra::{database, Database},
    read, Service,
};

use super::Task;

/// Configuration for [`ExpireLeases`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between expiry sweeps.
    pub interval: time::Duration,
}

/// [`Task`] sweeping [`Booking`]s whose lease has elapsed.
///
/// Each run expires the elapsed [`Booking`]s and releases their properties
/// in a single atomic statement, so a run racing another one expires every
/// lease at most once.
#[derive(Clone, Copy, Debug)]
pub struct ExpireLeases<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Lg> Task<Start<By<ExpireLeases<Self>, Config>>> for Service<Db, Lg>
where
    ExpireLeases<Service<Db, Lg>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpireLeases<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpireLeases {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::ExpireLeases` failed: {e}");
            });
        }
    }
}

impl<Db, Lg> Task<Perform<()>> for ExpireLeases<Service<Db, Lg>>
where
    Db: Database<
        Perform<read::booking::Expiry>,
        Ok = u64,
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline = DateTime::now().coerce();
        let expired = self
            .service
            .database()
            .execute(Perform(read::booking::Expiry(deadline)))
            .await
            .map_err(tracerr::map_from_and_wrap!())?;
        if expired > 0 {
            log::info!(expired, "elapsed leases swept");
        }
        Ok(())
    }
}

/// Error of [`ExpireLeases`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time;

    use common::{operations::Perform, DateTime, Handler as _};

    use crate::{
        domain::{booking, property, Booking, Property},
        testing,
    };

    use super::{Config, ExpireLeases};

    fn sweeper(
        service: &crate::Service<testing::MockDb, testing::MockLedger>,
    ) -> ExpireLeases<crate::Service<testing::MockDb, testing::MockLedger>> {
        ExpireLeases {
            config: Config {
                interval: time::Duration::from_secs(60),
            },
            service: service.clone(),
        }
    }

    async fn elapsed_lease(
        service: &crate::Service<testing::MockDb, testing::MockLedger>,
    ) -> (Property, Booking) {
        let (property, mut booking) =
            testing::confirmed_booking(service).await;
        booking.lease_start = DateTime::from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .coerce();
        booking.lease_end = DateTime::from_rfc3339("2024-07-01T00:00:00Z")
            .unwrap()
            .coerce();
        service.database().store_booking(booking.clone());
        (property, booking)
    }

    #[tokio::test]
    async fn expires_elapsed_lease() {
        let service = testing::service();
        let (property, booking) = elapsed_lease(&service).await;

        sweeper(&service).execute(Perform(())).await.unwrap();

        let swept = service
            .database()
            .bookings()
            .into_iter()
            .find(|b| b.id == booking.id)
            .unwrap();
        assert_eq!(swept.status, booking::Status::Expired);
        assert!(swept.expired_at.is_some());

        let released = service.database().property(property.id).unwrap();
        assert_eq!(released.availability, property::Availability::Available);
        assert_eq!(released.tenant, None);
        assert_eq!(released.lease_end, None);
    }

    #[tokio::test]
    async fn sweeps_each_lease_once() {
        let service = testing::service();
        let (property, booking) = elapsed_lease(&service).await;
        let task = sweeper(&service);

        task.execute(Perform(())).await.unwrap();
        let first = service
            .database()
            .bookings()
            .into_iter()
            .find(|b| b.id == booking.id)
            .unwrap();

        task.execute(Perform(())).await.unwrap();
        let second = service
            .database()
            .bookings()
            .into_iter()
            .find(|b| b.id == booking.id)
            .unwrap();

        assert_eq!(first.status, booking::Status::Expired);
        assert_eq!(second.status, booking::Status::Expired);
        assert_eq!(first.expired_at, second.expired_at);

        let released = service.database().property(property.id).unwrap();
        assert_eq!(released.availability, property::Availability::Available);
    }

    #[tokio::test]
    async fn leaves_active_lease_alone() {
        let service = testing::service();
        let (property, booking) = testing::confirmed_booking(&service).await;

        sweeper(&service).execute(Perform(())).await.unwrap();

        let kept = service
            .database()
            .bookings()
            .into_iter()
            .find(|b| b.id == booking.id)
            .unwrap();
        assert_eq!(kept.status, booking::Status::Confirmed);
        assert!(kept.expired_at.is_none());

        let stored = service.database().property(property.id).unwrap();
        assert_eq!(stored.availability, property::Availability::Booked);
    }
}
