//! [`Command`] for reconciling a [`Property`] with the ledger.

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{property, Property},
    infra::{
        self,
        database::{self, Database},
        Ledger,
    },
    Service,
};

use super::Command;

/// [`Command`] for reconciling a [`Property`] with its on-ledger state.
///
/// The ledger is the source of truth: owner, tenant, rent and availability
/// are overwritten by what the settlement contract reports. The local
/// description is kept, since the on-ledger one is truncated to the short
/// string length.
#[derive(Clone, Copy, Debug)]
pub struct SyncProperty {
    /// ID of the [`Property`] to reconcile.
    pub property_id: property::Id,
}

impl<Db, Lg> Command<SyncProperty> for Service<Db, Lg>
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
        > + Database<Update<Property>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Ok = (), Err = Traced<database::Error>>,
    Lg: Ledger<
        infra::ledger::view::Property,
        Ok = infra::ledger::PropertyView,
        Err = Traced<infra::ledger::Error>,
    >,
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: SyncProperty) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SyncProperty { property_id } = cmd;

        let mut property = self
            .database()
            .execute(Select(By::<Option<Property>, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())?;

        let view = self
            .ledger()
            .execute(infra::ledger::view::Property(property.ledger_id))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        property.owner = view.owner;
        property.rent_per_month = view.rent_per_month;
        property.tenant = view.tenant;
        property.availability = if view.is_available {
            property::Availability::Available
        } else if property.tenant.is_some() {
            property::Availability::Booked
        } else {
            // Unavailable without a tenant: withdrawn on the ledger side.
            property::Availability::Maintenance
        };
        if property.availability != property::Availability::Booked {
            property.lease_end = None;
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Property`.
        tx.execute(Lock(By::new(property.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Update(property.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(property)
    }
}

/// Error of [`SyncProperty`] [`Command`] execution.
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
}

#[cfg(test)]
mod spec {
    use common::{Amount, Handler as _};

    use crate::{domain::property, infra::ledger::PropertyView, testing};

    use super::SyncProperty;

    #[tokio::test]
    async fn overwrites_local_state() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        service.ledger().push_property_view(PropertyView {
            owner: property.owner.clone(),
            tenant: Some(testing::tenant()),
            rent_per_month: Amount::from(1500),
            is_available: false,
            description: "Sunny loft".into(),
        });

        let synced = service
            .execute(SyncProperty {
                property_id: property.id,
            })
            .await
            .unwrap();

        assert_eq!(synced.availability, property::Availability::Booked);
        assert_eq!(synced.tenant, Some(testing::tenant()));
        assert_eq!(synced.rent_per_month, Amount::from(1500));
        // Local description survives the overwrite.
        assert_eq!(synced.description, property.description);
    }

    #[tokio::test]
    async fn releases_freed_property() {
        let service = testing::service();
        let (property, _) = testing::confirmed_booking(&service).await;

        service.ledger().push_property_view(PropertyView {
            owner: property.owner.clone(),
            tenant: None,
            rent_per_month: property.rent_per_month,
            is_available: true,
            description: String::new(),
        });

        let synced = service
            .execute(SyncProperty {
                property_id: property.id,
            })
            .await
            .unwrap();

        assert_eq!(synced.availability, property::Availability::Available);
        assert_eq!(synced.tenant, None);
        assert_eq!(synced.lease_end, None);
    }
}
