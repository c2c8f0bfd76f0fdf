//! [`Command`] for delisting a [`Property`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{property, Address, Property},
    infra::database::{self, Database},
    Service,
};

use super::Command;

/// [`Command`] for withdrawing a [`Property`] from the catalogue for good.
///
/// The record survives so its booking and payment history stays
/// resolvable, but the [`Property`] no longer shows up in listings and
/// accepts no further bookings. A [`Property`] under an active lease
/// cannot be delisted.
#[derive(Clone, Debug)]
pub struct DelistProperty {
    /// ID of the [`Property`] to delist.
    pub property_id: property::Id,

    /// [`Address`] of the account requesting the delisting.
    pub by: Address,
}

impl<Db, Lg> Command<DelistProperty> for Service<Db, Lg>
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
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DelistProperty,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let DelistProperty { property_id, by } = cmd;

        let mut property = self
            .database()
            .execute(Select(By::<Option<Property>, _>::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PropertyNotExists(property_id))
            .map_err(tracerr::wrap!())?;

        if property.owner != by {
            return Err(tracerr::new!(E::NotOwner(property_id)));
        }
        if property.is_deactivated() {
            // Nothing to delist.
            return Ok(property);
        }
        if property.availability == property::Availability::Booked {
            return Err(tracerr::new!(E::ActiveLease(property_id)));
        }

        property.deactivated_at = Some(property::DeactivationDateTime::now());

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Property`.
        tx.execute(Lock(By::new(property_id)))
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

/// Error of [`DelistProperty`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Property`] with the provided ID does not exist.
    #[display("`Property(id: {_0})` does not exist")]
    #[from(ignore)]
    PropertyNotExists(#[error(not(source))] property::Id),

    /// Requester is not the owner of the [`Property`].
    #[display("`Property(id: {_0})` delisting requires the owner account")]
    #[from(ignore)]
    NotOwner(#[error(not(source))] property::Id),

    /// [`Property`] is rented out under an active lease.
    #[display("`Property(id: {_0})` is under an active lease")]
    #[from(ignore)]
    ActiveLease(#[error(not(source))] property::Id),
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::testing;

    use super::{DelistProperty, ExecutionError};

    #[tokio::test]
    async fn deactivates_property() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        let delisted = service
            .execute(DelistProperty {
                property_id: property.id,
                by: property.owner.clone(),
            })
            .await
            .unwrap();

        assert!(delisted.is_deactivated());
    }

    #[tokio::test]
    async fn is_idempotent() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        let first = service
            .execute(DelistProperty {
                property_id: property.id,
                by: property.owner.clone(),
            })
            .await
            .unwrap();
        let second = service
            .execute(DelistProperty {
                property_id: property.id,
                by: property.owner.clone(),
            })
            .await
            .unwrap();

        assert_eq!(second.deactivated_at, first.deactivated_at);
    }

    #[tokio::test]
    async fn rejects_booked_property() {
        let service = testing::service();
        let (property, _) = testing::confirmed_booking(&service).await;

        let result = service
            .execute(DelistProperty {
                property_id: property.id,
                by: property.owner.clone(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::ActiveLease(_),
        ));
    }

    #[tokio::test]
    async fn rejects_non_owner() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        let result = service
            .execute(DelistProperty {
                property_id: property.id,
                by: testing::stranger(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::NotOwner(_),
        ));
    }
}
