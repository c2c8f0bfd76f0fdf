//! [`Command`] for toggling the maintenance state of a [`Property`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{property, Address, Property},
    infra::database::{self, Database},
    Service,
};

use super::Command;

/// [`Command`] for withdrawing a [`Property`] from booking, or returning it
/// back.
///
/// Maintenance is a local concern, so the ledger is not involved. A
/// [`Property`] under an active lease cannot be withdrawn.
#[derive(Clone, Debug)]
pub struct ToggleMaintenance {
    /// ID of the [`Property`] to toggle.
    pub property_id: property::Id,

    /// Indicator whether maintenance is being enabled or disabled.
    pub enabled: bool,

    /// [`Address`] of the account requesting the toggle.
    pub by: Address,
}

impl<Db, Lg> Command<ToggleMaintenance> for Service<Db, Lg>
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
        > + Database<
            Update<property::Upkeep>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Commit, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ToggleMaintenance,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ToggleMaintenance {
            property_id,
            enabled,
            by,
        } = cmd;

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
            return Err(tracerr::new!(E::Deactivated(property_id)));
        }

        let target = if enabled {
            property::Availability::Maintenance
        } else {
            property::Availability::Available
        };
        if property.availability == target {
            // Nothing to toggle.
            return Ok(property);
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Property`.
        tx.execute(Lock(By::new(property_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let toggled = tx
            .execute(Update(property::Upkeep {
                id: property_id,
                enabled,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !toggled {
            return Err(tracerr::new!(E::InvalidAvailability {
                id: property_id,
                availability: property.availability,
            }));
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        property.availability = target;
        Ok(property)
    }
}

/// Error of [`ToggleMaintenance`] [`Command`] execution.
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
    #[display("`Property(id: {_0})` maintenance requires the owner account")]
    #[from(ignore)]
    NotOwner(#[error(not(source))] property::Id),

    /// [`Property`] is deactivated.
    #[display("`Property(id: {_0})` is deactivated")]
    #[from(ignore)]
    Deactivated(#[error(not(source))] property::Id),

    /// Current [`property::Availability`] forbids the toggle.
    #[display("`Property(id: {id})` is {availability} and cannot be toggled")]
    InvalidAvailability {
        /// ID of the [`Property`].
        id: property::Id,

        /// Current [`property::Availability`].
        availability: property::Availability,
    },
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{domain::property, testing};

    use super::{ExecutionError, ToggleMaintenance};

    #[tokio::test]
    async fn withdraws_and_returns() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        let withdrawn = service
            .execute(ToggleMaintenance {
                property_id: property.id,
                enabled: true,
                by: property.owner.clone(),
            })
            .await
            .unwrap();
        assert_eq!(
            withdrawn.availability,
            property::Availability::Maintenance,
        );

        let returned = service
            .execute(ToggleMaintenance {
                property_id: property.id,
                enabled: false,
                by: property.owner.clone(),
            })
            .await
            .unwrap();
        assert_eq!(
            returned.availability,
            property::Availability::Available,
        );
    }

    #[tokio::test]
    async fn rejects_booked_property() {
        let service = testing::service();
        let (property, _) = testing::confirmed_booking(&service).await;

        let result = service
            .execute(ToggleMaintenance {
                property_id: property.id,
                enabled: true,
                by: property.owner.clone(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::InvalidAvailability { .. },
        ));
    }

    #[tokio::test]
    async fn rejects_non_owner() {
        let service = testing::service();
        let property = testing::available_property(&service).await;

        let result = service
            .execute(ToggleMaintenance {
                property_id: property.id,
                enabled: true,
                by: testing::stranger(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::NotOwner(_),
        ));
    }
}
