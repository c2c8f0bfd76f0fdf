//! [`Command`] for listing a new [`Property`].

use common::{operations::Insert, Amount, DateTime};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, ledger, property, Address, Property},
    infra::{
        self,
        database::{self, Database},
        Ledger,
    },
    Service,
};

use super::Command;

/// [`Command`] for listing a new [`Property`] on the ledger.
///
/// The local [`Property`] record mirrors the listing the settlement contract
/// accepted, so it's persisted only after ledger success and carries the
/// contract-assigned [`ledger::Id`]. An unknown outcome surfaces as an error
/// with the transaction hash: without the assigned ID there is nothing
/// consistent to persist yet.
#[derive(Clone, Debug)]
pub struct ListProperty {
    /// [`Address`] of the account owning the new [`Property`].
    pub owner: Address,

    /// Monthly rent of the new [`Property`].
    pub rent_per_month: Amount,

    /// Description of the new [`Property`].
    pub description: property::Description,
}

impl<Db, Lg> Command<ListProperty> for Service<Db, Lg>
where
    Db: Database<Insert<Property>, Ok = (), Err = Traced<database::Error>>,
    Lg: Ledger<
            infra::ledger::call::List,
            Ok = infra::ledger::Outcome,
            Err = Traced<infra::ledger::Error>,
        > + Ledger<
            infra::ledger::view::Count,
            Ok = ledger::Id,
            Err = Traced<infra::ledger::Error>,
        >,
{
    type Ok = Property;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ListProperty) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ListProperty {
            owner,
            rent_per_month,
            description,
        } = cmd;

        if owner.is_zero() {
            return Err(tracerr::new!(E::ZeroOwner));
        }
        if rent_per_month == Amount::default() {
            return Err(tracerr::new!(E::ZeroRent));
        }

        let outcome = self
            .ledger()
            .execute(infra::ledger::call::List {
                rent_per_month,
                description: description.clone(),
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        match outcome.finality {
            infra::ledger::Finality::Final(
                infra::ledger::Execution::Succeeded,
            ) => {}
            infra::ledger::Finality::Final(
                infra::ledger::Execution::Reverted(reason),
            ) => {
                return Err(tracerr::new!(E::Rejected(
                    booking::FailureReason::truncated(reason),
                )));
            }
            infra::ledger::Finality::TimedOut => {
                return Err(tracerr::new!(E::TimedOut {
                    tx_hash: outcome.tx_hash,
                }));
            }
        }

        // IDs are assigned by the contract sequentially, so the listed
        // property is the last one.
        let count = self
            .ledger()
            .execute(infra::ledger::view::Count)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let ledger_id = ledger::Id::from(
            u64::from(count)
                .checked_sub(1)
                .ok_or(E::CountOutOfSync)
                .map_err(tracerr::wrap!())?,
        );

        let property = Property {
            id: property::Id::new(),
            ledger_id,
            owner,
            tenant: None,
            rent_per_month,
            description,
            availability: property::Availability::Available,
            lease_end: None,
            created_at: DateTime::now().coerce(),
            deactivated_at: None,
        };
        self.database()
            .execute(Insert(property.clone()))
            .await
            .map_err(|source| {
                tracerr::new!(E::Persistence {
                    tx_hash: outcome.tx_hash,
                    source,
                })
            })?;

        Ok(property)
    }
}

/// Error of [`ListProperty`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Ledger`] error.
    ///
    /// [`Ledger`]: crate::infra::Ledger
    #[display("`Ledger` invocation failed: {_0}")]
    Ledger(infra::ledger::Error),

    /// Owner is the zero address.
    #[display("Zero `Address` cannot own a `Property`")]
    ZeroOwner,

    /// Monthly rent is zero.
    #[display("Monthly rent cannot be zero")]
    ZeroRent,

    /// Ledger reverted the listing.
    #[display("Ledger rejected the listing: {_0}")]
    #[from(ignore)]
    Rejected(#[error(not(source))] booking::FailureReason),

    /// Outcome of the listing is unknown.
    #[display("Listing finality timed out, transaction: {tx_hash}")]
    TimedOut {
        /// Hash of the submitted transaction.
        tx_hash: ledger::TxHash,
    },

    /// Ledger reported no properties after a successful listing.
    #[display("Ledger property count is out of sync")]
    CountOutOfSync,

    /// Accepted listing failed to persist.
    #[display(
        "`Property` listed as `{tx_hash}`, but failed to persist: {source}"
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
    use common::{Amount, Handler as _};

    use crate::{
        domain::property,
        infra::ledger::{Execution, Finality},
        testing,
    };

    use super::{ExecutionError, ListProperty};

    #[tokio::test]
    async fn persists_accepted_listing() {
        let service = testing::service();

        service
            .ledger()
            .push_list_outcome(Finality::Final(Execution::Succeeded));
        service.ledger().set_property_count(3);

        let listed = service
            .execute(ListProperty {
                owner: testing::owner(),
                rent_per_month: Amount::from(1000),
                description: property::Description::new("Sunny loft")
                    .unwrap(),
            })
            .await
            .unwrap();

        assert_eq!(u64::from(listed.ledger_id), 2);
        assert_eq!(
            listed.availability,
            property::Availability::Available,
        );
        assert!(service.database().property(listed.id).is_some());
    }

    #[tokio::test]
    async fn persists_nothing_on_rejection() {
        let service = testing::service();

        service.ledger().push_list_outcome(Finality::Final(
            Execution::Reverted("rent out of bounds".into()),
        ));

        let result = service
            .execute(ListProperty {
                owner: testing::owner(),
                rent_per_month: Amount::from(1000),
                description: property::Description::new("Sunny loft")
                    .unwrap(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::Rejected(_),
        ));
        assert!(service.database().properties().is_empty());
    }

    #[tokio::test]
    async fn surfaces_timeout_with_tx_hash() {
        let service = testing::service();

        service.ledger().push_list_outcome(Finality::TimedOut);

        let result = service
            .execute(ListProperty {
                owner: testing::owner(),
                rent_per_month: Amount::from(1000),
                description: property::Description::new("Sunny loft")
                    .unwrap(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::TimedOut { .. },
        ));
        assert!(service.database().properties().is_empty());
    }

    #[tokio::test]
    async fn rejects_zero_rent() {
        let service = testing::service();

        let result = service
            .execute(ListProperty {
                owner: testing::owner(),
                rent_per_month: Amount::from(0),
                description: property::Description::new("Sunny loft")
                    .unwrap(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::ZeroRent,
        ));
        assert_eq!(service.ledger().submissions(), 0);
    }
}
