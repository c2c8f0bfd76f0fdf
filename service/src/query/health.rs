//! [`Query`] collection related to the system health.

use std::convert::Infallible;

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::ledger,
    infra::{self, database, Database, Ledger},
    read, Service,
};

use super::Query;

/// [`Query`] probing the system's external collaborators.
///
/// Never errors itself: an unreachable collaborator is reported inside the
/// [`read::health::Report`] instead.
#[derive(Clone, Copy, Debug)]
pub struct Check;

impl<Db, Lg> Query<Check> for Service<Db, Lg>
where
    Db: Database<
        Select<By<read::health::Storage, ()>>,
        Ok = (),
        Err = Traced<database::Error>,
    >,
    Lg: Ledger<
        infra::ledger::view::Count,
        Ok = ledger::Id,
        Err = Traced<infra::ledger::Error>,
    >,
{
    type Ok = read::health::Report;
    type Err = Infallible;

    async fn execute(&self, _: Check) -> Result<Self::Ok, Self::Err> {
        let storage = match self.database().execute(Select(By::new(()))).await
        {
            Ok(()) => read::health::Component {
                ok: true,
                error: None,
            },
            Err(e) => read::health::Component {
                ok: false,
                error: Some(e.to_string()),
            },
        };

        let ledger = match self
            .ledger()
            .execute(infra::ledger::view::Count)
            .await
        {
            Ok(_) => read::health::Component {
                ok: true,
                error: None,
            },
            Err(e) => read::health::Component {
                ok: false,
                error: Some(e.to_string()),
            },
        };

        Ok(read::health::Report { storage, ledger })
    }
}
