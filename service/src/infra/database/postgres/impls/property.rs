//! [`Property`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Lock, Select, Update};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{ledger, property, Property},
    infra::{
        database::{
            self,
            postgres::{Connection, FuzzPattern},
            Postgres,
        },
        Database,
    },
    read,
};

impl<C, IDs> Database<Select<By<HashMap<property::Id, Property>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[property::Id]>,
{
    type Ok = HashMap<property::Id, Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<property::Id, Property>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[property::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        const SQL: &str = "\
            SELECT id, ledger_id, owner, tenant, \
                   rent_per_month, description, availability, lease_end, \
                   created_at, deactivated_at \
            FROM properties \
            WHERE id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
            LIMIT $2::INT4";
        Ok(self
            .query(SQL, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                (id, property_from_row(&row, id))
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Property>, property::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<property::Id, Property>, [property::Id; 1]>>,
        Ok = HashMap<property::Id, Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Select<By<Option<Property>, ledger::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<Option<Property>, property::Id>>,
        Ok = Option<Property>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, ledger::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let ledger_id: ledger::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id \
            FROM properties \
            WHERE ledger_id = $1::INT8 \
            LIMIT 1";
        let Some(row) = self
            .query_opt(SQL, &[&ledger_id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        self.execute(Select(By::new(row.get("id"))))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<Property>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Property>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(property))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Property>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(property): Update<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        let Property {
            id,
            ledger_id,
            owner,
            tenant,
            rent_per_month,
            description,
            availability,
            lease_end,
            created_at,
            deactivated_at,
        } = property;

        const SQL: &str = "\
            INSERT INTO properties (\
                id, ledger_id, owner, tenant, \
                rent_per_month, description, availability, lease_end, \
                created_at, deactivated_at \
            ) VALUES (\
                $1::UUID, $2::INT8, $3::VARCHAR, $4::VARCHAR, \
                $5::NUMERIC, $6::VARCHAR, $7::INT2, $8::TIMESTAMPTZ, \
                $9::TIMESTAMPTZ, $10::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET ledger_id = EXCLUDED.ledger_id, \
                owner = EXCLUDED.owner, \
                tenant = EXCLUDED.tenant, \
                rent_per_month = EXCLUDED.rent_per_month, \
                description = EXCLUDED.description, \
                availability = EXCLUDED.availability, \
                lease_end = EXCLUDED.lease_end, \
                created_at = EXCLUDED.created_at, \
                deactivated_at = EXCLUDED.deactivated_at";
        self.exec(
            SQL,
            &[
                &id,
                &ledger_id,
                &owner,
                &tenant,
                &rent_per_month,
                &description,
                &availability,
                &lease_end,
                &created_at,
                &deactivated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Property, property::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: property::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO properties_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO NOTHING";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Update<property::Occupation>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(occupation): Update<property::Occupation>,
    ) -> Result<Self::Ok, Self::Err> {
        let property::Occupation {
            id,
            tenant,
            lease_end,
        } = occupation;

        // Applies only while the `Property` is still available, so two
        // concurrent occupations cannot both report success.
        const SQL: &str = "\
            UPDATE properties \
            SET availability = $1::INT2, \
                tenant = $2::VARCHAR, \
                lease_end = $3::TIMESTAMPTZ \
            WHERE id = $4::UUID \
              AND availability = $5::INT2 \
              AND deactivated_at IS NULL";
        self.exec(
            SQL,
            &[
                &property::Availability::Booked,
                &tenant,
                &lease_end,
                &id,
                &property::Availability::Available,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows > 0)
    }
}

impl<C> Database<Update<property::Release>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(release): Update<property::Release>,
    ) -> Result<Self::Ok, Self::Err> {
        let property::Release { id } = release;

        const SQL: &str = "\
            UPDATE properties \
            SET availability = $1::INT2, \
                tenant = NULL, \
                lease_end = NULL \
            WHERE id = $2::UUID \
              AND availability = $3::INT2";
        self.exec(
            SQL,
            &[
                &property::Availability::Available,
                &id,
                &property::Availability::Booked,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows > 0)
    }
}

impl<C> Database<Update<property::Upkeep>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(upkeep): Update<property::Upkeep>,
    ) -> Result<Self::Ok, Self::Err> {
        let property::Upkeep { id, enabled } = upkeep;

        if enabled {
            // Properties under an active lease cannot be withdrawn.
            const SQL: &str = "\
                UPDATE properties \
                SET availability = $1::INT2 \
                WHERE id = $2::UUID \
                  AND availability = $3::INT2 \
                  AND deactivated_at IS NULL";
            return self
                .exec(
                    SQL,
                    &[
                        &property::Availability::Maintenance,
                        &id,
                        &property::Availability::Available,
                    ],
                )
                .await
                .map_err(tracerr::wrap!())
                .map(|rows| rows > 0);
        }

        const SQL: &str = "\
            UPDATE properties \
            SET availability = $1::INT2 \
            WHERE id = $2::UUID \
              AND availability = $3::INT2";
        self.exec(
            SQL,
            &[
                &property::Availability::Available,
                &id,
                &property::Availability::Maintenance,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows > 0)
    }
}

impl<C>
    Database<
        Select<By<read::property::list::Page, read::property::list::Selector>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::property::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::property::list::Page, read::property::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::property::list::Selector {
            arguments,
            filter: read::property::list::Filter { description },
        } = by.into_inner();

        let limit = i32::try_from(arguments.limit()).unwrap() + 1;

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit];

        let cursor_idx = arguments.cursor().map(|c| {
            ps.push(c);
            ps.len()
        });
        let description_idx = description.as_ref().map(|n| {
            ps.push(n);
            ps.len()
        });

        let description_pattern =
            description.as_ref().map(|n| FuzzPattern::new(n.as_ref()));
        let description_pattern_idx = description_pattern.as_ref().map(|n| {
            ps.push(n);
            ps.len()
        });

        let sql = format!(
            "SELECT id \
             FROM properties \
             WHERE deactivated_at IS NULL \
                   {cursor} \
                   {description_filtering} \
             ORDER BY {description_ordering} \
                      id {order} \
             LIMIT $1::INT4",
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                let op = arguments.kind().operator();
                f(&format_args!("AND id {op} ${idx}::UUID"))
            }),
            order = arguments.kind().order().sql(),
            description_filtering = description_pattern_idx
                .into_iter()
                .format_with("", |idx, f| {
                    f(&format_args!(
                        "AND LOWER(description) \
                         SIMILAR TO LOWER(${idx}::VARCHAR)"
                    ))
                }),
            description_ordering =
                description_idx.into_iter().format_with("", |idx, f| {
                    let order = arguments.kind().order().sql();
                    f(&format_args!(
                        "LEVENSHTEIN(description, ${idx}::VARCHAR, 1, 1, 0) \
                         {order},"
                    ))
                })
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        let has_more = rows.len() > arguments.limit();
        let edges = rows
            .into_iter()
            .take(arguments.limit())
            .map(|row| {
                let id = row.get("id");
                (id, id)
            })
            .collect::<Vec<_>>();

        Ok(read::property::list::Page::new(&arguments, edges, has_more))
    }
}

impl<C> Database<Select<By<read::property::list::TotalCount, ()>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::property::list::TotalCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(_): Select<By<read::property::list::TotalCount, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT COUNT(*)::INT4 \
            FROM properties \
            WHERE deactivated_at IS NULL";
        self.query_opt(SQL, &[])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.expect("always exists").get::<_, i32>(0).into())
    }
}

/// Reassembles a [`Property`] from the provided [`Row`].
///
/// [`Row`]: tokio_postgres::Row
pub(super) fn property_from_row(
    row: &tokio_postgres::Row,
    id: property::Id,
) -> Property {
    Property {
        id,
        ledger_id: row.get("ledger_id"),
        owner: row.get("owner"),
        tenant: row.get("tenant"),
        rent_per_month: row.get("rent_per_month"),
        description: row.get("description"),
        availability: row.get("availability"),
        lease_end: row.get("lease_end"),
        created_at: row.get("created_at"),
        deactivated_at: row.get("deactivated_at"),
    }
}
