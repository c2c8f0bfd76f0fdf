//! [`Booking`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Perform, Select, Update};
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{booking, property, Booking},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C, IDs> Database<Select<By<HashMap<booking::Id, Booking>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[booking::Id]>,
{
    type Ok = HashMap<booking::Id, Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<booking::Id, Booking>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[booking::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        const SQL: &str = "\
            SELECT id, property_id, ledger_property_id, tenant, owner, \
                   duration, rent_per_month, total_amount, \
                   lease_start, lease_end, \
                   status, tx_hash, failure_reason, \
                   created_at, confirmed_at, cancelled_at, expired_at \
            FROM bookings \
            WHERE id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
            LIMIT $2::INT4";
        Ok(self
            .query(SQL, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                (id, booking_from_row(&row, id))
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<booking::Id, Booking>, [booking::Id; 1]>>,
        Ok = HashMap<booking::Id, Booking>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Booking>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(booking)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            property_id,
            ledger_property_id,
            tenant,
            owner,
            duration,
            rent_per_month,
            total_amount,
            lease_start,
            lease_end,
            status,
            tx_hash,
            failure_reason,
            created_at,
            confirmed_at,
            cancelled_at,
            expired_at,
        } = booking;

        let duration = i32::try_from(u32::from(duration))
            .expect("`duration` overflow");

        const SQL: &str = "\
            INSERT INTO bookings (\
                id, property_id, ledger_property_id, tenant, owner, \
                duration, rent_per_month, total_amount, \
                lease_start, lease_end, \
                status, tx_hash, failure_reason, \
                created_at, confirmed_at, cancelled_at, expired_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::INT8, $4::VARCHAR, $5::VARCHAR, \
                $6::INT4, $7::NUMERIC, $8::NUMERIC, \
                $9::TIMESTAMPTZ, $10::TIMESTAMPTZ, \
                $11::INT2, $12::VARCHAR, $13::VARCHAR, \
                $14::TIMESTAMPTZ, $15::TIMESTAMPTZ, \
                $16::TIMESTAMPTZ, $17::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET property_id = EXCLUDED.property_id, \
                ledger_property_id = EXCLUDED.ledger_property_id, \
                tenant = EXCLUDED.tenant, \
                owner = EXCLUDED.owner, \
                duration = EXCLUDED.duration, \
                rent_per_month = EXCLUDED.rent_per_month, \
                total_amount = EXCLUDED.total_amount, \
                lease_start = EXCLUDED.lease_start, \
                lease_end = EXCLUDED.lease_end, \
                status = EXCLUDED.status, \
                tx_hash = EXCLUDED.tx_hash, \
                failure_reason = EXCLUDED.failure_reason, \
                created_at = EXCLUDED.created_at, \
                confirmed_at = EXCLUDED.confirmed_at, \
                cancelled_at = EXCLUDED.cancelled_at, \
                expired_at = EXCLUDED.expired_at";
        self.exec(
            SQL,
            &[
                &id,
                &property_id,
                &ledger_property_id,
                &tenant,
                &owner,
                &duration,
                &rent_per_month,
                &total_amount,
                &lease_start,
                &lease_end,
                &status,
                &tx_hash,
                &failure_reason,
                &created_at,
                &confirmed_at,
                &cancelled_at,
                &expired_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Vec<Booking>, read::booking::TenantBookings>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, read::booking::TenantBookings>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::TenantBookings { tenant, status } = by.into_inner();

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&tenant];
        let status_idx = status.as_ref().map(|s| {
            ps.push(s);
            ps.len()
        });

        let sql = format!(
            "SELECT id, property_id, ledger_property_id, tenant, owner, \
                    duration, rent_per_month, total_amount, \
                    lease_start, lease_end, \
                    status, tx_hash, failure_reason, \
                    created_at, confirmed_at, cancelled_at, expired_at \
             FROM bookings \
             WHERE tenant = $1::VARCHAR \
                   {status_filtering} \
             ORDER BY created_at DESC, id DESC",
            status_filtering = status_idx
                .map(|idx| format!("AND status = ${idx}::INT2"))
                .unwrap_or_default(),
        );
        Ok(self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                booking_from_row(&row, id)
            })
            .collect())
    }
}

impl<C> Database<Select<By<Vec<Booking>, read::booking::PendingBefore>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Booking>, read::booking::PendingBefore>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::PendingBefore(deadline) = by.into_inner();

        const SQL: &str = "\
            SELECT id, property_id, ledger_property_id, tenant, owner, \
                   duration, rent_per_month, total_amount, \
                   lease_start, lease_end, \
                   status, tx_hash, failure_reason, \
                   created_at, confirmed_at, cancelled_at, expired_at \
            FROM bookings \
            WHERE status = $1::INT2 \
              AND created_at < $2::TIMESTAMPTZ \
            ORDER BY created_at ASC";
        Ok(self
            .query(SQL, &[&booking::Status::Pending, &deadline])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                booking_from_row(&row, id)
            })
            .collect())
    }
}

impl<C> Database<Perform<read::booking::Expiry>> for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Perform(sweep): Perform<read::booking::Expiry>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::Expiry(deadline) = sweep;

        // Expiring and releasing in one statement keeps the sweep
        // exactly-once: the `status` predicate makes a repeated run a no-op.
        const SQL: &str = "\
            WITH expired AS (\
                UPDATE bookings \
                SET status = $1::INT2, \
                    expired_at = NOW() \
                WHERE status = $2::INT2 \
                  AND lease_end < $3::TIMESTAMPTZ \
                RETURNING id, property_id\
            ), released AS (\
                UPDATE properties \
                SET availability = $4::INT2, \
                    tenant = NULL, \
                    lease_end = NULL \
                FROM expired \
                WHERE properties.id = expired.property_id \
                  AND properties.availability = $5::INT2\
            ) \
            SELECT COUNT(*)::INT8 \
            FROM expired";
        self.query_opt(
            SQL,
            &[
                &booking::Status::Expired,
                &booking::Status::Confirmed,
                &deadline,
                &property::Availability::Available,
                &property::Availability::Booked,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|row| {
            let count: i64 = row.expect("always exists").get(0);
            u64::try_from(count).expect("`COUNT(*)` cannot be negative")
        })
    }
}

/// Reassembles a [`Booking`] from the provided [`Row`].
///
/// [`Row`]: tokio_postgres::Row
pub(super) fn booking_from_row(
    row: &tokio_postgres::Row,
    id: booking::Id,
) -> Booking {
    Booking {
        id,
        property_id: row.get("property_id"),
        ledger_property_id: row.get("ledger_property_id"),
        tenant: row.get("tenant"),
        owner: row.get("owner"),
        duration: booking::Months::new(
            u32::try_from(row.get::<_, i32>("duration"))
                .expect("`duration` overflow"),
        )
        .expect("`duration` cannot be zero"),
        rent_per_month: row.get("rent_per_month"),
        total_amount: row.get("total_amount"),
        lease_start: row.get("lease_start"),
        lease_end: row.get("lease_end"),
        status: row.get("status"),
        tx_hash: row.get("tx_hash"),
        failure_reason: row.get("failure_reason"),
        created_at: row.get("created_at"),
        confirmed_at: row.get("confirmed_at"),
        cancelled_at: row.get("cancelled_at"),
        expired_at: row.get("expired_at"),
    }
}
