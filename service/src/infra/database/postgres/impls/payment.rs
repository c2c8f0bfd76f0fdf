//! [`Payment`]-related [`Database`] implementations.

use std::collections::HashMap;

use common::operations::{By, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{booking, payment, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C, IDs> Database<Select<By<HashMap<payment::Id, Payment>, IDs>>>
    for Postgres<C>
where
    C: Connection,
    IDs: AsRef<[payment::Id]>,
{
    type Ok = HashMap<payment::Id, Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<HashMap<payment::Id, Payment>, IDs>>,
    ) -> Result<Self::Ok, Self::Err> {
        let ids = by.into_inner();
        // Avoid subtle change for SQL.
        let ids: &[payment::Id] = ids.as_ref();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let limit = i32::try_from(ids.len()).unwrap();

        const SQL: &str = "\
            SELECT id, booking_id, ledger_property_id, \
                   from_address, to_address, amount, \
                   kind, status, tx_hash, failure_reason, refund_of, \
                   due_date, period_start, period_end, \
                   created_at, confirmed_at, failed_at \
            FROM payments \
            WHERE id IN (SELECT unnest($1::UUID[]) LIMIT $2::INT4) \
            LIMIT $2::INT4";
        Ok(self
            .query(SQL, &[&ids, &limit])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                (id, payment_from_row(&row, id))
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::Id>>> for Postgres<C>
where
    C: Connection,
    Self: Database<
        Select<By<HashMap<payment::Id, Payment>, [payment::Id; 1]>>,
        Ok = HashMap<payment::Id, Payment>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self
            .execute(Select(By::new([id])))
            .await
            .map_err(tracerr::wrap!())?
            .remove(&id))
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
    Self: Database<Update<Payment>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.execute(Update(payment)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            booking_id,
            ledger_property_id,
            from,
            to,
            amount,
            kind,
            status,
            tx_hash,
            failure_reason,
            refund_of,
            due_date,
            period_start,
            period_end,
            created_at,
            confirmed_at,
            failed_at,
        } = payment;

        const SQL: &str = "\
            INSERT INTO payments (\
                id, booking_id, ledger_property_id, \
                from_address, to_address, amount, \
                kind, status, tx_hash, failure_reason, refund_of, \
                due_date, period_start, period_end, \
                created_at, confirmed_at, failed_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::INT8, \
                $4::VARCHAR, $5::VARCHAR, $6::NUMERIC, \
                $7::INT2, $8::INT2, $9::VARCHAR, $10::VARCHAR, $11::UUID, \
                $12::TIMESTAMPTZ, $13::TIMESTAMPTZ, $14::TIMESTAMPTZ, \
                $15::TIMESTAMPTZ, $16::TIMESTAMPTZ, $17::TIMESTAMPTZ \
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET booking_id = EXCLUDED.booking_id, \
                ledger_property_id = EXCLUDED.ledger_property_id, \
                from_address = EXCLUDED.from_address, \
                to_address = EXCLUDED.to_address, \
                amount = EXCLUDED.amount, \
                kind = EXCLUDED.kind, \
                status = EXCLUDED.status, \
                tx_hash = EXCLUDED.tx_hash, \
                failure_reason = EXCLUDED.failure_reason, \
                refund_of = EXCLUDED.refund_of, \
                due_date = EXCLUDED.due_date, \
                period_start = EXCLUDED.period_start, \
                period_end = EXCLUDED.period_end, \
                created_at = EXCLUDED.created_at, \
                confirmed_at = EXCLUDED.confirmed_at, \
                failed_at = EXCLUDED.failed_at";
        self.exec(
            SQL,
            &[
                &id,
                &booking_id,
                &ledger_property_id,
                &from,
                &to,
                &amount,
                &kind,
                &status,
                &tx_hash,
                &failure_reason,
                &refund_of,
                &due_date,
                &period_start,
                &period_end,
                &created_at,
                &confirmed_at,
                &failed_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<read::payment::History, booking::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::payment::History;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::payment::History, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let booking_id: booking::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, booking_id, ledger_property_id, \
                   from_address, to_address, amount, \
                   kind, status, tx_hash, failure_reason, refund_of, \
                   due_date, period_start, period_end, \
                   created_at, confirmed_at, failed_at \
            FROM payments \
            WHERE booking_id = $1::UUID \
            ORDER BY created_at DESC, id DESC";
        Ok(self
            .query(SQL, &[&booking_id])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                payment_from_row(&row, id)
            })
            .collect::<Vec<_>>()
            .into())
    }
}

impl<C> Database<Select<By<read::payment::PaidPeriods, booking::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::payment::PaidPeriods;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::payment::PaidPeriods, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let booking_id: booking::Id = by.into_inner();

        const SQL: &str = "\
            SELECT COUNT(*)::INT4 \
            FROM payments \
            WHERE booking_id = $1::UUID \
              AND kind = $2::INT2 \
              AND status = $3::INT2";
        self.query_opt(
            SQL,
            &[
                &booking_id,
                &payment::Kind::Rent,
                &payment::Status::Confirmed,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|row| {
            let count: i32 = row.expect("always exists").get(0);
            read::payment::PaidPeriods(
                u32::try_from(count).expect("`COUNT(*)` cannot be negative"),
            )
        })
    }
}

impl<C> Database<Select<By<Vec<Payment>, read::payment::PendingBefore>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Payment>, read::payment::PendingBefore>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::payment::PendingBefore(deadline) = by.into_inner();

        const SQL: &str = "\
            SELECT id, booking_id, ledger_property_id, \
                   from_address, to_address, amount, \
                   kind, status, tx_hash, failure_reason, refund_of, \
                   due_date, period_start, period_end, \
                   created_at, confirmed_at, failed_at \
            FROM payments \
            WHERE status = $1::INT2 \
              AND created_at < $2::TIMESTAMPTZ \
            ORDER BY created_at ASC";
        Ok(self
            .query(SQL, &[&payment::Status::Pending, &deadline])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let id = row.get("id");
                payment_from_row(&row, id)
            })
            .collect())
    }
}

/// Reassembles a [`Payment`] from the provided [`Row`].
///
/// [`Row`]: tokio_postgres::Row
pub(super) fn payment_from_row(
    row: &tokio_postgres::Row,
    id: payment::Id,
) -> Payment {
    Payment {
        id,
        booking_id: row.get("booking_id"),
        ledger_property_id: row.get("ledger_property_id"),
        from: row.get("from_address"),
        to: row.get("to_address"),
        amount: row.get("amount"),
        kind: row.get("kind"),
        status: row.get("status"),
        tx_hash: row.get("tx_hash"),
        failure_reason: row.get("failure_reason"),
        refund_of: row.get("refund_of"),
        due_date: row.get("due_date"),
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        created_at: row.get("created_at"),
        confirmed_at: row.get("confirmed_at"),
        failed_at: row.get("failed_at"),
    }
}
