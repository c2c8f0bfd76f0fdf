//! In-memory test doubles and fixtures.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use common::{
    operations::{By, Commit, Insert, Lock, Perform, Select, Transact, Update},
    Amount, DateTime, Handler,
};
use tracerr::Traced;

use crate::{
    domain::{booking, ledger, payment, property, Address, Booking, Payment, Property},
    infra::{self, database},
    read, task, Config, Service,
};

/// Creates a [`Service`] backed by in-memory doubles.
pub(crate) fn service() -> Service<MockDb, MockLedger> {
    Service {
        config: Config {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                b"test-secret",
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                b"test-secret",
            ),
            expire_leases: task::expire_leases::Config {
                interval: std::time::Duration::from_secs(60),
            },
            reconcile_pending: task::reconcile_pending::Config {
                interval: std::time::Duration::from_secs(60),
                grace: std::time::Duration::from_secs(60),
            },
        },
        database: MockDb::default(),
        ledger: MockLedger::default(),
    }
}

/// [`Address`] of the fixture property owner.
pub(crate) fn owner() -> Address {
    Address::new("0x0aaa1").unwrap()
}

/// [`Address`] of the fixture tenant.
pub(crate) fn tenant() -> Address {
    Address::new("0x0bbb2").unwrap()
}

/// [`Address`] of an account unrelated to any fixture.
pub(crate) fn stranger() -> Address {
    Address::new("0x0ccc3").unwrap()
}

/// Hash of an out-of-band fixture transaction.
pub(crate) fn tx_hash() -> ledger::TxHash {
    ledger::TxHash::new("0xfeedbeef").unwrap()
}

/// Stores an available [`Property`] fixture.
pub(crate) async fn available_property(
    service: &Service<MockDb, MockLedger>,
) -> Property {
    let property = Property {
        id: property::Id::new(),
        ledger_id: ledger::Id::from(7),
        owner: owner(),
        tenant: None,
        rent_per_month: Amount::from(1000),
        description: property::Description::new("Cozy studio").unwrap(),
        availability: property::Availability::Available,
        lease_end: None,
        created_at: DateTime::now().coerce(),
        deactivated_at: None,
    };
    service.database().store_property(property.clone());
    property
}

/// Stores a booked [`Property`] fixture without its [`Booking`].
pub(crate) async fn booked_property(
    service: &Service<MockDb, MockLedger>,
) -> Property {
    let mut property = available_property(service).await;
    property.tenant = Some(tenant());
    property.availability = property::Availability::Booked;
    property.lease_end = Some(
        DateTime::now().add_months(6).unwrap().coerce(),
    );
    service.database().store_property(property.clone());
    property
}

/// Stores a confirmed [`Booking`] fixture along with its booked
/// [`Property`].
pub(crate) async fn confirmed_booking(
    service: &Service<MockDb, MockLedger>,
) -> (Property, Booking) {
    let property = booked_property(service).await;

    let lease_start: booking::LeaseStartDateTime = DateTime::now().coerce();
    let duration = booking::Months::new(6).unwrap();
    let booking = Booking {
        id: booking::Id::new(),
        property_id: property.id,
        ledger_property_id: property.ledger_id,
        tenant: tenant(),
        owner: property.owner.clone(),
        duration,
        rent_per_month: property.rent_per_month,
        total_amount: property.rent_per_month.checked_mul(6).unwrap(),
        lease_start,
        lease_end: booking::lease_end(lease_start, duration).unwrap(),
        status: booking::Status::Confirmed,
        tx_hash: Some(ledger::TxHash::new("0xaa01").unwrap()),
        failure_reason: None,
        created_at: DateTime::now().coerce(),
        confirmed_at: Some(DateTime::now().coerce()),
        cancelled_at: None,
        expired_at: None,
    };
    service.database().store_booking(booking.clone());

    (property, booking)
}

/// Stores a pending [`Booking`] fixture whose [`Property`] is still
/// available.
pub(crate) async fn pending_booking(
    service: &Service<MockDb, MockLedger>,
) -> (Property, Booking) {
    let property = available_property(service).await;

    let lease_start: booking::LeaseStartDateTime = DateTime::now().coerce();
    let duration = booking::Months::new(3).unwrap();
    let booking = Booking {
        id: booking::Id::new(),
        property_id: property.id,
        ledger_property_id: property.ledger_id,
        tenant: tenant(),
        owner: property.owner.clone(),
        duration,
        rent_per_month: property.rent_per_month,
        total_amount: property.rent_per_month.checked_mul(3).unwrap(),
        lease_start,
        lease_end: booking::lease_end(lease_start, duration).unwrap(),
        status: booking::Status::Pending,
        tx_hash: Some(ledger::TxHash::new("0xaa02").unwrap()),
        failure_reason: None,
        created_at: DateTime::now().coerce(),
        confirmed_at: None,
        cancelled_at: None,
        expired_at: None,
    };
    service.database().store_booking(booking.clone());

    (property, booking)
}

/// Stores a confirmed deposit [`Payment`] fixture within a confirmed
/// [`Booking`].
pub(crate) async fn confirmed_payment(
    service: &Service<MockDb, MockLedger>,
) -> (Property, Booking, Payment) {
    let (property, booking) = confirmed_booking(service).await;

    let payment = Payment {
        id: payment::Id::new(),
        booking_id: booking.id,
        ledger_property_id: booking.ledger_property_id,
        from: booking.tenant.clone(),
        to: booking.owner.clone(),
        amount: booking.rent_per_month,
        kind: payment::Kind::Deposit,
        status: payment::Status::Confirmed,
        tx_hash: Some(ledger::TxHash::new("0xbb01").unwrap()),
        failure_reason: None,
        refund_of: None,
        due_date: None,
        period_start: None,
        period_end: None,
        created_at: DateTime::now().coerce(),
        confirmed_at: Some(DateTime::now().coerce()),
        failed_at: None,
    };
    service.database().store_payment(payment.clone());

    (property, booking, payment)
}

/// Stores a pending rent [`Payment`] fixture within a confirmed
/// [`Booking`].
pub(crate) async fn pending_payment(
    service: &Service<MockDb, MockLedger>,
) -> (Property, Booking, Payment) {
    let (property, booking) = confirmed_booking(service).await;

    let payment = Payment {
        id: payment::Id::new(),
        booking_id: booking.id,
        ledger_property_id: booking.ledger_property_id,
        from: booking.tenant.clone(),
        to: booking.owner.clone(),
        amount: booking.rent_per_month,
        kind: payment::Kind::Rent,
        status: payment::Status::Pending,
        tx_hash: Some(ledger::TxHash::new("0xbb02").unwrap()),
        failure_reason: None,
        refund_of: None,
        due_date: Some(DateTime::now().coerce()),
        period_start: Some(DateTime::now().coerce()),
        period_end: Some(DateTime::now().add_months(1).unwrap().coerce()),
        created_at: DateTime::now().coerce(),
        confirmed_at: None,
        failed_at: None,
    };
    service.database().store_payment(payment.clone());

    (property, booking, payment)
}

/// In-memory [`Database`] double.
///
/// Transactions are a no-op: [`Transact`] hands out a clone sharing the same
/// state.
///
/// [`Database`]: crate::infra::Database
#[derive(Clone, Debug, Default)]
pub(crate) struct MockDb {
    /// Stored state, shared between clones.
    state: Arc<Mutex<State>>,
}

/// State of a [`MockDb`].
#[derive(Debug, Default)]
struct State {
    /// Stored [`Property`]s.
    properties: HashMap<property::Id, Property>,

    /// Stored [`Booking`]s.
    bookings: HashMap<booking::Id, Booking>,

    /// Stored [`Payment`]s.
    payments: HashMap<payment::Id, Payment>,
}

impl MockDb {
    /// Returns the stored [`Property`] with the provided ID, if any.
    pub(crate) fn property(&self, id: property::Id) -> Option<Property> {
        self.state.lock().unwrap().properties.get(&id).cloned()
    }

    /// Returns all the stored [`Property`]s.
    pub(crate) fn properties(&self) -> Vec<Property> {
        self.state.lock().unwrap().properties.values().cloned().collect()
    }

    /// Returns all the stored [`Booking`]s.
    pub(crate) fn bookings(&self) -> Vec<Booking> {
        self.state.lock().unwrap().bookings.values().cloned().collect()
    }

    /// Returns all the stored [`Payment`]s.
    pub(crate) fn payments(&self) -> Vec<Payment> {
        self.state.lock().unwrap().payments.values().cloned().collect()
    }

    /// Stores the provided [`Property`].
    pub(crate) fn store_property(&self, property: Property) {
        _ = self
            .state
            .lock()
            .unwrap()
            .properties
            .insert(property.id, property);
    }

    /// Stores the provided [`Booking`].
    pub(crate) fn store_booking(&self, booking: Booking) {
        _ = self.state.lock().unwrap().bookings.insert(booking.id, booking);
    }

    /// Stores the provided [`Payment`].
    pub(crate) fn store_payment(&self, payment: Payment) {
        _ = self.state.lock().unwrap().payments.insert(payment.id, payment);
    }
}

impl Handler<Transact> for MockDb {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Handler<Commit> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Handler<Lock<By<Property, property::Id>>> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Property, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(())
    }
}

impl Handler<Select<By<Option<Property>, property::Id>>> for MockDb {
    type Ok = Option<Property>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Property>, property::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.property(by.into_inner()))
    }
}

impl Handler<Insert<Property>> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(property): Insert<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.store_property(property);
        Ok(())
    }
}

impl Handler<Update<Property>> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(property): Update<Property>,
    ) -> Result<Self::Ok, Self::Err> {
        self.store_property(property);
        Ok(())
    }
}

impl Handler<Update<property::Occupation>> for MockDb {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(occupation): Update<property::Occupation>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state.lock().unwrap();
        let Some(property) = state.properties.get_mut(&occupation.id) else {
            return Ok(false);
        };
        if property.availability != property::Availability::Available
            || property.deactivated_at.is_some()
        {
            return Ok(false);
        }
        property.availability = property::Availability::Booked;
        property.tenant = Some(occupation.tenant);
        property.lease_end = Some(occupation.lease_end);
        Ok(true)
    }
}

impl Handler<Update<property::Release>> for MockDb {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(release): Update<property::Release>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state.lock().unwrap();
        let Some(property) = state.properties.get_mut(&release.id) else {
            return Ok(false);
        };
        if property.availability != property::Availability::Booked {
            return Ok(false);
        }
        property.availability = property::Availability::Available;
        property.tenant = None;
        property.lease_end = None;
        Ok(true)
    }
}

impl Handler<Update<property::Upkeep>> for MockDb {
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(upkeep): Update<property::Upkeep>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state.lock().unwrap();
        let Some(property) = state.properties.get_mut(&upkeep.id) else {
            return Ok(false);
        };
        let (from, to) = if upkeep.enabled {
            (
                property::Availability::Available,
                property::Availability::Maintenance,
            )
        } else {
            (
                property::Availability::Maintenance,
                property::Availability::Available,
            )
        };
        if property.availability != from || property.deactivated_at.is_some()
        {
            return Ok(false);
        }
        property.availability = to;
        Ok(true)
    }
}

impl Handler<Select<By<Option<Booking>, booking::Id>>> for MockDb {
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.state.lock().unwrap().bookings.get(&id).cloned())
    }
}

impl Handler<Insert<Booking>> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.store_booking(booking);
        Ok(())
    }
}

impl Handler<Update<Booking>> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        self.store_booking(booking);
        Ok(())
    }
}

impl Handler<Perform<read::booking::Expiry>> for MockDb {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Perform(sweep): Perform<read::booking::Expiry>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::Expiry(deadline) = sweep;

        let mut state = self.state.lock().unwrap();
        // The status predicate is the sole sweep gate.
        let overdue = state
            .bookings
            .values()
            .filter(|b| {
                b.status == booking::Status::Confirmed
                    && b.lease_end < deadline
            })
            .map(|b| b.id)
            .collect::<Vec<_>>();

        for id in &overdue {
            let property_id = {
                let b = state.bookings.get_mut(id).expect("just selected");
                b.status = booking::Status::Expired;
                b.expired_at = Some(DateTime::now().coerce());
                b.property_id
            };
            if let Some(p) = state.properties.get_mut(&property_id) {
                if p.availability == property::Availability::Booked {
                    p.availability = property::Availability::Available;
                    p.tenant = None;
                    p.lease_end = None;
                }
            }
        }

        Ok(u64::try_from(overdue.len()).expect("count overflow"))
    }
}

impl Handler<Select<By<Option<Payment>, payment::Id>>> for MockDb {
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.state.lock().unwrap().payments.get(&id).cloned())
    }
}

impl Handler<Select<By<crate::read::payment::PaidPeriods, booking::Id>>>
    for MockDb
{
    type Ok = crate::read::payment::PaidPeriods;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<crate::read::payment::PaidPeriods, booking::Id>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let booking_id = by.into_inner();
        let count = self
            .state
            .lock()
            .unwrap()
            .payments
            .values()
            .filter(|p| {
                p.booking_id == booking_id
                    && p.kind == payment::Kind::Rent
                    && p.status == payment::Status::Confirmed
            })
            .count();
        Ok(crate::read::payment::PaidPeriods(
            u32::try_from(count).unwrap(),
        ))
    }
}

impl Handler<Insert<Payment>> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.store_payment(payment);
        Ok(())
    }
}

impl Handler<Update<Payment>> for MockDb {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(payment): Update<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        self.store_payment(payment);
        Ok(())
    }
}

/// In-memory [`Ledger`] double fed with queued responses.
///
/// [`Ledger`]: crate::infra::Ledger
#[derive(Clone, Debug, Default)]
pub(crate) struct MockLedger {
    /// Queued responses, shared between clones.
    state: Arc<Mutex<LedgerState>>,
}

/// State of a [`MockLedger`].
#[derive(Debug, Default)]
struct LedgerState {
    /// Queued finalities of `list_property` invocations.
    list_outcomes: VecDeque<infra::ledger::Finality>,

    /// Queued finalities of `book_property` invocations.
    book_outcomes: VecDeque<infra::ledger::Finality>,

    /// Queued finalities of `pay_rent` invocations.
    pay_outcomes: VecDeque<infra::ledger::Finality>,

    /// Queued receipt lookups.
    receipts: VecDeque<Option<infra::ledger::Execution>>,

    /// Queued property views.
    property_views: VecDeque<infra::ledger::PropertyView>,

    /// Reported property count.
    property_count: u64,

    /// Number of state-changing invocations submitted.
    submissions: usize,
}

impl MockLedger {
    /// Queues a [`Finality`] for the next `list_property` invocation.
    ///
    /// [`Finality`]: infra::ledger::Finality
    pub(crate) fn push_list_outcome(&self, finality: infra::ledger::Finality) {
        self.state.lock().unwrap().list_outcomes.push_back(finality);
    }

    /// Queues a [`Finality`] for the next `book_property` invocation.
    ///
    /// [`Finality`]: infra::ledger::Finality
    pub(crate) fn push_book_outcome(&self, finality: infra::ledger::Finality) {
        self.state.lock().unwrap().book_outcomes.push_back(finality);
    }

    /// Queues a [`Finality`] for the next `pay_rent` invocation.
    ///
    /// [`Finality`]: infra::ledger::Finality
    pub(crate) fn push_pay_outcome(&self, finality: infra::ledger::Finality) {
        self.state.lock().unwrap().pay_outcomes.push_back(finality);
    }

    /// Queues a receipt lookup result.
    pub(crate) fn push_receipt(
        &self,
        receipt: Option<infra::ledger::Execution>,
    ) {
        self.state.lock().unwrap().receipts.push_back(receipt);
    }

    /// Queues a property view lookup result.
    pub(crate) fn push_property_view(
        &self,
        view: infra::ledger::PropertyView,
    ) {
        self.state.lock().unwrap().property_views.push_back(view);
    }

    /// Sets the reported property count.
    pub(crate) fn set_property_count(&self, count: u64) {
        self.state.lock().unwrap().property_count = count;
    }

    /// Returns the number of state-changing invocations submitted.
    pub(crate) fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    /// Pops the next queued [`Finality`] as a full [`Outcome`].
    ///
    /// [`Finality`]: infra::ledger::Finality
    /// [`Outcome`]: infra::ledger::Outcome
    fn submit(
        &self,
        queue: fn(&mut LedgerState) -> &mut VecDeque<infra::ledger::Finality>,
    ) -> infra::ledger::Outcome {
        let mut state = self.state.lock().unwrap();
        state.submissions += 1;
        let n = state.submissions;
        let finality = queue(&mut state)
            .pop_front()
            .expect("unexpected ledger submission");
        infra::ledger::Outcome {
            tx_hash: ledger::TxHash::new(format!("0x{n:x}"))
                .expect("valid fixture hash"),
            finality,
        }
    }
}

impl Handler<infra::ledger::call::List> for MockLedger {
    type Ok = infra::ledger::Outcome;
    type Err = Traced<infra::ledger::Error>;

    async fn execute(
        &self,
        _: infra::ledger::call::List,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.submit(|s| &mut s.list_outcomes))
    }
}

impl Handler<infra::ledger::call::Book> for MockLedger {
    type Ok = infra::ledger::Outcome;
    type Err = Traced<infra::ledger::Error>;

    async fn execute(
        &self,
        _: infra::ledger::call::Book,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.submit(|s| &mut s.book_outcomes))
    }
}

impl Handler<infra::ledger::call::Pay> for MockLedger {
    type Ok = infra::ledger::Outcome;
    type Err = Traced<infra::ledger::Error>;

    async fn execute(
        &self,
        _: infra::ledger::call::Pay,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.submit(|s| &mut s.pay_outcomes))
    }
}

impl Handler<infra::ledger::view::Receipt> for MockLedger {
    type Ok = Option<infra::ledger::Execution>;
    type Err = Traced<infra::ledger::Error>;

    async fn execute(
        &self,
        _: infra::ledger::view::Receipt,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .receipts
            .pop_front()
            .expect("no queued receipt"))
    }
}

impl Handler<infra::ledger::view::Property> for MockLedger {
    type Ok = infra::ledger::PropertyView;
    type Err = Traced<infra::ledger::Error>;

    async fn execute(
        &self,
        _: infra::ledger::view::Property,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .property_views
            .pop_front()
            .expect("no queued property view"))
    }
}

impl Handler<infra::ledger::view::Count> for MockLedger {
    type Ok = ledger::Id;
    type Err = Traced<infra::ledger::Error>;

    async fn execute(
        &self,
        _: infra::ledger::view::Count,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(ledger::Id::from(
            self.state.lock().unwrap().property_count,
        ))
    }
}
