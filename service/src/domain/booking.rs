//! [`Booking`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, Amount, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ledger, property, Address};

/// Lease of a [`Property`] settled on the ledger.
///
/// [`Property`]: super::Property
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// ID of the booked [`Property`].
    ///
    /// [`Property`]: super::Property
    pub property_id: property::Id,

    /// ID assigned to the booked [`Property`] by the settlement contract.
    ///
    /// Denormalized, so ledger reconciliation survives local record
    /// remapping.
    ///
    /// [`Property`]: super::Property
    pub ledger_property_id: ledger::Id,

    /// [`Address`] of the renting account.
    pub tenant: Address,

    /// [`Address`] of the account owning the booked [`Property`].
    ///
    /// [`Property`]: super::Property
    pub owner: Address,

    /// Duration of the lease in [`Months`].
    pub duration: Months,

    /// Monthly rent at the moment this [`Booking`] was placed.
    ///
    /// A snapshot: later price changes don't affect this [`Booking`].
    pub rent_per_month: Amount,

    /// Total [`Amount`] due over the whole lease.
    pub total_amount: Amount,

    /// [`DateTime`] when the lease starts.
    pub lease_start: LeaseStartDateTime,

    /// [`DateTime`] when the lease ends.
    pub lease_end: LeaseEndDateTime,

    /// Current [`Status`] of this [`Booking`].
    pub status: Status,

    /// Hash of the ledger transaction this [`Booking`] was settled with.
    pub tx_hash: Option<ledger::TxHash>,

    /// Reason why this [`Booking`] failed or was cancelled, if it was.
    pub failure_reason: Option<FailureReason>,

    /// [`DateTime`] when this [`Booking`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Booking`] was confirmed, if it was.
    pub confirmed_at: Option<ConfirmationDateTime>,

    /// [`DateTime`] when this [`Booking`] was cancelled, if it was.
    pub cancelled_at: Option<CancellationDateTime>,

    /// [`DateTime`] when this [`Booking`] expired, if it did.
    pub expired_at: Option<ExpirationDateTime>,
}

/// ID of a [`Booking`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Duration of a [`Booking`] in whole months.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Months(u32);

impl Months {
    /// Creates a new [`Months`] duration if the given `months` number is
    /// valid.
    #[must_use]
    pub fn new(months: u32) -> Option<Self> {
        (months > 0).then_some(Self(months))
    }
}

impl<'de> Deserialize<'de> for Months {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let months = u32::deserialize(deserializer)?;
        Self::new(months)
            .ok_or_else(|| serde::de::Error::custom("`Months` cannot be zero"))
    }
}

/// Reason of a [`Booking`] failure or cancellation.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct FailureReason(String);

impl FailureReason {
    /// Creates a new [`FailureReason`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `reason` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Creates a new [`FailureReason`] if the given `reason` is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        Self::check(&reason).then_some(Self(reason))
    }

    /// Creates a new [`FailureReason`], truncating the given `reason` to the
    /// allowed length.
    #[must_use]
    pub fn truncated(reason: impl Into<String>) -> Self {
        let mut reason: String = reason.into();
        if reason.len() > 512 {
            let mut end = 512;
            while !reason.is_char_boundary(end) {
                end -= 1;
            }
            reason.truncate(end);
        }
        Self(reason)
    }

    /// Checks whether the given `reason` is a valid [`FailureReason`].
    fn check(reason: impl AsRef<str>) -> bool {
        let reason = reason.as_ref();
        !reason.is_empty() && reason.len() <= 512
    }
}

impl FromStr for FailureReason {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `FailureReason`")
    }
}

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    enum Status {
        #[doc = "Settlement submitted, but its outcome is not known yet."]
        Pending = 1,

        #[doc = "Settled on the ledger, the lease is active."]
        Confirmed = 2,

        #[doc = "Cancelled by a party or rejected by the ledger."]
        Cancelled = 3,

        #[doc = "Lease period elapsed."]
        Expired = 4,
    }
}

impl Status {
    /// Indicates whether this [`Status`] is terminal.
    ///
    /// A terminal [`Status`] is never left.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }

    /// Indicates whether this [`Status`] can transition into the provided
    /// one.
    #[must_use]
    pub fn can_become(self, to: Self) -> bool {
        match self {
            Self::Pending => matches!(to, Self::Confirmed | Self::Cancelled),
            Self::Confirmed => matches!(to, Self::Cancelled | Self::Expired),
            Self::Cancelled | Self::Expired => false,
        }
    }
}

/// Computes the lease end of a [`Booking`] starting at the provided
/// [`DateTime`] and lasting the provided number of [`Months`].
///
/// [`None`] is returned if the result is out of the representable range.
#[must_use]
pub fn lease_end(
    start: LeaseStartDateTime,
    duration: Months,
) -> Option<LeaseEndDateTime> {
    start.add_months(duration.into()).map(DateTimeOf::coerce)
}

/// Marker type describing a lease start.
#[derive(Clone, Copy, Debug)]
pub struct LeaseStart;

/// Marker type describing a lease end.
#[derive(Clone, Copy, Debug)]
pub struct LeaseEnd;

/// [`DateTime`] when the lease of a [`Booking`] starts.
pub type LeaseStartDateTime = DateTimeOf<(Booking, LeaseStart)>;

/// [`DateTime`] when the lease of a [`Booking`] ends.
pub type LeaseEndDateTime = DateTimeOf<(Booking, LeaseEnd)>;

/// [`DateTime`] when a [`Booking`] was created.
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// [`DateTime`] when a [`Booking`] was confirmed.
pub type ConfirmationDateTime = DateTimeOf<(Booking, unit::Confirmation)>;

/// [`DateTime`] when a [`Booking`] was cancelled.
pub type CancellationDateTime = DateTimeOf<(Booking, unit::Cancellation)>;

/// [`DateTime`] when a [`Booking`] expired.
pub type ExpirationDateTime = DateTimeOf<(Booking, unit::Expiration)>;

#[cfg(test)]
mod spec {
    use common::DateTime;

    use super::{lease_end, Months, Status};

    #[test]
    fn status_transitions() {
        use Status::{Cancelled, Confirmed, Expired, Pending};

        assert!(Pending.can_become(Confirmed));
        assert!(Pending.can_become(Cancelled));
        assert!(Confirmed.can_become(Cancelled));
        assert!(Confirmed.can_become(Expired));

        assert!(!Pending.can_become(Expired));
        assert!(!Confirmed.can_become(Pending));
        for terminal in [Cancelled, Expired] {
            for to in [Pending, Confirmed, Cancelled, Expired] {
                assert!(!terminal.can_become(to));
            }
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Confirmed.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(Status::Expired.is_terminal());
    }

    #[test]
    fn computes_lease_end() {
        let start = DateTime::from_rfc3339("2024-09-01T00:00:00Z")
            .unwrap()
            .coerce();
        assert_eq!(
            lease_end(start, Months::new(6).unwrap()).unwrap(),
            DateTime::from_rfc3339("2025-03-01T00:00:00Z").unwrap().coerce(),
        );
    }

    #[test]
    fn rejects_zero_duration() {
        assert!(Months::new(0).is_none());
    }

    #[test]
    fn validates_duration_on_deserialization() {
        assert_eq!(
            serde_json::from_str::<Months>("6").unwrap(),
            Months::new(6).unwrap(),
        );
        assert!(serde_json::from_str::<Months>("0").is_err());
    }
}
