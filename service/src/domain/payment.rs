//! [`Payment`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, Amount, DateTimeOf};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{booking, ledger, Address};

/// Transfer of funds settled on the ledger within a [`Booking`].
///
/// [`Booking`]: super::Booking
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the [`Booking`] this [`Payment`] belongs to.
    ///
    /// [`Booking`]: super::Booking
    pub booking_id: booking::Id,

    /// ID assigned to the paid [`Property`] by the settlement contract.
    ///
    /// [`Property`]: super::Property
    pub ledger_property_id: ledger::Id,

    /// [`Address`] of the paying account.
    pub from: Address,

    /// [`Address`] of the receiving account.
    pub to: Address,

    /// [`Amount`] of this [`Payment`].
    pub amount: Amount,

    /// [`Kind`] of this [`Payment`].
    pub kind: Kind,

    /// Current [`Status`] of this [`Payment`].
    pub status: Status,

    /// Hash of the ledger transaction this [`Payment`] was settled with.
    pub tx_hash: Option<ledger::TxHash>,

    /// Reason why this [`Payment`] failed, if it did.
    pub failure_reason: Option<booking::FailureReason>,

    /// ID of the original [`Payment`] this one refunds or penalizes,
    /// if any.
    pub refund_of: Option<Id>,

    /// [`DateTime`] when this [`Payment`] was due, if scheduled.
    pub due_date: Option<DueDateTime>,

    /// [`DateTime`] when the paid rent period starts, for [`Kind::Rent`]
    /// payments.
    pub period_start: Option<PeriodDateTime>,

    /// [`DateTime`] when the paid rent period ends, for [`Kind::Rent`]
    /// payments.
    pub period_end: Option<PeriodDateTime>,

    /// [`DateTime`] when this [`Payment`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Payment`] was confirmed, if it was.
    pub confirmed_at: Option<ConfirmationDateTime>,

    /// [`DateTime`] when this [`Payment`] failed, if it did.
    pub failed_at: Option<FailureDateTime>,
}

/// ID of a [`Payment`].
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

define_kind! {
    #[doc = "Kind of a [`Payment`]."]
    enum Kind {
        #[doc = "Security deposit of a lease."]
        Deposit = 1,

        #[doc = "Monthly rent payment."]
        Rent = 2,

        #[doc = "Reimbursement of an earlier payment to the tenant."]
        Refund = 3,

        #[doc = "Penalty withheld from the tenant."]
        Penalty = 4,
    }
}

impl Kind {
    /// Indicates whether this [`Kind`] reverses an earlier [`Payment`].
    #[must_use]
    pub fn is_reversal(self) -> bool {
        match self {
            Self::Refund | Self::Penalty => true,
            Self::Deposit | Self::Rent => false,
        }
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Settlement submitted, but its outcome is not known yet."]
        Pending = 1,

        #[doc = "Settled on the ledger."]
        Confirmed = 2,

        #[doc = "Rejected by the ledger or never settled."]
        Failed = 3,
    }
}

impl Status {
    /// Indicates whether this [`Status`] is terminal.
    ///
    /// A terminal [`Status`] is never left.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Indicates whether this [`Status`] can transition into the provided
    /// one.
    #[must_use]
    pub fn can_become(self, to: Self) -> bool {
        match self {
            Self::Pending => matches!(to, Self::Confirmed | Self::Failed),
            Self::Confirmed | Self::Failed => false,
        }
    }
}

/// Marker type describing a rent period boundary.
#[derive(Clone, Copy, Debug)]
pub struct Period;

/// Marker type describing a due date.
#[derive(Clone, Copy, Debug)]
pub struct Due;

/// [`DateTime`] when a [`Payment`] is due.
pub type DueDateTime = DateTimeOf<(Payment, Due)>;

/// [`DateTime`] of a rent period boundary of a [`Payment`].
pub type PeriodDateTime = DateTimeOf<(Payment, Period)>;

/// [`DateTime`] when a [`Payment`] was created.
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;

/// [`DateTime`] when a [`Payment`] was confirmed.
pub type ConfirmationDateTime = DateTimeOf<(Payment, unit::Confirmation)>;

/// [`DateTime`] when a [`Payment`] failed.
pub type FailureDateTime = DateTimeOf<(Payment, unit::Failure)>;

#[cfg(test)]
mod spec {
    use super::{Kind, Status};

    #[test]
    fn status_transitions() {
        use Status::{Confirmed, Failed, Pending};

        assert!(Pending.can_become(Confirmed));
        assert!(Pending.can_become(Failed));
        for terminal in [Confirmed, Failed] {
            assert!(terminal.is_terminal());
            for to in [Pending, Confirmed, Failed] {
                assert!(!terminal.can_become(to));
            }
        }
    }

    #[test]
    fn reversal_kinds() {
        assert!(Kind::Refund.is_reversal());
        assert!(Kind::Penalty.is_reversal());
        assert!(!Kind::Deposit.is_reversal());
        assert!(!Kind::Rent.is_reversal());
    }
}
