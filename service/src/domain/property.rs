//! [`Property`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, Amount, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{booking, ledger, Address};

/// Property listed for rent.
///
/// Comes into existence only after the settlement ledger accepted the
/// listing, so `ledger_id` is always present.
#[derive(Clone, Debug)]
pub struct Property {
    /// ID of this [`Property`].
    pub id: Id,

    /// ID assigned to this [`Property`] by the settlement contract.
    pub ledger_id: ledger::Id,

    /// [`Address`] of the account owning this [`Property`].
    pub owner: Address,

    /// [`Address`] of the account currently renting this [`Property`],
    /// if any.
    pub tenant: Option<Address>,

    /// Monthly rent of this [`Property`].
    pub rent_per_month: Amount,

    /// [`Description`] of this [`Property`].
    pub description: Description,

    /// Current [`Availability`] of this [`Property`].
    pub availability: Availability,

    /// [`DateTime`] when the active lease of this [`Property`] ends,
    /// if it's rented out.
    pub lease_end: Option<booking::LeaseEndDateTime>,

    /// [`DateTime`] when this [`Property`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Property`] was deactivated, if it was.
    pub deactivated_at: Option<DeactivationDateTime>,
}

impl Property {
    /// Indicates whether this [`Property`] is deactivated.
    #[must_use]
    pub fn is_deactivated(&self) -> bool {
        self.deactivated_at.is_some()
    }
}

/// ID of a [`Property`].
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

/// Description of a [`Property`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Description(String);

impl Description {
    /// Creates a new [`Description`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `description` matches the
    /// format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(description: impl Into<String>) -> Self {
        Self(description.into())
    }

    /// Creates a new [`Description`] if the given `description` is valid.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Option<Self> {
        let description = description.into();
        Self::check(&description).then_some(Self(description))
    }

    /// Checks whether the given `description` is a valid [`Description`].
    fn check(description: impl AsRef<str>) -> bool {
        let description = description.as_ref();
        description.trim() == description
            && !description.is_empty()
            && description.len() <= 512
    }
}

impl FromStr for Description {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Description`")
    }
}

define_kind! {
    #[doc = "Availability of a [`Property`]."]
    enum Availability {
        #[doc = "Open for booking."]
        Available = 1,

        #[doc = "Rented out under an active lease."]
        Booked = 2,

        #[doc = "Withdrawn from booking by the owner."]
        Maintenance = 3,
    }
}

impl Availability {
    /// Indicates whether this [`Availability`] can transition into the
    /// provided one.
    #[must_use]
    pub fn can_become(self, to: Self) -> bool {
        match self {
            Self::Available => {
                matches!(to, Self::Booked | Self::Maintenance)
            }
            Self::Booked => {
                matches!(to, Self::Available | Self::Maintenance)
            }
            Self::Maintenance => matches!(to, Self::Available),
        }
    }
}

/// Conditional transition of a [`Property`] into [`Availability::Booked`].
///
/// Applies only while the [`Property`] is still [`Availability::Available`],
/// so concurrent bookings cannot both win.
#[derive(Clone, Debug)]
pub struct Occupation {
    /// ID of the [`Property`] to occupy.
    pub id: Id,

    /// [`Address`] of the renting account.
    pub tenant: Address,

    /// [`DateTime`] when the lease ends.
    pub lease_end: booking::LeaseEndDateTime,
}

/// Conditional transition of a [`Property`] out of [`Availability::Booked`]
/// back into [`Availability::Available`].
#[derive(Clone, Copy, Debug)]
pub struct Release {
    /// ID of the [`Property`] to release.
    pub id: Id,
}

/// Conditional toggle of the [`Availability::Maintenance`] state of a
/// [`Property`].
#[derive(Clone, Copy, Debug)]
pub struct Upkeep {
    /// ID of the [`Property`] to toggle.
    pub id: Id,

    /// Indicator whether maintenance is being enabled or disabled.
    pub enabled: bool,
}

/// [`DateTime`] when a [`Property`] was created.
pub type CreationDateTime = DateTimeOf<(Property, unit::Creation)>;

/// [`DateTime`] when a [`Property`] was deactivated.
pub type DeactivationDateTime = DateTimeOf<(Property, unit::Deletion)>;

#[cfg(test)]
mod spec {
    use super::Availability;

    #[test]
    fn availability_transitions() {
        use Availability::{Available, Booked, Maintenance};

        assert!(Available.can_become(Booked));
        assert!(Available.can_become(Maintenance));
        assert!(Booked.can_become(Available));
        assert!(Booked.can_become(Maintenance));
        assert!(Maintenance.can_become(Available));

        assert!(!Available.can_become(Available));
        assert!(!Maintenance.can_become(Booked));
        assert!(!Maintenance.can_become(Maintenance));
    }
}
