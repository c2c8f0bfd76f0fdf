//! [`Amount`]-related definitions.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{fmt, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use rust_decimal::{prelude::ToPrimitive as _, Decimal};

/// Amount of money in the smallest indivisible unit of the settlement
/// currency.
///
/// Always a non-negative integer: the settlement layer operates on whole
/// token units, so fractional amounts are not representable.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Amount(Decimal);

impl Amount {
    /// Creates a new [`Amount`] from the provided [`Decimal`] value.
    ///
    /// [`None`] is returned if the value is negative or fractional.
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        (value.is_integer() && !value.is_sign_negative())
            .then_some(Self(value.normalize()))
    }

    /// Multiplies this [`Amount`] by the provided factor.
    ///
    /// [`None`] is returned on overflow.
    #[must_use]
    pub fn checked_mul(self, factor: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(factor)).map(Self)
    }

    /// Returns this [`Amount`] as a [`u128`] value.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn to_u128(self) -> u128 {
        self.0.to_u128().expect("non-negative integer")
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s).map_err(|_| "invalid amount")?;
        Self::new(value).ok_or("negative or fractional amount")
    }
}

#[cfg(feature = "postgres")]
impl FromSql<'_> for Amount {
    accepts!(NUMERIC);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Self::new(Decimal::from_sql(ty, raw)?)
            .ok_or_else(|| "negative or fractional `Amount`".into())
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Amount {
    accepts!(NUMERIC);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, w)
    }
}

#[cfg(feature = "serde")]
mod serde {
    //! Module providing integration with [`serde`] crate.

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Amount;

    impl Serialize for Amount {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_u128(self.to_u128())
        }
    }

    impl<'de> Deserialize<'de> for Amount {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            u64::deserialize(deserializer).map(Self::from)
        }
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::Amount;

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn accepts_non_negative_integers() {
        assert_eq!(Amount::new(decimal("0")).unwrap(), Amount::from(0));
        assert_eq!(Amount::new(decimal("1000")).unwrap(), Amount::from(1000));
        assert_eq!(
            Amount::new(decimal("1000.00")).unwrap(),
            Amount::from(1000),
        );
    }

    #[test]
    fn rejects_negative_and_fractional() {
        assert!(Amount::new(decimal("-1")).is_none());
        assert!(Amount::new(decimal("0.5")).is_none());
        assert!(Amount::new(decimal("-0.5")).is_none());
    }

    #[test]
    fn from_str() {
        assert_eq!(Amount::from_str("1000").unwrap(), Amount::from(1000));
        assert!(Amount::from_str("-1000").is_err());
        assert!(Amount::from_str("10.5").is_err());
        assert!(Amount::from_str("many").is_err());
    }

    #[test]
    fn multiplies() {
        assert_eq!(
            Amount::from(1000).checked_mul(6).unwrap(),
            Amount::from(6000),
        );
        assert_eq!(Amount::from(0).checked_mul(12).unwrap(), Amount::from(0));
    }

    #[test]
    fn to_u128() {
        assert_eq!(Amount::from(u64::MAX).to_u128(), u128::from(u64::MAX));
    }

    #[test]
    fn to_string() {
        assert_eq!(Amount::from(6000).to_string(), "6000");
        assert_eq!(Amount::new(decimal("6000.0")).unwrap().to_string(), "6000");
    }
}
