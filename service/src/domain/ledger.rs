//! Definitions of identities assigned by the settlement ledger.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::str::FromStr;

use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use serde::{Deserialize, Serialize};

/// ID assigned to a listed property by the settlement contract.
///
/// Authoritative across systems, unlike local record IDs.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Id(u64);

#[cfg(feature = "postgres")]
impl FromSql<'_> for Id {
    accepts!(INT8);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(Self(u64::try_from(i64::from_sql(ty, raw)?)?))
    }
}

#[cfg(feature = "postgres")]
impl ToSql for Id {
    accepts!(INT8);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        i64::try_from(self.0)?.to_sql(ty, w)
    }
}

/// Hash of a transaction submitted to the settlement ledger.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct TxHash(String);

impl TxHash {
    /// Creates a new [`TxHash`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `hash` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Creates a new [`TxHash`] if the given `hash` is valid.
    #[must_use]
    pub fn new(hash: impl AsRef<str>) -> Option<Self> {
        let hash = hash.as_ref().to_lowercase();
        Self::check(&hash).then_some(Self(hash))
    }

    /// Checks whether the given `hash` is a valid [`TxHash`].
    fn check(hash: impl AsRef<str>) -> bool {
        let hash = hash.as_ref();
        hash.len() > 2
            && hash.len() <= 66
            && hash.starts_with("0x")
            && hash[2..].bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl FromStr for TxHash {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `TxHash`")
    }
}

mod serde_impls {
    //! Module providing integration with [`serde`] crate.

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::TxHash;

    impl serde::Serialize for TxHash {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(self.as_ref())
        }
    }

    impl<'de> Deserialize<'de> for TxHash {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            Self::new(String::deserialize(deserializer)?)
                .ok_or_else(|| D::Error::custom("invalid `TxHash`"))
        }
    }
}

#[cfg(test)]
mod spec {
    use super::TxHash;

    #[test]
    fn accepts_hex_hashes() {
        assert!(TxHash::new("0x2f3a9c").is_some());
        assert!(TxHash::new(format!("0x{}", "a".repeat(64))).is_some());
    }

    #[test]
    fn rejects_malformed() {
        assert!(TxHash::new("0x").is_none());
        assert!(TxHash::new("2f3a9c").is_none());
        assert!(TxHash::new(format!("0x{}", "a".repeat(65))).is_none());
    }

    #[test]
    fn lowercases() {
        assert_eq!(TxHash::new("0xABC").unwrap(), TxHash::new("0xabc").unwrap());
    }
}
