//! [`Address`] definitions.

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;

/// On-chain account address.
///
/// Lowercased on construction, so addresses differing only in hex casing
/// compare equal.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Address(String);

/// Format of an [`Address`].
static FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^0x[0-9a-f]{1,64}$").unwrap_or_else(|e| {
        panic!("invalid `Address` format regex: {e}");
    })
});

impl Address {
    /// Creates a new [`Address`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `address` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Creates a new [`Address`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl AsRef<str>) -> Option<Self> {
        let address = address.as_ref().to_lowercase();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Address`].
    fn check(address: impl AsRef<str>) -> bool {
        FORMAT.is_match(address.as_ref())
    }

    /// Indicates whether this [`Address`] is the zero address.
    ///
    /// The settlement contract stores the zero address where no account is
    /// set.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }
}

impl FromStr for Address {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Address`")
    }
}

mod serde {
    //! Module providing integration with [`serde`] crate.

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::Address;

    impl serde::Serialize for Address {
        fn serialize<S: Serializer>(
            &self,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(self.as_ref())
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Self, D::Error> {
            Self::new(String::deserialize(deserializer)?)
                .ok_or_else(|| D::Error::custom("invalid `Address`"))
        }
    }
}

#[cfg(test)]
mod spec {
    use super::Address;

    #[test]
    fn lowercases() {
        assert_eq!(
            Address::new("0xABCDef01").unwrap(),
            Address::new("0xabcdef01").unwrap(),
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(Address::new("abcdef").is_none());
        assert!(Address::new("0x").is_none());
        assert!(Address::new("0xzz").is_none());
        assert!(Address::new(format!("0x{}", "0".repeat(65))).is_none());
    }

    #[test]
    fn detects_zero() {
        assert!(Address::new("0x0").unwrap().is_zero());
        assert!(Address::new("0x000").unwrap().is_zero());
        assert!(!Address::new("0x01").unwrap().is_zero());
    }
}
