//! [`Ledger`]-related implementations.

pub mod codec;
pub mod rpc;

use common::Amount;
use derive_more::{Display, Error as StdError, From};

use crate::domain::{ledger, Address};

pub use self::rpc::Rpc;

/// Ledger operation.
pub use common::Handler as Ledger;

/// [`Ledger`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// [`Rpc`] error.
    Rpc(rpc::Error),
}

impl Error {
    /// Indicates whether this [`Error`] means the ledger could not be
    /// reached at all.
    ///
    /// Such errors are transient and retryable.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Rpc(e) => e.is_transport(),
        }
    }

    /// Indicates whether this [`Error`] is a rejection of the submitted
    /// invocation.
    ///
    /// A rejected invocation must not be retried with the same arguments.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        match self {
            Self::Rpc(e) => e.is_rejection(),
        }
    }
}

/// State-changing [`Ledger`] entrypoint invocations.
pub mod call {
    use common::Amount;

    use crate::domain::{booking, ledger, property};

    /// `list_property` entrypoint invocation, listing a new property on the
    /// ledger.
    #[derive(Clone, Debug)]
    pub struct List {
        /// Monthly rent of the listed property.
        pub rent_per_month: Amount,

        /// Description of the listed property.
        ///
        /// Truncated to the ledger's short string length on encoding.
        pub description: property::Description,
    }

    /// `book_property` entrypoint invocation.
    #[derive(Clone, Copy, Debug)]
    pub struct Book {
        /// Ledger-assigned ID of the property to book.
        pub property_id: ledger::Id,

        /// Duration of the lease.
        pub duration: booking::Months,
    }

    /// `pay_rent` entrypoint invocation.
    #[derive(Clone, Copy, Debug)]
    pub struct Pay {
        /// Ledger-assigned ID of the property to pay for.
        pub property_id: ledger::Id,

        /// [`Amount`] to transfer.
        pub amount: Amount,
    }
}

/// Read-only [`Ledger`] entrypoint invocations.
pub mod view {
    use crate::domain::ledger;

    /// `get_property` entrypoint invocation.
    #[derive(Clone, Copy, Debug)]
    pub struct Property(pub ledger::Id);

    /// `get_property_count` entrypoint invocation.
    #[derive(Clone, Copy, Debug)]
    pub struct Count;

    /// Receipt lookup of a submitted transaction.
    #[derive(Clone, Debug)]
    pub struct Receipt(pub ledger::TxHash);
}

/// Terminal execution status of a settled transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Execution {
    /// Transaction was executed successfully.
    Succeeded,

    /// Transaction was reverted by the ledger.
    Reverted(String),
}

/// Finality of a submitted transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Finality {
    /// Transaction reached its terminal on-ledger state.
    Final(Execution),

    /// Outcome is unknown: the finality deadline elapsed first.
    ///
    /// The transaction may still settle later, so it must be reconciled by
    /// its hash, never assumed failed.
    TimedOut,
}

/// Outcome of a state-changing [`Ledger`] invocation.
#[derive(Clone, Debug)]
pub struct Outcome {
    /// Hash of the submitted transaction.
    pub tx_hash: ledger::TxHash,

    /// [`Finality`] the transaction reached within the deadline.
    pub finality: Finality,
}

/// Decoded `get_property` view of a property on the ledger.
#[derive(Clone, Debug)]
pub struct PropertyView {
    /// [`Address`] of the owning account.
    pub owner: Address,

    /// [`Address`] of the renting account, if any.
    pub tenant: Option<Address>,

    /// Monthly rent of the property.
    pub rent_per_month: Amount,

    /// Indicator whether the property is open for booking.
    pub is_available: bool,

    /// Description of the property, as stored on the ledger.
    pub description: String,
}
