//! Domain definitions.

pub mod address;
pub mod booking;
pub mod ledger;
pub mod payment;
pub mod property;
pub mod session;

pub use self::{
    address::Address, booking::Booking, payment::Payment, property::Property,
    session::Session,
};
