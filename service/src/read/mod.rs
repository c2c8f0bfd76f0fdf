//! Read entities definitions.

pub mod booking;
pub mod health;
pub mod payment;
pub mod property;
