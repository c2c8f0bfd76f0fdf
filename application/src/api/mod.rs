//! REST API definitions.

pub mod booking;
pub mod health;
pub mod payment;
pub mod property;
pub mod session;

use axum::{
    routing::{get, patch, post},
    Router,
};

/// Builds the [`Router`] serving the REST API.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/auth/session", post(session::create))
        .route("/properties", get(property::list).post(property::create))
        .route(
            "/properties/:id",
            get(property::by_id).delete(property::delist),
        )
        .route("/properties/:id/sync", post(property::sync))
        .route("/properties/:id/maintenance", patch(property::maintenance))
        .route("/bookings", get(booking::list).post(booking::create))
        .route("/bookings/:id", get(booking::by_id).patch(booking::update))
        .route("/payments/deposit/:booking_id", post(payment::deposit))
        .route("/payments/rent/:booking_id", post(payment::rent))
        .route("/payments/:id/refund", post(payment::refund))
        .route("/payments/history/:booking_id", get(payment::history))
        .route("/healthz", get(health::check))
}
