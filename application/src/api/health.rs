//! Health endpoint.

use axum::{Extension, Json};
use http::StatusCode;
use serde::Serialize;
use service::{
    query::{self, Query as _},
    read,
};

use crate::{Error, Service};

/// Wire representation of a [`read::health::Report`].
#[derive(Debug, Serialize)]
pub struct Report {
    /// State of the storage.
    pub storage: Component,

    /// State of the settlement ledger.
    pub ledger: Component,
}

/// Wire representation of a [`read::health::Component`].
#[derive(Debug, Serialize)]
pub struct Component {
    /// Indicator whether the collaborator is reachable.
    pub ok: bool,

    /// Failure description, if the collaborator is unreachable.
    pub error: Option<String>,
}

impl From<read::health::Component> for Component {
    fn from(c: read::health::Component) -> Self {
        Self {
            ok: c.ok,
            error: c.error,
        }
    }
}

/// `GET /healthz` endpoint probing the storage and the settlement ledger.
///
/// Responds with `503 Service Unavailable` if any collaborator is down.
pub async fn check(
    Extension(service): Extension<Service>,
) -> Result<(StatusCode, Json<Report>), Error> {
    let report = match service.execute(query::health::Check).await {
        Ok(report) => report,
        Err(never) => match never {},
    };

    let status = if report.storage.ok && report.ledger.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        status,
        Json(Report {
            storage: report.storage.into(),
            ledger: report.ledger.into(),
        }),
    ))
}
