//! Session endpoints.

use axum::{Extension, Json};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::Address,
};

use crate::{AsError, Error, Service};

/// Request of the [`create()`] endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// [`Address`] of the account to issue a session for.
    pub address: Address,
}

/// Response of the [`create()`] endpoint.
#[derive(Debug, Serialize)]
pub struct Session {
    /// Issued access token.
    pub token: String,

    /// [`Address`] of the account the session belongs to.
    pub address: Address,

    /// [RFC 3339] timestamp of the session expiration.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub expires_at: String,
}

/// `POST /auth/session` endpoint issuing an access token for an on-chain
/// account.
///
/// Wallet-signature verification happens upstream, so issuance is the
/// trusted boundary here.
pub async fn create(
    Extension(service): Extension<Service>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Session>), Error> {
    let CreateRequest { address } = req;

    let out = service
        .execute(command::CreateSession { address })
        .await
        .map_err(AsError::into_error)?;

    Ok((
        StatusCode::CREATED,
        Json(Session {
            token: out.token.to_string(),
            address: out.session.address,
            expires_at: out.session.expires_at.to_rfc3339(),
        }),
    ))
}

impl AsError for command::create_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::ZeroAddress => Some(Error::validation(&self)),
            Self::JsonWebTokenEncodeError(_) => None,
        }
    }
}
