//! [`Command`] for creating a [`Session`].

use std::time::Duration;

use common::DateTime;
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::session::Token;
use crate::{
    domain::{session, Address, Session},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`].
///
/// Possession of the account's private key is proven on the ledger side once
/// the account signs its first invocation, so no credentials are verified
/// here.
#[derive(Clone, Debug, From)]
pub struct CreateSession {
    /// [`Address`] of the account to create a [`Session`] for.
    pub address: Address,
}

impl CreateSession {
    /// [`Duration`] of [`Session`] expiration.
    const EXPIRATION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
}

/// Output of [`CreateSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the created [`Session`].
    pub token: session::Token,

    /// Created [`Session`].
    pub session: Session,
}

impl<Db, Lg> Command<CreateSession> for Service<Db, Lg> {
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateSession,
    ) -> Result<Self::Ok, Self::Err> {
        use CreateSession as Cmd;
        use ExecutionError as E;

        let Cmd { address } = cmd;

        if address.is_zero() {
            return Err(tracerr::new!(E::ZeroAddress));
        }

        let expires_at = (DateTime::now() + Cmd::EXPIRATION_DURATION).coerce();
        let session = Session {
            address,
            expires_at,
        };
        let token = jsonwebtoken::encode::<Session>(
            &jsonwebtoken::Header::default(),
            &session,
            &self.config.jwt_encoding_key,
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        // SAFETY: `jsonwebtoken::encode` always returns a valid
        //         `session::Token`.
        #[expect(unsafe_code, reason = "invariants are preserved")]
        let token = unsafe { session::Token::new_unchecked(token) };

        Ok(Output { token, session })
    }
}

/// Error of [`CreateSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// Provided [`Address`] is the zero address.
    #[display("Zero `Address` cannot own a `Session`")]
    ZeroAddress,
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{domain::Address, testing};

    use super::{CreateSession, ExecutionError};

    #[tokio::test]
    async fn issues_decodable_token() {
        let service = testing::service();

        let address = Address::new(
            "0x04a093c37ab61065b001550db9c5a2a10de7aba27fc77fd77a1a70c7c38d92f2",
        )
        .unwrap();
        let out = service
            .execute(CreateSession {
                address: address.clone(),
            })
            .await
            .unwrap();

        assert_eq!(out.session.address, address);

        let session = service
            .execute(crate::command::AuthorizeSession { token: out.token })
            .await
            .unwrap();
        assert_eq!(session.address, address);
    }

    #[tokio::test]
    async fn rejects_zero_address() {
        let service = testing::service();

        let result = service
            .execute(CreateSession {
                address: Address::new("0x0").unwrap(),
            })
            .await;

        assert!(matches!(
            result.unwrap_err().as_ref(),
            ExecutionError::ZeroAddress,
        ));
    }
}
