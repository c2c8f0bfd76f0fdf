//! [`Command`] for authorizing a [`Session`].

use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{session, Session},
    Service,
};

use super::Command;

/// [`Command`] for authorizing a [`Session`].
#[derive(Clone, Debug, From)]
pub struct AuthorizeSession {
    /// [`Session`] token to authorize.
    pub token: session::Token,
}

impl<Db, Lg> Command<AuthorizeSession> for Service<Db, Lg> {
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeSession { token } = cmd;

        // `exp` claim is validated by `jsonwebtoken` itself.
        let session = jsonwebtoken::decode::<Session>(
            token.as_ref(),
            &self.config.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        Ok(session)
    }
}

/// Error of [`AuthorizeSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod spec {
    use common::Handler as _;

    use crate::{domain::session, testing};

    use super::AuthorizeSession;

    #[tokio::test]
    async fn rejects_garbage_token() {
        let service = testing::service();

        // SAFETY: Malformed on purpose.
        #[expect(unsafe_code, reason = "intentionally invalid")]
        let token =
            unsafe { session::Token::new_unchecked("not-a-jwt".into()) };
        assert!(service.execute(AuthorizeSession { token }).await.is_err());
    }
}
