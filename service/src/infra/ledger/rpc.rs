//! JSON-RPC [`Ledger`] client implementation.

use std::time::Duration;

use common::Amount;
use derive_more::{Display, Error as StdError, From};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracerr::Traced;

use crate::domain::{ledger, Address};

use super::{
    call, codec, view, Error as LedgerError, Execution, Finality, Ledger,
    Outcome, PropertyView,
};

/// [`Rpc`] client configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// URL of the account gateway endpoint.
    pub endpoint: String,

    /// [`Address`] of the settlement contract.
    pub contract_address: Address,

    /// API key authenticating requests to the account gateway, if required.
    pub api_key: Option<SecretString>,

    /// Deadline for a submitted transaction to reach finality.
    ///
    /// Once elapsed, the outcome is reported as [`Finality::TimedOut`].
    pub finality_timeout: Duration,

    /// Interval of polling a submitted transaction's receipt.
    pub poll_interval: Duration,
}

/// [`Ledger`] client speaking JSON-RPC 2.0 to the account gateway owning
/// the signing key.
///
/// The gateway signs and submits transactions on behalf of the marketplace
/// account, so no key material lives in this process.
#[derive(Clone, Debug)]
pub struct Rpc {
    /// HTTP client performing the requests.
    http: reqwest::Client,

    /// Configuration of this client.
    config: Config,
}

impl Rpc {
    /// Creates a new [`Rpc`] client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If failed to initialize the underlying HTTP client.
    pub fn new(config: Config) -> Result<Self, Traced<Error>> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        Ok(Self { http, config })
    }

    /// Performs a single JSON-RPC request to the account gateway.
    async fn request<P, R>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<R, Traced<Error>>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let mut req = self.http.post(&self.config.endpoint).json(&Request {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        });
        if let Some(key) = &self.config.api_key {
            req = req.header("x-api-key", key.expose_secret());
        }

        let resp: Response<R> = req
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?
            .json()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        if let Some(e) = resp.error {
            return Err(tracerr::new!(Error::Rejected {
                code: e.code,
                message: e.message,
            }));
        }
        resp.result.ok_or_else(|| tracerr::new!(Error::EmptyResponse))
    }

    /// Submits a state-changing invocation of the provided entrypoint.
    async fn submit(
        &self,
        entrypoint: &'static str,
        calldata: Vec<String>,
    ) -> Result<ledger::TxHash, Traced<Error>> {
        let result: ExecuteResult = self
            .request(
                "account_execute",
                InvocationParams {
                    contract_address: self.config.contract_address.as_ref(),
                    entry_point: entrypoint,
                    calldata,
                },
            )
            .await?;
        ledger::TxHash::new(&result.transaction_hash).ok_or_else(|| {
            tracerr::new!(Error::Decode(codec::DecodeError::InvalidHex))
        })
    }

    /// Submits a state-changing invocation and awaits its [`Finality`].
    async fn invoke(
        &self,
        entrypoint: &'static str,
        calldata: Vec<String>,
    ) -> Result<Outcome, Traced<Error>> {
        let tx_hash = self.submit(entrypoint, calldata).await?;
        let finality = self.await_finality(&tx_hash).await?;
        Ok(Outcome { tx_hash, finality })
    }

    /// Polls the receipt of the provided transaction until it reaches
    /// finality or the configured deadline elapses.
    async fn await_finality(
        &self,
        tx_hash: &ledger::TxHash,
    ) -> Result<Finality, Traced<Error>> {
        let deadline =
            tokio::time::Instant::now() + self.config.finality_timeout;
        loop {
            if let Some(execution) = self.receipt(tx_hash).await? {
                return Ok(Finality::Final(execution));
            }
            if tokio::time::Instant::now() + self.config.poll_interval
                > deadline
            {
                return Ok(Finality::TimedOut);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Looks up the receipt of the provided transaction.
    ///
    /// [`None`] means the transaction hasn't reached a terminal state yet.
    async fn receipt(
        &self,
        tx_hash: &ledger::TxHash,
    ) -> Result<Option<Execution>, Traced<Error>> {
        let receipt: Option<Receipt> = self
            .request(
                "account_getReceipt",
                ReceiptParams {
                    transaction_hash: tx_hash.as_ref(),
                },
            )
            .await?;
        Ok(receipt.map(|r| {
            if r.execution_status == "SUCCEEDED" {
                Execution::Succeeded
            } else {
                Execution::Reverted(
                    r.revert_reason.unwrap_or(r.execution_status),
                )
            }
        }))
    }

    /// Performs a read-only invocation of the provided entrypoint.
    async fn call(
        &self,
        entrypoint: &'static str,
        calldata: Vec<String>,
    ) -> Result<Vec<String>, Traced<Error>> {
        let result: CallResult = self
            .request(
                "account_call",
                InvocationParams {
                    contract_address: self.config.contract_address.as_ref(),
                    entry_point: entrypoint,
                    calldata,
                },
            )
            .await?;
        Ok(result.result)
    }
}

impl Ledger<call::List> for Rpc {
    type Ok = Outcome;
    type Err = Traced<LedgerError>;

    async fn execute(&self, args: call::List) -> Result<Self::Ok, Self::Err> {
        let mut calldata = Vec::with_capacity(3);
        calldata.extend(codec::uint256(args.rent_per_month.to_u128()));
        calldata.push(codec::short_string(args.description.as_ref()));

        self.invoke("list_property", calldata)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> LedgerError))
    }
}

impl Ledger<call::Book> for Rpc {
    type Ok = Outcome;
    type Err = Traced<LedgerError>;

    async fn execute(&self, args: call::Book) -> Result<Self::Ok, Self::Err> {
        let mut calldata = Vec::with_capacity(3);
        calldata.extend(codec::uint256(u64::from(args.property_id).into()));
        calldata.push(codec::uint(u32::from(args.duration).into()));

        self.invoke("book_property", calldata)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> LedgerError))
    }
}

impl Ledger<call::Pay> for Rpc {
    type Ok = Outcome;
    type Err = Traced<LedgerError>;

    async fn execute(&self, args: call::Pay) -> Result<Self::Ok, Self::Err> {
        let mut calldata = Vec::with_capacity(4);
        calldata.extend(codec::uint256(u64::from(args.property_id).into()));
        calldata.extend(codec::uint256(args.amount.to_u128()));

        self.invoke("pay_rent", calldata)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> LedgerError))
    }
}

impl Ledger<view::Property> for Rpc {
    type Ok = PropertyView;
    type Err = Traced<LedgerError>;

    async fn execute(
        &self,
        args: view::Property,
    ) -> Result<Self::Ok, Self::Err> {
        let calldata = codec::uint256(u64::from(args.0).into()).into();
        let fields = self
            .call("get_property", calldata)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> LedgerError))?;

        decode_property_view(&fields)
            .map_err(Error::Decode)
            .map_err(tracerr::from_and_wrap!(=> LedgerError))
    }
}

impl Ledger<view::Count> for Rpc {
    type Ok = ledger::Id;
    type Err = Traced<LedgerError>;

    async fn execute(&self, _: view::Count) -> Result<Self::Ok, Self::Err> {
        let fields = self
            .call("get_property_count", Vec::new())
            .await
            .map_err(tracerr::map_from_and_wrap!(=> LedgerError))?;

        let [low, high] = fields.as_slice() else {
            return Err(tracerr::new!(LedgerError::from(Error::Decode(
                codec::DecodeError::MissingField,
            ))));
        };
        codec::parse_uint256(low, high)
            .and_then(|count| {
                u64::try_from(count).map_err(|_| codec::DecodeError::Overflow)
            })
            .map(ledger::Id::from)
            .map_err(Error::Decode)
            .map_err(tracerr::from_and_wrap!(=> LedgerError))
    }
}

impl Ledger<view::Receipt> for Rpc {
    type Ok = Option<Execution>;
    type Err = Traced<LedgerError>;

    async fn execute(
        &self,
        args: view::Receipt,
    ) -> Result<Self::Ok, Self::Err> {
        self.receipt(&args.0)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> LedgerError))
    }
}

/// Decodes the `get_property` output fields into a [`PropertyView`].
fn decode_property_view(
    fields: &[String],
) -> Result<PropertyView, codec::DecodeError> {
    use codec::DecodeError as E;

    let [owner, tenant, rent_low, rent_high, is_available, description] =
        fields
    else {
        return Err(E::MissingField);
    };

    let tenant = codec::parse_address(tenant)?;
    Ok(PropertyView {
        owner: codec::parse_address(owner)?,
        tenant: (!tenant.is_zero()).then_some(tenant),
        rent_per_month: Amount::from(
            u64::try_from(codec::parse_uint256(rent_low, rent_high)?)
                .map_err(|_| E::Overflow)?,
        ),
        is_available: codec::parse_bool(is_available)?,
        description: codec::parse_short_string(description)?,
    })
}

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct Request<P> {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,

    /// ID of the request.
    id: u32,

    /// Name of the invoked method.
    method: &'static str,

    /// Parameters of the invoked method.
    params: P,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct Response<R> {
    /// Successful result of the request.
    result: Option<R>,

    /// Error of the request.
    error: Option<ResponseError>,
}

/// JSON-RPC response error.
#[derive(Debug, Deserialize)]
struct ResponseError {
    /// Code of this error.
    code: i64,

    /// Human-readable message of this error.
    message: String,
}

/// Parameters of `account_execute` and `account_call` methods.
#[derive(Debug, Serialize)]
struct InvocationParams<'a> {
    /// [`Address`] of the contract to invoke.
    contract_address: &'a str,

    /// Name of the invoked entrypoint.
    entry_point: &'static str,

    /// Encoded arguments of the invocation.
    calldata: Vec<String>,
}

/// Parameters of the `account_getReceipt` method.
#[derive(Debug, Serialize)]
struct ReceiptParams<'a> {
    /// Hash of the transaction to look up.
    transaction_hash: &'a str,
}

/// Result of the `account_execute` method.
#[derive(Debug, Deserialize)]
struct ExecuteResult {
    /// Hash of the submitted transaction.
    transaction_hash: String,
}

/// Result of the `account_call` method.
#[derive(Debug, Deserialize)]
struct CallResult {
    /// Output fields of the invoked entrypoint.
    result: Vec<String>,
}

/// Receipt of a settled transaction.
#[derive(Debug, Deserialize)]
struct Receipt {
    /// Terminal execution status of the transaction.
    execution_status: String,

    /// Reason the transaction was reverted, if it was.
    #[serde(default)]
    revert_reason: Option<String>,
}

/// [`Rpc`] client error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Failed to reach the account gateway.
    #[display("failed to reach the account gateway: {_0}")]
    Transport(reqwest::Error),

    /// Account gateway rejected the request.
    #[display("account gateway rejected the request ({code}): {message}")]
    #[from(ignore)]
    Rejected {
        /// JSON-RPC error code.
        code: i64,

        /// Human-readable message.
        message: String,
    },

    /// Account gateway returned a malformed response field.
    #[display("malformed account gateway response: {_0}")]
    Decode(codec::DecodeError),

    /// Account gateway returned neither a result nor an error.
    #[display("account gateway returned neither a result nor an error")]
    EmptyResponse,
}

impl Error {
    /// Indicates whether this [`Error`] is a transport failure.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Indicates whether this [`Error`] is a rejection of the request.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod spec {
    use super::decode_property_view;

    #[test]
    fn decodes_property_view() {
        let fields = [
            "0xabc".to_owned(),
            "0x0".to_owned(),
            "0x3e8".to_owned(),
            "0x0".to_owned(),
            "0x1".to_owned(),
            "0x5365612076696577".to_owned(),
        ];
        let view = decode_property_view(&fields).unwrap();

        assert_eq!(AsRef::<str>::as_ref(&view.owner), "0xabc");
        assert!(view.tenant.is_none());
        assert_eq!(view.rent_per_month, common::Amount::from(1000));
        assert!(view.is_available);
        assert_eq!(view.description, "Sea view");
    }

    #[test]
    fn decodes_occupied_property_view() {
        let fields = [
            "0xabc".to_owned(),
            "0xDEF".to_owned(),
            "0x3e8".to_owned(),
            "0x0".to_owned(),
            "0x0".to_owned(),
            "0x0".to_owned(),
        ];
        let view = decode_property_view(&fields).unwrap();

        assert_eq!(AsRef::<str>::as_ref(&view.tenant.unwrap()), "0xdef");
        assert!(!view.is_available);
        assert_eq!(view.description, "");
    }

    #[test]
    fn rejects_truncated_view() {
        assert!(decode_property_view(&["0xabc".to_owned()]).is_err());
    }
}
