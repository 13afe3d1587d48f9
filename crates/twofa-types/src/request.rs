//! In-flight request tracking and operation results

use crate::AccountId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire value standing for "no on-chain request to confirm"
pub const NO_REQUEST_ID: i64 = -1;

/// Identity of the most recently sent request.
///
/// Persisted as `{"accountId": .., "requestId": ..}`. A missing request id is
/// written as `-1`; reading treats absent, null, negative and non-integer
/// values alike. Zero is a real request id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(
        default,
        serialize_with = "serialize_request_id",
        deserialize_with = "deserialize_request_id"
    )]
    pub request_id: Option<u64>,
}

impl PendingRequestRecord {
    pub fn new(account_id: AccountId, request_id: Option<u64>) -> Self {
        Self {
            account_id: Some(account_id),
            request_id,
        }
    }

    /// Request id in wire form, `-1` when absent
    pub fn wire_request_id(&self) -> i64 {
        wire_request_id(self.request_id)
    }

    pub fn is_empty(&self) -> bool {
        self.account_id.is_none() && self.request_id.is_none()
    }
}

/// Encode an optional request id, mapping `None` to the `-1` sentinel
pub fn wire_request_id(request_id: Option<u64>) -> i64 {
    request_id
        .and_then(|id| i64::try_from(id).ok())
        .unwrap_or(NO_REQUEST_ID)
}

fn serialize_request_id<S: Serializer>(id: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(wire_request_id(*id))
}

fn deserialize_request_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(serde_json::Value::as_u64))
}

/// Opaque transaction or verification response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxResponse(pub serde_json::Value);

impl TxResponse {
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for TxResponse {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Result of an operation that goes through the multisig request flow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A request was created, verified by the user and confirmed
    Confirmed { response: TxResponse },
    /// The contract nonce did not advance, so no request is pending
    /// verification. The contract may already have executed the actions.
    NotCreated { nonce: u64 },
    /// Nothing to do: the key being added is already on the account
    AlreadyPresent,
}

impl RequestOutcome {
    pub fn response(&self) -> Option<&TxResponse> {
        match self {
            RequestOutcome::Confirmed { response } => Some(response),
            _ => None,
        }
    }
}
