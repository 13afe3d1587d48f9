//! Verification service client
//!
//! The backend delivers security codes out-of-band and, once a code checks
//! out, confirms the pending multisig request with its confirm-only key.
//! Every body it receives is signed by the account: the latest final block
//! height plus an ed25519 signature over its SHA-256 digest.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use twofa_errors::{Error, Result};
use twofa_types::{
    wire_request_id, AccountId, PublicKey, RecoveryMethod, TwoFactorMethod, TxResponse,
};
use url::Url;

use crate::rpc::RpcClient;
use crate::transport_error;

/// Remote verification backend
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// `POST /2fa/init`: start enrolling `method`
    async fn init(&self, account_id: &AccountId, method: Option<&TwoFactorMethod>)
        -> Result<Value>;

    /// `POST /2fa/send`: deliver a code for `request_id` (`None` = no request)
    async fn send(
        &self,
        account_id: &AccountId,
        method: Option<&TwoFactorMethod>,
        request_id: Option<u64>,
    ) -> Result<Value>;

    /// `POST /2fa/verify`: check a code, confirming `request_id` when present
    async fn verify(
        &self,
        account_id: &AccountId,
        security_code: &str,
        request_id: Option<u64>,
    ) -> Result<TxResponse>;

    /// `POST /2fa/getAccessKey`: public key of the server's confirm-only key
    async fn get_access_key(&self, account_id: &AccountId) -> Result<PublicKey>;

    /// `POST /account/recoveryMethods`: recovery methods of the account
    async fn recovery_methods(&self, account_id: &AccountId) -> Result<Vec<RecoveryMethod>>;
}

/// Authentication fields appended to every verification request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSignature {
    pub block_number: String,
    pub block_number_signature: String,
}

/// Produces [`RequestSignature`]s for the account
#[async_trait]
pub trait RequestSigner: Send + Sync {
    async fn sign_request(&self) -> Result<RequestSignature>;
}

/// Signs the latest final block height with the account's ed25519 key
pub struct KeyPairSigner {
    rpc: RpcClient,
    key: SigningKey,
}

impl KeyPairSigner {
    pub fn new(rpc: RpcClient, key: SigningKey) -> Self {
        Self { rpc, key }
    }

    /// Load a hex encoded secret: a 32-byte seed or a 64-byte keypair
    pub fn from_hex(rpc: RpcClient, secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| Error::Config(format!("invalid signing key hex: {e}")))?;
        let seed: [u8; 32] = match bytes.len() {
            32 | 64 => bytes[..32]
                .try_into()
                .map_err(|_| Error::Config("invalid signing key length".to_string()))?,
            n => {
                return Err(Error::Config(format!(
                    "signing key must be 32 or 64 bytes, got {n}"
                )))
            }
        };
        Ok(Self::new(rpc, SigningKey::from_bytes(&seed)))
    }

    pub fn sign_block_number(&self, block_number: u64) -> RequestSignature {
        sign_block_number(&self.key, block_number)
    }
}

#[async_trait]
impl RequestSigner for KeyPairSigner {
    async fn sign_request(&self) -> Result<RequestSignature> {
        let height = self.rpc.final_block_height().await?;
        Ok(self.sign_block_number(height))
    }
}

/// Sign `sha256(block_number)` where the block number is its decimal text
pub fn sign_block_number(key: &SigningKey, block_number: u64) -> RequestSignature {
    let block_number = block_number.to_string();
    let digest = Sha256::digest(block_number.as_bytes());
    let signature = key.sign(&digest);
    RequestSignature {
        block_number,
        block_number_signature: general_purpose::STANDARD.encode(signature.to_bytes()),
    }
}

pub(crate) fn init_body(account_id: &AccountId, method: Option<&TwoFactorMethod>) -> Value {
    json!({ "accountId": account_id, "method": method })
}

pub(crate) fn send_body(
    account_id: &AccountId,
    method: Option<&TwoFactorMethod>,
    request_id: Option<u64>,
) -> Value {
    json!({
        "accountId": account_id,
        "method": method,
        "requestId": wire_request_id(request_id),
    })
}

pub(crate) fn verify_body(
    account_id: &AccountId,
    security_code: &str,
    request_id: Option<u64>,
) -> Value {
    json!({
        "accountId": account_id,
        "securityCode": security_code,
        "requestId": wire_request_id(request_id),
    })
}

fn with_signature(mut body: Value, signature: &RequestSignature) -> Result<Value> {
    let fields = serde_json::to_value(signature)?;
    match (body.as_object_mut(), fields) {
        (Some(obj), Value::Object(fields)) => {
            obj.extend(fields);
            Ok(body)
        }
        _ => Err(Error::InvalidResponse(
            "signed request body must be a JSON object".to_string(),
        )),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessKeyResponse {
    public_key: PublicKey,
}

/// HTTP implementation of [`VerificationService`]
pub struct HttpVerificationClient {
    base_url: Url,
    http_client: HttpClient,
    signer: Arc<dyn RequestSigner>,
}

impl HttpVerificationClient {
    pub fn new(base_url: &str, timeout: Duration, signer: Arc<dyn RequestSigner>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid verification url: {e}")))?;
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            base_url,
            http_client,
            signer,
        })
    }

    /// POST `body` plus the account signature to `path`
    async fn post_signed_json(&self, path: &str, body: Value) -> Result<Value> {
        let signature = self.signer.sign_request().await?;
        let body = with_signature(body, &signature)?;
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid verification path {path}: {e}")))?;

        debug!(%url, "verification request");
        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(Error::Service {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(parse_body(&text))
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl VerificationService for HttpVerificationClient {
    async fn init(
        &self,
        account_id: &AccountId,
        method: Option<&TwoFactorMethod>,
    ) -> Result<Value> {
        self.post_signed_json("/2fa/init", init_body(account_id, method))
            .await
    }

    async fn send(
        &self,
        account_id: &AccountId,
        method: Option<&TwoFactorMethod>,
        request_id: Option<u64>,
    ) -> Result<Value> {
        self.post_signed_json("/2fa/send", send_body(account_id, method, request_id))
            .await
    }

    async fn verify(
        &self,
        account_id: &AccountId,
        security_code: &str,
        request_id: Option<u64>,
    ) -> Result<TxResponse> {
        self.post_signed_json(
            "/2fa/verify",
            verify_body(account_id, security_code, request_id),
        )
        .await
        .map(TxResponse)
    }

    async fn get_access_key(&self, account_id: &AccountId) -> Result<PublicKey> {
        let value = self
            .post_signed_json("/2fa/getAccessKey", json!({ "accountId": account_id }))
            .await?;
        let response: AccessKeyResponse = serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse(format!("getAccessKey: {e}")))?;
        Ok(response.public_key)
    }

    async fn recovery_methods(&self, account_id: &AccountId) -> Result<Vec<RecoveryMethod>> {
        let value = self
            .post_signed_json("/account/recoveryMethods", json!({ "accountId": account_id }))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse(format!("recoveryMethods: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    fn account() -> AccountId {
        "alice.testnet".parse().unwrap()
    }

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn test_request_bodies() {
        let method = TwoFactorMethod::new("2fa-email", Some("a@b.c".to_string()));
        assert_eq!(
            send_body(&account(), Some(&method), None),
            json!({
                "accountId": "alice.testnet",
                "method": { "kind": "2fa-email", "detail": "a@b.c", "createdAt": null },
                "requestId": -1
            })
        );
        assert_eq!(
            verify_body(&account(), "123456", Some(0)),
            json!({ "accountId": "alice.testnet", "securityCode": "123456", "requestId": 0 })
        );
        assert_eq!(
            init_body(&account(), None),
            json!({ "accountId": "alice.testnet", "method": null })
        );
    }

    #[test]
    fn test_block_number_signature_verifies() {
        let key = key();
        let signed = sign_block_number(&key, 1234);
        assert_eq!(signed.block_number, "1234");

        let bytes = general_purpose::STANDARD
            .decode(&signed.block_number_signature)
            .unwrap();
        let signature = Signature::from_slice(&bytes).unwrap();
        let digest = Sha256::digest(b"1234");
        assert!(key.verifying_key().verify(&digest, &signature).is_ok());
    }

    #[test]
    fn test_signature_fields_are_merged() {
        let signed = sign_block_number(&key(), 99);
        let body = with_signature(json!({ "accountId": "alice.testnet" }), &signed).unwrap();
        assert_eq!(body["accountId"], "alice.testnet");
        assert_eq!(body["blockNumber"], "99");
        assert!(body["blockNumberSignature"].is_string());

        assert!(with_signature(json!([1]), &signed).is_err());
    }

    #[test]
    fn test_signer_from_hex() {
        let rpc = RpcClient::new("http://localhost:3030", Duration::from_secs(1)).unwrap();
        let seed_hex = hex::encode([7u8; 32]);
        let signer = KeyPairSigner::from_hex(rpc.clone(), &seed_hex).unwrap();
        assert_eq!(signer.sign_block_number(5), sign_block_number(&key(), 5));

        let keypair_hex = hex::encode([7u8; 64]);
        assert!(KeyPairSigner::from_hex(rpc.clone(), &keypair_hex).is_ok());
        assert!(KeyPairSigner::from_hex(rpc.clone(), "abcd").is_err());
        assert!(KeyPairSigner::from_hex(rpc, "zz").is_err());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"ok\":1}"), json!({ "ok": 1 }));
        assert_eq!(parse_body("OK"), json!("OK"));
    }
}
