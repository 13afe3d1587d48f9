//! JSON-RPC client for chain queries
//!
//! Covers the read-only calls the coordinator needs without a signer:
//! latest final block, contract view calls and access key listing.

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use twofa_errors::{Error, Result};
use twofa_types::{AccessKeyInfo, AccountId};
use url::Url;

use crate::transport_error;

/// RPC request
#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Value,
}

/// RPC response
#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// RPC error
#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct BlockView {
    header: BlockHeader,
}

#[derive(Deserialize)]
struct BlockHeader {
    height: u64,
}

#[derive(Deserialize)]
struct CallResult {
    result: Vec<u8>,
}

#[derive(Deserialize)]
struct AccessKeyList {
    keys: Vec<AccessKeyInfo>,
}

/// Chain node JSON-RPC client
#[derive(Clone)]
pub struct RpcClient {
    url: Url,
    http_client: HttpClient,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Config(format!("invalid rpc url: {e}")))?;
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self { url, http_client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn rpc_request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: "dontcare",
            method,
            params,
        };

        debug!(method, url = %self.url, "rpc request");
        let response = self
            .http_client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let rpc_response: RpcResponse<T> = response.json().await.map_err(transport_error)?;

        if let Some(error) = rpc_response.error {
            let message = match error.data {
                Some(Value::String(data)) => format!("{}: {data}", error.message),
                _ => error.message,
            };
            return Err(Error::Rpc {
                code: error.code,
                message,
            });
        }

        rpc_response
            .result
            .ok_or_else(|| Error::InvalidResponse("missing result field".to_string()))
    }

    /// Query with `finality: final`, surfacing errors nodes embed in `result`
    async fn query<T: DeserializeOwned>(&self, mut params: Value) -> Result<T> {
        if let Some(obj) = params.as_object_mut() {
            obj.insert("finality".to_string(), json!("final"));
        }
        let result: Value = self.rpc_request("query", params).await?;
        if let Some(error) = result.get("error").and_then(Value::as_str) {
            return Err(Error::Rpc {
                code: -32000,
                message: error.to_string(),
            });
        }
        Ok(serde_json::from_value(result)?)
    }

    /// Height of the latest final block
    pub async fn final_block_height(&self) -> Result<u64> {
        let block: BlockView = self
            .rpc_request("block", json!({ "finality": "final" }))
            .await?;
        Ok(block.header.height)
    }

    /// Call a view method and decode its JSON result
    pub async fn view_function(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: &Value,
    ) -> Result<Value> {
        let call: CallResult = self
            .query(json!({
                "request_type": "call_function",
                "account_id": contract_id,
                "method_name": method_name,
                "args_base64": encode_args(args)?,
            }))
            .await?;
        decode_call_result(&call.result)
    }

    /// Access keys registered on `account_id`
    pub async fn view_access_key_list(&self, account_id: &AccountId) -> Result<Vec<AccessKeyInfo>> {
        let list: AccessKeyList = self
            .query(json!({
                "request_type": "view_access_key_list",
                "account_id": account_id,
            }))
            .await?;
        Ok(list.keys)
    }
}

fn encode_args(args: &Value) -> Result<String> {
    use base64::{engine::general_purpose, Engine as _};
    Ok(general_purpose::STANDARD.encode(serde_json::to_vec(args)?))
}

fn decode_call_result(bytes: &[u8]) -> Result<Value> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}
