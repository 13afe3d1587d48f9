//! Typed gateway to an account's multisig contract

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use twofa_errors::{Error, Result};
use twofa_types::{AccountId, Balance, Gas, MultisigRequest, TxResponse};

use crate::account::Account;

/// Operations of the multisig contract deployed on an account
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Id the next request will receive
    async fn get_request_nonce(&self) -> Result<u64>;

    /// Ids of requests not yet confirmed or deleted
    async fn list_request_ids(&self) -> Result<Vec<u64>>;

    async fn add_request(&self, request: &MultisigRequest) -> Result<TxResponse>;

    async fn add_request_and_confirm(&self, request: &MultisigRequest) -> Result<TxResponse>;

    async fn delete_request(&self, request_id: u64) -> Result<TxResponse>;

    async fn confirm(&self, request_id: u64) -> Result<TxResponse>;
}

/// Gateway calling the contract deployed on the signing account itself
pub struct MultisigContract {
    account: Arc<dyn Account>,
    contract_id: AccountId,
    gas: Gas,
}

impl MultisigContract {
    /// Bind to the contract on `account`, attaching `gas` to change calls
    pub fn new(account: Arc<dyn Account>, gas: Gas) -> Self {
        let contract_id = account.account_id().clone();
        Self {
            account,
            contract_id,
            gas,
        }
    }

    pub fn contract_id(&self) -> &AccountId {
        &self.contract_id
    }

    async fn view(&self, method_name: &str) -> Result<Value> {
        self.account
            .view_function(&self.contract_id, method_name, json!({}))
            .await
    }

    async fn change(&self, method_name: &str, args: Value) -> Result<TxResponse> {
        debug!(contract = %self.contract_id, method_name, "multisig change call");
        self.account
            .function_call(&self.contract_id, method_name, args, self.gas, Balance(0))
            .await
    }
}

#[async_trait]
impl ContractGateway for MultisigContract {
    async fn get_request_nonce(&self) -> Result<u64> {
        let value = self.view("get_request_nonce").await?;
        value.as_u64().ok_or_else(|| {
            Error::InvalidResponse(format!("get_request_nonce returned {value}"))
        })
    }

    async fn list_request_ids(&self) -> Result<Vec<u64>> {
        let value = self.view("list_request_ids").await?;
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse(format!("list_request_ids: {e}")))
    }

    async fn add_request(&self, request: &MultisigRequest) -> Result<TxResponse> {
        self.change("add_request", json!({ "request": request }))
            .await
    }

    async fn add_request_and_confirm(&self, request: &MultisigRequest) -> Result<TxResponse> {
        self.change("add_request_and_confirm", json!({ "request": request }))
            .await
    }

    async fn delete_request(&self, request_id: u64) -> Result<TxResponse> {
        self.change("delete_request", json!({ "request_id": request_id }))
            .await
    }

    async fn confirm(&self, request_id: u64) -> Result<TxResponse> {
        self.change("confirm", json!({ "request_id": request_id }))
            .await
    }
}

/// Delete every request still pending on the contract.
///
/// Cleanup is advisory: a failure to list or to delete one id is logged and
/// skipped. Returns the ids that were deleted. Another client can still add a
/// request between this cleanup and the caller's own submission.
pub async fn delete_unconfirmed_requests(contract: &dyn ContractGateway) -> Vec<u64> {
    let request_ids = match contract.list_request_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "failed to list pending multisig requests");
            return Vec::new();
        }
    };

    let mut deleted = Vec::with_capacity(request_ids.len());
    for request_id in request_ids {
        match contract.delete_request(request_id).await {
            Ok(_) => deleted.push(request_id),
            Err(e) => warn!(request_id, error = %e, "failed to delete stale request"),
        }
    }

    if !deleted.is_empty() {
        info!(?deleted, "deleted unconfirmed requests");
    }
    deleted
}
