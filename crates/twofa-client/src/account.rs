//! Account capability consumed by the request coordinator

use async_trait::async_trait;
use serde_json::Value;
use twofa_errors::Result;
use twofa_types::{AccessKeyInfo, AccountId, Action, Balance, Gas, TxResponse};

/// Signing and query capability of one chain account.
///
/// Key management and transaction transport live behind this trait; the
/// coordinator composes over it instead of extending it.
#[async_trait]
pub trait Account: Send + Sync {
    /// Id of the account transactions are signed for
    fn account_id(&self) -> &AccountId;

    /// Call a read-only contract method and return its decoded JSON result
    async fn view_function(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: Value,
    ) -> Result<Value>;

    /// Sign and submit a single contract call
    async fn function_call(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: Value,
        gas: Gas,
        deposit: Balance,
    ) -> Result<TxResponse>;

    /// Access keys currently registered on the account
    async fn access_keys(&self) -> Result<Vec<AccessKeyInfo>>;

    /// Sign and submit a transaction made of `actions`
    async fn sign_and_send_transaction(
        &self,
        receiver_id: &AccountId,
        actions: Vec<Action>,
    ) -> Result<TxResponse>;
}
