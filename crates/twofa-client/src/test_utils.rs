//! In-memory doubles for the account and the verification backend

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use twofa_errors::{Error, Result};
use twofa_store::{MemoryStore, PendingRequests};
use twofa_types::{
    select_two_factor_method, AccessKey, AccessKeyInfo, AccountId, Action, Balance, Gas,
    PublicKey, RecoveryMethod, TwoFactorMethod, TxResponse,
};

use crate::account::Account;
use crate::confirmation::ConfirmationChannel;
use crate::twofactor::{MultisigSettings, TwoFactor};
use crate::verification::VerificationService;

pub fn account_id(id: &str) -> AccountId {
    id.parse().unwrap()
}

pub fn public_key(key: &str) -> PublicKey {
    key.parse().unwrap()
}

pub fn full_access_key(key: &str) -> AccessKeyInfo {
    AccessKeyInfo {
        public_key: public_key(key),
        access_key: AccessKey::full_access(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCallRecord {
    pub method_name: String,
    pub args: Value,
    pub gas: Gas,
    pub deposit: Balance,
}

#[derive(Default)]
struct ContractState {
    nonce: u64,
    pending: BTreeSet<u64>,
    auto_execute: bool,
    failing_deletes: HashSet<u64>,
    list_fails: bool,
    view_overrides: HashMap<String, Value>,
    function_calls: Vec<FunctionCallRecord>,
    access_keys: Vec<AccessKeyInfo>,
    transactions: Vec<(AccountId, Vec<Action>)>,
}

/// Account whose multisig contract is simulated in memory
pub struct FakeMultisigAccount {
    account_id: AccountId,
    state: Mutex<ContractState>,
}

impl FakeMultisigAccount {
    pub fn new(id: &str) -> Self {
        Self {
            account_id: account_id(id),
            state: Mutex::new(ContractState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ContractState> {
        self.state.lock().unwrap()
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.state().nonce = nonce;
    }

    /// Leave `ids` pending and move the nonce past them
    pub fn seed_pending(&self, ids: &[u64]) {
        let mut state = self.state();
        state.pending.extend(ids.iter().copied());
        if let Some(max) = ids.iter().max() {
            state.nonce = state.nonce.max(max + 1);
        }
    }

    /// Execute requests immediately instead of leaving them pending
    pub fn auto_execute(&self, enabled: bool) {
        self.state().auto_execute = enabled;
    }

    pub fn fail_delete(&self, request_id: u64) {
        self.state().failing_deletes.insert(request_id);
    }

    pub fn fail_list(&self) {
        self.state().list_fails = true;
    }

    pub fn override_view(&self, method_name: &str, value: Value) {
        self.state()
            .view_overrides
            .insert(method_name.to_string(), value);
    }

    pub fn set_access_keys(&self, keys: Vec<AccessKeyInfo>) {
        self.state().access_keys = keys;
    }

    pub fn function_calls(&self) -> Vec<FunctionCallRecord> {
        self.state().function_calls.clone()
    }

    pub fn transactions(&self) -> Vec<(AccountId, Vec<Action>)> {
        self.state().transactions.clone()
    }
}

fn request_id_arg(args: &Value) -> Result<u64> {
    args["request_id"]
        .as_u64()
        .ok_or_else(|| Error::Contract("missing request_id".to_string()))
}

#[async_trait]
impl Account for FakeMultisigAccount {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    async fn view_function(
        &self,
        _contract_id: &AccountId,
        method_name: &str,
        _args: Value,
    ) -> Result<Value> {
        let state = self.state();
        if let Some(value) = state.view_overrides.get(method_name) {
            return Ok(value.clone());
        }
        match method_name {
            "get_request_nonce" => Ok(json!(state.nonce)),
            "list_request_ids" if state.list_fails => Err(Error::Rpc {
                code: -32000,
                message: "list_request_ids unavailable".to_string(),
            }),
            "list_request_ids" => Ok(json!(state.pending)),
            other => Err(Error::Contract(format!("unknown view method {other}"))),
        }
    }

    async fn function_call(
        &self,
        _contract_id: &AccountId,
        method_name: &str,
        args: Value,
        gas: Gas,
        deposit: Balance,
    ) -> Result<TxResponse> {
        let mut state = self.state();
        state.function_calls.push(FunctionCallRecord {
            method_name: method_name.to_string(),
            args: args.clone(),
            gas,
            deposit,
        });

        match method_name {
            "add_request" | "add_request_and_confirm" => {
                if !state.auto_execute {
                    let id = state.nonce;
                    state.pending.insert(id);
                    state.nonce += 1;
                }
            }
            "delete_request" => {
                let id = request_id_arg(&args)?;
                if state.failing_deletes.contains(&id) {
                    return Err(Error::Contract(format!("cannot delete request {id}")));
                }
                state.pending.remove(&id);
            }
            "confirm" => {
                let id = request_id_arg(&args)?;
                state.pending.remove(&id);
            }
            other => return Err(Error::Contract(format!("unknown method {other}"))),
        }
        Ok(TxResponse(json!({ "method": method_name })))
    }

    async fn access_keys(&self) -> Result<Vec<AccessKeyInfo>> {
        Ok(self.state().access_keys.clone())
    }

    async fn sign_and_send_transaction(
        &self,
        receiver_id: &AccountId,
        actions: Vec<Action>,
    ) -> Result<TxResponse> {
        self.state()
            .transactions
            .push((receiver_id.clone(), actions));
        Ok(TxResponse(json!({ "status": "SuccessValue" })))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServiceCall {
    Init {
        account_id: AccountId,
        method: Option<TwoFactorMethod>,
    },
    Send {
        account_id: AccountId,
        method: Option<TwoFactorMethod>,
        request_id: Option<u64>,
    },
    Verify {
        account_id: AccountId,
        security_code: String,
        request_id: Option<u64>,
    },
    GetAccessKey {
        account_id: AccountId,
    },
    RecoveryMethods,
}

/// Verification backend that records every call
pub struct FakeVerificationService {
    calls: Mutex<Vec<ServiceCall>>,
    recovery_methods: Mutex<Vec<RecoveryMethod>>,
    reject_codes: Mutex<bool>,
    confirm_key: PublicKey,
}

impl FakeVerificationService {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            recovery_methods: Mutex::new(vec![
                RecoveryMethod {
                    kind: "phrase".to_string(),
                    detail: None,
                    created_at: None,
                    public_key: Some(public_key("Phrase1")),
                },
                RecoveryMethod {
                    kind: "2fa-email".to_string(),
                    detail: Some("alice@example.com".to_string()),
                    created_at: Some("2020-01-01T00:00:00Z".to_string()),
                    public_key: None,
                },
            ]),
            reject_codes: Mutex::new(false),
            confirm_key: public_key("Confirm1"),
        }
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ServiceCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Two-factor method the recovery methods resolve to
    pub fn method(&self) -> Option<TwoFactorMethod> {
        select_two_factor_method(&self.recovery_methods.lock().unwrap())
    }

    pub fn set_recovery_methods(&self, methods: Vec<RecoveryMethod>) {
        *self.recovery_methods.lock().unwrap() = methods;
    }

    pub fn reject_codes(&self, reject: bool) {
        *self.reject_codes.lock().unwrap() = reject;
    }

    pub fn confirm_key(&self) -> PublicKey {
        self.confirm_key.clone()
    }
}

#[async_trait]
impl VerificationService for FakeVerificationService {
    async fn init(
        &self,
        account_id: &AccountId,
        method: Option<&TwoFactorMethod>,
    ) -> Result<Value> {
        self.record(ServiceCall::Init {
            account_id: account_id.clone(),
            method: method.cloned(),
        });
        Ok(json!({ "ok": true }))
    }

    async fn send(
        &self,
        account_id: &AccountId,
        method: Option<&TwoFactorMethod>,
        request_id: Option<u64>,
    ) -> Result<Value> {
        self.record(ServiceCall::Send {
            account_id: account_id.clone(),
            method: method.cloned(),
            request_id,
        });
        Ok(Value::Null)
    }

    async fn verify(
        &self,
        account_id: &AccountId,
        security_code: &str,
        request_id: Option<u64>,
    ) -> Result<TxResponse> {
        self.record(ServiceCall::Verify {
            account_id: account_id.clone(),
            security_code: security_code.to_string(),
            request_id,
        });
        if *self.reject_codes.lock().unwrap() {
            return Err(Error::Service {
                status: 401,
                message: "invalid security code".to_string(),
            });
        }
        Ok(TxResponse(json!({ "verified": security_code })))
    }

    async fn get_access_key(&self, account_id: &AccountId) -> Result<PublicKey> {
        self.record(ServiceCall::GetAccessKey {
            account_id: account_id.clone(),
        });
        Ok(self.confirm_key.clone())
    }

    async fn recovery_methods(&self, _account_id: &AccountId) -> Result<Vec<RecoveryMethod>> {
        self.record(ServiceCall::RecoveryMethods);
        Ok(self.recovery_methods.lock().unwrap().clone())
    }
}

/// Orchestrator over fresh doubles, with two-factor enrolled
pub fn two_factor(
    id: &str,
) -> (
    TwoFactor,
    Arc<FakeMultisigAccount>,
    Arc<FakeVerificationService>,
) {
    let account = Arc::new(FakeMultisigAccount::new(id));
    let service = Arc::new(FakeVerificationService::new());
    let settings = MultisigSettings {
        has_2fa: true,
        ..MultisigSettings::default()
    };
    let two_factor = TwoFactor::new(
        account.clone(),
        service.clone(),
        PendingRequests::new(Arc::new(MemoryStore::new())),
        Arc::new(ConfirmationChannel::new()),
        settings,
    );
    (two_factor, account, service)
}

/// Answer every confirmation prompt with `verified`
pub fn spawn_auto_confirm(channel: Arc<ConfirmationChannel>, verified: bool) -> JoinHandle<()> {
    let mut prompt = channel.subscribe();
    tokio::spawn(async move {
        while prompt.wait_for(|open| *open).await.is_ok() {
            let response = verified.then(|| TxResponse(json!({ "confirmed": true })));
            channel.resolve(verified, response);
        }
    })
}
