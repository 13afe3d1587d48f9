//! Migration of a plain account to a multisig-protected one

use serde::Serialize;
use serde_json::json;
use tracing::info;
use twofa_errors::Result;
use twofa_types::{
    AccessKeyInfo, AccessKeyPermission, AccountId, Action, Balance, Gas, PublicKey,
    RecoveryMethod, TxResponse,
};

use crate::twofactor::TwoFactor;
use crate::verification::VerificationService;

/// Confirmations the deployed contract requires per request
pub const NUM_CONFIRMATIONS: u32 = 2;

/// Full access keys to turn into limited access keys.
///
/// Keys of non-phrase recovery methods still on the account come first,
/// followed by full access keys no recovery method names. Seed phrase keys
/// keep full access.
pub fn keys_to_convert(
    access_keys: &[AccessKeyInfo],
    recovery_methods: &[RecoveryMethod],
) -> Vec<PublicKey> {
    let on_account = |key: &PublicKey| access_keys.iter().any(|k| &k.public_key == key);
    let named_by_recovery =
        |key: &PublicKey| recovery_methods.iter().any(|m| m.public_key.as_ref() == Some(key));

    let recovery_keys = recovery_methods
        .iter()
        .filter(|m| !m.is_phrase())
        .filter_map(|m| m.public_key.as_ref())
        .filter(|key| on_account(*key));

    let unnamed_full_access = access_keys
        .iter()
        .filter(|k| k.access_key.permission.is_full_access())
        .map(|k| &k.public_key)
        .filter(|key| !named_by_recovery(*key));

    let mut keys: Vec<PublicKey> = Vec::new();
    for key in recovery_keys.chain(unnamed_full_access) {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }
    keys
}

/// Actions of the migration transaction, in submission order: delete then
/// re-add every converted key as a limited key, add the confirm-only key,
/// deploy the contract and initialize it.
pub fn multisig_migration_actions(
    account_id: &AccountId,
    fak2lak: &[PublicKey],
    confirm_only_key: &PublicKey,
    code: &[u8],
    init_gas: Gas,
) -> Result<Vec<Action>> {
    let mut actions = Vec::with_capacity(fak2lak.len() * 2 + 3);
    actions.extend(fak2lak.iter().cloned().map(Action::delete_key));
    actions.extend(fak2lak.iter().cloned().map(|key| {
        Action::add_key(
            key,
            AccessKeyPermission::limited_access(account_id.clone(), None),
        )
    }));
    actions.push(Action::add_key(
        confirm_only_key.clone(),
        AccessKeyPermission::confirm_only(account_id.clone()),
    ));
    actions.push(Action::deploy_contract(code.to_vec()));

    let init_args = serde_json::to_vec(&json!({ "num_confirmations": NUM_CONFIRMATIONS }))?;
    actions.push(Action::function_call("new", init_args, init_gas, Balance(0)));
    Ok(actions)
}

/// Unsigned migration transaction of one account
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub account_id: AccountId,
    pub converted_keys: Vec<PublicKey>,
    pub confirm_only_key: PublicKey,
    pub actions: Vec<Action>,
}

/// Ask the verification backend for recovery methods and the confirm-only
/// key, then build the migration of `account_id` given its `access_keys`.
pub async fn plan_migration(
    service: &dyn VerificationService,
    account_id: &AccountId,
    access_keys: &[AccessKeyInfo],
    code: &[u8],
    init_gas: Gas,
) -> Result<MigrationPlan> {
    let recovery_methods = service.recovery_methods(account_id).await?;
    let converted_keys = keys_to_convert(access_keys, &recovery_methods);
    let confirm_only_key = service.get_access_key(account_id).await?;
    let actions = multisig_migration_actions(
        account_id,
        &converted_keys,
        &confirm_only_key,
        code,
        init_gas,
    )?;

    Ok(MigrationPlan {
        account_id: account_id.clone(),
        converted_keys,
        confirm_only_key,
        actions,
    })
}

impl TwoFactor {
    /// Rotate the primary account's keys and deploy the multisig contract
    /// in one directly signed transaction.
    pub async fn deploy_multisig(&self, code: &[u8]) -> Result<TxResponse> {
        let account = self.primary_account();
        let access_keys = account.access_keys().await?;
        let plan = plan_migration(
            self.session().service().as_ref(),
            account.account_id(),
            &access_keys,
            code,
            self.settings().lak_allowance,
        )
        .await?;

        info!(
            account = %plan.account_id,
            converted_keys = plan.converted_keys.len(),
            confirm_only_key = %plan.confirm_only_key,
            code_size = code.len(),
            "deploying multisig contract"
        );
        account
            .sign_and_send_transaction(&plan.account_id, plan.actions)
            .await
    }
}
