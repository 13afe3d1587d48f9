//! High-level account operations expressed as multisig requests

use tracing::info;
use twofa_errors::Result;
use twofa_types::{
    AccountId, Balance, MultisigKeyPermission, MultisigRequest, PublicKey, RequestAction,
    RequestOutcome, Transaction, METHOD_NAMES_LAK,
};

use crate::twofactor::TwoFactor;

impl TwoFactor {
    fn own_request(&self, actions: Vec<RequestAction>) -> MultisigRequest {
        MultisigRequest::new(self.account().account_id().clone(), actions)
    }

    /// Permission of limited keys added on the effective account
    pub fn limited_key_permission(&self) -> MultisigKeyPermission {
        MultisigKeyPermission {
            receiver_id: self.account().account_id().clone(),
            allowance: Some(self.settings().access_key_funding_amount),
            method_names: METHOD_NAMES_LAK.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub async fn send_money(
        &self,
        receiver_id: &AccountId,
        amount: Balance,
    ) -> Result<RequestOutcome> {
        let request =
            MultisigRequest::new(receiver_id.clone(), vec![RequestAction::transfer(amount)]);
        self.request(request).await
    }

    /// Add `public_key`, as a limited key when `limited` is set.
    ///
    /// A key already on the account is reported as
    /// [`RequestOutcome::AlreadyPresent`] without submitting anything.
    pub async fn add_key(&self, public_key: &PublicKey, limited: bool) -> Result<RequestOutcome> {
        let access_keys = self.account().access_keys().await?;
        if access_keys.iter().any(|k| &k.public_key == public_key) {
            info!(%public_key, "key already registered, skipping request");
            return Ok(RequestOutcome::AlreadyPresent);
        }

        let permission = limited.then(|| self.limited_key_permission());
        self.request(self.own_request(vec![RequestAction::add_key(public_key, permission)]))
            .await
    }

    pub async fn delete_key(&self, public_key: &PublicKey) -> Result<RequestOutcome> {
        self.request(self.own_request(vec![RequestAction::delete_key(public_key)]))
            .await
    }

    /// Swap `remove_key` for the limited key `add_key` in one request
    pub async fn rotate_keys(
        &self,
        add_key: &PublicKey,
        remove_key: &PublicKey,
    ) -> Result<RequestOutcome> {
        let actions = vec![
            RequestAction::add_key(add_key, Some(self.limited_key_permission())),
            RequestAction::delete_key(remove_key),
        ];
        self.request(self.own_request(actions)).await
    }

    /// Submit each transaction as its own request, in order.
    ///
    /// Stops at the first failure; requests of earlier transactions stay
    /// submitted.
    pub async fn sign_and_send_transactions(
        &self,
        transactions: &[Transaction],
    ) -> Result<Vec<RequestOutcome>> {
        let mut outcomes = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let request = MultisigRequest::from_transaction(transaction)?;
            outcomes.push(self.request(request).await?);
        }
        Ok(outcomes)
    }
}
