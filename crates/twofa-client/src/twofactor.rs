//! Request orchestrator
//!
//! Every protected operation becomes a multisig request: stale requests are
//! cleared, the new one is added and confirmed by the account's own key, and
//! the nonce tells whether the contract is now waiting for the second
//! confirmation. If it is, the user is asked for a security code.

use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use twofa_errors::{Error, Result};
use twofa_log::request_span;
use twofa_store::PendingRequests;
use twofa_types::{Balance, Gas, MultisigRequest, RequestOutcome};

use crate::account::Account;
use crate::confirmation::ConfirmationChannel;
use crate::contract::{delete_unconfirmed_requests, ContractGateway, MultisigContract};
use crate::session::TwoFactorSession;
use crate::verification::VerificationService;

/// Gas attached to the `new` initializer of a freshly deployed contract
pub const DEFAULT_LAK_ALLOWANCE: Gas = Gas(10_000_000_000_000);

/// Allowance of limited access keys added through requests (0.01 NEAR)
pub const DEFAULT_ACCESS_KEY_FUNDING_AMOUNT: Balance = Balance(10_000_000_000_000_000_000_000);

/// Gas attached to multisig contract change calls
pub const DEFAULT_CHANGE_GAS: Gas = Gas(30_000_000_000_000);

/// Tunables of the request flow
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigSettings {
    pub has_2fa: bool,
    pub lak_allowance: Gas,
    pub access_key_funding_amount: Balance,
    pub change_gas: Gas,
}

impl Default for MultisigSettings {
    fn default() -> Self {
        Self {
            has_2fa: false,
            lak_allowance: DEFAULT_LAK_ALLOWANCE,
            access_key_funding_amount: DEFAULT_ACCESS_KEY_FUNDING_AMOUNT,
            change_gas: DEFAULT_CHANGE_GAS,
        }
    }
}

/// Two-factor protected account
pub struct TwoFactor {
    account: Arc<dyn Account>,
    recovery_account: Option<Arc<dyn Account>>,
    session: TwoFactorSession,
    settings: MultisigSettings,
}

impl TwoFactor {
    pub fn new(
        account: Arc<dyn Account>,
        service: Arc<dyn VerificationService>,
        requests: PendingRequests,
        channel: Arc<ConfirmationChannel>,
        settings: MultisigSettings,
    ) -> Self {
        let session =
            TwoFactorSession::new(account.account_id().clone(), service, requests, channel)
                .with_two_factor(settings.has_2fa);
        Self {
            account,
            recovery_account: None,
            session,
            settings,
        }
    }

    /// Execute operations against `recovery` instead of the primary account
    pub fn with_recovery_account(mut self, recovery: Arc<dyn Account>) -> Self {
        self.session = self
            .session
            .with_recovery_account(recovery.account_id().clone());
        self.recovery_account = Some(recovery);
        self
    }

    /// Account operations execute against
    pub fn account(&self) -> &Arc<dyn Account> {
        self.recovery_account.as_ref().unwrap_or(&self.account)
    }

    pub fn primary_account(&self) -> &Arc<dyn Account> {
        &self.account
    }

    pub fn session(&self) -> &TwoFactorSession {
        &self.session
    }

    pub fn settings(&self) -> &MultisigSettings {
        &self.settings
    }

    /// Gateway to the multisig contract of the effective account
    pub fn contract(&self) -> MultisigContract {
        MultisigContract::new(self.account().clone(), self.settings.change_gas)
    }

    /// Submit `request` and drive it through verification.
    ///
    /// Returns [`RequestOutcome::NotCreated`] when the nonce did not move:
    /// the contract accepted the call without leaving a request to confirm.
    pub async fn request(&self, request: MultisigRequest) -> Result<RequestOutcome> {
        let span = request_span(
            self.account().account_id().as_str(),
            request.receiver_id.as_str(),
        );
        self.submit(request).instrument(span).await
    }

    async fn submit(&self, request: MultisigRequest) -> Result<RequestOutcome> {
        // Reconciliation would delete the request the open confirmation waits on
        if self.session.channel().is_pending() {
            return Err(Error::ConfirmationInFlight);
        }

        let contract = self.contract();
        let account_id = contract.contract_id().clone();

        delete_unconfirmed_requests(&contract).await;

        let nonce_before = contract.get_request_nonce().await?;
        debug!(nonce = nonce_before, "request nonce before submission");

        info!(actions = request.actions.len(), "submitting multisig request");
        contract.add_request_and_confirm(&request).await?;

        let nonce_after = contract.get_request_nonce().await?;
        debug!(nonce = nonce_after, "request nonce after submission");

        if nonce_after <= nonce_before {
            warn!(nonce = nonce_after, "request nonce did not advance, nothing to verify");
            return Ok(RequestOutcome::NotCreated { nonce: nonce_after });
        }

        let response = self
            .session
            .send_request(Some(&account_id), None, Some(nonce_before))
            .await?
            .unwrap_or_default();
        Ok(RequestOutcome::Confirmed { response })
    }
}
