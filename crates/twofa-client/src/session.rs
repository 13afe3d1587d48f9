//! Verification handshake
//!
//! [`TwoFactorSession`] ties the verification backend, the pending-request
//! slot and the confirmation channel together. It needs no signing
//! capability, so the command-line client drives it directly.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use twofa_errors::{Error, Result};
use twofa_store::PendingRequests;
use twofa_types::{
    select_two_factor_method, AccountId, PendingRequestRecord, TwoFactorMethod, TxResponse,
};

use crate::confirmation::ConfirmationChannel;
use crate::verification::VerificationService;

/// Handshake state shared by every operation of one account
pub struct TwoFactorSession {
    account_id: AccountId,
    effective_account_id: AccountId,
    has_2fa: bool,
    service: Arc<dyn VerificationService>,
    requests: PendingRequests,
    channel: Arc<ConfirmationChannel>,
}

impl TwoFactorSession {
    pub fn new(
        account_id: AccountId,
        service: Arc<dyn VerificationService>,
        requests: PendingRequests,
        channel: Arc<ConfirmationChannel>,
    ) -> Self {
        Self {
            effective_account_id: account_id.clone(),
            account_id,
            has_2fa: false,
            service,
            requests,
            channel,
        }
    }

    /// Route verification of requests to a recovery account
    pub fn with_recovery_account(mut self, account_id: AccountId) -> Self {
        self.effective_account_id = account_id;
        self
    }

    /// Mark whether the account already has a two-factor method enrolled
    pub fn with_two_factor(mut self, has_2fa: bool) -> Self {
        self.has_2fa = has_2fa;
        self
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn effective_account_id(&self) -> &AccountId {
        &self.effective_account_id
    }

    pub fn has_2fa(&self) -> bool {
        self.has_2fa
    }

    pub fn service(&self) -> &Arc<dyn VerificationService> {
        &self.service
    }

    pub fn requests(&self) -> &PendingRequests {
        &self.requests
    }

    pub fn channel(&self) -> &Arc<ConfirmationChannel> {
        &self.channel
    }

    /// The enrolled two-factor method, `None` when the account has none
    pub async fn get_two_factor_method(&self) -> Result<Option<TwoFactorMethod>> {
        if !self.has_2fa {
            return Ok(None);
        }
        let methods = self.service.recovery_methods(&self.account_id).await?;
        Ok(select_two_factor_method(&methods))
    }

    /// Start enrolling `method`, forgetting any tracked request
    pub async fn init_two_factor(
        &self,
        account_id: &AccountId,
        method: Option<&TwoFactorMethod>,
    ) -> Result<Value> {
        self.requests.clear().await?;
        info!(account = %account_id, kind = ?method.map(|m| &m.kind), "initializing two-factor");
        self.service.init(account_id, method).await
    }

    /// Forget any tracked request and ask the backend for a fresh code
    pub async fn re_init_two_factor(
        &self,
        account_id: &AccountId,
        method: Option<TwoFactorMethod>,
    ) -> Result<Option<TxResponse>> {
        self.requests.clear().await?;
        self.send_request(Some(account_id), method, None).await
    }

    /// Ask for a new code for the tracked request.
    ///
    /// When a confirmation is already awaited the code is only re-sent and
    /// the existing waiter receives the result; otherwise this waits for the
    /// confirmation itself, which is how a restarted client resumes.
    pub async fn resend(
        &self,
        account_id: Option<&AccountId>,
        method: Option<TwoFactorMethod>,
    ) -> Result<Option<TxResponse>> {
        let request_id = self.requests.request_id().await?;
        if request_id.is_some() && self.channel.is_pending() {
            let account_id = account_id.unwrap_or(&self.account_id);
            self.notify(account_id, method, request_id).await?;
            return Ok(None);
        }
        self.send_request(account_id, method, request_id).await
    }

    /// Persist the request identity, notify the backend and, for a real
    /// request, wait for the user's confirmation.
    ///
    /// `None` request id only re-notifies and returns `Ok(None)`.
    pub async fn send_request(
        &self,
        account_id: Option<&AccountId>,
        method: Option<TwoFactorMethod>,
        request_id: Option<u64>,
    ) -> Result<Option<TxResponse>> {
        let account_id = account_id.unwrap_or(&self.account_id);
        match request_id {
            None => {
                self.notify(account_id, method, None).await?;
                Ok(None)
            }
            Some(request_id) => self
                .request_confirmation(account_id, method, request_id)
                .await
                .map(Some),
        }
    }

    async fn request_confirmation(
        &self,
        account_id: &AccountId,
        method: Option<TwoFactorMethod>,
        request_id: u64,
    ) -> Result<TxResponse> {
        if self.channel.is_pending() {
            return Err(Error::ConfirmationInFlight);
        }
        self.notify(account_id, method, Some(request_id)).await?;

        let confirmation = self.channel.open()?.await;
        if !confirmation.verified {
            info!(account = %account_id, request_id, "verification cancelled");
            return Err(Error::UserCancelled);
        }
        Ok(confirmation.tx_response.unwrap_or_default())
    }

    async fn notify(
        &self,
        account_id: &AccountId,
        method: Option<TwoFactorMethod>,
        request_id: Option<u64>,
    ) -> Result<()> {
        self.requests
            .set(&PendingRequestRecord::new(account_id.clone(), request_id))
            .await?;

        let method = match method {
            Some(method) => Some(method),
            None => self.get_two_factor_method().await?,
        };
        info!(account = %account_id, ?request_id, "sending security code");
        self.service
            .send(account_id, method.as_ref(), request_id)
            .await?;
        Ok(())
    }

    /// Submit a security code for the tracked request
    pub async fn verify_two_factor(
        &self,
        account_id: Option<&AccountId>,
        security_code: &str,
    ) -> Result<TxResponse> {
        let account_id = account_id.unwrap_or(&self.effective_account_id);
        let request_id = self.requests.request_id().await?;
        debug!(account = %account_id, ?request_id, "verifying security code");
        self.service
            .verify(account_id, security_code, request_id)
            .await
    }

    /// Verify `security_code` and release the waiting request on success.
    ///
    /// A rejected code leaves the confirmation open for another attempt.
    pub async fn confirm_with_code(&self, security_code: &str) -> Result<TxResponse> {
        let response = self.verify_two_factor(None, security_code).await?;
        if !self.channel.resolve(true, Some(response.clone())) {
            debug!("security code verified with no confirmation waiting");
        }
        Ok(response)
    }

    /// Reject the waiting request
    pub fn cancel_confirmation(&self) -> bool {
        self.channel.cancel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{account_id, spawn_auto_confirm, FakeVerificationService, ServiceCall};
    use serde_json::json;
    use twofa_store::MemoryStore;

    fn session(service: &Arc<FakeVerificationService>) -> TwoFactorSession {
        TwoFactorSession::new(
            account_id("alice.near"),
            service.clone(),
            PendingRequests::new(Arc::new(MemoryStore::new())),
            Arc::new(ConfirmationChannel::new()),
        )
        .with_two_factor(true)
    }

    #[tokio::test]
    async fn test_init_send_verify_round_trip() {
        let service = Arc::new(FakeVerificationService::new());
        let session = Arc::new(session(&service));
        session
            .requests()
            .set(&PendingRequestRecord::new(account_id("alice.near"), Some(2)))
            .await
            .unwrap();

        let method = TwoFactorMethod::new("2fa-email", Some("a@b.c".to_string()));
        session
            .init_two_factor(&account_id("alice.near"), Some(&method))
            .await
            .unwrap();
        assert!(session.requests().get().await.unwrap().is_empty());

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .send_request(Some(&account_id("alice.near")), None, Some(7))
                    .await
            })
        };
        let mut prompt = session.channel().subscribe();
        prompt.wait_for(|open| *open).await.unwrap();

        assert_eq!(
            session.requests().get().await.unwrap(),
            PendingRequestRecord::new(account_id("alice.near"), Some(7))
        );

        let response = session.confirm_with_code("123456").await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), Some(response));

        let calls = service.calls();
        assert!(calls.contains(&ServiceCall::Verify {
            account_id: account_id("alice.near"),
            security_code: "123456".to_string(),
            request_id: Some(7),
        }));
    }

    #[tokio::test]
    async fn test_sentinel_request_returns_without_waiting() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service);

        let result = session.send_request(None, None, None).await.unwrap();
        assert_eq!(result, None);
        assert!(!session.channel().is_pending());

        let record = session.requests().get().await.unwrap();
        assert_eq!(record.wire_request_id(), -1);
        assert_eq!(record.account_id, Some(account_id("alice.near")));
        assert_eq!(
            service.calls(),
            vec![
                ServiceCall::RecoveryMethods,
                ServiceCall::Send {
                    account_id: account_id("alice.near"),
                    method: service.method(),
                    request_id: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_confirmation_fails() {
        let service = Arc::new(FakeVerificationService::new());
        let session = Arc::new(session(&service));

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.send_request(None, None, Some(0)).await })
        };
        session
            .channel()
            .subscribe()
            .wait_for(|open| *open)
            .await
            .unwrap();
        assert!(session.cancel_confirmation());

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_user_cancelled());
        assert_eq!(session.requests().request_id().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_rejected_code_keeps_confirmation_open() {
        let service = Arc::new(FakeVerificationService::new());
        let session = Arc::new(session(&service));

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.send_request(None, None, Some(3)).await })
        };
        session
            .channel()
            .subscribe()
            .wait_for(|open| *open)
            .await
            .unwrap();

        service.reject_codes(true);
        assert!(session.confirm_with_code("000000").await.is_err());
        assert!(session.channel().is_pending());

        service.reject_codes(false);
        session.confirm_with_code("111111").await.unwrap();
        assert!(waiter.await.unwrap().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resend_reuses_persisted_request_id() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service);
        session
            .requests()
            .set(&PendingRequestRecord::new(account_id("alice.near"), Some(4)))
            .await
            .unwrap();
        let _pending = session.channel().open().unwrap();

        assert_eq!(session.resend(None, None).await.unwrap(), None);
        assert!(service.calls().contains(&ServiceCall::Send {
            account_id: account_id("alice.near"),
            method: service.method(),
            request_id: Some(4),
        }));
        assert_eq!(session.requests().request_id().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_resend_after_restart_waits_for_confirmation() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service);
        session
            .requests()
            .set(&PendingRequestRecord::new(account_id("alice.near"), Some(4)))
            .await
            .unwrap();
        spawn_auto_confirm(session.channel().clone(), true);

        let response = session.resend(None, None).await.unwrap();
        assert_eq!(response, Some(TxResponse(json!({ "confirmed": true }))));
        assert!(service.calls().contains(&ServiceCall::Send {
            account_id: account_id("alice.near"),
            method: service.method(),
            request_id: Some(4),
        }));
        assert!(!session.channel().is_pending());
    }

    #[tokio::test]
    async fn test_confirm_without_waiter_still_verifies() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service);

        let response = session.confirm_with_code("777").await.unwrap();
        assert_eq!(response, TxResponse(json!({ "verified": "777" })));
        assert!(!session.channel().is_pending());
    }

    #[tokio::test]
    async fn test_resend_without_record_uses_sentinel() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service);

        assert_eq!(session.resend(None, None).await.unwrap(), None);
        assert!(service.calls().contains(&ServiceCall::Send {
            account_id: account_id("alice.near"),
            method: service.method(),
            request_id: None,
        }));
    }

    #[tokio::test]
    async fn test_second_confirmation_is_rejected() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service);
        let _pending = session.channel().open().unwrap();

        let err = session.send_request(None, None, Some(1)).await.unwrap_err();
        assert!(matches!(err, Error::ConfirmationInFlight));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_two_factor_method_requires_enrollment() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service).with_two_factor(false);
        assert_eq!(session.get_two_factor_method().await.unwrap(), None);
        assert!(service.calls().is_empty());

        let session = session.with_two_factor(true);
        assert_eq!(
            session.get_two_factor_method().await.unwrap(),
            service.method()
        );
    }

    #[tokio::test]
    async fn test_re_init_clears_and_renotifies() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service);
        session
            .requests()
            .set(&PendingRequestRecord::new(account_id("alice.near"), Some(9)))
            .await
            .unwrap();

        let method = TwoFactorMethod::new("2fa-phone", Some("+100".to_string()));
        session
            .re_init_two_factor(&account_id("alice.near"), Some(method.clone()))
            .await
            .unwrap();

        assert_eq!(session.requests().request_id().await.unwrap(), None);
        assert_eq!(
            service.calls(),
            vec![ServiceCall::Send {
                account_id: account_id("alice.near"),
                method: Some(method),
                request_id: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_verify_defaults_to_recovery_account() {
        let service = Arc::new(FakeVerificationService::new());
        let session = session(&service).with_recovery_account(account_id("backup.near"));

        let response = session.verify_two_factor(None, "42").await.unwrap();
        assert_eq!(response, TxResponse(json!({ "verified": "42" })));
        assert_eq!(
            service.calls(),
            vec![ServiceCall::Verify {
                account_id: account_id("backup.near"),
                security_code: "42".to_string(),
                request_id: None,
            }]
        );
    }
}
