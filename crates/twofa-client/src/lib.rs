//! Two-factor request coordinator for multisig-protected accounts.
//!
//! Sensitive account operations are submitted as requests to the account's
//! multisig contract and only execute once the user proves a second factor
//! to the verification backend, which then confirms the request with its
//! confirm-only key. [`TwoFactor`] drives that flow over an [`Account`], a
//! [`VerificationService`] and a pending-request store; the code-entry UI
//! talks to it through the [`ConfirmationChannel`].

pub mod account;
pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod confirmation;
pub mod contract;
pub mod rpc;
pub mod session;
pub mod twofactor;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_utils;

pub use account::Account;
pub use bootstrap::{
    keys_to_convert, multisig_migration_actions, plan_migration, MigrationPlan, NUM_CONFIRMATIONS,
};
pub use config::{ClientConfig, ConfigError, LAK_ALLOWANCE_ENV};
pub use confirmation::{Confirmation, ConfirmationChannel, PendingConfirmation};
pub use contract::{delete_unconfirmed_requests, ContractGateway, MultisigContract};
pub use rpc::RpcClient;
pub use session::TwoFactorSession;
pub use twofactor::{MultisigSettings, TwoFactor};
pub use verification::{
    sign_block_number, HttpVerificationClient, KeyPairSigner, RequestSignature, RequestSigner,
    VerificationService,
};

pub(crate) fn transport_error(err: reqwest::Error) -> twofa_errors::Error {
    twofa_errors::Error::Transport(err.to_string())
}
