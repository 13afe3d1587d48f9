//! Core types for multisig two-factor requests.
//!
//! Covers account and key identities, transaction actions, the request
//! encoding understood by the multisig contract, and the record of the
//! request currently awaiting verification.

pub mod account;
pub mod action;
pub mod keys;
pub mod recovery;
pub mod request;

pub use account::AccountId;
pub use action::{
    Action, Balance, Gas, MultisigKeyPermission, MultisigRequest, RequestAction, Transaction,
};
pub use keys::{
    AccessKey, AccessKeyInfo, AccessKeyPermission, FunctionCallPermission, PublicKey,
    METHOD_NAMES_CONFIRM, METHOD_NAMES_LAK,
};
pub use recovery::{select_two_factor_method, RecoveryMethod, TwoFactorMethod};
pub use request::{
    wire_request_id, PendingRequestRecord, RequestOutcome, TxResponse, NO_REQUEST_ID,
};
