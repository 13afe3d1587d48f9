//! Error handling types and utilities for the twofa request coordinator.
//!
//! Every crate in the workspace reports failures through [`Error`]. Each
//! variant carries a stable dotted code (see [`codes`]) so a UI can localize
//! the message without matching on display strings.

use thiserror::Error;

/// Core error type for twofa operations
#[derive(Error, Debug)]
pub enum Error {
    /// The user declined or abandoned the second-factor prompt
    #[error("request was cancelled")]
    UserCancelled,

    /// A confirmation prompt is already waiting for the user
    #[error("a confirmation is already pending")]
    ConfirmationInFlight,

    /// The account has no registered two-factor method
    #[error("no two-factor method registered for {0}")]
    NoTwoFactorMethod(String),

    /// Malformed account id
    #[error("invalid account id:: {0}")]
    InvalidAccountId(String),

    /// Malformed public key
    #[error("invalid public key:: {0}")]
    InvalidPublicKey(String),

    /// Action kind that cannot be expressed as a multisig request
    #[error("unsupported action:: {0}")]
    UnsupportedAction(String),

    /// Network-level failure reaching a remote service
    #[error("transport error:: {0}")]
    Transport(String),

    /// Verification service answered with a non-success status
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },

    /// JSON-RPC error returned by a chain node
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response did not have the expected shape
    #[error("invalid response:: {0}")]
    InvalidResponse(String),

    /// Contract call failed
    #[error("contract error:: {0}")]
    Contract(String),

    /// Pending-request store failure
    #[error("storage error:: {0}")]
    Storage(String),

    /// JSON encoding or decoding failure
    #[error("serialization error:: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded or is invalid
    #[error("config error:: {0}")]
    Config(String),
}

/// Result type alias for twofa operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes
pub mod codes {
    pub const USER_CANCELLED: &str = "errors.twoFactor.userCancelled";
    pub const CONFIRMATION_IN_FLIGHT: &str = "errors.twoFactor.confirmationInFlight";
    pub const NO_TWO_FACTOR_METHOD: &str = "errors.twoFactor.noMethod";
    pub const INVALID_ACCOUNT_ID: &str = "errors.account.invalidId";
    pub const INVALID_PUBLIC_KEY: &str = "errors.account.invalidPublicKey";
    pub const UNSUPPORTED_ACTION: &str = "errors.request.unsupportedAction";
    pub const TRANSPORT: &str = "errors.network.transport";
    pub const SERVICE: &str = "errors.network.service";
    pub const RPC: &str = "errors.network.rpc";
    pub const INVALID_RESPONSE: &str = "errors.network.invalidResponse";
    pub const CONTRACT: &str = "errors.contract.call";
    pub const STORAGE: &str = "errors.storage";
    pub const SERIALIZATION: &str = "errors.serialization";
    pub const CONFIG: &str = "errors.config";
}

impl Error {
    /// Stable code identifying the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Error::UserCancelled => codes::USER_CANCELLED,
            Error::ConfirmationInFlight => codes::CONFIRMATION_IN_FLIGHT,
            Error::NoTwoFactorMethod(_) => codes::NO_TWO_FACTOR_METHOD,
            Error::InvalidAccountId(_) => codes::INVALID_ACCOUNT_ID,
            Error::InvalidPublicKey(_) => codes::INVALID_PUBLIC_KEY,
            Error::UnsupportedAction(_) => codes::UNSUPPORTED_ACTION,
            Error::Transport(_) => codes::TRANSPORT,
            Error::Service { .. } => codes::SERVICE,
            Error::Rpc { .. } => codes::RPC,
            Error::InvalidResponse(_) => codes::INVALID_RESPONSE,
            Error::Contract(_) => codes::CONTRACT,
            Error::Storage(_) => codes::STORAGE,
            Error::Serialization(_) => codes::SERIALIZATION,
            Error::Config(_) => codes::CONFIG,
        }
    }

    /// True when the user explicitly cancelled verification
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, Error::UserCancelled)
    }
}
