//! Recovery and two-factor methods registered with the verification backend

use crate::PublicKey;
use serde::{Deserialize, Serialize};

/// Marker contained in the kind of every two-factor method (`2fa-email`, ...)
pub const TWO_FACTOR_KIND_MARKER: &str = "2fa-";

/// Kind of the pure seed-phrase recovery method
pub const PHRASE_KIND: &str = "phrase";

/// A recovery method as listed by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryMethod {
    pub kind: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub public_key: Option<PublicKey>,
}

impl RecoveryMethod {
    pub fn is_two_factor(&self) -> bool {
        self.kind.contains(TWO_FACTOR_KIND_MARKER)
    }

    pub fn is_phrase(&self) -> bool {
        self.kind == PHRASE_KIND
    }

    /// Two-factor view of this method, if it is one
    pub fn two_factor_method(&self) -> Option<TwoFactorMethod> {
        self.is_two_factor().then(|| TwoFactorMethod {
            kind: self.kind.clone(),
            detail: self.detail.clone(),
            created_at: self.created_at.clone(),
        })
    }
}

/// The out-of-band channel selected for delivering security codes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorMethod {
    pub kind: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl TwoFactorMethod {
    pub fn new(kind: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            detail,
            created_at: None,
        }
    }
}

/// First two-factor method among the account's recovery methods
pub fn select_two_factor_method(methods: &[RecoveryMethod]) -> Option<TwoFactorMethod> {
    methods.iter().find_map(RecoveryMethod::two_factor_method)
}
