//! Public keys and access key permissions

use crate::{AccountId, Balance};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use twofa_errors::Error;

/// Methods callable by limited access keys (LAK) on a multisig account
pub const METHOD_NAMES_LAK: [&str; 4] = [
    "add_request",
    "add_request_and_confirm",
    "delete_request",
    "confirm",
];

/// Methods callable by the server-held confirm-only key
pub const METHOD_NAMES_CONFIRM: [&str; 1] = ["confirm"];

const ED25519_PREFIX: &str = "ed25519:";
const SECP256K1_PREFIX: &str = "secp256k1:";
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Curve-prefixed, base58 encoded public key (`ed25519:<base58>`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(String);

impl PublicKey {
    /// Full textual form including the curve prefix
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form expected by the multisig contract: ed25519 keys lose their prefix.
    pub fn for_contract(&self) -> String {
        self.0
            .strip_prefix(ED25519_PREFIX)
            .unwrap_or(&self.0)
            .to_string()
    }

    fn parse(s: &str) -> Result<Self, Error> {
        let (prefix, data) = if let Some(data) = s.strip_prefix(ED25519_PREFIX) {
            (ED25519_PREFIX, data)
        } else if let Some(data) = s.strip_prefix(SECP256K1_PREFIX) {
            (SECP256K1_PREFIX, data)
        } else if !s.contains(':') {
            (ED25519_PREFIX, s)
        } else {
            return Err(Error::InvalidPublicKey(format!("{s}: unknown curve")));
        };

        if data.is_empty() {
            return Err(Error::InvalidPublicKey(format!("{s}: empty key data")));
        }
        if let Some(c) = data.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(Error::InvalidPublicKey(format!(
                "{s}: invalid base58 character '{c}'"
            )));
        }

        Ok(Self(format!("{prefix}{data}")))
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope of a function-call access key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallPermission {
    /// Remaining gas allowance; `None` means unlimited
    pub allowance: Option<Balance>,
    pub receiver_id: AccountId,
    pub method_names: Vec<String>,
}

/// Access key permission as reported by the chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessKeyPermission {
    FullAccess,
    FunctionCall(FunctionCallPermission),
}

impl AccessKeyPermission {
    /// Limited access key scoped to the multisig request methods
    pub fn limited_access(receiver_id: AccountId, allowance: Option<Balance>) -> Self {
        Self::function_call(receiver_id, allowance, &METHOD_NAMES_LAK)
    }

    /// Key that may only confirm requests
    pub fn confirm_only(receiver_id: AccountId) -> Self {
        Self::function_call(receiver_id, None, &METHOD_NAMES_CONFIRM)
    }

    fn function_call(receiver_id: AccountId, allowance: Option<Balance>, methods: &[&str]) -> Self {
        AccessKeyPermission::FunctionCall(FunctionCallPermission {
            allowance,
            receiver_id,
            method_names: methods.iter().map(|m| m.to_string()).collect(),
        })
    }

    pub fn is_full_access(&self) -> bool {
        matches!(self, AccessKeyPermission::FullAccess)
    }
}

/// Access key body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKey {
    #[serde(default)]
    pub nonce: u64,
    pub permission: AccessKeyPermission,
}

impl AccessKey {
    pub fn full_access() -> Self {
        Self {
            nonce: 0,
            permission: AccessKeyPermission::FullAccess,
        }
    }

    pub fn with_permission(permission: AccessKeyPermission) -> Self {
        Self {
            nonce: 0,
            permission,
        }
    }
}

/// An access key registered on an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyInfo {
    pub public_key: PublicKey,
    pub access_key: AccessKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ed25519:6E8sCci9badyRkXb3JoRpBj5p8C6Tw41ELDZoiihKEtp";

    #[test]
    fn test_parse_and_contract_form() {
        let key: PublicKey = KEY.parse().unwrap();
        assert_eq!(key.as_str(), KEY);
        assert_eq!(
            key.for_contract(),
            "6E8sCci9badyRkXb3JoRpBj5p8C6Tw41ELDZoiihKEtp"
        );
    }

    #[test]
    fn test_prefixless_key_is_ed25519() {
        let key: PublicKey = "6E8sCci9badyRkXb3JoRpBj5p8C6Tw41ELDZoiihKEtp".parse().unwrap();
        assert_eq!(key.as_str(), KEY);
    }

    #[test]
    fn test_invalid_keys() {
        assert!("ed25519:".parse::<PublicKey>().is_err());
        assert!("ed25519:0OIl".parse::<PublicKey>().is_err());
        assert!("rsa:abc".parse::<PublicKey>().is_err());
    }

    #[test]
    fn test_permission_wire_format() {
        let full = serde_json::to_value(AccessKeyPermission::FullAccess).unwrap();
        assert_eq!(full, serde_json::json!("FullAccess"));

        let receiver: AccountId = "alice.near".parse().unwrap();
        let lak = serde_json::to_value(AccessKeyPermission::confirm_only(receiver)).unwrap();
        assert_eq!(
            lak,
            serde_json::json!({
                "FunctionCall": {
                    "allowance": null,
                    "receiver_id": "alice.near",
                    "method_names": ["confirm"]
                }
            })
        );
    }

    #[test]
    fn test_access_key_info_from_rpc() {
        let json = serde_json::json!({
            "public_key": KEY,
            "access_key": {
                "nonce": 12,
                "permission": {
                    "FunctionCall": {
                        "allowance": "10000",
                        "receiver_id": "alice.near",
                        "method_names": ["add_request"]
                    }
                }
            }
        });
        let info: AccessKeyInfo = serde_json::from_value(json).unwrap();
        assert_eq!(info.access_key.nonce, 12);
        assert!(!info.access_key.permission.is_full_access());
    }
}
