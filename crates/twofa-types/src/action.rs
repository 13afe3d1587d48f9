//! Transaction actions and the multisig request wire schema

use crate::{AccessKey, AccessKeyPermission, AccountId, PublicKey};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use twofa_errors::Error;

/// Amount in the chain's smallest unit, written as a decimal string
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Balance(pub u128);

/// Gas amount, written as a decimal string on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Gas(pub u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

macro_rules! decimal_string_serde {
    ($ty:ident, $inner:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match NumberOrString::deserialize(deserializer)? {
                    NumberOrString::Number(n) => Ok($ty(n.into())),
                    NumberOrString::String(s) => s
                        .parse::<$inner>()
                        .map($ty)
                        .map_err(serde::de::Error::custom),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<$inner>().map($ty)
            }
        }
    };
}

decimal_string_serde!(Balance, u128);
decimal_string_serde!(Gas, u64);

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

/// Action of a signed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    CreateAccount,
    DeployContract {
        #[serde(with = "base64_bytes")]
        code: Vec<u8>,
    },
    FunctionCall {
        method_name: String,
        #[serde(with = "base64_bytes")]
        args: Vec<u8>,
        gas: Gas,
        deposit: Balance,
    },
    Transfer {
        deposit: Balance,
    },
    Stake {
        stake: Balance,
        public_key: PublicKey,
    },
    AddKey {
        public_key: PublicKey,
        access_key: AccessKey,
    },
    DeleteKey {
        public_key: PublicKey,
    },
    DeleteAccount {
        beneficiary_id: AccountId,
    },
}

impl Action {
    pub fn add_key(public_key: PublicKey, permission: AccessKeyPermission) -> Self {
        Action::AddKey {
            public_key,
            access_key: AccessKey::with_permission(permission),
        }
    }

    pub fn delete_key(public_key: PublicKey) -> Self {
        Action::DeleteKey { public_key }
    }

    pub fn deploy_contract(code: Vec<u8>) -> Self {
        Action::DeployContract { code }
    }

    pub fn function_call(method_name: &str, args: Vec<u8>, gas: Gas, deposit: Balance) -> Self {
        Action::FunctionCall {
            method_name: method_name.to_string(),
            args,
            gas,
            deposit,
        }
    }

    /// Name of the action variant
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateAccount => "CreateAccount",
            Action::DeployContract { .. } => "DeployContract",
            Action::FunctionCall { .. } => "FunctionCall",
            Action::Transfer { .. } => "Transfer",
            Action::Stake { .. } => "Stake",
            Action::AddKey { .. } => "AddKey",
            Action::DeleteKey { .. } => "DeleteKey",
            Action::DeleteAccount { .. } => "DeleteAccount",
        }
    }
}

/// A transaction as handed over by a dApp for batch submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub receiver_id: AccountId,
    pub actions: Vec<Action>,
}

/// Permission of a key added through a multisig request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigKeyPermission {
    pub receiver_id: AccountId,
    pub allowance: Option<Balance>,
    pub method_names: Vec<String>,
}

/// Action as accepted by the multisig contract's `add_request*` methods
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestAction {
    Transfer {
        amount: Balance,
    },
    AddKey {
        public_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permission: Option<MultisigKeyPermission>,
    },
    DeleteKey {
        public_key: String,
    },
    FunctionCall {
        method_name: String,
        /// Base64 encoded call arguments
        args: String,
        gas: Gas,
        deposit: Balance,
    },
}

impl RequestAction {
    pub fn transfer(amount: Balance) -> Self {
        RequestAction::Transfer { amount }
    }

    /// Key addition; `None` permission adds a full access key
    pub fn add_key(public_key: &PublicKey, permission: Option<MultisigKeyPermission>) -> Self {
        RequestAction::AddKey {
            public_key: public_key.for_contract(),
            permission,
        }
    }

    pub fn delete_key(public_key: &PublicKey) -> Self {
        RequestAction::DeleteKey {
            public_key: public_key.for_contract(),
        }
    }
}

impl TryFrom<&Action> for RequestAction {
    type Error = Error;

    /// Normalize a transaction action into the request encoding: amounts and
    /// gas become decimal strings, call arguments become base64 and keys take
    /// the contract's prefix-less form.
    fn try_from(action: &Action) -> Result<Self, Self::Error> {
        match action {
            Action::Transfer { deposit } => Ok(RequestAction::Transfer { amount: *deposit }),
            Action::FunctionCall {
                method_name,
                args,
                gas,
                deposit,
            } => Ok(RequestAction::FunctionCall {
                method_name: method_name.clone(),
                args: general_purpose::STANDARD.encode(args),
                gas: *gas,
                deposit: *deposit,
            }),
            Action::AddKey {
                public_key,
                access_key,
            } => {
                let permission = match &access_key.permission {
                    AccessKeyPermission::FullAccess => None,
                    AccessKeyPermission::FunctionCall(p) => Some(MultisigKeyPermission {
                        receiver_id: p.receiver_id.clone(),
                        allowance: p.allowance,
                        method_names: p.method_names.clone(),
                    }),
                };
                Ok(RequestAction::add_key(public_key, permission))
            }
            Action::DeleteKey { public_key } => Ok(RequestAction::delete_key(public_key)),
            other => Err(Error::UnsupportedAction(other.kind().to_string())),
        }
    }
}

/// Request submitted to the multisig contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigRequest {
    pub receiver_id: AccountId,
    pub actions: Vec<RequestAction>,
}

impl MultisigRequest {
    pub fn new(receiver_id: AccountId, actions: Vec<RequestAction>) -> Self {
        Self {
            receiver_id,
            actions,
        }
    }

    /// Normalize every action of a dApp transaction
    pub fn from_transaction(tx: &Transaction) -> Result<Self, Error> {
        let actions = tx
            .actions
            .iter()
            .map(RequestAction::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(tx.receiver_id.clone(), actions))
    }
}
