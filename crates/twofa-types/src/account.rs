//! Account identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use twofa_errors::Error;

const MIN_LEN: usize = 2;
const MAX_LEN: usize = 64;

/// Named account on the chain, e.g. `alice.testnet`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the account id grammar: lowercase alphanumeric parts joined by
    /// single `-`, `_` or `.` separators.
    pub fn validate(id: &str) -> Result<(), Error> {
        if id.len() < MIN_LEN || id.len() > MAX_LEN {
            return Err(Error::InvalidAccountId(format!(
                "{id}: length must be between {MIN_LEN} and {MAX_LEN}"
            )));
        }

        let mut last_was_separator = true;
        for c in id.chars() {
            match c {
                'a'..='z' | '0'..='9' => last_was_separator = false,
                '-' | '_' | '.' => {
                    if last_was_separator {
                        return Err(Error::InvalidAccountId(format!(
                            "{id}: misplaced separator '{c}'"
                        )));
                    }
                    last_was_separator = true;
                }
                _ => {
                    return Err(Error::InvalidAccountId(format!(
                        "{id}: invalid character '{c}'"
                    )))
                }
            }
        }

        if last_was_separator {
            return Err(Error::InvalidAccountId(format!(
                "{id}: must not end with a separator"
            )));
        }

        Ok(())
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for AccountId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)?;
        Ok(Self(value))
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
