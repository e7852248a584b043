//! Token events
//!
//! Mints, transfers and burns are recorded in the ledger log as single-line
//! JSON events in the NEP-297 envelope used by fungible tokens:
//!
//! ```text
//! EVENT_JSON:{"standard":"nep141","version":"1.0.0","event":"ft_mint","data":[{"owner_id":"owner","amount":"1000","memo":"new tokens are minted"}]}
//! ```
//!
//! Amounts are serialized as base-10 strings and a missing memo is left out.

use super::account::{AccountId, Balance};
use super::amount::U128;
use serde::Serialize;
use std::fmt;

/// Prefix of every event line in the ledger log
pub const EVENT_JSON_PREFIX: &str = "EVENT_JSON:";

const STANDARD: &str = "nep141";
const VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FtMint {
    pub owner_id: AccountId,
    pub amount: U128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FtTransfer {
    pub old_owner_id: AccountId,
    pub new_owner_id: AccountId,
    pub amount: U128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FtBurn {
    pub owner_id: AccountId,
    pub amount: U128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// A supply or ownership change of the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Mint(FtMint),
    Transfer(FtTransfer),
    Burn(FtBurn),
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    standard: &'static str,
    version: &'static str,
    event: &'static str,
    data: [&'a T; 1],
}

fn envelope<'a, T: Serialize>(event: &'static str, data: &'a T) -> Envelope<'a, T> {
    Envelope {
        standard: STANDARD,
        version: VERSION,
        event,
        data: [data],
    }
}

impl TokenEvent {
    pub fn mint(owner: &AccountId, amount: Balance, memo: Option<&str>) -> Self {
        TokenEvent::Mint(FtMint {
            owner_id: owner.clone(),
            amount: U128(amount),
            memo: memo.map(str::to_string),
        })
    }

    pub fn transfer(from: &AccountId, to: &AccountId, amount: Balance, memo: Option<&str>) -> Self {
        TokenEvent::Transfer(FtTransfer {
            old_owner_id: from.clone(),
            new_owner_id: to.clone(),
            amount: U128(amount),
            memo: memo.map(str::to_string),
        })
    }

    pub fn burn(owner: &AccountId, amount: Balance, memo: Option<&str>) -> Self {
        TokenEvent::Burn(FtBurn {
            owner_id: owner.clone(),
            amount: U128(amount),
            memo: memo.map(str::to_string),
        })
    }

    /// Event name within the standard
    pub fn name(&self) -> &'static str {
        match self {
            TokenEvent::Mint(_) => "ft_mint",
            TokenEvent::Transfer(_) => "ft_transfer",
            TokenEvent::Burn(_) => "ft_burn",
        }
    }

    fn to_json(&self) -> serde_json::Result<String> {
        let name = self.name();
        match self {
            TokenEvent::Mint(data) => serde_json::to_string(&envelope(name, data)),
            TokenEvent::Transfer(data) => serde_json::to_string(&envelope(name, data)),
            TokenEvent::Burn(data) => serde_json::to_string(&envelope(name, data)),
        }
    }
}

/// Formats the event as its log line, prefix included
impl fmt::Display for TokenEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = self.to_json().map_err(|_| fmt::Error)?;
        write!(f, "{}{}", EVENT_JSON_PREFIX, json)
    }
}
