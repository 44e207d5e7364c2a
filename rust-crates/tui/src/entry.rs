use flip_abi::{
    ADDRESS_PREFIX,
    Address,
    ContractWrite,
    Wei,
    parse_ether,
};
use std::fmt;

pub const DEFAULT_WAGER: &str = "0.001";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryError {
    InvalidWager(String),
    InvalidReferrer(String),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryError::InvalidWager(raw) => write!(f, "Invalid wager amount {raw:?}"),
            EntryError::InvalidReferrer(raw) => write!(f, "Invalid referrer address {raw:?}"),
        }
    }
}

impl std::error::Error for EntryError {}

/// Input without the address prefix means "no referrer" and is sent as the
/// zero address. Prefixed input must be a well-formed address.
pub fn resolve_referrer(input: &str) -> Result<Address, EntryError> {
    let trimmed = input.trim();
    if !trimmed.starts_with(ADDRESS_PREFIX) {
        return Ok(Address::ZERO);
    }
    trimmed
        .parse()
        .map_err(|_| EntryError::InvalidReferrer(trimmed.to_string()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryForm {
    pub wager: String,
    pub referrer: String,
}

impl Default for EntryForm {
    fn default() -> Self {
        Self {
            wager: DEFAULT_WAGER.to_string(),
            referrer: String::new(),
        }
    }
}

impl EntryForm {
    pub fn wager_wei(&self) -> Result<Wei, EntryError> {
        parse_ether(&self.wager).map_err(|_| EntryError::InvalidWager(self.wager.clone()))
    }

    pub fn to_write(&self) -> Result<ContractWrite, EntryError> {
        Ok(ContractWrite::EnterGame {
            referrer: resolve_referrer(&self.referrer)?,
            value: self.wager_wei()?,
        })
    }

    /// Hint only: the contract decides whether an entry is large enough.
    pub fn below_minimum(&self, min_entry: Option<Wei>) -> bool {
        match (self.wager_wei(), min_entry) {
            (Ok(wager), Some(min)) => wager < min,
            _ => false,
        }
    }
}
