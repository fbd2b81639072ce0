use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// A single denomination entry as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denomination {
    /// Code byte reported by the validator after ESCROW
    pub code: u8,
    /// Currency value credited for this bill
    pub value: u64,
}

/// Mapping from denomination code to currency value.
///
/// Validated on construction: codes are unique and every value is positive.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Denomination>", into = "Vec<Denomination>")]
pub struct DenominationTable(BTreeMap<u8, u64>);

impl DenominationTable {
    /// Builds a table from entries, rejecting duplicates and zero values
    pub fn from_entries(entries: impl IntoIterator<Item = Denomination>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for Denomination { code, value } in entries {
            if value == 0 {
                return Err(Error::config(format!(
                    "denomination 0x{:02X} must have a positive value",
                    code
                )));
            }
            if table.insert(code, value).is_some() {
                return Err(Error::config(format!(
                    "duplicate denomination code 0x{:02X}",
                    code
                )));
            }
        }
        Ok(DenominationTable(table))
    }

    /// Looks up the value of a denomination code
    pub fn value_of(&self, code: u8) -> Option<u64> {
        self.0.get(&code).copied()
    }

    /// Number of known denominations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no denominations
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in code order
    pub fn iter(&self) -> impl Iterator<Item = Denomination> + '_ {
        self.0
            .iter()
            .map(|(&code, &value)| Denomination { code, value })
    }
}

impl Default for DenominationTable {
    fn default() -> Self {
        DenominationTable(BTreeMap::from([(0x40, 100), (0x41, 200)]))
    }
}

impl TryFrom<Vec<Denomination>> for DenominationTable {
    type Error = Error;

    fn try_from(entries: Vec<Denomination>) -> Result<Self> {
        DenominationTable::from_entries(entries)
    }
}

impl From<DenominationTable> for Vec<Denomination> {
    fn from(table: DenominationTable) -> Self {
        table.iter().collect()
    }
}

/// Configuration for a billgate node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port of the bill validator
    pub validator_port: String,
    /// Validator baud rate
    pub validator_baud: u32,
    /// Bound on every validator read
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub read_timeout: Duration,
    /// Serial port of the relay actuator, if any
    pub actuator_port: Option<String>,
    /// Actuator baud rate
    pub actuator_baud: u32,
    /// Amount that unlocks the service
    pub target_amount: u64,
    /// Idle time after which an active session is dropped
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub session_timeout: Duration,
    /// Clear the session as soon as it unlocks
    pub reset_on_unlock: bool,
    /// Keep-alive POLL interval, disabled when unset
    #[serde(serialize_with = "super::serde::serialize_opt_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_duration")]
    pub poll_interval: Option<Duration>,
    /// Accepted bills
    pub denominations: DenominationTable,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            validator_port: super::DEFAULT_VALIDATOR_PORT.to_string(),
            validator_baud: super::VALIDATOR_BAUD,
            read_timeout: Duration::from_millis(200),
            actuator_port: None,
            actuator_baud: super::ACTUATOR_BAUD,
            target_amount: 100,
            session_timeout: Duration::from_secs(60),
            reset_on_unlock: true,
            poll_interval: None,
            denominations: DenominationTable::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file; missing keys take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))
    }

    /// Checks the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.validator_port.trim().is_empty() {
            return Err(Error::config("Validator port must not be empty"));
        }
        if self.validator_baud == 0 || self.actuator_baud == 0 {
            return Err(Error::config("Baud rate must be positive"));
        }
        if self.read_timeout < Duration::from_millis(1) || self.read_timeout > Duration::from_secs(1)
        {
            return Err(Error::config("Read timeout must be between 1ms and 1s"));
        }
        if self.target_amount == 0 {
            return Err(Error::config("Target amount must be positive"));
        }
        if self.session_timeout.is_zero() {
            return Err(Error::config("Session timeout must be positive"));
        }
        if matches!(self.poll_interval, Some(interval) if interval.is_zero()) {
            return Err(Error::config("Poll interval must be positive"));
        }
        if self.denominations.is_empty() {
            return Err(Error::config("At least one denomination is required"));
        }
        Ok(())
    }
}
