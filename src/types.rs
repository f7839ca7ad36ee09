//! Value types shared across the session manager.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").expect("address pattern compiles")
    })
}

/// A validated Bluetooth device address.
///
/// Parsing accepts colon or dash separators and either hex case; the stored
/// form is always uppercase with colons, so addresses from user input and
/// from the platform compare and hash consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The canonical form: uppercase, colon-separated.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = SessionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if !address_pattern().is_match(trimmed) {
            return Err(SessionError::InvalidAddress {
                address: raw.to_string(),
            });
        }
        Ok(Address(trimmed.replace('-', ":").to_ascii_uppercase()))
    }
}

impl TryFrom<String> for Address {
    type Error = SessionError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> String {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A discovered or bonded remote device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    /// The device address.
    pub address: Address,
    /// The advertised or bonded name, when the platform knows one.
    pub name: Option<String>,
    /// Signal strength last observed for this device, in dBm.
    pub rssi: Option<i16>,
}

impl Device {
    pub fn new(address: Address, name: Option<String>, rssi: Option<i16>) -> Self {
        Device {
            address,
            name,
            rssi,
        }
    }
}

/// Lifecycle of the single managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Link security requested for an outgoing connection.
///
/// `Insecure` asks the platform to skip link-level authentication, which
/// some headless peripherals require. Adapters that cannot honor the
/// requested mode fail the attempt rather than silently negotiating the
/// other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Secure,
    Insecure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_separated_address() {
        let address: Address = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(address.as_str(), "00:11:22:33:44:55");
    }

    #[test]
    fn normalizes_case_and_separators() {
        let address: Address = "aa-bb-cc-dd-ee-ff".parse().unwrap();
        assert_eq!(address.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let address: Address = "  00:11:22:33:44:55 ".parse().unwrap();
        assert_eq!(address.as_str(), "00:11:22:33:44:55");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in ["", "00:11:22:33:44", "00:11:22:33:44:5", "not-an-address", "00:11:22:33:44:GG"] {
            let parsed = raw.parse::<Address>();
            assert!(
                matches!(parsed, Err(SessionError::InvalidAddress { .. })),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn normalized_addresses_compare_equal() {
        let a: Address = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let b: Address = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_as_plain_string() {
        let address: Address = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(
            serde_json::to_string(&address).unwrap(),
            "\"00:11:22:33:44:55\""
        );
    }
}
