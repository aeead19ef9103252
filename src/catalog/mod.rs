//! Endpoint catalog for relay data APIs
//!
//! This module maps a (network, relay selector) pair to the ordered list of
//! base query URLs the scheduler dispatches against. The table is static;
//! nothing here performs network activity except the optional DNS preflight
//! in [`resolve_endpoints`].

mod query;
mod relays;

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub use query::{latest_url, parse_endpoint, resolve_endpoints, slot_query_url};
pub use relays::PROPOSER_PAYLOAD_DELIVERED_PATH;

/// Supported consensus networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    #[default]
    Mainnet,
    Holesky,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Holesky => "holesky",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "holesky" => Ok(Self::Holesky),
            other => Err(format!(
                "unknown network '{}' (expected mainnet or holesky)",
                other
            )),
        }
    }
}

/// Known MEV-Boost relays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relay {
    Flashbots,
    Ultrasound,
    BloxrouteMaxProfit,
    BloxrouteRegulated,
    Agnostic,
    Aestus,
    Titan,
    Manifold,
}

impl Relay {
    /// All relays, in catalog order
    pub const ALL: [Relay; 8] = [
        Relay::Flashbots,
        Relay::Ultrasound,
        Relay::BloxrouteMaxProfit,
        Relay::BloxrouteRegulated,
        Relay::Agnostic,
        Relay::Aestus,
        Relay::Titan,
        Relay::Manifold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flashbots => "flashbots",
            Self::Ultrasound => "ultrasound",
            Self::BloxrouteMaxProfit => "bloxroute-max-profit",
            Self::BloxrouteRegulated => "bloxroute-regulated",
            Self::Agnostic => "agnostic",
            Self::Aestus => "aestus",
            Self::Titan => "titan",
            Self::Manifold => "manifold",
        }
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        Relay::ALL
            .iter()
            .copied()
            .find(|relay| relay.as_str() == wanted)
            .ok_or_else(|| format!("unknown relay '{}'", s))
    }
}

/// Which relays of a network to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum RelaySelector {
    /// Union of every relay serving the network
    #[default]
    All,
    /// A single relay
    One(Relay),
}

impl fmt::Display for RelaySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::One(relay) => fmt::Display::fmt(relay, f),
        }
    }
}

impl FromStr for RelaySelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::One)
        }
    }
}

impl TryFrom<String> for RelaySelector {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Returns the base query URLs for a network and relay selector
///
/// The result is ordered as the catalog lists relays. A relay that does not
/// serve the chosen network yields an empty list; callers treat that as a
/// setup error.
///
/// # Examples
///
/// ```
/// use relay_payloads::catalog::{endpoints, Network, Relay, RelaySelector};
///
/// let urls = endpoints(Network::Mainnet, RelaySelector::One(Relay::Flashbots));
/// assert_eq!(
///     urls,
///     vec!["https://boost-relay.flashbots.net/relay/v1/data/bidtraces/proposer_payload_delivered"]
/// );
/// ```
pub fn endpoints(network: Network, selector: RelaySelector) -> Vec<String> {
    relays::table(network)
        .iter()
        .filter(|(relay, _)| match selector {
            RelaySelector::All => true,
            RelaySelector::One(wanted) => *relay == wanted,
        })
        .map(|(_, host)| format!("{}{}", host, PROPOSER_PAYLOAD_DELIVERED_PATH))
        .collect()
}
