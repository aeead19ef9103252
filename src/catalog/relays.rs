use super::{Network, Relay};

/// Path shared by every MEV-Boost relay data API for delivered payloads
pub const PROPOSER_PAYLOAD_DELIVERED_PATH: &str =
    "/relay/v1/data/bidtraces/proposer_payload_delivered";

/// Relay hosts serving mainnet, in catalog order
const MAINNET: &[(Relay, &str)] = &[
    (Relay::Flashbots, "https://boost-relay.flashbots.net"),
    (Relay::Ultrasound, "https://relay.ultrasound.money"),
    (Relay::BloxrouteMaxProfit, "https://bloxroute.max-profit.blxrbdn.com"),
    (Relay::BloxrouteRegulated, "https://bloxroute.regulated.blxrbdn.com"),
    (Relay::Agnostic, "https://agnostic-relay.net"),
    (Relay::Aestus, "https://mainnet.aestus.live"),
    (Relay::Titan, "https://titanrelay.xyz"),
    (Relay::Manifold, "https://mainnet-relay.securerpc.com"),
];

/// Relay hosts serving holesky, in catalog order
const HOLESKY: &[(Relay, &str)] = &[
    (Relay::Flashbots, "https://boost-relay-holesky.flashbots.net"),
    (Relay::Ultrasound, "https://relay-holesky.ultrasound.money"),
    (Relay::BloxrouteMaxProfit, "https://holesky.blxrbdn.com"),
    (Relay::Aestus, "https://holesky.aestus.live"),
    (Relay::Titan, "https://holesky.titanrelay.xyz"),
];

/// Returns the (relay, host) table for a network
pub(super) fn table(network: Network) -> &'static [(Relay, &'static str)] {
    match network {
        Network::Mainnet => MAINNET,
        Network::Holesky => HOLESKY,
    }
}
