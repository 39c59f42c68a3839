//! Gateway node configuration.

use windfall_types::NodeInfo;

/// Share added to the list price when a request routes in greenest
/// mode.
pub const DEFAULT_GREEN_SURCHARGE: f64 = 0.10;
/// Upper bound applied to caller-supplied `max_tokens`.
pub const DEFAULT_MAX_TOKENS_CAP: u32 = 8192;

/// Static configuration for one gateway node.
///
/// `nodes` lists every fleet member including this node; the routing
/// and proxy layers treat any entry whose id differs from `node_id`
/// as a peer.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// This node's fleet id (e.g. `"wf-helsinki"`).
    pub node_id: String,
    /// Human-readable location (e.g. `"Helsinki, Finland"`).
    pub node_location: String,
    pub lat: f64,
    pub lon: f64,
    /// All fleet nodes, this one included.
    pub nodes: Vec<NodeInfo>,
    /// Port peers serve the inference endpoint on.
    pub port: u16,
    /// Wallet receiving direct transfers and x402 settlements.
    pub wallet_address: String,
    /// USDC contract address on the settlement chain.
    pub usdc_address: String,
    pub green_surcharge: f64,
    /// Free requests granted per wallet.
    pub wallet_free_requests: u32,
    pub max_tokens_cap: u32,
    /// Base-chain JSON-RPC endpoint for transfer verification.
    pub base_rpc_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            node_id: "wf-local".to_string(),
            node_location: "Local".to_string(),
            lat: 0.0,
            lon: 0.0,
            nodes: Vec::new(),
            port: 4000,
            wallet_address: String::new(),
            usdc_address: windfall_x402::USDC_ADDRESS_BASE.to_string(),
            green_surcharge: DEFAULT_GREEN_SURCHARGE,
            wallet_free_requests: windfall_pay::DEFAULT_WALLET_FREE_REQUESTS,
            max_tokens_cap: DEFAULT_MAX_TOKENS_CAP,
            base_rpc_url: windfall_pay::DEFAULT_BASE_RPC_URL.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn new(node_id: impl Into<String>, node_location: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            node_location: node_location.into(),
            ..Self::default()
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.lat = lat;
        self.lon = lon;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeInfo>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_wallet_address(mut self, address: impl Into<String>) -> Self {
        self.wallet_address = address.into();
        self
    }

    pub fn with_usdc_address(mut self, address: impl Into<String>) -> Self {
        self.usdc_address = address.into();
        self
    }

    pub fn with_green_surcharge(mut self, surcharge: f64) -> Self {
        self.green_surcharge = surcharge;
        self
    }

    pub fn with_wallet_free_requests(mut self, grant: u32) -> Self {
        self.wallet_free_requests = grant;
        self
    }

    pub fn with_max_tokens_cap(mut self, cap: u32) -> Self {
        self.max_tokens_cap = cap;
        self
    }

    pub fn with_base_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.base_rpc_url = url.into();
        self
    }

    /// This node's fleet entry. Prefers the matching `nodes` row so the
    /// router sees consistent zone and coordinate data; synthesizes one
    /// when the fleet list omits this node.
    pub fn self_node(&self) -> NodeInfo {
        if let Some(node) = self.nodes.iter().find(|n| n.id == self.node_id) {
            return node.clone();
        }
        NodeInfo::new(&self.node_id, &self.node_location, "127.0.0.1", "")
            .with_coordinates(self.lat, self.lon)
    }

    /// Peer entries: every fleet node except this one.
    pub fn peers(&self) -> Vec<NodeInfo> {
        self.nodes
            .iter()
            .filter(|n| n.id != self.node_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_node_prefers_fleet_entry() {
        let config = GatewayConfig::new("wf-helsinki", "Helsinki, Finland").with_nodes(vec![
            NodeInfo::new("wf-helsinki", "Helsinki, Finland", "10.0.0.1", "FI")
                .with_coordinates(60.17, 24.94),
            NodeInfo::new("wf-frankfurt", "Frankfurt, Germany", "10.0.0.2", "DE"),
        ]);

        let node = config.self_node();
        assert_eq!(node.ip, "10.0.0.1");
        assert_eq!(node.grid_zone, "FI");
        assert_eq!(node.lat, 60.17);
    }

    #[test]
    fn test_self_node_synthesized_when_absent() {
        let config = GatewayConfig::new("wf-solo", "Nowhere").with_coordinates(1.0, 2.0);
        let node = config.self_node();
        assert_eq!(node.id, "wf-solo");
        assert_eq!(node.lat, 1.0);
        assert_eq!(node.grid_zone, "");
    }

    #[test]
    fn test_peers_excludes_self() {
        let config = GatewayConfig::new("wf-helsinki", "Helsinki").with_nodes(vec![
            NodeInfo::new("wf-helsinki", "Helsinki", "10.0.0.1", "FI"),
            NodeInfo::new("wf-frankfurt", "Frankfurt", "10.0.0.2", "DE"),
        ]);

        let peers = config.peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, "wf-frankfurt");
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.green_surcharge, DEFAULT_GREEN_SURCHARGE);
        assert_eq!(config.max_tokens_cap, 8192);
        assert_eq!(config.wallet_free_requests, 25);
    }
}
