pub mod helpers;
pub mod mock_chain;
pub mod mock_energy;
pub mod mock_facilitator;
pub mod mock_forwarder;
pub mod mock_provider;
pub mod mock_session;
pub mod mock_sink;

pub use helpers::*;
pub use mock_chain::{pad_address, MockChainRpc, MockEthPrice};
pub use mock_energy::MockEnergySource;
pub use mock_facilitator::MockFacilitator;
pub use mock_forwarder::{ForwardRecord, MockPeerForwarder};
pub use mock_provider::MockProvider;
pub use mock_session::MockSessionStore;
pub use mock_sink::MockAttestationSink;
