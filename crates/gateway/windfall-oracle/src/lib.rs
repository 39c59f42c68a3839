//! Energy cost oracle for the Windfall gateway.
//!
//! The oracle polls grid data for every zone the fleet runs in and
//! maintains a [`CostSurface`](windfall_types::CostSurface): one energy
//! reading per node, plus pointers to the cheapest and greenest nodes.
//! The surface is rebuilt on every poll and swapped in atomically, so
//! readers never see a half-updated view.
//!
//! ```text
//!   Electricity Maps ──> EnergyDataSource ──┐
//!                                           ├──> EnergyOracle ──> CostSurface
//!   zone base prices ──> PricingEstimator ──┘         │
//!                                                     └──> poll loop (5 min)
//! ```
//!
//! A zone whose fetch fails falls back to a static per-zone profile;
//! the oracle itself never fails a poll. Freshness is observable via
//! [`EnergyOracle::is_healthy`], which turns false 15 minutes after the
//! last successful rebuild.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use windfall_oracle::{EnergyOracle, OracleConfig};
//! use windfall_types::NodeInfo;
//!
//! # async fn run() -> Result<(), windfall_oracle::SourceError> {
//! let nodes = vec![NodeInfo::new("windfall-fi-01", "Helsinki, Finland", "10.0.0.5", "FI")];
//! let oracle = Arc::new(EnergyOracle::new(OracleConfig::new(nodes))?);
//!
//! let poller = Arc::clone(&oracle);
//! tokio::spawn(async move { poller.run().await });
//!
//! let surface = oracle.surface();
//! println!("cheapest node: {:?}", surface.cheapest_node);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod estimator;
pub mod oracle;
pub mod source;

pub use config::OracleConfig;
pub use estimator::{PricingEstimator, RenewableDiscountEstimator};
pub use oracle::EnergyOracle;
pub use source::{ElectricityMapsClient, EnergyDataSource, SourceError, ZoneReadings};
