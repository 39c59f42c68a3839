//! Energy-aware routing for the Windfall gateway.
//!
//! Routing is a pure function over three inputs: the routing mode the
//! caller asked for, the set of peers currently considered healthy, and
//! the oracle's cost surface. Health tracking is the only stateful part
//! and lives in [`HealthRegistry`].
//!
//! ```text
//!   HealthRegistry ──> healthy candidates ──┐
//!                                           ├──> route() ──> RoutingDecision
//!   CostSurface ───────────────────────────-┘
//! ```
//!
//! A node with no health record yet counts as healthy, so a fresh
//! gateway routes across the whole fleet instead of serving everything
//! itself until the first probe cycle completes.

pub mod health;
pub mod select;

pub use health::{HealthRegistry, DEFAULT_PROBE_INTERVAL};
pub use select::route;
