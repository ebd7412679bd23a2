//! Performance-counter providers consumed by the monitor windows.
//!
//! The windowing core only relies on [`CounterSource`]: refresh, read named
//! counters from the returned [`CounterSnapshot`], reset. Where the numbers
//! come from (sysfs InfiniBand ports, kernel net devices, a synthetic
//! generator) stays behind that trait.

mod baseline;
pub mod counter;
pub mod error;
pub mod fabric;
pub mod netdev;
pub mod simulated;
pub mod source;
pub mod sysfs;

pub use counter::{Counter, CounterSnapshot};
pub use error::CounterError;
pub use fabric::{DiscoveryRoots, Fabric, FabricNode, FabricPort, SourceKind};
pub use netdev::NetDevSource;
pub use simulated::SimulatedSource;
pub use source::{AggregateSource, CounterSource, SharedSource};
pub use sysfs::IbPortSource;
