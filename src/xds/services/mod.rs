mod ads;
pub mod stream;

pub use ads::SnapshotDiscoveryService;
