pub mod catalog;
pub mod compositor;
pub mod publisher;
pub mod runner;
pub mod source;

// Re-exports for convenience
pub use catalog::{Catalog, CatalogSource};
pub use publisher::{TcpBroadcastSink, snapshot_queue, start_publisher};
pub use runner::Runner;
pub use source::{HandSource, IdleSource, ReplaySource};
