/// Data Synchronization Layer
///
/// This layer owns everything about the upstream block stream:
///
/// - Monitor configuration and the frozen subscription parameters
/// - The `BlockFeed` capability and its one-shot `Subscription`
/// - A substreams CLI backed feed that forwards jsonl module output
///
/// Records leave this layer as untyped JSON; decoding happens in the logic layer.

pub mod config;
pub mod feed;
pub mod substreams;

// Re-export main components for easy usage
pub use config::{MonitorConfig, SubscriptionRequest};
pub use feed::{BlockFeed, ChannelFeed, Subscription};
pub use substreams::SubstreamsCliFeed;
