// Three-Layer Architecture
pub mod data_sync; // Data Layer: upstream subscription and configuration
pub mod logic; // Logic Layer: block decoding and aggregation
pub mod monitor; // Runtime Layer: consumption loop, shutdown, reporting

// Common utilities and types
pub mod utils;

// Re-export key components from each layer
pub use data_sync::{BlockFeed, ChannelFeed, MonitorConfig, Subscription, SubscriptionRequest, SubstreamsCliFeed};
pub use logic::{
    ArbitrageOpportunity, BlockEvent, GlobalStats, MonitorState, UserPnL, apply_block, apply_blocks, decode_block,
};
pub use monitor::{ConsumerOutcome, ConsumerState, Interrupt, Reporter, ShutdownCoordinator, StreamConsumer, Termination};
pub use utils::{LoadConfigError, MonitorError, init_telemetry};
