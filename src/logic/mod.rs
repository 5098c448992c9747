/// Logic Layer - Block Aggregation
///
/// This layer is responsible for:
/// - Decoding untyped upstream records into typed block events
/// - Folding each block into the running monitor counters
///
/// Nothing here performs I/O; the runtime layer drives it one block at a time.

pub mod aggregator;
pub mod decoder;
pub mod types;

// Re-export key components from the logic layer
pub use aggregator::{apply_block, apply_blocks};
pub use decoder::decode_block;
pub use types::{ArbitrageOpportunity, BlockEvent, GlobalStats, MonitorState, UserPnL};
