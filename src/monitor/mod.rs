/// Runtime Layer
///
/// Runs the block stream to completion:
///
/// - `consumer` drives the Idle -> Streaming -> Draining -> Terminated state machine
/// - `shutdown` latches the first interruption request into cancellation
/// - `reporter` renders blocks and the final summary as text lines

pub mod consumer;
pub mod reporter;
pub mod shutdown;


pub use consumer::{ConsumerOutcome, ConsumerState, StreamConsumer, Termination};
pub use reporter::Reporter;
pub use shutdown::{Interrupt, ShutdownCoordinator};
