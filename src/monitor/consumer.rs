use crate::data_sync::{BlockFeed, SubscriptionRequest};
use crate::logic::{apply_block, decode_block, types::MonitorState};
use crate::monitor::reporter::Reporter;
use eyre::{Result, WrapErr, eyre};
use serde_json::Value;
use std::fmt;
use std::io::{self, Write};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of a consumer; one-shot per process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Streaming,
    Draining,
    Terminated,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsumerState::Idle => "Idle",
            ConsumerState::Streaming => "Streaming",
            ConsumerState::Draining => "Draining",
            ConsumerState::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

/// Why streaming stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The upstream feed closed
    StreamEnded,
    /// The cancellation latch was raised
    Cancelled,
}

/// Result of a completed run
#[derive(Debug)]
pub struct ConsumerOutcome<W> {
    pub termination: Termination,
    pub state: MonitorState,
    /// Every state the consumer passed through, in order
    pub transitions: Vec<ConsumerState>,
    pub sink: W,
}

/// Drives the block stream: decode, aggregate, render, until end or cancellation
pub struct StreamConsumer<W: Write> {
    reporter: Reporter<W>,
    cancel: CancellationToken,
    state: ConsumerState,
    monitor: MonitorState,
    transitions: Vec<ConsumerState>,
}

impl<W: Write> StreamConsumer<W> {
    pub fn new(reporter: Reporter<W>, cancel: CancellationToken) -> Self {
        Self::with_state(reporter, cancel, MonitorState::new())
    }

    pub fn with_state(reporter: Reporter<W>, cancel: CancellationToken, monitor: MonitorState) -> Self {
        Self {
            reporter,
            cancel,
            state: ConsumerState::Idle,
            monitor,
            transitions: vec![ConsumerState::Idle],
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Subscribe and consume until the stream ends or cancellation is raised
    ///
    /// A subscription failure, or cancellation before the subscription is
    /// established, is returned as an error and the consumer never leaves
    /// `Idle`. Otherwise the summary is rendered exactly once.
    pub async fn run<F>(mut self, feed: &F, request: &SubscriptionRequest) -> Result<ConsumerOutcome<W>>
    where
        F: BlockFeed + ?Sized,
    {
        let cancel = self.cancel.clone();
        let subscribed = tokio::select! {
            biased;

            result = feed.subscribe(request) => result,

            _ = cancel.cancelled() => {
                return Err(eyre!(
                    "Cancelled before the subscription to {} / {} was established",
                    request.package,
                    request.module
                ));
            }
        };
        let mut subscription = subscribed
            .wrap_err_with(|| format!("Failed to subscribe to {} / {}", request.package, request.module))?;

        self.transition(ConsumerState::Streaming);
        self.report(|reporter| reporter.render_banner(request));

        let termination = loop {
            tokio::select! {
                // Cancellation wins over any block already buffered
                biased;

                _ = cancel.cancelled() => {
                    break Termination::Cancelled;
                }

                record = subscription.next_block() => {
                    match record {
                        Some(record) => self.process_record(&record),
                        None => break Termination::StreamEnded,
                    }
                }
            }
        };

        match termination {
            Termination::StreamEnded => subscription.close().await,
            // Stops the upstream feed
            Termination::Cancelled => drop(subscription),
        }

        Ok(self.finish(termination))
    }

    fn process_record(&mut self, record: &Value) {
        let event = decode_block(record);
        self.monitor = apply_block(self.monitor, &event);

        debug!(
            "Processed block {}: {} opportunities, {} users",
            event.block_number,
            event.opportunities.len(),
            event.user_records.len()
        );

        self.report(|reporter| reporter.render_block(&event));
    }

    fn finish(mut self, termination: Termination) -> ConsumerOutcome<W> {
        self.transition(ConsumerState::Draining);

        match termination {
            Termination::StreamEnded => {
                info!("Stream ended");
                self.report(|reporter| reporter.render_stream_end());
            }
            Termination::Cancelled => {
                info!("Cancellation observed, draining");
                self.report(|reporter| reporter.render_shutdown_notice());
            }
        }

        let monitor = self.monitor;
        self.report(|reporter| reporter.render_summary(&monitor));
        self.transition(ConsumerState::Terminated);

        ConsumerOutcome {
            termination,
            state: self.monitor,
            transitions: self.transitions,
            sink: self.reporter.into_inner(),
        }
    }

    fn transition(&mut self, next: ConsumerState) {
        debug!("Consumer state: {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    // Report output is best-effort
    fn report<F>(&mut self, render: F)
    where
        F: FnOnce(&mut Reporter<W>) -> io::Result<()>,
    {
        if let Err(e) = render(&mut self.reporter) {
            warn!("Failed to write report output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::{ChannelFeed, MonitorConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_stream_end_transitions() {
        let (tx, feed) = ChannelFeed::channel(4);
        tx.send(json!({ "blockNumber": 1 })).await.unwrap();
        drop(tx);

        let consumer = StreamConsumer::new(Reporter::new(Vec::new(), "pkg"), CancellationToken::new());
        assert_eq!(consumer.state(), ConsumerState::Idle);

        let outcome = consumer.run(&feed, &MonitorConfig::default().subscription()).await.unwrap();
        assert_eq!(outcome.termination, Termination::StreamEnded);
        assert_eq!(
            outcome.transitions,
            vec![
                ConsumerState::Idle,
                ConsumerState::Streaming,
                ConsumerState::Draining,
                ConsumerState::Terminated
            ]
        );
        assert_eq!(outcome.state.blocks_processed, 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_processes_nothing() {
        let (tx, feed) = ChannelFeed::channel(4);
        tx.send(json!({ "blockNumber": 1, "arbitrageOpportunities": [{}] })).await.unwrap();
        tx.send(json!({ "blockNumber": 2, "userPnls": [{}] })).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let consumer = StreamConsumer::new(Reporter::new(Vec::new(), "pkg"), cancel);
        let outcome = consumer.run(&feed, &MonitorConfig::default().subscription()).await.unwrap();

        assert_eq!(outcome.termination, Termination::Cancelled);
        assert_eq!(outcome.state.blocks_processed, 0);
        assert_eq!(outcome.state.total_opportunities, 0);
        assert_eq!(outcome.state.total_users, 0);

        let output = String::from_utf8(outcome.sink).unwrap();
        assert!(!output.contains("Block #"));
        assert_eq!(output.matches("STREAMING SUMMARY").count(), 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConsumerState::Draining.to_string(), "Draining");
    }
}
