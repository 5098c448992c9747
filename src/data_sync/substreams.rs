use crate::data_sync::config::{MonitorConfig, SubscriptionRequest};
use crate::data_sync::feed::{BlockFeed, Subscription};
use crate::utils::MonitorError;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Key under which `substreams run -o jsonl` nests the module output
const DATA_ENVELOPE: &str = "@data";

type OutputLines = Lines<BufReader<ChildStdout>>;

/// Feed that streams module output through the `substreams` CLI
///
/// The CLI reads `SUBSTREAMS_API_TOKEN` from the inherited environment.
pub struct SubstreamsCliFeed {
    substreams_bin: String,
    endpoint: String,
    channel_buffer_size: usize,
}

impl SubstreamsCliFeed {
    pub fn new(substreams_bin: String, endpoint: String, channel_buffer_size: usize) -> Self {
        Self {
            substreams_bin,
            endpoint,
            channel_buffer_size,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.substreams_bin.clone(),
            config.endpoint.clone(),
            config.channel_buffer_size,
        )
    }

    /// CLI arguments for a subscription
    pub fn command_args(&self, request: &SubscriptionRequest) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-e".to_string(),
            self.endpoint.clone(),
            request.package.clone(),
            request.module.clone(),
            "-s".to_string(),
            request.start_block.to_string(),
        ];
        if let Some(stop_block) = request.stop_block {
            args.push("-t".to_string());
            args.push(stop_block.to_string());
        }
        args.push("-o".to_string());
        args.push("jsonl".to_string());
        args
    }

    /// Forward stdout lines until EOF or until the consumer goes away
    async fn pump_lines(mut child: Child, mut lines: OutputLines, first: Option<Value>, block_tx: mpsc::Sender<Value>) {
        let mut pending = first;

        loop {
            if let Some(record) = pending.take() {
                if block_tx.send(record).await.is_err() {
                    debug!("Block receiver dropped, stopping feed");
                    break;
                }
                continue;
            }

            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => pending = parse_line(&line),
                        Ok(None) => {
                            info!("Upstream output ended");
                            break;
                        }
                        Err(e) => {
                            warn!("Failed to read upstream output: {}", e);
                            break;
                        }
                    }
                }

                _ = block_tx.closed() => {
                    debug!("Block receiver closed, stopping feed");
                    break;
                }
            }
        }

        // Dropping the sender here is what signals end-of-stream
        drop(block_tx);

        match child.try_wait() {
            Ok(Some(status)) if !status.success() => warn!("substreams exited with {}", status),
            Ok(Some(_)) => debug!("substreams exited cleanly"),
            Ok(None) => match child.wait().await {
                Ok(status) if !status.success() => warn!("substreams exited with {}", status),
                Ok(_) => debug!("substreams exited cleanly"),
                Err(e) => warn!("Failed to wait for substreams: {}", e),
            },
            Err(e) => warn!("Failed to poll substreams status: {}", e),
        }
    }
}

#[async_trait]
impl BlockFeed for SubstreamsCliFeed {
    async fn subscribe(&self, request: &SubscriptionRequest) -> Result<Subscription, MonitorError> {
        let args = self.command_args(request);
        info!("Starting upstream feed: {} {}", self.substreams_bin, args.join(" "));

        let mut child = Command::new(&self.substreams_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MonitorError::FeedSpawn {
                command: self.substreams_bin.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MonitorError::FeedUnavailable("substreams stdout not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        // The subscription is established once the first block arrives.
        // Output that ends before that is only a success if the CLI exits cleanly.
        let first = next_record(&mut lines).await;
        if first.is_none() {
            let status = child
                .wait()
                .await
                .map_err(|e| MonitorError::FeedUnavailable(format!("failed to wait for substreams: {}", e)))?;
            if !status.success() {
                return Err(MonitorError::FeedUnavailable(format!(
                    "substreams exited with {} before streaming any block",
                    status
                )));
            }
            info!("Upstream ended without emitting any block");
        }

        let (block_tx, block_rx) = mpsc::channel(self.channel_buffer_size);
        let task = tokio::spawn(Self::pump_lines(child, lines, first, block_tx));

        Ok(Subscription::with_task(block_rx, task))
    }
}

async fn next_record(lines: &mut OutputLines) -> Option<Value> {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(record) = parse_line(&line) {
                    return Some(record);
                }
            }
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read upstream output: {}", e);
                return None;
            }
        }
    }
}

/// Parse one line of CLI output into a raw block record
///
/// Returns `None` for blank lines, non-JSON lines and JSON that is not an
/// object. Records wrapped in the jsonl envelope are unwrapped to their
/// `@data` payload.
pub fn parse_line(line: &str) -> Option<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let record = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(mut fields)) => match fields.remove(DATA_ENVELOPE) {
            Some(data) => data,
            None => Value::Object(fields),
        },
        Ok(other) => other,
        Err(e) => {
            debug!("Skipping non-JSON upstream line ({}): {}", e, trimmed);
            return None;
        }
    };

    if record.is_object() {
        Some(record)
    } else {
        debug!("Skipping non-object upstream record: {}", trimmed);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(stop_block: Option<u64>) -> SubscriptionRequest {
        SubscriptionRequest {
            package: "polymarket-pnl@v0.3.1".to_string(),
            module: "map_enhanced_pnl_with_neg_risk".to_string(),
            start_block: 60_000_000,
            stop_block,
        }
    }

    #[test]
    fn test_command_args() {
        let feed = SubstreamsCliFeed::new("substreams".to_string(), "polygon.streamingfast.io:443".to_string(), 10);

        assert_eq!(
            feed.command_args(&request(None)),
            vec![
                "run",
                "-e",
                "polygon.streamingfast.io:443",
                "polymarket-pnl@v0.3.1",
                "map_enhanced_pnl_with_neg_risk",
                "-s",
                "60000000",
                "-o",
                "jsonl"
            ]
        );

        let args = feed.command_args(&request(Some(60_000_100)));
        let stop_pos = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[stop_pos + 1], "60000100");
    }

    #[test]
    fn test_parse_enveloped_line() {
        let line = r#"{"@module":"map_enhanced_pnl_with_neg_risk","@block":60000001,"@type":"contract.v1.DuneCompatiblePnL","@data":{"blockNumber":"60000001"}}"#;
        assert_eq!(parse_line(line), Some(json!({ "blockNumber": "60000001" })));
    }

    #[test]
    fn test_parse_bare_line() {
        assert_eq!(parse_line(r#" {"blockNumber": 5} "#), Some(json!({ "blockNumber": 5 })));
    }

    #[test]
    fn test_parse_skips_noise() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line("Connected (trace ID abc)"), None);
    }

    #[test]
    fn test_parse_skips_non_object_records() {
        assert_eq!(parse_line("42"), None);
        assert_eq!(parse_line(r#""block""#), None);
        assert_eq!(parse_line("[1, 2]"), None);
        assert_eq!(parse_line(r#"{"@module":"m","@data":7}"#), None);
    }

    #[tokio::test]
    async fn test_missing_binary_fails_subscription() {
        let feed = SubstreamsCliFeed::new(
            "/nonexistent/substreams-binary".to_string(),
            "localhost:9000".to_string(),
            4,
        );

        let result = feed.subscribe(&request(None)).await;
        assert!(matches!(result, Err(MonitorError::FeedSpawn { .. })));
    }

    #[cfg(unix)]
    fn fake_cli(dir: &tempfile::TempDir, body: &str) -> SubstreamsCliFeed {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.path().join("fake-substreams");
        std::fs::write(&script, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        SubstreamsCliFeed::new(script.to_string_lossy().into_owned(), "localhost:9000".to_string(), 4)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_failure_before_first_block_fails_subscription() {
        let dir = tempfile::tempdir().unwrap();
        let feed = fake_cli(&dir, "echo 'Error: authentication failed' >&2\nexit 3\n");

        match feed.subscribe(&request(None)).await {
            Err(MonitorError::FeedUnavailable(message)) => assert!(message.contains("exit status: 3")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("subscription should fail"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_without_blocks_is_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let feed = fake_cli(&dir, "echo 'Connected (trace ID 42)'\nexit 0\n");

        let mut subscription = feed.subscribe(&request(None)).await.unwrap();
        assert_eq!(subscription.next_block().await, None);
        subscription.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_first_block_is_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let feed = fake_cli(
            &dir,
            "echo '{\"@data\":{\"blockNumber\":\"1\"}}'\necho '{\"@data\":{\"blockNumber\":\"2\"}}'\nexit 1\n",
        );

        let mut subscription = feed.subscribe(&request(None)).await.unwrap();
        assert_eq!(subscription.next_block().await, Some(json!({ "blockNumber": "1" })));
        assert_eq!(subscription.next_block().await, Some(json!({ "blockNumber": "2" })));
        assert_eq!(subscription.next_block().await, None);
        subscription.close().await;
    }
}
