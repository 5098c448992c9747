use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// External interruption request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Interrupt => write!(f, "SIGINT"),
            Interrupt::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Turns the first interruption request into cancellation
///
/// Cancellation is a one-way latch. Only the first request logs and cancels;
/// later requests, however close together, are ignored.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    fired: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            fired: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Handle one interruption. Returns `true` only for the request that
    /// raised cancellation.
    pub fn trigger(&self, interrupt: Interrupt) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            debug!("Ignoring {}: shutdown already in progress", interrupt);
            return false;
        }

        info!("Received {}, shutting down gracefully...", interrupt);
        self.token.cancel();
        true
    }

    /// Process interruption requests until the sender side closes
    pub async fn listen(&self, mut interrupts: mpsc::Receiver<Interrupt>) {
        while let Some(interrupt) = interrupts.recv().await {
            self.trigger(interrupt);
        }
        debug!("Interrupt source closed");
    }

    /// Install OS signal handlers and listen on them in a background task
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let (interrupt_tx, interrupt_rx) = mpsc::channel(4);
        forward_os_signals(interrupt_tx);

        tokio::spawn(async move {
            self.listen(interrupt_rx).await;
        })
    }
}

fn forward_os_signals(interrupt_tx: mpsc::Sender<Interrupt>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                let tx = interrupt_tx.clone();
                tokio::spawn(async move {
                    while terminate.recv().await.is_some() {
                        if tx.send(Interrupt::Terminate).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                break;
            }
            if interrupt_tx.send(Interrupt::Interrupt).await.is_err() {
                break;
            }
        }
    });
}
