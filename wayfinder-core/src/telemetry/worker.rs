//! Background flush loop.
//!
//! The worker owns one OS thread that waits on either a ticker or the
//! shutdown channel. Production uses `crossbeam_channel::tick`; tests hand
//! in a channel they drive by hand, so any number of flush cycles can run
//! without wall-clock delay.
//!
//! After a failed delivery the worker waits out the backoff on the shutdown
//! channel, so `shutdown()` interrupts the wait instead of sleeping through
//! it. An in-flight request is bounded by the sink's request timeout.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info};

use crate::error::{Result, WayfinderError};

use super::{FlushOutcome, TelemetryUploader};

/// Handle to the running flush thread. Dropping it stops the thread.
pub struct TelemetryWorker {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
}

impl TelemetryWorker {
    /// Start flushing every `flush_interval` from the uploader's config.
    pub fn spawn(uploader: Arc<TelemetryUploader>) -> Result<Self> {
        let ticks = crossbeam_channel::tick(uploader.config().flush_interval);
        Self::spawn_with_ticker(uploader, ticks)
    }

    /// Start flushing once per message received on `ticks`. The loop also
    /// ends if the ticker disconnects.
    pub fn spawn_with_ticker(
        uploader: Arc<TelemetryUploader>,
        ticks: Receiver<Instant>,
    ) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let cycles = Arc::new(AtomicU64::new(0));

        let thread_running = Arc::clone(&running);
        let thread_cycles = Arc::clone(&cycles);
        let handle = std::thread::Builder::new()
            .name("wayfinder-telemetry".into())
            .spawn(move || {
                run(&uploader, &ticks, &shutdown_rx, &thread_cycles);
                thread_running.store(false, Ordering::SeqCst);
            })?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            running,
            cycles,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flush cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Stop accepting new cycles and wait for the thread to exit.
    ///
    /// # Errors
    /// - `WayfinderError::NotRunning` if already shut down.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(tx) = self.shutdown_tx.take() else {
            return Err(WayfinderError::NotRunning);
        };
        // Disconnecting wakes both the select and any backoff wait.
        drop(tx);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| WayfinderError::Other(anyhow::anyhow!("telemetry worker panicked")))?;
        }
        info!("telemetry worker shut down");
        Ok(())
    }
}

impl Drop for TelemetryWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for TelemetryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryWorker")
            .field("running", &self.is_running())
            .field("cycles", &self.cycles())
            .finish()
    }
}

fn run(
    uploader: &TelemetryUploader,
    ticks: &Receiver<Instant>,
    shutdown: &Receiver<()>,
    cycles: &AtomicU64,
) {
    info!(session_id = uploader.session_id(), "telemetry worker started");

    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(ticks) -> tick => {
                if tick.is_err() {
                    debug!("telemetry ticker closed");
                    break;
                }
                let outcome = uploader.flush_once();
                cycles.fetch_add(1, Ordering::SeqCst);

                if let FlushOutcome::Failed { backoff, .. } = outcome {
                    debug!(backoff_ms = backoff.as_millis() as u64, "telemetry backoff");
                    match shutdown.recv_timeout(backoff) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                }
            }
        }
    }

    info!(pending = uploader.pending(), "telemetry worker stopped");
}
