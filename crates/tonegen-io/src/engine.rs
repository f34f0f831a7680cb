//! Engine lifecycle: starts the generator and render threads, stops them
//! cooperatively with a bounded join.

use crate::backend::OutputBackend;
use crate::config::EngineConfig;
use crate::generator::GeneratorLoop;
use crate::render::{RenderLoop, RenderSnapshot, RenderStatus};
use crate::signal::ShutdownSignal;
use crate::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tonegen_core::{RingBuffer, ToneParameters};

const GENERATOR_THREAD: &str = "tonegen-generator";
const RENDER_THREAD: &str = "tonegen-render";

/// A running worker and the channel that disconnects when it exits.
struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

impl Worker {
    fn spawn(name: &'static str, body: impl FnOnce() + Send + 'static) -> Result<Self> {
        let (tx, rx): (Sender<()>, Receiver<()>) = bounded(1);
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            // Dropped on return or unwind; either way the receiver disconnects.
            let _exit = tx;
            body();
        })?;
        Ok(Self {
            name,
            handle,
            exited: rx,
        })
    }

    /// Wait up to `timeout` for the thread to finish. On timeout the thread
    /// is left detached.
    fn join(self, timeout: Duration) -> Result<()> {
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::error!(thread = self.name, "worker thread panicked");
                    return Err(Error::WorkerPanicked {
                        thread: self.name.to_string(),
                    });
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(thread = self.name, ?timeout, "worker did not exit in time");
                Err(Error::ShutdownTimeout {
                    thread: self.name.to_string(),
                    timeout,
                })
            }
        }
    }
}

/// Running tone stream.
///
/// [`start`](Self::start) spawns a producer thread that keeps the ring buffer
/// topped up with synthesized blocks and a render thread that feeds it to the
/// device selected by [`ToneParameters::device_selector`]. Parameter changes
/// made through the shared [`ToneParameters`] take effect on the next block.
///
/// Dropping the engine shuts it down.
pub struct ToneEngine {
    params: Arc<ToneParameters>,
    ring: Arc<RingBuffer>,
    status: Arc<RenderStatus>,
    shutdown: ShutdownSignal,
    shutdown_timeout: Duration,
    workers: Mutex<Vec<Worker>>,
}

impl ToneEngine {
    /// Start both worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if a thread cannot be created; any thread
    /// already started is stopped first.
    pub fn start(
        backend: Box<dyn OutputBackend>,
        params: Arc<ToneParameters>,
        config: EngineConfig,
    ) -> Result<Self> {
        let ring = Arc::new(RingBuffer::for_block(config.block_bytes()));
        let status = Arc::new(RenderStatus::new());
        let shutdown = ShutdownSignal::new();

        tracing::info!(
            backend = backend.name(),
            block_frames = config.block_frames,
            ring_bytes = ring.capacity(),
            selector = %params.device_selector(),
            "starting tone engine"
        );

        let engine = Self {
            params: Arc::clone(&params),
            ring: Arc::clone(&ring),
            status: Arc::clone(&status),
            shutdown: shutdown.clone(),
            shutdown_timeout: config.shutdown_timeout,
            workers: Mutex::new(Vec::with_capacity(2)),
        };

        let generator = GeneratorLoop::new(
            Arc::clone(&ring),
            Arc::clone(&params),
            shutdown.clone(),
            config.block_frames,
        );
        engine.workers.lock().push(Worker::spawn(GENERATOR_THREAD, move || {
            generator.run();
        })?);

        let render = RenderLoop::new(backend, ring, params, shutdown, config, status);
        // On failure `engine` drops here and stops the generator.
        let worker = Worker::spawn(RENDER_THREAD, move || render.run())?;
        engine.workers.lock().push(worker);

        Ok(engine)
    }

    /// Shared tone parameters.
    pub fn params(&self) -> &Arc<ToneParameters> {
        &self.params
    }

    /// Ring buffer between the two threads.
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    /// Live render loop status.
    pub fn render_status(&self) -> RenderSnapshot {
        self.status.snapshot()
    }

    /// Whether shutdown has not been requested yet.
    pub fn is_running(&self) -> bool {
        !self.shutdown.is_requested()
    }

    /// Stop both threads.
    ///
    /// Signals shutdown, then joins the render thread (which closes its
    /// device session and drops its notification subscription) and the
    /// generator, each within the configured timeout. Calling this again is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimeout`] naming the first thread that did
    /// not exit in time. That thread is left running detached; the other is
    /// still joined. A thread that died by panicking is reported as
    /// [`Error::WorkerPanicked`].
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown.request();
        let mut workers = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return Ok(());
        }

        // Render first: it owns the device.
        workers.sort_by_key(|w| w.name != RENDER_THREAD);
        let mut first_error = None;
        for worker in workers {
            if let Err(e) = worker.join(self.shutdown_timeout) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("tone engine stopped");
                Ok(())
            }
        }
    }
}

impl Drop for ToneEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "tone engine shutdown incomplete");
        }
    }
}
