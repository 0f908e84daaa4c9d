//! Monitoring-interval ticker.
//!
//! A [`MonitorTask`] owns one background thread that invokes its callback
//! every period until stopped. Stopping joins the thread, so once
//! [`MonitorTask::stop`] returns no further ticks are delivered.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Sender, TryRecvError};

pub(crate) struct MonitorTask {
    period: Duration,
    /// Dropping the sender disconnects the channel, which is the stop signal.
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorTask {
    /// Spawn a ticker thread calling `on_tick` every `period`.
    ///
    /// When `dispatch` is set, everything logged on the ticker thread goes to it.
    pub(crate) fn spawn<F>(
        period: Duration,
        dispatch: Option<tracing::Dispatch>,
        mut on_tick: F,
    ) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(period);

        let mut run = move || {
            tracing::debug!(?period, "Monitoring interval scheduler started");
            loop {
                crossbeam::select! {
                    recv(shutdown_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        // Both channels can be ready at once; stop wins.
                        if let Err(TryRecvError::Disconnected) = shutdown_rx.try_recv() {
                            break;
                        }
                        on_tick();
                    }
                }
            }
            tracing::debug!("Monitoring interval scheduler stopped");
        };

        let handle = std::thread::Builder::new()
            .name("pcc-monitor".into())
            .spawn(move || match dispatch {
                Some(dispatch) => tracing::dispatcher::with_default(&dispatch, run),
                None => run(),
            })?;

        Ok(Self {
            period,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }

    /// Cancel the ticker and wait for the thread to exit.
    pub(crate) fn stop(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Monitoring interval scheduler panicked");
            }
        }
    }
}

impl Drop for MonitorTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for MonitorTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorTask")
            .field("period", &self.period)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
