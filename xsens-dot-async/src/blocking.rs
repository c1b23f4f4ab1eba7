//! A blocking interface to [`Session`].
//!
//! [`BlockingSession`] drives a session on the calling thread with a
//! [`dot_executor::Executor`]. Each call blocks until its operation completes, and notifications
//! that arrive meanwhile are dispatched to their consumers on the same thread.
//!
//! # Panics
//!
//! The blocking methods must not be called from inside a consumer or observer callback, or from
//! any future the same thread is already blocking on. Doing so panics.

use std::sync::Arc;

use async_broadcast::RecvError;
use dot_executor::Executor;
use futures_lite::{FutureExt, future};
use tracing::debug;
use xsens_dot::{
    Battery, CharacteristicId, CharacteristicValue, Codec, DecodeError, DeviceControl, DeviceInfo,
    FilterProfile, OrientationResetStatus, PayloadMode,
};

use crate::error::{Error, Result};
use crate::session::{Session, SessionOptions, SessionState};
use crate::transport::Transport;
use crate::util::{BroadcastReceiver, BroadcastSender, watch};

/// Stops a running [`BlockingSession::pump_forever()`].
///
/// Handles can be cloned and used from any thread, including from a consumer callback.
#[derive(Clone)]
pub struct PumpHandle {
    sender: Arc<BroadcastSender<()>>,
}

impl PumpHandle {
    /// Makes the current `pump_forever` call return `Ok(())`.
    ///
    /// A stop requested while no pump is running ends the next one immediately. Stops that pile
    /// up before a pump sees them count as one.
    pub fn stop(&self) {
        let _ = self.sender.try_broadcast(());
    }
}

impl std::fmt::Debug for PumpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpHandle").finish_non_exhaustive()
    }
}

/// A [`Session`] driven to completion one call at a time.
///
/// Dropping a `BlockingSession` closes the session. When dropped during unwinding, or from inside
/// an executor, the link is released without unsubscribing first.
pub struct BlockingSession<T: Transport> {
    session: Session<T>,
    executor: Executor,
    stop: Arc<BroadcastSender<()>>,
    stop_requests: BroadcastReceiver<()>,
}

impl<T: Transport> std::fmt::Debug for BlockingSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> From<Session<T>> for BlockingSession<T> {
    fn from(session: Session<T>) -> Self {
        let stop = watch();
        let stop_requests = stop.new_receiver();
        BlockingSession {
            session,
            executor: Executor::new(),
            stop: Arc::new(stop),
            stop_requests,
        }
    }
}

impl<T: Transport> BlockingSession<T> {
    pub fn new(transport: T, address: impl Into<String>) -> Self {
        Session::new(transport, address).into()
    }

    pub fn with_options(transport: T, address: impl Into<String>, options: SessionOptions) -> Self {
        Session::with_options(transport, address, options).into()
    }

    /// Opens the session, runs `body` and closes the session again, whether `body` returns or
    /// panics.
    pub fn scoped<R>(mut self, body: impl FnOnce(&mut BlockingSession<T>) -> Result<R>) -> Result<R> {
        self.open()?;
        let result = body(&mut self);
        self.close();
        result
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// Gives access to the session for configuration, e.g. registering observers.
    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    /// The session's lifecycle state. See [`Session::state()`].
    pub fn state(&mut self) -> SessionState {
        self.session.state()
    }

    pub fn is_subscribed(&mut self, id: CharacteristicId) -> bool {
        self.session.is_subscribed(id)
    }

    /// Blocks until `op` completes on the session.
    ///
    /// ```no_run
    /// # use xsens_dot_async::{Transport, blocking::BlockingSession};
    /// # fn demo<T: Transport>(session: &mut BlockingSession<T>) -> xsens_dot_async::Result<()> {
    /// let battery = session.run(async |s| s.battery().await)?;
    /// println!("battery at {}%", battery.level);
    /// # Ok(())
    /// # }
    /// ```
    pub fn run<R>(&mut self, op: impl AsyncFnOnce(&mut Session<T>) -> R) -> R {
        self.executor.block_on(op(&mut self.session))
    }

    pub fn open(&mut self) -> Result<()> {
        self.executor.block_on(self.session.open())
    }

    pub fn close(&mut self) {
        self.executor.block_on(self.session.close())
    }

    pub fn read<C: Codec>(&mut self) -> Result<C> {
        self.executor.block_on(self.session.read())
    }

    pub fn read_value(&mut self, id: CharacteristicId) -> Result<CharacteristicValue> {
        self.executor.block_on(self.session.read_value(id))
    }

    pub fn write<C: Codec>(&mut self, value: &C) -> Result<()> {
        self.executor.block_on(self.session.write(value))
    }

    pub fn write_value(&mut self, value: &CharacteristicValue) -> Result<()> {
        self.executor.block_on(self.session.write_value(value))
    }

    pub fn subscribe<C, F>(&mut self, consumer: F) -> Result<()>
    where
        C: Codec + 'static,
        F: FnMut(C) + Send + 'static,
    {
        self.executor.block_on(self.session.subscribe(consumer))
    }

    pub fn subscribe_value<F>(&mut self, id: CharacteristicId, consumer: F) -> Result<()>
    where
        F: FnMut(CharacteristicValue) + Send + 'static,
    {
        self.executor
            .block_on(self.session.subscribe_value(id, consumer))
    }

    pub fn unsubscribe(&mut self, id: CharacteristicId) -> Result<()> {
        self.executor.block_on(self.session.unsubscribe(id))
    }

    pub fn on_disconnect<F>(&mut self, f: F)
    where
        F: FnMut(&Error) + Send + 'static,
    {
        self.session.on_disconnect(f);
    }

    pub fn on_decode_error<F>(&mut self, f: F)
    where
        F: FnMut(CharacteristicId, &DecodeError) + Send + 'static,
    {
        self.session.on_decode_error(f);
    }

    /// Returns a handle that stops [`pump_forever()`][Self::pump_forever].
    pub fn pump_handle(&self) -> PumpHandle {
        PumpHandle {
            sender: self.stop.clone(),
        }
    }

    /// Dispatches notifications until stopped through a [`PumpHandle`] or until the session
    /// fails.
    ///
    /// Returns `Ok(())` when stopped. Losing the link returns an
    /// [`UnexpectedDisconnect`][crate::error::ErrorKind::UnexpectedDisconnect] error, and the
    /// session is closed afterwards.
    pub fn pump_forever(&mut self) -> Result<()> {
        let BlockingSession {
            session,
            executor,
            stop_requests,
            ..
        } = self;
        debug!(address = %session.address(), "pumping");
        executor.block_on(async {
            let pump = async { Err::<(), _>(session.pump().await) };
            let stopped = async {
                loop {
                    match stop_requests.recv().await {
                        Ok(()) => break,
                        // the newest stop is still queued behind the overflow
                        Err(RecvError::Overflowed(_)) => continue,
                        Err(RecvError::Closed) => future::pending::<()>().await,
                    }
                }
                debug!("pump stopped");
                Ok(())
            };
            pump.or(stopped).await
        })
    }

    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        self.executor.block_on(self.session.device_info())
    }

    pub fn device_control(&mut self) -> Result<DeviceControl> {
        self.executor.block_on(self.session.device_control())
    }

    pub fn battery(&mut self) -> Result<Battery> {
        self.executor.block_on(self.session.battery())
    }

    pub fn identify(&mut self) -> Result<()> {
        self.executor.block_on(self.session.identify())
    }

    pub fn power_off(&mut self) -> Result<()> {
        self.executor.block_on(self.session.power_off())
    }

    pub fn set_power_on_by_usb_plug_in(&mut self, enabled: bool) -> Result<()> {
        self.executor
            .block_on(self.session.set_power_on_by_usb_plug_in(enabled))
    }

    pub fn set_output_rate(&mut self, hz: u16) -> Result<()> {
        self.executor.block_on(self.session.set_output_rate(hz))
    }

    pub fn reset_output_rate(&mut self) -> Result<()> {
        self.executor.block_on(self.session.reset_output_rate())
    }

    pub fn set_filter_profile(&mut self, profile: FilterProfile) -> Result<()> {
        self.executor
            .block_on(self.session.set_filter_profile(profile))
    }

    pub fn set_device_tag(&mut self, tag: &str) -> Result<()> {
        self.executor.block_on(self.session.set_device_tag(tag))
    }

    pub fn start_measurement(&mut self, mode: PayloadMode) -> Result<()> {
        self.executor
            .block_on(self.session.start_measurement(mode))
    }

    pub fn stop_measurement(&mut self, mode: PayloadMode) -> Result<()> {
        self.executor.block_on(self.session.stop_measurement(mode))
    }

    pub fn reset_heading(&mut self) -> Result<()> {
        self.executor.block_on(self.session.reset_heading())
    }

    pub fn revert_heading(&mut self) -> Result<()> {
        self.executor.block_on(self.session.revert_heading())
    }

    pub fn heading_reset_status(&mut self) -> Result<OrientationResetStatus> {
        self.executor
            .block_on(self.session.heading_reset_status())
    }
}

impl<T: Transport> Drop for BlockingSession<T> {
    fn drop(&mut self) {
        if std::thread::panicking() || Executor::is_blocking() {
            return;
        }
        self.executor.block_on(self.session.close());
    }
}
