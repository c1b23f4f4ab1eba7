use std::collections::BTreeSet;
use std::fmt::Display;
use std::pin::{Pin, pin};
use std::task::{Context, Poll};
use std::time::Duration;

use async_io::Timer;
use futures_channel::mpsc::TryRecvError;
use futures_lite::{FutureExt, StreamExt, future};
use tracing::{debug, warn};
use xsens_dot::{CharacteristicId, CharacteristicValue, Codec, DecodeError, Properties};

use crate::error::{Error, ErrorKind, Result};
use crate::router::{Consumer, NotificationRouter};
use crate::transport::{LinkEvent, LinkEventReceiver, LinkEvents, Transport};
use crate::util::defer;

/// The number of link events dispatched before the pending operation is polled again.
const EVENT_BUDGET: usize = 64;

/// Options that control a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// How long `open`, `read`, `write`, `subscribe` and `unsubscribe` may wait on the
    /// transport. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl SessionOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SessionState::Closed => "closed",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
        })
    }
}

struct Connection<L> {
    link: L,
    events: LinkEventReceiver,
}

type DisconnectObserver = Box<dyn FnMut(&Error) + Send>;

/// One connection to one device.
///
/// A session moves from `Closed` to `Open` once, through [`open()`][Self::open], and back to
/// `Closed` through [`close()`][Self::close] or when the transport loses the link. A session that
/// has been open cannot be opened again; create a new one instead.
///
/// Every operation takes `&mut self`, so operations on one session never overlap. While an
/// operation waits on the transport, notifications that arrive for the session keep being
/// dispatched to their consumers.
///
/// # Cancellation
///
/// Dropping an `open` future leaves the session `Closed`. Dropping a `subscribe` future undoes
/// the consumer registration the next time the session is used. Dropping an `unsubscribe` future
/// leaves the consumer removed, and `close` repeats the request. Dropping a `write` future may or
/// may not have changed the device. Dropping an open session releases its link.
pub struct Session<T: Transport> {
    transport: T,
    address: String,
    options: SessionOptions,
    state: SessionState,
    used: bool,
    conn: Option<Connection<T::Link>>,
    router: NotificationRouter,
    /// A subscribe whose transport request has not completed yet.
    pending: Option<CharacteristicId>,
    /// An unsubscribe whose transport request has not completed yet.
    unsubscribing: Option<CharacteristicId>,
    /// Characteristics the device may still be notifying after a dropped unsubscribe.
    stale: BTreeSet<CharacteristicId>,
    on_disconnect: Option<DisconnectObserver>,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// Disjoint borrows of an open session, for driving one transport request.
struct Parts<'a, T: Transport> {
    transport: &'a T,
    link: &'a T::Link,
    events: &'a mut LinkEventReceiver,
    router: &'a mut NotificationRouter,
    timeout: Option<Duration>,
}

impl<T: Transport> Session<T> {
    /// Creates a closed session for the device at `address`.
    pub fn new(transport: T, address: impl Into<String>) -> Self {
        Self::with_options(transport, address, SessionOptions::default())
    }

    pub fn with_options(transport: T, address: impl Into<String>, options: SessionOptions) -> Self {
        Session {
            transport,
            address: address.into(),
            options,
            state: SessionState::Closed,
            used: false,
            conn: None,
            router: NotificationRouter::new(),
            pending: None,
            unsubscribing: None,
            stale: BTreeSet::new(),
            on_disconnect: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// The current lifecycle state.
    ///
    /// Link events queued since the session was last driven are dispatched first, so a link the
    /// transport has reported lost shows up here as `Closed`.
    pub fn state(&mut self) -> SessionState {
        self.drain_events();
        self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns `true` if notifications for `id` are being delivered to a consumer.
    ///
    /// Like [`state()`][Self::state], this dispatches queued link events first.
    pub fn is_subscribed(&mut self, id: CharacteristicId) -> bool {
        self.drain_events();
        self.pending != Some(id) && self.router.contains(id)
    }

    /// Sets a callback invoked once if the transport loses the link.
    pub fn on_disconnect<F>(&mut self, f: F)
    where
        F: FnMut(&Error) + Send + 'static,
    {
        self.on_disconnect = Some(Box::new(f));
    }

    /// Sets a callback invoked for every notification that fails to decode.
    pub fn on_decode_error<F>(&mut self, f: F)
    where
        F: FnMut(CharacteristicId, &DecodeError) + Send + 'static,
    {
        self.router.on_decode_error(f);
    }

    /// Connects to the device.
    ///
    /// On failure the session stays `Closed` and `open` may be retried. Transport failures are
    /// reported as [`ErrorKind::ConnectFailed`].
    pub async fn open(&mut self) -> Result<()> {
        self.settle();
        if self.used || self.state != SessionState::Closed {
            return Err(Error::invalid_state("open", self.describe_state()));
        }

        debug!(address = %self.address, "connecting");
        self.state = SessionState::Connecting;
        let (events, receiver) = LinkEvents::channel();

        let connected = {
            let Session {
                transport,
                address,
                options,
                state,
                ..
            } = self;
            let guard = defer(|| *state = SessionState::Closed);
            let connect = async {
                transport.connect(address, events).await.map_err(|err| {
                    if err.kind() == ErrorKind::ConnectFailed {
                        err
                    } else {
                        Error::connect_failed(err.to_string())
                    }
                })
            };
            let result = with_timeout(options.timeout, connect).await;
            if result.is_ok() {
                guard.defuse();
            }
            result
        };

        match connected {
            Ok(link) => {
                self.conn = Some(Connection {
                    link,
                    events: receiver,
                });
                self.state = SessionState::Open;
                self.used = true;
                debug!(address = %self.address, "open");
                Ok(())
            }
            Err(err) => {
                debug!(address = %self.address, %err, "connect failed");
                Err(err)
            }
        }
    }

    /// Opens the session, runs `body` and closes the session again, whatever `body` returns.
    ///
    /// If the returned future is dropped early or `body` panics, the link is released when the
    /// session is dropped.
    pub async fn scoped<R>(
        mut self,
        body: impl AsyncFnOnce(&mut Session<T>) -> Result<R>,
    ) -> Result<R> {
        self.open().await?;
        let result = body(&mut self).await;
        self.close().await;
        result
    }

    /// Reads and decodes a characteristic.
    pub async fn read<C: Codec>(&mut self) -> Result<C> {
        let bytes = self.read_raw(C::CHARACTERISTIC).await?;
        Ok(C::decode(&bytes)?)
    }

    /// Reads a characteristic selected at runtime.
    pub async fn read_value(&mut self, id: CharacteristicId) -> Result<CharacteristicValue> {
        let bytes = self.read_raw(id).await?;
        Ok(CharacteristicValue::decode(id, &bytes)?)
    }

    async fn read_raw(&mut self, id: CharacteristicId) -> Result<Vec<u8>> {
        self.ensure("read", id, Properties::READ)?;
        let result = match self.parts("read") {
            Ok(parts) => {
                let op = parts.transport.read(parts.link, id);
                drive(parts.events, parts.router, parts.timeout, op).await
            }
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Encodes and writes a characteristic.
    ///
    /// If the returned future is dropped before it completes, the device may or may not have
    /// applied the write.
    pub async fn write<C: Codec>(&mut self, value: &C) -> Result<()> {
        self.write_raw(C::CHARACTERISTIC, value.encode()).await
    }

    pub async fn write_value(&mut self, value: &CharacteristicValue) -> Result<()> {
        self.write_raw(value.characteristic(), value.encode()).await
    }

    async fn write_raw(&mut self, id: CharacteristicId, bytes: Vec<u8>) -> Result<()> {
        self.ensure("write", id, Properties::WRITE)?;
        let result = match self.parts("write") {
            Ok(parts) => {
                let op = parts.transport.write(parts.link, id, bytes);
                drive(parts.events, parts.router, parts.timeout, op).await
            }
            Err(err) => Err(err),
        };
        self.finish(result)
    }

    /// Delivers every notification of `C`'s characteristic to `consumer`.
    ///
    /// Subscribing again replaces the previous consumer.
    pub async fn subscribe<C, F>(&mut self, consumer: F) -> Result<()>
    where
        C: Codec + 'static,
        F: FnMut(C) + Send + 'static,
    {
        self.subscribe_with(C::CHARACTERISTIC, Consumer::typed(consumer))
            .await
    }

    /// Delivers every notification of `id` to `consumer` as a [`CharacteristicValue`].
    pub async fn subscribe_value<F>(&mut self, id: CharacteristicId, consumer: F) -> Result<()>
    where
        F: FnMut(CharacteristicValue) + Send + 'static,
    {
        self.subscribe_with(id, Consumer::value(id, consumer)).await
    }

    async fn subscribe_with(&mut self, id: CharacteristicId, consumer: Consumer) -> Result<()> {
        self.ensure("subscribe", id, Properties::NOTIFY)?;
        if self.router.insert(id, consumer).is_some() {
            debug!(%id, "replaced consumer");
            return Ok(());
        }

        self.pending = Some(id);
        let result = match self.parts("subscribe") {
            Ok(parts) => {
                let op = parts.transport.subscribe(parts.link, id);
                drive(parts.events, parts.router, parts.timeout, op).await
            }
            Err(err) => Err(err),
        };
        match self.finish(result) {
            Ok(()) => {
                self.pending = None;
                self.stale.remove(&id);
                debug!(%id, "subscribed");
                Ok(())
            }
            Err(err) => {
                self.settle();
                Err(err)
            }
        }
    }

    /// Stops delivering notifications of `id`.
    ///
    /// Does nothing if `id` has no consumer. Late notifications the transport delivers after
    /// this call are dropped. If the returned future is dropped before it completes, the consumer
    /// stays removed and the transport request is repeated by [`close()`][Self::close].
    pub async fn unsubscribe(&mut self, id: CharacteristicId) -> Result<()> {
        self.settle();
        if self.state != SessionState::Open {
            return Err(Error::invalid_state("unsubscribe", self.describe_state()));
        }
        if self.router.remove(id).is_none() && !self.stale.remove(&id) {
            return Ok(());
        }

        self.unsubscribing = Some(id);
        let result = match self.parts("unsubscribe") {
            Ok(parts) => {
                let op = parts.transport.unsubscribe(parts.link, id);
                drive(parts.events, parts.router, parts.timeout, op).await
            }
            Err(err) => Err(err),
        };
        self.unsubscribing = None;
        let result = self.finish(result);
        if result.is_ok() {
            debug!(%id, "unsubscribed");
        }
        result
    }

    /// Dispatches notifications until the link is lost, and returns the reason.
    ///
    /// If the session is not open this returns an [`ErrorKind::InvalidState`] error immediately.
    pub async fn pump(&mut self) -> Error {
        self.settle();
        let result = match self.parts("pump") {
            Ok(parts) => {
                let op = future::pending::<Result<std::convert::Infallible>>();
                drive(parts.events, parts.router, None, op).await
            }
            Err(err) => Err(err),
        };
        let Err(err) = self.finish(result);
        err
    }

    /// Unsubscribes everything and releases the link.
    ///
    /// Teardown is best-effort: failed unsubscribes are logged and the link is released anyway.
    /// Closing a session that is not open does nothing.
    pub async fn close(&mut self) {
        self.settle();
        if self.state != SessionState::Open {
            return;
        }

        debug!(address = %self.address, "closing");
        self.state = SessionState::Closing;
        let mut ids: BTreeSet<_> = std::mem::take(&mut self.stale);
        ids.extend(self.router.ids());
        for id in ids {
            self.router.remove(id);
            let result = match self.parts("close") {
                Ok(parts) => {
                    let op = parts.transport.unsubscribe(parts.link, id);
                    drive(parts.events, parts.router, parts.timeout, op).await
                }
                Err(err) => Err(err),
            };
            if let Err(err) = self.finish(result) {
                warn!(%id, %err, "unsubscribe failed during close");
                if self.state == SessionState::Closed {
                    return;
                }
            }
        }
        self.release();
    }

    /// Checks that `operation` on `id` is valid right now.
    fn ensure(&mut self, operation: &str, id: CharacteristicId, required: Properties) -> Result<()> {
        self.settle();
        if self.state != SessionState::Open {
            return Err(Error::invalid_state(operation, self.describe_state()));
        }
        if !id.properties().contains(required) {
            return Err(Error::new(
                ErrorKind::NotPermitted,
                format!("cannot {operation} {id}"),
            ));
        }
        Ok(())
    }

    fn parts(&mut self, operation: &str) -> Result<Parts<'_, T>> {
        let state = self.describe_state();
        let Session {
            transport,
            conn,
            router,
            options,
            ..
        } = self;
        match conn {
            Some(Connection { link, events }) => Ok(Parts {
                transport,
                link,
                events,
                router,
                timeout: options.timeout,
            }),
            None => Err(Error::invalid_state(operation, state)),
        }
    }

    /// Cleans up after operations whose futures were dropped before completing.
    fn settle(&mut self) {
        if let Some(id) = self.pending.take() {
            debug!(%id, "rolling back unfinished subscribe");
            self.router.remove(id);
        }
        if let Some(id) = self.unsubscribing.take() {
            debug!(%id, "unsubscribe did not finish, retrying on close");
            self.stale.insert(id);
        }
        if self.state == SessionState::Closing {
            self.release();
        }
    }

    fn finish<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(err) = &result {
            if err.kind() == ErrorKind::UnexpectedDisconnect {
                self.lost(err);
            }
        }
        result
    }

    fn lost(&mut self, err: &Error) {
        warn!(address = %self.address, %err, "link lost");
        self.pending = None;
        self.unsubscribing = None;
        self.release();
        if let Some(observer) = self.on_disconnect.as_mut() {
            observer(err);
        }
    }

    fn release(&mut self) {
        if let Some(Connection { link, events }) = self.conn.take() {
            drop(events);
            self.transport.disconnect(link);
        }
        self.router.clear();
        self.stale.clear();
        self.state = SessionState::Closed;
        debug!(address = %self.address, "closed");
    }

    /// Dispatches link events that are already queued, without waiting for more.
    fn drain_events(&mut self) {
        let Session { conn, router, .. } = self;
        let Some(Connection { events, .. }) = conn else {
            return;
        };
        let lost = loop {
            let event = match events.try_recv() {
                Ok(event) => Some(event),
                Err(TryRecvError::Closed) => None,
                Err(TryRecvError::Empty) => break None,
            };
            if let Some(err) = handle_event(event, router) {
                break Some(err);
            }
        };
        if let Some(err) = lost {
            self.lost(&err);
        }
    }

    fn describe_state(&self) -> &'static str {
        match self.state {
            SessionState::Closed if self.used => "closed for good",
            SessionState::Closed => "closed",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(Connection { link, .. }) = self.conn.take() {
            debug!(address = %self.address, "releasing link on drop");
            self.transport.disconnect(link);
        }
    }
}

/// Polls `op` to completion while dispatching link events.
///
/// Resolves with an `UnexpectedDisconnect` error as soon as the link is reported lost, and with
/// a `Timeout` error if `timeout` elapses first.
async fn drive<F, R>(
    events: &mut LinkEventReceiver,
    router: &mut NotificationRouter,
    timeout: Option<Duration>,
    op: F,
) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    let mut op = pin!(op);
    let mut timer = timeout.map(Timer::after);
    future::poll_fn(|cx| {
        if let Poll::Ready(err) = poll_events(events, router, cx) {
            return Poll::Ready(Err(err));
        }
        if let Poll::Ready(result) = op.as_mut().poll(cx) {
            return Poll::Ready(result);
        }
        if let Some(timer) = timer.as_mut() {
            if Pin::new(timer).poll(cx).is_ready() {
                return Poll::Ready(Err(ErrorKind::Timeout.into()));
            }
        }
        Poll::Pending
    })
    .await
}

/// Dispatches queued notifications, resolving if the link is lost.
fn poll_events(
    events: &mut LinkEventReceiver,
    router: &mut NotificationRouter,
    cx: &mut Context<'_>,
) -> Poll<Error> {
    for _ in 0..EVENT_BUDGET {
        match events.poll_next(cx) {
            Poll::Ready(event) => {
                if let Some(err) = handle_event(event, router) {
                    return Poll::Ready(err);
                }
            }
            Poll::Pending => return Poll::Pending,
        }
    }
    cx.waker().wake_by_ref();
    Poll::Pending
}

/// Dispatches one event from the link stream, or returns the error for a lost link. `None`
/// means the stream has ended.
fn handle_event(event: Option<LinkEvent>, router: &mut NotificationRouter) -> Option<Error> {
    match event {
        Some(LinkEvent::Notification { uuid, value }) => {
            router.dispatch(&uuid, &value);
            None
        }
        Some(LinkEvent::Disconnected { reason }) => Some(match reason {
            Some(reason) => Error::new(ErrorKind::UnexpectedDisconnect, reason.to_string()),
            None => ErrorKind::UnexpectedDisconnect.into(),
        }),
        None => Some(Error::new(
            ErrorKind::UnexpectedDisconnect,
            "transport dropped the link",
        )),
    }
}

async fn with_timeout<F, R>(timeout: Option<Duration>, fut: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    match timeout {
        Some(duration) => {
            fut.or(async {
                Timer::after(duration).await;
                Err(ErrorKind::Timeout.into())
            })
            .await
        }
        None => fut.await,
    }
}
