//! Demultiplexes raw notifications to per-characteristic consumers.

use std::collections::HashMap;

use btuuid::BluetoothUuid;
use tracing::{trace, warn};
use xsens_dot::{CharacteristicId, CharacteristicValue, Codec, DecodeError};

type RawConsumer = Box<dyn FnMut(&[u8]) -> Result<(), DecodeError> + Send>;
type DecodeObserver = Box<dyn FnMut(CharacteristicId, &DecodeError) + Send>;

/// A registered notification callback, together with the codec that decodes its input.
pub struct Consumer {
    inner: RawConsumer,
}

impl Consumer {
    /// A consumer of decoded `C` values.
    pub fn typed<C, F>(mut f: F) -> Self
    where
        C: Codec + 'static,
        F: FnMut(C) + Send + 'static,
    {
        Consumer {
            inner: Box::new(move |bytes| {
                f(C::decode(bytes)?);
                Ok(())
            }),
        }
    }

    /// A consumer of [`CharacteristicValue`]s decoded with the codec of `id`.
    pub fn value<F>(id: CharacteristicId, mut f: F) -> Self
    where
        F: FnMut(CharacteristicValue) + Send + 'static,
    {
        Consumer {
            inner: Box::new(move |bytes| {
                f(CharacteristicValue::decode(id, bytes)?);
                Ok(())
            }),
        }
    }

    fn call(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        (self.inner)(bytes)
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").finish_non_exhaustive()
    }
}

/// What [`NotificationRouter::dispatch()`] did with a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The consumer for this characteristic was called.
    Delivered(CharacteristicId),
    /// No consumer is registered for this UUID; the notification was dropped.
    Unrouted,
    /// The bytes did not decode; the consumer was not called.
    Failed(CharacteristicId, DecodeError),
}

/// Maps characteristics to the consumer of their notifications.
///
/// At most one consumer is registered per characteristic. Notifications are handled one at a
/// time, in the order they are dispatched.
#[derive(Default)]
pub struct NotificationRouter {
    routes: HashMap<CharacteristicId, Consumer>,
    on_decode_error: Option<DecodeObserver>,
}

impl std::fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `consumer` for `id`, returning the consumer it replaces.
    pub fn insert(&mut self, id: CharacteristicId, consumer: Consumer) -> Option<Consumer> {
        self.routes.insert(id, consumer)
    }

    pub fn remove(&mut self, id: CharacteristicId) -> Option<Consumer> {
        self.routes.remove(&id)
    }

    pub fn contains(&self, id: CharacteristicId) -> bool {
        self.routes.contains_key(&id)
    }

    /// The characteristics with a registered consumer, in a stable order.
    pub fn ids(&self) -> Vec<CharacteristicId> {
        let mut ids: Vec<_> = self.routes.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    /// Sets a callback that is told about every notification that fails to decode.
    pub fn on_decode_error<F>(&mut self, f: F)
    where
        F: FnMut(CharacteristicId, &DecodeError) + Send + 'static,
    {
        self.on_decode_error = Some(Box::new(f));
    }

    /// Delivers one notification to the consumer registered for `uuid`.
    ///
    /// Decode failures are logged and reported to the decode observer; they never propagate.
    pub fn dispatch(&mut self, uuid: &BluetoothUuid, value: &[u8]) -> Dispatch {
        let Some(id) = CharacteristicId::from_uuid(uuid) else {
            trace!(?uuid, len = value.len(), "dropping notification for unknown characteristic");
            return Dispatch::Unrouted;
        };
        let Some(consumer) = self.routes.get_mut(&id) else {
            trace!(%id, len = value.len(), "dropping notification without consumer");
            return Dispatch::Unrouted;
        };

        match consumer.call(value) {
            Ok(()) => Dispatch::Delivered(id),
            Err(err) => {
                warn!(%id, %err, "failed to decode notification");
                if let Some(observer) = self.on_decode_error.as_mut() {
                    observer(id, &err);
                }
                Dispatch::Failed(id, err)
            }
        }
    }
}
