//! The boundary between a session and the Bluetooth stack that carries it.

use btuuid::BluetoothUuid;
use futures_channel::mpsc;
use xsens_dot::CharacteristicId;

use crate::error::{Error, Result};

/// Raw link primitives a [`Session`][crate::Session] is built on.
///
/// Implementations wrap a concrete Bluetooth stack. Notifications and link loss are not returned
/// from these methods; they are pushed through the [`LinkEvents`] handle passed to
/// [`connect()`][Self::connect], in the order the stack delivers them.
pub trait Transport: Send + Sync + 'static {
    /// A handle to one established link.
    type Link: Send + Sync + 'static;

    /// Establishes a link to the device at `address`.
    fn connect(
        &self,
        address: &str,
        events: LinkEvents,
    ) -> impl Future<Output = Result<Self::Link>> + Send;

    fn read(
        &self,
        link: &Self::Link,
        id: CharacteristicId,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Writes `value` to a characteristic.
    ///
    /// A write the device refuses should fail with [`ErrorKind::RejectedByDevice`][crate::error::ErrorKind::RejectedByDevice].
    fn write(
        &self,
        link: &Self::Link,
        id: CharacteristicId,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Enables notifications for a characteristic.
    fn subscribe(
        &self,
        link: &Self::Link,
        id: CharacteristicId,
    ) -> impl Future<Output = Result<()>> + Send;

    fn unsubscribe(
        &self,
        link: &Self::Link,
        id: CharacteristicId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Releases the link.
    ///
    /// This is called exactly once per established link, including after the transport has
    /// reported the link as lost, and may be called from `Drop`.
    fn disconnect(&self, link: Self::Link);
}

/// Events a transport reports for one link.
#[derive(Debug)]
pub(crate) enum LinkEvent {
    Notification {
        uuid: BluetoothUuid,
        value: Vec<u8>,
    },
    Disconnected {
        reason: Option<Error>,
    },
}

pub(crate) type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// The sending side of a link's event stream, handed to [`Transport::connect()`].
///
/// `LinkEvents` can be cloned and sent to whatever thread the Bluetooth stack calls back on.
/// Dropping every clone is treated as a disconnect.
#[derive(Debug, Clone)]
pub struct LinkEvents {
    sender: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkEvents {
    pub(crate) fn channel() -> (LinkEvents, LinkEventReceiver) {
        let (sender, receiver) = mpsc::unbounded();
        (LinkEvents { sender }, receiver)
    }

    /// Reports a notification received on the characteristic with the given UUID.
    ///
    /// Returns `false` if the session no longer listens to this link.
    pub fn notify(&self, uuid: BluetoothUuid, value: Vec<u8>) -> bool {
        self.sender
            .unbounded_send(LinkEvent::Notification { uuid, value })
            .is_ok()
    }

    /// Reports that the link dropped without the session asking for it.
    pub fn disconnected(&self, reason: Option<Error>) {
        let _ = self
            .sender
            .unbounded_send(LinkEvent::Disconnected { reason });
    }

    /// Returns `true` if the session no longer listens to this link.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
