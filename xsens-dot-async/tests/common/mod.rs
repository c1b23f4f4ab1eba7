#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};

use btuuid::BluetoothUuid;
use futures_lite::future;
use tracing::metadata::LevelFilter;
use xsens_dot_async::{CharacteristicId, Codec, DeviceControl, Error, LinkEvents, Transport};

pub const ADDRESS: &str = "D4:22:CD:00:01:02";

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{EnvFilter, fmt};

        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
}

/// A transport call, as recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    Read(CharacteristicId),
    Write(CharacteristicId, Vec<u8>),
    Subscribe(CharacteristicId),
    Unsubscribe(CharacteristicId),
    Disconnect,
}

/// Which transport requests never complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Connect,
    Read,
    Write,
    Subscribe,
    Unsubscribe,
}

#[derive(Default)]
struct State {
    reachable: bool,
    values: HashMap<CharacteristicId, Vec<u8>>,
    calls: Vec<Call>,
    events: Option<LinkEvents>,
    hang: HashSet<Op>,
    reject_writes: bool,
    fail_subscribe: bool,
    fail_unsubscribe: bool,
}

/// An in-memory device. Clones share the same state, so a test can keep one to drive
/// notifications while a session owns another.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

pub struct MockLink;

impl MockTransport {
    /// A reachable device with a default device control register.
    pub fn new() -> Self {
        let mut device_tag = [0; 16];
        device_tag[..9].copy_from_slice(b"Xsens DOT");
        let control = DeviceControl {
            device_tag_len: 9,
            device_tag,
            output_rate: 60,
            ..Default::default()
        };

        let mock = MockTransport {
            state: Arc::new(Mutex::new(State {
                reachable: true,
                ..Default::default()
            })),
        };
        mock.set_value(control.encode(), CharacteristicId::DeviceControl);
        mock.set_value(vec![80, 0], CharacteristicId::Battery);
        mock
    }

    pub fn unreachable() -> Self {
        let mock = Self::new();
        mock.state.lock().unwrap().reachable = false;
        mock
    }

    pub fn set_value(&self, value: Vec<u8>, id: CharacteristicId) {
        self.state.lock().unwrap().values.insert(id, value);
    }

    pub fn value(&self, id: CharacteristicId) -> Option<Vec<u8>> {
        self.state.lock().unwrap().values.get(&id).cloned()
    }

    pub fn hang(&self, op: Op) {
        self.state.lock().unwrap().hang.insert(op);
    }

    /// Lets requests of `op` issued from now on complete again.
    pub fn resume(&self, op: Op) {
        self.state.lock().unwrap().hang.remove(&op);
    }

    pub fn reject_writes(&self) {
        self.state.lock().unwrap().reject_writes = true;
    }

    pub fn fail_subscribe(&self) {
        self.state.lock().unwrap().fail_subscribe = true;
    }

    pub fn fail_unsubscribe(&self) {
        self.state.lock().unwrap().fail_unsubscribe = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// The writes made so far to `id`.
    pub fn writes(&self, id: CharacteristicId) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(written, value) if written == id => Some(value),
                _ => None,
            })
            .collect()
    }

    fn events(&self) -> LinkEvents {
        self.state
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("no link has been established")
    }

    pub fn notify(&self, id: CharacteristicId, value: Vec<u8>) {
        self.notify_uuid(id.uuid(), value);
    }

    pub fn notify_uuid(&self, uuid: BluetoothUuid, value: Vec<u8>) {
        self.events().notify(uuid, value);
    }

    /// Simulates the radio link dropping.
    pub fn drop_link(&self) {
        self.events()
            .disconnected(Some(Error::transport("supervision timeout")));
    }

    fn record(&self, call: Call) -> Flags {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        Flags {
            reachable: state.reachable,
            reject_writes: state.reject_writes,
            fail_subscribe: state.fail_subscribe,
            fail_unsubscribe: state.fail_unsubscribe,
        }
    }

    fn hangs(&self, op: Op) -> bool {
        self.state.lock().unwrap().hang.contains(&op)
    }
}

#[derive(Clone, Copy)]
struct Flags {
    reachable: bool,
    reject_writes: bool,
    fail_subscribe: bool,
    fail_unsubscribe: bool,
}

impl Transport for MockTransport {
    type Link = MockLink;

    fn connect(
        &self,
        address: &str,
        events: LinkEvents,
    ) -> impl Future<Output = xsens_dot_async::Result<MockLink>> + Send {
        let reachable = self.record(Call::Connect(address.to_string())).reachable;
        let hang = self.hangs(Op::Connect);
        if reachable && !hang {
            self.state.lock().unwrap().events = Some(events);
        }
        async move {
            if hang {
                future::pending::<()>().await;
            }
            if reachable {
                Ok(MockLink)
            } else {
                Err(Error::transport("device not found"))
            }
        }
    }

    fn read(
        &self,
        _link: &MockLink,
        id: CharacteristicId,
    ) -> impl Future<Output = xsens_dot_async::Result<Vec<u8>>> + Send {
        self.record(Call::Read(id));
        let hang = self.hangs(Op::Read);
        let value = self.value(id);
        async move {
            if hang {
                future::pending::<()>().await;
            }
            value.ok_or_else(|| Error::transport("attribute not found"))
        }
    }

    fn write(
        &self,
        _link: &MockLink,
        id: CharacteristicId,
        value: Vec<u8>,
    ) -> impl Future<Output = xsens_dot_async::Result<()>> + Send {
        let flags = self.record(Call::Write(id, value.clone()));
        let hang = self.hangs(Op::Write);
        if !flags.reject_writes && !hang {
            self.set_value(value, id);
        }
        async move {
            if hang {
                future::pending::<()>().await;
            }
            if flags.reject_writes {
                Err(Error::rejected("value out of range"))
            } else {
                Ok(())
            }
        }
    }

    fn subscribe(
        &self,
        _link: &MockLink,
        id: CharacteristicId,
    ) -> impl Future<Output = xsens_dot_async::Result<()>> + Send {
        let flags = self.record(Call::Subscribe(id));
        let hang = self.hangs(Op::Subscribe);
        async move {
            if hang {
                future::pending::<()>().await;
            }
            if flags.fail_subscribe {
                Err(Error::transport("CCCD write failed"))
            } else {
                Ok(())
            }
        }
    }

    fn unsubscribe(
        &self,
        _link: &MockLink,
        id: CharacteristicId,
    ) -> impl Future<Output = xsens_dot_async::Result<()>> + Send {
        let flags = self.record(Call::Unsubscribe(id));
        let hang = self.hangs(Op::Unsubscribe);
        async move {
            if hang {
                future::pending::<()>().await;
            }
            if flags.fail_unsubscribe {
                Err(Error::transport("CCCD write failed"))
            } else {
                Ok(())
            }
        }
    }

    fn disconnect(&self, _link: MockLink) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Disconnect);
        state.events = None;
    }
}
