//! Streams orientation from a simulated sensor.
//!
//! Run with `RUST_LOG=debug` to see the session lifecycle.

use std::collections::HashMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::info;
use tracing::metadata::LevelFilter;
use xsens_dot_async::{
    Battery, CharacteristicId, Codec, DeviceControl, DeviceInfo, LinkEvents, MeasurementAction,
    Measurement, MeasurementControl, PayloadFrame, PayloadMode, Session, ShortPayload, Transport,
};

const MODE: PayloadMode = PayloadMode::OrientationQuaternion;

#[derive(Default)]
struct Device {
    values: HashMap<CharacteristicId, Vec<u8>>,
    events: Option<LinkEvents>,
}

/// A sensor that answers reads from memory and streams a slowly turning orientation.
#[derive(Clone, Default)]
struct SimulatedDot {
    device: Arc<Mutex<Device>>,
    streaming: Arc<AtomicBool>,
}

impl SimulatedDot {
    fn new() -> Self {
        let sim = SimulatedDot::default();
        let info = DeviceInfo {
            address: [0xd4, 0x22, 0xcd, 0x00, 0x00, 0x01],
            version_major: 2,
            serial_number: 1_234_567,
            short_product_code: *b"XS-T01",
            ..Default::default()
        };
        let mut device_tag = [0; 16];
        device_tag[..9].copy_from_slice(b"Xsens DOT");
        let control = DeviceControl {
            device_tag_len: 9,
            device_tag,
            output_rate: 60,
            ..Default::default()
        };

        let mut device = sim.device.lock().unwrap();
        device.values.insert(CharacteristicId::DeviceInfo, info.encode());
        device.values.insert(CharacteristicId::DeviceControl, control.encode());
        device.values.insert(CharacteristicId::Battery, vec![73, 1]);
        drop(device);
        sim
    }

    fn start_streaming(&self, events: LinkEvents, rate: u16) {
        if self.streaming.swap(true, Ordering::AcqRel) {
            return;
        }
        let streaming = self.streaming.clone();
        let period = Duration::from_secs(1) / u32::from(rate.max(1));
        thread::spawn(move || {
            let mut timestamp = 0u32;
            let mut angle = 0f32;
            while streaming.load(Ordering::Acquire) {
                let (sin, cos) = (angle / 2.0).sin_cos();
                let mut data = Vec::with_capacity(16);
                for component in [cos, 0.0, 0.0, sin] {
                    data.extend_from_slice(&component.to_le_bytes());
                }
                let frame = ShortPayload(PayloadFrame { timestamp, data });
                if !events.notify(CharacteristicId::ShortPayload.uuid(), frame.encode()) {
                    break;
                }
                timestamp = timestamp.wrapping_add(period.as_micros() as u32);
                angle += 0.05;
                thread::sleep(period);
            }
        });
    }
}

impl Transport for SimulatedDot {
    type Link = ();

    fn connect(
        &self,
        _address: &str,
        events: LinkEvents,
    ) -> impl Future<Output = xsens_dot_async::Result<()>> + Send {
        self.device.lock().unwrap().events = Some(events);
        async { Ok(()) }
    }

    fn read(
        &self,
        _link: &(),
        id: CharacteristicId,
    ) -> impl Future<Output = xsens_dot_async::Result<Vec<u8>>> + Send {
        let value = self.device.lock().unwrap().values.get(&id).cloned();
        async move { value.ok_or_else(|| xsens_dot_async::Error::transport("attribute not found")) }
    }

    fn write(
        &self,
        _link: &(),
        id: CharacteristicId,
        value: Vec<u8>,
    ) -> impl Future<Output = xsens_dot_async::Result<()>> + Send {
        let result = (|| -> xsens_dot_async::Result<()> {
            if id == CharacteristicId::MeasurementControl {
                let control = MeasurementControl::decode(&value)?;
                match control.action {
                    MeasurementAction::Start => {
                        let device = self.device.lock().unwrap();
                        let rate = device
                            .values
                            .get(&CharacteristicId::DeviceControl)
                            .and_then(|bytes| DeviceControl::decode(bytes).ok())
                            .map_or(60, |control| control.output_rate);
                        if let Some(events) = device.events.clone() {
                            self.start_streaming(events, rate);
                        }
                    }
                    _ => self.streaming.store(false, Ordering::Release),
                }
            }
            self.device.lock().unwrap().values.insert(id, value);
            Ok(())
        })();
        async move { result }
    }

    fn subscribe(
        &self,
        _link: &(),
        _id: CharacteristicId,
    ) -> impl Future<Output = xsens_dot_async::Result<()>> + Send {
        async { Ok(()) }
    }

    fn unsubscribe(
        &self,
        _link: &(),
        _id: CharacteristicId,
    ) -> impl Future<Output = xsens_dot_async::Result<()>> + Send {
        async { Ok(()) }
    }

    fn disconnect(&self, _link: ()) {
        self.streaming.store(false, Ordering::Release);
        self.device.lock().unwrap().events = None;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let mut session = Session::new(SimulatedDot::new(), "D4:22:CD:00:00:01");
    session.open().await?;

    let info = session.device_info().await?;
    let battery: Battery = session.read().await?;
    info!(
        "{} serial {} firmware {}.{}.{}, battery at {}%",
        info.product_code(),
        info.serial_number,
        info.version_major,
        info.version_minor,
        info.version_revision,
        battery.level
    );

    session.set_output_rate(20).await?;
    session.set_device_tag("demo").await?;
    info!("tag is now {:?}", session.device_control().await?.tag());

    session
        .subscribe(|frame: ShortPayload| match frame.0.measurement(MODE) {
            Ok(Measurement::OrientationQuaternion { orientation }) => {
                info!(timestamp = frame.0.timestamp, ?orientation, "frame");
            }
            Ok(other) => info!(?other, "unexpected frame"),
            Err(err) => info!(%err, "bad frame"),
        })
        .await?;
    session.start_measurement(MODE).await?;

    if let Ok(err) = tokio::time::timeout(Duration::from_secs(1), session.pump()).await {
        return Err(err.into());
    }

    session.stop_measurement(MODE).await?;
    session.close().await;
    Ok(())
}
