//! An asynchronous session driver for the Xsens DOT wearable motion sensor.
//!
//! A [`Session`] owns one link to one device. It is generic over a [`Transport`], which supplies
//! the raw Bluetooth primitives (connect, read, write, subscribe); this crate adds the lifecycle,
//! typed characteristic access through the `xsens-dot` codecs, and notification routing.
//!
//! ```no_run
//! # use xsens_dot_async::{Session, Transport, MediumPayload, PayloadMode};
//! # async fn demo<T: Transport>(transport: T) -> xsens_dot_async::Result<()> {
//! let mut session = Session::new(transport, "D4:22:CD:00:01:02");
//! session.open().await?;
//! session.set_output_rate(30).await?;
//! session
//!     .subscribe(|frame: MediumPayload| println!("t = {}", frame.0.timestamp))
//!     .await?;
//! session.start_measurement(PayloadMode::CompleteQuaternion).await?;
//! let reason = session.pump().await;
//! println!("stopped: {reason}");
//! # Ok(())
//! # }
//! ```
//!
//! For callers without an async runtime, [`blocking::BlockingSession`] drives the same session
//! on the calling thread.

pub mod blocking;
mod device;
pub mod error;
mod router;
mod session;
mod transport;
mod util;

pub use device::*;
pub use error::{Error, ErrorKind, Result};
pub use router::*;
pub use session::*;
pub use transport::*;
pub use xsens_dot::*;
