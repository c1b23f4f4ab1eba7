//! Binary codecs for the characteristics of the Xsens DOT wearable motion sensor.
//!
//! Every register the sensor exposes over Bluetooth Low Energy is described by a
//! [`CharacteristicId`] and has a value type implementing [`Codec`], which converts between the
//! typed value and the exact little-endian byte layout the firmware uses. This crate performs no
//! I/O; see the `xsens-dot-async` crate for a session that talks to a device.
//!
//! ```
//! use xsens_dot::{Codec, DeviceControl, VisitIndex};
//!
//! let control = DeviceControl {
//!     visit_index: VisitIndex::OUTPUT_RATE,
//!     output_rate: 10,
//!     ..Default::default()
//! };
//! let bytes = control.encode();
//! assert_eq!(bytes.len(), 32);
//! assert_eq!(DeviceControl::decode(&bytes).unwrap().output_rate, 10);
//! ```

mod battery;
mod characteristic;
mod codec;
mod device;
pub mod error;
mod measurement;
mod orientation;
mod value;

pub use battery::*;
pub use characteristic::*;
pub use codec::Codec;
pub use device::*;
pub use error::{DecodeError, DecodeErrorKind, Result};
pub use measurement::*;
pub use orientation::*;
pub use value::*;
