//! Measurement service characteristics and payload frame parsing.

use crate::characteristic::CharacteristicId;
use crate::codec::{Codec, Reader};
use crate::error::Result;

/// The `type` byte of a [`MeasurementControl`] write.
pub const MEASUREMENT_TYPE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementAction {
    Stop,
    Start,
    /// A code this crate does not know. Only produced by decoding.
    Unrecognized(u8),
}

impl From<u8> for MeasurementAction {
    fn from(code: u8) -> Self {
        match code {
            0 => MeasurementAction::Stop,
            1 => MeasurementAction::Start,
            other => MeasurementAction::Unrecognized(other),
        }
    }
}

impl From<MeasurementAction> for u8 {
    fn from(action: MeasurementAction) -> Self {
        match action {
            MeasurementAction::Stop => 0,
            MeasurementAction::Start => 1,
            MeasurementAction::Unrecognized(code) => code,
        }
    }
}

/// Which quantities the device streams while measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadMode {
    HighFidelityWithMag,
    ExtendedQuaternion,
    CompleteQuaternion,
    ExtendedEuler,
    CompleteEuler,
    HighFidelity,
    DeltaQuantitiesWithMag,
    DeltaQuantities,
    RateQuantitiesWithMag,
    RateQuantities,
    CustomMode1,
    CustomMode2,
    CustomMode3,
    OrientationEuler,
    OrientationQuaternion,
    FreeAcceleration,
    CustomMode4,
    CustomMode5,
    /// A code this crate does not know. Only produced by decoding.
    Unrecognized(u8),
}

impl PayloadMode {
    /// The payload characteristic frames of this mode are streamed on.
    pub fn characteristic(self) -> CharacteristicId {
        match self {
            PayloadMode::OrientationEuler
            | PayloadMode::OrientationQuaternion
            | PayloadMode::FreeAcceleration => CharacteristicId::ShortPayload,
            PayloadMode::CustomMode4 | PayloadMode::CustomMode5 => CharacteristicId::LongPayload,
            _ => CharacteristicId::MediumPayload,
        }
    }
}

impl From<u8> for PayloadMode {
    fn from(code: u8) -> Self {
        match code {
            1 => PayloadMode::HighFidelityWithMag,
            2 => PayloadMode::ExtendedQuaternion,
            3 => PayloadMode::CompleteQuaternion,
            4 => PayloadMode::ExtendedEuler,
            5 => PayloadMode::CompleteEuler,
            6 => PayloadMode::HighFidelity,
            7 => PayloadMode::DeltaQuantitiesWithMag,
            8 => PayloadMode::DeltaQuantities,
            9 => PayloadMode::RateQuantitiesWithMag,
            10 => PayloadMode::RateQuantities,
            11 => PayloadMode::CustomMode1,
            12 => PayloadMode::CustomMode2,
            13 => PayloadMode::CustomMode3,
            16 => PayloadMode::OrientationEuler,
            17 => PayloadMode::OrientationQuaternion,
            18 => PayloadMode::FreeAcceleration,
            22 => PayloadMode::CustomMode4,
            23 => PayloadMode::CustomMode5,
            other => PayloadMode::Unrecognized(other),
        }
    }
}

impl From<PayloadMode> for u8 {
    fn from(mode: PayloadMode) -> Self {
        match mode {
            PayloadMode::HighFidelityWithMag => 1,
            PayloadMode::ExtendedQuaternion => 2,
            PayloadMode::CompleteQuaternion => 3,
            PayloadMode::ExtendedEuler => 4,
            PayloadMode::CompleteEuler => 5,
            PayloadMode::HighFidelity => 6,
            PayloadMode::DeltaQuantitiesWithMag => 7,
            PayloadMode::DeltaQuantities => 8,
            PayloadMode::RateQuantitiesWithMag => 9,
            PayloadMode::RateQuantities => 10,
            PayloadMode::CustomMode1 => 11,
            PayloadMode::CustomMode2 => 12,
            PayloadMode::CustomMode3 => 13,
            PayloadMode::OrientationEuler => 16,
            PayloadMode::OrientationQuaternion => 17,
            PayloadMode::FreeAcceleration => 18,
            PayloadMode::CustomMode4 => 22,
            PayloadMode::CustomMode5 => 23,
            PayloadMode::Unrecognized(code) => code,
        }
    }
}

/// Starts or stops streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasurementControl {
    pub measurement_type: u8,
    pub action: MeasurementAction,
    pub payload_mode: PayloadMode,
}

impl MeasurementControl {
    pub fn start(mode: PayloadMode) -> Self {
        Self {
            measurement_type: MEASUREMENT_TYPE,
            action: MeasurementAction::Start,
            payload_mode: mode,
        }
    }

    pub fn stop(mode: PayloadMode) -> Self {
        Self {
            measurement_type: MEASUREMENT_TYPE,
            action: MeasurementAction::Stop,
            payload_mode: mode,
        }
    }
}

impl Codec for MeasurementControl {
    const CHARACTERISTIC: CharacteristicId = CharacteristicId::MeasurementControl;

    fn encode(&self) -> Vec<u8> {
        vec![
            self.measurement_type,
            self.action.into(),
            self.payload_mode.into(),
        ]
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::fixed(bytes, Self::CHARACTERISTIC)?;
        Ok(MeasurementControl {
            measurement_type: r.u8()?,
            action: r.u8()?.into(),
            payload_mode: r.u8()?.into(),
        })
    }
}

/// A raw measurement frame: a device timestamp and a mode-dependent body.
///
/// The frame does not say which [`PayloadMode`] produced it; pass the mode the
/// measurement was started with to [`measurement()`][Self::measurement].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PayloadFrame {
    /// Device time in microseconds.
    pub timestamp: u32,
    pub data: Vec<u8>,
}

impl PayloadFrame {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.data.len());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    fn decode(bytes: &[u8], context: &'static str) -> Result<Self> {
        let mut r = Reader::new(bytes, context);
        Ok(PayloadFrame {
            timestamp: r.u32()?,
            data: r.rest().to_vec(),
        })
    }

    /// Parses the body as a frame of the given mode.
    pub fn measurement(&self, mode: PayloadMode) -> Result<Measurement> {
        let mut r = Reader::new(&self.data, "measurement");
        let measurement = match mode {
            PayloadMode::ExtendedQuaternion => Measurement::ExtendedQuaternion {
                orientation: Quaternion::read(&mut r)?,
                free_acceleration: Vector3::read(&mut r)?,
                status: r.u16()?,
                clip_count_acc: r.u8()?,
                clip_count_gyr: r.u8()?,
            },
            PayloadMode::CompleteQuaternion => Measurement::CompleteQuaternion {
                orientation: Quaternion::read(&mut r)?,
                free_acceleration: Vector3::read(&mut r)?,
            },
            PayloadMode::ExtendedEuler => Measurement::ExtendedEuler {
                euler: Vector3::read(&mut r)?,
                free_acceleration: Vector3::read(&mut r)?,
                status: r.u16()?,
                clip_count_acc: r.u8()?,
                clip_count_gyr: r.u8()?,
            },
            PayloadMode::CompleteEuler => Measurement::CompleteEuler {
                euler: Vector3::read(&mut r)?,
                free_acceleration: Vector3::read(&mut r)?,
            },
            PayloadMode::DeltaQuantitiesWithMag => Measurement::DeltaQuantitiesWithMag {
                dq: Quaternion::read(&mut r)?,
                dv: Vector3::read(&mut r)?,
                magnetic_field: MagneticField::read(&mut r)?,
            },
            PayloadMode::DeltaQuantities => Measurement::DeltaQuantities {
                dq: Quaternion::read(&mut r)?,
                dv: Vector3::read(&mut r)?,
            },
            PayloadMode::RateQuantitiesWithMag => Measurement::RateQuantitiesWithMag {
                acceleration: Vector3::read(&mut r)?,
                angular_velocity: Vector3::read(&mut r)?,
                magnetic_field: MagneticField::read(&mut r)?,
            },
            PayloadMode::RateQuantities => Measurement::RateQuantities {
                acceleration: Vector3::read(&mut r)?,
                angular_velocity: Vector3::read(&mut r)?,
            },
            PayloadMode::CustomMode1 => Measurement::CustomMode1 {
                euler: Vector3::read(&mut r)?,
                free_acceleration: Vector3::read(&mut r)?,
                angular_velocity: Vector3::read(&mut r)?,
            },
            PayloadMode::CustomMode2 => Measurement::CustomMode2 {
                euler: Vector3::read(&mut r)?,
                free_acceleration: Vector3::read(&mut r)?,
                magnetic_field: MagneticField::read(&mut r)?,
            },
            PayloadMode::CustomMode3 => Measurement::CustomMode3 {
                orientation: Quaternion::read(&mut r)?,
                angular_velocity: Vector3::read(&mut r)?,
            },
            PayloadMode::OrientationEuler => Measurement::OrientationEuler {
                euler: Vector3::read(&mut r)?,
            },
            PayloadMode::OrientationQuaternion => Measurement::OrientationQuaternion {
                orientation: Quaternion::read(&mut r)?,
            },
            PayloadMode::FreeAcceleration => Measurement::FreeAcceleration {
                free_acceleration: Vector3::read(&mut r)?,
            },
            PayloadMode::HighFidelityWithMag
            | PayloadMode::HighFidelity
            | PayloadMode::CustomMode4
            | PayloadMode::CustomMode5
            | PayloadMode::Unrecognized(_) => Measurement::Opaque {
                mode,
                data: self.data.clone(),
            },
        };
        Ok(measurement)
    }
}

macro_rules! payload_characteristic {
    ($(#[$meta:meta])* $name:ident, $id:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub PayloadFrame);

        impl Codec for $name {
            const CHARACTERISTIC: CharacteristicId = CharacteristicId::$id;

            fn encode(&self) -> Vec<u8> {
                self.0.encode()
            }

            fn decode(bytes: &[u8]) -> Result<Self> {
                PayloadFrame::decode(bytes, Self::CHARACTERISTIC.name()).map($name)
            }
        }
    };
}

payload_characteristic!(
    /// A frame from the long payload characteristic.
    LongPayload,
    LongPayload
);
payload_characteristic!(
    /// A frame from the medium payload characteristic.
    MediumPayload,
    MediumPayload
);
payload_characteristic!(
    /// A frame from the short payload characteristic.
    ShortPayload,
    ShortPayload
);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    fn read(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Quaternion {
            w: r.f32()?,
            x: r.f32()?,
            y: r.f32()?,
            z: r.f32()?,
        })
    }
}

/// Three `f32` components: Euler angles in degrees, or acceleration/velocity vectors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    fn read(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Vector3 {
            x: r.f32()?,
            y: r.f32()?,
            z: r.f32()?,
        })
    }
}

/// Magnetic field as transmitted: fixed point with 12 fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MagneticField {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl MagneticField {
    const SCALE: f32 = 1.0 / 4096.0;

    fn read(r: &mut Reader<'_>) -> Result<Self> {
        Ok(MagneticField {
            x: r.i16()?,
            y: r.i16()?,
            z: r.i16()?,
        })
    }

    /// The field in arbitrary units.
    pub fn to_au(self) -> Vector3 {
        Vector3 {
            x: f32::from(self.x) * Self::SCALE,
            y: f32::from(self.y) * Self::SCALE,
            z: f32::from(self.z) * Self::SCALE,
        }
    }
}

/// A parsed measurement frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    ExtendedQuaternion {
        orientation: Quaternion,
        free_acceleration: Vector3,
        status: u16,
        clip_count_acc: u8,
        clip_count_gyr: u8,
    },
    CompleteQuaternion {
        orientation: Quaternion,
        free_acceleration: Vector3,
    },
    ExtendedEuler {
        euler: Vector3,
        free_acceleration: Vector3,
        status: u16,
        clip_count_acc: u8,
        clip_count_gyr: u8,
    },
    CompleteEuler {
        euler: Vector3,
        free_acceleration: Vector3,
    },
    DeltaQuantitiesWithMag {
        dq: Quaternion,
        dv: Vector3,
        magnetic_field: MagneticField,
    },
    DeltaQuantities {
        dq: Quaternion,
        dv: Vector3,
    },
    RateQuantitiesWithMag {
        acceleration: Vector3,
        angular_velocity: Vector3,
        magnetic_field: MagneticField,
    },
    RateQuantities {
        acceleration: Vector3,
        angular_velocity: Vector3,
    },
    CustomMode1 {
        euler: Vector3,
        free_acceleration: Vector3,
        angular_velocity: Vector3,
    },
    CustomMode2 {
        euler: Vector3,
        free_acceleration: Vector3,
        magnetic_field: MagneticField,
    },
    CustomMode3 {
        orientation: Quaternion,
        angular_velocity: Vector3,
    },
    OrientationEuler {
        euler: Vector3,
    },
    OrientationQuaternion {
        orientation: Quaternion,
    },
    FreeAcceleration {
        free_acceleration: Vector3,
    },
    /// A mode whose body this crate does not interpret.
    Opaque { mode: PayloadMode, data: Vec<u8> },
}
