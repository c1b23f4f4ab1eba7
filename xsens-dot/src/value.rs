use crate::battery::Battery;
use crate::characteristic::CharacteristicId;
use crate::codec::Codec;
use crate::device::{DeviceControl, DeviceInfo, DeviceReport};
use crate::error::Result;
use crate::measurement::{LongPayload, MeasurementControl, MediumPayload, ShortPayload};
use crate::orientation::{OrientationResetControl, OrientationResetStatus};

/// A decoded value of any characteristic.
///
/// The set of variants is closed: there is exactly one per [`CharacteristicId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CharacteristicValue {
    DeviceInfo(DeviceInfo),
    DeviceControl(DeviceControl),
    DeviceReport(DeviceReport),
    MeasurementControl(MeasurementControl),
    LongPayload(LongPayload),
    MediumPayload(MediumPayload),
    ShortPayload(ShortPayload),
    OrientationResetControl(OrientationResetControl),
    OrientationResetStatus(OrientationResetStatus),
    Battery(Battery),
}

impl CharacteristicValue {
    /// Decodes `bytes` using the codec of the characteristic `id`.
    pub fn decode(id: CharacteristicId, bytes: &[u8]) -> Result<Self> {
        Ok(match id {
            CharacteristicId::DeviceInfo => Self::DeviceInfo(Codec::decode(bytes)?),
            CharacteristicId::DeviceControl => Self::DeviceControl(Codec::decode(bytes)?),
            CharacteristicId::DeviceReport => Self::DeviceReport(Codec::decode(bytes)?),
            CharacteristicId::MeasurementControl => {
                Self::MeasurementControl(Codec::decode(bytes)?)
            }
            CharacteristicId::LongPayload => Self::LongPayload(Codec::decode(bytes)?),
            CharacteristicId::MediumPayload => Self::MediumPayload(Codec::decode(bytes)?),
            CharacteristicId::ShortPayload => Self::ShortPayload(Codec::decode(bytes)?),
            CharacteristicId::OrientationResetControl => {
                Self::OrientationResetControl(Codec::decode(bytes)?)
            }
            CharacteristicId::OrientationResetStatus => {
                Self::OrientationResetStatus(Codec::decode(bytes)?)
            }
            CharacteristicId::Battery => Self::Battery(Codec::decode(bytes)?),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::DeviceInfo(v) => v.encode(),
            Self::DeviceControl(v) => v.encode(),
            Self::DeviceReport(v) => v.encode(),
            Self::MeasurementControl(v) => v.encode(),
            Self::LongPayload(v) => v.encode(),
            Self::MediumPayload(v) => v.encode(),
            Self::ShortPayload(v) => v.encode(),
            Self::OrientationResetControl(v) => v.encode(),
            Self::OrientationResetStatus(v) => v.encode(),
            Self::Battery(v) => v.encode(),
        }
    }

    /// The characteristic this value belongs to.
    pub fn characteristic(&self) -> CharacteristicId {
        match self {
            Self::DeviceInfo(_) => CharacteristicId::DeviceInfo,
            Self::DeviceControl(_) => CharacteristicId::DeviceControl,
            Self::DeviceReport(_) => CharacteristicId::DeviceReport,
            Self::MeasurementControl(_) => CharacteristicId::MeasurementControl,
            Self::LongPayload(_) => CharacteristicId::LongPayload,
            Self::MediumPayload(_) => CharacteristicId::MediumPayload,
            Self::ShortPayload(_) => CharacteristicId::ShortPayload,
            Self::OrientationResetControl(_) => CharacteristicId::OrientationResetControl,
            Self::OrientationResetStatus(_) => CharacteristicId::OrientationResetStatus,
            Self::Battery(_) => CharacteristicId::Battery,
        }
    }
}

macro_rules! impl_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for CharacteristicValue {
                fn from(value: $variant) -> Self {
                    CharacteristicValue::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    DeviceInfo,
    DeviceControl,
    DeviceReport,
    MeasurementControl,
    LongPayload,
    MediumPayload,
    ShortPayload,
    OrientationResetControl,
    OrientationResetStatus,
    Battery,
);
