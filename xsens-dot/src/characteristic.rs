use std::fmt::Display;

use btuuid::BluetoothUuid;
use uuid::Uuid;

/// Base of every DOT UUID: `1517xxxx-4947-11E9-8646-D663BD873D93`.
const UUID_BASE: u128 = 0x15170000_4947_11e9_8646_d663bd873d93;

const fn dot_uuid(short: u16) -> u128 {
    UUID_BASE | ((short as u128) << 96)
}

/// One of the registers ("characteristics") exposed by a DOT sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CharacteristicId {
    /// Configuration service: top-level device information (read-only).
    DeviceInfo,
    /// Configuration service: identify, power, output rate and filter settings.
    DeviceControl,
    /// Configuration service: event reports such as button presses.
    DeviceReport,
    /// Measurement service: starts and stops streaming in a payload mode.
    MeasurementControl,
    /// Measurement service: long (up to 63 byte) measurement frames.
    LongPayload,
    /// Measurement service: medium (up to 40 byte) measurement frames.
    MediumPayload,
    /// Measurement service: short (up to 20 byte) measurement frames.
    ShortPayload,
    /// Measurement service: heading reset commands.
    OrientationResetControl,
    /// Measurement service: result of the last heading reset.
    OrientationResetStatus,
    /// Battery service: level and charging status.
    Battery,
}

impl CharacteristicId {
    pub const ALL: [CharacteristicId; 10] = [
        CharacteristicId::DeviceInfo,
        CharacteristicId::DeviceControl,
        CharacteristicId::DeviceReport,
        CharacteristicId::MeasurementControl,
        CharacteristicId::LongPayload,
        CharacteristicId::MediumPayload,
        CharacteristicId::ShortPayload,
        CharacteristicId::OrientationResetControl,
        CharacteristicId::OrientationResetStatus,
        CharacteristicId::Battery,
    ];

    fn short_uuid(self) -> u16 {
        match self {
            CharacteristicId::DeviceInfo => 0x1001,
            CharacteristicId::DeviceControl => 0x1002,
            CharacteristicId::DeviceReport => 0x1004,
            CharacteristicId::MeasurementControl => 0x2001,
            CharacteristicId::LongPayload => 0x2002,
            CharacteristicId::MediumPayload => 0x2003,
            CharacteristicId::ShortPayload => 0x2004,
            CharacteristicId::OrientationResetControl => 0x2006,
            CharacteristicId::OrientationResetStatus => 0x2007,
            CharacteristicId::Battery => 0x3001,
        }
    }

    /// The characteristic's Bluetooth UUID.
    pub fn uuid(self) -> BluetoothUuid {
        BluetoothUuid::Uuid128(dot_uuid(self.short_uuid()).into())
    }

    /// The characteristic's UUID as a [`Uuid`], for transports built on `uuid`.
    pub fn to_uuid(self) -> Uuid {
        Uuid::from_u128(dot_uuid(self.short_uuid()))
    }

    /// Looks up the characteristic with the given UUID.
    pub fn from_uuid(uuid: &BluetoothUuid) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.uuid() == *uuid)
    }

    /// The encoded size of the characteristic, or `None` for variable-size payload frames.
    pub fn size(self) -> Option<usize> {
        match self {
            CharacteristicId::DeviceInfo => Some(34),
            CharacteristicId::DeviceControl => Some(32),
            CharacteristicId::DeviceReport => Some(36),
            CharacteristicId::MeasurementControl => Some(3),
            CharacteristicId::LongPayload
            | CharacteristicId::MediumPayload
            | CharacteristicId::ShortPayload => None,
            CharacteristicId::OrientationResetControl => Some(2),
            CharacteristicId::OrientationResetStatus => Some(1),
            CharacteristicId::Battery => Some(2),
        }
    }

    /// The operations the device supports on this characteristic.
    pub fn properties(self) -> Properties {
        match self {
            CharacteristicId::DeviceInfo | CharacteristicId::OrientationResetStatus => {
                Properties::READ
            }
            CharacteristicId::DeviceControl
            | CharacteristicId::MeasurementControl
            | CharacteristicId::OrientationResetControl => Properties::READ | Properties::WRITE,
            CharacteristicId::DeviceReport
            | CharacteristicId::LongPayload
            | CharacteristicId::MediumPayload
            | CharacteristicId::ShortPayload => Properties::NOTIFY,
            CharacteristicId::Battery => Properties::READ | Properties::NOTIFY,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CharacteristicId::DeviceInfo => "device info",
            CharacteristicId::DeviceControl => "device control",
            CharacteristicId::DeviceReport => "device report",
            CharacteristicId::MeasurementControl => "measurement control",
            CharacteristicId::LongPayload => "long payload",
            CharacteristicId::MediumPayload => "medium payload",
            CharacteristicId::ShortPayload => "short payload",
            CharacteristicId::OrientationResetControl => "orientation reset control",
            CharacteristicId::OrientationResetStatus => "orientation reset status",
            CharacteristicId::Battery => "battery",
        }
    }
}

impl Display for CharacteristicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of operations a characteristic supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Properties(u8);

impl Properties {
    pub const READ: Properties = Properties(0x01);
    pub const WRITE: Properties = Properties(0x02);
    pub const NOTIFY: Properties = Properties(0x04);

    pub fn contains(self, other: Properties) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::ops::BitOr for Properties {
    type Output = Properties;

    fn bitor(self, rhs: Self) -> Self::Output {
        Properties(self.0 | rhs.0)
    }
}
