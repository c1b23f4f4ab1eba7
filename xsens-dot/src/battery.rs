use crate::characteristic::CharacteristicId;
use crate::codec::{Codec, Reader};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChargingStatus {
    #[default]
    NotCharging,
    Charging,
    /// A code this crate does not know. Only produced by decoding.
    Unrecognized(u8),
}

impl From<u8> for ChargingStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => ChargingStatus::NotCharging,
            1 => ChargingStatus::Charging,
            other => ChargingStatus::Unrecognized(other),
        }
    }
}

impl From<ChargingStatus> for u8 {
    fn from(status: ChargingStatus) -> Self {
        match status {
            ChargingStatus::NotCharging => 0,
            ChargingStatus::Charging => 1,
            ChargingStatus::Unrecognized(code) => code,
        }
    }
}

/// Battery level and charging status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Battery {
    /// Charge in percent.
    pub level: u8,
    pub charging_status: ChargingStatus,
}

impl Codec for Battery {
    const CHARACTERISTIC: CharacteristicId = CharacteristicId::Battery;

    fn encode(&self) -> Vec<u8> {
        vec![self.level, self.charging_status.into()]
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::fixed(bytes, Self::CHARACTERISTIC)?;
        Ok(Battery {
            level: r.u8()?,
            charging_status: r.u8()?.into(),
        })
    }
}
