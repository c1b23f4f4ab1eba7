//! Heading reset characteristics.

use crate::characteristic::CharacteristicId;
use crate::codec::{Codec, Reader};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrientationResetControl {
    /// Aligns the heading with the sensor's current orientation.
    HeadingReset,
    /// Reverts to the default heading.
    DefaultHeading,
    /// A command code this crate does not know. Only produced by decoding.
    Unrecognized(u16),
}

impl From<u16> for OrientationResetControl {
    fn from(code: u16) -> Self {
        match code {
            1 => OrientationResetControl::HeadingReset,
            7 => OrientationResetControl::DefaultHeading,
            other => OrientationResetControl::Unrecognized(other),
        }
    }
}

impl From<OrientationResetControl> for u16 {
    fn from(control: OrientationResetControl) -> Self {
        match control {
            OrientationResetControl::HeadingReset => 1,
            OrientationResetControl::DefaultHeading => 7,
            OrientationResetControl::Unrecognized(code) => code,
        }
    }
}

impl Codec for OrientationResetControl {
    const CHARACTERISTIC: CharacteristicId = CharacteristicId::OrientationResetControl;

    fn encode(&self) -> Vec<u8> {
        u16::from(*self).to_le_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::fixed(bytes, Self::CHARACTERISTIC)?;
        Ok(r.u16()?.into())
    }
}

/// Result of the last heading reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OrientationResetStatus {
    pub result: u8,
}

impl Codec for OrientationResetStatus {
    const CHARACTERISTIC: CharacteristicId = CharacteristicId::OrientationResetStatus;

    fn encode(&self) -> Vec<u8> {
        vec![self.result]
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::fixed(bytes, Self::CHARACTERISTIC)?;
        Ok(OrientationResetStatus { result: r.u8()? })
    }
}
