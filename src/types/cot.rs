//! IEC 60870-5-104 Cause of Transmission (COT).
//!
//! The cause of transmission defines the reason for sending an ASDU.

use crate::error::{Iec104Error, Result};

/// Cause of Transmission (COT).
///
/// Defines the reason for transmission of an ASDU. This carries the twelve
/// causes this stack's handshake, reporting, and interrogation paths
/// actually produce or expect; IEC 104 names many more (per-group
/// interrogation and counter-request causes among them), but nothing here
/// emits or dispatches on those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cot {
    /// Periodic, cyclic (1)
    Periodic = 1,

    /// Spontaneous (3)
    Spontaneous = 3,

    /// Request or requested (5)
    Request = 5,

    /// Activation (6)
    Activation = 6,

    /// Activation confirmation (7)
    ActivationConfirm = 7,

    /// Deactivation (8)
    Deactivation = 8,

    /// Deactivation confirmation (9)
    DeactivationConfirm = 9,

    /// Activation termination (10)
    ActivationTermination = 10,

    /// Interrogated by station interrogation (20)
    InterrogatedByStation = 20,

    /// Unknown type identification (44)
    UnknownTypeId = 44,

    /// Unknown cause of transmission (45)
    UnknownCot = 45,

    /// Unknown common address of ASDU (46)
    UnknownCommonAddress = 46,
}

impl Cot {
    /// Create COT from raw byte value (lower 6 bits).
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        // COT is in the lower 6 bits
        let cot_value = value & 0x3F;

        match cot_value {
            1 => Ok(Self::Periodic),
            3 => Ok(Self::Spontaneous),
            5 => Ok(Self::Request),
            6 => Ok(Self::Activation),
            7 => Ok(Self::ActivationConfirm),
            8 => Ok(Self::Deactivation),
            9 => Ok(Self::DeactivationConfirm),
            10 => Ok(Self::ActivationTermination),
            20 => Ok(Self::InterrogatedByStation),
            44 => Ok(Self::UnknownTypeId),
            45 => Ok(Self::UnknownCot),
            46 => Ok(Self::UnknownCommonAddress),
            // Use static error to avoid allocation; actual value rarely needed in production
            _ => Err(Iec104Error::protocol_static("Unknown COT")),
        }
    }

    /// Convert to raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this is a positive confirmation.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        matches!(
            self,
            Self::ActivationConfirm | Self::DeactivationConfirm | Self::ActivationTermination
        )
    }

    /// Check if this is a negative confirmation.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        matches!(self, Self::UnknownTypeId | Self::UnknownCot | Self::UnknownCommonAddress)
    }

    /// Check if this COT indicates an interrogation response.
    #[inline]
    pub const fn is_interrogation_response(&self) -> bool {
        matches!(self, Self::InterrogatedByStation)
    }
}

impl std::fmt::Display for Cot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Periodic => write!(f, "Periodic"),
            Self::Spontaneous => write!(f, "Spontaneous"),
            Self::Request => write!(f, "Request"),
            Self::Activation => write!(f, "Activation"),
            Self::ActivationConfirm => write!(f, "ActivationConfirm"),
            Self::Deactivation => write!(f, "Deactivation"),
            Self::DeactivationConfirm => write!(f, "DeactivationConfirm"),
            Self::ActivationTermination => write!(f, "ActivationTermination"),
            Self::InterrogatedByStation => write!(f, "InterrogatedByStation"),
            Self::UnknownTypeId => write!(f, "UnknownTypeId"),
            Self::UnknownCot => write!(f, "UnknownCot"),
            Self::UnknownCommonAddress => write!(f, "UnknownCommonAddress"),
        }
    }
}
