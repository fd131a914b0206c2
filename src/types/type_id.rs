//! IEC 60870-5-104 Type Identification.
//!
//! Type identification defines the structure and meaning of information objects.

use crate::error::{Iec104Error, Result};

/// IEC 60870-5-104 Type Identification.
///
/// Defines the type of information contained in an ASDU. This stack registers
/// an encoder/decoder for exactly these five; any other wire value decodes to
/// [`Iec104Error::UnknownTypeId`] rather than a `TypeId` variant that has
/// nowhere to be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeId {
    /// Single-point information (M_SP_NA_1)
    SinglePoint = 1,

    /// Measured value, short floating point (M_ME_NC_1)
    MeasuredFloat = 13,

    /// Single-point information with time tag CP56Time2a (M_SP_TB_1)
    SinglePointTime56 = 30,

    /// Single command (C_SC_NA_1)
    SingleCommand = 45,

    /// Interrogation command (C_IC_NA_1)
    InterrogationCommand = 100,
}

impl TypeId {
    /// Create TypeId from raw byte value.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::SinglePoint),
            13 => Ok(Self::MeasuredFloat),
            30 => Ok(Self::SinglePointTime56),
            45 => Ok(Self::SingleCommand),
            100 => Ok(Self::InterrogationCommand),
            _ => Err(Iec104Error::UnknownTypeId(value)),
        }
    }

    /// Convert to raw byte value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this type is in the monitoring direction (from RTU to master).
    #[inline]
    pub const fn is_monitoring(&self) -> bool {
        matches!(self, Self::SinglePoint | Self::MeasuredFloat | Self::SinglePointTime56)
    }

    /// Check if this type is in the control direction (from master to RTU).
    #[inline]
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::SingleCommand | Self::InterrogationCommand)
    }

    /// Check if this type contains a time tag.
    #[inline]
    pub const fn has_time_tag(&self) -> bool {
        matches!(self, Self::SinglePointTime56)
    }

    /// Get the IEC standard name (e.g., "M_SP_NA_1").
    #[inline]
    pub const fn standard_name(&self) -> &'static str {
        match self {
            Self::SinglePoint => "M_SP_NA_1",
            Self::MeasuredFloat => "M_ME_NC_1",
            Self::SinglePointTime56 => "M_SP_TB_1",
            Self::SingleCommand => "C_SC_NA_1",
            Self::InterrogationCommand => "C_IC_NA_1",
        }
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.standard_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_id_from_u8() {
        assert_eq!(TypeId::from_u8(1).unwrap(), TypeId::SinglePoint);
        assert_eq!(TypeId::from_u8(13).unwrap(), TypeId::MeasuredFloat);
        assert_eq!(TypeId::from_u8(100).unwrap(), TypeId::InterrogationCommand);
        assert!(TypeId::from_u8(255).is_err());
    }

    #[test]
    fn test_type_id_direction() {
        assert!(TypeId::SinglePoint.is_monitoring());
        assert!(!TypeId::SinglePoint.is_control());

        assert!(TypeId::SingleCommand.is_control());
        assert!(TypeId::InterrogationCommand.is_control());
    }

    #[test]
    fn test_type_id_time_tag() {
        assert!(!TypeId::SinglePoint.has_time_tag());
        assert!(TypeId::SinglePointTime56.has_time_tag());
    }

    #[test]
    fn test_type_id_standard_name() {
        assert_eq!(TypeId::SinglePoint.standard_name(), "M_SP_NA_1");
        assert_eq!(TypeId::MeasuredFloat.standard_name(), "M_ME_NC_1");
        assert_eq!(TypeId::SingleCommand.standard_name(), "C_SC_NA_1");
    }

    #[test]
    fn test_type_id_all_values_roundtrip() {
        for val in [1u8, 13, 30, 45, 100] {
            let type_id = TypeId::from_u8(val).unwrap();
            assert_eq!(type_id.as_u8(), val, "Roundtrip failed for value {}", val);
        }
    }

    #[test]
    fn test_type_id_invalid_values() {
        let invalid_values = [0, 2, 3, 14, 29, 31, 44, 46, 99, 101, 200, 255];
        for val in invalid_values {
            let result = TypeId::from_u8(val);
            assert!(result.is_err(), "Expected error for TypeId value {}", val);
        }
    }

    #[test]
    fn test_type_id_numeric_values() {
        assert_eq!(TypeId::SinglePoint.as_u8(), 1);
        assert_eq!(TypeId::MeasuredFloat.as_u8(), 13);
        assert_eq!(TypeId::SinglePointTime56.as_u8(), 30);
        assert_eq!(TypeId::SingleCommand.as_u8(), 45);
        assert_eq!(TypeId::InterrogationCommand.as_u8(), 100);
    }
}
