//! Data point types for IEC 60870-5-104.
//!
//! This module defines the unified data structures for representing
//! information objects parsed from ASDUs.

use super::{Cp56Time2a, MeasuredQuality, QualityDescriptor};

/// Unified data point representing an information object.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Information object address (IOA)
    pub ioa: u32,
    /// Data value
    pub value: DataValue,
    /// Quality flags
    pub quality: Quality,
    /// Timestamp (if present)
    pub timestamp: Option<Cp56Time2a>,
}

impl DataPoint {
    /// Create a new data point.
    #[inline]
    pub const fn new(ioa: u32, value: DataValue) -> Self {
        Self {
            ioa,
            value,
            quality: Quality::Good,
            timestamp: None,
        }
    }

    /// Create a data point with quality.
    #[inline]
    pub const fn with_quality(ioa: u32, value: DataValue, quality: Quality) -> Self {
        Self {
            ioa,
            value,
            quality,
            timestamp: None,
        }
    }

    /// Create a data point with timestamp.
    #[inline]
    pub const fn with_timestamp(
        ioa: u32,
        value: DataValue,
        quality: Quality,
        timestamp: Cp56Time2a,
    ) -> Self {
        Self {
            ioa,
            value,
            quality,
            timestamp: Some(timestamp),
        }
    }

    /// Check if the data point has good quality.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.quality.is_good()
    }

    /// Get the value as f64 if numeric.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }

    /// Get the value as bool if boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_bool()
    }
}

/// Data value types.
///
/// One variant per registered type: `Single` covers single-point monitoring
/// information (plain and time-tagged) as well as the single command value,
/// `Float` covers short floating-point measured values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataValue {
    /// Single-point information or single command (M_SP_NA_1, M_SP_TB_1, C_SC_NA_1)
    Single(bool),

    /// Short floating point (M_ME_NC_1)
    Float(f32),
}

impl DataValue {
    /// Convert to f64 if numeric.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Single(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Float(v) => Some(*v as f64),
        }
    }

    /// Convert to bool if boolean type.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Single(v) => Some(*v),
            Self::Float(_) => None,
        }
    }

    /// Check if this is a boolean type.
    #[inline]
    pub const fn is_boolean(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    /// Check if this is a numeric type.
    #[inline]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Float(_))
    }
}

/// Quality flags for data points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quality {
    /// Overflow (OV) - value exceeds predefined range
    pub overflow: bool,
    /// Blocked (BL) - value is blocked for transmission
    pub blocked: bool,
    /// Substituted (SB) - value is substituted
    pub substituted: bool,
    /// Not topical (NT) - value is not topical (outdated)
    pub not_topical: bool,
    /// Invalid (IV) - value is invalid
    pub invalid: bool,
}

impl Quality {
    /// Good quality (all flags false).
    #[allow(non_upper_case_globals)]
    pub const Good: Self = Self {
        overflow: false,
        blocked: false,
        substituted: false,
        not_topical: false,
        invalid: false,
    };

    /// Invalid quality.
    #[allow(non_upper_case_globals)]
    pub const Invalid: Self = Self {
        overflow: false,
        blocked: false,
        substituted: false,
        not_topical: false,
        invalid: true,
    };

    /// Create from QualityDescriptor (for single-point values).
    #[inline]
    pub const fn from_quality_descriptor(qd: QualityDescriptor) -> Self {
        Self {
            overflow: false,
            blocked: qd.blocked,
            substituted: qd.substituted,
            not_topical: qd.not_topical,
            invalid: qd.invalid,
        }
    }

    /// Create from MeasuredQuality (for measured values).
    #[inline]
    pub const fn from_measured_quality(mq: MeasuredQuality) -> Self {
        Self {
            overflow: mq.overflow,
            blocked: mq.blocked,
            substituted: mq.substituted,
            not_topical: mq.not_topical,
            invalid: mq.invalid,
        }
    }

    /// Parse from QDS byte (Quality Descriptor for measured values).
    #[inline(always)]
    pub const fn from_qds(byte: u8) -> Self {
        Self {
            overflow: (byte & 0x01) != 0,
            blocked: (byte & 0x10) != 0,
            substituted: (byte & 0x20) != 0,
            not_topical: (byte & 0x40) != 0,
            invalid: (byte & 0x80) != 0,
        }
    }

    /// Parse from SIQ byte (Single-point Information with Quality).
    #[inline(always)]
    pub const fn from_siq(byte: u8) -> Self {
        Self {
            overflow: false,
            blocked: (byte & 0x10) != 0,
            substituted: (byte & 0x20) != 0,
            not_topical: (byte & 0x40) != 0,
            invalid: (byte & 0x80) != 0,
        }
    }

    /// Check if quality is good (no flags set).
    #[inline(always)]
    pub const fn is_good(&self) -> bool {
        !self.overflow && !self.blocked && !self.substituted && !self.not_topical && !self.invalid
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_good() {
            return f.write_str("Good");
        }

        let mut first = true;
        let mut write_flag = |f: &mut std::fmt::Formatter<'_>, flag: &str| -> std::fmt::Result {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(flag)
        };

        if self.overflow {
            write_flag(f, "OV")?;
        }
        if self.blocked {
            write_flag(f, "BL")?;
        }
        if self.substituted {
            write_flag(f, "SB")?;
        }
        if self.not_topical {
            write_flag(f, "NT")?;
        }
        if self.invalid {
            write_flag(f, "IV")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_point_creation() {
        let dp = DataPoint::new(1001, DataValue::Float(23.5));
        assert_eq!(dp.ioa, 1001);
        assert!(dp.is_good());
        assert_eq!(dp.as_f64(), Some(23.5));
    }

    #[test]
    fn test_data_value_conversions() {
        assert_eq!(DataValue::Single(true).as_bool(), Some(true));
        assert_eq!(DataValue::Single(false).as_bool(), Some(false));
        assert_eq!(DataValue::Float(1.5).as_f64(), Some(1.5));
    }

    #[test]
    fn test_quality_flags() {
        assert!(Quality::Good.is_good());
        assert!(!Quality::Invalid.is_good());

        let q = Quality::from_qds(0x81); // IV + OV
        assert!(q.invalid);
        assert!(q.overflow);
        assert!(!q.blocked);
    }

    #[test]
    fn test_quality_display() {
        assert_eq!(Quality::Good.to_string(), "Good");
        assert_eq!(Quality::Invalid.to_string(), "IV");

        let q = Quality {
            overflow: true,
            invalid: true,
            ..Default::default()
        };
        assert_eq!(q.to_string(), "OV|IV");
    }

    #[test]
    fn test_data_point_with_quality() {
        let dp = DataPoint::with_quality(1001, DataValue::Float(50.0), Quality::Invalid);
        assert_eq!(dp.ioa, 1001);
        assert!(!dp.is_good());
        assert!(dp.quality.invalid);
    }

    #[test]
    fn test_data_point_with_timestamp() {
        let ts = Cp56Time2a {
            milliseconds: 30000,
            minutes: 30,
            hours: 12,
            day: 15,
            day_of_week: 3,
            month: 6,
            year: 24,
            invalid: false,
            summer_time: false,
        };
        let dp = DataPoint::with_timestamp(1002, DataValue::Single(true), Quality::Good, ts);
        assert_eq!(dp.ioa, 1002);
        assert!(dp.timestamp.is_some());
        assert_eq!(dp.timestamp.unwrap().hours, 12);
    }

    #[test]
    fn test_data_value_is_boolean_and_numeric() {
        assert!(DataValue::Single(true).is_boolean());
        assert!(!DataValue::Float(1.0).is_boolean());
        assert!(DataValue::Float(1.0).is_numeric());
        assert!(!DataValue::Single(true).is_numeric());
    }

    #[test]
    fn test_quality_from_quality_descriptor() {
        let qd = QualityDescriptor {
            blocked: true,
            substituted: true,
            not_topical: false,
            invalid: false,
        };
        let q = Quality::from_quality_descriptor(qd);
        assert!(q.blocked);
        assert!(q.substituted);
        assert!(!q.not_topical);
        assert!(!q.invalid);
        assert!(!q.overflow); // Not in QualityDescriptor
    }

    #[test]
    fn test_quality_from_measured_quality() {
        let mq = MeasuredQuality {
            overflow: true,
            blocked: false,
            substituted: true,
            not_topical: false,
            invalid: true,
        };
        let q = Quality::from_measured_quality(mq);
        assert!(q.overflow);
        assert!(!q.blocked);
        assert!(q.substituted);
        assert!(!q.not_topical);
        assert!(q.invalid);
    }

    #[test]
    fn test_quality_display_all_flags() {
        let q = Quality {
            overflow: true,
            blocked: true,
            substituted: true,
            not_topical: true,
            invalid: true,
        };
        let display = q.to_string();
        assert!(display.contains("OV"));
        assert!(display.contains("BL"));
        assert!(display.contains("SB"));
        assert!(display.contains("NT"));
        assert!(display.contains("IV"));
    }

    #[test]
    fn test_quality_from_qds_all_combinations() {
        assert!(Quality::from_qds(0x01).overflow);
        assert!(Quality::from_qds(0x10).blocked);
        assert!(Quality::from_qds(0x20).substituted);
        assert!(Quality::from_qds(0x40).not_topical);
        assert!(Quality::from_qds(0x80).invalid);

        let q = Quality::from_qds(0xF1);
        assert!(q.overflow);
        assert!(q.blocked);
        assert!(q.substituted);
        assert!(q.not_topical);
        assert!(q.invalid);
    }

    #[test]
    fn test_data_point_as_f64_method() {
        let dp = DataPoint::new(1, DataValue::Float(99.9));
        assert!((dp.as_f64().unwrap() - 99.9).abs() < 0.001);

        let dp = DataPoint::new(2, DataValue::Single(true));
        assert_eq!(dp.as_f64(), Some(1.0));
    }

    #[test]
    fn test_data_point_as_bool_method() {
        let dp = DataPoint::new(1, DataValue::Single(true));
        assert_eq!(dp.as_bool(), Some(true));

        let dp = DataPoint::new(2, DataValue::Float(1.0));
        assert_eq!(dp.as_bool(), None);
    }
}
