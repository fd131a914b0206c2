//! IEC 60870-5-104 ASDU (Application Service Data Unit).
//!
//! ASDU contains the actual data (measurements, commands, etc.).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Iec104Error, Result};
use crate::types::{Cot, TypeId};

/// Variable Structure Qualifier (VSQ).
///
/// Defines the structure of information objects in an ASDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vsq {
    /// Number of information objects (1-127)
    pub count: u8,
    /// If true, addresses are sequential (SQ=1)
    pub sequence: bool,
}

impl Vsq {
    /// Create a new VSQ.
    #[inline]
    pub const fn new(count: u8, sequence: bool) -> Self {
        Self { count, sequence }
    }

    /// Parse VSQ from byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            count: value & 0x7F,
            sequence: (value & 0x80) != 0,
        }
    }

    /// Encode VSQ to byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        (self.count & 0x7F) | if self.sequence { 0x80 } else { 0 }
    }
}

/// IOA byte size (fixed at compile time for IEC 104)
pub const IOA_SIZE: usize = 3;

/// Information Object Address (IOA).
///
/// 3-byte address identifying a specific data point.
/// Uses const generic size for zero-cost parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Ioa(pub u32);

impl Ioa {
    /// Create IOA from u32 (lower 24 bits).
    #[inline(always)]
    pub const fn new(value: u32) -> Self {
        Self(value & 0x00FFFFFF)
    }

    /// Parse IOA from fixed 3-byte array (compile-time size check).
    /// This is the most efficient parsing path.
    #[inline(always)]
    pub const fn from_array(bytes: [u8; IOA_SIZE]) -> Self {
        Self((bytes[0] as u32) | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16))
    }

    /// Parse IOA from 3 bytes (little-endian).
    /// Falls back to runtime length check.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IOA_SIZE {
            return Err(Iec104Error::invalid_asdu_static("IOA too short"));
        }
        // Use unchecked access since we verified length
        Ok(Self::from_array([bytes[0], bytes[1], bytes[2]]))
    }

    /// Try to parse IOA from slice, returning None if too short.
    /// Useful for hot paths where error handling is expensive.
    #[inline(always)]
    pub const fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < IOA_SIZE {
            None
        } else {
            Some(Self::from_array([bytes[0], bytes[1], bytes[2]]))
        }
    }

    /// Encode IOA to 3 bytes (little-endian).
    #[inline(always)]
    pub const fn to_bytes(&self) -> [u8; IOA_SIZE] {
        [
            (self.0 & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            ((self.0 >> 16) & 0xFF) as u8,
        ]
    }

    /// Get the raw value.
    #[inline(always)]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Ioa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ASDU header (fixed part).
///
/// The originator address octet is optional: a station that doesn't assign
/// distinct originator addresses omits it, and the header is five bytes
/// instead of six. Whether it's present is a property of the session, not of
/// the wire bytes themselves, so [`parse`](AsduHeader::parse) and
/// [`encode`](AsduHeader::encode) both take a `with_oa` flag rather than
/// trying to infer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsduHeader {
    /// Type identification
    pub type_id: TypeId,
    /// Variable structure qualifier
    pub vsq: Vsq,
    /// Cause of transmission
    pub cot: Cot,
    /// Test flag (if true, this is a test ASDU)
    pub test: bool,
    /// Negative flag (if true, negative confirmation)
    pub negative: bool,
    /// Originator address (0 if not used, meaningful only when `with_oa`)
    pub originator: u8,
    /// Common address of ASDU (station address)
    pub common_address: u16,
}

impl AsduHeader {
    /// Create a new ASDU header.
    #[inline]
    pub const fn new(type_id: TypeId, count: u8, cot: Cot, common_address: u16) -> Self {
        Self {
            type_id,
            vsq: Vsq::new(count, false),
            cot,
            test: false,
            negative: false,
            originator: 0,
            common_address,
        }
    }

    /// Parse ASDU header from bytes.
    ///
    /// `with_oa` selects the five- or six-byte layout; see the struct docs.
    /// Returns the header and the number of bytes consumed.
    #[inline]
    pub fn parse(data: &[u8], with_oa: bool) -> Result<(Self, usize)> {
        let fixed_len = if with_oa { 6 } else { 5 };
        if data.len() < fixed_len {
            return Err(Iec104Error::invalid_asdu_static("ASDU header too short"));
        }

        let type_id = TypeId::from_u8(data[0])?;
        let vsq = Vsq::from_u8(data[1]);

        // COT is in lower 6 bits, test flag in bit 7, negative in bit 6
        let cot = Cot::from_u8(data[2])?;
        let test = (data[2] & 0x80) != 0;
        let negative = (data[2] & 0x40) != 0;

        let (originator, ca_offset) = if with_oa { (data[3], 4) } else { (0, 3) };
        let common_address = data[ca_offset] as u16 | ((data[ca_offset + 1] as u16) << 8);

        Ok((
            Self {
                type_id,
                vsq,
                cot,
                test,
                negative,
                originator,
                common_address,
            },
            fixed_len,
        ))
    }

    /// Encode ASDU header to bytes.
    ///
    /// `with_oa` selects the five- or six-byte layout; see the struct docs.
    #[inline]
    pub fn encode(&self, buf: &mut BytesMut, with_oa: bool) {
        buf.put_u8(self.type_id.as_u8());
        buf.put_u8(self.vsq.as_u8());

        let mut cot_byte = self.cot.as_u8();
        if self.test {
            cot_byte |= 0x80;
        }
        if self.negative {
            cot_byte |= 0x40;
        }
        buf.put_u8(cot_byte);
        if with_oa {
            buf.put_u8(self.originator);
        }
        buf.put_u16_le(self.common_address);
    }

    /// Get the encoded size in bytes.
    #[inline]
    pub const fn encoded_size(&self, with_oa: bool) -> usize {
        if with_oa {
            6
        } else {
            5
        }
    }
}

/// Single-point information value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinglePoint {
    /// Single-point value (0 or 1)
    pub value: bool,
    /// Quality descriptor
    pub quality: QualityDescriptor,
}

impl SinglePoint {
    /// Parse from byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            value: (value & 0x01) != 0,
            quality: QualityDescriptor::from_siq(value),
        }
    }

    /// Encode to byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        let mut result = if self.value { 0x01 } else { 0x00 };
        result |= self.quality.to_siq();
        result
    }
}

/// Quality descriptor for single-point information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualityDescriptor {
    /// Blocked (BL)
    pub blocked: bool,
    /// Substituted (SB)
    pub substituted: bool,
    /// Not topical (NT)
    pub not_topical: bool,
    /// Invalid (IV)
    pub invalid: bool,
}

impl QualityDescriptor {
    /// Create a new quality descriptor with all flags false.
    #[inline]
    pub const fn new() -> Self {
        Self {
            blocked: false,
            substituted: false,
            not_topical: false,
            invalid: false,
        }
    }

    /// Create a quality descriptor indicating invalid data.
    #[inline]
    pub const fn invalid() -> Self {
        Self {
            blocked: false,
            substituted: false,
            not_topical: false,
            invalid: true,
        }
    }

    /// Parse from SIQ byte (single-point information with quality).
    #[inline]
    pub const fn from_siq(value: u8) -> Self {
        Self {
            blocked: (value & 0x10) != 0,
            substituted: (value & 0x20) != 0,
            not_topical: (value & 0x40) != 0,
            invalid: (value & 0x80) != 0,
        }
    }

    /// Parse from DIQ byte (double-point information with quality).
    #[inline]
    pub const fn from_diq(value: u8) -> Self {
        Self {
            blocked: (value & 0x10) != 0,
            substituted: (value & 0x20) != 0,
            not_topical: (value & 0x40) != 0,
            invalid: (value & 0x80) != 0,
        }
    }

    /// Encode to SIQ byte (without value bits).
    #[inline]
    pub const fn to_siq(&self) -> u8 {
        let mut result = 0u8;
        if self.blocked {
            result |= 0x10;
        }
        if self.substituted {
            result |= 0x20;
        }
        if self.not_topical {
            result |= 0x40;
        }
        if self.invalid {
            result |= 0x80;
        }
        result
    }

    /// Check if the quality is good (all flags false).
    #[inline]
    pub const fn is_good(&self) -> bool {
        !self.blocked && !self.substituted && !self.not_topical && !self.invalid
    }
}

/// Quality descriptor for measured values (QDS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasuredQuality {
    /// Overflow (OV)
    pub overflow: bool,
    /// Blocked (BL)
    pub blocked: bool,
    /// Substituted (SB)
    pub substituted: bool,
    /// Not topical (NT)
    pub not_topical: bool,
    /// Invalid (IV)
    pub invalid: bool,
}

impl MeasuredQuality {
    /// Create a new quality descriptor with all flags false.
    #[inline]
    pub const fn new() -> Self {
        Self {
            overflow: false,
            blocked: false,
            substituted: false,
            not_topical: false,
            invalid: false,
        }
    }

    /// Parse from QDS byte.
    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self {
            overflow: (value & 0x01) != 0,
            blocked: (value & 0x10) != 0,
            substituted: (value & 0x20) != 0,
            not_topical: (value & 0x40) != 0,
            invalid: (value & 0x80) != 0,
        }
    }

    /// Encode to QDS byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        let mut result = 0u8;
        if self.overflow {
            result |= 0x01;
        }
        if self.blocked {
            result |= 0x10;
        }
        if self.substituted {
            result |= 0x20;
        }
        if self.not_topical {
            result |= 0x40;
        }
        if self.invalid {
            result |= 0x80;
        }
        result
    }

    /// Check if the quality is good (all flags false).
    #[inline]
    pub const fn is_good(&self) -> bool {
        !self.overflow && !self.blocked && !self.substituted && !self.not_topical && !self.invalid
    }
}

/// Measured value with quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredValue {
    /// The value
    pub value: f32,
    /// Quality descriptor
    pub quality: MeasuredQuality,
}

impl MeasuredValue {
    /// Create a new measured value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self {
            value,
            quality: MeasuredQuality::new(),
        }
    }

    /// Create a measured value with invalid quality.
    #[inline]
    pub const fn invalid(value: f32) -> Self {
        Self {
            value,
            quality: MeasuredQuality {
                overflow: false,
                blocked: false,
                substituted: false,
                not_topical: false,
                invalid: true,
            },
        }
    }
}

/// CP56Time2a timestamp (7 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cp56Time2a {
    /// Milliseconds (0-59999)
    pub milliseconds: u16,
    /// Minutes (0-59)
    pub minutes: u8,
    /// Hours (0-23)
    pub hours: u8,
    /// Day of month (1-31)
    pub day: u8,
    /// Day of week (1-7, 1=Monday)
    pub day_of_week: u8,
    /// Month (1-12)
    pub month: u8,
    /// Year (0-99, years since 2000)
    pub year: u8,
    /// Invalid flag
    pub invalid: bool,
    /// Summer time flag
    pub summer_time: bool,
}

impl Cp56Time2a {
    /// Parse from 7 bytes.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 7 {
            return Err(Iec104Error::invalid_asdu_static("CP56Time2a too short"));
        }

        let milliseconds = bytes[0] as u16 | ((bytes[1] as u16) << 8);
        let minutes = bytes[2] & 0x3F;
        let invalid = (bytes[2] & 0x80) != 0;
        let hours = bytes[3] & 0x1F;
        let summer_time = (bytes[3] & 0x80) != 0;
        let day = bytes[4] & 0x1F;
        let day_of_week = (bytes[4] >> 5) & 0x07;
        let month = bytes[5] & 0x0F;
        let year = bytes[6] & 0x7F;

        Ok(Self {
            milliseconds,
            minutes,
            hours,
            day,
            day_of_week,
            month,
            year,
            invalid,
            summer_time,
        })
    }

    /// Encode to 7 bytes.
    #[inline]
    pub const fn to_bytes(&self) -> [u8; 7] {
        let mut result = [0u8; 7];
        result[0] = (self.milliseconds & 0xFF) as u8;
        result[1] = ((self.milliseconds >> 8) & 0xFF) as u8;
        result[2] = (self.minutes & 0x3F) | if self.invalid { 0x80 } else { 0 };
        result[3] = (self.hours & 0x1F) | if self.summer_time { 0x80 } else { 0 };
        result[4] = (self.day & 0x1F) | ((self.day_of_week & 0x07) << 5);
        result[5] = self.month & 0x0F;
        result[6] = self.year & 0x7F;
        result
    }
}

/// Information object (generic container).
#[derive(Debug, Clone, PartialEq)]
pub struct InformationObject {
    /// Information object address
    pub ioa: Ioa,
    /// Raw data bytes
    pub data: Bytes,
}

impl InformationObject {
    /// Create a new information object.
    pub fn new(ioa: Ioa, data: Bytes) -> Self {
        Self { ioa, data }
    }
}

/// Complete ASDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    /// ASDU header
    pub header: AsduHeader,
    /// Information objects
    pub objects: Vec<InformationObject>,
    /// Raw data (for unparsed types)
    pub raw_data: Bytes,
}

impl Asdu {
    /// Create a new ASDU.
    pub fn new(header: AsduHeader) -> Self {
        Self {
            header,
            objects: Vec::new(),
            raw_data: Bytes::new(),
        }
    }

    /// Create an interrogation command ASDU.
    pub fn interrogation_command(common_address: u16, qoi: u8) -> Self {
        let mut asdu = Self::new(AsduHeader::new(
            TypeId::InterrogationCommand,
            1,
            Cot::Activation,
            common_address,
        ));
        asdu.objects.push(InformationObject {
            ioa: Ioa::new(0),
            data: Bytes::copy_from_slice(&[qoi]),
        });
        asdu
    }

    /// Parse ASDU from bytes (after APCI).
    pub fn parse(data: &[u8], with_oa: bool) -> Result<Self> {
        let (header, header_len) = AsduHeader::parse(data, with_oa)?;
        let raw_data = Bytes::copy_from_slice(&data[header_len..]);

        Ok(Self {
            header,
            objects: Vec::new(),
            raw_data,
        })
    }

    /// Parse ASDU from bytes without copying the payload.
    pub fn parse_bytes(data: Bytes, with_oa: bool) -> Result<Self> {
        let (header, header_len) = AsduHeader::parse(data.as_ref(), with_oa)?;
        let raw_data = data.slice(header_len..);

        Ok(Self {
            header,
            objects: Vec::new(),
            raw_data,
        })
    }

    /// Encode ASDU to bytes.
    pub fn encode(&self, with_oa: bool) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len(with_oa));
        self.encode_to(&mut buf, with_oa);
        buf
    }

    /// Encode ASDU directly into the provided buffer (zero-copy).
    #[inline]
    pub fn encode_to(&self, buf: &mut BytesMut, with_oa: bool) {
        self.header.encode(buf, with_oa);

        // Encode information objects
        for obj in &self.objects {
            buf.put_slice(&obj.ioa.to_bytes());
            buf.put_slice(&obj.data);
        }

        // Or raw data if no parsed objects
        if self.objects.is_empty() && !self.raw_data.is_empty() {
            buf.put_slice(&self.raw_data);
        }
    }

    /// Calculate the encoded length of this ASDU.
    #[inline]
    pub fn encoded_len(&self, with_oa: bool) -> usize {
        let mut len = self.header.encoded_size(with_oa);
        for obj in &self.objects {
            len += 3 + obj.data.len(); // IOA (3 bytes) + data
        }
        if self.objects.is_empty() {
            len += self.raw_data.len();
        }
        len
    }
}
