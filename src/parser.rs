//! ASDU information object parser.
//!
//! This module provides parsing of information objects from ASDU raw data
//! into structured `DataPoint` values, dispatched through a process-wide
//! registry keyed by type identification octet. The registry ships seeded
//! with decoders for the five types this stack supports; [`register_type`]
//! lets an application layer extend it before ASDUs start arriving.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::{Iec104Error, Result};
use crate::types::{Asdu, Cp56Time2a, DataPoint, DataValue, Quality, TypeId};

/// A type-specific information-object decoder.
///
/// Receives the ASDU's raw payload (after the fixed header), the VSQ element
/// count, and the VSQ sequence flag; returns the decoded data points.
pub type DecodeFn = fn(&[u8], usize, bool) -> Result<Vec<DataPoint>>;

fn registry() -> &'static Mutex<HashMap<u8, DecodeFn>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u8, DecodeFn>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<u8, DecodeFn> = HashMap::new();
        map.insert(TypeId::SinglePoint.as_u8(), parse_single_point_no_time as DecodeFn);
        map.insert(TypeId::SinglePointTime56.as_u8(), parse_single_point_with_time as DecodeFn);
        map.insert(TypeId::MeasuredFloat.as_u8(), parse_measured_float as DecodeFn);
        map.insert(TypeId::SingleCommand.as_u8(), parse_no_data_points as DecodeFn);
        map.insert(TypeId::InterrogationCommand.as_u8(), parse_no_data_points as DecodeFn);
        Mutex::new(map)
    })
}

/// Register (or replace) the decoder used for a given type identification
/// octet.
pub fn register_type(type_id: u8, decode: DecodeFn) {
    registry().lock().unwrap().insert(type_id, decode);
}

/// Parse an ASDU into a list of data points.
///
/// Command and interrogation types carry no monitoring data points and parse
/// to an empty vector rather than an error.
pub fn parse_asdu(asdu: &Asdu) -> Result<Vec<DataPoint>> {
    let data = asdu.raw_data.as_ref();
    let type_id = asdu.header.type_id;
    let count = asdu.header.vsq.count as usize;
    let sequence = asdu.header.vsq.sequence;

    if data.is_empty() && count > 0 {
        return Err(Iec104Error::invalid_asdu("Empty data for non-zero count"));
    }

    let decode = *registry()
        .lock()
        .unwrap()
        .get(&type_id.as_u8())
        .ok_or(Iec104Error::UnknownTypeId(type_id.as_u8()))?;
    decode(data, count, sequence)
}

fn parse_no_data_points(_data: &[u8], _count: usize, _sequence: bool) -> Result<Vec<DataPoint>> {
    Ok(Vec::new())
}

fn parse_single_point_no_time(data: &[u8], count: usize, sequence: bool) -> Result<Vec<DataPoint>> {
    parse_single_point(data, count, sequence, false)
}

fn parse_single_point_with_time(data: &[u8], count: usize, sequence: bool) -> Result<Vec<DataPoint>> {
    parse_single_point(data, count, sequence, true)
}

/// Parse single-point information (M_SP_NA_1, M_SP_TB_1).
fn parse_single_point(
    data: &[u8],
    count: usize,
    sequence: bool,
    with_time: bool,
) -> Result<Vec<DataPoint>> {
    let mut points = Vec::with_capacity(count);

    // Calculate element size
    let element_size = if with_time { 1 + 7 } else { 1 }; // SIQ + optional CP56Time2a

    // First IOA (always present)
    if count > 0 && data.len() < 3 {
        return Err(Iec104Error::invalid_asdu("Data too short for IOA"));
    }
    let first_ioa = if count > 0 { parse_ioa(&data[0..3])? } else { 0 };
    let mut offset = if count > 0 { 3 } else { 0 };

    for i in 0..count {
        // Get IOA
        let ioa = if sequence {
            first_ioa + i as u32
        } else if i > 0 {
            if offset + 3 > data.len() {
                return Err(Iec104Error::invalid_asdu("Data too short for IOA"));
            }
            let ioa = parse_ioa(&data[offset..offset + 3])?;
            offset += 3;
            ioa
        } else {
            first_ioa
        };

        // Check data length
        if offset + element_size > data.len() {
            return Err(Iec104Error::invalid_asdu("Data too short for element"));
        }

        // Parse SIQ (Single-point Information with Quality)
        let siq = data[offset];
        let value = (siq & 0x01) != 0;
        let quality = Quality::from_siq(siq);
        offset += 1;

        // Parse timestamp if present
        let timestamp = if with_time {
            let ts = Cp56Time2a::from_bytes(&data[offset..offset + 7])?;
            offset += 7;
            Some(ts)
        } else {
            None
        };

        points.push(DataPoint {
            ioa,
            value: DataValue::Single(value),
            quality,
            timestamp,
        });
    }

    Ok(points)
}

/// Parse measured value, short floating point (M_ME_NC_1).
fn parse_measured_float(data: &[u8], count: usize, sequence: bool) -> Result<Vec<DataPoint>> {
    let mut points = Vec::with_capacity(count);

    let element_size = 5; // IEEE float (4) + QDS (1)

    if count > 0 && data.len() < 3 {
        return Err(Iec104Error::invalid_asdu("Data too short for IOA"));
    }
    let first_ioa = if count > 0 { parse_ioa(&data[0..3])? } else { 0 };
    let mut offset = if count > 0 { 3 } else { 0 };

    for i in 0..count {
        let ioa = if sequence {
            first_ioa + i as u32
        } else if i > 0 {
            if offset + 3 > data.len() {
                return Err(Iec104Error::invalid_asdu("Data too short"));
            }
            let ioa = parse_ioa(&data[offset..offset + 3])?;
            offset += 3;
            ioa
        } else {
            first_ioa
        };

        if offset + element_size > data.len() {
            return Err(Iec104Error::invalid_asdu("Data too short for element"));
        }

        // IEEE 754 short floating point
        let value = f32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;

        let qds = data[offset];
        let quality = Quality::from_qds(qds);
        offset += 1;

        points.push(DataPoint {
            ioa,
            value: DataValue::Float(value),
            quality,
            timestamp: None,
        });
    }

    Ok(points)
}

/// Parse IOA from 3 bytes (little-endian).
#[inline(always)]
fn parse_ioa(bytes: &[u8]) -> Result<u32> {
    if bytes.len() < 3 {
        return Err(Iec104Error::invalid_asdu("IOA too short"));
    }
    Ok(bytes[0] as u32 | ((bytes[1] as u32) << 8) | ((bytes[2] as u32) << 16))
}
