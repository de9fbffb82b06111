//! Writing a geographic coordinate into a compressed artifact.
//!
//! The writer builds a fresh Exif APP1 block carrying a GPS IFD (and the
//! artifact's existing capture date, when one is present) and splices it
//! into the JPEG segment stream. The entropy-coded scan data is copied
//! verbatim; pixels are never re-encoded.

use chrono::{DateTime, Utc};

use super::{segments, MetadataExtractor, APP1, EXIF_HEADER, SOI};
use crate::error::{PipelineError, PipelineResult};
use crate::profile::OutputFormat;
use crate::types::{CompressedArtifact, GeoPoint};

/// TIFF field types used by the builder.
const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_RATIONAL: u16 = 5;
const TYPE_LONG: u16 = 4;

/// Tags used by the builder.
const TAG_DATETIME: u16 = 0x0132;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_GPS_VERSION: u16 = 0x0000;
const TAG_GPS_LAT_REF: u16 = 0x0001;
const TAG_GPS_LAT: u16 = 0x0002;
const TAG_GPS_LON_REF: u16 = 0x0003;
const TAG_GPS_LON: u16 = 0x0004;

/// Merges a matched coordinate into a compressed artifact's metadata block.
pub struct LocationSyncWriter;

impl LocationSyncWriter {
    /// Write `point` into the artifact's metadata block, replacing any
    /// existing GPS fields.
    ///
    /// Only JPEG artifacts carry a writable Exif slot; other formats fail
    /// with [`PipelineError::MetadataWrite`] and the caller records the item
    /// as processed-but-unsynced. The capture date already present in the
    /// artifact's metadata survives the rewrite.
    pub fn apply_location(
        name: &str,
        artifact: &CompressedArtifact,
        point: GeoPoint,
    ) -> PipelineResult<CompressedArtifact> {
        if artifact.format != OutputFormat::Jpeg {
            return Err(PipelineError::MetadataWrite {
                name: name.to_string(),
                format: artifact.format.to_string(),
            });
        }

        // Keep the capture date the compressor carried over, if any
        let timestamp = MetadataExtractor::extract(&artifact.bytes).timestamp;

        let mut payload = EXIF_HEADER.to_vec();
        payload.extend_from_slice(&build_exif_tiff(point, timestamp));

        let bytes = splice_exif_app1(&artifact.bytes, &payload).ok_or_else(|| {
            PipelineError::MetadataWrite {
                name: name.to_string(),
                format: artifact.format.to_string(),
            }
        })?;

        let byte_size = bytes.len() as u64;
        Ok(CompressedArtifact {
            bytes,
            byte_size,
            format: artifact.format,
            width: artifact.width,
            height: artifact.height,
        })
    }
}

/// Replace or insert the Exif APP1 segment of a JPEG, leaving every other
/// segment and the entire scan data untouched. Returns `None` when the
/// buffer is not a parseable JPEG.
pub(crate) fn splice_exif_app1(jpeg: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    if !jpeg.starts_with(&SOI) || payload.len() + 2 > u16::MAX as usize {
        return None;
    }

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&SOI);

    let mut inserted = false;
    let mut tail_start = 2;

    for seg in segments(jpeg) {
        tail_start = seg.offset + seg.encoded_len;
        let is_exif = seg.marker == APP1 && seg.data.starts_with(EXIF_HEADER);
        let is_app0 = seg.marker == 0xE0;

        // Exif goes right after SOI, but a JFIF APP0 keeps first place
        if !inserted && !is_app0 {
            write_app1(&mut out, payload);
            inserted = true;
        }
        if is_exif {
            continue;
        }
        out.extend_from_slice(&jpeg[seg.offset..seg.offset + seg.encoded_len]);
    }

    if !inserted {
        write_app1(&mut out, payload);
    }
    out.extend_from_slice(&jpeg[tail_start..]);
    Some(out)
}

fn write_app1(out: &mut Vec<u8>, payload: &[u8]) {
    out.push(0xFF);
    out.push(APP1);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Build a little-endian TIFF structure holding a GPS IFD (and optionally a
/// DateTime field in IFD0).
pub(crate) fn build_exif_tiff(point: GeoPoint, timestamp: Option<DateTime<Utc>>) -> Vec<u8> {
    let datetime = timestamp.map(|ts| {
        let mut s = ts.format("%Y:%m:%d %H:%M:%S").to_string().into_bytes();
        s.push(0);
        s
    });

    // Layout: header(8) | IFD0 | GPS IFD | datetime? | lat rationals | lon rationals
    let ifd0_entries = 1 + datetime.is_some() as usize;
    let ifd0_len = 2 + ifd0_entries * 12 + 4;
    let gps_off = 8 + ifd0_len;
    let gps_len = 2 + 5 * 12 + 4;
    let data_off = gps_off + gps_len;
    let dt_len = datetime.as_ref().map(|d| d.len()).unwrap_or(0);
    let lat_off = data_off + dt_len;
    let lon_off = lat_off + 24;

    let mut buf = Vec::with_capacity(lon_off + 24);

    // TIFF header, little-endian, IFD0 at offset 8
    buf.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00]);
    buf.extend_from_slice(&8u32.to_le_bytes());

    // IFD0
    buf.extend_from_slice(&(ifd0_entries as u16).to_le_bytes());
    if let Some(dt) = &datetime {
        entry_offset(&mut buf, TAG_DATETIME, TYPE_ASCII, dt.len() as u32, data_off as u32);
    }
    entry_inline(
        &mut buf,
        TAG_GPS_IFD,
        TYPE_LONG,
        1,
        (gps_off as u32).to_le_bytes(),
    );
    buf.extend_from_slice(&0u32.to_le_bytes());

    // GPS IFD
    let (lat_ref, lon_ref) = hemisphere_refs(point);
    buf.extend_from_slice(&5u16.to_le_bytes());
    entry_inline(&mut buf, TAG_GPS_VERSION, TYPE_BYTE, 4, [2, 3, 0, 0]);
    entry_inline(&mut buf, TAG_GPS_LAT_REF, TYPE_ASCII, 2, [lat_ref, 0, 0, 0]);
    entry_offset(&mut buf, TAG_GPS_LAT, TYPE_RATIONAL, 3, lat_off as u32);
    entry_inline(&mut buf, TAG_GPS_LON_REF, TYPE_ASCII, 2, [lon_ref, 0, 0, 0]);
    entry_offset(&mut buf, TAG_GPS_LON, TYPE_RATIONAL, 3, lon_off as u32);
    buf.extend_from_slice(&0u32.to_le_bytes());

    // Data area
    if let Some(dt) = &datetime {
        buf.extend_from_slice(dt);
    }
    write_dms(&mut buf, point.latitude);
    write_dms(&mut buf, point.longitude);

    buf
}

/// Build a GPS-only TIFF block (no capture date).
#[cfg(test)]
pub(crate) fn build_gps_tiff(point: GeoPoint) -> Vec<u8> {
    build_exif_tiff(point, None)
}

fn hemisphere_refs(point: GeoPoint) -> (u8, u8) {
    let lat = if point.latitude < 0.0 { b'S' } else { b'N' };
    let lon = if point.longitude < 0.0 { b'W' } else { b'E' };
    (lat, lon)
}

fn entry_inline(buf: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: [u8; 4]) {
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&typ.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&value);
}

fn entry_offset(buf: &mut Vec<u8>, tag: u16, typ: u16, count: u32, offset: u32) {
    entry_inline(buf, tag, typ, count, offset.to_le_bytes());
}

/// Write a coordinate as three TIFF rationals: degrees, minutes and
/// milli-arcsecond-precision seconds.
fn write_dms(buf: &mut Vec<u8>, value: f64) {
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes = ((abs - degrees) * 60.0).trunc();
    let seconds = (abs - degrees - minutes / 60.0) * 3600.0;

    for (num, den) in [
        (degrees as u32, 1u32),
        (minutes as u32, 1),
        ((seconds * 1000.0).round() as u32, 1000),
    ] {
        buf.extend_from_slice(&num.to_le_bytes());
        buf.extend_from_slice(&den.to_le_bytes());
    }
}
