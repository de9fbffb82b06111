//! Binary metadata extraction from raw image bytes.
//!
//! The extractor walks JPEG marker segments in a bounded prefix of the
//! buffer to locate the Exif APP1 payload, then decodes the fields it needs
//! with `kamadak-exif`. It never reads the full payload of a large image
//! and never fails: a corrupt or absent field yields `None` for that field
//! only.

mod gps_write;

pub use gps_write::LocationSyncWriter;

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag, Value};

use crate::types::{CameraInfo, CaptureSettings, CapturedMetadata, GeoPoint};

/// How much of the buffer the extractor is allowed to scan. Standard Exif
/// segments sit at the front of the file; 64 KiB covers them without
/// touching multi-megabyte pixel data.
pub const SCAN_PREFIX_LEN: usize = 64 * 1024;

/// JPEG start-of-image marker.
const SOI: [u8; 2] = [0xFF, 0xD8];
/// APP1 marker byte (Exif container).
const APP1: u8 = 0xE1;
/// Start-of-scan marker byte; entropy-coded data follows, stop scanning.
const SOS: u8 = 0xDA;
/// Identifier prefix of an Exif APP1 payload.
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Extracts capture metadata from image byte buffers.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract metadata from a raw image buffer.
    ///
    /// Pure function over the bytes. When no usable metadata segment exists
    /// the result has `timestamp: None` and the caller falls back to the
    /// file modification time.
    pub fn extract(bytes: &[u8]) -> CapturedMetadata {
        let prefix = &bytes[..bytes.len().min(SCAN_PREFIX_LEN)];

        let Some(payload) = locate_tiff_payload(prefix) else {
            return CapturedMetadata::default();
        };

        match Reader::new().read_raw(payload.to_vec()) {
            Ok(exif) => Self::decode_fields(&exif),
            Err(e) => {
                tracing::debug!("Exif payload did not decode: {e}");
                CapturedMetadata::default()
            }
        }
    }

    /// Decode the fields we care about, each one best-effort.
    fn decode_fields(exif: &exif::Exif) -> CapturedMetadata {
        let camera = {
            let make = Self::get_string(exif, Tag::Make);
            let model = Self::get_string(exif, Tag::Model);
            if make.is_some() || model.is_some() {
                Some(CameraInfo { make, model })
            } else {
                None
            }
        };

        let settings = {
            let iso = Self::get_u32(exif, Tag::PhotographicSensitivity);
            let aperture = Self::get_aperture(exif);
            let exposure = Self::get_exposure(exif);
            if iso.is_some() || aperture.is_some() || exposure.is_some() {
                Some(CaptureSettings {
                    iso,
                    aperture,
                    exposure,
                })
            } else {
                None
            }
        };

        CapturedMetadata {
            timestamp: Self::get_datetime(exif),
            location: Self::get_location(exif),
            camera,
            settings,
        }
    }

    /// Get the capture datetime, preferring DateTimeOriginal over DateTime.
    fn get_datetime(exif: &exif::Exif) -> Option<DateTime<Utc>> {
        let field = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;

        let raw = match &field.value {
            Value::Ascii(v) => v.first().map(|b| String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }?;

        // Exif dates carry no timezone; both devices are assumed reasonably
        // synchronized, so the raw wall-clock time is treated as UTC.
        NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Get both GPS coordinates; a point requires both to decode.
    fn get_location(exif: &exif::Exif) -> Option<GeoPoint> {
        let latitude = Self::get_gps_coord(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
        let longitude = Self::get_gps_coord(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
        Some(GeoPoint {
            latitude,
            longitude,
        })
    }

    /// Get a GPS coordinate, converting degrees/minutes/seconds to decimal.
    fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
        let coord = exif.get_field(coord_tag, In::PRIMARY)?;
        let reference = exif.get_field(ref_tag, In::PRIMARY)?;

        let degrees = Self::parse_gps_rationals(&coord.value)?;
        let ref_str = reference.display_value().to_string();

        // Sign from the hemisphere reference (N/S for lat, E/W for lon)
        let sign = if ref_str.contains('S') || ref_str.contains('W') {
            -1.0
        } else {
            1.0
        };

        Some(sign * degrees)
    }

    /// Parse GPS rationals (degrees, minutes, seconds) to decimal degrees.
    fn parse_gps_rationals(value: &Value) -> Option<f64> {
        match value {
            Value::Rational(rationals) if rationals.len() >= 3 => {
                let degrees = rationals[0].to_f64();
                let minutes = rationals[1].to_f64();
                let seconds = rationals[2].to_f64();
                Some(degrees + minutes / 60.0 + seconds / 3600.0)
            }
            _ => None,
        }
    }

    /// Get a string field from EXIF data.
    fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
        exif.get_field(tag, In::PRIMARY).map(|f| {
            let s = f.display_value().to_string();
            s.trim_matches('"').to_string()
        })
    }

    /// Get a u32 field from EXIF data.
    fn get_u32(exif: &exif::Exif, tag: Tag) -> Option<u32> {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Short(v) => v.first().map(|&x| x as u32),
                Value::Long(v) => v.first().copied(),
                _ => None,
            })
    }

    /// Get aperture as a formatted string (e.g., "f/1.8").
    fn get_aperture(exif: &exif::Exif) -> Option<String> {
        exif.get_field(Tag::FNumber, In::PRIMARY)
            .map(|f| format!("f/{}", f.display_value()))
    }

    /// Get exposure time as a string (e.g., "1/1000").
    fn get_exposure(exif: &exif::Exif) -> Option<String> {
        exif.get_field(Tag::ExposureTime, In::PRIMARY)
            .map(|f| f.display_value().to_string())
    }
}

/// Locate the TIFF-structured metadata payload within a buffer prefix.
///
/// Accepts either a JPEG (walks the marker segments for an Exif APP1) or a
/// bare TIFF buffer (returned as-is). Anything else has no recognized
/// signature at offset 0.
fn locate_tiff_payload(prefix: &[u8]) -> Option<&[u8]> {
    if prefix.starts_with(&SOI) {
        return find_exif_app1(prefix);
    }
    // TIFF: II*\0 or MM\0*
    if prefix.len() >= 4
        && (prefix.starts_with(&[0x49, 0x49, 0x2A, 0x00])
            || prefix.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]))
    {
        return Some(prefix);
    }
    None
}

/// Walk JPEG marker segments and return the Exif APP1 payload (the TIFF
/// structure after the `Exif\0\0` header), if one exists in the prefix.
pub(crate) fn find_exif_app1(prefix: &[u8]) -> Option<&[u8]> {
    segments(prefix)
        .find(|seg| seg.marker == APP1 && seg.data.starts_with(EXIF_HEADER))
        .map(|seg| &seg.data[EXIF_HEADER.len()..])
}

/// Copy the Exif APP1 block found in `source_prefix` into `jpeg`, replacing
/// any Exif block already there. Returns `None` when the source has no Exif
/// block or the target is not a parseable JPEG.
pub(crate) fn carry_exif(source_prefix: &[u8], jpeg: &[u8]) -> Option<Vec<u8>> {
    let tiff = find_exif_app1(source_prefix)?;
    let mut payload = EXIF_HEADER.to_vec();
    payload.extend_from_slice(tiff);
    gps_write::splice_exif_app1(jpeg, &payload)
}

/// One parsed JPEG marker segment.
pub(crate) struct Segment<'a> {
    /// Marker byte (the one after 0xFF)
    pub marker: u8,
    /// Byte offset of the 0xFF marker byte
    pub offset: usize,
    /// Total encoded length including marker and length bytes
    pub encoded_len: usize,
    /// Segment data (after the two length bytes)
    pub data: &'a [u8],
}

/// Iterate the marker segments of a JPEG buffer, starting after SOI and
/// stopping at SOS (or at the end of the buffer, whichever comes first).
pub(crate) fn segments(buf: &[u8]) -> impl Iterator<Item = Segment<'_>> {
    let mut pos = if buf.starts_with(&SOI) { 2 } else { buf.len() };

    std::iter::from_fn(move || {
        loop {
            if pos + 4 > buf.len() {
                return None;
            }
            if buf[pos] != 0xFF {
                // Lost sync; stop rather than misread entropy data
                return None;
            }
            let marker = buf[pos + 1];
            if marker == SOS {
                return None;
            }
            // Standalone markers carry no length
            if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
                pos += 2;
                continue;
            }
            let len = u16::from_be_bytes([buf[pos + 2], buf[pos + 3]]) as usize;
            if len < 2 || pos + 2 + len > buf.len() {
                return None;
            }
            let seg = Segment {
                marker,
                offset: pos,
                encoded_len: 2 + len,
                data: &buf[pos + 4..pos + 2 + len],
            };
            pos += 2 + len;
            return Some(seg);
        }
    })
}
