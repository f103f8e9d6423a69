//! EXIF metadata extraction from image bytes.

use exif::{Field, In, Reader, Value};
use std::io::Cursor;

use crate::types::{ExifMap, ExifValue};

/// Extracts EXIF metadata from image containers.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract every primary-image EXIF tag from an encoded image.
    ///
    /// Returns `None` if the image has no EXIF block or if reading it fails.
    /// Individual values that cannot be represented as numbers or text are
    /// stringified rather than dropped.
    pub fn extract_from_bytes(bytes: &[u8]) -> Option<ExifMap> {
        let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::debug!("No readable EXIF: {e}");
                return None;
            }
        };

        let map: ExifMap = exif
            .fields()
            .filter(|f| f.ifd_num == In::PRIMARY)
            .filter_map(|f| Some((f.tag.to_string(), Self::field_value(f)?)))
            .collect();

        if map.is_empty() {
            None
        } else {
            Some(map)
        }
    }

    /// Convert one field. Single numbers stay numeric, text and opaque bytes
    /// are decoded lossily, anything else falls back to its display form.
    fn field_value(field: &Field) -> Option<ExifValue> {
        match Self::convert(&field.value) {
            Some(value) => Some(value),
            None => {
                let shown = field.display_value().to_string();
                let shown = shown.trim_matches('"').trim();
                (!shown.is_empty()).then(|| ExifValue::Text(shown.to_string()))
            }
        }
    }

    fn convert(value: &Value) -> Option<ExifValue> {
        match value {
            Value::Ascii(parts) => {
                let text = parts
                    .iter()
                    .map(|p| lossy_text(p))
                    .collect::<Vec<_>>()
                    .join(" ");
                non_empty_text(text)
            }
            Value::Undefined(bytes, _) => non_empty_text(lossy_text(bytes)),
            Value::Byte(v) if v.len() == 1 => Some(ExifValue::Integer(v[0] as i64)),
            Value::Short(v) if v.len() == 1 => Some(ExifValue::Integer(v[0] as i64)),
            Value::Long(v) if v.len() == 1 => Some(ExifValue::Integer(v[0] as i64)),
            Value::SByte(v) if v.len() == 1 => Some(ExifValue::Integer(v[0] as i64)),
            Value::SShort(v) if v.len() == 1 => Some(ExifValue::Integer(v[0] as i64)),
            Value::SLong(v) if v.len() == 1 => Some(ExifValue::Integer(v[0] as i64)),
            Value::Rational(v) if v.len() == 1 && v[0].denom != 0 => finite(v[0].to_f64()),
            Value::SRational(v) if v.len() == 1 && v[0].denom != 0 => finite(v[0].to_f64()),
            Value::Float(v) if v.len() == 1 => finite(v[0] as f64),
            Value::Double(v) if v.len() == 1 => finite(v[0]),
            _ => None,
        }
    }
}

/// Decode bytes as UTF-8, dropping invalid sequences and NUL padding.
fn lossy_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != '\u{FFFD}' && *c != '\0')
        .collect::<String>()
        .trim()
        .to_string()
}

fn non_empty_text(text: String) -> Option<ExifValue> {
    (!text.is_empty()).then_some(ExifValue::Text(text))
}

// NaN and infinities have no JSON representation
fn finite(v: f64) -> Option<ExifValue> {
    v.is_finite().then_some(ExifValue::Float(v))
}
