use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureMetadata {
    pub taken: Option<NaiveDate>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

pub fn read_capture_metadata(path: &Path) -> Result<CaptureMetadata> {
    let file = File::open(path)
        .with_context(|| format!("EXIF読み込み対象を開けませんでした: {}", path.display()))?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("EXIFを解析できませんでした: {}", path.display()))?;

    Ok(CaptureMetadata {
        taken: read_taken_date(&exif),
        coordinates: read_coordinates(&exif),
    })
}

fn read_taken_date(exif: &Exif) -> Option<NaiveDate> {
    [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
        .filter_map(|field| ascii_value(&field.value))
        .find_map(|raw| parse_date(&raw))
}

fn read_coordinates(exif: &Exif) -> Option<Coordinates> {
    let latitude = read_degrees(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S')?;
    let longitude = read_degrees(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W')?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some(Coordinates {
        latitude,
        longitude,
    })
}

fn read_degrees(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: char) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let degrees = match &field.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0
        }
        _ => return None,
    };
    if !degrees.is_finite() {
        return None;
    }

    let negative = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| ascii_value(&f.value))
        .map(|r| r.trim().starts_with(negative_ref))
        .unwrap_or(false);

    Some(if negative { -degrees } else { degrees })
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(lines) => lines
            .first()
            .map(|line| String::from_utf8_lossy(line).trim_end_matches('\0').trim().to_string())
            .filter(|line| !line.is_empty()),
        _ => None,
    }
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    let normalized = input.trim();

    let candidates = [
        "%Y:%m:%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
    ];
    for fmt in candidates {
        if let Ok(naive) = NaiveDateTime::parse_from_str(normalized, fmt) {
            return Some(naive.date());
        }
    }

    // Some cameras write only the date part.
    ["%Y:%m:%d", "%Y-%m-%d"]
        .into_iter()
        .find_map(|fmt| NaiveDate::parse_from_str(normalized, fmt).ok())
}
