use crate::exif_reader::read_capture_metadata;
use crate::geohash::{self, LOCATION_HASH_PRECISION};
use crate::metadata::{GeoLocation, ImageMetadata};
use crate::paths::{absolute_path, base_name, dir_name, is_date_folder, path_to_string};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local};
use image::ImageReader;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reads one image file into an [`ImageMetadata`] record.
///
/// Only the stat call can fail; dimensions and capture metadata degrade to
/// zero values when they cannot be decoded.
pub fn extract_metadata(path: &Path) -> Result<ImageMetadata> {
    let stat = fs::metadata(path)
        .with_context(|| format!("ファイル情報を取得できませんでした: {}", path.display()))?;

    let mut metadata = ImageMetadata {
        file_size: stat.len(),
        file_path: path_to_string(&absolute_path(path)),
        ..Default::default()
    };

    let modified = stat
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now());
    (
        metadata.year_created,
        metadata.month_created,
        metadata.date_created,
    ) = date_parts(&modified);

    match read_dimensions(path) {
        Ok((width, height)) => {
            metadata.width = width;
            metadata.height = height;
        }
        Err(err) => debug!("画像サイズを取得できませんでした: {}: {err:#}", path.display()),
    }

    match read_capture_metadata(path) {
        Ok(capture) => {
            if let Some(taken) = capture.taken {
                (metadata.year_taken, metadata.month_taken, metadata.date_taken) =
                    date_parts(&taken);
            }
            if let Some(coords) = capture.coordinates {
                metadata.location = Some(GeoLocation {
                    geohash: geohash::encode(
                        coords.latitude,
                        coords.longitude,
                        LOCATION_HASH_PRECISION,
                    ),
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                    ..Default::default()
                });
            }
        }
        Err(err) => debug!("{err:#}"),
    }

    metadata.derive_dates();

    let folder = dir_name(&metadata.file_path);
    metadata.parent = base_name(&folder).to_string();
    if !is_date_folder(&folder) {
        metadata.parent_if_not_date = metadata.parent.clone();
    }

    Ok(metadata)
}

/// Header-only dimensions; the format is sniffed from the content, not the
/// extension.
fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let dimensions = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(dimensions)
}

fn date_parts(date: &impl Datelike) -> (String, String, String) {
    (
        format!("{:04}", date.year()),
        format!("{:02}", date.month()),
        format!("{:02}", date.day()),
    )
}
