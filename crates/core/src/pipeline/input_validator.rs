//! Preconditions checked before any writer work starts.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use crate::shared::error::InputValidationError;
use crate::shared::video_asset::VideoAsset;

/// Checks that `path` is an existing, readable, non-empty file and returns
/// its size in bytes.
pub fn validate_file(path: &Path) -> Result<u64, InputValidationError> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => InputValidationError::NotFound(path.to_path_buf()),
        _ => InputValidationError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    if !metadata.is_file() {
        return Err(InputValidationError::Unreadable {
            path: path.to_path_buf(),
            source: std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    if metadata.len() == 0 {
        return Err(InputValidationError::Empty(path.to_path_buf()));
    }

    File::open(path).map_err(|source| InputValidationError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(metadata.len())
}

/// Both sides must be in `1..=max_dimension`.
pub fn validate_dimensions(
    asset: &VideoAsset,
    max_dimension: u32,
) -> Result<(), InputValidationError> {
    let valid = |side: u32| (1..=max_dimension).contains(&side);
    if valid(asset.width) && valid(asset.height) {
        Ok(())
    } else {
        Err(InputValidationError::InvalidDimensions {
            width: asset.width,
            height: asset.height,
            max: max_dimension,
        })
    }
}
