//! Avatar image validation and storage.
//!
//! Uploaded avatars are capped at 5 MiB and 800x800 pixels. Only the image
//! header is inspected for dimensions; no full decode happens here.

use image::ImageReader;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::config::Config;

/// Maximum avatar size in bytes (5 MiB).
pub const MAX_AVATAR_BYTES: usize = 5_242_880;

/// Maximum avatar width/height in pixels.
pub const MAX_AVATAR_DIMENSION: u32 = 800;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("Avatar must be {MAX_AVATAR_BYTES} bytes or smaller")]
    TooLarge,

    #[error("Avatar dimensions must be {MAX_AVATAR_DIMENSION}x{MAX_AVATAR_DIMENSION} or smaller")]
    DimensionsInvalid,

    #[error("Invalid image file")]
    InvalidFile,

    #[error("Failed to store avatar: {0}")]
    Storage(String),
}

/// Check avatar bytes against the size and dimension limits.
///
/// Unrecognized formats surface as [`AvatarError::InvalidFile`]; recognized
/// formats whose dimensions cannot be read, or exceed the cap, surface as
/// [`AvatarError::DimensionsInvalid`].
pub fn validate_avatar(bytes: &[u8]) -> Result<image::ImageFormat, AvatarError> {
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(AvatarError::TooLarge);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| AvatarError::InvalidFile)?;

    let format = reader.format().ok_or(AvatarError::InvalidFile)?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|_| AvatarError::DimensionsInvalid)?;

    if width > MAX_AVATAR_DIMENSION || height > MAX_AVATAR_DIMENSION {
        return Err(AvatarError::DimensionsInvalid);
    }

    Ok(format)
}

pub struct AvatarService {
    config: Config,
}

impl AvatarService {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Validate and persist avatar bytes for an account, returning the stored
    /// filename to record on the account.
    pub async fn save_avatar(&self, account_id: i32, bytes: &[u8]) -> Result<String, AvatarError> {
        let format = validate_avatar(bytes)?;

        let extension = format.extensions_str().first().copied().unwrap_or("img");
        let filename = format!("{account_id}_avatar.{extension}");

        let avatars_dir = PathBuf::from(&self.config.general.avatars_path);
        if !avatars_dir.exists() {
            fs::create_dir_all(&avatars_dir)
                .await
                .map_err(|e| AvatarError::Storage(e.to_string()))?;
        }

        let file_path = avatars_dir.join(&filename);

        info!(path = %file_path.display(), "Storing avatar");

        fs::write(&file_path, bytes)
            .await
            .map_err(|e| AvatarError::Storage(e.to_string()))?;

        Ok(filename)
    }
}
