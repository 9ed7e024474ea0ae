//! Tile file validation.
//!
//! Tiles must be 16-bit single-channel (grayscale) PNG files. Validation
//! reads only a bounded header prefix — it runs once per tile before any
//! transfer, so it must never buffer the full file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tessera_core::error::{Result, TesseraError};

/// PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Bytes needed to reach the IHDR bit-depth and color-type fields:
/// signature (8) + chunk length (4) + chunk type (4) + width (4) +
/// height (4) + bit depth (1) + color type (1).
const HEADER_LEN: usize = 26;

/// Required bit depth for tile files.
pub const TILE_BIT_DEPTH: u8 = 16;

/// PNG color type 0 = grayscale.
const COLOR_TYPE_GRAYSCALE: u8 = 0;

/// Validate that `path` is a 16-bit grayscale PNG.
///
/// Reads exactly [`HEADER_LEN`] bytes. Fails with a descriptive reason
/// (filename plus expected-vs-actual) on the first violated invariant.
pub fn validate_tile(path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("<non-utf8 filename>")
        .to_string();

    let mut header = [0u8; HEADER_LEN];
    let mut file = File::open(path)?;
    file.read_exact(&mut header)
        .map_err(|_| TesseraError::InvalidFormat {
            file: file_name.clone(),
            reason: format!("file shorter than a {} byte PNG header", HEADER_LEN),
        })?;

    if header[..8] != PNG_SIGNATURE {
        return Err(TesseraError::InvalidFormat {
            file: file_name,
            reason: "not a PNG file (bad signature)".to_string(),
        });
    }

    if &header[12..16] != b"IHDR" {
        return Err(TesseraError::InvalidFormat {
            file: file_name,
            reason: "first chunk is not IHDR".to_string(),
        });
    }

    let bit_depth = header[24];
    if bit_depth != TILE_BIT_DEPTH {
        return Err(TesseraError::InvalidFormat {
            file: file_name,
            reason: format!("bit depth is {}, expected {}", bit_depth, TILE_BIT_DEPTH),
        });
    }

    let color_type = header[25];
    if color_type != COLOR_TYPE_GRAYSCALE {
        return Err(TesseraError::InvalidFormat {
            file: file_name,
            reason: format!("color type is {}, expected {} (grayscale)", color_type, COLOR_TYPE_GRAYSCALE),
        });
    }

    Ok(())
}
