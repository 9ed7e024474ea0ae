//! Zarr v2 store output.
//!
//! Exported pyramids are written as one group with one array per pyramid
//! level (`0/`, `1/`, ...). Arrays are 5-D `[t, c, z, y, x]`, dtype `<u2`,
//! chunked at the tile size, raw uncompressed chunks in C order. Chunk
//! files are named `{t}.{c}.{z}.{ty}.{tx}`.

use std::collections::HashMap;
use std::path::Path;

use tessera_core::error::{Result, TesseraError};

use crate::models::ImageDimensions;
use crate::tile::{level_dimensions, tile_grid, PlaneKey};

/// Write a complete zarr store for `levels` pyramid levels.
///
/// `planes` maps each plane to its stitched row-major `u16` pixels at that
/// plane's level dimensions.
pub fn write_store(
    root: &Path,
    dims: &ImageDimensions,
    levels: u32,
    planes: &HashMap<PlaneKey, Vec<u16>>,
) -> Result<()> {
    std::fs::create_dir_all(root)?;
    std::fs::write(root.join(".zgroup"), "{\"zarr_format\":2}")?;

    for level in 0..levels {
        write_level(root, dims, level, planes)?;
    }
    Ok(())
}

fn write_level(
    root: &Path,
    dims: &ImageDimensions,
    level: u32,
    planes: &HashMap<PlaneKey, Vec<u16>>,
) -> Result<()> {
    let (lw, lh) = level_dimensions(dims.width, dims.height, level);
    let (tiles_x, tiles_y) = tile_grid(lw, lh, dims.tile_size);

    let level_dir = root.join(level.to_string());
    std::fs::create_dir_all(&level_dir)?;

    let metadata = serde_json::json!({
        "zarr_format": 2,
        "shape": [dims.timepoints, dims.channels, dims.z_levels, lh, lw],
        "chunks": [1, 1, 1, dims.tile_size, dims.tile_size],
        "dtype": "<u2",
        "compressor": null,
        "fill_value": 0,
        "filters": null,
        "order": "C",
    });
    std::fs::write(
        level_dir.join(".zarray"),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    for timepoint in 0..dims.timepoints {
        for channel in 0..dims.channels {
            for z in 0..dims.z_levels {
                let key = PlaneKey {
                    level,
                    timepoint,
                    channel,
                    z,
                };
                let plane = planes.get(&key).ok_or_else(|| {
                    TesseraError::Other(format!(
                        "missing plane T{} C{} Z{} at level {}",
                        timepoint, channel, z, level
                    ))
                })?;

                for ty in 0..tiles_y {
                    for tx in 0..tiles_x {
                        let chunk = chunk_bytes(plane, lw, lh, dims.tile_size, tx, ty);
                        let name = format!("{}.{}.{}.{}.{}", timepoint, channel, z, ty, tx);
                        std::fs::write(level_dir.join(name), chunk)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Extract one chunk from a stitched plane as little-endian bytes.
///
/// Chunks are always full `tile_size x tile_size`; regions past the plane
/// edge carry the fill value (0).
fn chunk_bytes(plane: &[u16], width: u32, height: u32, tile_size: u32, tx: u32, ty: u32) -> Vec<u8> {
    let tile = tile_size as usize;
    let width = width as usize;
    let height = height as usize;
    let x0 = tx as usize * tile;
    let y0 = ty as usize * tile;

    let mut bytes = Vec::with_capacity(tile * tile * 2);
    for row in 0..tile {
        for col in 0..tile {
            let y = y0 + row;
            let x = x0 + col;
            let value = if y < height && x < width {
                plane[y * width + x]
            } else {
                0
            };
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}
