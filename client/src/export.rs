//! Export orchestration.
//!
//! Downloads every tile belonging to an image, decodes and stitches the
//! pyramid back together, and writes a single output container — a zarr
//! store or a multi-page 16-bit TIFF.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tessera_core::error::{Result, TesseraError};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::models::{ImageDimensions, ScopedCredentials};
use crate::progress::UnitProgress;
use crate::s3::ObjectStore;
use crate::service::ImageService;
use crate::tile::{self, PlaneKey, TileCoord};
use crate::zarr;

/// Output container format for exported images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Zarr,
    Tiff,
}

impl ExportFormat {
    /// Default output filename for an image uuid.
    fn default_output(&self, image_uuid: &str) -> PathBuf {
        match self {
            ExportFormat::Zarr => PathBuf::from(format!("{}.zarr", image_uuid)),
            ExportFormat::Tiff => PathBuf::from(format!("{}.ome.tif", image_uuid)),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zarr" => Ok(ExportFormat::Zarr),
            "tif" | "tiff" => Ok(ExportFormat::Tiff),
            other => Err(TesseraError::Other(format!(
                "unknown export format '{}' (expected zarr, tif or tiff)",
                other
            ))),
        }
    }
}

/// One decoded 16-bit grayscale tile.
#[derive(Debug, Clone)]
pub(crate) struct DecodedTile {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u16>,
}

/// Drives exports from the image service.
pub struct Exporter {
    service: Arc<dyn ImageService>,
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
}

impl Exporter {
    pub fn new(service: Arc<dyn ImageService>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            service,
            store,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Export one image into `output` (or a uuid-derived default path).
    ///
    /// `save_pyramid` keeps every level; otherwise only the base level is
    /// downloaded and written. The uuid is checked syntactically before any
    /// network call.
    pub async fn export_image(
        &self,
        image_uuid: &str,
        output: Option<&Path>,
        save_pyramid: bool,
        format: ExportFormat,
        on_progress: UnitProgress,
    ) -> Result<PathBuf> {
        Uuid::parse_str(image_uuid)
            .map_err(|_| TesseraError::InvalidUuid(image_uuid.to_string()))?;

        let dims = self.service.get_image_dimensions(image_uuid).await?;
        let credentials = self.service.get_image_credentials(image_uuid).await?;

        let levels = if save_pyramid { dims.pyramid_levels } else { 1 };
        let coords = tile::enumerate_tiles(
            dims.width,
            dims.height,
            dims.tile_size,
            levels,
            dims.channels,
            dims.timepoints,
            dims.z_levels,
        );
        tracing::info!(
            image_uuid,
            tiles = coords.len(),
            levels,
            "Exporting image"
        );

        let tiles = self
            .download_tiles(&coords, &credentials.target.prefix, &credentials.target.bucket, &credentials.credentials, on_progress)
            .await?;

        let planes = assemble_planes(&dims, &tiles);

        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| format.default_output(image_uuid));

        match format {
            ExportFormat::Zarr => zarr::write_store(&output, &dims, levels, &planes)?,
            ExportFormat::Tiff => write_tiff(&output, &dims, levels, &planes)?,
        }

        tracing::info!(output = %output.display(), "Export complete");
        Ok(output)
    }

    /// Download and decode every tile through the bounded worker pool.
    /// A missing or undecodable tile fails the export — the stored tile set
    /// must be complete and consistent.
    async fn download_tiles(
        &self,
        coords: &[TileCoord],
        prefix: &str,
        bucket: &str,
        credentials: &ScopedCredentials,
        on_progress: UnitProgress,
    ) -> Result<HashMap<TileCoord, DecodedTile>> {
        let total = coords.len() as u64;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let processed = Arc::new(AtomicU64::new(0));
        let bucket = Arc::new(bucket.to_string());
        let prefix = Arc::new(prefix.to_string());
        let credentials = Arc::new(credentials.clone());

        let mut handles = Vec::with_capacity(coords.len());
        for coord in coords.iter().copied() {
            let semaphore = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let bucket = Arc::clone(&bucket);
            let prefix = Arc::clone(&prefix);
            let credentials = Arc::clone(&credentials);
            let processed = Arc::clone(&processed);
            let on_progress = Arc::clone(&on_progress);

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                let key = format!("{}{}", prefix, coord.key());
                let data = store.download(&bucket, &key, &credentials).await?;
                let tile = decode_tile(&key, &data)?;
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                on_progress(done, total);
                Ok::<(TileCoord, DecodedTile), TesseraError>((coord, tile))
            }));
        }

        let mut tiles = HashMap::with_capacity(coords.len());
        for handle in futures::future::join_all(handles).await {
            let (coord, tile) = handle
                .map_err(|e| TesseraError::Other(format!("download task panicked: {}", e)))??;
            tiles.insert(coord, tile);
        }
        Ok(tiles)
    }
}

/// Decode a 16-bit grayscale PNG tile.
fn decode_tile(key: &str, data: &[u8]) -> Result<DecodedTile> {
    let image = image::load_from_memory_with_format(data, image::ImageFormat::Png).map_err(
        |e| TesseraError::InvalidFormat {
            file: key.to_string(),
            reason: format!("cannot decode tile: {}", e),
        },
    )?;
    let buffer = image.into_luma16();
    let (width, height) = buffer.dimensions();
    Ok(DecodedTile {
        width,
        height,
        pixels: buffer.into_raw(),
    })
}

/// Stitch downloaded tiles into one contiguous plane per (level, t, c, z).
fn assemble_planes(
    dims: &ImageDimensions,
    tiles: &HashMap<TileCoord, DecodedTile>,
) -> HashMap<PlaneKey, Vec<u16>> {
    let mut grouped: HashMap<PlaneKey, Vec<(&TileCoord, &DecodedTile)>> = HashMap::new();
    for (coord, tile) in tiles {
        grouped.entry(PlaneKey::of(coord)).or_default().push((coord, tile));
    }

    grouped
        .into_iter()
        .map(|(key, members)| {
            let (lw, lh) = tile::level_dimensions(dims.width, dims.height, key.level);
            let plane = stitch_plane(lw, lh, dims.tile_size, &members);
            (key, plane)
        })
        .collect()
}

/// Copy tiles into a row-major plane, clipping edge tiles to the level
/// dimensions.
fn stitch_plane(
    level_width: u32,
    level_height: u32,
    tile_size: u32,
    tiles: &[(&TileCoord, &DecodedTile)],
) -> Vec<u16> {
    let lw = level_width as usize;
    let lh = level_height as usize;
    let tile_size = tile_size as usize;
    let mut plane = vec![0u16; lw * lh];

    for (coord, tile) in tiles {
        let x0 = coord.x as usize * tile_size;
        let y0 = coord.y as usize * tile_size;
        if x0 >= lw || y0 >= lh {
            continue;
        }
        let copy_w = (tile.width as usize).min(lw - x0);
        let copy_h = (tile.height as usize).min(lh - y0);

        for row in 0..copy_h {
            let src = row * tile.width as usize;
            let dst = (y0 + row) * lw + x0;
            plane[dst..dst + copy_w].copy_from_slice(&tile.pixels[src..src + copy_w]);
        }
    }
    plane
}

/// Write one 16-bit grayscale IFD per plane into a single TIFF, base level
/// first, ordered level -> timepoint -> channel -> z.
fn write_tiff(
    output: &Path,
    dims: &ImageDimensions,
    levels: u32,
    planes: &HashMap<PlaneKey, Vec<u16>>,
) -> Result<()> {
    let file = std::fs::File::create(output)?;
    let mut encoder = tiff::encoder::TiffEncoder::new(std::io::BufWriter::new(file))
        .map_err(|e| TesseraError::Other(format!("cannot create TIFF: {}", e)))?;

    for level in 0..levels {
        let (lw, lh) = tile::level_dimensions(dims.width, dims.height, level);
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
                    encoder
                        .write_image::<tiff::encoder::colortype::Gray16>(lw, lh, plane)
                        .map_err(|e| {
                            TesseraError::Other(format!("cannot write TIFF page: {}", e))
                        })?;
                }
            }
        }
    }
    Ok(())
}
