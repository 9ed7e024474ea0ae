//! Tile coordinates and pyramid geometry.
//!
//! Tiles are keyed by six coordinates `(channel, timepoint, z, level, y, x)`
//! and stored as individually addressable objects named
//! `C{c}-T{t}-Z{z}-L{l}-Y{y}-X{x}.png`.

use std::sync::OnceLock;

use regex::Regex;

/// Anchored filename pattern for pre-tiled pyramid files.
pub const TILE_FILENAME_PATTERN: &str = r"C\d+-T\d+-Z\d+-L\d+-Y\d+-X\d+\.png";

/// Six-coordinate tile address within a pyramidal image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub channel: u32,
    pub timepoint: u32,
    pub z: u32,
    pub level: u32,
    pub y: u32,
    pub x: u32,
}

impl TileCoord {
    /// Parse a tile filename like `C0-T0-Z0-L1-Y2-X3.png`.
    pub fn parse(filename: &str) -> Option<TileCoord> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"^C(\d+)-T(\d+)-Z(\d+)-L(\d+)-Y(\d+)-X(\d+)\.png$").expect("valid regex")
        });

        let captures = re.captures(filename)?;
        let field = |i: usize| captures[i].parse::<u32>().ok();
        Some(TileCoord {
            channel: field(1)?,
            timepoint: field(2)?,
            z: field(3)?,
            level: field(4)?,
            y: field(5)?,
            x: field(6)?,
        })
    }

    /// Object key (and canonical filename) for this tile.
    pub fn key(&self) -> String {
        format!(
            "C{}-T{}-Z{}-L{}-Y{}-X{}.png",
            self.channel, self.timepoint, self.z, self.level, self.y, self.x
        )
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Address of one full plane: a single z-slice of a single channel and
/// timepoint at one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneKey {
    pub level: u32,
    pub timepoint: u32,
    pub channel: u32,
    pub z: u32,
}

impl PlaneKey {
    pub fn of(coord: &TileCoord) -> PlaneKey {
        PlaneKey {
            level: coord.level,
            timepoint: coord.timepoint,
            channel: coord.channel,
            z: coord.z,
        }
    }
}

/// Number of pyramid levels implied by a set of tiles (max `L` + 1).
/// Returns 0 for an empty set.
pub fn pyramid_levels(coords: &[TileCoord]) -> u32 {
    coords.iter().map(|c| c.level + 1).max().unwrap_or(0)
}

/// Dimensions of a pyramid level: the base dimensions halved (rounding up)
/// once per level.
pub fn level_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    let mut w = width;
    let mut h = height;
    for _ in 0..level {
        w = w.div_ceil(2).max(1);
        h = h.div_ceil(2).max(1);
    }
    (w, h)
}

/// Tile grid size for a level: how many tiles across and down.
pub fn tile_grid(level_width: u32, level_height: u32, tile_size: u32) -> (u32, u32) {
    (
        level_width.div_ceil(tile_size).max(1),
        level_height.div_ceil(tile_size).max(1),
    )
}

/// Enumerate every tile coordinate of an image, restricted to `levels`
/// pyramid levels (pass 1 for the base level only).
pub fn enumerate_tiles(
    width: u32,
    height: u32,
    tile_size: u32,
    levels: u32,
    channels: u32,
    timepoints: u32,
    z_levels: u32,
) -> Vec<TileCoord> {
    let mut coords = Vec::new();
    for level in 0..levels {
        let (lw, lh) = level_dimensions(width, height, level);
        let (tiles_x, tiles_y) = tile_grid(lw, lh, tile_size);
        for timepoint in 0..timepoints {
            for channel in 0..channels {
                for z in 0..z_levels {
                    for y in 0..tiles_y {
                        for x in 0..tiles_x {
                            coords.push(TileCoord {
                                channel,
                                timepoint,
                                z,
                                level,
                                y,
                                x,
                            });
                        }
                    }
                }
            }
        }
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let coord = TileCoord::parse("C2-T1-Z0-L3-Y10-X7.png").unwrap();
        assert_eq!(
            coord,
            TileCoord {
                channel: 2,
                timepoint: 1,
                z: 0,
                level: 3,
                y: 10,
                x: 7
            }
        );
        assert_eq!(coord.key(), "C2-T1-Z0-L3-Y10-X7.png");
    }

    #[test]
    fn test_parse_rejects_non_tile_names() {
        assert!(TileCoord::parse("slide.png").is_none());
        assert!(TileCoord::parse("C0-T0-Z0-L0-Y0.png").is_none());
        assert!(TileCoord::parse("C0-T0-Z0-L0-Y0-X0.tif").is_none());
        assert!(TileCoord::parse("xC0-T0-Z0-L0-Y0-X0.png").is_none());
    }

    #[test]
    fn test_pyramid_levels_from_coords() {
        let coords = vec![
            TileCoord::parse("C0-T0-Z0-L0-Y0-X0.png").unwrap(),
            TileCoord::parse("C0-T0-Z0-L2-Y0-X0.png").unwrap(),
            TileCoord::parse("C0-T0-Z0-L1-Y1-X1.png").unwrap(),
        ];
        assert_eq!(pyramid_levels(&coords), 3);
        assert_eq!(pyramid_levels(&[]), 0);
    }

    #[test]
    fn test_level_dimensions_halve_with_ceil() {
        assert_eq!(level_dimensions(4096, 3000, 0), (4096, 3000));
        assert_eq!(level_dimensions(4096, 3000, 1), (2048, 1500));
        assert_eq!(level_dimensions(4097, 3001, 1), (2049, 1501));
        assert_eq!(level_dimensions(4096, 3000, 3), (512, 375));
        assert_eq!(level_dimensions(1, 1, 5), (1, 1));
    }

    #[test]
    fn test_tile_grid() {
        assert_eq!(tile_grid(1024, 1024, 1024), (1, 1));
        assert_eq!(tile_grid(1025, 1024, 1024), (2, 1));
        assert_eq!(tile_grid(4096, 3000, 1024), (4, 3));
    }

    #[test]
    fn test_enumerate_tiles_base_level_only() {
        let coords = enumerate_tiles(2048, 1024, 1024, 1, 2, 1, 1);
        // 2x1 grid, 2 channels
        assert_eq!(coords.len(), 4);
        assert!(coords.iter().all(|c| c.level == 0));
    }

    #[test]
    fn test_enumerate_tiles_full_pyramid() {
        let coords = enumerate_tiles(2048, 2048, 1024, 2, 1, 1, 1);
        // level 0: 2x2, level 1: 1x1
        assert_eq!(coords.len(), 5);
        assert_eq!(coords.iter().filter(|c| c.level == 1).count(), 1);
    }
}
