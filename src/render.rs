use crate::choropleth::{Choropleth, Rgb, NO_DATA_FILL};
use crate::data::Dataset;
use anyhow::{ensure, Context, Result};
use image::{ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

// Constants for Web Mercator
const TILE_SIZE: u32 = 256;
/// Deepest zoom level exported; z12 is already 16.7M tiles.
pub const MAX_ZOOM: u8 = 12;

/// Rasterizes the choropleth into `{dir}/{z}/{x}/{y}.png` tiles. Returns the number written.
///
/// Tiles with no country pixels are skipped.
pub fn generate_tiles(dataset: &Dataset, map: &Choropleth<'_>, dir: &Path, min_zoom: u8, max_zoom: u8) -> Result<usize> {
    ensure!(
        min_zoom <= max_zoom && max_zoom <= MAX_ZOOM,
        "Invalid zoom range {}..={} (max zoom is {})",
        min_zoom,
        max_zoom,
        MAX_ZOOM
    );
    info!("Generating tiles from min_zoom {} to max_zoom {}...", min_zoom, max_zoom);

    let fallback = Rgb::from_hex(NO_DATA_FILL).unwrap_or(Rgb(0xd9, 0xd9, 0xd9));
    let colors: HashMap<&str, Rgba<u8>> = map
        .regions
        .iter()
        .map(|region| {
            let rgb = Rgb::from_hex(&region.fill).unwrap_or_else(|| {
                warn!("{}: fill {:?} is not a hex color", region.id(), region.fill);
                fallback
            });
            (region.id(), Rgba([rgb.0, rgb.1, rgb.2, 255]))
        })
        .collect();

    let written = AtomicUsize::new(0);
    for zoom in min_zoom..=max_zoom {
        let n = 1u32 << zoom;
        let z_dir = dir.join(zoom.to_string());
        fs::create_dir_all(&z_dir).context("Failed to create zoom directory")?;

        let tiles: Vec<(u32, u32)> = (0..n).flat_map(|x| (0..n).map(move |y| (x, y))).collect();
        tiles.par_iter().try_for_each(|&(x, y)| -> Result<()> {
            let img = match render_tile(dataset, &colors, zoom, x, y) {
                Some(img) => img,
                None => return Ok(()),
            };
            let x_dir = z_dir.join(x.to_string());
            fs::create_dir_all(&x_dir).with_context(|| format!("Failed to create {:?}", x_dir))?;
            let path = x_dir.join(format!("{}.png", y));
            img.save(&path).with_context(|| format!("Failed to save tile {:?}", path))?;
            written.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })?;
    }

    Ok(written.into_inner())
}

fn render_tile(dataset: &Dataset, colors: &HashMap<&str, Rgba<u8>>, zoom: u8, tx: u32, ty: u32) -> Option<RgbaImage> {
    let mut img: RgbaImage = ImageBuffer::new(TILE_SIZE, TILE_SIZE);
    let mut painted = false;

    for py in 0..TILE_SIZE {
        for px in 0..TILE_SIZE {
            let (lat, lon) = tile_pixel_to_lat_lon(tx, ty, px, py, zoom);
            let color = dataset.country_at(lon, lat).and_then(|id| colors.get(id));
            if let Some(color) = color {
                img.put_pixel(px, py, *color);
                painted = true;
            }
        }
    }

    painted.then_some(img)
}

// Coordinate conversions, sampled at the pixel centre.
fn tile_pixel_to_lat_lon(tx: u32, ty: u32, px: u32, py: u32, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let x_t = tx as f64 + (px as f64 + 0.5) / TILE_SIZE as f64;
    let y_t = ty as f64 + (py as f64 + 0.5) / TILE_SIZE as f64;

    let lon = x_t / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y_t / n)).sinh().atan().to_degrees();
    (lat, lon)
}
