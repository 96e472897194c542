use ndarray::{s, ArrayViewMut3, Axis};
use serde::{Deserialize, Serialize};

use crate::compositing::domain::region_compositor::RegionCompositor;
use crate::shared::error::CompositingError;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;
use crate::shared::region::{PixelRegion, DEFAULT_EXPANSION};

pub const DEFAULT_BLOCK_OFFSET: u32 = 15;
pub const DEFAULT_MIN_BLOCK_SIZE: u32 = 35;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Symmetric growth of each face rectangle before pixelation.
    pub expansion: f64,
    pub block_offset: u32,
    pub min_block_size: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            expansion: DEFAULT_EXPANSION,
            block_offset: DEFAULT_BLOCK_OFFSET,
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
        }
    }
}

impl CompositorConfig {
    /// Pixelation block edge in pixels for a blur intensity.
    pub fn block_size(&self, intensity: u32) -> u32 {
        intensity
            .saturating_add(self.block_offset)
            .max(self.min_block_size)
            .max(1)
    }
}

/// Replaces each face region with flat blocks of its average color.
///
/// Blocks are anchored at the region's top-left corner; blocks on the
/// right and bottom edges are cropped to the region.
pub struct PixelateCompositor {
    block_size: u32,
    expansion: f64,
}

impl PixelateCompositor {
    pub fn new(intensity: u32, config: &CompositorConfig) -> Self {
        Self {
            block_size: config.block_size(intensity),
            expansion: config.expansion,
        }
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }
}

impl Default for PixelateCompositor {
    fn default() -> Self {
        Self::new(
            crate::shared::constants::DEFAULT_BLUR_INTENSITY,
            &CompositorConfig::default(),
        )
    }
}

impl RegionCompositor for PixelateCompositor {
    fn composite_region(
        &self,
        frame: &mut Frame,
        rect: &NormalizedRect,
    ) -> Result<(), CompositingError> {
        let region = PixelRegion::from_normalized(rect, frame.width(), frame.height(), self.expansion)
            .ok_or(CompositingError::EmptyRegion)?;
        let mut pixels = frame
            .as_ndarray_mut()
            .map_err(|e| CompositingError::FrameLayout(e.to_string()))?;
        pixelate(&mut pixels, &region, self.block_size as usize);
        Ok(())
    }
}

fn pixelate(pixels: &mut ArrayViewMut3<u8>, region: &PixelRegion, block: usize) {
    let (x, y) = (region.x as usize, region.y as usize);
    let (w, h) = (region.width as usize, region.height as usize);
    let mut roi = pixels.slice_mut(s![y..y + h, x..x + w, ..]);

    for by in (0..h).step_by(block) {
        for bx in (0..w).step_by(block) {
            let mut cell = roi.slice_mut(s![by..(by + block).min(h), bx..(bx + block).min(w), ..]);
            for mut channel in cell.axis_iter_mut(Axis(2)) {
                let n = channel.len() as u64;
                let sum: u64 = channel.iter().map(|&v| v as u64).sum();
                channel.fill(((sum + n / 2) / n) as u8);
            }
        }
    }
}
