pub mod pdftoppm;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use types::{RasterDiag, RasterizeError, RasterizedDocument};

/// Turns a PDF into an ordered sequence of page images.
///
/// A returned error means the whole document is unusable; callers skip it.
pub trait Rasterizer {
    fn doctor(&self) -> Result<RasterDiag>;
    fn rasterize(&self, pdf: &Path) -> Result<RasterizedDocument, RasterizeError>;
}
