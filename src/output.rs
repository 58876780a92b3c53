//! Output directory layout.

use crate::error::Result;
use crate::image::GeneratedImage;
use std::path::{Path, PathBuf};

/// Name of the summary file written next to the images.
pub const REPORT_FILE_NAME: &str = "generation_report.txt";

/// Directory that receives generated images, debug dumps and the report.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Creates the directory (and parents) if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// File name for a row's image: `row_0007.png`.
    pub fn image_file_name(row_number: u32) -> String {
        format!("row_{row_number:04}.png")
    }

    /// Full path for a row's image.
    pub fn image_path(&self, row_number: u32) -> PathBuf {
        self.root.join(Self::image_file_name(row_number))
    }

    /// Path of the summary report.
    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE_NAME)
    }

    /// Writes a row's image as PNG and returns where it went.
    pub fn save_row_image(&self, row_number: u32, image: &GeneratedImage) -> Result<PathBuf> {
        let path = self.image_path(row_number);
        image.save_png(&path)?;
        Ok(path)
    }

    /// Writes a smoke-test image under `smoke/`, named by the current time.
    pub fn save_smoke_image(&self, image: &GeneratedImage) -> Result<PathBuf> {
        let dir = self.root.join("smoke");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("smoke_{}.png", chrono::Utc::now().timestamp()));
        image.save_png(&path)?;
        Ok(path)
    }
}
