use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};
use tracing::{debug, warn};

use super::{command::run_with_timeout, layout, RawTable, TableDetector};
use crate::{config::OcrConfig, error::ExtractError};

/// Rasterize with `pdftoppm`, OCR with `tesseract`, rebuild the grid from the
/// word boxes. Both tools must be on `PATH`.
#[derive(Debug, Clone)]
pub struct TesseractDetector {
    lang: String,
    psm: u32,
    dpi: u32,
    timeout: Duration,
}

impl TesseractDetector {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            lang: config.lang.clone(),
            psm: config.psm,
            dpi: config.dpi,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn ocr_page(&self, pdf: &Path, page: usize, scratch: &Path) -> Result<String, ExtractError> {
        // 1) page → PNG
        let image_root = scratch.join(format!("page_{page}"));
        let mut pdftoppm = Command::new("pdftoppm");
        pdftoppm
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-singlefile")
            .arg("-png")
            .arg(pdf)
            .arg(&image_root);
        run_with_timeout(pdftoppm, self.timeout)?;

        let png = image_root.with_extension("png");
        if !png.exists() {
            return Err(ExtractError::Ocr(format!(
                "pdftoppm produced no image for page {page} of {}",
                pdf.display()
            )));
        }

        // 2) PNG → word-level TSV
        let tsv_root: PathBuf = scratch.join(format!("page_{page}_ocr"));
        let mut tesseract = Command::new("tesseract");
        tesseract
            .arg(&png)
            .arg(&tsv_root)
            .arg("-l")
            .arg(&self.lang)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv");
        run_with_timeout(tesseract, self.timeout)?;

        let tsv_path = tsv_root.with_extension("tsv");
        fs::read_to_string(&tsv_path).map_err(|source| ExtractError::Io {
            action: format!("reading OCR output {}", tsv_path.display()),
            source,
        })
    }
}

impl TableDetector for TesseractDetector {
    fn detect(&self, path: &Path, pages: &[usize]) -> Result<Vec<RawTable>, ExtractError> {
        fs::metadata(path).map_err(|source| ExtractError::Io {
            action: format!("reading {}", path.display()),
            source,
        })?;

        let scratch = tempfile::Builder::new()
            .prefix("grazing_ocr_")
            .tempdir()
            .map_err(|source| ExtractError::Io {
                action: "creating OCR scratch directory".into(),
                source,
            })?;

        let mut tables = Vec::new();
        for &page in pages {
            let tsv = self.ocr_page(path, page, scratch.path())?;
            let words = layout::parse_tsv(&tsv)?;
            let confidence = layout::mean_confidence(&words);
            debug!(page, words = words.len(), ?confidence, "OCR words read");
            if confidence.is_some_and(|c| c < layout::LOW_CONFIDENCE) {
                warn!(page, ?confidence, "low OCR confidence on {}", path.display());
            }
            if let Some(table) = layout::build_table(&words) {
                tables.push(table);
            }
        }
        Ok(tables)
    }
}
