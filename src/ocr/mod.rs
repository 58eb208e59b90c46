//! Text recognition and PDF rasterization collaborators.
//!
//! Production adapters shell out to `tesseract` and Poppler's `pdftoppm`; each subprocess runs
//! under a timeout and is killed when it expires. The in-process adapters treat input bytes as
//! UTF-8 text and are meant for fixtures.

use crate::config::Config;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Errors raised while rendering or recognizing pages.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The external program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program name or path.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The external program exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        /// Program name or path.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
    /// The external program did not finish in time.
    #[error("{program} timed out after {seconds}s")]
    Timeout {
        /// Program name or path.
        program: String,
        /// Configured limit.
        seconds: u64,
    },
    /// Scratch files could not be written or read.
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),
    /// The source contained no renderable pages.
    #[error("document has no pages")]
    NoPages,
}

/// Converts one page image into raw text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text in an encoded image.
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError>;
}

/// Rasterizes a PDF into one encoded image per page, in page order.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render every page of `pdf`.
    async fn render(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, OcrError>;
}

/// Build the subprocess-backed OCR engine and renderer from `config`.
pub fn build_ocr(config: &Config) -> (TesseractOcr, PdftoppmRenderer) {
    let timeout = Duration::from_secs(config.ocr_timeout_secs);
    (
        TesseractOcr {
            program: config.tesseract_bin.clone(),
            language: config.tesseract_lang.clone(),
            timeout,
        },
        PdftoppmRenderer {
            program: config.pdftoppm_bin.clone(),
            dpi: config.pdf_render_dpi,
            timeout,
        },
    )
}

/// Runs `tesseract stdin stdout -l <lang>`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: String,
    language: String,
    timeout: Duration,
}

impl TesseractOcr {
    /// Engine invoking `program` with the given language pack.
    pub fn new(program: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            timeout,
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let mut command = Command::new(&self.program);
        command.args(["stdin", "stdout", "-l", self.language.as_str()]);
        let stdout = run(&self.program, command, Some(image.to_vec()), self.timeout).await?;
        let text = String::from_utf8_lossy(&stdout).into_owned();
        tracing::debug!(chars = text.len(), "OCR pass complete");
        Ok(text)
    }
}

/// Runs `pdftoppm -r <dpi> -png` in a scratch directory.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    program: String,
    dpi: u32,
    timeout: Duration,
}

impl PdftoppmRenderer {
    /// Renderer invoking `program` at `dpi`.
    pub fn new(program: impl Into<String>, dpi: u32, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            dpi,
            timeout,
        }
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, OcrError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.pdf");
        tokio::fs::write(&input, pdf).await?;

        let mut command = Command::new(&self.program);
        command
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(scratch.path().join("page"));
        run(&self.program, command, None, self.timeout).await?;

        let mut pages = Vec::new();
        for path in rendered_pages(scratch.path())? {
            pages.push(tokio::fs::read(&path).await?);
        }
        if pages.is_empty() {
            return Err(OcrError::NoPages);
        }
        tracing::debug!(pages = pages.len(), dpi = self.dpi, "Rendered PDF pages");
        Ok(pages)
    }
}

/// `page-N.png` files in `dir`, ordered by page number rather than by name.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut numbered = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let number = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix("page-"))
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|digits| digits.parse::<u32>().ok());
        if let Some(number) = number {
            numbered.push((number, path));
        }
    }
    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

async fn run(
    program: &str,
    mut command: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<Vec<u8>, OcrError> {
    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| OcrError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if let Some(bytes) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        tokio::spawn(async move {
            if let Err(error) = pipe.write_all(&bytes).await {
                tracing::debug!(error = %error, "Subprocess closed stdin early");
            }
        });
    }

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| OcrError::Timeout {
            program: program.to_string(),
            seconds: timeout.as_secs(),
        })??;

    if !output.status.success() {
        return Err(OcrError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// In-process engine that reads image bytes as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextOcr;

#[async_trait]
impl OcrEngine for PlainTextOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        Ok(String::from_utf8_lossy(image).into_owned())
    }
}

/// In-process renderer that splits a text "PDF" on form feeds, one page per segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormFeedRenderer;

#[async_trait]
impl PageRenderer for FormFeedRenderer {
    async fn render(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, OcrError> {
        if pdf.is_empty() {
            return Err(OcrError::NoPages);
        }
        Ok(pdf
            .split(|byte| *byte == b'\x0c')
            .map(<[u8]>::to_vec)
            .collect())
    }
}
