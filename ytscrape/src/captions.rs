use crate::error::{ScrapeError, ScrapeResult};
use crate::types::{ScrapeOptions, Unavailable};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Prefix of the temporary directory and of the caption file inside it
pub const TEMP_PREFIX: &str = "transcript_temp";

const CAPTION_EXTENSION: &str = "vtt";

/// A downloaded caption file. Dropping it deletes the file together with the
/// temporary directory it was written to.
#[derive(Debug)]
pub struct CaptionFile {
    path: PathBuf,
    _workspace: Option<TempDir>,
}

impl CaptionFile {
    /// Take ownership of a standalone file; it is removed on drop
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _workspace: None,
        }
    }

    fn in_workspace(path: PathBuf, workspace: TempDir) -> Self {
        Self {
            path,
            _workspace: Some(workspace),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> ScrapeResult<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl Drop for CaptionFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed caption file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", self.path.display(), e),
        }
    }
}

/// What a caption download produced
#[derive(Debug)]
pub enum CaptionFetch {
    Captions(CaptionFile),
    Unavailable(Unavailable),
}

/// Source of auto-generated caption files
#[async_trait]
pub trait CaptionFetcher: Send + Sync {
    async fn fetch(&self, video_url: &str) -> ScrapeResult<CaptionFetch>;
}

/// Runs `yt-dlp` to fetch auto-generated captions without downloading media
pub struct YtDlpCaptionFetcher {
    program: String,
    language: Option<String>,
    work_dir: PathBuf,
}

impl YtDlpCaptionFetcher {
    pub fn new(options: &ScrapeOptions) -> Self {
        Self {
            program: options.yt_dlp_path.clone(),
            language: options.subtitle_language.clone(),
            work_dir: options.work_dir.clone(),
        }
    }

    fn build_args(&self, output_template: &Path, video_url: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--write-auto-sub".into(),
            "--skip-download".into(),
            "--sub-format".into(),
            CAPTION_EXTENSION.into(),
            "--output".into(),
            output_template.as_os_str().to_owned(),
        ];

        if let Some(language) = &self.language {
            args.push("--sub-langs".into());
            args.push(language.into());
        }

        args.push("--".into());
        args.push(video_url.into());
        args
    }
}

#[async_trait]
impl CaptionFetcher for YtDlpCaptionFetcher {
    async fn fetch(&self, video_url: &str) -> ScrapeResult<CaptionFetch> {
        info!("Fetching auto-generated captions for {}", video_url);

        let workspace = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.work_dir)?;
        let template = workspace.path().join(TEMP_PREFIX);

        let output = Command::new(&self.program)
            .args(self.build_args(&template, video_url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ScrapeError::DownloaderLaunch {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!("{} exited with {}", self.program, output.status);
            return Ok(CaptionFetch::Unavailable(Unavailable::DownloaderFailed {
                status: output.status.code(),
                stderr,
            }));
        }

        match find_caption_file(workspace.path()).await? {
            Some(path) => {
                debug!("Found caption file {}", path.display());
                Ok(CaptionFetch::Captions(CaptionFile::in_workspace(
                    path, workspace,
                )))
            }
            None => {
                info!("No caption file was written for {}", video_url);
                Ok(CaptionFetch::Unavailable(Unavailable::NoCaptions))
            }
        }
    }
}

/// First `transcript_temp*.vtt` file in `dir`, by name
async fn find_caption_file(dir: &Path) -> ScrapeResult<Option<PathBuf>> {
    let mut matches = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_caption = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(TEMP_PREFIX))
            && path.extension().and_then(|ext| ext.to_str()) == Some(CAPTION_EXTENSION);

        if is_caption && entry.file_type().await?.is_file() {
            matches.push(path);
        }
    }

    matches.sort();
    Ok(matches.into_iter().next())
}
