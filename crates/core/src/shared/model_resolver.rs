use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    MissingOverride(PathBuf),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where a detector model can come from.
pub struct ModelSource<'a> {
    pub name: &'a str,
    pub url: &'a str,
    /// Explicit path given by the user. Must exist when set.
    pub override_path: Option<&'a Path>,
}

/// Resolve a model file, preferring local copies over a download.
///
/// Resolution order:
/// 1. Explicit override path
/// 2. `cache_dir/name`
/// 3. Download from `url` into `cache_dir`
pub fn resolve_in(
    source: &ModelSource<'_>,
    cache_dir: &Path,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = source.override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ModelResolveError::MissingOverride(path.to_path_buf()));
    }

    let cached_path = cache_dir.join(source.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    log::info!("Downloading {} to {}", source.name, cache_dir.display());
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(source.url, &cached_path, progress)?;
    Ok(cached_path)
}

/// [`resolve_in`] against the platform cache directory.
pub fn resolve(
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(source, &model_cache_dir()?, progress)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceTrack/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceTrack/models/` or `~/.cache/FaceTrack/models/`
/// - Windows: `%LOCALAPPDATA%/FaceTrack/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join("FaceTrack").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = stream_to(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn stream_to(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let download_err = |e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    };
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| ModelResolveError::Write { path, source: e }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total = response.content_length().unwrap_or(0);

    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;
    let mut buf = vec![0u8; 1024 * 1024];
    let mut downloaded: u64 = 0;
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))
}
