use futures::StreamExt;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::api::RecordStream;
use crate::error::{PipelineError, Result};

/// Make `path` an empty directory, creating it when missing and clearing it otherwise.
///
/// Safe to call repeatedly.
pub async fn prepare_output_directory(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => debug!("Cleared output directory {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(PipelineError::io(path, e)),
    }

    fs::create_dir_all(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;

    info!("Prepared output directory {}", path.display());
    Ok(())
}

/// Regular files in `dir`, sorted by name, optionally limited to one extension.
///
/// A missing directory yields an empty list.
pub async fn list_files(dir: &Path, extension: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PipelineError::io(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| PipelineError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        let matches = match extension {
            Some(ext) => path.extension().is_some_and(|e| e == ext),
            None => true,
        };
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Drain `source` into a new file at `path`.
///
/// Bytes go to `<path>.part` first, which is renamed to `path` only after the
/// source is exhausted and the file has been flushed and synced. On any error
/// the partial file is removed, so `path` either holds the complete stream or
/// does not exist. Source errors are returned as they are; write errors become
/// [`PipelineError::WriteStream`]. Returns the number of bytes written.
pub async fn write_stream_to_file(source: RecordStream, path: &Path) -> Result<u64> {
    let partial = partial_path(path);

    let result = drain_into(source, &partial).await;
    let result = match result {
        Ok(written) => fs::rename(&partial, path)
            .await
            .map(|()| written)
            .map_err(|e| PipelineError::WriteStream {
                path: path.to_path_buf(),
                source: e,
            }),
        Err(e) => Err(e),
    };

    if result.is_err() {
        match fs::remove_file(&partial).await {
            Ok(()) => debug!("Removed partial file {}", partial.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial file {}: {}", partial.display(), e),
        }
    }
    result
}

/// `<path>.part`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn drain_into(mut source: RecordStream, path: &Path) -> Result<u64> {
    let write_error = |source: std::io::Error| PipelineError::WriteStream {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(path).await.map_err(write_error)?;
    let mut written = 0u64;

    while let Some(chunk) = source.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(write_error)?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(write_error)?;
    file.sync_all().await.map_err(write_error)?;

    debug!("Wrote {} bytes to {}", written, path.display());
    Ok(written)
}
