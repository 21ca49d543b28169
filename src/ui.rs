// Driver: log in, resolve the album once, then upload every image in turn.
// One failing image is reported and the loop moves on to the next one.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{PiwigoClient, Transport, UploadStatus};
use crate::cli::Args;
use crate::convert::Resizer;
use crate::error::Error;

/// Every image uploaded or already present.
pub const EXIT_OK: u8 = 0;
/// The album could not be resolved; nothing was uploaded.
pub const EXIT_ALBUM_NOT_FOUND: u8 = 1;
/// At least one image failed.
pub const EXIT_UPLOAD_FAILED: u8 = 2;

/// Per-run tally printed at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub uploaded: usize,
    pub already_present: usize,
    pub failed: Vec<PathBuf>,
}

impl Summary {
    pub fn exit_code(&self) -> u8 {
        if self.failed.is_empty() {
            EXIT_OK
        } else {
            EXIT_UPLOAD_FAILED
        }
    }
}

/// Display name of an image: its file name without the extension.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Runs one upload session and returns the process exit code.
///
/// Status lines go to `out`. Errors before the album is resolved (bad URL,
/// rejected login, unreachable server) are returned; an unknown album is
/// reported on `out` and yields `EXIT_ALBUM_NOT_FOUND`.
pub fn run<T: Transport, R: Resizer>(
    args: &Args,
    transport: T,
    resizer: &R,
    out: &mut dyn Write,
) -> Result<u8> {
    let client = PiwigoClient::connect(transport, &args.login, &args.password)
        .with_context(|| format!("Unable to log in to {}", args.url))?
        .with_chunk_size(args.chunk_size);

    match client.version() {
        Ok(version) => tracing::debug!(version = %version, "server version"),
        Err(e) => tracing::debug!(error = %e, "could not read server version"),
    }

    let album_id = match client.find_category_id(&args.album) {
        Ok(id) => id,
        Err(Error::CategoryNotFound(_)) => {
            writeln!(out, "Unable to find {} album", args.album)?;
            return Ok(EXIT_ALBUM_NOT_FOUND);
        }
        Err(e) => return Err(e).context("Unable to list albums"),
    };
    tracing::info!(album = %args.album, album_id = %album_id, "album resolved");

    let convert = args.convert.map(|percentage| (resizer, percentage));
    let summary = upload_all(&client, &album_id, &args.images, convert, !args.quiet, out)?;

    writeln!(
        out,
        "{} uploaded, {} already present, {} failed",
        summary.uploaded,
        summary.already_present,
        summary.failed.len()
    )?;
    for path in &summary.failed {
        tracing::warn!(path = %path.display(), "not uploaded");
    }
    Ok(summary.exit_code())
}

/// Uploads `images` into `album_id`, continuing past failures.
pub fn upload_all<T: Transport, R: Resizer>(
    client: &PiwigoClient<T>,
    album_id: &str,
    images: &[PathBuf],
    convert: Option<(&R, u32)>,
    show_progress: bool,
    out: &mut dyn Write,
) -> Result<Summary> {
    let mut summary = Summary::default();
    for path in images {
        match upload_one(client, album_id, path, convert, show_progress) {
            Ok((name, UploadStatus::Uploaded)) => {
                tracing::debug!(name = %name, "uploaded");
                writeln!(out, "{} correctly uploaded", path.display())?;
                summary.uploaded += 1;
            }
            Ok((name, UploadStatus::AlreadyExists)) => {
                writeln!(out, "{} already exists in album", name)?;
                summary.already_present += 1;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{:#}", e), "upload failed");
                writeln!(out, "{}: upload failed: {:#}", path.display(), e)?;
                summary.failed.push(path.clone());
            }
        }
    }
    Ok(summary)
}

fn upload_one<T: Transport, R: Resizer>(
    client: &PiwigoClient<T>,
    album_id: &str,
    path: &Path,
    convert: Option<(&R, u32)>,
    show_progress: bool,
) -> Result<(String, UploadStatus)> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let payload = match convert {
        Some((resizer, percentage)) => resizer
            .resize(&raw, percentage)
            .with_context(|| format!("Failed to resize {}", path.display()))?,
        None => raw,
    };
    let name = display_name(path);

    let bar = if show_progress {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len} chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(name.clone());

    let status = client.upload_with_progress(&payload, &name, album_id, |position, total| {
        bar.set_length(total as u64);
        bar.set_position(u64::from(position));
    });
    bar.finish_and_clear();

    Ok((name, status?))
}
