// Command-line surface. Connection settings may also come from the
// environment so the password does not have to sit in shell history.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::chunks::DEFAULT_CHUNK_SIZE;
use crate::convert::DEFAULT_PROGRAM;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Piwigo images uploader", long_about = None)]
pub struct Args {
    /// URL of piwigo server
    #[arg(short, long, env = "PIWIGO_URL", value_name = "URL")]
    pub url: String,

    /// Login to use
    #[arg(short, long, env = "PIWIGO_LOGIN", value_name = "LOGIN")]
    pub login: String,

    /// Password to use
    #[arg(short, long, env = "PIWIGO_PASSWORD", value_name = "PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Album name
    #[arg(short, long, value_name = "ALBUM")]
    pub album: String,

    /// Resize images to this percentage of their size before upload
    #[arg(short, long, value_name = "CONVERT")]
    pub convert: Option<u32>,

    /// Program used for resizing (ImageMagick compatible)
    #[arg(long, env = "PIWIGO_CONVERT", value_name = "PROGRAM", default_value = DEFAULT_PROGRAM)]
    pub convert_program: String,

    /// Size of each uploaded chunk, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: NonZeroUsize,

    /// HTTP request timeout, in seconds (no timeout by default)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Do not show upload progress
    #[arg(short, long)]
    pub quiet: bool,

    /// Images to upload
    #[arg(value_name = "IMAGES")]
    pub images: Vec<PathBuf>,
}

impl Args {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

fn parse_chunk_size(s: &str) -> Result<NonZeroUsize, String> {
    let size = s.parse::<usize>().map_err(|e| e.to_string())?;
    NonZeroUsize::new(size).ok_or_else(|| "chunk size must be greater than zero".to_string())
}
