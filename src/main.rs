// Entrypoint for the uploader.
// - Keeps `main` small: set up logging, build the HTTP transport and hand
//   everything to `ui::run`.
// - Log output goes to stderr; stdout only carries the per-image status.

use std::process::ExitCode;

use clap::Parser;
use piwigo_upload::{cli::Args, convert::ExternalResizer, ui, HttpTransport};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn,piwigo_upload=info".to_string());
    fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<u8> {
    let transport = HttpTransport::new(&args.url, args.timeout())?;
    tracing::debug!(endpoint = %transport.endpoint(), "using endpoint");
    let resizer = ExternalResizer::new(args.convert_program.clone());
    ui::run(args, transport, &resizer, &mut std::io::stdout().lock())
}
