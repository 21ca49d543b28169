// Library root
// -----------
// Uploads images to a Piwigo gallery through its web-service API. The
// binary (`main.rs`) parses arguments and hands them to `ui::run`.
//
// Module responsibilities:
// - `ws`: one typed constructor per remote method, XML answer parsing.
// - `api`: HTTP transport with the session cookie, and the client that
//   logs in, resolves albums and uploads images chunk by chunk.
// - `chunks`: payload splitting and the MD5 checksum.
// - `convert`: optional resizing through an external program.
// - `cli` / `ui`: argument definitions and the upload loop.
pub mod api;
pub mod chunks;
pub mod cli;
pub mod convert;
pub mod error;
pub mod ui;
pub mod ws;

pub use api::{HttpTransport, PiwigoClient, Transport, UploadStatus};
pub use error::{Error, Result};
