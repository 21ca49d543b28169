// API client module: a small blocking client for the Piwigo web service.
// `HttpTransport` does the HTTP exchange and keeps the session cookie;
// `PiwigoClient` builds the calls and interprets the answers.

use std::num::NonZeroUsize;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use roxmltree::Document;

use crate::chunks::{self, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::ws::{self, WsRequest};

/// Path of the web-service endpoint, relative to the gallery root.
pub const ENDPOINT: &str = "ws.php";

/// Sends one web-service call and returns the raw response body.
///
/// Implementations return the body for 2xx answers only. A non-2xx answer
/// whose body is a `stat="fail"` document becomes `Error::Api` with the
/// HTTP status attached, anything else `Error::Status`.
pub trait Transport {
    fn post(&self, request: &WsRequest) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, request: &WsRequest) -> Result<String> {
        (**self).post(request)
    }
}

/// Blocking HTTP transport. The underlying client keeps a cookie store, so
/// the session opened by the login call is reused by every later call.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = endpoint_url(base_url)?;
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|source| Error::Transport {
            method: "client setup".into(),
            source,
        })?;
        Ok(HttpTransport { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// `<base>/ws.php`, adding the slash the base URL may be missing.
pub fn endpoint_url(base_url: &str) -> Result<Url> {
    let invalid = |reason: String| Error::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };
    let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(ENDPOINT).map_err(|e| invalid(e.to_string()))
}

impl Transport for HttpTransport {
    fn post(&self, request: &WsRequest) -> Result<String> {
        let method = request.method();
        tracing::debug!(method, url = %self.endpoint, "sending request");

        let res = self
            .client
            .post(self.endpoint.clone())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(request.body())
            .send()
            .map_err(|source| Error::Transport {
                method: method.to_string(),
                source,
            })?;

        let status = res.status();
        let body = res.text().map_err(|source| Error::Transport {
            method: method.to_string(),
            source,
        })?;

        if status.is_success() {
            return Ok(body);
        }

        tracing::debug!(method, status = status.as_u16(), "request rejected");
        let details = Document::parse(&body)
            .ok()
            .and_then(|doc| ws::fail_details(&doc));
        match details {
            Some((code, message)) => Err(Error::Api {
                method: method.to_string(),
                status: Some(status.as_u16()),
                code,
                message,
            }),
            None => Err(Error::Status {
                method: method.to_string(),
                status: status.as_u16(),
                body,
            }),
        }
    }
}

/// Outcome of uploading one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    /// The image was sent and registered.
    Uploaded,
    /// The gallery already had an image with the same checksum.
    AlreadyExists,
}

impl UploadStatus {
    pub fn code(self) -> u8 {
        match self {
            UploadStatus::Uploaded => 0,
            UploadStatus::AlreadyExists => 1,
        }
    }
}

/// Authenticated session against one Piwigo server.
pub struct PiwigoClient<T> {
    transport: T,
    chunk_size: NonZeroUsize,
}

impl<T: Transport> PiwigoClient<T> {
    /// Logs in once with `username` and `password`. A rejected login fails
    /// here rather than on the first call that needs the session.
    pub fn connect(transport: T, username: &str, password: &str) -> Result<Self> {
        let client = PiwigoClient {
            transport,
            chunk_size: DEFAULT_CHUNK_SIZE,
        };
        client.login(username, password)?;
        tracing::info!(username, "logged in");
        Ok(client)
    }

    /// Changes the chunk size used by `upload`.
    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }

    fn login(&self, username: &str, password: &str) -> Result<()> {
        let request = WsRequest::session_login(username, password);
        let body = match self.transport.post(&request) {
            Ok(body) => body,
            Err(Error::Api { message, code, .. }) => {
                return Err(Error::AuthenticationFailed(format!("{} ({})", message, code)))
            }
            Err(e) => return Err(e),
        };
        match ws::parse_response(request.method(), &body) {
            Ok(_) => Ok(()),
            Err(Error::Api { message, code, .. }) => {
                Err(Error::AuthenticationFailed(format!("{} ({})", message, code)))
            }
            Err(e) => Err(e),
        }
    }

    /// Sends `request` and hands the checked document to `read`.
    fn call<R>(&self, request: &WsRequest, read: impl FnOnce(&Document<'_>) -> R) -> Result<R> {
        let body = self.transport.post(request)?;
        let doc = ws::parse_response(request.method(), &body)?;
        Ok(read(&doc))
    }

    /// Version string reported by the server.
    pub fn version(&self) -> Result<String> {
        self.call(&WsRequest::get_version(), ws::root_text)
    }

    /// Id of the first category, in server order, whose name is exactly
    /// `name`.
    pub fn find_category_id(&self, name: &str) -> Result<String> {
        let categories = self.call(&WsRequest::categories_get_list(true), ws::categories)?;
        tracing::debug!(count = categories.len(), "fetched categories");
        categories
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .ok_or_else(|| Error::CategoryNotFound(name.to_string()))
    }

    /// Asks the server whether an image with checksum `md5` is registered.
    pub fn image_exists(&self, md5: &str) -> Result<bool> {
        self.call(&WsRequest::images_exist(&[md5]), ws::names_existing_image)
    }

    /// Sends `payload` chunk by chunk, in position order, tagged with
    /// `checksum`. Stops at the first failing chunk. `progress` is told the
    /// position just sent and the total number of chunks.
    pub fn send_chunks(
        &self,
        payload: &[u8],
        checksum: &str,
        chunk_size: NonZeroUsize,
        mut progress: impl FnMut(u32, usize),
    ) -> Result<()> {
        let total = chunks::chunk_count(payload.len(), chunk_size);
        for chunk in chunks::split(payload, chunk_size) {
            let request = WsRequest::images_add_chunk(checksum, chunk.position, chunk.data);
            self.call(&request, |_| ())?;
            tracing::trace!(position = chunk.position, total, "chunk sent");
            progress(chunk.position, total);
        }
        Ok(())
    }

    /// Uploads one image into `category_id` under the display name `name`.
    pub fn upload(&self, payload: &[u8], name: &str, category_id: &str) -> Result<UploadStatus> {
        self.upload_with_progress(payload, name, category_id, |_, _| {})
    }

    /// `upload`, reporting chunk progress like `send_chunks`.
    pub fn upload_with_progress(
        &self,
        payload: &[u8],
        name: &str,
        category_id: &str,
        progress: impl FnMut(u32, usize),
    ) -> Result<UploadStatus> {
        let md5 = chunks::checksum(payload);
        // An unreadable answer only loses the shortcut; the finalize call
        // still reports duplicates.
        match self.image_exists(&md5) {
            Ok(true) => {
                tracing::info!(name, md5 = %md5, "image already present, skipping");
                return Ok(UploadStatus::AlreadyExists);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(name, md5 = %md5, error = %e, "existence check failed"),
        }

        self.send_chunks(payload, &md5, self.chunk_size, progress)?;

        match self.call(&WsRequest::images_add(&md5, name, category_id), |_| ()) {
            Ok(()) => {
                tracing::info!(name, md5 = %md5, category_id, bytes = payload.len(), "image added");
                Ok(UploadStatus::Uploaded)
            }
            Err(e) if e.is_already_exists() => {
                tracing::info!(name, md5 = %md5, "image already exists in album");
                Ok(UploadStatus::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }
}
