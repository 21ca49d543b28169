// Piwigo web-service calls. Every remote method the uploader uses has one
// constructor here, so a call cannot be built with a misspelled method name
// or a missing parameter. Values are encoded by the constructors; `body()`
// only joins them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use roxmltree::{Document, Node};

use crate::error::{Error, Result};

pub const LOGIN: &str = "pwg.session.login";
pub const GET_VERSION: &str = "pwg.getVersion";
pub const CATEGORIES_GET_LIST: &str = "pwg.categories.getList";
pub const IMAGES_EXIST: &str = "pwg.images.exist";
pub const IMAGES_ADD_CHUNK: &str = "pwg.images.addChunk";
pub const IMAGES_ADD: &str = "pwg.images.add";

/// A single web-service call: the method name and its already-encoded
/// parameters, in the order they are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsRequest {
    method: &'static str,
    params: Vec<(&'static str, String)>,
}

impl WsRequest {
    fn new(method: &'static str) -> Self {
        WsRequest {
            method,
            params: Vec::new(),
        }
    }

    fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    pub fn session_login(username: &str, password: &str) -> Self {
        WsRequest::new(LOGIN)
            .param("username", urlencoding::encode(username))
            .param("password", urlencoding::encode(password))
    }

    pub fn get_version() -> Self {
        WsRequest::new(GET_VERSION)
    }

    pub fn categories_get_list(recursive: bool) -> Self {
        WsRequest::new(CATEGORIES_GET_LIST).param("recursive", recursive.to_string())
    }

    pub fn images_exist(md5sums: &[&str]) -> Self {
        WsRequest::new(IMAGES_EXIST).param("md5sum_list", md5sums.join(","))
    }

    /// `data` is the raw chunk; it goes out base64-encoded, then URL-encoded.
    pub fn images_add_chunk(original_sum: &str, position: u32, data: &[u8]) -> Self {
        let encoded = STANDARD.encode(data);
        WsRequest::new(IMAGES_ADD_CHUNK)
            .param("original_sum", original_sum)
            .param("position", position.to_string())
            .param("type", "file")
            .param("data", urlencoding::encode(&encoded))
    }

    pub fn images_add(original_sum: &str, name: &str, category_id: &str) -> Self {
        WsRequest::new(IMAGES_ADD)
            .param("original_sum", original_sum)
            .param("name", urlencoding::encode(name))
            .param("categories", category_id)
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    /// Value of the first parameter named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Form body: `method=<M>&k1=v1&k2=v2...`.
    pub fn body(&self) -> String {
        let mut body = format!("method={}", self.method);
        for (key, value) in &self.params {
            body.push('&');
            body.push_str(key);
            body.push('=');
            body.push_str(value);
        }
        body
    }
}

/// Parses a web-service response and checks its `stat` attribute.
///
/// Returns the document on `stat="ok"`; a `stat="fail"` answer becomes
/// `Error::Api`. A body that is not XML is logged as is and reported as
/// `Error::MalformedResponse`.
pub fn parse_response<'a>(method: &str, body: &'a str) -> Result<Document<'a>> {
    let doc = match Document::parse(body) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(method, body, "response is not XML");
            return Err(Error::MalformedResponse {
                method: method.to_string(),
                reason: e.to_string(),
            });
        }
    };

    let root = doc.root_element();
    if root.tag_name().name() != "rsp" {
        return Err(Error::MalformedResponse {
            method: method.to_string(),
            reason: format!("unexpected root element <{}>", root.tag_name().name()),
        });
    }

    match root.attribute("stat") {
        Some("ok") => Ok(doc),
        Some("fail") => {
            let (code, message) = fail_details(&doc).unwrap_or((0, String::new()));
            Err(Error::Api {
                method: method.to_string(),
                status: None,
                code,
                message,
            })
        }
        other => Err(Error::MalformedResponse {
            method: method.to_string(),
            reason: format!("unexpected stat {:?}", other),
        }),
    }
}

/// Code and message of the `<err>` element of a failed response.
pub fn fail_details(doc: &Document<'_>) -> Option<(u16, String)> {
    let err = doc
        .root_element()
        .children()
        .find(|n| n.has_tag_name("err"))?;
    let code = err
        .attribute("code")
        .and_then(|c| c.trim().parse().ok())
        .unwrap_or(0);
    let message = err.attribute("msg").unwrap_or_default().to_string();
    Some((code, message))
}

/// A category node as listed by `pwg.categories.getList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Every `category` element in document order.
pub fn categories(doc: &Document<'_>) -> Vec<Category> {
    doc.descendants()
        .filter(|n| n.has_tag_name("category"))
        .filter_map(|node| {
            let id = node.attribute("id")?.to_string();
            let name = node
                .children()
                .find(|n| n.has_tag_name("name"))
                .map(|n| n.text().unwrap_or_default().to_string())
                .or_else(|| node.attribute("name").map(str::to_string))?;
            Some(Category { id, name })
        })
        .collect()
}

/// Text content of the `rsp` element, trimmed.
pub fn root_text(doc: &Document<'_>) -> String {
    doc.root_element()
        .children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Whether an `pwg.images.exist` answer names an image id.
///
/// Missing images come back as empty elements; a known one carries its
/// positive id either as element text or as an `id` attribute.
pub fn names_existing_image(doc: &Document<'_>) -> bool {
    let positive = |s: &str| s.trim().parse::<u64>().map_or(false, |id| id > 0);
    doc.root_element().descendants().skip(1).any(|n| {
        n.is_element()
            && (n.attribute("id").map_or(false, positive)
                || n
                    .children()
                    .filter(Node::is_text)
                    .filter_map(|t| t.text())
                    .any(positive))
    })
}
