// Runs `HttpTransport` against a tiny HTTP/1.1 server on the loopback
// interface. Each connection serves one request and is then closed.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use piwigo_upload::{Error, HttpTransport, PiwigoClient, UploadStatus};

/// One request as seen by the server: request line, lowercased headers, body.
#[derive(Debug, Clone)]
struct Seen {
    request_line: String,
    headers: Vec<String>,
    body: String,
}

impl Seen {
    fn method(&self) -> &str {
        self.body
            .split('&')
            .find_map(|kv| kv.strip_prefix("method="))
            .unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}:", name);
        self.headers
            .iter()
            .find_map(|h| h.strip_prefix(prefix.as_str()))
            .map(str::trim)
    }
}

struct Reply {
    status: &'static str,
    content_type: &'static str,
    extra_headers: &'static str,
    body: String,
}

fn xml(status: &'static str, body: &str) -> Reply {
    Reply {
        status,
        content_type: "text/xml",
        extra_headers: "",
        body: body.to_string(),
    }
}

/// Answers like a gallery that already holds every image it is sent.
fn route(seen: &Seen) -> Reply {
    match seen.method() {
        "pwg.session.login" => Reply {
            extra_headers: "Set-Cookie: pwg_id=abc123; path=/\r\n",
            ..xml("200 OK", r#"<rsp stat="ok">1</rsp>"#)
        },
        "pwg.images.exist" => xml("200 OK", r#"<rsp stat="ok"><image md5sum="x"/></rsp>"#),
        "pwg.images.addChunk" => xml("200 OK", r#"<rsp stat="ok"></rsp>"#),
        "pwg.images.add" => xml(
            "500 file already exists",
            r#"<rsp stat="fail"><err code="500" msg="file already exists"/></rsp>"#,
        ),
        "pwg.categories.getList" => xml(
            "500 Internal Server Error",
            r#"<rsp stat="fail"><err code="500" msg="Invalid category"/></rsp>"#,
        ),
        _ => Reply {
            status: "502 Bad Gateway",
            content_type: "text/html",
            extra_headers: "",
            body: "<html><body><h1>502 Bad Gateway</h1></body></html>".to_string(),
        },
    }
}

fn read_request(stream: &TcpStream) -> std::io::Result<Seen> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end().to_string();
        if line.is_empty() {
            break;
        }
        headers.push(line.to_ascii_lowercase());
    }

    let len = headers
        .iter()
        .find_map(|h| h.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; len];
    reader.read_exact(&mut body)?;

    Ok(Seen {
        request_line: request_line.trim_end().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Starts the server and returns its base URL plus the request log.
fn serve() -> (String, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}/gallery", listener.local_addr().unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));
    let server_log = Arc::clone(&log);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let Ok(seen) = read_request(&stream) else { continue };
            let reply = route(&seen);
            server_log.lock().unwrap().push(seen);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
                reply.status,
                reply.content_type,
                reply.body.len(),
                reply.extra_headers,
                reply.body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (base, log)
}

fn connect(base: &str) -> PiwigoClient<HttpTransport> {
    let transport = HttpTransport::new(base, None).unwrap();
    PiwigoClient::connect(transport, "admin", "pw").unwrap()
}

#[test]
fn posts_form_body_to_ws_php() {
    let (base, log) = serve();
    let _client = connect(&base);

    let log = log.lock().unwrap();
    let login = &log[0];
    assert_eq!(login.request_line, "POST /gallery/ws.php HTTP/1.1");
    assert_eq!(
        login.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(
        login.body,
        "method=pwg.session.login&username=admin&password=pw"
    );
}

#[test]
fn session_cookie_is_sent_back() {
    let (base, log) = serve();
    let client = connect(&base);
    let _ = client.image_exists("abc");

    let log = log.lock().unwrap();
    assert_eq!(log[0].header("cookie"), None);
    let exist = log.iter().find(|s| s.method() == "pwg.images.exist").unwrap();
    assert!(exist.header("cookie").unwrap().contains("pwg_id=abc123"));
}

#[test]
fn finalize_conflict_over_http_means_already_exists() {
    let (base, log) = serve();
    let client = connect(&base);

    let status = client.upload(b"pixels", "beach", "42").unwrap();
    assert_eq!(status, UploadStatus::AlreadyExists);

    let methods: Vec<String> = log
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.method().to_string())
        .collect();
    assert_eq!(
        methods,
        vec![
            "pwg.session.login",
            "pwg.images.exist",
            "pwg.images.addChunk",
            "pwg.images.add",
        ]
    );
}

#[test]
fn fail_body_keeps_http_status() {
    let (base, _log) = serve();
    let client = connect(&base);

    match client.find_category_id("Vacation2023") {
        Err(Error::Api {
            status,
            code,
            message,
            ..
        }) => {
            assert_eq!(status, Some(500));
            assert_eq!(code, 500);
            assert_eq!(message, "Invalid category");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn html_error_page_is_a_status_error() {
    let (base, _log) = serve();
    let client = connect(&base);

    match client.version() {
        Err(Error::Status { status, body, .. }) => {
            assert_eq!(status, 502);
            assert!(body.contains("Bad Gateway"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let transport = HttpTransport::new(&format!("http://127.0.0.1:{}", port), None).unwrap();
    assert!(matches!(
        PiwigoClient::connect(transport, "admin", "pw"),
        Err(Error::Transport { .. })
    ));
}
