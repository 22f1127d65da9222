//! Single request/response exchange with the Tado endpoints.
//!
//! - Blocking client using `ureq` (no async), one attempt per call.
//! - Requests and responses are plain `http` types so callers can be tested
//!   without a network.

use crate::error::ApiError;
use http::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub type HttpRequest = http::Request<Vec<u8>>;
pub type HttpResponse = http::Response<Vec<u8>>;

const ERROR_BODY_PREVIEW: usize = 256;

pub trait Transport: Send + Sync {
    /// Perform exactly one exchange. Non-2xx statuses are returned as responses, not errors.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        UreqTransport {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let (parts, body) = request.into_parts();
        let result = match &parts.method {
            &Method::GET => {
                let mut req = self.agent.get(parts.uri.clone());
                for (name, value) in parts.headers.iter() {
                    req = req.header(name.clone(), value.clone());
                }
                req.call()
            }
            &Method::POST => {
                let mut req = self.agent.post(parts.uri.clone());
                for (name, value) in parts.headers.iter() {
                    req = req.header(name.clone(), value.clone());
                }
                req.send(&body[..])
            }
            other => return Err(ApiError::InvalidRequest(format!("unsupported method {}", other))),
        };

        let response = result.map_err(|e| ApiError::Transport(format!("{} {}: {}", parts.method, parts.uri, e)))?;
        let (resp_parts, mut resp_body) = response.into_parts();
        let bytes = resp_body
            .read_to_vec()
            .map_err(|e| ApiError::Transport(format!("reading body of {}: {}", parts.uri, e)))?;
        Ok(http::Response::from_parts(resp_parts, bytes))
    }
}

/// Map a non-2xx status to `BadStatus`, otherwise decode the JSON body.
pub fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::BadStatus {
            status: status.as_u16(),
            message: body_preview(response.body()),
        });
    }

    let mut de = serde_json::Deserializer::from_slice(response.body());
    let value = serde_path_to_error::deserialize(&mut de)?;
    de.end().map_err(|e| ApiError::Decode {
        path: ".".to_string(),
        message: e.to_string(),
    })?;
    Ok(value)
}

/// Execute and decode in one step.
pub fn send_json<T: DeserializeOwned>(transport: &dyn Transport, request: HttpRequest) -> Result<T, ApiError> {
    let response = transport.execute(request)?;
    decode_json(&response)
}

fn body_preview(body: &[u8]) -> String {
    if body.is_empty() {
        return String::from("<no body>");
    }
    let text = String::from_utf8_lossy(body);
    if text.chars().count() > ERROR_BODY_PREVIEW {
        let cut = text.chars().take(ERROR_BODY_PREVIEW).collect::<String>();
        format!("{}…", cut)
    } else {
        text.into_owned()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tado::TokenPair;

    fn response(status: u16, body: &str) -> HttpResponse {
        http::Response::builder()
            .status(status)
            .body(body.as_bytes().to_vec())
            .expect("response")
    }

    #[test]
    fn non_success_status_is_bad_status() {
        let err = decode_json::<TokenPair>(&response(503, "upstream down")).unwrap_err();
        match err {
            ApiError::BadStatus { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_error_body_is_labelled() {
        let err = decode_json::<TokenPair>(&response(401, "")).unwrap_err();
        assert!(err.to_string().contains("<no body>"));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn decode_error_reports_field_path() {
        let err = decode_json::<TokenPair>(&response(200, r#"{"access_token": 5, "refresh_token": "r"}"#)).unwrap_err();
        match err {
            ApiError::Decode { path, .. } => assert_eq!(path, "access_token"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trailing_garbage_is_a_decode_error() {
        let err = decode_json::<TokenPair>(&response(200, r#"{"access_token":"a","refresh_token":"r"} x"#)).unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    mod over_the_wire {
        use super::*;
        use crossbeam_channel::{Receiver, bounded};
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::{TcpListener, TcpStream};
        use std::thread;
        use std::time::Instant;

        /// Read one request head plus its body, if any.
        fn read_request(stream: &TcpStream) -> String {
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).expect("request line") == 0 {
                    break;
                }
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("content length");
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).expect("request body");
            String::from_utf8_lossy(&body).into_owned()
        }

        /// Answer a single connection with `reply`, handing back the request body.
        fn serve_once(reply: &'static str) -> (String, Receiver<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            let addr = listener.local_addr().expect("addr");
            let (tx, rx) = bounded(1);
            thread::spawn(move || {
                let (mut stream, _) = listener.accept().expect("accept");
                let body = read_request(&stream);
                stream.write_all(reply.as_bytes()).expect("write reply");
                let _ = tx.send(body);
            });
            (format!("http://{}", addr), rx)
        }

        #[test]
        fn error_status_comes_back_as_a_response() {
            let (base, received) = serve_once(
                "HTTP/1.1 401 Unauthorized\r\nContent-Type: text/plain\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope",
            );
            let transport = UreqTransport::new(Duration::from_secs(5));
            let request = http::Request::builder()
                .method(Method::POST)
                .uri(format!("{}/oauth/token", base))
                .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(b"grant_type=password".to_vec())
                .expect("request");

            let response = transport.execute(request).expect("401 is not a transport error");
            assert_eq!(response.status().as_u16(), 401);
            assert_eq!(
                received.recv_timeout(Duration::from_secs(5)).expect("request body"),
                "grant_type=password"
            );

            match decode_json::<TokenPair>(&response).unwrap_err() {
                ApiError::BadStatus { status, message } => {
                    assert_eq!(status, 401);
                    assert_eq!(message, "nope");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn stalled_server_hits_the_request_timeout() {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            let addr = listener.local_addr().expect("addr");
            let (release_tx, release_rx) = bounded::<()>(1);
            let server = thread::spawn(move || {
                let (stream, _) = listener.accept().expect("accept");
                read_request(&stream);
                // hold the connection open without replying
                let _ = release_rx.recv_timeout(Duration::from_secs(10));
                drop(stream);
            });

            let timeout = Duration::from_millis(300);
            let transport = UreqTransport::new(timeout);
            let request = http::Request::builder()
                .method(Method::GET)
                .uri(format!("http://{}/me", addr))
                .body(Vec::new())
                .expect("request");

            let started = Instant::now();
            let err = transport.execute(request).unwrap_err();
            let elapsed = started.elapsed();
            let _ = release_tx.send(());
            server.join().expect("server thread");

            assert!(matches!(err, ApiError::Transport(_)), "{err}");
            assert!(elapsed >= timeout / 2, "gave up too early: {elapsed:?}");
            assert!(elapsed < Duration::from_secs(5), "timeout not applied: {elapsed:?}");
        }
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let long = "x".repeat(ERROR_BODY_PREVIEW + 50);
        let preview = body_preview(long.as_bytes());
        assert_eq!(preview.chars().count(), ERROR_BODY_PREVIEW + 1);
        assert!(preview.ends_with('…'));
    }
}
