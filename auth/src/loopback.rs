//! Local redirect listener for the authorization-code flow.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use crate::AuthError;

/// How long a connection may stay silent before it is dropped.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>\
<p>You may close this window and return to the application.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>\
<p>Return to the application for details.</p></body></html>";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Callback {
    Code { code: String, state: Option<String> },
    Denied(String),
    /// Anything else the browser asks for, e.g. `/favicon.ico`.
    Ignored,
}

pub(crate) struct LoopbackListener {
    listener: TcpListener,
    port: u16,
}

impl LoopbackListener {
    pub(crate) async fn bind(port: u16) -> Result<Self, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| AuthError::Consent(format!("failed to bind redirect listener: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Consent(e.to_string()))?
            .port();
        debug!(port, "redirect listener bound");
        Ok(Self { listener, port })
    }

    pub(crate) fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Serve redirect requests until one carries an authorization code or an
    /// error, and return the code once its state matches `expected_state`.
    ///
    /// Each connection is handled on its own task so an idle or broken
    /// connection (browser preconnects, stray probes) never holds up the
    /// real redirect.
    pub(crate) async fn wait_for_code(&self, expected_state: &str) -> Result<String, AuthError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(|e| {
                        AuthError::Consent(format!("redirect listener failed: {}", e))
                    })?;
                    debug!(%peer, "redirect connection accepted");
                    let tx = tx.clone();
                    let port = self.port;
                    let expected_state = expected_state.to_owned();
                    tokio::spawn(async move {
                        if let Some(outcome) = handle_connection(stream, port, &expected_state).await {
                            // The receiver is gone once another connection settled the flow.
                            let _ = tx.send(outcome);
                        }
                    });
                }
                Some(outcome) = rx.recv() => return outcome,
            }
        }
    }
}

/// Answer one redirect connection. Returns `None` when the connection did not
/// settle the flow and the listener should keep waiting.
async fn handle_connection(
    stream: TcpStream,
    port: u16,
    expected_state: &str,
) -> Option<Result<String, AuthError>> {
    let mut stream = BufReader::new(stream);
    let request_line = match timeout(REQUEST_READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(line)) => line,
        Ok(Err(e)) => {
            debug!("unreadable redirect request: {}", e);
            return None;
        }
        Err(_) => {
            debug!("redirect connection sent nothing, closing it");
            return None;
        }
    };
    let callback = match parse_request_line(&request_line, port) {
        Ok(callback) => callback,
        Err(e) => {
            debug!("ignoring redirect request: {}", e);
            return None;
        }
    };

    let (status, body, outcome) = match callback {
        Callback::Ignored => ("404 Not Found", "", None),
        Callback::Denied(reason) => (
            "200 OK",
            FAILURE_PAGE,
            Some(Err(AuthError::Consent(format!(
                "authorization denied: {}",
                reason
            )))),
        ),
        Callback::Code { code, state } if state.as_deref() == Some(expected_state) => {
            ("200 OK", SUCCESS_PAGE, Some(Ok(code)))
        }
        Callback::Code { .. } => (
            "400 Bad Request",
            FAILURE_PAGE,
            Some(Err(AuthError::Consent(
                "OAuth state mismatch in redirect".into(),
            ))),
        ),
    };
    if let Err(e) = respond(stream.get_mut(), status, body).await {
        debug!("failed to answer redirect request: {}", e);
    }
    outcome
}

/// Read the request line and skip the headers.
async fn read_request(stream: &mut BufReader<TcpStream>) -> io::Result<String> {
    let mut request_line = String::new();
    stream.read_line(&mut request_line).await?;
    let mut line = String::new();
    loop {
        line.clear();
        let read = stream.read_line(&mut line).await?;
        if read == 0 || line == "\r\n" || line == "\n" {
            return Ok(request_line);
        }
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}

pub(crate) fn parse_request_line(request_line: &str, port: u16) -> Result<Callback, AuthError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AuthError::Consent("malformed redirect request".into()))?;
    let url = Url::parse(&format!("http://127.0.0.1:{}{}", port, target))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(match (code, error) {
        (_, Some(error)) => Callback::Denied(error),
        (Some(code), None) => Callback::Code { code, state },
        (None, None) => Callback::Ignored,
    })
}
