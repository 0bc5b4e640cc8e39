//! Per-connection request loop: the orchestrator tying every subsystem
//! together.
//!
//! # Responsibilities
//! - Accumulate bytes until a complete request head is present
//! - Apply the policy chain in order: ACME HTTP-01 short-circuit, admin
//!   short-circuit, rate limit, CORS
//! - Resolve a backend via `Router`+`LoadBalancer`, gated by
//!   `HealthChecker`/`CircuitBreaker`
//! - Relay the request/response pair via `http::relay`
//! - Report the outcome back to `HealthChecker`/`CircuitBreaker`/metrics
//!
//! # Design Decisions
//! - One task per connection, strictly pipelined: the next request is not
//!   read until the previous response is fully flushed
//! - `PrefixedReader` solves the "bytes already read off the wire belong to
//!   the next phase" problem uniformly for both legs of the relay, instead
//!   of a second buffering scheme

use crate::config::schema::ServerConfig;
use crate::health::passive::{self, RequestOutcome};
use crate::http::parser::{find_head_end, parse_request_head, BodyFraming, HttpVersion, ParseError};
use crate::http::relay::{self, RelayError};
use crate::http::request::Request;
use crate::http::response::{self, LocalResponse};
use crate::net::connection::ConnectionTracker;
use crate::observability::metrics as obs_metrics;
use crate::security::{cors, limits, rate_limit};
use crate::state::AppState;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_rustls::TlsConnector;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("client I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("upstream relay error: {0}")]
    Relay(#[from] RelayError),
}

const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

/// Reads out of `prefix` first, then falls through to `inner`. Used to
/// splice bytes already consumed from a socket back in front of the
/// socket itself for the relay functions, which want one contiguous
/// `AsyncBufRead`.
struct PrefixedReader<'a, Inner> {
    prefix: Vec<u8>,
    prefix_pos: usize,
    inner: &'a mut Inner,
}

impl<'a, Inner> PrefixedReader<'a, Inner> {
    fn new(prefix: Vec<u8>, inner: &'a mut Inner) -> Self {
        Self { prefix, prefix_pos: 0, inner }
    }
}

impl<'a, Inner: AsyncRead + Unpin> AsyncRead for PrefixedReader<'a, Inner> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        if self.prefix_pos < self.prefix.len() {
            let remaining = self.prefix.len() - self.prefix_pos;
            let n = remaining.min(buf.remaining());
            let start = self.prefix_pos;
            buf.put_slice(&self.prefix[start..start + n]);
            self.prefix_pos += n;
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut *self.inner).poll_read(cx, buf)
    }
}

impl<'a, Inner: AsyncBufRead + Unpin> AsyncBufRead for PrefixedReader<'a, Inner> {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<std::io::Result<&[u8]>> {
        let this = self.get_mut();
        if this.prefix_pos < this.prefix.len() {
            return Poll::Ready(Ok(&this.prefix[this.prefix_pos..]));
        }
        Pin::new(&mut *this.inner).poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        let this = self.get_mut();
        if this.prefix_pos < this.prefix.len() {
            this.prefix_pos = (this.prefix_pos + amt).min(this.prefix.len());
            return;
        }
        Pin::new(&mut *this.inner).consume(amt);
    }
}

pub struct ConnectionDriver {
    state: Arc<AppState>,
    /// Whether this connection arrived on the plaintext listener (as
    /// opposed to the HTTPS one). Gates the HTTP→HTTPS redirect, which
    /// only makes sense on the plaintext side.
    is_plaintext: bool,
}

impl ConnectionDriver {
    pub fn new(state: Arc<AppState>, is_plaintext: bool) -> Self {
        Self { state, is_plaintext }
    }

    /// Serve requests on `stream` until the client closes the connection,
    /// an idle/request timeout elapses, a fatal protocol error occurs, or
    /// `shutdown_rx` fires between requests. `stream` may be a plain
    /// `TcpStream` or a TLS stream wrapping one; both implement
    /// `AsyncRead + AsyncWrite`.
    pub async fn run<S>(&self, stream: S, peer_addr: SocketAddr, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), DriverError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let tracker = ConnectionTracker::new();
        tracker.mark_active();

        let config = self.state.router.current();
        let mut conn = BufReader::with_capacity(config.limits.buffer_bytes.max(4096), stream);
        let mut head_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut read_chunk = vec![0u8; 8192];

        loop {
            if !tracker.should_accept_next_request() {
                break;
            }
            head_buf.clear();
            let config = self.state.router.current();

            let idle_timeout = Duration::from_secs(config.timeouts.idle.max(1));
            let request_timeout = Duration::from_secs(config.timeouts.request.max(1));

            let head_end = tokio::select! {
                result = self.read_head(&mut conn, &mut head_buf, &mut read_chunk, &config, idle_timeout, request_timeout) => {
                    match result? {
                        Some(end) => end,
                        None => break, // peer closed before sending another request
                    }
                }
                _ = shutdown_rx.recv() => {
                    // Let any request already in flight finish; just stop
                    // waiting for a new one on this connection.
                    tracker.begin_draining();
                    break;
                }
            };

            let head = match parse_request_head(&head_buf, head_end) {
                Ok(h) => h,
                Err(ParseError::TooManyHeaders) | Err(ParseError::MalformedHeader(_)) | Err(ParseError::MalformedRequestLine) => {
                    write_local(&mut conn, &response::bad_request("malformed request")).await?;
                    break;
                }
                Err(ParseError::UnsupportedVersion) => {
                    write_local(&mut conn, &response::bad_request("unsupported HTTP version")).await?;
                    break;
                }
                Err(ParseError::InvalidEncoding) => {
                    write_local(&mut conn, &response::bad_request("request is not valid UTF-8")).await?;
                    break;
                }
            };

            let leftover = head_buf.split_off(head_end);
            let request = Request::new(head, peer_addr);
            let span = crate::observability::tracing::request_span(request.request_id, &request.head.method, &request.head.path);
            let _enter = span.enter();
            let started_at = Instant::now();

            let framing = request.body_framing();
            if let BodyFraming::ContentLength(len) = framing {
                if limits::check_body_size(len, &config.limits).is_err() {
                    write_local(&mut conn, &response::payload_too_large()).await?;
                    break;
                }
            }

            let keep_alive = should_keep_alive(&request);
            let outcome = tokio::time::timeout(
                request_timeout,
                self.serve_one(&mut conn, &request, &config, leftover, started_at),
            )
            .await;

            let response_written = match outcome {
                Ok(Ok(written)) => written,
                Ok(Err(error)) => {
                    tracing::warn!(%error, "request handling failed");
                    write_local(&mut conn, &response::bad_gateway()).await?;
                    true
                }
                Err(_) => {
                    write_local(&mut conn, &response::gateway_timeout()).await?;
                    true
                }
            };

            if !response_written || !keep_alive {
                break;
            }
        }

        tracker.mark_closed();
        Ok(())
    }

    async fn read_head<S>(
        &self,
        conn: &mut BufReader<S>,
        head_buf: &mut Vec<u8>,
        read_chunk: &mut [u8],
        config: &ServerConfig,
        idle_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Option<usize>, DriverError>
    where
        S: AsyncRead + Unpin,
    {
        loop {
            if let Some(end) = find_head_end(head_buf) {
                return Ok(Some(end));
            }
            if head_buf.len() > config.limits.buffer_bytes {
                write_local(conn, &response::bad_request("request headers too large")).await?;
                return Ok(None);
            }

            let timeout = if head_buf.is_empty() { idle_timeout } else { request_timeout };
            let read = match tokio::time::timeout(timeout, conn.read(read_chunk)).await {
                Ok(result) => result?,
                Err(_) => return Ok(None),
            };
            if read == 0 {
                return Ok(None);
            }
            head_buf.extend_from_slice(&read_chunk[..read]);
        }
    }

    /// Handle one fully-parsed request: policy chain, backend dispatch,
    /// relay. Returns whether a response was written to the client.
    async fn serve_one<S>(
        &self,
        conn: &mut BufReader<S>,
        request: &Request,
        config: &ServerConfig,
        leftover: Vec<u8>,
        started_at: Instant,
    ) -> Result<bool, DriverError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let path = request.head.path.clone();

        // ACME HTTP-01 short-circuit.
        if let Some(token) = path.strip_prefix(ACME_CHALLENGE_PREFIX) {
            let response = match self.state.challenges.lookup(token) {
                Some(key_authorization) => LocalResponse::new(200, "OK", key_authorization),
                None => response::not_found(),
            };
            write_local(conn, &response).await?;
            drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
            return Ok(true);
        }

        // HTTP→HTTPS redirect: only on the plaintext listener, and never
        // for the ACME challenge path (already handled above).
        if self.is_plaintext && config.auto_https.enabled && config.auto_https.http_to_https_redirect {
            let host = request.host().unwrap_or_default();
            let host_only = host.split(':').next().unwrap_or(&host);
            let location = if config.auto_https.https_port == 443 {
                format!("https://{host_only}{path}")
            } else {
                format!("https://{host_only}:{}{path}", config.auto_https.https_port)
            };
            write_local(conn, &response::moved_permanently(location)).await?;
            drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
            return Ok(true);
        }

        // Admin short-circuit: the admin surface is external to this core.
        if path.starts_with("/admin/") {
            write_local(conn, &response::not_found()).await?;
            drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
            return Ok(true);
        }

        let client_ip = request.client_ip().to_string();

        // Rate limiting.
        if config.rate_limiter.enabled {
            let key = rate_limit::rate_limit_key(&client_ip, &path, config.rate_limiter.per_path);
            if !self.state.rate_limiter.allow(&key, &config.rate_limiter) {
                let retry_after = self.state.rate_limiter.retry_after(&key, &config.rate_limiter);
                obs_metrics::record_rate_limited(&key);
                write_local(conn, &response::too_many_requests(retry_after.as_secs())).await?;
                drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
                return Ok(true);
            }
        }

        // CORS.
        let origin = request.header("origin").map(str::to_string);
        let mut cors_headers = None;
        if config.cors.enabled {
            if let Some(origin) = &origin {
                let preflight = cors::is_preflight(
                    &request.head.method,
                    Some(origin.as_str()),
                    request.header("access-control-request-method"),
                );
                if preflight {
                    let mut response = response::no_content();
                    if let Some(headers) = cors::evaluate(&config.cors, origin, true) {
                        apply_cors_headers(&mut response.headers, &headers);
                    }
                    write_local(conn, &response).await?;
                    drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
                    return Ok(true);
                }
                cors_headers = cors::evaluate(&config.cors, origin, false);
            }
        }

        let host = request.host();
        let candidates = match self.state.router.resolve(host.as_deref(), &path) {
            Some(candidates) => candidates,
            None => {
                let mut response = response::not_found();
                if let Some(headers) = &cors_headers {
                    apply_cors_headers(&mut response.headers, headers);
                }
                write_local(conn, &response).await?;
                drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
                return Ok(true);
            }
        };

        if let Some(first) = candidates.first() {
            if let Some(root) = first.strip_prefix("file://") {
                let response = self.state.static_handler.serve(&path, root);
                write_local(conn, &response).await?;
                drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
                return Ok(true);
            }
        }

        let cb_config = config.circuit_breaker.clone();
        let health = &self.state.health;
        let is_healthy = |url: &str| health.is_healthy(url);

        // Health filtering only degrades (falls back to the full list if
        // every candidate looks unhealthy); the circuit breaker below is
        // the one gate allowed to reject the request outright.
        let guard = self.state.load_balancer.select(
            &path,
            config.load_balancer_algorithm,
            &candidates,
            request.client_ip(),
            is_healthy,
        );
        let guard = match guard {
            Some(guard) => guard,
            None => {
                let mut response = response::service_unavailable();
                if let Some(headers) = &cors_headers {
                    apply_cors_headers(&mut response.headers, headers);
                }
                write_local(conn, &response).await?;
                drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
                return Ok(true);
            }
        };
        let backend_url = guard.url.clone();

        if !self.state.circuit_breaker.allow_request(&backend_url, &cb_config) {
            let mut response = response::service_unavailable();
            if let Some(headers) = &cors_headers {
                apply_cors_headers(&mut response.headers, headers);
            }
            write_local(conn, &response).await?;
            drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
            return Ok(true);
        }

        let connect_timeout = Duration::from_secs(config.timeouts.connection.max(1));
        let backend_stream = match tokio::time::timeout(connect_timeout, connect_backend(&backend_url)).await {
            Ok(Ok(stream)) => stream,
            _ => {
                self.state.circuit_breaker.record_failure(&backend_url, &cb_config);
                passive::observe(
                    self.state.health.registry(),
                    &backend_url,
                    RequestOutcome::ConnectionFailure,
                    config.health_check.failure_threshold,
                    config.health_check.success_threshold,
                );
                let mut response = response::bad_gateway();
                if let Some(headers) = &cors_headers {
                    apply_cors_headers(&mut response.headers, headers);
                }
                write_local(conn, &response).await?;
                drain_unused_body(conn, leftover, request.body_framing(), config.limits.buffer_bytes).await?;
                return Ok(true);
            }
        };

        let relay_result = self
            .relay_through(conn, backend_stream, request, leftover, config, cors_headers.as_ref())
            .await;

        match &relay_result {
            Ok(status) => {
                obs_metrics::record_request(&request.head.method, *status, &backend_url, started_at);
                if *status >= 500 {
                    self.state.circuit_breaker.record_failure(&backend_url, &cb_config);
                } else {
                    self.state.circuit_breaker.record_success(&backend_url, &cb_config);
                }
                passive::observe(
                    self.state.health.registry(),
                    &backend_url,
                    RequestOutcome::from_status(*status),
                    config.health_check.failure_threshold,
                    config.health_check.success_threshold,
                );
            }
            Err(_) => {
                self.state.circuit_breaker.record_failure(&backend_url, &cb_config);
                passive::observe(
                    self.state.health.registry(),
                    &backend_url,
                    RequestOutcome::ConnectionFailure,
                    config.health_check.failure_threshold,
                    config.health_check.success_threshold,
                );
            }
        }

        relay_result.map(|_| true)
    }

    async fn relay_through<S, B>(
        &self,
        client: &mut BufReader<S>,
        mut backend: B,
        request: &Request,
        leftover: Vec<u8>,
        config: &ServerConfig,
        cors_headers: Option<&cors::CorsHeaders>,
    ) -> Result<u16, DriverError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        B: AsyncRead + AsyncWrite + Unpin,
    {
        let mut request_headers = request.head.headers.clone();
        crate::security::headers::strip_hop_by_hop(&mut request_headers);
        crate::security::headers::append_forwarded_for(&mut request_headers, &request.client_ip().to_string());
        crate::security::headers::set_forwarded_proto(&mut request_headers, "http");
        if let Some(host) = request.host() {
            crate::security::headers::set_forwarded_host(&mut request_headers, &host);
        }

        let mut request_line = Vec::with_capacity(128);
        request_line.extend_from_slice(
            format!("{} {} {}\r\n", request.head.method, request.head.target, request.head.version.as_str()).as_bytes(),
        );
        for (name, value) in &request_headers {
            request_line.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        request_line.extend_from_slice(b"\r\n");
        backend.write_all(&request_line).await?;

        let mut client_body_src = PrefixedReader::new(leftover, client);
        relay::relay_body(&mut client_body_src, &mut backend, request.body_framing(), config.limits.buffer_bytes).await?;

        let (response_head, response_leftover) = relay::read_response_head(&mut backend).await?;
        let mut response_head = response_head;
        if let Some(headers) = cors_headers {
            apply_cors_headers(&mut response_head.headers, headers);
        }
        let status = response_head.status;

        client.write_all(&relay::serialize_response_head(&response_head)).await?;

        let skip_body = request.head.method.eq_ignore_ascii_case("HEAD")
            || matches!(status, 100..=199 | 204 | 304);
        if !skip_body {
            let framing = relay::response_body_framing(&response_head);
            if let BodyFraming::ContentLength(len) = framing {
                if len > config.limits.max_response_bytes {
                    return Err(DriverError::Relay(RelayError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "response exceeds configured size limit",
                    ))));
                }
            }
            let mut backend_body_src = PrefixedReader::new(response_leftover, &mut backend);
            relay::relay_body(&mut backend_body_src, client, framing, config.limits.buffer_bytes).await?;
        }
        client.flush().await?;

        Ok(status)
    }
}

fn should_keep_alive(request: &Request) -> bool {
    match request.header("connection") {
        Some(value) if value.eq_ignore_ascii_case("close") => false,
        Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
        _ => matches!(request.head.version, crate::http::parser::HttpVersion::Http11),
    }
}

fn apply_cors_headers(headers: &mut Vec<(String, String)>, cors_headers: &cors::CorsHeaders) {
    headers.push(("Access-Control-Allow-Origin".to_string(), cors_headers.allow_origin.clone()));
    if cors_headers.allow_credentials {
        headers.push(("Access-Control-Allow-Credentials".to_string(), "true".to_string()));
    }
    if let Some(methods) = &cors_headers.allow_methods {
        headers.push(("Access-Control-Allow-Methods".to_string(), methods.clone()));
    }
    if let Some(allow_headers) = &cors_headers.allow_headers {
        headers.push(("Access-Control-Allow-Headers".to_string(), allow_headers.clone()));
    }
    if let Some(expose) = &cors_headers.expose_headers {
        headers.push(("Access-Control-Expose-Headers".to_string(), expose.clone()));
    }
    if let Some(max_age) = &cors_headers.max_age {
        headers.push(("Access-Control-Max-Age".to_string(), max_age.clone()));
    }
    if cors_headers.allow_origin != "*" {
        headers.push(("Vary".to_string(), "Origin".to_string()));
    }
}

async fn write_local<S>(conn: &mut S, response: &LocalResponse) -> Result<(), DriverError>
where
    S: AsyncWrite + Unpin,
{
    conn.write_all(&response.serialize()).await?;
    conn.flush().await?;
    Ok(())
}

/// A short-circuited response was sent without consuming the request body
/// the client may still be sending; drain it so the connection stays in a
/// parseable state for the next request.
async fn drain_unused_body<S>(
    conn: &mut BufReader<S>,
    leftover: Vec<u8>,
    framing: BodyFraming,
    buffer_bytes: usize,
) -> Result<(), DriverError>
where
    S: AsyncRead + Unpin,
{
    let mut sink = tokio::io::sink();
    let mut src = PrefixedReader::new(leftover, conn);
    relay::relay_body(&mut src, &mut sink, framing, buffer_bytes).await?;
    Ok(())
}

/// Connect to a backend URL, establishing TLS when the scheme is `https`.
async fn connect_backend(backend_url: &str) -> Result<Box<dyn BidiStream>, std::io::Error> {
    let url = url::Url::parse(backend_url)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let host = url
        .host_str()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "backend URL missing host"))?
        .to_string();
    let https = url.scheme() == "https";
    let port = url.port_or_known_default().unwrap_or(if https { 443 } else { 80 });

    let tcp = TcpStream::connect((host.as_str(), port)).await?;
    tcp.set_nodelay(true).ok();

    if https {
        let connector = tls_client_connector();
        let server_name = rustls::pki_types::ServerName::try_from(host.clone())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid backend hostname"))?;
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Box::new(tls))
    } else {
        Ok(Box::new(tcp))
    }
}

fn tls_client_connector() -> TlsConnector {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

trait BidiStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> BidiStream for T {}
