use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::tls::insecure_client_config;
use super::util::{has_header, host_header_value};
use super::{Error, HttpRequest, HttpResponse, Result};

/// Connection pool limits and TLS behavior for [`HttpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub connect_timeout: Option<Duration>,
    /// Upper bound on requests in flight (and therefore open connections) across all clones.
    pub max_connections: usize,
    /// Idle keep-alive connections retained per host.
    pub max_idle_per_host: usize,
    /// Accept any server certificate.
    pub insecure_tls: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            // The OS-level TCP connect timeout can be very long (tens of seconds), which can
            // cause short runs to appear "hung" when the target host is unreachable.
            connect_timeout: Some(Duration::from_secs(3)),
            max_connections: 100,
            max_idle_per_host: 50,
            insecure_tls: false,
        }
    }
}

/// Pooled HTTP/1.1 client shared by every virtual user of a run.
///
/// Cloning is cheap and clones share both the connection pool and the in-flight cap.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    permits: Arc<Semaphore>,
}

impl HttpClient {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        let builder = HttpsConnectorBuilder::new();
        let builder = if opts.insecure_tls {
            builder.with_tls_config(insecure_client_config()?)
        } else {
            builder.with_webpki_roots()
        };

        let https_connector = builder
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector(&opts));

        let inner = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(opts.max_idle_per_host)
            .build(https_connector);

        Ok(Self {
            inner,
            permits: Arc::new(Semaphore::new(opts.max_connections.max(1))),
        })
    }

    /// Number of additional requests that could start right now without waiting for a slot.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Sends `req` and reads the full response body.
    ///
    /// `req.timeout` bounds the whole exchange, including waiting for a connection slot.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        match req.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.exchange(req)).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(timeout)),
            },
            None => self.exchange(req).await,
        }
    }

    async fn exchange(&self, req: HttpRequest) -> Result<HttpResponse> {
        let parsed = url::Url::parse(&req.url).map_err(|_| Error::InvalidUrl(req.url.clone()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::UnsupportedScheme(req.url));
        }

        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.to_string()))?;

        let mut builder = Request::builder().method(req.method).uri(uri);

        if !has_header(&req.headers, "host")
            && let Some(host) = host_header_value(&parsed)
        {
            builder = builder.header(http::header::HOST, host);
        }
        if !req.body.is_empty() && !has_header(&req.headers, "content-length") {
            builder = builder.header(http::header::CONTENT_LENGTH, req.body.len());
        }

        for (k, v) in req.headers {
            let name = http::header::HeaderName::from_bytes(k.as_bytes())?;
            let value = http::header::HeaderValue::from_str(&v)?;
            builder = builder.header(name, value);
        }

        let req: Request<Full<Bytes>> = builder.body(Full::new(req.body))?;

        // The semaphore is never closed, so acquisition only fails if that invariant breaks.
        let _permit = self.permits.acquire().await.ok();

        let res: hyper::Response<Incoming> = self.inner.request(req).await?;

        let status = res.status().as_u16();
        let body = res.into_body().collect().await?.to_bytes();

        Ok(HttpResponse { status, body })
    }
}

fn http_connector(opts: &ClientOptions) -> HttpConnector {
    let mut http_connector = HttpConnector::new();
    http_connector.enforce_http(false);
    http_connector.set_connect_timeout(opts.connect_timeout);
    http_connector
}
