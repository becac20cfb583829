use std::sync::Arc;

use async_trait::async_trait;
use http::{StatusCode, header};
use pingora::prelude::*;
use pingora::{Custom, Error};
use pingora_http::{RequestHeader, ResponseHeader};

use gatekeeper_core::pipeline::Pipeline;
use gatekeeper_core::{FilterOutcome, RequestScope};

use crate::config::UpstreamConfig;

/// Per-request state: the `RequestScope` the pipeline produced, carried from
/// `request_filter` through to the upstream hooks. `None` only for requests
/// the pipeline terminated itself (redirect/deny/error), which never reach
/// `upstream_peer`.
pub struct GatekeeperCtx {
    scope: Option<RequestScope>,
}

/// Fixed-upstream gateway whose `request_filter` hook is the pipeline's
/// single entry point. Everything after the response-header filter -
/// selecting, connecting to, and forwarding to the upstream - is a single
/// static peer; load balancing and TLS termination toward the upstream are
/// out of scope.
pub struct GatekeeperGateway {
    pipeline: Arc<Pipeline>,
    upstream_host: String,
    upstream_port: u16,
    use_tls: bool,
    sni: String,
}

impl GatekeeperGateway {
    pub fn new(pipeline: Arc<Pipeline>, upstream: &UpstreamConfig) -> anyhow::Result<Self> {
        let (host, port) = parse_upstream(&upstream.addr)?;
        Ok(Self {
            pipeline,
            upstream_host: host,
            upstream_port: port,
            use_tls: upstream.use_tls,
            sni: upstream.sni.clone(),
        })
    }

    async fn write_terminal(
        &self,
        session: &mut Session,
        status: StatusCode,
        location: Option<&str>,
        scope: &RequestScope,
        reason: Option<String>,
    ) -> Result<()> {
        let body = reason.unwrap_or_default();

        let mut resp = ResponseHeader::build(status, None)?;
        if let Some(location) = location {
            resp.insert_header(header::LOCATION, location)?;
        }
        for (name, value) in scope.response_headers.iter() {
            resp.append_header(name.clone(), value.clone())?;
        }
        resp.insert_header(header::CONTENT_TYPE, "text/plain")?;
        resp.insert_header(header::CONTENT_LENGTH, body.len().to_string())?;

        session.write_response_header(Box::new(resp), false).await?;
        session.write_response_body(Some(body.into_bytes().into()), true).await?;
        Ok(())
    }
}

fn parse_upstream(addr: &str) -> anyhow::Result<(String, u16)> {
    let mut parts = addr.split(':');
    let host = parts.next().ok_or_else(|| anyhow::anyhow!("invalid upstream address: {addr}"))?;
    let port = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("invalid upstream address: {addr}"))?
        .parse::<u16>()?;
    Ok((host.to_string(), port))
}

#[async_trait]
impl ProxyHttp for GatekeeperGateway {
    type CTX = GatekeeperCtx;

    fn new_ctx(&self) -> Self::CTX {
        GatekeeperCtx { scope: None }
    }

    /// The pipeline's own `request_filter` hook: runs the filter chain
    /// against the incoming request and either continues toward the
    /// upstream or writes a terminal response, matching the
    /// redirect-gateway pattern for anything that short-circuits.
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.clone();
        let uri = req.uri.clone();
        let headers = req.headers.clone();

        let result = self.pipeline.handle(method, uri, headers).await;

        match result.outcome {
            FilterOutcome::Continue => {
                ctx.scope = Some(result.scope);
                Ok(false)
            }
            FilterOutcome::RedirectLogin { location, .. } => {
                self.write_terminal(session, StatusCode::SEE_OTHER, Some(&location), &result.scope, None)
                    .await?;
                Ok(true)
            }
            FilterOutcome::Redirect { status, location } => {
                self.write_terminal(session, status, Some(&location), &result.scope, None).await?;
                Ok(true)
            }
            FilterOutcome::Deny { status, reason } => {
                self.write_terminal(session, status, None, &result.scope, Some(reason)).await?;
                Ok(true)
            }
            FilterOutcome::Error(err) => {
                let status = err.status();
                let message = err.to_string();
                self.write_terminal(session, status, None, &result.scope, Some(message)).await?;
                Ok(true)
            }
        }
    }

    async fn upstream_peer(&self, _session: &mut Session, _ctx: &mut Self::CTX) -> Result<Box<HttpPeer>> {
        let addr = (self.upstream_host.as_str(), self.upstream_port);
        let peer = HttpPeer::new(addr, self.use_tls, self.sni.clone());
        Ok(Box::new(peer))
    }

    /// Replaces the outbound request's headers with the scope's, which
    /// already has the `X-Auth-*` headers injected and managed cookies
    /// filtered by the identity-header filter.
    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        if let Some(scope) = ctx.scope.as_ref() {
            upstream.headers = scope.headers.clone();
        }
        Ok(())
    }

    /// Adds the scope's accumulated response headers (security headers,
    /// configured response headers, `Set-Cookie`) onto the real upstream
    /// response before it reaches the client.
    fn upstream_response_filter(&self, _session: &mut Session, upstream: &mut ResponseHeader, ctx: &mut Self::CTX) -> Result<()> {
        if let Some(scope) = ctx.scope.as_ref() {
            for (name, value) in scope.response_headers.iter() {
                upstream.append_header(name.clone(), value.clone())?;
            }
        }
        Ok(())
    }
}

/// Serves the Prometheus exposition text produced by
/// `gatekeeper_core::metrics::install_recorder`. Run as a second,
/// separately-listening `ProxyHttp` service when `metrics_listen` is
/// configured; it never proxies upstream.
#[cfg(feature = "prometheus")]
pub struct MetricsGateway {
    handle: metrics_exporter_prometheus::PrometheusHandle,
}

#[cfg(feature = "prometheus")]
impl MetricsGateway {
    pub fn new(handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        Self { handle }
    }
}

#[cfg(feature = "prometheus")]
#[async_trait]
impl ProxyHttp for MetricsGateway {
    type CTX = ();

    fn new_ctx(&self) -> Self::CTX {}

    async fn upstream_peer(&self, _session: &mut Session, _ctx: &mut Self::CTX) -> Result<Box<HttpPeer>> {
        Err(Error::new(Custom("metrics gateway never proxies upstream")))
    }

    async fn request_filter(&self, session: &mut Session, _ctx: &mut Self::CTX) -> Result<bool> {
        let body = self.handle.render();

        let mut resp = ResponseHeader::build(StatusCode::OK, None)?;
        resp.insert_header(header::CONTENT_TYPE, "text/plain; version=0.0.4")?;
        resp.insert_header(header::CONTENT_LENGTH, body.len().to_string())?;

        session.write_response_header(Box::new(resp), false).await?;
        session.write_response_body(Some(body.into_bytes().into()), true).await?;
        Ok(true)
    }
}
