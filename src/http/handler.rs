//! Channel request handling
//!
//! One handler per server, dispatched by mount URI and HTTP method:
//! GET attaches a subscriber in the channel's delivery mode, POST
//! authenticates and broadcasts, anything else is 405. Paths with no
//! mounted channel fall through to a 404.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};

use crate::channel::{Channel, ChannelError, DeliveryMode, PublishAuthError, DEFAULT_JSONP_CALLBACK};
use crate::log::LogLevel;
use crate::server::listener::ServerContext;

use super::body::StreamingBody;

/// Name of the publish authentication header
pub const PUBLISH_KEY_HEADER: &str = "X-CPS-Publish-Key";

pub(crate) type HandlerResponse = Response<BoxBody<Bytes, Infallible>>;

/// Top-level request dispatch for one server
pub(crate) async fn handle(
    ctx: Arc<ServerContext>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> HandlerResponse {
    let path = req.uri().path().to_string();

    let Some(channel) = ctx.registry.find(&path) else {
        if ctx.log_level.allows(LogLevel::Debug) {
            tracing::debug!(
                server = %ctx.name,
                peer = %peer,
                "unhandled request (404) for \"{}\"",
                path
            );
        }
        return empty_response(StatusCode::NOT_FOUND);
    };

    match req.method() {
        &Method::GET => subscribe(channel, peer, req).await,
        &Method::POST => publish(channel, peer, req).await,
        _ => {
            if channel.log_allows(LogLevel::Warn) {
                tracing::warn!(
                    channel = %channel.name(),
                    peer = %peer,
                    method = %req.method(),
                    "bad request method"
                );
            }
            empty_response(StatusCode::METHOD_NOT_ALLOWED)
        }
    }
}

async fn subscribe(
    channel: Arc<Channel>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> HandlerResponse {
    if channel.log_allows(LogLevel::Debug) {
        tracing::debug!(
            channel = %channel.name(),
            peer = %peer,
            "GET {}",
            req.uri()
        );
    }

    match channel.mode() {
        DeliveryMode::Streaming => match channel.subscribe_streaming(peer) {
            Ok(sub) => {
                let mut resp = Response::new(BodyExt::boxed(StreamingBody::new(sub)));
                resp.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                resp
            }
            Err(ChannelError::ChannelFull(_)) => empty_response(StatusCode::SERVICE_UNAVAILABLE),
            Err(_) => empty_response(StatusCode::INTERNAL_SERVER_ERROR),
        },
        DeliveryMode::LongPoll => {
            let callback = jsonp_callback(&req);
            match channel.subscribe_long_poll(peer, callback) {
                Ok(mut sub) => match sub.recv().await {
                    // the single delivery: a complete, unpadded response
                    Some(body) => {
                        let mut resp = Response::new(BodyExt::boxed(Full::new(body)));
                        resp.headers_mut().insert(
                            CONTENT_TYPE,
                            HeaderValue::from_static("text/javascript; charset=utf-8"),
                        );
                        resp
                    }
                    // channel torn down while parked
                    None => empty_response(StatusCode::NO_CONTENT),
                },
                Err(ChannelError::ChannelFull(_)) => {
                    empty_response(StatusCode::SERVICE_UNAVAILABLE)
                }
                Err(_) => empty_response(StatusCode::INTERNAL_SERVER_ERROR),
            }
        }
    }
}

async fn publish(
    channel: Arc<Channel>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> HandlerResponse {
    if channel.log_allows(LogLevel::Debug) {
        tracing::debug!(
            channel = %channel.name(),
            peer = %peer,
            "POST {}",
            req.uri()
        );
    }

    let provided = req
        .headers()
        .get(PUBLISH_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match channel.authorize_publish(provided.as_deref()) {
        Err(PublishAuthError::MissingKey) => {
            if channel.log_allows(LogLevel::Warn) {
                tracing::warn!(
                    channel = %channel.name(),
                    peer = %peer,
                    "bad pubkey (missing)"
                );
            }
            return empty_response(StatusCode::BAD_REQUEST);
        }
        Err(PublishAuthError::KeyMismatch) => {
            if channel.log_allows(LogLevel::Warn) {
                tracing::warn!(
                    channel = %channel.name(),
                    peer = %peer,
                    "bad pubkey (mismatch)"
                );
            }
            return empty_response(StatusCode::UNAUTHORIZED);
        }
        Ok(()) => {}
    }

    let payload = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            if channel.log_allows(LogLevel::Debug) {
                tracing::debug!(
                    channel = %channel.name(),
                    peer = %peer,
                    error = %e,
                    "failed to read publish body"
                );
            }
            return empty_response(StatusCode::BAD_REQUEST);
        }
    };

    channel.publish(&payload, &peer.to_string());

    // empty OK reply, regardless of subscriber count
    empty_response(StatusCode::NO_CONTENT)
}

/// Callback name from the `jsonp` query parameter, with the default
/// applied for absent or empty values
fn jsonp_callback(req: &Request<Incoming>) -> String {
    req.uri()
        .query()
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k.as_ref() == "jsonp")
                .map(|(_, v)| v.into_owned())
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_JSONP_CALLBACK.to_string())
}

fn empty_response(status: StatusCode) -> HandlerResponse {
    let mut resp = Response::new(BodyExt::boxed(Empty::<Bytes>::new()));
    *resp.status_mut() = status;
    resp
}
