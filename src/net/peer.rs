//! Client address resolution.
//!
//! # Responsibilities
//! - Resolve the originating client of a request behind proxies
//! - Recognize local health checks that must not produce records
//!
//! # Design Decisions
//! - Forwarding headers win over the socket address, first hop first
//! - Unknown clients resolve to an empty string, rendered as `-`
//! - Health checks are recognized by the socket address only; forwarding headers
//!   are caller-controlled

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

use crate::propagation::Extractor;

/// Address of local health checks.
pub const LOCALHOST: &str = "127.0.0.1";

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// First address in `X-Forwarded-For`, else `X-Real-IP`.
pub fn forwarded_ip<E: Extractor + ?Sized>(carrier: &E) -> Option<String> {
    let forwarded = carrier.get(X_FORWARDED_FOR).and_then(|v| {
        v.split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    });
    if forwarded.is_some() {
        return forwarded;
    }

    carrier
        .get(X_REAL_IP)
        .map(|v| v.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Client ip of an HTTP request; empty when unknown.
pub fn client_ip<B>(req: &Request<B>) -> String {
    forwarded_ip(req.headers())
        .or_else(|| socket_addr(req).map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

/// Client ip from carrier headers and an optional peer address.
pub fn peer_ip<E: Extractor + ?Sized>(carrier: &E, peer: Option<SocketAddr>) -> String {
    forwarded_ip(carrier)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_default()
}

/// Socket address of an HTTP request, when served with connect info.
pub fn socket_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Whether the connection comes from a local health check.
pub fn is_local_health_check(peer: Option<SocketAddr>) -> bool {
    peer.is_some_and(|addr| addr.ip().to_string() == LOCALHOST)
}
