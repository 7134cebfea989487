pub mod factories;
pub mod jobs;
pub mod request_groups;

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Extensions;

/// Peer address of the connection, when the server was started with
/// connect info (tests drive the router without it).
pub(crate) fn client_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
