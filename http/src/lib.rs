//! Read-only HTTP surface over the collected window.

#[macro_use]
extern crate tracing;

pub mod error;
mod metrics;
pub mod router;

pub use router::{
    create_router,
    AppState,
    ConfigView,
};

use axum::Router;
use std::{
    future::Future,
    io,
    net::SocketAddr,
};
use tokio::net::TcpListener;

/// Binds `address` and serves `router` until `shutdown` resolves.
pub async fn serve(
    address: SocketAddr,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}
