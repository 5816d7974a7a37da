//! # Pool status collector
//!
//! Polls a mining-pool worker status API and keeps a bounded history of the
//! metrics derived from it.
//!
//! ## Architecture
//!
//! - **`metrics`**: the declarative metric table (`MetricTable`, `Locator`)
//!   and the resolved `Sample`
//! - **`resolver`**: pure resolution of a raw JSON document into scaled values
//! - **`window`**: the capacity-bounded `WindowStore`
//! - **`fetcher`**: the `Fetcher` trait and its HTTP implementation
//! - **`poller`**: the fixed-interval loop, sole writer of the window
//! - **`handle`**: `MetricsHandle`, the read side handed to the HTTP layer
//!
//! Data flows `Poller` → `resolve` → `WindowStore` → `MetricsHandle`.

#[macro_use]
extern crate tracing;

pub mod fetcher;
pub mod handle;
pub mod metrics;
pub mod poller;
pub mod resolver;
pub mod window;

pub use fetcher::{
    FailureKind,
    Fetcher,
    HttpFetcher,
    PollError,
};
pub use handle::{
    LatestView,
    MetricsHandle,
};
pub use metrics::*;
pub use poller::{
    PollFailure,
    PollOutcome,
    PollStatus,
    Poller,
};
pub use resolver::resolve;
pub use window::WindowStore;
