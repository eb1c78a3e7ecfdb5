//! keepfetch - captcha-gated link acquisition and resumable segmented downloads
//!
//! This library retrieves files hosted behind a rate-limited hosting API that
//! hands out download links only after a captcha has been solved and a
//! server-mandated wait period has elapsed. It is organized leaves first:
//!
//! ```text
//! proxy (ProxyPool) ──► link (LinkAcquirer) ──► URL set
//!                                                  │
//! transfer::plan (plan_chunks) ──► transfer::fetcher (ChunkFetcher)
//!                                                  │
//!                                  transfer::assembler (Assembler) ──► file
//! ```
//!
//! The [`session`] module wires the pieces together; the CLI crate only adds
//! argument parsing, an interactive captcha prompt and a progress bar.

use std::future::Future;
use std::pin::Pin;

pub mod api;
pub mod captcha;
pub mod config;
pub mod link;
pub mod logging;
pub mod proxy;
pub mod session;
pub mod transfer;

/// Version of the keepfetch library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
