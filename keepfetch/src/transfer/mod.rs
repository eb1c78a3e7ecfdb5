//! Segmented, resumable transfer.
//!
//! ```text
//! plan_chunks ──► DownloadSession ──► ChunkFetcher ──► part files ──► Assembler
//! ```
//!
//! - [`plan`]: byte-range partitioning and part-file naming
//! - [`fetcher`]: bounded concurrent fetching with resume and retry
//! - [`assembler`]: ordered concatenation into the final file
//! - [`progress`]: shared byte counter and reporter thread

pub mod assembler;
pub mod fetcher;
pub mod http;
pub mod plan;
pub mod progress;
pub mod retry;
pub mod state;

pub use assembler::{Assembler, AssemblyError, AssemblyOptions, AssemblyReport};
pub use fetcher::{select_url, ChunkFetcher, FetchReport};
pub use http::{RangeBody, RangeClient, RangeResponse, ReqwestRangeClient, TransferError};
pub use plan::{part_digits, plan_chunks, ChunkDescriptor, ChunkState, PartLayout, PlanError};
pub use progress::{ProgressCallback, ProgressCounter, ProgressReporter, DEFAULT_POLL_INTERVAL};
pub use retry::RetryPolicy;
pub use state::DownloadSession;
