//! Link acquisition.
//!
//! Turns a file id and solved captchas into a download key bound to one
//! network path, then mints download URLs over that same path.

mod acquirer;
mod error;
mod key;

pub use acquirer::{
    AcquisitionConfig, LinkAcquirer, LinkState, DEFAULT_MAX_CHALLENGE_ATTEMPTS,
    DEFAULT_WAIT_CEILING,
};
pub use error::LinkError;
pub use key::{AcquiredLinks, DownloadKey, Grant};
