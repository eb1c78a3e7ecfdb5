//! Download session state.

use std::sync::Arc;

use super::plan::{ChunkDescriptor, ChunkState};
use super::progress::ProgressCounter;
use crate::api::FileDescriptor;

/// Everything one transfer needs: the file, its chunks and the URL set.
///
/// Not persisted. Part files on disk are the only state that survives a run.
#[derive(Debug)]
pub struct DownloadSession {
    pub file: FileDescriptor,
    pub total_size: u64,
    pub chunks: Vec<ChunkDescriptor>,
    pub urls: Arc<[String]>,
    pub progress: Arc<ProgressCounter>,
}

impl DownloadSession {
    /// Start a session with a fresh progress counter.
    pub fn new(
        file: FileDescriptor,
        total_size: u64,
        chunks: Vec<ChunkDescriptor>,
        urls: Vec<String>,
    ) -> Self {
        Self {
            file,
            total_size,
            chunks,
            urls: urls.into(),
            progress: Arc::new(ProgressCounter::new()),
        }
    }

    /// Share an existing counter, e.g. one a reporter already polls.
    pub fn with_progress(mut self, progress: Arc<ProgressCounter>) -> Self {
        self.progress = progress;
        self
    }

    /// Number of planned chunks.
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks currently in `state`.
    pub fn count_in(&self, state: ChunkState) -> usize {
        self.chunks.iter().filter(|c| c.state == state).count()
    }

    /// Ids of failed chunks, in order.
    pub fn failed_ids(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .filter(|c| c.state == ChunkState::Failed)
            .map(|c| c.id)
            .collect()
    }

    /// Check if every chunk is complete.
    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(|c| c.state == ChunkState::Complete)
    }

    /// Progress as a percentage of bytes.
    pub fn progress_percent(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        (self.progress.bytes() as f64 / self.total_size as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::plan::{plan_chunks, PartLayout};

    fn session() -> DownloadSession {
        let file = FileDescriptor {
            id: "abc".into(),
            name: "f.bin".into(),
            size: Some(30),
            available: true,
        };
        let chunks = plan_chunks(30, 10, &PartLayout::new("tmp", "f.bin")).unwrap();
        DownloadSession::new(file, 30, chunks, vec!["https://cdn.invalid/a".into()])
    }

    #[test]
    fn test_new_session_is_pending() {
        let session = session();
        assert_eq!(session.total_chunks(), 3);
        assert_eq!(session.count_in(ChunkState::Pending), 3);
        assert!(!session.is_complete());
        assert_eq!(session.progress_percent(), 0.0);
    }

    #[test]
    fn test_completion_and_failures() {
        let mut session = session();
        session.chunks[0].state = ChunkState::Complete;
        session.chunks[1].state = ChunkState::Failed;
        session.chunks[2].state = ChunkState::Complete;
        session.progress.add_bytes(15);

        assert!(!session.is_complete());
        assert_eq!(session.failed_ids(), vec![1]);
        assert_eq!(session.progress_percent(), 50.0);

        session.chunks[1].state = ChunkState::Complete;
        assert!(session.is_complete());
    }
}
