//! Segment planning.
//!
//! Splits `[0, total_size)` into contiguous inclusive byte ranges of at most
//! `chunk_size` bytes, each backed by its own part file.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Minimum zero padding of the part-file index.
const MIN_PART_DIGITS: usize = 3;

/// Errors from [`plan_chunks`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Invalid plan: total size {total_size}, chunk size {chunk_size}")]
    InvalidPlan { total_size: u64, chunk_size: u64 },
}

/// Lifecycle of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Fetching,
    Complete,
    Failed,
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkState::Pending => "pending",
            ChunkState::Fetching => "fetching",
            ChunkState::Complete => "complete",
            ChunkState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One inclusive byte range and the part file that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub id: usize,
    /// First byte, inclusive.
    pub start: u64,
    /// Last byte, inclusive.
    pub end: u64,
    pub path: PathBuf,
    pub state: ChunkState,
}

impl ChunkDescriptor {
    /// Number of bytes the part file holds when complete.
    pub fn expected_size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` header.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Whether the part file on disk already holds the whole range.
    pub fn is_present(&self) -> bool {
        part_len(&self.path) == Some(self.expected_size())
    }
}

/// Size of a part file, or `None` if it does not exist.
pub(crate) fn part_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Where part files live and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartLayout {
    pub dir: PathBuf,
    pub stem: String,
}

impl PartLayout {
    /// Parts named `<stem>.partNNN` inside `dir`.
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// `<dir>/<stem>.partNNN` with `width` digits.
    pub fn part_path(&self, id: usize, width: usize) -> PathBuf {
        self.dir
            .join(format!("{}.part{:0width$}", self.stem, id, width = width))
    }
}

/// Digits needed so that lexical order of part names equals id order.
pub fn part_digits(num_chunks: usize) -> usize {
    let last = num_chunks.saturating_sub(1);
    last.to_string().len().max(MIN_PART_DIGITS)
}

/// Partition `[0, total_size)` into chunks of at most `chunk_size` bytes.
///
/// Every chunk starts `Pending`. The last chunk absorbs the remainder.
///
/// ```
/// use keepfetch::transfer::{plan_chunks, PartLayout};
///
/// let chunks = plan_chunks(25, 10, &PartLayout::new("tmp", "file")).unwrap();
/// let ranges: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
/// assert_eq!(ranges, vec![(0, 9), (10, 19), (20, 24)]);
/// ```
pub fn plan_chunks(
    total_size: u64,
    chunk_size: u64,
    layout: &PartLayout,
) -> Result<Vec<ChunkDescriptor>, PlanError> {
    if total_size == 0 || chunk_size == 0 {
        return Err(PlanError::InvalidPlan {
            total_size,
            chunk_size,
        });
    }

    let num_chunks = total_size.div_ceil(chunk_size) as usize;
    let width = part_digits(num_chunks);

    let chunks = (0..num_chunks)
        .map(|id| {
            let start = id as u64 * chunk_size;
            let end = (start + chunk_size).min(total_size) - 1;
            ChunkDescriptor {
                id,
                start,
                end,
                path: layout.part_path(id, width),
                state: ChunkState::Pending,
            }
        })
        .collect();

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MIB: u64 = 1024 * 1024;

    fn layout() -> PartLayout {
        PartLayout::new("tmp", "movie.mkv")
    }

    #[test]
    fn test_45_mib_in_20_mib_chunks() {
        let chunks = plan_chunks(45 * MIB, 20 * MIB, &layout()).unwrap();

        let ranges: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
        assert_eq!(
            ranges,
            vec![
                (0, 20_971_519),
                (20_971_520, 41_943_039),
                (41_943_040, 47_185_919),
            ]
        );
        assert_eq!(chunks[2].expected_size(), 5 * MIB);
        assert_eq!(chunks[0].path, PathBuf::from("tmp/movie.mkv.part000"));
        assert_eq!(chunks[2].range_header(), "bytes=41943040-47185919");
        assert!(chunks.iter().all(|c| c.state == ChunkState::Pending));
    }

    #[test]
    fn test_zero_inputs_rejected() {
        assert_eq!(
            plan_chunks(0, 10, &layout()),
            Err(PlanError::InvalidPlan {
                total_size: 0,
                chunk_size: 10
            })
        );
        assert!(plan_chunks(10, 0, &layout()).is_err());
    }

    #[test]
    fn test_chunk_larger_than_file() {
        let chunks = plan_chunks(100, 1000, &layout()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start, chunks[0].end), (0, 99));
    }

    #[test]
    fn test_part_names_sort_by_id() {
        assert_eq!(part_digits(1), 3);
        assert_eq!(part_digits(1000), 3);
        assert_eq!(part_digits(1001), 4);

        let chunks = plan_chunks(1500, 1, &layout()).unwrap();
        let mut names: Vec<_> = chunks
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        let ordered = names.clone();
        names.sort();
        assert_eq!(names, ordered);
    }

    proptest! {
        #[test]
        fn prop_chunks_partition_range(total in 1u64..10_000_000, chunk in 1u64..2_000_000) {
            let chunks = plan_chunks(total, chunk, &layout()).unwrap();

            prop_assert_eq!(chunks.len() as u64, total.div_ceil(chunk));
            prop_assert_eq!(chunks[0].start, 0);
            prop_assert_eq!(chunks.last().unwrap().end, total - 1);
            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[0].end + 1, pair[1].start);
            }
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.id, i);
                prop_assert!(c.expected_size() >= 1 && c.expected_size() <= chunk);
            }
            let sum: u64 = chunks.iter().map(ChunkDescriptor::expected_size).sum();
            prop_assert_eq!(sum, total);
        }
    }
}
