//! Final file assembly.
//!
//! Parts are concatenated in id order into `<dest>.assembling`, which is
//! renamed onto the destination once complete. Nothing is written unless
//! every part is present with its expected size.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::plan::{part_len, ChunkDescriptor, ChunkState};

/// Buffer size for copying parts (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Suffix of the in-progress output file.
const ASSEMBLING_SUFFIX: &str = ".assembling";

/// Errors from [`Assembler::assemble`].
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Some parts are missing or have the wrong size.
    #[error("Assembly incomplete: missing parts {missing:?}, invalid parts {invalid:?}")]
    Incomplete {
        missing: Vec<usize>,
        invalid: Vec<usize>,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AssemblyError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| AssemblyError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Leave part files in place after they are consumed.
    pub keep_parts: bool,
}

/// The assembled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the output.
    pub sha256: String,
}

/// Concatenates part files into the final output.
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    options: AssemblyOptions,
}

impl Assembler {
    /// Create an assembler with the given options.
    pub fn new(options: AssemblyOptions) -> Self {
        Self { options }
    }

    /// Check that every chunk is complete and its part has the expected size.
    pub fn validate(chunks: &[ChunkDescriptor]) -> Result<(), AssemblyError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        for chunk in chunks {
            match part_len(&chunk.path) {
                _ if chunk.state != ChunkState::Complete => missing.push(chunk.id),
                None => missing.push(chunk.id),
                Some(len) if len != chunk.expected_size() => invalid.push(chunk.id),
                Some(_) => {}
            }
        }

        if missing.is_empty() && invalid.is_empty() {
            Ok(())
        } else {
            Err(AssemblyError::Incomplete { missing, invalid })
        }
    }

    /// Concatenate the parts of `chunks` into `dest`.
    ///
    /// Blocking; run it off the async runtime.
    pub fn assemble(
        &self,
        chunks: &[ChunkDescriptor],
        dest: &Path,
    ) -> Result<AssemblyReport, AssemblyError> {
        Self::validate(chunks)?;

        let mut ordered: Vec<&ChunkDescriptor> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.id);

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(AssemblyError::io(parent))?;
        }

        let temp = assembling_path(dest);
        let file = File::create(&temp).map_err(AssemblyError::io(&temp))?;
        let mut writer = BufWriter::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut bytes = 0u64;

        for chunk in ordered {
            let mut part = File::open(&chunk.path).map_err(AssemblyError::io(&chunk.path))?;
            loop {
                let n = part
                    .read(&mut buffer)
                    .map_err(AssemblyError::io(&chunk.path))?;
                if n == 0 {
                    break;
                }
                writer
                    .write_all(&buffer[..n])
                    .map_err(AssemblyError::io(&temp))?;
                hasher.update(&buffer[..n]);
                bytes += n as u64;
            }

            if !self.options.keep_parts {
                fs::remove_file(&chunk.path).map_err(AssemblyError::io(&chunk.path))?;
            }
            tracing::trace!(chunk = chunk.id, "Part appended");
        }

        let file = writer
            .into_inner()
            .map_err(|e| AssemblyError::Io {
                path: temp.clone(),
                source: e.into_error(),
            })?;
        file.sync_all().map_err(AssemblyError::io(&temp))?;
        drop(file);

        fs::rename(&temp, dest).map_err(AssemblyError::io(dest))?;

        let report = AssemblyReport {
            path: dest.to_path_buf(),
            bytes,
            sha256: format!("{:x}", hasher.finalize()),
        };
        tracing::info!(path = %dest.display(), bytes, sha256 = %report.sha256, "File assembled");
        Ok(report)
    }
}

/// `<dest>.assembling`
pub fn assembling_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(ASSEMBLING_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::plan::{plan_chunks, PartLayout};
    use tempfile::TempDir;

    fn complete_parts(dir: &Path, data: &[u8], chunk: u64) -> Vec<ChunkDescriptor> {
        let mut chunks = plan_chunks(data.len() as u64, chunk, &PartLayout::new(dir, "f")).unwrap();
        for c in &mut chunks {
            fs::write(&c.path, &data[c.start as usize..=c.end as usize]).unwrap();
            c.state = ChunkState::Complete;
        }
        chunks
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn test_assembles_in_order_and_removes_parts() {
        let temp = TempDir::new().unwrap();
        let data = sample(1000);
        let chunks = complete_parts(temp.path(), &data, 300);
        let dest = temp.path().join("out").join("f.bin");

        let report = Assembler::default().assemble(&chunks, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), data);
        assert_eq!(report.bytes, 1000);
        assert_eq!(report.path, dest);
        assert!(chunks.iter().all(|c| !c.path.exists()));
        assert!(!assembling_path(&dest).exists());
    }

    #[test]
    fn test_assembling_twice_is_identical() {
        let temp = TempDir::new().unwrap();
        let data = sample(4096);
        let chunks = complete_parts(temp.path(), &data, 1000);
        let assembler = Assembler::new(AssemblyOptions { keep_parts: true });

        let first = assembler.assemble(&chunks, &temp.path().join("a.bin")).unwrap();
        let second = assembler.assemble(&chunks, &temp.path().join("b.bin")).unwrap();

        assert_eq!(first.sha256, second.sha256);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(
            fs::read(temp.path().join("a.bin")).unwrap(),
            fs::read(temp.path().join("b.bin")).unwrap()
        );
    }

    #[test]
    fn test_incomplete_set_leaves_everything_untouched() {
        let temp = TempDir::new().unwrap();
        let data = sample(900);
        let mut chunks = complete_parts(temp.path(), &data, 300);
        fs::remove_file(&chunks[1].path).unwrap();
        fs::write(&chunks[2].path, b"short").unwrap();
        let dest = temp.path().join("f.bin");

        let err = Assembler::default().assemble(&chunks, &dest).unwrap_err();

        match err {
            AssemblyError::Incomplete { missing, invalid } => {
                assert_eq!(missing, vec![1]);
                assert_eq!(invalid, vec![2]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
        assert!(!assembling_path(&dest).exists());
        assert!(chunks[0].path.exists());

        chunks[0].state = ChunkState::Failed;
        assert!(matches!(
            Assembler::validate(&chunks),
            Err(AssemblyError::Incomplete { .. })
        ));
    }

    #[test]
    fn test_assembling_path_suffix() {
        assert_eq!(
            assembling_path(Path::new("dl/movie.mkv")),
            PathBuf::from("dl/movie.mkv.assembling")
        );
    }
}
