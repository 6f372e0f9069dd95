//! Persisting a single genome to disk in bincode form.

use crate::genome::Genome;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encode genome: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("decode genome: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("snapshot has {0} trailing bytes after the genome")]
    TrailingBytes(usize),
}

/// Destination for genomes captured mid-trial.
pub trait GenomeSink {
    fn save(&mut self, genome: &Genome) -> Result<(), SnapshotError>;
}

/// Sink that drops everything; used by replays.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl GenomeSink for Discard {
    fn save(&mut self, _genome: &Genome) -> Result<(), SnapshotError> {
        Ok(())
    }
}

/// Writes each saved genome over the same file, creating parent
/// directories as needed.
#[derive(Clone, Debug)]
pub struct FileSnapshot {
    path: PathBuf,
    saved: usize,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            saved: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn saved(&self) -> usize {
        self.saved
    }
}

impl GenomeSink for FileSnapshot {
    fn save(&mut self, genome: &Genome) -> Result<(), SnapshotError> {
        let bytes = encode(genome)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, bytes).map_err(|source| SnapshotError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.saved += 1;
        Ok(())
    }
}

pub fn encode(genome: &Genome) -> Result<Vec<u8>, SnapshotError> {
    Ok(bincode::serde::encode_to_vec(genome, bincode::config::standard())?)
}

/// Decodes exactly one genome; leftover bytes are an error.
pub fn decode(bytes: &[u8]) -> Result<Genome, SnapshotError> {
    let (genome, read): (Genome, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    if read != bytes.len() {
        return Err(SnapshotError::TrailingBytes(bytes.len() - read));
    }
    Ok(genome)
}

pub fn load(path: &Path) -> Result<Genome, SnapshotError> {
    let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NeatConfig;
    use crate::genome::Innovations;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn sample_genome() -> Genome {
        let config = NeatConfig::default();
        let mut innovations = Innovations::new(config.num_inputs, config.num_outputs);
        let mut rng = SmallRng::seed_from_u64(3);
        let mut genome = Genome::minimal(17, &config, &mut innovations, &mut rng);
        genome.fitness = 42.5;
        genome
    }

    #[test]
    fn file_snapshot_creates_directory_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model").join("model.bin");
        let genome = sample_genome();

        let mut sink = FileSnapshot::new(&path);
        sink.save(&genome).unwrap();

        assert!(path.exists());
        assert_eq!(sink.saved(), 1);
        assert_eq!(load(&path).unwrap(), genome);
    }

    #[test]
    fn later_saves_overwrite_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let mut sink = FileSnapshot::new(&path);

        let first = sample_genome();
        let second = Genome {
            id: 99,
            fitness: 1.0,
            ..first.clone()
        };
        sink.save(&first).unwrap();
        sink.save(&second).unwrap();

        assert_eq!(load(&path).unwrap().id, 99);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&sample_genome()).unwrap();
        bytes.extend_from_slice(&encode(&sample_genome()).unwrap());
        assert!(matches!(decode(&bytes), Err(SnapshotError::TrailingBytes(_))));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        match load(&path) {
            Err(SnapshotError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
