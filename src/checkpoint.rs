//! Saving and loading networks.
//!
//! Two encodings are supported, picked from the file extension:
//! - `.bin`: magic bytes, format version, bincode payload
//! - anything else: JSON text (`{"layers": [...], "weights": {"weights": [...]}}`)
//!
//! Both are validated against the layer sizes on load.

use crate::neural::{Network, NetworkError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"ENET";

/// On-disk encoding of a network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkFormat {
    Json,
    Binary,
}

impl NetworkFormat {
    /// Pick the encoding from a path's extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => Self::Binary,
            _ => Self::Json,
        }
    }
}

/// Network file I/O
pub struct NetworkFile;

impl NetworkFile {
    /// Current binary format version
    pub const VERSION: u32 = 1;

    /// Save a network, choosing the encoding from the extension
    pub fn save<P: AsRef<Path>>(network: &Network, path: P) -> Result<(), NetworkError> {
        let path = path.as_ref();
        match NetworkFormat::from_path(path) {
            NetworkFormat::Json => Self::save_json(network, path),
            NetworkFormat::Binary => Self::save_binary(network, path),
        }
    }

    /// Load a network, choosing the decoding from the extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Network, NetworkError> {
        let path = path.as_ref();
        match NetworkFormat::from_path(path) {
            NetworkFormat::Json => Self::load_json(path),
            NetworkFormat::Binary => Self::load_binary(path),
        }
    }

    pub fn save_json<P: AsRef<Path>>(network: &Network, path: P) -> Result<(), NetworkError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, network)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Network, NetworkError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Decode a network from JSON text
    pub fn from_json(json: &str) -> Result<Network, NetworkError> {
        serde_json::from_str(json).map_err(|e| NetworkError::MalformedNetworkData(e.to_string()))
    }

    pub fn save_binary<P: AsRef<Path>>(network: &Network, path: P) -> Result<(), NetworkError> {
        let mut writer = BufWriter::new(File::create(path)?);

        writer.write_all(MAGIC)?;
        writer.write_all(&Self::VERSION.to_le_bytes())?;

        let encoded = bincode::serialize(network)?;
        writer.write_all(&encoded)?;
        writer.flush()?;

        Ok(())
    }

    pub fn load_binary<P: AsRef<Path>>(path: P) -> Result<Network, NetworkError> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    /// Decode a network from the binary encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Network, NetworkError> {
        if bytes.len() < 8 || &bytes[..4] != MAGIC {
            return Err(NetworkError::MalformedNetworkData(
                "Invalid magic bytes".to_string(),
            ));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version != Self::VERSION {
            return Err(NetworkError::MalformedNetworkData(format!(
                "Version mismatch: expected {}, found {}",
                Self::VERSION,
                version
            )));
        }

        bincode::deserialize(&bytes[8..])
            .map_err(|e| NetworkError::MalformedNetworkData(e.to_string()))
    }
}

/// Keeps the best network of every few generations on disk
pub struct BestNetworkArchive {
    /// Directory for archived networks
    pub base_dir: PathBuf,
    /// Generations between saves
    pub interval: u32,
    /// Maximum files to keep
    pub max_files: usize,
    last_saved: Option<u32>,
}

impl BestNetworkArchive {
    pub fn new<P: Into<PathBuf>>(base_dir: P, interval: u32, max_files: usize) -> Result<Self, NetworkError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            interval,
            max_files,
            last_saved: None,
        })
    }

    /// Check if this generation should be archived
    pub fn should_save(&self, generation: u32) -> bool {
        self.interval > 0
            && generation > 0
            && generation % self.interval == 0
            && self.last_saved != Some(generation)
    }

    pub fn path_for(&self, generation: u32) -> PathBuf {
        self.base_dir.join(format!("best_gen_{:06}.json", generation))
    }

    /// Save a network and prune old files
    pub fn save(&mut self, generation: u32, network: &Network) -> Result<PathBuf, NetworkError> {
        let path = self.path_for(generation);
        NetworkFile::save(network, &path)?;
        self.last_saved = Some(generation);

        self.cleanup()?;

        Ok(path)
    }

    fn archived(&self) -> Result<Vec<std::fs::DirEntry>, NetworkError> {
        Ok(std::fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("best_gen_"))
            .collect())
    }

    /// Remove oldest files beyond the limit
    fn cleanup(&self) -> Result<(), NetworkError> {
        let mut files = self.archived()?;

        if files.len() > self.max_files {
            // Names are zero padded, so lexical order is generation order
            files.sort_by_key(|e| e.file_name());

            let to_remove = files.len() - self.max_files;
            for entry in files.into_iter().take(to_remove) {
                std::fs::remove_file(entry.path())?;
            }
        }

        Ok(())
    }

    /// Most recently archived network file
    pub fn find_latest(&self) -> Option<PathBuf> {
        self.archived()
            .ok()?
            .into_iter()
            .max_by_key(|e| e.file_name())
            .map(|e| e.path())
    }
}
