//! Keypoint/descriptor dumps on disk.
//!
//! A dump is what a feature source hands to the matcher for one image: the
//! keypoints plus one descriptor row per keypoint. Dumps are stored either as
//! pretty JSON or as compact bincode.

use dmatch_core::{DescriptorSet, Keypoint, MetricFamily};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Cannot infer dump format from {0:?} (expected .json, .bin or .dat)")]
    UnknownFormat(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// On-disk encoding of a [`FeatureDump`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Json,
    Binary,
}

impl DumpFormat {
    /// Infer the format from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(DumpFormat::Json),
            Some("bin") | Some("dat") => Ok(DumpFormat::Binary),
            _ => Err(StoreError::UnknownFormat(path.display().to_string())),
        }
    }
}

/// Keypoints of one image with their parallel descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDump {
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
    pub descriptors: DescriptorSet,
}

impl FeatureDump {
    pub fn new(keypoints: Vec<Keypoint>, descriptors: DescriptorSet) -> Self {
        Self { keypoints, descriptors }
    }

    /// Descriptors only, e.g. when keypoints live elsewhere.
    pub fn from_descriptors(descriptors: DescriptorSet) -> Self {
        Self { keypoints: Vec::new(), descriptors }
    }

    pub fn family(&self) -> MetricFamily {
        self.descriptors.family()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Keypoint and descriptor counts agree, or no keypoints were supplied.
    pub fn is_consistent(&self) -> bool {
        self.keypoints.is_empty() || self.keypoints.len() == self.descriptors.len()
    }

    /// Load a dump, choosing the format from the extension.
    pub fn load<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let format = DumpFormat::from_path(&path)?;
        Self::load_as(path, format)
    }

    pub fn load_as<P: AsRef<Path>>(path: P, format: DumpFormat) -> StoreResult<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let dump = Self::read_from(reader, format)?;
        debug!(
            "Loaded {} {} descriptors ({} keypoints) from {}",
            dump.len(),
            dump.family(),
            dump.keypoints.len(),
            path.display()
        );
        Ok(dump)
    }

    /// Decode a dump; descriptor invariants are re-checked during decoding.
    pub fn read_from<R: Read>(reader: R, format: DumpFormat) -> StoreResult<Self> {
        let dump: FeatureDump = match format {
            DumpFormat::Json => serde_json::from_reader(reader)?,
            DumpFormat::Binary => bincode::deserialize_from(reader)?,
        };
        if !dump.is_consistent() {
            warn!(
                "Dump has {} keypoints but {} descriptors",
                dump.keypoints.len(),
                dump.descriptors.len()
            );
        }
        Ok(dump)
    }

    /// Save a dump, choosing the format from the extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let format = DumpFormat::from_path(&path)?;
        self.save_as(path, format)
    }

    pub fn save_as<P: AsRef<Path>>(&self, path: P, format: DumpFormat) -> StoreResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer, format)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: W, format: DumpFormat) -> StoreResult<()> {
        match format {
            DumpFormat::Json => serde_json::to_writer_pretty(writer, self)?,
            DumpFormat::Binary => bincode::serialize_into(writer, self)?,
        }
        Ok(())
    }
}
