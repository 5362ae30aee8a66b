//! GXF grids shipped inside ZIP archives.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::config::DecodeOptions;
use crate::dataset::{decode_with_options, GxfDataset};
use crate::error::Result;

const MAX_PREALLOCATION: u64 = 64 << 20;

/// A ZIP file holding one or more `.gxf` entries.
pub struct GxfArchive {
    path: PathBuf,
    options: DecodeOptions,
}

impl GxfArchive {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            options: DecodeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Names of the `.gxf` entries, in archive order.
    pub fn entry_names(&self) -> Result<Vec<String>> {
        let archive = ZipArchive::new(File::open(&self.path)?)?;
        Ok(archive
            .file_names()
            .filter(|name| is_gxf_name(name))
            .map(str::to_string)
            .collect())
    }

    /// Decodes every `.gxf` entry. Entries are read sequentially and decoded
    /// in parallel; the first failure is returned.
    pub fn decode_all(&self) -> Result<Vec<(String, GxfDataset)>> {
        let entries = self.read_entries()?;
        info!(
            "Decoding {} GXF entries from {:?}",
            entries.len(),
            self.path
        );

        entries
            .into_par_iter()
            .map(|(name, bytes)| -> Result<(String, GxfDataset)> {
                let dataset = decode_with_options(Cursor::new(bytes), &self.options)?;
                Ok((name, dataset))
            })
            .collect()
    }

    fn read_entries(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut archive = ZipArchive::new(File::open(&self.path)?)?;
        let mut entries = Vec::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() || !is_gxf_name(file.name()) {
                continue;
            }
            let name = file.name().to_string();
            let mut bytes = Vec::with_capacity(capacity_hint(file.size()));
            file.read_to_end(&mut bytes)?;
            debug!("Read entry {} ({} bytes)", name, bytes.len());
            entries.push((name, bytes));
        }

        Ok(entries)
    }
}

/// Preallocation for an entry. The declared size comes from the archive and
/// is not trusted beyond `MAX_PREALLOCATION`.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATION)).unwrap_or(0)
}

fn is_gxf_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gxf"))
}
