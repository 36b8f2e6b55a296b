//! On-disk forest blob.
//!
//! Layout: `[bincode(snapshot)][magic "FRS1"][crc32 u32 LE]`. Writes go to a
//! temp file that is renamed into place; reads map the file and verify the
//! checksum before decoding.

use std::fs::{self, File};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tree::Node;
use crate::error::{AnnoyError, Result};
use crate::metric::Metric;

const BLOB_MAGIC: &[u8; 4] = b"FRS1";
const FOOTER_LEN: usize = 8;
const FORMAT_VERSION: u32 = 1;

/// Borrowed view of a built forest, used for writing.
#[derive(Serialize)]
pub struct SnapshotRef<'a> {
    pub version: u32,
    pub metric: Metric,
    pub dimension: usize,
    pub items: &'a [Option<Vec<f32>>],
    pub nodes: &'a [Node],
    pub roots: &'a [u32],
}

/// Owned forest state read back from disk.
#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub metric: Metric,
    pub dimension: usize,
    pub items: Vec<Option<Vec<f32>>>,
    pub nodes: Vec<Node>,
    pub roots: Vec<u32>,
}

impl<'a> SnapshotRef<'a> {
    pub fn new(
        metric: Metric,
        dimension: usize,
        items: &'a [Option<Vec<f32>>],
        nodes: &'a [Node],
        roots: &'a [u32],
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            metric,
            dimension,
            items,
            nodes,
            roots,
        }
    }
}

/// Encode and atomically write a snapshot. Returns the payload size.
pub fn write(path: &Path, snapshot: &SnapshotRef<'_>) -> Result<usize> {
    let payload = bincode::serialize(snapshot)
        .map_err(|e| AnnoyError::invalid(format!("cannot encode forest: {}", e)))?;
    let crc = crc32fast::hash(&payload);

    let mut output = Vec::with_capacity(payload.len() + FOOTER_LEN);
    output.extend_from_slice(&payload);
    output.extend_from_slice(BLOB_MAGIC);
    output.extend_from_slice(&crc.to_le_bytes());

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &output)?;
    fs::rename(&tmp_path, path)?;

    tracing::debug!(
        path = %path.display(),
        bytes = payload.len(),
        crc,
        "forest blob written"
    );
    Ok(payload.len())
}

/// Read, verify and decode a snapshot.
pub fn read(path: &Path) -> Result<Snapshot> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only and dropped before this function returns;
    // the blob is not expected to change while it is being decoded.
    let raw = unsafe { memmap2::Mmap::map(&file)? };

    if raw.len() < FOOTER_LEN || &raw[raw.len() - FOOTER_LEN..raw.len() - 4] != BLOB_MAGIC {
        return Err(AnnoyError::corrupt(format!(
            "{} is not a forest blob",
            path.display()
        )));
    }

    let payload = &raw[..raw.len() - FOOTER_LEN];
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&raw[raw.len() - 4..]);
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let computed_crc = crc32fast::hash(payload);
    if stored_crc != computed_crc {
        return Err(AnnoyError::corrupt(format!(
            "forest blob CRC32 mismatch: expected {:#010x}, got {:#010x}",
            stored_crc, computed_crc
        )));
    }

    let snapshot: Snapshot = bincode::deserialize(payload)
        .map_err(|e| AnnoyError::corrupt(format!("cannot decode forest: {}", e)))?;
    if snapshot.version != FORMAT_VERSION {
        return Err(AnnoyError::corrupt(format!(
            "unsupported forest format version {}",
            snapshot.version
        )));
    }
    snapshot.validate()?;
    Ok(snapshot)
}

impl Snapshot {
    /// Check that stored vectors have the forest's dimension, that roots stay
    /// inside the arena and that every child precedes its parent. Trees are
    /// written children first, so the last rule also rules out cycles.
    fn validate(&self) -> Result<()> {
        let n_nodes = self.nodes.len() as u32;
        let n_items = self.items.len() as u32;

        if let Some(position) = self
            .items
            .iter()
            .position(|v| v.as_ref().is_some_and(|v| v.len() != self.dimension))
        {
            return Err(AnnoyError::corrupt(format!(
                "item {} does not have {} components",
                position, self.dimension
            )));
        }
        if !self.roots.iter().all(|r| *r < n_nodes) {
            return Err(AnnoyError::corrupt("root outside the node arena"));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            let before = |child: &u32| (*child as usize) < index;
            let ok = match node {
                Node::Leaf { items } => items.iter().all(|p| *p < n_items),
                Node::Plane { normal, left, right, .. } => {
                    normal.len() == self.dimension && before(left) && before(right)
                }
                Node::Bit { dim, left, right } => {
                    (*dim as usize) < self.dimension && before(left) && before(right)
                }
            };
            if !ok {
                return Err(AnnoyError::corrupt("malformed forest node"));
            }
        }
        Ok(())
    }
}
