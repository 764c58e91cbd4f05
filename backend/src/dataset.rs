use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::models::{GeoNode, StreetEdge};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] io::Error),
    #[error("invalid dataset definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("dataset contains no nodes")]
    EmptyDataset,
}

/// Nodes plus optional street edges, as exported for the visualizer.
///
/// Two file shapes are accepted: `{"nodes": [...], "edges": [...]}` and a
/// bare node array, which routes over the proximity fallback.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "DatasetFile")]
pub struct Dataset {
    pub nodes: Vec<GeoNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<StreetEdge>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Streets {
        nodes: Vec<GeoNode>,
        #[serde(default)]
        edges: Option<Vec<StreetEdge>>,
    },
    NodesOnly(Vec<GeoNode>),
}

impl From<DatasetFile> for Dataset {
    fn from(file: DatasetFile) -> Self {
        match file {
            DatasetFile::Streets { nodes, edges } => Self { nodes, edges },
            DatasetFile::NodesOnly(nodes) => Self { nodes, edges: None },
        }
    }
}

impl Dataset {
    pub fn edges(&self) -> Option<&[StreetEdge]> {
        self.edges.as_deref()
    }

    pub fn has_edges(&self) -> bool {
        self.edges.as_ref().is_some_and(|edges| !edges.is_empty())
    }

    /// Reads `<stem>.json.zst` when it exists next to `path`, plain JSON otherwise.
    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();

        if path.extension().is_some_and(|ext| ext == "zst") {
            return Self::read_compressed(path);
        }

        let compressed_path = path.with_extension("json.zst");
        if compressed_path.exists() {
            tracing::debug!("reading compressed dataset {}", compressed_path.display());
            return Self::read_compressed(&compressed_path);
        }

        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn read_compressed(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        let decoder = zstd::stream::read::Decoder::new(file)?;
        Self::from_reader(BufReader::new(decoder))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, DatasetError> {
        let dataset: Dataset = serde_json::from_reader(reader)?;
        if dataset.nodes.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }
        Ok(dataset)
    }

    /// Writes plain JSON to `path` and a zstd copy beside it.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();

        self.write_compressed(path.with_extension("json.zst"))?;

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_compressed(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let file = File::create(path)?;
        let mut encoder = zstd::stream::write::Encoder::new(file, 3)?;
        serde_json::to_writer(&mut encoder, self)?;
        encoder.finish()?;
        Ok(())
    }
}
