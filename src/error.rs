use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found at {0}")]
    Missing(PathBuf),
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode variant image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("entry {0} has no usable image url")]
    NoImage(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read detections from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed detection frame on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to serialize state: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload of {0} bytes exceeds frame limit")]
    Oversized(usize),
}
