use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use image::{Rgba, RgbaImage};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::CatalogError;

const PLACEHOLDER_SIZE: u32 = 100;
const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([20, 200, 20, 255]);

/// Image fields tried in order for each plant entry.
#[derive(Debug, Default, Deserialize)]
struct PlantEntry {
    springimgpng_med: Option<String>,
    summerimgpng_med: Option<String>,
    springimgpng_low: Option<String>,
}

impl PlantEntry {
    fn image_source(&self) -> Option<&str> {
        [
            &self.springimgpng_med,
            &self.summerimgpng_med,
            &self.springimgpng_low,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|s| !s.trim().is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct CatalogSource {
    pub path: PathBuf,
    pub limit: usize,
    pub fetch_timeout: Duration,
}

/// Decoded plant images, indexed by variant id. Never empty.
pub struct Catalog {
    variants: Vec<RgbaImage>,
}

impl Catalog {
    pub fn placeholder() -> Self {
        Self {
            variants: vec![RgbaImage::from_pixel(
                PLACEHOLDER_SIZE,
                PLACEHOLDER_SIZE,
                PLACEHOLDER_COLOR,
            )],
        }
    }

    #[cfg(test)]
    pub(crate) fn from_variants(variants: Vec<RgbaImage>) -> Self {
        if variants.is_empty() {
            return Self::placeholder();
        }
        Self { variants }
    }

    /// Loads the catalog described by `source`. Individual failures are
    /// logged and skipped; if nothing loads the placeholder takes over.
    pub fn load(source: &CatalogSource) -> Self {
        log::info!("loading plant catalog from {}", source.path.display());
        match load_variants(source) {
            Ok(variants) if !variants.is_empty() => {
                log::info!("loaded {} plant variants", variants.len());
                Self { variants }
            }
            Ok(_) => {
                log::warn!("plant catalog produced no images, using placeholder");
                Self::placeholder()
            }
            Err(err) => {
                log::warn!("failed to initialize plant catalog: {err}, using placeholder");
                Self::placeholder()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn get(&self, id: usize) -> Option<&RgbaImage> {
        self.variants.get(id)
    }

    /// Width over height of variant `id`.
    pub fn aspect(&self, id: usize) -> Option<f32> {
        self.get(id)
            .filter(|img| img.height() > 0)
            .map(|img| img.width() as f32 / img.height() as f32)
    }
}

fn load_variants(source: &CatalogSource) -> Result<Vec<RgbaImage>, CatalogError> {
    if !source.path.exists() {
        return Err(CatalogError::Missing(source.path.clone()));
    }
    let text = fs::read_to_string(&source.path).map_err(|err| CatalogError::Io {
        path: source.path.clone(),
        source: err,
    })?;
    let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
    let base_dir = source.path.parent().unwrap_or(Path::new("."));

    let client = Client::builder()
        .timeout(source.fetch_timeout)
        .build()
        .map_err(CatalogError::Client)?;

    let progress = create_progress_bar(entries.len().min(source.limit) as u64);
    let mut variants = Vec::new();
    for (plant_id, value) in entries {
        if variants.len() >= source.limit {
            break;
        }
        match load_entry(&client, base_dir, &plant_id, value) {
            Ok(image) => {
                variants.push(image);
                progress.inc(1);
            }
            Err(err) => log::warn!("skipping plant {plant_id}: {err}"),
        }
    }
    progress.finish_and_clear();

    Ok(variants)
}

fn load_entry(
    client: &Client,
    base_dir: &Path,
    plant_id: &str,
    value: serde_json::Value,
) -> Result<RgbaImage, CatalogError> {
    let entry: PlantEntry = serde_json::from_value(value)?;
    let source = entry
        .image_source()
        .ok_or_else(|| CatalogError::NoImage(plant_id.to_string()))?;

    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        fetch(client, source)?
    } else if source.contains("://") {
        return Err(CatalogError::NoImage(plant_id.to_string()));
    } else {
        let path = base_dir.join(source);
        fs::read(&path).map_err(|err| CatalogError::Io { path, source: err })?
    };

    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

fn fetch(client: &Client, url: &str) -> Result<Vec<u8>, CatalogError> {
    let wrap = |err| CatalogError::Fetch {
        url: url.to_string(),
        source: err,
    };
    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(wrap)?;
    Ok(response.bytes().map_err(wrap)?.to_vec())
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] plants {pos}/{len} {wide_bar:.cyan/blue}",
    ) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}
