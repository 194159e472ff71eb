use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use percload_core::{AssetId, BackgroundCategory, ConfigurationError};
use rand::Rng;

use crate::config::AssetSelection;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Background images grouped by category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetPool {
    root: PathBuf,
    assets: BTreeMap<BackgroundCategory, Vec<AssetId>>,
}

impl AssetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists `root/<category>/` for image files. Asset ids are paths relative
    /// to `root`, sorted so the same seed always picks the same files.
    pub fn scan<P: AsRef<Path>>(
        root: P,
        categories: &[BackgroundCategory],
    ) -> std::io::Result<Self> {
        let root = root.as_ref();
        let mut assets = BTreeMap::new();

        for &category in categories {
            let dir = root.join(category.as_str());
            if !dir.is_dir() {
                warn!(
                    "Background folder for '{}' not found: {}",
                    category,
                    dir.display()
                );
                assets.insert(category, Vec::new());
                continue;
            }

            let mut files = Vec::new();
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_file() && has_image_extension(&path) {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        files.push(AssetId::new(format!("{}/{}", category.as_str(), name)));
                    }
                }
            }
            files.sort();

            if files.is_empty() {
                warn!("No image files for '{}' in {}", category, dir.display());
            } else {
                info!("Found {} backgrounds for '{}'", files.len(), category);
            }
            assets.insert(category, files);
        }

        Ok(Self {
            root: root.to_path_buf(),
            assets,
        })
    }

    pub fn insert(&mut self, category: BackgroundCategory, asset: AssetId) {
        self.assets.entry(category).or_default().push(asset);
    }

    pub fn assets(&self, category: BackgroundCategory) -> &[AssetId] {
        self.assets.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Absolute location of an asset on disk.
    pub fn path_of(&self, asset: &AssetId) -> PathBuf {
        self.root.join(asset.as_str())
    }

    pub fn validate(&self, categories: &[BackgroundCategory]) -> Result<(), ConfigurationError> {
        match categories.iter().find(|c| self.assets(**c).is_empty()) {
            Some(&category) => Err(ConfigurationError::EmptyAssetPool { category }),
            None => Ok(()),
        }
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        category: BackgroundCategory,
        policy: &AssetSelection,
        rng: &mut R,
    ) -> Result<AssetId, ConfigurationError> {
        let pool = self.assets(category);
        if pool.is_empty() {
            return Err(ConfigurationError::EmptyAssetPool { category });
        }
        let idx = match policy {
            AssetSelection::Random => rng.random_range(0..pool.len()),
            AssetSelection::Fixed { index } => index % pool.len(),
        };
        Ok(pool[idx].clone())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
