//! Product catalog.
//!
//! `assets/catalog.json` maps product → color → print → asset path (relative
//! to the catalog file's directory). The menu flow lists keys in sorted order
//! and the generator resolves the selected reference image from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{FitroomError, Result};

/// Nested selection tree: product → color → print → relative asset path.
type CatalogTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Loaded catalog, rooted at the directory containing `catalog.json` so
/// relative asset paths resolve against it.
#[derive(Debug, Clone)]
pub struct Catalog {
    tree: CatalogTree,
    base_dir: PathBuf,
}

impl Catalog {
    /// Load and parse the catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            FitroomError::Catalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let tree: CatalogTree = serde_json::from_str(&data)
            .map_err(|e| FitroomError::Catalog(format!("invalid catalog JSON: {}", e)))?;
        if tree.is_empty() {
            return Err(FitroomError::Catalog("catalog is empty".into()));
        }
        Ok(Self {
            tree,
            base_dir: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        })
    }

    /// Product keys, sorted.
    pub fn products(&self) -> Vec<&str> {
        self.tree.keys().map(String::as_str).collect()
    }

    /// Color keys for a product, sorted. Empty when the product is unknown.
    pub fn colors(&self, product: &str) -> Vec<&str> {
        self.tree
            .get(product)
            .map(|colors| colors.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Print keys for a product/color, sorted.
    pub fn prints(&self, product: &str, color: &str) -> Vec<&str> {
        self.tree
            .get(product)
            .and_then(|colors| colors.get(color))
            .map(|prints| prints.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn has_product(&self, product: &str) -> bool {
        self.tree.contains_key(product)
    }

    /// Absolute path of the reference asset for a full selection.
    pub fn asset_path(&self, product: &str, color: &str, print: &str) -> Result<PathBuf> {
        let rel = self
            .tree
            .get(product)
            .and_then(|colors| colors.get(color))
            .and_then(|prints| prints.get(print))
            .ok_or_else(|| {
                FitroomError::Catalog(format!(
                    "no asset for selection {}/{}/{}",
                    product, color, print
                ))
            })?;
        Ok(self.base_dir.join(rel))
    }

    pub fn product_count(&self) -> usize {
        self.tree.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "pocket_t_shirt": {
            "black": {
                "paint": "assets/pocket/black_paint.png",
                "glitter": "assets/pocket/black_glitter.png"
            },
            "white": { "paint": "assets/pocket/white_paint.png" }
        },
        "moon_walk_t_shirt": {
            "default": { "default": "assets/moon/default.png" }
        }
    }"#;

    fn write_catalog(tmp: &TempDir) -> PathBuf {
        let path = tmp.path().join("catalog.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_and_list() {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::load(&write_catalog(&tmp)).unwrap();

        assert_eq!(catalog.product_count(), 2);
        assert_eq!(
            catalog.products(),
            vec!["moon_walk_t_shirt", "pocket_t_shirt"]
        );
        assert_eq!(catalog.colors("pocket_t_shirt"), vec!["black", "white"]);
        assert_eq!(
            catalog.prints("pocket_t_shirt", "black"),
            vec!["glitter", "paint"]
        );
    }

    #[test]
    fn test_unknown_keys_list_empty() {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::load(&write_catalog(&tmp)).unwrap();

        assert!(!catalog.has_product("no_such"));
        assert!(catalog.colors("no_such").is_empty());
        assert!(catalog.prints("pocket_t_shirt", "green").is_empty());
    }

    #[test]
    fn test_asset_path_resolves_relative_to_catalog() {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::load(&write_catalog(&tmp)).unwrap();

        let path = catalog
            .asset_path("pocket_t_shirt", "white", "paint")
            .unwrap();
        assert_eq!(path, tmp.path().join("assets/pocket/white_paint.png"));

        assert!(catalog.asset_path("pocket_t_shirt", "white", "glitter").is_err());
    }

    #[test]
    fn test_missing_file_is_catalog_error() {
        let err = Catalog::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, FitroomError::Catalog(_)));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("catalog.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(Catalog::load(&path).is_err());
    }
}
