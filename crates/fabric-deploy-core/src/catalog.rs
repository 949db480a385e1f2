//! Discovery of deployable items in a checked-out source tree.
//!
//! Items live one level below the root, one directory each, named
//! `<displayName>.<Type>` (e.g. `Sales.Report`). Directories without a known
//! type marker are ignored. Nothing is memoised: every call re-reads the
//! filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DeployError, Result};
use crate::model::{ContentItem, ItemType, PayloadType};

/// Split a directory name into display name and item type.
pub fn classify(dir_name: &str) -> Option<(String, ItemType)> {
    ItemType::ALL.into_iter().find_map(|item_type| {
        let pos = dir_name.find(&item_type.suffix())?;
        let display_name = &dir_name[..pos];
        (!display_name.is_empty()).then(|| (display_name.to_string(), item_type))
    })
}

/// Logical file name and on-disk path of an item's definition part.
///
/// Notebooks exported as `<displayName>.ipynb` are used when the
/// `notebook-content.py` file is absent. The returned path may not exist.
pub fn resolve_definition(dir: &Path, display_name: &str, item_type: ItemType) -> (String, PathBuf) {
    let logical = item_type.definition_file().to_string();
    let primary = dir.join(&logical);
    if item_type == ItemType::Notebook && !primary.exists() {
        let fallback = format!("{display_name}.ipynb");
        let fallback_path = dir.join(&fallback);
        if fallback_path.exists() {
            return (fallback, fallback_path);
        }
    }
    (logical, primary)
}

#[derive(Debug, Clone)]
pub struct ContentCatalog {
    root: PathBuf,
    item_types: Option<Vec<ItemType>>,
}

impl ContentCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            item_types: None,
        }
    }

    /// Restrict discovery to the given types. An empty list means no filter.
    #[must_use]
    pub fn with_item_types(mut self, types: Vec<ItemType>) -> Self {
        self.item_types = (!types.is_empty()).then_some(types);
        self
    }

    /// Lazily iterate the items under the root in directory order.
    pub fn items(&self) -> Result<CatalogIter<'_>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            DeployError::source_tree(format!(
                "cannot read item root {}: {e}",
                self.root.display()
            ))
        })?;
        Ok(CatalogIter {
            catalog: self,
            entries,
        })
    }

    /// Every item under the root, sorted by directory name.
    pub fn discover(&self) -> Result<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self.items()?.collect();
        items.sort_by(|a, b| a.directory.cmp(&b.directory));
        Ok(items)
    }

    fn in_scope(&self, item_type: ItemType) -> bool {
        self.item_types
            .as_ref()
            .is_none_or(|types| types.contains(&item_type))
    }

    fn item_for(&self, dir: PathBuf) -> Option<ContentItem> {
        let name = dir.file_name()?.to_str()?;
        let Some((display_name, item_type)) = classify(name) else {
            debug!(dir = %dir.display(), "no known item type; skipping");
            return None;
        };
        if !self.in_scope(item_type) {
            debug!(dir = %dir.display(), %item_type, "item type out of scope; skipping");
            return None;
        }
        let (logical_file, definition_path) = resolve_definition(&dir, &display_name, item_type);
        Some(ContentItem {
            display_name,
            item_type,
            directory: dir,
            logical_file,
            definition_path,
            payload_type: PayloadType::InlineBase64,
        })
    }
}

pub struct CatalogIter<'a> {
    catalog: &'a ContentCatalog,
    entries: fs::ReadDir,
}

impl Iterator for CatalogIter<'_> {
    type Item = ContentItem;

    fn next(&mut self) -> Option<Self::Item> {
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "unreadable directory entry; skipping");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(item) = self.catalog.item_for(path) {
                return Some(item);
            }
        }
        None
    }
}
