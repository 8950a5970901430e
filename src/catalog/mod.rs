//! Resource catalog
//!
//! Maps group names to an ordered set of items, each pointing at an object in
//! the storage backend. Loaded once at startup from a TOML file and read-only
//! afterwards, so lookups need no locking:
//!
//! ```toml
//! [groups.EBOOK_BREATH]
//! DOWNLOAD = "myFolder/Breath.pdf"
//! ```

mod names;

pub use names::{GroupName, ItemName, NameError, MAX_NAME_LEN};

use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("group not found: {0}")]
    UnknownGroup(String),

    #[error("item '{item}' not found in group '{group}'")]
    UnknownItem { group: String, item: String },

    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog: {0}")]
    Parse(String),

    #[error("empty locator for '{group}/{item}'")]
    EmptyLocator { group: String, item: String },
}

/// Where an item lives in the storage backend (an object key for S3).
///
/// Opaque to everything except the [`LinkSigner`](crate::signing::LinkSigner)
/// that turns it into a delegated link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named bundle of items, in declaration order
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    pub name: GroupName,
    pub items: IndexMap<ItemName, Locator>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    groups: IndexMap<GroupName, IndexMap<ItemName, Locator>>,
}

/// Immutable group → item → locator table
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    groups: IndexMap<GroupName, ResourceGroup>,
}

impl ResourceCatalog {
    /// Load the catalog from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let catalog = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            groups = catalog.len(),
            "Resource catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse a catalog from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut groups = IndexMap::with_capacity(file.groups.len());
        for (name, items) in file.groups {
            for (item, locator) in &items {
                if locator.as_str().trim().is_empty() {
                    return Err(CatalogError::EmptyLocator {
                        group: name.to_string(),
                        item: item.to_string(),
                    });
                }
            }
            groups.insert(name.clone(), ResourceGroup { name, items });
        }

        Ok(Self { groups })
    }

    /// Group names in declaration order
    pub fn group_names(&self) -> Vec<&GroupName> {
        self.groups.keys().collect()
    }

    pub fn contains_group(&self, group: &GroupName) -> bool {
        self.groups.contains_key(group)
    }

    pub fn group(&self, group: &GroupName) -> Result<&ResourceGroup, CatalogError> {
        self.groups
            .get(group)
            .ok_or_else(|| CatalogError::UnknownGroup(group.to_string()))
    }

    /// Item names of a group in declaration order
    pub fn item_names(&self, group: &GroupName) -> Result<Vec<&ItemName>, CatalogError> {
        Ok(self.group(group)?.items.keys().collect())
    }

    pub fn locator(&self, group: &GroupName, item: &ItemName) -> Result<&Locator, CatalogError> {
        self.group(group)?
            .items
            .get(item)
            .ok_or_else(|| CatalogError::UnknownItem {
                group: group.to_string(),
                item: item.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [groups.EBOOK_ZEBRA]
        DOWNLOAD = "myFolder/zebra.pdf"

        [groups.EBOOK_APPLE]
        "PART 2" = "myFolder/apple-2.pdf"
        "PART 1" = "myFolder/apple-1.pdf"
    "#;

    fn group(name: &str) -> GroupName {
        GroupName::parse(name).unwrap()
    }

    fn item(name: &str) -> ItemName {
        ItemName::parse(name).unwrap()
    }

    #[test]
    fn test_parse_preserves_order() {
        let catalog = ResourceCatalog::from_toml_str(CATALOG).unwrap();

        let groups: Vec<_> = catalog.group_names().iter().map(|g| g.as_str()).collect();
        assert_eq!(groups, vec!["EBOOK_ZEBRA", "EBOOK_APPLE"]);

        let items: Vec<_> = catalog
            .item_names(&group("EBOOK_APPLE"))
            .unwrap()
            .iter()
            .map(|i| i.as_str())
            .collect();
        assert_eq!(items, vec!["PART 2", "PART 1"]);
    }

    #[test]
    fn test_locator_lookup() {
        let catalog = ResourceCatalog::from_toml_str(CATALOG).unwrap();

        let locator = catalog
            .locator(&group("EBOOK_ZEBRA"), &item("DOWNLOAD"))
            .unwrap();
        assert_eq!(locator.as_str(), "myFolder/zebra.pdf");
    }

    #[test]
    fn test_unknown_lookups() {
        let catalog = ResourceCatalog::from_toml_str(CATALOG).unwrap();

        assert!(!catalog.contains_group(&group("NOPE")));
        assert!(matches!(
            catalog.item_names(&group("NOPE")),
            Err(CatalogError::UnknownGroup(_))
        ));
        assert!(matches!(
            catalog.locator(&group("NOPE"), &item("DOWNLOAD")),
            Err(CatalogError::UnknownGroup(_))
        ));
        assert!(matches!(
            catalog.locator(&group("EBOOK_ZEBRA"), &item("MISSING")),
            Err(CatalogError::UnknownItem { .. })
        ));
    }

    #[test]
    fn test_rejects_traversal_names() {
        let result = ResourceCatalog::from_toml_str(
            r#"
            [groups.".."]
            DOWNLOAD = "x"
            "#,
        );
        assert!(matches!(result, Err(CatalogError::Parse(_))));

        let result = ResourceCatalog::from_toml_str(
            r#"
            [groups.OK]
            "../up" = "x"
            "#,
        );
        assert!(matches!(result, Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_rejects_empty_locator() {
        let result = ResourceCatalog::from_toml_str(
            r#"
            [groups.OK]
            DOWNLOAD = "  "
            "#,
        );
        assert!(matches!(result, Err(CatalogError::EmptyLocator { .. })));
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = ResourceCatalog::from_toml_str("").unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.group_names().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = ResourceCatalog::load("/nonexistent/catalog.toml");
        assert!(matches!(result, Err(CatalogError::Read { .. })));
    }
}
