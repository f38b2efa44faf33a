//! Index aggregation: groups raw stored filenames into simple-index listings.
//!
//! Stateless by design. Every query is one listing call against the store
//! followed by pure in-memory grouping; nothing is cached or persisted, so a
//! listing that is briefly stale after a concurrent upload heals itself on
//! the next query. Concurrent queries are fully independent.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::package_name::derive_package_name;
use crate::store::{PackageStore, StoreError};

/// Read-side view over a [`PackageStore`].
#[derive(Clone)]
pub struct PackageIndex {
    store: Arc<dyn PackageStore>,
}

impl PackageIndex {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        PackageIndex { store }
    }

    /// All canonical package names in the bucket, deduplicated and sorted.
    ///
    /// Wheel filenames that fail the wheel grammar have no name and are
    /// silently excluded. An empty or unknown bucket yields an empty list.
    pub async fn list_package_names(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
        let filenames = self.store.list(bucket, "").await?;

        // TODO: collapse the egg/name split once product confirms eggs need
        // no distinct handling; the union below makes it a flat namespace.
        let mut names = BTreeSet::new();
        let mut eggs = BTreeSet::new();

        for filename in &filenames {
            if let Some(name) = derive_package_name(filename) {
                if name.ends_with(".egg") {
                    eggs.insert(name);
                } else {
                    names.insert(name);
                }
            }
        }

        let all: Vec<String> = names.union(&eggs).cloned().collect();
        debug!("{} package names in bucket {}", all.len(), bucket);
        Ok(all)
    }

    /// All filenames in the bucket whose derived name equals `package`
    /// exactly (case-sensitive), sorted.
    ///
    /// The store listing is narrowed with `package` as a key prefix before
    /// the exact-match filter; the prefix is an optimization only. An empty
    /// result is not an error; the caller decides whether to fall back to a
    /// public index.
    pub async fn list_package_files(
        &self,
        bucket: &str,
        package: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut files: Vec<String> = self
            .store
            .list(bucket, package)
            .await?
            .into_iter()
            .filter(|filename| derive_package_name(filename).as_deref() == Some(package))
            .collect();
        files.sort();

        debug!("{} files for package {} in bucket {}", files.len(), package, bucket);
        Ok(files)
    }
}
