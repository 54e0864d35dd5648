//! Persistent YAML stores for the Local and User scopes.
//!
//! A store is a whole-document view of one backing file: loading parses the
//! full YAML mapping into a [`Tree`], saving rewrites the file from the tree.
//! A missing file is not an error, it is simply an empty store that does not
//! yet exist on disk.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::registry::Scope;
use crate::tree::Tree;

/// File name of the Local store, looked up in the working directory.
pub const LOCAL_STORE_FILE: &str = "strata.yaml";

/// File name of the User store inside its configuration directory.
pub const USER_STORE_FILE: &str = "config.yaml";

/// One persistent configuration store.
///
/// # Examples
///
/// ```no_run
/// use strata::{Scope, Store, Value};
/// use std::path::Path;
///
/// let mut store = Store::load(Scope::Local, Path::new("strata.yaml")).unwrap();
/// store.tree_mut().set("build-jobs", Value::Int(8)).unwrap();
/// store.save().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    scope: Scope,
    path: PathBuf,
    tree: Tree,
    exists: bool,
}

impl Store {
    /// Load a store from its backing file.
    ///
    /// A missing file yields an empty store with [`Store::exists`] false.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnreadable`] when the file exists but cannot
    /// be read, is not valid YAML, or is not a mapping of supported values.
    pub fn load(scope: Scope, path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("{scope} store not present at {}", path.display());
            return Ok(Self {
                scope,
                path: path.to_path_buf(),
                tree: Tree::new(),
                exists: false,
            });
        }

        let contents = fs::read_to_string(path).map_err(|e| Error::StoreUnreadable {
            path: path.to_path_buf(),
            reason: format!("failed to read file: {e}"),
        })?;

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&contents).map_err(|e| Error::StoreUnreadable {
                path: path.to_path_buf(),
                reason: format!("invalid YAML: {e}"),
            })?;

        let tree = Tree::from_yaml(&doc).map_err(|e| Error::StoreUnreadable {
            path: path.to_path_buf(),
            reason: format!("{e}"),
        })?;

        debug!("loaded {scope} store from {}", path.display());
        Ok(Self {
            scope,
            path: path.to_path_buf(),
            tree,
            exists: true,
        })
    }

    /// Create an in-memory store that has no backing file yet.
    #[must_use]
    pub fn empty(scope: Scope, path: PathBuf) -> Self {
        Self {
            scope,
            path,
            tree: Tree::new(),
            exists: false,
        }
    }

    /// Persist the store, rewriting the whole backing file.
    ///
    /// Parent directories are created as needed. After a successful save
    /// the store counts as existing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnwritable`] when directories cannot be
    /// created or the file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::StoreUnwritable {
                path: self.path.clone(),
                reason: format!("failed to create parent directory: {e}"),
            })?;
        }

        let doc = self.tree.to_yaml();
        let contents = serde_yaml::to_string(&doc).map_err(|e| Error::StoreUnwritable {
            path: self.path.clone(),
            reason: format!("serialization failed: {e}"),
        })?;

        fs::write(&self.path, contents).map_err(|e| Error::StoreUnwritable {
            path: self.path.clone(),
            reason: format!("failed to write file: {e}"),
        })?;

        self.exists = true;
        debug!("saved {} store to {}", self.scope, self.path.display());
        Ok(())
    }

    /// The scope this store serves.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Path to the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the backing file existed at load time or has been saved.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// The store's configuration tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutable access to the store's configuration tree.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }
}

/// Path of the Local store for a working directory.
#[must_use]
pub fn local_store_path(working_dir: &Path) -> PathBuf {
    working_dir.join(LOCAL_STORE_FILE)
}

/// Path of the User store.
///
/// Honors `XDG_CONFIG_HOME` when set, falling back to `~/.config`.
///
/// # Errors
///
/// Returns an error when neither `XDG_CONFIG_HOME` nor a home directory
/// can be determined.
pub fn user_store_path() -> Result<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("strata").join(USER_STORE_FILE));
        }
    }

    let home = home::home_dir().ok_or_else(|| Error::Validation {
        field: "user store".to_string(),
        message: "cannot determine home directory".to_string(),
    })?;
    Ok(home.join(".config").join("strata").join(USER_STORE_FILE))
}
