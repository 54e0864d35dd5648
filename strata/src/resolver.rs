//! Layered value resolution with source attribution.
//!
//! The resolver owns the two persistent stores, an environment snapshot,
//! and the key registry, and answers every read through a fixed precedence
//! chain: Environment, then Local store, then User store, then the
//! registered default. Repo-Mode (an existing Local store in the working
//! directory) reorders nothing but activates two registry-driven
//! exceptions: environment suppression and policy locks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::registry::{derive_env_name, Registry, Scope, ENV_PREFIX};
use crate::store::{local_store_path, user_store_path, Store};
use crate::value::Value;

/// Where a resolved value came from.
///
/// # Examples
///
/// ```
/// use strata::Source;
///
/// assert_eq!(Source::Environment.to_string(), "environment");
/// assert_eq!(Source::Policy.to_string(), "policy");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A `STRATA_*` environment variable.
    Environment,
    /// The project-scoped store file.
    Local,
    /// The user-scoped store file.
    User,
    /// The registered default value.
    Default,
    /// A Repo-Mode policy lock pinned the value.
    Policy,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Environment => "environment",
            Self::Local => "local",
            Self::User => "user",
            Self::Default => "default",
            Self::Policy => "policy",
        };
        write!(f, "{name}")
    }
}

/// The layered configuration resolver.
///
/// # Examples
///
/// ```no_run
/// use strata::Resolver;
/// use std::path::Path;
///
/// let resolver = Resolver::from_dir(Path::new(".")).unwrap();
/// let (value, source) = resolver.get("build-jobs").unwrap();
/// println!("build-jobs = {value} (from {source})");
/// ```
#[derive(Debug)]
pub struct Resolver {
    registry: Registry,
    local: Store,
    user: Store,
    env: BTreeMap<String, String>,
    repo_mode: bool,
}

impl Resolver {
    /// Assemble a resolver from explicit parts.
    ///
    /// Repo-Mode is derived from the Local store: it is active exactly
    /// when the store's backing file exists. The environment snapshot is
    /// taken as given; only `STRATA_`-prefixed entries are consulted.
    #[must_use]
    pub fn new(registry: Registry, local: Store, user: Store, env: BTreeMap<String, String>) -> Self {
        let repo_mode = local.exists();
        debug!("resolver assembled, repo-mode: {repo_mode}");
        Self {
            registry,
            local,
            user,
            env,
            repo_mode,
        }
    }

    /// Build a resolver for a working directory using the builtin registry,
    /// the standard store locations, and a snapshot of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a store file exists but cannot be loaded, or
    /// when the user store location cannot be determined.
    pub fn from_dir(working_dir: &Path) -> Result<Self> {
        let registry = Registry::builtin()?;
        let local = Store::load(Scope::Local, &local_store_path(working_dir))?;
        let user = Store::load(Scope::User, &user_store_path()?)?;
        let env = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        Ok(Self::new(registry, local, user, env))
    }

    /// True when the working directory carries a Local store.
    #[must_use]
    pub fn repo_mode(&self) -> bool {
        self.repo_mode
    }

    /// The key registry in use.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The store serving a scope.
    #[must_use]
    pub fn store(&self, scope: Scope) -> &Store {
        match scope {
            Scope::Local => &self.local,
            Scope::User => &self.user,
        }
    }

    fn store_mut(&mut self, scope: Scope) -> &mut Store {
        match scope {
            Scope::Local => &mut self.local,
            Scope::User => &mut self.user,
        }
    }

    /// Resolve the effective value of a key, with source attribution.
    ///
    /// The chain is Environment, Local, User, Default. In Repo-Mode a
    /// policy-locked key short-circuits to its pinned value, and keys
    /// marked environment-suppressed skip the Environment layer.
    ///
    /// Environment values are coerced through the raw-string parser but
    /// never validated; validation gates writes, not reads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no layer provides a value.
    pub fn get(&self, path: &str) -> Result<(Value, Source)> {
        let def = self.registry.lookup(path);

        if self.repo_mode {
            if let Some(pinned) = def.and_then(|d| d.repo_mode_locked) {
                debug!("'{path}' pinned by repo-mode policy");
                return Ok((Value::Bool(pinned), Source::Policy));
            }
        }

        let env_suppressed =
            self.repo_mode && def.is_some_and(|d| d.env_suppressed_in_repo_mode);
        if !env_suppressed {
            let var = derive_env_name(path);
            if let Some(raw) = self.env.get(&var) {
                debug!("'{path}' resolved from {var}");
                return Ok((Value::parse(raw), Source::Environment));
            }
        }

        if let Some(value) = self.local.tree().get(path) {
            return Ok((value.clone(), Source::Local));
        }

        if let Some(value) = self.user.tree().get(path) {
            return Ok((value.clone(), Source::User));
        }

        if let Some(default) = def.and_then(|d| d.default.clone()) {
            return Ok((default, Source::Default));
        }

        Err(Error::NotFound {
            key: path.to_string(),
        })
    }

    /// Parse, validate, and persist a value into a scope's store.
    ///
    /// Scope constraints are checked first (only Forbidden blocks a write),
    /// then the parsed value is checked against the key's registered kind.
    /// Unknown keys pass both checks permissively. The store file is
    /// rewritten on success, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns the first failed check, a traversal conflict from the tree,
    /// or a store write error.
    pub fn set(&mut self, path: &str, raw: &str, scope: Scope) -> Result<Value> {
        let value = Value::parse(raw);
        self.registry.validate_scope(path, scope)?;
        self.registry.validate_value(path, &value)?;

        let store = self.store_mut(scope);
        store.tree_mut().set(path, value.clone())?;
        store.save()?;
        debug!("set '{path}' = {value} in {scope} store");
        Ok(value)
    }

    /// Remove a key from a scope's store, returning the removed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the store has no backing file or
    /// the key is absent from it, plus any tree or write error.
    pub fn unset(&mut self, path: &str, scope: Scope) -> Result<Value> {
        let store = self.store_mut(scope);
        if !store.exists() {
            return Err(Error::NotFound {
                key: path.to_string(),
            });
        }

        let removed = store.tree_mut().remove(path)?;
        store.save()?;
        debug!("unset '{path}' from {scope} store");
        Ok(removed)
    }

    /// Resolve every key visible through any layer, sorted by path.
    ///
    /// The key set is the union of registered keys with defaults, both
    /// store contents, and `STRATA_`-prefixed environment variables.
    /// Unrecognized variables map back to a dashed lowercase path.
    #[must_use]
    pub fn list_all(&self) -> Vec<(String, Value, Source)> {
        let mut paths = BTreeSet::new();

        for def in self.registry.iter() {
            if def.default.is_some() || (self.repo_mode && def.repo_mode_locked.is_some()) {
                paths.insert(def.path.clone());
            }
        }
        for (path, _) in self.local.tree().flatten() {
            paths.insert(path);
        }
        for (path, _) in self.user.tree().flatten() {
            paths.insert(path);
        }
        for var in self.env.keys() {
            match self.registry.lookup_env(var) {
                Some(def) => {
                    paths.insert(def.path.clone());
                }
                None => {
                    if let Some(path) = env_fallback_path(var) {
                        paths.insert(path);
                    }
                }
            }
        }

        paths
            .into_iter()
            .filter_map(|path| {
                self.get(&path)
                    .ok()
                    .map(|(value, source)| (path, value, source))
            })
            .collect()
    }

    /// Check the Required constraints across both stores.
    ///
    /// An absent store satisfies nothing: with no Local store file every
    /// key Required in the Local scope is reported missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRequiredKeys`] listing every absent
    /// required key, sorted.
    pub fn check_required(&self) -> Result<()> {
        let mut missing = Vec::new();

        for scope in [Scope::Local, Scope::User] {
            let store = self.store(scope);
            for key in self.registry.required_keys_for(scope) {
                if !store.tree().contains(&key) {
                    missing.push(key);
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            Err(Error::MissingRequiredKeys { keys: missing })
        }
    }
}

/// Map an unrecognized `STRATA_*` variable back to a key path: strip the
/// prefix, lowercase, and turn `_` into `-`. The original dots are not
/// recoverable, so unknown variables always surface as dashed paths.
fn env_fallback_path(var: &str) -> Option<String> {
    let rest = var.strip_prefix(ENV_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_lowercase().replace('_', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        resolver: Resolver,
    }

    /// Build a resolver over temp-dir stores without touching the process
    /// environment. `local_doc: None` means no Local store file, so
    /// Repo-Mode stays off.
    fn fixture(
        local_doc: Option<&str>,
        user_doc: Option<&str>,
        env: &[(&str, &str)],
    ) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let local_path = temp_dir.path().join("strata.yaml");
        let user_path = temp_dir.path().join("user").join("config.yaml");

        if let Some(doc) = local_doc {
            std::fs::write(&local_path, doc).unwrap();
        }
        if let Some(doc) = user_doc {
            std::fs::create_dir_all(user_path.parent().unwrap()).unwrap();
            std::fs::write(&user_path, doc).unwrap();
        }

        let registry = Registry::builtin().unwrap();
        let local = Store::load(Scope::Local, &local_path).unwrap();
        let user = Store::load(Scope::User, &user_path).unwrap();
        let env = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();

        Fixture {
            resolver: Resolver::new(registry, local, user, env),
            _temp_dir: temp_dir,
        }
    }

    #[test]
    fn test_default_layer() {
        let f = fixture(None, None, &[]);
        let (value, source) = f.resolver.get("log-level").unwrap();
        assert_eq!(value, Value::from("debug"));
        assert_eq!(source, Source::Default);
    }

    #[test]
    fn test_user_overrides_default() {
        let f = fixture(None, Some("log-level: info\n"), &[]);
        let (value, source) = f.resolver.get("log-level").unwrap();
        assert_eq!(value, Value::from("info"));
        assert_eq!(source, Source::User);
    }

    #[test]
    fn test_local_overrides_user() {
        let f = fixture(Some("log-level: warn\n"), Some("log-level: info\n"), &[]);
        let (value, source) = f.resolver.get("log-level").unwrap();
        assert_eq!(value, Value::from("warn"));
        assert_eq!(source, Source::Local);
    }

    #[test]
    fn test_environment_overrides_all() {
        let f = fixture(
            Some("log-level: warn\n"),
            Some("log-level: info\n"),
            &[("STRATA_LOG_LEVEL", "error")],
        );
        let (value, source) = f.resolver.get("log-level").unwrap();
        assert_eq!(value, Value::from("error"));
        assert_eq!(source, Source::Environment);
    }

    #[test]
    fn test_env_values_parse_but_are_not_validated() {
        // Reads never validate; a nonsense env value surfaces as a string.
        let f = fixture(None, None, &[("STRATA_BUILD_JOBS", "many")]);
        let (value, source) = f.resolver.get("build-jobs").unwrap();
        assert_eq!(value, Value::from("many"));
        assert_eq!(source, Source::Environment);
    }

    #[test]
    fn test_unknown_key_not_found() {
        let f = fixture(None, None, &[]);
        assert!(f.resolver.get("no.such.key").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unknown_key_resolves_from_stores_and_env() {
        let f = fixture(
            Some("custom.key: 7\n"),
            None,
            &[("STRATA_OTHER_KEY", "hello")],
        );
        let (value, source) = f.resolver.get("custom.key").unwrap();
        assert_eq!(value, Value::Int(7));
        assert_eq!(source, Source::Local);

        let (value, source) = f.resolver.get("other-key").unwrap();
        assert_eq!(value, Value::from("hello"));
        assert_eq!(source, Source::Environment);
    }

    #[test]
    fn test_repo_mode_tracks_local_store() {
        assert!(!fixture(None, None, &[]).resolver.repo_mode());
        assert!(fixture(Some(""), None, &[]).resolver.repo_mode());
    }

    #[test]
    fn test_repo_mode_suppresses_env_for_flagged_keys() {
        let env = &[
            ("STRATA_IMAGE_DIR", "/elsewhere"),
            ("STRATA_BUILD_JOBS", "16"),
        ];

        // Without a local store the env wins as usual.
        let f = fixture(None, None, env);
        let (value, source) = f.resolver.get("image.dir").unwrap();
        assert_eq!(value, Value::from("/elsewhere"));
        assert_eq!(source, Source::Environment);

        // In repo mode the flagged key ignores the environment entirely,
        // while unflagged keys still honor it.
        let f = fixture(Some("image.dir: shared\n"), None, env);
        let (value, source) = f.resolver.get("image.dir").unwrap();
        assert_eq!(value, Value::from("shared"));
        assert_eq!(source, Source::Local);

        let (value, source) = f.resolver.get("build-jobs").unwrap();
        assert_eq!(value, Value::Int(16));
        assert_eq!(source, Source::Environment);
    }

    #[test]
    fn test_suppressed_key_falls_back_to_default_in_repo_mode() {
        let f = fixture(Some(""), None, &[("STRATA_CACHE_DIR", "/tmp/elsewhere")]);
        let (value, source) = f.resolver.get("cache.dir").unwrap();
        assert_eq!(value, Value::from(".strata-cache"));
        assert_eq!(source, Source::Default);
    }

    #[test]
    fn test_policy_lock_pins_value_in_repo_mode() {
        let f = fixture(
            Some("sign:\n  verify: false\n"),
            Some("sign:\n  verify: false\n"),
            &[("STRATA_SIGN_VERIFY", "false")],
        );
        let (value, source) = f.resolver.get("sign.verify").unwrap();
        assert_eq!(value, Value::Bool(true));
        assert_eq!(source, Source::Policy);
    }

    #[test]
    fn test_policy_lock_inactive_outside_repo_mode() {
        let f = fixture(None, Some("sign:\n  verify: false\n"), &[]);
        let (value, source) = f.resolver.get("sign.verify").unwrap();
        assert_eq!(value, Value::Bool(false));
        assert_eq!(source, Source::User);
    }

    #[test]
    fn test_set_parses_validates_and_persists() {
        let mut f = fixture(Some(""), None, &[]);
        let stored = f.resolver.set("build-jobs", "8", Scope::Local).unwrap();
        assert_eq!(stored, Value::Int(8));

        // Visible through resolution and persisted to disk.
        let (value, source) = f.resolver.get("build-jobs").unwrap();
        assert_eq!(value, Value::Int(8));
        assert_eq!(source, Source::Local);

        let path = f.resolver.store(Scope::Local).path().to_path_buf();
        let reloaded = Store::load(Scope::Local, &path).unwrap();
        assert_eq!(reloaded.tree().get("build-jobs"), Some(&Value::Int(8)));
    }

    #[test]
    fn test_set_rejects_forbidden_scope() {
        let mut f = fixture(None, None, &[]);

        let err = f
            .resolver
            .set("sign.key.email", "dev@example.com", Scope::Local)
            .unwrap_err();
        assert!(matches!(err, Error::ForbiddenInScope { .. }));

        // The same write is legal in the User scope.
        f.resolver
            .set("sign.key.email", "dev@example.com", Scope::User)
            .unwrap();
    }

    #[test]
    fn test_set_required_is_not_a_write_gate() {
        let mut f = fixture(None, None, &[]);
        // project.name is Required in Local and Forbidden in User.
        f.resolver.set("project.name", "demo", Scope::Local).unwrap();
        assert!(f
            .resolver
            .set("project.name", "demo", Scope::User)
            .is_err());
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut f = fixture(None, None, &[]);

        let err = f.resolver.set("arch", "mips", Scope::User).unwrap_err();
        assert!(matches!(err, Error::EnumMismatch { .. }));

        let err = f.resolver.set("use-tui", "maybe", Scope::User).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let err = f
            .resolver
            .set("sign.key.email", "not-an-email", Scope::User)
            .unwrap_err();
        assert!(matches!(err, Error::PatternMismatch { .. }));
    }

    #[test]
    fn test_set_unknown_key_is_permissive() {
        let mut f = fixture(None, None, &[]);
        f.resolver.set("custom.key", "anything", Scope::Local).unwrap();
        let (value, source) = f.resolver.get("custom.key").unwrap();
        assert_eq!(value, Value::from("anything"));
        assert_eq!(source, Source::Local);
    }

    #[test]
    fn test_set_creates_missing_store_file() {
        let mut f = fixture(None, None, &[]);
        assert!(!f.resolver.store(Scope::User).exists());

        f.resolver.set("use-tui", "yes", Scope::User).unwrap();
        assert!(f.resolver.store(Scope::User).exists());
        assert!(f.resolver.store(Scope::User).path().exists());
    }

    #[test]
    fn test_unset_removes_and_falls_back() {
        let mut f = fixture(Some("build-jobs: 8\n"), None, &[]);
        let removed = f.resolver.unset("build-jobs", Scope::Local).unwrap();
        assert_eq!(removed, Value::Int(8));

        let (value, source) = f.resolver.get("build-jobs").unwrap();
        assert_eq!(value, Value::Int(4));
        assert_eq!(source, Source::Default);
    }

    #[test]
    fn test_unset_absent_key_not_found() {
        let mut f = fixture(Some(""), None, &[]);
        assert!(f
            .resolver
            .unset("build-jobs", Scope::Local)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_unset_missing_store_not_found() {
        let mut f = fixture(None, None, &[]);
        assert!(f
            .resolver
            .unset("build-jobs", Scope::Local)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_list_all_unions_layers_sorted() {
        let f = fixture(
            Some("project:\n  name: demo\n"),
            Some("use-tui: true\n"),
            &[("STRATA_MEMORY", "4096"), ("STRATA_EXTRA", "x")],
        );
        let listing = f.resolver.list_all();

        let paths: Vec<&str> = listing.iter().map(|(p, _, _)| p.as_str()).collect();
        let mut sorted = paths.clone();
        sorted.sort_unstable();
        assert_eq!(paths, sorted);

        let find = |key: &str| {
            listing
                .iter()
                .find(|(p, _, _)| p == key)
                .map(|(_, v, s)| (v.clone(), *s))
        };

        assert_eq!(find("project.name"), Some((Value::from("demo"), Source::Local)));
        assert_eq!(find("use-tui"), Some((Value::Bool(true), Source::User)));
        assert_eq!(find("memory"), Some((Value::Int(4096), Source::Environment)));
        assert_eq!(find("extra"), Some((Value::from("x"), Source::Environment)));
        assert_eq!(find("log-level"), Some((Value::from("debug"), Source::Default)));
        // No layer provides image.base, so it is not listed.
        assert_eq!(find("image.base"), None);
    }

    #[test]
    fn test_list_all_shows_policy_locked_key_in_repo_mode() {
        let f = fixture(Some(""), None, &[]);
        let listing = f.resolver.list_all();
        let entry = listing.iter().find(|(p, _, _)| p == "sign.verify").unwrap();
        assert_eq!(entry.1, Value::Bool(true));
        assert_eq!(entry.2, Source::Policy);
    }

    #[test]
    fn test_check_required_reports_missing_keys() {
        let f = fixture(Some("project:\n  name: demo\n"), None, &[]);
        let err = f.resolver.check_required().unwrap_err();
        match err {
            Error::MissingRequiredKeys { keys } => {
                assert_eq!(keys, vec!["image.base".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_required_missing_store_reports_everything() {
        let f = fixture(None, None, &[]);
        let err = f.resolver.check_required().unwrap_err();
        match err {
            Error::MissingRequiredKeys { keys } => {
                assert_eq!(
                    keys,
                    vec!["image.base".to_string(), "project.name".to_string()]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_required_passes_when_satisfied() {
        let f = fixture(
            Some("project:\n  name: demo\nimage:\n  base: ubuntu-24.04\n"),
            None,
            &[],
        );
        f.resolver.check_required().unwrap();
    }

    #[test]
    fn test_env_fallback_path() {
        assert_eq!(
            env_fallback_path("STRATA_SOME_KEY"),
            Some("some-key".to_string())
        );
        assert_eq!(env_fallback_path("STRATA_"), None);
        assert_eq!(env_fallback_path("OTHER_VAR"), None);
    }
}
