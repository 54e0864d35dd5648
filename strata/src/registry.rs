//! The static key catalog and scope/value validation.
//!
//! Every recognized setting is described by a [`KeyDef`]: its type, default,
//! constraints, and the Repo-Mode exception flags the resolver consults.
//! Definitions are immutable and assembled once at process start; all
//! structural invariants are checked in [`Registry::new`], never at runtime.

use std::collections::BTreeMap;
use std::fmt;

use regex_lite::Regex;

use crate::error::{Error, Result};
use crate::value::Value;

/// Prefix for derived environment variable names.
pub const ENV_PREFIX: &str = "STRATA_";

/// Placement scope for a setting.
///
/// # Examples
///
/// ```
/// use strata::Scope;
///
/// assert_eq!(Scope::Local.to_string(), "local");
/// assert_eq!(Scope::User.to_string(), "user");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Project-specific, shareable, version-controlled.
    Local,
    /// Personal, machine-local.
    User,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Type class of a registered setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Boolean flag.
    Boolean,
    /// Free-form string.
    String,
    /// String restricted to an enumerated member set.
    Enum,
    /// Integer or floating-point number.
    Number,
}

impl KeyKind {
    /// Name of the kind, for diagnostics and schema output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Enum => "enum",
            Self::Number => "number",
        }
    }
}

/// Per-scope placement rule for a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopeConstraint {
    /// The key may be set in this scope.
    #[default]
    Unconstrained,
    /// The key must be present in this scope's store (enforced at read
    /// time across the whole store, never as a write gate).
    Required,
    /// The key may not be written in this scope.
    Forbidden,
}

/// Static definition of one recognized setting.
///
/// # Examples
///
/// ```
/// use strata::{KeyDef, KeyKind, Scope, ScopeConstraint, Value};
///
/// let def = KeyDef::new("build-jobs", KeyKind::Number).with_default(Value::Int(4));
/// assert_eq!(def.constraint_for(Scope::Local), ScopeConstraint::Unconstrained);
/// ```
#[derive(Debug, Clone)]
pub struct KeyDef {
    /// Dot-delimited key path, unique across the registry.
    pub path: String,
    /// Type class of the key.
    pub kind: KeyKind,
    /// Value used when no source provides an override.
    pub default: Option<Value>,
    /// Allowed members, present only for enum kinds.
    pub enum_values: Vec<String>,
    /// Optional validation pattern for string/enum kinds.
    pub pattern: Option<String>,
    /// Placement rule for the Local scope.
    pub local: ScopeConstraint,
    /// Placement rule for the User scope.
    pub user: ScopeConstraint,
    /// Ignore the Environment layer entirely while Repo-Mode is active.
    pub env_suppressed_in_repo_mode: bool,
    /// Pin to this value whenever Repo-Mode is active, bypassing all layers.
    pub repo_mode_locked: Option<bool>,
}

impl KeyDef {
    /// Create a definition with no default and unconstrained placement.
    #[must_use]
    pub fn new(path: impl Into<String>, kind: KeyKind) -> Self {
        Self {
            path: path.into(),
            kind,
            default: None,
            enum_values: Vec::new(),
            pattern: None,
            local: ScopeConstraint::Unconstrained,
            user: ScopeConstraint::Unconstrained,
            env_suppressed_in_repo_mode: false,
            repo_mode_locked: None,
        }
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the allowed enum members.
    #[must_use]
    pub fn with_enum_values(mut self, values: &[&str]) -> Self {
        self.enum_values = values.iter().map(ToString::to_string).collect();
        self
    }

    /// Set the validation pattern (compiled in [`Registry::new`]).
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set the Local-scope placement rule.
    #[must_use]
    pub fn with_local(mut self, constraint: ScopeConstraint) -> Self {
        self.local = constraint;
        self
    }

    /// Set the User-scope placement rule.
    #[must_use]
    pub fn with_user(mut self, constraint: ScopeConstraint) -> Self {
        self.user = constraint;
        self
    }

    /// Mark the key as ignoring the Environment layer in Repo-Mode.
    #[must_use]
    pub fn with_env_suppressed(mut self) -> Self {
        self.env_suppressed_in_repo_mode = true;
        self
    }

    /// Pin the key to a fixed value while Repo-Mode is active.
    #[must_use]
    pub fn with_repo_lock(mut self, value: bool) -> Self {
        self.repo_mode_locked = Some(value);
        self
    }

    /// The placement rule for a scope.
    #[must_use]
    pub fn constraint_for(&self, scope: Scope) -> ScopeConstraint {
        match scope {
            Scope::Local => self.local,
            Scope::User => self.user,
        }
    }

    /// The derived environment variable name for this key.
    #[must_use]
    pub fn env_name(&self) -> String {
        derive_env_name(&self.path)
    }
}

/// Derive the environment variable name for a key path: fixed prefix plus
/// the uppercased path with `.` and `-` replaced by `_`.
#[must_use]
pub fn derive_env_name(path: &str) -> String {
    let mut name = String::with_capacity(ENV_PREFIX.len() + path.len());
    name.push_str(ENV_PREFIX);
    for ch in path.chars() {
        match ch {
            '.' | '-' => name.push('_'),
            other => name.extend(other.to_uppercase()),
        }
    }
    name
}

/// The static catalog of recognized settings.
///
/// # Examples
///
/// ```
/// use strata::Registry;
///
/// let registry = Registry::builtin().unwrap();
/// assert!(registry.lookup("log-level").is_some());
/// assert!(registry.lookup("no.such.key").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    keys: BTreeMap<String, KeyDef>,
    patterns: BTreeMap<String, Regex>,
    env_names: BTreeMap<String, String>,
}

impl Registry {
    /// Build a registry from key definitions, checking all structural
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns a validation error for duplicate or malformed paths, a path
    /// that is a dotted prefix of another, two paths deriving the same
    /// environment variable, a key Required in both scopes,
    /// enum/default/pattern inconsistencies, or a Repo-Mode lock on a
    /// non-boolean key.
    pub fn new(defs: Vec<KeyDef>) -> Result<Self> {
        let mut keys = BTreeMap::new();
        let mut patterns = BTreeMap::new();
        let mut env_names = BTreeMap::new();

        for def in defs {
            Self::check_def(&def)?;

            if let Some(ref pattern) = def.pattern {
                let compiled = Regex::new(pattern).map_err(|e| Error::Validation {
                    field: def.path.clone(),
                    message: format!("invalid pattern '{pattern}': {e}"),
                })?;
                patterns.insert(def.path.clone(), compiled);
            }

            let var = def.env_name();
            if let Some(existing) = env_names.insert(var.clone(), def.path.clone()) {
                return Err(Error::Validation {
                    field: def.path.clone(),
                    message: format!(
                        "derived environment name {var} collides with key '{existing}'"
                    ),
                });
            }

            let path = def.path.clone();
            if keys.insert(path.clone(), def).is_some() {
                return Err(Error::Validation {
                    field: path,
                    message: "duplicate key path in registry".to_string(),
                });
            }
        }

        // A key path may not name both a scalar and a container, so no
        // registered path may be a dotted prefix of another. Checked
        // prefix-by-prefix: sort order cannot be trusted to put a path
        // next to its extensions ("sign-x" sorts between "sign" and
        // "sign.verify").
        for path in keys.keys() {
            for (idx, _) in path.match_indices('.') {
                let prefix = &path[..idx];
                if keys.contains_key(prefix) {
                    return Err(Error::Validation {
                        field: path.clone(),
                        message: format!("key path collides with scalar key '{prefix}'"),
                    });
                }
            }
        }

        Ok(Self {
            keys,
            patterns,
            env_names,
        })
    }

    fn check_def(def: &KeyDef) -> Result<()> {
        if def.path.is_empty() || def.path.split('.').any(str::is_empty) {
            return Err(Error::Validation {
                field: def.path.clone(),
                message: "key paths must consist of non-empty dot-delimited segments".to_string(),
            });
        }

        if def.local == ScopeConstraint::Required && def.user == ScopeConstraint::Required {
            return Err(Error::Validation {
                field: def.path.clone(),
                message: "a key cannot be required in both scopes".to_string(),
            });
        }

        match def.kind {
            KeyKind::Enum => {
                if def.enum_values.is_empty() {
                    return Err(Error::Validation {
                        field: def.path.clone(),
                        message: "enum keys must declare at least one member".to_string(),
                    });
                }
            }
            _ => {
                if !def.enum_values.is_empty() {
                    return Err(Error::Validation {
                        field: def.path.clone(),
                        message: "only enum keys may declare members".to_string(),
                    });
                }
            }
        }

        if def.pattern.is_some() && !matches!(def.kind, KeyKind::String | KeyKind::Enum) {
            return Err(Error::Validation {
                field: def.path.clone(),
                message: "patterns apply only to string and enum keys".to_string(),
            });
        }

        if def.repo_mode_locked.is_some() && def.kind != KeyKind::Boolean {
            return Err(Error::Validation {
                field: def.path.clone(),
                message: "only boolean keys can be repo-mode locked".to_string(),
            });
        }

        if let Some(ref default) = def.default {
            let matches_kind = match def.kind {
                KeyKind::Boolean => matches!(default, Value::Bool(_)),
                KeyKind::Number => matches!(default, Value::Int(_) | Value::Float(_)),
                KeyKind::String => matches!(default, Value::Str(_)),
                KeyKind::Enum => default
                    .as_str()
                    .is_some_and(|s| def.enum_values.iter().any(|m| m == s)),
            };
            if !matches_kind {
                return Err(Error::Validation {
                    field: def.path.clone(),
                    message: format!(
                        "default {default} does not match declared kind {}",
                        def.kind.as_str()
                    ),
                });
            }
        }

        Ok(())
    }

    /// The builtin key catalog for the tool.
    ///
    /// # Errors
    ///
    /// Propagates construction errors; the catalog itself is covered by
    /// tests and does not fail in practice.
    pub fn builtin() -> Result<Self> {
        Self::new(vec![
            KeyDef::new("log-level", KeyKind::Enum)
                .with_enum_values(&["trace", "debug", "info", "warn", "error"])
                .with_default(Value::from("debug")),
            KeyDef::new("use-tui", KeyKind::Boolean).with_default(Value::Bool(false)),
            KeyDef::new("build-jobs", KeyKind::Number).with_default(Value::Int(4)),
            KeyDef::new("arch", KeyKind::Enum)
                .with_enum_values(&["x86_64", "aarch64"])
                .with_default(Value::from("x86_64")),
            KeyDef::new("memory", KeyKind::Number).with_default(Value::Int(2048)),
            KeyDef::new("boot.timeout", KeyKind::Number).with_default(Value::Int(60)),
            KeyDef::new("project.name", KeyKind::String)
                .with_local(ScopeConstraint::Required)
                .with_user(ScopeConstraint::Forbidden),
            KeyDef::new("image.base", KeyKind::String).with_local(ScopeConstraint::Required),
            KeyDef::new("image.dir", KeyKind::String)
                .with_default(Value::from("images"))
                .with_env_suppressed(),
            KeyDef::new("cache.dir", KeyKind::String)
                .with_default(Value::from(".strata-cache"))
                .with_env_suppressed(),
            KeyDef::new("sign.verify", KeyKind::Boolean)
                .with_default(Value::Bool(true))
                .with_repo_lock(true),
            KeyDef::new("sign.key.email", KeyKind::String)
                .with_pattern(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
                .with_local(ScopeConstraint::Forbidden),
        ])
    }

    /// Look up a key definition by path.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&KeyDef> {
        self.keys.get(path)
    }

    /// Look up a key definition by its derived environment variable name.
    #[must_use]
    pub fn lookup_env(&self, var: &str) -> Option<&KeyDef> {
        self.env_names.get(var).and_then(|path| self.keys.get(path))
    }

    /// Iterate over all definitions in path order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyDef> {
        self.keys.values()
    }

    /// Paths of keys whose constraint for `scope` is Required, sorted.
    #[must_use]
    pub fn required_keys_for(&self, scope: Scope) -> Vec<String> {
        self.keys
            .values()
            .filter(|def| def.constraint_for(scope) == ScopeConstraint::Required)
            .map(|def| def.path.clone())
            .collect()
    }

    /// Check whether a key may be written in a scope.
    ///
    /// Only an exactly-Forbidden constraint blocks the write; Required keys
    /// are enforced at read time, and unknown keys pass permissively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForbiddenInScope`] when the constraint is Forbidden.
    pub fn validate_scope(&self, path: &str, scope: Scope) -> Result<()> {
        match self.lookup(path) {
            Some(def) if def.constraint_for(scope) == ScopeConstraint::Forbidden => {
                Err(Error::ForbiddenInScope {
                    key: path.to_string(),
                    scope,
                })
            }
            _ => Ok(()),
        }
    }

    /// Check a parsed value against a key's declared kind.
    ///
    /// Unknown keys pass permissively; strict schema enforcement does not
    /// yet cover them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`], [`Error::EnumMismatch`], or
    /// [`Error::PatternMismatch`] on the first failed check.
    pub fn validate_value(&self, path: &str, value: &Value) -> Result<()> {
        let Some(def) = self.lookup(path) else {
            return Ok(());
        };

        match def.kind {
            KeyKind::Boolean => {
                if !matches!(value, Value::Bool(_)) {
                    return Err(Self::type_mismatch(def, value));
                }
            }
            KeyKind::Number => {
                if !matches!(value, Value::Int(_) | Value::Float(_)) {
                    return Err(Self::type_mismatch(def, value));
                }
            }
            KeyKind::String => {
                if !matches!(value, Value::Str(_)) {
                    return Err(Self::type_mismatch(def, value));
                }
            }
            KeyKind::Enum => {
                let text = value.to_string();
                if !def.enum_values.iter().any(|m| *m == text) {
                    return Err(Error::EnumMismatch {
                        key: def.path.clone(),
                        value: text,
                        allowed: def.enum_values.clone(),
                    });
                }
            }
        }

        if let Some(regex) = self.patterns.get(&def.path) {
            let text = value.to_string();
            if !regex.is_match(&text) {
                return Err(Error::PatternMismatch {
                    key: def.path.clone(),
                    value: text,
                    pattern: regex.as_str().to_string(),
                });
            }
        }

        Ok(())
    }

    fn type_mismatch(def: &KeyDef, value: &Value) -> Error {
        Error::TypeMismatch {
            key: def.path.clone(),
            expected: def.kind.as_str().to_string(),
            actual: value.kind_name().to_string(),
        }
    }
}
