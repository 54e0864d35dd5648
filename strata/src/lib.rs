#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # strata
//!
//! Hierarchical configuration resolution and validation for a VM-image
//! development tool.
//!
//! Settings are addressed by dot-delimited key paths, persisted as nested
//! YAML in two stores (a shareable project-local file and a personal user
//! file), and resolved through a fixed precedence chain: environment
//! variables, then the Local store, then the User store, then registered
//! defaults. Every resolved value carries the layer it came from. A working
//! directory that holds a Local store is in Repo-Mode, which activates two
//! registry-driven exceptions: selected keys ignore the environment, and
//! policy-locked keys are pinned outright.
//!
//! ## Core Types
//!
//! - [`Resolver`] and [`Source`]: layered resolution with attribution
//! - [`Registry`] and [`KeyDef`]: the static key catalog and its constraints
//! - [`Tree`] and [`Value`]: nested configuration data and the dot-path codec
//! - [`Store`]: YAML persistence for the Local and User scopes
//! - [`Error`] and [`Result`]: error handling types
//! - [`Logger`] and [`LogLevel`]: logging infrastructure
//!
//! ## Examples
//!
//! ```no_run
//! use strata::{Resolver, Scope};
//! use std::path::Path;
//!
//! let mut resolver = Resolver::from_dir(Path::new(".")).unwrap();
//! resolver.set("build-jobs", "8", Scope::Local).unwrap();
//!
//! let (value, source) = resolver.get("build-jobs").unwrap();
//! println!("build-jobs = {value} (from {source})");
//! ```

pub mod error;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod tree;
pub mod value;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use logging::{init_logger, LogLevel, Logger};
pub use registry::{derive_env_name, KeyDef, KeyKind, Registry, Scope, ScopeConstraint};
pub use resolver::{Resolver, Source};
pub use store::{local_store_path, user_store_path, Store};
pub use tree::{Node, Tree};
pub use value::Value;
