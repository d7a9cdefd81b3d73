//! `ro-editable` library.
//!
//! Editable pip installs for packages whose source tree is read-only. The
//! package is staged into a writable temporary copy, pip installs the copy in
//! editable mode, and the artifacts pip produced are rewritten to reference
//! the original tree.
//!
//! # Modules
//!
//! - [`cli`] - Command-line definitions and pip argument forwarding
//! - [`config`] - Environment-derived runtime configuration
//! - [`error`] - Semantic error types
//! - [`interrupt`] - SIGINT and SIGTERM handling
//! - [`invoker`] - Subprocess seam and the pip invocation
//! - [`output`] - Diagnostic messages
//! - [`pipeline`] - End-to-end install orchestration
//! - [`redirect`] - Artifact discovery and rewriting
//! - [`request`] - Parsed install request
//! - [`site`] - Site-packages resolution
//! - [`stager`] - Temporary staging of the package tree

pub mod cli;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod invoker;
pub mod output;
pub mod pipeline;
pub mod redirect;
pub mod request;
pub mod site;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
