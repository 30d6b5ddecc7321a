//! Reshelf - Asset Taxonomy & Reconciliation
//!
//! Classifies every item under a namespace scope, computes its canonical
//! name and directory from a rule table, and moves items that are not where
//! they belong. The result is a report grouped by class.
//!
//! Hosts plug in their own namespace through [`AssetDirectory`] and their
//! own type lookup through [`Classifier`].

pub mod cancel;
pub mod classifier;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod naming;
pub mod patterns;
pub mod report;
pub mod rules;
pub mod types;

pub use cancel::CancellationToken;
pub use classifier::{Classifier, MapClassifier, PatternClassifier, PatternRule};
pub use config::ReshelfConfig;
pub use directory::{AssetDirectory, FsDirectory, MemoryDirectory};
pub use engine::{ReconcileOptions, Reconciler, RenameRequest, UnmappedPolicy};
pub use error::{ReshelfError, Result};
pub use naming::{canonical_identity, canonical_name, canonical_path};
pub use report::{FailureReason, ItemFailure, Outcome, ReconciliationReport, ReportEntry};
pub use rules::{RuleTable, DEFAULT_ROOT};
pub use types::{CanonicalIdentity, ClassTag, Item, Rule};
