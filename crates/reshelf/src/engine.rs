//! Reconciliation engine
//!
//! Walks a scope, computes each item's canonical identity and moves items
//! that are not where they belong. Per item:
//!
//! ```text
//! Pending -> Classified -> AlreadyCanonical | Unmapped | Moved | <failure>
//! ```
//!
//! Failures are recorded in the report and never abort the run. Only
//! errors that prevent enumeration (unknown scope, unreadable namespace)
//! are returned as `Err`.
//!
//! The collision check and the move it guards run under a lock keyed by the
//! destination path, so two items racing for the same canonical path never
//! both pass the check.

use crate::cancel::CancellationToken;
use crate::classifier::Classifier;
use crate::directory::AssetDirectory;
use crate::error::{ReshelfError, Result};
use crate::naming::{canonical_identity, normalize_path};
use crate::report::{FailureReason, ItemFailure, Outcome, ReconciliationReport, ReportEntry};
use crate::rules::RuleTable;
use crate::types::{ClassTag, Item};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What to do with items whose class tag has no rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmappedPolicy {
    /// Leave the item untouched and report it as unmapped
    #[default]
    Leave,
    /// Normalize the name and move it, unprefixed, into the default root
    DefaultRoot,
}

/// Knobs for a reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Worker threads; 1 processes items inline on the calling thread
    pub workers: usize,
    /// Upper bound on classifying a single item
    pub item_timeout: Option<Duration>,
    /// Compute and check collisions but issue no directory writes
    pub dry_run: bool,
    pub unmapped: UnmappedPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            item_timeout: None,
            dry_run: false,
            unmapped: UnmappedPolicy::Leave,
        }
    }
}

/// Overrides for reconciling a single item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameRequest {
    /// Used instead of the item's own name as input to canonical naming
    pub new_name: Option<String>,
    /// Extra directory segment below the class directory
    pub sub_category: Option<String>,
}

impl RenameRequest {
    pub fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.sub_category.is_none()
    }
}

/// Terminal state of one item.
enum ItemResult {
    Done(ClassTag, ReportEntry),
    Failed(ItemFailure),
}

/// One lock per destination path (case-insensitive).
#[derive(Default)]
struct DestinationLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DestinationLocks {
    fn slot(&self, destination: &str) -> Arc<Mutex<()>> {
        let mut slots = lock_ignoring_poison(&self.slots);
        Arc::clone(slots.entry(destination.to_ascii_lowercase()).or_default())
    }

    /// Drop slots nobody holds. A slot still held by a concurrent run stays.
    fn prune(&self) {
        lock_ignoring_poison(&self.slots).retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reconciles a namespace against a rule table.
pub struct Reconciler {
    rules: Arc<RuleTable>,
    directory: Arc<dyn AssetDirectory>,
    classifier: Arc<dyn Classifier>,
    options: ReconcileOptions,
    cancel: CancellationToken,
    locks: DestinationLocks,
    /// Destinations claimed by planned moves during a dry run
    planned: Mutex<HashSet<String>>,
}

impl Reconciler {
    pub fn new(
        rules: Arc<RuleTable>,
        directory: Arc<dyn AssetDirectory>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            rules,
            directory,
            classifier,
            options: ReconcileOptions::default(),
            cancel: CancellationToken::new(),
            locks: DestinationLocks::default(),
            planned: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Token that stops the run before the next item starts.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Reconcile every item under `scope`.
    pub fn reconcile(&self, scope: &str) -> Result<ReconciliationReport> {
        let scope = normalize_path(scope);
        let started_at = Utc::now();
        let start = Instant::now();
        let items = self.directory.list(&scope)?;
        self.begin_run();

        info!(
            scope = %scope,
            items = items.len(),
            workers = self.options.workers,
            dry_run = self.options.dry_run,
            "Starting reconciliation"
        );

        let request = RenameRequest::default();
        let outcome = if self.options.workers <= 1 || items.len() <= 1 {
            Ok(self.run_inline(&items, &request))
        } else {
            self.run_pool(&items, &request)
        };
        self.locks.prune();
        let (results, skipped) = outcome?;

        let report = self.build_report(scope, started_at, results, skipped);
        info!(
            scope = %report.scope,
            moved = report.moved_count(),
            planned = report.count(Outcome::Planned),
            already_canonical = report.count(Outcome::AlreadyCanonical),
            failures = report.failures.len(),
            skipped = report.skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Reconcile one item, optionally with a new name and sub-category.
    pub fn reconcile_item(
        &self,
        location: &str,
        request: &RenameRequest,
    ) -> Result<ReconciliationReport> {
        let location = normalize_path(location);
        let item = self
            .directory
            .find(&location)?
            .ok_or_else(|| ReshelfError::ItemNotFound(location.clone()))?;
        let started_at = Utc::now();
        self.begin_run();

        let (results, skipped) = self.run_inline(std::slice::from_ref(&item), request);
        self.locks.prune();
        Ok(self.build_report(location, started_at, results, skipped))
    }

    fn begin_run(&self) {
        lock_ignoring_poison(&self.planned).clear();
        self.locks.prune();
    }

    fn build_report(
        &self,
        scope: String,
        started_at: DateTime<Utc>,
        results: Vec<ItemResult>,
        skipped: usize,
    ) -> ReconciliationReport {
        let mut report = ReconciliationReport::new(scope, self.options.dry_run);
        report.started_at = started_at;
        for result in results {
            match result {
                ItemResult::Done(tag, entry) => report.record(tag, entry),
                ItemResult::Failed(failure) => report.record_failure(failure),
            }
        }
        report.skipped = skipped;
        report.cancelled = skipped > 0;
        report.finish();
        report
    }

    fn run_inline(&self, items: &[Item], request: &RenameRequest) -> (Vec<ItemResult>, usize) {
        let mut results = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            if self.cancel.is_cancelled() {
                skipped += 1;
                continue;
            }
            results.push(self.process_guarded(item, request));
        }
        (results, skipped)
    }

    fn run_pool(
        &self,
        items: &[Item],
        request: &RenameRequest,
    ) -> Result<(Vec<ItemResult>, usize)> {
        let workers = self.options.workers.min(items.len());
        let cursor = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let results = Mutex::new(Vec::with_capacity(items.len()));

        let worker = || loop {
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(item) = items.get(index) else {
                break;
            };
            if self.cancel.is_cancelled() {
                skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            let result = self.process_guarded(item, request);
            lock_ignoring_poison(&results).push(result);
        };

        let joined: Vec<std::thread::Result<()>> = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                handles.push(scope.spawn(&worker));
            }
            handles.into_iter().map(|h| h.join()).collect()
        });

        if joined.iter().any(|r| r.is_err()) {
            return Err(ReshelfError::InvalidState(
                "reconciliation worker panicked".to_string(),
            ));
        }

        let results = results
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok((results, skipped.into_inner()))
    }

    /// [`Self::process`] with panics from the classifier or directory
    /// contained to the item that raised them.
    fn process_guarded(&self, item: &Item, request: &RenameRequest) -> ItemResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(item, request))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(item = %item.location, panic = %message, "Item processing panicked");
                ItemResult::Failed(ItemFailure {
                    item: item.location.clone(),
                    reason: FailureReason::MoveFailed,
                    class_tag: None,
                    destination: None,
                    detail: format!("panicked while processing: {}", message),
                })
            }
        }
    }

    fn process(&self, item: &Item, request: &RenameRequest) -> ItemResult {
        let class_tag = match self.classify(item) {
            Ok(tag) => tag,
            Err(err) => {
                let reason = match err {
                    ReshelfError::Timeout { .. } => FailureReason::TimedOut,
                    _ => FailureReason::Unclassifiable,
                };
                warn!(item = %item.location, error = %err, "Classification failed");
                return ItemResult::Failed(ItemFailure {
                    item: item.location.clone(),
                    reason,
                    class_tag: None,
                    destination: None,
                    detail: err.to_string(),
                });
            }
        };

        if !self.rules.is_mapped(&class_tag)
            && self.options.unmapped == UnmappedPolicy::Leave
            && request.is_empty()
        {
            debug!(item = %item.location, class = %class_tag, "No rule for class; leaving in place");
            return ItemResult::Done(
                class_tag,
                ReportEntry {
                    original: item.location.clone(),
                    path: item.location.clone(),
                    outcome: Outcome::Unmapped,
                },
            );
        }

        let name = request.new_name.as_deref().unwrap_or(&item.name);
        let identity = match check_new_name(name).and_then(|name| {
            canonical_identity(
                name,
                &class_tag,
                &self.rules,
                request.sub_category.as_deref(),
            )
        }) {
            Ok(identity) => identity,
            Err(err) => {
                warn!(item = %item.location, error = %err, "Cannot compute canonical name");
                return ItemResult::Failed(ItemFailure {
                    item: item.location.clone(),
                    reason: FailureReason::InvalidName,
                    class_tag: Some(class_tag),
                    destination: None,
                    detail: err.to_string(),
                });
            }
        };

        let destination = identity.path();
        if destination == item.location {
            debug!(item = %item.location, "Already canonical");
            return ItemResult::Done(
                class_tag,
                ReportEntry {
                    original: item.location.clone(),
                    path: destination,
                    outcome: Outcome::AlreadyCanonical,
                },
            );
        }

        self.relocate(item, class_tag, &identity.directory, destination)
    }

    fn classify(&self, item: &Item) -> Result<ClassTag> {
        let Some(timeout) = self.options.item_timeout else {
            let classifier = &self.classifier;
            return panic::catch_unwind(AssertUnwindSafe(|| classifier.class_of(item)))
                .unwrap_or_else(|payload| {
                    Err(ReshelfError::Classification {
                        item: item.location.clone(),
                        reason: format!("classifier panicked: {}", panic_message(payload.as_ref())),
                    })
                });
        };

        // The classifier is side-effect free, so an abandoned call is harmless.
        let (tx, rx) = mpsc::channel();
        let classifier = Arc::clone(&self.classifier);
        let probe = item.clone();
        std::thread::spawn(move || {
            let _ = tx.send(classifier.class_of(&probe));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ReshelfError::Timeout {
                item: item.location.clone(),
                millis: timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ReshelfError::Classification {
                item: item.location.clone(),
                reason: "classifier exited without an answer".to_string(),
            }),
        }
    }

    fn relocate(
        &self,
        item: &Item,
        class_tag: ClassTag,
        directory: &str,
        destination: String,
    ) -> ItemResult {
        let fail = |reason: FailureReason, class_tag: ClassTag, detail: String| {
            ItemResult::Failed(ItemFailure {
                item: item.location.clone(),
                reason,
                class_tag: Some(class_tag),
                destination: Some(destination.clone()),
                detail,
            })
        };

        if self.options.dry_run {
            return match self.occupied_by_other(item, &destination) {
                Ok(true) => fail(
                    FailureReason::DestinationOccupied,
                    class_tag,
                    "another item already exists at the destination".to_string(),
                ),
                Ok(false) => {
                    let fresh = lock_ignoring_poison(&self.planned)
                        .insert(destination.to_ascii_lowercase());
                    if fresh {
                        ItemResult::Done(
                            class_tag,
                            ReportEntry {
                                original: item.location.clone(),
                                path: destination.clone(),
                                outcome: Outcome::Planned,
                            },
                        )
                    } else {
                        fail(
                            FailureReason::DestinationOccupied,
                            class_tag,
                            "another item in this run is planned for the destination".to_string(),
                        )
                    }
                }
                Err(err) => fail(FailureReason::MoveFailed, class_tag, err.to_string()),
            };
        }

        if let Err(err) = self.directory.ensure_directory(directory) {
            warn!(directory = %directory, error = %err, "Cannot create destination directory");
            return fail(FailureReason::MoveFailed, class_tag, err.to_string());
        }

        let slot = self.locks.slot(&destination);
        let _guard = lock_ignoring_poison(&slot);

        match self.occupied_by_other(item, &destination) {
            Ok(false) => {}
            Ok(true) => {
                warn!(item = %item.location, destination = %destination, "Destination occupied");
                return fail(
                    FailureReason::DestinationOccupied,
                    class_tag,
                    ReshelfError::Collision {
                        destination: destination.clone(),
                    }
                    .to_string(),
                );
            }
            Err(err) => return fail(FailureReason::MoveFailed, class_tag, err.to_string()),
        }

        let detail = match self.directory.move_item(item, &destination) {
            Ok(true) => {
                info!(from = %item.location, to = %destination, "Moved");
                return ItemResult::Done(
                    class_tag,
                    ReportEntry {
                        original: item.location.clone(),
                        path: destination.clone(),
                        outcome: Outcome::Moved,
                    },
                );
            }
            Ok(false) => "directory refused the move".to_string(),
            Err(err) => err.to_string(),
        };

        self.verify_failed_move(item, class_tag, &destination, detail)
    }

    /// Whether an item other than `item` holds `destination`.
    ///
    /// A case-only rename may find the item itself at its destination on
    /// case-insensitive storage; that is not a collision.
    fn occupied_by_other(&self, item: &Item, destination: &str) -> Result<bool> {
        if !self.directory.exists(destination)? {
            return Ok(false);
        }
        Ok(!self.directory.is_same_item(item, destination)?)
    }

    /// A move reported failure; find out what actually happened.
    fn verify_failed_move(
        &self,
        item: &Item,
        class_tag: ClassTag,
        destination: &str,
        detail: String,
    ) -> ItemResult {
        let source_present = self.directory.exists(&item.location).unwrap_or(true);
        let destination_present = self.directory.exists(destination).unwrap_or(false);

        let failure = |reason: FailureReason, class_tag: ClassTag, detail: String| {
            ItemResult::Failed(ItemFailure {
                item: item.location.clone(),
                reason,
                class_tag: Some(class_tag),
                destination: Some(destination.to_string()),
                detail,
            })
        };

        if source_present {
            warn!(item = %item.location, destination = %destination, detail = %detail, "Move failed; source intact");
            failure(FailureReason::MoveFailed, class_tag, detail)
        } else if destination_present {
            warn!(
                item = %item.location,
                destination = %destination,
                detail = %detail,
                "Move reported failure but the item reached its destination"
            );
            ItemResult::Done(
                class_tag,
                ReportEntry {
                    original: item.location.clone(),
                    path: destination.to_string(),
                    outcome: Outcome::Moved,
                },
            )
        } else {
            error!(item = %item.location, destination = %destination, detail = %detail, "Item missing from both source and destination");
            failure(FailureReason::SourceLost, class_tag, detail)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// A replacement name is a single segment.
fn check_new_name(name: &str) -> Result<&str> {
    if name.contains('/') {
        return Err(ReshelfError::InvalidName {
            name: name.to_string(),
            reason: "name must not contain '/'".to_string(),
        });
    }
    Ok(name)
}
