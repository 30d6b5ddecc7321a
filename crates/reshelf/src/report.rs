//! Reconciliation report
//!
//! Final locations grouped by class tag plus an explicit failure list.
//! Built while a run progresses and handed to the caller; never persisted.

use crate::types::ClassTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Terminal state of an item that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Already at its canonical path; nothing was issued
    AlreadyCanonical,
    /// Moved/renamed to its canonical path
    Moved,
    /// Dry run: would have been moved
    Planned,
    /// No rule for its class tag; left where it was
    Unmapped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyCanonical => "already_canonical",
            Self::Moved => "moved",
            Self::Planned => "planned",
            Self::Unmapped => "unmapped",
        }
    }
}

/// Why an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    #[serde(rename = "unclassifiable")]
    Unclassifiable,
    #[serde(rename = "invalid name")]
    InvalidName,
    #[serde(rename = "destination occupied")]
    DestinationOccupied,
    #[serde(rename = "move failed")]
    MoveFailed,
    #[serde(rename = "timed out")]
    TimedOut,
    #[serde(rename = "source lost")]
    SourceLost,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassifiable => "unclassifiable",
            Self::InvalidName => "invalid name",
            Self::DestinationOccupied => "destination occupied",
            Self::MoveFailed => "move failed",
            Self::TimedOut => "timed out",
            Self::SourceLost => "source lost",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item that reached a non-failure terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Location before the run
    pub original: String,
    /// Location after the run (or planned location in a dry run)
    pub path: String,
    pub outcome: Outcome,
}

/// An item that failed, with its reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item: String,
    pub reason: FailureReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_tag: Option<ClassTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub detail: String,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub scope: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Class tag -> entries, sorted by final path
    pub by_class: BTreeMap<ClassTag, Vec<ReportEntry>>,
    pub failures: Vec<ItemFailure>,
    /// Run was cancelled before every item was processed
    pub cancelled: bool,
    /// Enumerated items never started because of cancellation
    pub skipped: usize,
}

impl ReconciliationReport {
    pub fn new(scope: impl Into<String>, dry_run: bool) -> Self {
        Self {
            scope: scope.into(),
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            by_class: BTreeMap::new(),
            failures: Vec::new(),
            cancelled: false,
            skipped: 0,
        }
    }

    pub fn record(&mut self, class_tag: ClassTag, entry: ReportEntry) {
        self.by_class.entry(class_tag).or_default().push(entry);
    }

    pub fn record_failure(&mut self, failure: ItemFailure) {
        self.failures.push(failure);
    }

    /// Sort everything for deterministic output and stamp the finish time.
    pub fn finish(&mut self) {
        for entries in self.by_class.values_mut() {
            entries.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.original.cmp(&b.original)));
        }
        self.failures
            .sort_by(|a, b| a.item.cmp(&b.item).then_with(|| a.reason.as_str().cmp(b.reason.as_str())));
        self.finished_at = Some(Utc::now());
    }

    /// Entries recorded for a class tag.
    pub fn entries_for(&self, class_tag: &str) -> &[ReportEntry] {
        self.by_class
            .get(&ClassTag::from(class_tag))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Final paths recorded for a class tag, sorted.
    pub fn paths_for(&self, class_tag: &str) -> Vec<&str> {
        self.entries_for(class_tag)
            .iter()
            .map(|e| e.path.as_str())
            .collect()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.by_class
            .values()
            .flatten()
            .filter(|e| e.outcome == outcome)
            .count()
    }

    pub fn moved_count(&self) -> usize {
        self.count(Outcome::Moved)
    }

    pub fn failures_with(&self, reason: FailureReason) -> impl Iterator<Item = &ItemFailure> {
        self.failures.iter().filter(move |f| f.reason == reason)
    }

    /// Items that reached any terminal state.
    pub fn processed(&self) -> usize {
        self.by_class.values().map(Vec::len).sum::<usize>() + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Grouped text rendering: one `[Class] - Total N` block per class.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.dry_run {
            "Planned layout by class"
        } else {
            "Assets by class"
        };
        writeln!(f, "=== {} ({}) ===", title, self.scope)?;

        for (class_tag, entries) in &self.by_class {
            writeln!(f)?;
            writeln!(f, "[{}] - Total {}", class_tag, entries.len())?;
            for entry in entries {
                match entry.outcome {
                    Outcome::Moved | Outcome::Planned => {
                        writeln!(f, "  {}  (from {})", entry.path, entry.original)?
                    }
                    Outcome::Unmapped => writeln!(f, "  {}  (no rule)", entry.path)?,
                    Outcome::AlreadyCanonical => writeln!(f, "  {}", entry.path)?,
                }
            }
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Failures ({}) ===", self.failures.len())?;
            for failure in &self.failures {
                match &failure.destination {
                    Some(dst) => writeln!(f, "  {}: {} -> {}", failure.item, failure.reason, dst)?,
                    None => writeln!(f, "  {}: {}", failure.item, failure.reason)?,
                }
            }
        }

        if self.cancelled {
            writeln!(f)?;
            writeln!(f, "Cancelled: {} item(s) not processed", self.skipped)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(original: &str, path: &str, outcome: Outcome) -> ReportEntry {
        ReportEntry {
            original: original.to_string(),
            path: path.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_finish_sorts_by_final_path() {
        let mut report = ReconciliationReport::new("/Game", false);
        report.record(
            ClassTag::from("StaticMesh"),
            entry("/Game/tree", "/Game/SM/SM_Tree", Outcome::Moved),
        );
        report.record(
            ClassTag::from("StaticMesh"),
            entry("/Game/SM/SM_Rock", "/Game/SM/SM_Rock", Outcome::AlreadyCanonical),
        );
        report.finish();

        assert_eq!(
            report.paths_for("StaticMesh"),
            vec!["/Game/SM/SM_Rock", "/Game/SM/SM_Tree"]
        );
        assert_eq!(report.moved_count(), 1);
        assert_eq!(report.processed(), 2);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_render_text_groups_by_class() {
        let mut report = ReconciliationReport::new("/Game", false);
        report.record(
            ClassTag::from("Texture2D"),
            entry("/Game/rock_d", "/Game/T/T_Rock_d", Outcome::Moved),
        );
        report.record(
            ClassTag::from("StaticMesh"),
            entry("/Game/SM/SM_Rock", "/Game/SM/SM_Rock", Outcome::AlreadyCanonical),
        );
        report.record_failure(ItemFailure {
            item: "/Game/cat_tower".to_string(),
            reason: FailureReason::DestinationOccupied,
            class_tag: Some(ClassTag::from("StaticMesh")),
            destination: Some("/Game/SM/SM_CatTower".to_string()),
            detail: String::new(),
        });
        report.finish();

        let text = report.render_text();
        let mesh = text.find("[StaticMesh] - Total 1").unwrap();
        let texture = text.find("[Texture2D] - Total 1").unwrap();
        assert!(mesh < texture);
        assert!(text.contains("/Game/cat_tower: destination occupied -> /Game/SM/SM_CatTower"));
    }

    #[test]
    fn test_display_dry_run_and_cancelled() {
        let mut report = ReconciliationReport::new("/Incoming", true);
        report.record(
            ClassTag::from("Blueprint"),
            entry("/Incoming/door", "/Incoming/door", Outcome::Unmapped),
        );
        report.cancelled = true;
        report.skipped = 3;
        report.finish();

        let text = format!("{}", report);
        assert!(text.starts_with("=== Planned layout by class (/Incoming) ==="));
        assert!(text.contains("  /Incoming/door  (no rule)"));
        assert!(text.ends_with("Cancelled: 3 item(s) not processed\n"));
        assert_eq!(text, report.render_text());
    }

    #[test]
    fn test_failure_reason_serializes_as_code() {
        let json = serde_json::to_string(&FailureReason::DestinationOccupied).unwrap();
        assert_eq!(json, "\"destination occupied\"");
        let json = serde_json::to_string(&Outcome::AlreadyCanonical).unwrap();
        assert_eq!(json, "\"already_canonical\"");
    }
}
