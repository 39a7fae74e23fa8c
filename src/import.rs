//! Bulk import of decoded CSV rows.
//!
//! Rows are created one request at a time. A failing row is counted and the
//! import moves on; only an expired session stops it.

use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{ApiError, ApiResult, ContactRepository};
use crate::contact::{Contact, ContactDraft};
use crate::merge;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// 1-based data row.
    pub row: usize,
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub success_count: usize,
    pub fail_count: usize,
    /// Successful rows that were folded into an existing contact.
    pub merged_count: usize,
    /// CSV rows the decoder could not read; they never reach the server.
    pub unreadable_count: usize,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    fn fail(&mut self, row: usize, draft: &ContactDraft, message: String) {
        tracing::warn!(row, %message, "import row failed");
        self.fail_count += 1;
        self.failures.push(ImportFailure {
            row,
            name: draft.composed_name().unwrap_or_default(),
            message,
        });
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Import complete: {} succeeded, {} failed.",
            self.success_count, self.fail_count
        );
        if self.merged_count > 0 {
            summary.push_str(&format!(" ({} merged into existing contacts)", self.merged_count));
        }
        if self.unreadable_count > 0 {
            summary.push_str(&format!(
                " {} unreadable CSV row(s) skipped.",
                self.unreadable_count
            ));
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Merge rows whose phone matches an existing contact instead of
    /// creating a second record.
    pub merge_duplicates: bool,
}

pub trait ImportProgress {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, _row: usize) {}
    fn finish(&mut self, _report: &ImportReport) {}
}

pub struct NoProgress;

impl ImportProgress for NoProgress {}

impl ImportProgress for ProgressBar {
    fn start(&mut self, total: usize) {
        self.set_length(total as u64);
        self.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        self.set_message("Importing contacts");
    }

    fn advance(&mut self, _row: usize) {
        self.inc(1);
    }

    fn finish(&mut self, _report: &ImportReport) {
        self.finish_and_clear();
    }
}

/// Validate rows without touching the server.
pub fn check_drafts(drafts: &[ContactDraft]) -> ImportReport {
    let mut report = ImportReport::default();
    for (index, draft) in drafts.iter().enumerate() {
        match draft.validate() {
            Ok(()) => report.success_count += 1,
            Err(errors) => report.fail(index + 1, draft, errors.to_string()),
        }
    }
    report
}

/// Create each row in order. `existing` is the collection duplicates are
/// looked up in when merging is enabled; rows created earlier in the same
/// import count as existing too.
pub fn import_drafts<R: ContactRepository + ?Sized>(
    repo: &mut R,
    existing: &[Contact],
    drafts: Vec<ContactDraft>,
    options: ImportOptions,
    progress: &mut dyn ImportProgress,
) -> ApiResult<ImportReport> {
    let mut report = ImportReport::default();
    let mut known: Vec<Contact> = existing.to_vec();
    progress.start(drafts.len());

    for (index, draft) in drafts.into_iter().enumerate() {
        let row = index + 1;
        progress.advance(row);

        let draft = draft.normalized();
        if let Err(errors) = draft.validate() {
            report.fail(row, &draft, errors.to_string());
            continue;
        }

        let duplicate = if options.merge_duplicates {
            let phone = draft.phone.as_deref().unwrap_or("");
            merge::find_duplicate(&known, phone, None).map(|c| c.id.clone())
        } else {
            None
        };

        let outcome = match &duplicate {
            Some(target_id) => repo.update(target_id, &draft),
            None => repo.create(&draft),
        };

        match outcome {
            Ok(saved) => {
                report.success_count += 1;
                if duplicate.is_some() {
                    report.merged_count += 1;
                    known.retain(|c| c.id != saved.id);
                }
                known.push(saved);
            }
            Err(ApiError::Unauthorized) => {
                progress.finish(&report);
                return Err(ApiError::Unauthorized);
            }
            Err(err) => report.fail(row, &draft, err.to_string()),
        }
    }

    progress.finish(&report);
    tracing::info!(
        success = report.success_count,
        failed = report.fail_count,
        merged = report.merged_count,
        "import finished"
    );
    Ok(report)
}
