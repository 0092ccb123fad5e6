use std::fmt;

use serde::Serialize;

#[cfg(feature = "colorized_output")]
use console::style;

/// Row accounting of one reconciled plate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlateCounts {
    /// Input files merged
    pub files: usize,
    /// Rows across all inputs
    pub rows_in: usize,
    /// Rows written
    pub rows_out: usize,
    /// Written rows taken from a repeat acquisition
    pub reimaged_rows: usize,
    /// Rows replaced by a row with the same (well, site)
    pub superseded: usize,
    /// Input rows neither written nor superseded
    pub missing: usize,
}

impl PlateCounts {
    /// Every input row is written or superseded
    pub fn is_balanced(&self) -> bool {
        self.missing == 0 && self.rows_out + self.superseded == self.rows_in
    }
}

/// Outcome for one plate or input file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CheckStatus {
    /// Output written and every input row accounted for
    Reconciled(PlateCounts),
    /// Output written, but some input rows are missing from it
    RowsMissing(PlateCounts),
    /// Nothing written: no input for an expected plate, or a file with no
    /// plate identifier
    Skipped {
        /// Why
        reason: String,
    },
    /// Plate could not be reconciled; its inputs are kept
    Failed {
        /// Error message
        reason: String,
    },
}

impl CheckStatus {
    fn symbol(&self) -> &'static str {
        match self {
            CheckStatus::Reconciled(_) => "✓",
            CheckStatus::RowsMissing(_) | CheckStatus::Skipped { .. } => "⚠",
            CheckStatus::Failed { .. } => "✗",
        }
    }

    fn detail(&self) -> String {
        match self {
            CheckStatus::Reconciled(c) => format!(
                "{} file(s), {} -> {} rows ({} re-imaged, {} superseded)",
                c.files, c.rows_in, c.rows_out, c.reimaged_rows, c.superseded
            ),
            CheckStatus::RowsMissing(c) => format!(
                "{} -> {} rows, {} superseded, {} missing",
                c.rows_in, c.rows_out, c.superseded, c.missing
            ),
            CheckStatus::Skipped { reason } => format!("skipped: {}", reason),
            CheckStatus::Failed { reason } => format!("failed: {}", reason),
        }
    }

    /// Row counts, when an output was written
    pub fn counts(&self) -> Option<&PlateCounts> {
        match self {
            CheckStatus::Reconciled(c) | CheckStatus::RowsMissing(c) => Some(c),
            _ => None,
        }
    }
}

/// One line of a reconciliation report
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileCheck {
    /// Plate identifier, or file name for unused inputs
    pub name: String,
    /// Result
    #[serde(flatten)]
    pub status: CheckStatus,
}

impl ReconcileCheck {
    /// Check for a plate whose output was written
    pub fn written(name: impl Into<String>, counts: PlateCounts) -> Self {
        let status = if counts.is_balanced() {
            CheckStatus::Reconciled(counts)
        } else {
            CheckStatus::RowsMissing(counts)
        };
        Self {
            name: name.into(),
            status,
        }
    }

    /// Check for a plate or file that was left alone
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    /// Check for a plate that could not be reconciled
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Failed {
                reason: reason.into(),
            },
        }
    }
}

/// Report of a reconciliation batch, one check per plate or unused file
#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    /// Checks in plate order, unused files last
    pub checks: Vec<ReconcileCheck>,
}

impl ReconcileReport {
    /// Add a check result
    pub fn add_check(&mut self, check: ReconcileCheck) {
        self.checks.push(check);
    }

    /// Plates with a written output
    pub fn written_count(&self) -> usize {
        self.checks.iter().filter(|c| c.status.counts().is_some()).count()
    }

    /// Plates or files that need a look: missing rows or skipped inputs
    pub fn warning_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| {
                matches!(
                    c.status,
                    CheckStatus::RowsMissing(_) | CheckStatus::Skipped { .. }
                )
            })
            .count()
    }

    /// Returns true if any check needs a look
    pub fn has_warnings(&self) -> bool {
        self.warning_count() > 0
    }

    /// Plates that could not be reconciled
    pub fn failure_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Failed { .. }))
            .count()
    }

    /// Returns true if any plate failed
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Row counts summed over every written plate
    pub fn totals(&self) -> PlateCounts {
        self.checks
            .iter()
            .filter_map(|c| c.status.counts())
            .fold(PlateCounts::default(), |acc, c| PlateCounts {
                files: acc.files + c.files,
                rows_in: acc.rows_in + c.rows_in,
                rows_out: acc.rows_out + c.rows_out,
                reimaged_rows: acc.reimaged_rows + c.reimaged_rows,
                superseded: acc.superseded + c.superseded,
                missing: acc.missing + c.missing,
            })
    }

    fn summary(&self) -> String {
        let totals = self.totals();
        format!(
            "{} plate(s) written, {} warning(s), {} failed; {} rows in, {} out, {} superseded",
            self.written_count(),
            self.warning_count(),
            self.failure_count(),
            totals.rows_in,
            totals.rows_out,
            totals.superseded
        )
    }

    /// Format the report with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            let mut output = format!("{}\n", style("Reconciliation Report").bold().cyan());
            for check in &self.checks {
                let name = match check.status {
                    CheckStatus::Reconciled(_) => style(&check.name).green(),
                    CheckStatus::Failed { .. } => style(&check.name).red().bold(),
                    _ => style(&check.name).yellow(),
                };
                output.push_str(&format!(
                    "  {} {:<12} {}\n",
                    check.status.symbol(),
                    name,
                    style(check.status.detail()).dim()
                ));
            }
            output.push_str(&format!("{}\n", style(self.summary()).bold()));
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            self.to_string()
        }
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reconciliation Report")?;
        for check in &self.checks {
            writeln!(
                f,
                "  {} {:<12} {}",
                check.status.symbol(),
                check.name,
                check.status.detail()
            )?;
        }
        writeln!(f, "{}", self.summary())
    }
}
