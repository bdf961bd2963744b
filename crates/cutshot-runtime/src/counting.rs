//! Counting step: unit reports → bit-order-normalized raw counts.

use cutshot_backend::JobOutcome;
use cutshot_core::{BackendId, Counts, CountsEntry, RawCounts, Result};

use crate::types::UnitReport;

/// What one attempt's counting step decided.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Counts(RawCounts),
    /// A backend returned a structurally absent result; the whole attempt
    /// must be discarded.
    Retry { backend: BackendId, reason: String },
}

/// Convert every unit report of one attempt into raw counts.
///
/// Bitstrings are rewritten into observable order using each report's
/// declared bit order. States that coincide after normalization are summed.
/// A malformed bitstring is fatal.
pub fn results_to_counts(reports: Vec<UnitReport>) -> Result<AttemptOutcome> {
    let mut raw = RawCounts::new();
    for report in reports {
        let mut entries = Vec::with_capacity(report.results.len());
        for result in report.results {
            match result.outcome {
                JobOutcome::Missing { reason } => {
                    return Ok(AttemptOutcome::Retry {
                        backend: report.backend,
                        reason,
                    });
                }
                JobOutcome::Completed { counts } => {
                    let mut normalized = Counts::new();
                    for (state, count) in counts {
                        let state = report.bit_order.normalize(&state)?;
                        *normalized.entry(state).or_insert(0) += count;
                    }
                    entries.push(CountsEntry {
                        fragment_id: result.fragment_id,
                        observable: result.observable,
                        counts: normalized,
                    });
                }
            }
        }
        raw.extend(report.backend, entries);
    }
    Ok(AttemptOutcome::Counts(raw))
}
