use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::parse::Caf;
use crate::core::{DteError, DteType, Rut};

/// Lifecycle of a folio range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeStatus {
    Active,
    Exhausted,
    Revoked,
}

/// A CAF range with its allocation cursor.
///
/// The cursor is monotonically non-decreasing and a folio value is never
/// handed out twice. The range flips to `Exhausted` exactly when the
/// cursor passes the end of the range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolioRange {
    caf: Caf,
    /// Next unissued folio.
    cursor: u64,
    /// Folios handed out so far.
    consumed: u64,
    status: RangeStatus,
}

impl FolioRange {
    pub fn new(caf: Caf) -> Self {
        let cursor = caf.range_start;
        Self {
            caf,
            cursor,
            consumed: 0,
            status: RangeStatus::Active,
        }
    }

    pub fn caf(&self) -> &Caf {
        &self.caf
    }

    pub fn status(&self) -> RangeStatus {
        self.status
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Folios still available from this range.
    pub fn remaining(&self) -> u64 {
        if self.status != RangeStatus::Active {
            return 0;
        }
        self.caf.range_end + 1 - self.cursor
    }

    /// Take the next folio, flipping to `Exhausted` when the last one goes.
    fn take(&mut self) -> Option<u64> {
        if self.status != RangeStatus::Active {
            return None;
        }
        let folio = self.cursor;
        self.cursor += 1;
        self.consumed += 1;
        if self.cursor > self.caf.range_end {
            self.status = RangeStatus::Exhausted;
        }
        Some(folio)
    }

    fn revoke(&mut self) {
        self.status = RangeStatus::Revoked;
    }

    fn overlaps(&self, other: &Caf) -> bool {
        self.caf.range_start <= other.range_end && other.range_start <= self.caf.range_end
    }
}

/// Serializable snapshot of allocator state, for the embedding
/// application to persist between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub company: Rut,
    pub dte_type: DteType,
    pub ranges: Vec<FolioRange>,
}

/// Owns every imported CAF range and hands out folios exactly once.
///
/// This is the single point where concurrent issuance for the same
/// (company, document type) must serialize: the interior mutex makes the
/// cursor increment and the folio hand-out one atomic unit. A folio is
/// spent the moment `next_folio` returns it — it is never returned to
/// the pool, even if the document it gets bound to later fails.
#[derive(Debug, Default)]
pub struct FolioAllocator {
    ranges: Mutex<HashMap<(Rut, DteType), Vec<FolioRange>>>,
}

impl FolioAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an imported CAF for a company.
    ///
    /// Ranges overlapping an already-imported range for the same
    /// (company, type) are rejected — the same folio must never be
    /// reachable through two ranges.
    pub fn import(&self, company: Rut, caf: Caf) -> Result<(), DteError> {
        let mut map = self.lock();
        let key = (company, caf.dte_type);
        let ranges = map.entry(key).or_default();
        if let Some(existing) = ranges.iter().find(|r| r.overlaps(&caf)) {
            return Err(DteError::Folio(format!(
                "CAF range [{}, {}] overlaps imported range [{}, {}] for type {}",
                caf.range_start,
                caf.range_end,
                existing.caf.range_start,
                existing.caf.range_end,
                caf.dte_type,
            )));
        }
        tracing::info!(
            company = %company,
            dte_type = %caf.dte_type,
            start = caf.range_start,
            end = caf.range_end,
            "imported CAF range"
        );
        ranges.push(FolioRange::new(caf));
        // Oldest authorization first: lowest start wins
        ranges.sort_by_key(|r| r.caf.range_start);
        Ok(())
    }

    /// Allocate the next unused folio for (company, document type).
    ///
    /// Fails with [`DteError::NotAuthorized`] when no range exists for the
    /// type, and [`DteError::Exhausted`] when every active range is out of
    /// capacity.
    pub fn next_folio(&self, company: &Rut, dte_type: DteType) -> Result<u64, DteError> {
        let mut map = self.lock();
        let ranges = map.get_mut(&(*company, dte_type)).ok_or_else(|| {
            DteError::NotAuthorized(format!("company {company}, document type {dte_type}"))
        })?;

        for range in ranges.iter_mut() {
            if let Some(folio) = range.take() {
                tracing::debug!(
                    company = %company,
                    dte_type = %dte_type,
                    folio,
                    "allocated folio"
                );
                if range.status() == RangeStatus::Exhausted {
                    tracing::warn!(
                        company = %company,
                        dte_type = %dte_type,
                        start = range.caf.range_start,
                        end = range.caf.range_end,
                        "folio range exhausted"
                    );
                }
                return Ok(folio);
            }
        }

        Err(DteError::Exhausted(format!(
            "company {company}, document type {dte_type}"
        )))
    }

    /// Folios still available for (company, document type).
    pub fn remaining(&self, company: &Rut, dte_type: DteType) -> u64 {
        self.lock()
            .get(&(*company, dte_type))
            .map(|ranges| ranges.iter().map(FolioRange::remaining).sum())
            .unwrap_or(0)
    }

    /// Mark the range starting at `range_start` revoked; it will be
    /// skipped by future allocations.
    pub fn revoke(
        &self,
        company: &Rut,
        dte_type: DteType,
        range_start: u64,
    ) -> Result<(), DteError> {
        let mut map = self.lock();
        let ranges = map.get_mut(&(*company, dte_type)).ok_or_else(|| {
            DteError::NotAuthorized(format!("company {company}, document type {dte_type}"))
        })?;
        let range = ranges
            .iter_mut()
            .find(|r| r.caf.range_start == range_start)
            .ok_or_else(|| {
                DteError::Folio(format!("no range starting at folio {range_start}"))
            })?;
        range.revoke();
        tracing::warn!(
            company = %company,
            dte_type = %dte_type,
            range_start,
            "folio range revoked"
        );
        Ok(())
    }

    /// Snapshot the full allocator state for persistence.
    pub fn snapshot(&self) -> AllocatorSnapshot {
        let map = self.lock();
        let entries = map
            .iter()
            .map(|((company, dte_type), ranges)| SnapshotEntry {
                company: *company,
                dte_type: *dte_type,
                ranges: ranges.clone(),
            })
            .collect();
        AllocatorSnapshot { entries }
    }

    /// Rebuild an allocator from a snapshot.
    pub fn from_snapshot(snapshot: AllocatorSnapshot) -> Self {
        let mut map: HashMap<(Rut, DteType), Vec<FolioRange>> = HashMap::new();
        for entry in snapshot.entries {
            map.insert((entry.company, entry.dte_type), entry.ranges);
        }
        Self {
            ranges: Mutex::new(map),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Rut, DteType), Vec<FolioRange>>> {
        // A panicked holder cannot have left the map half-updated:
        // every mutation is a single field store.
        self.ranges
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
