//! # History Engine
//!
//! Records reversible steps against a root set and replays them for
//! undo/redo.
//!
//! ## States
//!
//! ```text
//!            add_operation / record_snapshot
//!   Idle ─────────────────────────────────────→ Recording
//!    ↑                                              │
//!    └──────────── commit(description) ─────────────┘
//!                  (pushes the step, clears redo)
//! ```
//!
//! ## Recording modes
//!
//! - **Operations**: each [`AtomicOperation`] is stored with its inverse.
//!   Undo replays the inverses in reverse order, redo the forward ops.
//! - **Snapshots**: the step is marked snapshot-based and the caller edits
//!   freely. Undo restores the serialized state before the step, redo the
//!   state after it.
//!
//! A step may carry both; its snapshot wins when present. Snapshots hold
//! the state *after* their step and are captured lazily: the state before a
//! snapshot step is secured when recording starts, the state after it when
//! it is first undone.
//!
//! Undo and redo never leave a partially applied tree: operations replay on
//! a clone and snapshots are decoded before anything is installed.

use crate::operations::{AtomicOperation, RecordedOperation};
use nodegraph_model::{format, AccessError, DocumentError, RootSet, TypeShapeRegistry};
use thiserror::Error;
use tracing::{debug, info};

/// Default number of undo levels kept
pub const DEFAULT_MAX_LEVELS: usize = 100;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Operation failed: {0}")]
    Operation(#[from] AccessError),

    #[error("Snapshot could not be restored: {0}")]
    Snapshot(#[from] DocumentError),

    #[error("No snapshot of the state before '{0}'")]
    MissingSnapshot(String),

    #[error("A step is being recorded; commit or discard it first")]
    StepInProgress,

    #[error("Snapshot recording must start before the step's first operation")]
    SnapshotAfterOperations,
}

/// Serializes root sets for snapshot steps
pub trait SnapshotCodec {
    fn capture(&self, roots: &RootSet) -> Result<String, DocumentError>;
    fn restore(&self, snapshot: &str) -> Result<RootSet, DocumentError>;
}

/// Snapshots in the document JSON format, validated against a registry on
/// restore
pub struct JsonSnapshots<'r> {
    registry: &'r TypeShapeRegistry,
}

impl<'r> JsonSnapshots<'r> {
    pub fn new(registry: &'r TypeShapeRegistry) -> Self {
        Self { registry }
    }
}

impl SnapshotCodec for JsonSnapshots<'_> {
    fn capture(&self, roots: &RootSet) -> Result<String, DocumentError> {
        format::to_json_string(roots)
    }

    fn restore(&self, snapshot: &str) -> Result<RootSet, DocumentError> {
        format::from_json_str(snapshot, self.registry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    Idle,
    Recording,
}

/// One undo point
#[derive(Debug, Clone, Default)]
pub struct HistoryStep {
    pub description: String,

    /// Applied operations in application order
    pub operations: Vec<RecordedOperation>,

    /// Serialized state after this step, once captured
    pub snapshot: Option<String>,

    pub snapshot_based: bool,
    pub committed: bool,
}

impl HistoryStep {
    /// Nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && !self.snapshot_based
    }

    fn revert_operations(&self, roots: &RootSet) -> Result<RootSet, AccessError> {
        let mut scratch = roots.clone();
        for op in self.operations.iter().rev() {
            op.inverse.apply(&mut scratch)?;
        }
        Ok(scratch)
    }

    fn replay_operations(&self, roots: &RootSet) -> Result<RootSet, AccessError> {
        let mut scratch = roots.clone();
        for op in &self.operations {
            op.forward.apply(&mut scratch)?;
        }
        Ok(scratch)
    }
}

#[derive(Debug)]
pub struct History {
    /// Committed steps (most recent last)
    undo_stack: Vec<HistoryStep>,

    /// Undone steps (most recent last)
    redo_stack: Vec<HistoryStep>,

    /// Uncommitted step
    open: Option<HistoryStep>,

    /// State before the oldest step on the undo stack
    baseline: Option<String>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_max_levels(DEFAULT_MAX_LEVELS)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            open: None,
            baseline: None,
            max_levels,
        }
    }

    pub fn state(&self) -> HistoryState {
        if self.open.is_some() {
            HistoryState::Recording
        } else {
            HistoryState::Idle
        }
    }

    pub fn open_step(&self) -> Option<&HistoryStep> {
        self.open.as_ref()
    }

    /// Apply `op` and record it in the open step, opening one if idle
    pub fn add_operation(
        &mut self,
        roots: &mut RootSet,
        op: AtomicOperation,
    ) -> Result<&RecordedOperation, HistoryError> {
        // Inverse is computed against the tree before the change
        let inverse = op.to_inverse(roots)?;
        op.apply(roots)?;
        debug!(op = op.name(), path = %op.path(), "Recorded operation");

        let step = self.open.get_or_insert_with(HistoryStep::default);
        step.operations.push(RecordedOperation { forward: op, inverse });
        Ok(&step.operations[step.operations.len() - 1])
    }

    /// [`add_operation`](Self::add_operation), refusing operations that
    /// would leave the tree outside its declarations
    pub fn add_checked_operation(
        &mut self,
        roots: &mut RootSet,
        op: AtomicOperation,
        registry: &TypeShapeRegistry,
    ) -> Result<&RecordedOperation, HistoryError> {
        op.check(roots, registry)?;
        self.add_operation(roots, op)
    }

    /// Mark the open (or a new) step as snapshot-based. The caller may then
    /// edit the tree directly until commit.
    pub fn record_snapshot(
        &mut self,
        roots: &RootSet,
        codec: &dyn SnapshotCodec,
    ) -> Result<(), HistoryError> {
        if self.open.as_ref().map_or(false, |step| !step.operations.is_empty()) {
            return Err(HistoryError::SnapshotAfterOperations);
        }
        self.ensure_snapshot(roots, codec)?;
        self.open.get_or_insert_with(HistoryStep::default).snapshot_based = true;
        Ok(())
    }

    /// Close the open step under `description`. Empty steps are dropped.
    /// Returns whether an undo point was created.
    pub fn commit(&mut self, description: impl Into<String>) -> bool {
        let Some(mut step) = self.open.take() else {
            return false;
        };
        if step.is_empty() {
            return false;
        }
        step.description = description.into();
        step.committed = true;
        info!(
            description = %step.description,
            operations = step.operations.len(),
            snapshot_based = step.snapshot_based,
            "Committed history step"
        );

        self.undo_stack.push(step);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            let dropped = self.undo_stack.remove(0);
            self.baseline = dropped.snapshot;
        }
        self.redo_stack.clear();
        true
    }

    /// Revert and drop the uncommitted step. Returns whether there was one.
    pub fn discard_open_step(
        &mut self,
        roots: &mut RootSet,
        codec: &dyn SnapshotCodec,
    ) -> Result<bool, HistoryError> {
        let Some(step) = self.open.as_ref() else {
            return Ok(false);
        };
        let reverted = if step.snapshot_based {
            let before = self
                .current_snapshot()
                .ok_or_else(|| HistoryError::MissingSnapshot("uncommitted step".to_string()))?;
            codec.restore(before)?
        } else {
            step.revert_operations(roots)?
        };
        *roots = reverted;
        self.open = None;
        debug!("Discarded uncommitted step");
        Ok(true)
    }

    /// Snapshot of the current history point, if captured
    fn current_snapshot(&self) -> Option<&str> {
        match self.undo_stack.last() {
            Some(step) => step.snapshot.as_deref(),
            None => self.baseline.as_deref(),
        }
    }

    /// Capture the current history point's state if it has no snapshot yet.
    /// Returns whether a snapshot was taken.
    pub fn ensure_snapshot(
        &mut self,
        roots: &RootSet,
        codec: &dyn SnapshotCodec,
    ) -> Result<bool, HistoryError> {
        if self.open.as_ref().map_or(false, |step| !step.operations.is_empty()) {
            return Err(HistoryError::StepInProgress);
        }
        if self.current_snapshot().is_some() {
            return Ok(false);
        }
        let snapshot = codec.capture(roots)?;
        match self.undo_stack.last_mut() {
            Some(step) => step.snapshot = Some(snapshot),
            None => self.baseline = Some(snapshot),
        }
        debug!(levels = self.undo_stack.len(), "Captured history snapshot");
        Ok(true)
    }

    /// An empty open step is dropped; a non-empty one blocks undo/redo
    fn settle_open_step(&mut self) -> Result<(), HistoryError> {
        match &self.open {
            Some(step) if !step.is_empty() => Err(HistoryError::StepInProgress),
            _ => {
                self.open = None;
                Ok(())
            }
        }
    }

    /// Undo the most recent committed step. Returns `false` when there is
    /// nothing to undo.
    pub fn undo(
        &mut self,
        roots: &mut RootSet,
        codec: &dyn SnapshotCodec,
    ) -> Result<bool, HistoryError> {
        self.settle_open_step()?;
        let Some(index) = self.undo_stack.len().checked_sub(1) else {
            return Ok(false);
        };

        let step = &self.undo_stack[index];
        let before = if index == 0 {
            self.baseline.as_deref()
        } else {
            self.undo_stack[index - 1].snapshot.as_deref()
        };

        // A snapshot on both sides of the step wins over its operations
        let snapshot_undo = match before {
            Some(_) if step.snapshot.is_some() => true,
            _ => step.snapshot_based,
        };
        if snapshot_undo {
            let before =
                before.ok_or_else(|| HistoryError::MissingSnapshot(step.description.clone()))?;

            // Secure the state after the step so redo can return to it
            let after = match &step.snapshot {
                Some(_) => None,
                None => Some(codec.capture(roots)?),
            };
            let restored = codec.restore(before)?;

            *roots = restored;
            if let Some(after) = after {
                self.undo_stack[index].snapshot = Some(after);
            }
        } else {
            *roots = step.revert_operations(roots)?;
        }

        if let Some(step) = self.undo_stack.pop() {
            info!(description = %step.description, "Undo");
            self.redo_stack.push(step);
        }
        Ok(true)
    }

    /// Reapply the most recently undone step. Returns `false` when there is
    /// nothing to redo.
    pub fn redo(
        &mut self,
        roots: &mut RootSet,
        codec: &dyn SnapshotCodec,
    ) -> Result<bool, HistoryError> {
        self.settle_open_step()?;
        let Some(step) = self.redo_stack.last() else {
            return Ok(false);
        };

        let replayed = match &step.snapshot {
            Some(after) => codec.restore(after)?,
            None if step.snapshot_based => {
                return Err(HistoryError::MissingSnapshot(step.description.clone()));
            }
            None => step.replay_operations(roots)?,
        };
        *roots = replayed;

        if let Some(step) = self.redo_stack.pop() {
            info!(description = %step.description, "Redo");
            self.undo_stack.push(step);
        }
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|step| step.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|step| step.description.as_str())
    }

    /// Committed steps, oldest first
    pub fn steps(&self) -> &[HistoryStep] {
        &self.undo_stack
    }

    /// Forget all history, including any uncommitted step
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open = None;
        self.baseline = None;
    }
}
