// Copyright 2025 Cowboy AI, LLC.

//! Linear undo history

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::document::Document;
use crate::errors::DiagramResult;

/// One executed command and when it was pushed
#[derive(Debug, Clone)]
pub struct UndoEntry {
    /// The command
    pub command: Command,
    /// Push time
    pub pushed_at: DateTime<Utc>,
}

/// Ordered history of executed commands with a cursor
///
/// Entries before the cursor are applied, entries at or after it have been
/// undone and can be redone until the next push.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    entries: Vec<UndoEntry>,
    index: usize,
    limit: usize,
    clean_index: Option<usize>,
}

impl UndoStack {
    /// An empty, unbounded stack
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty stack keeping at most `limit` entries (0 keeps everything)
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Execute `command` and record it, dropping the redo tail
    ///
    /// A command whose forward run fails is rolled back and not recorded.
    pub fn push(&mut self, doc: &mut Document, mut command: Command) -> DiagramResult<()> {
        command.redo(doc)?;
        if self.index < self.entries.len() {
            debug!(dropped = self.entries.len() - self.index, "dropping redo tail");
            self.entries.truncate(self.index);
            if self.clean_index.is_some_and(|c| c > self.index) {
                self.clean_index = None;
            }
        }
        info!(label = %command.label(), "command pushed");
        self.entries.push(UndoEntry {
            command,
            pushed_at: Utc::now(),
        });
        self.index += 1;
        self.enforce_limit();
        Ok(())
    }

    fn enforce_limit(&mut self) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() > self.limit {
            self.entries.remove(0);
            self.index = self.index.saturating_sub(1);
            self.clean_index = match self.clean_index {
                Some(0) | None => None,
                Some(c) => Some(c - 1),
            };
        }
    }

    /// Revert the command before the cursor; false if there is none
    pub fn undo(&mut self, doc: &mut Document) -> DiagramResult<bool> {
        if self.index == 0 {
            return Ok(false);
        }
        let entry = &mut self.entries[self.index - 1];
        if let Err(err) = entry.command.undo(doc) {
            warn!(label = %entry.command.label(), %err, "undo failed");
            return Err(err);
        }
        debug!(label = %entry.command.label(), "undone");
        self.index -= 1;
        Ok(true)
    }

    /// Re-apply the command at the cursor; false if there is none
    pub fn redo(&mut self, doc: &mut Document) -> DiagramResult<bool> {
        let Some(entry) = self.entries.get_mut(self.index) else {
            return Ok(false);
        };
        if let Err(err) = entry.command.redo(doc) {
            warn!(label = %entry.command.label(), %err, "redo failed");
            return Err(err);
        }
        debug!(label = %entry.command.label(), "redone");
        self.index += 1;
        Ok(true)
    }

    /// True if there is something to undo
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    /// True if there is something to redo
    pub fn can_redo(&self) -> bool {
        self.index < self.entries.len()
    }

    /// Label of the command [`UndoStack::undo`] would revert
    pub fn undo_label(&self) -> Option<&str> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|e| e.command.label())
    }

    /// Label of the command [`UndoStack::redo`] would re-apply
    pub fn redo_label(&self) -> Option<&str> {
        self.entries.get(self.index).map(|e| e.command.label())
    }

    /// Cursor position: number of applied entries
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recorded entries, oldest first
    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    /// Maximum number of entries kept; 0 means unbounded
    pub fn undo_limit(&self) -> usize {
        self.limit
    }

    /// Change the limit, dropping the oldest entries if needed
    pub fn set_undo_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.enforce_limit();
    }

    /// Mark the current cursor position as saved
    pub fn set_clean(&mut self) {
        self.clean_index = Some(self.index);
    }

    /// True while the cursor is at the last saved position
    pub fn is_clean(&self) -> bool {
        self.clean_index == Some(self.index)
    }

    /// Forget the whole history
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = 0;
        self.clean_index = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Operation;
    use crate::identifiers::Uid;

    fn rename(x: Uid, from: &str, to: &str) -> Command {
        Command::method_call(
            format!("rename to {to}"),
            Operation::SetSymbol {
                entity: x,
                symbol: to.into(),
            },
            Operation::SetSymbol {
                entity: x,
                symbol: from.into(),
            },
        )
    }

    #[test]
    fn test_push_undo_redo() {
        let mut doc = Document::new();
        let x = doc.create_object("a");
        let mut stack = UndoStack::new();

        stack.push(&mut doc, rename(x, "a", "b")).unwrap();
        stack.push(&mut doc, rename(x, "b", "c")).unwrap();
        assert_eq!(doc.symbol(x), Some("c"));
        assert_eq!(stack.undo_label(), Some("rename to c"));

        assert!(stack.undo(&mut doc).unwrap());
        assert!(stack.undo(&mut doc).unwrap());
        assert!(!stack.undo(&mut doc).unwrap());
        assert_eq!(doc.symbol(x), Some("a"));
        assert_eq!(stack.redo_label(), Some("rename to b"));

        assert!(stack.redo(&mut doc).unwrap());
        assert_eq!(doc.symbol(x), Some("b"));
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let mut doc = Document::new();
        let x = doc.create_object("a");
        let mut stack = UndoStack::new();
        stack.push(&mut doc, rename(x, "a", "b")).unwrap();
        stack.push(&mut doc, rename(x, "b", "c")).unwrap();
        stack.undo(&mut doc).unwrap();

        stack.push(&mut doc, rename(x, "b", "d")).unwrap();
        assert_eq!(stack.len(), 2);
        assert!(!stack.can_redo());
        assert!(!stack.redo(&mut doc).unwrap());
        assert_eq!(doc.symbol(x), Some("d"));
    }

    #[test]
    fn test_failed_push_is_not_recorded() {
        let mut doc = Document::new();
        let mut stack = UndoStack::new();
        let missing = Uid::new();
        let err = stack.push(&mut doc, rename(missing, "a", "b")).unwrap_err();
        assert!(err.is_not_found());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_failed_composite_rolls_back_its_earlier_steps() {
        let mut doc = Document::new();
        let root = doc.root();
        let x = doc.create_object("a");
        let y = doc.create_object("y");
        doc.add_object(root, x).unwrap();
        let mut stack = UndoStack::new();

        let command = Command::composite("rename then nest")
            .with_subcommand(rename(x, "a", "b"))
            .with_subcommand(Command::method_call(
                "nest y in an object",
                Operation::AddObject {
                    diagram: x,
                    object: y,
                },
                Operation::RemoveObject {
                    diagram: x,
                    object: y,
                },
            ));
        assert!(stack.push(&mut doc, command).is_err());
        assert_eq!(doc.symbol(x), Some("a"));
        assert_eq!(doc.parent(y), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut doc = Document::new();
        let x = doc.create_object("0");
        let mut stack = UndoStack::with_limit(2);
        for i in 1..=3 {
            let from = (i - 1).to_string();
            let to = i.to_string();
            stack.push(&mut doc, rename(x, &from, &to)).unwrap();
        }
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.index(), 2);
        stack.undo(&mut doc).unwrap();
        stack.undo(&mut doc).unwrap();
        assert!(!stack.can_undo());
        assert_eq!(doc.symbol(x), Some("1"));
    }

    #[test]
    fn test_clean_tracking() {
        let mut doc = Document::new();
        let x = doc.create_object("a");
        let mut stack = UndoStack::new();
        stack.push(&mut doc, rename(x, "a", "b")).unwrap();
        stack.set_clean();
        assert!(stack.is_clean());
        stack.undo(&mut doc).unwrap();
        assert!(!stack.is_clean());
        stack.redo(&mut doc).unwrap();
        assert!(stack.is_clean());
        assert!(stack.entries()[0].pushed_at <= Utc::now());

        stack.clear();
        assert!(!stack.is_clean());
        assert!(stack.is_empty());
    }
}
