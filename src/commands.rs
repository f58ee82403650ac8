// Copyright 2025 Cowboy AI, LLC.

//! Reversible editing commands
//!
//! A [`Command`] is plain data: a label, an [`Action`] with whatever state
//! its inverse needs, and an ordered list of sub-commands. Running it
//! forward applies its own action and then the sub-commands in order;
//! running it backward undoes the sub-commands in reverse order and then
//! its own action. Commands are serializable so a history can be inspected
//! or logged.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::category::diagram::{DeletionSnapshot, Detachment};
use crate::category::functor::ImageDelta;
use crate::document::Document;
use crate::entity::MorphismFlag;
use crate::errors::DiagramResult;
use crate::identifiers::{End, Position, Uid};

/// One primitive, directly invertible document call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// [`Document::add_object`]
    AddObject {
        /// Container
        diagram: Uid,
        /// New member
        object: Uid,
    },
    /// [`Document::remove_object`]
    RemoveObject {
        /// Container
        diagram: Uid,
        /// Member to remove
        object: Uid,
    },
    /// [`Document::add_morphism`]
    AddMorphism {
        /// Container
        diagram: Uid,
        /// New member
        morphism: Uid,
    },
    /// [`Document::remove_morphism`]
    RemoveMorphism {
        /// Container
        diagram: Uid,
        /// Member to remove
        morphism: Uid,
    },
    /// [`Document::set_endpoint`], running a functor's attachment state machine
    SetEndpoint {
        /// Arrow
        morphism: Uid,
        /// Which endpoint
        end: End,
        /// New target
        target: Option<Uid>,
    },
    /// [`Document::attach_endpoint`], leaving functor images alone
    AttachEndpoint {
        /// Arrow
        morphism: Uid,
        /// Which endpoint
        end: End,
        /// New target
        target: Option<Uid>,
    },
    /// [`Document::set_contravariant`]
    SetContravariant {
        /// Functor
        functor: Uid,
        /// New variance
        contravariant: bool,
    },
    /// [`Document::set_reflect_graphics`]
    SetReflectGraphics {
        /// Functor
        functor: Uid,
        /// New setting
        reflect: bool,
    },
    /// [`Document::set_symbol`]
    SetSymbol {
        /// Entity
        entity: Uid,
        /// New label
        symbol: String,
    },
    /// [`Document::set_position`]
    SetPosition {
        /// Node
        entity: Uid,
        /// New position
        position: Position,
    },
    /// [`Document::set_flag`]
    SetFlag {
        /// Arrow
        morphism: Uid,
        /// Marker
        flag: MorphismFlag,
        /// New value
        value: bool,
    },
    /// [`Document::set_control_points`]
    SetControlPoints {
        /// Arrow
        morphism: Uid,
        /// New points
        points: Vec<Position>,
    },
}

impl Operation {
    /// Run the call against `doc`
    pub fn apply(&self, doc: &mut Document) -> DiagramResult<()> {
        match self {
            Operation::AddObject { diagram, object } => doc.add_object(*diagram, *object),
            Operation::RemoveObject { diagram, object } => {
                doc.remove_object(*diagram, *object).map(|_| ())
            }
            Operation::AddMorphism { diagram, morphism } => doc.add_morphism(*diagram, *morphism),
            Operation::RemoveMorphism { diagram, morphism } => {
                doc.remove_morphism(*diagram, *morphism)
            }
            Operation::SetEndpoint {
                morphism,
                end,
                target,
            } => doc.set_endpoint(*morphism, *end, *target),
            Operation::AttachEndpoint {
                morphism,
                end,
                target,
            } => doc.attach_endpoint(*morphism, *end, *target),
            Operation::SetContravariant {
                functor,
                contravariant,
            } => doc.set_contravariant(*functor, *contravariant),
            Operation::SetReflectGraphics { functor, reflect } => {
                doc.set_reflect_graphics(*functor, *reflect)
            }
            Operation::SetSymbol { entity, symbol } => doc.set_symbol(*entity, symbol.clone()),
            Operation::SetPosition { entity, position } => doc.set_position(*entity, *position),
            Operation::SetFlag {
                morphism,
                flag,
                value,
            } => doc.set_flag(*morphism, *flag, *value),
            Operation::SetControlPoints { morphism, points } => {
                doc.set_control_points(*morphism, points.clone())
            }
        }
    }
}

/// Removal of a member that remembers which arrow endpoints it cleared
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveMember {
    /// Container
    pub diagram: Uid,
    /// Member to remove
    pub member: Uid,
    /// Endpoints cleared by the last forward run
    pub detached: Vec<Detachment>,
}

/// Deletion of a set of entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteItems {
    /// Entities to delete; none is a descendant of another
    pub items: Vec<Uid>,
    /// Snapshots of the last forward run, in deletion order
    pub snapshots: Vec<DeletionSnapshot>,
}

impl DeleteItems {
    /// Deletion of `items`, minus anything nested inside another item of the set
    pub fn new(doc: &Document, items: &[Uid]) -> Self {
        let set: HashSet<Uid> = items.iter().copied().collect();
        let mut seen = HashSet::new();
        let items = items
            .iter()
            .copied()
            .filter(|uid| seen.insert(*uid))
            .filter(|uid| !doc.ancestors(*uid).iter().any(|a| set.contains(a)))
            .collect();
        Self {
            items,
            snapshots: Vec::new(),
        }
    }
}

/// Taking or retracting a functor image as one undoable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctorImage {
    /// Functor
    pub functor: Uid,
    /// False to take the image, true to retract all of it
    pub retract: bool,
    /// Pairs the first forward run touched; replayed by later runs
    pub delta: Option<ImageDelta>,
}

/// What a command does besides running its sub-commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Nothing of its own
    Composite,
    /// A forward call and the call that reverts it
    Call {
        /// Run on redo
        forward: Operation,
        /// Run on undo
        inverse: Operation,
    },
    /// See [`RemoveMember`]
    RemoveMember(RemoveMember),
    /// See [`DeleteItems`]
    DeleteItems(DeleteItems),
    /// See [`FunctorImage`]
    FunctorImage(FunctorImage),
}

impl Action {
    fn forward(&mut self, doc: &mut Document) -> DiagramResult<()> {
        match self {
            Action::Composite => Ok(()),
            Action::Call { forward, .. } => forward.apply(doc),
            Action::RemoveMember(removal) => {
                removal.detached = if doc.get_object(removal.diagram, removal.member).is_some() {
                    doc.remove_object(removal.diagram, removal.member)?
                } else {
                    doc.remove_morphism(removal.diagram, removal.member)?;
                    Vec::new()
                };
                Ok(())
            }
            Action::DeleteItems(deletion) => {
                deletion.snapshots.clear();
                for uid in &deletion.items {
                    if doc.contains(*uid) {
                        deletion.snapshots.push(doc.delete(*uid)?);
                    }
                }
                Ok(())
            }
            Action::FunctorImage(step) => {
                if step.retract {
                    step.delta = Some(doc.undo_take_image(step.functor)?);
                } else {
                    match &step.delta {
                        Some(delta) => doc.restore_image(step.functor, delta)?,
                        None => step.delta = Some(doc.take_image(step.functor)?),
                    }
                }
                Ok(())
            }
        }
    }

    fn inverse(&mut self, doc: &mut Document) -> DiagramResult<()> {
        match self {
            Action::Composite => Ok(()),
            Action::Call { inverse, .. } => inverse.apply(doc),
            Action::RemoveMember(removal) => {
                match doc.kind(removal.member) {
                    Some(kind) if kind.is_object_like() => {
                        doc.add_object(removal.diagram, removal.member)?
                    }
                    _ => doc.add_morphism(removal.diagram, removal.member)?,
                }
                for detachment in &removal.detached {
                    doc.reattach(detachment)?;
                }
                Ok(())
            }
            Action::DeleteItems(deletion) => {
                for snapshot in deletion.snapshots.iter().rev() {
                    doc.undelete(snapshot)?;
                }
                Ok(())
            }
            Action::FunctorImage(step) => {
                let Some(delta) = step.delta.as_mut() else {
                    return Ok(());
                };
                if step.retract {
                    doc.restore_image(step.functor, delta)
                } else {
                    let retracted = doc.retract_image(step.functor, &delta.pairs)?;
                    delta.detached = retracted.detached;
                    Ok(())
                }
            }
        }
    }
}

/// A labelled, reversible unit of editing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    label: String,
    action: Action,
    subcommands: Vec<Command>,
    skip_first: bool,
}

impl Command {
    /// A command with only sub-commands
    pub fn composite(label: impl Into<String>) -> Self {
        Self::with_action(label, Action::Composite)
    }

    /// A command running `forward` on redo and `inverse` on undo
    pub fn method_call(label: impl Into<String>, forward: Operation, inverse: Operation) -> Self {
        Self::with_action(label, Action::Call { forward, inverse })
    }

    /// Removal of an object or morphism from `diagram` that restores cleared endpoints on undo
    pub fn remove_member(label: impl Into<String>, diagram: Uid, member: Uid) -> Self {
        Self::with_action(
            label,
            Action::RemoveMember(RemoveMember {
                diagram,
                member,
                detached: Vec::new(),
            }),
        )
    }

    /// Deletion of `items`
    pub fn delete_items(label: impl Into<String>, doc: &Document, items: &[Uid]) -> Self {
        Self::with_action(label, Action::DeleteItems(DeleteItems::new(doc, items)))
    }

    /// Taking `functor`'s image; undo removes exactly the images it created
    pub fn take_functor_image(label: impl Into<String>, functor: Uid) -> Self {
        Self::with_action(
            label,
            Action::FunctorImage(FunctorImage {
                functor,
                retract: false,
                delta: None,
            }),
        )
    }

    /// Removing `functor`'s whole image; undo brings it back under the same uids
    pub fn undo_functor_image(label: impl Into<String>, functor: Uid) -> Self {
        Self::with_action(
            label,
            Action::FunctorImage(FunctorImage {
                functor,
                retract: true,
                delta: None,
            }),
        )
    }

    fn with_action(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
            subcommands: Vec::new(),
            skip_first: false,
        }
    }

    /// Mark the command as already applied: the next redo is skipped once
    pub fn already_applied(mut self) -> Self {
        self.skip_first = true;
        self
    }

    /// Builder-style sub-command
    pub fn with_subcommand(mut self, command: Command) -> Self {
        self.subcommands.push(command);
        self
    }

    /// Append a sub-command
    pub fn add_subcommand(&mut self, command: Command) {
        self.subcommands.push(command);
    }

    /// Human-readable description
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replace the description
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// The command's own action
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Nested commands, in forward order
    pub fn subcommands(&self) -> &[Command] {
        &self.subcommands
    }

    /// True if the command does nothing at all
    pub fn is_empty(&self) -> bool {
        matches!(self.action, Action::Composite) && self.subcommands.is_empty()
    }

    /// Apply: own action first, then sub-commands in order
    ///
    /// If a sub-command fails, the ones that already ran and the own action
    /// are reverted before the error is returned.
    pub fn redo(&mut self, doc: &mut Document) -> DiagramResult<()> {
        if self.skip_first {
            self.skip_first = false;
            debug!(label = %self.label, "skipping first redo");
            return Ok(());
        }
        self.action.forward(doc)?;
        for done in 0..self.subcommands.len() {
            if let Err(err) = self.subcommands[done].redo(doc) {
                warn!(label = %self.label, %err, "rolling back partially applied command");
                self.roll_back(doc, done);
                return Err(err);
            }
        }
        Ok(())
    }

    fn roll_back(&mut self, doc: &mut Document, done: usize) {
        for sub in self.subcommands[..done].iter_mut().rev() {
            if let Err(err) = sub.undo(doc) {
                warn!(label = %sub.label, %err, "rollback of sub-command failed");
            }
        }
        if let Err(err) = self.action.inverse(doc) {
            warn!(label = %self.label, %err, "rollback failed");
        }
    }

    /// Revert: sub-commands in reverse order, then own action
    pub fn undo(&mut self, doc: &mut Document) -> DiagramResult<()> {
        for sub in self.subcommands.iter_mut().rev() {
            sub.undo(doc)?;
        }
        self.action.inverse(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_method_call_round_trip() {
        let mut doc = Document::new();
        let root = doc.root();
        let x = doc.create_object("x");
        let mut cmd = Command::method_call(
            "Adding object x",
            Operation::AddObject {
                diagram: root,
                object: x,
            },
            Operation::RemoveObject {
                diagram: root,
                object: x,
            },
        );
        cmd.redo(&mut doc).unwrap();
        assert_eq!(doc.objects(root), vec![x]);
        cmd.undo(&mut doc).unwrap();
        assert!(doc.objects(root).is_empty());
        cmd.redo(&mut doc).unwrap();
        assert_eq!(doc.objects(root), vec![x]);
    }

    #[test]
    fn test_subcommand_order() {
        let mut doc = Document::new();
        let x = doc.create_object("x");
        let rename = |from: &str, to: &str| {
            Command::method_call(
                format!("rename {from} to {to}"),
                Operation::SetSymbol {
                    entity: x,
                    symbol: to.into(),
                },
                Operation::SetSymbol {
                    entity: x,
                    symbol: from.into(),
                },
            )
        };
        let mut cmd = Command::composite("renames")
            .with_subcommand(rename("x", "y"))
            .with_subcommand(rename("y", "z"));

        cmd.redo(&mut doc).unwrap();
        assert_eq!(doc.symbol(x), Some("z"));
        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.symbol(x), Some("x"));
    }

    #[test]
    fn test_skip_first_is_single_use() {
        let mut doc = Document::new();
        let x = doc.create_object("old");
        doc.set_symbol(x, "new").unwrap();
        let mut cmd = Command::method_call(
            "rename",
            Operation::SetSymbol {
                entity: x,
                symbol: "new".into(),
            },
            Operation::SetSymbol {
                entity: x,
                symbol: "old".into(),
            },
        )
        .already_applied();

        cmd.redo(&mut doc).unwrap();
        assert_eq!(doc.symbol(x), Some("new"));
        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.symbol(x), Some("old"));
        cmd.redo(&mut doc).unwrap();
        assert_eq!(doc.symbol(x), Some("new"));
    }

    #[test]
    fn test_delete_items_filters_descendants() {
        let mut doc = Document::new();
        let root = doc.root();
        let c = doc.create_diagram("C");
        let x = doc.create_object("x");
        let y = doc.create_object("y");
        doc.add_object(root, c).unwrap();
        doc.add_object(c, x).unwrap();
        doc.add_object(root, y).unwrap();

        let deletion = DeleteItems::new(&doc, &[x, c, y, c]);
        assert_eq!(deletion.items, vec![c, y]);
    }

    #[test]
    fn test_remove_member_restores_endpoints() {
        let mut doc = Document::new();
        let root = doc.root();
        let x = doc.create_object("x");
        let f = doc.create_morphism("f");
        doc.add_object(root, x).unwrap();
        doc.set_domain(f, Some(x)).unwrap();

        let mut cmd = Command::remove_member("remove x", root, x);
        cmd.redo(&mut doc).unwrap();
        assert_eq!(doc.endpoint(f, End::Domain), None);
        cmd.undo(&mut doc).unwrap();
        assert_eq!(doc.endpoint(f, End::Domain), Some(x));
        assert_eq!(doc.parent(x), Some(root));
    }

    #[test]
    fn test_commands_serialize() {
        let x = Uid::new();
        let cmd = Command::composite("outer").with_subcommand(Command::take_functor_image("take", x));
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
        assert_eq!(back.subcommands()[0].label(), "take");
    }
}
