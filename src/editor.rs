// Copyright 2025 Cowboy AI, LLC.

//! Undoable editing front end
//!
//! [`Editor`] owns a [`Document`] and its [`UndoStack`] and offers one
//! undoable method per inbound editing call. Each method validates its
//! arguments before anything is pushed, so a rejected call leaves both the
//! document and the history untouched.

use std::path::Path;
use tracing::{debug, info};

use crate::commands::{Command, Operation};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::entity::{EntityKind, FunctorFlavor, FunctorState, MorphismFlag};
use crate::errors::{DiagramError, DiagramResult};
use crate::identifiers::{End, Position, Uid};
use crate::persistence;
use crate::undo_stack::UndoStack;

/// A document, its history and its settings
#[derive(Debug)]
pub struct Editor {
    document: Document,
    undo_stack: UndoStack,
    config: EditorConfig,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    /// An editor over an empty document
    pub fn new(config: EditorConfig) -> Self {
        Self {
            document: Document::with_config(&config),
            undo_stack: UndoStack::with_limit(config.undo_limit),
            config,
        }
    }

    /// An editor over an existing document, with an empty history
    pub fn with_document(document: Document, config: EditorConfig) -> Self {
        Self {
            document,
            undo_stack: UndoStack::with_limit(config.undo_limit),
            config,
        }
    }

    /// The document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access to the document; changes made here are not undoable
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// The history
    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo_stack
    }

    /// The settings
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Top-level diagram
    pub fn root(&self) -> Uid {
        self.document.root()
    }

    /// Execute and record an arbitrary command
    pub fn push(&mut self, command: Command) -> DiagramResult<()> {
        self.undo_stack.push(&mut self.document, command)
    }

    /// Revert the last command
    pub fn undo(&mut self) -> DiagramResult<bool> {
        self.undo_stack.undo(&mut self.document)
    }

    /// Re-apply the last undone command
    pub fn redo(&mut self) -> DiagramResult<bool> {
        self.undo_stack.redo(&mut self.document)
    }

    fn label_of(&self, uid: Uid) -> String {
        self.document.symbol(uid).unwrap_or_default().to_string()
    }

    fn check_kind(&self, uid: Uid, expected: &'static str, ok: impl Fn(EntityKind) -> bool) -> DiagramResult<EntityKind> {
        let kind = self.document.require(uid)?.kind();
        if ok(kind) {
            Ok(kind)
        } else {
            Err(self.document.wrong_kind(uid, expected))
        }
    }

    /// New detached object with the default label
    pub fn new_object(&mut self) -> Uid {
        let symbol = self.config.default_object_symbol.clone();
        self.document.create_object(symbol)
    }

    /// New detached morphism with the default label
    pub fn new_morphism(&mut self) -> Uid {
        let symbol = self.config.default_morphism_symbol.clone();
        self.document.create_morphism(symbol)
    }

    /// New empty diagram with the default label
    pub fn new_diagram(&mut self) -> Uid {
        let symbol = self.config.default_diagram_symbol.clone();
        self.document.create_diagram(symbol)
    }

    /// New detached functor with the default label
    pub fn new_functor(&mut self) -> Uid {
        let symbol = self.config.default_functor_symbol.clone();
        self.document.create_functor(symbol)
    }

    /// New detached opposite-category functor
    pub fn new_op_functor(&mut self) -> Uid {
        self.document.create_op_functor()
    }

    /// Undoable [`Document::add_object`]
    pub fn add_object(&mut self, diagram: Uid, object: Uid) -> DiagramResult<()> {
        self.check_kind(diagram, "diagram", |k| k == EntityKind::Diagram)?;
        self.check_kind(object, "object or diagram", |k| k.is_object_like())?;
        let label = format!(
            "Adding object {} to category {}",
            self.label_of(object),
            self.label_of(diagram)
        );
        self.push(Command::method_call(
            label,
            Operation::AddObject { diagram, object },
            Operation::RemoveObject { diagram, object },
        ))
    }

    /// Undoable [`Document::remove_object`]; undo also restores cleared endpoints
    pub fn remove_object(&mut self, diagram: Uid, object: Uid) -> DiagramResult<()> {
        self.check_kind(diagram, "diagram", |k| k == EntityKind::Diagram)?;
        let label = format!(
            "Removing object {} from category {}",
            self.label_of(object),
            self.label_of(diagram)
        );
        self.push(Command::remove_member(label, diagram, object))
    }

    /// Undoable [`Document::add_morphism`]
    pub fn add_morphism(&mut self, diagram: Uid, morphism: Uid) -> DiagramResult<()> {
        self.check_kind(diagram, "diagram", |k| k == EntityKind::Diagram)?;
        self.check_kind(morphism, "morphism or functor", |k| k.is_morphism_like())?;
        let label = format!(
            "Adding morphism {} to category {}",
            self.label_of(morphism),
            self.label_of(diagram)
        );
        self.push(Command::method_call(
            label,
            Operation::AddMorphism { diagram, morphism },
            Operation::RemoveMorphism { diagram, morphism },
        ))
    }

    /// Undoable [`Document::remove_morphism`]
    pub fn remove_morphism(&mut self, diagram: Uid, morphism: Uid) -> DiagramResult<()> {
        self.check_kind(diagram, "diagram", |k| k == EntityKind::Diagram)?;
        let label = format!(
            "Removing morphism {} from category {}",
            self.label_of(morphism),
            self.label_of(diagram)
        );
        self.push(Command::remove_member(label, diagram, morphism))
    }

    /// Undoable domain change
    pub fn set_domain(&mut self, arrow: Uid, target: Option<Uid>) -> DiagramResult<()> {
        self.set_endpoint(arrow, End::Domain, target)
    }

    /// Undoable codomain change
    pub fn set_codomain(&mut self, arrow: Uid, target: Option<Uid>) -> DiagramResult<()> {
        self.set_endpoint(arrow, End::Codomain, target)
    }

    /// Undoable endpoint change
    ///
    /// For a functor the step is split into retracting the old image,
    /// attaching the endpoint, and taking the new image, so each part can
    /// be reverted with the uids it produced.
    pub fn set_endpoint(&mut self, arrow: Uid, end: End, target: Option<Uid>) -> DiagramResult<()> {
        let kind = self.check_kind(arrow, "morphism or functor", |k| k.is_morphism_like())?;
        if let Some(t) = target {
            match kind {
                EntityKind::Functor => {
                    self.check_kind(t, "diagram", |k| k == EntityKind::Diagram)?;
                }
                _ => {
                    self.check_kind(t, "object or diagram", |k| k.is_object_like())?;
                }
            }
        }
        let old = self.document.endpoint(arrow, end);
        if old == target {
            return Ok(());
        }
        let label = match target {
            Some(t) => format!("Set {end} of {} to {}", self.label_of(arrow), self.label_of(t)),
            None => format!("Clear {end} of {}", self.label_of(arrow)),
        };
        let command = match kind {
            EntityKind::Functor => self.functor_endpoint_command(label, arrow, end, old, target),
            _ => Command::method_call(
                label,
                Operation::SetEndpoint {
                    morphism: arrow,
                    end,
                    target,
                },
                Operation::SetEndpoint {
                    morphism: arrow,
                    end,
                    target: old,
                },
            ),
        };
        self.push(command)
    }

    fn functor_endpoint_command(
        &self,
        label: String,
        functor: Uid,
        end: End,
        old: Option<Uid>,
        target: Option<Uid>,
    ) -> Command {
        let doc = &self.document;
        let name = self.label_of(functor);
        let mut command = Command::composite(label);

        if target.is_none() || doc.functor_state(functor) == Some(FunctorState::FullyAttached) {
            command.add_subcommand(Command::undo_functor_image(
                format!("Undo taking the functor image of {name}"),
                functor,
            ));
        }
        command.add_subcommand(Command::method_call(
            format!("Attach {end} of {name}"),
            Operation::AttachEndpoint {
                morphism: functor,
                end,
                target,
            },
            Operation::AttachEndpoint {
                morphism: functor,
                end,
                target: old,
            },
        ));
        command.add_subcommand(Command::take_functor_image(
            format!("Take the functor image of {name}"),
            functor,
        ));

        let (domain, codomain) = match end {
            End::Domain => (target, doc.endpoint(functor, End::Codomain)),
            End::Codomain => (doc.endpoint(functor, End::Domain), target),
        };
        let opposite = doc
            .functor(functor)
            .is_some_and(|f| f.flavor == FunctorFlavor::Opposite);
        if let (true, Some(domain), Some(codomain)) = (opposite, domain, codomain) {
            let renamed = doc.image_string(functor, domain);
            command.add_subcommand(Command::method_call(
                format!("Rename {} to {renamed}", self.label_of(codomain)),
                Operation::SetSymbol {
                    entity: codomain,
                    symbol: renamed,
                },
                Operation::SetSymbol {
                    entity: codomain,
                    symbol: self.label_of(codomain),
                },
            ));
        }
        command
    }

    /// Undoable [`Document::set_contravariant`]
    pub fn set_contravariant(&mut self, functor: Uid, contravariant: bool) -> DiagramResult<()> {
        self.check_kind(functor, "functor", |k| k == EntityKind::Functor)?;
        let current = self
            .document
            .functor(functor)
            .map(|f| f.contravariant)
            .unwrap_or_default();
        if current == contravariant {
            return Ok(());
        }
        let name = self.label_of(functor);
        let label = if contravariant {
            format!("Let functor {name} be contravariant")
        } else {
            format!("Let functor {name} be covariant")
        };
        self.push(Command::method_call(
            label,
            Operation::SetContravariant {
                functor,
                contravariant,
            },
            Operation::SetContravariant {
                functor,
                contravariant: current,
            },
        ))
    }

    /// Undoable [`Document::set_reflect_graphics`]
    pub fn set_reflect_graphics(&mut self, functor: Uid, reflect: bool) -> DiagramResult<()> {
        self.check_kind(functor, "functor", |k| k == EntityKind::Functor)?;
        let current = self
            .document
            .functor(functor)
            .map(|f| f.reflect_graphics)
            .unwrap_or_default();
        self.push(Command::method_call(
            format!("Reflect graphics of {}: {reflect}", self.label_of(functor)),
            Operation::SetReflectGraphics { functor, reflect },
            Operation::SetReflectGraphics {
                functor,
                reflect: current,
            },
        ))
    }

    /// Undoable relabel
    pub fn set_symbol(&mut self, uid: Uid, symbol: impl Into<String>) -> DiagramResult<()> {
        let old = self.document.require(uid)?.symbol.clone();
        let symbol = symbol.into();
        if old == symbol {
            return Ok(());
        }
        self.push(Command::method_call(
            format!("Rename {old} to {symbol}"),
            Operation::SetSymbol {
                entity: uid,
                symbol,
            },
            Operation::SetSymbol {
                entity: uid,
                symbol: old,
            },
        ))
    }

    /// Undoable move to an absolute position
    pub fn set_position(&mut self, uid: Uid, position: Position) -> DiagramResult<()> {
        let old = self
            .document
            .position(uid)
            .ok_or_else(|| self.document.wrong_kind(uid, "object or diagram"))?;
        self.push(Command::method_call(
            format!("Move {}", self.label_of(uid)),
            Operation::SetPosition {
                entity: uid,
                position,
            },
            Operation::SetPosition {
                entity: uid,
                position: old,
            },
        ))
    }

    /// Undoable move by a displacement
    pub fn move_by(&mut self, uid: Uid, delta: Position) -> DiagramResult<()> {
        let old = self
            .document
            .position(uid)
            .ok_or_else(|| self.document.wrong_kind(uid, "object or diagram"))?;
        self.set_position(uid, old + delta)
    }

    /// Undoable marker change
    pub fn set_flag(&mut self, arrow: Uid, flag: MorphismFlag, value: bool) -> DiagramResult<()> {
        let current = self
            .document
            .flag(arrow, flag)
            .ok_or_else(|| self.document.wrong_kind(arrow, "morphism or functor"))?;
        self.push(Command::method_call(
            format!("Set {flag:?} of {} to {value}", self.label_of(arrow)),
            Operation::SetFlag {
                morphism: arrow,
                flag,
                value,
            },
            Operation::SetFlag {
                morphism: arrow,
                flag,
                value: current,
            },
        ))
    }

    /// Undoable control point change
    pub fn set_control_points(&mut self, arrow: Uid, points: Vec<Position>) -> DiagramResult<()> {
        let old = self
            .document
            .control_points(arrow)
            .ok_or_else(|| self.document.wrong_kind(arrow, "morphism or functor"))?
            .to_vec();
        if points.len() != 2 && points.len() != 4 {
            return Err(DiagramError::invalid(format!(
                "an arrow has 2 or 4 control points, got {}",
                points.len()
            )));
        }
        self.push(Command::method_call(
            format!("Move control points of {}", self.label_of(arrow)),
            Operation::SetControlPoints {
                morphism: arrow,
                points,
            },
            Operation::SetControlPoints {
                morphism: arrow,
                points: old,
            },
        ))
    }

    /// Undoable straight/curve switch
    ///
    /// The switch runs on the document first; the recorded command only
    /// replays the resulting points.
    pub fn toggle_bezier(&mut self, arrow: Uid, bezier: bool) -> DiagramResult<()> {
        let old = self
            .document
            .control_points(arrow)
            .ok_or_else(|| self.document.wrong_kind(arrow, "morphism or functor"))?
            .to_vec();
        self.document.toggle_bezier(arrow, bezier)?;
        let new = self
            .document
            .control_points(arrow)
            .map(<[Position]>::to_vec)
            .unwrap_or_default();
        if new == old {
            return Ok(());
        }
        let label = if bezier {
            format!("Curve {}", self.label_of(arrow))
        } else {
            format!("Straighten {}", self.label_of(arrow))
        };
        self.push(
            Command::method_call(
                label,
                Operation::SetControlPoints {
                    morphism: arrow,
                    points: new,
                },
                Operation::SetControlPoints {
                    morphism: arrow,
                    points: old,
                },
            )
            .already_applied(),
        )
    }

    /// Undoable take of a functor image; false if the functor has nothing to image
    pub fn take_functor_image(&mut self, functor: Uid) -> DiagramResult<bool> {
        self.check_kind(functor, "functor", |k| k == EntityKind::Functor)?;
        if self.document.unimaged_members(functor).is_empty() {
            debug!(%functor, "nothing to image");
            return Ok(false);
        }
        let label = format!("Take the functor image {}", self.image_label(functor));
        self.push(Command::take_functor_image(label, functor))?;
        Ok(true)
    }

    /// Undoable removal of a functor's whole image; false if there is none
    pub fn undo_functor_image(&mut self, functor: Uid) -> DiagramResult<bool> {
        self.check_kind(functor, "functor", |k| k == EntityKind::Functor)?;
        let has_image = self
            .document
            .endpoint(functor, End::Codomain)
            .is_some_and(|d| self.document.nonempty(d));
        if !has_image {
            return Ok(false);
        }
        let label = format!("Undo taking the functor image {}", self.image_label(functor));
        self.push(Command::undo_functor_image(label, functor))?;
        Ok(true)
    }

    /// Undoable catch-up of a functor image with its domain
    pub fn update_functor_image(&mut self, functor: Uid) -> DiagramResult<bool> {
        self.check_kind(functor, "functor", |k| k == EntityKind::Functor)?;
        if self.document.unimaged_members(functor).is_empty() {
            debug!(%functor, "functor image is up to date");
            return Ok(false);
        }
        let label = format!("Update functor image {} of diagram", self.image_label(functor));
        self.push(Command::take_functor_image(label, functor))?;
        Ok(true)
    }

    fn image_label(&self, functor: Uid) -> String {
        let domain = self
            .document
            .endpoint(functor, End::Domain)
            .map(|c| self.label_of(c))
            .unwrap_or_default();
        format!("{}({domain})", self.label_of(functor))
    }

    /// Undoable deletion of a set of entities
    pub fn delete_items(&mut self, items: &[Uid]) -> DiagramResult<()> {
        for uid in items {
            self.document.require(*uid)?;
        }
        if items.is_empty() {
            return Ok(());
        }
        let label = match items {
            [single] => format!("Delete {}", self.label_of(*single)),
            _ => format!("Delete {} items", items.len()),
        };
        let command = Command::delete_items(label, &self.document, items);
        self.push(command)
    }

    /// Undoable [`Document::compose_arrows`]
    pub fn compose_arrows(&mut self, diagram: Uid) -> DiagramResult<Vec<Uid>> {
        self.check_kind(diagram, "diagram", |k| k == EntityKind::Diagram)?;
        let composites = self.document.prepare_composites(diagram)?;
        if composites.is_empty() {
            return Ok(Vec::new());
        }
        let mut command =
            Command::composite(format!("Compose arrows in {}", self.label_of(diagram)));
        for composite in &composites {
            let gf = composite.morphism;
            let mut adding = Command::composite(format!("Adding morphism {}", self.label_of(gf)));
            for (end, target) in [
                (End::Domain, composite.domain),
                (End::Codomain, composite.codomain),
            ] {
                adding.add_subcommand(Command::method_call(
                    format!("Set {end} of {}", self.label_of(gf)),
                    Operation::SetEndpoint {
                        morphism: gf,
                        end,
                        target,
                    },
                    Operation::SetEndpoint {
                        morphism: gf,
                        end,
                        target: None,
                    },
                ));
            }
            adding.add_subcommand(Command::method_call(
                format!("Add {} to {}", self.label_of(gf), self.label_of(diagram)),
                Operation::AddMorphism {
                    diagram,
                    morphism: gf,
                },
                Operation::RemoveMorphism {
                    diagram,
                    morphism: gf,
                },
            ));
            command.add_subcommand(adding);
        }
        self.push(command)?;
        Ok(composites.into_iter().map(|c| c.morphism).collect())
    }

    /// Drop unreachable entities; the history is cleared because it may name them
    pub fn purge_detached(&mut self) -> Vec<Uid> {
        let purged = self.document.purge_detached();
        self.undo_stack.clear();
        purged
    }

    /// Write the document as JSON and mark the history clean
    pub fn save(&mut self, path: impl AsRef<Path>) -> DiagramResult<()> {
        persistence::save(&self.document, path)?;
        self.undo_stack.set_clean();
        Ok(())
    }

    /// Open a JSON document with an empty history
    pub fn open(path: impl AsRef<Path>, config: EditorConfig) -> DiagramResult<Self> {
        let document = persistence::load(path, &config)?;
        info!(entities = document.len(), "document opened");
        let mut editor = Self::with_document(document, config);
        editor.undo_stack.set_clean();
        Ok(editor)
    }
}
