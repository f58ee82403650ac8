// Copyright 2025 Cowboy AI, LLC.

//! Diagram membership, deletion and arrow composition
//!
//! A diagram owns the membership of its children; children only keep a
//! `parent` back reference. Removing a child detaches it but leaves it in
//! the arena so it can be re-added under the same uid.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::functor::ImageDelta;
use crate::document::Document;
use crate::entity::{Entity, EntityKind, FunctorState};
use crate::errors::{DiagramError, DiagramResult};
use crate::events::DiagramEvent;
use crate::identifiers::{End, Uid};

/// An arrow endpoint that was cleared because its object went away
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detachment {
    /// Arrow whose endpoint was cleared
    pub morphism: Uid,
    /// Which endpoint
    pub end: End,
    /// Object it pointed to
    pub object: Uid,
    /// Image the arrow held before, when the arrow is a functor
    pub image: Option<ImageDelta>,
}

/// Everything [`Document::undelete`] needs to put an entity back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionSnapshot {
    /// The deleted entity
    pub entity: Uid,
    /// Diagram it was a member of
    pub parent: Option<Uid>,
    /// Its own endpoints, when it is an arrow
    pub endpoints: Vec<(End, Uid)>,
    /// Arrows that pointed at it, when it is a node
    pub detached: Vec<Detachment>,
    /// Image it held, when it is a fully attached functor
    pub image: Option<ImageDelta>,
}

/// A freshly created composite `g∘f` and where it should point
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Composite {
    pub morphism: Uid,
    pub domain: Option<Uid>,
    pub codomain: Option<Uid>,
}

impl Document {
    fn diagram_ref(&self, diagram: Uid) -> DiagramResult<&crate::entity::Diagram> {
        self.require(diagram)?
            .diagram_data()
            .ok_or_else(|| self.wrong_kind(diagram, "diagram"))
    }

    fn diagram_mut(&mut self, diagram: Uid) -> DiagramResult<&mut crate::entity::Diagram> {
        if self.kind(diagram) != Some(EntityKind::Diagram) {
            return Err(self.wrong_kind(diagram, "diagram"));
        }
        self.require_mut(diagram)?
            .diagram_data_mut()
            .ok_or(DiagramError::EntityNotFound { uid: diagram })
    }

    /// True iff `diagram` has at least one object or morphism
    pub fn nonempty(&self, diagram: Uid) -> bool {
        self.entity(diagram)
            .and_then(Entity::diagram_data)
            .is_some_and(|d| d.nonempty())
    }

    /// Member objects of `diagram`, in insertion order
    pub fn objects(&self, diagram: Uid) -> Vec<Uid> {
        self.entity(diagram)
            .and_then(Entity::diagram_data)
            .map(|d| d.objects.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Member morphisms of `diagram`, in insertion order
    pub fn morphisms(&self, diagram: Uid) -> Vec<Uid> {
        self.entity(diagram)
            .and_then(Entity::diagram_data)
            .map(|d| d.morphisms.iter().copied().collect())
            .unwrap_or_default()
    }

    /// `uid` if it is a member object of `diagram`
    pub fn get_object(&self, diagram: Uid, uid: Uid) -> Option<&Entity> {
        let d = self.entity(diagram)?.diagram_data()?;
        if d.objects.contains(&uid) {
            self.entity(uid)
        } else {
            None
        }
    }

    /// `uid` if it is a member morphism of `diagram`
    pub fn get_morphism(&self, diagram: Uid, uid: Uid) -> Option<&Entity> {
        let d = self.entity(diagram)?.diagram_data()?;
        if d.morphisms.contains(&uid) {
            self.entity(uid)
        } else {
            None
        }
    }

    /// True if `uid` is a member (object or morphism) of `diagram`
    pub fn is_member(&self, diagram: Uid, uid: Uid) -> bool {
        self.get_object(diagram, uid).is_some() || self.get_morphism(diagram, uid).is_some()
    }

    /// Add an object (or nested diagram) to `diagram`
    ///
    /// Adding a present member is a no-op. An object that sits in another
    /// diagram is moved.
    pub fn add_object(&mut self, diagram: Uid, object: Uid) -> DiagramResult<()> {
        if self.diagram_ref(diagram)?.objects.contains(&object) {
            debug!(%diagram, %object, "object already a member");
            return Ok(());
        }
        let kind = self.require(object)?.kind();
        if !kind.is_object_like() {
            return Err(self.wrong_kind(object, "object or diagram"));
        }
        if object == diagram || self.ancestors(diagram).contains(&object) {
            return Err(DiagramError::invalid(format!(
                "{object} cannot be nested inside itself"
            )));
        }
        if let Some(old) = self.parent(object) {
            self.leave_parent(old, object)?;
        }

        self.diagram_mut(diagram)?.objects.insert(object);
        self.require_mut(object)?.parent = Some(diagram);
        debug!(%diagram, %object, "object added");
        self.emit(DiagramEvent::ObjectAdded { diagram, object });
        Ok(())
    }

    /// Remove an object from `diagram`, clearing every arrow endpoint that
    /// pointed at it first
    ///
    /// Returns the cleared endpoints so the removal can be reverted.
    pub fn remove_object(&mut self, diagram: Uid, object: Uid) -> DiagramResult<Vec<Detachment>> {
        if !self.diagram_ref(diagram)?.objects.contains(&object) {
            debug!(%diagram, %object, "object not a member");
            return Ok(Vec::new());
        }
        let detached = self.detach_arrows(object)?;
        self.diagram_mut(diagram)?.objects.shift_remove(&object);
        if let Some(entity) = self.entity_mut(object) {
            if entity.parent == Some(diagram) {
                entity.parent = None;
            }
        }
        debug!(%diagram, %object, detached = detached.len(), "object removed");
        self.emit(DiagramEvent::ObjectRemoved { diagram, object });
        Ok(detached)
    }

    /// Add a morphism (or functor) to `diagram`
    ///
    /// A functor that was suspended by an earlier removal resumes its
    /// observers and catches its image up with its domain.
    pub fn add_morphism(&mut self, diagram: Uid, morphism: Uid) -> DiagramResult<()> {
        if self.diagram_ref(diagram)?.morphisms.contains(&morphism) {
            debug!(%diagram, %morphism, "morphism already a member");
            return Ok(());
        }
        let kind = self.require(morphism)?.kind();
        if !kind.is_morphism_like() {
            return Err(self.wrong_kind(morphism, "morphism or functor"));
        }
        if let Some(old) = self.parent(morphism) {
            self.leave_parent(old, morphism)?;
        }

        self.diagram_mut(diagram)?.morphisms.insert(morphism);
        self.require_mut(morphism)?.parent = Some(diagram);
        debug!(%diagram, %morphism, "morphism added");
        self.emit(DiagramEvent::MorphismAdded { diagram, morphism });
        if kind == EntityKind::Functor {
            self.resume_functor(morphism)?;
        }
        Ok(())
    }

    /// Remove a morphism from `diagram`; its endpoints are kept
    ///
    /// A removed functor is suspended: its observers are disconnected but
    /// its mapping and images stay in place.
    pub fn remove_morphism(&mut self, diagram: Uid, morphism: Uid) -> DiagramResult<()> {
        if !self.diagram_ref(diagram)?.morphisms.contains(&morphism) {
            debug!(%diagram, %morphism, "morphism not a member");
            return Ok(());
        }
        if self.kind(morphism) == Some(EntityKind::Functor) {
            self.suspend_functor(morphism)?;
        }
        self.diagram_mut(diagram)?.morphisms.shift_remove(&morphism);
        if let Some(entity) = self.entity_mut(morphism) {
            if entity.parent == Some(diagram) {
                entity.parent = None;
            }
        }
        debug!(%diagram, %morphism, "morphism removed");
        self.emit(DiagramEvent::MorphismRemoved { diagram, morphism });
        Ok(())
    }

    /// Drop `member` from its old container while it moves to a new one
    fn leave_parent(&mut self, old: Uid, member: Uid) -> DiagramResult<()> {
        let Some(d) = self.entity(old).and_then(Entity::diagram_data) else {
            return Ok(());
        };
        if d.objects.contains(&member) {
            self.diagram_mut(old)?.objects.shift_remove(&member);
            self.emit(DiagramEvent::ObjectRemoved {
                diagram: old,
                object: member,
            });
        } else if d.morphisms.contains(&member) {
            self.remove_morphism(old, member)?;
        }
        Ok(())
    }

    /// Clear every arrow endpoint that references `node`
    pub(crate) fn detach_arrows(&mut self, node: Uid) -> DiagramResult<Vec<Detachment>> {
        let arrows: Vec<Uid> = self
            .entity(node)
            .and_then(Entity::node)
            .map(|n| n.arrows.iter().copied().collect())
            .unwrap_or_default();

        let mut detached = Vec::new();
        for arrow in arrows {
            for end in [End::Domain, End::Codomain] {
                if self.endpoint(arrow, end) != Some(node) {
                    continue;
                }
                let image = match self.functor_state(arrow) {
                    Some(FunctorState::FullyAttached) => Some(self.undo_take_image(arrow)?),
                    _ => None,
                };
                self.set_endpoint(arrow, end, None)?;
                detached.push(Detachment {
                    morphism: arrow,
                    end,
                    object: node,
                    image,
                });
            }
        }
        Ok(detached)
    }

    /// Put back an endpoint cleared by [`Document::detach_arrows`]
    pub(crate) fn reattach(&mut self, detachment: &Detachment) -> DiagramResult<()> {
        let Detachment {
            morphism,
            end,
            object,
            ref image,
        } = *detachment;
        if !self.contains(morphism) || !self.contains(object) {
            debug!(%morphism, %object, "skipping reattach of vanished entity");
            return Ok(());
        }
        if self.endpoint(morphism, end).is_some() {
            return Ok(());
        }
        match image {
            Some(delta) => {
                self.attach_endpoint(morphism, end, Some(object))?;
                if self.functor_state(morphism) == Some(FunctorState::FullyAttached) {
                    self.restore_image(morphism, delta)?;
                }
                Ok(())
            }
            None => self.set_endpoint(morphism, end, Some(object)),
        }
    }

    /// Pairs `(f, g)` of plain member morphisms of `diagram` with
    /// `f: X -> Y`, `g: Y -> Z` and `X` a member of `diagram`
    pub fn composable_pairs(&self, diagram: Uid) -> DiagramResult<Vec<(Uid, Uid)>> {
        let d = self.diagram_ref(diagram)?;
        let mut pairs = Vec::new();
        for x in &d.objects {
            for f in self.outgoing_morphisms(diagram, *x) {
                let Some(y) = self.endpoint(f, End::Codomain) else {
                    continue;
                };
                for g in self.outgoing_morphisms(diagram, y) {
                    if self.endpoint(g, End::Codomain).is_some() {
                        pairs.push((f, g));
                    }
                }
            }
        }
        Ok(pairs)
    }

    /// Member morphisms of `diagram` leaving `node`
    fn outgoing_morphisms(&self, diagram: Uid, node: Uid) -> Vec<Uid> {
        self.entity(node)
            .and_then(Entity::node)
            .map(|n| {
                n.arrows
                    .iter()
                    .copied()
                    .filter(|a| self.kind(*a) == Some(EntityKind::Morphism))
                    .filter(|a| self.get_morphism(diagram, *a).is_some())
                    .filter(|a| self.endpoint(*a, End::Domain) == Some(node))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Build `g∘f` for every composable pair, label it `g` followed by `f`,
    /// and add it to `diagram`
    ///
    /// The pairs are collected before anything is added, so new composites
    /// are not composed again in the same pass.
    pub fn compose_arrows(&mut self, diagram: Uid) -> DiagramResult<Vec<Uid>> {
        let composites = self.prepare_composites(diagram)?;
        let mut created = Vec::with_capacity(composites.len());
        for composite in composites {
            self.set_endpoint(composite.morphism, End::Domain, composite.domain)?;
            self.set_endpoint(composite.morphism, End::Codomain, composite.codomain)?;
            self.add_morphism(diagram, composite.morphism)?;
            created.push(composite.morphism);
        }
        info!(%diagram, count = created.len(), "composed arrows");
        Ok(created)
    }

    /// Create one detached, unattached composite per composable pair
    ///
    /// Attaching and adding are left to the caller so an editor can record them.
    pub(crate) fn prepare_composites(&mut self, diagram: Uid) -> DiagramResult<Vec<Composite>> {
        let pairs = self.composable_pairs(diagram)?;
        let mut composites = Vec::with_capacity(pairs.len());
        for (f, g) in pairs {
            let label = format!(
                "{}{}",
                self.symbol(g).unwrap_or_default(),
                self.symbol(f).unwrap_or_default()
            );
            composites.push(Composite {
                domain: self.endpoint(f, End::Domain),
                codomain: self.endpoint(g, End::Codomain),
                morphism: self.create_morphism(label),
            });
        }
        Ok(composites)
    }

    /// Delete an entity: detach it from everything, notify observers, and
    /// drop it from its diagram
    ///
    /// The entity stays in the arena; the returned snapshot restores it.
    pub fn delete(&mut self, uid: Uid) -> DiagramResult<DeletionSnapshot> {
        let entity = self.require(uid)?;
        let kind = entity.kind();
        let parent = entity.parent;
        let mut snapshot = DeletionSnapshot {
            entity: uid,
            parent,
            endpoints: Vec::new(),
            detached: Vec::new(),
            image: None,
        };

        if self.functor_state(uid) == Some(FunctorState::FullyAttached) {
            snapshot.image = Some(self.undo_take_image(uid)?);
        }
        if kind.is_morphism_like() {
            for end in [End::Domain, End::Codomain] {
                if let Some(target) = self.endpoint(uid, end) {
                    snapshot.endpoints.push((end, target));
                    self.attach_endpoint(uid, end, None)?;
                }
            }
        } else {
            snapshot.detached = self.detach_arrows(uid)?;
        }

        self.emit(DiagramEvent::Deleted { entity: uid });

        if let Some(p) = parent {
            if kind.is_object_like() {
                self.remove_object(p, uid)?;
            } else {
                self.remove_morphism(p, uid)?;
            }
        }
        info!(%uid, %kind, "entity deleted");
        Ok(snapshot)
    }

    /// Undo a [`Document::delete`]
    pub fn undelete(&mut self, snapshot: &DeletionSnapshot) -> DiagramResult<()> {
        let uid = snapshot.entity;
        let kind = self.require(uid)?.kind();

        if let Some(p) = snapshot.parent {
            if self.contains(p) {
                if kind.is_object_like() {
                    self.add_object(p, uid)?;
                } else {
                    self.add_morphism(p, uid)?;
                }
            }
        }

        if kind == EntityKind::Functor {
            for (end, target) in &snapshot.endpoints {
                self.attach_endpoint(uid, *end, Some(*target))?;
            }
            if self.functor_state(uid) == Some(FunctorState::FullyAttached) {
                match &snapshot.image {
                    Some(delta) => self.restore_image(uid, delta)?,
                    None => {
                        self.take_image(uid)?;
                    }
                }
            }
        } else {
            for (end, target) in &snapshot.endpoints {
                self.set_endpoint(uid, *end, Some(*target))?;
            }
        }

        for detachment in &snapshot.detached {
            self.reattach(detachment)?;
        }

        self.emit(DiagramEvent::Undeleted { entity: uid });
        info!(%uid, %kind, "entity restored");
        Ok(())
    }
}
