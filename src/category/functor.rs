// Copyright 2025 Cowboy AI, LLC.

//! Functor images between diagrams
//!
//! A functor `F: C -> D` keeps, for every member `x` of its domain diagram
//! `C`, an image `F(x)` inside its codomain diagram `D`. The image is a copy
//! of `x` whose label, position, arrow endpoints and shape follow `x` for as
//! long as the pair is bound.
//!
//! The functor records each image in two tables:
//!
//! - `mapping` holds the currently live `source -> image` pairs,
//! - `memo` remembers every image ever built for a source. A source that is
//!   removed and added again gets its old image (and uid) back, which keeps
//!   undo and redo symmetric.
//!
//! Observers are installed per pair and torn down by handle, so retracting
//! one image never disturbs another functor watching the same source.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

use crate::category::diagram::Detachment;
use crate::config::ImageNaming;
use crate::document::Document;
use crate::entity::{Entity, EntityData, EntityKind, Functor, FunctorFlavor, FunctorState};
use crate::errors::{DiagramError, DiagramResult};
use crate::events::{DiagramEvent, Reaction, Signal};
use crate::identifiers::{End, Uid};

/// The pairs one image operation created or removed
///
/// Pairs are ordered objects first, so replaying them in order always finds
/// an arrow's endpoint images already in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageDelta {
    /// `(source, image)` pairs
    pub pairs: Vec<(Uid, Uid)>,
    /// Arrow endpoints cleared while images were removed
    pub detached: Vec<Detachment>,
    /// Memo entries of sources without a live image, forgotten by a full undo
    #[serde(default)]
    pub remembered: Vec<(Uid, Uid)>,
}

impl ImageDelta {
    /// True if nothing was created or removed
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.detached.is_empty() && self.remembered.is_empty()
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Image uids in pair order
    pub fn images(&self) -> impl Iterator<Item = Uid> + '_ {
        self.pairs.iter().map(|(_, y)| *y)
    }
}

/// Blank copy of `data`: same payload, no endpoints, members or bookkeeping
fn blank_copy(data: &EntityData) -> EntityData {
    match data {
        EntityData::Object(node) => {
            let mut node = node.clone();
            node.arrows.clear();
            EntityData::Object(node)
        }
        EntityData::Morphism(arrow) => {
            let mut arrow = arrow.clone();
            arrow.domain = None;
            arrow.codomain = None;
            EntityData::Morphism(arrow)
        }
        EntityData::Diagram(diagram) => {
            let mut diagram = diagram.clone();
            diagram.node.arrows.clear();
            diagram.objects.clear();
            diagram.morphisms.clear();
            EntityData::Diagram(diagram)
        }
        EntityData::Functor(functor) => {
            let mut copy = Functor::new(functor.flavor, functor.reflect_graphics);
            copy.contravariant = functor.contravariant;
            copy.arrow.flags = functor.arrow.flags;
            copy.arrow.control_points = functor.arrow.control_points.clone();
            EntityData::Functor(copy)
        }
    }
}

impl Document {
    /// Functor payload of `uid`
    pub fn functor(&self, uid: Uid) -> Option<&Functor> {
        self.entity(uid).and_then(Entity::functor_data)
    }

    fn require_functor(&self, uid: Uid) -> DiagramResult<&Functor> {
        self.require(uid)?
            .functor_data()
            .ok_or_else(|| self.wrong_kind(uid, "functor"))
    }

    pub(crate) fn functor_mut(&mut self, uid: Uid) -> DiagramResult<&mut Functor> {
        if self.kind(uid) != Some(EntityKind::Functor) {
            return Err(self.wrong_kind(uid, "functor"));
        }
        self.require_mut(uid)?
            .functor_data_mut()
            .ok_or(DiagramError::EntityNotFound { uid })
    }

    /// Attachment state of a functor, `None` for anything else
    pub fn functor_state(&self, uid: Uid) -> Option<FunctorState> {
        self.functor(uid).map(Functor::state)
    }

    /// Image `functor` currently maps `source` to
    pub fn image_of(&self, functor: Uid, source: Uid) -> Option<Uid> {
        self.functor(functor).and_then(|f| f.image_of(source))
    }

    /// Label an image of `source` under `functor` gets
    pub fn image_string(&self, functor: Uid, source: Uid) -> String {
        let name = self.symbol(functor).unwrap_or_default();
        let label = self.symbol(source).unwrap_or_default();
        let flavor = self
            .functor(functor)
            .map(|f| f.flavor)
            .unwrap_or_default();
        match flavor {
            FunctorFlavor::Opposite => match self.kind(source) {
                Some(EntityKind::Object) => label.to_string(),
                _ => format!("{label}^op"),
            },
            FunctorFlavor::Plain => match name.split_once('.') {
                None => format!("{name}({label})"),
                Some((first, rest)) => match self.naming {
                    ImageNaming::FirstSegmentPrefix => format!("{first}({label})"),
                    ImageNaming::Placeholder => format!("{first}{label}{rest}"),
                },
            },
        }
    }

    /// Image every member of the domain that is not imaged yet
    ///
    /// Does nothing unless both endpoints are attached and the domain is
    /// nonempty. Returns the pairs that were created.
    pub fn take_image(&mut self, functor: Uid) -> DiagramResult<ImageDelta> {
        let delta = self.image_pass(functor)?;
        info!(%functor, created = delta.len(), "took functor image");
        Ok(delta)
    }

    /// Image whatever the domain gained since the last pass
    pub fn update_image(&mut self, functor: Uid) -> DiagramResult<ImageDelta> {
        let delta = self.image_pass(functor)?;
        debug!(%functor, created = delta.len(), "updated functor image");
        Ok(delta)
    }

    /// Domain members an image pass of `functor` would image now
    ///
    /// Empty unless the functor is fully attached and not suspended.
    pub fn unimaged_members(&self, functor: Uid) -> Vec<Uid> {
        let Some(f) = self.functor(functor) else {
            return Vec::new();
        };
        let (Some(domain), Some(_)) = (f.arrow.domain, f.arrow.codomain) else {
            return Vec::new();
        };
        if f.suspended {
            return Vec::new();
        }
        self.objects(domain)
            .into_iter()
            .chain(self.morphisms(domain))
            .filter(|x| *x != functor && !f.mapping.contains_key(x) && !f.is_image(*x))
            .collect()
    }

    fn image_pass(&mut self, functor: Uid) -> DiagramResult<ImageDelta> {
        let f = self.require_functor(functor)?;
        if f.propagating || f.suspended {
            trace!(%functor, "image pass skipped");
            return Ok(ImageDelta::default());
        }
        let (Some(domain), Some(_)) = (f.arrow.domain, f.arrow.codomain) else {
            return Ok(ImageDelta::default());
        };
        if !self.nonempty(domain) {
            return Ok(ImageDelta::default());
        }

        self.functor_mut(functor)?.propagating = true;
        let result = self.image_members(functor, domain);
        if let Ok(f) = self.functor_mut(functor) {
            f.propagating = false;
        }
        result.map(|pairs| ImageDelta {
            pairs,
            ..ImageDelta::default()
        })
    }

    fn image_members(&mut self, functor: Uid, domain: Uid) -> DiagramResult<Vec<(Uid, Uid)>> {
        let sources: Vec<Uid> = self
            .objects(domain)
            .into_iter()
            .chain(self.morphisms(domain))
            .collect();

        let mut pairs = Vec::new();
        for source in sources {
            if source == functor {
                continue;
            }
            let f = self.require_functor(functor)?;
            // an endofunctor must not image its own images
            if f.mapping.contains_key(&source) || f.is_image(source) {
                continue;
            }
            let image = self.build_image(functor, source)?;
            self.materialize(functor, source, image)?;
            pairs.push((source, image));
        }
        Ok(pairs)
    }

    /// Image entity for `source`: the memoized one if it still exists,
    /// otherwise a fresh copy
    fn build_image(&mut self, functor: Uid, source: Uid) -> DiagramResult<Uid> {
        let memoized = self.require_functor(functor)?.memo.get(&source).copied();
        if let Some(image) = memoized.filter(|y| self.contains(*y)) {
            trace!(%functor, %source, %image, "reusing memoized image");
            return Ok(image);
        }
        let label = self.image_string(functor, source);
        let image = self.copy_entity(source, Some(label))?;
        self.functor_mut(functor)?.memo.insert(source, image);
        Ok(image)
    }

    /// Detached copy of `source`; nested diagrams are copied member by member
    fn copy_entity(&mut self, source: Uid, label: Option<String>) -> DiagramResult<Uid> {
        let original = self.require(source)?;
        let copy = Entity {
            uid: Uid::new(),
            symbol: label.unwrap_or_else(|| original.symbol.clone()),
            parent: None,
            editable: original.editable,
            data: blank_copy(&original.data),
        };
        let objects = original
            .diagram_data()
            .map(|d| d.objects.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        let morphisms = original
            .diagram_data()
            .map(|d| d.morphisms.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default();
        let uid = self.insert(copy);

        let mut local: HashMap<Uid, Uid> = HashMap::new();
        for child in objects.iter().chain(morphisms.iter()) {
            let child_copy = self.copy_entity(*child, None)?;
            local.insert(*child, child_copy);
            self.require_mut(child_copy)?.parent = Some(uid);
            if let Some(d) = self.entity_mut(uid).and_then(Entity::diagram_data_mut) {
                if objects.contains(child) {
                    d.objects.insert(child_copy);
                } else {
                    d.morphisms.insert(child_copy);
                }
            }
        }
        for child in &morphisms {
            let Some(child_copy) = local.get(child).copied() else {
                continue;
            };
            for end in [End::Domain, End::Codomain] {
                let target = self
                    .endpoint(*child, end)
                    .and_then(|t| local.get(&t).copied());
                if target.is_some() {
                    self.attach_endpoint(child_copy, end, target)?;
                }
            }
        }
        Ok(uid)
    }

    /// Image of `target` usable as an image endpoint: mapped and present in the codomain
    fn image_endpoint(&self, functor: Uid, target: Uid) -> Option<Uid> {
        let f = self.functor(functor)?;
        let codomain = f.arrow.codomain?;
        let image = f.image_of(target)?;
        self.get_object(codomain, image).map(|e| e.uid)
    }

    /// Point the image arrow's endpoints at the images of the source arrow's endpoints
    fn resolve_image_arrow(&mut self, functor: Uid, source: Uid, image: Uid) -> DiagramResult<()> {
        let contravariant = self.require_functor(functor)?.contravariant;
        for end in [End::Domain, End::Codomain] {
            let target_end = if contravariant { end.opposite() } else { end };
            let resolved = self
                .endpoint(source, end)
                .and_then(|t| self.image_endpoint(functor, t));
            self.set_endpoint(image, target_end, resolved)?;
        }
        Ok(())
    }

    /// Record the pair, place the image in the codomain and bind it
    fn materialize(&mut self, functor: Uid, source: Uid, image: Uid) -> DiagramResult<()> {
        let codomain = self
            .endpoint(functor, End::Codomain)
            .ok_or_else(|| DiagramError::invalid(format!("functor {functor} has no codomain")))?;
        {
            let f = self.functor_mut(functor)?;
            f.mapping.insert(source, image);
            f.memo.insert(source, image);
        }
        self.require_mut(image)?.editable = false;
        let label = self.image_string(functor, source);
        self.set_symbol(image, label)?;

        let kind = self.require(source)?.kind();
        if kind.is_object_like() {
            self.add_object(codomain, image)?;
        } else {
            self.resolve_image_arrow(functor, source, image)?;
            self.add_morphism(codomain, image)?;
        }
        self.connect_pair(functor, source, image)?;
        trace!(%functor, %source, %image, "image materialized");
        Ok(())
    }

    /// Install the observers that keep `image` following `source`
    fn connect_pair(&mut self, functor: Uid, source: Uid, image: Uid) -> DiagramResult<()> {
        if self.require_functor(functor)?.bindings.contains(source, image) {
            return Ok(());
        }
        let kind = self.require(source)?.kind();
        let mut wanted = vec![
            (
                source,
                Signal::SymbolChanged,
                Reaction::ReflectSymbol {
                    functor,
                    source,
                    image,
                },
            ),
            (
                functor,
                Signal::SymbolChanged,
                Reaction::ReflectSymbol {
                    functor,
                    source,
                    image,
                },
            ),
            (
                source,
                Signal::Deleted,
                Reaction::DeleteImage {
                    functor,
                    source,
                    image,
                },
            ),
        ];
        if kind.is_object_like() {
            wanted.push((
                source,
                Signal::PositionChangedDelta,
                Reaction::ReflectPositionDelta { functor, image },
            ));
        } else {
            wanted.extend([
                (
                    source,
                    Signal::DomainSet,
                    Reaction::ReflectEndpoint {
                        functor,
                        image,
                        end: End::Domain,
                    },
                ),
                (
                    source,
                    Signal::CodomainSet,
                    Reaction::ReflectEndpoint {
                        functor,
                        image,
                        end: End::Codomain,
                    },
                ),
                (
                    source,
                    Signal::BezierToggled,
                    Reaction::ReflectBezier { functor, image },
                ),
                (
                    source,
                    Signal::ControlPointsChanged,
                    Reaction::ReflectControlPoints { functor, image },
                ),
            ]);
        }

        let ids: Vec<_> = wanted
            .into_iter()
            .map(|(on, signal, reaction)| self.bus.subscribe(on, signal, reaction))
            .collect();
        let f = self.functor_mut(functor)?;
        for id in ids {
            f.bindings.record(source, image, id);
        }
        Ok(())
    }

    fn disconnect_pair(&mut self, functor: Uid, source: Uid, image: Uid) -> DiagramResult<()> {
        let ids = self.functor_mut(functor)?.bindings.take(source, image);
        for id in ids {
            self.bus.unsubscribe(id);
        }
        Ok(())
    }

    fn watch_domain(&mut self, functor: Uid) -> DiagramResult<()> {
        let f = self.require_functor(functor)?;
        let Some(domain) = f.arrow.domain else {
            return Ok(());
        };
        if f.suspended || !f.domain_watch.is_empty() {
            return Ok(());
        }
        let ids = vec![
            self.bus
                .subscribe(domain, Signal::ObjectAdded, Reaction::UpdateImage { functor }),
            self.bus
                .subscribe(domain, Signal::MorphismAdded, Reaction::UpdateImage { functor }),
            self.bus
                .subscribe(domain, Signal::ObjectRemoved, Reaction::RetractImage { functor }),
            self.bus
                .subscribe(domain, Signal::MorphismRemoved, Reaction::RetractImage { functor }),
        ];
        self.functor_mut(functor)?.domain_watch = ids;
        Ok(())
    }

    fn unwatch_domain(&mut self, functor: Uid) -> DiagramResult<()> {
        let ids = std::mem::take(&mut self.functor_mut(functor)?.domain_watch);
        for id in ids {
            self.bus.unsubscribe(id);
        }
        Ok(())
    }

    /// Move the domain observers to the functor's current domain
    pub(crate) fn rewatch_domain(&mut self, functor: Uid) -> DiagramResult<()> {
        self.unwatch_domain(functor)?;
        self.watch_domain(functor)
    }

    /// Disconnect every observer of a functor that left its diagram
    pub(crate) fn suspend_functor(&mut self, functor: Uid) -> DiagramResult<()> {
        if self.require_functor(functor)?.suspended {
            return Ok(());
        }
        self.functor_mut(functor)?.suspended = true;
        self.unwatch_domain(functor)?;
        let ids = self.functor_mut(functor)?.bindings.drain();
        for id in &ids {
            self.bus.unsubscribe(*id);
        }
        debug!(%functor, observers = ids.len(), "functor suspended");
        Ok(())
    }

    /// Reconnect a suspended functor and bring its image up to date
    pub(crate) fn resume_functor(&mut self, functor: Uid) -> DiagramResult<()> {
        if !self.require_functor(functor)?.suspended {
            return Ok(());
        }
        self.functor_mut(functor)?.suspended = false;
        self.reconnect_functor(functor)?;
        debug!(%functor, "functor resumed");
        if self.functor_state(functor) == Some(FunctorState::FullyAttached) {
            self.update_image(functor)?;
        }
        Ok(())
    }

    /// Install the domain watch and the observers of every image still in the codomain
    pub(crate) fn reconnect_functor(&mut self, functor: Uid) -> DiagramResult<()> {
        self.watch_domain(functor)?;
        let f = self.require_functor(functor)?;
        if f.suspended {
            return Ok(());
        }
        let codomain = f.arrow.codomain;
        let pairs: Vec<(Uid, Uid)> = f.mapping.iter().map(|(x, y)| (*x, *y)).collect();
        for (source, image) in pairs {
            let present = codomain.is_some_and(|c| self.is_member(c, image));
            if present && self.contains(source) {
                self.connect_pair(functor, source, image)?;
            }
        }
        Ok(())
    }

    /// Drop the image of one source; the memo keeps it for later reuse
    fn retract_source(
        &mut self,
        functor: Uid,
        source: Uid,
    ) -> DiagramResult<Option<(Uid, Vec<Detachment>)>> {
        let Some(image) = self.functor_mut(functor)?.mapping.shift_remove(&source) else {
            return Ok(None);
        };
        self.disconnect_pair(functor, source, image)?;
        let mut detached = Vec::new();
        if let Some(codomain) = self.endpoint(functor, End::Codomain) {
            if self.get_object(codomain, image).is_some() {
                detached = self.remove_object(codomain, image)?;
            } else if self.get_morphism(codomain, image).is_some() {
                self.remove_morphism(codomain, image)?;
            }
        }
        trace!(%functor, %source, %image, "image retracted");
        Ok(Some((image, detached)))
    }

    /// Remove every image, disconnect every observer pair, and forget the
    /// mapping and the memo
    ///
    /// Arrow images go first so no image arrow is left pointing into a
    /// removed image object. Returns what was removed, objects first.
    pub fn undo_take_image(&mut self, functor: Uid) -> DiagramResult<ImageDelta> {
        let f = self.require_functor(functor)?;
        if f.mapping.is_empty() && f.memo.is_empty() {
            return Ok(ImageDelta::default());
        }
        let was_propagating = f.propagating;
        self.functor_mut(functor)?.propagating = true;
        let result = self.remove_all_images(functor);
        if let Ok(f) = self.functor_mut(functor) {
            f.propagating = was_propagating;
        }
        let delta = result?;
        info!(%functor, removed = delta.len(), "undid functor image");
        Ok(delta)
    }

    fn remove_all_images(&mut self, functor: Uid) -> DiagramResult<ImageDelta> {
        let pairs: Vec<(Uid, Uid)> = self
            .require_functor(functor)?
            .mapping
            .iter()
            .map(|(x, y)| (*x, *y))
            .collect();
        let (arrows, nodes): (Vec<_>, Vec<_>) = pairs
            .into_iter()
            .partition(|(x, _)| self.kind(*x).is_some_and(|k| k.is_morphism_like()));

        let mut delta = ImageDelta::default();
        {
            let f = self.require_functor(functor)?;
            delta.remembered = f
                .memo
                .iter()
                .filter(|(x, _)| !f.mapping.contains_key(*x))
                .map(|(x, y)| (*x, *y))
                .collect();
        }
        for (source, _) in arrows.iter().rev().chain(nodes.iter().rev()) {
            if let Some((_, detached)) = self.retract_source(functor, *source)? {
                delta.detached.extend(detached);
            }
        }
        delta.pairs = nodes.into_iter().chain(arrows).collect();

        let f = self.functor_mut(functor)?;
        let leftover = f.bindings.drain();
        f.mapping.clear();
        f.memo.clear();
        for id in leftover {
            self.bus.unsubscribe(id);
        }
        Ok(delta)
    }

    /// Retract exactly the images of `pairs` that are still live in the codomain
    ///
    /// The memo is kept, so a later [`Document::restore_image`] brings back
    /// the same uids.
    pub fn retract_image(&mut self, functor: Uid, pairs: &[(Uid, Uid)]) -> DiagramResult<ImageDelta> {
        let Some(codomain) = self.endpoint(functor, End::Codomain) else {
            return Ok(ImageDelta::default());
        };
        let origin: HashMap<Uid, Uid> = pairs.iter().map(|(x, y)| (*y, *x)).collect();
        let members: Vec<Uid> = self
            .morphisms(codomain)
            .into_iter()
            .chain(self.objects(codomain))
            .collect();

        let mut retracted = Vec::new();
        let mut detached = Vec::new();
        for member in members {
            let Some(source) = origin.get(&member).copied() else {
                continue;
            };
            if self.image_of(functor, source) != Some(member) {
                continue;
            }
            if let Some((image, cleared)) = self.retract_source(functor, source)? {
                retracted.push((source, image));
                detached.extend(cleared);
            }
        }
        let pairs = pairs
            .iter()
            .copied()
            .filter(|pair| retracted.contains(pair))
            .collect();
        debug!(%functor, retracted = retracted.len(), "retracted functor image");
        Ok(ImageDelta {
            pairs,
            detached,
            ..ImageDelta::default()
        })
    }

    /// Bring back images recorded in `delta` under their original uids
    ///
    /// Sources that have left the domain in the meantime are skipped.
    /// Remembered pairs go back into the memo, so a source that returns
    /// later gets its old image back.
    pub fn restore_image(&mut self, functor: Uid, delta: &ImageDelta) -> DiagramResult<()> {
        let remembered: Vec<(Uid, Uid)> = delta
            .remembered
            .iter()
            .copied()
            .filter(|(x, y)| self.contains(*x) && self.contains(*y))
            .collect();
        let f = self.functor_mut(functor)?;
        for (source, image) in remembered {
            f.memo.entry(source).or_insert(image);
        }

        let f = self.require_functor(functor)?;
        let Some(domain) = f.arrow.domain.filter(|_| f.arrow.codomain.is_some()) else {
            debug!(%functor, "restore skipped, functor not fully attached");
            return Ok(());
        };
        let was_propagating = f.propagating;
        self.functor_mut(functor)?.propagating = true;
        let result = self.restore_pairs(functor, domain, delta);
        if let Ok(f) = self.functor_mut(functor) {
            f.propagating = was_propagating;
        }
        result?;
        for detachment in &delta.detached {
            self.reattach(detachment)?;
        }
        debug!(%functor, restored = delta.len(), "restored functor image");
        Ok(())
    }

    fn restore_pairs(&mut self, functor: Uid, domain: Uid, delta: &ImageDelta) -> DiagramResult<()> {
        for (source, image) in &delta.pairs {
            if !self.contains(*source) || !self.contains(*image) {
                continue;
            }
            if !self.is_member(domain, *source) {
                continue;
            }
            if self.image_of(functor, *source).is_some() {
                continue;
            }
            self.functor_mut(functor)?.memo.insert(*source, *image);
            self.materialize(functor, *source, *image)?;
        }
        Ok(())
    }

    /// Endpoint change of a functor, driving its attachment state machine
    ///
    /// Detaching an endpoint, or re-pointing one while fully attached,
    /// removes the image first. Becoming fully attached takes a fresh image.
    pub(crate) fn set_functor_endpoint(
        &mut self,
        functor: Uid,
        end: End,
        target: Option<Uid>,
    ) -> DiagramResult<()> {
        if self.endpoint(functor, end) == target {
            return Ok(());
        }
        if let Some(t) = target {
            if self.require(t)?.kind() != EntityKind::Diagram {
                return Err(self.wrong_kind(t, "diagram"));
            }
        }
        let state = self.require_functor(functor)?.state();
        if target.is_none() || state == FunctorState::FullyAttached {
            self.undo_take_image(functor)?;
        }
        self.attach_endpoint(functor, end, target)?;
        if self.functor_state(functor) == Some(FunctorState::FullyAttached) {
            self.take_image(functor)?;
            self.rename_opposite_codomain(functor)?;
        }
        Ok(())
    }

    /// Label an opposite functor's codomain after its domain
    pub(crate) fn rename_opposite_codomain(&mut self, functor: Uid) -> DiagramResult<()> {
        let f = self.require_functor(functor)?;
        if f.flavor != FunctorFlavor::Opposite {
            return Ok(());
        }
        let (Some(domain), Some(codomain)) = (f.arrow.domain, f.arrow.codomain) else {
            return Ok(());
        };
        let label = self.image_string(functor, domain);
        self.set_symbol(codomain, label)
    }

    /// Switch variance and re-point every image arrow accordingly
    pub fn set_contravariant(&mut self, functor: Uid, contravariant: bool) -> DiagramResult<()> {
        let f = self.require_functor(functor)?;
        if f.contravariant == contravariant {
            return Ok(());
        }
        if f.flavor == FunctorFlavor::Opposite && !contravariant {
            return Err(DiagramError::invalid(
                "the opposite functor is always contravariant",
            ));
        }
        let arrows: Vec<(Uid, Uid)> = f
            .mapping
            .iter()
            .map(|(x, y)| (*x, *y))
            .filter(|(x, _)| self.kind(*x).is_some_and(|k| k.is_morphism_like()))
            .collect();
        self.functor_mut(functor)?.contravariant = contravariant;
        for (source, image) in arrows {
            if self.contains(image) {
                self.resolve_image_arrow(functor, source, image)?;
            }
        }
        info!(%functor, contravariant, "functor variance changed");
        Ok(())
    }

    /// Whether image positions and arrow shapes follow their sources
    pub fn set_reflect_graphics(&mut self, functor: Uid, reflect: bool) -> DiagramResult<()> {
        self.functor_mut(functor)?.reflect_graphics = reflect;
        Ok(())
    }

    /// Run one functor reaction; failures are logged, never propagated to the emitter
    pub(crate) fn react(&mut self, reaction: Reaction, event: &DiagramEvent) {
        if let Err(err) = self.apply_reaction(reaction, event) {
            warn!(functor = %reaction.functor(), ?reaction, %err, "functor reaction failed");
        }
    }

    fn apply_reaction(&mut self, reaction: Reaction, event: &DiagramEvent) -> DiagramResult<()> {
        let Some(f) = self.functor(reaction.functor()) else {
            return Ok(());
        };
        let (contravariant, reflect, propagating, suspended) =
            (f.contravariant, f.reflect_graphics, f.propagating, f.suspended);

        match reaction {
            Reaction::ReflectSymbol {
                functor,
                source,
                image,
            } => {
                if self.contains(image) {
                    let label = self.image_string(functor, source);
                    self.set_symbol(image, label)?;
                }
            }
            Reaction::DeleteImage {
                functor,
                source,
                image,
            } => {
                self.disconnect_pair(functor, source, image)?;
                let f = self.functor_mut(functor)?;
                if f.image_of(source) == Some(image) {
                    f.mapping.shift_remove(&source);
                }
                if self.parent(image).is_some() {
                    self.delete(image)?;
                }
            }
            Reaction::ReflectPositionDelta { image, .. } => {
                if let (true, DiagramEvent::PositionChangedDelta { delta, .. }) = (reflect, event) {
                    self.move_by(image, *delta)?;
                }
            }
            Reaction::ReflectEndpoint {
                functor,
                image,
                end,
            } => {
                let Some((_, target)) = event.endpoint() else {
                    return Ok(());
                };
                let target_end = if contravariant { end.opposite() } else { end };
                match target {
                    None => self.set_endpoint(image, target_end, None)?,
                    Some(t) => {
                        if let Some(resolved) = self.image_endpoint(functor, t) {
                            self.set_endpoint(image, target_end, Some(resolved))?;
                        }
                    }
                }
            }
            Reaction::ReflectBezier { image, .. } => {
                if let (true, DiagramEvent::BezierToggled { bezier, .. }) = (reflect, event) {
                    self.toggle_bezier(image, *bezier)?;
                }
            }
            Reaction::ReflectControlPoints { image, .. } => {
                if let (true, DiagramEvent::ControlPointsChanged { points, .. }) = (reflect, event) {
                    self.set_control_points(image, points.clone())?;
                }
            }
            Reaction::UpdateImage { functor } => {
                if !propagating && !suspended {
                    self.update_image(functor)?;
                }
            }
            Reaction::RetractImage { functor } => {
                if propagating {
                    return Ok(());
                }
                let removed = match event {
                    DiagramEvent::ObjectRemoved { object, .. } => *object,
                    DiagramEvent::MorphismRemoved { morphism, .. } => *morphism,
                    _ => return Ok(()),
                };
                self.retract_source(functor, removed)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::Position;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    struct Setup {
        doc: Document,
        c: Uid,
        d: Uid,
        functor: Uid,
    }

    fn setup() -> Setup {
        let mut doc = Document::new();
        let root = doc.root();
        let c = doc.create_diagram("C");
        let d = doc.create_diagram("D");
        doc.add_object(root, c).unwrap();
        doc.add_object(root, d).unwrap();
        let functor = doc.create_functor("F");
        doc.add_morphism(root, functor).unwrap();
        Setup { doc, c, d, functor }
    }

    fn arrow(doc: &mut Document, label: &str, from: Uid, to: Uid) -> Uid {
        let m = doc.create_morphism(label);
        doc.set_domain(m, Some(from)).unwrap();
        doc.set_codomain(m, Some(to)).unwrap();
        m
    }

    #[test_case("F", ImageNaming::FirstSegmentPrefix, "F(x)" ; "plain label")]
    #[test_case("G.H", ImageNaming::FirstSegmentPrefix, "G(x)" ; "first segment prefix")]
    #[test_case("G.H", ImageNaming::Placeholder, "GxH" ; "placeholder")]
    #[test_case("F", ImageNaming::Placeholder, "F(x)" ; "placeholder without separator")]
    fn test_image_string_naming(label: &str, naming: ImageNaming, expected: &str) {
        let Setup {
            mut doc, functor, ..
        } = setup();
        let x = doc.create_object("x");
        doc.set_symbol(functor, label).unwrap();
        doc.set_image_naming(naming);
        assert_eq!(doc.image_string(functor, x), expected);
    }

    #[test]
    fn test_opposite_image_strings() {
        let mut doc = Document::new();
        let op = doc.create_op_functor();
        let x = doc.create_object("x");
        let f = doc.create_morphism("f");
        let c = doc.create_diagram("C");
        assert_eq!(doc.image_string(op, x), "x");
        assert_eq!(doc.image_string(op, f), "f^op");
        assert_eq!(doc.image_string(op, c), "C^op");
    }

    #[test]
    fn test_full_attachment_takes_image() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let x = doc.create_object_at("x", Position::new(2.0, 3.0));
        let y = doc.create_object("y");
        doc.add_object(c, x).unwrap();
        doc.add_object(c, y).unwrap();
        let f = arrow(&mut doc, "f", x, y);
        doc.add_morphism(c, f).unwrap();

        doc.set_domain(functor, Some(c)).unwrap();
        assert_eq!(doc.functor_state(functor), Some(FunctorState::DomainOnly));
        assert!(doc.objects(d).is_empty());

        doc.set_codomain(functor, Some(d)).unwrap();
        let fx = doc.image_of(functor, x).unwrap();
        let fy = doc.image_of(functor, y).unwrap();
        let ff = doc.image_of(functor, f).unwrap();
        assert_eq!(doc.objects(d), vec![fx, fy]);
        assert_eq!(doc.morphisms(d), vec![ff]);
        assert_eq!(doc.symbol(fx), Some("F(x)"));
        assert_eq!(doc.position(fx), Some(Position::new(2.0, 3.0)));
        assert_eq!(doc.endpoint(ff, End::Domain), Some(fx));
        assert_eq!(doc.endpoint(ff, End::Codomain), Some(fy));
        assert!(!doc.entity(fx).unwrap().editable);
    }

    #[test]
    fn test_image_follows_source_changes() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let x = doc.create_object("x");
        doc.add_object(c, x).unwrap();
        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();
        let fx = doc.image_of(functor, x).unwrap();

        doc.set_symbol(x, "z").unwrap();
        assert_eq!(doc.symbol(fx), Some("F(z)"));
        doc.set_symbol(functor, "G").unwrap();
        assert_eq!(doc.symbol(fx), Some("G(z)"));
        doc.move_by(x, Position::new(1.0, -1.0)).unwrap();
        assert_eq!(doc.position(fx), Some(Position::new(1.0, -1.0)));

        doc.set_reflect_graphics(functor, false).unwrap();
        doc.move_by(x, Position::new(1.0, 0.0)).unwrap();
        assert_eq!(doc.position(fx), Some(Position::new(1.0, -1.0)));
    }

    #[test]
    fn test_domain_growth_and_shrink() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let x = doc.create_object("x");
        doc.add_object(c, x).unwrap();
        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();

        let w = doc.create_object("w");
        doc.add_object(c, w).unwrap();
        let fw = doc.image_of(functor, w).unwrap();
        assert!(doc.get_object(d, fw).is_some());

        doc.remove_object(c, w).unwrap();
        assert_eq!(doc.image_of(functor, w), None);
        assert!(doc.get_object(d, fw).is_none());

        doc.add_object(c, w).unwrap();
        assert_eq!(doc.image_of(functor, w), Some(fw));
    }

    #[test]
    fn test_undo_take_image_round_trip() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let x = doc.create_object("x");
        let y = doc.create_object("y");
        doc.add_object(c, x).unwrap();
        doc.add_object(c, y).unwrap();
        let f = arrow(&mut doc, "f", x, y);
        doc.add_morphism(c, f).unwrap();
        let before = doc.objects(d);
        let observers = doc.bus().len();

        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();
        let delta = doc.undo_take_image(functor).unwrap();

        assert_eq!(delta.len(), 3);
        assert_eq!(doc.objects(d), before);
        assert!(doc.morphisms(d).is_empty());
        assert!(doc.functor(functor).unwrap().mapping.is_empty());
        assert!(doc.functor(functor).unwrap().memo.is_empty());
        // only the domain watch is left
        assert_eq!(doc.bus().len(), observers + 4);
    }

    #[test]
    fn test_restore_image_reuses_uids() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let x = doc.create_object("x");
        doc.add_object(c, x).unwrap();
        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();
        let fx = doc.image_of(functor, x).unwrap();

        let delta = doc.undo_take_image(functor).unwrap();
        doc.restore_image(functor, &delta).unwrap();
        assert_eq!(doc.image_of(functor, x), Some(fx));
        assert_eq!(doc.objects(d), vec![fx]);

        doc.set_symbol(x, "x2").unwrap();
        assert_eq!(doc.symbol(fx), Some("F(x2)"));
    }

    #[test]
    fn test_contravariant_images_point_backwards() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let x = doc.create_object("x");
        let y = doc.create_object("y");
        doc.add_object(c, x).unwrap();
        doc.add_object(c, y).unwrap();
        let f = arrow(&mut doc, "f", x, y);
        doc.add_morphism(c, f).unwrap();
        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();
        let (fx, fy, ff) = (
            doc.image_of(functor, x).unwrap(),
            doc.image_of(functor, y).unwrap(),
            doc.image_of(functor, f).unwrap(),
        );

        doc.set_contravariant(functor, true).unwrap();
        assert_eq!(doc.endpoint(ff, End::Domain), Some(fy));
        assert_eq!(doc.endpoint(ff, End::Codomain), Some(fx));

        doc.set_domain(f, Some(y)).unwrap();
        assert_eq!(doc.endpoint(ff, End::Codomain), Some(fy));
    }

    #[test]
    fn test_source_deletion_deletes_image() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let x = doc.create_object("x");
        doc.add_object(c, x).unwrap();
        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();
        let fx = doc.image_of(functor, x).unwrap();

        let snapshot = doc.delete(x).unwrap();
        assert!(doc.objects(d).is_empty());
        assert_eq!(doc.image_of(functor, x), None);

        doc.undelete(&snapshot).unwrap();
        assert_eq!(doc.image_of(functor, x), Some(fx));
        assert_eq!(doc.objects(d), vec![fx]);
    }

    #[test]
    fn test_endofunctor_does_not_image_its_images() {
        let Setup {
            mut doc, c, functor, ..
        } = setup();
        let x = doc.create_object("x");
        doc.add_object(c, x).unwrap();
        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(c)).unwrap();

        let fx = doc.image_of(functor, x).unwrap();
        assert_eq!(doc.objects(c), vec![x, fx]);
        doc.update_image(functor).unwrap();
        assert_eq!(doc.objects(c).len(), 2);
    }

    #[test]
    fn test_suspended_functor_stops_following() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let root = doc.root();
        let x = doc.create_object("x");
        doc.add_object(c, x).unwrap();
        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();
        let fx = doc.image_of(functor, x).unwrap();

        doc.remove_morphism(root, functor).unwrap();
        doc.set_symbol(x, "renamed").unwrap();
        assert_eq!(doc.symbol(fx), Some("F(x)"));
        let w = doc.create_object("w");
        doc.add_object(c, w).unwrap();
        assert_eq!(doc.image_of(functor, w), None);

        doc.add_morphism(root, functor).unwrap();
        assert!(doc.image_of(functor, w).is_some());
        doc.set_symbol(x, "again").unwrap();
        assert_eq!(doc.symbol(fx), Some("F(again)"));
    }

    #[test]
    fn test_opposite_functor_renames_codomain() {
        let mut doc = Document::new();
        let c = doc.create_diagram("C");
        let d = doc.create_diagram("D");
        let x = doc.create_object("x");
        let y = doc.create_object("y");
        doc.add_object(c, x).unwrap();
        doc.add_object(c, y).unwrap();
        let f = arrow(&mut doc, "f", x, y);
        doc.add_morphism(c, f).unwrap();
        let op = doc.create_op_functor();

        doc.set_domain(op, Some(c)).unwrap();
        doc.set_codomain(op, Some(d)).unwrap();
        assert_eq!(doc.symbol(d), Some("C^op"));
        let ff = doc.image_of(op, f).unwrap();
        assert_eq!(doc.symbol(ff), Some("f^op"));
        assert_eq!(doc.endpoint(ff, End::Domain), doc.image_of(op, y));
        assert!(doc.set_contravariant(op, false).unwrap_err().is_invalid_operation());
    }

    #[test]
    fn test_nested_diagram_is_copied_deeply() {
        let Setup {
            mut doc,
            c,
            d,
            functor,
        } = setup();
        let inner = doc.create_diagram("E");
        let a = doc.create_object("a");
        let b = doc.create_object("b");
        doc.add_object(inner, a).unwrap();
        doc.add_object(inner, b).unwrap();
        let h = arrow(&mut doc, "h", a, b);
        doc.add_morphism(inner, h).unwrap();
        doc.add_object(c, inner).unwrap();

        doc.set_domain(functor, Some(c)).unwrap();
        doc.set_codomain(functor, Some(d)).unwrap();
        let fe = doc.image_of(functor, inner).unwrap();
        assert_eq!(doc.symbol(fe), Some("F(E)"));
        let copies = doc.objects(fe);
        assert_eq!(copies.len(), 2);
        assert!(!copies.contains(&a));
        let h_copy = doc.morphisms(fe)[0];
        assert_eq!(doc.endpoint(h_copy, End::Domain), Some(copies[0]));
        assert_eq!(doc.endpoint(h_copy, End::Codomain), Some(copies[1]));
    }

    #[test]
    fn test_functor_rejects_non_diagram_endpoint() {
        let Setup {
            mut doc, functor, ..
        } = setup();
        let x = doc.create_object("x");
        assert!(matches!(
            doc.set_domain(functor, Some(x)),
            Err(DiagramError::WrongKind { .. })
        ));
    }
}
