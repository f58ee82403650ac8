// Copyright 2025 Cowboy AI, LLC.

//! The document arena
//!
//! A [`Document`] owns every entity of one editing session in a flat table
//! keyed by [`Uid`], together with the event bus that keeps functor images
//! in sync. Structural edits never drop entities: removing an object from a
//! diagram only detaches it, so commands can keep referring to it by uid
//! across any number of undo/redo cycles.
//!
//! The graph operations themselves live next to the concepts they belong
//! to ([`crate::category::diagram`], [`crate::category::morphism`],
//! [`crate::category::functor`]) as further `impl Document` blocks.

use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, trace};

use crate::config::{EditorConfig, ImageNaming};
use crate::entity::{Entity, EntityKind, FunctorFlavor};
use crate::errors::{DiagramError, DiagramResult};
use crate::events::{DiagramEvent, DiagramListener, EventBus};
use crate::identifiers::{Position, Uid};

/// Arena of entities plus the observers wired between them
pub struct Document {
    pub(crate) entities: IndexMap<Uid, Entity>,
    pub(crate) bus: EventBus,
    listeners: Vec<Box<dyn DiagramListener>>,
    root: Uid,
    pub(crate) naming: ImageNaming,
    reflect_graphics: bool,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root)
            .field("entities", &self.entities.len())
            .field("subscriptions", &self.bus.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document holding only an empty root diagram
    pub fn new() -> Self {
        Self::with_config(&EditorConfig::default())
    }

    /// A document using the naming and graphics defaults of `config`
    pub fn with_config(config: &EditorConfig) -> Self {
        let root = Entity::diagram("root");
        Self::with_root(root, config.image_naming, config.reflect_graphics)
    }

    pub(crate) fn with_root(root: Entity, naming: ImageNaming, reflect_graphics: bool) -> Self {
        let root_uid = root.uid;
        let mut entities = IndexMap::new();
        entities.insert(root_uid, root);
        Self {
            entities,
            bus: EventBus::new(),
            listeners: Vec::new(),
            root: root_uid,
            naming,
            reflect_graphics,
        }
    }

    /// Uid of the top-level diagram
    pub fn root(&self) -> Uid {
        self.root
    }

    /// Naming rule used for functor images
    pub fn image_naming(&self) -> ImageNaming {
        self.naming
    }

    /// Change the naming rule; existing images keep their labels until their source changes
    pub fn set_image_naming(&mut self, naming: ImageNaming) {
        self.naming = naming;
    }

    /// Register an external observer
    pub fn add_listener(&mut self, listener: Box<dyn DiagramListener>) {
        self.listeners.push(listener);
    }

    /// Read-only view of the observer registry
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Insert a detached entity into the arena and return its uid
    ///
    /// Inserting a uid that is already present leaves the stored entity untouched.
    pub fn insert(&mut self, entity: Entity) -> Uid {
        let uid = entity.uid;
        if self.entities.contains_key(&uid) {
            debug!(%uid, "entity already in arena");
        } else {
            self.entities.insert(uid, entity);
        }
        uid
    }

    /// Create a detached object
    pub fn create_object(&mut self, symbol: impl Into<String>) -> Uid {
        self.insert(Entity::object(symbol))
    }

    /// Create a detached object at `position`
    pub fn create_object_at(&mut self, symbol: impl Into<String>, position: Position) -> Uid {
        self.insert(Entity::object(symbol).at(position))
    }

    /// Create a detached, unattached morphism
    pub fn create_morphism(&mut self, symbol: impl Into<String>) -> Uid {
        self.insert(Entity::morphism(symbol))
    }

    /// Create an empty detached diagram
    pub fn create_diagram(&mut self, symbol: impl Into<String>) -> Uid {
        self.insert(Entity::diagram(symbol))
    }

    /// Create a detached functor with the document's graphics default
    pub fn create_functor(&mut self, symbol: impl Into<String>) -> Uid {
        let reflect = self.reflect_graphics;
        self.insert(Entity::functor(symbol, FunctorFlavor::Plain, reflect))
    }

    /// Create a detached opposite-category functor labelled `op`
    pub fn create_op_functor(&mut self) -> Uid {
        let reflect = self.reflect_graphics;
        self.insert(Entity::functor("op", FunctorFlavor::Opposite, reflect))
    }

    /// Look up any entity
    pub fn entity(&self, uid: Uid) -> Option<&Entity> {
        self.entities.get(&uid)
    }

    pub(crate) fn entity_mut(&mut self, uid: Uid) -> Option<&mut Entity> {
        self.entities.get_mut(&uid)
    }

    /// True if the arena holds `uid`
    pub fn contains(&self, uid: Uid) -> bool {
        self.entities.contains_key(&uid)
    }

    /// Kind of `uid`, if present
    pub fn kind(&self, uid: Uid) -> Option<EntityKind> {
        self.entities.get(&uid).map(Entity::kind)
    }

    /// Label of `uid`, if present
    pub fn symbol(&self, uid: Uid) -> Option<&str> {
        self.entities.get(&uid).map(|e| e.symbol.as_str())
    }

    /// Containing diagram of `uid`
    pub fn parent(&self, uid: Uid) -> Option<Uid> {
        self.entities.get(&uid).and_then(|e| e.parent)
    }

    /// Position of a node
    pub fn position(&self, uid: Uid) -> Option<Position> {
        self.entities.get(&uid).and_then(Entity::position)
    }

    /// Number of entities in the arena, attached or not
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if only the root exists
    pub fn is_empty(&self) -> bool {
        self.entities.len() <= 1
    }

    /// Every entity in insertion order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub(crate) fn require(&self, uid: Uid) -> DiagramResult<&Entity> {
        self.entities
            .get(&uid)
            .ok_or(DiagramError::EntityNotFound { uid })
    }

    pub(crate) fn require_mut(&mut self, uid: Uid) -> DiagramResult<&mut Entity> {
        self.entities
            .get_mut(&uid)
            .ok_or(DiagramError::EntityNotFound { uid })
    }

    pub(crate) fn wrong_kind(&self, uid: Uid, expected: &'static str) -> DiagramError {
        match self.kind(uid) {
            Some(actual) => DiagramError::WrongKind {
                uid,
                expected,
                actual,
            },
            None => DiagramError::EntityNotFound { uid },
        }
    }

    /// Ancestors of `uid`, nearest first
    pub fn ancestors(&self, uid: Uid) -> Vec<Uid> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.parent(uid);
        while let Some(p) = current {
            if !seen.insert(p) {
                break;
            }
            chain.push(p);
            current = self.parent(p);
        }
        chain
    }

    /// True if `uid` is `root` or sits (transitively) inside it
    pub fn is_reachable(&self, uid: Uid) -> bool {
        uid == self.root || self.ancestors(uid).contains(&self.root)
    }

    /// Raise `event`: external listeners first, then functor reactions
    pub(crate) fn emit(&mut self, event: DiagramEvent) {
        trace!(?event, "dispatching diagram event");
        for listener in self.listeners.iter_mut() {
            listener.on_event(&event);
        }
        let matched = self.bus.matching(event.source(), event.signal());
        for (id, reaction) in matched {
            // an earlier reaction of this dispatch may have torn this one down
            if !self.bus.is_live(id) {
                continue;
            }
            self.react(reaction, &event);
        }
    }

    /// Change the label of any entity
    pub fn set_symbol(&mut self, uid: Uid, symbol: impl Into<String>) -> DiagramResult<()> {
        let symbol = symbol.into();
        let entity = self.require_mut(uid)?;
        if entity.symbol == symbol {
            return Ok(());
        }
        entity.symbol = symbol.clone();
        debug!(%uid, %symbol, "symbol changed");
        self.emit(DiagramEvent::SymbolChanged {
            entity: uid,
            symbol,
        });
        Ok(())
    }

    /// Mark an entity as driven by a functor (or not)
    pub fn set_editable(&mut self, uid: Uid, editable: bool) -> DiagramResult<()> {
        self.require_mut(uid)?.editable = editable;
        Ok(())
    }

    /// Move a node to an absolute position
    pub fn set_position(&mut self, uid: Uid, position: Position) -> DiagramResult<()> {
        let current = self
            .position(uid)
            .ok_or_else(|| self.wrong_kind(uid, "object or diagram"))?;
        self.move_by(uid, position - current)
    }

    /// Move a node by `delta`
    pub fn move_by(&mut self, uid: Uid, delta: Position) -> DiagramResult<()> {
        if self.position(uid).is_none() {
            return Err(self.wrong_kind(uid, "object or diagram"));
        }
        if delta.is_zero() {
            return Ok(());
        }
        let Some(node) = self.entities.get_mut(&uid).and_then(Entity::node_mut) else {
            return Ok(());
        };
        node.position += delta;
        let position = node.position;
        self.emit(DiagramEvent::PositionChanged {
            entity: uid,
            position,
        });
        self.emit(DiagramEvent::PositionChangedDelta { entity: uid, delta });
        Ok(())
    }

    /// Comparable summary of everything reachable from the root
    ///
    /// Two documents with equal summaries hold the same uids with the same
    /// symbols, membership, endpoints and functor mappings.
    pub fn structural_state(&self) -> BTreeMap<Uid, EntityState> {
        self.entities
            .values()
            .filter(|e| self.is_reachable(e.uid))
            .map(|e| (e.uid, EntityState::of(e)))
            .collect()
    }

    /// Drop entities that are neither reachable from the root nor held by a
    /// functor's mapping or memo
    ///
    /// Command history that names a purged uid can no longer be replayed.
    pub fn purge_detached(&mut self) -> Vec<Uid> {
        let mut keep: HashSet<Uid> = HashSet::new();
        for entity in self.entities.values() {
            if self.is_reachable(entity.uid) {
                keep.insert(entity.uid);
            }
        }
        let held: Vec<Uid> = self
            .entities
            .values()
            .filter(|e| keep.contains(&e.uid))
            .filter_map(|e| e.functor_data())
            .flat_map(|f| f.mapping.iter().chain(f.memo.iter()))
            .flat_map(|(x, y)| [*x, *y])
            .collect();
        keep.extend(held);

        let purged: Vec<Uid> = self
            .entities
            .keys()
            .filter(|uid| !keep.contains(uid))
            .copied()
            .collect();
        for uid in &purged {
            self.entities.shift_remove(uid);
            let stale: Vec<_> = self
                .bus
                .subscriptions_for(*uid)
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            for id in stale {
                self.bus.unsubscribe(id);
            }
        }
        for entity in self.entities.values_mut() {
            if let Some(node) = entity.node_mut() {
                node.arrows.retain(|a| keep.contains(a));
            }
        }
        debug!(count = purged.len(), "purged detached entities");
        purged
    }
}

/// Structural summary of one entity, see [`Document::structural_state`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    /// Kind tag
    pub kind: EntityKind,
    /// Label
    pub symbol: String,
    /// Containing diagram
    pub parent: Option<Uid>,
    /// Arrow domain
    pub domain: Option<Uid>,
    /// Arrow codomain
    pub codomain: Option<Uid>,
    /// Diagram members
    pub members: BTreeSet<Uid>,
    /// Functor mapping
    pub mapping: BTreeMap<Uid, Uid>,
    /// Functor variance
    pub contravariant: bool,
}

impl EntityState {
    fn of(entity: &Entity) -> Self {
        let arrow = entity.arrow();
        let members = entity
            .diagram_data()
            .map(|d| d.objects.iter().chain(d.morphisms.iter()).copied().collect())
            .unwrap_or_default();
        let (mapping, contravariant) = entity
            .functor_data()
            .map(|f| (f.mapping.iter().map(|(x, y)| (*x, *y)).collect(), f.contravariant))
            .unwrap_or_default();
        Self {
            kind: entity.kind(),
            symbol: entity.symbol.clone(),
            parent: entity.parent,
            domain: arrow.and_then(|a| a.domain),
            codomain: arrow.and_then(|a| a.codomain),
            members,
            mapping,
            contravariant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<DiagramEvent>>>);

    impl DiagramListener for Recorder {
        fn on_event(&mut self, event: &DiagramEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn test_new_document_has_root_only() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.kind(doc.root()), Some(EntityKind::Diagram));
        assert!(doc.is_reachable(doc.root()));
    }

    #[test]
    fn test_insert_is_idempotent_by_uid() {
        let mut doc = Document::new();
        let entity = Entity::object("x");
        let uid = entity.uid;
        let mut duplicate = entity.clone();
        duplicate.symbol = "other".to_string();

        doc.insert(entity);
        doc.insert(duplicate);
        assert_eq!(doc.symbol(uid), Some("x"));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_symbol_and_position_notifications() {
        let mut doc = Document::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        doc.add_listener(Box::new(Recorder(log.clone())));

        let x = doc.create_object_at("x", Position::new(1.0, 1.0));
        doc.set_symbol(x, "y").unwrap();
        doc.set_symbol(x, "y").unwrap();
        doc.set_position(x, Position::new(4.0, 5.0)).unwrap();

        let events = log.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            DiagramEvent::SymbolChanged {
                entity: x,
                symbol: "y".into()
            }
        );
        assert_eq!(
            events[2],
            DiagramEvent::PositionChangedDelta {
                entity: x,
                delta: Position::new(3.0, 4.0)
            }
        );
    }

    #[test]
    fn test_position_on_arrow_is_wrong_kind() {
        let mut doc = Document::new();
        let f = doc.create_morphism("f");
        let err = doc.move_by(f, Position::new(1.0, 0.0)).unwrap_err();
        assert!(matches!(err, DiagramError::WrongKind { .. }));
        let err = doc.set_symbol(Uid::new(), "nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_purge_drops_unreachable_entities() {
        let mut doc = Document::new();
        let root = doc.root();
        let kept = doc.create_object("kept");
        let dropped = doc.create_object("dropped");
        doc.add_object(root, kept).unwrap();

        let purged = doc.purge_detached();
        assert_eq!(purged, vec![dropped]);
        assert!(doc.contains(kept));
        assert!(!doc.contains(dropped));
    }
}
