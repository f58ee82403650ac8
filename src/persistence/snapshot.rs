// Copyright 2025 Cowboy AI, LLC.

//! Serialized document shape and the two-pass loader

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::category::bindings::BindingRegistry;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::entity::{Entity, EntityKind};
use crate::errors::{DiagramError, DiagramResult};
use crate::identifiers::{End, Uid};

/// Version written by this build; newer files are refused
pub const FORMAT_VERSION: u32 = 1;

/// On-disk form of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Layout version
    pub format_version: u32,
    /// Uid of the top-level diagram
    pub root: Uid,
    /// Every entity, in arena order
    pub entities: Vec<Entity>,
}

impl Document {
    /// Capture the whole arena
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            format_version: FORMAT_VERSION,
            root: self.root(),
            entities: self.entities().cloned().collect(),
        }
    }

    /// Rebuild a document from a snapshot
    ///
    /// The first pass indexes every entity by uid. The second resolves
    /// membership, endpoints and functor tables, dropping references to uids
    /// that are missing or of the wrong kind. The last reinstalls the
    /// observers of every functor that is not suspended.
    pub fn from_snapshot(snapshot: DocumentSnapshot, config: &EditorConfig) -> DiagramResult<Self> {
        if snapshot.format_version > FORMAT_VERSION {
            return Err(DiagramError::SerializationError(format!(
                "format version {} is newer than supported version {FORMAT_VERSION}",
                snapshot.format_version
            )));
        }

        let mut table: IndexMap<Uid, Entity> = IndexMap::new();
        for entity in snapshot.entities {
            if table.contains_key(&entity.uid) {
                warn!(uid = %entity.uid, "duplicate uid in snapshot, keeping the first");
                continue;
            }
            table.insert(entity.uid, entity);
        }
        let root = table.shift_remove(&snapshot.root).ok_or_else(|| {
            DiagramError::InvariantViolation(format!("root {} missing from snapshot", snapshot.root))
        })?;
        if root.kind() != EntityKind::Diagram {
            return Err(DiagramError::InvariantViolation(format!(
                "root {} is a {}, not a diagram",
                root.uid,
                root.kind()
            )));
        }

        let mut doc = Document::with_root(root, config.image_naming, config.reflect_graphics);
        for entity in table.into_values() {
            doc.insert(entity);
        }
        repair(&mut doc);

        let functors: Vec<Uid> = doc
            .entities()
            .filter(|e| e.kind() == EntityKind::Functor)
            .map(|e| e.uid)
            .collect();
        for functor in functors {
            doc.reconnect_functor(functor)?;
        }
        debug!(entities = doc.len(), observers = doc.bus().len(), "snapshot loaded");
        Ok(doc)
    }
}

fn repair(doc: &mut Document) {
    let kinds: HashMap<Uid, EntityKind> = doc.entities().map(|e| (e.uid, e.kind())).collect();

    for entity in doc.entities.values_mut() {
        entity.parent = None;
        if let Some(node) = entity.node_mut() {
            node.arrows.clear();
        }
    }

    // membership is authoritative for parents
    let diagrams: Vec<Uid> = kinds
        .iter()
        .filter(|(_, k)| **k == EntityKind::Diagram)
        .map(|(uid, _)| *uid)
        .collect();
    let mut parents: HashMap<Uid, Uid> = HashMap::new();
    for diagram in doc
        .entities()
        .filter(|e| diagrams.contains(&e.uid))
        .map(|e| e.uid)
        .collect::<Vec<_>>()
    {
        let Some(d) = doc.entity_mut(diagram).and_then(Entity::diagram_data_mut) else {
            continue;
        };
        d.objects.retain(|uid| {
            let ok = kinds.get(uid).is_some_and(|k| k.is_object_like())
                && *uid != diagram
                && !parents.contains_key(uid);
            if ok {
                parents.insert(*uid, diagram);
            } else {
                warn!(%diagram, object = %uid, "dropping invalid object membership");
            }
            ok
        });
        d.morphisms.retain(|uid| {
            let ok = kinds.get(uid).is_some_and(|k| k.is_morphism_like())
                && !parents.contains_key(uid);
            if ok {
                parents.insert(*uid, diagram);
            } else {
                warn!(%diagram, morphism = %uid, "dropping invalid morphism membership");
            }
            ok
        });
    }
    for (child, parent) in &parents {
        if let Some(entity) = doc.entity_mut(*child) {
            entity.parent = Some(*parent);
        }
    }

    let mut back_refs: Vec<(Uid, Uid)> = Vec::new();
    for entity in doc.entities.values_mut() {
        let uid = entity.uid;
        let kind = entity.kind();
        let Some(arrow) = entity.arrow_mut() else {
            continue;
        };
        for end in [End::Domain, End::Codomain] {
            let Some(target) = arrow.endpoint(end) else {
                continue;
            };
            let valid = match (kind, kinds.get(&target)) {
                (EntityKind::Functor, Some(k)) => *k == EntityKind::Diagram,
                (_, Some(k)) => k.is_object_like(),
                (_, None) => false,
            };
            if valid {
                back_refs.push((target, uid));
            } else {
                warn!(arrow = %uid, %end, %target, "dropping dangling endpoint");
                *arrow.endpoint_mut(end) = None;
            }
        }
    }
    for (node, arrow) in back_refs {
        if let Some(n) = doc.entity_mut(node).and_then(Entity::node_mut) {
            n.arrows.insert(arrow);
        }
    }

    for entity in doc.entities.values_mut() {
        let uid = entity.uid;
        let Some(f) = entity.functor_data_mut() else {
            continue;
        };
        let before = f.mapping.len();
        f.mapping
            .retain(|x, y| kinds.contains_key(x) && kinds.contains_key(y));
        if f.mapping.len() != before {
            warn!(functor = %uid, dropped = before - f.mapping.len(), "dropping dangling mapping entries");
        }
        f.memo
            .retain(|x, y| kinds.contains_key(x) && kinds.contains_key(y));
        for (x, y) in f.mapping.iter() {
            f.memo.entry(*x).or_insert(*y);
        }
        f.bindings = BindingRegistry::default();
        f.domain_watch.clear();
        f.propagating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{load_from_str, save_to_string};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_preserves_structure() {
        let mut doc = Document::new();
        let root = doc.root();
        let x = doc.create_object("x");
        let y = doc.create_object("y");
        doc.add_object(root, x).unwrap();
        doc.add_object(root, y).unwrap();
        let f = doc.create_morphism("f");
        doc.set_domain(f, Some(x)).unwrap();
        doc.set_codomain(f, Some(y)).unwrap();
        doc.add_morphism(root, f).unwrap();

        let json = save_to_string(&doc).unwrap();
        let loaded = load_from_str(&json, &EditorConfig::default()).unwrap();
        assert_eq!(loaded.structural_state(), doc.structural_state());
        assert!(loaded.entity(x).unwrap().node().unwrap().arrows.contains(&f));
    }

    #[test]
    fn test_dangling_endpoint_is_dropped() {
        let mut doc = Document::new();
        let root = doc.root();
        let f = doc.create_morphism("f");
        doc.add_morphism(root, f).unwrap();
        let mut snapshot = doc.snapshot();
        let ghost = Uid::new();
        for entity in snapshot.entities.iter_mut() {
            if let Some(arrow) = entity.arrow_mut() {
                arrow.domain = Some(ghost);
            }
        }

        let loaded = Document::from_snapshot(snapshot, &EditorConfig::default()).unwrap();
        assert_eq!(loaded.endpoint(f, End::Domain), None);
        assert_eq!(loaded.parent(f), Some(root));
    }

    #[test]
    fn test_newer_format_is_refused() {
        let mut snapshot = Document::new().snapshot();
        snapshot.format_version = FORMAT_VERSION + 1;
        let err = Document::from_snapshot(snapshot, &EditorConfig::default()).unwrap_err();
        assert!(matches!(err, DiagramError::SerializationError(_)));
    }

    #[test]
    fn test_missing_root_is_an_invariant_violation() {
        let mut snapshot = Document::new().snapshot();
        snapshot.root = Uid::new();
        let err = Document::from_snapshot(snapshot, &EditorConfig::default()).unwrap_err();
        assert!(matches!(err, DiagramError::InvariantViolation(_)));
    }
}
