// Copyright 2025 Cowboy AI, LLC.

//! Arrow endpoints, connection rules and shape

use tracing::debug;

use crate::document::Document;
use crate::entity::{Entity, EntityKind, MorphismFlag};
use crate::errors::{DiagramError, DiagramResult};
use crate::events::DiagramEvent;
use crate::identifiers::{End, Position, Uid};

impl Document {
    /// Endpoint of an arrow; `None` when unattached or not an arrow
    pub fn endpoint(&self, arrow: Uid, end: End) -> Option<Uid> {
        self.entity(arrow)
            .and_then(Entity::arrow)
            .and_then(|a| a.endpoint(end))
    }

    /// Set the domain of a morphism or functor
    pub fn set_domain(&mut self, arrow: Uid, target: Option<Uid>) -> DiagramResult<()> {
        self.set_endpoint(arrow, End::Domain, target)
    }

    /// Set the codomain of a morphism or functor
    pub fn set_codomain(&mut self, arrow: Uid, target: Option<Uid>) -> DiagramResult<()> {
        self.set_endpoint(arrow, End::Codomain, target)
    }

    /// Set one endpoint
    ///
    /// For a functor this runs its attachment state machine (see
    /// [`Document::set_functor_endpoint`]); for a plain morphism it is the
    /// same as [`Document::attach_endpoint`].
    pub fn set_endpoint(&mut self, arrow: Uid, end: End, target: Option<Uid>) -> DiagramResult<()> {
        match self.require(arrow)?.kind() {
            EntityKind::Functor => self.set_functor_endpoint(arrow, end, target),
            EntityKind::Morphism => self.attach_endpoint(arrow, end, target),
            _ => Err(self.wrong_kind(arrow, "morphism or functor")),
        }
    }

    /// Point one endpoint at `target` without touching any functor image
    ///
    /// Keeps the target's arrow back references in sync and raises the
    /// matching endpoint notification. A functor's domain observers move with
    /// its domain.
    pub fn attach_endpoint(&mut self, arrow: Uid, end: End, target: Option<Uid>) -> DiagramResult<()> {
        let kind = self.require(arrow)?.kind();
        if !kind.is_morphism_like() {
            return Err(self.wrong_kind(arrow, "morphism or functor"));
        }
        if let Some(t) = target {
            let target_kind = self.require(t)?.kind();
            match kind {
                EntityKind::Functor if target_kind != EntityKind::Diagram => {
                    return Err(self.wrong_kind(t, "diagram"));
                }
                _ if !target_kind.is_object_like() => {
                    return Err(self.wrong_kind(t, "object or diagram"));
                }
                _ => {}
            }
        }

        let old = self.endpoint(arrow, end);
        if old == target {
            return Ok(());
        }
        if let Some(a) = self.entity_mut(arrow).and_then(Entity::arrow_mut) {
            *a.endpoint_mut(end) = target;
        }
        if let Some(o) = old {
            // a loop keeps its back reference while the other end still uses it
            if self.endpoint(arrow, end.opposite()) != Some(o) {
                if let Some(node) = self.entity_mut(o).and_then(Entity::node_mut) {
                    node.arrows.shift_remove(&arrow);
                }
            }
        }
        if let Some(t) = target {
            if let Some(node) = self.entity_mut(t).and_then(Entity::node_mut) {
                node.arrows.insert(arrow);
            }
        }
        if kind == EntityKind::Functor && end == End::Domain {
            self.rewatch_domain(arrow)?;
        }

        debug!(%arrow, %end, target = ?target, "endpoint set");
        self.emit(match end {
            End::Domain => DiagramEvent::DomainSet {
                morphism: arrow,
                domain: target,
            },
            End::Codomain => DiagramEvent::CodomainSet {
                morphism: arrow,
                codomain: target,
            },
        });
        Ok(())
    }

    /// Whether `candidate` is an acceptable endpoint for `arrow`
    ///
    /// A plain morphism connects to any object or diagram. A functor
    /// connects only to a diagram, and only to one in the same container as
    /// its other endpoint when that one is already attached. The mutating
    /// calls trust their caller and do not re-check this rule.
    pub fn can_connect_to(&self, arrow: Uid, candidate: Uid, end: End) -> bool {
        let (Some(kind), Some(candidate_kind)) = (self.kind(arrow), self.kind(candidate)) else {
            return false;
        };
        match kind {
            EntityKind::Morphism => candidate_kind.is_object_like(),
            EntityKind::Functor => {
                if candidate_kind != EntityKind::Diagram {
                    return false;
                }
                match self.endpoint(arrow, end.opposite()) {
                    None => true,
                    Some(other) => self.parent(other) == self.parent(candidate),
                }
            }
            _ => false,
        }
    }

    /// Set one structural marker
    pub fn set_flag(&mut self, arrow: Uid, flag: MorphismFlag, value: bool) -> DiagramResult<()> {
        let Some(a) = self.entity_mut(arrow).and_then(Entity::arrow_mut) else {
            return Err(self.wrong_kind(arrow, "morphism or functor"));
        };
        a.flags.set(flag, value);
        Ok(())
    }

    /// Read one structural marker
    pub fn flag(&self, arrow: Uid, flag: MorphismFlag) -> Option<bool> {
        self.entity(arrow)
            .and_then(Entity::arrow)
            .map(|a| a.flags.get(flag))
    }

    /// Control points of an arrow
    pub fn control_points(&self, arrow: Uid) -> Option<&[Position]> {
        self.entity(arrow)
            .and_then(Entity::arrow)
            .map(|a| a.control_points.as_slice())
    }

    /// Switch between a straight arrow and a cubic curve
    ///
    /// Going curved inserts two points at the thirds of the chord; going
    /// straight keeps the outer points.
    pub fn toggle_bezier(&mut self, arrow: Uid, bezier: bool) -> DiagramResult<()> {
        let Some(a) = self.entity_mut(arrow).and_then(Entity::arrow_mut) else {
            return Err(self.wrong_kind(arrow, "morphism or functor"));
        };
        if a.is_bezier() == bezier {
            return Ok(());
        }
        let first = a.control_points.first().copied().unwrap_or_default();
        let last = a.control_points.last().copied().unwrap_or_default();
        a.control_points = if bezier {
            let step = Position::new((last.x - first.x) / 3.0, (last.y - first.y) / 3.0);
            vec![first, first + step, last - step, last]
        } else {
            vec![first, last]
        };
        self.emit(DiagramEvent::BezierToggled {
            morphism: arrow,
            bezier,
        });
        Ok(())
    }

    /// Replace the control points: two for a straight arrow, four for a curve
    pub fn set_control_points(&mut self, arrow: Uid, points: Vec<Position>) -> DiagramResult<()> {
        if points.len() != 2 && points.len() != 4 {
            return Err(DiagramError::invalid(format!(
                "an arrow has 2 or 4 control points, got {}",
                points.len()
            )));
        }
        let Some(a) = self.entity_mut(arrow).and_then(Entity::arrow_mut) else {
            return Err(self.wrong_kind(arrow, "morphism or functor"));
        };
        if a.control_points == points {
            return Ok(());
        }
        let was_bezier = a.is_bezier();
        a.control_points = points.clone();
        let bezier = a.is_bezier();
        if was_bezier != bezier {
            self.emit(DiagramEvent::BezierToggled {
                morphism: arrow,
                bezier,
            });
        }
        self.emit(DiagramEvent::ControlPointsChanged {
            morphism: arrow,
            points,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_endpoint_back_references() {
        let mut doc = Document::new();
        let x = doc.create_object("x");
        let y = doc.create_object("y");
        let f = doc.create_morphism("f");

        doc.set_domain(f, Some(x)).unwrap();
        doc.set_codomain(f, Some(x)).unwrap();
        assert!(doc.entity(x).unwrap().node().unwrap().arrows.contains(&f));

        // the loop still uses x at its domain
        doc.set_codomain(f, Some(y)).unwrap();
        assert!(doc.entity(x).unwrap().node().unwrap().arrows.contains(&f));
        doc.set_domain(f, None).unwrap();
        assert!(!doc.entity(x).unwrap().node().unwrap().arrows.contains(&f));
        assert!(doc.entity(y).unwrap().node().unwrap().arrows.contains(&f));
    }

    #[test]
    fn test_morphism_endpoint_must_be_object_like() {
        let mut doc = Document::new();
        let f = doc.create_morphism("f");
        let g = doc.create_morphism("g");
        let c = doc.create_diagram("C");
        assert!(matches!(
            doc.set_domain(f, Some(g)),
            Err(DiagramError::WrongKind { .. })
        ));
        doc.set_domain(f, Some(c)).unwrap();
        assert_eq!(doc.endpoint(f, End::Domain), Some(c));
    }

    #[test]
    fn test_can_connect_rules() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.create_diagram("outer");
        let c = doc.create_diagram("C");
        let d = doc.create_diagram("D");
        let nested = doc.create_diagram("N");
        let x = doc.create_object("x");
        doc.add_object(root, c).unwrap();
        doc.add_object(root, d).unwrap();
        doc.add_object(root, outer).unwrap();
        doc.add_object(outer, nested).unwrap();

        let f = doc.create_morphism("f");
        assert!(doc.can_connect_to(f, x, End::Domain));
        assert!(doc.can_connect_to(f, c, End::Codomain));

        let functor = doc.create_functor("F");
        assert!(!doc.can_connect_to(functor, x, End::Domain));
        assert!(doc.can_connect_to(functor, c, End::Domain));
        doc.set_domain(functor, Some(c)).unwrap();
        assert!(doc.can_connect_to(functor, d, End::Codomain));
        assert!(!doc.can_connect_to(functor, nested, End::Codomain));
    }

    #[test_case(true, 4 ; "to curve")]
    #[test_case(false, 2 ; "to straight")]
    fn test_toggle_bezier_point_count(bezier: bool, expected: usize) {
        let mut doc = Document::new();
        let f = doc.create_morphism("f");
        doc.set_control_points(f, vec![Position::origin(), Position::new(3.0, 6.0)])
            .unwrap();
        doc.toggle_bezier(f, true).unwrap();
        doc.toggle_bezier(f, bezier).unwrap();
        let points = doc.control_points(f).unwrap();
        assert_eq!(points.len(), expected);
        assert_eq!(points[points.len() - 1], Position::new(3.0, 6.0));
        if bezier {
            assert_eq!(points[1], Position::new(1.0, 2.0));
        }
    }

    #[test_case(0)]
    #[test_case(3)]
    #[test_case(5)]
    fn test_control_point_count_is_checked(count: usize) {
        let mut doc = Document::new();
        let f = doc.create_morphism("f");
        let err = doc
            .set_control_points(f, vec![Position::origin(); count])
            .unwrap_err();
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn test_flags() {
        let mut doc = Document::new();
        let f = doc.create_morphism("f");
        doc.set_flag(f, MorphismFlag::Mono, true).unwrap();
        assert_eq!(doc.flag(f, MorphismFlag::Mono), Some(true));
        assert_eq!(doc.flag(f, MorphismFlag::Iso), Some(false));
        let x = doc.create_object("x");
        assert!(doc.set_flag(x, MorphismFlag::Epi, true).is_err());
    }
}
