// Copyright 2025 Cowboy AI, LLC.

use std::cell::RefCell;
use std::rc::Rc;

use cim_diagram::{DiagramEvent, DiagramListener, Document, End, Position, Signal, Uid};
use pretty_assertions::assert_eq;

struct Scene {
    doc: Document,
    c: Uid,
    d: Uid,
    functor: Uid,
    x: Uid,
    y: Uid,
    f: Uid,
}

/// `F: C -> D` with `f: x -> y` in `C`, fully attached
fn scene() -> Scene {
    let mut doc = Document::new();
    let root = doc.root();
    let c = doc.create_diagram("C");
    let d = doc.create_diagram("D");
    doc.add_object(root, c).unwrap();
    doc.add_object(root, d).unwrap();

    let x = doc.create_object_at("x", Position::new(0.0, 0.0));
    let y = doc.create_object_at("y", Position::new(100.0, 0.0));
    doc.add_object(c, x).unwrap();
    doc.add_object(c, y).unwrap();
    let f = doc.create_morphism("f");
    doc.set_domain(f, Some(x)).unwrap();
    doc.set_codomain(f, Some(y)).unwrap();
    doc.add_morphism(c, f).unwrap();

    let functor = doc.create_functor("F");
    doc.add_morphism(root, functor).unwrap();
    doc.set_domain(functor, Some(c)).unwrap();
    doc.set_codomain(functor, Some(d)).unwrap();
    Scene {
        doc,
        c,
        d,
        functor,
        x,
        y,
        f,
    }
}

#[test]
fn take_image_is_idempotent() {
    let Scene {
        mut doc, d, functor, ..
    } = scene();
    let objects = doc.objects(d);
    let morphisms = doc.morphisms(d);

    let delta = doc.take_image(functor).unwrap();
    assert!(delta.is_empty());
    assert_eq!(doc.objects(d), objects);
    assert_eq!(doc.morphisms(d), morphisms);
}

#[test]
fn image_is_structure_preserving() {
    let Scene {
        doc,
        d,
        functor,
        x,
        y,
        f,
        ..
    } = scene();
    let fx = doc.image_of(functor, x).unwrap();
    let fy = doc.image_of(functor, y).unwrap();
    let ff = doc.image_of(functor, f).unwrap();

    assert!(doc.get_object(d, fx).is_some());
    assert!(doc.get_morphism(d, ff).is_some());
    assert_eq!(doc.endpoint(ff, End::Domain), Some(fx));
    assert_eq!(doc.endpoint(ff, End::Codomain), Some(fy));
    assert_eq!(doc.symbol(ff), Some("F(f)"));
    assert_eq!(doc.parent(ff), Some(d));
}

#[test]
fn contravariant_functor_swaps_image_endpoints() {
    let mut doc = Document::new();
    let c = doc.create_diagram("C");
    let d = doc.create_diagram("D");
    let x = doc.create_object("x");
    let y = doc.create_object("y");
    doc.add_object(c, x).unwrap();
    doc.add_object(c, y).unwrap();
    let f = doc.create_morphism("f");
    doc.set_domain(f, Some(x)).unwrap();
    doc.set_codomain(f, Some(y)).unwrap();
    doc.add_morphism(c, f).unwrap();

    let functor = doc.create_functor("F");
    doc.set_contravariant(functor, true).unwrap();
    doc.set_domain(functor, Some(c)).unwrap();
    doc.set_codomain(functor, Some(d)).unwrap();

    let g = doc.image_of(functor, f).unwrap();
    assert_eq!(doc.endpoint(g, End::Domain), doc.image_of(functor, y));
    assert_eq!(doc.endpoint(g, End::Codomain), doc.image_of(functor, x));
}

#[test]
fn deleting_a_source_leaves_no_dangling_observers() {
    let Scene {
        mut doc,
        d,
        functor,
        x,
        f,
        ..
    } = scene();
    let fx = doc.image_of(functor, x).unwrap();

    doc.delete(x).unwrap();

    assert_eq!(doc.endpoint(f, End::Domain), None);
    assert_eq!(doc.image_of(functor, x), None);
    assert!(doc.get_object(d, fx).is_none());
    assert!(!doc.functor(functor).unwrap().bindings.references(x));
    assert!(!doc.bus().references(x));
    assert!(!doc.bus().references(fx));
}

#[test]
fn unmapped_endpoint_stays_unattached() {
    let Scene {
        mut doc,
        functor,
        f,
        ..
    } = scene();
    let outside = doc.create_object("outside");
    let ff = doc.image_of(functor, f).unwrap();
    let before = doc.endpoint(ff, End::Codomain);

    doc.set_codomain(f, Some(outside)).unwrap();
    assert_eq!(doc.endpoint(ff, End::Codomain), before);

    doc.set_codomain(f, None).unwrap();
    assert_eq!(doc.endpoint(ff, End::Codomain), None);
}

#[test]
fn images_follow_arrow_shape() {
    let Scene {
        mut doc,
        functor,
        f,
        ..
    } = scene();
    let ff = doc.image_of(functor, f).unwrap();
    doc.toggle_bezier(f, true).unwrap();
    assert_eq!(doc.control_points(ff).unwrap().len(), 4);

    let points = vec![
        Position::new(0.0, 0.0),
        Position::new(10.0, 20.0),
        Position::new(30.0, 20.0),
        Position::new(40.0, 0.0),
    ];
    doc.set_control_points(f, points.clone()).unwrap();
    assert_eq!(doc.control_points(ff).unwrap(), points.as_slice());
}

#[test]
fn composed_functors_propagate_through_both_images() {
    let Scene {
        mut doc,
        c,
        d,
        functor,
        ..
    } = scene();
    let root = doc.root();
    let e = doc.create_diagram("E");
    doc.add_object(root, e).unwrap();
    let g = doc.create_functor("G");
    doc.add_morphism(root, g).unwrap();
    doc.set_domain(g, Some(d)).unwrap();
    doc.set_codomain(g, Some(e)).unwrap();
    assert_eq!(doc.objects(e).len(), 2);

    let w = doc.create_object("w");
    doc.add_object(c, w).unwrap();
    let fw = doc.image_of(functor, w).unwrap();
    let gfw = doc.image_of(g, fw).unwrap();
    assert_eq!(doc.symbol(gfw), Some("G(F(w))"));

    doc.set_symbol(w, "v").unwrap();
    assert_eq!(doc.symbol(gfw), Some("G(F(v))"));

    doc.remove_object(c, w).unwrap();
    assert_eq!(doc.image_of(g, fw), None);
    assert!(doc.get_object(e, gfw).is_none());
}

#[test]
fn moving_the_codomain_moves_the_image() {
    let Scene {
        mut doc,
        d,
        functor,
        x,
        ..
    } = scene();
    let root = doc.root();
    let other = doc.create_diagram("D2");
    doc.add_object(root, other).unwrap();

    doc.set_codomain(functor, Some(other)).unwrap();
    assert!(doc.objects(d).is_empty());
    assert!(doc.morphisms(d).is_empty());
    let fx = doc.image_of(functor, x).unwrap();
    assert!(doc.get_object(other, fx).is_some());

    doc.set_domain(functor, None).unwrap();
    assert!(doc.objects(other).is_empty());
    assert!(doc.functor(functor).unwrap().mapping.is_empty());
}

#[derive(Default)]
struct Log(Rc<RefCell<Vec<(Uid, Signal)>>>);

impl DiagramListener for Log {
    fn on_event(&mut self, event: &DiagramEvent) {
        self.0.borrow_mut().push((event.source(), event.signal()));
    }
}

#[test]
fn listeners_see_the_cause_before_the_propagated_effect() {
    let Scene {
        mut doc,
        d,
        functor,
        x,
        ..
    } = scene();
    let log = Rc::new(RefCell::new(Vec::new()));
    doc.add_listener(Box::new(Log(log.clone())));
    let fx = doc.image_of(functor, x).unwrap();

    doc.set_symbol(x, "z").unwrap();
    assert_eq!(
        *log.borrow(),
        vec![(x, Signal::SymbolChanged), (fx, Signal::SymbolChanged)]
    );

    log.borrow_mut().clear();
    doc.delete(fx).unwrap();
    let events = log.borrow();
    assert!(events.contains(&(fx, Signal::Deleted)));
    assert!(events.contains(&(d, Signal::ObjectRemoved)));
}
