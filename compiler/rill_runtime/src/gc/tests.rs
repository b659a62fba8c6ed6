#![expect(clippy::unwrap_used, reason = "tests unwrap on objects known to be live")]

use super::*;
use crate::errors::{EvalErrorKind, PortError};
use crate::node::kernels::{binary_op_node, constant_node};
use crate::value::PortRef;
use pretty_assertions::assert_eq;
use rill_ir::{BinaryOp, Name};

fn heap() -> Heap {
    Heap::new(SharedInterner::new())
}

fn name(heap: &Heap, s: &str) -> Name {
    heap.names().intern(s)
}

#[test]
fn unreachable_objects_are_freed() {
    let mut heap = heap();
    let kept = heap.alloc(HeapObject::Frame(Frame::root(None)));
    let dropped = heap.alloc(HeapObject::Sequence(vec![Value::Int32(1)]));
    heap.pin(kept).unwrap();

    let stats = heap.collect_all(&[]);

    assert_eq!(stats.freed, 1);
    assert_eq!(stats.survivors, 1);
    assert!(heap.contains(kept));
    assert!(!heap.contains(dropped));
}

#[test]
fn reachable_through_bindings_survives() {
    let mut heap = heap();
    let root = heap.alloc(HeapObject::Frame(Frame::root(None)));
    heap.pin(root).unwrap();
    let items = heap.alloc_value(HeapObject::Sequence(vec![]));
    let inner = heap.alloc_value(HeapObject::Ref(items.clone()));
    let x = name(&heap, "x");
    heap.define(root, x, inner.clone()).unwrap();

    heap.collect_all(&[]);

    assert_eq!(heap.len(), 3);
    assert!(heap.contains(items.referent().unwrap()));
    assert!(heap.contains(inner.referent().unwrap()));
}

#[test]
fn cycles_are_collected() {
    let mut heap = heap();
    let a = heap.alloc(HeapObject::Frame(Frame::root(None)));
    let b = heap.alloc(HeapObject::Frame(Frame::child(a, 0)));
    let back = name(&heap, "back");
    heap.define(a, back, Value::Frame(b)).unwrap();

    let stats = heap.collect_all(&[]);

    assert_eq!(stats.freed, 2);
    assert!(heap.is_empty());
}

#[test]
fn extra_roots_keep_objects_alive() {
    let mut heap = heap();
    let seq = heap.alloc(HeapObject::Sequence(vec![]));
    heap.collect_all(&[seq]);
    assert!(heap.contains(seq));
    heap.collect_all(&[]);
    assert!(!heap.contains(seq));
}

#[test]
fn stale_ids_are_detected_after_slot_reuse() {
    let mut heap = heap();
    let first = heap.alloc(HeapObject::Sequence(vec![]));
    heap.collect_all(&[]);
    let second = heap.alloc(HeapObject::Sequence(vec![Value::Bool(true)]));

    assert_eq!(first.index(), second.index());
    assert_ne!(first, second);
    let err = heap.sequence(first).unwrap_err();
    assert!(matches!(err.kind, EvalErrorKind::DeadObject { .. }));
    assert_eq!(heap.sequence(second).unwrap(), &[Value::Bool(true)]);
}

#[test]
fn roots_age_once_per_collection() {
    let mut heap = heap();
    let root = heap.alloc(HeapObject::Frame(Frame::root(None)));
    heap.pin(root).unwrap();

    heap.collect_all(&[]);
    heap.collect_all(&[]);
    assert_eq!(heap.age(root), Some(2));

    heap.unpin(root);
    assert_eq!(heap.age(root), Some(0));
}

#[test]
fn old_objects_are_roots_for_young_collections() {
    let mut heap = heap();
    let old = heap.alloc(HeapObject::Sequence(vec![]));
    heap.collect_all(&[old]);
    heap.collect_all(&[old]);
    assert_eq!(heap.age(old), Some(2));

    // Still held, and skipped by the young collection's generation test.
    let stats = heap.collect(1, &[old]);
    assert_eq!(stats.roots, 1);
    assert!(heap.contains(old));
    assert_eq!(heap.age(old), Some(3));

    heap.collect_all(&[]);
    assert!(!heap.contains(old));
}

#[test]
fn dropped_extra_roots_are_young_again() {
    let mut heap = heap();
    let seq = heap.alloc(HeapObject::Sequence(vec![]));
    heap.collect(0, &[seq]);
    heap.collect(0, &[seq]);
    assert_eq!(heap.age(seq), Some(2));

    let stats = heap.collect(1, &[]);

    assert_eq!(stats.freed, 1);
    assert!(!heap.contains(seq));
}

#[test]
fn dropped_extra_roots_keep_their_pins() {
    let mut heap = heap();
    let frame = heap.alloc(HeapObject::Frame(Frame::root(None)));
    heap.pin(frame).unwrap();
    heap.collect_all(&[frame]);
    heap.collect_all(&[frame]);

    heap.collect(0, &[]);

    assert!(heap.contains(frame));
    assert_eq!(heap.age(frame), Some(3));
}

#[test]
fn overwriting_a_reference_makes_the_target_young() {
    let mut heap = heap();
    let root = heap.alloc(HeapObject::Frame(Frame::root(None)));
    heap.pin(root).unwrap();
    let seq = heap.alloc(HeapObject::Sequence(vec![]));
    let x = name(&heap, "x");
    heap.define(root, x, Value::Sequence(seq)).unwrap();
    heap.collect_all(&[seq]);
    heap.collect_all(&[seq]);
    assert_eq!(heap.age(seq), Some(2));

    assert!(heap.assign(root, x, Value::Int32(0)).unwrap());
    assert_eq!(heap.age(seq), Some(0));

    heap.collect(1, &[]);
    assert!(!heap.contains(seq));
}

#[test]
fn define_rejects_duplicates() {
    let mut heap = heap();
    let root = heap.alloc(HeapObject::Frame(Frame::root(None)));
    let x = name(&heap, "x");
    heap.define(root, x, Value::Int32(1)).unwrap();
    let err = heap.define(root, x, Value::Int32(2)).unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::DuplicateBinding { name: "x".into() });
}

#[test]
fn should_collect_after_threshold() {
    let mut heap = Heap::with_threshold(SharedInterner::new(), 3);
    for _ in 0..2 {
        heap.alloc(HeapObject::Sequence(vec![]));
    }
    assert!(!heap.should_collect());
    heap.alloc(HeapObject::Sequence(vec![]));
    assert!(heap.should_collect());
    heap.collect_all(&[]);
    assert!(!heap.should_collect());
}

#[test]
fn remove_hands_out_the_object() {
    let mut heap = heap();
    let seq = heap.alloc(HeapObject::Sequence(vec![Value::Int8(4)]));
    let object = heap.remove(seq).unwrap();
    assert!(matches!(object, HeapObject::Sequence(ref items) if items.len() == 1));
    assert!(!heap.contains(seq));

    let mut other = Heap::new(heap.names().clone());
    let moved = other.alloc(object);
    assert_eq!(other.sequence(moved).unwrap(), &[Value::Int8(4)]);
}

fn output(node: ObjectId) -> PortRef {
    PortRef::new(node, 0)
}

#[test]
fn ticking_operator_chain() {
    let mut heap = heap();
    let two = heap.alloc(HeapObject::Node(constant_node("constant#1".into(), Value::Int32(2))));
    let three = heap.alloc(HeapObject::Node(constant_node("constant#2".into(), Value::Int32(3))));
    let add = heap.alloc(HeapObject::Node(binary_op_node("binaryOp#3".into(), BinaryOp::Add)));
    heap.connect(PortRef::new(add, 0), output(two)).unwrap();
    heap.connect(PortRef::new(add, 1), output(three)).unwrap();

    heap.tick_node(add).unwrap();

    assert_eq!(heap.output_value(output(add)).unwrap(), Value::Int32(5));
}

#[test]
fn unconnected_input_fails_to_tick() {
    let mut heap = heap();
    let add = heap.alloc(HeapObject::Node(binary_op_node("binaryOp#1".into(), BinaryOp::Mul)));
    let err = heap.tick_node(add).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::Port(PortError::InputNotConnected {
            node: "binaryOp#1".into(),
            port: "a".into()
        })
    );
}

#[test]
fn reading_an_output_before_any_tick_fails() {
    let mut heap = heap();
    let add = heap.alloc(HeapObject::Node(binary_op_node("binaryOp#1".into(), BinaryOp::Sub)));
    let err = heap.output_value(output(add)).unwrap_err();
    assert!(matches!(
        err.kind,
        EvalErrorKind::Port(PortError::OutputUninitialized { .. })
    ));
}

#[test]
fn reconnecting_an_input_moves_it() {
    let mut heap = heap();
    let one = heap.alloc(HeapObject::Node(constant_node("c#1".into(), Value::Int32(1))));
    let two = heap.alloc(HeapObject::Node(constant_node("c#2".into(), Value::Int32(2))));
    let add = heap.alloc(HeapObject::Node(binary_op_node("b#3".into(), BinaryOp::Add)));
    let input = PortRef::new(add, 0);

    heap.connect(input, output(one)).unwrap();
    heap.connect(input, output(two)).unwrap();

    assert!(heap.node(one).unwrap().outputs()[0].targets.is_empty());
    assert_eq!(heap.node(two).unwrap().outputs()[0].targets.as_slice(), &[input]);
    assert_eq!(heap.node(add).unwrap().inputs()[0].source, Some(output(two)));
}

#[test]
fn collected_downstream_node_is_unlinked_from_survivor() {
    let mut heap = heap();
    let source = heap.alloc(HeapObject::Node(constant_node("c#1".into(), Value::Int32(1))));
    heap.pin(source).unwrap();
    let sink = heap.alloc(HeapObject::Node(binary_op_node("b#2".into(), BinaryOp::Add)));
    heap.connect(PortRef::new(sink, 0), output(source)).unwrap();

    heap.collect_all(&[]);

    assert!(!heap.contains(sink));
    assert!(heap.node(source).unwrap().outputs()[0].targets.is_empty());
}

#[test]
fn upstream_nodes_stay_alive_through_inputs() {
    let mut heap = heap();
    let source = heap.alloc(HeapObject::Node(constant_node("c#1".into(), Value::Int32(1))));
    let sink = heap.alloc(HeapObject::Node(binary_op_node("b#2".into(), BinaryOp::Add)));
    heap.pin(sink).unwrap();
    heap.connect(PortRef::new(sink, 0), output(source)).unwrap();

    heap.collect_all(&[]);

    assert!(heap.contains(source));
}

#[test]
fn params_are_checked_by_the_kernel() {
    let mut heap = heap();
    let add = heap.alloc(HeapObject::Node(binary_op_node("b#1".into(), BinaryOp::Add)));
    assert!(heap.set_param_named(add, "op", Value::string("*")).is_ok());
    assert!(heap.set_param_named(add, "op", Value::string("**")).is_err());
    let err = heap.set_param_named(add, "gain", Value::Int32(1)).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::UnknownParam {
            node: "b#1".into(),
            param: "gain".into()
        }
    );
}

#[test]
fn indexing_sequences_frames_and_nodes() {
    let mut heap = heap();
    let seq = heap.alloc_value(HeapObject::Sequence(vec![Value::Int32(7), Value::string("s")]));
    assert_eq!(heap.index(&seq, &[Value::UInt8(1)]).unwrap(), Value::string("s"));
    assert!(heap.index(&seq, &[Value::Int32(2)]).is_err());

    let frame = heap.alloc(HeapObject::Frame(Frame::root(None)));
    let gain = name(&heap, "gain");
    heap.define(frame, gain, Value::Double(0.5)).unwrap();
    assert_eq!(
        heap.index(&Value::Frame(frame), &[Value::string("gain")]).unwrap(),
        Value::Double(0.5)
    );

    let node = heap.alloc(HeapObject::Node(binary_op_node("b#1".into(), BinaryOp::Add)));
    assert_eq!(
        heap.index(&Value::Node(node), &[Value::string("out")]).unwrap(),
        Value::Output(PortRef::new(node, 0))
    );
}

#[test]
fn missed_frame_keys_are_not_interned() {
    let mut heap = heap();
    let frame = heap.alloc(HeapObject::Frame(Frame::root(None)));
    let before = heap.names().len();

    for i in 0..1_000 {
        let err = heap
            .index(&Value::Frame(frame), &[Value::string(format!("key{i}"))])
            .unwrap_err();
        assert!(matches!(err.kind, EvalErrorKind::UndefinedMember { .. }));
    }
    assert_eq!(heap.names().len(), before);

    heap.set_index(&Value::Frame(frame), &[Value::string("key7")], Value::Int32(7))
        .unwrap();
    assert_eq!(heap.names().len(), before + 1);
    assert_eq!(
        heap.index(&Value::Frame(frame), &[Value::string("key7")]).unwrap(),
        Value::Int32(7)
    );
}
