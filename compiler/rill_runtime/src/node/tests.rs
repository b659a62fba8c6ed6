#![expect(clippy::unwrap_used, reason = "tests unwrap on known-good nodes")]

use super::kernels::{cast_node, index_node, unary_op_node};
use super::*;
use crate::gc::HeapObject;
use pretty_assertions::assert_eq;
use rill_ir::{SharedInterner, UnaryOp};

struct Gain;

impl NodeKernel for Gain {
    fn tick(&mut self, cx: &TickContext<'_>) -> Result<SmallVec<[Value; 1]>, EvalError> {
        let factor = cx.param("factor").cloned().unwrap_or(Value::Double(1.0));
        Ok(smallvec![crate::value::binary(rill_ir::BinaryOp::Mul, &cx.inputs[0], &factor)?])
    }
}

fn gain(name: String) -> Node {
    Node::new(name, "gain", Box::new(Gain))
        .with_input("in")
        .with_output("out")
        .with_param("factor", Value::Double(1.0))
}

#[test]
fn ports_resolve_by_name() {
    let node = gain("gain#1".into());
    assert_eq!(node.find_port("in"), Some((PortKind::Input, 0)));
    assert_eq!(node.find_port("out"), Some((PortKind::Output, 0)));
    assert_eq!(node.find_port("factor"), Some((PortKind::Param, 0)));
    assert_eq!(node.find_port("missing"), None);
}

#[test]
fn closures_are_node_factories() {
    let factory = |request: NodeRequest<'_>| -> Result<Node, EvalError> { Ok(gain(request.name)) };
    let node = factory
        .create_node(NodeRequest {
            name: "gain#4".into(),
            kind: "gain",
            plugin: None,
        })
        .unwrap();
    assert_eq!(node.name(), "gain#4");
    assert_eq!(node.kind(), "gain");
}

#[test]
fn plugin_kernel_reads_params() {
    let mut heap = Heap::new(SharedInterner::new());
    let source = heap.alloc(HeapObject::Node(kernels::constant_node("constant#1".into(), Value::Double(3.0))));
    let g = heap.alloc(HeapObject::Node(gain("gain#2".into())));
    heap.connect(PortRef::new(g, 0), PortRef::new(source, 0)).unwrap();
    heap.set_param(PortRef::new(g, 0), Value::Double(2.0)).unwrap();

    heap.tick_node(g).unwrap();

    assert_eq!(heap.output_value(PortRef::new(g, 0)).unwrap(), Value::Double(6.0));
}

#[test]
fn cast_and_unary_kernels() {
    let mut heap = Heap::new(SharedInterner::new());
    let source = heap.alloc(HeapObject::Node(kernels::constant_node("c#1".into(), Value::Int32(5))));
    let neg = heap.alloc(HeapObject::Node(unary_op_node("u#2".into(), UnaryOp::Neg)));
    let to_double = heap.alloc(HeapObject::Node(cast_node("cast#3".into(), crate::ValueTag::Double)));
    heap.connect(PortRef::new(neg, 0), PortRef::new(source, 0)).unwrap();
    heap.connect(PortRef::new(to_double, 0), PortRef::new(neg, 0)).unwrap();

    heap.tick_node(neg).unwrap();
    heap.tick_node(to_double).unwrap();

    assert_eq!(
        heap.output_value(PortRef::new(to_double, 0)).unwrap(),
        Value::Double(-5.0)
    );
}

#[test]
fn index_kernel_reads_sequences() {
    let mut heap = Heap::new(SharedInterner::new());
    let seq = heap.alloc_value(HeapObject::Sequence(vec![Value::Int8(1), Value::Int8(2)]));
    let items = heap.alloc(HeapObject::Node(kernels::constant_node("c#1".into(), seq)));
    let at = heap.alloc(HeapObject::Node(kernels::constant_node("c#2".into(), Value::Int32(1))));
    let index = heap.alloc(HeapObject::Node(index_node("index#3".into(), 1)));
    heap.connect(PortRef::new(index, 0), PortRef::new(items, 0)).unwrap();
    heap.connect(PortRef::new(index, 1), PortRef::new(at, 0)).unwrap();

    heap.tick_node(index).unwrap();

    assert_eq!(heap.output_value(PortRef::new(index, 0)).unwrap(), Value::Int8(2));
}
