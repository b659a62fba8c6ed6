//! Dual-mode builtin dispatch.
//!
//! Every operator, index and cast expression ends up here with concrete
//! operand values. When no operand is an `Output` the result is computed
//! right away. Otherwise a node of the matching kind is created, each
//! operand is wired to one of its inputs (concrete operands through a
//! fresh constant node) and the node's output is the result.

use rill_ir::{BinaryOp, UnaryOp};
use rill_runtime::errors::{type_mismatch, unknown_operator, wrong_operand_count};
use rill_runtime::node::kernels::{
    binary_op_node, cast_node, constant_node, index_node, unary_op_node,
};
use rill_runtime::value::{binary, cast, unary};
use rill_runtime::{Builtin, EvalError, EvalResult, Heap, HeapObject, Node, PortRef, Value};

use crate::context::Context;

/// Apply `builtin` to positional operands.
///
/// Operand layouts: `.binaryOp(symbol, left, right)`,
/// `.unaryOp(symbol, operand)`, `.index(target, index...)`, and
/// `<type>(operand)` for casts.
pub fn call_builtin(ctx: &Context, builtin: Builtin, operands: &[Value]) -> EvalResult {
    let name = builtin.reserved_name();
    match builtin {
        Builtin::BinaryOp => {
            let [symbol, left, right] = operands else {
                return Err(wrong_operand_count(name, 3, operands.len()));
            };
            let op = binary_symbol(name, symbol)?;
            if left.is_output() || right.is_output() {
                tracing::trace!(op = op.as_symbol(), "building binary operator node");
                build(ctx, |node_name| binary_op_node(node_name, op), "binaryOp", &[left, right])
            } else {
                binary(op, left, right)
            }
        }
        Builtin::UnaryOp => {
            let [symbol, operand] = operands else {
                return Err(wrong_operand_count(name, 2, operands.len()));
            };
            let op = unary_symbol(name, symbol)?;
            if operand.is_output() {
                tracing::trace!(op = op.as_symbol(), "building unary operator node");
                build(ctx, |node_name| unary_op_node(node_name, op), "unaryOp", &[operand])
            } else {
                unary(op, operand)
            }
        }
        Builtin::Index => {
            let Some((target, indices)) = operands.split_first() else {
                return Err(wrong_operand_count(name, 1, 0));
            };
            if operands.iter().any(Value::is_output) {
                tracing::trace!(indices = indices.len(), "building index node");
                let wired: Vec<&Value> = operands.iter().collect();
                build(ctx, |node_name| index_node(node_name, indices.len()), "index", &wired)
            } else {
                ctx.with_heap(|heap| heap.index(target, indices))
            }
        }
        Builtin::Cast(tag) => {
            let [operand] = operands else {
                return Err(wrong_operand_count(name, 1, operands.len()));
            };
            if operand.is_output() {
                tracing::trace!(to = tag.name(), "building cast node");
                build(ctx, |node_name| cast_node(node_name, tag), "cast", &[operand])
            } else {
                cast(operand, tag)
            }
        }
    }
}

fn binary_symbol(builtin: &str, symbol: &Value) -> Result<BinaryOp, EvalError> {
    let text = symbol
        .as_str()
        .ok_or_else(|| type_mismatch("operator symbol", symbol.type_name()))?;
    BinaryOp::from_symbol(text).ok_or_else(|| unknown_operator(builtin, text))
}

fn unary_symbol(builtin: &str, symbol: &Value) -> Result<UnaryOp, EvalError> {
    let text = symbol
        .as_str()
        .ok_or_else(|| type_mismatch("operator symbol", symbol.type_name()))?;
    UnaryOp::from_symbol(text).ok_or_else(|| unknown_operator(builtin, text))
}

/// Create a node and connect `operands` to its inputs in order.
fn build(
    ctx: &Context,
    make: impl FnOnce(String) -> Node,
    kind: &str,
    operands: &[&Value],
) -> EvalResult {
    let node = make(ctx.next_node_name(kind));
    ctx.with_heap(|heap| {
        let id = heap.alloc(HeapObject::Node(node));
        for (index, operand) in operands.iter().enumerate() {
            let source = source_port(ctx, heap, operand)?;
            let index = u16::try_from(index).map_err(|_| wrong_operand_count(kind, usize::from(u16::MAX), operands.len()))?;
            heap.connect(PortRef::new(id, index), source)?;
        }
        Ok(Value::Output(PortRef::new(id, 0)))
    })
}

/// Output port carrying `operand`: the operand itself when it is an output,
/// otherwise a new constant node.
pub(crate) fn source_port(ctx: &Context, heap: &mut Heap, operand: &Value) -> Result<PortRef, EvalError> {
    match operand {
        Value::Output(port) => Ok(*port),
        concrete => {
            let constant = constant_node(ctx.next_node_name("constant"), concrete.clone());
            Ok(PortRef::new(heap.alloc(HeapObject::Node(constant)), 0))
        }
    }
}
