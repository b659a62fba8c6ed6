//! Kernels behind the reserved operator builtins.
//!
//! When an operator sees a streaming operand the evaluator builds one of
//! these nodes instead of computing a value. Each node applies the same
//! scalar semantics as the eager path, once per tick.

use rill_ir::{BinaryOp, UnaryOp};
use smallvec::{smallvec, SmallVec};

use super::{Node, NodeKernel, TickContext};
use crate::errors::{type_mismatch, unknown_operator, wrong_operand_count, EvalError};
use crate::function::Builtin;
use crate::value::{self, Value, ValueTag};

type Outputs = Result<SmallVec<[Value; 1]>, EvalError>;

fn symbol_param<'a>(cx: &'a TickContext<'_>, builtin: Builtin) -> Result<&'a str, EvalError> {
    match cx.param("op") {
        Some(Value::Str(symbol)) => Ok(symbol),
        Some(other) => Err(type_mismatch("string", other.type_name())),
        None => Err(unknown_operator(builtin.reserved_name(), "")),
    }
}

fn check_symbol(builtin: Builtin, name: &str, value: &Value, known: impl Fn(&str) -> bool) -> Result<(), EvalError> {
    if name != "op" {
        return Ok(());
    }
    match value {
        Value::Str(symbol) if known(symbol) => Ok(()),
        Value::Str(symbol) => Err(unknown_operator(builtin.reserved_name(), symbol)),
        other => Err(type_mismatch("string", other.type_name())),
    }
}

/// Emits its `value` param.
pub struct ConstantKernel;

impl NodeKernel for ConstantKernel {
    fn tick(&mut self, cx: &TickContext<'_>) -> Outputs {
        Ok(smallvec![cx.param("value").cloned().unwrap_or_default()])
    }
}

/// `out = a <op> b`
pub struct BinaryOpKernel;

impl NodeKernel for BinaryOpKernel {
    fn tick(&mut self, cx: &TickContext<'_>) -> Outputs {
        let builtin = Builtin::BinaryOp;
        let symbol = symbol_param(cx, builtin)?;
        let op = BinaryOp::from_symbol(symbol)
            .ok_or_else(|| unknown_operator(builtin.reserved_name(), symbol))?;
        let [a, b] = cx.inputs else {
            return Err(wrong_operand_count(builtin.reserved_name(), 2, cx.inputs.len()));
        };
        Ok(smallvec![value::binary(op, a, b)?])
    }

    fn check_param(&self, name: &str, value: &Value) -> Result<(), EvalError> {
        check_symbol(Builtin::BinaryOp, name, value, |s| BinaryOp::from_symbol(s).is_some())
    }
}

/// `out = <op> in`
pub struct UnaryOpKernel;

impl NodeKernel for UnaryOpKernel {
    fn tick(&mut self, cx: &TickContext<'_>) -> Outputs {
        let builtin = Builtin::UnaryOp;
        let symbol = symbol_param(cx, builtin)?;
        let op = UnaryOp::from_symbol(symbol)
            .ok_or_else(|| unknown_operator(builtin.reserved_name(), symbol))?;
        let [operand] = cx.inputs else {
            return Err(wrong_operand_count(builtin.reserved_name(), 1, cx.inputs.len()));
        };
        Ok(smallvec![value::unary(op, operand)?])
    }

    fn check_param(&self, name: &str, value: &Value) -> Result<(), EvalError> {
        check_symbol(Builtin::UnaryOp, name, value, |s| UnaryOp::from_symbol(s).is_some())
    }
}

/// `out = source[i0, i1, ...]`
pub struct IndexKernel;

impl NodeKernel for IndexKernel {
    fn tick(&mut self, cx: &TickContext<'_>) -> Outputs {
        let Some((source, indices)) = cx.inputs.split_first() else {
            return Err(wrong_operand_count(Builtin::Index.reserved_name(), 2, 0));
        };
        Ok(smallvec![cx.heap.index(source, indices)?])
    }
}

/// `out = <to>(in)`
pub struct CastKernel;

impl NodeKernel for CastKernel {
    fn tick(&mut self, cx: &TickContext<'_>) -> Outputs {
        let tag = match cx.param("to") {
            Some(Value::Str(name)) => ValueTag::from_name(name)
                .ok_or_else(|| type_mismatch("primitive type name", name))?,
            Some(other) => return Err(type_mismatch("string", other.type_name())),
            None => return Err(type_mismatch("primitive type name", "absent")),
        };
        let [operand] = cx.inputs else {
            return Err(wrong_operand_count(tag.name(), 1, cx.inputs.len()));
        };
        Ok(smallvec![value::cast(operand, tag)?])
    }

    fn check_param(&self, name: &str, value: &Value) -> Result<(), EvalError> {
        if name != "to" {
            return Ok(());
        }
        match value {
            Value::Str(tag) if ValueTag::from_name(tag).is_some() => Ok(()),
            Value::Str(tag) => Err(type_mismatch("primitive type name", tag)),
            other => Err(type_mismatch("string", other.type_name())),
        }
    }
}

/// Node that emits `value` every tick. Its output is primed at creation so
/// downstream nodes can tick without it.
pub fn constant_node(name: String, value: Value) -> Node {
    let mut node = Node::new(name, "constant", Box::new(ConstantKernel))
        .with_param("value", value.clone())
        .with_output("out");
    if let Some(out) = node.output_mut(0) {
        out.value = Some(value);
    }
    node
}

/// Inputs `a`, `b`; param `op`; output `out`.
pub fn binary_op_node(name: String, op: BinaryOp) -> Node {
    Node::new(name, "binaryOp", Box::new(BinaryOpKernel))
        .with_input("a")
        .with_input("b")
        .with_param("op", Value::string(op.as_symbol()))
        .with_output("out")
}

/// Input `in`; param `op`; output `out`.
pub fn unary_op_node(name: String, op: UnaryOp) -> Node {
    Node::new(name, "unaryOp", Box::new(UnaryOpKernel))
        .with_input("in")
        .with_param("op", Value::string(op.as_symbol()))
        .with_output("out")
}

/// Inputs `source`, `i0` .. `i{n-1}`; output `out`.
pub fn index_node(name: String, index_count: usize) -> Node {
    (0..index_count)
        .fold(
            Node::new(name, "index", Box::new(IndexKernel)).with_input("source"),
            |node, i| node.with_input(format!("i{i}")),
        )
        .with_output("out")
}

/// Input `in`; param `to`; output `out`.
pub fn cast_node(name: String, to: ValueTag) -> Node {
    Node::new(name, "cast", Box::new(CastKernel))
        .with_input("in")
        .with_param("to", Value::string(to.name()))
        .with_output("out")
}
