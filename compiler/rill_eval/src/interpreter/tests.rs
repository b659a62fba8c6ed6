#![expect(clippy::unwrap_used, reason = "tests unwrap on programs built to succeed")]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rill_ir::{AssignTarget, BinaryOp, ExprKind, SharedInterner, StmtId, UnaryOp};
use rill_runtime::{
    ArgDecl, Args, EvalErrorKind, Function, HeapObject, PluginHandle, PortRef, Value,
};

use super::*;
use crate::config::EvalConfig;
use crate::context::Context;
use crate::plugins::PluginRegistry;
use crate::test_support::{gain, handle, osc, AstBuilder};

struct Harness {
    names: SharedInterner,
    interpreter: Interpreter,
}

impl Harness {
    fn new() -> Self {
        Self::with(|builder| builder)
    }

    fn with(configure: impl FnOnce(InterpreterBuilder) -> InterpreterBuilder) -> Self {
        let names = SharedInterner::new();
        let interpreter = configure(Interpreter::builder().interner(names.clone()))
            .build()
            .unwrap();
        Harness { names, interpreter }
    }

    fn with_nodes() -> Self {
        Self::with(|builder| {
            let mut plugins = PluginRegistry::new();
            plugins
                .register_node("osc", handle("libosc"), osc)
                .register_node("gain", handle("libgain"), gain);
            builder.plugins(plugins)
        })
    }

    fn builder(&self) -> AstBuilder {
        AstBuilder::new(&self.names, "main.rill")
    }

    fn run(&mut self, b: AstBuilder, top_level: Vec<StmtId>) -> RunReport {
        let program = b.finish(top_level);
        self.interpreter.run_program(&program)
    }

    fn global(&self, name: &str) -> Value {
        self.interpreter.scope().lookup(self.names.intern(name)).unwrap()
    }

    fn ctx(&self) -> &Arc<Context> {
        self.interpreter.context()
    }
}

fn only_failure(report: &RunReport) -> &EvalErrorKind {
    assert_eq!(report.failures.len(), 1, "{:?}", report.failures);
    &report.failures[0].kind
}

#[test]
fn scalar_arithmetic_builds_no_nodes() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let (one, two, three) = (b.int(1), b.int(2), b.int(3));
    let product = b.binary(BinaryOp::Mul, two, three);
    let sum = b.binary(BinaryOp::Add, one, product);
    let x = b.var("x", Some(sum));
    let cond = b.ident("x");
    let seven = b.int(7);
    let is_seven = b.binary(BinaryOp::Eq, cond, seven);
    let yes = b.string("yes");
    let no = b.string("no");
    let pick = b.expr(ExprKind::Ternary {
        cond: is_seven,
        then_expr: yes,
        else_expr: no,
    });
    let answer = b.var("answer", Some(pick));

    let report = h.run(b, vec![x, answer]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("x"), Value::Int32(7));
    assert_eq!(h.global("answer"), Value::string("yes"));
    assert_eq!(h.ctx().nodes_created(), 0);
}

#[test]
fn streaming_operand_builds_an_operator_node() {
    let mut h = Harness::with_nodes();
    let mut b = h.builder();
    let freq = b.double(2.0);
    let make = b.call("osc", vec![(Some("freq"), freq)]);
    let o = b.var("o", Some(make));
    let object = b.ident("o");
    let out = b.member(object, "out");
    let three = b.double(3.0);
    let sum = b.binary(BinaryOp::Add, out, three);
    let y = b.var("y", Some(sum));

    let report = h.run(b, vec![o, y]);
    assert!(report.is_success(), "{:?}", report.failures);

    let Value::Node(osc_id) = h.global("o") else {
        panic!("osc() should make a node");
    };
    let Value::Output(port) = h.global("y") else {
        panic!("a streaming operand should produce an output");
    };
    // osc#1, then binaryOp#2 and its constant operand.
    assert_eq!(h.ctx().nodes_created(), 3);

    h.ctx().with_heap(|heap| {
        let osc_node = heap.node(osc_id).unwrap();
        assert_eq!(osc_node.name(), "osc#1");
        assert_eq!(osc_node.plugin().map(PluginHandle::library), Some("libosc"));

        let op = heap.node(port.node).unwrap();
        assert_eq!(op.kind(), "binaryOp");
        assert_eq!(op.name(), "binaryOp#2");
        assert_eq!(op.inputs()[0].source, Some(PortRef::new(osc_id, 0)));

        heap.tick_node(osc_id).unwrap();
        heap.tick_node(port.node).unwrap();
        assert_eq!(heap.output_value(port).unwrap(), Value::Double(5.0));
    });
}

#[test]
fn unary_and_cast_follow_the_stream() {
    let mut h = Harness::with_nodes();
    let mut b = h.builder();
    let freq = b.double(2.0);
    let make = b.call("osc", vec![(Some("freq"), freq)]);
    let o = b.var("o", Some(make));
    let object = b.ident("o");
    let out = b.member(object, "out");
    let negated = b.unary(UnaryOp::Neg, out);
    let n = b.var("n", Some(negated));
    let n_ref = b.ident("n");
    let cast = b.call("int32", vec![(None, n_ref)]);
    let whole = b.var("whole", Some(cast));

    let report = h.run(b, vec![o, n, whole]);
    assert!(report.is_success(), "{:?}", report.failures);

    let Value::Node(osc_id) = h.global("o") else {
        panic!("osc() should make a node");
    };
    let (Value::Output(neg), Value::Output(to_int)) = (h.global("n"), h.global("whole")) else {
        panic!("operators on outputs should stay streaming");
    };
    h.ctx().with_heap(|heap| {
        assert_eq!(heap.node(neg.node).unwrap().kind(), "unaryOp");
        assert_eq!(heap.node(to_int.node).unwrap().kind(), "cast");
        heap.tick_node(osc_id).unwrap();
        heap.tick_node(neg.node).unwrap();
        heap.tick_node(to_int.node).unwrap();
        assert_eq!(heap.output_value(to_int).unwrap(), Value::Int32(-2));
    });
}

#[test]
fn logical_operators_short_circuit_on_scalars() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let f = b.boolean(false);
    let missing = b.ident("missing");
    let and = b.binary(BinaryOp::And, f, missing);
    let a = b.var("a", Some(and));
    let t = b.boolean(true);
    let missing = b.ident("missing");
    let or = b.binary(BinaryOp::Or, t, missing);
    let o = b.var("o", Some(or));

    let report = h.run(b, vec![a, o]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("a"), Value::Bool(false));
    assert_eq!(h.global("o"), Value::Bool(true));
}

#[test]
fn arguments_bind_by_position_then_label() {
    let mut h = Harness::new();
    let mut b = h.builder();
    // def f(a, b = 2, c = 3) { return a * 100 + b * 10 + c; }
    let (two, three) = (b.int(2), b.int(3));
    let (a, hundred) = (b.ident("a"), b.int(100));
    let a100 = b.binary(BinaryOp::Mul, a, hundred);
    let (bv, ten) = (b.ident("b"), b.int(10));
    let b10 = b.binary(BinaryOp::Mul, bv, ten);
    let partial = b.binary(BinaryOp::Add, a100, b10);
    let c = b.ident("c");
    let total = b.binary(BinaryOp::Add, partial, c);
    let ret = b.ret(Some(total));
    let def = b.function("f", vec![("a", None), ("b", Some(two)), ("c", Some(three))], vec![ret]);

    let (one, nine) = (b.int(1), b.int(9));
    let ok_call = b.call("f", vec![(None, one), (Some("c"), nine)]);
    let ok = b.var("ok", Some(ok_call));

    let args: Vec<_> = (1..=4).map(|n| (None, b.int(n))).collect();
    let too_many = b.call("f", args);
    let too_many = b.expr_stmt(too_many);

    let (one, two) = (b.int(1), b.int(2));
    let late = b.call("f", vec![(Some("a"), one), (None, two)]);
    let late = b.expr_stmt(late);

    let missing = b.call("f", vec![]);
    let missing = b.expr_stmt(missing);

    let report = h.run(b, vec![def, ok, too_many, late, missing]);

    assert_eq!(h.global("ok"), Value::Int32(129));
    assert_eq!(report.completed, 2);
    let kinds: Vec<_> = report.failures.iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            EvalErrorKind::TooManyArguments { expected: 3, got: 4 },
            EvalErrorKind::PositionalAfterKeyword { position: 1 },
            EvalErrorKind::MissingArgument { name: "a".into() },
        ]
    );
}

/// `def name(n) { if (n == 0) return 0; return n + name(n - 1); }`
fn recursive_sum(b: &mut AstBuilder, name: &str) -> StmtId {
    let (n, zero) = (b.ident("n"), b.int(0));
    let done = b.binary(BinaryOp::Eq, n, zero);
    let zero = b.int(0);
    let base = b.ret(Some(zero));
    let guard = b.if_else(done, base, None);
    let (n, one) = (b.ident("n"), b.int(1));
    let smaller = b.binary(BinaryOp::Sub, n, one);
    let recurse = b.call(name, vec![(None, smaller)]);
    let n = b.ident("n");
    let sum = b.binary(BinaryOp::Add, n, recurse);
    let step = b.ret(Some(sum));
    b.function(name, vec![("n", None)], vec![guard, step])
}

#[test]
fn recursion_is_bounded_by_max_depth() {
    let mut h = Harness::with(|builder| builder.max_depth(5));
    let mut b = h.builder();
    let def = recursive_sum(&mut b, "sum");
    let ten = b.int(10);
    let call = b.call("sum", vec![(None, ten)]);
    let call = b.expr_stmt(call);

    let report = h.run(b, vec![def, call]);

    assert_eq!(only_failure(&report), &EvalErrorKind::RecursionLimit { depth: 5 });
    assert_eq!(h.interpreter.depth(), 0);
}

#[test]
fn deep_recursion_within_the_default_limit() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let def = recursive_sum(&mut b, "sum");
    let fifty = b.int(50);
    let call = b.call("sum", vec![(None, fifty)]);
    let total = b.var("total", Some(call));

    let report = h.run(b, vec![def, total]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("total"), Value::Int32(1275));
}

#[test]
fn inner_scopes_shadow_and_closures_stay_lexical() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let one = b.int(1);
    let x = b.var("x", Some(one));
    let read = b.ident("x");
    let ret = b.ret(Some(read));
    let peek = b.function("peek", vec![], vec![ret]);
    let zero = b.int(0);
    let seen = b.var("seen", Some(zero));

    // { var x = 2; seen = x * 10 + peek(); }
    let two = b.int(2);
    let inner_x = b.var("x", Some(two));
    let (xr, ten) = (b.ident("x"), b.int(10));
    let scaled = b.binary(BinaryOp::Mul, xr, ten);
    let called = b.call("peek", vec![]);
    let sum = b.binary(BinaryOp::Add, scaled, called);
    let update = b.assign("seen", sum);
    let block = b.block(vec![inner_x, update]);

    let report = h.run(b, vec![x, peek, seen, block]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("seen"), Value::Int32(21));
    assert_eq!(h.global("x"), Value::Int32(1));
    assert_eq!(h.interpreter.scope().frame(), h.ctx().root());
}

#[test]
fn frame_literals_bind_members_and_this() {
    let mut h = Harness::new();
    let mut b = h.builder();
    // var p = { var scale = 2; def twice(v) { return v * this.scale; } };
    let two = b.int(2);
    let scale = b.var("scale", Some(two));
    let (v, this) = (b.ident("v"), b.expr(ExprKind::This));
    let this_scale = b.member(this, "scale");
    let product = b.binary(BinaryOp::Mul, v, this_scale);
    let ret = b.ret(Some(product));
    let twice = b.function("twice", vec![("v", None)], vec![ret]);
    let literal = b.frame_lit(vec![scale, twice]);
    let p = b.var("p", Some(literal));

    let call = |b: &mut AstBuilder| {
        let p = b.ident("p");
        let method = b.member(p, "twice");
        let four = b.int(4);
        b.call_expr(method, vec![(None, four)])
    };
    let first = call(&mut b);
    let r = b.var("r", Some(first));

    let target = b.ident("p");
    let scale = b.name("scale");
    let three = b.int(3);
    let rescale = b.assign_target(AssignTarget::Member { object: target, member: scale }, None, three);
    let second = call(&mut b);
    let r2 = b.var("r2", Some(second));

    let this = b.expr(ExprKind::This);
    let stray = b.expr_stmt(this);

    let report = h.run(b, vec![p, r, rescale, r2, stray]);

    assert_eq!(h.global("r"), Value::Int32(8));
    assert_eq!(h.global("r2"), Value::Int32(12));
    assert_eq!(only_failure(&report), &EvalErrorKind::ThisOutsideFrame);
}

#[test]
fn for_each_visits_sequence_items() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let zero = b.int(0);
    let total = b.var("total", Some(zero));
    let items: Vec<_> = (1..=3).map(|n| b.int(n)).collect();
    let seq = b.sequence(items);
    let item = b.ident("item");
    let name = b.name("total");
    let add = b.assign_target(AssignTarget::Ident(name), Some(BinaryOp::Add), item);
    let body = b.block(vec![add]);
    let each = b.for_each("item", seq, body);

    let report = h.run(b, vec![total, each]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("total"), Value::Int32(6));
}

#[test]
fn compound_assignment_through_an_index() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let items: Vec<_> = (1..=3).map(|n| b.int(n)).collect();
    let array = b.array(items);
    let a = b.var("a", Some(array));
    let (target, one, ten) = (b.ident("a"), b.int(1), b.int(10));
    let bump = b.assign_target(
        AssignTarget::Index {
            object: target,
            indices: vec![one],
        },
        Some(BinaryOp::Add),
        ten,
    );
    let (source, one) = (b.ident("a"), b.int(1));
    let read = b.index(source, vec![one]);
    let v = b.var("v", Some(read));

    let report = h.run(b, vec![a, bump, v]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("v"), Value::Int32(12));
}

#[test]
fn nested_array_literals_stack_into_dimensions() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let row = |b: &mut AstBuilder, x: i32, y: i32| {
        let items = vec![b.int(x), b.int(y)];
        b.array(items)
    };
    let (top, bottom) = (row(&mut b, 1, 2), row(&mut b, 3, 4));
    let matrix = b.array(vec![top, bottom]);
    let m = b.var("m", Some(matrix));
    let (source, i, j) = (b.ident("m"), b.int(1), b.int(0));
    let read = b.index(source, vec![i, j]);
    let e = b.var("e", Some(read));

    let report = h.run(b, vec![m, e]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("e"), Value::Int32(3));
    let Value::Array(id) = h.global("m") else {
        panic!("array literal should make an array");
    };
    h.ctx()
        .with_heap(|heap| assert_eq!(heap.array(id).unwrap().dims(), &[2, 2]));
}

#[test]
fn node_creators_apply_labeled_arguments() {
    let mut h = Harness::with_nodes();
    let mut b = h.builder();
    let make = b.call("osc", vec![]);
    let o = b.var("o", Some(make));
    let (object, factor) = (b.ident("o"), b.double(2.0));
    let out = b.member(object, "out");
    let make = b.call("gain", vec![(Some("factor"), factor), (Some("in"), out)]);
    let g = b.var("g", Some(make));

    let volume = b.double(1.0);
    let unknown = b.call("gain", vec![(Some("volume"), volume)]);
    let unknown = b.expr_stmt(unknown);
    let bare = b.double(1.0);
    let unlabeled = b.call("gain", vec![(None, bare)]);
    let unlabeled = b.expr_stmt(unlabeled);

    let report = h.run(b, vec![o, g, unknown, unlabeled]);

    let (Value::Node(osc_id), Value::Node(gain_id)) = (h.global("o"), h.global("g")) else {
        panic!("node creators should make nodes");
    };
    h.ctx().with_heap(|heap| {
        let node = heap.node(gain_id).unwrap();
        assert_eq!(node.param("factor").map(|p| p.value.clone()), Some(Value::Double(2.0)));
        assert_eq!(node.inputs()[0].source, Some(PortRef::new(osc_id, 0)));

        heap.set_param_named(osc_id, "freq", Value::Double(5.0)).unwrap();
        heap.tick_node(osc_id).unwrap();
        heap.tick_node(gain_id).unwrap();
        assert_eq!(heap.output_value(PortRef::new(gain_id, 0)).unwrap(), Value::Double(10.0));
    });

    assert_eq!(report.failures.len(), 2, "{:?}", report.failures);
    assert!(matches!(
        &report.failures[0].kind,
        EvalErrorKind::UnknownParam { param, .. } if param == "volume"
    ));
    assert_eq!(
        report.failures[1].kind,
        EvalErrorKind::UnlabeledNodeArgument { position: 0 }
    );
}

#[test]
fn assigning_a_scalar_to_an_input_makes_a_constant() {
    let mut h = Harness::with_nodes();
    let mut b = h.builder();
    let make = b.call("gain", vec![]);
    let g = b.var("g", Some(make));
    let (target, four) = (b.ident("g"), b.double(4.0));
    let input = b.name("in");
    let wire = b.assign_target(AssignTarget::Member { object: target, member: input }, None, four);
    let (target, one) = (b.ident("g"), b.double(1.0));
    let output = b.name("out");
    let bad = b.assign_target(AssignTarget::Member { object: target, member: output }, None, one);

    let report = h.run(b, vec![g, wire, bad]);

    assert!(matches!(only_failure(&report), EvalErrorKind::NotAssignable { member, .. } if member == "out"));
    let Value::Node(gain_id) = h.global("g") else {
        panic!("gain() should make a node");
    };
    h.ctx().with_heap(|heap| {
        let source = heap.node(gain_id).unwrap().inputs()[0].source.unwrap();
        assert_eq!(heap.node(source.node).unwrap().kind(), "constant");
        heap.tick_node(gain_id).unwrap();
        assert_eq!(heap.output_value(PortRef::new(gain_id, 0)).unwrap(), Value::Double(4.0));
    });
}

#[test]
fn host_can_rebind_the_operator_builtin() {
    let mut h = Harness::new();
    let ctx = Arc::clone(h.ctx());
    let name = h.names.intern(".binaryOp");
    let params = ["symbol", "left", "right"]
        .into_iter()
        .map(|p| ArgDecl::required(h.names.intern(p)))
        .collect();
    let answer = Function::native(name, Args::new(params), |_, operands| {
        assert_eq!(operands[0], Value::string("+"));
        Ok(Value::Int32(42))
    });
    ctx.with_heap(|heap| {
        let value = heap.alloc_value(HeapObject::Function(answer));
        heap.bind(ctx.root(), name, value).unwrap();
    });

    let mut b = h.builder();
    let (one, two) = (b.int(1), b.int(2));
    let sum = b.binary(BinaryOp::Add, one, two);
    let x = b.var("x", Some(sum));
    let report = h.run(b, vec![x]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("x"), Value::Int32(42));
}

#[test]
fn errors_carry_location_and_call_sites() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let (one, zero) = (b.int(1), b.int(0));
    let divide = b.binary(BinaryOp::Div, one, zero);
    let ret = b.ret(Some(divide));
    let def = b.function("boom", vec![], vec![ret]);
    let call = b.call("boom", vec![]);
    let stmt = b.expr_stmt(call);
    let program = b.finish(vec![def, stmt]);

    let report = h.interpreter.run_program(&program);

    assert_eq!(report.failures.len(), 1);
    let error = &report.failures[0];
    assert_eq!(
        error.kind,
        EvalErrorKind::DivisionByZero {
            builtin: ".binaryOp".into(),
            type_name: "int32".into(),
        }
    );
    assert_eq!(error.location, Some(program.ast.expr(divide).loc));
    assert_eq!(error.call_sites, vec![program.ast.expr(call).loc]);
    let rendered = error.render(&*h.names);
    assert!(rendered.contains("main.rill"), "{rendered}");
}

#[test]
fn top_level_return_ends_the_program() {
    let mut h = Harness::new();
    let mut b = h.builder();
    let one = b.int(1);
    let a = b.var("a", Some(one));
    let read = b.ident("a");
    let ret = b.ret(Some(read));
    let two = b.int(2);
    let after = b.var("after", Some(two));

    let report = h.run(b, vec![a, ret, after]);

    assert_eq!(report.returned, Some(Value::Int32(1)));
    assert_eq!(report.completed, 2);
    let after = h.names.intern("after");
    assert!(h.interpreter.scope().lookup(after).is_err());
}

#[test]
fn garbage_is_collected_between_statements() {
    let mut h = Harness::with(|builder| builder.config(EvalConfig::default().with_gc_threshold(1)));
    let mut b = h.builder();
    let items: Vec<_> = (1..=3).map(|n| b.int(n)).collect();
    let temporary = b.array(items);
    let dropped = b.expr_stmt(temporary);
    let four = b.int(4);
    let kept = b.array(vec![four]);
    let keep = b.var("keep", Some(kept));
    let (one, two) = (b.int(1), b.int(2));
    let sum = b.binary(BinaryOp::Add, one, two);
    let x = b.var("x", Some(sum));

    let report = h.run(b, vec![dropped, keep, x]);

    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(h.global("x"), Value::Int32(3));
    let Value::Array(id) = h.global("keep") else {
        panic!("keep should hold an array");
    };
    h.ctx().with_heap(|heap| {
        assert!(heap.total_collections() >= 2);
        assert_eq!(heap.array(id).unwrap().items(), &[Value::Int32(4)]);
    });
}
