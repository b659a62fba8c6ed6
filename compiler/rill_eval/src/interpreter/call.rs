//! Function calls.

use std::sync::Arc;

use rill_ir::{Location, SharedAst, StmtId};
use rill_runtime::errors::{
    not_callable, plugin_failed, unknown_argument, unknown_param, unlabeled_node_argument,
};
use rill_runtime::{
    bind_arguments, CallArg, EvalResult, Function, FunctionKind, HeapObject, NodeFactory,
    NodeRequest, PortKind, PortRef, Value,
};

use super::{ExecFlow, Interpreter};
use crate::dispatch::{call_builtin, source_port};
use crate::plugins::{factory_symbol, FactoryKind};

impl Interpreter {
    /// Call `callee` with evaluated arguments. `site` is recorded on errors
    /// that unwind through script functions.
    pub fn call_value(&mut self, callee: &Value, args: Vec<CallArg>, site: Location) -> EvalResult {
        let Value::Function(id) = callee else {
            return Err(not_callable(callee.type_name()));
        };
        let function = self.context().with_heap(|heap| heap.function(*id).cloned())?;

        match &function.kind {
            FunctionKind::Script { ast, body } => self
                .call_script(&function, Arc::clone(ast), *body, args)
                .map_err(|e| e.with_call_site(site)),
            FunctionKind::Native(native) => {
                let bound = bind_arguments(&function.args, args, self.context().names())?;
                let values: Vec<Value> = bound.into_iter().map(|(_, value)| value).collect();
                self.context().with_heap(|heap| native(heap, &values))
            }
            FunctionKind::NodeCreator(factory) => self.create_node(&function, factory.as_ref(), args),
            FunctionKind::Builtin(builtin) => {
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    if let Some(label) = arg.name {
                        return Err(unknown_argument(self.context().names().lookup(label)));
                    }
                    operands.push(arg.value);
                }
                call_builtin(self.context(), *builtin, &operands)
            }
        }
    }

    /// Bind arguments into a fresh frame under the closure and run the body
    /// there in a child interpreter.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(function = self.context().names().lookup(function.name), depth = self.depth)
    )]
    fn call_script(
        &mut self,
        function: &Function,
        ast: SharedAst,
        body: StmtId,
        args: Vec<CallArg>,
    ) -> EvalResult {
        let bound = bind_arguments(&function.args, args, self.context().names())?;
        let closure = function.closure.unwrap_or_else(|| self.context().root());
        let frame = self.scope.child_frame(closure, |f| f)?;
        self.context().with_heap(|heap| {
            bound
                .into_iter()
                .try_for_each(|(name, value)| heap.define(frame, name, value))
        })?;

        let mut callee = self.child(self.scope.at(closure), ast);
        let flow = callee.with_frame(frame, |scoped| scoped.exec_stmt(body))?;
        Ok(match flow {
            ExecFlow::Return(value) => value,
            ExecFlow::Continue => Value::Absent,
        })
    }

    /// Node creator convention: make the node, then apply every argument
    /// by label to a param (or, for an input, connect it).
    fn create_node(
        &mut self,
        function: &Function,
        factory: &dyn NodeFactory,
        args: Vec<CallArg>,
    ) -> EvalResult {
        let ctx = Arc::clone(self.context());
        let kind = ctx.names().lookup(function.name);
        let mut node = factory
            .create_node(NodeRequest {
                name: ctx.next_node_name(kind),
                kind,
                plugin: function.plugin.as_ref(),
            })
            .map_err(|e| match &function.plugin {
                Some(plugin) => plugin_failed(
                    &factory_symbol(kind, FactoryKind::Node),
                    format!("{e} (in {})", plugin.library()),
                ),
                None => e,
            })?;
        if node.plugin().is_none() {
            if let Some(plugin) = &function.plugin {
                node = node.with_plugin(plugin.clone());
            }
        }
        tracing::debug!(node = node.name(), "created node");

        ctx.with_heap(|heap| {
            let id = heap.alloc(HeapObject::Node(node));
            for (position, arg) in args.into_iter().enumerate() {
                let label = arg
                    .name
                    .map(|name| ctx.names().lookup(name))
                    .ok_or_else(|| unlabeled_node_argument(position))?;
                let node = heap.node(id)?;
                match node.find_port(label) {
                    Some((PortKind::Param, index)) => heap.set_param(PortRef::new(id, index), arg.value)?,
                    Some((PortKind::Input, index)) => {
                        let source = source_port(&ctx, heap, &arg.value)?;
                        heap.connect(PortRef::new(id, index), source)?;
                    }
                    _ => return Err(unknown_param(node.name(), label)),
                }
            }
            Ok(Value::Node(id))
        })
    }
}
