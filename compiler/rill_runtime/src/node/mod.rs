//! Dataflow nodes.
//!
//! A node owns named ports of three kinds:
//! - **inputs** connect to exactly one upstream output
//! - **outputs** fan out to any number of inputs and hold the most recent
//!   value the kernel produced
//! - **params** hold a concrete value set at construction or by assignment
//!
//! The per-tick computation is a [`NodeKernel`]. The runtime ships kernels
//! for the reserved operators (see [`kernels`]); plugins supply their own
//! through a [`NodeFactory`].
//!
//! Scheduling is out of scope here: `Heap::tick_node` runs one node once,
//! pulling its inputs from upstream outputs.

pub mod kernels;

use smallvec::{smallvec, SmallVec};

use crate::errors::EvalError;
use crate::function::PluginHandle;
use crate::gc::{Heap, ObjectId};
use crate::value::{PortRef, Value};

#[derive(Clone, Debug)]
pub struct InputPort {
    pub name: String,
    pub source: Option<PortRef>,
}

#[derive(Clone, Debug)]
pub struct OutputPort {
    pub name: String,
    pub value: Option<Value>,
    pub targets: SmallVec<[PortRef; 2]>,
}

#[derive(Clone, Debug)]
pub struct ParamPort {
    pub name: String,
    pub value: Value,
}

/// Which port table a name resolved to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PortKind {
    Input,
    Output,
    Param,
}

impl PortKind {
    pub const fn name(self) -> &'static str {
        match self {
            PortKind::Input => "input",
            PortKind::Output => "output",
            PortKind::Param => "param",
        }
    }
}

/// What a kernel sees during one tick.
pub struct TickContext<'a> {
    pub heap: &'a Heap,
    pub node: &'a Node,
    /// Current value of every input, in port order.
    pub inputs: &'a [Value],
}

impl TickContext<'_> {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.node.param(name).map(|port| &port.value)
    }
}

/// Per-tick computation of a node.
pub trait NodeKernel: Send {
    /// Produce one value per output port, in port order.
    fn tick(&mut self, cx: &TickContext<'_>) -> Result<SmallVec<[Value; 1]>, EvalError>;

    /// Reject a param value before it is stored.
    fn check_param(&self, _name: &str, _value: &Value) -> Result<(), EvalError> {
        Ok(())
    }
}

/// What a factory receives when a script calls a node creator.
pub struct NodeRequest<'a> {
    /// Unique node name, `<kind>#<n>`.
    pub name: String,
    /// Identifier the creator was resolved under.
    pub kind: &'a str,
    pub plugin: Option<&'a PluginHandle>,
}

/// Creates nodes for a `NodeCreator` function.
pub trait NodeFactory: Send + Sync {
    fn create_node(&self, request: NodeRequest<'_>) -> Result<Node, EvalError>;
}

impl<F> NodeFactory for F
where
    F: Fn(NodeRequest<'_>) -> Result<Node, EvalError> + Send + Sync,
{
    fn create_node(&self, request: NodeRequest<'_>) -> Result<Node, EvalError> {
        self(request)
    }
}

/// Dataflow node.
pub struct Node {
    name: String,
    kind: String,
    inputs: SmallVec<[InputPort; 2]>,
    outputs: SmallVec<[OutputPort; 1]>,
    params: SmallVec<[ParamPort; 2]>,
    /// Taken out while the kernel runs.
    kernel: Option<Box<dyn NodeKernel>>,
    plugin: Option<PluginHandle>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, kernel: Box<dyn NodeKernel>) -> Self {
        Node {
            name: name.into(),
            kind: kind.into(),
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            params: SmallVec::new(),
            kernel: Some(kernel),
            plugin: None,
        }
    }

    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(InputPort {
            name: name.into(),
            source: None,
        });
        self
    }

    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(OutputPort {
            name: name.into(),
            value: None,
            targets: smallvec![],
        });
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, default: Value) -> Self {
        self.params.push(ParamPort {
            name: name.into(),
            value: default,
        });
        self
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: PluginHandle) -> Self {
        self.plugin = Some(plugin);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub fn params(&self) -> &[ParamPort] {
        &self.params
    }

    pub fn plugin(&self) -> Option<&PluginHandle> {
        self.plugin.as_ref()
    }

    pub fn param(&self, name: &str) -> Option<&ParamPort> {
        self.params.iter().find(|port| port.name == name)
    }

    /// Resolve a port name. Inputs shadow outputs, which shadow params.
    pub fn find_port(&self, name: &str) -> Option<(PortKind, u16)> {
        fn position<T>(ports: &[T], name: &str, port_name: impl Fn(&T) -> &str) -> Option<u16> {
            ports
                .iter()
                .position(|p| port_name(p) == name)
                .and_then(|i| u16::try_from(i).ok())
        }
        position(&self.inputs, name, |p| p.name.as_str())
            .map(|i| (PortKind::Input, i))
            .or_else(|| position(&self.outputs, name, |p| p.name.as_str()).map(|i| (PortKind::Output, i)))
            .or_else(|| position(&self.params, name, |p| p.name.as_str()).map(|i| (PortKind::Param, i)))
    }

    /// Value handle for a port of this node.
    pub fn port_value(&self, id: ObjectId, name: &str) -> Option<Value> {
        self.find_port(name).map(|(kind, index)| {
            let port = PortRef::new(id, index);
            match kind {
                PortKind::Input => Value::Input(port),
                PortKind::Output => Value::Output(port),
                PortKind::Param => Value::Param(port),
            }
        })
    }

    /// Heap objects this node keeps alive: upstream nodes, param values and
    /// the current output values. Downstream targets are not owned.
    pub(crate) fn children(&self) -> impl Iterator<Item = ObjectId> + '_ {
        let upstream = self
            .inputs
            .iter()
            .filter_map(|port| port.source.map(|source| source.node));
        let params = self.params.iter().filter_map(|port| port.value.referent());
        let outputs = self
            .outputs
            .iter()
            .filter_map(|port| port.value.as_ref().and_then(Value::referent));
        upstream.chain(params).chain(outputs)
    }

    pub(crate) fn input_mut(&mut self, index: u16) -> Option<&mut InputPort> {
        self.inputs.get_mut(usize::from(index))
    }

    pub(crate) fn output_mut(&mut self, index: u16) -> Option<&mut OutputPort> {
        self.outputs.get_mut(usize::from(index))
    }

    pub(crate) fn param_mut(&mut self, index: u16) -> Option<&mut ParamPort> {
        self.params.get_mut(usize::from(index))
    }

    pub(crate) fn kernel(&self) -> Option<&dyn NodeKernel> {
        self.kernel.as_deref()
    }

    pub(crate) fn take_kernel(&mut self) -> Option<Box<dyn NodeKernel>> {
        self.kernel.take()
    }

    pub(crate) fn restore_kernel(&mut self, kernel: Box<dyn NodeKernel>) {
        self.kernel = Some(kernel);
    }
}

#[cfg(test)]
mod tests;
