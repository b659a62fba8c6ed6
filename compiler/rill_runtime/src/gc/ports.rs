//! Node port wiring and ticking.

use smallvec::SmallVec;

use super::{Heap, HeapObject, ObjectId};
use crate::errors::{type_mismatch, unknown_param, EvalError, PortError};
use crate::node::{Node, PortKind, TickContext};
use crate::value::{PortRef, Value};

impl Heap {
    fn node_mut(&mut self, id: ObjectId) -> Result<&mut Node, EvalError> {
        match self.get_mut(id)? {
            HeapObject::Node(node) => Ok(node),
            other => Err(type_mismatch("node", other.kind_name())),
        }
    }

    fn no_such_port(&self, port: PortRef, kind: PortKind) -> EvalError {
        let node = self
            .node(port.node)
            .map_or_else(|_| port.node.to_string(), |n| n.name().to_string());
        PortError::NoSuchPort {
            node,
            kind: kind.name(),
            port: port.index.to_string(),
        }
        .into()
    }

    /// Connect an input to an output. An input that is already connected is
    /// disconnected first; outputs fan out.
    pub fn connect(&mut self, input: PortRef, output: PortRef) -> Result<(), EvalError> {
        if self.node(output.node)?.outputs().get(usize::from(output.index)).is_none() {
            return Err(self.no_such_port(output, PortKind::Output));
        }
        if self.node(input.node)?.inputs().get(usize::from(input.index)).is_none() {
            return Err(self.no_such_port(input, PortKind::Input));
        }
        self.disconnect(input)?;

        if let Some(port) = self.node_mut(input.node)?.input_mut(input.index) {
            port.source = Some(output);
        }
        if let Some(port) = self.node_mut(output.node)?.output_mut(output.index) {
            port.targets.push(input);
        }
        tracing::trace!(?input, ?output, "connected");
        Ok(())
    }

    /// Detach an input from its source, if any.
    pub fn disconnect(&mut self, input: PortRef) -> Result<(), EvalError> {
        let source = match self.node_mut(input.node)?.input_mut(input.index) {
            Some(port) => port.source.take(),
            None => return Err(self.no_such_port(input, PortKind::Input)),
        };
        if let Some(source) = source {
            self.unlink_target(source, input);
            self.reset_age(source.node);
        }
        Ok(())
    }

    pub(super) fn unlink_target(&mut self, output: PortRef, input: PortRef) {
        if let Ok(node) = self.node_mut(output.node) {
            if let Some(port) = node.output_mut(output.index) {
                port.targets.retain(|target| *target != input);
            }
        }
    }

    /// Set a param by port handle, letting the kernel validate it first.
    pub fn set_param(&mut self, param: PortRef, value: Value) -> Result<(), EvalError> {
        let node = self.node(param.node)?;
        let Some(port) = node.params().get(usize::from(param.index)) else {
            return Err(self.no_such_port(param, PortKind::Param));
        };
        if let Some(kernel) = node.kernel() {
            kernel.check_param(&port.name, &value)?;
        }

        let old = match self.node_mut(param.node)?.param_mut(param.index) {
            Some(port) => std::mem::replace(&mut port.value, value),
            None => return Ok(()),
        };
        self.release(&old);
        Ok(())
    }

    /// Set a param by name.
    ///
    /// # Errors
    /// `UnknownParam` when the node has no param called `name`.
    pub fn set_param_named(&mut self, node: ObjectId, name: &str, value: Value) -> Result<(), EvalError> {
        let n = self.node(node)?;
        match n.find_port(name) {
            Some((PortKind::Param, index)) => self.set_param(PortRef::new(node, index), value),
            _ => Err(unknown_param(n.name(), name)),
        }
    }

    /// Most recent value of an output.
    pub fn output_value(&self, output: PortRef) -> Result<Value, EvalError> {
        let node = self.node(output.node)?;
        let port = node
            .outputs()
            .get(usize::from(output.index))
            .ok_or_else(|| self.no_such_port(output, PortKind::Output))?;
        port.value.clone().ok_or_else(|| {
            PortError::OutputUninitialized {
                node: node.name().to_string(),
                port: port.name.clone(),
            }
            .into()
        })
    }

    /// Current value of an input's source output.
    pub fn input_value(&self, input: PortRef) -> Result<Value, EvalError> {
        let node = self.node(input.node)?;
        let port = node
            .inputs()
            .get(usize::from(input.index))
            .ok_or_else(|| self.no_such_port(input, PortKind::Input))?;
        let source = port.source.ok_or_else(|| PortError::InputNotConnected {
            node: node.name().to_string(),
            port: port.name.clone(),
        })?;
        self.output_value(source)
    }

    /// Run a node's kernel once: pull every input from its source, compute,
    /// and store the results on the outputs.
    pub fn tick_node(&mut self, id: ObjectId) -> Result<(), EvalError> {
        let count = self.node(id)?.inputs().len();
        let mut inputs: SmallVec<[Value; 4]> = SmallVec::with_capacity(count);
        for index in 0..count {
            let index = u16::try_from(index).unwrap_or(u16::MAX);
            inputs.push(self.input_value(PortRef::new(id, index))?);
        }

        let Some(mut kernel) = self.node_mut(id)?.take_kernel() else {
            return Err(EvalError::new(format!("node {id} is already ticking")));
        };
        let result = match self.node(id) {
            Ok(node) => kernel.tick(&TickContext {
                heap: &*self,
                node,
                inputs: &inputs,
            }),
            Err(e) => Err(e),
        };
        let node = self.node_mut(id)?;
        node.restore_kernel(kernel);
        let values = result?;

        if values.len() != node.outputs().len() {
            return Err(EvalError::new(format!(
                "node `{}` produced {} values for {} outputs",
                node.name(),
                values.len(),
                node.outputs().len()
            )));
        }
        let mut released = Vec::new();
        for (index, value) in values.into_iter().enumerate() {
            let index = u16::try_from(index).unwrap_or(u16::MAX);
            if let Some(port) = node.output_mut(index) {
                if let Some(old) = port.value.replace(value) {
                    released.push(old);
                }
            }
        }
        for old in &released {
            self.release(old);
        }
        Ok(())
    }
}
