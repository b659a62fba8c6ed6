//! Rill runtime - the object model shared by the evaluator and plugins.
//!
//! - [`Value`]: tagged runtime value; primitives inline, everything else a
//!   handle into the heap
//! - [`Heap`]: generational mark-and-sweep collector with explicit roots
//! - [`Frame`], [`Function`], [`Node`], [`Array`]: the heap object kinds
//! - [`EvalError`]: structured errors for every failure the runtime reports
//!
//! Plugins depend on this crate alone: a node factory or native function
//! sees values, the heap and errors, never the interpreter.

mod array;
pub mod errors;
mod frame;
pub mod function;
pub mod gc;
pub mod node;
pub mod value;

pub use array::Array;
pub use errors::{EvalError, EvalErrorKind, EvalResult, PortError};
pub use frame::Frame;
pub use function::{
    bind_arguments, ArgDecl, Args, Builtin, CallArg, Function, FunctionKind, NativeFn,
    PluginHandle,
};
pub use gc::{CollectStats, Heap, HeapObject, ObjectId, FULL_COLLECTION};
pub use node::{Node, NodeFactory, NodeKernel, NodeRequest, PortKind, TickContext};
pub use value::{PortRef, Value, ValueTag};
