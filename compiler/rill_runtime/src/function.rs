//! Callable objects and argument binding.
//!
//! A function has an argument declaration, an optional closure frame and a
//! body of one of four kinds. How call-site arguments reach the body
//! depends on the kind:
//!
//! | Kind          | Arguments                                              |
//! |---------------|--------------------------------------------------------|
//! | `Script`      | bound to declared names by [`bind_arguments`]          |
//! | `Native`      | bound by [`bind_arguments`], passed in declared order  |
//! | `NodeCreator` | all labeled; each sets a param on the new node         |
//! | `Builtin`     | positional operands, no binding                        |

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rill_ir::{Name, SharedAst, StmtId, StringInterner};

use crate::errors::{
    duplicate_argument, missing_argument, positional_after_keyword, too_many_arguments,
    unknown_argument, EvalError, EvalResult,
};
use crate::gc::{Heap, ObjectId};
use crate::node::NodeFactory;
use crate::value::{Value, ValueTag};

/// One declared argument.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgDecl {
    pub name: Name,
    /// Evaluated once, when the function is declared.
    pub default: Option<Value>,
}

impl ArgDecl {
    pub fn required(name: Name) -> Self {
        ArgDecl {
            name,
            default: None,
        }
    }

    pub fn optional(name: Name, default: Value) -> Self {
        ArgDecl {
            name,
            default: Some(default),
        }
    }
}

/// Ordered argument declaration of a function.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    decls: Vec<ArgDecl>,
}

impl Args {
    pub fn new(decls: Vec<ArgDecl>) -> Self {
        Args { decls }
    }

    pub fn decls(&self) -> &[ArgDecl] {
        &self.decls
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// One evaluated call-site argument.
#[derive(Clone, Debug, PartialEq)]
pub struct CallArg {
    pub name: Option<Name>,
    pub value: Value,
}

impl CallArg {
    pub fn positional(value: Value) -> Self {
        CallArg { name: None, value }
    }

    pub fn labeled(name: Name, value: Value) -> Self {
        CallArg {
            name: Some(name),
            value,
        }
    }
}

/// Bind call-site arguments to a declaration.
///
/// Positional arguments fill declared arguments left to right and must all
/// precede labeled ones. Labeled arguments then fill the remaining slots by
/// name, and whatever is still unbound takes its default.
///
/// Returns the bindings in declaration order.
pub fn bind_arguments(
    args: &Args,
    call: Vec<CallArg>,
    names: &StringInterner,
) -> Result<Vec<(Name, Value)>, EvalError> {
    let decls = args.decls();

    let positional = call.iter().take_while(|arg| arg.name.is_none()).count();
    if let Some(late) = call.iter().skip(positional).position(|arg| arg.name.is_none()) {
        return Err(positional_after_keyword(positional + late));
    }
    if positional > decls.len() {
        return Err(too_many_arguments(decls.len(), positional));
    }

    let mut bound: Vec<Option<Value>> = vec![None; decls.len()];
    for (i, arg) in call.into_iter().enumerate() {
        let Some(label) = arg.name else {
            bound[i] = Some(arg.value);
            continue;
        };
        let slot = decls
            .iter()
            .position(|decl| decl.name == label)
            .ok_or_else(|| unknown_argument(names.lookup(label)))?;
        if bound[slot].is_some() {
            return Err(duplicate_argument(names.lookup(label)));
        }
        bound[slot] = Some(arg.value);
    }

    decls
        .iter()
        .zip(bound)
        .map(|(decl, value)| {
            value
                .or_else(|| decl.default.clone())
                .map(|value| (decl.name, value))
                .ok_or_else(|| missing_argument(names.lookup(decl.name)))
        })
        .collect()
}

/// Host function body. Receives bound arguments in declaration order.
pub type NativeFn = Arc<dyn Fn(&mut Heap, &[Value]) -> EvalResult + Send + Sync>;

/// Opaque handle to the plugin library an object came from.
#[derive(Clone)]
pub struct PluginHandle {
    library: Arc<str>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl PluginHandle {
    pub fn new(library: impl Into<Arc<str>>, payload: Arc<dyn Any + Send + Sync>) -> Self {
        PluginHandle {
            library: library.into(),
            payload,
        }
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginHandle").field(&self.library).finish()
    }
}

/// Reserved builtins. Each is dual-mode: it computes a scalar result for
/// concrete operands and builds a dataflow node when any operand is an
/// `Output`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Builtin {
    /// `(symbol, left, right)`
    BinaryOp,
    /// `(symbol, operand)`
    UnaryOp,
    /// `(target, index...)`
    Index,
    /// `(operand)`, named after the target tag
    Cast(ValueTag),
}

impl Builtin {
    pub const fn reserved_name(self) -> &'static str {
        match self {
            Builtin::BinaryOp => ".binaryOp",
            Builtin::UnaryOp => ".unaryOp",
            Builtin::Index => ".index",
            Builtin::Cast(tag) => tag.name(),
        }
    }

    /// Every builtin bound in a root frame.
    pub fn all() -> impl Iterator<Item = Builtin> {
        [Builtin::BinaryOp, Builtin::UnaryOp, Builtin::Index]
            .into_iter()
            .chain(ValueTag::PRIMITIVES.into_iter().map(Builtin::Cast))
    }
}

#[derive(Clone)]
pub enum FunctionKind {
    Script { ast: SharedAst, body: StmtId },
    Native(NativeFn),
    NodeCreator(Arc<dyn NodeFactory>),
    Builtin(Builtin),
}

impl fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Script { body, .. } => write!(f, "Script({body:?})"),
            FunctionKind::Native(_) => write!(f, "Native"),
            FunctionKind::NodeCreator(_) => write!(f, "NodeCreator"),
            FunctionKind::Builtin(builtin) => write!(f, "Builtin({builtin:?})"),
        }
    }
}

/// Function object.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Name,
    pub args: Args,
    /// Frame the body runs under; `None` for host functions.
    pub closure: Option<ObjectId>,
    pub plugin: Option<PluginHandle>,
    pub kind: FunctionKind,
}

impl Function {
    pub fn script(name: Name, args: Args, closure: ObjectId, ast: SharedAst, body: StmtId) -> Self {
        Function {
            name,
            args,
            closure: Some(closure),
            plugin: None,
            kind: FunctionKind::Script { ast, body },
        }
    }

    pub fn native<F>(name: Name, args: Args, body: F) -> Self
    where
        F: Fn(&mut Heap, &[Value]) -> EvalResult + Send + Sync + 'static,
    {
        Function {
            name,
            args,
            closure: None,
            plugin: None,
            kind: FunctionKind::Native(Arc::new(body)),
        }
    }

    pub fn node_creator(name: Name, factory: Arc<dyn NodeFactory>) -> Self {
        Function {
            name,
            args: Args::default(),
            closure: None,
            plugin: None,
            kind: FunctionKind::NodeCreator(factory),
        }
    }

    pub fn builtin(name: Name, builtin: Builtin) -> Self {
        Function {
            name,
            args: Args::default(),
            closure: None,
            plugin: None,
            kind: FunctionKind::Builtin(builtin),
        }
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: PluginHandle) -> Self {
        self.plugin = Some(plugin);
        self
    }

    /// Heap objects kept alive by this function: its closure and any
    /// default argument values.
    pub(crate) fn children(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.closure.into_iter().chain(
            self.args
                .decls()
                .iter()
                .filter_map(|decl| decl.default.as_ref().and_then(Value::referent)),
        )
    }
}
