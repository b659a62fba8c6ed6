//! Error types for the runtime and the evaluator.
//!
//! # Structured Error Categories
//!
//! `EvalErrorKind` carries typed data for every failure the runtime can
//! report. Factory functions (e.g. `division_by_zero()`) are the public
//! construction API; they populate both `kind` and `message`.
//!
//! Operator failures always name the reserved builtin involved (`.binaryOp`,
//! `.unaryOp`, `.index`) and the dynamic type names of the operands, so a
//! failure can be traced to either the scalar or the streaming path.

use rill_ir::{Location, StringLookup};
use std::fmt;

use crate::value::Value;

/// Result of evaluation.
pub type EvalResult = Result<Value, EvalError>;

/// Failures surfaced by dataflow node ports.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("input `{port}` of node `{node}` is not connected")]
    InputNotConnected { node: String, port: String },
    #[error("output `{port}` of node `{node}` has no value yet")]
    OutputUninitialized { node: String, port: String },
    #[error("node `{node}` has no {kind} port `{port}`")]
    NoSuchPort {
        node: String,
        kind: &'static str,
        port: String,
    },
}

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalErrorKind {
    // Arithmetic
    #[error("`{builtin}`: division by zero on `{type_name}`")]
    DivisionByZero { builtin: String, type_name: String },
    #[error("`{builtin}`: modulo by zero on `{type_name}`")]
    ModuloByZero { builtin: String, type_name: String },
    #[error("`{builtin}`: `{type_name}` overflow in {operation}")]
    IntegerOverflow {
        builtin: String,
        operation: String,
        type_name: String,
    },

    // Conversion
    #[error("cannot cast {from} to {to}")]
    Cast { from: String, to: String },
    #[error("value {value} is not representable as {to}")]
    CastOutOfRange { value: String, to: String },

    // Operators and builtins
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
    #[error("`{builtin}`: operator `{op}` cannot be applied to `{left}` and `{right}`")]
    InvalidBinaryOp {
        builtin: String,
        op: String,
        left: String,
        right: String,
    },
    #[error("`{builtin}`: operator `{op}` cannot be applied to `{operand}`")]
    InvalidUnaryOp {
        builtin: String,
        op: String,
        operand: String,
    },
    #[error("`{builtin}`: unknown operator `{symbol}`")]
    UnknownOperator { builtin: String, symbol: String },
    #[error("`{builtin}` expects {expected} operands, got {got}")]
    WrongOperandCount {
        builtin: String,
        expected: usize,
        got: usize,
    },
    #[error("`{builtin}`: `{type_name}` cannot be indexed with {index}")]
    NotIndexable {
        builtin: String,
        type_name: String,
        index: String,
    },
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    // Scope and lookup
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },
    #[error("`{name}` is already defined in this scope")]
    DuplicateBinding { name: String },
    #[error("`{type_name}` has no member `{member}`")]
    UndefinedMember { type_name: String, member: String },
    #[error("cannot assign to member `{member}` of `{type_name}`")]
    NotAssignable { type_name: String, member: String },
    #[error("`this` used outside of a frame literal")]
    ThisOutsideFrame,

    // Calls and argument binding
    #[error("`{type_name}` is not callable")]
    NotCallable { type_name: String },
    #[error("too many arguments: expected at most {expected}, got {got}")]
    TooManyArguments { expected: usize, got: usize },
    #[error("positional argument {position} follows a labeled argument")]
    PositionalAfterKeyword { position: usize },
    #[error("no parameter named `{name}`")]
    UnknownArgument { name: String },
    #[error("argument `{name}` is bound more than once")]
    DuplicateArgument { name: String },
    #[error("missing argument `{name}`")]
    MissingArgument { name: String },
    #[error("node arguments must be labeled; argument {position} has no label")]
    UnlabeledNodeArgument { position: usize },
    #[error("node `{node}` has no param `{param}`")]
    UnknownParam { node: String, param: String },
    #[error("maximum recursion depth exceeded (limit: {depth})")]
    RecursionLimit { depth: usize },

    // Collector boundary
    #[error("use of {what} after it was collected")]
    DeadObject { what: String },

    // Dataflow ports
    #[error(transparent)]
    Port(#[from] PortError),

    // Module loading
    #[error("plugin `{symbol}` failed: {message}")]
    PluginLoad { symbol: String, message: String },
    #[error("cannot load script `{path}`: {message}")]
    ScriptLoad { path: String, message: String },

    /// Catch-all for errors raised by native plugins and hosts.
    #[error("{message}")]
    Custom { message: String },
}

/// Evaluation error.
///
/// `location` is the innermost AST node that failed. `call_sites` grows as
/// the error unwinds through calls and script loads, innermost first, so a
/// diagnostic can show the whole chain of enclosing sites.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Human-readable message; equals `kind.to_string()` for factory-built
    /// errors.
    pub message: String,
    pub location: Option<Location>,
    pub call_sites: Vec<Location>,
    pub notes: Vec<String>,
}

impl EvalError {
    /// Create an error with just a message (`Custom` kind).
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_kind(EvalErrorKind::Custom { message })
    }

    pub fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            location: None,
            call_sites: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Attach the failing node's location unless a deeper node already did.
    #[must_use]
    pub fn located_at(mut self, location: Location) -> Self {
        if self.location.is_none() && !location.is_builtin() {
            self.location = Some(location);
        }
        self
    }

    /// Record an enclosing call site as the error unwinds.
    #[must_use]
    pub fn with_call_site(mut self, site: Location) -> Self {
        if !site.is_builtin() {
            self.call_sites.push(site);
        }
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Render the message together with its location chain.
    pub fn render(&self, names: &dyn StringLookup) -> String {
        RenderedError { error: self, names }.to_string()
    }
}

struct RenderedError<'a> {
    error: &'a EvalError,
    names: &'a dyn StringLookup,
}

impl fmt::Display for RenderedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error = self.error;
        match error.location {
            Some(loc) => write!(f, "{}: error: {}", loc.display(self.names), error.message)?,
            None => write!(f, "error: {}", error.message)?,
        }
        for site in &error.call_sites {
            write!(f, "\n  called from {}", site.display(self.names))?;
        }
        for note in &error.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl From<PortError> for EvalError {
    fn from(err: PortError) -> Self {
        EvalError::from_kind(EvalErrorKind::Port(err))
    }
}

// Arithmetic

#[cold]
pub fn division_by_zero(builtin: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero {
        builtin: builtin.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn modulo_by_zero(builtin: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ModuloByZero {
        builtin: builtin.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn integer_overflow(builtin: &str, operation: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IntegerOverflow {
        builtin: builtin.to_string(),
        operation: operation.to_string(),
        type_name: type_name.to_string(),
    })
}

// Conversion

#[cold]
pub fn cast_error(from: &str, to: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Cast {
        from: from.to_string(),
        to: to.to_string(),
    })
}

#[cold]
pub fn cast_out_of_range(value: impl fmt::Display, to: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CastOutOfRange {
        value: value.to_string(),
        to: to.to_string(),
    })
}

// Operators and builtins

#[cold]
pub fn type_mismatch(expected: &str, got: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    })
}

#[cold]
pub fn invalid_binary_op(builtin: &str, op: &str, left: &str, right: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidBinaryOp {
        builtin: builtin.to_string(),
        op: op.to_string(),
        left: left.to_string(),
        right: right.to_string(),
    })
}

#[cold]
pub fn invalid_unary_op(builtin: &str, op: &str, operand: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidUnaryOp {
        builtin: builtin.to_string(),
        op: op.to_string(),
        operand: operand.to_string(),
    })
}

#[cold]
pub fn unknown_operator(builtin: &str, symbol: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownOperator {
        builtin: builtin.to_string(),
        symbol: symbol.to_string(),
    })
}

#[cold]
pub fn wrong_operand_count(builtin: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::WrongOperandCount {
        builtin: builtin.to_string(),
        expected,
        got,
    })
}

#[cold]
pub fn not_indexable(builtin: &str, type_name: &str, index: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotIndexable {
        builtin: builtin.to_string(),
        type_name: type_name.to_string(),
        index: index.to_string(),
    })
}

#[cold]
pub fn index_out_of_bounds(index: i64, len: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfBounds { index, len })
}

// Scope and lookup

#[cold]
pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn duplicate_binding(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DuplicateBinding {
        name: name.to_string(),
    })
}

#[cold]
pub fn undefined_member(type_name: &str, member: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedMember {
        type_name: type_name.to_string(),
        member: member.to_string(),
    })
}

#[cold]
pub fn not_assignable(type_name: &str, member: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotAssignable {
        type_name: type_name.to_string(),
        member: member.to_string(),
    })
}

#[cold]
pub fn this_outside_frame() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ThisOutsideFrame)
}

// Calls and argument binding

#[cold]
pub fn not_callable(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable {
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn too_many_arguments(expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TooManyArguments { expected, got })
}

#[cold]
pub fn positional_after_keyword(position: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::PositionalAfterKeyword { position })
}

#[cold]
pub fn unknown_argument(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownArgument {
        name: name.to_string(),
    })
}

#[cold]
pub fn duplicate_argument(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DuplicateArgument {
        name: name.to_string(),
    })
}

#[cold]
pub fn missing_argument(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MissingArgument {
        name: name.to_string(),
    })
}

#[cold]
pub fn unlabeled_node_argument(position: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnlabeledNodeArgument { position })
}

#[cold]
pub fn unknown_param(node: &str, param: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownParam {
        node: node.to_string(),
        param: param.to_string(),
    })
}

#[cold]
pub fn recursion_limit_exceeded(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::RecursionLimit { depth })
}

// Collector boundary

#[cold]
pub fn dead_object(what: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DeadObject {
        what: what.to_string(),
    })
}

// Module loading

#[cold]
pub fn plugin_failed(symbol: &str, message: impl fmt::Display) -> EvalError {
    EvalError::from_kind(EvalErrorKind::PluginLoad {
        symbol: symbol.to_string(),
        message: message.to_string(),
    })
}

#[cold]
pub fn script_load_failed(path: &str, message: impl fmt::Display) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ScriptLoad {
        path: path.to_string(),
        message: message.to_string(),
    })
}
