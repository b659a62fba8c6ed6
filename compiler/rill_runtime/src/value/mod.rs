//! Runtime values.
//!
//! A [`Value`] is a small tagged union. Primitives are stored inline;
//! everything else is an [`ObjectId`] into the collector's heap, so values
//! are cheap to copy between frames and never keep an object alive on their
//! own. Reachability is decided by the collector from roots and pins.
//!
//! Port variants (`Output`, `Input`, `Param`) point at a slot of a node;
//! an `Output` operand is what switches the evaluator from scalar
//! computation to graph construction.

mod cast;
mod ops;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rill_ir::{Literal, StringInterner};

use crate::gc::ObjectId;

pub use cast::{cast, common_tag};
pub use ops::{binary, index_primitive, unary};

/// Reference to one port of a dataflow node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PortRef {
    pub node: ObjectId,
    pub index: u16,
}

impl PortRef {
    #[inline]
    pub const fn new(node: ObjectId, index: u16) -> Self {
        PortRef { node, index }
    }
}

/// Runtime value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value: uninitialized variables and statements without a result.
    #[default]
    Absent,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Str(Arc<str>),

    Frame(ObjectId),
    Function(ObjectId),
    Node(ObjectId),
    Output(PortRef),
    Input(PortRef),
    Param(PortRef),
    Sequence(ObjectId),
    Array(ObjectId),
    Ref(ObjectId),
}

/// Dynamic type tag of a [`Value`].
///
/// The declaration order of the primitive tags is the promotion order:
/// mixed operands are converted to the later of the two tags.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ValueTag {
    Bool,
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float,
    Double,
    Str,
    Absent,
    Frame,
    Function,
    Node,
    Output,
    Input,
    Param,
    Sequence,
    Array,
    Ref,
}

impl ValueTag {
    /// Tags that can be cast to and from each other, in promotion order.
    pub const PRIMITIVES: [ValueTag; 12] = [
        Self::Bool,
        Self::UInt8,
        Self::Int8,
        Self::UInt16,
        Self::Int16,
        Self::UInt32,
        Self::Int32,
        Self::UInt64,
        Self::Int64,
        Self::Float,
        Self::Double,
        Self::Str,
    ];

    /// Name used in diagnostics; for primitives this is also the name of
    /// the cast builtin.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Str => "string",
            Self::Frame => "frame",
            Self::Function => "function",
            Self::Node => "node",
            Self::Output => "output",
            Self::Input => "input",
            Self::Param => "param",
            Self::Sequence => "sequence",
            Self::Array => "array",
            Self::Ref => "ref",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::PRIMITIVES.into_iter().find(|tag| tag.name() == name)
    }

    /// Position in the promotion order, or `None` for non-primitive tags.
    #[inline]
    pub fn rank(self) -> Option<u8> {
        self.is_primitive().then_some(self as u8)
    }

    #[inline]
    pub fn is_primitive(self) -> bool {
        self <= Self::Str
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::UInt8
                | Self::Int8
                | Self::UInt16
                | Self::Int16
                | Self::UInt32
                | Self::Int32
                | Self::UInt64
                | Self::Int64
        )
    }

    #[inline]
    pub fn is_signed(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn tag(&self) -> ValueTag {
        match self {
            Value::Absent => ValueTag::Absent,
            Value::Bool(_) => ValueTag::Bool,
            Value::Int8(_) => ValueTag::Int8,
            Value::Int16(_) => ValueTag::Int16,
            Value::Int32(_) => ValueTag::Int32,
            Value::Int64(_) => ValueTag::Int64,
            Value::UInt8(_) => ValueTag::UInt8,
            Value::UInt16(_) => ValueTag::UInt16,
            Value::UInt32(_) => ValueTag::UInt32,
            Value::UInt64(_) => ValueTag::UInt64,
            Value::Float(_) => ValueTag::Float,
            Value::Double(_) => ValueTag::Double,
            Value::Str(_) => ValueTag::Str,
            Value::Frame(_) => ValueTag::Frame,
            Value::Function(_) => ValueTag::Function,
            Value::Node(_) => ValueTag::Node,
            Value::Output(_) => ValueTag::Output,
            Value::Input(_) => ValueTag::Input,
            Value::Param(_) => ValueTag::Param,
            Value::Sequence(_) => ValueTag::Sequence,
            Value::Array(_) => ValueTag::Array,
            Value::Ref(_) => ValueTag::Ref,
        }
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        self.tag().is_primitive()
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Whether this operand carries a streaming signal.
    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self, Value::Output(_))
    }

    /// The heap object this value keeps reachable, if any. Ports refer to
    /// their owning node.
    pub fn referent(&self) -> Option<ObjectId> {
        match self {
            Value::Frame(id)
            | Value::Function(id)
            | Value::Node(id)
            | Value::Sequence(id)
            | Value::Array(id)
            | Value::Ref(id) => Some(*id),
            Value::Output(port) | Value::Input(port) | Value::Param(port) => Some(port.node),
            _ => None,
        }
    }

    /// Convert a literal, resolving interned strings.
    pub fn from_literal(literal: Literal, names: &StringInterner) -> Self {
        match literal {
            Literal::Absent => Value::Absent,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int8(n) => Value::Int8(n),
            Literal::Int16(n) => Value::Int16(n),
            Literal::Int32(n) => Value::Int32(n),
            Literal::Int64(n) => Value::Int64(n),
            Literal::UInt8(n) => Value::UInt8(n),
            Literal::UInt16(n) => Value::UInt16(n),
            Literal::UInt32(n) => Value::UInt32(n),
            Literal::UInt64(n) => Value::UInt64(n),
            Literal::Float(n) => Value::Float(n),
            Literal::Double(n) => Value::Double(n),
            Literal::Str(name) => Value::string(names.lookup(name)),
        }
    }

    /// Interpret as a condition. Numbers are true when nonzero; strings and
    /// non-primitive values are rejected.
    pub fn truthy(&self) -> Result<bool, crate::EvalError> {
        match cast(self, ValueTag::Bool)? {
            Value::Bool(b) => Ok(b),
            _ => Err(crate::errors::type_mismatch("bool", self.type_name())),
        }
    }

    /// Integer value of an index operand, accepting any integer tag.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Int8(n) => Some(i64::from(*n)),
            Value::Int16(n) => Some(i64::from(*n)),
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            Value::UInt8(n) => Some(i64::from(*n)),
            Value::UInt16(n) => Some(i64::from(*n)),
            Value::UInt32(n) => Some(i64::from(*n)),
            Value::UInt64(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Reference identity: same tag and same heap slot (and port index).
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Output(a), Value::Output(b))
            | (Value::Input(a), Value::Input(b))
            | (Value::Param(a), Value::Param(b)) => a == b,
            _ => {
                self.tag() == other.tag()
                    && self.referent().is_some()
                    && self.referent() == other.referent()
            }
        }
    }

    /// Total order over all values.
    ///
    /// Scalars (booleans and numbers) order numerically after promotion,
    /// then strings lexicographically, then everything else by tag and heap
    /// identity. `Absent` sorts last.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn family(value: &Value) -> u8 {
            match value.tag() {
                ValueTag::Str => 1,
                ValueTag::Absent => 3,
                tag if tag.is_primitive() => 0,
                _ => 2,
            }
        }

        family(self)
            .cmp(&family(other))
            .then_with(|| match (self, other) {
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ if family(self) == 0 => cast::compare_scalars(self, other),
                _ => self
                    .tag()
                    .cmp(&other.tag())
                    .then_with(|| self.identity_key().cmp(&other.identity_key())),
            })
    }

    fn identity_key(&self) -> (u32, u32, u16) {
        match self {
            Value::Output(port) | Value::Input(port) | Value::Param(port) => {
                (port.node.index(), port.node.stamp(), port.index)
            }
            _ => self
                .referent()
                .map_or((0, 0, 0), |id| (id.index(), id.stamp(), 0)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => write!(f, "absent"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int8(n) => write!(f, "{n}"),
            Value::Int16(n) => write!(f, "{n}"),
            Value::Int32(n) => write!(f, "{n}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::UInt8(n) => write!(f, "{n}"),
            Value::UInt16(n) => write!(f, "{n}"),
            Value::UInt32(n) => write!(f, "{n}"),
            Value::UInt64(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Output(port) | Value::Input(port) | Value::Param(port) => {
                write!(f, "<{} {}.{}>", self.type_name(), port.node, port.index)
            }
            other => match other.referent() {
                Some(id) => write!(f, "<{} {id}>", other.type_name()),
                None => write!(f, "<{}>", other.type_name()),
            },
        }
    }
}

/// Values compare by content for primitives and by identity otherwise.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            _ if self.is_primitive() => {
                self.tag() == other.tag() && self.total_cmp(other) == Ordering::Equal
            }
            _ if matches!(self, Value::Absent) => other.is_absent(),
            _ => self.same_object(other),
        }
    }
}
