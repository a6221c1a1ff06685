use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::record::ErrorRecord;

/// Tag linking a `call` to its eventual `return`/`error`.
pub type CorrelationId = u64;

const OPS: &[&str] = &["call", "return", "error"];

/// Operation carried in the first slot of a wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Call,
    Return,
    Error,
}

impl Op {
    pub const fn as_str(self) -> &'static str {
        match self {
            Op::Call => "call",
            Op::Return => "return",
            Op::Error => "error",
        }
    }

    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "call" => Some(Op::Call),
            "return" => Some(Op::Return),
            "error" => Some(Op::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message on the bridge.
///
/// On the wire this is the ordered tuple `[op, name, id, payload]`. `name`
/// rides along on replies for diagnostics only; replies are routed by `id`.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Invoke `name` on the receiving side.
    Call {
        name: String,
        id: CorrelationId,
        args: Vec<Value>,
    },
    /// Successful completion of call `id`.
    Return {
        name: String,
        id: CorrelationId,
        result: Value,
    },
    /// Failed completion of call `id`.
    Error {
        name: String,
        id: CorrelationId,
        error: ErrorRecord,
    },
}

impl WireMessage {
    pub fn op(&self) -> Op {
        match self {
            WireMessage::Call { .. } => Op::Call,
            WireMessage::Return { .. } => Op::Return,
            WireMessage::Error { .. } => Op::Error,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WireMessage::Call { name, .. }
            | WireMessage::Return { name, .. }
            | WireMessage::Error { name, .. } => name,
        }
    }

    pub fn id(&self) -> CorrelationId {
        match self {
            WireMessage::Call { id, .. }
            | WireMessage::Return { id, .. }
            | WireMessage::Error { id, .. } => *id,
        }
    }
}

impl Serialize for WireMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(self.op().as_str())?;
        tuple.serialize_element(self.name())?;
        tuple.serialize_element(&self.id())?;
        match self {
            WireMessage::Call { args, .. } => tuple.serialize_element(args)?,
            WireMessage::Return { result, .. } => tuple.serialize_element(result)?,
            WireMessage::Error { error, .. } => tuple.serialize_element(error)?,
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for WireMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_tuple(4, WireMessageVisitor)
    }
}

struct WireMessageVisitor;

impl<'de> Visitor<'de> for WireMessageVisitor {
    type Value = WireMessage;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a [op, name, id, payload] array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<WireMessage, A::Error> {
        let op: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let op = Op::parse(&op).ok_or_else(|| de::Error::unknown_variant(&op, OPS))?;
        let name: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(1, &self))?;
        let id: CorrelationId = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(2, &self))?;

        let message = match op {
            Op::Call => WireMessage::Call {
                name,
                id,
                args: seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(3, &self))?,
            },
            Op::Return => WireMessage::Return {
                name,
                id,
                result: seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(3, &self))?,
            },
            Op::Error => WireMessage::Error {
                name,
                id,
                error: seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(3, &self))?,
            },
        };

        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(5, &self));
        }

        Ok(message)
    }
}
