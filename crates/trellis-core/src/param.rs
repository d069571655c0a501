//! Parameter descriptors and wire-value coercion.
//!
//! A [`ParamSpec`] is static metadata about one handler argument: its wire
//! name and semantic type. [`coerce`] converts one wire-format string into
//! a typed [`ArgValue`] per a descriptor, or signals a type mismatch.
//!
//! Coercion is strict: no value is ever silently coerced across semantic
//! categories. A non-numeric string passed to an int parameter fails, a
//! bool accepts exactly the literals `true`/`false`, and every codec or
//! decode failure for entity types is normalized into the same mismatch
//! error rather than propagating.

use chrono::DateTime;
use chrono::Utc;

use crate::error::CoerceError;
use crate::traits::EntityCodec;

/// Semantic type tag of one handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// The implicit per-call session context. Never a wire parameter.
    Session,
    /// UTF-8 string, taken verbatim from the wire.
    Str,
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Boolean; accepts exactly the literals `true` and `false`.
    Bool,
    /// RFC 3339 date-time, normalized to UTC.
    DateTime,
    /// Complex type constructed by the serialization subsystem.
    Entity {
        /// Registered entity type name.
        type_name: String,
    },
}

impl ParamKind {
    /// Wire-facing type name, as shown in `describe()` listings and
    /// mismatch messages.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Session => "session",
            Self::Str => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::DateTime => "datetime",
            Self::Entity { type_name } => type_name,
        }
    }
}

/// Static metadata about a single handler argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    kind: ParamKind,
}

impl ParamSpec {
    /// Descriptor with an explicit kind.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// The implicit session-context parameter.
    pub fn session() -> Self {
        Self::new("session", ParamKind::Session)
    }

    /// String parameter.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Str)
    }

    /// Integer parameter.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Int)
    }

    /// Float parameter.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Float)
    }

    /// Boolean parameter.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Bool)
    }

    /// Date-time parameter.
    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::DateTime)
    }

    /// Complex parameter constructed by the codec under `type_name`.
    pub fn entity(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(
            name,
            ParamKind::Entity {
                type_name: type_name.into(),
            },
        )
    }

    /// Wire name of the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semantic type of the parameter.
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }
}

/// One typed, coerced argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// String argument.
    Str(String),
    /// Integer argument.
    Int(i64),
    /// Float argument.
    Float(f64),
    /// Boolean argument.
    Bool(bool),
    /// Date-time argument in UTC.
    DateTime(DateTime<Utc>),
    /// Constructed entity, in the codec's erased representation.
    Entity(serde_json::Value),
}

impl ArgValue {
    /// String value, if this is a string argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Integer value, if this is an int argument.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value, if this is a float argument.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean value, if this is a bool argument.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Date-time value, if this is a datetime argument.
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::DateTime(v) => Some(v),
            _ => None,
        }
    }

    /// Entity value, if this is an entity argument.
    pub fn as_entity(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Entity(v) => Some(v),
            _ => None,
        }
    }
}

/// Coerce one wire-format string into a typed argument per `spec`.
///
/// Pure apart from the codec call for entity types. Every failure mode -
/// numeric parse, bool literal, datetime parse, JSON decode, codec
/// construction - is normalized into [`CoerceError::TypeMismatch`] naming
/// the parameter; nothing raises past this boundary.
///
/// # Errors
///
/// Returns `TypeMismatch` when the value does not parse as the declared
/// type, and for the `Session` kind, which has no wire representation.
pub fn coerce(
    raw: &str,
    spec: &ParamSpec,
    codec: &dyn EntityCodec,
) -> Result<ArgValue, CoerceError> {
    let mismatch = || CoerceError::TypeMismatch {
        param: spec.name().to_string(),
        expected: spec.kind().type_name().to_string(),
        value: raw.to_string(),
    };

    match spec.kind() {
        // The session slot is filled by the dispatcher, never from the wire.
        ParamKind::Session => Err(mismatch()),
        ParamKind::Str => Ok(ArgValue::Str(raw.to_string())),
        ParamKind::Int => raw.parse::<i64>().map(ArgValue::Int).map_err(|_| mismatch()),
        ParamKind::Float => raw
            .parse::<f64>()
            .map(ArgValue::Float)
            .map_err(|_| mismatch()),
        ParamKind::Bool => match raw {
            "true" => Ok(ArgValue::Bool(true)),
            "false" => Ok(ArgValue::Bool(false)),
            _ => Err(mismatch()),
        },
        ParamKind::DateTime => DateTime::parse_from_rfc3339(raw)
            .map(|dt| ArgValue::DateTime(dt.with_timezone(&Utc)))
            .map_err(|_| mismatch()),
        ParamKind::Entity { type_name } => {
            let decoded: serde_json::Value =
                serde_json::from_str(raw).map_err(|_| mismatch())?;
            codec
                .entity_from_value(type_name, decoded)
                .map(ArgValue::Entity)
                .map_err(|_| mismatch())
        }
    }
}
