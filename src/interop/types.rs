//! Type tags and call descriptors
//!
//! Tags describe how a value is marshalled, not the foreign ABI type behind it.

use crate::value::Value;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// Declared parameter tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Number,
    Pointer,
    Boolean,
    String,
    Array,
}

impl ArgType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Pointer => "pointer",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Array => "array",
        }
    }

    /// Whether marshalling may allocate temporary storage
    #[inline]
    pub const fn needs_storage(self) -> bool {
        matches!(self, Self::String | Self::Array)
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArgType {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(Self::Number),
            "pointer" => Ok(Self::Pointer),
            "boolean" => Ok(Self::Boolean),
            "string" => Ok(Self::String),
            "array" => Ok(Self::Array),
            other => Err(TagError(other.to_owned())),
        }
    }
}

/// Declared return tag
///
/// `Array` is representable so that it can be rejected; no call accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    #[default]
    #[serde(rename = "none")]
    Void,
    Number,
    Pointer,
    Boolean,
    String,
    Array,
}

impl ReturnType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "none",
            Self::Number => "number",
            Self::Pointer => "pointer",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReturnType {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Self::Void),
            "number" => Ok(Self::Number),
            "pointer" => Ok(Self::Pointer),
            "boolean" => Ok(Self::Boolean),
            "string" => Ok(Self::String),
            "array" => Ok(Self::Array),
            other => Err(TagError(other.to_owned())),
        }
    }
}

/// Unrecognised tag name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagError(pub String);

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown type tag: {}", self.0)
    }
}

impl std::error::Error for TagError {}

/// Per-call options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallOptions {
    /// The caller accepts a deferred result even if the call completes synchronously
    #[serde(rename = "async", default)]
    pub async_mode: bool,
}

impl CallOptions {
    /// Options opting into suspension
    #[inline]
    pub const fn asynchronous() -> Self {
        Self { async_mode: true }
    }
}

/// Everything one invocation needs
#[derive(Debug, Clone, Default)]
pub struct CallDescriptor {
    pub ident: String,
    pub return_type: ReturnType,
    pub arg_types: Vec<ArgType>,
    pub args: Vec<Value>,
    pub options: Option<CallOptions>,
}

impl CallDescriptor {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            ..Self::default()
        }
    }

    pub fn returns(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    /// Append a declared parameter with its value
    pub fn arg(mut self, ty: ArgType, value: impl Into<Value>) -> Self {
        self.arg_types.push(ty);
        self.args.push(value.into());
        self
    }

    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = Some(options);
        self
    }

    #[inline]
    pub fn async_mode(&self) -> bool {
        self.options.map_or(false, |o| o.async_mode)
    }
}
