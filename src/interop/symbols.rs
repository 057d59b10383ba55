//! Symbol resolution for foreign functions
//!
//! Exports are registered once by the embedder and resolved by identifier on
//! every call. Handles are cheap clones of the registered function.

use crate::value::Value;
use core::fmt;
use dashmap::DashMap;
use std::sync::Arc;

/// Raw foreign entry point: wire arguments in, raw wire value out
pub type RawForeignFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// Resolved foreign function handle
#[derive(Clone)]
pub struct ForeignFunction {
    name: Arc<str>,
    func: Arc<RawForeignFn>,
}

impl ForeignFunction {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call the foreign entry point directly
    #[inline]
    pub fn invoke(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }

    /// Whether two handles refer to the same export
    #[inline]
    pub fn same_export(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for ForeignFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignFunction({})", self.name)
    }
}

/// Exported functions of the loaded foreign module
#[derive(Default)]
pub struct SymbolTable {
    exports: DashMap<String, ForeignFunction>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an export, returning any handle it replaces
    pub fn export<F>(&self, name: &str, func: F) -> Option<ForeignFunction>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.exports
            .insert(name.to_owned(), ForeignFunction::new(name, func))
    }

    /// Look up an export by identifier
    pub fn resolve(&self, ident: &str) -> Result<ForeignFunction, SymbolError> {
        if ident.is_empty() || ident.contains('\0') {
            return Err(SymbolError::InvalidName);
        }

        self.exports
            .get(ident)
            .map(|entry| entry.value().clone())
            .ok_or(SymbolError::NotFound)
    }

    #[inline]
    pub fn contains(&self, ident: &str) -> bool {
        self.exports.contains_key(ident)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.exports.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("exports", &self.exports.len())
            .finish()
    }
}

/// Symbol lookup errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    InvalidName,
    NotFound,
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "Invalid symbol name"),
            Self::NotFound => write!(f, "Symbol not found"),
        }
    }
}

impl std::error::Error for SymbolError {}
