//! Translation-unit-wide identifier declarations (functions, globals, string literals).
//!
//! Declared once per translation unit, independent of any single function's body; re-declaring
//! the same symbol must match on every field or the declaration is rejected, mirroring how the
//! codegen core this crate is grounded on requires a re-imported `FuncRef`/`SigRef` to match the
//! signature it was first declared with.

use crate::result::{OptError, OptResult};
use std::collections::HashMap;

/// What kind of entity an identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    /// A function.
    Function,
    /// A data object.
    Object,
    /// A thread-local data object.
    ThreadLocal,
    /// A string literal.
    Literal,
}

/// An identifier's linkage scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierScope {
    /// Visible to other translation units and importable by name.
    Export,
    /// Declared here but defined in another translation unit.
    Import,
    /// Visible only within this translation unit.
    Local,
}

/// One declared identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The symbol name.
    pub symbol: String,
    /// What kind of entity this names.
    pub ty: IdentifierType,
    /// Its linkage scope.
    pub scope: IdentifierScope,
    /// Whether it is externally visible beyond its own translation unit (independent of
    /// `scope`, which governs definition/import rather than link-time visibility).
    pub visibility_export: bool,
    /// An alternate name this identifier is also known by, if any (`__attribute__((alias))`
    /// and similar).
    pub alias: Option<String>,
}

/// The table of identifiers declared so far in a translation unit.
#[derive(Debug, Default)]
pub struct IdentifierTable {
    by_symbol: HashMap<String, Identifier>,
}

impl IdentifierTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `identifier`. If `identifier.symbol` has already been declared, the new
    /// declaration must match the existing one on every field, or this fails with
    /// `OptError::AlreadyExists`.
    pub fn declare(&mut self, identifier: Identifier) -> OptResult<()> {
        match self.by_symbol.get(&identifier.symbol) {
            None => {
                self.by_symbol.insert(identifier.symbol.clone(), identifier);
                Ok(())
            }
            Some(existing) if existing == &identifier => Ok(()),
            Some(existing) => Err(OptError::AlreadyExists(format!(
                "identifier '{}' redeclared with mismatched attributes (first: {:?}, now: {:?})",
                identifier.symbol, existing, identifier
            ))),
        }
    }

    /// Look up a previously declared identifier by symbol name.
    pub fn get(&self, symbol: &str) -> Option<&Identifier> {
        self.by_symbol.get(symbol)
    }
}
