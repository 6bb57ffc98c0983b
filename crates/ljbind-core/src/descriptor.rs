//! Symbol descriptors and validated symbol tables.
//!
//! A table is an ordered list of `(logical name, native symbol, signature)`
//! records, processed by a single generic binder. Tables are declared in
//! code or loaded from RON:
//!
//! ```ron
//! (
//!     name: "lua-core",
//!     symbols: [
//!         (name: "gettop", decl: "int lua_gettop(lua_State *L)"),
//!         (name: "settop", symbol: "lua_settop", decl: "void (lua_State *L, int idx)"),
//!     ],
//! )
//! ```

use crate::error::DescriptorError;
use crate::signature::{NativeSignature, is_valid_symbol, parse_declaration};
use serde::Deserialize;
use std::collections::HashSet;

/// One logical operation and the native entry point that implements it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolDescriptor {
    pub logical_name: String,
    pub native_symbol: String,
    pub signature: NativeSignature,
}

impl SymbolDescriptor {
    pub fn new(
        logical_name: impl Into<String>,
        native_symbol: impl Into<String>,
        signature: NativeSignature,
    ) -> Self {
        SymbolDescriptor {
            logical_name: logical_name.into(),
            native_symbol: native_symbol.into(),
            signature,
        }
    }

    /// Build a descriptor from a full C prototype; the symbol is the
    /// prototype's function name.
    pub fn from_prototype(
        logical_name: impl Into<String>,
        prototype: &str,
    ) -> Result<Self, DescriptorError> {
        let (name, signature) = parse_declaration(prototype)?;
        let native_symbol = name.ok_or_else(|| DescriptorError::Malformed {
            decl: prototype.to_string(),
            reason: "prototype has no function name".to_string(),
        })?;
        Ok(SymbolDescriptor::new(logical_name, native_symbol, signature))
    }

    /// Build a descriptor from an explicit symbol and a declaration. A name
    /// inside the declaration must agree with the explicit symbol.
    pub fn from_declaration(
        logical_name: impl Into<String>,
        native_symbol: impl Into<String>,
        decl: &str,
    ) -> Result<Self, DescriptorError> {
        let native_symbol = native_symbol.into();
        let (name, signature) = parse_declaration(decl)?;
        if let Some(name) = name
            && name != native_symbol
        {
            return Err(DescriptorError::Malformed {
                decl: decl.to_string(),
                reason: format!("declares '{name}' but symbol is '{native_symbol}'"),
            });
        }
        Ok(SymbolDescriptor::new(logical_name, native_symbol, signature))
    }
}

/// An ordered, validated list of descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolTable {
    name: String,
    descriptors: Vec<SymbolDescriptor>,
}

impl SymbolTable {
    /// Validate and build a table.
    ///
    /// Logical names must be unique and non-empty, and every native symbol
    /// must be a plain C identifier.
    pub fn new(
        name: impl Into<String>,
        descriptors: Vec<SymbolDescriptor>,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        let mut seen = HashSet::new();

        for desc in &descriptors {
            if desc.logical_name.trim().is_empty() {
                return Err(DescriptorError::EmptyName {
                    symbol: desc.native_symbol.clone(),
                });
            }
            if !is_valid_symbol(&desc.native_symbol) {
                return Err(DescriptorError::InvalidSymbol {
                    symbol: desc.native_symbol.clone(),
                });
            }
            if !seen.insert(desc.logical_name.as_str()) {
                return Err(DescriptorError::DuplicateName {
                    table: name,
                    name: desc.logical_name.clone(),
                });
            }
        }

        Ok(SymbolTable { name, descriptors })
    }

    /// Build a table from `(logical name, C prototype)` pairs.
    pub fn from_prototypes(
        name: impl Into<String>,
        entries: &[(&str, &str)],
    ) -> Result<Self, DescriptorError> {
        let descriptors = entries
            .iter()
            .map(|(logical, proto)| SymbolDescriptor::from_prototype(*logical, proto))
            .collect::<Result<Vec<_>, _>>()?;
        SymbolTable::new(name, descriptors)
    }

    /// Parse a table from RON text.
    pub fn from_ron(source: &str) -> Result<Self, DescriptorError> {
        let file: TableFile =
            ron::from_str(source).map_err(|e| DescriptorError::Format(e.to_string()))?;

        let descriptors = file
            .symbols
            .into_iter()
            .map(|entry| {
                if entry.symbol.is_empty() {
                    SymbolDescriptor::from_prototype(entry.name, &entry.decl)
                } else {
                    SymbolDescriptor::from_declaration(entry.name, entry.symbol, &entry.decl)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        SymbolTable::new(file.name, descriptors)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SymbolDescriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, logical_name: &str) -> Option<&SymbolDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.logical_name == logical_name)
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a SymbolDescriptor;
    type IntoIter = std::slice::Iter<'a, SymbolDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}

/// On-disk shape of a symbol table
#[derive(Deserialize)]
struct TableFile {
    name: String,
    symbols: Vec<TableEntry>,
}

#[derive(Deserialize)]
struct TableEntry {
    name: String,
    /// Empty means "take it from the prototype".
    #[serde(default)]
    symbol: String,
    decl: String,
}
