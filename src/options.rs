//!
//! Options of a variables request.
//!

use crate::error::*;

use serde::de::DeserializeOwned;
use std::collections::HashMap;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    #[default]
    Automatic,
    /// no pretty printers, no string guessing
    Raw,
    Simple,
    Hexadecimal,
    Decimal,
    Octal,
    Binary,
    Char,
    Latin1String,
    Utf8String,
    Utf16String,
    Ucs4String,
    /// show a pointer as an array of n elements
    Array(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// use the registered pretty printers
    pub fancy: bool,
    pub auto_deref_pointers: bool,
    /// resolve the runtime type of polymorphic objects through their vtable
    pub dynamic_type: bool,
    /// let errors escape the item which raised them
    pub pass_exceptions: bool,
    /// characters shown of a string before it is elided
    pub display_string_limit: usize,
    /// children shown per level unless an expanded item requests otherwise
    pub max_children: usize,
    /// expanded inames, mapped to the requested child count, 0 for the default
    pub expanded: HashMap<String, usize>,
    pub formats: HashMap<String, DisplayFormat>,
    pub type_formats: HashMap<String, DisplayFormat>,
    /// namespace of the library build, stripped before looking up pretty printers
    pub library_namespace: String,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            fancy: true,
            auto_deref_pointers: true,
            dynamic_type: true,
            pass_exceptions: false,
            display_string_limit: 100,
            max_children: 1000,
            expanded: Default::default(),
            formats: Default::default(),
            type_formats: Default::default(),
            library_namespace: String::new(),
        }
    }
}

impl DumpOptions {
    /// Build from the loosely typed arguments of a front end request
    pub fn from_config(config: serde_value::Value) -> DumpResult<Self> {
        deserialize_config(config)
    }

    pub fn expand(mut self, iname: impl Into<String>) -> Self {
        self.expanded.insert(iname.into(), 0);
        self
    }

    pub fn expand_with_limit(mut self, iname: impl Into<String>, max_children: usize) -> Self {
        self.expanded.insert(iname.into(), max_children);
        self
    }

    #[inline]
    pub fn is_expanded(&self, iname: &str) -> bool {
        self.expanded.contains_key(iname)
    }

    /// Child cap for the item `iname`
    pub fn max_children_of(&self, iname: &str) -> usize {
        match self.expanded.get(iname) {
            Some(&n) if n > 0 => n,
            _ => self.max_children,
        }
    }

    pub fn format_of(&self, iname: &str, type_name: &str) -> DisplayFormat {
        self.formats
            .get(iname)
            .or_else(|| self.type_formats.get(type_name))
            .copied()
            .unwrap_or_default()
    }
}

pub fn deserialize_config<D: DeserializeOwned>(config: serde_value::Value) -> DumpResult<D> {
    config
        .deserialize_into()
        .map_err(|err| DumpError::Text(format!("invalid config: {err}")))
}
