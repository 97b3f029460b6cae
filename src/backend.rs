//!
//! The contract a native debugger adapter fulfils for the engine.
//!

use crate::{error::*, memory::ReadMemory, registry::TypeRegistry, types::TypeData};

/// A value handed back by backend expression evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeValue {
    pub type_name: String,
    pub address: Option<u64>,
    pub data: Option<Vec<u8>>,
}

impl NativeValue {
    pub fn located(type_name: impl Into<String>, address: u64) -> Self {
        Self {
            type_name: type_name.into(),
            address: Some(address),
            data: None,
        }
    }

    pub fn detached(type_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            type_name: type_name.into(),
            address: None,
            data: Some(data),
        }
    }
}

pub trait Backend: ReadMemory + Send + Sync {
    /// 4 or 8
    fn pointer_size(&self) -> usize {
        8
    }

    fn is_big_endian(&self) -> bool {
        false
    }

    fn is_windows_target(&self) -> bool {
        false
    }

    /// Fails with [`DumpError::NoTarget`] if there is no inferior to inspect
    fn check_target(&self) -> DumpResult<()> {
        Ok(())
    }

    /// Convert the native type named `name` into a descriptor,
    /// types it refers to should be resolved through `types`
    fn lookup_native_type(&self, name: &str, types: &TypeRegistry) -> Option<TypeData> {
        let _ = (name, types);
        None
    }

    /// Symbol name covering `address`, possibly mangled and with a `+offset` suffix
    fn symbol_at(&self, address: u64) -> Option<String> {
        let _ = address;
        None
    }

    /// Evaluate an expression in the inferior.
    ///
    /// This may call functions of the inferior, which can change the memory being inspected.
    fn parse_and_evaluate(&self, expr: &str) -> DumpResult<Option<NativeValue>> {
        let _ = expr;
        Err(DumpError::NotSupport)
    }
}
