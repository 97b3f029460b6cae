//!
//! Debug session: the backend handle with every cache the engine keeps.
//!
//! The type registry, layout cache and vtable cache live until [`DumpSession::teardown`];
//! the per-step dynamic type cache is cleared by [`DumpSession::reset_step`] whenever the
//! inferior ran.
//!

use crate::{
    backend::{Backend, NativeValue},
    dumper::DumperRegistry,
    error::*,
    layout::{describe_struct, StructLayout},
    memory::*,
    options::DumpOptions,
    record::Elision,
    registry::TypeRegistry,
    types::*,
    value::Value,
};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct DumpSession {
    backend: Arc<dyn Backend>,
    pub types: TypeRegistry,
    pub dumpers: DumperRegistry,
    options: RwLock<Arc<DumpOptions>>,
    layouts: RwLock<HashMap<String, Arc<StructLayout>>>,
    /// vtable address -> most derived type, `None` if it did not resolve
    vtables: RwLock<HashMap<u64, Option<Type>>>,
    /// (object address, static type) -> dynamic type, valid for one stop
    step_types: RwLock<HashMap<(u64, Arc<str>), Type>>,
}

impl DumpSession {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        info!(
            "dump session: pointer size {}, {} endian{}",
            backend.pointer_size(),
            if backend.is_big_endian() { "big" } else { "little" },
            if backend.is_windows_target() { ", windows" } else { "" }
        );
        Self {
            types: TypeRegistry::new(backend.clone()),
            backend,
            dumpers: DumperRegistry::default(),
            options: Default::default(),
            layouts: Default::default(),
            vtables: Default::default(),
            step_types: Default::default(),
        }
    }

    pub fn with_options(self, options: DumpOptions) -> Self {
        self.set_options(options);
        self
    }

    #[inline]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    #[inline]
    pub fn options(&self) -> Arc<DumpOptions> {
        self.options.read().clone()
    }

    pub fn set_options(&self, options: DumpOptions) {
        *self.options.write() = Arc::new(options);
    }

    #[inline]
    pub fn ptr_size(&self) -> usize {
        self.types.ptr_size()
    }

    #[inline]
    pub fn is_big_endian(&self) -> bool {
        self.types.is_big_endian()
    }

    /// The inferior ran, forget what was learnt about its objects
    pub fn reset_step(&self) {
        self.step_types.write().clear();
    }

    pub fn teardown(&self) {
        info!("dump session teardown: {} types cached", self.types.len());
        self.step_types.write().clear();
        self.vtables.write().clear();
        self.layouts.write().clear();
        self.types.clear();
    }

    pub fn read_raw_memory(&self, address: u64, size: usize) -> DumpResult<Vec<u8>> {
        self.backend.read_memory(address, size)
    }

    pub fn read_to_first_zero(
        &self,
        address: u64,
        unit: usize,
        limit: usize,
    ) -> DumpResult<(Option<Elision>, Vec<u8>)> {
        self.backend.read_to_first_zero(address, unit, limit)
    }

    pub fn extract_pointer(&self, address: u64) -> DumpResult<u64> {
        self.backend
            .read_pointer(address, self.ptr_size(), self.is_big_endian())
    }

    pub fn extract_int(&self, address: u64, size: usize, signed: bool) -> DumpResult<i64> {
        let data = self.backend.read_memory(address, size)?;
        let raw = uint_from_bytes(&data, self.is_big_endian());
        Ok(if signed {
            sign_extend(raw, size as u32 * 8) as i64
        } else {
            raw as i64
        })
    }

    /// The decoded layout of a pattern, cached per pattern
    pub fn describe_struct(&self, pattern: &str) -> DumpResult<Arc<StructLayout>> {
        if let Some(layout) = self.layouts.read().get(pattern) {
            return Ok(layout.clone());
        }
        let layout = describe_struct(pattern, self.ptr_size(), |name| {
            let ty = self
                .types
                .lookup(name)
                .ok_or_else(|| DumpError::TypeNotFound(name.into()))?;
            let size = ty
                .size()
                .ok_or_else(|| DumpError::UnknownSize(name.into()))?;
            let align = self.types.alignment(&ty);
            Ok((ty, size, align))
        })?;
        trace!("layout {pattern:?}: {} bytes, {:?}", layout.size, layout.pack);
        Ok(self
            .layouts
            .write()
            .entry(pattern.into())
            .or_insert_with(|| Arc::new(layout))
            .clone())
    }

    pub fn create_value(&self, address: u64, type_name: &str) -> Value {
        Value::at(address, self.types.lookup_or_unresolved(type_name))
    }

    pub fn create_value_from_data(&self, data: impl Into<Arc<[u8]>>, type_name: &str) -> Value {
        Value::from_data(data, self.types.lookup_or_unresolved(type_name))
    }

    /// A detached pointer to `target_name` holding `address`
    pub fn create_pointer_value(&self, address: u64, target_name: &str) -> Value {
        let target = self.types.lookup_or_unresolved(target_name);
        let ty = self.types.create_pointer_type(&target);
        self.create_pointer_value_of(address, &ty)
    }

    pub fn create_pointer_value_of(&self, address: u64, pointer_type: &Type) -> Value {
        let data = uint_to_bytes(address as u128, self.ptr_size(), self.is_big_endian());
        Value::from_data(data, pointer_type.clone())
    }

    /// Plausibility check of a reference count
    pub fn check_ref(&self, count: i64) -> DumpResult<()> {
        check!(
            (-1..=2_000_000).contains(&count),
            "implausible reference count {count}"
        );
        Ok(())
    }

    pub fn check_pointer(&self, pointer: u64) -> DumpResult<()> {
        if pointer == 0 {
            return Ok(());
        }
        self.read_raw_memory(pointer, 1).map(|_| ())
    }

    /// Evaluate an expression through the backend.
    ///
    /// Backends may call into the inferior to do this, which can change its memory.
    pub fn evaluate(&self, expr: &str) -> DumpResult<Option<Value>> {
        Ok(self
            .backend
            .parse_and_evaluate(expr)?
            .map(|native| self.from_native(native)))
    }

    pub fn from_native(&self, native: NativeValue) -> Value {
        let ty = self.types.lookup_or_unresolved(&native.type_name);
        match (native.address, native.data) {
            (Some(address), Some(data)) => Value::from_data(data, ty).with_address(address),
            (None, Some(data)) => Value::from_data(data, ty),
            (Some(address), None) => Value::at(address, ty),
            (None, None) => Value::from_data(Vec::new(), ty).out_of_scope(),
        }
    }

    /// Symbolic rendering of a code address: `0x401000 <main>`
    pub fn pretty_symbol(&self, address: u64) -> String {
        match self.backend.symbol_at(address) {
            Some(symbol) => format!("0x{address:x} <{}>", demangle(&symbol)),
            None => format!("0x{address:x}"),
        }
    }

    /// The most derived type of a polymorphic object, the static type if that cannot be told
    pub fn dynamic_type(&self, value: &Value) -> Type {
        let Some(address) = value.address() else {
            return value.ty.clone();
        };
        if !value.ty.has_vtable() {
            return value.ty.clone();
        }
        let key = (address, value.ty.id.clone());
        if let Some(ty) = self.step_types.read().get(&key) {
            return ty.clone();
        }
        let ty = match self.resolve_dynamic_type(address) {
            Ok(Some(ty)) => ty,
            Ok(None) => value.ty.clone(),
            Err(err) => {
                debug!("dynamic type of {} at 0x{address:x}: {err}", value.ty.name);
                value.ty.clone()
            }
        };
        self.step_types
            .write()
            .entry(key)
            .or_insert(ty)
            .clone()
    }

    fn resolve_dynamic_type(&self, address: u64) -> DumpResult<Option<Type>> {
        let vtable = self.extract_pointer(address)?;
        if !could_be_pointer(vtable, self.ptr_size()) {
            return Err(DumpError::DynamicType(format!("bad vtable pointer 0x{vtable:x}")));
        }
        if let Some(ty) = self.vtables.read().get(&vtable) {
            return Ok(ty.clone());
        }
        let ty = self
            .backend
            .symbol_at(vtable)
            .and_then(|symbol| class_of_vtable_symbol(&symbol))
            .and_then(|class| self.types.lookup(&class))
            .filter(|ty| ty.strip_typedefs().code.is_struct_like());
        self.vtables.write().insert(vtable, ty.clone());
        Ok(ty)
    }
}

pub fn demangle(symbol: &str) -> String {
    if !symbol.starts_with("_Z") {
        return symbol.to_string();
    }
    cpp_demangle::Symbol::new(symbol)
        .ok()
        .map(|s| s.to_string())
        .unwrap_or_else(|| symbol.to_string())
}

/// Class name from the symbol of a vtable address:
/// `vtable for Derived+16`, `_ZTV7Derived+16` or ``module!Derived::`vftable'``
pub fn class_of_vtable_symbol(symbol: &str) -> Option<String> {
    let symbol = match symbol.rsplit_once('+') {
        Some((name, offset))
            if offset.trim_start_matches("0x").chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            name
        }
        _ => symbol,
    };
    let symbol = demangle(symbol.trim());
    if let Some(class) = symbol.strip_prefix("vtable for ") {
        return Some(class.trim().to_string());
    }
    let symbol = match symbol.split_once('!') {
        Some((_module, name)) => name,
        None => symbol.as_str(),
    };
    symbol
        .find("::`vftable'")
        .map(|pos| symbol[..pos].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtable_symbols() {
        assert_eq!(class_of_vtable_symbol("vtable for Derived+16").as_deref(), Some("Derived"));
        assert_eq!(class_of_vtable_symbol("_ZTV7Derived+0x10").as_deref(), Some("Derived"));
        assert_eq!(
            class_of_vtable_symbol("app!ns::Derived::`vftable'").as_deref(),
            Some("ns::Derived")
        );
        assert_eq!(class_of_vtable_symbol("main"), None);
    }

    #[test]
    fn demangled() {
        assert_eq!(demangle("_ZN3foo3barEv"), "foo::bar()");
        assert_eq!(demangle("main"), "main");
    }
}
