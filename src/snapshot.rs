//!
//! An in-process backend over a snapshot of memory.
//!
//! Serves dumps of core files and crash reports as well as tests: memory regions, type
//! definitions, symbols and evaluable expressions are registered up front; ranges can be made
//! unreadable and the target can be marked as gone.
//!

use crate::{
    backend::{Backend, NativeValue},
    error::*,
    memory::ReadMemory,
    registry::TypeRegistry,
    types::{canonical_name, TypeData},
};

use core::ops::Range;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub type TypeFactory = Box<dyn Fn(&TypeRegistry) -> Option<TypeData> + Send + Sync>;

pub struct MemorySnapshot {
    ptr_size: usize,
    big_endian: bool,
    windows: bool,
    regions: BTreeMap<u64, Vec<u8>>,
    faults: Vec<Range<u64>>,
    types: HashMap<String, TypeFactory>,
    symbols: BTreeMap<u64, String>,
    expressions: HashMap<String, NativeValue>,
    alive: AtomicBool,
    reads: AtomicUsize,
}

impl Default for MemorySnapshot {
    fn default() -> Self {
        Self::new(8, false)
    }
}

impl MemorySnapshot {
    pub fn new(ptr_size: usize, big_endian: bool) -> Self {
        Self {
            ptr_size,
            big_endian,
            windows: false,
            regions: Default::default(),
            faults: vec![],
            types: Default::default(),
            symbols: Default::default(),
            expressions: Default::default(),
            alive: AtomicBool::new(true),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn windows(mut self, windows: bool) -> Self {
        self.windows = windows;
        self
    }

    /// Map `data` at `address`; an existing region starting there is replaced
    pub fn map(&mut self, address: u64, data: impl Into<Vec<u8>>) -> &mut Self {
        self.regions.insert(address, data.into());
        self
    }

    /// Overwrite mapped bytes
    pub fn write(&mut self, address: u64, data: &[u8]) -> DumpResult<()> {
        let (base, region) = self
            .regions
            .range_mut(..=address)
            .next_back()
            .ok_or_else(|| DumpError::unreadable(address, data.len()))?;
        let offset = (address - base) as usize;
        let dest = region
            .get_mut(offset..offset + data.len())
            .ok_or_else(|| DumpError::unreadable(address, data.len()))?;
        dest.copy_from_slice(data);
        Ok(())
    }

    /// Make every read touching `range` fail
    pub fn fault(&mut self, range: Range<u64>) -> &mut Self {
        self.faults.push(range);
        self
    }

    pub fn define_type(
        &mut self,
        name: &str,
        factory: impl Fn(&TypeRegistry) -> Option<TypeData> + Send + Sync + 'static,
    ) -> &mut Self {
        self.types.insert(canonical_name(name), Box::new(factory));
        self
    }

    pub fn define_symbol(&mut self, address: u64, name: impl Into<String>) -> &mut Self {
        self.symbols.insert(address, name.into());
        self
    }

    pub fn define_expression(&mut self, expr: impl Into<String>, value: NativeValue) -> &mut Self {
        self.expressions.insert(expr.into(), value);
        self
    }

    /// Simulate the inferior going away
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Number of memory reads served or refused so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ReadMemory for MemorySnapshot {
    fn read_memory(&self, address: u64, size: usize) -> DumpResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.alive.load(Ordering::SeqCst) {
            return Err(DumpError::NoTarget);
        }
        let end = address
            .checked_add(size as u64)
            .ok_or_else(|| DumpError::unreadable(address, size))?;
        if self.faults.iter().any(|r| r.start < end && address < r.end) {
            return Err(DumpError::unreadable(address, size));
        }

        let mut result = Vec::with_capacity(size);
        let mut cursor = address;
        while cursor < end {
            let (base, region) = self
                .regions
                .range(..=cursor)
                .next_back()
                .ok_or_else(|| DumpError::unreadable(address, size))?;
            let offset = (cursor - base) as usize;
            if offset >= region.len() {
                return Err(DumpError::unreadable(address, size));
            }
            let n = (region.len() - offset).min((end - cursor) as usize);
            result.extend_from_slice(&region[offset..offset + n]);
            cursor += n as u64;
        }
        Ok(result)
    }
}

impl Backend for MemorySnapshot {
    fn pointer_size(&self) -> usize {
        self.ptr_size
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    fn is_windows_target(&self) -> bool {
        self.windows
    }

    fn check_target(&self) -> DumpResult<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DumpError::NoTarget)
        }
    }

    fn lookup_native_type(&self, name: &str, types: &TypeRegistry) -> Option<TypeData> {
        let factory = self.types.get(canonical_name(name).as_str())?;
        factory(types)
    }

    fn symbol_at(&self, address: u64) -> Option<String> {
        let (base, name) = self.symbols.range(..=address).next_back()?;
        Some(if *base == address {
            name.clone()
        } else {
            format!("{name}+0x{:x}", address - base)
        })
    }

    fn parse_and_evaluate(&self, expr: &str) -> DumpResult<Option<NativeValue>> {
        self.check_target()?;
        Ok(self.expressions.get(expr.trim()).cloned())
    }
}
