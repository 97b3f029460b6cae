pub use crate::{
    backend::*,
    dumper::{Dumper, DumperRegistry},
    error::*,
    layout::{LayoutKind, StructLayout},
    memory::{ReadMemory, ReadMemoryUtils},
    options::*,
    record::*,
    registry::TypeRegistry,
    session::DumpSession,
    snapshot::MemorySnapshot,
    types::*,
    value::{SplitItem, Value},
};
