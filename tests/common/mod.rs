#![allow(dead_code)]

use std::sync::{Arc, Once};
use udump::prelude::*;

pub fn init_logger() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Ok(handle) = flexi_logger::Logger::try_with_env_or_str("info")
            .and_then(|logger| logger.use_utc().start())
        {
            // keep logging for the whole test binary
            std::mem::forget(handle);
        }
    });
}

pub const SAMPLE_ADDR: u64 = 0x10_0000;

/// `struct Sample { int32_t a; int16_t b; char c[4]; }`
pub fn define_sample(snapshot: &mut MemorySnapshot) {
    snapshot.define_type("Sample", |types| {
        let int = types.lookup("int32_t")?;
        let short = types.lookup("int16_t")?;
        let chars = types.create_array_type(&types.lookup("char")?, 4);
        Some(TypeData::structure(
            "Sample",
            12,
            vec![
                Field::new("a", &int, 0),
                Field::new("b", &short, 32),
                Field::new("c", &chars, 48),
            ],
        ))
    });
}

pub fn sample_bytes() -> Vec<u8> {
    vec![7, 0, 0, 0, 0x12, 0, b'a', b'b', b'c', b'd', 0, 0]
}

/// A little endian 64 bit snapshot holding one `Sample` at [`SAMPLE_ADDR`]
pub fn snapshot() -> MemorySnapshot {
    let mut snapshot = MemorySnapshot::new(8, false);
    define_sample(&mut snapshot);
    snapshot.map(SAMPLE_ADDR, sample_bytes());
    snapshot
}

pub fn start(snapshot: MemorySnapshot) -> (Arc<MemorySnapshot>, DumpSession) {
    init_logger();
    let snapshot = Arc::new(snapshot);
    let session = DumpSession::new(snapshot.clone());
    (snapshot, session)
}

pub fn le64(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Concatenate byte pieces
pub fn bytes<const N: usize>(parts: [&[u8]; N]) -> Vec<u8> {
    parts.concat()
}

/// `struct Tagged { int tag; union { int i; float f; }; }` with `payload` typed by `tag`
pub fn define_tagged(snapshot: &mut MemorySnapshot) {
    snapshot.define_type("IntOrFloat", |types| {
        let int = types.lookup("int")?;
        let float = types.lookup("float")?;
        Some(TypeData::union(
            "IntOrFloat",
            4,
            vec![Field::new("i", &int, 0), Field::new("f", &float, 0)],
        ))
    });
    snapshot.define_type("Tagged", |types| {
        let int = types.lookup("int")?;
        let payload = types.lookup("IntOrFloat")?;
        Some(TypeData::structure(
            "Tagged",
            8,
            vec![
                Field::new("tag", &int, 0),
                Field::anonymous(&payload, 32),
                Field::with_extractor("payload", 32, 32, |value, s| {
                    let tag = value.split(s, "i")?[0].as_i64()?;
                    let name = if tag == 0 { "int" } else { "float" };
                    s.types
                        .lookup(name)
                        .ok_or_else(|| DumpError::TypeNotFound(name.into()))
                }),
            ],
        ))
    });
}

pub fn tagged_float(value: f32) -> Vec<u8> {
    bytes([&1i32.to_le_bytes(), &value.to_le_bytes()])
}
