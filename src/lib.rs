//!
//! Type reconstruction and value pretty-printing for debugger front ends.
//!
//! A [`DumpSession`](session::DumpSession) wraps a [`Backend`](backend::Backend) which supplies raw
//! memory and native type metadata; the [`Dumper`](dumper::Dumper) turns values into a tree of
//! [`Record`](record::Record)s streamed to a [`Sink`](record::Sink).
//!

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

#[macro_use]
pub mod error;
pub mod backend;
pub mod dumper;
pub mod float;
pub mod layout;
pub mod memory;
pub mod options;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod stl;
pub mod template;
pub mod types;
pub mod value;
