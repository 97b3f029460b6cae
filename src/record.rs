//!
//! Records produced by the dumper, and the sink receiving them.
//!
//! A record is the abstract shape of one row in the front end's locals view,
//! its textual serialization is owned by whoever implements [`Sink`].
//!

use core::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    Utf16,
    Ucs4,
    Latin1,
    /// raw bytes, hex encoded
    HexBlob,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Utf16 => "utf16",
            Self::Ucs4 => "ucs4",
            Self::Latin1 => "latin1",
            Self::HexBlob => "hex",
        }
    }

    /// Decode raw target bytes into display text
    pub fn decode(&self, data: &[u8], big_endian: bool) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Self::Latin1 => data.iter().map(|&b| b as char).collect(),
            Self::Utf16 => {
                let units = data
                    .chunks_exact(2)
                    .map(|c| {
                        if big_endian {
                            u16::from_be_bytes([c[0], c[1]])
                        } else {
                            u16::from_le_bytes([c[0], c[1]])
                        }
                    })
                    .collect::<Vec<_>>();
                String::from_utf16_lossy(&units)
            }
            Self::Ucs4 => data
                .chunks_exact(4)
                .map(|c| {
                    let v = if big_endian {
                        u32::from_be_bytes([c[0], c[1], c[2], c[3]])
                    } else {
                        u32::from_le_bytes([c[0], c[1], c[2], c[3]])
                    };
                    char::from_u32(v).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect(),
            Self::HexBlob => hex::encode(data),
        }
    }
}

/// Marks a value that was cut short
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Elision {
    /// the full length is known
    Length(usize),
    /// no terminator was found within the limit
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialValue {
    NotAccessible,
    NotCallable,
    OptimizedOut,
    NullReference,
    Empty,
    ItemCount,
    MinimumItemCount,
    UnresolvedType,
    Uninitialized,
}

impl fmt::Display for SpecialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotAccessible => "<not accessible>",
            Self::NotCallable => "<not callable>",
            Self::OptimizedOut => "<optimized out>",
            Self::NullReference => "<null reference>",
            Self::Empty => "<empty>",
            Self::ItemCount => "<items>",
            Self::MinimumItemCount => "<more than items>",
            Self::UnresolvedType => "<unresolved type>",
            Self::Uninitialized => "<uninitialized>",
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCount {
    pub count: usize,
    /// counting exactly was too expensive, `count` is a lower bound
    pub at_least: bool,
}

impl ChildCount {
    #[inline]
    pub fn exact(count: usize) -> Self {
        Self {
            count,
            at_least: false,
        }
    }

    #[inline]
    pub fn at_least(count: usize) -> Self {
        Self {
            count,
            at_least: true,
        }
    }
}

pub const LOAD_MORE_NAME: &str = "<load more>";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub iname: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub value: Option<String>,
    pub encoding: Option<Encoding>,
    pub elided: Option<Elision>,
    pub special: Option<SpecialValue>,
    pub address: Option<u64>,
    pub num_child: Option<ChildCount>,
    pub sort_group: Option<i32>,
    pub auto_deref_count: Option<usize>,
    /// present only if the item was expanded
    pub children: Option<Vec<Record>>,
}

impl Record {
    pub fn new(iname: impl Into<String>, name: Option<String>) -> Self {
        Self {
            iname: iname.into(),
            name,
            ..Default::default()
        }
    }

    /// The sentinel child telling the front end more children exist
    pub fn load_more(parent_iname: &str, total: usize) -> Self {
        Self {
            iname: format!("{parent_iname}.{LOAD_MORE_NAME}"),
            name: Some(LOAD_MORE_NAME.into()),
            type_name: Some(String::new()),
            value: Some(String::new()),
            elided: Some(Elision::Length(total)),
            num_child: Some(ChildCount::exact(1)),
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_load_more(&self) -> bool {
        self.name.as_deref() == Some(LOAD_MORE_NAME)
    }

    #[inline]
    pub fn is_accessible(&self) -> bool {
        self.special != Some(SpecialValue::NotAccessible)
    }

    pub fn child(&self, name: &str) -> Option<&Record> {
        self.children
            .as_ref()?
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
    }

    pub fn child_count(&self) -> usize {
        self.num_child.map(|c| c.count).unwrap_or(0)
    }
}

/// Consumer of the formatted record stream
pub trait Sink {
    fn put_record(&mut self, record: Record);
}

impl Sink for Vec<Record> {
    #[inline]
    fn put_record(&mut self, record: Record) {
        self.push(record);
    }
}
