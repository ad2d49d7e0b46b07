//! An arena-backed reader for EDN (Extensible Data Notation).
//!
//! ```
//! let doc = quick_edn::parse_str(r#"{:name "edn" :tags #{:fast :lazy} :version 1}"#)?;
//! let root = doc.root();
//! assert_eq!(root.get_keyword("name").and_then(|v| v.as_str()), Some("edn"));
//! assert_eq!(root.get_keyword("tags").map(|v| v.len()), Some(2));
//! # Ok::<(), quick_edn::Error>(())
//! ```
//!
//! Tag readers get the document's [`Arena`] to allocate into, but cannot
//! reset it:
//!
//! ```compile_fail
//! let mut arena = quick_edn::Arena::new("");
//! arena.clear();
//! ```

pub mod arena;
pub mod decode;
pub mod encode;
pub mod error;
pub mod num;
pub mod options;
pub mod text;
pub mod value;

pub use crate::arena::{Arena, ArenaStorage, ValueId};
pub use crate::decode::registry::{ReaderRegistry, TagReader};
pub use crate::decode::{
    forms, parse, parse_nul_terminated, parse_prefix, parse_str, parse_str_with_options,
    parse_with_options, parse_with_storage, Document, Forms,
};
pub use crate::encode::{to_edn_string, to_json, to_json_string};
pub use crate::error::{Error, ErrorKind, Location};
pub use crate::options::{DefaultReaderMode, EofValue, ParseOptions, DEFAULT_MAX_DEPTH};
pub use crate::value::cmp::{compare, equals};
pub use crate::value::{BigDecimalRef, BigIntRef, NameRef, ValueRef, ValueType};

pub type Result<T> = std::result::Result<T, Error>;
