//! # JotDB Codec
//!
//! JSON line encoding/decoding for JotDB.
//!
//! Every record in a JotDB journal is one JSON object per line. This
//! crate owns that format: it turns documents into lines and lines back
//! into records, round-tripping the value types JSON cannot express
//! natively.
//!
//! ## Line Format
//!
//! - A document line holds the id under `"$id$"` plus the fields:
//!   `{"$id$":"a1","name":"Ann"}`
//! - A deletion line holds an op tag instead of fields:
//!   `{"$id$":"a1","$op$":"$del$"}`
//! - Dates, sets, maps and regexps travel as type-tagged objects:
//!   `{"$type$":"date","time":86400000}`
//!
//! Unknown op or type tags are decode errors, never silently dropped:
//! a journal written by a newer format fails loudly instead of losing
//! data.
//!
//! ## Usage
//!
//! ```
//! use jotdb_codec::{deserialize, serialize, Fields, Record, Value};
//!
//! let mut fields = Fields::new();
//! fields.insert("name".to_string(), Value::from("Ann"));
//! fields.insert("born".to_string(), Value::Date(631_152_000_000));
//!
//! let line = serialize("a1", &fields).unwrap();
//! match deserialize(&line).unwrap() {
//!     Record::Doc { id, fields: decoded } => {
//!         assert_eq!(id, "a1");
//!         assert_eq!(decoded, fields);
//!     }
//!     Record::Delete { .. } => unreachable!(),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod tags;
mod value;

pub use decoder::{deserialize, Record};
pub use encoder::{serialize, serialize_delete};
pub use error::{CodecError, CodecResult};
pub use value::{Fields, Value};
