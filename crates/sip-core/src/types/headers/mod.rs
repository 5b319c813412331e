//! Header storage: names, lazily parsed field values and the ordered multimap.

pub mod field_value;
pub mod header_map;
pub mod header_name;

pub use field_value::{FieldType, HeaderFieldValue, ParsedField};
pub use header_map::{HeaderEntry, Headers};
pub use header_name::HeaderName;
