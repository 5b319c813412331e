//! SIP value types used by the message model and the transaction layer.

pub mod cseq;
pub mod headers;
pub mod method;
pub mod name_addr;
pub mod param;
pub mod status;
pub mod tuple;
pub mod uri;
pub mod via;

pub use cseq::CSeq;
pub use headers::{FieldType, HeaderEntry, HeaderFieldValue, HeaderName, Headers};
pub use method::Method;
pub use name_addr::NameAddr;
pub use param::{Param, Params};
pub use status::StatusCode;
pub use tuple::{TransportType, Tuple};
pub use uri::Uri;
pub use via::{Via, BRANCH_MAGIC_COOKIE};
