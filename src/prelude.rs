//! Common imports.
//!
//! ```rust,no_run
//! use syno_snmp::prelude::*;
//! ```

pub use crate::blocking::Session;
pub use crate::client::Client;
pub use crate::collector::Family;
pub use crate::error::{Error, Result};
pub use crate::oid::Oid;
pub use crate::v3::{AuthProtocol, PrivProtocol};
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
