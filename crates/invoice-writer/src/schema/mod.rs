//! Message and invoice schemas.
//!
//! Validation is a pure function of the decoded JSON (and, for invoices, the
//! configured validation rules). It never touches storage.

mod types;
mod validator;
mod violation;

pub use types::{DEFAULT_CURRENCY, InboundMessage, Invoice, LineItem, VendorType};
pub use validator::{validate_invoice, validate_message};
pub use violation::{
    Bound, ExpectedType, FieldViolation, MAX_INPUT_CHARS, ROOT_FIELD, SchemaModel, ViolationKind,
    truncate_chars,
};
