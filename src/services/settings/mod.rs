pub mod document;
pub mod form;
pub mod schema;

pub use document::{SettingsDocument, UpdatePayload};
pub use form::{FieldDescriptor, FieldValue, FormError, SettingsForm};
pub use schema::{FieldKind, SectionSpec};
