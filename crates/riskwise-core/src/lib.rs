//! Core domain model and collaborator contracts for riskwise.

pub mod apply;
pub mod context;
pub mod error;
pub mod field;
pub mod form;
pub mod protocol;
pub mod suggest;
pub mod templates;

pub use error::{GatewayError, ParseError, SuggestError};
pub use field::{EntityType, FieldShape, FieldType};
pub use protocol::*;
