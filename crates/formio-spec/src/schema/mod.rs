pub mod component;
pub mod form;

pub use component::{Column, ComponentNode, Conditional, ValidateRules};
pub use form::{FormSchema, json_schema};
