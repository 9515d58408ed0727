pub mod pack;
pub mod validator;

pub use pack::{pack, unpack};
pub use validator::{validate, ValidationResult, ValidatorSpec};
