pub mod error;
pub mod types;
pub mod value;

pub use error::{DocError, Result};
pub use types::StoredRow;
pub use value::{Cell, Scalar};
