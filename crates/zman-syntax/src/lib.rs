pub mod ast;
pub mod duration;
pub mod error;
pub mod token;
pub mod types;
pub mod vocab;

pub use ast::*;
pub use duration::parse_duration;
pub use error::*;
pub use token::*;
pub use types::*;
