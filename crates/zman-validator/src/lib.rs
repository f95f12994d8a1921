//! Semantic validation of formula ASTs.
//!
//! The validator is a pure pass over a parsed tree: it checks argument
//! counts and ranges, reference existence and operand types without
//! evaluating anything. Every violation is collected so the author sees all
//! of them at once.
//!
//! ```rust
//! use zman_validator::validate_formula;
//!
//! let keys = ["alos".to_string(), "tzeis".to_string()];
//! let result = validate_formula(
//!     "if (month == 1) { solar(100, before_sunrise) } else { @chatzos }",
//!     &keys,
//! );
//! assert!(result.ast.is_some());
//! assert_eq!(result.errors.len(), 2);
//! ```

mod validator;

pub use validator::Validator;

use zman_syntax::ast::Node;
use zman_syntax::error::ErrorList;

/// Validates an AST against the set of formula keys it may reference.
///
/// An empty key set disables the undefined-reference check.
pub fn validate<S: AsRef<str>>(ast: &Node, available_keys: &[S]) -> ErrorList {
    Validator::new(available_keys).validate(ast)
}

/// Outcome of [`validate_formula`]: the tree when the text parsed, and every
/// syntax or semantic error found.
#[derive(Debug, Clone)]
pub struct Validation {
    pub ast: Option<Node>,
    pub errors: ErrorList,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.ast.is_some() && self.errors.is_empty()
    }
}

/// Parses and validates formula text.
pub fn validate_formula<S: AsRef<str>>(text: &str, available_keys: &[S]) -> Validation {
    validate_formula_as(text, available_keys, None)
}

/// Like [`validate_formula`], for the formula stored under `formula_key`
/// (which enables the self-reference check).
pub fn validate_formula_as<S: AsRef<str>>(
    text: &str,
    available_keys: &[S],
    formula_key: Option<&str>,
) -> Validation {
    match zman_parser::parse(text) {
        Ok(ast) => {
            let mut validator = Validator::new(available_keys);
            if let Some(key) = formula_key {
                validator = validator.with_formula_key(key);
            }
            let errors = validator.validate(&ast).with_source(text);
            Validation { ast: Some(ast), errors }
        }
        Err(errors) => Validation { ast: None, errors },
    }
}
