pub mod parser;

pub use parser::Parser;

use zman_syntax::ast::Node;
use zman_syntax::error::ErrorList;

/// Lexes and parses formula text into an AST.
///
/// Syntax errors abort the pipeline; no partial tree is returned. Every error
/// carries the source line it points into.
pub fn parse(text: &str) -> Result<Node, ErrorList> {
    let tokens = zman_lexer::tokenize(text).map_err(|e| ErrorList::from(e).with_source(text))?;
    Parser::new(tokens)
        .parse_formula()
        .map_err(|errors| errors.with_source(text))
}
