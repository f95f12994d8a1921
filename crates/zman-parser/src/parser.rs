//! Recursive-descent parser.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! formula    := expression EOF
//! expression := term (("+" | "-") term)*
//! term       := factor (("*" | "/") factor)*
//! factor     := NUMBER | DURATION | STRING | "-" (NUMBER | DURATION)
//!             | PRIMITIVE | REFERENCE | DIRECTION | base | CONDVAR ["(" ")"]
//!             | FUNCTION "(" [expression ("," expression)*] ")"
//!             | "(" expression ")" | conditional
//! base       := "gra" | "mga" | "mga_90" | "mga_120" | "custom" ["(" args ")"]
//! conditional:= "if" "(" or_cond ")" "{" expression "}" ["else" (conditional | "{" expression "}")]
//! or_cond    := and_cond ("||" and_cond)*
//! and_cond   := comparison ("&&" comparison)*
//! comparison := factor [COMPARATOR factor]
//! ```

use zman_syntax::ast::{Base, BinaryOp, ConditionOp, Node, NodeKind};
use zman_syntax::error::{Error, ErrorList, Result};
use zman_syntax::token::{Token, TokenKind};
use zman_syntax::vocab::{self, ConditionVar, Direction, FunctionName, Primitive};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Errors recorded while recovering inside argument lists.
    errors: Vec<Error>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", pos));
        }
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind, msg: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(Error::syntax(format!("{}, found {}", msg, found)).at(found.pos))
        }
    }

    /// Parses a complete formula: one expression followed by end of input.
    pub fn parse_formula(&mut self) -> std::result::Result<Node, ErrorList> {
        if self.check(TokenKind::Eof) {
            let err = Error::syntax("empty formula")
                .at(self.peek().pos)
                .with_suggestion("A formula needs at least one term, for example sunrise - 72min");
            return Err(ErrorList::from(err));
        }
        match self.parse_expression() {
            Ok(node) => {
                if !self.check(TokenKind::Eof) {
                    let tok = self.peek().clone();
                    self.errors.push(
                        Error::syntax(format!("unexpected token {} after expression", tok))
                            .at(tok.pos)
                            .with_suggestion("Join terms with an operator such as + or -"),
                    );
                }
                if self.errors.is_empty() {
                    Ok(node)
                } else {
                    Err(ErrorList::from(std::mem::take(&mut self.errors)))
                }
            }
            Err(e) => {
                self.errors.push(e);
                Err(ErrorList::from(std::mem::take(&mut self.errors)))
            }
        }
    }

    pub fn parse_expression(&mut self) -> Result<Node> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Node::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Node> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Node::binary(op, left, right);
        }
        Ok(left)
    }

    /// Parses a factor. Tokens are only consumed on success so argument-list
    /// recovery can resynchronise on the offending token.
    fn parse_factor(&mut self) -> Result<Node> {
        let tok = self.peek().clone();
        let pos = tok.pos;
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Node::new(NodeKind::Number(parse_number(&tok)?), pos))
            }
            TokenKind::Duration => {
                self.advance();
                let minutes = zman_syntax::parse_duration(&tok.literal).ok_or_else(|| {
                    Error::syntax(format!("invalid duration '{}'", tok.literal)).at(pos)
                })?;
                Ok(Node::new(NodeKind::Duration { minutes, text: tok.literal }, pos))
            }
            TokenKind::String => {
                self.advance();
                Ok(Node::new(NodeKind::String(tok.literal), pos))
            }
            TokenKind::Minus => self.parse_negative_literal(),
            TokenKind::Primitive => {
                self.advance();
                let p = Primitive::from_name(&tok.literal).ok_or_else(|| unknown_word(&tok))?;
                Ok(Node::new(NodeKind::Primitive(p), pos))
            }
            TokenKind::Function => {
                self.advance();
                self.parse_call(tok)
            }
            TokenKind::Reference => {
                self.advance();
                Ok(Node::new(NodeKind::Reference(tok.literal), pos))
            }
            TokenKind::Direction => {
                self.advance();
                let d = Direction::from_name(&tok.literal).ok_or_else(|| unknown_word(&tok))?;
                Ok(Node::new(NodeKind::Direction(d), pos))
            }
            TokenKind::Base => {
                self.advance();
                self.parse_base(tok)
            }
            TokenKind::ConditionVar => {
                self.advance();
                let v = ConditionVar::from_name(&tok.literal).ok_or_else(|| unknown_word(&tok))?;
                // `season()` reads like a call; accept the empty parens.
                if self.check(TokenKind::LParen) && self.peek_next().kind == TokenKind::RParen {
                    self.advance();
                    self.advance();
                }
                Ok(Node::new(NodeKind::ConditionVar(v), pos))
            }
            TokenKind::If => {
                self.advance();
                self.parse_conditional(tok)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "expected ')' to close '('")
                    .map_err(|e| e.with_suggestion(format!("The '(' at {} is never closed", pos)))?;
                Ok(inner)
            }
            TokenKind::Ident => Err(unknown_word(&tok)),
            TokenKind::Eof => Err(Error::syntax("unexpected end of formula")
                .at(pos)
                .with_suggestion("The formula stops before the expression is complete")),
            _ => Err(Error::syntax(format!("unexpected token {}", tok)).at(pos)),
        }
    }

    /// Unary minus, allowed only directly before a number or duration literal.
    fn parse_negative_literal(&mut self) -> Result<Node> {
        let minus = self.advance();
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Node::new(NodeKind::Number(-parse_number(&tok)?), minus.pos))
            }
            TokenKind::Duration => {
                self.advance();
                let text = format!("-{}", tok.literal);
                let minutes = zman_syntax::parse_duration(&text).ok_or_else(|| {
                    Error::syntax(format!("invalid duration '{}'", tok.literal)).at(tok.pos)
                })?;
                Ok(Node::new(NodeKind::Duration { minutes, text }, minus.pos))
            }
            _ => Err(Error::syntax("unary minus can only be applied to a number or duration")
                .at(minus.pos)
                .with_suggestion("Subtract from a time instead, for example sunrise - 72min")),
        }
    }

    fn parse_call(&mut self, name_tok: Token) -> Result<Node> {
        let name = FunctionName::from_name(&name_tok.literal).ok_or_else(|| unknown_word(&name_tok))?;
        let open = self
            .expect(TokenKind::LParen, &format!("expected '(' after '{}'", name_tok.literal))
            .map_err(|e| e.with_suggestion(format!("Usage: {}", name.signature())))?;
        let args = self.parse_arguments(&open, name.name())?;
        Ok(Node::new(NodeKind::Function { name, args }, name_tok.pos))
    }

    /// Parses arguments after an opening paren through the closing paren.
    ///
    /// An argument that fails to parse is recorded and skipped so the other
    /// arguments still get checked; a missing `)` fails immediately.
    fn parse_arguments(&mut self, open: &Token, owner: &str) -> Result<Vec<Node>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            match self.parse_expression() {
                Ok(a) => args.push(a),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize_argument();
                }
            }
            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(args);
                }
                TokenKind::Eof => {
                    return Err(Error::syntax(format!("missing ')' to close the arguments of {}", owner))
                        .at(open.pos));
                }
                _ => {
                    let tok = self.peek();
                    return Err(Error::syntax(format!(
                        "expected ',' or ')' in the arguments of {}, found {}",
                        owner, tok
                    ))
                    .at(tok.pos));
                }
            }
        }
    }

    /// Skips to the next `,` or `)` at the current nesting level.
    fn synchronize_argument(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::Eof => return,
                TokenKind::Comma | TokenKind::RParen if depth == 0 => return,
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_base(&mut self, tok: Token) -> Result<Node> {
        let mut base = Base::from_name(&tok.literal).ok_or_else(|| unknown_word(&tok))?;
        if let Base::Custom(args) = &mut base {
            if self.check(TokenKind::LParen) {
                let open = self.advance();
                *args = self.parse_arguments(&open, "custom")?;
            }
        }
        Ok(Node::new(NodeKind::Base(base), tok.pos))
    }

    fn parse_conditional(&mut self, if_tok: Token) -> Result<Node> {
        self.expect(TokenKind::LParen, "expected '(' after 'if'")?;
        let condition = self.parse_or_condition()?;
        self.expect(TokenKind::RParen, "expected ')' to close the condition")?;
        self.expect(TokenKind::LBrace, "expected '{' before the if-branch")?;
        let then_branch = self.parse_expression()?;
        self.expect(TokenKind::RBrace, "expected '}' after the if-branch")?;

        let else_branch = if self.check(TokenKind::Else) {
            self.advance();
            if self.check(TokenKind::If) {
                let nested_if = self.advance();
                Some(Box::new(self.parse_conditional(nested_if)?))
            } else {
                self.expect(TokenKind::LBrace, "expected '{' or 'if' after 'else'")?;
                let e = self.parse_expression()?;
                self.expect(TokenKind::RBrace, "expected '}' after the else-branch")?;
                Some(Box::new(e))
            }
        } else {
            None
        };

        Ok(Node::new(
            NodeKind::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            if_tok.pos,
        ))
    }

    fn parse_or_condition(&mut self) -> Result<Node> {
        let mut left = self.parse_and_condition()?;
        while self.check(TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and_condition()?;
            left = Node::condition(ConditionOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and_condition(&mut self) -> Result<Node> {
        let mut left = self.parse_comparison()?;
        while self.check(TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Node::condition(ConditionOp::And, left, right);
        }
        Ok(left)
    }

    /// `factor [comparator factor]`; without a comparator the bare factor is
    /// the condition.
    fn parse_comparison(&mut self) -> Result<Node> {
        let left = self.parse_factor()?;
        let op = match self.peek().kind {
            TokenKind::Greater => ConditionOp::Gt,
            TokenKind::Less => ConditionOp::Lt,
            TokenKind::GreaterEq => ConditionOp::Ge,
            TokenKind::LessEq => ConditionOp::Le,
            TokenKind::EqEq => ConditionOp::Eq,
            TokenKind::NotEq => ConditionOp::Ne,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_factor()?;
        Ok(Node::condition(op, left, right))
    }
}

fn parse_number(tok: &Token) -> Result<f64> {
    tok.literal
        .parse::<f64>()
        .map_err(|_| Error::syntax(format!("invalid number '{}'", tok.literal)).at(tok.pos))
}

fn unknown_word(tok: &Token) -> Error {
    let err = Error::syntax(format!("unknown identifier '{}'", tok.literal)).at(tok.pos);
    match vocab::closest_match(&tok.literal) {
        Some(w) => err.with_suggestion(format!("Did you mean '{}'?", w)),
        None => err.with_suggestion(format!(
            "To use another formula's result, write a reference: @{}",
            tok.literal
        )),
    }
}
