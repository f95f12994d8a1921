//! Zman lexer: converts formula text into tokens.
use zman_syntax::error::{Error, Result};
use zman_syntax::token::{Position, Token, TokenKind};
use zman_syntax::vocab;

/// Streaming character scanner that produces tokens with positions.
pub struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

/// Saved scanner state for speculative look-ahead.
#[derive(Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    /// Create a new lexer over the given formula text.
    pub fn new(input: &str) -> Self {
        Self {
            src: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }
    fn peek_next(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }
    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        ch
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn reset(&mut self, m: Mark) {
        self.pos = m.pos;
        self.line = m.line;
        self.col = m.col;
    }

    fn text_since(&self, m: Mark) -> String {
        self.src[m.pos..self.pos].iter().collect()
    }

    /// Skips whitespace, `// line` comments and `/* block */` comments.
    /// An unterminated block comment runs to the end of input.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '/' && self.peek_next() == Some('/') {
                while let Some(c2) = self.peek() {
                    if c2 == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if c == '/' && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                while self.peek().is_some() {
                    if self.peek() == Some('*') && self.peek_next() == Some('/') {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_digits(&mut self, s: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    /// Numbers, and durations recognised by their suffix.
    fn read_number(&mut self) -> Token {
        let start = self.mark();
        let pos = self.position();
        let mut s = String::new();
        self.read_digits(&mut s);
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            s.push('.');
            self.advance();
            self.read_digits(&mut s);
        }

        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Token::new(TokenKind::Number, s, pos);
        }

        let suffix = self.read_word();
        match suffix.as_str() {
            "min" | "hr" => Token::new(TokenKind::Duration, self.text_since(start), pos),
            "h" => {
                self.try_compound_minutes();
                Token::new(TokenKind::Duration, self.text_since(start), pos)
            }
            _ => Token::new(TokenKind::Illegal, self.text_since(start), pos),
        }
    }

    /// After `Nh`, consumes ` Mmin` when it follows; otherwise restores the
    /// scanner so the continuation is lexed on its own.
    fn try_compound_minutes(&mut self) {
        let saved = self.mark();
        let mut skipped = false;
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
            skipped = true;
        }
        if !skipped || !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.reset(saved);
            return;
        }
        let mut minutes = String::new();
        self.read_digits(&mut minutes);
        if self.read_word() != "min" {
            self.reset(saved);
        }
    }

    fn read_ident_or_keyword(&mut self) -> Token {
        let pos = self.position();
        let word = self.read_word();
        Token::new(vocab::classify(&word), word, pos)
    }

    fn read_reference(&mut self) -> Token {
        let pos = self.position();
        self.advance(); // '@'
        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Token::new(TokenKind::Illegal, "@", pos);
        }
        let key = self.read_word();
        Token::new(TokenKind::Reference, key, pos)
    }

    /// Reads a `"`-delimited string. An unterminated string consumes the rest
    /// of the input instead of failing, so half-typed formulas still lex.
    fn read_string(&mut self) -> Token {
        let pos = self.position();
        self.advance(); // opening quote
        let mut s = String::new();
        while let Some(c) = self.advance() {
            match c {
                '"' => break,
                '\\' => {
                    if let Some(n) = self.advance() {
                        let esc = match n {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        };
                        s.push(esc);
                    }
                }
                other => s.push(other),
            }
        }
        Token::new(TokenKind::String, s, pos)
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let pos = self.position();
        let c = self.advance().map(String::from).unwrap_or_default();
        Token::new(kind, c, pos)
    }

    /// `first` alone is `alone`; followed by `second` it is `pair`.
    fn one_or_two(&mut self, second: char, pair: TokenKind, alone: TokenKind) -> Token {
        let pos = self.position();
        let start = self.mark();
        self.advance();
        if self.peek() == Some(second) {
            self.advance();
            Token::new(pair, self.text_since(start), pos)
        } else {
            Token::new(alone, self.text_since(start), pos)
        }
    }

    /// Produces the next token, including `Illegal` ones; never fails.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let c = match self.peek() {
            None => return Token::new(TokenKind::Eof, "", self.position()),
            Some(c) => c,
        };
        match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            ',' => self.single(TokenKind::Comma),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '>' => self.one_or_two('=', TokenKind::GreaterEq, TokenKind::Greater),
            '<' => self.one_or_two('=', TokenKind::LessEq, TokenKind::Less),
            '=' => self.one_or_two('=', TokenKind::EqEq, TokenKind::Illegal),
            '!' => self.one_or_two('=', TokenKind::NotEq, TokenKind::Illegal),
            '&' => self.one_or_two('&', TokenKind::AndAnd, TokenKind::Illegal),
            '|' => self.one_or_two('|', TokenKind::OrOr, TokenKind::Illegal),
            '@' => self.read_reference(),
            '"' => self.read_string(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.read_ident_or_keyword(),
            _ => self.single(TokenKind::Illegal),
        }
    }

    /// Tokenize the entire input into a vector of tokens ending with Eof.
    ///
    /// The first illegal token is reported as a syntax error.
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tk = self.next_token();
            match tk.kind {
                TokenKind::Illegal => return Err(illegal_token_error(&tk)),
                TokenKind::Eof => {
                    tokens.push(tk);
                    break;
                }
                _ => tokens.push(tk),
            }
        }
        Ok(tokens)
    }
}

/// Tokenizes `text` in one call.
pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    Lexer::new(text).tokenize()
}

fn illegal_token_error(tk: &Token) -> Error {
    let lit = tk.literal.as_str();
    let err = match lit {
        "@" => Error::syntax("expected a formula key after '@'")
            .with_suggestion("References name another formula, for example @alos_hashachar"),
        "=" => Error::syntax("unexpected '=' (did you mean '=='?)"),
        "!" => Error::syntax("unexpected '!' (did you mean '!='?)"),
        "&" => Error::syntax("unexpected '&' (did you mean '&&'?)"),
        "|" => Error::syntax("unexpected '|' (did you mean '||'?)"),
        l if l.starts_with(|c: char| c.is_ascii_digit()) => {
            Error::syntax(format!("invalid duration '{}'", l))
                .with_suggestion("Durations are written as Nmin, Nhr, Nh or Nh Mmin, for example 72min or 1h 30min")
        }
        l => Error::syntax(format!("unexpected character '{}'", l)),
    };
    err.at(tk.pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("lexing should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn function_call_token_sequence() {
        use TokenKind::*;
        assert_eq!(
            kinds("solar(16.1, before_sunrise)"),
            vec![Function, LParen, Number, Comma, Direction, RParen, Eof]
        );
    }

    #[test]
    fn classifies_words() {
        use TokenKind::*;
        assert_eq!(
            kinds("if else sunrise shaos gra custom season foo"),
            vec![If, Else, Primitive, Function, Base, Base, ConditionVar, Ident, Eof]
        );
    }

    #[test]
    fn operators_are_greedy() {
        use TokenKind::*;
        assert_eq!(
            kinds(">= > <= < == != && || + - * / { }"),
            vec![
                GreaterEq, Greater, LessEq, Less, EqEq, NotEq, AndAnd, OrOr, Plus, Minus, Star,
                Slash, LBrace, RBrace, Eof
            ]
        );
    }

    #[test]
    fn duration_literals() {
        let toks = tokenize("72min 1hr 2h 1h 30min").unwrap();
        let lits: Vec<_> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Duration)
            .map(|t| t.literal.as_str())
            .collect();
        assert_eq!(lits, vec!["72min", "1hr", "2h", "1h 30min"]);
    }

    #[test]
    fn compound_duration_backtracks() {
        use TokenKind::*;
        let toks = tokenize("2h 5").unwrap();
        assert_eq!(toks[0].kind, Duration);
        assert_eq!(toks[0].literal, "2h");
        assert_eq!(toks[1].kind, Number);
        assert_eq!(toks[1].literal, "5");
        assert_eq!(toks[1].pos, Position::new(1, 4));

        let toks = tokenize("1h + 30min").unwrap();
        assert_eq!(toks.iter().map(|t| t.kind).collect::<Vec<_>>(), vec![Duration, Plus, Duration, Eof]);
    }

    #[test]
    fn references_drop_the_at_sign() {
        let toks = tokenize("@alos + 5min").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Reference);
        assert_eq!(toks[0].literal, "alos");
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(kinds("sunrise // offset below\n- 72min"), vec![Primitive, Minus, Duration, Eof]);
        assert_eq!(kinds("sunrise /* dawn */ - 72min"), vec![Primitive, Minus, Duration, Eof]);
        assert_eq!(kinds("sunrise /* never closed"), vec![Primitive, Eof]);
    }

    #[test]
    fn positions_track_lines() {
        let toks = tokenize("sunrise\n  - 72min").unwrap();
        assert_eq!(toks[0].pos, Position::new(1, 1));
        assert_eq!(toks[1].pos, Position::new(2, 3));
        assert_eq!(toks[2].pos, Position::new(2, 5));
    }

    #[test]
    fn unterminated_string_is_lenient() {
        let toks = tokenize("\"winter").unwrap();
        assert_eq!(toks[0].kind, TokenKind::String);
        assert_eq!(toks[0].literal, "winter");
        assert_eq!(toks[1].kind, TokenKind::Eof);
    }

    #[test]
    fn illegal_characters_are_errors() {
        let err = tokenize("sunrise # 5").unwrap_err();
        assert_eq!(err.kind, zman_syntax::ErrorKind::Syntax);
        assert!(err.msg.contains("'#'"));
        assert_eq!((err.line, err.col), (Some(1), Some(9)));

        let err = tokenize("sunrise - 72minutes").unwrap_err();
        assert!(err.msg.contains("invalid duration '72minutes'"));
        assert!(err.suggestion.is_some());

        assert!(tokenize("a = b").unwrap_err().msg.contains("=="));
        assert!(tokenize("@ + 1").unwrap_err().msg.contains("after '@'"));
    }
}
