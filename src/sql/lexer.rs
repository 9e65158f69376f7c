//! SQL lexer for DDL dumps.

/// SQL token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Create,
    Alter,
    Add,
    Table,
    Only,
    Primary,
    Key,
    Foreign,
    References,
    Not,
    Null,
    Unique,
    Default,
    On,
    Constraint,
    Index,
    If,
    Exists,
    Check,

    // Identifiers and literals
    Ident(String),
    /// `"x"`, `` `x` `` or `[x]`; never folded.
    QuotedIdent(String),
    Str(String),
    Num(String),

    // Symbols
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,

    // End of input
    Eof,
}

/// SQL lexer over a borrowed dump.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&mut pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn skip_line_comment(&mut self) {
        self.eat_while(|c| c != '\n');
    }

    fn skip_block_comment(&mut self) {
        // Opening "/*" already consumed.
        while let Some(c) = self.bump() {
            if c == '*' && self.peek() == Some('/') {
                self.bump();
                break;
            }
        }
    }

    /// Read up to `close`; a doubled `close` is an escaped literal.
    fn read_delimited(&mut self, close: char, backslash_escapes: bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == close {
                if self.peek() == Some(close) {
                    self.bump();
                    out.push(c);
                } else {
                    break;
                }
            } else if c == '\\' && backslash_escapes {
                match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => break,
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        let mut seen_dot = false;
        self.eat_while(|c| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                c.is_ascii_digit()
            }
        });
        self.src[start..self.pos].to_string()
    }

    fn keyword_or_ident(word: &str) -> Token {
        match word.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "ALTER" => Token::Alter,
            "ADD" => Token::Add,
            "TABLE" => Token::Table,
            "ONLY" => Token::Only,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "FOREIGN" => Token::Foreign,
            "REFERENCES" => Token::References,
            "NOT" => Token::Not,
            "NULL" => Token::Null,
            "UNIQUE" => Token::Unique,
            "DEFAULT" => Token::Default,
            "ON" => Token::On,
            "CONSTRAINT" => Token::Constraint,
            "INDEX" => Token::Index,
            "IF" => Token::If,
            "EXISTS" => Token::Exists,
            "CHECK" => Token::Check,
            _ => Token::Ident(word.to_string()),
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.eat_while(char::is_whitespace);

            let Some(c) = self.peek() else {
                return Token::Eof;
            };

            match c {
                '-' if self.peek_next() == Some('-') => self.skip_line_comment(),
                '-' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => {
                    return Token::Num(self.read_number());
                }
                '/' if self.peek_next() == Some('*') => {
                    self.bump();
                    self.bump();
                    self.skip_block_comment();
                }
                '#' => self.skip_line_comment(),
                '(' | ')' | ',' | ';' | '.' => {
                    self.bump();
                    return match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        ';' => Token::Semicolon,
                        _ => Token::Dot,
                    };
                }
                '"' | '`' => {
                    self.bump();
                    return Token::QuotedIdent(self.read_delimited(c, false));
                }
                '[' => {
                    self.bump();
                    return Token::QuotedIdent(self.read_delimited(']', false));
                }
                '\'' => {
                    self.bump();
                    return Token::Str(self.read_delimited('\'', true));
                }
                c if c.is_ascii_digit() => return Token::Num(self.read_number()),
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.eat_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                    return Self::keyword_or_ident(word);
                }
                _ => {
                    // Operators, casts and other punctuation carry nothing for DDL.
                    self.bump();
                }
            }
        }
    }

    /// Collect all tokens, ending with `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }
}
