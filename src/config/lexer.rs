use std::fmt;

use super::error::{ConfigError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Tilde,
    LBrace,
    RBrace,
    Semicolon,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

/// Tokenizes an nginx-style directive grammar: bare words and quoted
/// strings as arguments, `{`/`}` for blocks, `;` to end a directive, `#`
/// to end-of-line comments, `~` as a standalone regex-location marker.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn loc(&self) -> Loc {
        Loc {
            line: self.line,
            col: self.col,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn is_special(c: u8) -> bool {
        matches!(c, b'{' | b'}' | b';' | b'#') || c.is_ascii_whitespace()
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();
        let loc = self.loc();
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                loc,
            });
        };
        match c {
            b'{' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::LBrace,
                    loc,
                })
            }
            b'}' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::RBrace,
                    loc,
                })
            }
            b';' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::Semicolon,
                    loc,
                })
            }
            b'~' => {
                self.bump();
                Ok(Token {
                    kind: TokenKind::Tilde,
                    loc,
                })
            }
            b'"' | b'\'' => {
                let quote = c;
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        Some(ch) if ch == quote => break,
                        Some(b'\\') => {
                            if let Some(escaped) = self.bump() {
                                s.push(escaped as char);
                            }
                        }
                        Some(ch) => s.push(ch as char),
                        None => {
                            return Err(ConfigError::at("unterminated string literal", loc));
                        }
                    }
                }
                Ok(Token {
                    kind: TokenKind::Str(s),
                    loc,
                })
            }
            _ => {
                let mut s = String::new();
                while let Some(ch) = self.peek() {
                    if Self::is_special(ch) {
                        break;
                    }
                    s.push(ch as char);
                    self.bump();
                }
                if s.is_empty() {
                    return Err(ConfigError::at(
                        format!("unexpected character '{}'", c as char),
                        loc,
                    ));
                }
                Ok(Token {
                    kind: TokenKind::Ident(s),
                    loc,
                })
            }
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_simple_block() {
        let tokens = Lexer::new("server {\n  listen 8080;\n}\n").tokenize().unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("server".into()),
                TokenKind::LBrace,
                TokenKind::Ident("listen".into()),
                TokenKind::Ident("8080".into()),
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments_and_parses_quoted_strings() {
        let tokens = Lexer::new("# comment\nroot \"/var/www html\";\n")
            .tokenize()
            .unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("root".into()),
                TokenKind::Str("/var/www html".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_tilde_for_regex_locations() {
        let tokens = Lexer::new("location ~ \\.py$ { }").tokenize().unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds[1], TokenKind::Tilde);
    }
}
