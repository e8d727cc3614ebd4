use std::fs;
use std::path::{Path, PathBuf};

use super::directive::Directive;
use super::error::{ConfigError, Result};
use super::lexer::{Lexer, Token, TokenKind};

/// Recursive-descent parser over the token stream, building a generic
/// directive tree. `include` directives are resolved and spliced into the
/// enclosing block's children rather than kept as a node of their own.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    base_dir: PathBuf,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn at_rbrace(&self) -> bool {
        matches!(self.peek().kind, TokenKind::RBrace)
    }

    /// Parses directives until `}` or EOF, splicing `include` results in.
    fn parse_block(&mut self) -> Result<Vec<Directive>> {
        let mut directives = Vec::new();
        while !self.at_eof() && !self.at_rbrace() {
            let parsed = self.parse_directive()?;
            match parsed {
                Parsed::One(d) if d.name == "include" => {
                    let pattern = d
                        .args
                        .first()
                        .ok_or_else(|| ConfigError::at("include requires a path argument", d.loc))?;
                    directives.extend(self.resolve_include(pattern, d.loc)?);
                }
                Parsed::One(d) => directives.push(d),
            }
        }
        Ok(directives)
    }

    fn resolve_include(&self, pattern: &str, loc: super::lexer::Loc) -> Result<Vec<Directive>> {
        let path = self.base_dir.join(pattern);
        let contents = fs::read_to_string(&path)
            .map_err(|e| ConfigError::at(format!("cannot include '{pattern}': {e}"), loc))?;
        parse_source(&contents, path.parent().unwrap_or(&self.base_dir))
    }

    fn parse_directive(&mut self) -> Result<Parsed> {
        let name_tok = self.bump();
        let name = match name_tok.kind {
            TokenKind::Ident(s) => s,
            other => {
                return Err(ConfigError::at(
                    format!("expected directive name, found {other:?}"),
                    name_tok.loc,
                ));
            }
        };

        let mut args = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Ident(s) => {
                    args.push(s.clone());
                    self.bump();
                }
                TokenKind::Str(s) => {
                    args.push(s.clone());
                    self.bump();
                }
                TokenKind::Tilde => {
                    args.push("~".to_string());
                    self.bump();
                }
                TokenKind::LBrace | TokenKind::Semicolon | TokenKind::Eof | TokenKind::RBrace => {
                    break;
                }
            }
        }

        match self.peek().kind {
            TokenKind::Semicolon => {
                self.bump();
                Ok(Parsed::One(Directive {
                    name,
                    args,
                    children: Vec::new(),
                    loc: name_tok.loc,
                }))
            }
            TokenKind::LBrace => {
                self.bump();
                let children = self
                    .parse_block()
                    .map_err(|e| e.with_context(format!("{name} block")))?;
                match self.peek().kind {
                    TokenKind::RBrace => {
                        self.bump();
                    }
                    _ => {
                        return Err(ConfigError::at(
                            format!("unterminated '{name}' block"),
                            name_tok.loc,
                        ));
                    }
                }
                Ok(Parsed::One(Directive {
                    name,
                    args,
                    children,
                    loc: name_tok.loc,
                }))
            }
            _ => Err(ConfigError::at(
                format!("directive '{name}' must end with ';' or a block"),
                name_tok.loc,
            )),
        }
    }
}

enum Parsed {
    One(Directive),
}

pub fn parse_source(src: &str, base_dir: &Path) -> Result<Vec<Directive>> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        base_dir: base_dir.to_path_buf(),
    };
    parser.parse_block()
}

pub fn parse_file(path: &Path) -> Result<Vec<Directive>> {
    let contents = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_source(&contents, base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_blocks_and_semicolon_directives() {
        let src = r#"
            http {
                server {
                    listen 8080;
                    server_name example.com;
                    location / {
                        root ./www;
                    }
                }
            }
        "#;
        let tree = parse_source(src, Path::new(".")).unwrap();
        assert_eq!(tree.len(), 1);
        let http = &tree[0];
        assert_eq!(http.name, "http");
        let server = http.child("server").unwrap();
        assert_eq!(server.child("listen").unwrap().args, vec!["8080"]);
        let location = server.child("location").unwrap();
        assert_eq!(location.args, vec!["/"]);
    }

    #[test]
    fn rejects_unterminated_block() {
        let src = "http { server { listen 8080; ";
        assert!(parse_source(src, Path::new(".")).is_err());
    }
}
