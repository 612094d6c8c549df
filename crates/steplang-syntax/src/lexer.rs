//! Hand-written lexer with line/column tracking.
//!
//! Positions are 1-based lines and 0-based columns, counted in characters
//! (not bytes), matching the spans the viewer maps back onto the editor.

use steplang_core::{Position, Span};

use crate::error::ParseError;
use crate::token::{Token, TokenKind};

/// Tokenizes source text into a token vector ending with an `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.position();
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(start, start),
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_digit() {
                self.number(start)?
            } else if c == '"' || c == '\'' {
                self.string(start)?
            } else if is_ident_start(c) {
                self.ident()
            } else {
                self.punct(start)?
            };

            tokens.push(Token {
                kind,
                span: Span::new(start, self.position()),
            });
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Consumes whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek2() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ParseError::new("unterminated block comment", start))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        let begin = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text: String = self.chars[begin..self.pos].iter().collect();
        text.parse::<f64>()
            .map(TokenKind::Num)
            .map_err(|_| ParseError::new(format!("invalid number literal '{}'", text), start))
    }

    fn string(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        let Some(quote) = self.bump() else {
            return Err(ParseError::new("unterminated string literal", start));
        };
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some(c) if c == quote => value.push(c),
                    Some(c) => {
                        return Err(ParseError::new(
                            format!("unknown escape sequence '\\{}'", c),
                            start,
                        ))
                    }
                    None => return Err(ParseError::new("unterminated string literal", start)),
                },
                Some('\n') | None => {
                    return Err(ParseError::new("unterminated string literal", start))
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn ident(&mut self) -> TokenKind {
        let begin = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.bump();
        }
        let text: String = self.chars[begin..self.pos].iter().collect();
        TokenKind::keyword(&text).unwrap_or(TokenKind::Ident(text))
    }

    fn punct(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        let Some(c) = self.bump() else {
            return Err(ParseError::new("unexpected end of input", start));
        };
        let two = |lexer: &mut Lexer, kind| {
            lexer.bump();
            kind
        };
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semi,
            ':' => TokenKind::Colon,
            '%' => TokenKind::Percent,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '+' if self.peek() == Some('=') => two(self, TokenKind::PlusEq),
            '+' => TokenKind::Plus,
            '-' if self.peek() == Some('=') => two(self, TokenKind::MinusEq),
            '-' => TokenKind::Minus,
            '=' if self.peek() == Some('=') => two(self, TokenKind::EqEq),
            '=' => TokenKind::Eq,
            '!' if self.peek() == Some('=') => two(self, TokenKind::BangEq),
            '!' => TokenKind::Bang,
            '<' if self.peek() == Some('=') => two(self, TokenKind::LtEq),
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => two(self, TokenKind::GtEq),
            '>' => TokenKind::Gt,
            '&' if self.peek() == Some('&') => two(self, TokenKind::AmpAmp),
            '|' if self.peek() == Some('|') => two(self, TokenKind::PipePipe),
            _ => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", c),
                    start,
                ))
            }
        };
        Ok(kind)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
