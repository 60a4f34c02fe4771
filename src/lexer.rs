//! Byte-oriented single-pass lexer.
//!
//! Grounded on the reference `lexer/lexer.go` this spec was distilled from:
//! a one-byte-lookahead scanner that classifies identifiers against a fixed
//! keyword table and decodes string escapes eagerly.

use crate::token::{Position, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    read_pos: usize,
    ch: u8,
    line: usize,
    column: usize,
}

const NUL: u8 = 0;

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Self {
            input: input.as_bytes(),
            pos: 0,
            read_pos: 0,
            ch: NUL,
            line: 1,
            column: 0,
        };
        lexer.read_char();
        lexer
    }

    fn position(&self) -> Position {
        Position { line: self.line, column: self.column }
    }

    fn read_char(&mut self) {
        if self.ch == b'\n' {
            self.line += 1;
            self.column = 0;
        } else if self.read_pos > 0 {
            self.column += 1;
        }
        self.ch = if self.read_pos >= self.input.len() { NUL } else { self.input[self.read_pos] };
        self.pos = self.read_pos;
        self.read_pos += 1;
    }

    fn peek_char(&self) -> u8 {
        if self.read_pos >= self.input.len() { NUL } else { self.input[self.read_pos] }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.ch, b' ' | b'\t' | b'\n' | b'\r') {
            self.read_char();
        }
    }

    fn is_ident_start(ch: u8) -> bool {
        ch.is_ascii_alphabetic() || ch == b'_'
    }

    fn is_ident_continue(ch: u8) -> bool {
        ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'.'
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while Self::is_ident_continue(self.ch) {
            self.read_char();
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Reads a numeric literal over its whole digit run in one pass, tracking
    /// whether a `.` was seen and whether a second one appeared (malformed).
    /// Returns the raw text, whether it's a float, and whether it's malformed.
    fn read_number(&mut self) -> (String, bool, bool) {
        let start = self.pos;
        let mut is_float = false;
        let mut malformed = false;
        loop {
            if self.ch.is_ascii_digit() {
                self.read_char();
            } else if self.ch == b'.' && self.peek_char().is_ascii_digit() {
                if is_float {
                    malformed = true;
                }
                is_float = true;
                self.read_char();
            } else {
                break;
            }
        }
        (String::from_utf8_lossy(&self.input[start..self.pos]).into_owned(), is_float, malformed)
    }

    fn read_string(&mut self) -> Result<String, String> {
        let mut raw = String::new();
        loop {
            self.read_char();
            match self.ch {
                NUL => return Err("unterminated string literal".to_string()),
                b'"' => break,
                b'\\' => {
                    self.read_char();
                    match self.ch {
                        b'n' => raw.push('\n'),
                        b't' => raw.push('\t'),
                        b'"' => raw.push('"'),
                        b'\\' => raw.push('\\'),
                        b'u' => {
                            let code = self.read_hex_escape(4)?;
                            let ch = char::from_u32(code).ok_or("invalid \\u escape")?;
                            raw.push(ch);
                        }
                        b'U' => {
                            let code = self.read_hex_escape(8)?;
                            let ch = char::from_u32(code).ok_or("invalid \\U escape")?;
                            raw.push(ch);
                        }
                        other => {
                            raw.push('\\');
                            raw.push(other as char);
                        }
                    }
                }
                ch => raw.push(ch as char),
            }
        }
        Ok(raw)
    }

    fn read_hex_escape(&mut self, digits: usize) -> Result<u32, String> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            self.read_char();
            let digit = (self.ch as char).to_digit(16).ok_or("invalid hex escape digit")?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.position();

        macro_rules! single {
            ($kind:expr) => {{
                let lit = (self.ch as char).to_string();
                self.read_char();
                Token::new($kind, lit, start, self.position())
            }};
        }

        let tok = match self.ch {
            b'=' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    Token::new(TokenKind::Eq, "==", start, self.position())
                } else {
                    single!(TokenKind::Assign)
                }
            }
            b'!' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    Token::new(TokenKind::NotEq, "!=", start, self.position())
                } else {
                    single!(TokenKind::Bang)
                }
            }
            b'<' => {
                if self.peek_char() == b'<' {
                    self.read_char();
                    self.read_char();
                    Token::new(TokenKind::Shl, "<<", start, self.position())
                } else {
                    single!(TokenKind::Lt)
                }
            }
            b'>' => single!(TokenKind::Gt),
            b'^' => single!(TokenKind::Caret),
            b'+' => single!(TokenKind::Plus),
            b'-' => single!(TokenKind::Minus),
            b'*' => single!(TokenKind::Asterisk),
            b'/' => single!(TokenKind::Slash),
            b',' => single!(TokenKind::Comma),
            b';' => single!(TokenKind::Semicolon),
            b':' => single!(TokenKind::Colon),
            b'(' => single!(TokenKind::LParen),
            b')' => single!(TokenKind::RParen),
            b'{' => single!(TokenKind::LBrace),
            b'}' => single!(TokenKind::RBrace),
            b'[' => single!(TokenKind::LBracket),
            b']' => single!(TokenKind::RBracket),
            b'"' => match self.read_string() {
                Ok(decoded) => {
                    self.read_char();
                    Token::new(TokenKind::String, decoded, start, self.position())
                }
                Err(msg) => Token::new(TokenKind::Illegal, msg, start, self.position()),
            },
            NUL => Token::new(TokenKind::Eof, "", start, start),
            ch if Self::is_ident_start(ch) => {
                let literal = self.read_identifier();
                let kind = TokenKind::keyword_for(&literal).unwrap_or(TokenKind::Ident);
                return Token::new(kind, literal, start, self.position());
            }
            ch if ch.is_ascii_digit() => {
                let (literal, is_float, malformed) = self.read_number();
                if malformed {
                    return Token::new(TokenKind::Illegal, "digit formatted incorrect", start, self.position());
                }
                let kind = if is_float { TokenKind::Float } else { TokenKind::Number };
                return Token::new(kind, literal, start, self.position());
            }
            b'.' if self.peek_char().is_ascii_digit() => {
                let (literal, _, malformed) = self.read_number();
                if malformed {
                    return Token::new(TokenKind::Illegal, "digit formatted incorrect", start, self.position());
                }
                return Token::new(TokenKind::Float, literal, start, self.position());
            }
            _ => single!(TokenKind::Illegal),
        };
        tok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_basic_program() {
        let src = "var a = 5; var b = a + 10;";
        assert_eq!(
            kinds(src),
            vec![
                TokenKind::Var,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Var,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Ident,
                TokenKind::Plus,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(kinds("== != << ^"), vec![TokenKind::Eq, TokenKind::NotEq, TokenKind::Shl, TokenKind::Caret, TokenKind::Eof]);
    }

    #[test]
    fn console_log_is_single_identifier() {
        let mut lexer = Lexer::new("console.log(1);");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::Ident);
        assert_eq!(tok.literal, "console.log");
    }

    #[test]
    fn string_escapes_decode() {
        let mut lexer = Lexer::new(r#""a\nb\tc\"d\\e""#);
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.literal, "a\nb\tc\"d\\e");
    }

    #[test]
    fn unicode_escape_decodes() {
        let mut lexer = Lexer::new(r#""A""#);
        let tok = lexer.next_token();
        assert_eq!(tok.literal, "A");
    }

    #[test]
    fn float_literal() {
        assert_eq!(kinds("3.14"), vec![TokenKind::Float, TokenKind::Eof]);
    }

    #[test]
    fn second_dot_in_a_digit_run_is_one_illegal_token() {
        let mut lexer = Lexer::new("1.2.3");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::Illegal);
        assert_eq!(tok.literal, "digit formatted incorrect");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn tracks_line_and_column() {
        let mut lexer = Lexer::new("a\nbb");
        let first = lexer.next_token();
        assert_eq!(first.start, Position { line: 1, column: 0 });
        let second = lexer.next_token();
        assert_eq!(second.start, Position { line: 2, column: 0 });
    }
}
