use std::str::Chars;

use thiserror::Error;

use crate::{
    error::LangError,
    form::{Number, Sign},
    location::{Location, Span, Spanned},
    mangle::is_identifier_char,
    token::{NativeFragment, Punctuation, Shorthand, Token},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string")]
    UnterminatedString(Span),
    #[error("invalid escape sequence, only \\\" and \\\\ are allowed")]
    InvalidEscape(Span),
    #[error("unterminated inline host block")]
    UnterminatedNative(Span),
    #[error("expected an identifier after `\\`")]
    FunctionRefName(Location),
    #[error("invalid character")]
    InvalidChar(Location),
}

impl LangError for LexError {
    fn span(&self) -> Span {
        match self {
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(span) => *span,
            Self::UnterminatedNative(span) => *span,
            Self::FunctionRefName(start) => Span::unitary(*start),
            Self::InvalidChar(start) => Span::unitary(*start),
        }
    }
}

/// Recognizes `[+-]?[0-9]+(\.[0-9]+)?` at the start of `text`, returning the
/// number and its length in bytes.
fn scan_number(text: &str) -> Option<(Number, usize)> {
    let bytes = text.as_bytes();
    let (sign, digits_start) = match bytes.first() {
        Some(b'+') => (Sign::Plus, 1),
        Some(b'-') => (Sign::Minus, 1),
        _ => (Sign::Plus, 0),
    };
    let scan_digits = |from: usize| {
        from + bytes[from ..].iter().take_while(|byte| byte.is_ascii_digit()).count()
    };
    let integral_end = scan_digits(digits_start);
    if integral_end == digits_start {
        return None;
    }
    let mut end = integral_end;
    let mut fractional_digits = String::new();
    if bytes.get(integral_end) == Some(&b'.') {
        let fractional_end = scan_digits(integral_end + 1);
        if fractional_end > integral_end + 1 {
            fractional_digits = text[integral_end + 1 .. fractional_end].to_owned();
            end = fractional_end;
        }
    }
    let number = Number {
        sign,
        integral_digits: text[digits_start .. integral_end].to_owned(),
        fractional_digits,
    };
    Some((number, end))
}

#[derive(Debug, Clone)]
pub struct Lexer<'input> {
    full_input: &'input str,
    position: usize,
    current: Option<char>,
    chars: Chars<'input>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        let mut chars = input.chars();
        let current = chars.next();
        Lexer { full_input: input, position: 0, current, chars }
    }

    pub fn position(&self) -> Location {
        self.position
    }

    pub fn remainder(&self) -> &'input str {
        &self.full_input[self.position ..]
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let current = self.current?;
        let position = self.position;
        self.current = self.chars.next();
        self.position += current.len_utf8();
        Some((position, current))
    }

    fn advance_bytes(&mut self, count: usize) {
        let target = self.position + count;
        while self.position < target && self.advance().is_some() {}
    }

    fn lookahead(&self) -> Option<char> {
        self.chars.clone().next()
    }

    pub fn skip_whitespace(&mut self) {
        while self.current.is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn spanned(&self, start: usize, token: Token) -> Spanned<Token> {
        Spanned::new(token, Span { start, end: self.position })
    }

    fn lex_comment(&mut self) -> Spanned<Token> {
        let start = self.position;
        self.advance();
        let text_start = self.position;
        while self.current.is_some_and(|ch| ch != '\n' && ch != '\r') {
            self.advance();
        }
        let text = self.full_input[text_start .. self.position].to_owned();
        self.spanned(start, Token::Comment(text))
    }

    fn lex_punct(&mut self, punct: Punctuation) -> Spanned<Token> {
        let start = self.position;
        self.advance();
        self.spanned(start, Token::Punct(punct))
    }

    fn lex_string(&mut self) -> Result<Spanned<Token>, LexError> {
        let start = self.position;
        self.advance();
        let mut value = String::new();
        loop {
            let Some((position, ch)) = self.advance() else {
                Err(LexError::UnterminatedString(Span { start, end: self.position }))?
            };
            match ch {
                '"' => break,
                '\\' => match self.advance() {
                    Some((_, escaped @ ('"' | '\\'))) => value.push(escaped),
                    Some(_) => Err(LexError::InvalidEscape(Span {
                        start: position,
                        end: self.position,
                    }))?,
                    None => Err(LexError::UnterminatedString(Span {
                        start,
                        end: self.position,
                    }))?,
                },
                _ => value.push(ch),
            }
        }
        Ok(self.spanned(start, Token::String(value)))
    }

    fn lex_identifier_text(&mut self) -> String {
        let start = self.position;
        while self.current.is_some_and(is_identifier_char) && !self.at_native_close() {
            self.advance();
        }
        self.full_input[start .. self.position].to_owned()
    }

    fn lex_identifier(&mut self) -> Spanned<Token> {
        let start = self.position;
        let name = self.lex_identifier_text();
        self.spanned(start, Token::Identifier(name))
    }

    fn lex_number_or_identifier(&mut self) -> Spanned<Token> {
        let start = self.position;
        match scan_number(self.remainder()) {
            Some((number, len)) => {
                self.advance_bytes(len);
                self.spanned(start, Token::Number(number))
            },
            None => self.lex_identifier(),
        }
    }

    fn lex_function_ref(&mut self) -> Result<Spanned<Token>, LexError> {
        let start = self.position;
        self.advance();
        if !self.current.is_some_and(is_identifier_char) {
            Err(LexError::FunctionRefName(self.position))?
        }
        let name = self.lex_identifier_text();
        Ok(self.spanned(start, Token::FunctionRef(name)))
    }

    fn lex_hash(&mut self) -> Spanned<Token> {
        let start = self.position;
        match self.lookahead() {
            Some('\'' | '`') => {
                self.advance();
                self.advance();
                self.spanned(start, Token::Shorthand(Shorthand::Quasiquote))
            },
            Some('{') => {
                self.advance();
                self.advance();
                self.spanned(start, Token::NativeOpen)
            },
            _ => self.lex_identifier(),
        }
    }

    fn lex_comma(&mut self) -> Spanned<Token> {
        let start = self.position;
        self.advance();
        let shorthand = if self.current == Some('@') {
            self.advance();
            Shorthand::UnquoteSplicing
        } else {
            Shorthand::Unquote
        };
        self.spanned(start, Token::Shorthand(shorthand))
    }

    fn at_native_close(&self) -> bool {
        self.current == Some('#') && self.lookahead() == Some('}')
    }

    /// Lexes the next piece of an inline host block opened at `open`.
    ///
    /// Text is literal, so no whitespace is skipped here.
    pub fn lex_native(
        &mut self,
        open: Span,
    ) -> Result<Spanned<NativeFragment>, LexError> {
        let start = self.position;
        let fragment = match self.current {
            None => Err(LexError::UnterminatedNative(open.to(Span {
                start,
                end: self.position,
            })))?,
            Some('~') => {
                self.advance();
                NativeFragment::Escape
            },
            Some(_) if self.at_native_close() => {
                self.advance();
                self.advance();
                NativeFragment::Close
            },
            Some(_) => {
                while self.current.is_some_and(|ch| ch != '~') && !self.at_native_close() {
                    self.advance();
                }
                NativeFragment::Snippet(self.full_input[start .. self.position].to_owned())
            },
        };
        Ok(Spanned::new(fragment, Span { start, end: self.position }))
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Result<Spanned<Token>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let ch = self.current?;
        let token = match ch {
            ';' => self.lex_comment(),
            '(' => self.lex_punct(Punctuation::OpenParen),
            ')' => self.lex_punct(Punctuation::CloseParen),
            '"' => return Some(self.lex_string()),
            '#' if self.at_native_close() => {
                let error = LexError::InvalidChar(self.position);
                self.advance();
                return Some(Err(error));
            },
            '#' => self.lex_hash(),
            ',' => self.lex_comma(),
            '\\' => return Some(self.lex_function_ref()),
            '+' | '-' | '0' ..= '9' => self.lex_number_or_identifier(),
            _ if is_identifier_char(ch) => self.lex_identifier(),
            _ => {
                let error = LexError::InvalidChar(self.position);
                self.advance();
                return Some(Err(error));
            },
        };
        Some(Ok(token))
    }
}
