use thiserror::Error;

use crate::{
    compiler::{NATIVE_SNIPPET, SpecialForm},
    error::LangError,
    form::Form,
    lexer::{LexError, Lexer},
    location::{Location, Span, Spanned},
    token::{NativeFragment, Punctuation, Shorthand, Token},
};

pub const DEFAULT_NEST_LIMIT: usize = 512;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("too much nesting")]
    NestLimit(Location),
    #[error("unmatched open parenthesis")]
    UnmatchedOpenParen(Span),
    #[error("unmatched close parenthesis")]
    UnmatchedCloseParen(Span),
    #[error("expected an expression")]
    MissingExpression(Location),
    #[error("expected a single expression")]
    TrailingInput(Location),
    #[error("empty inline host block")]
    EmptyNative(Span),
}

impl LangError for ReadError {
    fn span(&self) -> Span {
        match self {
            Self::Lex(error) => error.span(),
            Self::NestLimit(start) => Span::unitary(*start),
            Self::UnmatchedOpenParen(span) => *span,
            Self::UnmatchedCloseParen(span) => *span,
            Self::MissingExpression(start) => Span { start: *start, end: *start },
            Self::TrailingInput(start) => Span::unitary(*start),
            Self::EmptyNative(span) => *span,
        }
    }
}

impl ReadError {
    /// The part of `input` that could not be read.
    pub fn remainder<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.span().start ..).unwrap_or_default()
    }
}

/// Recursive descent reader over the token stream.
#[derive(Debug)]
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    limit: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>, limit: usize) -> Self {
        Self { lexer, limit, depth: 0 }
    }

    /// Reads every form of the input, dropping comments.
    pub fn parse(mut self) -> Result<Vec<Spanned<Form>>, ReadError> {
        let mut forms = Vec::new();
        while let Some(form) = self.next_expression()? {
            forms.push(form);
        }
        Ok(forms)
    }

    /// Reads exactly one form; only whitespace and comments may surround it.
    pub fn parse_one(mut self) -> Result<Spanned<Form>, ReadError> {
        let Some(form) = self.next_expression()? else {
            Err(ReadError::MissingExpression(self.lexer.position()))?
        };
        if let Some(extra) = self.next_expression()? {
            Err(ReadError::TrailingInput(extra.span.start))?
        }
        Ok(form)
    }

    fn next_token(&mut self) -> Result<Option<Spanned<Token>>, ReadError> {
        self.lexer.next().transpose().map_err(ReadError::from)
    }

    fn next_expression(&mut self) -> Result<Option<Spanned<Form>>, ReadError> {
        while let Some(token) = self.next_token()? {
            let form = self.parse_token(token)?;
            if !form.data.is_comment() {
                return Ok(Some(form));
            }
        }
        Ok(None)
    }

    fn require_expression(&mut self) -> Result<Spanned<Form>, ReadError> {
        let location = self.lexer.position();
        self.next_expression()?.ok_or(ReadError::MissingExpression(location))
    }

    fn enter(&mut self, location: Location) -> Result<(), ReadError> {
        if self.limit <= self.depth {
            Err(ReadError::NestLimit(location))?
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_token(
        &mut self,
        token: Spanned<Token>,
    ) -> Result<Spanned<Form>, ReadError> {
        let span = token.span;
        let form = match token.data {
            Token::Number(number) => Form::Number(number),
            Token::String(value) => Form::String { value },
            Token::Identifier(name) => Form::Identifier { name },
            Token::Comment(text) => Form::Comment { text },
            Token::Punct(Punctuation::OpenParen) => {
                return self.parse_compound(span);
            },
            Token::Punct(Punctuation::CloseParen) => {
                Err(ReadError::UnmatchedCloseParen(span))?
            },
            Token::Shorthand(shorthand) => {
                return self.parse_shorthand(span, shorthand);
            },
            Token::FunctionRef(name) => {
                let operator = Spanned::new(
                    Form::identifier("function"),
                    Span::unitary(span.start),
                );
                let operand = Spanned::new(
                    Form::Identifier { name },
                    Span { start: span.start + 1, end: span.end },
                );
                Form::compound(vec![operator, operand])
            },
            Token::NativeOpen => return self.parse_native(span),
        };
        Ok(Spanned::new(form, span))
    }

    fn parse_compound(&mut self, open: Span) -> Result<Spanned<Form>, ReadError> {
        self.enter(open.start)?;
        let mut elements = Vec::new();
        let close = loop {
            let Some(token) = self.next_token()? else {
                Err(ReadError::UnmatchedOpenParen(open))?
            };
            if token.data == Token::Punct(Punctuation::CloseParen) {
                break token.span;
            }
            let element = self.parse_token(token)?;
            if !element.data.is_comment() {
                elements.push(element);
            }
        };
        self.leave();
        Ok(Spanned::new(Form::compound(elements), open.to(close)))
    }

    fn parse_shorthand(
        &mut self,
        prefix: Span,
        shorthand: Shorthand,
    ) -> Result<Spanned<Form>, ReadError> {
        self.enter(prefix.start)?;
        let operand = self.require_expression()?;
        self.leave();
        let span = prefix.to(operand.span);
        let operator = Spanned::new(Form::identifier(shorthand.operator()), prefix);
        Ok(Spanned::new(Form::compound(vec![operator, operand]), span))
    }

    fn parse_native(&mut self, open: Span) -> Result<Spanned<Form>, ReadError> {
        self.enter(open.start)?;
        let mut parts = vec![Spanned::new(Form::identifier(SpecialForm::Native.name()), open)];
        let close = loop {
            let fragment = self.lexer.lex_native(open)?;
            match fragment.data {
                NativeFragment::Close => break fragment.span,
                NativeFragment::Escape => parts.push(self.require_expression()?),
                NativeFragment::Snippet(text) => {
                    let snippet = vec![
                        Spanned::new(Form::identifier(NATIVE_SNIPPET), fragment.span),
                        Spanned::new(Form::string(text), fragment.span),
                    ];
                    parts.push(Spanned::new(Form::compound(snippet), fragment.span));
                },
            }
        };
        self.leave();
        let span = open.to(close);
        if parts.len() == 1 {
            Err(ReadError::EmptyNative(span))?
        }
        Ok(Spanned::new(Form::compound(parts), span))
    }
}

/// Reads all forms of `text`.
pub fn read(text: &str) -> Result<Vec<Spanned<Form>>, ReadError> {
    Parser::new(Lexer::new(text), DEFAULT_NEST_LIMIT).parse()
}

/// Reads the single form of `text`.
pub fn read_one(text: &str) -> Result<Spanned<Form>, ReadError> {
    Parser::new(Lexer::new(text), DEFAULT_NEST_LIMIT).parse_one()
}
