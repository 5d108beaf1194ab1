use std::fmt;

use thiserror::Error;

use crate::{
    compiler::CompileError,
    eval::EvalError,
    location::{Location, Span},
    parser::ReadError,
};

/// Any failure of processing one unit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    /// Renders the error against the code of its unit, with the offending
    /// source and every underlying cause.
    pub fn diagnose(&self, code: &str) -> String {
        let resolver = Resolver::new(code);
        let resolved = match self {
            Self::Read(error) => resolver.resolve_error(error).ok(),
            Self::Compile(error) => resolver.resolve_error(error).ok(),
            Self::Eval(_) => None,
        };
        let mut text = match resolved {
            Some(resolved) => resolved.to_string(),
            None => format!("error: {self}\n"),
        };
        let mut cause = std::error::Error::source(self);
        while let Some(error) = cause {
            text.push_str(&format!("caused by: {error}\n"));
            cause = error.source();
        }
        text
    }
}

#[derive(Debug, Error)]
pub enum InvalidLocation {
    #[error("location {0} is invalid")]
    Unknown(Location),
}

#[derive(Debug, Error)]
pub enum InvalidSpan {
    #[error("invalid start")]
    Start(#[source] InvalidLocation),
    #[error("invalid end")]
    End(#[source] InvalidLocation),
    #[error("bad span order, start {}, end {}", .0.start, .0.end)]
    BadOrder(Span),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResolvedLocation {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResolvedSpan<'a> {
    pub start: ResolvedLocation,
    pub end: ResolvedLocation,
    pub content: &'a str,
}

impl<'a> fmt::Display for ResolvedSpan<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedError<'a> {
    pub span: ResolvedSpan<'a>,
    pub message: String,
}

impl<'a> fmt::Display for ResolvedError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error in {}: {}\n>>> {}\n",
            self.span,
            self.message,
            self.span.content.trim_end(),
        )
    }
}

impl<'a> std::error::Error for ResolvedError<'a> {}

pub trait LangError: fmt::Display {
    fn span(&self) -> Span;
}

impl<'a, E> LangError for &'a E
where
    E: LangError + ?Sized,
{
    fn span(&self) -> Span {
        (**self).span()
    }
}

#[derive(Debug)]
pub struct Resolver<'a> {
    input: &'a str,
    newlines: Vec<usize>,
}

impl<'a> Resolver<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            newlines: input
                .char_indices()
                .filter(|(_, char)| *char == '\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    fn find_line(&self, location: Location) -> usize {
        match self.newlines.binary_search(&location) {
            Ok(i) => i + 1,
            Err(i) => i + 1,
        }
    }

    fn find_column(&self, line: usize, location: Location) -> usize {
        match (line - 1).checked_sub(1) {
            Some(prev_line) => location - self.newlines[prev_line],
            None => location + 1,
        }
    }

    pub fn resolve_location(
        &self,
        location: Location,
    ) -> Result<ResolvedLocation, InvalidLocation> {
        if location > self.input.len() {
            Err(InvalidLocation::Unknown(location))?
        }
        let line = self.find_line(location);
        let column = self.find_column(line, location);
        Ok(ResolvedLocation { line, column, index: location })
    }

    pub fn resolve_span(
        &self,
        span: Span,
    ) -> Result<ResolvedSpan<'a>, InvalidSpan> {
        if span.start > span.end {
            Err(InvalidSpan::BadOrder(span))?
        }
        let start =
            self.resolve_location(span.start).map_err(InvalidSpan::Start)?;
        let end = self.resolve_location(span.end).map_err(InvalidSpan::End)?;
        let content = self.input.get(span.start .. span.end).unwrap_or_default();
        Ok(ResolvedSpan { start, end, content })
    }

    pub fn resolve_error<T>(
        &self,
        error: T,
    ) -> Result<ResolvedError<'a>, InvalidSpan>
    where
        T: LangError,
    {
        let span = self.resolve_span(error.span())?;
        let message = error.to_string();
        Ok(ResolvedError { span, message })
    }
}
