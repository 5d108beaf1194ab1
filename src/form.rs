use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::{Span, SpanlessEq, Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sign {
    #[default]
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
        }
    }
}

/// A number literal as written: the digits are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Number {
    pub sign: Sign,
    pub integral_digits: String,
    /// Digits after the dot, empty when the literal has none.
    pub fractional_digits: String,
}

impl Number {
    pub fn integer(sign: Sign, digits: impl Into<String>) -> Self {
        Self {
            sign,
            integral_digits: digits.into(),
            fractional_digits: String::new(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.to_string().parse().ok()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign == Sign::Minus {
            write!(f, "-")?;
        }
        write!(f, "{}", self.integral_digits)?;
        if !self.fractional_digits.is_empty() {
            write!(f, ".{}", self.fractional_digits)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "lowercase")]
pub enum Form {
    Number(Number),
    String { value: String },
    Identifier { name: String },
    Compound { elements: Vec<Spanned<Form>> },
    Comment { text: String },
}

impl Form {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String { value: value.into() }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }

    pub fn compound(elements: Vec<Spanned<Form>>) -> Self {
        Self::Compound { elements }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier { name } => Some(name),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&[Spanned<Form>]> {
        match self {
            Self::Compound { elements } => Some(elements),
            _ => None,
        }
    }

    /// Name of the operator identifier heading a compound, if any.
    pub fn head_name(&self) -> Option<&str> {
        self.as_compound()?.first()?.data.as_identifier()
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Self::Comment { .. })
    }
}

impl Spanned<Form> {
    /// Moves the whole tree to `span`.
    pub fn anchor(&mut self, span: Span) {
        self.span = span;
        if let Form::Compound { elements } = &mut self.data {
            for element in elements {
                element.anchor(span);
            }
        }
    }
}

impl SpanlessEq for Number {}

impl SpanlessEq for Form {
    fn spanless_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Compound { elements: lhs }, Self::Compound { elements: rhs }) => {
                lhs.spanless_eq(rhs)
            },
            (Self::Compound { .. }, _) | (_, Self::Compound { .. }) => false,
            _ => self == other,
        }
    }
}

/// Prints forms back in reader syntax.
impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::String { value } => {
                write!(f, "\"")?;
                for ch in value.chars() {
                    if ch == '"' || ch == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{ch}")?;
                }
                write!(f, "\"")
            },
            Self::Identifier { name } => write!(f, "{name}"),
            Self::Compound { elements } => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", element.data)?;
                }
                write!(f, ")")
            },
            Self::Comment { text } => write!(f, ";{text}"),
        }
    }
}
