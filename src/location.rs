use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type Location = usize;

/// Byte range of a piece of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn unitary(start: Location) -> Self {
        Self { start, end: start + 1 }
    }

    pub fn anywhere() -> Self {
        Self::default()
    }

    pub fn is_anywhere(&self) -> bool {
        *self == Self::anywhere()
    }

    pub fn to(self, other: Span) -> Self {
        Self { start: self.start, end: other.end }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Spanned<T> {
    pub data: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(data: T, span: Span) -> Self {
        Self { data, span }
    }

    pub fn anywhere(data: T) -> Self {
        Self { data, span: Span::anywhere() }
    }

    pub fn map<U, F>(self, mapper: F) -> Spanned<U>
    where
        F: FnOnce(T) -> U,
    {
        Spanned { data: mapper(self.data), span: self.span }
    }
}

/// Spans are metadata: the canonical serialization carries only the data.
impl<T> Serialize for Spanned<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.data.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Spanned<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Self::anywhere)
    }
}

pub trait SpanlessEq: Eq {
    fn spanless_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl SpanlessEq for Span {
    fn spanless_eq(&self, _other: &Self) -> bool {
        true
    }
}

impl SpanlessEq for String {}

impl<T> SpanlessEq for Spanned<T>
where
    T: SpanlessEq,
{
    fn spanless_eq(&self, other: &Self) -> bool {
        self.data.spanless_eq(&other.data)
    }
}

impl<T> SpanlessEq for Vec<T>
where
    T: SpanlessEq,
{
    fn spanless_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().zip(other).all(|(lhs, rhs)| lhs.spanless_eq(rhs))
    }
}
