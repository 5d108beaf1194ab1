use crate::{
    form::Number,
    quasiquote::{QUASIQUOTE, UNQUOTE, UNQUOTE_SPLICING},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Punctuation {
    OpenParen,
    CloseParen,
}

/// Prefix shorthands that wrap the following expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Shorthand {
    Quasiquote,
    Unquote,
    UnquoteSplicing,
}

impl Shorthand {
    pub fn operator(self) -> &'static str {
        match self {
            Self::Quasiquote => QUASIQUOTE,
            Self::Unquote => UNQUOTE,
            Self::UnquoteSplicing => UNQUOTE_SPLICING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Number(Number),
    String(String),
    Identifier(String),
    Comment(String),
    Punct(Punctuation),
    Shorthand(Shorthand),
    /// `\name`
    FunctionRef(String),
    /// `#{`
    NativeOpen,
}

/// Pieces of an inline host block, lexed between `#{` and `#}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeFragment {
    Snippet(String),
    /// `~`, followed by one ordinary expression.
    Escape,
    Close,
}
