//! Virtual operations: the compiled form of a program, one step above
//! emitted host text.

use std::{collections::BTreeMap, rc::Rc};

use crate::{form::Form, location::Spanned};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub required: Vec<Param>,
    pub optional: Vec<Param>,
    pub keyword: Vec<Param>,
    pub rest: Option<Param>,
    pub all_keys: Option<Param>,
}

impl Signature {
    /// Smallest accepted number of positional arguments.
    pub fn min_positional(&self) -> usize {
        self.required.len()
    }

    /// Largest accepted number of positional arguments, `None` if unbounded.
    pub fn max_positional(&self) -> Option<usize> {
        match self.rest {
            Some(_) => None,
            None => Some(self.required.len() + self.optional.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallSite {
    pub positional: Vec<Vop>,
    /// Keyed by mangled keyword-argument name.
    pub keyword: BTreeMap<String, Vop>,
}

impl CallSite {
    pub fn positional(positional: Vec<Vop>) -> Self {
        Self { positional, keyword: BTreeMap::new() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub sig: Signature,
    pub body: Vop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativePart {
    Snippet(String),
    Expr(Vop),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Vop {
    Number(f64),
    String(String),
    Ref(String),
    Set { name: String, value: Box<Vop> },
    Fref(String),
    Fset { name: String, value: Box<Vop> },
    Funcall { fun: Box<Vop>, call_site: CallSite },
    /// Shared with the closures created from it.
    Lambda(Rc<Lambda>),
    Progn(Vec<Vop>),
    Quote(Spanned<Form>),
    Macroset { name: String, expander: Box<Vop> },
    Native(Vec<NativePart>),
}

impl Vop {
    pub fn funcall(fun: Vop, call_site: CallSite) -> Self {
        Self::Funcall { fun: Box::new(fun), call_site }
    }

    /// Call of a function by name with positional arguments only.
    pub fn call_named(name: &str, positional: Vec<Vop>) -> Self {
        Self::funcall(Self::Fref(name.to_owned()), CallSite::positional(positional))
    }

    /// Whether inline host code appears anywhere in this tree.
    pub fn has_native(&self) -> bool {
        match self {
            Self::Number(_) | Self::String(_) | Self::Ref(_) | Self::Fref(_) | Self::Quote(_) => {
                false
            },
            Self::Set { value, .. } | Self::Fset { value, .. } => value.has_native(),
            Self::Macroset { expander, .. } => expander.has_native(),
            Self::Funcall { fun, call_site } => {
                fun.has_native()
                    || call_site.positional.iter().any(Vop::has_native)
                    || call_site.keyword.values().any(Vop::has_native)
            },
            Self::Lambda(lambda) => lambda.body.has_native(),
            Self::Progn(vops) => vops.iter().any(Vop::has_native),
            Self::Native(_) => true,
        }
    }
}
