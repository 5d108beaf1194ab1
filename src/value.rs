use std::{collections::BTreeMap, fmt, rc::Rc};

use crate::{
    eval::EvalError,
    form::Form,
    location::{SpanlessEq, Spanned},
    machine::Scope,
    mangle::demangle,
    vop::Lambda,
};

/// Keyword arguments of a call, keyed by mangled keyword name.
pub type Record = BTreeMap<String, Value>;

pub type NativeFn = dyn Fn(Arguments) -> Result<Value, EvalError>;

#[derive(Clone)]
pub enum Value {
    Null,
    Number(f64),
    String(Rc<str>),
    Form(Rc<Spanned<Form>>),
    Sequence(Rc<[Value]>),
    Record(Rc<Record>),
    Function(Rc<Function>),
}

pub enum Function {
    Closure { lambda: Rc<Lambda>, scope: Scope },
    Native { name: String, call: Box<NativeFn> },
}

/// What a call supplies: the keyword record and the positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub keywords: Record,
    pub positional: Vec<Value>,
}

impl Arguments {
    pub fn positional(positional: Vec<Value>) -> Self {
        Self { keywords: Record::new(), positional }
    }
}

impl Value {
    pub fn form(form: Spanned<Form>) -> Self {
        Self::Form(Rc::new(form))
    }

    pub fn string(value: &str) -> Self {
        Self::String(Rc::from(value))
    }

    pub fn native<F>(name: impl Into<String>, call: F) -> Self
    where
        F: Fn(Arguments) -> Result<Value, EvalError> + 'static,
    {
        Self::Function(Rc::new(Function::Native {
            name: name.into(),
            call: Box::new(call),
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Form(_) => "form",
            Self::Sequence(_) => "sequence",
            Self::Record(_) => "record",
            Self::Function(_) => "function",
        }
    }

    pub fn as_form(&self) -> Option<&Spanned<Form>> {
        match self {
            Self::Form(form) => Some(form),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Number(lhs), Self::Number(rhs)) => lhs == rhs,
            (Self::String(lhs), Self::String(rhs)) => lhs == rhs,
            (Self::Form(lhs), Self::Form(rhs)) => lhs.spanless_eq(rhs),
            (Self::Sequence(lhs), Self::Sequence(rhs)) => lhs == rhs,
            (Self::Record(lhs), Self::Record(rhs)) => lhs == rhs,
            (Self::Function(lhs), Self::Function(rhs)) => Rc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure { lambda, .. } => {
                f.debug_struct("Closure").field("sig", &lambda.sig).finish_non_exhaustive()
            },
            Self::Native { name, .. } => {
                f.debug_struct("Native").field("name", name).finish_non_exhaustive()
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Number(number) => f.debug_tuple("Number").field(number).finish(),
            Self::String(string) => f.debug_tuple("String").field(string).finish(),
            Self::Form(form) => f.debug_tuple("Form").field(&form.data).finish(),
            Self::Sequence(values) => f.debug_tuple("Sequence").field(values).finish(),
            Self::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Self::Function(function) => fmt::Debug::fmt(function, f),
        }
    }
}

/// Numbers as a JavaScript host prints and reads them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JsNumber(pub f64);

impl fmt::Display for JsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(number) = *self;
        if number.is_nan() {
            write!(f, "NaN")
        } else if number.is_infinite() {
            write!(f, "{}Infinity", if number < 0.0 { "-" } else { "" })
        } else {
            write!(f, "{number}")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Number(number) => write!(f, "{}", JsNumber(*number)),
            Self::String(string) => write!(f, "{string}"),
            Self::Form(form) => write!(f, "{}", form.data),
            Self::Sequence(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            },
            Self::Record(record) => {
                write!(f, "{{")?;
                for (i, (key, value)) in record.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match demangle(key) {
                        Some((_, name)) => write!(f, "{name}: {value}")?,
                        None => write!(f, "{key}: {value}")?,
                    }
                }
                write!(f, "}}")
            },
            Self::Function(function) => match &**function {
                Function::Closure { .. } => write!(f, "#<function>"),
                Function::Native { name, .. } => write!(f, "#<native {name}>"),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::{JsNumber, Record, Value};
    use crate::{
        form::Form,
        location::{Span, Spanned},
        mangle::{Namespace, mangle},
    };

    #[test]
    fn numbers_print_like_javascript() {
        assert_eq!(JsNumber(6.0).to_string(), "6");
        assert_eq!(JsNumber(-1.5).to_string(), "-1.5");
        assert_eq!(JsNumber(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(JsNumber(f64::NEG_INFINITY).to_string(), "-Infinity");
    }

    #[test]
    fn display_values() {
        let mut record = Record::new();
        record.insert(mangle(Namespace::KeywordArg, "file-name"), Value::Number(1.0));
        let values: Rc<[Value]> = vec![Value::string("x"), Value::Null].into();
        assert_eq!(Value::Record(Rc::new(record)).to_string(), "{file-name: 1}");
        assert_eq!(Value::Sequence(values).to_string(), "[x, null]");
        let native = Value::native("twice", |_| Ok(Value::Null));
        assert_eq!(native.to_string(), "#<native twice>");
    }

    #[test]
    fn forms_compare_without_spans() {
        let lhs = Value::form(Spanned::new(Form::identifier("a"), Span { start: 1, end: 2 }));
        let rhs = Value::form(Spanned::anywhere(Form::identifier("a")));
        assert_eq!(lhs, rhs);
        assert_ne!(lhs, Value::string("a"));
    }
}
