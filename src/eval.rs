use std::{collections::HashMap, fmt, rc::Rc};

use thiserror::Error;
use tracing::debug;

use crate::{
    machine::{Machine, Scope},
    macro_table::MacroTable,
    mangle::{Namespace, mangle},
    value::{Arguments, Function, Record, Value},
    vop::{CallSite, Signature, Vop},
};

/// Accepted numbers of positional arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            None => write!(f, "at least {}", self.min),
            Some(max) if max == self.min => write!(f, "{max}"),
            Some(max) => write!(f, "{} to {max}", self.min),
        }
    }
}

impl From<&Signature> for Arity {
    fn from(sig: &Signature) -> Self {
        Self { min: sig.min_positional(), max: sig.max_positional() }
    }
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        self.min <= count && self.max.is_none_or(|max| count <= max)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("variable `{0}` is not bound")]
    Unbound(String),
    #[error("function `{0}` is not defined")]
    Undefined(String),
    #[error("cannot call a {0}")]
    NotAFunction(&'static str),
    #[error("wrong number of arguments: expected {expected}, got {found}")]
    Arity { expected: Arity, found: usize },
    #[error("expected a form, got a {0}")]
    NotAForm(&'static str),
    #[error("cannot splice `{0}`, it is not a compound form")]
    NotACompound(String),
    #[error("inline host code cannot run on the embedded machine")]
    NativeCode,
    #[error("calls nested deeper than {0}")]
    StackOverflow(usize),
    /// Raised by natives defined outside of this crate.
    #[error("{0}")]
    Custom(String),
}

/// What evaluation may touch besides the current scope.
#[derive(Debug)]
pub struct Context<'a> {
    pub machine: &'a mut Machine,
    pub macros: &'a mut MacroTable,
}

pub trait Evaluate {
    fn evaluate(&self, cx: &mut Context<'_>, scope: &Scope) -> Result<Value, EvalError>;
}

impl<'a, T> Evaluate for &'a T
where
    T: Evaluate + ?Sized,
{
    fn evaluate(&self, cx: &mut Context<'_>, scope: &Scope) -> Result<Value, EvalError> {
        (**self).evaluate(cx, scope)
    }
}

impl<T> Evaluate for Box<T>
where
    T: Evaluate + ?Sized,
{
    fn evaluate(&self, cx: &mut Context<'_>, scope: &Scope) -> Result<Value, EvalError> {
        (**self).evaluate(cx, scope)
    }
}

impl Evaluate for Vop {
    fn evaluate(&self, cx: &mut Context<'_>, scope: &Scope) -> Result<Value, EvalError> {
        match self {
            Self::Number(number) => Ok(Value::Number(*number)),
            Self::String(string) => Ok(Value::string(string)),
            Self::Ref(name) => {
                let mangled = mangle(Namespace::Variable, name);
                cx.machine
                    .lookup(scope, &mangled)
                    .ok_or_else(|| EvalError::Unbound(name.clone()))
            },
            Self::Set { name, value } => {
                let value = value.evaluate(cx, scope)?;
                cx.machine.assign(scope, &mangle(Namespace::Variable, name), &value);
                Ok(value)
            },
            Self::Fref(name) => {
                let mangled = mangle(Namespace::Function, name);
                cx.machine
                    .lookup(scope, &mangled)
                    .ok_or_else(|| EvalError::Undefined(name.clone()))
            },
            Self::Fset { name, value } => {
                let value = value.evaluate(cx, scope)?;
                cx.machine.assign(scope, &mangle(Namespace::Function, name), &value);
                Ok(value)
            },
            Self::Funcall { fun, call_site } => {
                let function = fun.evaluate(cx, scope)?;
                let arguments = call_site.evaluate_arguments(cx, scope)?;
                call(cx, &function, arguments)
            },
            Self::Lambda(lambda) => {
                let closure = Function::Closure { lambda: lambda.clone(), scope: scope.clone() };
                Ok(Value::Function(Rc::new(closure)))
            },
            Self::Progn(vops) => {
                let mut last = Value::Null;
                for vop in vops {
                    last = vop.evaluate(cx, scope)?;
                }
                Ok(last)
            },
            Self::Quote(form) => Ok(Value::form(form.clone())),
            Self::Macroset { name, expander } => {
                let expander = expander.evaluate(cx, scope)?;
                debug!(%name, "macro registered");
                cx.macros.define(name, expander);
                Ok(Value::Null)
            },
            Self::Native(_) => Err(EvalError::NativeCode),
        }
    }
}

impl CallSite {
    /// Evaluates the keyword record first, then positional arguments left to
    /// right.
    pub fn evaluate_arguments(
        &self,
        cx: &mut Context<'_>,
        scope: &Scope,
    ) -> Result<Arguments, EvalError> {
        let mut keywords = Record::new();
        for (key, vop) in &self.keyword {
            keywords.insert(key.clone(), vop.evaluate(cx, scope)?);
        }
        let positional = self
            .positional
            .iter()
            .map(|vop| vop.evaluate(cx, scope))
            .collect::<Result<_, _>>()?;
        Ok(Arguments { keywords, positional })
    }
}

/// Calls `function` with the keyword record and positional arguments.
pub fn call(
    cx: &mut Context<'_>,
    function: &Value,
    arguments: Arguments,
) -> Result<Value, EvalError> {
    let Value::Function(function) = function else {
        Err(EvalError::NotAFunction(function.type_name()))?
    };
    match &**function {
        Function::Native { call, .. } => call(arguments),
        Function::Closure { lambda, scope } => {
            let expected = Arity::from(&lambda.sig);
            let found = arguments.positional.len();
            if !expected.accepts(found) {
                Err(EvalError::Arity { expected, found })?
            }
            let scope = scope.extend(bind(&lambda.sig, arguments));
            cx.machine.enter_call()?;
            let result = lambda.body.evaluate(cx, &scope);
            cx.machine.leave_call();
            result
        },
    }
}

/// Binds parameters in declaration order; a later parameter of the same name
/// shadows an earlier one.
fn bind(sig: &Signature, arguments: Arguments) -> HashMap<String, Value> {
    let Arguments { keywords, positional } = arguments;
    let mut bindings = HashMap::new();
    let mut positional = positional.into_iter();
    for param in sig.required.iter().chain(&sig.optional) {
        let value = positional.next().unwrap_or(Value::Null);
        bindings.insert(mangle(Namespace::Variable, &param.name), value);
    }
    if let Some(rest) = &sig.rest {
        let surplus = Value::Sequence(positional.collect());
        bindings.insert(mangle(Namespace::Variable, &rest.name), surplus);
    }
    for param in &sig.keyword {
        let value = keywords
            .get(&mangle(Namespace::KeywordArg, &param.name))
            .cloned()
            .unwrap_or(Value::Null);
        bindings.insert(mangle(Namespace::Variable, &param.name), value);
    }
    if let Some(all_keys) = &sig.all_keys {
        let record = Value::Record(Rc::new(keywords));
        bindings.insert(mangle(Namespace::Variable, &all_keys.name), record);
    }
    bindings
}

#[cfg(test)]
mod test {
    use std::{collections::BTreeMap, rc::Rc};

    use super::{Arity, EvalError};
    use crate::{
        form::Form,
        location::Spanned,
        machine::Machine,
        macro_table::MacroTable,
        mangle::{Namespace, mangle},
        value::{Arguments, Value},
        vop::{CallSite, Lambda, NativePart, Param, Signature, Vop},
    };

    fn run(vop: &Vop) -> Result<Value, EvalError> {
        Machine::new().run(&mut MacroTable::new(), vop)
    }

    fn lambda(sig: Signature, body: Vop) -> Vop {
        Vop::Lambda(Rc::new(Lambda { sig, body }))
    }

    fn params(names: &[&str]) -> Vec<Param> {
        names.iter().copied().map(Param::new).collect()
    }

    fn invoke(fun: Vop, positional: Vec<Vop>) -> Vop {
        Vop::funcall(fun, CallSite::positional(positional))
    }

    #[test]
    fn arity_display() {
        assert_eq!(Arity { min: 2, max: Some(2) }.to_string(), "2");
        assert_eq!(Arity { min: 1, max: Some(3) }.to_string(), "1 to 3");
        assert_eq!(Arity { min: 1, max: None }.to_string(), "at least 1");
    }

    #[test]
    fn globals_and_progn() {
        let vop = Vop::Progn(vec![
            Vop::Set { name: "x".to_owned(), value: Box::new(Vop::Number(1.0)) },
            Vop::Ref("x".to_owned()),
        ]);
        assert_eq!(run(&vop), Ok(Value::Number(1.0)));
        assert_eq!(run(&Vop::Progn(Vec::new())), Ok(Value::Null));
        assert_eq!(run(&Vop::Ref("y".to_owned())), Err(EvalError::Unbound("y".to_owned())));
        assert_eq!(run(&Vop::Fref("f".to_owned())), Err(EvalError::Undefined("f".to_owned())));
    }

    #[test]
    fn variables_and_functions_do_not_collide() {
        let vop = Vop::Progn(vec![
            Vop::Set { name: "f".to_owned(), value: Box::new(Vop::Number(1.0)) },
            Vop::Fset {
                name: "f".to_owned(),
                value: Box::new(lambda(Signature::default(), Vop::Number(2.0))),
            },
            invoke(Vop::Fref("f".to_owned()), Vec::new()),
        ]);
        assert_eq!(run(&vop), Ok(Value::Number(2.0)));
    }

    #[test]
    fn arity_is_checked() {
        let sig = Signature {
            required: params(&["a"]),
            optional: params(&["b"]),
            ..Signature::default()
        };
        let fun = lambda(sig, Vop::Ref("b".to_owned()));
        assert_eq!(run(&invoke(fun.clone(), vec![Vop::Number(1.0)])), Ok(Value::Null));
        let found = run(&invoke(fun.clone(), vec![Vop::Number(1.0), Vop::Number(2.0)]));
        assert_eq!(found, Ok(Value::Number(2.0)));
        let error = run(&invoke(fun, Vec::new())).unwrap_err();
        assert_eq!(error, EvalError::Arity { expected: Arity { min: 1, max: Some(2) }, found: 0 });
    }

    #[test]
    fn rest_and_keywords_bind() {
        let sig = Signature {
            required: params(&["a"]),
            keyword: params(&["size", "color"]),
            rest: Some(Param::new("more")),
            all_keys: Some(Param::new("options")),
            ..Signature::default()
        };
        let body = Vop::Progn(vec![
            Vop::Set { name: "seen".to_owned(), value: Box::new(Vop::Ref("size".to_owned())) },
            Vop::Set { name: "no-color".to_owned(), value: Box::new(Vop::Ref("color".to_owned())) },
            Vop::Set { name: "all".to_owned(), value: Box::new(Vop::Ref("options".to_owned())) },
            Vop::Ref("more".to_owned()),
        ]);
        let call_site = CallSite {
            positional: vec![Vop::Number(1.0), Vop::Number(2.0), Vop::Number(3.0)],
            keyword: BTreeMap::from([(mangle(Namespace::KeywordArg, "size"), Vop::Number(9.0))]),
        };
        let mut machine = Machine::new();
        let value = machine
            .run(&mut MacroTable::new(), &Vop::funcall(lambda(sig, body), call_site))
            .unwrap();
        assert_eq!(value.to_string(), "[2, 3]");
        assert_eq!(machine.global(Namespace::Variable, "seen"), Some(&Value::Number(9.0)));
        assert_eq!(machine.global(Namespace::Variable, "no-color"), Some(&Value::Null));
        let all = machine.global(Namespace::Variable, "all").unwrap();
        assert_eq!(all.to_string(), "{size: 9}");
    }

    #[test]
    fn closures_capture_and_assign_lexically() {
        let sig = Signature { required: params(&["n"]), ..Signature::default() };
        let inner = lambda(
            Signature::default(),
            Vop::Set { name: "n".to_owned(), value: Box::new(Vop::Number(5.0)) },
        );
        let body = Vop::Progn(vec![invoke(inner, Vec::new()), Vop::Ref("n".to_owned())]);
        let mut machine = Machine::new();
        let value = machine
            .run(&mut MacroTable::new(), &invoke(lambda(sig, body), vec![Vop::Number(1.0)]))
            .unwrap();
        assert_eq!(value, Value::Number(5.0));
        assert_eq!(machine.global(Namespace::Variable, "n"), None);
    }

    #[test]
    fn macroset_registers_when_evaluated() {
        let mut macros = MacroTable::new();
        let vop = Vop::Macroset {
            name: "m".to_owned(),
            expander: Box::new(lambda(Signature::default(), Vop::Number(0.0))),
        };
        assert!(macros.is_empty());
        assert_eq!(Machine::new().run(&mut macros, &vop), Ok(Value::Null));
        assert!(macros.lookup("m").is_some());
    }

    #[test]
    fn quote_and_native() {
        let form = Spanned::anywhere(Form::identifier("x"));
        assert_eq!(run(&Vop::Quote(form.clone())), Ok(Value::form(form)));
        let native = Vop::Native(vec![NativePart::Snippet("1".to_owned())]);
        assert_eq!(run(&native), Err(EvalError::NativeCode));
    }

    #[test]
    fn calling_non_functions_fails() {
        let vop = invoke(Vop::Number(1.0), Vec::new());
        assert_eq!(run(&vop), Err(EvalError::NotAFunction("number")));
    }

    #[test]
    fn runaway_recursion_is_stopped() {
        let vop = Vop::Progn(vec![
            Vop::Fset {
                name: "loop".to_owned(),
                value: Box::new(lambda(
                    Signature::default(),
                    invoke(Vop::Fref("loop".to_owned()), Vec::new()),
                )),
            },
            invoke(Vop::Fref("loop".to_owned()), Vec::new()),
        ]);
        let mut machine = Machine::with_call_depth_limit(32);
        let error = machine.run(&mut MacroTable::new(), &vop).unwrap_err();
        assert_eq!(error, EvalError::StackOverflow(32));
        let value = machine.apply(
            &mut MacroTable::new(),
            &Value::native("id", |arguments: Arguments| Ok(arguments.positional[0].clone())),
            Arguments::positional(vec![Value::Number(1.0)]),
        );
        assert_eq!(value, Ok(Value::Number(1.0)));
    }
}
