//! The embedded host: global namespace, lexical scopes and the native
//! functions every program may rely on.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use tracing::trace;

use crate::{
    eval::{self, Context, EvalError, Evaluate},
    form::Form,
    location::Spanned,
    macro_table::MacroTable,
    mangle::{Namespace, mangle},
    quasiquote::{APPEND_COMPOUNDS, MAKE_COMPOUND},
    value::{Arguments, Value},
    vop::Vop,
};

pub const DEFAULT_CALL_DEPTH_LIMIT: usize = 256;

/// Chain of lexical frames, keyed by mangled variable names. The empty chain
/// is the global scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frame: Option<Rc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Scope,
}

impl Scope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn extend(&self, bindings: HashMap<String, Value>) -> Self {
        let frame = Frame { bindings: RefCell::new(bindings), parent: self.clone() };
        Self { frame: Some(Rc::new(frame)) }
    }

    pub fn lookup(&self, mangled: &str) -> Option<Value> {
        let mut scope = self;
        while let Some(frame) = &scope.frame {
            if let Some(value) = frame.bindings.borrow().get(mangled) {
                return Some(value.clone());
            }
            scope = &frame.parent;
        }
        None
    }

    /// Overwrites the innermost binding of `mangled`. Returns false when no
    /// frame binds it.
    pub fn assign(&self, mangled: &str, value: &Value) -> bool {
        let mut scope = self;
        while let Some(frame) = &scope.frame {
            if let Some(slot) = frame.bindings.borrow_mut().get_mut(mangled) {
                *slot = value.clone();
                return true;
            }
            scope = &frame.parent;
        }
        false
    }
}

#[derive(Debug)]
pub struct Machine {
    globals: HashMap<String, Value>,
    depth: usize,
    depth_limit: usize,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::with_call_depth_limit(DEFAULT_CALL_DEPTH_LIMIT)
    }

    pub fn with_call_depth_limit(depth_limit: usize) -> Self {
        let mut this = Self { globals: HashMap::new(), depth: 0, depth_limit };
        this.define_native(MAKE_COMPOUND, make_compound);
        this.define_native(APPEND_COMPOUNDS, append_compounds);
        this
    }

    pub fn call_depth_limit(&self) -> usize {
        self.depth_limit
    }

    /// Binds a Rust function in the function namespace under `name`.
    pub fn define_native<F>(&mut self, name: &str, call: F)
    where
        F: Fn(Arguments) -> Result<Value, EvalError> + 'static,
    {
        trace!(name, "defining native function");
        self.set_global(Namespace::Function, name, Value::native(name, call));
    }

    pub fn global(&self, namespace: Namespace, name: &str) -> Option<&Value> {
        self.globals.get(&mangle(namespace, name))
    }

    pub fn set_global(&mut self, namespace: Namespace, name: &str, value: Value) {
        self.globals.insert(mangle(namespace, name), value);
    }

    pub(crate) fn lookup(&self, scope: &Scope, mangled: &str) -> Option<Value> {
        scope.lookup(mangled).or_else(|| self.globals.get(mangled).cloned())
    }

    pub(crate) fn assign(&mut self, scope: &Scope, mangled: &str, value: &Value) {
        if !scope.assign(mangled, value) {
            self.globals.insert(mangled.to_owned(), value.clone());
        }
    }

    pub(crate) fn enter_call(&mut self) -> Result<(), EvalError> {
        if self.depth_limit <= self.depth {
            Err(EvalError::StackOverflow(self.depth_limit))?
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.depth -= 1;
    }

    /// Evaluates a compiled unit at top level.
    pub fn run(&mut self, macros: &mut MacroTable, vop: &Vop) -> Result<Value, EvalError> {
        let mut cx = Context { machine: self, macros };
        vop.evaluate(&mut cx, &Scope::global())
    }

    pub fn apply(
        &mut self,
        macros: &mut MacroTable,
        function: &Value,
        arguments: Arguments,
    ) -> Result<Value, EvalError> {
        let mut cx = Context { machine: self, macros };
        eval::call(&mut cx, function, arguments)
    }
}

fn make_compound(arguments: Arguments) -> Result<Value, EvalError> {
    let elements = arguments
        .positional
        .into_iter()
        .map(|argument| match argument {
            Value::Form(form) => Ok(Rc::unwrap_or_clone(form)),
            other => Err(EvalError::NotAForm(other.type_name())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::form(Spanned::anywhere(Form::compound(elements))))
}

fn append_compounds(arguments: Arguments) -> Result<Value, EvalError> {
    let mut elements = Vec::new();
    for argument in &arguments.positional {
        let Some(compound) = argument.as_form().and_then(|form| form.data.as_compound())
        else {
            Err(EvalError::NotACompound(argument.to_string()))?
        };
        elements.extend_from_slice(compound);
    }
    Ok(Value::form(Spanned::anywhere(Form::compound(elements))))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::{Machine, Scope};
    use crate::{
        eval::EvalError,
        form::Form,
        location::Spanned,
        macro_table::MacroTable,
        mangle::Namespace,
        quasiquote::{APPEND_COMPOUNDS, MAKE_COMPOUND},
        value::{Arguments, Value},
    };

    fn ident(name: &str) -> Value {
        Value::form(Spanned::anywhere(Form::identifier(name)))
    }

    fn call(machine: &mut Machine, name: &str, positional: Vec<Value>) -> Result<Value, EvalError> {
        let function = machine.global(Namespace::Function, name).unwrap().clone();
        machine.apply(&mut MacroTable::new(), &function, Arguments::positional(positional))
    }

    #[test]
    fn scope_lookup_and_assign() {
        let outer = Scope::global().extend(HashMap::from([("_v_a".to_owned(), Value::Number(1.0))]));
        let inner = outer.extend(HashMap::from([("_v_b".to_owned(), Value::Number(2.0))]));
        assert_eq!(inner.lookup("_v_a"), Some(Value::Number(1.0)));
        assert!(inner.assign("_v_a", &Value::Number(3.0)));
        assert_eq!(outer.lookup("_v_a"), Some(Value::Number(3.0)));
        assert!(!inner.assign("_v_c", &Value::Null));
        assert_eq!(outer.lookup("_v_b"), None);
    }

    #[test]
    fn assignment_falls_back_to_globals() {
        let mut machine = Machine::new();
        machine.assign(&Scope::global(), "_v_x", &Value::Number(4.0));
        assert_eq!(machine.global(Namespace::Variable, "x"), Some(&Value::Number(4.0)));
    }

    #[test]
    fn make_compound_requires_forms() {
        let mut machine = Machine::new();
        let value = call(&mut machine, MAKE_COMPOUND, vec![ident("a"), ident("b")]).unwrap();
        assert_eq!(value.to_string(), "(a b)");
        let error = call(&mut machine, MAKE_COMPOUND, vec![Value::Number(1.0)]).unwrap_err();
        assert_eq!(error, EvalError::NotAForm("number"));
    }

    #[test]
    fn append_compounds_concatenates() {
        let mut machine = Machine::new();
        let lhs = call(&mut machine, MAKE_COMPOUND, vec![ident("a")]).unwrap();
        let rhs = call(&mut machine, MAKE_COMPOUND, vec![ident("b"), ident("c")]).unwrap();
        let value = call(&mut machine, APPEND_COMPOUNDS, vec![lhs, rhs]).unwrap();
        assert_eq!(value.to_string(), "(a b c)");
        let error = call(&mut machine, APPEND_COMPOUNDS, vec![ident("a")]).unwrap_err();
        assert_eq!(error, EvalError::NotACompound("a".to_owned()));
    }
}
