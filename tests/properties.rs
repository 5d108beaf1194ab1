use lispjs::{
    Error,
    Session,
    assert_spanless_eq,
    compiler::{CompileError, Compiler},
    emitter::Emit,
    eval::{Arity, EvalError},
    form::Form,
    location::{Span, Spanned},
    machine::Machine,
    macro_table::MacroTable,
    mangle::{Namespace, SUBSTITUTIONS, demangle, mangle},
    parser::{read, read_one},
    value::{Arguments, Value},
    vop::Vop,
};

fn compile(code: &str) -> Result<Vop, CompileError> {
    let mut machine = Machine::new();
    let mut macros = MacroTable::new();
    Compiler::new(&mut machine, &mut macros).compile(read_one(code).unwrap())
}

fn second(arguments: Arguments) -> Result<Value, EvalError> {
    let element = arguments
        .positional
        .first()
        .and_then(Value::as_form)
        .and_then(|form| form.data.as_compound())
        .and_then(|elements| elements.get(1))
        .cloned()
        .ok_or_else(|| EvalError::Custom("second: expected a compound form".to_owned()))?;
    Ok(Value::form(element))
}

fn times(arguments: Arguments) -> Result<Value, EvalError> {
    let mut product = 1.0;
    for argument in &arguments.positional {
        let factor = argument
            .as_number()
            .ok_or_else(|| EvalError::Custom("times: expected numbers".to_owned()))?;
        product *= factor;
    }
    Ok(Value::Number(product))
}

fn session() -> Session {
    let mut session = Session::default();
    session.define_native("second", second);
    session.define_native("times", times);
    session
}

#[test]
fn quoted_forms_survive_emission() {
    let sources = [
        "a",
        "-12.50",
        r#""with \"quotes\" and \\ slashes""#,
        "(a (b \"c\" 1.5) () ,x #'(y ,@z))",
        "(%%native-snippet \"x\")",
    ];
    for source in sources {
        let form = read_one(source).unwrap();
        let text = Emit::expression(&Vop::Quote(form.clone())).to_string();
        let decoded: Spanned<Form> = serde_json::from_str(&text).unwrap();
        assert_spanless_eq!(decoded, form, "source: {source}");
        assert!(decoded.span.is_anywhere());
    }
}

#[test]
fn arity_follows_signature() {
    for required in 0 .. 3 {
        for optional in 0 .. 3 {
            let mut params: Vec<String> = (0 .. required).map(|i| format!("r{i}")).collect();
            if optional > 0 {
                params.push("&opt".to_owned());
                params.extend((0 .. optional).map(|i| format!("o{i}")));
            }
            let lambda = format!("(%%lambda ({}) 0)", params.join(" "));
            let call = |count: usize| format!("(%%funcall {lambda}{})", " 1".repeat(count));

            for count in required ..= required + optional {
                assert_eq!(session().run(&call(count)), Ok(Value::Number(0.0)), "{}", call(count));
            }
            let expected = Arity { min: required, max: Some(required + optional) };
            let found = required + optional + 1;
            assert_eq!(
                session().run(&call(found)),
                Err(Error::Eval(EvalError::Arity { expected, found })),
            );
            if required > 0 {
                let found = required - 1;
                assert_eq!(
                    session().run(&call(found)),
                    Err(Error::Eval(EvalError::Arity { expected, found })),
                );
            }

            let emitted = Emit::expression(&compile(&lambda).unwrap()).to_string();
            let check = format!(
                "lisp_check_arity(arguments.length, {}, {})",
                required + 1,
                required + optional + 1,
            );
            assert!(emitted.contains(&check), "{emitted}");
        }
    }
}

#[test]
fn rest_parameters_accept_any_surplus() {
    let mut session = session();
    session.run("(%%defun tail (%%lambda (a &rest more) more))").unwrap();
    assert_eq!(session.run("(%%funcall (%%function tail) 1)").unwrap().to_string(), "[]");
    let value = session.run("(%%funcall (%%function tail) 1 2 3 4 5 6 7 8)").unwrap();
    assert_eq!(value.to_string(), "[2, 3, 4, 5, 6, 7, 8]");
    assert_eq!(
        session.run("(%%funcall (%%function tail))"),
        Err(Error::Eval(EvalError::Arity { expected: Arity { min: 1, max: None }, found: 0 })),
    );
}

#[test]
fn quasiquote_without_unquotes_is_identity() {
    for source in ["x", "42", "\"s\"", "()", "(a (b \"c\") 1 (()))", "(%%quasiquote (a b))"] {
        let template = read_one(source).unwrap();
        let code = format!("#'{source}");
        let value = session().run(&code).unwrap();
        assert_spanless_eq!(*value.as_form().unwrap(), template, "source: {source}");
    }
}

#[test]
fn unquote_cancels_quasiquote() {
    for source in ["x", "(%%funcall f 1 k: 2)", "(%%progn a b)", "\"s\""] {
        let direct = compile(source).unwrap();
        let through = compile(&format!("#',{source}")).unwrap();
        assert_eq!(through, direct, "source: {source}");
    }
}

#[test]
fn splicing_keeps_order() {
    let mut session = session();
    session.run("(%%defparameter l #'(a b))").unwrap();
    let value = session.run("#'(,@l c)").unwrap();
    let expected = read_one("(a b c)").unwrap();
    assert_spanless_eq!(*value.as_form().unwrap(), expected);

    let value = session.run("#'(x ,@l ,@l y)").unwrap();
    let expected = read_one("(x a b a b y)").unwrap();
    assert_spanless_eq!(*value.as_form().unwrap(), expected);

    session.run("(%%defparameter n 1)").unwrap();
    assert!(matches!(
        session.run("#'(,@n)"),
        Err(Error::Eval(EvalError::NotACompound(_))),
    ));
}

#[test]
fn mangling_is_injective() {
    // Specials next to the letters their substitutes would be confused with.
    let mut alphabet = vec!['a', 'h', 'n', '0'];
    alphabet.extend(SUBSTITUTIONS.iter().map(|(special, _)| *special));
    let mut names = vec![String::new()];
    for first in &alphabet {
        for second in &alphabet {
            for third in &alphabet {
                names.push(format!("{first}{second}{third}"));
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    for namespace in Namespace::ALL {
        for name in &names {
            let mangled = mangle(namespace, name);
            assert!(seen.insert(mangled.clone()), "collision on {mangled}");
            assert_eq!(demangle(&mangled), Some((namespace, name.clone())));
        }
    }
}

#[test]
fn macros_apply_from_the_next_unit() {
    let expander = "(%%lambda (form) \
                    #'(%%funcall (%%function times) 2 ,(%%funcall (%%function second) form)))";
    let mut session = session();

    let error = session.run(&format!("(%%defmacro dbl {expander}) (dbl 3)")).unwrap_err();
    assert!(matches!(
        error,
        Error::Compile(CompileError::UnknownOperator { ref name, .. }) if name == "dbl"
    ));
    assert!(session.macros().lookup("dbl").is_none());

    assert_eq!(session.run(&format!("(%%defmacro dbl {expander})")), Ok(Value::Null));
    assert_eq!(session.run("(dbl 3)"), Ok(Value::Number(6.0)));
    assert_eq!(session.run("(dbl (dbl 5))"), Ok(Value::Number(20.0)));
}

#[test]
fn failing_expanders_leave_state_alone() {
    let mut session = session();
    session.run("(%%defmacro broken (%%lambda (form) (%%funcall (%%function second) 1)))").unwrap();
    session.run("(%%defparameter x 1)").unwrap();
    let error = session.run("(%%progn (%%defparameter x 2) (broken))").unwrap_err();
    assert!(matches!(error, Error::Compile(CompileError::Expansion { .. })));
    assert!(error.diagnose("(%%progn (%%defparameter x 2) (broken))").contains("caused by: second"));
    assert_eq!(session.run("x"), Ok(Value::Number(1.0)));
    assert!(session.macros().lookup("broken").is_some());
}

#[test]
fn expansions_point_at_the_call() {
    let mut session = session();
    session.run("(%%defmacro bad (%%lambda (form) #'(1 2)))").unwrap();
    let code = "  (bad)";
    let error = session.run(code).unwrap_err();
    assert_eq!(error, Error::Compile(CompileError::BadOperator(Span { start: 2, end: 7 })));
    assert!(error.diagnose(code).starts_with("error in 1:3-1:8"));
}

#[test]
fn repeated_keywords_keep_the_last_value() {
    let value = session().run("(%%funcall (%%lambda (&key a) a) a: 1 a: 2)").unwrap();
    assert_eq!(value, Value::Number(2.0));
    let value = session().run("(%%funcall (%%lambda (&key a) a))").unwrap();
    assert_eq!(value, Value::Null);
}

#[test]
fn negative_depth_is_rejected() {
    let mut machine = Machine::new();
    let mut macros = MacroTable::new();
    let mut compiler = Compiler::new(&mut machine, &mut macros);
    let form = read_one("(a ,b)").unwrap();
    let span = form.span;
    assert_eq!(
        compiler.compile_qq(form, -2),
        Err(CompileError::NegativeDepth { depth: -2, span }),
    );
}

#[test]
fn empty_units_are_null() {
    assert!(read("; nothing here\n").unwrap().is_empty());
    assert_eq!(session().run(""), Ok(Value::Null));
    assert_eq!(session().run("  ; just a comment"), Ok(Value::Null));
}
