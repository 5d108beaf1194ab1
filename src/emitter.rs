//! JavaScript text for compiled units.

use std::fmt;

use serde::Serialize;

use crate::{
    mangle::{Namespace, mangle},
    value::JsNumber,
    vop::{CallSite, Lambda, NativePart, Vop},
};

/// Name of the keyword record parameter every emitted function takes first.
pub const KEYWORDS: &str = "_key_";

/// Definitions the emitted code expects from its host.
pub const PRELUDE: &str = r#"var lisp_macros = {};

function lisp_set_macro(name, expander) {
    lisp_macros[name] = expander;
    return null;
}

function lisp_check_arity(count, min, max) {
    if (count < min || count > max) {
        var expected = max === Infinity
            ? "at least " + (min - 1)
            : min === max ? "" + (min - 1) : (min - 1) + " to " + (max - 1);
        throw new Error("wrong number of arguments: expected " + expected
            + ", got " + (count - 1));
    }
}

function _f_NNmakeHcompound(_key_) {
    var elements = Array.prototype.slice.call(arguments, 1);
    for (var i = 0; i < elements.length; i++) {
        var element = elements[i];
        if (element === null || typeof element !== "object"
                || typeof element.form !== "string") {
            throw new Error("expected a form, got a "
                + (element === null ? "null" : typeof element));
        }
    }
    return { form: "compound", elements: elements };
}

function _f_NNappendHcompounds(_key_) {
    var elements = [];
    for (var i = 1; i < arguments.length; i++) {
        var compound = arguments[i];
        if (compound === null || typeof compound !== "object"
                || compound.form !== "compound") {
            throw new Error("cannot splice a value that is not a compound form");
        }
        elements = elements.concat(compound.elements);
    }
    return { form: "compound", elements: elements };
}
"#;

/// Display adapter writing a VOP as a JavaScript expression. With
/// `statements` set, a top-level `Progn` is written one statement per line.
#[derive(Debug, Clone, Copy)]
pub struct Emit<'a> {
    pub vop: &'a Vop,
    pub statements: bool,
}

impl<'a> Emit<'a> {
    pub fn expression(vop: &'a Vop) -> Self {
        Self { vop, statements: false }
    }

    pub fn statements(vop: &'a Vop) -> Self {
        Self { vop, statements: true }
    }
}

impl fmt::Display for Emit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.statements, self.vop) {
            (true, Vop::Progn(vops)) => {
                for vop in vops {
                    write_statement(f, vop)?;
                }
                Ok(())
            },
            (true, vop) => write_statement(f, vop),
            (false, vop) => write_vop(f, vop),
        }
    }
}

fn write_statement(f: &mut fmt::Formatter<'_>, vop: &Vop) -> fmt::Result {
    // A statement starting with `{` would read as a block.
    if let Vop::Quote(_) = vop {
        write!(f, "(")?;
        write_vop(f, vop)?;
        write!(f, ");\n")
    } else {
        write_vop(f, vop)?;
        write!(f, ";\n")
    }
}

fn write_json<T>(f: &mut fmt::Formatter<'_>, value: &T) -> fmt::Result
where
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string(value).map_err(|_| fmt::Error)?;
    write!(f, "{text}")
}

fn write_vop(f: &mut fmt::Formatter<'_>, vop: &Vop) -> fmt::Result {
    match vop {
        Vop::Number(number) => write!(f, "{}", JsNumber(*number)),
        Vop::String(string) => write_json(f, string),
        Vop::Ref(name) => write!(f, "{}", mangle(Namespace::Variable, name)),
        Vop::Set { name, value } => {
            write!(f, "({} = ", mangle(Namespace::Variable, name))?;
            write_vop(f, value)?;
            write!(f, ")")
        },
        Vop::Fref(name) => write!(f, "{}", mangle(Namespace::Function, name)),
        Vop::Fset { name, value } => {
            write!(f, "({} = ", mangle(Namespace::Function, name))?;
            write_vop(f, value)?;
            write!(f, ")")
        },
        Vop::Funcall { fun, call_site } => {
            write!(f, "(")?;
            write_vop(f, fun)?;
            write_call_site(f, call_site)?;
            write!(f, ")")
        },
        Vop::Lambda(lambda) => write_lambda(f, lambda),
        Vop::Progn(vops) => {
            if vops.is_empty() {
                return write!(f, "null");
            }
            write!(f, "(")?;
            for (i, vop) in vops.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_vop(f, vop)?;
            }
            write!(f, ")")
        },
        Vop::Quote(form) => write_json(f, form),
        Vop::Macroset { name, expander } => {
            write!(f, "(lisp_set_macro(")?;
            write_json(f, &mangle(Namespace::Function, name))?;
            write!(f, ", ")?;
            write_vop(f, expander)?;
            write!(f, "))")
        },
        Vop::Native(parts) => {
            for part in parts {
                match part {
                    NativePart::Snippet(text) => write!(f, "{text}")?,
                    NativePart::Expr(vop) => write_vop(f, vop)?,
                }
            }
            Ok(())
        },
    }
}

fn write_call_site(f: &mut fmt::Formatter<'_>, call_site: &CallSite) -> fmt::Result {
    write!(f, "(")?;
    if call_site.keyword.is_empty() {
        write!(f, "{{}}")?;
    } else {
        write!(f, "{{ ")?;
        for (i, (key, vop)) in call_site.keyword.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: ")?;
            write_vop(f, vop)?;
        }
        write!(f, " }}")?;
    }
    for vop in &call_site.positional {
        write!(f, ", ")?;
        write_vop(f, vop)?;
    }
    write!(f, ")")
}

fn write_lambda(f: &mut fmt::Formatter<'_>, lambda: &Lambda) -> fmt::Result {
    let sig = &lambda.sig;
    write!(f, "(function({KEYWORDS}")?;
    for param in sig.required.iter().chain(&sig.optional) {
        write!(f, ", {}", mangle(Namespace::Variable, &param.name))?;
    }
    write!(f, "){{ ")?;

    // The keyword record occupies the first argument slot.
    let positional_end = 1 + sig.required.len() + sig.optional.len();
    if let Some(rest) = &sig.rest {
        write!(
            f,
            "var {} = Array.prototype.slice.call(arguments, {positional_end}); ",
            mangle(Namespace::Variable, &rest.name),
        )?;
    }
    for param in &sig.keyword {
        write!(
            f,
            "var {} = {KEYWORDS}.{} === undefined ? null : {KEYWORDS}.{}; ",
            mangle(Namespace::Variable, &param.name),
            mangle(Namespace::KeywordArg, &param.name),
            mangle(Namespace::KeywordArg, &param.name),
        )?;
    }
    if let Some(all_keys) = &sig.all_keys {
        write!(f, "var {} = {KEYWORDS}; ", mangle(Namespace::Variable, &all_keys.name))?;
    }

    let min = 1 + sig.required.len();
    write!(f, "return (lisp_check_arity(arguments.length, {min}, ")?;
    match sig.rest {
        Some(_) => write!(f, "Infinity")?,
        None => write!(f, "{positional_end}")?,
    }
    write!(f, "), ")?;
    write_vop(f, &lambda.body)?;
    write!(f, "); }})")
}
