use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use crate::{
    error::LangError,
    eval::{self, Context, EvalError},
    form::Form,
    location::{Span, Spanned},
    machine::Machine,
    macro_table::MacroTable,
    mangle::{Namespace, mangle},
    value::{Arguments, Value},
    vop::{CallSite, Lambda, NativePart, Param, Signature, Vop},
};

pub const NATIVE_SNIPPET: &str = "%%native-snippet";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("malformed special form")]
    BadForm(Span),
    #[error("operator must be an identifier")]
    BadOperator(Span),
    #[error("parameters must be identifiers")]
    BadParameter(Span),
    #[error("malformed quasiquotation")]
    BadQuasiquote(Span),
    #[error("quasiquotation depth {depth} is negative")]
    NegativeDepth { depth: i32, span: Span },
    #[error("Bad form: `{name}` is neither a special form nor a macro")]
    UnknownOperator { name: String, span: Span },
    #[error("keyword `{name}:` is missing its value")]
    MissingKeywordValue { name: String, span: Span },
    #[error("macro `{name}` did not expand to a form")]
    BadExpansion { name: String, span: Span },
    #[error("macro `{name}` failed to expand")]
    Expansion {
        name: String,
        span: Span,
        #[source]
        source: EvalError,
    },
    #[error("macro `{name}` expanded too many times")]
    ExpansionLimit { name: String, span: Span },
}

impl LangError for CompileError {
    fn span(&self) -> Span {
        match self {
            Self::BadForm(span)
            | Self::BadOperator(span)
            | Self::BadParameter(span)
            | Self::BadQuasiquote(span) => *span,
            Self::NegativeDepth { span, .. }
            | Self::UnknownOperator { span, .. }
            | Self::MissingKeywordValue { span, .. }
            | Self::BadExpansion { span, .. }
            | Self::Expansion { span, .. }
            | Self::ExpansionLimit { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecialForm {
    Defparameter,
    Defun,
    Defmacro,
    Funcall,
    Function,
    Lambda,
    Progn,
    Quasiquote,
    Native,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 9] = [
        Self::Defparameter,
        Self::Defun,
        Self::Defmacro,
        Self::Funcall,
        Self::Function,
        Self::Lambda,
        Self::Progn,
        Self::Quasiquote,
        Self::Native,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Defparameter => "%%defparameter",
            Self::Defun => "%%defun",
            Self::Defmacro => "%%defmacro",
            Self::Funcall => "%%funcall",
            Self::Function => "%%function",
            Self::Lambda => "%%lambda",
            Self::Progn => "%%progn",
            Self::Quasiquote => "%%quasiquote",
            Self::Native => "%%native",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|special| special.name() == name)
    }
}

/// Turns forms into VOPs. Macro calls are expanded by running their
/// expanders on the given machine.
#[derive(Debug)]
pub struct Compiler<'a> {
    pub(crate) cx: Context<'a>,
    expansions: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(machine: &'a mut Machine, macros: &'a mut MacroTable) -> Self {
        Self { cx: Context { machine, macros }, expansions: 0 }
    }

    /// Compiles a whole unit into one `Progn`.
    pub fn compile_unit(
        &mut self,
        forms: Vec<Spanned<Form>>,
    ) -> Result<Vop, CompileError> {
        let vops = forms
            .into_iter()
            .map(|form| self.compile(form))
            .collect::<Result<_, _>>()?;
        Ok(Vop::Progn(vops))
    }

    pub fn compile(&mut self, form: Spanned<Form>) -> Result<Vop, CompileError> {
        let span = form.span;
        match form.data {
            Form::Number(number) => {
                number.value().map(Vop::Number).ok_or(CompileError::BadForm(span))
            },
            Form::String { value } => Ok(Vop::String(value)),
            Form::Identifier { name } => Ok(Vop::Ref(name)),
            Form::Compound { elements } => self.compile_compound(elements, span),
            Form::Comment { .. } => Err(CompileError::BadForm(span)),
        }
    }

    fn compile_compound(
        &mut self,
        elements: Vec<Spanned<Form>>,
        span: Span,
    ) -> Result<Vop, CompileError> {
        let Some(head) = elements.first() else {
            Err(CompileError::BadOperator(span))?
        };
        let Some(name) = head.data.as_identifier() else {
            Err(CompileError::BadOperator(head.span))?
        };
        let name = name.to_owned();
        if let Some(special) = SpecialForm::from_name(&name) {
            return self.compile_special(special, elements, span);
        }
        let Some(expander) = self.cx.macros.lookup(&name).cloned() else {
            Err(CompileError::UnknownOperator { name, span })?
        };
        let form = Spanned::new(Form::compound(elements), span);
        let expansion = self.expand(&name, &expander, form)?;
        self.expansions += 1;
        let compiled = self.compile(expansion);
        self.expansions -= 1;
        compiled
    }

    fn expand(
        &mut self,
        name: &str,
        expander: &Value,
        form: Spanned<Form>,
    ) -> Result<Spanned<Form>, CompileError> {
        let span = form.span;
        if self.cx.machine.call_depth_limit() <= self.expansions {
            Err(CompileError::ExpansionLimit { name: name.to_owned(), span })?
        }
        trace!(name, "expanding macro");
        let arguments = Arguments::positional(vec![Value::form(form)]);
        let result = eval::call(&mut self.cx, expander, arguments).map_err(|source| {
            CompileError::Expansion { name: name.to_owned(), span, source }
        })?;
        let Value::Form(expansion) = result else {
            Err(CompileError::BadExpansion { name: name.to_owned(), span })?
        };
        let mut expansion = Rc::unwrap_or_clone(expansion);
        expansion.anchor(span);
        Ok(expansion)
    }

    fn compile_special(
        &mut self,
        special: SpecialForm,
        elements: Vec<Spanned<Form>>,
        span: Span,
    ) -> Result<Vop, CompileError> {
        let operands: Vec<_> = elements.into_iter().skip(1).collect();
        let bad_form = || CompileError::BadForm(span);
        let vop = match special {
            SpecialForm::Defparameter => {
                let [name, value] = exactly(operands, bad_form)?;
                let name = identifier(name)?;
                Vop::Set { name, value: Box::new(self.compile(value)?) }
            },
            SpecialForm::Defun => {
                let [name, value] = exactly(operands, bad_form)?;
                let name = identifier(name)?;
                Vop::Fset { name, value: Box::new(self.compile(value)?) }
            },
            SpecialForm::Defmacro => {
                let [name, expander] = exactly(operands, bad_form)?;
                let name = identifier(name)?;
                Vop::Macroset { name, expander: Box::new(self.compile(expander)?) }
            },
            SpecialForm::Funcall => {
                let mut operands = operands.into_iter();
                let fun = operands.next().ok_or_else(bad_form)?;
                let fun = self.compile(fun)?;
                let call_site = self.compile_call_site(operands.collect())?;
                Vop::funcall(fun, call_site)
            },
            SpecialForm::Function => {
                let [name] = exactly(operands, bad_form)?;
                Vop::Fref(identifier(name)?)
            },
            SpecialForm::Lambda => {
                let [params, body] = exactly(operands, bad_form)?;
                let Form::Compound { elements: params } = params.data else {
                    Err(CompileError::BadForm(params.span))?
                };
                let sig = compile_sig(params)?;
                let body = self.compile(body)?;
                Vop::Lambda(Rc::new(Lambda { sig, body }))
            },
            SpecialForm::Progn => Vop::Progn(
                operands
                    .into_iter()
                    .map(|operand| self.compile(operand))
                    .collect::<Result<_, _>>()?,
            ),
            SpecialForm::Quasiquote => {
                let [form] = exactly(operands, bad_form)?;
                self.compile_qq(form, 0)?
            },
            SpecialForm::Native => {
                let parts = operands
                    .into_iter()
                    .map(|operand| self.compile_native_part(operand))
                    .collect::<Result<_, _>>()?;
                Vop::Native(parts)
            },
        };
        Ok(vop)
    }

    fn compile_native_part(
        &mut self,
        operand: Spanned<Form>,
    ) -> Result<NativePart, CompileError> {
        if operand.data.head_name() != Some(NATIVE_SNIPPET) {
            return self.compile(operand).map(NativePart::Expr);
        }
        let span = operand.span;
        let Form::Compound { elements } = operand.data else {
            Err(CompileError::BadForm(span))?
        };
        let [_, text] = exactly(elements, || CompileError::BadForm(span))?;
        let Form::String { value } = text.data else {
            Err(CompileError::BadForm(text.span))?
        };
        Ok(NativePart::Snippet(value))
    }

    /// Splits call arguments into positional ones and `name: value` keyword
    /// pairs. A repeated keyword keeps its last value.
    pub fn compile_call_site(
        &mut self,
        arguments: Vec<Spanned<Form>>,
    ) -> Result<CallSite, CompileError> {
        let mut call_site = CallSite::default();
        let mut arguments = arguments.into_iter();
        while let Some(argument) = arguments.next() {
            let Some(keyword) = keyword_name(&argument.data) else {
                call_site.positional.push(self.compile(argument)?);
                continue;
            };
            let Some(value) = arguments.next() else {
                Err(CompileError::MissingKeywordValue {
                    name: keyword.to_owned(),
                    span: argument.span,
                })?
            };
            let key = mangle(Namespace::KeywordArg, keyword);
            call_site.keyword.insert(key, self.compile(value)?);
        }
        Ok(call_site)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Required,
    Optional,
    Keyword,
    Rest,
    AllKeys,
}

impl ParamKind {
    fn from_marker(name: &str) -> Option<Self> {
        match name {
            "&opt" => Some(Self::Optional),
            "&key" => Some(Self::Keyword),
            "&rest" => Some(Self::Rest),
            "&all-keys" => Some(Self::AllKeys),
            _ => None,
        }
    }
}

/// Sorts a lambda list into a signature. Markers switch the kind of the
/// parameters after them; only the first rest and all-keys parameters count.
pub fn compile_sig(params: Vec<Spanned<Form>>) -> Result<Signature, CompileError> {
    let mut sig = Signature::default();
    let mut kind = ParamKind::Required;
    for param in params {
        let Form::Identifier { name } = param.data else {
            Err(CompileError::BadParameter(param.span))?
        };
        if let Some(marker) = ParamKind::from_marker(&name) {
            kind = marker;
            continue;
        }
        let param = Param { name };
        match kind {
            ParamKind::Required => sig.required.push(param),
            ParamKind::Optional => sig.optional.push(param),
            ParamKind::Keyword => sig.keyword.push(param),
            ParamKind::Rest => {
                sig.rest.get_or_insert(param);
            },
            ParamKind::AllKeys => {
                sig.all_keys.get_or_insert(param);
            },
        }
    }
    Ok(sig)
}

/// `size:` names the keyword `size`. A lone `:` is an ordinary argument.
fn keyword_name(form: &Form) -> Option<&str> {
    let name = form.as_identifier()?;
    name.strip_suffix(':').filter(|keyword| !keyword.is_empty())
}

fn identifier(form: Spanned<Form>) -> Result<String, CompileError> {
    match form.data {
        Form::Identifier { name } => Ok(name),
        _ => Err(CompileError::BadForm(form.span)),
    }
}

pub(crate) fn exactly<const N: usize, F>(
    forms: Vec<Spanned<Form>>,
    error: F,
) -> Result<[Spanned<Form>; N], CompileError>
where
    F: FnOnce() -> CompileError,
{
    forms.try_into().map_err(|_| error())
}
