//! Compilation of `%%quasiquote` templates into code that rebuilds them at
//! run time.
//!
//! Plain parts of a template are quoted. Runs of ordinary elements become
//! one `%%make-compound` call, `,@` splices interrupt the run, and all the
//! pieces are joined with `%%append-compounds`. Nested quasiquotes raise the
//! depth, unquotes lower it; only at depth zero does an unquote escape back to
//! ordinary code.

use crate::{
    compiler::{CompileError, Compiler, exactly},
    form::Form,
    location::Spanned,
    vop::Vop,
};

pub const QUASIQUOTE: &str = "%%quasiquote";
pub const UNQUOTE: &str = "%%unquote";
pub const UNQUOTE_SPLICING: &str = "%%unquote-splicing";

pub const MAKE_COMPOUND: &str = "%%make-compound";
pub const APPEND_COMPOUNDS: &str = "%%append-compounds";

impl Compiler<'_> {
    pub fn compile_qq(
        &mut self,
        form: Spanned<Form>,
        depth: i32,
    ) -> Result<Vop, CompileError> {
        let span = form.span;
        if depth < 0 {
            Err(CompileError::NegativeDepth { depth, span })?
        }
        match form.data {
            Form::Number(_) | Form::String { .. } | Form::Identifier { .. } => {
                Ok(Vop::Quote(form))
            },
            Form::Compound { elements } => match head_name(&elements) {
                Some(UNQUOTE) => {
                    let [head, operand] = exactly(elements, || CompileError::BadQuasiquote(span))?;
                    if depth == 0 {
                        self.compile(operand)
                    } else {
                        self.rebuild(head, operand, depth - 1)
                    }
                },
                Some(QUASIQUOTE) => {
                    let [head, operand] = exactly(elements, || CompileError::BadQuasiquote(span))?;
                    self.rebuild(head, operand, depth + 1)
                },
                _ => self.compile_qq_elements(elements, depth),
            },
            Form::Comment { .. } => Err(CompileError::BadQuasiquote(span)),
        }
    }

    /// `(head operand)` rebuilt with the operand quasiquoted at `depth`.
    fn rebuild(
        &mut self,
        head: Spanned<Form>,
        operand: Spanned<Form>,
        depth: i32,
    ) -> Result<Vop, CompileError> {
        let operand = self.compile_qq(operand, depth)?;
        Ok(make_compound(vec![Vop::Quote(head), operand]))
    }

    fn compile_qq_elements(
        &mut self,
        elements: Vec<Spanned<Form>>,
        depth: i32,
    ) -> Result<Vop, CompileError> {
        let mut compounds = Vec::new();
        let mut batch = Vec::new();
        let mut spliced = false;
        for element in elements {
            let span = element.span;
            match element.data {
                Form::Compound { elements: splice }
                    if head_name(&splice) == Some(UNQUOTE_SPLICING) =>
                {
                    let [head, operand] =
                        exactly(splice, || CompileError::BadQuasiquote(span))?;
                    if depth == 0 {
                        if !batch.is_empty() {
                            compounds.push(make_compound(std::mem::take(&mut batch)));
                        }
                        compounds.push(self.compile(operand)?);
                        spliced = true;
                    } else {
                        batch.push(self.rebuild(head, operand, depth - 1)?);
                    }
                },
                data => batch.push(self.compile_qq(Spanned::new(data, span), depth)?),
            }
        }
        if !spliced {
            return Ok(make_compound(batch));
        }
        if !batch.is_empty() {
            compounds.push(make_compound(batch));
        }
        Ok(Vop::call_named(APPEND_COMPOUNDS, compounds))
    }
}

fn head_name(elements: &[Spanned<Form>]) -> Option<&str> {
    elements.first()?.data.as_identifier()
}

fn make_compound(elements: Vec<Vop>) -> Vop {
    Vop::call_named(MAKE_COMPOUND, elements)
}
