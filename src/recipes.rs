use tracing::{debug, instrument, warn};

use crate::{
    compiler::{CompileError, Compiler},
    emitter::Emit,
    error::Error,
    eval::EvalError,
    form::Form,
    lexer::Lexer,
    location::Spanned,
    machine::{DEFAULT_CALL_DEPTH_LIMIT, Machine},
    macro_table::MacroTable,
    parser::{DEFAULT_NEST_LIMIT, Parser, ReadError},
    value::{Arguments, Value},
    vop::Vop,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Deepest nesting of compounds and shorthands the reader accepts.
    pub nest_limit: usize,
    /// Deepest nesting of closure calls, and of macro expansions.
    pub call_depth_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nest_limit: DEFAULT_NEST_LIMIT,
            call_depth_limit: DEFAULT_CALL_DEPTH_LIMIT,
        }
    }
}

/// Intermediate results of a unit, handed to observers as they appear.
#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    Read(&'a [Spanned<Form>]),
    Compiled(&'a Vop),
}

/// A running program: units are read, compiled and evaluated one after the
/// other against the same globals and macro table.
#[derive(Debug)]
pub struct Session {
    config: Config,
    machine: Machine,
    macros: MacroTable,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            machine: Machine::with_call_depth_limit(config.call_depth_limit),
            macros: MacroTable::new(),
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn define_native<F>(&mut self, name: &str, call: F)
    where
        F: Fn(Arguments) -> Result<Value, EvalError> + 'static,
    {
        self.machine.define_native(name, call);
    }

    pub fn read(&self, code: &str) -> Result<Vec<Spanned<Form>>, ReadError> {
        Parser::new(Lexer::new(code), self.config.nest_limit).parse()
    }

    pub fn compile(&mut self, forms: Vec<Spanned<Form>>) -> Result<Vop, CompileError> {
        Compiler::new(&mut self.machine, &mut self.macros).compile_unit(forms)
    }

    pub fn evaluate(&mut self, vop: &Vop) -> Result<Value, EvalError> {
        self.machine.run(&mut self.macros, vop)
    }

    /// Processes `code` as one unit. Macros it defines only apply to later
    /// units.
    pub fn run(&mut self, code: &str) -> Result<Value, Error> {
        self.run_observed(code, |_| ())
    }

    #[instrument(level = "debug", skip_all)]
    pub fn run_observed<F>(&mut self, code: &str, mut observe: F) -> Result<Value, Error>
    where
        F: FnMut(Stage<'_>),
    {
        let forms = self.read(code)?;
        debug!(forms = forms.len(), "unit read");
        observe(Stage::Read(&forms));
        let vop = self.compile(forms)?;
        debug!("unit compiled");
        observe(Stage::Compiled(&vop));
        let value = self.evaluate(&vop)?;
        debug!(%value, "unit evaluated");
        Ok(value)
    }

    /// Translates `code` into JavaScript statements. The unit is also
    /// evaluated so that its definitions reach later units, unless it embeds
    /// host code. Only reading and compiling can fail: evaluation failures
    /// are logged and the text is returned anyway.
    #[instrument(level = "debug", skip_all)]
    pub fn emit(&mut self, code: &str) -> Result<String, Error> {
        let forms = self.read(code)?;
        let vop = self.compile(forms)?;
        let text = Emit::statements(&vop).to_string();
        debug!(bytes = text.len(), "unit emitted");
        if vop.has_native() {
            warn!("unit embeds host code, its definitions are not loaded");
        } else if let Err(error) = self.evaluate(&vop) {
            warn!(%error, "unit failed on the embedded machine, later units may miss its definitions");
        }
        Ok(text)
    }
}
