use lispjs::Session;
use rustyline::{DefaultEditor, error::ReadlineError};

const PROMPT: &str = "lispjs> ";

/// Reads one unit per line until `/quit` or end of input. Failures are
/// reported and the loop goes on.
pub fn run(session: &mut Session, mut debug: bool) -> Result<(), ReadlineError> {
    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(error) => return Err(error),
        };
        let code = line.trim();
        if code.is_empty() {
            continue;
        }
        editor.add_history_entry(code)?;

        match code {
            "/quit" => break,
            "/debug" => {
                debug = !debug;
                println!("Debugging {}", if debug { "ON" } else { "OFF" });
            },
            _ => match crate::run_unit(session, code, debug) {
                Ok(value) => println!("{value}"),
                Err(error) => eprint!("{}", error.diagnose(code)),
            },
        }
    }
    Ok(())
}
