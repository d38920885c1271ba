use std::{
    cell::RefCell,
    collections::VecDeque,
    fs,
    io::{self, Write},
    path::Path,
    rc::Rc,
};

use itertools::Itertools;
use log::{debug, info};
use serde::Deserialize;

use crate::{
    builtin::create_global_frame,
    environment::Env,
    error::SchemeError,
    interpreter::{evaluate, with_max_depth, EvaluationResult, DEFAULT_MAX_DEPTH},
    parser::{parse, scheme_read, Buffer},
    value::Value,
};

/// Appended by `load` when no file has the bare name.
pub const LOAD_EXTENSION: &str = ".scm";

/// Where a session prints its results and errors.
pub type Output = Rc<RefCell<dyn Write>>;

thread_local! {
    static OUTPUT: RefCell<Option<Output>> = const { RefCell::new(None) };
}

/// Runs `f` with everything the interpreter prints sent to `output`.
pub fn with_output<T>(output: &Output, f: impl FnOnce() -> T) -> T {
    let previous = OUTPUT.with(|cell| cell.replace(Some(output.clone())));
    let result = f();
    OUTPUT.with(|cell| cell.replace(previous));
    result
}

/// Writes `text` to the output of the running session, or to standard output
/// outside of one.
pub fn write_output(text: &str) -> io::Result<()> {
    match OUTPUT.with(|cell| cell.borrow().clone()) {
        Some(output) => {
            let mut output = output.borrow_mut();
            output.write_all(text.as_bytes())?;
            output.flush()
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()
        }
    }
}

/// Interpreter settings. Every field has a default, so a configuration file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How deeply evaluations may nest before the evaluator gives up with
    /// [`SchemeError::RecursionDepthExceeded`].
    pub max_depth: usize,
    pub prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            prompt: "scm> ".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplOptions {
    /// Input comes from a person at a terminal.
    pub interactive: bool,
    /// Results are not printed.
    pub quiet: bool,
    /// The first error ends the loop and is returned instead of printed.
    pub report_errors: bool,
}

/// One interpreter session: a global frame, the settings it runs under and
/// the output it prints to. Sessions share nothing, so several can live side
/// by side.
pub struct Interpreter {
    global: Env,
    config: Config,
    output: Output,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            global: create_global_frame(),
            config,
            output: Rc::new(RefCell::new(io::stdout())),
        }
    }

    /// Sends everything this session prints to `output` instead of standard
    /// output.
    pub fn output_to(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn global_frame(&self) -> &Env {
        &self.global
    }

    fn session<T>(&self, f: impl FnOnce() -> T) -> T {
        with_output(&self.output, || with_max_depth(self.config.max_depth, f))
    }

    pub fn evaluate(&self, expr: &Value) -> EvaluationResult {
        self.session(|| evaluate(expr, &self.global))
    }

    /// Evaluates every expression in `source` and returns the last value.
    pub fn evaluate_str(&self, source: &str) -> EvaluationResult {
        let mut result = Value::Undefined;
        for expression in parse(source)? {
            result = self.evaluate(&expression)?;
        }
        Ok(result)
    }

    pub fn load(&self, name: &str, quiet: bool) -> Result<(), SchemeError> {
        self.session(|| scheme_load(name, quiet, &self.global))
    }

    pub fn run<'a>(
        &self,
        next_line: impl FnMut() -> Option<Buffer<'a>>,
        options: ReplOptions,
    ) -> Result<(), SchemeError> {
        self.session(|| read_eval_print_loop(next_line, &self.global, options))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

// Evaluates the expressions that start on the current line of `src`.
fn eval_line(src: &mut Buffer, env: &Env, quiet: bool) -> Result<(), SchemeError> {
    while src.more_on_line()? {
        let expression = scheme_read(src)?;
        let result = evaluate(&expression, env)?;
        if !quiet && !result.is_undefined() {
            write_output(&format!("{}\n", result))?;
        }
    }
    Ok(())
}

/// Reads and evaluates expressions from the buffers `next_line` yields until
/// it yields `None`, printing through [`write_output`].
///
/// An error abandons the rest of its buffer. Unless `report_errors` is set it
/// is printed as `Error: <message>` and the loop moves on to the next buffer.
pub fn read_eval_print_loop<'a>(
    mut next_line: impl FnMut() -> Option<Buffer<'a>>,
    env: &Env,
    options: ReplOptions,
) -> Result<(), SchemeError> {
    while let Some(mut src) = next_line() {
        if let Err(err) = eval_line(&mut src, env, options.quiet) {
            if options.report_errors {
                return Err(err);
            }
            debug!("{}: {}", err.name(), err);
            write_output(&format!("Error: {}\n", err))?;
        }
    }

    if options.interactive {
        write_output("\n")?;
    }
    Ok(())
}

/// Buffers that drain `lines` from the front. Each buffer stops pulling once
/// its expressions are complete, and the next one continues where it left
/// off.
pub fn line_source<'a>(lines: &'a RefCell<VecDeque<String>>) -> impl FnMut() -> Option<Buffer<'a>> + 'a {
    move || {
        if lines.borrow().is_empty() {
            return None;
        }
        Some(Buffer::new(std::iter::from_fn(move || lines.borrow_mut().pop_front())))
    }
}

fn cannot_open(name: &str, err: io::Error) -> SchemeError {
    SchemeError::IoError(format!("cannot open {}: {}", name, err))
}

/// The contents of `name`, or of `name` with [`LOAD_EXTENSION`] appended when
/// the bare name cannot be read.
pub fn scheme_open(name: &str) -> Result<String, SchemeError> {
    match fs::read_to_string(name) {
        Ok(source) => Ok(source),
        Err(err) if name.ends_with(LOAD_EXTENSION) => Err(cannot_open(name, err)),
        Err(_) => {
            let name = format!("{}{}", name, LOAD_EXTENSION);
            fs::read_to_string(&name).map_err(|err| cannot_open(&name, err))
        }
    }
}

/// Evaluates the file `name` in `env`. The first error aborts the load.
pub fn scheme_load(name: &str, quiet: bool, env: &Env) -> Result<(), SchemeError> {
    let source = scheme_open(name)?;
    info!("loading {}", name);

    let lines = RefCell::new(source.lines().map(str::to_owned).collect::<VecDeque<_>>());
    let options = ReplOptions {
        interactive: false,
        quiet,
        report_errors: true,
    };
    read_eval_print_loop(line_source(&lines), env, options)
}

/// Loads every `.scm` file of `directory`, in alphabetical order.
pub fn scheme_load_all(directory: &str, env: &Env) -> Result<(), SchemeError> {
    let paths = fs::read_dir(directory)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "scm"))
        .sorted()
        .collect_vec();

    for path in paths {
        scheme_load(&display_path(&path), true, env)?;
    }
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::bail;

    use crate::test_utils::{all_testcases, load_test_pair, TestEvaluationResult, TestOutput};

    use super::*;

    fn assert_run(testcase: usize, entries: &[(String, TestEvaluationResult)]) -> anyhow::Result<()> {
        let interpreter = Interpreter::new();
        for (lineno, (source, expected)) in entries.iter().enumerate() {
            let result = interpreter.evaluate_str(source);
            let expected: Result<_, _> = expected.clone().into();

            match (&result, &expected) {
                (Ok(value), Ok(TestOutput::Printed(printed))) => assert_eq!(
                    &value.to_string(),
                    printed,
                    "Testcase({}, {}): {}",
                    testcase,
                    lineno,
                    source
                ),
                (Ok(value), Ok(TestOutput::Unprinted)) => assert!(
                    value.is_undefined(),
                    "Testcase({}, {}): got {}, expected nothing",
                    testcase,
                    lineno,
                    value
                ),
                (Err(err), Err(class)) => assert_eq!(
                    err.name(),
                    class,
                    "Testcase({}, {}): got {:?}, expected {}",
                    testcase,
                    lineno,
                    err,
                    class
                ),
                _ => bail!("Testcase({}, {}): got {:?}, expected {:?}", testcase, lineno, result, expected),
            }
        }

        Ok(())
    }

    #[test]
    fn evaluate_testcases() -> anyhow::Result<()> {
        for testcase in all_testcases() {
            println!("Running testcase {}", testcase);
            let entries = load_test_pair(testcase)?;
            assert_run(testcase, &entries)?;
        }

        Ok(())
    }

    fn lines(source: &str) -> RefCell<VecDeque<String>> {
        RefCell::new(source.lines().map(str::to_owned).collect())
    }

    fn run_captured(
        interpreter: Interpreter,
        source: &str,
        options: ReplOptions,
    ) -> (Result<(), SchemeError>, String) {
        let captured = Rc::new(RefCell::new(Vec::new()));
        let interpreter = interpreter.output_to(captured.clone());
        let lines = lines(source);
        let result = interpreter.run(line_source(&lines), options);
        let output = String::from_utf8_lossy(&captured.borrow()).into_owned();
        (result, output)
    }

    fn repl_output(source: &str, options: ReplOptions) -> (Result<(), SchemeError>, String) {
        run_captured(Interpreter::new(), source, options)
    }

    #[test]
    fn repl_prints_results_and_errors() {
        let source = "(define x 3)\n(+ x 1) (car nil) (+ x 2)\nundefined\n(* x x)";
        let (result, output) = repl_output(source, ReplOptions::default());

        assert!(result.is_ok());
        // the error abandons the rest of its line
        assert_eq!(output, "x\n4\nError: argument 0 of car has wrong type (nil)\n9\n");
    }

    #[test]
    fn repl_reads_multi_line_expressions() {
        let source = "(define (f x)\n  (* x 2))\n(f\n 21)";
        let (_, output) = repl_output(source, ReplOptions::default());
        assert_eq!(output, "f\n42\n");
    }

    #[test]
    fn repl_quiet_and_report_errors() {
        let options = ReplOptions {
            quiet: true,
            report_errors: true,
            ..ReplOptions::default()
        };
        let (result, output) = repl_output("(+ 1 2)\n(undefined-thing)\n(+ 3 4)", options);

        assert_eq!(output, "");
        assert!(matches!(result, Err(SchemeError::UnboundName(name)) if name == "undefined-thing"));
    }

    #[test]
    fn repl_reports_incomplete_input() {
        let (result, output) = repl_output("(+ 1", ReplOptions::default());
        assert!(result.is_ok());
        assert_eq!(output, "Error: unexpected end of file\n");
    }

    #[test]
    fn repl_survives_runaway_recursion() {
        let source = "(define (f) (+ 1 (f)))\n(f)\n'alive";
        let (result, output) = repl_output(source, ReplOptions::default());

        assert!(result.is_ok());
        assert_eq!(output, "f\nError: maximum recursion depth exceeded\nalive\n");
    }

    #[test]
    fn repl_respects_a_lower_limit() {
        let interpreter = Interpreter::with_config(Config {
            max_depth: 100,
            ..Config::default()
        });
        let source = "(define (count n) (if (= n 0) 0 (+ 1 (count (- n 1)))))\n(count 50)\n(count 500)";
        let (_, output) = run_captured(interpreter, source, ReplOptions::default());

        assert_eq!(output, "count\n50\nError: maximum recursion depth exceeded\n");
    }

    #[test]
    fn builtin_output_goes_to_the_session() {
        let source = "(display \"a\") (newline) (print 'b) (begin (displayln \"c\") 1)";
        let (_, output) = repl_output(source, ReplOptions::default());
        assert_eq!(output, "a\nb\nc\n1\n");
    }

    #[test]
    fn nested_load_prints_to_the_session() {
        let name = display_path(&fixture_dir().join("square.scm"));
        let source = format!("(load \"{}\" #f)\n(square 5)", name);
        let (result, output) = repl_output(&source, ReplOptions::default());

        assert!(result.is_ok());
        assert_eq!(output, "square\n25\n");
    }

    #[test]
    fn config_fields_default() -> anyhow::Result<()> {
        let config: Config = serde_json::from_str(r#"{"max_depth": 50}"#)?;
        assert_eq!(config.max_depth, 50);
        assert_eq!(config.prompt, "scm> ");
        Ok(())
    }

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_loads")
    }

    #[test]
    fn load_appends_extension() -> anyhow::Result<()> {
        let interpreter = Interpreter::new();
        let name = fixture_dir().join("square");
        interpreter.load(&display_path(&name), true)?;

        assert_eq!(interpreter.evaluate_str("(square 12)")?, Value::Integer(144));
        Ok(())
    }

    #[test]
    fn load_builtin_takes_a_string() -> anyhow::Result<()> {
        let interpreter = Interpreter::new();
        let name = display_path(&fixture_dir().join("square.scm"));
        interpreter.evaluate_str(&format!("(load \"{}\")", name))?;

        assert_eq!(interpreter.evaluate_str("(square 3)")?, Value::Integer(9));
        Ok(())
    }

    #[test]
    fn load_stops_at_first_error() {
        let interpreter = Interpreter::new();
        let name = display_path(&fixture_dir().join("broken.scm"));
        let result = interpreter.load(&name, true);

        assert!(matches!(result, Err(SchemeError::UnboundName(_))));
        assert!(interpreter.evaluate_str("before").is_ok());
        assert!(interpreter.evaluate_str("after").is_err());
    }

    #[test]
    fn load_missing_file() {
        let result = Interpreter::new().load("no/such/file", true);
        assert!(matches!(result, Err(SchemeError::IoError(_))));
    }

    #[test]
    fn load_all_reads_directory_in_order() -> anyhow::Result<()> {
        let interpreter = Interpreter::new();
        let directory = display_path(&fixture_dir().join("all"));
        interpreter.evaluate_str(&format!("(load-all \"{}\")", directory))?;

        // b.scm redefines what a.scm defined
        assert_eq!(interpreter.evaluate_str("order")?.to_string(), "(a b)");
        Ok(())
    }
}
