use std::{cell::RefCell, collections::VecDeque, fs, iter};

use anyhow::{bail, Context};
use log::{debug, error, info};
use rustyline::{error::ReadlineError, DefaultEditor};
use scheme::{line_source, scheme_open, Buffer, Config, Interpreter, ReplOptions};

const USAGE: &str = "usage: scheme [--config FILE.json] [-i|--load] [FILE]";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<String>,
    load: bool,
    file: Option<String>,
}

/// `None` when only the usage text was asked for.
fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<Options>> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-i" | "--load" => options.load = true,
            "--config" => options.config = Some(args.next().context("--config needs a file name")?),
            flag if flag.starts_with('-') => bail!("unknown option {}\n{}", flag, USAGE),
            _ if options.file.is_some() => bail!("only one file can be given\n{}", USAGE),
            _ => options.file = Some(arg),
        }
    }
    Ok(Some(options))
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let source = fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path))?;
    serde_json::from_str(&source).with_context(|| format!("invalid config file {}", path))
}

fn read_input(editor: &RefCell<DefaultEditor>, prompt: &str) -> Option<String> {
    let mut editor = editor.borrow_mut();
    match editor.readline(prompt) {
        Ok(line) => {
            if let Err(err) = editor.add_history_entry(line.as_str()) {
                debug!("failed to record history: {}", err);
            }
            Some(line)
        }
        Err(ReadlineError::Eof | ReadlineError::Interrupted) => None,
        Err(err) => {
            error!("failed to read input: {}", err);
            None
        }
    }
}

// One buffer per expression typed at the prompt. Continuation lines are
// prompted for with blanks the width of the prompt.
fn prompt_lines<'a>(editor: &'a RefCell<DefaultEditor>, prompt: &'a str) -> impl FnMut() -> Option<Buffer<'a>> + 'a {
    move || {
        let first = read_input(editor, prompt)?;
        let continuation = " ".repeat(prompt.len());
        let rest = iter::from_fn(move || read_input(editor, &continuation));
        Some(Buffer::new(iter::once(first).chain(rest)))
    }
}

fn run(options: Options, config: Config) -> anyhow::Result<()> {
    let interpreter = Interpreter::with_config(config);

    match (&options.file, options.load) {
        (Some(file), false) => {
            info!("running {}", file);
            let lines = RefCell::new(scheme_open(file)?.lines().map(str::to_owned).collect::<VecDeque<_>>());
            interpreter.run(line_source(&lines), ReplOptions::default())?;
        }
        (file, _) => {
            if let Some(file) = file {
                if let Err(err) = interpreter.load(file, true) {
                    println!("Error: {}", err);
                }
            }

            let editor = RefCell::new(DefaultEditor::new().context("failed to initialise the line editor")?);
            let options = ReplOptions {
                interactive: true,
                ..ReplOptions::default()
            };
            interpreter.run(prompt_lines(&editor, &interpreter.config().prompt), options)?;
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(options) = parse_args(std::env::args().skip(1))? else {
        println!("{}", USAGE);
        return Ok(());
    };
    let config = match &options.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    run(options, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> impl Iterator<Item = String> + '_ {
        line.split_whitespace().map(str::to_owned)
    }

    #[test]
    fn parses_file_and_flags() -> anyhow::Result<()> {
        let options = parse_args(args("--config settings.json -i lib.scm"))?;
        assert_eq!(
            options,
            Some(Options {
                config: Some("settings.json".to_owned()),
                load: true,
                file: Some("lib.scm".to_owned()),
            })
        );
        assert_eq!(parse_args(args(""))?, Some(Options::default()));
        assert_eq!(parse_args(args("-h"))?, None);
        Ok(())
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(args("--verbose")).is_err());
        assert!(parse_args(args("a.scm b.scm")).is_err());
        assert!(parse_args(args("--config")).is_err());
    }
}
