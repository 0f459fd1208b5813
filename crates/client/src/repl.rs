use std::io::Write;

use stq_common::{StqError, StreamConfig};

use crate::StreamCompiler;

#[derive(Debug, Clone, Default)]
pub struct ReplOptions {
    pub config: StreamConfig,
    /// `(table, path)` pairs registered as JSON-lines streams before the prompt starts.
    pub json_sources: Vec<(String, String)>,
}

/// Lines starting with `SELECT` (or `WITH`) are compiled and explained; anything else is
/// sent to the command executor.
pub fn run_repl(opts: ReplOptions) -> Result<(), Box<dyn std::error::Error>> {
    let compiler = StreamCompiler::new(opts.config)?;
    register_json_sources(&compiler, &opts.json_sources)?;

    eprintln!("STQ REPL (type \\q to quit)");
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("stq> ");
        std::io::stdout().flush()?;
        line.clear();
        // Ctrl+D => EOF => exit
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        if raw == "\\q" || raw.eq_ignore_ascii_case("quit") || raw.eq_ignore_ascii_case("exit") {
            break;
        }
        let text = raw.trim_end_matches(';');
        match eval_line(&compiler, text) {
            Ok(out) if out.is_empty() => println!("OK"),
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

fn eval_line(compiler: &StreamCompiler, text: &str) -> Result<String, StqError> {
    let head = text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if head == "SELECT" || head == "WITH" {
        Ok(compiler.compile_query(text)?.explain())
    } else {
        compiler.execute_command(text)
    }
}

/// Register each `(table, path)` as a stream whose schema is inferred from the file.
pub fn register_json_sources(
    compiler: &StreamCompiler,
    sources: &[(String, String)],
) -> Result<(), StqError> {
    for (table, path) in sources {
        let lines = stq_storage::read_json_lines(path)?;
        compiler.register_json_stream(table.as_str(), path.as_str(), &lines)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_are_explained_and_commands_executed() {
        let compiler = StreamCompiler::new(StreamConfig::default()).expect("compiler");
        compiler
            .register_json_stream("t", "t_topic", [r#"{"a":1}"#])
            .expect("register");
        let out = eval_line(&compiler, "select a from t").expect("query");
        assert!(out.contains("StreamScan source=t_topic"), "{out}");
        assert_eq!(eval_line(&compiler, "SHOW TABLES").expect("command"), "[t]");
        assert!(eval_line(&compiler, "INSERT INTO t VALUES (1)").is_err());
    }
}
