use stq_client::repl::{register_json_sources, run_repl, ReplOptions};
use stq_client::StreamCompiler;
use stq_common::StreamConfig;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match args.first().map(String::as_str) {
        None | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("repl") => {
            let opts = parse_opts(&args[1..])?;
            if opts.sql.is_some() {
                return Err("repl takes no query argument".into());
            }
            run_repl(ReplOptions {
                config: opts.config,
                json_sources: opts.json_sources,
            })
        }
        Some("explain") => {
            let opts = parse_opts(&args[1..])?;
            let sql = opts.sql.ok_or("missing query for explain")?;
            let compiler = StreamCompiler::new(opts.config)?;
            register_json_sources(&compiler, &opts.json_sources)?;
            let view = compiler.compile_query(&sql)?;
            print!("{}", view.explain());
            Ok(())
        }
        Some(other) => Err(format!("unknown command: {other}").into()),
    }
}

#[derive(Debug, Default)]
struct Opts {
    config: StreamConfig,
    json_sources: Vec<(String, String)>,
    sql: Option<String>,
}

fn parse_opts(args: &[String]) -> Result<Opts, Box<dyn std::error::Error>> {
    let mut opts = Opts::default();
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args.get(i).ok_or("missing value for --config")?;
                opts.config = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            }
            "--json" => {
                i += 1;
                let spec = args.get(i).ok_or("missing value for --json")?;
                let (table, path) = spec
                    .split_once('=')
                    .ok_or("--json expects TABLE=PATH")?;
                opts.json_sources.push((table.to_string(), path.to_string()));
            }
            "--batch-interval-ms" => {
                i += 1;
                opts.config.batch_interval_ms = args
                    .get(i)
                    .ok_or("missing value for --batch-interval-ms")?
                    .parse()?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown argument: {other}").into());
            }
            other => {
                if opts.sql.replace(other.to_string()).is_some() {
                    return Err("more than one query given".into());
                }
            }
        }
        i += 1;
    }
    Ok(opts)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  stq explain [--config PATH] [--batch-interval-ms N] [--json TABLE=PATH]... \"<SQL>\"");
    eprintln!("  stq repl [--config PATH] [--batch-interval-ms N] [--json TABLE=PATH]...");
    eprintln!();
    eprintln!("Log filter from RUST_LOG (default: warn).");
}
