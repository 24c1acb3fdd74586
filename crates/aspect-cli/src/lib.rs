use anyhow::{Context as AnyhowContext, Result};
use aspect_core::{
    parse_literal, AspectConfig, AspectSettings, CallArgs, CallTarget, Declaration,
    DeclarationParser, LogCrateSink, SharedSink, StdoutSink, Value,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

mod demos;

pub use demos::{predicates, DemoInfo, DemoName};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "aspects")]
#[command(about = "Run aspected demo functions and inspect contract declarations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Aspect settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where diagnostic aspects write (JSON output always uses the log)
    #[arg(long, global = true, value_enum, default_value_t = SinkTarget::Stdout)]
    sink: SinkTarget,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a demo function through its aspect stack
    Demo(DemoArgs),

    /// List available demos and their aspect stacks
    Demos(DemosArgs),

    /// Parse a contract declaration and print it
    Parse(ParseArgs),
}

#[derive(Args)]
struct DemoArgs {
    /// Demo to run
    #[arg(value_enum)]
    name: DemoName,

    /// Positional argument (repeatable); defaults to the demo's own
    #[arg(long = "arg", allow_negative_numbers = true)]
    args: Vec<i64>,

    /// Keyword argument as key=literal (repeatable)
    #[arg(long = "kw", value_parser = parse_keyword)]
    keywords: Vec<(String, Value)>,

    /// Output result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DemosArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ParseArgs {
    /// Descriptor text (one or more lines)
    descriptor: String,

    /// Which contract's declaration to parse
    #[arg(long, value_enum, default_value_t = ContractKind::Pre)]
    kind: ContractKind,

    /// Override the marker taken from settings
    #[arg(long)]
    marker: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum ContractKind {
    Pre,
    Post,
}

#[derive(Copy, Clone, ValueEnum)]
enum SinkTarget {
    Stdout,
    Log,
}

fn parse_keyword(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty keyword name in `{raw}`"));
    }
    let value = parse_literal(value).unwrap_or_else(|_| Value::Str(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Demo(args) => args.json,
        Commands::Demos(args) => args.json,
        Commands::Parse(args) => args.json,
    };

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || json_output {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let settings = match &cli.config {
        Some(path) => AspectSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => AspectSettings::default(),
    };
    // JSON output owns stdout, so aspect lines go to the log instead
    let sink: SharedSink = match cli.sink {
        SinkTarget::Stdout if !json_output => Arc::new(StdoutSink),
        _ => Arc::new(LogCrateSink::default()),
    };
    let config = AspectConfig::new(settings, sink)?;

    match cli.command {
        Commands::Demo(args) => run_demo(args, &config),
        Commands::Demos(args) => run_demos(&args),
        Commands::Parse(args) => run_parse(&args, &config.settings),
    }
}

fn run_demo(args: DemoArgs, config: &AspectConfig) -> Result<()> {
    let demo = args.name;
    let target = demo
        .build(config)
        .with_context(|| format!("building demo {}", demo.as_str()))?;

    let positional = if args.args.is_empty() {
        demo.default_args().to_vec()
    } else {
        args.args
    };
    let keywords = if args.keywords.is_empty() {
        demo.default_keywords()
    } else {
        args.keywords
    };
    let call = keywords
        .into_iter()
        .fold(CallArgs::positional(positional), |call, (k, v)| {
            call.with_keyword(k, v)
        });

    log::info!("Running {} with ({})", demo.info().stack, call.render());
    let value = target.invoke(&call)?;

    if args.json {
        let body = serde_json::json!({
            "demo": demo.as_str(),
            "call": call,
            "result": value,
        });
        print_stdout(&serde_json::to_string_pretty(&body)?)
    } else {
        print_stdout(&format!("Result: {value}"))
    }
}

fn run_demos(args: &DemosArgs) -> Result<()> {
    let infos: Vec<DemoInfo> = DemoName::ALL.into_iter().map(DemoName::info).collect();
    if args.json {
        return print_stdout(&serde_json::to_string_pretty(&infos)?);
    }
    for info in infos {
        print_stdout(&format!("{:<12} {}", info.name, info.stack))?;
    }
    Ok(())
}

fn run_parse(args: &ParseArgs, settings: &AspectSettings) -> Result<()> {
    let marker = args.marker.as_deref().unwrap_or(match args.kind {
        ContractKind::Pre => settings.precondition_marker.as_str(),
        ContractKind::Post => settings.postcondition_marker.as_str(),
    });
    let parser = DeclarationParser::new(marker);
    let declaration = parser.parse(&args.descriptor)?;

    if args.json {
        return print_stdout(&serde_json::to_string_pretty(&declaration)?);
    }
    print_stdout(&render_declaration(parser.marker(), &declaration))
}

fn render_declaration(marker: &str, declaration: &Declaration) -> String {
    let literals: Vec<String> = declaration
        .literal_args
        .iter()
        .map(ToString::to_string)
        .collect();
    format!(
        "marker:     {marker}\npredicate:  {}\npositional: {}\nliterals:   ({})\nkeywords:   [{}]\nreturn:     {}",
        declaration.predicate_name,
        declaration.positional_arg_count,
        literals.join(", "),
        declaration.keyword_keys.join(", "),
        declaration.include_return_value
    )
}
