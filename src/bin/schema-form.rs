//! Schema Form CLI
//!
//! Command-line interface for inspecting form structures and running the
//! submit pipeline against a data file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use schema_form::{
    collect_exceptions, load_json_auto, project_errors, project_metas, project_values, resolve,
    Form, FormHandlers, FormOptions, LoadError, SubmitOutcome,
};
use serde_json::{json, Value};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "schema-form")]
#[command(about = "Resolve form schemas and run form state transitions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical schema, ui-schema and required paths
    Resolve {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// ui-schema source
        #[arg(long)]
        ui: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Project form data, errors and metas onto the schema shape
    Project {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Form data source
        #[arg(long)]
        data: Option<String>,

        /// ui-schema source
        #[arg(long)]
        ui: Option<String>,

        /// Raw error document source
        #[arg(long)]
        errors: Option<String>,

        /// Raw meta document source (defaults to the data's shape)
        #[arg(long)]
        meta: Option<String>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check required fields and print the values that would be submitted
    Submit {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Form data source
        #[arg(long)]
        data: String,

        /// ui-schema source
        #[arg(long)]
        ui: Option<String>,

        /// Raw meta document source
        #[arg(long)]
        meta: Option<String>,

        /// Drop empty values that are not required
        #[arg(long)]
        filter_empty: bool,

        /// Delay before required fields are checked, in milliseconds
        #[arg(long, default_value_t = 0)]
        grace_ms: u64,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resolve {
            schema,
            ui,
            output,
            pretty,
        } => run_resolve(&schema, ui.as_deref(), output, pretty),

        Commands::Project {
            schema,
            data,
            ui,
            errors,
            meta,
            pretty,
        } => run_project(ProjectArgs {
            schema,
            data,
            ui,
            errors,
            meta,
            pretty,
        }),

        Commands::Submit {
            schema,
            data,
            ui,
            meta,
            filter_empty,
            grace_ms,
            json,
        } => run_submit(SubmitArgs {
            schema,
            data,
            ui,
            meta,
            filter_empty,
            grace: Duration::from_millis(grace_ms),
            json_output: json,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load(source: &str) -> Result<Value, u8> {
    load_json_auto(source).map_err(|e: LoadError| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn load_or(source: Option<&str>, fallback: Value) -> Result<Value, u8> {
    source.map_or(Ok(fallback), load)
}

fn print_json(value: &Value, pretty: bool, output: Option<PathBuf>) -> Result<(), u8> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &text).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", text);
        }
    }
    Ok(())
}

fn run_resolve(
    schema_source: &str,
    ui_source: Option<&str>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load(schema_source)?;
    let ui = load_or(ui_source, json!({}))?;

    let structure = resolve(&schema, &ui).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let out = json!({
        "schema": structure.schema.to_value(),
        "uiSchema": structure.ui_schema.to_value(),
        "required": structure.required.iter().collect::<Vec<_>>(),
    });
    print_json(&out, pretty, output)
}

struct ProjectArgs {
    schema: String,
    data: Option<String>,
    ui: Option<String>,
    errors: Option<String>,
    meta: Option<String>,
    pretty: bool,
}

fn run_project(args: ProjectArgs) -> Result<(), u8> {
    let schema = load(&args.schema)?;
    let ui = load_or(args.ui.as_deref(), json!({}))?;
    let data = load_or(args.data.as_deref(), json!({}))?;
    let raw_errors = load_or(args.errors.as_deref(), json!({}))?;

    let structure = resolve(&schema, &ui).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let values = project_values(&data, &structure.schema);
    let raw_meta = load_or(args.meta.as_deref(), values.clone())?;
    let metas = project_metas(&raw_meta, &structure.schema, &structure.ui_schema);
    let errors = project_errors(&raw_errors, &structure.schema);
    let exceptions = collect_exceptions(&raw_errors, &structure.schema);

    let errors = serde_json::to_value(&errors).map_err(|e| {
        eprintln!("Error serializing errors: {}", e);
        2u8
    })?;
    let out = json!({
        "values": values,
        "errors": errors,
        "metas": metas,
        "exceptions": exceptions,
    });
    print_json(&out, args.pretty, None)
}

struct SubmitArgs {
    schema: String,
    data: String,
    ui: Option<String>,
    meta: Option<String>,
    filter_empty: bool,
    grace: Duration,
    json_output: bool,
}

fn run_submit(args: SubmitArgs) -> Result<(), u8> {
    let schema = load(&args.schema)?;
    let ui = load_or(args.ui.as_deref(), json!({}))?;
    let data = load(&args.data)?;

    let mut options = FormOptions::new(schema)
        .ui_schema(ui)
        .form_data(data)
        .filter_empty_values(args.filter_empty)
        .submit_grace(args.grace);
    if let Some(meta) = args.meta.as_deref() {
        options = options.meta_schema(load(meta)?);
    }

    let form = Form::new(options, FormHandlers::new()).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    form.attach();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| {
            eprintln!("Error starting runtime: {}", e);
            3u8
        })?;
    let outcome = runtime.block_on(form.submit()).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    match outcome {
        SubmitOutcome::Submitted { values, .. } => {
            if args.json_output {
                println!("{}", json!({"valid": true, "values": values}));
            } else {
                println!("{}", values);
            }
            Ok(())
        }
        SubmitOutcome::Rejected { missing } => {
            if args.json_output {
                println!("{}", json!({"valid": false, "missing": missing}));
            } else {
                for name in &missing {
                    eprintln!("Missing required field: {}", name);
                }
            }
            Err(1)
        }
        SubmitOutcome::Cancelled | SubmitOutcome::Failed { .. } => {
            eprintln!("Error: submission did not complete");
            Err(1)
        }
    }
}
