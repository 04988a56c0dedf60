//! sproc - run a stored procedure from the command line.
//!
//! Rows are mapped onto JSON objects and printed to stdout; logs go to stderr.

use clap::{Args, Parser, Subcommand};
use sproc_mapper::config::{Config, parse_param};
use sproc_mapper::{
    ProcedureParams, ResultShape, Row, StoredProcedureClient, StoredProcedures,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "sproc",
    about = "Run a stored procedure and print its result as JSON",
    version,
    author
)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the procedure and print the number of affected rows
    Execute(CallArgs),
    /// Print every row of the first result set
    Query(CallArgs),
    /// Print the first row; fails when there are none
    First(CallArgs),
    /// Print the first row, or an empty object
    FirstOrDefault(CallArgs),
    /// Print the only row; fails on zero or several rows
    Single(CallArgs),
    /// Print the only row, or an empty object; fails on several rows
    SingleOrDefault(CallArgs),
    /// Print the first column of the first row as true/false
    Exists(CallArgs),
    /// Print several result sets as an array of arrays
    Multiple {
        /// Number of result sets to read
        #[arg(long, default_value_t = 1)]
        sets: usize,

        #[command(flatten)]
        call: CallArgs,
    },
}

#[derive(Debug, Args)]
struct CallArgs {
    /// Stored procedure name, e.g. "GetUser" or "app.GetUser"
    procedure: String,

    /// Procedure parameter as NAME=VALUE (VALUE is parsed as JSON when possible).
    /// Repeat in the order the procedure declares its parameters.
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, sproc_mapper::ProcedureValue)>,
}

impl CallArgs {
    fn params(&self) -> Option<ProcedureParams> {
        if self.params.is_empty() {
            None
        } else {
            Some(self.params.iter().cloned().collect())
        }
    }
}

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    // Report malformed entries up front instead of as a missing name later.
    let registered = cli.config.parse_connection_strings()?.len();

    info!(
        connection_string_name = %cli.config.connection_string_name,
        registered,
        "Starting sproc v{}",
        env!("CARGO_PKG_VERSION")
    );

    let client: StoredProcedureClient<Row> = StoredProcedureClient::new(
        Arc::new(cli.config.clone()),
        cli.config.connection_string_name.clone(),
    );

    let output = match &cli.command {
        Command::Execute(call) => {
            serde_json::json!(client.execute(&call.procedure, call.params()).await?)
        }
        Command::Query(call) => {
            serde_json::to_value(client.query(&call.procedure, call.params()).await?)?
        }
        Command::First(call) => {
            serde_json::Value::Object(client.query_first(&call.procedure, call.params()).await?)
        }
        Command::FirstOrDefault(call) => serde_json::Value::Object(
            client
                .query_first_or_default(&call.procedure, call.params())
                .await?,
        ),
        Command::Single(call) => {
            serde_json::Value::Object(client.query_single(&call.procedure, call.params()).await?)
        }
        Command::SingleOrDefault(call) => serde_json::Value::Object(
            client
                .query_single_or_default(&call.procedure, call.params())
                .await?,
        ),
        Command::Exists(call) => serde_json::Value::Bool(
            client
                .query_first_or_default_bool(&call.procedure, call.params())
                .await?,
        ),
        Command::Multiple { sets, call } => {
            let shapes = vec![ResultShape::of::<Row>(); *sets];
            let mut results = client
                .query_multiple(&shapes, &call.procedure, call.params())
                .await?;
            let sets: Vec<Vec<Row>> = (0..results.len())
                .map(|i| results.take::<Row>(i).unwrap_or_default())
                .collect();
            serde_json::to_value(sets)?
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(&cli.config);

    match run(cli).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!(error = %e, "Failed to render output");
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!(error = %e, "Procedure call failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
