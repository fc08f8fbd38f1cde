use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use parse_document::server::{AppState, RestBackend};
use parse_document::{
    CancellationToken, DEFAULT_MAX_ENTRY_BYTES, ParseOptions, convert_bytes, detect, received_type,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a local DOCX, XLSX, DOC, XLS or text file to HTML
    Convert {
        /// Input file path
        input: PathBuf,

        /// Output HTML file path (prints to stdout if not specified)
        output: Option<PathBuf>,

        /// MIME type to use when the extension is not conclusive
        #[arg(long)]
        mime_type: Option<String>,

        /// Largest inflated size accepted for one archive member, in bytes
        #[arg(long, env = "MAX_ENTRY_BYTES", default_value_t = DEFAULT_MAX_ENTRY_BYTES)]
        max_entry_bytes: usize,
    },
    /// Run the HTTP parse endpoint
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "PARSE_DOCUMENT_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Base URL of the storage and auth backend
    #[arg(long, env = "BACKEND_URL")]
    backend_url: String,

    /// Service key used for storage downloads
    #[arg(long, env = "BACKEND_SERVICE_KEY", hide_env_values = true)]
    service_key: String,

    /// Bucket used when a request names none
    #[arg(long, env = "STORAGE_BUCKET", default_value = "documents")]
    bucket: String,

    /// Seconds a single conversion may run before it is cancelled
    #[arg(long, env = "PARSE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Largest inflated size accepted for one archive member, in bytes
    #[arg(long, env = "MAX_ENTRY_BYTES", default_value_t = DEFAULT_MAX_ENTRY_BYTES)]
    max_entry_bytes: usize,
}

fn convert(
    input: PathBuf,
    output: Option<PathBuf>,
    mime_type: Option<String>,
    max_entry_bytes: usize,
) -> ExitCode {
    let bytes = match std::fs::read(&input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", input.display());
            return ExitCode::FAILURE;
        }
    };
    let path = input.to_string_lossy();
    let Some(format) = detect(mime_type.as_deref(), &path, &bytes) else {
        eprintln!(
            "Unsupported file type: {}",
            received_type(mime_type.as_deref(), &path)
        );
        return ExitCode::FAILURE;
    };

    let options = ParseOptions { max_entry_bytes };
    let html = match convert_bytes(&bytes, format, &options, &CancellationToken::new()) {
        Ok(html) => html,
        Err(e) => {
            eprintln!("Error converting {}: {e}", input.display());
            return ExitCode::FAILURE;
        }
    };

    match output {
        Some(output) => {
            if let Err(e) = std::fs::write(&output, &html) {
                eprintln!("Error writing output: {e}");
                return ExitCode::FAILURE;
            }
            println!("Converted {} to {}", input.display(), output.display());
        }
        None => println!("{html}"),
    }
    ExitCode::SUCCESS
}

async fn run_server(args: ServeArgs) -> ExitCode {
    let backend = match RestBackend::new(&args.backend_url, args.service_key) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            eprintln!("Error configuring backend: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut state = AppState::new(backend.clone(), backend);
    state.default_bucket = args.bucket;
    state.parse_timeout = Duration::from_secs(args.timeout_secs);
    state.options = ParseOptions {
        max_entry_bytes: args.max_entry_bytes,
    };

    let listener = match tokio::net::TcpListener::bind(args.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error binding {}: {e}", args.bind);
            return ExitCode::FAILURE;
        }
    };
    match parse_document::server::serve(listener, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(args: ServeArgs) -> ExitCode {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(run_server(args)),
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Convert {
            input,
            output,
            mime_type,
            max_entry_bytes,
        } => convert(input, output, mime_type, max_entry_bytes),
        Command::Serve(args) => serve(args),
    }
}
