//! Purpose: `pubkycore` CLI entry point: keys, PKARR records and homeserver access.
//! Role: Binary crate root; parses args, configures the network, prints facade payloads.
//! Invariants: Successful commands print the facade `data` payload on stdout.
//! Invariants: Errors are emitted as JSON on stderr (human text on a terminal).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use pubkycore::api::{Error, ErrorKind, PubkyClient, to_exit_code};
use pubkycore::sdk;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

const ENV_SECRET_KEY: &str = "PUBKY_SECRET_KEY";
const ENV_ADMIN_PASSWORD: &str = "PUBKY_ADMIN_PASSWORD";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `pubkycore --help`."));
            }
        },
    };

    configure_network(&cli.network)?;

    command_dispatch::dispatch_command(cli.command, cli.color)
        .map_err(add_network_hint)
}

/// Installs a process-global client when the defaults were overridden on the command line.
fn configure_network(network: &NetworkArgs) -> Result<(), Error> {
    if !network.testnet && network.relay.is_empty() && network.http_relay.is_none() {
        return Ok(());
    }
    let mut builder = PubkyClient::builder();
    if network.testnet {
        builder = builder.testnet();
    }
    if !network.relay.is_empty() {
        builder = builder.relays(network.relay.clone());
    }
    if let Some(http_relay) = &network.http_relay {
        builder = builder.http_relay(http_relay.clone());
    }
    sdk::set_client(builder.build()?);
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "pubkycore",
    version,
    about = "Pubky identities, PKARR records and homeserver storage",
    long_about = None,
    after_help = r#"EXAMPLES
  $ pubkycore keygen
  $ pubkycore publish _foo "hello" --secret-key <hex>
  $ pubkycore resolve <pubkey>
  $ pubkycore signup --homeserver <pubkey> --secret-key <hex>
  $ pubkycore put pubky://<pubkey>/pub/app/file.txt "content"

ENVIRONMENT
  PUBKY_SECRET_KEY       default for --secret-key
  PUBKY_ADMIN_PASSWORD   default for signup-token --admin-password
  PUBKY_PKARR_RELAYS     comma-separated PKARR relay URLs
  PUBKY_HTTP_RELAY       pubkyauth HTTP relay URL
  RUST_LOG               log filter (default: warn)"#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Pretty-print JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct NetworkArgs {
    #[arg(long, global = true, help = "Use the local testnet relays")]
    testnet: bool,
    #[arg(
        long = "relay",
        global = true,
        value_name = "URL",
        help = "PKARR relay URL (repeatable; replaces the network defaults)"
    )]
    relay: Vec<String>,
    #[arg(long, global = true, value_name = "URL", help = "pubkyauth HTTP relay URL")]
    http_relay: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn pretty(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Args, Debug)]
struct SecretArg {
    #[arg(long, value_name = "HEX", help = "Secret key (64 hex chars); defaults to $PUBKY_SECRET_KEY")]
    secret_key: Option<String>,
}

impl SecretArg {
    fn resolve(&self) -> Result<String, Error> {
        self.secret_key
            .clone()
            .or_else(|| std::env::var(ENV_SECRET_KEY).ok())
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("a secret key is required")
                    .with_hint(format!("Pass --secret-key or set {ENV_SECRET_KEY}."))
            })
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Generate a new random keypair")]
    Keygen,
    #[command(about = "Derive the public key for a secret key")]
    Pubkey {
        #[arg(help = "Secret key (64 hex chars)")]
        secret_key: String,
    },
    #[command(subcommand, about = "BIP-39 mnemonic phrases")]
    Mnemonic(MnemonicCommand),
    #[command(subcommand, about = "Passphrase-encrypted recovery files")]
    Recovery(RecoveryCommand),
    #[command(about = "Publish a TXT record")]
    Publish {
        name: String,
        content: String,
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(name = "publish-https", about = "Publish an HTTPS record")]
    PublishHttps {
        name: String,
        target: String,
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(about = "Resolve a public key's signed packet")]
    Resolve { public_key: String },
    #[command(name = "resolve-https", about = "Resolve a public key's HTTPS records")]
    ResolveHttps { public_key: String },
    #[command(name = "auth-url", subcommand, about = "pubkyauth:// request URLs")]
    AuthUrl(AuthUrlCommand),
    #[command(about = "Answer a pubkyauth:// request with a signed token")]
    Auth {
        url: String,
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(about = "Create an account on a homeserver")]
    Signup {
        #[arg(long, help = "Homeserver public key")]
        homeserver: String,
        #[arg(long, help = "Signup token issued by the homeserver admin")]
        signup_token: Option<String>,
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(about = "Sign in to the homeserver that hosts this key")]
    Signin {
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(about = "End the current session")]
    Signout {
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(about = "Show the session for a public key")]
    Session { public_key: String },
    #[command(about = "Store content at a pubky:// URL")]
    Put {
        url: String,
        #[arg(help = "Content to store (reads stdin when omitted)")]
        content: Option<String>,
    },
    #[command(about = "Fetch content from a pubky:// URL")]
    Get { url: String },
    #[command(about = "Delete content at a pubky:// URL")]
    Delete { url: String },
    #[command(about = "List entries under a pubky:// directory")]
    List(ListArgs),
    #[command(about = "Show the homeserver a public key points to")]
    Homeserver { public_key: String },
    #[command(about = "Republish the homeserver record if it is stale")]
    Republish {
        #[arg(long, help = "Homeserver public key")]
        homeserver: String,
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(name = "signup-token", about = "Request a signup token from a homeserver admin endpoint")]
    SignupToken {
        homeserver: String,
        #[arg(long, help = "Admin password; defaults to $PUBKY_ADMIN_PASSWORD")]
        admin_password: Option<String>,
    },
    #[command(about = "Generate shell completion scripts")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum MnemonicCommand {
    #[command(about = "Generate a new 12-word phrase")]
    Generate {
        #[arg(long, help = "Also derive the keypair")]
        with_keypair: bool,
    },
    #[command(about = "Check whether a phrase is valid")]
    Validate { phrase: String },
    #[command(about = "Derive the keypair for a phrase")]
    Keypair { phrase: String },
}

#[derive(Subcommand)]
enum RecoveryCommand {
    #[command(about = "Encrypt a secret key into a recovery file")]
    Create {
        #[arg(long)]
        passphrase: String,
        #[arg(long, value_hint = ValueHint::FilePath, help = "Write raw bytes here instead of printing base64")]
        output: Option<PathBuf>,
        #[command(flatten)]
        secret: SecretArg,
    },
    #[command(about = "Decrypt a recovery file back into a secret key")]
    Decrypt {
        #[arg(help = "Base64 recovery file contents", required_unless_present = "file")]
        recovery_file: Option<String>,
        #[arg(long, value_hint = ValueHint::FilePath, help = "Read the raw recovery file from disk")]
        file: Option<PathBuf>,
        #[arg(long)]
        passphrase: String,
    },
}

#[derive(Subcommand)]
enum AuthUrlCommand {
    #[command(about = "Parse a pubkyauth:// URL into JSON")]
    Parse { url: String },
}

#[derive(Args, Debug)]
struct ListArgs {
    url: String,
    #[arg(long)]
    limit: Option<u16>,
    #[arg(long)]
    cursor: Option<String>,
    #[arg(long)]
    reverse: bool,
    #[arg(long)]
    shallow: bool,
}

/// Prints a facade payload: JSON values are re-rendered, anything else is printed as-is.
fn emit_data(data: &str, color_mode: ColorMode) {
    match serde_json::from_str::<Value>(data) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => emit_json(value, color_mode),
        _ => println!("{data}"),
    }
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let json = if color_mode.pretty(is_tty) {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

/// Writes `{"status":"error","kind":..,"data":..}` to stderr, mirroring the facade's pair.
fn emit_error(err: &Error) {
    eprintln!("{}", error_json(err));
}

fn error_json(err: &Error) -> Value {
    let mut value = json!({
        "status": sdk::ERROR,
        "kind": format!("{:?}", err.kind()),
        "data": err.detail(),
    });
    if let Some(hint) = err.hint() {
        value["hint"] = json!(hint);
    }
    value
}

fn add_network_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Io => {
            err.with_hint("Network error. Check connectivity, or pass --relay / --testnet.")
        }
        ErrorKind::Permission => {
            err.with_hint("The homeserver rejected the request. Sign in again with `pubkycore signin`.")
        }
        _ => err,
    }
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn cli_command() -> clap::Command {
    Cli::command()
}
