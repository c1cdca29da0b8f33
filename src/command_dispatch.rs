//! Purpose: Hold top-level CLI command dispatch for `pubkycore`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command goes through the `sdk` facade except `list`, which needs paging options.

use super::*;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pubkycore::api::ListOptions;
use std::io::Read;

pub(super) fn dispatch_command(command: Command, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    let data = match command {
        Command::Completions { shell } => {
            let mut cmd = cli_command();
            clap_complete::aot::generate(shell, &mut cmd, "pubkycore", &mut io::stdout());
            return Ok(RunOutcome::ok());
        }
        Command::Keygen => call("generate_secret_key", [])?,
        Command::Pubkey { secret_key } => call("get_public_key_from_secret_key", [secret_key])?,
        Command::Mnemonic(MnemonicCommand::Generate { with_keypair }) => {
            if with_keypair {
                call("generate_mnemonic_phrase_and_keypair", [])?
            } else {
                call("generate_mnemonic_phrase", [])?
            }
        }
        Command::Mnemonic(MnemonicCommand::Validate { phrase }) => {
            let valid = call("validate_mnemonic_phrase", [phrase])?;
            println!("{valid}");
            let code = if valid == "true" {
                0
            } else {
                to_exit_code(ErrorKind::Usage)
            };
            return Ok(RunOutcome::with_code(code));
        }
        Command::Mnemonic(MnemonicCommand::Keypair { phrase }) => {
            call("mnemonic_phrase_to_keypair", [phrase])?
        }
        Command::Recovery(RecoveryCommand::Create {
            passphrase,
            output,
            secret,
        }) => {
            let encoded = call("create_recovery_file", [secret.resolve()?, passphrase])?;
            match output {
                Some(path) => {
                    let bytes = STANDARD.decode(&encoded).map_err(|err| {
                        Error::new(ErrorKind::Internal)
                            .with_message("recovery file encoding failed")
                            .with_source(err)
                    })?;
                    std::fs::write(&path, bytes).map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message(format!("failed to write {}", path.display()))
                            .with_source(err)
                    })?;
                    path.display().to_string()
                }
                None => encoded,
            }
        }
        Command::Recovery(RecoveryCommand::Decrypt {
            recovery_file,
            file,
            passphrase,
        }) => {
            let encoded = match (file, recovery_file) {
                (Some(path), _) => {
                    let bytes = std::fs::read(&path).map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message(format!("failed to read {}", path.display()))
                            .with_source(err)
                    })?;
                    STANDARD.encode(bytes)
                }
                (None, Some(encoded)) => encoded,
                (None, None) => {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message("a recovery file is required")
                        .with_hint("Pass the base64 contents or --file <path>."));
                }
            };
            call("decrypt_recovery_file", [encoded, passphrase])?
        }
        Command::Publish {
            name,
            content,
            secret,
        } => call("publish", [name, content, secret.resolve()?])?,
        Command::PublishHttps {
            name,
            target,
            secret,
        } => call("publish_https", [name, target, secret.resolve()?])?,
        Command::Resolve { public_key } => call("resolve", [public_key])?,
        Command::ResolveHttps { public_key } => call("resolve_https", [public_key])?,
        Command::AuthUrl(AuthUrlCommand::Parse { url }) => call("parse_auth_url", [url])?,
        Command::Auth { url, secret } => call("auth", [url, secret.resolve()?])?,
        Command::Signup {
            homeserver,
            signup_token,
            secret,
        } => sdk::call(
            "sign_up",
            &[Some(secret.resolve()?), Some(homeserver), signup_token],
        )?,
        Command::Signin { secret } => call("sign_in", [secret.resolve()?])?,
        Command::Signout { secret } => call("sign_out", [secret.resolve()?])?,
        Command::Session { public_key } => call("session", [public_key])?,
        Command::Put { url, content } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            call("put", [url, content])?
        }
        Command::Get { url } => call("get", [url])?,
        Command::Delete { url } => call("delete_file", [url])?,
        Command::List(args) => {
            let options = ListOptions {
                limit: args.limit,
                cursor: args.cursor,
                reverse: args.reverse,
                shallow: args.shallow,
            };
            let entries = sdk::client()?.list(args.url.trim_end_matches('/'), &options)?;
            emit_json(json!(entries), color_mode);
            return Ok(RunOutcome::ok());
        }
        Command::Homeserver { public_key } => call("get_homeserver", [public_key])?,
        Command::Republish { homeserver, secret } => {
            call("republish_homeserver", [secret.resolve()?, homeserver])?
        }
        Command::SignupToken {
            homeserver,
            admin_password,
        } => {
            let password = admin_password
                .or_else(|| std::env::var(ENV_ADMIN_PASSWORD).ok())
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message("an admin password is required")
                        .with_hint(format!(
                            "Pass --admin-password or set {ENV_ADMIN_PASSWORD}."
                        ))
                })?;
            call("get_signup_token", [homeserver, password])?
        }
    };
    emit_data(&data, color_mode);
    Ok(RunOutcome::ok())
}

fn call<const N: usize>(name: &str, args: [String; N]) -> Result<String, Error> {
    let args: Vec<Option<String>> = args.into_iter().map(Some).collect();
    sdk::call(name, &args)
}

fn read_stdin() -> Result<String, Error> {
    let mut content = String::new();
    io::stdin().read_to_string(&mut content).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(content)
}
