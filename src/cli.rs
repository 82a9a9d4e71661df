use clap::{Args, Parser, Subcommand};
use larder::config::{AppConfig, AuthConfig, ConfigError, FileConfig, NotifyConfig};
use larder::types::alert::UserId;
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;
use tracing::error;

const DEFAULT_AUTH_COOKIE_NAME: &str = "larder_auth";
const DEFAULT_BIND: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
    3000,
);

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(AppConfig),
    RunAlerts {
        notify: NotifyConfig,
        inventory: Option<PathBuf>,
    },
    TestMail {
        notify: NotifyConfig,
        to: String,
    },
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let mut cli = Cli::parse();
    if let Some(Command::AuthKey) = cli.command {
        return RunOutcome::Exit(run_auth_key());
    }

    let file = match load_file_config(&cli) {
        Ok(file) => file,
        Err(err) => {
            error!("{err}");
            return RunOutcome::Exit(2);
        }
    };
    let notify = file.notify;
    let inventory = cli.inventory.clone().or(file.inventory);

    match cli.command.take() {
        Some(Command::IssueToken(args)) => RunOutcome::Exit(run_issue_token(&cli, args)),
        Some(Command::RunAlerts) => RunOutcome::RunAlerts { notify, inventory },
        Some(Command::TestMail(args)) => RunOutcome::TestMail {
            notify,
            to: args.to,
        },
        Some(Command::AuthKey) | None => {
            let auth = match resolve_auth_config(&cli) {
                Ok(auth) => auth,
                Err(err) => {
                    error!("{err}");
                    return RunOutcome::Exit(2);
                }
            };
            RunOutcome::Serve(AppConfig {
                bind: cli.bind.or(file.bind).unwrap_or(DEFAULT_BIND),
                auth,
                notify,
                inventory,
            })
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "larder",
    version,
    about = "Expiry alerts for tracked perishables, pushed live and by mail"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// TOML file with `bind`, `inventory` and a `[notify]` table.
    #[arg(long, env = "LARDER_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "LARDER_BIND")]
    bind: Option<SocketAddr>,
    #[arg(long, env = "LARDER_INVENTORY")]
    inventory: Option<PathBuf>,
    #[arg(long, env = "LARDER_MAIL_FROM")]
    mail_from: Option<String>,
    #[arg(long, env = "LARDER_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, env = "LARDER_AUTH_TOKEN_TTL")]
    auth_token_ttl: Option<String>,
    #[arg(long, env = "LARDER_AUTH_COOKIE_NAME")]
    auth_cookie_name: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints a fresh random auth key.
    AuthKey,
    /// Prints a bearer token for a user.
    IssueToken(IssueTokenArgs),
    /// Runs the alert generator once against the inventory and prints the summary.
    RunAlerts,
    /// Renders and sends the test mail.
    TestMail(TestMailArgs),
}

#[derive(Args, Debug)]
struct IssueTokenArgs {
    #[arg(long)]
    user: UserId,
}

#[derive(Args, Debug)]
struct TestMailArgs {
    #[arg(long)]
    to: String,
}

fn load_file_config(cli: &Cli) -> Result<FileConfig, ConfigError> {
    let mut file = match cli.config.as_deref() {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    if let Some(from) = cli.mail_from.as_deref() {
        file.notify.mail_from = Some(from.trim().to_string());
    }
    file.notify.validate()?;
    Ok(file)
}

fn run_auth_key() -> i32 {
    let secret = match larder::auth::generate_auth_key() {
        Ok(secret) => secret,
        Err(err) => {
            error!("failed to generate auth key: {err}");
            return 1;
        }
    };
    println!("{secret}");
    0
}

fn run_issue_token(cli: &Cli, args: IssueTokenArgs) -> i32 {
    let token = resolve_auth_config(cli)
        .map_err(|err| err.to_string())
        .and_then(|config| {
            larder::auth::AuthState::from_config(&config).map_err(|err| err.to_string())
        })
        .and_then(|auth| auth.issue_token(args.user).map_err(|err| err.to_string()));
    match token {
        Ok(token) => {
            println!("{token}");
            0
        }
        Err(err) => {
            error!("failed to issue token: {err}");
            1
        }
    }
}

fn resolve_auth_config(cli: &Cli) -> Result<AuthConfig, String> {
    let auth_key = cli
        .auth_key
        .as_ref()
        .ok_or("--auth-key (or LARDER_AUTH_KEY) is required")?
        .trim();
    if auth_key.is_empty() {
        return Err("auth key cannot be empty".to_string());
    }

    if let Some(name) = cli.auth_cookie_name.as_deref()
        && name.trim().is_empty()
    {
        return Err("auth cookie name cannot be empty".to_string());
    }

    let token_ttl = match cli.auth_token_ttl.as_deref() {
        Some(raw) => parse_auth_token_ttl(raw)?,
        None => default_auth_token_ttl(),
    };
    let cookie_name = cli
        .auth_cookie_name
        .as_deref()
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| DEFAULT_AUTH_COOKIE_NAME.to_string());

    Ok(AuthConfig {
        key: auth_key.to_string(),
        token_ttl,
        cookie_name,
    })
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(14)
}

fn parse_auth_token_ttl(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("auth token ttl cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err("auth token ttl must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(format!(
            "invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"
        )),
    }
}
