use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use twofa_client::{
    plan_migration, ClientConfig, ConfirmationChannel, HttpVerificationClient, KeyPairSigner,
    MigrationPlan, RpcClient, TwoFactorSession,
};
use twofa_log::{init_cli_tracing, LogFormat};
use twofa_store::{FileStore, PendingRequests};
use twofa_types::{
    AccessKeyInfo, AccessKeyPermission, AccountId, Action, Balance, Gas, TwoFactorMethod,
};

#[derive(Parser)]
#[command(
    name = "twofa",
    about = "Two-factor verification client for multisig accounts",
    version,
    author
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Home directory for configuration and state"
    )]
    home: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "warn",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    log_level: String,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(about = "Show the request awaiting verification")]
    Status,

    #[command(about = "Forget the request awaiting verification")]
    Clear,

    #[command(about = "Start two-factor enrollment")]
    Init {
        #[arg(long, value_name = "KIND", help = "Method kind, e.g. 2fa-email")]
        kind: Option<String>,

        #[arg(
            long,
            value_name = "DETAIL",
            requires = "kind",
            help = "Method detail, e.g. an email address"
        )]
        detail: Option<String>,
    },

    #[command(about = "Send a new security code for the tracked request")]
    Resend,

    #[command(about = "Submit a security code")]
    Verify {
        #[arg(value_name = "CODE", help = "Security code")]
        code: String,
    },

    #[command(about = "List requests pending on the multisig contract")]
    Requests,

    #[command(about = "List access keys of the account")]
    Keys,

    #[command(about = "Show the transaction that moves the account to multisig")]
    Plan {
        #[arg(long, value_name = "FILE", help = "Multisig contract bytecode")]
        code: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Write the default configuration")]
    Init {
        #[arg(long, help = "Replace an existing configuration file")]
        overwrite: bool,
    },

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Set a configuration value")]
    Set {
        #[arg(value_name = "KEY")]
        key: String,

        #[arg(value_name = "VALUE")]
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_format = match cli.output {
        OutputFormat::Json => LogFormat::Json,
        OutputFormat::Text => LogFormat::Compact,
    };
    if let Err(e) = init_cli_tracing(&cli.log_level, log_format) {
        eprintln!("error: invalid log level {}: {e}", cli.log_level);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<twofa_errors::Error>() {
                Some(err) => eprintln!("error [{}]: {e:#}", err.code()),
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let home = cli.home.unwrap_or_else(ClientConfig::default_config_dir);
    let output = cli.output;

    match cli.command {
        Commands::Config { command } => config_command(&home, command, output),
        Commands::Status => status_command(&home, output).await,
        Commands::Clear => clear_command(&home).await,
        Commands::Init { kind, detail } => init_command(&home, kind, detail, output).await,
        Commands::Resend => resend_command(&home, output).await,
        Commands::Verify { code } => verify_command(&home, &code, output).await,
        Commands::Requests => requests_command(&home, output).await,
        Commands::Keys => keys_command(&home, output).await,
        Commands::Plan { code } => plan_command(&home, &code, output).await,
    }
}

fn config_command(home: &Path, command: ConfigCommands, output: OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::Init { overwrite } => {
            ClientConfig::init(home, overwrite)?;
            let path = ClientConfig::config_file(home);
            tracing::info!(path = %path.display(), "configuration initialized");
            println!("Configuration written to {}", path.display());
        }
        ConfigCommands::Show => {
            let config = ClientConfig::load_or_default(home)?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Text => print!("{}", toml::to_string_pretty(&config)?),
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut config = ClientConfig::load_or_default(home)?;
            config.set(&key, &value)?;
            std::fs::create_dir_all(home)
                .with_context(|| format!("creating {}", home.display()))?;
            config.save_to_file(ClientConfig::config_file(home))?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}

fn pending_requests(home: &Path, config: &ClientConfig) -> PendingRequests {
    PendingRequests::new(Arc::new(FileStore::new(config.store_file(home))))
}

async fn status_command(home: &Path, output: OutputFormat) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    let record = pending_requests(home, &config).get().await?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text if record.is_empty() => println!("No pending request"),
        OutputFormat::Text => {
            let account = record
                .account_id
                .as_ref()
                .map(AccountId::to_string)
                .unwrap_or_else(|| "-".to_string());
            let request = record
                .request_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string());
            println!("account:    {account}");
            println!("request id: {request}");
        }
    }
    Ok(())
}

async fn clear_command(home: &Path) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    pending_requests(home, &config).clear().await?;
    println!("Pending request cleared");
    Ok(())
}

fn parse_account(id: &str, key: &str) -> Result<AccountId> {
    if id.is_empty() {
        anyhow::bail!("{key} is not configured, run `twofa config set {key} <id>`");
    }
    Ok(id.parse()?)
}

fn rpc_client(config: &ClientConfig) -> Result<RpcClient> {
    Ok(RpcClient::new(
        &config.rpc_url,
        Duration::from_secs(config.timeout),
    )?)
}

fn build_session(home: &Path, config: &ClientConfig) -> Result<Arc<TwoFactorSession>> {
    let settings = config.to_settings()?;
    let account_id = parse_account(&config.account_id, "account_id")?;

    let key_path = config
        .signing_key
        .as_ref()
        .context("signing_key is not configured, run `twofa config set signing_key <file>`")?;
    let key_path = if key_path.is_absolute() {
        key_path.clone()
    } else {
        home.join(key_path)
    };
    let secret = std::fs::read_to_string(&key_path)
        .with_context(|| format!("reading signing key {}", key_path.display()))?;

    let signer = KeyPairSigner::from_hex(rpc_client(config)?, &secret)?;
    let service = HttpVerificationClient::new(
        &config.verification_url,
        Duration::from_secs(config.timeout),
        Arc::new(signer),
    )?;

    let mut session = TwoFactorSession::new(
        account_id,
        Arc::new(service),
        pending_requests(home, config),
        Arc::new(ConfirmationChannel::new()),
    )
    .with_two_factor(settings.has_2fa);
    if let Some(recovery) = &config.recovery_account_id {
        session = session.with_recovery_account(parse_account(recovery, "recovery_account_id")?);
    }
    Ok(Arc::new(session))
}

fn print_value<T: Serialize>(value: &T, output: OutputFormat) -> Result<()> {
    let json = serde_json::to_value(value)?;
    match (output, json) {
        (_, serde_json::Value::Null) => {}
        (OutputFormat::Text, serde_json::Value::String(s)) => println!("{s}"),
        (_, json) => println!("{}", serde_json::to_string_pretty(&json)?),
    }
    Ok(())
}

async fn init_command(
    home: &Path,
    kind: Option<String>,
    detail: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    let session = build_session(home, &config)?;
    let method = kind.map(|kind| TwoFactorMethod::new(kind, detail));
    let account_id = session.account_id().clone();

    let response = session.init_two_factor(&account_id, method.as_ref()).await?;
    print_value(&response, output)?;
    if output == OutputFormat::Text {
        println!("Enrollment started for {account_id}, run `twofa verify <code>` to finish");
    }
    Ok(())
}

/// Answer confirmation prompts from standard input until aborted
fn spawn_code_prompt(session: Arc<TwoFactorSession>) -> JoinHandle<()> {
    let mut prompt = session.channel().subscribe();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while prompt.wait_for(|open| *open).await.is_ok() {
            eprint!("Security code (empty to cancel): ");
            match lines.next_line().await {
                Ok(Some(code)) if !code.trim().is_empty() => {
                    if let Err(e) = session.confirm_with_code(code.trim()).await {
                        eprintln!("verification failed: {e}");
                    }
                }
                _ => {
                    session.cancel_confirmation();
                }
            }
        }
    })
}

async fn resend_command(home: &Path, output: OutputFormat) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    let session = build_session(home, &config)?;
    let prompt = spawn_code_prompt(session.clone());

    let result = session.resend(None, None).await;
    prompt.abort();

    match result? {
        Some(response) => print_value(&response, output)?,
        None if output == OutputFormat::Text => println!("Security code sent"),
        None => {}
    }
    Ok(())
}

async fn verify_command(home: &Path, code: &str, output: OutputFormat) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    let session = build_session(home, &config)?;
    let response = session.verify_two_factor(None, code).await?;
    print_value(&response, output)?;
    if output == OutputFormat::Text {
        println!("Security code accepted");
    }
    Ok(())
}

#[derive(Serialize)]
struct RequestsView {
    account_id: AccountId,
    request_nonce: serde_json::Value,
    request_ids: serde_json::Value,
}

/// Account operations execute against
fn effective_account(config: &ClientConfig) -> Result<AccountId> {
    match &config.recovery_account_id {
        Some(recovery) => parse_account(recovery, "recovery_account_id"),
        None => parse_account(&config.account_id, "account_id"),
    }
}

async fn requests_command(home: &Path, output: OutputFormat) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    let account_id = effective_account(&config)?;
    let rpc = rpc_client(&config)?;

    let args = serde_json::json!({});
    let view = RequestsView {
        request_nonce: rpc
            .view_function(&account_id, "get_request_nonce", &args)
            .await?,
        request_ids: rpc
            .view_function(&account_id, "list_request_ids", &args)
            .await?,
        account_id,
    };

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => {
            println!("account:       {}", view.account_id);
            println!("request nonce: {}", view.request_nonce);
            println!("pending ids:   {}", view.request_ids);
        }
    }
    Ok(())
}

fn describe_permission(permission: &AccessKeyPermission) -> String {
    match permission {
        AccessKeyPermission::FullAccess => "full access".to_string(),
        AccessKeyPermission::FunctionCall(call) => format!(
            "calls on {} [{}]",
            call.receiver_id,
            call.method_names.join(", ")
        ),
    }
}

async fn keys_command(home: &Path, output: OutputFormat) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    let account_id = effective_account(&config)?;
    let keys: Vec<AccessKeyInfo> = rpc_client(&config)?
        .view_access_key_list(&account_id)
        .await?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
        OutputFormat::Text => {
            for key in &keys {
                println!(
                    "{}  {}",
                    key.public_key,
                    describe_permission(&key.access_key.permission)
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PlanView {
    #[serde(flatten)]
    migration: MigrationPlan,
    request_gas: Gas,
    limited_key_allowance: Balance,
}

fn describe_action(action: &Action) -> String {
    match action {
        Action::AddKey {
            public_key,
            access_key,
        } => format!(
            "AddKey {public_key} ({})",
            describe_permission(&access_key.permission)
        ),
        Action::DeleteKey { public_key } => format!("DeleteKey {public_key}"),
        Action::DeployContract { code } => format!("DeployContract ({} bytes)", code.len()),
        Action::FunctionCall {
            method_name, gas, ..
        } => format!("FunctionCall {method_name} (gas {gas})"),
        other => other.kind().to_string(),
    }
}

async fn plan_command(home: &Path, code_path: &Path, output: OutputFormat) -> Result<()> {
    let config = ClientConfig::load_or_default(home)?;
    let settings = config.to_settings()?;
    let session = build_session(home, &config)?;
    let code = std::fs::read(code_path)
        .with_context(|| format!("reading contract code {}", code_path.display()))?;

    let account_id = session.account_id().clone();
    let access_keys = rpc_client(&config)?
        .view_access_key_list(&account_id)
        .await?;
    let migration = plan_migration(
        session.service().as_ref(),
        &account_id,
        &access_keys,
        &code,
        settings.lak_allowance,
    )
    .await?;

    let view = PlanView {
        migration,
        request_gas: settings.change_gas,
        limited_key_allowance: settings.access_key_funding_amount,
    };
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => {
            println!("account:               {}", view.migration.account_id);
            println!("confirm-only key:      {}", view.migration.confirm_only_key);
            println!("actions:");
            for (i, action) in view.migration.actions.iter().enumerate() {
                println!("  {}. {}", i + 1, describe_action(action));
            }
            println!("request gas:           {}", view.request_gas);
            println!("limited key allowance: {}", view.limited_key_allowance);
        }
    }
    Ok(())
}
