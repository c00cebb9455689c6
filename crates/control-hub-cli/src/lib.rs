use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use control_hub_client::{
    ControlHubClient, ControlHubConfig, MandateDraft, MandateScope, PaymentIntent, PaymentPlan,
    PaymentRail, TogglesUpdate, X402FacilitatorConfigUpdate, minor_units, resolve_base_url,
};

#[derive(Parser)]
#[command(name = "control-hub")]
#[command(about = "Operator CLI for the AI Transactions control API")]
pub struct ControlHubCli {
    /// Base URL of the control API (takes precedence over API_BASE_URL
    /// and CONTROL_CENTER_URL)
    #[arg(long, global = true)]
    pub api_base: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe /api/health
    Health,
    /// Read or replace the feature-flag toggles
    Toggles(TogglesArgs),
    /// Trigger a full end-to-end diagnostic payment run
    Diagnostics,
    /// Execute a payment with an inline mandate
    Pay(PayArgs),
    /// List payment receipts
    Receipts,
    /// Mandate operations (list, issue, revoke)
    Mandates(MandatesArgs),
    /// Windowed analytics snapshot
    Analytics(AnalyticsArgs),
    /// List inbound webhook events
    Inbound,
    /// Coinbase x402 facilitator settings
    X402(X402Args),
    /// Rotate the backend license key
    License(LicenseArgs),
    /// Export receipts as CSV on stdout
    ExportCsv,
}

#[derive(Args)]
pub struct TogglesArgs {
    #[command(subcommand)]
    pub command: TogglesCommand,
}

#[derive(Subcommand)]
pub enum TogglesCommand {
    /// Print the current toggles
    Get,
    /// Replace the toggles, reusing current values for anything not given
    Set(TogglesSetArgs),
}

#[derive(Args)]
pub struct TogglesSetArgs {
    #[arg(long)]
    pub loop_enabled: Option<bool>,
    #[arg(long)]
    pub sandbox_mode: Option<bool>,
    #[arg(long)]
    pub synthetic_agents: Option<bool>,
    /// Synthetic transactions per minute
    #[arg(long)]
    pub synthetic_rate: Option<u32>,
}

#[derive(Args)]
pub struct PayArgs {
    /// Amount in major units (for example 50.00)
    #[arg(long)]
    pub amount: f64,
    #[arg(long, default_value = "USDC")]
    pub currency: String,
    /// Destination handle: Coinbase handle, card token, or DID
    #[arg(long)]
    pub to: String,
    #[arg(long, default_value = "X402")]
    pub rail: PaymentRail,
    #[arg(long)]
    pub memo: Option<String>,
    #[arg(long, default_value = "did:example:operator")]
    pub issuer_did: String,
    #[arg(long, default_value = "did:example:recipient")]
    pub subject_did: String,
    #[arg(long, default_value = "TIP")]
    pub scope: MandateScope,
    /// Spending cap for the inline mandate, in minor units
    #[arg(long, default_value_t = 10_000_000)]
    pub max_amount_minor: i64,
    /// Mandate validity in minutes
    #[arg(long, default_value_t = 60)]
    pub valid_minutes: i64,
}

#[derive(Args)]
pub struct MandatesArgs {
    #[command(subcommand)]
    pub command: MandatesCommand,
}

#[derive(Subcommand)]
pub enum MandatesCommand {
    /// List stored mandates
    List,
    /// Issue a new mandate
    Issue(MandateIssueArgs),
    /// Revoke a mandate by id
    Revoke { id: i64 },
}

#[derive(Args)]
pub struct MandateIssueArgs {
    #[arg(long, default_value = "did:example:issuer")]
    pub issuer_did: String,
    #[arg(long, default_value = "did:example:subject")]
    pub subject_did: String,
    #[arg(long, default_value = "TIP")]
    pub scope: MandateScope,
    /// Cap in minor units
    #[arg(long, default_value_t = 1_000_000)]
    pub max_amount_minor: i64,
    #[arg(long, default_value = "USDC")]
    pub currency: String,
    /// Mandate validity in minutes
    #[arg(long, default_value_t = 1_440)]
    pub valid_minutes: i64,
}

#[derive(Args)]
pub struct AnalyticsArgs {
    /// Window in minutes (5..=1440)
    #[arg(long, default_value_t = 60)]
    pub window: u32,
}

#[derive(Args)]
pub struct X402Args {
    #[command(subcommand)]
    pub command: X402Command,
}

#[derive(Subcommand)]
pub enum X402Command {
    /// Print the (redacted) facilitator settings
    Get,
    /// Replace the facilitator settings
    Set(X402SetArgs),
}

#[derive(Args)]
pub struct X402SetArgs {
    #[arg(long, default_value = "https://x402.org/facilitator")]
    pub facilitator_url: String,
    #[arg(long)]
    pub wallet_address: String,
    #[arg(long)]
    pub api_key_id: String,
    #[arg(long)]
    pub api_key_secret: String,
}

#[derive(Args)]
pub struct LicenseArgs {
    pub key: String,
}

pub async fn run() -> Result<()> {
    let cli = ControlHubCli::parse();
    let mut config = ControlHubConfig::from_env();
    if let Some(base) = cli.api_base.as_deref() {
        config.base_url = resolve_base_url(Some(base), None);
    }
    let client = ControlHubClient::new(&config);

    match cli.command {
        Commands::Health => run_health(&client).await,
        Commands::Toggles(args) => run_toggles(&client, args).await,
        Commands::Diagnostics => run_diagnostics(&client).await,
        Commands::Pay(args) => run_pay(&client, args).await,
        Commands::Receipts => run_receipts(&client).await,
        Commands::Mandates(args) => run_mandates(&client, args).await,
        Commands::Analytics(args) => run_analytics(&client, args).await,
        Commands::Inbound => run_inbound(&client).await,
        Commands::X402(args) => run_x402(&client, args).await,
        Commands::License(args) => run_license(&client, args).await,
        Commands::ExportCsv => run_export_csv(&client).await,
    }
}

async fn run_health(client: &ControlHubClient) -> Result<()> {
    if client.health().await {
        println!("online ({})", client.base_url());
        Ok(())
    } else {
        bail!("control api offline at {}", client.base_url());
    }
}

async fn run_toggles(client: &ControlHubClient, args: TogglesArgs) -> Result<()> {
    match args.command {
        TogglesCommand::Get => {
            let toggles = client
                .toggles()
                .await
                .with_context(|| format!("unable to read toggles from {}", client.base_url()))?;
            println!("{}", serde_json::to_string_pretty(&toggles)?);
            Ok(())
        }
        TogglesCommand::Set(set) => {
            // Full-replace contract: start from the backend's current
            // values so every known field is sent back.
            let current = client
                .toggles()
                .await
                .with_context(|| format!("unable to read toggles from {}", client.base_url()))?;
            let update = TogglesUpdate {
                loop_enabled: set.loop_enabled.unwrap_or(current.loop_enabled),
                sandbox_mode: set.sandbox_mode.unwrap_or(current.sandbox_mode),
                synthetic_agents: set.synthetic_agents.unwrap_or(current.synthetic_agents),
                synthetic_rate: set.synthetic_rate.unwrap_or(current.synthetic_rate),
            };
            if !client.save_toggles(&update).await {
                bail!("toggle update rejected by {}", client.base_url());
            }
            println!("toggles updated");
            Ok(())
        }
    }
}

async fn run_diagnostics(client: &ControlHubClient) -> Result<()> {
    if !client.run_diagnostics().await {
        bail!("diagnostics trigger failed");
    }
    println!("diagnostics triggered; a new receipt should appear shortly");
    Ok(())
}

async fn run_pay(client: &ControlHubClient, args: PayArgs) -> Result<()> {
    let now_ms = Utc::now().timestamp_millis();
    let plan = PaymentPlan {
        mandate: MandateDraft {
            issuer_did: args.issuer_did,
            subject_did: args.subject_did,
            scope: args.scope,
            max_amount_minor: args.max_amount_minor,
            currency: args.currency.clone(),
            expires_at: now_ms + args.valid_minutes * 60_000,
        },
        intent: PaymentIntent {
            amount_minor: minor_units(args.amount),
            currency: args.currency,
            memo: args.memo,
            counterparty: args.to,
            rail: args.rail,
        },
    };
    if !client.execute_payment(&plan).await {
        bail!("payment submission failed");
    }
    println!("payment submitted; check receipts for the outcome");
    Ok(())
}

async fn run_receipts(client: &ControlHubClient) -> Result<()> {
    let receipts = client
        .receipts()
        .await
        .with_context(|| format!("unable to list receipts from {}", client.base_url()))?;
    println!("{}", serde_json::to_string_pretty(&receipts)?);
    Ok(())
}

async fn run_mandates(client: &ControlHubClient, args: MandatesArgs) -> Result<()> {
    match args.command {
        MandatesCommand::List => {
            let mandates = client
                .mandates()
                .await
                .with_context(|| format!("unable to list mandates from {}", client.base_url()))?;
            println!("{}", serde_json::to_string_pretty(&mandates)?);
            Ok(())
        }
        MandatesCommand::Issue(issue) => {
            let now_ms = Utc::now().timestamp_millis();
            let draft = MandateDraft {
                issuer_did: issue.issuer_did,
                subject_did: issue.subject_did,
                scope: issue.scope,
                max_amount_minor: issue.max_amount_minor,
                currency: issue.currency,
                expires_at: now_ms + issue.valid_minutes * 60_000,
            };
            if !client.issue_mandate(&draft).await {
                bail!("mandate issuance failed");
            }
            println!("mandate issued");
            Ok(())
        }
        MandatesCommand::Revoke { id } => {
            if !client.revoke_mandate(id).await {
                bail!("mandate {id} could not be revoked");
            }
            println!("mandate {id} revoked");
            Ok(())
        }
    }
}

async fn run_analytics(client: &ControlHubClient, args: AnalyticsArgs) -> Result<()> {
    let window = args.window.clamp(5, 1_440);
    let snapshot = client
        .analytics(window)
        .await
        .with_context(|| format!("unable to read analytics from {}", client.base_url()))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_inbound(client: &ControlHubClient) -> Result<()> {
    let events = client
        .inbound_events()
        .await
        .with_context(|| format!("unable to list inbound events from {}", client.base_url()))?;
    if events.is_empty() {
        println!("no inbound events recorded");
    } else {
        println!("{}", serde_json::to_string_pretty(&events)?);
    }
    Ok(())
}

async fn run_x402(client: &ControlHubClient, args: X402Args) -> Result<()> {
    match args.command {
        X402Command::Get => match client.x402_config().await {
            Some(config) => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            None => {
                println!("no facilitator configured");
                Ok(())
            }
        },
        X402Command::Set(set) => {
            let update = X402FacilitatorConfigUpdate {
                facilitator_url: set.facilitator_url,
                wallet_address: set.wallet_address,
                api_key_id: set.api_key_id,
                api_key_secret: set.api_key_secret,
            };
            if !client.save_x402_config(&update).await {
                bail!("facilitator config rejected by {}", client.base_url());
            }
            println!("facilitator config saved");
            Ok(())
        }
    }
}

async fn run_license(client: &ControlHubClient, args: LicenseArgs) -> Result<()> {
    if !client.rotate_license(&args.key).await {
        bail!("license rotation failed");
    }
    println!("license rotated");
    Ok(())
}

async fn run_export_csv(client: &ControlHubClient) -> Result<()> {
    let csv = client
        .export_receipts_csv()
        .await
        .with_context(|| format!("unable to export receipts from {}", client.base_url()))?;
    print!("{csv}");
    Ok(())
}
