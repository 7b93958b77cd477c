//! CLI binary for docfit.
//!
//! A thin shim over the library crate: it wires the reqwest client and the
//! file-backed identity store into the orchestrator and prints results.
//! Checkout is an external widget the terminal cannot host, so when the
//! flow lands on the paywall the CLI prints the plan table and exits
//! nonzero instead of attempting a purchase.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docfit::{
    find_kind, CheckoutOutcome, CheckoutWidget, FlowState, FsIdentityStore, Locale, Orchestrator,
    PaymentFlow, Plan, PortalApi, PortalConfig, ReferralTracker, UploadFile, CATALOG,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "docfit", version, about = "Resize portal documents to their byte budget")]
struct Cli {
    /// Portal backend base URL.
    #[arg(long, env = "DOCFIT_BASE_URL", default_value = "http://127.0.0.1:8000")]
    base_url: String,

    /// Directory for durable client state (referral identity).
    #[arg(long, env = "DOCFIT_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Referral code you were invited with (first run only).
    #[arg(long)]
    referred_by: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the document kinds the portal accepts.
    Kinds {
        /// Label language.
        #[arg(long, default_value = "en")]
        lang: String,
    },
    /// Show remaining free conversions.
    Quota,
    /// Show the purchasable plans.
    Plans,
    /// Convert a file for the given document kind.
    Convert {
        /// Document kind id (see `docfit kinds`).
        #[arg(long)]
        kind: String,
        /// Input file path.
        #[arg(long)]
        file: PathBuf,
        /// Output path (defaults to the server's suggested filename).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// The terminal cannot host the payment provider's widget.
struct UnavailableWidget;

#[async_trait::async_trait]
impl CheckoutWidget for UnavailableWidget {
    async fn checkout(&self, _payment_session_id: &str) -> CheckoutOutcome {
        CheckoutOutcome::Failed {
            reason: "checkout widget is not available in the terminal".to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Kinds { lang } => {
            let locale = parse_locale(lang)?;
            for kind in CATALOG.iter() {
                println!(
                    "{:<6} {:<10} {:>4} KiB  {}",
                    bold(kind.id),
                    kind.media.endpoint_segment(),
                    kind.ceiling_bytes() / 1024,
                    kind.label(locale)
                );
            }
            Ok(())
        }
        Command::Plans => {
            print_plans();
            Ok(())
        }
        Command::Quota => {
            let mut flow = build_flow(&cli)?;
            let remaining = flow
                .refresh_quota()
                .await
                .context("could not reach the quota endpoint")?;
            println!("{} free conversions remaining", bold(&remaining.to_string()));
            Ok(())
        }
        Command::Convert { kind, file, out } => run_convert(&cli, kind, file, out.as_deref()).await,
    }
}

async fn run_convert(
    cli: &Cli,
    kind_id: &str,
    file: &std::path::Path,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let Some(kind) = find_kind(kind_id) else {
        bail!("unknown document kind '{kind_id}' — run `docfit kinds` for the list");
    };

    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime = guess_mime(&name);

    let mut flow = build_flow(cli)?;
    if let Err(e) = flow.refresh_quota().await {
        eprintln!("{} {e}", yellow("warning:"));
    }

    flow.select_document(kind);
    flow.select_file(UploadFile::new(name, bytes, mime));

    match flow.attempt_convert().await {
        FlowState::Done => {
            // Non-panicking by construction: Done always carries a result.
            let Some(result) = flow.result() else {
                bail!("internal error: Done without a result");
            };
            let out_path = out
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&result.filename));
            std::fs::write(&out_path, &result.bytes)
                .with_context(|| format!("writing {}", out_path.display()))?;
            let note = if result.compressed {
                "compressed"
            } else {
                "already within the limit — returned unchanged"
            };
            println!(
                "{} {} ({} KiB, {})",
                green("✓"),
                out_path.display(),
                result.byte_len / 1024,
                dim(note)
            );
            println!(
                "{}",
                dim(&format!(
                    "free remaining: {}   paid remaining: {}",
                    flow.ledger().free_remaining(),
                    flow.ledger().paid_balance()
                ))
            );
            Ok(())
        }
        FlowState::Blocked => {
            eprintln!("{}", yellow("Free conversions used up!"));
            print_plans();
            bail!("no entitlement remaining — purchase a plan on the portal to continue");
        }
        FlowState::Failed => {
            let reason = flow
                .last_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("conversion failed: {reason}");
        }
        other => bail!("unexpected flow state {other:?}"),
    }
}

fn build_flow(cli: &Cli) -> Result<Orchestrator> {
    let config = PortalConfig::builder()
        .base_url(cli.base_url.clone())
        .build()
        .context("invalid configuration")?;
    let api = Arc::new(PortalApi::new(&config)?);

    let state_path = state_dir(cli)?.join("state.json");
    let store = FsIdentityStore::open(&state_path)
        .with_context(|| format!("opening state file {}", state_path.display()))?;
    let referral = ReferralTracker::load(Box::new(store), cli.referred_by.as_deref())?;

    let payment = PaymentFlow::new(api.clone(), Arc::new(UnavailableWidget));
    Ok(Orchestrator::new(api.clone(), api.clone(), api, payment, referral))
}

fn state_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.state_dir {
        return Ok(dir.clone());
    }
    let home = std::env::var_os("HOME").context("HOME is not set; pass --state-dir")?;
    Ok(PathBuf::from(home).join(".docfit"))
}

fn parse_locale(lang: &str) -> Result<Locale> {
    match lang {
        "en" => Ok(Locale::En),
        "bn" => Ok(Locale::Bn),
        "hi" => Ok(Locale::Hi),
        other => bail!("unsupported language '{other}' (expected en, bn, or hi)"),
    }
}

fn guess_mime(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

fn print_plans() {
    for plan in [Plan::Student, Plan::Cafe] {
        println!(
            "  {:<8} ₹{:<3} {} documents",
            bold(plan.id()),
            plan.price_inr(),
            plan.docs_allowed()
        );
    }
}
