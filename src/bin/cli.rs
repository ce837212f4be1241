// bin/cli.rs - peer-trust CLI Tool
//
//! Peer Trust Command Line Interface
//!
//! Manage the local identity and the web of trust stored on this machine.
//!
//! # Usage
//!
//! ```bash
//! # Create (or load) the local identity
//! peer-trust init --name alice
//!
//! # Print what to send to other peers
//! peer-trust identity announce > alice.json
//!
//! # Record a peer and mark it verified after comparing fingerprints
//! peer-trust peers add bob.json
//! peer-trust peers trust peer-1a2b3c4d full --method video
//!
//! # Vouch for a peer towards someone else
//! peer-trust introduce create peer-1a2b3c4d > intro.json
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use peer_trust::observability::{init_metrics, init_tracing, MetricsHandle};
use peer_trust::persistence::{open_storage, StorageBackend};
use peer_trust::settings::Settings;
use peer_trust::trust::{
    fingerprint_of, verify_payload, IdentityManager, InitOutcome, Introduction,
    IntroductionOutcome, PeerAnnouncement, PeerChange, PersistStatus, Profile, ProfilePatch,
    TrustLevel, TrustRecord, UpdateOutcome, VerificationMethod,
};

/// Peer Trust CLI Tool
#[derive(Parser, Debug)]
#[command(name = "peer-trust")]
#[command(author = "SavageS")]
#[command(version)]
#[command(about = "Peer identity and web of trust - manage keys, peers and introductions")]
#[command(long_about = None)]
struct Args {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the storage location
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// Override the storage backend
    #[arg(long, global = true)]
    backend: Option<Backend>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Backend {
    File,
    Sled,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the local identity, or load the existing one
    Init {
        /// Display name for a new identity
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        email: Option<String>,
    },

    /// Show the local identity
    Show,

    /// Print a fingerprint (own identity, or a given public key)
    Fingerprint {
        /// Base64 public key; defaults to the local identity
        public_key: Option<String>,

        /// Only the first eight groups
        #[arg(short, long)]
        short: bool,
    },

    /// Sign a JSON payload with the local identity
    Sign {
        /// JSON payload file ("-" for stdin)
        payload: PathBuf,
    },

    /// Verify a JSON payload signature
    Verify {
        /// JSON payload file ("-" for stdin)
        payload: PathBuf,

        /// Base64 signature
        signature: String,

        /// Verify with a known peer's cached key
        #[arg(long, conflicts_with = "public_key")]
        peer: Option<String>,

        /// Verify with an explicit base64 public key
        #[arg(long)]
        public_key: Option<String>,
    },

    /// Known peer management commands
    #[command(subcommand)]
    Peers(PeerCommands),

    /// Local identity commands
    #[command(subcommand)]
    Identity(IdentityCommands),

    /// Introduction commands
    #[command(subcommand)]
    Introduce(IntroduceCommands),

    /// Trust store statistics
    Stats {
        /// Print metrics in Prometheus text format
        #[arg(long)]
        prometheus: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PeerCommands {
    /// List known peers
    List {
        /// Only peers at this level or better
        #[arg(short, long)]
        min_level: Option<TrustLevel>,
    },

    /// Show one peer
    Show {
        peer_id: String,
    },

    /// Record a peer announcement
    Add {
        /// Announcement JSON file ("-" for stdin)
        file: PathBuf,

        /// Peer that introduced this one
        #[arg(long)]
        introduced_by: Option<String>,
    },

    /// Set a peer's trust level
    Trust {
        peer_id: String,

        /// unknown, untrusted, marginal, full
        level: TrustLevel,

        /// How the key was verified (code, video, in-person, none)
        #[arg(short, long)]
        method: Option<VerificationMethod>,
    },

    /// Replace the notes on a peer
    Notes {
        peer_id: String,
        text: String,
    },

    /// Forget a peer
    Remove {
        peer_id: String,
    },

    /// Find introduction chains to a peer
    Chains {
        peer_id: String,

        /// Apply the best chain (raises unknown peers to marginal)
        #[arg(long)]
        apply: bool,
    },

    /// Export known peers
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge an exported known-peers file
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum IdentityCommands {
    /// Print the public announcement for other peers
    Announce,

    /// Export the identity, private key included
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the local identity from an export
    Import {
        file: PathBuf,
    },

    /// Update profile fields
    Profile {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        avatar: Option<String>,

        #[arg(long)]
        bio: Option<String>,
    },

    /// Delete all trust state and generate a new identity
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum IntroduceCommands {
    /// Endorse a known peer for a third party
    Create {
        peer_id: String,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Accept an introduction from a known peer
    Receive {
        /// Introducer's peer id
        #[arg(long)]
        from: String,

        /// Introduction JSON file ("-" for stdin)
        file: PathBuf,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(data) = &args.data {
        settings.storage.path = data.clone();
    }
    if let Some(backend) = args.backend {
        settings.storage.backend = match backend {
            Backend::File => StorageBackend::File,
            Backend::Sled => StorageBackend::Sled,
        };
    }

    init_tracing(&settings.logging.clone().verbose(args.verbose))
        .context("Failed to initialize logging")?;

    if args.format == OutputFormat::Json {
        colored::control::set_override(false);
    }

    let wants_metrics = matches!(args.command, Commands::Stats { prometheus: true });
    let metrics = if wants_metrics || settings.metrics.listen_addr.is_some() {
        Some(init_metrics(settings.metrics.clone()).map_err(|e| anyhow!("Failed to start metrics: {e}"))?)
    } else {
        None
    };

    let storage = open_storage(&settings.storage).context("Failed to open storage")?;
    let mut manager = IdentityManager::new(storage, settings.manager_config());

    let seed = match &args.command {
        Commands::Init { name, email } => Profile {
            name: name.clone().unwrap_or_else(|| settings.profile.name.clone()),
            email: email.clone().or_else(|| settings.profile.email.clone()),
            ..settings.profile.clone()
        },
        _ => settings.profile.clone(),
    };
    let init = manager
        .initialize(seed)
        .await
        .context("Failed to initialize identity")?;

    match &args.command {
        Commands::Init { .. } => cmd_init(&args, &manager, &init),
        Commands::Show => cmd_show(&args, &manager),
        Commands::Fingerprint { public_key, short } => {
            cmd_fingerprint(&manager, public_key.as_deref(), *short)
        }
        Commands::Sign { payload } => cmd_sign(&manager, payload).await,
        Commands::Verify {
            payload,
            signature,
            peer,
            public_key,
        } => cmd_verify(&manager, payload, signature, peer.as_deref(), public_key.as_deref()).await,
        Commands::Peers(cmd) => cmd_peers(&args, &mut manager, cmd).await,
        Commands::Identity(cmd) => cmd_identity(&args, &mut manager, cmd).await,
        Commands::Introduce(cmd) => cmd_introduce(&mut manager, cmd).await,
        Commands::Stats { prometheus } => cmd_stats(&args, &manager, metrics.as_ref().filter(|_| *prometheus)),
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return tokio::task::spawn_blocking(|| std::io::read_to_string(std::io::stdin()))
            .await?
            .context("Failed to read stdin");
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", "→".cyan(), path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_persist(status: &PersistStatus) {
    if let PersistStatus::Failed(reason) = status {
        eprintln!("{} Change kept in memory but not saved: {}", "Warning:".yellow(), reason);
    }
}

fn report_update(outcome: &UpdateOutcome, peer_id: &str, done: &str) -> Result<()> {
    match outcome {
        UpdateOutcome::Applied(status) => {
            println!("{} {} {}", "✓".green(), peer_id, done);
            report_persist(status);
        }
        UpdateOutcome::Unchanged => println!("{} {} unchanged", "·".dimmed(), peer_id),
        UpdateOutcome::NotFound => bail!("Unknown peer {peer_id}"),
    }
    Ok(())
}

fn colored_level(level: TrustLevel) -> colored::ColoredString {
    match level {
        TrustLevel::Full => level.as_str().green().bold(),
        TrustLevel::Marginal => level.as_str().yellow(),
        TrustLevel::Untrusted => level.as_str().red(),
        TrustLevel::Unknown => level.as_str().dimmed(),
    }
}

fn format_time(epoch_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

fn print_record(record: &TrustRecord) {
    println!("{}", format!("Peer: {}", record.peer_id).bold().cyan());
    println!("{}", "─".repeat(60));
    println!("  {} {}", "Name:".bold(), record.profile.name);
    println!("  {} {}", "Fingerprint:".bold(), record.fingerprint);
    println!("  {} {}", "Key ID:".bold(), record.key_id);
    println!("  {} {}", "Trust:".bold(), colored_level(record.trust_level));
    if record.verified {
        println!(
            "  {} {} at {}",
            "Verified:".bold(),
            record.verified_method,
            record.verified_at.map(format_time).unwrap_or_default()
        );
    }
    if let Some(introducer) = &record.introduced_by {
        println!("  {} {}", "Introduced by:".bold(), introducer);
    }
    if !record.signatures.is_empty() {
        let signers: Vec<_> = record.signatures.iter().map(|s| s.signed_by.as_str()).collect();
        println!("  {} {}", "Endorsed by:".bold(), signers.join(", "));
    }
    if !record.notes.is_empty() {
        println!("  {} {}", "Notes:".bold(), record.notes);
    }
    println!("  {} {}", "First seen:".bold(), format_time(record.first_seen));
    println!("  {} {}", "Updated:".bold(), format_time(record.last_updated));
}

// =============================================================================
// Command Handlers
// =============================================================================

fn cmd_init(args: &Args, manager: &IdentityManager, init: &InitOutcome) -> Result<()> {
    match init {
        InitOutcome::Generated { persisted } => {
            println!("{} Generated a new identity", "✓".green());
            report_persist(persisted);
        }
        InitOutcome::Loaded { peers } => {
            println!("{} Loaded existing identity ({} known peers)", "✓".green(), peers);
        }
        InitOutcome::AlreadyInitialized => {}
    }
    cmd_show(args, manager)
}

fn cmd_show(args: &Args, manager: &IdentityManager) -> Result<()> {
    let identity = manager.identity()?;
    if args.format == OutputFormat::Json {
        return print_json(&identity.public_view());
    }

    println!("{}", "Local Identity".bold().cyan());
    println!("{}", "─".repeat(60));
    println!("  {} {}", "ID:".bold(), identity.id());
    println!("  {} {}", "Name:".bold(), identity.profile().name);
    if let Some(email) = &identity.profile().email {
        println!("  {} {}", "Email:".bold(), email);
    }
    println!("  {} {}", "Fingerprint:".bold(), identity.fingerprint());
    println!("  {} {}", "Short:".bold(), identity.short_fingerprint().green());
    println!("  {} {}", "Key ID:".bold(), identity.key_id());
    println!("  {} {}", "Created:".bold(), format_time(identity.created()));
    let capabilities: Vec<_> = identity.capabilities().iter().map(String::as_str).collect();
    println!("  {} {}", "Capabilities:".bold(), capabilities.join(", "));
    Ok(())
}

fn cmd_fingerprint(manager: &IdentityManager, public_key: Option<&str>, short: bool) -> Result<()> {
    let fingerprint = match public_key {
        Some(key) => fingerprint_of(key, short)?,
        None if short => manager.identity()?.short_fingerprint(),
        None => manager.identity()?.fingerprint().to_string(),
    };
    println!("{fingerprint}");
    Ok(())
}

async fn cmd_sign(manager: &IdentityManager, payload: &Path) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&read_input(payload).await?).context("Payload is not valid JSON")?;
    println!("{}", manager.sign(&payload)?);
    Ok(())
}

async fn cmd_verify(
    manager: &IdentityManager,
    payload: &Path,
    signature: &str,
    peer: Option<&str>,
    public_key: Option<&str>,
) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&read_input(payload).await?).context("Payload is not valid JSON")?;

    let valid = match (peer, public_key) {
        (Some(peer_id), _) => manager
            .verify_from_peer(peer_id, &payload, signature)?
            .ok_or_else(|| anyhow!("Unknown peer {peer_id}"))?,
        (None, Some(key)) => verify_payload(key, &payload, signature)?,
        (None, None) => manager.identity()?.verify(&payload, signature)?,
    };

    if !valid {
        bail!("Signature does not verify");
    }
    println!("{} Signature valid", "✓".green());
    Ok(())
}

async fn cmd_peers(args: &Args, manager: &mut IdentityManager, cmd: &PeerCommands) -> Result<()> {
    match cmd {
        PeerCommands::List { min_level } => {
            let peers: Vec<_> = manager
                .peers()
                .into_iter()
                .filter(|r| min_level.is_none_or(|min| manager.is_trusted(&r.peer_id, min)))
                .collect();

            if args.format == OutputFormat::Json {
                return print_json(&peers);
            }

            println!("{}", "Known Peers".bold().cyan());
            println!("{}", "─".repeat(60));
            if peers.is_empty() {
                println!("  No known peers");
            }
            for record in peers {
                let verified = if record.verified {
                    format!("({})", record.verified_method)
                } else {
                    String::new()
                };
                println!(
                    "  {:<16} {:<10} {:<20} {}",
                    record.peer_id,
                    colored_level(record.trust_level),
                    record.profile.name,
                    verified.dimmed()
                );
            }
        }

        PeerCommands::Show { peer_id } => {
            let record = manager
                .get_peer(peer_id)
                .ok_or_else(|| anyhow!("Unknown peer {peer_id}"))?;
            if args.format == OutputFormat::Json {
                return print_json(record);
            }
            print_record(record);
        }

        PeerCommands::Add { file, introduced_by } => {
            let announcement: PeerAnnouncement = serde_json::from_str(&read_input(file).await?)
                .context("Announcement is not valid JSON")?;
            let outcome = manager.add_peer(&announcement, introduced_by.as_deref()).await?;
            let what = match outcome.change {
                PeerChange::Created => "added".green(),
                PeerChange::Refreshed => "refreshed".cyan(),
                PeerChange::Unchanged => "unchanged".dimmed(),
            };
            println!("{} {} {}", "✓".green(), outcome.peer_id, what);
            if let Some(status) = &outcome.persisted {
                report_persist(status);
            }
        }

        PeerCommands::Trust { peer_id, level, method } => {
            let outcome = manager.set_trust(peer_id, *level, *method).await?;
            report_update(&outcome, peer_id, &format!("now {}", colored_level(*level)))?;
        }

        PeerCommands::Notes { peer_id, text } => {
            let outcome = manager.set_notes(peer_id, text.as_str()).await?;
            report_update(&outcome, peer_id, "notes updated")?;
        }

        PeerCommands::Remove { peer_id } => {
            let outcome = manager.remove_peer(peer_id).await?;
            report_update(&outcome, peer_id, "removed")?;
        }

        PeerCommands::Chains { peer_id, apply } => {
            let chains = manager.find_chains(peer_id)?;
            if args.format == OutputFormat::Json && !apply {
                let paths: Vec<_> = chains
                    .iter()
                    .map(|c| serde_json::json!({"path": c.path, "score": c.score}))
                    .collect();
                return print_json(&paths);
            }

            if chains.is_empty() {
                println!("  No verified chains to {peer_id}");
                return Ok(());
            }
            for chain in &chains {
                println!("  {:.3}  {}", chain.score, chain.path.join(" → "));
            }

            if *apply {
                let applied = manager.apply_chain(&chains[0].path).await?;
                if applied.upgraded {
                    println!("{} {} raised to {}", "✓".green(), peer_id, colored_level(TrustLevel::Marginal));
                } else {
                    println!("{} {} not changed (grant: {:?})", "·".dimmed(), peer_id, applied.verdict.grant());
                }
                if let Some(status) = &applied.persisted {
                    report_persist(status);
                }
            }
        }

        PeerCommands::Export { output } => {
            let text = manager.export_known_peers()?;
            write_output(output.as_deref(), &text).await?;
        }

        PeerCommands::Import { file } => {
            let report = manager.import_known_peers(&read_input(file).await?).await?;
            println!(
                "{} {} added, {} updated, {} kept, {} skipped",
                "✓".green(),
                report.added,
                report.updated,
                report.kept,
                report.skipped
            );
            if let Some(status) = &report.persisted {
                report_persist(status);
            }
        }
    }
    Ok(())
}

async fn cmd_identity(args: &Args, manager: &mut IdentityManager, cmd: &IdentityCommands) -> Result<()> {
    match cmd {
        IdentityCommands::Announce => print_json(&manager.public_view()?)?,

        IdentityCommands::Export { output } => {
            let text = manager.export_identity()?;
            eprintln!("{} The export contains your private key", "Warning:".yellow());
            write_output(output.as_deref(), &text).await?;
        }

        IdentityCommands::Import { file } => {
            let status = manager.import_identity(&read_input(file).await?).await?;
            println!("{} Imported identity {}", "✓".green(), manager.identity()?.id());
            report_persist(&status);
        }

        IdentityCommands::Profile {
            name,
            email,
            avatar,
            bio,
        } => {
            let patch = ProfilePatch {
                name: name.clone(),
                email: email.clone().map(|e| Some(e).filter(|e| !e.is_empty())),
                avatar: avatar.clone().map(|a| Some(a).filter(|a| !a.is_empty())),
                bio: bio.clone().map(|b| Some(b).filter(|b| !b.is_empty())),
            };
            let outcome = manager.update_profile(&patch).await?;
            let id = manager.identity()?.id().to_string();
            report_update(&outcome, &id, "profile updated")?;
            cmd_show(args, manager)?;
        }

        IdentityCommands::Reset { yes } => {
            if !yes {
                bail!("Reset deletes the identity and all trust records; pass --yes to confirm");
            }
            let name = manager.identity()?.profile().name.clone();
            let outcome = manager.reset(Profile::named(name)).await?;
            if let InitOutcome::Generated { persisted } = &outcome {
                report_persist(persisted);
            }
            println!("{} Reset complete", "✓".green());
            cmd_show(args, manager)?;
        }
    }
    Ok(())
}

async fn cmd_introduce(manager: &mut IdentityManager, cmd: &IntroduceCommands) -> Result<()> {
    match cmd {
        IntroduceCommands::Create { peer_id, output } => {
            let introduction = manager
                .create_introduction(peer_id)?
                .ok_or_else(|| anyhow!("Unknown peer {peer_id}"))?;
            write_output(output.as_deref(), &serde_json::to_string_pretty(&introduction)?).await?;
        }

        IntroduceCommands::Receive { from, file } => {
            let introduction: Introduction = serde_json::from_str(&read_input(file).await?)
                .context("Introduction is not valid JSON")?;
            match manager.receive_introduction(from, &introduction).await? {
                IntroductionOutcome::Accepted {
                    peer_id,
                    change,
                    persisted,
                    ..
                } => {
                    println!("{} {} introduced by {} ({:?})", "✓".green(), peer_id, from, change);
                    if let Some(status) = &persisted {
                        report_persist(status);
                    }
                }
                IntroductionOutcome::UnknownIntroducer => {
                    bail!("{from} is not a known peer; add it before accepting its introductions")
                }
            }
        }
    }
    Ok(())
}

fn cmd_stats(args: &Args, manager: &IdentityManager, metrics: Option<&MetricsHandle>) -> Result<()> {
    let stats = manager.stats();
    if let Some(handle) = metrics {
        print!("{}", handle.render());
        return Ok(());
    }
    if args.format == OutputFormat::Json {
        return print_json(&stats);
    }

    println!("{}", "Trust Store".bold().cyan());
    println!("{}", "─".repeat(40));
    println!("  {} {}", "Peers:".bold(), stats.total);
    println!("  {} {}", "Full:".bold(), stats.full.to_string().green());
    println!("  {} {}", "Marginal:".bold(), stats.marginal.to_string().yellow());
    println!("  {} {}", "Untrusted:".bold(), stats.untrusted.to_string().red());
    println!("  {} {}", "Unknown:".bold(), stats.unknown);
    println!("  {} {}", "Verified:".bold(), stats.verified);
    println!("  {} {}", "Endorsements:".bold(), stats.endorsements);
    Ok(())
}
