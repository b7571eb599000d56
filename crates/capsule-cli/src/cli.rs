use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use capsule_core::VERSION;

/// Capsule - time-locked encrypted messages unlocked by Bitcoin key holders
#[derive(Parser)]
#[command(name = "capsule")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault file
    #[arg(short, long, global = true, env = "CAPSULE_VAULT")]
    pub vault: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log verbosity (overridden by RUST_LOG)
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_input: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// A signed session challenge proving control of an address.
///
/// Each challenge is single-use, so every owner command needs a fresh one.
#[derive(Args, Debug, Clone)]
pub struct OwnerProof {
    /// Address you are signing as
    #[arg(long, env = "CAPSULE_ADDRESS")]
    pub address: Option<String>,

    /// Challenge ID printed by `capsule challenge`
    #[arg(long, env = "CAPSULE_CHALLENGE")]
    pub challenge: Option<String>,

    /// Base64 message signature over the challenge text
    #[arg(long, env = "CAPSULE_SIGNATURE")]
    pub signature: Option<String>,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Path where the vault will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Config path override
    #[arg(long)]
    pub config_path: Option<String>,
}

/// Arguments for the `challenge` command
#[derive(Args)]
pub struct ChallengeArgs {
    /// Address that will sign the challenge
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// Issue a guardian attestation challenge for this owner's capsule
    #[arg(long, value_name = "OWNER", requires = "capsule")]
    pub guardian_for: Option<String>,

    /// Capsule index the attestation is bound to
    #[arg(long, value_name = "INDEX", requires = "guardian_for")]
    pub capsule: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `verify` command
#[derive(Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub proof: OwnerProof,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `create` command
#[derive(Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub proof: OwnerProof,

    /// Message to seal (reads stdin when omitted)
    #[arg(short, long)]
    pub message: Option<String>,

    /// Unlock delay: 1d, 7d or 30d (custom values if the vault allows them)
    #[arg(short, long, default_value = "7d")]
    pub delay: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub proof: OwnerProof,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Output format (table, plain)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,
}

/// Arguments for the `unlock` command
#[derive(Args)]
pub struct UnlockArgs {
    /// Capsule index (e.g. 0 or #0)
    #[arg(value_name = "INDEX")]
    pub index: String,

    #[command(flatten)]
    pub proof: OwnerProof,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `guardian add` and `guardian remove`
#[derive(Args)]
pub struct GuardianEditArgs {
    /// Guardian address
    #[arg(value_name = "GUARDIAN")]
    pub guardian: String,

    #[command(flatten)]
    pub proof: OwnerProof,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `guardian list`
#[derive(Args)]
pub struct GuardianListArgs {
    #[command(flatten)]
    pub proof: OwnerProof,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `guardian status`
#[derive(Args)]
pub struct GuardianStatusArgs {
    /// Owner to report on (defaults to the signer)
    #[arg(long, value_name = "OWNER")]
    pub owner: Option<String>,

    #[command(flatten)]
    pub proof: OwnerProof,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `guardian unlock`
#[derive(Args)]
pub struct GuardianUnlockArgs {
    /// Owner of the capsule
    #[arg(value_name = "OWNER")]
    pub owner: String,

    /// Capsule index (e.g. 0 or #0)
    #[arg(value_name = "INDEX")]
    pub index: String,

    /// Guardian attestation as ADDRESS:CHALLENGE_ID:SIGNATURE (repeatable)
    #[arg(long = "attest", value_name = "ATTESTATION", required = true)]
    pub attestations: Vec<String>,

    #[command(flatten)]
    pub proof: OwnerProof,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum GuardianCommands {
    /// Trust a guardian for emergency unlock
    Add(GuardianEditArgs),

    /// Revoke a guardian
    Remove(GuardianEditArgs),

    /// List trusted guardians
    List(GuardianListArgs),

    /// Show the guardian quorum for an owner
    Status(GuardianStatusArgs),

    /// Unlock a capsule early with guardian attestations
    Unlock(GuardianUnlockArgs),
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[cfg(feature = "test-support")]
#[derive(Subcommand)]
pub enum DebugCommands {
    /// Unlock a capsule regardless of policy (vault must enable test_mode)
    ForceUnlock(UnlockArgs),
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new encrypted vault
    Init(InitArgs),

    /// Issue a challenge for an address to sign
    Challenge(ChallengeArgs),

    /// Check a signed challenge without doing anything else
    Verify(VerifyArgs),

    /// Seal a new time capsule
    Create(CreateArgs),

    /// List your capsules
    List(ListArgs),

    /// Unlock one of your capsules once its time has come
    Unlock(UnlockArgs),

    /// Manage guardians and emergency unlock
    #[command(subcommand)]
    Guardian(GuardianCommands),

    /// Serve JSON requests from stdin, one per line
    Exec,

    /// Check vault integrity
    Check,

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Print version information
    Version,

    /// Test harness commands
    #[cfg(feature = "test-support")]
    #[command(subcommand, hide = true)]
    Debug(DebugCommands),
}
