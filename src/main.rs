mod config;
mod prompt;
mod store;

use crate::config::{Config, config_path, save_config};
use crate::prompt::{prompt_secret_hidden, prompt_string};
use crate::store::{load_entry, save_entry};
use anyhow::anyhow;
use clap::{Parser, Subcommand, ValueEnum};
use kpotp::credential::DEFAULT_PERIOD;
use kpotp::migration::{self, migrate_to_builtin, migrate_to_legacy};
use kpotp::{HashAlgorithm, OtpCredential, OtpType, SecretEncoding, StorageShape, parse_period, uri};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kpotp", version, about = "Manage OTP credentials stored on password entries")]
struct Cli {
    /// Config file (defaults to <config dir>/kpotp/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file
    Init,

    /// Show the OTP credential stored on an entry
    Show {
        /// Entry file, e.g. work/github.json
        path: PathBuf,
        /// Print the secret instead of masking it
        #[arg(long)]
        reveal: bool,
    },

    /// Attach a secret or otpauth:// URL to an entry
    ///
    /// Примеры:
    ///   kpotp set work/github.json
    ///   kpotp set work/github.json --encoding hex --digits 8
    ///   kpotp set steam.json --type steam
    Set {
        /// Entry file, e.g. work/github.json
        path: PathBuf,
        #[arg(long, value_enum)]
        encoding: Option<EncodingArg>,
        #[arg(long, value_enum)]
        algorithm: Option<AlgorithmArg>,
        /// Code length, 6 or 8
        #[arg(long)]
        digits: Option<u32>,
        /// Time step in seconds
        #[arg(long)]
        period: Option<String>,
        /// Initial counter (hotp)
        #[arg(long)]
        counter: Option<u64>,
        #[arg(long = "type", value_enum)]
        otp_type: Option<TypeArg>,
        /// Keep the credential in the legacy `otp` field
        #[arg(long)]
        legacy: bool,
        /// Do not ask before accepting a non-standard time step
        #[arg(long)]
        yes: bool,
    },

    /// Rewrite the stored credential in another storage shape
    Migrate {
        /// Entry file, e.g. work/github.json
        path: PathBuf,
        #[arg(long, value_enum)]
        to: ShapeArg,
    },

    /// Parse an otpauth:// URL and print its settings
    Uri {
        uri: String,
        /// Print the secret instead of masking it
        #[arg(long)]
        reveal: bool,
    },

    /// Print an otpauth:// URL for the credential stored on an entry
    ExportUri {
        /// Entry file, e.g. work/github.json
        path: PathBuf,
        /// Label to put in the URL (file name by default)
        #[arg(long)]
        label: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EncodingArg {
    Base32,
    Base64,
    Hex,
    Utf8,
}

impl From<EncodingArg> for SecretEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Base32 => SecretEncoding::Base32,
            EncodingArg::Base64 => SecretEncoding::Base64,
            EncodingArg::Hex => SecretEncoding::Hex,
            EncodingArg::Utf8 => SecretEncoding::Utf8,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AlgorithmArg {
    Sha1,
    Sha256,
    Sha512,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Sha1 => HashAlgorithm::Sha1,
            AlgorithmArg::Sha256 => HashAlgorithm::Sha256,
            AlgorithmArg::Sha512 => HashAlgorithm::Sha512,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TypeArg {
    Totp,
    Hotp,
    Steam,
}

impl From<TypeArg> for OtpType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Totp => OtpType::Totp,
            TypeArg::Hotp => OtpType::Hotp,
            TypeArg::Steam => OtpType::Steam,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ShapeArg {
    Legacy,
    BuiltIn,
}

/// Options of `kpotp set` that apply to a typed (non-URI) secret.
struct SetOptions {
    encoding: Option<EncodingArg>,
    algorithm: Option<AlgorithmArg>,
    digits: Option<u32>,
    period: Option<String>,
    counter: Option<u64>,
    otp_type: Option<TypeArg>,
    legacy: bool,
    yes: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => cmd_init(cli.config.as_deref())?,
        Commands::Show { path, reveal } => cmd_show(&path, reveal)?,
        Commands::Set {
            path,
            encoding,
            algorithm,
            digits,
            period,
            counter,
            otp_type,
            legacy,
            yes,
        } => {
            let cfg = Config::load(cli.config.as_deref())?;
            let opts = SetOptions {
                encoding,
                algorithm,
                digits,
                period,
                counter,
                otp_type,
                legacy,
                yes,
            };
            cmd_set(&path, &cfg, opts)?
        }
        Commands::Migrate { path, to } => cmd_migrate(&path, to)?,
        Commands::Uri { uri, reveal } => cmd_uri(&uri, reveal)?,
        Commands::ExportUri { path, label } => cmd_export_uri(&path, label.as_deref())?,
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_init(path: Option<&Path>) -> anyhow::Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if path.exists() {
        println!("Config already exists at: {}", path.display());
        return Ok(());
    }
    save_config(&Config::default(), &path)?;
    println!("Initialized config at {}", path.display());
    Ok(())
}

fn cmd_show(path: &Path, reveal: bool) -> anyhow::Result<()> {
    let entry = load_entry(path)?;
    let Some(cred) = kpotp::load(&entry.fields) else {
        println!("OTP:       not set");
        return Ok(());
    };
    print_credential(&cred, reveal)?;

    let shape = if cred.legacy_mode() { "legacy" } else { "built-in" };
    println!("Storage:   {shape}");
    println!("Fields:    {}", cred.source_fields().join(", "));
    Ok(())
}

fn print_credential(cred: &OtpCredential, reveal: bool) -> anyhow::Result<()> {
    if reveal {
        let secret = cred.plain_secret()?.ok_or_else(|| anyhow!("OTP secret is empty"))?;
        println!("Secret:    {}", secret.as_str());
    } else {
        println!("Secret:    ******** ({} bytes)", cred.secret().len());
    }
    println!("Type:      {}", cred.otp_type());
    println!("Encoding:  {}", cred.encoding());
    println!("Algorithm: {}", cred.algorithm);
    println!("Digits:    {}", cred.digits);
    if cred.otp_type().is_time_based() {
        println!("Period:    {}s", cred.period);
    } else {
        println!("Counter:   {}", cred.counter);
    }
    if cred.requires_custom_settings() {
        println!("Custom:    yes");
    }
    Ok(())
}

/// kpotp set PATH
fn cmd_set(path: &Path, cfg: &Config, opts: SetOptions) -> anyhow::Result<()> {
    let mut entry = load_entry(path)?;

    let raw = prompt_secret_hidden("OTP secret OR otpauth:// URL: ")?;
    let raw = raw.trim();
    if raw.is_empty() {
        anyhow::bail!("A key must be set");
    }

    let mut cred = if raw.starts_with("otpauth://") {
        uri::parse(raw)?.ok_or_else(|| anyhow!("The given URI does not contain a secret"))?
    } else {
        typed_credential(raw, cfg, &opts)?
    };
    if opts.legacy {
        cred.set_legacy_mode(true);
    }

    let requested = if opts.legacy {
        StorageShape::Legacy
    } else {
        cfg.preferred_shape
    };
    let report = kpotp::save(&mut cred, &mut entry.fields, requested)?;
    save_entry(path, &entry)?;

    println!(
        "OTP configured for {} ({})",
        path.display(),
        shape_name(report.shape)
    );
    if !report.purged.is_empty() {
        println!("Removed stale fields: {}", report.purged.join(", "));
    }
    Ok(())
}

/// Build a credential from a typed secret and the command line settings.
fn typed_credential(raw: &str, cfg: &Config, opts: &SetOptions) -> anyhow::Result<OtpCredential> {
    let mut cred = OtpCredential::new();
    if let Some(t) = opts.otp_type {
        cred.set_otp_type(t.into());
    }
    // encoding first: the secret text is read under it
    cred.set_encoding(opts.encoding.map(Into::into).unwrap_or(cfg.default_encoding));
    cred.set_plain_secret(raw)?;

    if let Some(a) = opts.algorithm {
        cred.algorithm = a.into();
    }
    if let Some(d) = opts.digits {
        cred.digits = d;
    }
    if let Some(c) = opts.counter {
        cred.counter = c;
    }
    if let Some(text) = opts.period.as_deref() {
        let period = parse_period(text)?;
        if period != DEFAULT_PERIOD && !opts.yes {
            let answer = prompt_string(&format!(
                "Non-standard time step {period}s (default {DEFAULT_PERIOD}s). Proceed? [y/N]: "
            ))?;
            if !answer.trim().eq_ignore_ascii_case("y") {
                anyhow::bail!("Aborted");
            }
        }
        cred.period = period;
    }
    Ok(cred)
}

/// kpotp migrate PATH --to SHAPE
fn cmd_migrate(path: &Path, to: ShapeArg) -> anyhow::Result<()> {
    let mut entry = load_entry(path)?;
    let mut cred = migration::load(&entry.fields)
        .ok_or_else(|| anyhow!("No OTP configured for {}", path.display()))?;

    let report = match to {
        ShapeArg::Legacy => migrate_to_legacy(&mut cred, &mut entry.fields)?,
        ShapeArg::BuiltIn => migrate_to_builtin(&mut cred, &mut entry.fields)?,
    };
    save_entry(path, &entry)?;

    if matches!(to, ShapeArg::BuiltIn) && report.shape == StorageShape::Legacy {
        println!(
            "{} credentials cannot use built-in fields, kept legacy field.",
            cred.otp_type()
        );
    } else {
        println!("Migrated {} to {}", path.display(), shape_name(report.shape));
    }
    if !report.purged.is_empty() {
        println!("Removed stale fields: {}", report.purged.join(", "));
    }
    Ok(())
}

/// kpotp uri URI
fn cmd_uri(input: &str, reveal: bool) -> anyhow::Result<()> {
    let cred = uri::parse(input)?.ok_or_else(|| anyhow!("The given URI does not contain a secret"))?;
    print_credential(&cred, reveal)
}

/// kpotp export-uri PATH
fn cmd_export_uri(path: &Path, label: Option<&str>) -> anyhow::Result<()> {
    let entry = load_entry(path)?;
    let cred = kpotp::load(&entry.fields)
        .ok_or_else(|| anyhow!("No OTP configured for {}", path.display()))?;

    let default_label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let uri = uri::build(&cred, label.unwrap_or(&default_label))?;
    println!("{}", uri.as_str());
    Ok(())
}

fn shape_name(shape: StorageShape) -> &'static str {
    match shape {
        StorageShape::Legacy => "legacy field",
        StorageShape::BuiltIn => "built-in fields",
    }
}
