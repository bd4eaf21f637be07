use crate::io;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use clap::{Args, Subcommand};
use dealcrypt::cipher::Cipher;
use dealcrypt::content::TextContent;
use dealcrypt::digest::{self, HashAlgorithm};
use dealcrypt::secret::Secret;
use dealcrypt::session::SharedSecretSession;
use dealcrypt::share::Share;
use dealcrypt::shared_secret;
use dealcrypt::sss;
use dealcrypt::storage::{DirStorage, SharedSecretStore, StoredClientShare};
use serde::Serialize;
use std::path::PathBuf;
use zeroize::Zeroizing;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Split a 32-byte secret into N shares, any K of which recover it
    Split(SplitArgs),
    /// Combine base64 shares (one per line) back into the secret
    Combine(CombineArgs),
    /// Encrypt bytes with AES-256-CBC
    Encrypt(CipherArgs),
    /// Decrypt bytes produced by `encrypt`
    Decrypt(CipherArgs),
    /// Print the MD5 or SHA3-256 digest of the input, or check it
    Hash(HashArgs),
    /// Create a deal secret, keep the client share, print the server share
    CreateSecret(CreateSecretArgs),
    /// Recover a deal secret from the stored client share and a server share
    Recover(RecoverArgs),
    /// Re-open an owner backup of a deal's shares with the owner key
    OpenSecret(OpenSecretArgs),
    /// Delete the stored client share of a deal
    Forget(ForgetArgs),
    /// Encrypt text into a TextContent JSON envelope
    TextEncrypt(KeyIoArgs),
    /// Decrypt a TextContent JSON envelope
    TextDecrypt(KeyIoArgs),
}

// ---------------------------------------------------------------------------
// Shared arg groups
// ---------------------------------------------------------------------------

/// Args for file input/output (both default to stdin/stdout).
#[derive(Args, Debug)]
pub struct IoArgs {
    /// Input file (defaults to stdin)
    #[arg(long, value_name = "FILE")]
    pub r#in: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Key material: a raw key / private key, or a password and salt.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Key bytes as hex (32 bytes = raw key, longer = private key)
    #[arg(long, value_name = "HEX")]
    pub key_hex: Option<String>,

    /// File holding key bytes (raw, or hex text)
    #[arg(long, value_name = "FILE")]
    pub key_file: Option<PathBuf>,

    /// Derive the key from this password with PBKDF2 (requires --salt)
    #[arg(long)]
    pub password: Option<String>,

    /// Salt for --password
    #[arg(long)]
    pub salt: Option<String>,
}

/// Deal identifier used as the storage key suffix.
#[derive(Args, Debug)]
pub struct DealArgs {
    /// Deal id
    #[arg(long)]
    pub deal: String,
}

#[derive(Args, Debug)]
pub struct KeyIoArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub key: KeyArgs,
}

// ---------------------------------------------------------------------------
// Per-command args
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Threshold K — minimum shares required to reconstruct the secret
    #[arg(short = 'k', long, default_value_t = 2)]
    pub threshold: u8,

    /// Total number of shares N to create
    #[arg(short = 'n', long, default_value_t = 2)]
    pub num_shares: u8,

    /// Input is hex text rather than 32 raw bytes
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug)]
pub struct CombineArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// SHA3-256 hex the recovered secret must match
    #[arg(long, value_name = "HEX")]
    pub expect_hash: Option<String>,
}

#[derive(Args, Debug)]
pub struct CipherArgs {
    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub key: KeyArgs,

    /// Ciphertext is base64 text (output for encrypt, input for decrypt)
    #[arg(long)]
    pub base64: bool,
}

#[derive(Args, Debug)]
pub struct HashArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Digest algorithm: md5 or sha3-256
    #[arg(long, default_value = "sha3-256")]
    pub algo: HashAlgorithm,

    /// Compare against this hex digest instead of printing it
    #[arg(long, value_name = "HEX")]
    pub expect: Option<String>,
}

#[derive(Args, Debug)]
pub struct CreateSecretArgs {
    #[command(flatten)]
    pub deal: DealArgs,

    /// Owner private key
    #[command(flatten)]
    pub key: KeyArgs,

    /// Output file for the JSON result (defaults to stdout)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RecoverArgs {
    #[command(flatten)]
    pub deal: DealArgs,

    /// Server share, base64
    #[arg(long, value_name = "BASE64")]
    pub server_share: String,

    /// Output file for the recovered secret as hex (defaults to stdout)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct OpenSecretArgs {
    /// Encrypted share backup, base64 (from create-secret)
    #[arg(long, value_name = "BASE64")]
    pub backup: String,

    /// SHA3-256 hex of the secret to verify against
    #[arg(long, value_name = "HEX")]
    pub hash: Option<String>,

    /// Owner private key
    #[command(flatten)]
    pub key: KeyArgs,

    /// Also store the recovered client share under this deal id
    #[arg(long, value_name = "DEAL")]
    pub save_deal: Option<String>,

    /// Output file for the JSON result (defaults to stdout)
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ForgetArgs {
    #[command(flatten)]
    pub deal: DealArgs,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(command: Command, store: PathBuf) -> Result<()> {
    match command {
        Command::Split(args) => split(args),
        Command::Combine(args) => combine(args),
        Command::Encrypt(args) => encrypt(args),
        Command::Decrypt(args) => decrypt(args),
        Command::Hash(args) => hash(args),
        Command::CreateSecret(args) => create_secret(args, open_store(store)?),
        Command::Recover(args) => recover(args, open_store(store)?),
        Command::OpenSecret(args) => open_secret(args, store),
        Command::Forget(args) => forget(args, open_store(store)?),
        Command::TextEncrypt(args) => text_encrypt(args),
        Command::TextDecrypt(args) => text_decrypt(args),
    }
}

fn open_store(dir: PathBuf) -> Result<DirStorage> {
    DirStorage::open(&dir).with_context(|| format!("open store {:?}", dir))
}

// ---------------------------------------------------------------------------
// Primitive commands
// ---------------------------------------------------------------------------

fn split(args: SplitArgs) -> Result<()> {
    let input = Zeroizing::new(io::read_input(&args.io)?);
    let secret = if args.hex {
        let text = std::str::from_utf8(&input).context("hex input is not text")?;
        io::decode_hex("input", text)?
    } else {
        input
    };

    let secret = Secret::from_slice(&secret).with_context(|| {
        format!(
            "secret must be {} bytes, got {}",
            sss::SECRET_LEN,
            secret.len()
        )
    })?;

    let shares = sss::create_shares(secret.as_bytes(), args.num_shares, args.threshold)
        .context("split failed")?;
    let mut out = Zeroizing::new(String::new());
    for share in &shares {
        out.push_str(&share.to_base64());
        out.push('\n');
    }
    io::write_output(&args.io, out.as_bytes())?;
    eprintln!(
        "split: wrote {}-of-{} shares (sha3-256 of secret: {})",
        args.threshold,
        args.num_shares,
        secret.hash_hex()
    );
    Ok(())
}

fn combine(args: CombineArgs) -> Result<()> {
    let text = Zeroizing::new(io::read_input_text(&args.io)?);
    let mut shares = Vec::new();
    for (i, line) in text.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let share = Share::from_base64(line)
            .with_context(|| format!("share {} is not a valid base64 share", i + 1))?;
        shares.push(share);
    }
    eprintln!("combine: read {} share(s)", shares.len());

    let secret = sss::combine_shares(&shares)
        .context("combine failed")?
        .ok_or_else(|| anyhow::anyhow!("shares could not be combined (duplicate or zero index)"))?;

    match &args.expect_hash {
        Some(expected) => {
            if !digest::checksum_equal(secret.as_bytes(), expected, HashAlgorithm::Sha3_256) {
                bail!("recovered secret does not match --expect-hash (wrong or missing shares?)");
            }
            eprintln!("combine: hash verified");
        }
        None => eprintln!("combine: warning: result not verified; pass --expect-hash"),
    }

    let out = Zeroizing::new(format!("{}\n", hex::encode(secret.as_bytes())));
    io::write_output(&args.io, out.as_bytes())
}

fn encrypt(args: CipherArgs) -> Result<()> {
    let cipher = Cipher::from_material(&io::key_material(&args.key)?)?;
    let plaintext = Zeroizing::new(io::read_input(&args.io)?);
    eprintln!("encrypt: read {} bytes of plaintext", plaintext.len());

    let ciphertext = cipher.encrypt(&plaintext);
    if args.base64 {
        io::write_output(&args.io, format!("{}\n", B64.encode(&ciphertext)).as_bytes())
    } else {
        io::write_output(&args.io, &ciphertext)
    }
}

fn decrypt(args: CipherArgs) -> Result<()> {
    let cipher = Cipher::from_material(&io::key_material(&args.key)?)?;
    let input = io::read_input(&args.io)?;

    let plaintext = if args.base64 {
        let text = std::str::from_utf8(&input).context("base64 input is not text")?;
        Zeroizing::new(cipher.decrypt_base64(text)?)
    } else {
        Zeroizing::new(cipher.decrypt(&input)?)
    };
    eprintln!("decrypt: decrypted {} bytes of plaintext", plaintext.len());
    io::write_output(&args.io, &plaintext)
}

fn hash(args: HashArgs) -> Result<()> {
    let data = io::read_input(&args.io)?;
    match &args.expect {
        Some(expected) => {
            if digest::checksum_equal(&data, expected, args.algo) {
                eprintln!("hash: {} checksum OK", args.algo);
                Ok(())
            } else {
                bail!("{} checksum mismatch", args.algo)
            }
        }
        None => {
            let hex = args.algo.hex_digest(&data);
            io::write_output(&args.io, format!("{hex}\n").as_bytes())
        }
    }
}

// ---------------------------------------------------------------------------
// Shared secret commands
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CreatedSecret<'a> {
    deal_id: &'a str,
    server_share: String,
    hash_of_secret: &'a str,
    encrypted_shares: &'a str,
}

#[derive(Serialize)]
struct OpenedSecret<'a> {
    client_share: String,
    server_share: String,
    hash_of_secret: &'a str,
}

fn write_json<T: Serialize>(out: Option<PathBuf>, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).context("serialize result")?;
    json.push('\n');
    let io_args = IoArgs { r#in: None, out };
    io::write_output(&io_args, json.as_bytes())
}

fn create_secret(args: CreateSecretArgs, storage: DirStorage) -> Result<()> {
    let private_key = io::private_key_bytes(&args.key)?;
    let mut session = SharedSecretSession::load(args.deal.deal.clone(), storage)?;
    let bundle = session
        .create(&private_key)
        .with_context(|| {
            format!(
                "create shared secret for deal {} (run `forget` first to replace it)",
                args.deal.deal
            )
        })?
        .clone();
    session.mark_shared().context("store client share")?;
    eprintln!("create-secret: stored client share for deal {}", args.deal.deal);

    write_json(
        args.out,
        &CreatedSecret {
            deal_id: &args.deal.deal,
            server_share: bundle.server_share.to_base64(),
            hash_of_secret: &bundle.hash_of_secret,
            encrypted_shares: &bundle.base64_encoded_client_secret,
        },
    )
}

fn recover(args: RecoverArgs, storage: DirStorage) -> Result<()> {
    let server_share = Share::from_base64(&args.server_share)
        .context("--server-share is not a valid base64 share")?;
    let mut session = SharedSecretSession::load(args.deal.deal.clone(), storage)?;
    let secret: &Secret = session
        .recover(server_share.as_bytes())
        .with_context(|| format!("recover secret for deal {}", args.deal.deal))?;
    eprintln!("recover: secret verified against stored hash");

    let out = Zeroizing::new(format!("{}\n", hex::encode(secret.as_bytes())));
    let io_args = IoArgs { r#in: None, out: args.out };
    io::write_output(&io_args, out.as_bytes())
}

fn open_secret(args: OpenSecretArgs, store: PathBuf) -> Result<()> {
    let private_key = io::private_key_bytes(&args.key)?;
    let bundle =
        shared_secret::encrypt_shared_secret_key(&args.backup, args.hash.as_deref(), &private_key)
            .context("open shared secret backup")?;
    if args.hash.is_none() {
        eprintln!("open-secret: warning: no --hash given, result not verified");
    }

    if let Some(deal_id) = &args.save_deal {
        let shares = SharedSecretStore::new(open_store(store)?);
        if let Some(existing) = shares.get_shared_secret(deal_id)? {
            if !existing.hash_of_secret.eq_ignore_ascii_case(&bundle.hash_of_secret) {
                bail!("deal {deal_id} already stores a different client share; run `forget` first");
            }
        }
        shares.save_shared_secret(
            deal_id,
            &StoredClientShare {
                client_share: bundle.client_share.clone(),
                hash_of_secret: bundle.hash_of_secret.clone(),
            },
        )?;
        eprintln!("open-secret: stored client share for deal {deal_id}");
    }

    write_json(
        args.out,
        &OpenedSecret {
            client_share: bundle.client_share.to_base64(),
            server_share: bundle.server_share.to_base64(),
            hash_of_secret: &bundle.hash_of_secret,
        },
    )
}

fn forget(args: ForgetArgs, storage: DirStorage) -> Result<()> {
    let mut session = SharedSecretSession::new(args.deal.deal.clone(), storage);
    session.forget()?;
    eprintln!("forget: removed client share for deal {}", args.deal.deal);
    Ok(())
}

// ---------------------------------------------------------------------------
// Text content commands
// ---------------------------------------------------------------------------

fn text_encrypt(args: KeyIoArgs) -> Result<()> {
    let cipher = Cipher::from_material(&io::key_material(&args.key)?)?;
    let text = Zeroizing::new(io::read_input_text(&args.io)?);
    let content = TextContent::seal(&cipher, &text);
    let mut json = serde_json::to_string_pretty(&content).context("serialize text content")?;
    json.push('\n');
    io::write_output(&args.io, json.as_bytes())
}

fn text_decrypt(args: KeyIoArgs) -> Result<()> {
    let cipher = Cipher::from_material(&io::key_material(&args.key)?)?;
    let input = io::read_input(&args.io)?;
    let content: TextContent =
        serde_json::from_slice(&input).context("input is not a TextContent JSON object")?;
    let text = Zeroizing::new(content.open(&cipher)?);
    io::write_output(&args.io, text.as_bytes())
}
