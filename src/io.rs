use crate::cmd::{IoArgs, KeyArgs};
use anyhow::{bail, Context, Result};
use dealcrypt::cipher::{CipherKeyMaterial, KEY_LEN};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use zeroize::{Zeroize, Zeroizing};

/// Read all input bytes from --in file or stdin.
pub fn read_input(io_args: &IoArgs) -> Result<Vec<u8>> {
    match &io_args.r#in {
        Some(path) => fs::read(path).with_context(|| format!("read {:?}", path)),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).context("read stdin")?;
            Ok(buf)
        }
    }
}

/// Read input as UTF-8 text.
pub fn read_input_text(io_args: &IoArgs) -> Result<String> {
    let bytes = read_input(io_args)?;
    String::from_utf8(bytes).context("input is not valid UTF-8")
}

/// Write output bytes to --out file or stdout.
pub fn write_output(io_args: &IoArgs, data: &[u8]) -> Result<()> {
    match &io_args.out {
        Some(path) => fs::write(path, data).with_context(|| format!("write {:?}", path)),
        None => {
            use std::io::Write;
            io::stdout().write_all(data).context("write stdout")?;
            io::stdout().flush().context("flush stdout")
        }
    }
}

/// Decode hex, tolerating surrounding whitespace.
pub fn decode_hex(label: &str, text: &str) -> Result<Zeroizing<Vec<u8>>> {
    hex::decode(text.trim())
        .map(Zeroizing::new)
        .with_context(|| format!("{label} is not valid hex"))
}

/// Read a key file. Files that contain only hex text are decoded; anything
/// else is taken as raw bytes.
pub fn read_key_file(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let raw = Zeroizing::new(fs::read(path).with_context(|| format!("read key file {:?}", path))?);
    if let Ok(text) = std::str::from_utf8(&raw) {
        let trimmed = text.trim();
        if !trimmed.is_empty() && trimmed.len() % 2 == 0 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return decode_hex("key file", trimmed);
        }
    }
    Ok(raw)
}

/// Raw private-key bytes from --key-hex or --key-file.
pub fn private_key_bytes(key: &KeyArgs) -> Result<Zeroizing<Vec<u8>>> {
    match (&key.key_hex, &key.key_file) {
        (Some(h), None) => decode_hex("--key-hex", h),
        (None, Some(p)) => read_key_file(p),
        (Some(_), Some(_)) => bail!("use only one of --key-hex and --key-file"),
        (None, None) => bail!("a key is required (--key-hex or --key-file)"),
    }
}

/// Resolve the key arguments into cipher key material.
///
/// --password/--salt select PBKDF2. Otherwise the key bytes are used as a
/// raw key when exactly 32 bytes long, or as a private key (first 32 bytes)
/// when longer.
pub fn key_material(key: &KeyArgs) -> Result<CipherKeyMaterial> {
    if let Some(password) = &key.password {
        let salt = key
            .salt
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("--salt required with --password"))?;
        if key.key_hex.is_some() || key.key_file.is_some() {
            bail!("--password cannot be combined with --key-hex/--key-file");
        }
        return Ok(CipherKeyMaterial::Password {
            password: password.as_bytes().to_vec(),
            salt: salt.as_bytes().to_vec(),
        });
    }

    let bytes = private_key_bytes(key)?;
    if bytes.len() == KEY_LEN {
        let mut arr = [0u8; KEY_LEN];
        arr.copy_from_slice(&bytes);
        let material = CipherKeyMaterial::Key(arr);
        arr.zeroize();
        Ok(material)
    } else if bytes.len() > KEY_LEN {
        Ok(CipherKeyMaterial::PrivateKey(bytes.to_vec()))
    } else {
        bail!("key is {} bytes, need at least {KEY_LEN}", bytes.len());
    }
}
