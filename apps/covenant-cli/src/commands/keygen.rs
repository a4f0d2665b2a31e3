// keygen.rs - Generate a runtime signing key.

use std::path::Path;

use anyhow::Context as _;

use covenant_crypto::KeyPair;

pub fn execute(out: &Path, force: bool) -> anyhow::Result<()> {
    if out.exists() && !force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            out.display()
        );
    }

    let pkcs8 = KeyPair::generate_pkcs8()?;
    let keys = KeyPair::from_pkcs8(&pkcs8)?;
    std::fs::write(out, &pkcs8).with_context(|| format!("failed to write {}", out.display()))?;
    restrict_permissions(out)?;

    tracing::info!(path = %out.display(), "runtime key written");
    println!("Public key: {}", keys.public_key_hex());
    Ok(())
}

/// Load a PKCS#8 key written by `keygen`.
pub fn load_key(path: &Path) -> anyhow::Result<KeyPair> {
    let pkcs8 = std::fs::read(path).with_context(|| format!("failed to read key {}", path.display()))?;
    KeyPair::from_pkcs8(&pkcs8).with_context(|| format!("invalid key in {}", path.display()))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
