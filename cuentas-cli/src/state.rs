use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn cuentas_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".cuentas"))
}

pub fn ensure_cuentas_home() -> Result<PathBuf> {
    let dir = cuentas_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Expand a leading `~/` against `$HOME`. Other paths are returned as is.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").context("HOME is not set")?;
            Ok(Path::new(&home).join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/tmp/inbox").unwrap(), PathBuf::from("/tmp/inbox"));
        assert_eq!(expand_home("relative/dir").unwrap(), PathBuf::from("relative/dir"));
    }

    #[test]
    fn test_expand_home_tilde() {
        let home = std::env::var("HOME").unwrap();
        assert_eq!(
            expand_home("~/.cuentas/inbox").unwrap(),
            Path::new(&home).join(".cuentas/inbox")
        );
    }
}
