//! Private-key discovery over a fixed search path:
//! `<backend_home>/_config/user`, `<instance_dir>/ssh_key`.
//!
//! Keys are pre-parsed with `ssh-key` so an unreadable or unparseable
//! entry is skipped before it ever reaches `ssh2::Session::userauth_*` —
//! a bad key earlier in the list must not stop a good key later in the
//! list from being tried.

use std::path::{Path, PathBuf};

use ssh_key::PrivateKey;

/// The backend's state directory: `$LIMA_HOME` if set, else `~/.lima`.
pub fn backend_home() -> PathBuf {
    if let Ok(home) = std::env::var("LIMA_HOME") {
        return PathBuf::from(home);
    }
    dirs_home().join(".lima")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/root"))
}

/// The fixed candidate key paths for a given instance directory, in
/// search order.
pub fn key_search_paths(instance_dir: &Path) -> Vec<PathBuf> {
    vec![
        backend_home().join("_config").join("user"),
        instance_dir.join("ssh_key"),
    ]
}

/// A private key that parsed successfully and is ready to hand to
/// `ssh2`. `path` is kept so auth can use `userauth_pubkey_file`
/// without re-reading/re-parsing the bytes ssh2 itself wants as a path.
pub struct DiscoveredKey {
    pub path: PathBuf,
}

/// Load every key in `candidates` that exists and parses as a valid
/// OpenSSH private key, skipping the rest silently.
pub fn load_keys(candidates: &[PathBuf]) -> Vec<DiscoveredKey> {
    candidates
        .iter()
        .filter_map(|path| {
            let bytes = std::fs::read(path).ok()?;
            PrivateKey::from_openssh(&bytes).ok()?;
            Some(DiscoveredKey { path: path.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_missing_and_unparseable_keys() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("garbage_key");
        std::fs::File::create(&garbage)
            .unwrap()
            .write_all(b"not a key")
            .unwrap();
        let missing = dir.path().join("does_not_exist");

        let found = load_keys(&[garbage, missing]);
        assert!(found.is_empty());
    }

    #[test]
    fn search_paths_cover_backend_home_and_instance_dir() {
        let instance_dir = Path::new("/home/u/.lima/llima-box");
        let paths = key_search_paths(instance_dir);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("_config/user"));
        assert!(paths[1].ends_with("llima-box/ssh_key"));
    }
}
