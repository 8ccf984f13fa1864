//! WebDAV account listing.
//!
//! Accounts come from the `username:secret` credential file the provisioning
//! scripts maintain; usage figures are recomputed from each user's data
//! directory on every call.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebdavError {
    #[error("WebDAV credential file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read WebDAV accounts: {0}")]
    Io(#[from] io::Error),
}

/// One WebDAV account with approximate usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebdavUser {
    pub username: String,
    pub file_count: u64,
    /// Human-readable size, e.g. "1.50 GB"
    pub size: String,
    pub size_bytes: u64,
}

/// List every account in `users_file` with usage under `root/<username>`.
pub fn list_users(users_file: &Path, root: &Path) -> Result<Vec<WebdavUser>, WebdavError> {
    let contents = match fs::read_to_string(users_file) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(WebdavError::NotFound(users_file.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let users = parse_usernames(&contents)
        .into_iter()
        .map(|username| {
            let (file_count, size_bytes) = dir_usage(&root.join(&username));
            WebdavUser {
                username,
                file_count,
                size: format_bytes(size_bytes),
                size_bytes,
            }
        })
        .collect();

    Ok(users)
}

/// Run [`list_users`] on the blocking pool.
pub async fn list_users_async(users_file: PathBuf, root: PathBuf) -> Result<Vec<WebdavUser>, WebdavError> {
    tokio::task::spawn_blocking(move || list_users(&users_file, &root))
        .await
        .map_err(|e| WebdavError::Io(io::Error::new(io::ErrorKind::Other, e)))?
}

fn parse_usernames(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':').map(|(user, _)| user.trim()))
        .filter(|user| !user.is_empty())
        .map(str::to_string)
        .collect()
}

/// File count and total bytes below `dir`. Symlinks are not followed and
/// unreadable entries are skipped.
fn dir_usage(dir: &Path) -> (u64, u64) {
    let mut files = 0;
    let mut bytes = 0;
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let meta = match entry.path().symlink_metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            if meta.is_dir() {
                pending.push(entry.path());
            } else if meta.is_file() {
                files += 1;
                bytes += meta.len();
            }
        }
    }

    (files, bytes)
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_usernames() {
        let contents = "\
# managed by webdav-add-user.sh
praveen_flip:praveen

ruchi_realme:ruchi:extra
not-a-record
:orphan
";
        assert_eq!(parse_usernames(contents), vec!["praveen_flip", "ruchi_realme"]);
    }

    #[test]
    fn test_list_users_with_usage() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("users");
        fs::create_dir_all(root.join("praveen_flip/photos/2024")).unwrap();
        fs::write(root.join("praveen_flip/notes.txt"), vec![b'x'; 1000]).unwrap();
        fs::write(root.join("praveen_flip/photos/2024/a.jpg"), vec![b'x'; 2048]).unwrap();

        let users_file = dir.path().join("users.conf");
        fs::write(&users_file, "praveen_flip:p\nruchi_realme:r\n").unwrap();

        let users = list_users(&users_file, &root).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "praveen_flip");
        assert_eq!(users[0].file_count, 2);
        assert_eq!(users[0].size_bytes, 3048);
        assert_eq!(users[0].size, "2.98 KB");
        // No data directory yet
        assert_eq!(users[1].file_count, 0);
        assert_eq!(users[1].size, "0 B");
    }

    #[test]
    fn test_missing_credential_file() {
        let dir = TempDir::new().unwrap();
        let err = list_users(&dir.path().join("absent.conf"), dir.path()).unwrap_err();
        assert!(matches!(err, WebdavError::NotFound(_)));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
