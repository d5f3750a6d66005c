use crate::error::{DevscanError, Result};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Phone or camera exposed over MTP through gvfs.
    Mtp,
    /// Removable volume mounted under the user's media directory.
    Removable,
}

impl MountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountKind::Mtp => "mtp",
            MountKind::Removable => "removable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMount {
    pub path: PathBuf,
    pub kind: MountKind,
}

/// Places to look for a connected device, in priority order.
#[derive(Debug, Clone, Default)]
pub struct MountSearch {
    pub gvfs_dirs: Vec<PathBuf>,
    pub media_dir: Option<PathBuf>,
}

impl MountSearch {
    /// Standard locations for the current user:
    /// - `/run/user/<uid>/gvfs`
    /// - `~/.gvfs`
    /// - `/media/<user>`
    pub fn for_current_user() -> Self {
        // getuid never fails
        let uid = unsafe { libc::getuid() };
        let mut gvfs_dirs = vec![PathBuf::from(format!("/run/user/{}/gvfs", uid))];

        if let Ok(home) = std::env::var("HOME") {
            gvfs_dirs.push(PathBuf::from(home).join(".gvfs"));
        }

        let media_dir = std::env::var("USER")
            .ok()
            .filter(|user| !user.is_empty())
            .map(|user| PathBuf::from("/media").join(user));

        Self {
            gvfs_dirs,
            media_dir,
        }
    }
}

/// Finds the first mounted device
///
/// gvfs directories are checked for an entry whose name mentions `mtp`;
/// the media directory for a child that is a mount point.
pub fn find_device_mount(search: &MountSearch) -> Option<DeviceMount> {
    for gvfs in &search.gvfs_dirs {
        let found = sorted_children(gvfs).into_iter().find(|child| {
            child
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase().contains("mtp"))
                .unwrap_or(false)
        });
        if let Some(path) = found {
            return Some(DeviceMount {
                path,
                kind: MountKind::Mtp,
            });
        }
    }

    let media_dir = search.media_dir.as_ref()?;
    sorted_children(media_dir)
        .into_iter()
        .find(|child| is_mount_point(child))
        .map(|path| DeviceMount {
            path,
            kind: MountKind::Removable,
        })
}

pub fn detect_device_mount() -> Result<DeviceMount> {
    let search = MountSearch::for_current_user();
    let mount = find_device_mount(&search).ok_or(DevscanError::DeviceNotFound)?;
    log::info!("Detected {} device at {}", mount.kind.as_str(), mount.path.display());
    Ok(mount)
}

/// A directory is a mount point when it lives on a different device than its parent.
pub fn is_mount_point(path: &Path) -> bool {
    let parent = match path.parent() {
        Some(p) => p,
        None => return true,
    };

    match (fs::symlink_metadata(path), fs::metadata(parent)) {
        (Ok(meta), Ok(parent_meta)) => meta.is_dir() && meta.dev() != parent_meta.dev(),
        _ => false,
    }
}

fn sorted_children(dir: &Path) -> Vec<PathBuf> {
    let mut children: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(_) => return Vec::new(),
    };
    children.sort();
    children
}
