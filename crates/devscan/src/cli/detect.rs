use console::style;
use devscan_lib::{detect_device_mount, DeviceMount, DevscanError, MountSearch, Result};

pub fn handle_detect_command(quiet: bool) -> Result<()> {
    let mount = detect_or_explain()?;

    if quiet {
        println!("{}", mount.path.display());
    } else {
        println!(
            "{} Found {} device at {}",
            style("✓").green(),
            mount.kind.as_str(),
            style(mount.path.display()).bold()
        );
    }

    Ok(())
}

/// Detects a device, printing setup hints to stderr when none is found.
pub fn detect_or_explain() -> Result<DeviceMount> {
    match detect_device_mount() {
        Ok(mount) => Ok(mount),
        Err(DevscanError::DeviceNotFound) => {
            let search = MountSearch::for_current_user();
            eprintln!("{}", style("Could not auto-detect a device.").red());
            eprintln!("\nPlease ensure:");
            eprintln!("  1. The device is connected via USB");
            eprintln!("  2. 'File Transfer' (MTP) mode is selected on the device");
            eprintln!("  3. The device has been opened once in your file manager");
            eprintln!("\nOr pass the mount point with --path. Locations checked:");
            for dir in &search.gvfs_dirs {
                eprintln!("  - {}", dir.display());
            }
            if let Some(media) = &search.media_dir {
                eprintln!("  - {}", media.display());
            }
            Err(DevscanError::DeviceNotFound)
        }
        Err(e) => Err(e),
    }
}
