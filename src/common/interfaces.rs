use std::io::Error;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

/// Where the kernel lists network interfaces.
pub const SYSFS_NET: &str = "/sys/class/net";

// container bridges, never a physical NIC
const EXCLUDED_PREFIXES: &[&str] = &["docker"];

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_loopback(dir: &Path, name: &str) -> bool {
    match std::fs::read_to_string(dir.join("flags")) {
        Ok(flags) => {
            let flags = flags.trim();
            let flags = flags.strip_prefix("0x").unwrap_or(flags);

            u32::from_str_radix(flags, 16)
                .map(|flags| flags & libc::IFF_LOOPBACK as u32 != 0)
                .unwrap_or(false)
        }
        Err(_) => name == "lo",
    }
}

/// Returns the names of the non-loopback interfaces found under `root`,
/// skipping docker bridges. Names are sorted.
pub fn network_interfaces(root: impl AsRef<Path>) -> Result<Vec<String>, Error> {
    let mut interfaces = Vec::new();

    let walker = WalkDir::new(root.as_ref())
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .into_iter();

    for entry in walker.filter_entry(|e| !is_hidden(e)) {
        let entry = match entry {
            Ok(entry) => entry,
            // failing to read the directory itself means there's nothing to find
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(_) => continue,
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };

        if EXCLUDED_PREFIXES.iter().any(|p| name.starts_with(p)) {
            continue;
        }

        if is_loopback(entry.path(), name) {
            continue;
        }

        interfaces.push(name.to_string());
    }

    interfaces.sort();

    Ok(interfaces)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interface(root: &Path, name: &str, flags: Option<&str>) {
        let dir = root.join(name);
        std::fs::create_dir(&dir).unwrap();

        if let Some(flags) = flags {
            std::fs::write(dir.join("flags"), format!("{flags}\n")).unwrap();
        }
    }

    #[test]
    fn skips_loopback_and_bridges() {
        let root = tempfile::tempdir().unwrap();

        interface(root.path(), "lo", Some("0x9"));
        interface(root.path(), "eth1", Some("0x1003"));
        interface(root.path(), "eth0", Some("0x1003"));
        interface(root.path(), "docker0", Some("0x1003"));
        interface(root.path(), "wlan0", None);
        interface(root.path(), ".hidden", None);
        std::fs::write(root.path().join("bonding_masters"), "").unwrap();

        let interfaces = network_interfaces(root.path()).unwrap();
        assert_eq!(interfaces, vec!["eth0", "eth1", "wlan0"]);
    }

    #[test]
    fn loopback_detected_by_name_without_flags() {
        let root = tempfile::tempdir().unwrap();

        interface(root.path(), "lo", None);
        interface(root.path(), "ens5", Some("0x1003"));

        let interfaces = network_interfaces(root.path()).unwrap();
        assert_eq!(interfaces, vec!["ens5"]);
    }

    #[test]
    fn missing_root() {
        let root = tempfile::tempdir().unwrap();

        assert!(network_interfaces(root.path().join("absent")).is_err());
    }
}
