//! Kernel parameter access.
//!
//! Parameters are addressed by path components rather than a dotted name
//! because interface names may themselves contain dots (`eth1.100`).

use crate::error::{EniError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default procfs mount point for kernel parameters.
pub const PROC_SYS_ROOT: &str = "/proc/sys";

/// Read/write access to kernel tunables.
#[cfg_attr(test, mockall::automock)]
pub trait Sysctl: Send + Sync {
    /// Writes `value` to the parameter at `path`.
    fn write(&self, path: &[String], value: &str) -> Result<()>;

    /// Reads the parameter at `path`, trimmed.
    fn read(&self, path: &[String]) -> Result<String>;

    /// Sets a boolean parameter to 1.
    fn enable(&self, path: &[String]) -> Result<()> {
        self.write(path, "1")
    }

    /// Sets a boolean parameter to 0.
    fn disable(&self, path: &[String]) -> Result<()> {
        self.write(path, "0")
    }
}

/// Path of the reverse-path filter tunable for one IPv4 interface.
pub fn rp_filter_path(device: &str) -> Vec<String> {
    ["net", "ipv4", "conf", device, "rp_filter"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Dotted name used in logs and errors.
pub fn display_name(path: &[String]) -> String {
    path.join(".")
}

/// [`Sysctl`] backed by files under a procfs root.
#[derive(Debug, Clone)]
pub struct ProcSysctl {
    root: PathBuf,
}

impl ProcSysctl {
    /// Creates a sysctl accessor rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the procfs root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &[String]) -> Result<PathBuf> {
        if path.is_empty() {
            return Err(EniError::config("empty sysctl path"));
        }

        let mut full = self.root.clone();
        for component in path {
            if component.is_empty()
                || component == "."
                || component == ".."
                || component.contains('/')
            {
                return Err(EniError::config(format!(
                    "invalid sysctl path component {:?} in {}",
                    component,
                    display_name(path)
                )));
            }
            full.push(component);
        }
        Ok(full)
    }
}

impl Default for ProcSysctl {
    fn default() -> Self {
        Self::new(PROC_SYS_ROOT)
    }
}

impl Sysctl for ProcSysctl {
    fn write(&self, path: &[String], value: &str) -> Result<()> {
        let file = self.resolve(path)?;
        fs::write(&file, value).map_err(|source| EniError::Sysctl {
            path: display_name(path),
            source,
        })?;
        debug!(sysctl = %display_name(path), value, "Wrote kernel parameter");
        Ok(())
    }

    fn read(&self, path: &[String]) -> Result<String> {
        let file = self.resolve(path)?;
        let value = fs::read_to_string(&file).map_err(|source| EniError::Sysctl {
            path: display_name(path),
            source,
        })?;
        Ok(value.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn proc_root_with_device(device: &str) -> (TempDir, ProcSysctl) {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("net/ipv4/conf").join(device);
        fs::create_dir_all(&conf).unwrap();
        fs::write(conf.join("rp_filter"), "1\n").unwrap();
        let sysctl = ProcSysctl::new(dir.path());
        (dir, sysctl)
    }

    #[test]
    fn test_rp_filter_path() {
        assert_eq!(
            display_name(&rp_filter_path("eth1")),
            "net.ipv4.conf.eth1.rp_filter"
        );
    }

    #[test]
    fn test_disable_writes_zero() {
        let (_dir, sysctl) = proc_root_with_device("eth1");
        let path = rp_filter_path("eth1");

        assert_eq!(sysctl.read(&path).unwrap(), "1");
        sysctl.disable(&path).unwrap();
        assert_eq!(sysctl.read(&path).unwrap(), "0");
        sysctl.enable(&path).unwrap();
        assert_eq!(sysctl.read(&path).unwrap(), "1");
    }

    #[test]
    fn test_dotted_interface_name() {
        let (_dir, sysctl) = proc_root_with_device("eth1.100");
        let path = rp_filter_path("eth1.100");
        sysctl.disable(&path).unwrap();
        assert_eq!(sysctl.read(&path).unwrap(), "0");
    }

    #[test]
    fn test_missing_parameter() {
        let (_dir, sysctl) = proc_root_with_device("eth1");
        let err = sysctl.disable(&rp_filter_path("eth9")).unwrap_err();
        assert!(matches!(err, EniError::Sysctl { .. }));
        assert!(err.to_string().contains("net.ipv4.conf.eth9.rp_filter"));
    }

    #[test]
    fn test_rejects_traversal() {
        let sysctl = ProcSysctl::default();
        assert!(sysctl.write(&rp_filter_path(".."), "0").is_err());
        assert!(sysctl.write(&rp_filter_path("a/b"), "0").is_err());
        assert!(sysctl.write(&[], "0").is_err());
    }
}
