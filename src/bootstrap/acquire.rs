//! Build tool acquisition
//!
//! Build tool versions live in a [`PackageCache`], one directory per version.
//! A [`CommandSource`] fills the cache by running a configured download
//! command. Both implement [`BuildToolSource`], the seam the launcher uses.

use crate::errors::{ArborError, Result};
use crate::executor::{Deadline, ProcessInvocation, ProcessSupervisor, TempWorkspace};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Build tool version: MAJOR.MINOR.PATCH with an optional pre-release suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
    /// Pre-release label after the first `-`
    pub pre: Option<String>,
}

impl PackageVersion {
    /// Creates a release version
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// Returns true for pre-release versions
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }
}

impl FromStr for PackageVersion {
    type Err = ArborError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = || ArborError::InvalidConfiguration(format!("invalid version '{input}'"));

        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let (version_part, pre) = match trimmed.split_once('-') {
            Some((v, p)) if !p.is_empty() => (v, Some(p.to_string())),
            Some(_) => return Err(invalid()),
            None => (trimmed, None),
        };

        let parts: Vec<&str> = version_part.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(invalid());
        };

        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
            patch: patch.parse().map_err(|_| invalid())?,
            pre,
        })
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                // pre-release sorts before the release it precedes
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

/// Which build tool version to acquire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Exactly this version
    Explicit(PackageVersion),
    /// The newest version the source can provide
    Latest,
    /// The newest version already in the local cache
    LatestDownloaded,
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(version) => write!(f, "version {version}"),
            Self::Latest => write!(f, "latest"),
            Self::LatestDownloaded => write!(f, "latest downloaded"),
        }
    }
}

/// A build tool version available on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredPackage {
    /// Version of the package
    pub version: PackageVersion,
    /// Directory holding the extracted package
    pub directory: PathBuf,
}

/// Source of build tool packages
#[async_trait]
pub trait BuildToolSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Resolves `selector` to a package on disk
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::BootstrapAcquisition`] when no matching version
    /// can be provided.
    async fn acquire(
        &self,
        selector: &VersionSelector,
        prerelease_allowed: bool,
        cancel: &CancellationToken,
    ) -> Result<AcquiredPackage>;
}

fn acquisition_error(selector: &VersionSelector, reason: impl Into<String>) -> ArborError {
    ArborError::BootstrapAcquisition {
        selector: selector.to_string(),
        reason: reason.into(),
    }
}

/// Local directory of build tool versions, `<root>/<version>/`
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    /// Creates a cache rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cached versions, ascending
    ///
    /// # Errors
    ///
    /// Returns an IO error when the cache exists but cannot be read.
    pub fn versions(&self, prerelease_allowed: bool) -> Result<Vec<AcquiredPackage>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut packages = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Ok(version) = entry.file_name().to_string_lossy().parse::<PackageVersion>() else {
                continue;
            };
            if version.is_prerelease() && !prerelease_allowed {
                continue;
            }
            packages.push(AcquiredPackage {
                version,
                directory: entry.path(),
            });
        }
        packages.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(packages)
    }

    /// Looks up a cached package
    ///
    /// # Errors
    ///
    /// Returns an IO error when the cache cannot be read.
    pub fn find(
        &self,
        selector: &VersionSelector,
        prerelease_allowed: bool,
    ) -> Result<Option<AcquiredPackage>> {
        let versions = self.versions(true)?;
        Ok(match selector {
            VersionSelector::Explicit(wanted) => versions.into_iter().find(|p| &p.version == wanted),
            VersionSelector::Latest | VersionSelector::LatestDownloaded => versions
                .into_iter()
                .filter(|p| prerelease_allowed || !p.version.is_prerelease())
                .next_back(),
        })
    }

    /// Copies `source` into the cache as `version`
    ///
    /// An already cached version is kept as is.
    ///
    /// # Errors
    ///
    /// Returns an IO error when copying fails.
    pub fn install(&self, version: &PackageVersion, source: &Path) -> Result<AcquiredPackage> {
        let target = self.root.join(version.to_string());
        if target.is_dir() {
            tracing::debug!(version = %version, "Version already cached");
        } else {
            copy_dir(source, &target)?;
            tracing::info!(version = %version, path = %target.display(), "Installed build tool version");
        }
        Ok(AcquiredPackage {
            version: version.clone(),
            directory: target,
        })
    }
}

/// Recursively copies a directory tree
///
/// # Errors
///
/// Returns an IO error when any entry cannot be copied.
pub fn copy_dir(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| ArborError::Io(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ArborError::Io(e.to_string()))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            std::fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[async_trait]
impl BuildToolSource for PackageCache {
    fn name(&self) -> &str {
        "package-cache"
    }

    async fn acquire(
        &self,
        selector: &VersionSelector,
        prerelease_allowed: bool,
        _cancel: &CancellationToken,
    ) -> Result<AcquiredPackage> {
        self.find(selector, prerelease_allowed)?.ok_or_else(|| {
            acquisition_error(
                selector,
                format!("no matching version in {}", self.root.display()),
            )
        })
    }
}

/// Downloads build tool versions with an external command
///
/// The command template may contain `{version}` (the requested version or
/// `latest`) and `{output}` (a staging directory). Every subdirectory of the
/// staging directory named after a version is installed into the cache.
#[derive(Debug, Clone)]
pub struct CommandSource {
    cache: PackageCache,
    template: Vec<String>,
    supervisor: ProcessSupervisor,
    staging_root: PathBuf,
    timeout: Duration,
}

impl CommandSource {
    /// Default download timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Creates a source that downloads into `cache`
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::InvalidConfiguration`] for an empty template.
    pub fn new(
        cache: PackageCache,
        template: Vec<String>,
        supervisor: ProcessSupervisor,
    ) -> Result<Self> {
        if template.is_empty() {
            return Err(ArborError::InvalidConfiguration(
                "download command is empty".to_string(),
            ));
        }
        let staging_root = cache.root().join(".staging");
        Ok(Self {
            cache,
            template,
            supervisor,
            staging_root,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    /// Sets the download timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn render(&self, version: &str, output: &Path) -> Vec<String> {
        let output = output.display().to_string();
        self.template
            .iter()
            .map(|part| part.replace("{version}", version).replace("{output}", &output))
            .collect()
    }

    async fn download(
        &self,
        selector: &VersionSelector,
        prerelease_allowed: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let requested = match selector {
            VersionSelector::Explicit(version) => version.to_string(),
            _ => "latest".to_string(),
        };

        std::fs::create_dir_all(&self.staging_root)?;
        let staging = TempWorkspace::new(&self.staging_root, "download")?;
        let argv = self.render(&requested, staging.path());
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| acquisition_error(selector, "download command is empty"))?;

        tracing::info!(version = %requested, command = ?argv, "Downloading build tool");
        let deadline = Deadline::after(cancel, self.timeout);
        let invocation = ProcessInvocation::new(program).args(args.iter().cloned());
        let exit_code = self
            .supervisor
            .run(&invocation, deadline.token(), None, None)
            .await
            .map_err(|e| acquisition_error(selector, e.to_string()))?;

        if exit_code.is_failure() {
            let reason = if deadline.expired() {
                format!("download timed out after {}s", self.timeout.as_secs())
            } else {
                format!("download command exited with {exit_code}")
            };
            return Err(acquisition_error(selector, reason));
        }

        let mut installed = 0usize;
        for dir in staging.subdirectories()? {
            let Ok(version) = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
                .parse::<PackageVersion>()
            else {
                tracing::debug!(path = %dir.display(), "Ignoring staged directory without a version name");
                continue;
            };
            let requested =
                matches!(selector, VersionSelector::Explicit(wanted) if *wanted == version);
            if version.is_prerelease() && !prerelease_allowed && !requested {
                tracing::debug!(version = %version, "Ignoring prerelease version");
                continue;
            }
            self.cache.install(&version, &dir)?;
            installed += 1;
        }

        tracing::info!(installed, "Download finished");
        Ok(())
    }
}

#[async_trait]
impl BuildToolSource for CommandSource {
    fn name(&self) -> &str {
        "download-command"
    }

    async fn acquire(
        &self,
        selector: &VersionSelector,
        prerelease_allowed: bool,
        cancel: &CancellationToken,
    ) -> Result<AcquiredPackage> {
        match selector {
            VersionSelector::LatestDownloaded => {
                return self.cache.acquire(selector, prerelease_allowed, cancel).await;
            }
            VersionSelector::Explicit(_) => {
                if let Some(package) = self.cache.find(selector, prerelease_allowed)? {
                    tracing::info!(version = %package.version, "Using cached build tool");
                    return Ok(package);
                }
            }
            VersionSelector::Latest => {}
        }

        self.download(selector, prerelease_allowed, cancel).await?;
        self.cache.acquire(selector, prerelease_allowed, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn version(s: &str) -> PackageVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(version("1.2.3"), PackageVersion::new(1, 2, 3));
        assert_eq!(version("v2.0.1-beta.1").pre.as_deref(), Some("beta.1"));
        assert_eq!(version("1.0.0-rc1").to_string(), "1.0.0-rc1");
        assert!("1.2".parse::<PackageVersion>().is_err());
        assert!("1.2.x".parse::<PackageVersion>().is_err());
        assert!("1.2.3-".parse::<PackageVersion>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        let mut versions = vec![
            version("1.10.0"),
            version("1.2.0"),
            version("1.2.0-beta"),
            version("0.9.9"),
        ];
        versions.sort();
        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["0.9.9", "1.2.0-beta", "1.2.0", "1.10.0"]);
    }

    fn cache_with(versions: &[&str]) -> (TempDir, PackageCache) {
        let dir = TempDir::new().unwrap();
        for v in versions {
            std::fs::create_dir_all(dir.path().join(v)).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("not-a-version")).unwrap();
        let cache = PackageCache::new(dir.path());
        (dir, cache)
    }

    #[test]
    fn test_cache_lookup() {
        let (_dir, cache) = cache_with(&["1.0.0", "1.1.0", "2.0.0-alpha"]);

        let latest = cache.find(&VersionSelector::Latest, false).unwrap().unwrap();
        assert_eq!(latest.version, version("1.1.0"));

        let latest = cache.find(&VersionSelector::LatestDownloaded, true).unwrap().unwrap();
        assert_eq!(latest.version, version("2.0.0-alpha"));

        let explicit = cache
            .find(&VersionSelector::Explicit(version("1.0.0")), false)
            .unwrap()
            .unwrap();
        assert!(explicit.directory.ends_with("1.0.0"));

        assert!(cache
            .find(&VersionSelector::Explicit(version("3.0.0")), false)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_cache_fails_acquisition() {
        let dir = TempDir::new().unwrap();
        let cache = PackageCache::new(dir.path().join("missing"));

        let err = cache
            .acquire(&VersionSelector::Latest, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArborError::BootstrapAcquisition { .. }));
    }

    #[test]
    fn test_install_copies_tree() {
        let source = TempDir::new().unwrap();
        std::fs::create_dir_all(source.path().join("bin")).unwrap();
        std::fs::write(source.path().join("bin/arbor"), "tool").unwrap();
        let (_dir, cache) = cache_with(&[]);

        let package = cache.install(&version("1.4.0"), source.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(package.directory.join("bin/arbor")).unwrap(),
            "tool"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_source_installs_downloaded_versions() {
        let (dir, cache) = cache_with(&[]);
        let template = vec![
            "sh".to_string(),
            "-c".to_string(),
            "mkdir -p \"$0/1.5.0/bin\" \"$0/1.6.0-rc1\" && echo tool > \"$0/1.5.0/bin/arbor\""
                .to_string(),
            "{output}".to_string(),
        ];
        let source = CommandSource::new(cache, template, ProcessSupervisor::new()).unwrap();

        let package = source
            .acquire(&VersionSelector::Latest, false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(package.version, version("1.5.0"));
        assert!(package.directory.join("bin/arbor").is_file());
        assert!(!dir.path().join("1.6.0-rc1").exists());
        assert_eq!(
            std::fs::read_dir(dir.path().join(".staging")).unwrap().count(),
            0
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_source_failure() {
        let (_dir, cache) = cache_with(&[]);
        let source = CommandSource::new(
            cache,
            vec!["sh".to_string(), "-c".to_string(), "exit 1".to_string()],
            ProcessSupervisor::new(),
        )
        .unwrap();

        let err = source
            .acquire(&VersionSelector::Latest, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArborError::BootstrapAcquisition { .. }));
    }

    #[tokio::test]
    async fn test_command_source_prefers_cached_explicit_version() {
        let (_dir, cache) = cache_with(&["1.0.0"]);
        let source = CommandSource::new(
            cache,
            vec!["/no/such/downloader".to_string()],
            ProcessSupervisor::new(),
        )
        .unwrap();

        let package = source
            .acquire(
                &VersionSelector::Explicit(version("1.0.0")),
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(package.version, version("1.0.0"));
    }
}
