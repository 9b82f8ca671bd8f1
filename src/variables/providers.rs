//! Built-in variable providers

use super::compat::normalize_branch_name;
use super::context::BuildContext;
use super::provider::VariableProvider;
use super::variable::{Variable, VariableSet};
use super::well_known::{BRANCH_NAME, BUILD_DIRECTORY, CONTEXT_PREFIX, SOURCE_ROOT};
use crate::errors::{ArborError, Result};
use crate::executor::{Deadline, ProcessInvocation, ProcessSupervisor};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Imports `Arbor.`-prefixed context entries as variables
#[derive(Debug, Clone, Default)]
pub struct ContextVariableProvider;

#[async_trait]
impl VariableProvider for ContextVariableProvider {
    fn name(&self) -> &str {
        "context"
    }

    fn order(&self) -> i32 {
        0
    }

    async fn provide(&self, context: &BuildContext, _existing: &VariableSet) -> Result<Vec<Variable>> {
        Ok(context
            .with_prefix(CONTEXT_PREFIX)
            .into_iter()
            .map(|(key, value)| Variable::new(key, value))
            .collect())
    }
}

/// Publishes the source root and build directory
#[derive(Debug, Clone)]
pub struct SourceRootProvider {
    source_root: PathBuf,
    build_directory: Option<PathBuf>,
}

impl SourceRootProvider {
    /// Creates a provider for `source_root`, with the build directory at `<root>/build`
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            build_directory: None,
        }
    }

    /// Overrides the build directory
    #[must_use]
    pub fn with_build_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_directory = Some(dir.into());
        self
    }
}

#[async_trait]
impl VariableProvider for SourceRootProvider {
    fn name(&self) -> &str {
        "source-root"
    }

    fn order(&self) -> i32 {
        10
    }

    async fn provide(&self, _context: &BuildContext, _existing: &VariableSet) -> Result<Vec<Variable>> {
        let build_directory = self
            .build_directory
            .clone()
            .unwrap_or_else(|| self.source_root.join("build"));

        Ok(vec![
            Variable::new(SOURCE_ROOT, self.source_root.display().to_string()),
            Variable::new(BUILD_DIRECTORY, build_directory.display().to_string()),
        ])
    }
}

/// Resolves the current branch name
///
/// Uses an explicit override when given, otherwise asks `git` with a short
/// timeout. An already resolved branch name is left alone.
#[derive(Debug, Clone)]
pub struct VcsBranchProvider {
    supervisor: ProcessSupervisor,
    source_root: PathBuf,
    branch_override: Option<String>,
    timeout: Duration,
    required: bool,
    cancel: CancellationToken,
}

impl VcsBranchProvider {
    /// Default timeout for the branch query
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a provider that queries the repository at `source_root`
    #[must_use]
    pub fn new(supervisor: ProcessSupervisor, source_root: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            source_root: source_root.into(),
            branch_override: None,
            timeout: Self::DEFAULT_TIMEOUT,
            required: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the branch query when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Uses `branch` instead of querying git
    #[must_use]
    pub fn with_override(mut self, branch: Option<String>) -> Self {
        self.branch_override = branch.filter(|b| !b.trim().is_empty());
        self
    }

    /// Sets the query timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fails resolution when the branch cannot be determined
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    async fn query_git(&self) -> Result<Option<String>> {
        let cancelled = || ArborError::provider(self.name(), "git query cancelled");
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }

        let invocation = ProcessInvocation::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .working_dir(&self.source_root);

        let deadline = Deadline::after(&self.cancel, self.timeout);
        let output = self.supervisor.capture(&invocation, deadline.token()).await?;

        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        if deadline.expired() {
            return Err(ArborError::provider(
                self.name(),
                format!("git timed out after {}s", self.timeout.as_secs()),
            ));
        }
        if output.exit_code.is_failure() {
            return Err(ArborError::provider(
                self.name(),
                format!("git exited with {}: {}", output.exit_code, output.stderr.join(" ")),
            ));
        }

        // a detached HEAD reports the literal "HEAD"
        Ok(output
            .first_line()
            .filter(|line| *line != "HEAD")
            .map(str::to_string))
    }
}

#[async_trait]
impl VariableProvider for VcsBranchProvider {
    fn name(&self) -> &str {
        "vcs-branch"
    }

    fn order(&self) -> i32 {
        20
    }

    async fn provide(&self, _context: &BuildContext, existing: &VariableSet) -> Result<Vec<Variable>> {
        if let Some(branch) = &self.branch_override {
            return Ok(vec![Variable::new(BRANCH_NAME, normalize_branch_name(branch))]);
        }

        if existing.get(BRANCH_NAME).is_some_and(|v| !v.is_blank()) {
            tracing::debug!("Branch name already resolved, skipping git query");
            return Ok(Vec::new());
        }

        match self.query_git().await {
            Ok(Some(branch)) => Ok(vec![Variable::new(BRANCH_NAME, branch)]),
            Ok(None) => {
                tracing::warn!("Repository is on a detached HEAD, branch name unknown");
                Ok(Vec::new())
            }
            Err(e) if !self.required && !self.cancel.is_cancelled() => {
                tracing::warn!(error = %e, "Could not determine branch name");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Emits a fixed list of variables
#[derive(Debug, Clone)]
pub struct StaticVariableProvider {
    name: String,
    order: i32,
    variables: Vec<Variable>,
}

impl StaticVariableProvider {
    /// Creates an empty static provider
    #[must_use]
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            name: name.into(),
            order,
            variables: Vec::new(),
        }
    }

    /// Adds a variable
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push(Variable::new(key, value));
        self
    }

    /// Adds many variables
    #[must_use]
    pub fn with_variables(mut self, variables: impl IntoIterator<Item = Variable>) -> Self {
        self.variables.extend(variables);
        self
    }
}

#[async_trait]
impl VariableProvider for StaticVariableProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn provide(&self, _context: &BuildContext, _existing: &VariableSet) -> Result<Vec<Variable>> {
        Ok(self.variables.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_context_provider_imports_prefixed_keys() {
        let context = BuildContext::from_pairs([
            ("Arbor.Build.Configuration", "Release"),
            ("HOME", "/root"),
        ]);

        let variables = ContextVariableProvider
            .provide(&context, &VariableSet::new())
            .await
            .unwrap();

        assert_eq!(variables, vec![Variable::new("Arbor.Build.Configuration", "Release")]);
    }

    #[tokio::test]
    async fn test_source_root_provider() {
        let provider = SourceRootProvider::new("/src/app");
        let variables = provider
            .provide(&BuildContext::new(), &VariableSet::new())
            .await
            .unwrap();

        let set: VariableSet = variables.into_iter().collect();
        assert_eq!(set.value(SOURCE_ROOT), Some("/src/app"));
        assert_eq!(
            set.value(BUILD_DIRECTORY).map(PathBuf::from),
            Some(PathBuf::from("/src/app").join("build"))
        );
    }

    #[tokio::test]
    async fn test_branch_override_wins() {
        let provider = VcsBranchProvider::new(ProcessSupervisor::new(), "/nonexistent")
            .with_override(Some("refs/heads/release/1.0".to_string()));

        let variables = provider
            .provide(&BuildContext::new(), &VariableSet::new())
            .await
            .unwrap();

        assert_eq!(variables, vec![Variable::new(BRANCH_NAME, "release/1.0")]);
    }

    #[tokio::test]
    async fn test_existing_branch_skips_query() {
        let mut existing = VariableSet::new();
        existing.set(BRANCH_NAME, "main");

        let provider = VcsBranchProvider::new(ProcessSupervisor::new(), "/nonexistent");
        let variables = provider.provide(&BuildContext::new(), &existing).await.unwrap();
        assert!(variables.is_empty());
    }

    #[tokio::test]
    async fn test_branch_query_failure_is_optional() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = VcsBranchProvider::new(ProcessSupervisor::new(), dir.path())
            .with_timeout(Duration::from_secs(2));

        let variables = provider
            .provide(&BuildContext::new(), &VariableSet::new())
            .await
            .unwrap();
        assert!(variables.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_branch_query_aborts_resolution() {
        let dir = tempfile::TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let provider = VcsBranchProvider::new(ProcessSupervisor::new(), dir.path())
            .with_cancellation(cancel);

        match provider.provide(&BuildContext::new(), &VariableSet::new()).await {
            Err(ArborError::Provider { provider, reason }) => {
                assert_eq!(provider, "vcs-branch");
                assert!(reason.contains("cancelled"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_required_branch_query_failure_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = VcsBranchProvider::new(ProcessSupervisor::new(), dir.path())
            .with_timeout(Duration::from_secs(2))
            .required(true);

        let result = provider
            .provide(&BuildContext::new(), &VariableSet::new())
            .await;
        assert!(result.is_err());
    }
}
