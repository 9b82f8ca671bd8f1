//! `arbor build` - Resolve variables and run the configured tools
//!
//! Variables come from the variable files at the source root, the built-in
//! providers and `build.variables` in the configuration. Tools come from
//! `build.tools`.

use anyhow::Result;
use arbor::ExitCode;
use arbor::bootstrap::{BootstrapOptions, resolve_base_directory};
use arbor::executor::ProcessSupervisor;
use arbor::infrastructure::Config;
use arbor::pipeline::{CommandTool, ToolPipeline, ToolRegistry};
use arbor::variables::well_known::VCS_TIMEOUT_SECONDS;
use arbor::variables::{
    BuildContext, ContextVariableProvider, ProviderRegistry, SourceRootProvider,
    StaticVariableProvider, Variable, VariableResolver, VariableSet, VcsBranchProvider,
    load_variable_files,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Order of the provider serving `build.variables`
pub const CONFIG_PROVIDER_ORDER: i32 = 100;

/// Registers the built-in providers plus the configured variables
pub fn provider_registry(
    config: &Config,
    options: &BootstrapOptions,
    source_root: &Path,
    context: &BuildContext,
    supervisor: &ProcessSupervisor,
    cancel: &CancellationToken,
) -> ProviderRegistry {
    let mut source = SourceRootProvider::new(source_root);
    if let Some(dir) = &options.build_directory {
        source = source.with_build_directory(source_root.join(dir));
    }

    let vcs_timeout = context
        .get(VCS_TIMEOUT_SECONDS)
        .and_then(|value| value.trim().parse().ok())
        .map_or_else(|| config.build.vcs_timeout(), Duration::from_secs);

    let mut registry = ProviderRegistry::new()
        .with(ContextVariableProvider)
        .with(source)
        .with(
            VcsBranchProvider::new(supervisor.clone(), source_root)
                .with_override(options.branch_name_override.clone())
                .with_timeout(vcs_timeout)
                .with_cancellation(cancel.clone())
                .required(config.build.require_branch),
        );

    if !config.build.variables.is_empty() {
        registry.register(
            StaticVariableProvider::new("configuration", CONFIG_PROVIDER_ORDER).with_variables(
                config
                    .build
                    .variables
                    .iter()
                    .map(|(key, value)| Variable::new(key.clone(), value.clone())),
            ),
        );
    }
    registry
}

/// Builds one command tool per `build.tools` entry
pub fn tool_registry(config: &Config, supervisor: &ProcessSupervisor) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in &config.build.tools {
        registry.register(CommandTool::from_config(tool, supervisor.clone())?);
    }
    Ok(registry)
}

/// Source root and resolved variables of one build
#[derive(Debug)]
pub struct ResolvedBuild {
    pub source_root: PathBuf,
    pub variables: VariableSet,
}

/// Resolves the variable set for `args`
pub async fn resolve_build(
    config: &Config,
    args: &[String],
    cwd: &Path,
    supervisor: &ProcessSupervisor,
    cancel: &CancellationToken,
) -> Result<ResolvedBuild> {
    let context = BuildContext::from_process_env();
    let options = BootstrapOptions::from_args_or_debug(args, &context)?;
    let source_root = resolve_base_directory(options.base_dir.as_deref(), cwd)?;

    let seed = load_variable_files(&source_root)?;
    let registry =
        provider_registry(config, &options, &source_root, &context, supervisor, cancel);
    tracing::info!(
        providers = ?registry.names(),
        seeded = seed.len(),
        "Resolving build variables"
    );
    let variables = VariableResolver::new(registry)
        .resolve(seed, &context)
        .await?;

    Ok(ResolvedBuild {
        source_root,
        variables,
    })
}

/// Runs the build and returns the pipeline's exit code
pub async fn run_build(
    config: &Config,
    args: &[String],
    cwd: &Path,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let supervisor = ProcessSupervisor::new();
    let build = resolve_build(config, args, cwd, &supervisor, cancel).await?;
    let tools = tool_registry(config, &supervisor)?;
    if tools.is_empty() {
        tracing::warn!("No tools configured, nothing to run");
    }

    tracing::info!(
        source_root = %build.source_root.display(),
        variables = build.variables.len(),
        tools = tools.len(),
        "Starting build"
    );
    let report = ToolPipeline::new(&tools)
        .run_all(&build.variables, cancel)
        .await;
    Ok(report.exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor::infrastructure::ToolConfig;
    use arbor::variables::well_known::{BRANCH_NAME, BUILD_DIRECTORY, SOURCE_ROOT};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_registry_resolves_configured_variables() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config
            .build
            .variables
            .insert("Arbor.Build.Configuration".to_string(), "Release".to_string());
        let options = BootstrapOptions {
            build_directory: Some(PathBuf::from("out")),
            branch_name_override: Some("refs/heads/main".to_string()),
            ..BootstrapOptions::default()
        };
        let context = BuildContext::new();

        let registry = provider_registry(
            &config,
            &options,
            dir.path(),
            &context,
            &ProcessSupervisor::new(),
            &CancellationToken::new(),
        );
        assert_eq!(
            registry.names(),
            vec!["context", "source-root", "vcs-branch", "configuration"]
        );

        let variables = VariableResolver::new(registry)
            .resolve(VariableSet::new(), &context)
            .await
            .unwrap();
        assert_eq!(variables.value("arbor.build.configuration"), Some("Release"));
        assert_eq!(variables.value(BRANCH_NAME), Some("main"));
        assert_eq!(
            variables.value(SOURCE_ROOT),
            Some(dir.path().display().to_string().as_str())
        );
        assert_eq!(
            variables.value(BUILD_DIRECTORY),
            Some(dir.path().join("out").display().to_string().as_str())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_build_with_configured_tools() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let mut config = Config::default();
        config.build.tools = vec![
            ToolConfig {
                name: "fail".to_string(),
                priority: 1,
                run_always: false,
                command: "sh -c 'exit 2'".to_string(),
                working_dir: None,
                tail_capacity: 10,
            },
            ToolConfig {
                name: "cleanup".to_string(),
                priority: 2,
                run_always: true,
                command: "sh -c 'touch cleaned'".to_string(),
                working_dir: None,
                tail_capacity: 10,
            },
        ];
        let args = vec![
            format!("-baseDirectory={}", dir.path().display()),
            "-branchName=main".to_string(),
        ];

        let code = run_build(&config, &args, dir.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(code.is_failure());
        assert!(dir.path().join("cleaned").exists());
    }
}
