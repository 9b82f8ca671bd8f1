//! Scenario tests for the tool pipeline
//!
//! These drive resolution and execution together with in-memory tools.

#[cfg(test)]
mod pipeline_tests {
    use super::super::*;
    use crate::errors::{ArborError, Result};
    use crate::executor::ExitCode;
    use crate::variables::{
        BuildContext, ProviderRegistry, StaticVariableProvider, VariableResolver, VariableSet,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    type Journal = Arc<Mutex<Vec<String>>>;

    enum Behavior {
        Succeed,
        Fail(i32),
        Error,
        Panic,
        RequireRelease,
    }

    struct FakeTool {
        name: &'static str,
        priority: i32,
        run_always: bool,
        behavior: Behavior,
        journal: Journal,
        tail: Option<TailBuffer>,
    }

    impl FakeTool {
        fn new(name: &'static str, priority: i32, behavior: Behavior, journal: &Journal) -> Self {
            Self {
                name,
                priority,
                run_always: false,
                behavior,
                journal: Arc::clone(journal),
                tail: None,
            }
        }

        fn always(mut self) -> Self {
            self.run_always = true;
            self
        }

        fn with_tail(mut self, lines: &[&str]) -> Self {
            let tail = TailBuffer::new(10);
            for line in lines {
                tail.push(*line);
            }
            self.tail = Some(tail);
            self
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn run_always(&self) -> bool {
            self.run_always
        }

        async fn execute(&self, variables: &VariableSet, _cancel: &CancellationToken) -> Result<ExitCode> {
            self.journal.lock().push(self.name.to_string());
            match self.behavior {
                Behavior::Succeed => Ok(ExitCode::SUCCESS),
                Behavior::Fail(code) => Ok(ExitCode::new(code)),
                Behavior::Error => Err(ArborError::ToolExecution {
                    tool: self.name.to_string(),
                    reason: "broken".to_string(),
                }),
                Behavior::Panic => panic!("tool exploded"),
                Behavior::RequireRelease => {
                    let configuration = variables.require("Configuration")?;
                    if configuration == "Release" {
                        Ok(ExitCode::SUCCESS)
                    } else {
                        Ok(ExitCode::FAILURE)
                    }
                }
            }
        }

        fn log_tail(&self) -> Option<&TailBuffer> {
            self.tail.as_ref()
        }
    }

    fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_build_then_failing_package() {
        let resolver = VariableResolver::new(
            ProviderRegistry::new()
                .with(StaticVariableProvider::new("p1", 0).with("Configuration", "Debug")),
        );
        let variables = resolver
            .resolve(VariableSet::new(), &BuildContext::new())
            .await
            .unwrap();

        let log = journal();
        let registry = ToolRegistry::new()
            .with(FakeTool::new("Package", 200, Behavior::RequireRelease, &log))
            .with(FakeTool::new("Build", 100, Behavior::Succeed, &log));

        let report = ToolPipeline::new(&registry)
            .run_all(&variables, &CancellationToken::new())
            .await;

        assert_eq!(report.exit_code, ExitCode::FAILURE);
        assert_eq!(
            report.outcomes(),
            vec![("Build", ToolOutcome::Succeeded), ("Package", ToolOutcome::Failed)]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_law() {
        let log = journal();
        let registry = ToolRegistry::new()
            .with(FakeTool::new("T1", 1, Behavior::Fail(1), &log))
            .with(FakeTool::new("T2", 2, Behavior::Succeed, &log))
            .with(FakeTool::new("T3", 3, Behavior::Succeed, &log).always());

        let report = ToolPipeline::new(&registry)
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        assert_eq!(report.exit_code, ExitCode::FAILURE);
        assert_eq!(
            report.outcomes(),
            vec![
                ("T1", ToolOutcome::Failed),
                ("T2", ToolOutcome::NotRun),
                ("T3", ToolOutcome::Succeeded),
            ]
        );
        assert_eq!(*log.lock(), vec!["T1", "T3"]);
    }

    #[tokio::test]
    async fn test_failure_flag_is_never_cleared() {
        let log = journal();
        let registry = ToolRegistry::new()
            .with(FakeTool::new("fail", 1, Behavior::Fail(2), &log))
            .with(FakeTool::new("cleanup", 2, Behavior::Succeed, &log).always())
            .with(FakeTool::new("publish", 3, Behavior::Succeed, &log));

        let report = ToolPipeline::new(&registry)
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        assert_eq!(report.result("publish").unwrap().outcome, ToolOutcome::NotRun);
        assert_eq!(report.exit_code, ExitCode::new(2));
    }

    #[tokio::test]
    async fn test_last_non_zero_code_is_reported() {
        let log = journal();
        let registry = ToolRegistry::new()
            .with(FakeTool::new("first", 1, Behavior::Fail(3), &log))
            .with(FakeTool::new("second", 2, Behavior::Fail(7), &log).always());

        let report = ToolPipeline::new(&registry)
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        assert_eq!(report.exit_code, ExitCode::new(7));
        assert_eq!(report.failed_count(), 2);
    }

    #[tokio::test]
    async fn test_errors_and_panics_are_contained() {
        let log = journal();
        let registry = ToolRegistry::new()
            .with(FakeTool::new("errors", 1, Behavior::Error, &log))
            .with(FakeTool::new("panics", 2, Behavior::Panic, &log).always())
            .with(FakeTool::new("after", 3, Behavior::Succeed, &log).always());

        let report = ToolPipeline::new(&registry)
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        let errors = report.result("errors").unwrap();
        assert_eq!(errors.outcome, ToolOutcome::Failed);
        assert_eq!(errors.message.as_deref(), Some("ToolExecutionError"));

        let panics = report.result("panics").unwrap();
        assert_eq!(panics.outcome, ToolOutcome::Failed);
        assert_eq!(panics.message.as_deref(), Some("panic"));

        assert_eq!(report.result("after").unwrap().outcome, ToolOutcome::Succeeded);
        assert_eq!(report.exit_code, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_missing_variable_fails_tool() {
        let log = journal();
        let registry =
            ToolRegistry::new().with(FakeTool::new("package", 1, Behavior::RequireRelease, &log));

        let report = ToolPipeline::new(&registry)
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        let result = report.result("package").unwrap();
        assert_eq!(result.outcome, ToolOutcome::Failed);
        assert_eq!(result.message.as_deref(), Some("ConfigurationError"));
    }

    #[tokio::test]
    async fn test_tail_is_drained_on_failure_only() {
        let log = journal();
        let failing = Arc::new(
            FakeTool::new("failing", 1, Behavior::Fail(1), &log).with_tail(&["error: boom"]),
        );
        let passing = Arc::new(
            FakeTool::new("passing", 2, Behavior::Succeed, &log)
                .always()
                .with_tail(&["ok"]),
        );

        let mut registry = ToolRegistry::new();
        registry.register_arc(failing.clone());
        registry.register_arc(passing.clone());

        ToolPipeline::new(&registry)
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        assert!(failing.log_tail().unwrap().is_empty());
        assert_eq!(passing.log_tail().unwrap().snapshot(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_result_count_matches_tool_count_and_order_is_stable() {
        let log = journal();
        let registry = ToolRegistry::new()
            .with(FakeTool::new("c", 5, Behavior::Succeed, &log))
            .with(FakeTool::new("a", 1, Behavior::Fail(1), &log))
            .with(FakeTool::new("b", 5, Behavior::Succeed, &log))
            .with(FakeTool::new("d", 9, Behavior::Succeed, &log));
        let pipeline = ToolPipeline::new(&registry);

        let first = pipeline
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;
        let second = pipeline
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        assert_eq!(first.results.len(), registry.len());
        let names: Vec<_> = first.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b", "d"]);
        assert_eq!(first.outcomes(), second.outcomes());
    }

    #[tokio::test]
    async fn test_empty_pipeline_succeeds() {
        let report = ToolPipeline::default()
            .run_all(&VariableSet::new(), &CancellationToken::new())
            .await;

        assert!(report.is_success());
        assert!(report.results.is_empty());
    }
}
