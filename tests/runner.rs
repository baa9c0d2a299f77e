use anyhow::Result;

use microbiome_pipelines::utils::command::{run_tool, StageOutcome, ToolOptions};

#[tokio::test]
async fn test_failing_stage_does_not_stop_later_samples() -> Result<()> {
    // Two "samples": the first stage fails, the second must still run.
    let mut results = Vec::new();
    for script in ["exit 1", "exit 0"] {
        let mut options = ToolOptions::new();
        options.positional("-c").positional(script);
        results.push(run_tool("sh", &options, None).await);
    }

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].outcome, StageOutcome::Failed(Some(1)));
    assert_eq!(results[1].outcome, StageOutcome::Completed);
    Ok(())
}

#[tokio::test]
async fn test_log_file_captures_stdout_and_stderr() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("logs").join("stage.log");

    let mut options = ToolOptions::new();
    options
        .positional("-c")
        .positional("echo to-stdout; echo to-stderr >&2");
    let result = run_tool("sh", &options, Some(&log_path)).await;

    assert!(result.outcome.is_success());
    assert_eq!(result.log_path.as_deref(), Some(log_path.as_path()));
    let contents = std::fs::read_to_string(&log_path)?;
    assert!(contents.contains("to-stdout"));
    assert!(contents.contains("to-stderr"));
    Ok(())
}

#[tokio::test]
async fn test_failed_stage_still_writes_log() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("fail.log");

    let mut options = ToolOptions::new();
    options.positional("-c").positional("echo about-to-fail; exit 3");
    let result = run_tool("sh", &options, Some(&log_path)).await;

    assert_eq!(result.outcome, StageOutcome::Failed(Some(3)));
    assert!(std::fs::read_to_string(&log_path)?.contains("about-to-fail"));
    Ok(())
}

#[tokio::test]
async fn test_missing_binary_is_reported_not_raised() -> Result<()> {
    let options = ToolOptions::new();
    let result = run_tool("definitely-not-a-real-tool", &options, None).await;
    assert_eq!(result.outcome, StageOutcome::Failed(None));
    Ok(())
}

#[tokio::test]
async fn test_argument_order_is_insertion_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("args.log");

    let mut options = ToolOptions::new();
    options
        .positional("-c")
        .positional(r#"echo "$0 $1 $2""#)
        .positional("first")
        .positional("second")
        .positional("third");
    let result = run_tool("sh", &options, Some(&log_path)).await;

    assert!(result.outcome.is_success());
    assert!(std::fs::read_to_string(&log_path)?.contains("first second third"));
    Ok(())
}
