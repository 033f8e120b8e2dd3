use colored::Colorize;
use stackflow_cloud::{
    EngineConfig, NodeStatus, ProvisioningEngine, RetryConfig, RunReport, StateManager,
};
use stackflow_cloud_local::{DEFAULT_SUBSCRIPTION, Fault, LocalProvider};
use stackflow_config::StackConfig;
use stackflow_core::TracingSink;
use std::sync::Arc;
use std::time::Duration;

/// Engine settings from the stack configuration, defaults for anything unset
pub fn engine_config(config: &StackConfig) -> EngineConfig {
    let defaults = RetryConfig::default();
    let retry = RetryConfig {
        max_attempts: config.retry.max_attempts.unwrap_or(defaults.max_attempts),
        initial_delay: config
            .retry
            .initial_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_delay),
        max_delay: config
            .retry
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay),
        backoff_multiplier: config
            .retry
            .backoff_multiplier
            .unwrap_or(defaults.backoff_multiplier),
    };
    EngineConfig {
        concurrency: config
            .concurrency
            .unwrap_or(EngineConfig::default().concurrency),
        retry,
        call_timeout_ms: config.call_timeout_ms,
    }
}

pub async fn handle(stack: &str, faults: &[String]) -> anyhow::Result<()> {
    let loaded = super::load(stack)?;

    println!("Stack: {}", loaded.config.stack.cyan());
    println!("Project: {}", loaded.config.project.cyan());
    println!();

    let mut provider = LocalProvider::new(
        loaded
            .config
            .subscription
            .clone()
            .unwrap_or_else(|| DEFAULT_SUBSCRIPTION.to_string()),
    );
    if let Some(location) = &loaded.config.location {
        provider = provider.with_location(location);
    }
    for spec in faults {
        let fault: Fault = spec.parse()?;
        provider = provider.with_fault(fault);
    }

    let manager = StateManager::new(&loaded.project_root, &loaded.config.stack);
    let lock = manager.acquire_lock().await?;

    let engine = ProvisioningEngine::new(Arc::new(provider))
        .with_sink(Arc::new(TracingSink))
        .with_config(engine_config(&loaded.config));

    let cancel = engine.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = engine.run_stack(loaded.stack).await;
    ctrl_c.abort();
    let report = report?;

    print_report(&report);

    let mut state = manager.load().await?;
    state.record(&report);
    manager.save(&state).await?;
    lock.release().await?;

    println!();
    println!(
        "State saved: {}",
        manager.state_path().display().to_string().cyan()
    );

    if !report.is_success() {
        anyhow::bail!("Stack '{}' was not fully realized", loaded.config.stack);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{}", "Resources:".bold());
    for node in &report.nodes {
        let marker = match &node.status {
            NodeStatus::Realized { .. } => "✓".green(),
            NodeStatus::Failed(_) => "✗".red(),
            NodeStatus::Skipped { .. } => "-".yellow(),
            NodeStatus::Cancelled => "-".dimmed(),
        };
        println!(
            "  {} {} ({}) {}",
            marker,
            node.name.cyan(),
            node.kind,
            node.status
        );
    }

    if !report.exports.is_empty() || !report.failed_exports.is_empty() {
        println!();
        println!("{}", "Exports:".bold());
        for (name, value) in &report.exports {
            println!("  {} = {}", name.cyan(), value);
        }
        for (name, reason) in &report.failed_exports {
            println!("  {} {} ({})", "✗".red(), name.cyan(), reason);
        }
    }

    println!();
    let summary = report.summary();
    if report.is_success() {
        println!("{} {} ({} ms)", "✓".green(), summary, report.duration_ms);
    } else {
        println!("{} {} ({} ms)", "✗".red(), summary, report.duration_ms);
    }
}
