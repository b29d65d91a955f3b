//! Wires configuration into a planner and runs one session.

use crate::console::ConsoleCallback;
use std::sync::Arc;
use veritrace_core::brain::Brain;
use veritrace_core::browser::{BrowsingActor, PageBrowsingActor, PageClient};
use veritrace_core::config::VeritraceConfig;
use veritrace_core::providers::create_provider;
use veritrace_core::research::{NoOpPlannerCallback, Planner, PlannerCallback};

/// Build the page client the browsing actor drives.
async fn build_page_client(config: &VeritraceConfig) -> anyhow::Result<Arc<dyn PageClient>> {
    #[cfg(feature = "browser")]
    if config.browser.use_chromium {
        let client = veritrace_core::browser::ChromiumPageClient::launch(&config.browser).await?;
        tracing::info!("Using headless Chrome page client");
        return Ok(Arc::new(client));
    }

    Ok(Arc::new(veritrace_core::browser::HttpPageClient::new(
        &config.browser,
    )?))
}

fn build_brain(
    provider: Arc<dyn veritrace_core::LlmProvider>,
    system_prompt: &str,
    config: &VeritraceConfig,
) -> Brain {
    Brain::new(provider, system_prompt)
        .with_temperature(config.llm.temperature)
        .with_max_tokens(config.llm.max_tokens)
}

/// Run one research session starting from `command` and print its report.
pub async fn run_research(
    config: VeritraceConfig,
    command: &str,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let planner_provider = create_provider(&config.llm)?;
    let browser_provider = create_provider(&config.llm.for_browser())?;

    let page_client = build_page_client(&config).await?;
    let actor: Arc<dyn BrowsingActor> = Arc::new(
        PageBrowsingActor::new(
            build_brain(browser_provider, "", &config),
            page_client.clone(),
            config.browser.clone(),
        )
        .with_prompts(&config.prompts),
    );

    // JSON output keeps stdout machine-readable.
    let callback: Arc<dyn PlannerCallback> = if json {
        Arc::new(NoOpPlannerCallback)
    } else {
        Arc::new(ConsoleCallback::new(quiet))
    };

    let mut planner = Planner::new(
        build_brain(planner_provider, &config.prompts.system, &config),
        actor,
    )
    .with_prompts(config.prompts.clone())
    .with_callback(callback);

    let budget = config.research.time_budget();
    let result = planner.run(command, budget).await;

    if let Err(e) = page_client.close().await {
        tracing::warn!(error = %e, "Failed to close page client");
    }
    let report = result?;

    tracing::info!(
        session = %report.id,
        outcome = ?report.outcome,
        steps = report.steps.len(),
        tokens = report.usage.total(),
        "Session finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", report.render());
    }
    Ok(())
}
