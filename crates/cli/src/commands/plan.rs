//! `robovox plan`: plan one utterance, optionally run it.

use std::path::Path;
use std::sync::Arc;

use robovox_agent::{LlmAgent, Planner};
use robovox_core::plan::PlanOrReply;
use robovox_core::session::ConversationContext;
use robovox_executor::SkillExecutor;
use tokio_util::sync::CancellationToken;

pub async fn run(
    config_path: Option<&Path>,
    message: &str,
    execute: bool,
    replay: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let provider = super::build_provider(&config, replay)?;
    let planner = LlmAgent::from_config(provider, &config);

    let (_arm, tools) = robovox_robot::simulated(&config);
    let executor = SkillExecutor::new(Arc::new(tools));
    let schema = executor.host().schema();

    let context = ConversationContext::new(config.planner.context_window);
    let cancel = CancellationToken::new();

    eprint!("  Planning...");
    let planned = planner.plan(message, &context, schema, &cancel).await;
    eprint!("\r             \r");
    let planned = planned?;
    println!("{}", serde_json::to_string_pretty(&planned)?);

    if let (true, PlanOrReply::Plan(plan)) = (execute, &planned) {
        let result = executor.execute(plan, &cancel).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
