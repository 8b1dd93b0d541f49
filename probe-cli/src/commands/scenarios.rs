//! List the VIP scenarios a run would exercise.

use anyhow::{Context, Result};
use probe_core::{distinct_locations, is_placeable, ScenarioEnumerator};

use crate::config::Config;

/// Run the scenarios command. Needs no cluster access.
pub async fn run(config: &Config, json: bool) -> Result<()> {
    let scenarios = ScenarioEnumerator::new(config.enumeration()).enumerate();
    let agents = distinct_locations(&config.cluster.agents).len();

    for scenario in &scenarios {
        if json {
            let line = serde_json::to_string(scenario).context("Failed to encode scenario")?;
            println!("{}", line);
        } else if !config.cluster.agents.is_empty() && !is_placeable(scenario, agents) {
            println!("{} [skipped: needs {} agents]", scenario, scenario.required_locations());
        } else {
            println!("{}", scenario);
        }
    }

    if !json {
        println!();
        println!("{} scenarios", scenarios.len());
    }
    Ok(())
}
