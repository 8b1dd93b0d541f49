//! With the load balancer disabled, its policy routing rule must be absent.

use super::{Suite, SuiteReport};
use crate::assertions::{assert_no_minuteman_rule, AssertionResult};
use crate::harness::{ClusterHarness, HarnessError};

/// Run the configured `ip rule` command locally and inspect its output.
pub async fn run(harness: &ClusterHarness) -> Result<SuiteReport, HarnessError> {
    if harness.topology.lb_enabled {
        return Ok(SuiteReport::skipped(Suite::Minuteman, "load balancer enabled"));
    }

    let Some((program, args)) = harness.ip_rule_command.split_first() else {
        return Ok(SuiteReport::from_checks(
            Suite::Minuteman,
            vec![AssertionResult::fail("list ip rules", "no command configured")],
        ));
    };

    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Ok(SuiteReport::from_checks(
            Suite::Minuteman,
            vec![AssertionResult::fail("list ip rules", stderr.trim())],
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(SuiteReport::from_checks(
        Suite::Minuteman,
        vec![assert_no_minuteman_rule(&stdout)],
    ))
}
