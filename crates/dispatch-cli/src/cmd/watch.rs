use dispatch_core::config::Config;
use dispatch_core::session;
use dispatch_core::stale::{StaleThresholds, StalenessDetector};
use dispatch_core::store;
use std::path::Path;
use std::time::Duration;

/// Poll the list and report tasks whose observable state stopped changing.
/// Reporting is all this does; escalation (follow-up tasks, forced release)
/// belongs to whatever supervises the workers.
#[allow(clippy::too_many_arguments)]
pub fn run(
    root: &Path,
    list: Option<&str>,
    cycles: Option<u32>,
    interval_secs: Option<u64>,
    suspect_after: Option<u32>,
    flag_after: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let list = session::resolve(list, root)?;
    let config = Config::load_or_default(root)?;
    let thresholds = StaleThresholds::new(
        suspect_after.unwrap_or(config.stale.suspect_after),
        flag_after.unwrap_or(config.stale.flag_after),
    );
    let interval = Duration::from_secs(interval_secs.unwrap_or(config.stale.interval_secs));

    let mut detector = StalenessDetector::new(thresholds);
    let mut cycle: u32 = 0;
    loop {
        cycle += 1;
        let records = store::list(root, &list)?;
        let reports = detector.observe(&records);

        if json {
            println!(
                "{}",
                serde_json::json!({ "cycle": cycle, "stale": reports })
            );
        } else if reports.is_empty() {
            println!("cycle {cycle}: nothing stale");
        } else {
            for report in &reports {
                println!(
                    "cycle {cycle}: [{}] {}: {} ({} unchanged cycles, owner {})",
                    report.task_id,
                    report.state,
                    report.subject,
                    report.unchanged_cycles,
                    report.owner.as_deref().unwrap_or("(none)")
                );
            }
        }

        if let Some(max) = cycles {
            if cycle >= max {
                break;
            }
        }
        std::thread::sleep(interval);
    }
    Ok(())
}
