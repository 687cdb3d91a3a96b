//! Statistics command (`metritask stats`).

use anyhow::{Context, Result, bail};
use chrono::Utc;
use console::style;

use metritask::cache::{EntityCache, RefreshOutcome};
use metritask::config::Config;
use metritask::gateway::{GatewayExt, ListFilter};
use metritask::models::{Priority, TaskStatus};
use metritask::stats::{TaskStats, project_stats, user_stats};

use super::connect;

fn print_stats(title: &str, stats: &TaskStats) {
    println!();
    println!("{}", style(title).bold());
    println!();
    println!("  Total        {}", stats.total);
    for status in TaskStatus::ALL {
        println!("  {:<12} {}", status, stats.count(status));
    }
    println!(
        "  Overdue      {}",
        if stats.overdue > 0 {
            style(stats.overdue.to_string()).red()
        } else {
            style(stats.overdue.to_string())
        }
    );
    println!("  Completion   {:.0}%", stats.completion);
    println!();
    println!("  By priority:");
    for priority in [Priority::High, Priority::Medium, Priority::Low, Priority::Unknown] {
        let count = stats.priority_count(priority);
        if count > 0 || priority != Priority::Unknown {
            println!("    {:<10} {}", priority, count);
        }
    }
    println!();
}

pub async fn cmd_stats(config: &Config, user: Option<i64>, project: Option<i64>) -> Result<()> {
    let gateway = connect(config)?;
    let now = Utc::now();

    match (user, project) {
        (Some(user_id), _) => {
            let tasks = gateway
                .list_tasks(&ListFilter::new().with("assignee_id", user_id))
                .await
                .context("Failed to load tasks")?;
            let stats = user_stats(user_id, &tasks, now);
            print_stats(&format!("Tasks assigned to user {}", user_id), &stats);
        }
        (None, Some(project_id)) => {
            let cache = EntityCache::new(gateway);
            if let RefreshOutcome::Failed(info) = cache.refresh(project_id).await {
                bail!("Could not load project {}: {}", project_id, info.message);
            }
            let Some(project) = cache.current() else {
                bail!("Project {} is not available", project_id);
            };
            let stats = project_stats(&project, now);
            print_stats(&format!("Project #{} {}", project.id, project.name), &stats.tasks);
            println!(
                "  Server-reported progress: {:.0}%",
                stats.reported_progress
            );
            println!();
        }
        (None, None) => bail!("Pass --user <id> or --project <id>"),
    }
    Ok(())
}
