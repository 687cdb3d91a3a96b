//! Kanban commands: `board` and `move`.

use anyhow::{Context, Result, bail};
use console::style;

use metritask::board::{BoardManager, CommitOutcome};
use metritask::config::Config;
use metritask::errors::BoardError;
use metritask::gateway::{GatewayExt, ListFilter};
use metritask::models::TaskStatus;

use super::{connect, truncate};

const COLUMN_WIDTH: usize = 28;

async fn load_board(config: &Config, project_id: i64) -> Result<BoardManager> {
    let gateway = connect(config)?;
    let tasks = gateway
        .list_tasks(&ListFilter::new().with("project_id", project_id))
        .await
        .with_context(|| format!("Failed to load tasks of project {}", project_id))?;
    // Some backends ignore the filter.
    let tasks = tasks
        .into_iter()
        .filter(|t| t.project_id == project_id || t.project_id == 0)
        .collect::<Vec<_>>();
    let board = BoardManager::new(gateway);
    board.load(tasks);
    Ok(board)
}

fn column_title(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::InProgress => "In Progress",
        TaskStatus::Completed => "Completed",
    }
}

fn print_board(board: &BoardManager) {
    let buckets = board.buckets();
    println!();
    for (status, tasks) in &buckets {
        let header = format!("{} ({})", column_title(*status), tasks.len());
        print!("{}", style(format!("{:<width$}", header, width = COLUMN_WIDTH)).bold());
    }
    println!();
    for _ in &buckets {
        print!("{:<width$}", "-".repeat(COLUMN_WIDTH - 2), width = COLUMN_WIDTH);
    }
    println!();

    let rows = buckets.iter().map(|(_, t)| t.len()).max().unwrap_or(0);
    for row in 0..rows {
        for (_, tasks) in &buckets {
            let cell = tasks
                .get(row)
                .map(|t| format!("#{} {}", t.id, t.title))
                .unwrap_or_default();
            print!(
                "{:<width$}",
                truncate(&cell, COLUMN_WIDTH - 2),
                width = COLUMN_WIDTH
            );
        }
        println!();
    }
    println!();
}

pub async fn cmd_board(config: &Config, project_id: i64) -> Result<()> {
    let board = load_board(config, project_id).await?;
    print_board(&board);
    Ok(())
}

pub async fn cmd_move(
    config: &Config,
    project_id: i64,
    task_id: i64,
    to: TaskStatus,
    index: usize,
) -> Result<()> {
    let board = load_board(config, project_id).await?;
    let Some(from) = board.board().placement_of(task_id).map(|p| p.status) else {
        bail!("Task {} is not on the board of project {}", task_id, project_id);
    };

    match board.move_task(task_id, from, to, index).await {
        Ok(CommitOutcome::Committed) => {
            println!(
                "{} Moved task #{} from {} to {}",
                style("✓").green().bold(),
                task_id,
                from,
                to
            );
        }
        Ok(CommitOutcome::LocalOnly) => {
            println!(
                "{} Task #{} is already {}; nothing to save",
                style("·").dim(),
                task_id,
                to
            );
        }
        Ok(CommitOutcome::Discarded) => {
            println!("{} Board changed while saving; reload it", style("!").yellow());
        }
        Err(e @ BoardError::CommitFailed { .. }) => {
            print_board(&board);
            return Err(e).context("Move was rolled back");
        }
        Err(e) => return Err(e.into()),
    }
    print_board(&board);
    Ok(())
}
