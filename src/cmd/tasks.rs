//! Task and user commands.

use anyhow::{Context, Result};
use console::style;

use metritask::config::Config;
use metritask::gateway::{GatewayExt, ListFilter};
use metritask::models::{NewTask, Task};
use metritask::projection::{Filters, ListView};

use super::super::{ListArgs, TasksCommands};
use super::{connect, truncate};

pub async fn cmd_tasks(config: &Config, command: TasksCommands) -> Result<()> {
    let gateway = connect(config)?;

    match command {
        TasksCommands::List { project, list } => {
            let tasks = gateway
                .list_tasks(&ListFilter::new().with("project_id", project))
                .await
                .with_context(|| format!("Failed to load tasks of project {}", project))?;
            let tasks: Vec<_> = tasks
                .into_iter()
                .filter(|t| t.project_id == project || t.project_id == 0)
                .collect();
            print_tasks(config, &tasks, &list);
        }
        TasksCommands::Create {
            project,
            title,
            description,
            status,
            priority,
            due,
            assignee,
        } => {
            let task = gateway
                .create_task(&NewTask {
                    project_id: project,
                    title,
                    description,
                    status,
                    priority,
                    due_date: due,
                    assignee_id: assignee,
                })
                .await
                .context("Failed to create task")?;
            println!(
                "{} Created task #{} {} in project #{}",
                style("✓").green().bold(),
                task.id,
                style(&task.title).bold(),
                project
            );
        }
        TasksCommands::Delete { id } => {
            gateway
                .delete_task(id)
                .await
                .with_context(|| format!("Failed to delete task {}", id))?;
            println!("{} Deleted task #{}", style("✓").green().bold(), id);
        }
    }
    Ok(())
}

fn print_tasks(config: &Config, tasks: &[Task], args: &ListArgs) {
    let mut view = ListView::new(config.page_size());
    view.set_filters(Filters {
        status: args.status.clone(),
        priority: args.priority,
        window: args.due,
    });
    view.set_sort(Some(args.sort.unwrap_or_else(|| config.sort())));
    view.go_to(args.page);
    let page = view.render(tasks);

    println!();
    println!("{:<6} {:<40} {:<12} {:<8}  Due", "ID", "Title", "Status", "Priority");
    println!(
        "{:<6} {:<40} {:<12} {:<8}  ---",
        "------", "----------------------------------------", "------------", "--------"
    );
    for task in &page.items {
        println!(
            "{:<6} {:<40} {:<12} {:<8}  {}",
            task.id,
            truncate(&task.title, 40),
            task.status,
            task.priority,
            task.due_date.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!(
        "{}",
        style(format!(
            "Page {}/{} ({} tasks)",
            page.page, page.total_pages, page.total
        ))
        .dim()
    );
    println!();
}

pub async fn cmd_users(config: &Config) -> Result<()> {
    let gateway = connect(config)?;
    let users = gateway.list_users().await.context("Failed to list users")?;

    println!();
    println!("{:<6} {:<24} {:<32} Role", "ID", "Name", "Email");
    for user in &users {
        println!(
            "{:<6} {:<24} {:<32} {}",
            user.id,
            truncate(&user.name, 24),
            truncate(&user.email, 32),
            user.role.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{}", style(format!("{} users", users.len())).dim());
    println!();
    Ok(())
}
