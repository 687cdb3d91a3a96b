//! Project and membership commands.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use console::style;

use metritask::cache::{EntityCache, RefreshOutcome};
use metritask::config::Config;
use metritask::gateway::{Gateway, GatewayExt};
use metritask::models::{NewProject, ProjectUpdate};
use metritask::projection::{Filters, ListView};
use metritask::stats::project_stats;

use super::super::{ListArgs, MembersCommands, ProjectsCommands};
use super::{connect, truncate};

pub async fn cmd_projects(config: &Config, command: Option<ProjectsCommands>) -> Result<()> {
    let gateway = connect(config)?;

    match command {
        None => list_projects(config, gateway.as_ref(), &default_list_args()).await,
        Some(ProjectsCommands::List(args)) => list_projects(config, gateway.as_ref(), &args).await,
        Some(ProjectsCommands::Show { id }) => {
            let cache = EntityCache::new(gateway);
            if let RefreshOutcome::Failed(info) = cache.refresh(id).await {
                bail!("Could not load project {}: {}", id, info.message);
            }
            let Some(project) = cache.current() else {
                bail!("Project {} is not available", id);
            };
            let stats = project_stats(&project, Utc::now());

            println!();
            println!("{} {}", style(format!("#{}", project.id)).dim(), style(&project.name).bold());
            if let Some(description) = &project.description {
                println!("{}", description);
            }
            println!();
            println!("  status    {}", project.status.as_deref().unwrap_or("-"));
            println!("  priority  {}", project.priority);
            println!("  due       {}", project.due_date.as_deref().unwrap_or("-"));
            println!(
                "  progress  {:.0}% reported, {:.0}% of tasks completed",
                stats.reported_progress, stats.tasks.completion
            );
            println!(
                "  tasks     {} total, {} overdue",
                stats.tasks.total, stats.tasks.overdue
            );
            println!();
            println!("Members:");
            if project.members.is_empty() {
                println!("  {}", style("(none)").dim());
            }
            for member in &project.members {
                println!("  {:<6} {:<24} {}", member.id, member.name, style(&member.email).dim());
            }
            println!();
            Ok(())
        }
        Some(ProjectsCommands::Create {
            name,
            description,
            priority,
            due,
        }) => {
            let project = gateway
                .create_project(&NewProject {
                    name,
                    description,
                    priority,
                    due_date: due,
                })
                .await
                .context("Failed to create project")?;
            println!(
                "{} Created project #{} {}",
                style("✓").green().bold(),
                project.id,
                style(&project.name).bold()
            );
            Ok(())
        }
        Some(ProjectsCommands::Update {
            id,
            name,
            description,
            status,
            priority,
            due,
        }) => {
            let update = ProjectUpdate {
                name,
                description,
                status,
                priority,
                due_date: due,
            };
            if update.is_empty() {
                bail!("Nothing to update. Pass at least one of --name, --description, --status, --priority, --due");
            }
            let project = gateway
                .update_project(id, &update)
                .await
                .with_context(|| format!("Failed to update project {}", id))?;
            println!(
                "{} Updated project #{} {}",
                style("✓").green().bold(),
                project.id,
                style(&project.name).bold()
            );
            Ok(())
        }
        Some(ProjectsCommands::Delete { id }) => {
            gateway
                .delete_project(id)
                .await
                .with_context(|| format!("Failed to delete project {}", id))?;
            println!("{} Deleted project #{}", style("✓").green().bold(), id);
            Ok(())
        }
    }
}

fn default_list_args() -> ListArgs {
    ListArgs {
        status: None,
        priority: None,
        due: None,
        sort: None,
        page: 1,
    }
}

async fn list_projects<G: Gateway + ?Sized>(config: &Config, gateway: &G, args: &ListArgs) -> Result<()> {
    let projects = gateway
        .list_projects()
        .await
        .context("Failed to list projects")?;

    let mut view = ListView::new(config.page_size());
    view.set_filters(Filters {
        status: args.status.clone(),
        priority: args.priority,
        window: args.due,
    });
    view.set_sort(Some(args.sort.unwrap_or_else(|| config.sort())));
    view.go_to(args.page);
    let page = view.render(&projects);

    println!();
    println!(
        "{:<6} {:<32} {:<12} {:<8} {:>8}  Due",
        "ID", "Name", "Status", "Priority", "Progress"
    );
    println!(
        "{:<6} {:<32} {:<12} {:<8} {:>8}  ---",
        "------", "--------------------------------", "------------", "--------", "--------"
    );
    for project in &page.items {
        println!(
            "{:<6} {:<32} {:<12} {:<8} {:>7.0}%  {}",
            project.id,
            truncate(&project.name, 32),
            project.status.as_deref().unwrap_or("-"),
            project.priority,
            project.progress,
            project.due_date.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!(
        "{}",
        style(format!(
            "Page {}/{} ({} projects)",
            page.page, page.total_pages, page.total
        ))
        .dim()
    );
    println!();
    Ok(())
}

pub async fn cmd_members(config: &Config, command: MembersCommands) -> Result<()> {
    let gateway = connect(config)?;
    match command {
        MembersCommands::Add {
            project_id,
            user_id,
        } => {
            gateway
                .add_member(project_id, user_id)
                .await
                .with_context(|| format!("Failed to add user {} to project {}", user_id, project_id))?;
            println!(
                "{} Added user {} to project #{}",
                style("✓").green().bold(),
                user_id,
                project_id
            );
        }
        MembersCommands::Remove {
            project_id,
            user_id,
        } => {
            gateway
                .remove_member(project_id, user_id)
                .await
                .with_context(|| {
                    format!("Failed to remove user {} from project {}", user_id, project_id)
                })?;
            println!(
                "{} Removed user {} from project #{}",
                style("✓").green().bold(),
                user_id,
                project_id
            );
        }
    }
    Ok(())
}
