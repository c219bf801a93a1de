use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use feedback_core::{
    workflow::NotificationKind, Dashboard, DashboardView, FeedbackField, HttpFeedbackApi,
    ReplyLookup, Session, WorkflowState,
};
use shared::domain::{format_timestamp, FeedbackRecord};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(about = "Review user feedback and reply to it")]
struct Args {
    /// Backend base URL, e.g. http://localhost:5000/api
    #[arg(long)]
    base_url: Option<String>,
    /// Bearer token for admin-gated endpoints
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Only show feedback for apps assigned to this employee
    #[arg(long)]
    assigned_to: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the feedback table
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        sort: Option<FeedbackField>,
        #[arg(long, requires = "sort")]
        desc: bool,
    },
    /// Print every field of one record
    Show { id: String },
    /// Send a reply to the submitter of a record
    Reply {
        id: String,
        #[arg(long)]
        message: String,
    },
    /// Print the reply thread of a record
    Replies {
        id: String,
        /// Look the thread up by submitter email (older endpoint)
        #[arg(long)]
        by_email: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        settings.api_base_url = base_url;
    }
    if let Some(token) = args.token {
        settings.auth_token = Some(token);
    }
    if let Command::Replies { by_email: true, .. } = args.command {
        settings.reply_lookup = ReplyLookup::ByEmail;
    }

    let mut session = Session::new(&settings.api_base_url)
        .with_context(|| format!("bad api base url '{}'", settings.api_base_url))?;
    if let Some(token) = settings.auth_token.clone() {
        session = session.with_bearer_token(token);
    }
    info!(base_url = %session.base_url(), "feedback admin starting");

    let mut dashboard = Dashboard::new(Arc::new(HttpFeedbackApi::new()), session)
        .with_max_in_flight(settings.max_in_flight)
        .with_reply_lookup(settings.reply_lookup);

    if let DashboardView::Failed(message) = dashboard.refresh().await {
        bail!("{message}");
    }
    if let Some(email) = &args.assigned_to {
        dashboard
            .scope_to_assigned_apps(email)
            .await
            .context("Failed to fetch assigned apps")?;
    }

    match args.command {
        Command::List { search, sort, desc } => {
            let table = dashboard.table_mut();
            if let Some(query) = search {
                table.search(&query);
            }
            if let Some(field) = sort {
                table.sort_by(field);
                if desc {
                    table.sort_by(field);
                }
            }
            print_table(table.displayed());
        }
        Command::Show { id } => {
            let record = find_record(&dashboard, &id)?;
            for (label, value) in record.detail_rows() {
                println!("{label:<14} {value}");
            }
            if let Some(reason) = &record.error {
                println!("{:<14} unavailable ({reason})", "Replies");
            } else {
                println!("{:<14} {}", "Replies", record.replies.len());
            }
        }
        Command::Reply { id, message } => {
            let record = find_record(&dashboard, &id)?.clone();
            let mut workflow = dashboard.reply_workflow();
            workflow.open_reply(record)?;
            workflow.edit_message(message)?;
            let notification = workflow.submit().await?;
            println!("{}", notification.text);
            if notification.kind == NotificationKind::Failure {
                bail!("reply was not sent");
            }
        }
        Command::Replies { id, .. } => {
            let record = find_record(&dashboard, &id)?.clone();
            let mut workflow = dashboard.reply_workflow();
            if let Some(notification) = workflow.view_replies(record).await? {
                println!("{}", notification.text);
                return Ok(());
            }
            if let WorkflowState::ViewingReplies { replies, .. } = workflow.state() {
                if replies.is_empty() {
                    println!("No replies found.");
                }
                for reply in replies {
                    let at = reply.timestamp.map(format_timestamp).unwrap_or_default();
                    println!("{at:<24}  {}", reply.message);
                }
            }
            workflow.close();
        }
    }

    Ok(())
}

fn find_record<'a>(dashboard: &'a Dashboard, id: &str) -> Result<&'a FeedbackRecord> {
    dashboard
        .table()
        .find(id)
        .ok_or_else(|| anyhow!("no feedback with id '{id}'"))
}

fn print_table(rows: &[FeedbackRecord]) {
    let columns = FeedbackField::SORTABLE_COLUMNS;
    let header = columns
        .iter()
        .map(|field| field.label())
        .chain(["Replies"])
        .collect::<Vec<_>>()
        .join("\t");
    println!("Id\t{header}");

    if rows.is_empty() {
        println!("No feedback found");
        return;
    }
    for record in rows {
        let cells = columns
            .iter()
            .map(|field| {
                field
                    .search_text(record)
                    .map(|text| text.into_owned())
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("\t");
        let replies = match &record.error {
            Some(_) => "!".to_string(),
            None => record.replies.len().to_string(),
        };
        println!("{}\t{cells}\t{replies}", record.id);
    }
}
