use std::{future::Future, time::Duration};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use server_api::{
    create_annotator, delete_annotator, list_annotator_timers, load_board, reset_timer,
    start_timer, ApiContext,
};
use shared::{
    domain::AnnotatorId,
    protocol::AnnotatorTimer,
    timer::TimerBoard,
};
use storage::Storage;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "annotator-tools", about = "Manage annotator deadline timers")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/annotators.db")]
    database_url: String,
    /// Print JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    Add {
        name: String,
    },
    Delete {
        id: i64,
    },
    Start {
        id: i64,
    },
    Reset {
        id: i64,
    },
    /// Redraw the timer table until interrupted.
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// How often the snapshot is re-read from the database.
        #[arg(long, default_value_t = 30)]
        reload_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = ApiContext::new(storage);

    match cli.command {
        Command::List => {
            let timers = list_annotator_timers(&ctx, Utc::now()).await?;
            print_timers(&timers, cli.json)?;
        }
        Command::Add { name } => {
            let annotator = create_annotator(&ctx, &name).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&annotator)?);
            } else {
                println!("created annotator_id={} name={}", annotator.id, annotator.name);
            }
        }
        Command::Delete { id } => {
            delete_annotator(&ctx, AnnotatorId(id)).await?;
            println!("deleted annotator_id={id}");
        }
        Command::Start { id } => {
            let annotator = start_timer(&ctx, AnnotatorId(id)).await?;
            if let Some(start_time) = annotator.start_time {
                println!("started annotator_id={id} at {}", start_time.to_rfc3339());
            }
        }
        Command::Reset { id } => {
            reset_timer(&ctx, AnnotatorId(id)).await?;
            println!("reset annotator_id={id}");
        }
        Command::Watch {
            interval_ms,
            reload_secs,
        } => watch(&ctx, interval_ms, reload_secs).await?,
    }

    Ok(())
}

async fn watch(ctx: &ApiContext, interval_ms: u64, reload_secs: u64) -> Result<()> {
    watch_until(ctx, interval_ms, reload_secs, tokio::signal::ctrl_c()).await
}

/// Redraws until `shutdown` resolves. The future is polled across iterations
/// so a signal arriving mid-redraw is not lost.
async fn watch_until<F: Future>(
    ctx: &ApiContext,
    interval_ms: u64,
    reload_secs: u64,
    shutdown: F,
) -> Result<()> {
    let mut board = load_board(ctx).await?;
    let mut redraw = tokio::time::interval(Duration::from_millis(interval_ms.max(100)));
    let mut reload = tokio::time::interval(Duration::from_secs(reload_secs.max(1)));
    // The first reload tick fires immediately; the board was just loaded.
    reload.tick().await;
    tokio::pin!(shutdown);
    info!(interval_ms, reload_secs, "watching annotator timers");

    loop {
        tokio::select! {
            _ = redraw.tick() => render_board(&board),
            _ = reload.tick() => match load_board(ctx).await {
                Ok(fresh) => board = fresh,
                Err(error) => warn!(%error, "keeping previous snapshot"),
            },
            _ = &mut shutdown => break,
        }
    }
    Ok(())
}

fn render_board(board: &TimerBoard) {
    let now = Utc::now();
    // Clear screen and home the cursor.
    print!("\x1b[2J\x1b[H");
    println!("Annotator timers at {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    if board.is_empty() {
        println!("No annotators found");
        return;
    }
    print_table(&board.view_at(now));
    let summary = board.summary_at(now);
    println!(
        "\n{} annotators: {} available, {} on time, {} late",
        summary.total(),
        summary.available,
        summary.on_time,
        summary.late
    );
}

fn print_timers(timers: &[AnnotatorTimer], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(timers)?);
    } else if timers.is_empty() {
        println!("No annotators found");
    } else {
        print_table(timers);
    }
    Ok(())
}

fn print_table(timers: &[AnnotatorTimer]) {
    let name_width = timers
        .iter()
        .map(|t| t.annotator.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    println!("{:>6}  {:<name_width$}  {:<9}  REMAINING", "ID", "NAME", "STATUS");
    for timer in timers {
        println!(
            "{:>6}  {:<name_width$}  {:<9}  {}",
            timer.annotator.id,
            timer.annotator.name,
            timer.status.label(),
            timer.remaining_time,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watch_stops_on_first_shutdown_signal() {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let ctx = ApiContext::new(storage);
        create_annotator(&ctx, "Alice").await.expect("create");

        let shutdown = tokio::time::sleep(Duration::from_millis(250));
        tokio::time::timeout(
            Duration::from_secs(5),
            watch_until(&ctx, 100, 1, shutdown),
        )
        .await
        .expect("watch should stop once")
        .expect("watch");
    }
}
