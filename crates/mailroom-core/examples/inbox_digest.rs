//! Example: print a digest of one correspondent's mail.
//!
//! ```bash
//! export IMAP_SERVER="imap.example.com:993"
//! export EMAIL_USERNAME="clinic@example.com"
//! export EMAIL_PASSWORD="app-password"
//! cargo run --package mailroom-core --example inbox_digest -- doctor@example.com [patient@example.com]
//! ```

use anyhow::Context;
use mailroom_core::{Mailroom, MailroomConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailroom_core=debug,mailroom_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let primary = args.next().context("usage: inbox_digest <primary> [filter]")?;
    let filter = args.next();

    let config = MailroomConfig::from_env()?;
    let mailroom = Mailroom::new(config).await?;

    let summaries = mailroom.correspondence(&primary, filter.as_deref()).await?;
    println!("{} message(s)", summaries.len());
    for summary in &summaries {
        let date = summary
            .date
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{:>6}  {date}  {:<30}  {}",
            summary.uid, summary.from, summary.subject
        );
        for name in &summary.attachments {
            println!("        [{name}]");
        }
    }

    let correspondents = mailroom.correspondents(&primary).await?;
    if !correspondents.is_empty() {
        println!("\nWrites to: {}", correspondents.join(", "));
    }
    Ok(())
}
