use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use chanstate_core::{config::Config, formatting::MarkdownHtmlRenderer, runtime::StateHandle};

mod protocol;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    chanstate_core::logging::init(&cfg.service_name)?;

    let (state, join) = StateHandle::spawn(cfg.queue_capacity);
    let renderer = MarkdownHtmlRenderer::new(cfg.render_options());
    tracing::info!(queue = cfg.queue_capacity, "session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = protocol::handle_line(&state, &renderer, &cfg, &line).await;
        let mut out = serde_json::to_string(&reply)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    state.shutdown();
    let final_state = join.await.context("state runtime panicked")?;
    tracing::info!(
        channels = final_state.list().len(),
        tracked = final_state.snapshot().last_messages.len(),
        "session ended"
    );
    Ok(())
}
