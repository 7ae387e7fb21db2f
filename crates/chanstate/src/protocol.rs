//! Line protocol: one JSON request in, one JSON reply out.

use chanstate_core::{
    config::Config, ports::MarkdownRenderer, runtime::StateHandle, ChannelId, Command,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Read-only requests. Anything else is decoded as a [`Command`].
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Query {
    LastMessage { channel_id: ChannelId },
    Current,
    List,
    Snapshot,
    Render { text: String },
}

const QUERY_OPS: &[&str] = &["last_message", "current", "list", "snapshot", "render"];

pub async fn handle_line(
    state: &StateHandle,
    renderer: &dyn MarkdownRenderer,
    cfg: &Config,
    line: &str,
) -> Value {
    match dispatch(state, renderer, cfg, line).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!(error = %e, "request failed");
            json!({ "ok": false, "error": e.to_string() })
        }
    }
}

async fn dispatch(
    state: &StateHandle,
    renderer: &dyn MarkdownRenderer,
    cfg: &Config,
    line: &str,
) -> anyhow::Result<Value> {
    let raw: Value = serde_json::from_str(line)?;
    let op = raw.get("op").and_then(Value::as_str).unwrap_or_default();

    if QUERY_OPS.contains(&op) {
        let query: Query = serde_json::from_value(raw)?;
        let reply = match query {
            Query::LastMessage { channel_id } => {
                let last = state.last_message(channel_id).await?;
                json!({ "ok": true, "last_message": last })
            }
            Query::Current => {
                let current = state.current().await?;
                json!({ "ok": true, "current": current })
            }
            Query::List => {
                let list = state.list().await?;
                json!({ "ok": true, "channels": list.as_slice(), "revision": list.revision() })
            }
            Query::Snapshot => {
                let snapshot = state.snapshot().await?;
                json!({ "ok": true, "snapshot": snapshot })
            }
            Query::Render { text } => json!({ "ok": true, "html": renderer.render(&text) }),
        };
        return Ok(reply);
    }

    let cmd: Command = serde_json::from_value(raw)?;
    let outcome = state.apply(cmd).await?;
    let mut reply = json!({ "ok": true, "outcome": outcome });
    if cfg.echo_snapshots {
        reply["snapshot"] = serde_json::to_value(state.snapshot().await?)?;
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanstate_core::formatting::MarkdownHtmlRenderer;

    async fn run(cfg: &Config, lines: &[&str]) -> Vec<Value> {
        let (state, _join) = StateHandle::spawn(cfg.queue_capacity);
        let renderer = MarkdownHtmlRenderer::new(cfg.render_options());
        let mut out = Vec::new();
        for line in lines {
            out.push(handle_line(&state, &renderer, cfg, line).await);
        }
        out
    }

    #[tokio::test]
    async fn commands_then_queries() {
        let replies = run(
            &Config::default(),
            &[
                r#"{"op":"replace_channel_list","channels":[{"ID":"a","name":"A"},{"ID":"b"}]}"#,
                r#"{"op":"select_channel","channel_id":"a"}"#,
                r#"{"op":"record_last_message","channel_id":"a","message_id":"9007199254740993"}"#,
                r#"{"op":"record_last_message","channel_id":"a","message_id":"9007199254740992"}"#,
                r#"{"op":"last_message","channel_id":"a"}"#,
                r#"{"op":"current"}"#,
                r#"{"op":"list"}"#,
            ],
        )
        .await;

        assert_eq!(replies[0], json!({"ok": true, "outcome": "applied"}));
        assert_eq!(replies[3], json!({"ok": true, "outcome": "unchanged"}));
        assert_eq!(replies[4]["last_message"], json!("9007199254740993"));
        assert_eq!(replies[5]["current"], json!({"ID": "a", "name": "A"}));
        assert_eq!(replies[6]["channels"], json!([{"ID": "a", "name": "A"}, {"ID": "b"}]));
        assert_eq!(replies[6]["revision"], json!(1));
    }

    #[tokio::test]
    async fn errors_do_not_stop_the_stream() {
        let replies = run(
            &Config::default(),
            &[
                "not json",
                r#"{"op":"teleport"}"#,
                r#"{"op":"record_last_message","channel_id":"a","message_id":"not-a-number"}"#,
                r#"{"op":"last_message","channel_id":"a"}"#,
            ],
        )
        .await;

        for r in &replies[..3] {
            assert_eq!(r["ok"], json!(false), "{r}");
        }
        assert!(replies[2]["error"]
            .as_str()
            .unwrap()
            .contains("invalid message identifier"));
        assert_eq!(replies[3]["last_message"], json!("0"));
    }

    #[tokio::test]
    async fn echo_snapshots_and_render() {
        let cfg = Config {
            echo_snapshots: true,
            ..Config::default()
        };
        let replies = run(
            &cfg,
            &[
                r#"{"op":"upsert_channel","channel":{"ID":"x"}}"#,
                r#"{"op":"render","text":"see https://example.com"}"#,
            ],
        )
        .await;

        assert_eq!(replies[0]["snapshot"]["revision"], json!(1));
        assert_eq!(
            replies[1]["html"],
            json!(r#"<p>see <a href="https://example.com" target="_blank">https://example.com</a></p>"#)
        );
    }
}
