//! Watch command implementation.

use serde::Serialize;
use tandem_engine::{EngineConfig, SyncClient};
use tandem_protocol::{ClientId, PresenceMap};
use tandem_todo::{Todo, TodoDomain, TodoSelection, TodoState};
use tracing::info;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One line per item.
    Text,
    /// One JSON object per change.
    Json,
}

impl Format {
    /// Parses a `--format` value.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown format {other:?}, expected text or json")),
        }
    }
}

/// What the watcher prints on every change.
#[derive(Debug, Serialize)]
pub struct WatchView {
    /// Our client id, if connected.
    #[serde(rename = "clientId")]
    pub client_id: Option<ClientId>,
    /// Items in display order.
    pub items: Vec<Todo>,
    /// Connected clients.
    pub presence: PresenceMap<TodoSelection>,
}

impl WatchView {
    fn capture(client: &SyncClient<TodoDomain>) -> Self {
        let document = client.document();
        Self {
            client_id: client.self_id(),
            items: document.items().cloned().collect(),
            presence: client.presence(),
        }
    }

    fn render_text(&self) -> String {
        let mut out = match &self.client_id {
            Some(id) => format!("-- {id} ({} connected)\n", self.presence.len()),
            None => "-- disconnected\n".to_string(),
        };
        for item in &self.items {
            let holders: Vec<&str> = self
                .presence
                .values()
                .filter(|r| Some(&r.id) != self.client_id.as_ref())
                .filter(|r| matches!(&r.selection, Some(Some(sel)) if sel == &item.id))
                .map(|r| r.id.as_str())
                .collect();
            if holders.is_empty() {
                out.push_str(&format!("  {:<8} {}\n", item.id, item.todo));
            } else {
                out.push_str(&format!(
                    "  {:<8} {} [selected by {}]\n",
                    item.id,
                    item.todo,
                    holders.join(", ")
                ));
            }
        }
        out
    }
}

/// Connects to the relay and prints the list until interrupted.
pub async fn run(url: String, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    info!(%url, "watching");
    let config = EngineConfig::new(url);
    let client = SyncClient::connect_ws(TodoDomain, TodoState::new(), None, config);
    let mut changes = client.subscribe();

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = WatchView::capture(&client);
                match format {
                    Format::Json => println!("{}", serde_json::to_string(&view)?),
                    Format::Text => print!("{}", view.render_text()),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_protocol::ClientRecord;

    #[test]
    fn format_parsing() {
        assert_eq!(Format::parse("json").unwrap(), Format::Json);
        assert_eq!(Format::parse("text").unwrap(), Format::Text);
        assert!(Format::parse("yaml").is_err());
    }

    #[test]
    fn text_view_marks_foreign_selections() {
        let me = ClientId::new("me");
        let other = ClientId::new("other");
        let mut presence = PresenceMap::new();
        presence.insert(me.clone(), ClientRecord::with_selection(me.clone(), Some("a".into())));
        presence.insert(
            other.clone(),
            ClientRecord::with_selection(other.clone(), Some("b".into())),
        );

        let view = WatchView {
            client_id: Some(me),
            items: TodoState::demo().items().cloned().collect(),
            presence,
        };
        let text = view.render_text();
        assert!(text.contains("(2 connected)"));
        assert!(text.contains("Task B [selected by other]"));
        assert!(!text.contains("Task A [selected"));
    }
}
