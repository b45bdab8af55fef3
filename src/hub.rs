//! Line-oriented JSON link to the home-automation hub.
//!
//! The hub writes one state change per line:
//! `{"entity_id": "light.desk", "new_state": {"state": "on", "attributes": {...}}}`
//! and reads one service call per line:
//! `{"domain": "light", "service": "turn_on", "data": {...}}`

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::warn;

use crate::bridge::ServiceInvoker;
use crate::command::ServiceCall;
use crate::entity::{EntityId, StateSnapshot};

/// State change reported by the hub. `new_state` is absent on removal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateChange {
    pub entity_id: EntityId,
    #[serde(default)]
    pub new_state: Option<StateSnapshot>,
}

pub struct EventReader<R> {
    reader: R,
    line: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
        }
    }

    /// Next valid event; malformed lines (bad JSON or bad UTF-8) are logged
    /// and skipped. `None` once the hub closes the stream. Only I/O errors
    /// are returned.
    pub async fn next(&mut self) -> anyhow::Result<Option<StateChange>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                return Ok(None);
            }
            let line = self.line.as_slice();
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<StateChange>(line) {
                Ok(event) => return Ok(Some(event)),
                Err(err) => warn!(
                    "Skipping malformed hub event: {}: {}",
                    err,
                    String::from_utf8_lossy(line).trim_end()
                ),
            }
        }
    }
}

/// Writes service calls back to the hub.
pub struct LineInvoker<W> {
    writer: Mutex<W>,
}

impl<W> LineInvoker<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: AsyncWrite + Unpin + Send> ServiceInvoker for LineInvoker<W> {
    async fn call(&self, call: ServiceCall) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&call)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_reads_events_and_skips_garbage() {
        let input = concat!(
            r#"{"entity_id": "light.desk", "new_state": {"state": "on", "attributes": {"brightness": 3}}}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"entity_id": "nodot", "new_state": null}"#,
            "\n",
            r#"{"entity_id": "switch.pump", "new_state": null}"#,
            "\n",
        );
        let mut reader = EventReader::new(BufReader::new(input.as_bytes()));

        let first = reader.next().await.unwrap().unwrap();
        assert_eq!(first.entity_id.to_string(), "light.desk");
        let state = first.new_state.unwrap();
        assert_eq!(state.state, "on");
        assert_eq!(state.attributes["brightness"], json!(3));

        let second = reader.next().await.unwrap().unwrap();
        assert_eq!(second.entity_id.to_string(), "switch.pump");
        assert!(second.new_state.is_none());

        assert!(reader.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(br#"{"entity_id": "switch.pump", "new_state": {"state": "off"}}"#);
        let mut reader = EventReader::new(BufReader::new(input.as_slice()));

        let event = reader.next().await.unwrap().unwrap();
        assert_eq!(event.entity_id.to_string(), "switch.pump");
        assert_eq!(event.new_state.unwrap().state, "off");
        assert!(reader.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_calls_as_lines() {
        let invoker = LineInvoker::new(Vec::new());
        let mut data = Map::new();
        data.insert("entity_id".into(), json!("switch.pump"));
        invoker
            .call(ServiceCall {
                domain: "switch".into(),
                service: "turn_on".into(),
                data,
            })
            .await
            .unwrap();
        invoker
            .call(ServiceCall {
                domain: "script".into(),
                service: "good_night".into(),
                data: Map::new(),
            })
            .await
            .unwrap();

        let written = String::from_utf8(invoker.into_inner()).unwrap();
        assert_eq!(
            written,
            concat!(
                r#"{"domain":"switch","service":"turn_on","data":{"entity_id":"switch.pump"}}"#,
                "\n",
                r#"{"domain":"script","service":"good_night","data":{}}"#,
                "\n",
            )
        );
    }
}
