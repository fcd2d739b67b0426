//! Messages exchanged between the orchestrator and the inference worker.
//!
//! Both directions serialize to the JSON shapes the plot front end speaks:
//! `{"type":"load"}` / `{"texts":[..]}` inbound and `{"status":..}` outbound.

use serde::{Deserialize, Serialize};

/// Orchestrator → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireRequest", from = "WireRequest")]
pub enum WorkerRequest {
    /// Acquire model assets and build the encoder, unless already built.
    Load,
    /// Embed a batch of texts, in order.
    Embed { texts: Vec<String> },
}

/// Worker → orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Acquisition progress for one asset, in percent.
    Loading { file: String, progress: f64 },
    /// The encoder is usable. Sent once per successful `load`.
    Ready,
    /// Embeddings for the in-flight `embed`, echoing its texts.
    Complete {
        output: Vec<Vec<f32>>,
        texts: Vec<String>,
    },
    /// Terminates the in-flight `load` or `embed`.
    Error { error: String },
}

impl WorkerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Short name used in logs.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Loading { .. } => "loading",
            Self::Ready => "ready",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireRequest {
    Load { r#type: RequestKind },
    Embed { texts: Vec<String> },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RequestKind {
    Load,
}

impl From<WorkerRequest> for WireRequest {
    fn from(request: WorkerRequest) -> Self {
        match request {
            WorkerRequest::Load => Self::Load {
                r#type: RequestKind::Load,
            },
            WorkerRequest::Embed { texts } => Self::Embed { texts },
        }
    }
}

impl From<WireRequest> for WorkerRequest {
    fn from(wire: WireRequest) -> Self {
        match wire {
            WireRequest::Load { .. } => Self::Load,
            WireRequest::Embed { texts } => Self::Embed { texts },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_use_front_end_shapes() {
        assert_eq!(
            serde_json::to_value(WorkerRequest::Load).unwrap(),
            json!({ "type": "load" })
        );
        assert_eq!(
            serde_json::to_value(WorkerRequest::Embed {
                texts: vec!["cat".into(), "dog".into()]
            })
            .unwrap(),
            json!({ "texts": ["cat", "dog"] })
        );
    }

    #[test]
    fn requests_parse_from_front_end_shapes() {
        let load: WorkerRequest = serde_json::from_value(json!({ "type": "load" })).unwrap();
        assert_eq!(load, WorkerRequest::Load);

        let embed: WorkerRequest =
            serde_json::from_value(json!({ "texts": ["a", "b", "c"] })).unwrap();
        assert_eq!(
            embed,
            WorkerRequest::Embed {
                texts: vec!["a".into(), "b".into(), "c".into()]
            }
        );

        assert!(serde_json::from_value::<WorkerRequest>(json!({ "type": "unload" })).is_err());
    }

    #[test]
    fn messages_are_tagged_by_status() {
        assert_eq!(
            serde_json::to_value(WorkerMessage::Loading {
                file: "model.onnx".into(),
                progress: 42.5
            })
            .unwrap(),
            json!({ "status": "loading", "file": "model.onnx", "progress": 42.5 })
        );
        assert_eq!(
            serde_json::to_value(WorkerMessage::Ready).unwrap(),
            json!({ "status": "ready" })
        );
        assert_eq!(
            serde_json::to_value(WorkerMessage::Complete {
                output: vec![vec![0.5, 0.5]],
                texts: vec!["cat".into()]
            })
            .unwrap(),
            json!({ "status": "complete", "output": [[0.5, 0.5]], "texts": ["cat"] })
        );
        assert_eq!(
            serde_json::to_value(WorkerMessage::error("boom")).unwrap(),
            json!({ "status": "error", "error": "boom" })
        );
    }

    #[test]
    fn status_names_match_wire_tags() {
        let msg: WorkerMessage = serde_json::from_value(json!({ "status": "ready" })).unwrap();
        assert_eq!(msg.status(), "ready");
    }
}
