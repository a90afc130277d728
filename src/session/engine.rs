//! Engine session over a pluggable websocket transport.
//!
//! The core never bundles a websocket client. Callers inject anything that
//! can ship a JSON payload to the engine and hand back the peer's reply;
//! [`EngineSession`] owns JSON-RPC envelope framing, request-id allocation,
//! and the schema-version handshake. Every call is a suspension point and a
//! session must never be shared across tasks.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::errors::TransportError;

/// One-message-at-a-time transport to the engine
#[async_trait]
pub trait EngineTransport: Send {
    /// Send one JSON payload and await the peer's reply
    async fn roundtrip(&mut self, payload: Value) -> Result<Value, TransportError>;

    /// Close the connection; reports success or failure of the shutdown
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// JSON-RPC session against the engine's global context
pub struct EngineSession<T: EngineTransport> {
    transport: T,
    schema_version: String,
    next_id: u64,
}

impl<T: EngineTransport> EngineSession<T> {
    pub fn new(transport: T, config: &ConnectionConfig) -> Self {
        Self {
            transport,
            schema_version: config.schema_version.clone(),
            next_id: 0,
        }
    }

    /// Issue one JSON-RPC call against an object handle (-1 is the global
    /// context). Returns the `result` member of the reply.
    pub async fn call(
        &mut self,
        method: &str,
        handle: i64,
        params: Value,
    ) -> Result<Value, TransportError> {
        self.next_id += 1;
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": method,
            "handle": handle,
            "params": params,
        });
        debug!("Engine call {} (id {})", method, self.next_id);

        let reply = self.transport.roundtrip(envelope).await?;

        if let Some(error) = reply.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown engine error")
                .to_string();
            return Err(TransportError::EngineCall {
                method: method.to_string(),
                message,
            });
        }
        if reply.get("id").and_then(Value::as_u64) != Some(self.next_id) {
            return Err(TransportError::EngineProtocol(format!(
                "reply id does not match request id {}",
                self.next_id
            )));
        }
        reply
            .get("result")
            .cloned()
            .ok_or_else(|| TransportError::EngineProtocol("reply carries no result".to_string()))
    }

    /// Verify the peer speaks the declared schema version: asks the engine
    /// for its product version and surfaces a protocol error when the reply
    /// is malformed.
    pub async fn negotiate(&mut self) -> Result<String, TransportError> {
        let result = self.call("ProductVersion", -1, json!({})).await?;
        let version = result
            .get("qReturn")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TransportError::EngineProtocol("ProductVersion reply has no qReturn".to_string())
            })?;
        debug!(
            "Engine reports {} (requested schema {})",
            version, self.schema_version
        );
        Ok(version.to_string())
    }

    /// Close the session, reporting shutdown success or failure
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, DEFAULT_ENGINE_PORT, DEFAULT_QRS_PORT};
    use std::collections::VecDeque;

    struct ScriptedTransport {
        replies: VecDeque<Value>,
        sent: Vec<Value>,
        closed: bool,
    }

    #[async_trait]
    impl EngineTransport for ScriptedTransport {
        async fn roundtrip(&mut self, payload: Value) -> Result<Value, TransportError> {
            self.sent.push(payload);
            Ok(self.replies.pop_front().expect("script exhausted"))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closed = true;
            Ok(())
        }
    }

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            host: "sense.example.com".to_string(),
            qrs_port: DEFAULT_QRS_PORT,
            engine_port: DEFAULT_ENGINE_PORT,
            virtual_proxy: String::new(),
            secure: true,
            schema_version: "12.612.0".to_string(),
            credentials: Credentials::Bearer("token".to_string()),
            request_timeout: std::time::Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_call_wraps_jsonrpc_envelope() {
        let transport = ScriptedTransport {
            replies: VecDeque::from([json!({"jsonrpc": "2.0", "id": 1, "result": {"qOk": true}})]),
            sent: Vec::new(),
            closed: false,
        };
        let mut session = EngineSession::new(transport, &test_config());

        let result = session
            .call("GetActiveDoc", -1, json!({}))
            .await
            .expect("call should succeed");
        assert_eq!(result, json!({"qOk": true}));

        let sent = &session.transport.sent[0];
        assert_eq!(sent["jsonrpc"], "2.0");
        assert_eq!(sent["id"], 1);
        assert_eq!(sent["method"], "GetActiveDoc");
        assert_eq!(sent["handle"], -1);
    }

    #[tokio::test]
    async fn test_call_surfaces_engine_error() {
        let transport = ScriptedTransport {
            replies: VecDeque::from([json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"code": 403, "message": "Access denied"}
            })]),
            sent: Vec::new(),
            closed: false,
        };
        let mut session = EngineSession::new(transport, &test_config());

        let err = session.call("OpenDoc", -1, json!({})).await.unwrap_err();
        match err {
            TransportError::EngineCall { method, message } => {
                assert_eq!(method, "OpenDoc");
                assert_eq!(message, "Access denied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_negotiate_reads_product_version() {
        let transport = ScriptedTransport {
            replies: VecDeque::from([
                json!({"jsonrpc": "2.0", "id": 1, "result": {"qReturn": "14.173.4"}}),
            ]),
            sent: Vec::new(),
            closed: false,
        };
        let mut session = EngineSession::new(transport, &test_config());
        let version = session.negotiate().await.expect("negotiation");
        assert_eq!(version, "14.173.4");
    }

    #[tokio::test]
    async fn test_mismatched_reply_id_is_protocol_error() {
        let transport = ScriptedTransport {
            replies: VecDeque::from([json!({"jsonrpc": "2.0", "id": 99, "result": {}})]),
            sent: Vec::new(),
            closed: false,
        };
        let mut session = EngineSession::new(transport, &test_config());
        assert!(matches!(
            session.call("ProductVersion", -1, json!({})).await,
            Err(TransportError::EngineProtocol(_))
        ));
    }
}
