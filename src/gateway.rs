//! AnkiConnect request gateway
//!
//! One synchronous HTTP call per request, no retries. Every outcome is folded
//! into `Result<Value, GatewayError>`; failures are logged here, once, with the
//! caller's operation label.

use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::AnkiConfig;
use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

/// Review-application control API
pub trait ControlApi {
    /// Invoke `action`; returns the envelope's `result` on success.
    /// `label` describes the operation for failure logs.
    fn send(
        &self,
        method: Method,
        action: &str,
        params: Option<Value>,
        label: &str,
    ) -> Result<Value, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Classify a raw HTTP outcome into the uniform result
pub fn classify(status: u16, body: &str) -> Result<Value, GatewayError> {
    if !(200..300).contains(&status) {
        return Err(GatewayError::Transport(status));
    }
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| GatewayError::Unknown(e.to_string()))?;
    match envelope.result {
        Value::Null | Value::Bool(false) => Err(GatewayError::Application(
            envelope.error.unwrap_or_else(|| "no error message".into()),
        )),
        result => Ok(result),
    }
}

/// HTTP client for a local AnkiConnect instance
pub struct AnkiConnect {
    client: reqwest::blocking::Client,
    endpoint: String,
    version: u32,
}

impl AnkiConnect {
    pub fn new(config: &AnkiConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            version: config.api_version,
        })
    }

    fn payload(&self, action: &str, params: Option<Value>) -> Value {
        match params {
            Some(params) => json!({ "action": action, "version": self.version, "params": params }),
            None => json!({ "action": action, "version": self.version }),
        }
    }

    #[hotpath::measure]
    fn call(&self, method: Method, payload: &Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .request(method.into(), &self.endpoint)
            .json(payload)
            .send()
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| GatewayError::Unknown(e.to_string()))?;
        classify(status, &body)
    }
}

impl ControlApi for AnkiConnect {
    fn send(
        &self,
        method: Method,
        action: &str,
        params: Option<Value>,
        label: &str,
    ) -> Result<Value, GatewayError> {
        let payload = self.payload(action, params);
        debug!(?method, %payload, "AnkiConnect request");

        let result = self.call(method, &payload);
        if let Err(e) = &result {
            match e {
                GatewayError::Transport(_) => {
                    error!("HTTP error while trying to {}: {}", label, e)
                }
                GatewayError::Application(_) => {
                    error!("AnkiConnect error while trying to {}: {}", label, e)
                }
                GatewayError::Unknown(_) => {
                    error!("unexpected failure while trying to {}: {}", label, e)
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn client_for(endpoint: String) -> AnkiConnect {
        let config = AnkiConfig {
            endpoint,
            timeout_secs: Some(5),
            ..AnkiConfig::default()
        };
        AnkiConnect::new(&config).unwrap()
    }

    /// Serve one HTTP exchange, returning the request body it received
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request = vec![0; content_length];
            reader.read_exact(&mut request).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
            serde_json::from_slice(&request).unwrap()
        });
        (endpoint, handle)
    }

    #[test]
    fn test_classify_success() {
        let result = classify(200, r#"{"result": true, "error": null}"#).unwrap();
        assert_eq!(result, Value::Bool(true));

        let result = classify(204, r#"{"result": {"buttons": [1, 2, 3]}, "error": null}"#).unwrap();
        assert_eq!(result["buttons"][2], 3);
    }

    #[test]
    fn test_classify_non_success_status() {
        assert!(matches!(
            classify(500, "oops"),
            Err(GatewayError::Transport(500))
        ));
        assert!(matches!(
            classify(302, r#"{"result": true}"#),
            Err(GatewayError::Transport(302))
        ));
    }

    #[test]
    fn test_classify_application_failure() {
        match classify(200, r#"{"result": null, "error": "Gui review is not currently active."}"#) {
            Err(GatewayError::Application(msg)) => {
                assert_eq!(msg, "Gui review is not currently active.")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            classify(200, r#"{"result": false, "error": null}"#),
            Err(GatewayError::Application(_))
        ));
        assert!(matches!(
            classify(200, r#"{"error": "missing result"}"#),
            Err(GatewayError::Application(_))
        ));
    }

    #[test]
    fn test_classify_malformed_body() {
        assert!(matches!(
            classify(200, "<html>not json</html>"),
            Err(GatewayError::Unknown(_))
        ));
    }

    #[test]
    fn test_request_envelope_round_trip() {
        let (endpoint, server) = serve_once("200 OK", r#"{"result": true, "error": null}"#);
        let gateway = client_for(endpoint);

        let result = gateway
            .send(
                Method::Post,
                "guiAnswerCard",
                Some(json!({ "ease": 3 })),
                "mark card as Good",
            )
            .unwrap();
        assert_eq!(result, Value::Bool(true));

        let request = server.join().unwrap();
        assert_eq!(
            request,
            json!({ "action": "guiAnswerCard", "version": 6, "params": { "ease": 3 } })
        );
    }

    #[test]
    fn test_request_without_params_omits_them() {
        let (endpoint, server) = serve_once("200 OK", r#"{"result": true, "error": null}"#);
        let gateway = client_for(endpoint);
        gateway
            .send(Method::Get, "guiShowAnswer", None, "show a card answer")
            .unwrap();
        let request = server.join().unwrap();
        assert_eq!(request, json!({ "action": "guiShowAnswer", "version": 6 }));
    }

    #[test]
    fn test_http_error_status_is_transport_error() {
        let (endpoint, server) = serve_once("500 Internal Server Error", "{}");
        let gateway = client_for(endpoint);
        let result = gateway.send(Method::Get, "guiCurrentCard", None, "get current card");
        assert!(matches!(result, Err(GatewayError::Transport(500))));
        server.join().unwrap();
    }

    #[test]
    fn test_refused_connection_is_unknown_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let gateway = client_for(format!("http://127.0.0.1:{}", port));
        let result = gateway.send(Method::Get, "guiShowAnswer", None, "show a card answer");
        assert!(matches!(result, Err(GatewayError::Unknown(_))));
    }
}
