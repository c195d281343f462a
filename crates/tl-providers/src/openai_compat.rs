//! The one concrete [`LlmProvider`]: an OpenAI-compatible chat completions
//! client. No Azure URL handling, auth rotation, streaming, or embeddings —
//! none of which this core needs (no multi-model routing, no streaming).

use std::time::Duration;

use serde_json::Value;

use tl_domain::{Error, Message, Result, Role, ToolCall, ToolDefinition};

use crate::chat::{ChatOptions, DebugSink, LlmProvider, Sampling};

pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
            request_timeout,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(
        &self,
        transcript: &[Message],
        options: &ChatOptions,
        debug: Option<&dyn DebugSink>,
    ) -> Result<Message> {
        let url = self.chat_url();
        let body = build_chat_body(&options.model, transcript, &options.tools, &options.sampling);

        if let Some(sink) = debug {
            let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
            sink.write(&format!("--- chat.request step={} ---\n{pretty}", options.step));
        }

        tracing::debug!(url = %url, model = %options.model, "chat request");

        let mut req = self.client.post(&url).json(&body).timeout(self.request_timeout);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;

        if let Some(sink) = debug {
            sink.write(&format!("--- chat.response step={} ---\n{text}", options.step));
        }

        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {} - {}", status.as_u16(), text)));
        }

        let json: Value = serde_json::from_str(&text)?;
        parse_chat_response(&json)
    }
}

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

fn build_chat_body(model: &str, transcript: &[Message], tools: &[ToolDefinition], sampling: &Sampling) -> Value {
    let messages: Vec<Value> = transcript.iter().map(msg_to_openai).collect();
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
    });

    if !tools.is_empty() {
        body["tools"] = Value::Array(tools.iter().map(tool_to_openai).collect());
    }

    match sampling {
        Sampling::Unset => {}
        Sampling::Default => body["temperature"] = serde_json::json!(1),
        Sampling::Temperature(t) => body["temperature"] = serde_json::json!(t),
    }

    body
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.content,
        }),
        Role::Assistant => {
            let mut obj = serde_json::json!({
                "role": "assistant",
                "content": if msg.content.is_empty() { Value::Null } else { Value::String(msg.content.clone()) },
            });
            if let Some(calls) = &msg.tool_calls {
                if !calls.is_empty() {
                    obj["tool_calls"] = Value::Array(calls.iter().map(tool_call_to_openai).collect());
                }
            }
            obj
        }
        Role::System => serde_json::json!({ "role": "system", "content": msg.content }),
        Role::User => serde_json::json!({ "role": "user", "content": msg.content }),
    }
}

fn tool_call_to_openai(tc: &ToolCall) -> Value {
    serde_json::json!({
        "id": tc.id,
        "type": "function",
        "function": { "name": tc.function.name, "arguments": tc.function.arguments },
    })
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_chat_response(body: &Value) -> Result<Message> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Http("no choices in response".to_string()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| Error::Http("no message in choice".to_string()))?;

    let content = message.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let tool_calls = parse_openai_tool_calls(message);

    Ok(Message {
        role: Role::Assistant,
        content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id: None,
        name: None,
    })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?.to_string();
            let arguments = func.get("arguments")?.as_str().unwrap_or("{}").to_string();
            Some(ToolCall::function(id, name, arguments))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct RecordingSink {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { lines: Mutex::new(Vec::new()) }
        }
    }

    impl DebugSink for RecordingSink {
        fn write(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn default_sampling_serializes_temperature_one_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "ok" } }],
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(server.uri(), None, Duration::from_secs(5));
        let transcript = vec![Message::user("Say ok")];
        let mut options = ChatOptions::new("gpt-4o-mini", 1);
        options.sampling = Sampling::Default;
        let sink = RecordingSink::new();

        let reply = provider.complete(&transcript, &options, Some(&sink)).await.unwrap();
        assert_eq!(reply.content, "ok");

        let lines = sink.lines.lock().unwrap();
        let request_dump = lines.iter().find(|l| l.starts_with("--- chat.request")).unwrap();
        assert!(request_dump.contains("\"temperature\": 1"));
        assert!(!request_dump.contains("top_p"));
        assert!(!request_dump.contains("presence_penalty"));
        assert!(!request_dump.contains("frequency_penalty"));
    }

    #[tokio::test]
    async fn unset_sampling_omits_temperature_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "ok" } }],
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(server.uri(), None, Duration::from_secs(5));
        let transcript = vec![Message::user("hi")];
        let options = ChatOptions::new("gpt-4o-mini", 1);
        let sink = RecordingSink::new();

        provider.complete(&transcript, &options, Some(&sink)).await.unwrap();
        let lines = sink.lines.lock().unwrap();
        let request_dump = lines.iter().find(|l| l.starts_with("--- chat.request")).unwrap();
        assert!(!request_dump.contains("temperature"));
    }

    #[tokio::test]
    async fn tool_calls_round_trip_from_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "1",
                            "type": "function",
                            "function": { "name": "fs_write_file", "arguments": "{\"path\":\"x.txt\"}" }
                        }]
                    }
                }],
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(server.uri(), None, Duration::from_secs(5));
        let options = ChatOptions::new("gpt-4o-mini", 1);
        let reply = provider.complete(&[Message::user("write")], &options, None).await.unwrap();

        assert!(reply.content.is_empty());
        let calls = reply.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "1");
        assert_eq!(calls[0].function.name, "fs_write_file");
    }

    #[tokio::test]
    async fn non_2xx_status_yields_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(server.uri(), None, Duration::from_secs(5));
        let options = ChatOptions::new("gpt-4o-mini", 1);
        let err = provider
            .complete(&[Message::user("hi")], &options, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn bearer_auth_header_sent_when_api_key_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(wiremock::matchers::header("Authorization", "Bearer secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "ok" } }],
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(
            server.uri(),
            Some("secret-key".to_string()),
            Duration::from_secs(5),
        );
        let options = ChatOptions::new("gpt-4o-mini", 1);
        let reply = provider.complete(&[Message::user("hi")], &options, None).await.unwrap();
        assert_eq!(reply.content, "ok");
    }
}
