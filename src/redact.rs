//! Secret handling for log output.
//!
//! Secrets reach the logs two ways: as JSON fields in HTTP payloads and as
//! raw strings embedded in formatted events. [`mask_json`] covers the first
//! before a payload is logged, and [`SecretRegistry`] backs the redacting
//! writer installed by `telemetry` for the second.

use crate::telemetry::escape_command_data;
use serde_json::Value;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, RwLock};
use tracing_subscriber::fmt::MakeWriter;

pub const MASK: &str = "***";

/// JSON keys whose values are always masked in logged payloads.
const SENSITIVE_KEYS: &[&str] = &["token", "access_token", "refresh_token", "password"];

/// Shared list of secret values that must never be written to a log sink.
#[derive(Clone, Default)]
pub struct SecretRegistry {
    secrets: Arc<RwLock<Vec<String>>>,
    emit_add_mask: bool,
}

impl SecretRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also announce each secret to the GitHub Actions runner with `::add-mask::`.
    pub fn with_workflow_masking(mut self, enabled: bool) -> Self {
        self.emit_add_mask = enabled;
        self
    }

    /// Register `secret` together with the forms it takes once a formatter
    /// has escaped it (workflow command data, JSON strings), since the
    /// writer only sees formatted output.
    pub fn register(&self, secret: &str) {
        let secret = secret.trim();
        if secret.is_empty() {
            return;
        }
        let mut secrets = match self.secrets.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if secrets.iter().any(|s| s == secret) {
            return;
        }
        if self.emit_add_mask {
            // Goes straight to stdout: the runner must see it unredacted.
            println!("::add-mask::{secret}");
        }
        for form in escaped_forms(secret) {
            if !secrets.contains(&form) {
                secrets.push(form);
            }
        }
        // Longest first so a secret containing another is replaced whole.
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    }

    pub fn redact(&self, text: &str) -> String {
        let secrets = match self.secrets.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
    }

    /// Number of stored forms, escaped variants included.
    pub fn len(&self) -> usize {
        self.secrets.read().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SecretRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRegistry")
            .field("secrets", &self.len())
            .field("emit_add_mask", &self.emit_add_mask)
            .finish()
    }
}

fn escaped_forms(secret: &str) -> Vec<String> {
    let mut forms = vec![secret.to_string(), escape_command_data(secret)];
    if let Ok(quoted) = serde_json::to_string(secret) {
        forms.push(quoted.trim_matches('"').to_string());
    }
    forms.dedup();
    forms
}

/// Return a copy of `value` with every sensitive field replaced by [`MASK`], at any depth.
pub fn mask_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let masked = if SENSITIVE_KEYS.contains(&key.to_ascii_lowercase().as_str()) {
                        Value::String(MASK.to_string())
                    } else {
                        mask_json(v)
                    };
                    (key.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask_json).collect()),
        other => other.clone(),
    }
}

/// `MakeWriter` that buffers each formatted event and scrubs registered
/// secrets before handing it to the inner writer.
#[derive(Debug, Clone)]
pub struct RedactingMakeWriter<M> {
    inner: M,
    secrets: SecretRegistry,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M, secrets: SecretRegistry) -> Self {
        Self { inner, secrets }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            secrets: self.secrets.clone(),
            buffer: Vec::new(),
        }
    }
}

pub struct RedactingWriter<W: Write> {
    inner: W,
    secrets: SecretRegistry,
    buffer: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    fn drain(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buffer);
        let redacted = self.secrets.redact(&text);
        self.buffer.clear();
        self.inner.write_all(redacted.as_bytes())?;
        self.inner.flush()
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = SharedBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_mask_json_hides_nested_tokens() {
        let payload = json!({
            "token": "eyJhbGciOi",
            "user": {"name": "ci", "access_token": "abc"},
            "items": [{"password": "pw", "id": 1}]
        });
        let masked = mask_json(&payload);
        assert_eq!(masked["token"], MASK);
        assert_eq!(masked["user"]["access_token"], MASK);
        assert_eq!(masked["user"]["name"], "ci");
        assert_eq!(masked["items"][0]["password"], MASK);
        assert_eq!(masked["items"][0]["id"], 1);
    }

    #[test]
    fn test_registry_redacts_longest_secret_first() {
        let registry = SecretRegistry::new();
        registry.register("abc");
        registry.register("abcdef");
        registry.register("abc");
        registry.register("   ");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.redact("x abcdef y abc"), "x *** y ***");
    }

    #[test]
    fn test_escaped_secret_forms_are_scrubbed() {
        let registry = SecretRegistry::new();
        registry.register("p%40ss\"word");
        let sink = SharedBuffer::default();

        let workflow = tracing_subscriber::fmt()
            .event_format(crate::telemetry::WorkflowCommandFormat)
            .with_writer(RedactingMakeWriter::new(sink.clone(), registry.clone()))
            .finish();
        tracing::subscriber::with_default(workflow, || {
            tracing::warn!("cookie=p%40ss\"word");
        });

        let json = tracing_subscriber::fmt()
            .json()
            .with_writer(RedactingMakeWriter::new(sink.clone(), registry.clone()))
            .finish();
        tracing::subscriber::with_default(json, || {
            tracing::info!("cookie=p%40ss\"word");
        });

        let output = sink.contents();
        assert!(output.contains("::warning::cookie=***"), "{output}");
        assert!(output.contains("cookie=***"), "{output}");
        assert!(!output.contains("p%2540ss"), "{output}");
        assert!(!output.contains("p%40ss"), "{output}");
    }

    #[test]
    fn test_redacting_writer_scrubs_log_events() {
        let registry = SecretRegistry::new();
        registry.register("session-cookie-value");
        let sink = SharedBuffer::default();

        let subscriber = tracing_subscriber::fmt()
            .with_writer(RedactingMakeWriter::new(sink.clone(), registry.clone()))
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Cookie: token=session-cookie-value");
        });

        let output = sink.contents();
        assert!(output.contains("Cookie: token=***"));
        assert!(!output.contains("session-cookie-value"));
    }
}
