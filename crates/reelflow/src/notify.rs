//! Outbound notification seam.
//!
//! The engine treats messaging as a fire-and-forget collaborator: a send is
//! attempted once, after the transition has committed, and failures are
//! logged and swallowed. Transport (WhatsApp gateway, SMS, ...) lives
//! behind the [`Notifier`] trait.

use async_trait::async_trait;
use tracing::debug;

use crate::model::SenderCredentials;

/// Transport for outbound worker notifications.
///
/// Implementations send one rendered message to one contact channel.
/// Errors never propagate past the engine — they are logged at `warn` and
/// the transition result is unaffected. Sends are not retried.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// The error type returned by this notifier.
    ///
    /// Must implement `Display` for log output.
    type Error: std::fmt::Display + Send + 'static;

    /// Send `message` to `phone` using the tenant's sender credentials.
    async fn send(
        &self,
        sender: &SenderCredentials,
        phone: &str,
        message: &str,
    ) -> Result<(), Self::Error>;
}

/// Notifier that drops every message, logging at `debug`.
///
/// Useful for deployments without a messaging gateway and for tests that
/// don't assert on notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[derive(Debug)]
pub struct NoopNotifierError;

impl std::fmt::Display for NoopNotifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("noop notifier does not fail")
    }
}

impl std::error::Error for NoopNotifierError {}

#[async_trait]
impl Notifier for NoopNotifier {
    type Error = NoopNotifierError;

    async fn send(
        &self,
        _sender: &SenderCredentials,
        phone: &str,
        message: &str,
    ) -> Result<(), Self::Error> {
        debug!(phone, message, "NoopNotifier dropped a message");
        Ok(())
    }
}

/// Render a tenant's message template.
///
/// Substitutes the two supported placeholders: `{name}` with the worker's
/// name and `{titulo}` with the video title. Unknown placeholders pass
/// through untouched.
pub fn render_template(template: &str, name: &str, title: &str) -> String {
    template.replace("{name}", name).replace("{titulo}", title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct BufferWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl std::io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn substitutes_both_placeholders() {
        let rendered = render_template(
            "Olá {name}, o vídeo {titulo} está pronto para você.",
            "Ana",
            "Episódio 12",
        );
        assert_eq!(rendered, "Olá Ana, o vídeo Episódio 12 está pronto para você.");
    }

    #[test]
    fn repeated_placeholders_are_all_replaced() {
        assert_eq!(render_template("{name} {name}", "Ana", "-"), "Ana Ana");
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        assert_eq!(render_template("{nome} {titulo}", "Ana", "Ep"), "{nome} Ep");
    }

    #[tokio::test]
    async fn noop_notifier_always_succeeds() {
        let sender = SenderCredentials {
            sender_id: "main".into(),
            api_token: "token".into(),
        };
        NoopNotifier
            .send(&sender, "+5511999990000", "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn noop_notifier_logs_dropped_messages() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer_buffer = Arc::clone(&buffer);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || BufferWriter {
                buffer: Arc::clone(&writer_buffer),
            })
            .with_ansi(false)
            .finish();

        let _guard = tracing::subscriber::set_default(subscriber);

        let sender = SenderCredentials {
            sender_id: "main".into(),
            api_token: "token".into(),
        };
        NoopNotifier.send(&sender, "+1555", "hi").await.unwrap();

        let locked = buffer.lock().unwrap();
        let output = String::from_utf8_lossy(&locked);
        assert!(output.contains("NoopNotifier dropped a message"));
    }
}
