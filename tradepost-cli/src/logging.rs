//! Tracing subscriber setup.

use shared::config::{ClientConfig, LogFormat};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays clean; `RUST_LOG` takes precedence over the configured level.
///
/// Returns the configured level.
pub fn initialize_tracing(config: &ClientConfig) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let installed = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(true).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &ClientConfig) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::{
        io::{self, Write},
        sync::{Arc, Mutex},
    };
    use tracing::{Subscriber, info};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferMakeWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    struct BufferWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl<'a> MakeWriter<'a> for BufferMakeWriter {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            BufferWriter {
                buffer: Arc::clone(&self.buffer),
            }
        }
    }

    impl Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn subscriber_with_writer<W>(config: &ClientConfig, writer: W) -> Box<dyn Subscriber + Send + Sync>
    where
        W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    {
        let builder = fmt::fmt()
            .with_env_filter(build_env_filter(config))
            .with_target(false)
            .with_level(true)
            .with_writer(writer);

        if matches!(config.logging.format, LogFormat::Json) {
            Box::new(builder.json().with_ansi(false).finish())
        } else {
            Box::new(builder.with_ansi(false).finish())
        }
    }

    fn capture(config: &ClientConfig) -> String {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber = subscriber_with_writer(
            config,
            BufferMakeWriter {
                buffer: Arc::clone(&buffer),
            },
        );
        let dispatch = tracing::dispatcher::Dispatch::new(subscriber);
        tracing::dispatcher::with_default(&dispatch, || {
            info!(user_id = 7, "conversation selected");
        });
        let contents = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        contents
            .lines()
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn initialize_tracing_returns_configured_level() {
        let mut config = ClientConfig::with_defaults();
        config.logging.level = "debug".into();
        assert_eq!(initialize_tracing(&config), "debug");
    }

    #[test]
    fn json_format_emits_structured_fields() {
        let mut config = ClientConfig::with_defaults();
        config.logging.format = LogFormat::Json;

        let line = capture(&config);
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["fields"]["message"], "conversation selected");
        assert_eq!(value["fields"]["user_id"], 7);
    }

    #[test]
    fn text_format_emits_plain_lines() {
        let config = ClientConfig::with_defaults();

        let line = capture(&config);
        assert!(serde_json::from_str::<Value>(&line).is_err());
        assert!(line.contains("conversation selected"));
        assert!(line.contains("user_id=7"));
    }
}
