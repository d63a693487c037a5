use tracing::{Event, Subscriber};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str =
    "warn,wheel_ledger=info,wheel_ledger::services=info,wheel_ledger::handlers=info";

#[derive(Default)]
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }
}

/// One line per event: timestamp, level marker, target, message.
struct ConsoleLayer;

fn format_line(level: &tracing::Level, target: &str, message: &str, timestamp: &str) -> Option<String> {
    let line = match level.as_str() {
        "ERROR" => format!("[{}] ❌ Error: {} - {}", timestamp, target, message),
        "WARN" => format!("[{}] ⚠️ Warning: {} - {}", timestamp, target, message),
        "INFO" => format!("[{}] ℹ️ {} - {}", timestamp, target, message),
        "DEBUG" => format!("[{}] 🔄 {} - {}", timestamp, target, message),
        _ => return None,
    };
    Some(line)
}

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        if metadata.target().starts_with("sqlx") {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if visitor.0.is_empty() {
            return;
        }

        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        if let Some(line) = format_line(metadata.level(), metadata.target(), &visitor.0, &timestamp) {
            println!("{}", line);
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn setup() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = Registry::default().with(env_filter).with(ConsoleLayer);
    tracing::subscriber::set_global_default(subscriber)
}
