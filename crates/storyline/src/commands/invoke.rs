//! Named command invocation.

use serde_json::Value;
use std::sync::Arc;
use storyline_core::{CommandError, CommandRouter, Library, COMMANDS};
use storyline_storage::JsonStorage;

/// Run one named command and print its JSON result.
///
/// Failures are printed as `{"kind", "message"}` on stdout and returned so
/// the process exits non-zero.
pub async fn invoke_command(
    library: Library<JsonStorage>,
    name: &str,
    payload: Option<&str>,
) -> anyhow::Result<()> {
    let router = CommandRouter::new(Arc::new(library));

    let result = match parse_payload(payload) {
        Ok(payload) => router.invoke(name, payload).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e)?);
            anyhow::bail!("{name} failed: {e}")
        }
    }
}

fn parse_payload(payload: Option<&str>) -> Result<Value, CommandError> {
    match payload {
        None => Ok(Value::Object(Default::default())),
        Some(raw) => {
            serde_json::from_str(raw).map_err(|e| CommandError::InvalidPayload(e.to_string()))
        }
    }
}

/// Print every command name, one per line.
pub fn list_commands() {
    for name in COMMANDS {
        println!("{name}");
    }
}
