// Path: crates/telemetry/tests/init_smoke.rs

use anyhow::Result;
use forge_telemetry::{init_tracing, init_tracing_with_filter};

// The global subscriber can be set once per process, so every step lives in
// one test.
#[test]
fn subscriber_installs_once() -> Result<()> {
    assert!(init_tracing_with_filter("forge_vault=loudest").is_err());

    init_tracing_with_filter("forge_vault=debug,info")?;
    tracing::info!(target: "forge_vault", records = 3, "telemetry smoke event");
    assert!(tracing::enabled!(target: "forge_vault", tracing::Level::DEBUG));
    assert!(!tracing::enabled!(target: "other", tracing::Level::DEBUG));

    assert!(init_tracing().is_err());
    Ok(())
}
