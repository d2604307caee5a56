//! Once-per-process driver version advisory.
//!
//! When enabled on the first connection build, fetches the registry's
//! metadata for this package and prints a single advisory line if a newer
//! release exists. Every failure is swallowed; the check never touches the
//! request path.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const REGISTRY_URL: &str = "https://crates.io/api/v1/crates/fauna-client";
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

static CHECK_STARTED: AtomicBool = AtomicBool::new(false);

/// Run the advisory check at most once per process.
///
/// A no-op outside a tokio runtime; the check is best-effort by design.
pub(crate) fn check_latest_once() {
    if CHECK_STARTED.swap(true, Ordering::AcqRel) {
        return;
    }

    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async {
            if let Some(advisory) = fetch_advisory().await {
                println!("{}", advisory);
            }
        });
    }
}

async fn fetch_advisory() -> Option<String> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("fauna-rust/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(10))
        .build()
        .ok()?;

    let metadata: Value = client
        .get(REGISTRY_URL)
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()?;

    let latest = metadata.get("crate")?.get("max_version")?.as_str()?;
    advisory_line(CURRENT_VERSION, latest)
}

fn advisory_line(current: &str, latest: &str) -> Option<String> {
    if current == latest {
        return None;
    }
    Some(format!(
        "fauna: a newer driver version {} is available (this build is {})",
        latest, current
    ))
}
