use chromiumoxide::Page;
use std::collections::BTreeMap;
use std::error::Error;
use std::future::Future;
use std::time::Duration;

/// Bound on a single evaluation so a blocking dialog cannot hang the run.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

const READ_STORAGE_JS: &str = r#"(() => {
    const out = {};
    for (let i = 0; i < localStorage.length; i++) {
        const key = localStorage.key(i);
        out[key] = localStorage.getItem(key);
    }
    return out;
})()"#;

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Retry an async operation that may fail while the page is navigating.
/// Returns immediately on success or non-context errors.
async fn retry_on_context_error<T, E, F, Fut>(
    operation_name: &str,
    mut operation: F,
) -> Result<T, Box<dyn Error + Send + Sync>>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err_str = e.to_string();
                if is_context_error(&err_str) {
                    tracing::debug!(
                        "{} context error (attempt {}/{}), retrying...",
                        operation_name,
                        attempt + 1,
                        MAX_CONTEXT_RETRIES
                    );
                    last_error = Some(err_str);
                    tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                    continue;
                }
                return Err(err_str.into());
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| format!("{} failed after retries", operation_name))
        .into())
}

async fn evaluate_json(page: &Page, expression: &str) -> Result<serde_json::Value, String> {
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err("evaluation timed out, possibly blocked by a dialog".to_string()),
        Ok(Err(e)) => Err(e.to_string()),
        Ok(Ok(result)) => result
            .into_value::<serde_json::Value>()
            .map_err(|e| format!("Failed to get result: {}", e)),
    }
}

pub async fn read_local_storage(
    page: &Page,
) -> Result<BTreeMap<String, String>, Box<dyn Error + Send + Sync>> {
    let value =
        retry_on_context_error("Read localStorage", || evaluate_json(page, READ_STORAGE_JS))
            .await?;
    Ok(serde_json::from_value(value)?)
}

pub async fn write_local_storage(
    page: &Page,
    entries: &BTreeMap<String, String>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if entries.is_empty() {
        return Ok(());
    }
    let expression = write_storage_script(entries)?;
    let written = retry_on_context_error("Write localStorage", || evaluate_json(page, &expression))
        .await?;
    tracing::debug!("Restored {} localStorage entries", written);
    Ok(())
}

fn write_storage_script(
    entries: &BTreeMap<String, String>,
) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(entries)?;
    Ok(format!(
        "(entries => {{ for (const [k, v] of Object.entries(entries)) {{ localStorage.setItem(k, v); }} return Object.keys(entries).length; }})({})",
        payload
    ))
}
