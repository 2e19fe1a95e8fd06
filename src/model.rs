use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::error::{ConsoleError, Result};
use crate::session::{ModelKind, Session};

/// Makes `target` the active backend model.
///
/// Returns `Ok(false)` without any request when it already is. On failure the
/// session keeps its previous model and the caller must not go on to generate.
pub async fn ensure_model(api: &ApiClient, session: &mut Session, target: ModelKind) -> Result<bool> {
    if session.active_model() == Some(target) {
        debug!(model = %target, "Model already active");
        return Ok(false);
    }

    info!(from = ?session.active_model(), to = %target, "Switching backend model");
    let response = api
        .switch_model(target)
        .await
        .map_err(|err| ConsoleError::Switch(err.message()))?;
    if !response.success {
        return Err(ConsoleError::Switch("Model switch rejected".to_string()));
    }

    let status = match response.status {
        Some(status) => Some(status),
        None => match api.status().await {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(error = %err, "Switched model but could not refresh status");
                None
            }
        },
    };
    session.commit_model(target, status);
    Ok(true)
}
