use std::path::Path;

use tracing::info;

use crate::api::{ApiClient, TranscribeRequest};
use crate::error::{ConsoleError, Result};
use crate::session::{Session, UploadedAsset};
use crate::surface::{BusyGuard, ConsoleSurface};

pub async fn upload<S: ConsoleSurface + ?Sized>(
    api: &ApiClient,
    session: &mut Session,
    surface: &S,
    asset: &Path,
) -> Result<UploadedAsset> {
    let _busy = BusyGuard::show(surface, "Uploading audio...", false);

    let response = api
        .upload_temp(asset)
        .await
        .map_err(|err| ConsoleError::Upload(err.message()))?;
    if !response.success {
        return Err(ConsoleError::Upload("Upload rejected by server".to_string()));
    }
    let (Some(server_filename), Some(server_path)) = (response.filename, response.path) else {
        return Err(ConsoleError::Upload(
            "Server did not return a file location".to_string(),
        ));
    };

    let uploaded = UploadedAsset {
        server_filename,
        server_path,
    };
    info!(file = %asset.display(), server = %uploaded.server_filename, "Uploaded reference audio");
    session.store_upload(uploaded.clone());
    surface.set_reference_text("");
    Ok(uploaded)
}

pub async fn extract_text<S: ConsoleSurface + ?Sized>(
    api: &ApiClient,
    session: &mut Session,
    surface: &S,
) -> Result<Option<String>> {
    let Some(asset) = session.uploaded_asset().cloned() else {
        return Ok(None);
    };
    let (start, end) = match session.selected_region() {
        Some(region) => (region.start(), Some(region.end())),
        None => (0.0, None),
    };

    let _busy = BusyGuard::show(surface, "Transcribing reference audio...", false);
    let request = TranscribeRequest {
        filename: &asset.server_filename,
        start,
        end,
    };
    let result = api.transcribe(&request).await;
    // Transcription takes over the synthesis model's GPU slot.
    if !matches!(result, Err(ConsoleError::Network(_))) {
        session.invalidate_model();
    }
    let response = result?;

    let text = response
        .text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    if let Some(text) = &text {
        session.set_reference_text(text.clone());
        surface.set_reference_text(text);
    }
    Ok(text)
}
