use super::LiteratureError;

/// Extracts the text layer of a PDF on the blocking pool.
///
/// Returns `None` when the document has no extractable text.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<Option<String>, LiteratureError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|err| LiteratureError::Pdf(err.to_string()))?
        .map_err(|err| LiteratureError::Pdf(err.to_string()))?;
    Ok(normalize_text(&text))
}

fn normalize_text(text: &str) -> Option<String> {
    let normalized = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
