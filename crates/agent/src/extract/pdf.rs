use super::{ExtractError, Section};

/// One section per form-feed separated page.
pub(super) fn extract(bytes: &[u8]) -> Result<Vec<Section>, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(text
        .split('\u{c}')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| Section::new(Some((i + 1).to_string()), page.trim()))
        .collect())
}
