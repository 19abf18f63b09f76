use crate::error::{AppError, Result};

/// Validates the item name of an upload, which becomes the blob key.
pub fn validate_item_name(item_name: &str) -> Result<()> {
    if item_name.is_empty() {
        return Err(AppError::Validation("Item name cannot be empty".to_string()));
    }

    Ok(())
}

/// Builds the download filename from the item name and the uploaded file's name.
///
/// `report` + `q3.pdf` gives `report.pdf`; an uploaded name with no extension
/// leaves the item name as is.
pub fn download_file_name(item_name: &str, uploaded_name: &str) -> String {
    match std::path::Path::new(uploaded_name)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) => format!("{}.{}", item_name, ext),
        None => item_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_item_name() {
        assert!(validate_item_name("").is_err());
        assert!(validate_item_name("report").is_ok());
    }

    #[test]
    fn takes_last_extension_of_uploaded_name() {
        assert_eq!(download_file_name("report", "q3.pdf"), "report.pdf");
        assert_eq!(download_file_name("backup", "site.tar.gz"), "backup.gz");
        assert_eq!(download_file_name("notes", "README"), "notes");
    }
}
