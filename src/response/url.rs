//! URL generation for generated images and job archives

use std::path::Path;

/// Builds links to server-side assets
#[derive(Debug, Clone)]
pub struct AssetUrls {
    static_prefix: String,
    api_prefix: String,
}

impl AssetUrls {
    /// Create from the static asset root and the API root
    pub fn new(static_prefix: impl Into<String>, api_prefix: impl Into<String>) -> Self {
        // Ensure prefixes don't end with slash
        let static_prefix = static_prefix.into().trim_end_matches('/').to_string();
        let api_prefix = api_prefix.into().trim_end_matches('/').to_string();
        Self {
            static_prefix,
            api_prefix,
        }
    }

    /// URL of a generated image, keyed on the server-assigned filename
    pub fn image_url(&self, filename: &str) -> String {
        // Only the final path component is meaningful to the server
        let filename = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);

        format!("{}/{}", self.static_prefix, filename)
    }

    /// URL of the ZIP archive holding every completed image of a job
    pub fn download_all_url(&self, job_id: &str) -> String {
        format!("{}/download-all/{}", self.api_prefix, job_id)
    }
}
