//! Response helpers - links to generated assets

pub mod url;

pub use url::AssetUrls;
