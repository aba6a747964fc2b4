pub mod atomic_fs;
pub mod blob;
pub mod validating_http_body;
pub mod validating_http_downloader;
