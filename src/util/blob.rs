use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures_core::Stream;

/// A downloaded file's data as a stream, together with the checksums the server announced for it
pub struct Blob {
    pub data: Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send + 'static>>,
    pub md5: Option<[u8;16]>,
    pub sha1: Option<[u8;20]>,
}
impl Blob {
    /// Drains the stream into memory. Verification failures surface as an error here because
    ///  the validating stream reports them as its last chunk.
    pub async fn collect(mut self) -> anyhow::Result<Bytes> {
        let mut result = BytesMut::new();
        while let Some(chunk) = self.data.next().await {
            result.extend_from_slice(&chunk?);
        }
        Ok(result.freeze())
    }
}
