use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::anyhow;
use bytes::Bytes;
use futures_core::{ready, Stream};
use hyper::Body;
use pin_project_lite::pin_project;
use sha1::{Digest, Sha1};
use sha1::digest::consts::U20;
use sha1::digest::generic_array::GenericArray;
use tracing::trace;

/// This struct wraps an HTTP body, allowing it to be consumed asynchronously without materializing
///  it but at the same time performing verification that requires knowledge of the entire body's
///  data (e.g. SHA1 checksum check).
///
/// The actual contract is to append an (empty) chunk of data to the stream with an error if the
///  verification fails. Once a stream chunk with an error was returned, this stream will stop
///  polling from upstream and always return an error
pin_project! {
    pub struct ValidatingHttpBody {
        #[pin]
        http_body: Body,
        verifier: Box<dyn StreamVerifier>,
        is_failed: bool,
    }
}
impl ValidatingHttpBody {
    pub fn new(http_body: Body, verifier: impl StreamVerifier + 'static) -> ValidatingHttpBody {
        ValidatingHttpBody {
            http_body,
            verifier: Box::new(verifier),
            is_failed: false,
        }
    }
}

impl Stream for ValidatingHttpBody {
    type Item = anyhow::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_failed {
            return Poll::Ready(Some(Err(anyhow!("polling from failed stream"))));
        }

        let this = self.project();
        let inner = ready!(this.http_body.poll_next(cx));
        match inner {
            Some(Ok(data)) => {
                // available data from the wrapped HTTP body -> pass this on
                this.verifier.add_data(&data);
                Poll::Ready(Some(Ok(data)))
            }
            None => {
                // wrapped HTTP body is fully drained -> finalize verification
                match this.verifier.verify() {
                    Ok(()) => Poll::Ready(None),
                    Err(e) => {
                        *this.is_failed = true;
                        Poll::Ready(Some(Err(e)))
                    }
                }
            }
            Some(Err(e)) => {
                *this.is_failed = true;
                Poll::Ready(Some(Err(e.into())))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.http_body.size_hint()
    }
}

/// Sees a file's data chunk by chunk and decides at the end whether it is acceptable
pub trait StreamVerifier: Send {
    fn add_data(&mut self, data: &Bytes);
    fn verify(&self) -> anyhow::Result<()>;
}

/// Creates additional verifiers for downloads, e.g. for signature checks. Returning `None`
///  means the file at `path` needs no extra verification.
pub trait StreamVerifierFactory: Send + Sync {
    fn create(&self, path: &str) -> Option<Box<dyn StreamVerifier>>;
}

/// all verifiers see all data, and all of them have to accept it
impl StreamVerifier for Vec<Box<dyn StreamVerifier>> {
    fn add_data(&mut self, data: &Bytes) {
        for v in self.iter_mut() {
            v.add_data(data);
        }
    }

    fn verify(&self) -> anyhow::Result<()> {
        for v in self.iter() {
            v.verify()?;
        }
        Ok(())
    }
}

pub struct NopStreamVerifier {
}
impl StreamVerifier for NopStreamVerifier {
    fn add_data(&mut self, _data: &Bytes) {
        // ignore all data
    }

    fn verify(&self) -> anyhow::Result<()> {
        // ... and always acknowledge data as valid
        Ok(())
    }
}

pub struct Sha1StreamVerifier {
    hasher: Sha1,
    expected_hash: GenericArray<u8, U20>,
}
impl Sha1StreamVerifier {
    pub fn new(expected_hash: [u8; 20]) -> Sha1StreamVerifier {
        Sha1StreamVerifier {
            hasher: Default::default(),
            expected_hash: expected_hash.into(),
        }
    }
}
impl StreamVerifier for Sha1StreamVerifier {
    fn add_data(&mut self, data: &Bytes) {
        self.hasher.update(data);
    }

    fn verify(&self) -> anyhow::Result<()> {
        let hash = self.hasher.clone().finalize();
        trace!("verifying SHA1 hash");
        if hash == self.expected_hash {
            Ok(())
        }
        else {
            Err(anyhow!("SHA1 mismatch: expected {}, was {}", hex::encode(self.expected_hash), hex::encode(hash)))
        }
    }
}

pub struct Md5StreamVerifier {
    context: md5::Context,
    expected_hash: [u8; 16],
}
impl Md5StreamVerifier {
    pub fn new(expected_hash: [u8; 16]) -> Md5StreamVerifier {
        Md5StreamVerifier {
            context: md5::Context::new(),
            expected_hash,
        }
    }
}
impl StreamVerifier for Md5StreamVerifier {
    fn add_data(&mut self, data: &Bytes) {
        self.context.consume(data);
    }

    fn verify(&self) -> anyhow::Result<()> {
        let hash: [u8;16] = self.context.clone()
            .compute()
            .into();
        trace!("verifying MD5 hash");
        if hash == self.expected_hash {
            Ok(())
        }
        else {
            Err(anyhow!("MD5 mismatch: expected {}, was {}", hex::encode(self.expected_hash), hex::encode(hash)))
        }
    }
}

pub fn sha1_of(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}
