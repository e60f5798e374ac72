//! Remote Byte-Range Streams
//!
//! The cache never talks to the network itself. It asks a
//! [`RemoteStreamFactory`] for a stream starting at some offset and writes
//! whatever arrives into the local cache file.
//!
//! ```ignore
//! use bridge_traits::stream::RemoteStreamFactory;
//!
//! async fn remote_length(factory: &dyn RemoteStreamFactory) -> Option<u64> {
//!     let stream = factory.open(0, None).await.ok()?;
//!     stream.total_length
//! }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use core_async::BoxStream;

use crate::error::Result;

/// Body of a remote stream: chunks of bytes in file order.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// An open stream over a remote file, starting at the requested offset.
pub struct RemoteStream {
    /// Total length of the remote file, if the source reported it.
    pub total_length: Option<u64>,
    /// The bytes from the requested start offset onwards.
    pub data: ByteStream,
}

impl RemoteStream {
    pub fn new(total_length: Option<u64>, data: ByteStream) -> Self {
        Self { total_length, data }
    }
}

impl std::fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream")
            .field("total_length", &self.total_length)
            .field("data", &"ByteStream { ... }")
            .finish()
    }
}

/// Opens byte-range streams over one remote file.
///
/// Implementations decide how the range request is made (HTTP `Range`
/// header, SDK call, ...). `end` is inclusive; `None` means "to the end".
#[async_trait]
pub trait RemoteStreamFactory: Send + Sync {
    async fn open(&self, start: u64, end: Option<u64>) -> Result<RemoteStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};

    struct FixedFactory {
        content: Bytes,
    }

    #[async_trait]
    impl RemoteStreamFactory for FixedFactory {
        async fn open(&self, start: u64, end: Option<u64>) -> Result<RemoteStream> {
            let len = self.content.len() as u64;
            let last = end.unwrap_or(len - 1).min(len - 1);
            let body = self.content.slice(start as usize..=last as usize);
            Ok(RemoteStream::new(
                Some(len),
                stream::iter(vec![Ok(body)]).boxed(),
            ))
        }
    }

    #[tokio::test]
    async fn test_factory_serves_requested_range() {
        let factory = FixedFactory {
            content: Bytes::from_static(b"0123456789"),
        };

        let mut remote = factory.open(4, Some(6)).await.unwrap();
        assert_eq!(remote.total_length, Some(10));

        let chunk = remote.data.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"456");
        assert!(remote.data.next().await.is_none());
    }
}
