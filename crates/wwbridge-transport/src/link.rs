use tokio::io::{AsyncRead, AsyncWrite};

/// Default buffer size of an in-memory link, per direction.
pub const DEFAULT_MEMORY_CAPACITY: usize = 64 * 1024;

/// Read half of a link.
pub type LinkReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a link.
pub type LinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A connected byte link to the other side of the bridge.
///
/// Bytes written here arrive, in order, on the peer's read half. The link
/// knows nothing about frames or messages.
pub struct Link {
    kind: &'static str,
    reader: LinkReader,
    writer: LinkWriter,
}

impl Link {
    /// Build a link from arbitrary async halves.
    pub fn new(
        kind: &'static str,
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            kind,
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// The link to the host as seen from inside a worker process.
    ///
    /// The worker reads the host's messages from stdin and answers on stdout,
    /// so nothing else in the worker may write to stdout.
    pub fn stdio() -> Self {
        Self::new("stdio", tokio::io::stdin(), tokio::io::stdout())
    }

    /// Two in-memory links connected to each other.
    pub fn memory_pair() -> (Self, Self) {
        Self::memory_pair_with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    /// Two in-memory links with an explicit per-direction buffer size.
    pub fn memory_pair_with_capacity(capacity: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(capacity);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        (
            Self::new("memory", a_read, a_write),
            Self::new("memory", b_read, b_write),
        )
    }

    /// Transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Split the link into its read and write halves.
    pub fn into_split(self) -> (LinkReader, LinkWriter) {
        (self.reader, self.writer)
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").field("kind", &self.kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn memory_pair_carries_bytes_both_ways() {
        let (a, b) = Link::memory_pair();
        let (mut a_read, mut a_write) = a.into_split();
        let (mut b_read, mut b_write) = b.into_split();

        a_write.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        b_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        b_write.write_all(b"pong").await.unwrap();
        a_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn dropping_writer_ends_peer_stream() {
        let (a, b) = Link::memory_pair();
        let (_a_read, a_write) = a.into_split();
        let (mut b_read, _b_write) = b.into_split();
        drop(a_write);

        let mut buf = Vec::new();
        let n = b_read.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn debug_names_the_kind() {
        let (a, _b) = Link::memory_pair_with_capacity(16);
        assert_eq!(a.kind(), "memory");
        assert_eq!(format!("{a:?}"), "Link { kind: \"memory\" }");
    }
}
