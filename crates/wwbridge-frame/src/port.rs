use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use wwbridge_transport::Link;

use crate::codec::{FrameConfig, WireCodec};
use crate::error::{FrameError, Result};
use crate::message::WireMessage;

#[derive(Debug, Clone)]
enum Outbound {
    Memory(mpsc::UnboundedSender<WireMessage>),
    Framed {
        tx: mpsc::UnboundedSender<Bytes>,
        codec: WireCodec,
    },
}

/// Cloneable, non-blocking send half of a [`MessagePort`].
#[derive(Debug, Clone)]
pub struct PortSender {
    outbound: Outbound,
}

impl PortSender {
    /// Queue a message for the other side.
    ///
    /// Never waits on the transport. On a framed port the message is encoded
    /// here, so an oversized message fails with
    /// [`FrameError::PayloadTooLarge`] and leaves the port usable. Fails with
    /// [`FrameError::ConnectionClosed`] once the port is closed.
    pub fn send(&self, message: WireMessage) -> Result<()> {
        match &self.outbound {
            Outbound::Memory(tx) => tx.send(message).map_err(|_| FrameError::ConnectionClosed),
            Outbound::Framed { tx, codec } => {
                let frame = codec.frame(&message)?;
                trace!(op = %message.op(), id = message.id(), len = frame.len(), "frame out");
                tx.send(frame).map_err(|_| FrameError::ConnectionClosed)
            }
        }
    }

    /// Returns true once the other side can no longer receive.
    pub fn is_closed(&self) -> bool {
        match &self.outbound {
            Outbound::Memory(tx) => tx.is_closed(),
            Outbound::Framed { tx, .. } => tx.is_closed(),
        }
    }
}

/// One side's ordered view of the message channel.
///
/// Messages sent here arrive on the peer port in send order. The inbound
/// queue yields `None` once the peer is gone.
#[derive(Debug)]
pub struct MessagePort {
    sender: PortSender,
    inbound: mpsc::UnboundedReceiver<WireMessage>,
}

impl MessagePort {
    /// Two ports wired to each other in memory.
    ///
    /// Messages move by value and skip framing entirely.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: PortSender {
                    outbound: Outbound::Memory(a_tx),
                },
                inbound: a_rx,
            },
            Self {
                sender: PortSender {
                    outbound: Outbound::Memory(b_tx),
                },
                inbound: b_rx,
            },
        )
    }

    /// Drive a byte link with the default frame configuration.
    ///
    /// Must be called within a Tokio runtime.
    pub fn from_link(link: Link) -> Self {
        Self::from_link_with_config(link, FrameConfig::default())
    }

    /// Drive a byte link: one task decodes inbound frames, one task writes
    /// outbound frames encoded by [`PortSender::send`].
    ///
    /// A malformed inbound frame ends the inbound queue; the peer broke the
    /// protocol and nothing after it can be trusted. A failed write ends it
    /// too.
    pub fn from_link_with_config(link: Link, config: FrameConfig) -> Self {
        let kind = link.kind();
        let (reader, writer) = link.into_split();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Bytes>();
        let broken = CancellationToken::new();

        let mut frames = FramedRead::new(reader, WireCodec::new(config.clone()));
        let write_failed = broken.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = write_failed.cancelled() => break,
                    next = frames.next() => next,
                };
                match next {
                    Some(Ok(message)) => {
                        trace!(link = kind, op = %message.op(), id = message.id(), "frame in");
                        if in_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(link = kind, error = %err, "dropping link after bad inbound frame");
                        break;
                    }
                    None => break,
                }
            }
            debug!(link = kind, "inbound link closed");
        });

        let mut sink = FramedWrite::new(writer, BytesCodec::new());
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(err) = sink.send(frame).await {
                    warn!(link = kind, error = %err, "outbound link failed");
                    broken.cancel();
                    return;
                }
            }
            if let Err(err) = SinkExt::<Bytes>::close(&mut sink).await {
                debug!(link = kind, error = %err, "closing outbound link failed");
            }
        });

        Self {
            sender: PortSender {
                outbound: Outbound::Framed {
                    tx: out_tx,
                    codec: WireCodec::new(config),
                },
            },
            inbound: in_rx,
        }
    }

    /// Queue a message for the other side.
    pub fn send(&self, message: WireMessage) -> Result<()> {
        self.sender.send(message)
    }

    /// Wait for the next inbound message.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.inbound.recv().await
    }

    /// A cloneable handle to the send half.
    pub fn sender(&self) -> PortSender {
        self.sender.clone()
    }

    /// Split into the send handle and the inbound queue.
    pub fn into_parts(self) -> (PortSender, mpsc::UnboundedReceiver<WireMessage>) {
        (self.sender, self.inbound)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::record::ErrorRecord;

    fn call(id: u64) -> WireMessage {
        WireMessage::Call {
            name: "f".to_string(),
            id,
            args: vec![json!(id)],
        }
    }

    #[tokio::test]
    async fn memory_pair_is_fifo() {
        let (a, mut b) = MessagePort::pair();
        for id in [3, 5, 7] {
            a.send(call(id)).unwrap();
        }
        for id in [3, 5, 7] {
            assert_eq!(b.recv().await.unwrap().id(), id);
        }
    }

    #[tokio::test]
    async fn framed_link_carries_messages_both_ways() {
        let (left, right) = Link::memory_pair();
        let mut host = MessagePort::from_link(left);
        let mut worker = MessagePort::from_link(right);

        host.send(call(3)).unwrap();
        let received = worker.recv().await.unwrap();
        assert_eq!(received, call(3));

        let reply = WireMessage::Error {
            name: "f".to_string(),
            id: 3,
            error: ErrorRecord {
                name: "Error".to_string(),
                message: "nope".to_string(),
                file_name: None,
                line_number: None,
                column_number: None,
                stack: None,
            },
        };
        worker.send(reply.clone()).unwrap();
        assert_eq!(host.recv().await.unwrap(), reply);
    }

    #[tokio::test]
    async fn dropping_peer_ends_inbound() {
        let (left, right) = Link::memory_pair();
        let mut host = MessagePort::from_link(left);
        let worker = MessagePort::from_link(right);
        drop(worker);
        assert!(host.recv().await.is_none());
    }

    #[tokio::test]
    async fn oversized_send_fails_without_closing_port() {
        let (left, right) = Link::memory_pair();
        let host = MessagePort::from_link_with_config(
            left,
            FrameConfig {
                max_payload_size: 64,
            },
        );
        let mut worker = MessagePort::from_link(right);

        let big = WireMessage::Return {
            name: "f".to_string(),
            id: 3,
            result: json!("x".repeat(128)),
        };
        assert!(matches!(
            host.send(big),
            Err(FrameError::PayloadTooLarge { max: 64, .. })
        ));
        assert!(!host.sender().is_closed());

        host.send(call(5)).unwrap();
        assert_eq!(worker.recv().await.unwrap(), call(5));
    }

    #[tokio::test]
    async fn failed_write_ends_inbound() {
        let (reader, _reader_peer) = tokio::io::duplex(64);
        let (writer, writer_peer) = tokio::io::duplex(64);
        drop(writer_peer);
        let mut port = MessagePort::from_link(Link::new("test", reader, writer));

        port.send(call(3)).unwrap();
        let ended = tokio::time::timeout(Duration::from_secs(5), port.recv())
            .await
            .expect("inbound should end after the write fails");
        assert!(ended.is_none());
    }

    #[tokio::test]
    async fn send_after_peer_gone_fails() {
        let (a, b) = MessagePort::pair();
        drop(b);
        assert!(matches!(a.send(call(1)), Err(FrameError::ConnectionClosed)));
        assert!(a.sender().is_closed());
    }
}
