use std::io;

use mqttrs::{Packet, Pid, decode_slice};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// The remaining-length field of a fixed header is at most 4 bytes.
const MAX_LENGTH_BYTES: usize = 4;

#[derive(Debug, PartialEq)]
pub enum ReadLoopResult {
    Acknowledged(Pid),
    KeepAlive,
    Skipped,
    Unknown,
}

/// Consumes broker traffic until EOF or a read error, forwarding PUBACK ids
/// to `acks`.
///
/// Input is buffered, so several packets in one read and a packet split
/// across reads are both decoded whole.
pub async fn read_loop<R>(mut reader: R, acks: mpsc::UnboundedSender<Pid>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut pending = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            if !pending.is_empty() {
                debug!(bytes = pending.len(), "EOF inside a packet");
            }
            debug!("EOF from broker");
            return Ok(());
        }
        pending.extend_from_slice(&buf[..n]);

        while let Some(len) = packet_len(&pending)? {
            if let ReadLoopResult::Acknowledged(pid) = handle_packet(&pending[..len]) {
                if acks.send(pid).is_err() {
                    trace!(pid = pid.get(), "Session gone, dropping PUBACK");
                }
            }
            pending.drain(..len);
        }
    }
}

/// Length of the first packet in `buf`, `None` until it is fully buffered.
fn packet_len(buf: &[u8]) -> io::Result<Option<usize>> {
    let mut remaining = 0usize;
    for (i, byte) in buf.iter().skip(1).take(MAX_LENGTH_BYTES).enumerate() {
        remaining |= usize::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            let total = 1 + (i + 1) + remaining;
            return Ok((buf.len() >= total).then_some(total));
        }
    }
    if buf.len() > MAX_LENGTH_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "malformed remaining length",
        ));
    }
    Ok(None)
}

pub fn handle_packet(packet: &[u8]) -> ReadLoopResult {
    match packet.first() {
        Some(first) if is_mqtt_packet(*first) => {}
        _ => {
            warn!(packet = ?packet, "Received non-MQTT data");
            return ReadLoopResult::Unknown;
        }
    }
    match decode_slice(packet) {
        Ok(Some(Packet::Puback(pid))) => {
            trace!(pid = pid.get(), "Publish acknowledged");
            ReadLoopResult::Acknowledged(pid)
        }
        Ok(Some(Packet::Pingresp)) => {
            trace!("PINGRESP");
            ReadLoopResult::KeepAlive
        }
        Ok(Some(other)) => {
            debug!(packet = ?other, "Ignoring packet");
            ReadLoopResult::Skipped
        }
        Ok(None) => ReadLoopResult::Skipped,
        Err(e) => {
            warn!(error = %e, "Failed to decode packet");
            ReadLoopResult::Unknown
        }
    }
}

fn is_mqtt_packet(first_byte: u8) -> bool {
    let packet_type = first_byte >> 4;
    (1..=14).contains(&packet_type)
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[test]
    fn puback_is_acknowledgement() {
        assert_eq!(
            handle_packet(&[0x40, 0x02, 0x00, 0x01]),
            ReadLoopResult::Acknowledged(Pid::new())
        );
    }

    #[test]
    fn pingresp_is_keep_alive() {
        assert_eq!(handle_packet(&[0xD0, 0x00]), ReadLoopResult::KeepAlive);
    }

    #[test]
    fn other_packets_are_skipped() {
        // SUBACK
        assert_eq!(
            handle_packet(&[0x90, 0x03, 0x00, 0x01, 0x00]),
            ReadLoopResult::Skipped
        );
    }

    #[test]
    fn garbage_is_unknown() {
        assert_eq!(handle_packet(&[0x00, 0x00]), ReadLoopResult::Unknown);
        assert_eq!(handle_packet(&[0xF0, 0x00]), ReadLoopResult::Unknown);
        assert_eq!(handle_packet(&[]), ReadLoopResult::Unknown);
    }

    #[test]
    fn packet_len_waits_for_whole_packet() {
        assert_eq!(packet_len(&[]).unwrap(), None);
        assert_eq!(packet_len(&[0x40]).unwrap(), None);
        assert_eq!(packet_len(&[0x40, 0x02, 0x00]).unwrap(), None);
        assert_eq!(packet_len(&[0x40, 0x02, 0x00, 0x01]).unwrap(), Some(4));
        assert_eq!(packet_len(&[0x40, 0x02, 0x00, 0x01, 0xD0]).unwrap(), Some(4));
        assert_eq!(packet_len(&[0xD0, 0x00]).unwrap(), Some(2));
    }

    #[test]
    fn packet_len_reads_multi_byte_length() {
        // 200 = 0xC8 -> [0xC8, 0x01]
        let mut publish = vec![0x30, 0xC8, 0x01];
        assert_eq!(packet_len(&publish).unwrap(), None);
        publish.resize(3 + 200, 0);
        assert_eq!(packet_len(&publish).unwrap(), Some(203));
    }

    #[test]
    fn packet_len_rejects_overlong_length() {
        assert!(packet_len(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }

    #[tokio::test]
    async fn read_loop_ends_on_eof() {
        let (client, mut broker) = tokio::io::duplex(64);
        let (acks, _received) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(client, acks));
        broker.write_all(&[0xD0, 0x00]).await.unwrap();
        drop(broker);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn packets_in_one_read_are_all_handled() {
        let (client, mut broker) = tokio::io::duplex(64);
        let (acks, mut received) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(client, acks));

        // PUBACK 1, PINGRESP, PUBACK 2 in a single write
        broker
            .write_all(&[0x40, 0x02, 0x00, 0x01, 0xD0, 0x00, 0x40, 0x02, 0x00, 0x02])
            .await
            .unwrap();
        drop(broker);
        task.await.unwrap().unwrap();

        assert_eq!(received.recv().await, Some(Pid::new()));
        assert_eq!(received.recv().await, Some(Pid::new() + 1));
        assert_eq!(received.recv().await, None);
    }

    #[tokio::test]
    async fn packet_split_across_reads_is_reassembled() {
        let (client, mut broker) = tokio::io::duplex(64);
        let (acks, mut received) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(client, acks));

        for byte in [0x40, 0x02, 0x00, 0x07] {
            broker.write_all(&[byte]).await.unwrap();
            tokio::task::yield_now().await;
        }
        drop(broker);
        task.await.unwrap().unwrap();

        assert_eq!(received.recv().await, Some(Pid::new() + 6));
        assert_eq!(received.recv().await, None);
    }

    #[tokio::test]
    async fn malformed_length_ends_read_loop() {
        let (client, mut broker) = tokio::io::duplex(64);
        let (acks, _received) = mpsc::unbounded_channel();
        let task = tokio::spawn(read_loop(client, acks));
        broker.write_all(&[0x40, 0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
