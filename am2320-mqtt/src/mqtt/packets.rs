use mqttrs::{
    Connack, Connect, ConnectReturnCode, Packet, Pid, Protocol, Publish, QoS, QosPid,
    decode_slice, encode_slice,
};

use crate::error::DaemonError;
use crate::publisher::Publication;

pub const KEEP_ALIVE_SECS: u16 = 120;

pub fn build_connect_packet(client_id: &str) -> Result<Vec<u8>, DaemonError> {
    let packet: Packet = Connect {
        protocol: Protocol::MQTT311,
        keep_alive: KEEP_ALIVE_SECS,
        client_id,
        clean_session: true,
        last_will: None,
        username: None,
        password: None,
    }
    .into();
    encode(&packet, 64 + client_id.len())
}

pub fn parse_connack(buf: &[u8]) -> Result<(), DaemonError> {
    match decode_slice(buf)? {
        Some(Packet::Connack(Connack {
            code: ConnectReturnCode::Accepted,
            ..
        })) => Ok(()),
        Some(Packet::Connack(Connack { code, .. })) => Err(DaemonError::Protocol(format!(
            "connection refused: {code:?}"
        ))),
        _ => Err(DaemonError::Protocol(format!(
            "expected CONNACK, got {buf:x?}"
        ))),
    }
}

/// Encodes a PUBLISH. `pid` is only put on the wire for QoS 1; `dup` marks a
/// redelivery of a packet that was never acknowledged.
pub fn build_publish_packet(
    publication: &Publication,
    pid: Pid,
    dup: bool,
) -> Result<Vec<u8>, DaemonError> {
    let qospid = match publication.options.qos {
        QoS::AtMostOnce => QosPid::AtMostOnce,
        QoS::AtLeastOnce => QosPid::AtLeastOnce(pid),
        // Would need PUBREC/PUBREL bookkeeping.
        QoS::ExactlyOnce => {
            return Err(DaemonError::Protocol(
                "QoS 2 publishing is not supported".to_string(),
            ));
        }
    };
    let packet: Packet = Publish {
        dup,
        qospid,
        retain: publication.options.retain,
        topic_name: &publication.topic,
        payload: publication.payload.as_bytes(),
    }
    .into();
    // fixed header (<= 5) + topic length (2) + pid (2)
    encode(&packet, publication.topic.len() + publication.payload.len() + 9)
}

pub fn build_pingreq_packet() -> Result<Vec<u8>, DaemonError> {
    encode(&Packet::Pingreq, 2)
}

pub fn build_disconnect_packet() -> Result<Vec<u8>, DaemonError> {
    encode(&Packet::Disconnect, 2)
}

fn encode(packet: &Packet, capacity: usize) -> Result<Vec<u8>, DaemonError> {
    let mut buf = vec![0u8; capacity];
    let packet_length = encode_slice(packet, &mut buf)?;
    buf.truncate(packet_length);
    Ok(buf)
}
