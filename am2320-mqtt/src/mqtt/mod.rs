use std::collections::VecDeque;
use std::time::Duration;

use mqttrs::{Pid, QoS};
use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::DaemonError;
use crate::publisher::{Publication, PublicationQueue};

pub mod packets;
pub mod read_loop;

use packets::{
    build_connect_packet, build_disconnect_packet, build_pingreq_packet, build_publish_packet,
    parse_connack,
};
use read_loop::read_loop;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const CONNACK_TIMEOUT: Duration = Duration::from_secs(5);
/// Half the keep-alive announced in CONNECT.
const PING_INTERVAL: Duration = Duration::from_secs(packets::KEEP_ALIVE_SECS as u64 / 2);

enum SessionEnd {
    Shutdown,
    Lost,
}

/// Drains the publication queue into a broker connection, reconnecting as needed.
///
/// QoS 1 publications stay in flight until the broker acknowledges them and
/// are sent again, flagged as duplicates, on the next connection.
pub struct MqttClient {
    broker_addr: String,
    client_id: String,
    outgoing: PublicationQueue,
    cancel: CancellationToken,
    reconnect_delay: Duration,
    next_pid: Pid,
    /// Unacknowledged QoS 1 publications, oldest first, at most one per topic.
    in_flight: VecDeque<(Pid, Publication)>,
}

impl MqttClient {
    pub fn new(
        broker_addr: String,
        client_id: String,
        outgoing: PublicationQueue,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            broker_addr,
            client_id,
            outgoing,
            cancel,
            reconnect_delay: RECONNECT_DELAY,
            next_pid: Pid::new(),
            in_flight: VecDeque::new(),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Runs until the token is cancelled or the publisher is dropped.
    pub fn run_forever(self) -> JoinHandle<()> {
        tokio::spawn(self.connection_loop())
    }

    async fn connection_loop(mut self) {
        loop {
            match self.connect().await {
                Ok(stream) => match self.session(stream).await {
                    Ok(SessionEnd::Shutdown) => {
                        info!("MQTT client stopped");
                        return;
                    }
                    Ok(SessionEnd::Lost) => {
                        warn!(
                            broker = %self.broker_addr,
                            unacknowledged = self.in_flight.len(),
                            "Connection to broker lost"
                        );
                    }
                    Err(e) => error!(error = %e, "MQTT session failed"),
                },
                Err(e) => {
                    warn!(broker = %self.broker_addr, error = %e, "Failed to connect to broker");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {},
                _ = self.cancel.cancelled() => {
                    info!("Shutdown during reconnect delay");
                    return;
                }
            }
        }
    }

    async fn connect(&self) -> Result<TcpStream, DaemonError> {
        let mut stream = TcpStream::connect(self.broker_addr.as_str()).await?;
        debug!(broker = %self.broker_addr, "TCP connected, sending CONNECT");

        stream
            .write_all(&build_connect_packet(&self.client_id)?)
            .await?;

        let mut connack = [0u8; 4];
        tokio::time::timeout(CONNACK_TIMEOUT, stream.read_exact(&mut connack))
            .await
            .map_err(|_| DaemonError::Timeout)??;
        parse_connack(&connack)?;

        info!(broker = %self.broker_addr, client_id = %self.client_id, "Connection ACKed");
        Ok(stream)
    }

    async fn session(&mut self, stream: TcpStream) -> Result<SessionEnd, DaemonError> {
        let (reader, mut writer) = tokio::io::split(stream);
        let (ack_tx, mut acks) = mpsc::unbounded_channel();
        let mut read_task = tokio::spawn(read_loop(reader, ack_tx));
        let result = self.pump(&mut writer, &mut read_task, &mut acks).await;
        read_task.abort();
        // PUBACKs read just before the connection dropped.
        while let Ok(pid) = acks.try_recv() {
            self.acknowledge(pid);
        }
        result
    }

    async fn pump(
        &mut self,
        writer: &mut WriteHalf<TcpStream>,
        read_task: &mut JoinHandle<std::io::Result<()>>,
        acks: &mut mpsc::UnboundedReceiver<Pid>,
    ) -> Result<SessionEnd, DaemonError> {
        self.redeliver(writer).await?;

        let mut keep_alive =
            tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    writer.write_all(&build_disconnect_packet()?).await?;
                    writer.flush().await?;
                    return Ok(SessionEnd::Shutdown);
                }
                publication = self.outgoing.recv() => {
                    let Some(publication) = publication else {
                        writer.write_all(&build_disconnect_packet()?).await?;
                        return Ok(SessionEnd::Shutdown);
                    };
                    self.send(writer, publication).await?;
                }
                Some(pid) = acks.recv() => self.acknowledge(pid),
                _ = keep_alive.tick() => {
                    writer.write_all(&build_pingreq_packet()?).await?;
                    trace!("PINGREQ sent");
                }
                read = &mut *read_task => {
                    if let Ok(Err(e)) = read {
                        warn!(error = %e, "Reading from broker failed");
                    }
                    return Ok(SessionEnd::Lost);
                }
            }
        }
    }

    async fn send(
        &mut self,
        writer: &mut WriteHalf<TcpStream>,
        publication: Publication,
    ) -> Result<(), DaemonError> {
        let pid = self.next_pid;
        let packet = match build_publish_packet(&publication, pid, false) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(topic = %publication.topic, error = %e, "Dropping unencodable publication");
                return Ok(());
            }
        };
        self.next_pid = pid + 1;
        debug!(
            pid = pid.get(),
            topic = %publication.topic,
            payload = %publication.payload,
            "Publishing"
        );
        if matches!(publication.options.qos, QoS::AtLeastOnce) {
            self.track(pid, publication);
        }
        writer.write_all(&packet).await?;
        Ok(())
    }

    /// Keeps `publication` until acknowledged, replacing any older one on the same topic.
    fn track(&mut self, pid: Pid, publication: Publication) {
        self.in_flight.retain(|(_, older)| older.topic != publication.topic);
        self.in_flight.push_back((pid, publication));
    }

    fn acknowledge(&mut self, pid: Pid) {
        match self.in_flight.iter().position(|(sent, _)| *sent == pid) {
            Some(index) => {
                self.in_flight.remove(index);
                trace!(pid = pid.get(), "Publication acknowledged");
            }
            None => debug!(pid = pid.get(), "PUBACK for a packet no longer in flight"),
        }
    }

    async fn redeliver(&self, writer: &mut WriteHalf<TcpStream>) -> Result<(), DaemonError> {
        for (pid, publication) in &self.in_flight {
            writer
                .write_all(&build_publish_packet(publication, *pid, true)?)
                .await?;
            debug!(
                pid = pid.get(),
                topic = %publication.topic,
                "Redelivered unacknowledged publication"
            );
        }
        Ok(())
    }
}
