//! Outbound WebSocket relay
//!
//! Single client connection to the visualization server. Outbound JSON
//! payloads arrive on an mpsc channel and are written in order; inbound
//! frames carry control messages (`control_azi`, `control_thrust`,
//! `data_mode`, `cbf_domains`). Loss of the socket is unrecoverable and
//! takes the subsystem tree down with it.

use colav_core::domain::DomainTable;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{SharedControls, SubsystemResult};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub address: String,
    /// When false the relay drains and drops payloads instead of connecting
    pub enabled: bool,
}

pub struct Relay {
    config: RelayConfig,
    controls: SharedControls,
    domain_tx: mpsc::Sender<DomainTable>,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        controls: SharedControls,
        domain_tx: mpsc::Sender<DomainTable>,
    ) -> Self {
        Self {
            config,
            controls,
            domain_tx,
        }
    }

    pub async fn run(
        self,
        subsys: SubsystemHandle,
        mut outbound: mpsc::Receiver<String>,
    ) -> SubsystemResult {
        if !self.config.enabled {
            log::info!("Relay disabled; payloads will be dropped");
            loop {
                tokio::select! {
                    _ = subsys.on_shutdown_requested() => return Ok(()),
                    msg = outbound.recv() => {
                        if msg.is_none() {
                            subsys.on_shutdown_requested().await;
                            return Ok(());
                        }
                    }
                }
            }
        }

        let (socket, _) = connect_async(self.config.address.as_str()).await?;
        log::info!("Relay connected to {}", self.config.address);
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                msg = outbound.recv() => match msg {
                    Some(json) => {
                        if let Err(e) = sink.send(Message::text(json)).await {
                            log::error!("Relay send failed: {}", e);
                            return Err(e.into());
                        }
                    }
                    None => break,
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(msg)) => self.handle_incoming(&msg),
                    Some(Err(e)) => {
                        log::error!("Relay receive failed: {}", e);
                        return Err(e.into());
                    }
                    None => {
                        log::error!("Relay socket closed by peer");
                        return Err("relay socket closed by peer".into());
                    }
                },
            }
        }
        Ok(())
    }

    /// Dispatch one inbound frame. Anything that is not a recognized
    /// `datain` control message is ignored.
    fn handle_incoming(&self, msg: &Message) {
        let Ok(text) = msg.to_text() else { return };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
            log::debug!("Relay: non-JSON inbound frame");
            return;
        };
        if value.get("type").and_then(|t| t.as_str()) != Some("datain") {
            return;
        }
        let Some(content) = value.get("content") else { return };
        let Some(message_id) = content.get("message_id").and_then(|m| m.as_str()) else {
            return;
        };
        let val = content.get("val").cloned().unwrap_or(serde_json::Value::Null);

        match message_id {
            "control_azi" => {
                if let (Some(azi), Ok(mut controls)) = (val.as_f64(), self.controls.write()) {
                    controls.azimuth = Some(azi);
                }
            }
            "control_thrust" => {
                if let (Some(revs), Ok(mut controls)) = (val.as_f64(), self.controls.write()) {
                    controls.thrust = Some(revs);
                }
            }
            "data_mode" => {
                if let (Some(mode), Ok(mut controls)) = (val.as_str(), self.controls.write()) {
                    log::info!("Relay: data_mode -> {}", mode);
                    controls.data_mode = Some(mode.to_string());
                }
            }
            "cbf_domains" => match serde_json::from_value::<DomainTable>(val) {
                Ok(table) => {
                    if self.domain_tx.try_send(table).is_err() {
                        log::warn!("Relay: domain update dropped, coordinator busy");
                    }
                }
                Err(e) => log::warn!("Relay: malformed cbf_domains update: {}", e),
            },
            other => log::debug!("Relay: ignoring inbound message_id {:?}", other),
        }
    }
}
