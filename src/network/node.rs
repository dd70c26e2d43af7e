use std::error::Error;
use std::time::Duration;

use futures::StreamExt;
use libp2p::gossipsub::{self, IdentTopic};
use libp2p::swarm::{Config as SwarmConfig, SwarmEvent};
use libp2p::{Multiaddr, PeerId, Swarm, identity, mdns};
use tokio::sync::mpsc;

use crate::common::envelope::PresenceAnnouncement;
use crate::common::{NoteCommand, NoteEvent, WireMessage};
use crate::coordinator::{Broadcast, DeliveryCoordinator, TransportError};
use crate::roster::{PeerPresence, Roster};

use super::behavior::{NotesBehavior, NotesBehaviorEvent, build_behavior};
use super::transport::build_transport;

const STALE_KEY_SWEEP: Duration = Duration::from_secs(300);

pub type NodeError = Box<dyn Error + Send + Sync>;

/// Publishes wire messages on the notes topic.
struct GossipChannel<'a> {
    swarm: &'a mut Swarm<NotesBehavior>,
    topic: &'a IdentTopic,
}

impl Broadcast for GossipChannel<'_> {
    fn broadcast(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        let bytes = message.encode()?;
        self.swarm
            .behaviour_mut()
            .gossipsub
            .publish(self.topic.clone(), bytes)
            .map(|_| ())
            .map_err(|err| TransportError::Publish(err.to_string()))
    }
}

/// One peer: the swarm, the delivery protocol and the participant roster,
/// driven one command or swarm event at a time.
pub struct NoteNode {
    coordinator: DeliveryCoordinator,
    roster: Roster,
    event_sender: mpsc::Sender<NoteEvent>,
    command_receiver: mpsc::Receiver<NoteCommand>,
    listen_addr: String,
    presence: PeerPresence<PeerId>,
}

impl NoteNode {
    pub fn new(
        coordinator: DeliveryCoordinator,
        roster: Roster,
        event_sender: mpsc::Sender<NoteEvent>,
        command_receiver: mpsc::Receiver<NoteCommand>,
        listen_addr: String,
    ) -> Self {
        Self {
            coordinator,
            roster,
            event_sender,
            command_receiver,
            listen_addr,
            presence: PeerPresence::new(),
        }
    }

    pub async fn run(mut self) -> Result<(), NodeError> {
        let local_key = identity::Keypair::generate_ed25519();
        let local_peer_id = PeerId::from(local_key.public());
        log::info!(
            "Local PeerID: {local_peer_id} (participant {})",
            self.roster.local_id()
        );

        let transport = build_transport(&local_key)?;
        let (behavior, topic) = build_behavior(&local_key, local_peer_id)?;

        let mut swarm = Swarm::new(
            transport,
            behavior,
            local_peer_id,
            SwarmConfig::with_tokio_executor(),
        );

        let listen_addr: Multiaddr = self.listen_addr.parse()?;
        swarm.listen_on(listen_addr)?;

        if let Some(warning) = self.coordinator.startup() {
            self.emit(NoteEvent::warn(format!("Failed to load note history: {warning}")))
                .await;
        }
        self.emit(NoteEvent::RosterChanged(self.roster.participants()))
            .await;

        log::info!("Note event loop started");
        let mut sweep = tokio::time::interval(STALE_KEY_SWEEP);

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command, &mut swarm, &topic).await,
                        None => break,
                    }
                }
                event = swarm.select_next_some() => {
                    self.handle_swarm_event(event, &mut swarm, &topic).await;
                }
                _ = sweep.tick() => {
                    let pruned = self.coordinator.prune_idle();
                    if pruned > 0 {
                        log::debug!("Pruned {pruned} idle throttle keys");
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_command(
        &mut self,
        command: NoteCommand,
        swarm: &mut Swarm<NotesBehavior>,
        topic: &IdentTopic,
    ) {
        match command {
            NoteCommand::SendNote(text) => {
                let outcome = {
                    let mut channel = GossipChannel { swarm, topic };
                    self.coordinator.submit(&text, &self.roster, &mut channel)
                };
                for notice in outcome.notices() {
                    self.emit(notice).await;
                }
            }
            NoteCommand::ShowHelp => {
                let help = self.coordinator.status(&self.roster).help_text();
                self.emit(NoteEvent::info(help)).await;
            }
            NoteCommand::ClearHistory => {
                if !self.coordinator.clear_history() {
                    self.emit(NoteEvent::warn("Only GMs can clear Ninja Notes."))
                        .await;
                }
            }
        }
    }

    async fn handle_swarm_event(
        &mut self,
        event: SwarmEvent<NotesBehaviorEvent>,
        swarm: &mut Swarm<NotesBehavior>,
        topic: &IdentTopic,
    ) {
        match event {
            SwarmEvent::Behaviour(NotesBehaviorEvent::Gossipsub(gossipsub::Event::Message {
                propagation_source,
                message,
                ..
            })) => {
                let Some(wire) = WireMessage::decode(&message.data) else {
                    return;
                };
                let origin = message.source.unwrap_or(propagation_source);

                if let WireMessage::Presence(announcement) = wire {
                    self.record_presence(origin, announcement.participant_id)
                        .await;
                    return;
                }

                let outcome = {
                    let mut channel = GossipChannel { swarm, topic };
                    self.coordinator
                        .handle_wire(wire, &self.roster, &mut channel)
                };
                for notice in outcome.notices() {
                    self.emit(notice).await;
                }
            }
            SwarmEvent::Behaviour(NotesBehaviorEvent::Gossipsub(
                gossipsub::Event::Subscribed {
                    peer_id,
                    topic: subscribed,
                },
            )) => {
                if subscribed == topic.hash() {
                    log::debug!("{peer_id} joined the notes topic");
                    self.announce(swarm, topic);
                }
            }
            SwarmEvent::Behaviour(NotesBehaviorEvent::Mdns(mdns::Event::Discovered(list))) => {
                for (peer_id, _) in list {
                    swarm.behaviour_mut().gossipsub.add_explicit_peer(&peer_id);
                }
            }
            SwarmEvent::Behaviour(NotesBehaviorEvent::Mdns(mdns::Event::Expired(list))) => {
                for (peer_id, _) in list {
                    swarm
                        .behaviour_mut()
                        .gossipsub
                        .remove_explicit_peer(&peer_id);
                    self.record_departure(&peer_id).await;
                }
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established: 0,
                ..
            } => {
                self.record_departure(&peer_id).await;
            }
            SwarmEvent::NewListenAddr { address, .. } => {
                log::info!("Listening on {address}");
            }
            _ => {}
        }
    }

    fn announce(&self, swarm: &mut Swarm<NotesBehavior>, topic: &IdentTopic) {
        let presence = WireMessage::Presence(PresenceAnnouncement {
            participant_id: self.roster.local_id().to_string(),
        });
        let mut channel = GossipChannel { swarm, topic };
        if let Err(err) = channel.broadcast(&presence) {
            log::debug!("Presence announcement not sent: {err}");
        }
    }

    async fn record_presence(&mut self, peer_id: PeerId, participant_id: String) {
        if self
            .presence
            .announce(&mut self.roster, peer_id, &participant_id)
        {
            log::info!("Participant {participant_id} is online");
            self.emit(NoteEvent::RosterChanged(self.roster.participants()))
                .await;
        }
    }

    async fn record_departure(&mut self, peer_id: &PeerId) {
        if self.presence.depart(&mut self.roster, peer_id) {
            log::info!("Peer {peer_id} left; participant list updated");
            self.emit(NoteEvent::RosterChanged(self.roster.participants()))
                .await;
        }
    }

    async fn emit(&mut self, event: NoteEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to deliver event to UI: {err}");
        }
    }
}
