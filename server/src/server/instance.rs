// polypong/server/src/server/instance.rs
use super::game_loop::{JoinOutcome, RoomHandle};
use crate::core::config::ServerConfig;
use crate::core::error::{ServerError, ServerResult};
use crate::core::types::SocketId;
use crate::network::protocol::InstanceInfo;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type RoomsMap = Arc<DashMap<String, RoomHandle>>;

const JOIN_ATTEMPTS: usize = 3;

/// Result of a successful `joinRoom`.
#[derive(Debug)]
pub struct RoomMembership {
    pub handle: RoomHandle,
    pub outcome: JoinOutcome,
}

/// Process-wide state: configuration, identity and the registry of live rooms.
pub struct PolyPongServer {
    pub config: Arc<ServerConfig>,
    pub rooms: RoomsMap,
    next_generation: AtomicU64,
}

impl PolyPongServer {
    pub fn new(config: ServerConfig) -> Self {
        info!(
            "Initializing PolyPongServer (instance '{}', distributed: {}).",
            config.instance_id, config.is_distributed
        );
        PolyPongServer {
            config: Arc::new(config),
            rooms: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    pub fn is_distributed(&self) -> bool {
        self.config.is_distributed
    }

    pub fn instance_info(&self) -> InstanceInfo {
        InstanceInfo {
            instance_id: self.config.instance_id.clone(),
            is_fly_instance: self.config.is_distributed,
        }
    }

    /// Rejects a join that names a different instance than this process.
    pub fn check_instance(&self, requested: Option<&str>) -> ServerResult<()> {
        match requested {
            Some(expected) if expected != self.instance_id() => Err(ServerError::WrongInstance {
                expected: expected.to_string(),
                current: self.instance_id().to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    fn get_or_create_room(&self, room_id: &str) -> RoomHandle {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                let generation = self.next_generation.fetch_add(1, AtomicOrdering::Relaxed);
                self.spawn_room(room_id, generation)
            })
            .value()
            .clone()
    }

    /// Drops `handle` from the registry if it is still the registered room for its id.
    fn discard(&self, handle: &RoomHandle) {
        self.rooms
            .remove_if(handle.room_id.as_str(), |_, current| current.generation == handle.generation);
    }

    /// Joins (creating if needed) the room. A room that shut down between lookup and join
    /// is replaced and the join retried.
    pub async fn join_room(&self, room_id: &str, socket_id: SocketId) -> ServerResult<RoomMembership> {
        for attempt in 1..=JOIN_ATTEMPTS {
            let handle = self.get_or_create_room(room_id);
            let Some(pending) = handle.request_join(socket_id.clone()) else {
                debug!("[{}]: Stale room handle (attempt {}).", room_id, attempt);
                self.discard(&handle);
                continue;
            };
            match pending.await {
                Ok(outcome) => return Ok(RoomMembership { handle, outcome }),
                Err(_) => {
                    debug!("[{}]: Room closed before answering join (attempt {}).", room_id, attempt);
                    self.discard(&handle);
                }
            }
        }
        warn!("[{}]: Giving up joining {} after {} attempts.", room_id, socket_id, JOIN_ATTEMPTS);
        Err(ServerError::RoomClosed(room_id.to_string()))
    }
}
