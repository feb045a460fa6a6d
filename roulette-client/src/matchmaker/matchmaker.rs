use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use roulette_core::utils::now_millis;
use roulette_core::{PeerIdentity, RoomId, RoomRecord, RoomStatus, paths};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::matchmaker::{Role, RoomBinding};
use crate::store::{RendezvousStore, StoreError, decode, encode};
use crate::transport::Negotiator;

/// Finds a waiting room to join or publishes a new one.
///
/// The store offers no compare-and-swap, so a claim is provisional: it is
/// written, read back, and abandoned with [`SessionError::ClaimConflict`] if
/// another joiner's write won. The departure monitor catches a claim that is
/// overwritten later still.
///
/// Every other recoverable error leaves the waiting-room index one entry
/// smaller, so only lost claims are counted.
pub struct Matchmaker {
    store: Arc<dyn RendezvousStore>,
    identity: PeerIdentity,
    lost_claims: AtomicU32,
}

impl Matchmaker {
    pub fn new(store: Arc<dyn RendezvousStore>, identity: PeerIdentity) -> Self {
        Self {
            store,
            identity,
            lost_claims: AtomicU32::new(0),
        }
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// Claims this matchmaker wrote and then found overwritten by another joiner.
    pub fn lost_claims(&self) -> u32 {
        self.lost_claims.load(Ordering::SeqCst)
    }

    /// Join the first waiting room created by someone else, or create one.
    ///
    /// A waiting entry that leads nowhere is removed before its error is
    /// returned; if that removal fails the store error is returned instead.
    pub async fn find_or_create_room(
        &self,
        negotiator: &dyn Negotiator,
    ) -> Result<RoomBinding, SessionError> {
        match self.find_waiting_room().await? {
            Some(room_id) => {
                info!("Peer {} joining waiting room {}", self.identity.peer_id, room_id);
                self.join_as_callee(&room_id, negotiator).await
            }
            None => {
                info!("No waiting rooms for peer {}, creating one", self.identity.peer_id);
                self.create_as_caller(negotiator).await
            }
        }
    }

    /// First waiting-room entry, in store order, not created by the local peer.
    pub async fn find_waiting_room(&self) -> Result<Option<RoomId>, SessionError> {
        let Some(Value::Object(entries)) = self.store.get(paths::WAITING_ROOMS).await? else {
            debug!("Waiting-room index is empty");
            return Ok(None);
        };

        let own_id = self.identity.peer_id.as_str();
        let found = entries
            .iter()
            .find(|(_, entry)| entry.get("creatorId").and_then(Value::as_str) != Some(own_id))
            .map(|(key, _)| RoomId::from(key.as_str()));
        Ok(found)
    }

    /// Claim `room_id` as its joiner and publish our answer with the claim.
    ///
    /// Answer and joiner fields go out in the same atomic write as the removal
    /// of the waiting entry, so a room never shows a joiner whose answer it
    /// does not hold.
    pub async fn join_as_callee(
        &self,
        room_id: &RoomId,
        negotiator: &dyn Negotiator,
    ) -> Result<RoomBinding, SessionError> {
        let room_path = paths::room(room_id);
        let waiting_path = paths::waiting_room(room_id);

        let Some(room) = self.read_room(room_id).await? else {
            warn!("Waiting room {} has no room record, removing dangling entry", room_id);
            self.store.remove(&waiting_path).await?;
            return Err(SessionError::RoomDataMissing(room_id.clone()));
        };

        if room.status == RoomStatus::Full || room.joiner_id.is_some() {
            warn!("Room {} is already full, removing its waiting entry", room_id);
            self.store.remove(&waiting_path).await?;
            return Err(SessionError::ClaimConflict(room_id.clone()));
        }

        let Some(offer) = room.usable_offer().cloned() else {
            warn!("Room {} has no usable offer", room_id);
            self.store.remove(&waiting_path).await?;
            return Err(SessionError::OfferMissing(room_id.clone()));
        };

        negotiator.set_remote_description(offer).await?;
        let answer = negotiator.create_answer().await?;
        negotiator.set_local_description(answer.clone()).await?;

        let mut claim = Map::new();
        claim.insert(waiting_path, Value::Null);
        claim.insert(
            format!("{room_path}/status"),
            encode(&room_path, &RoomStatus::Full)?,
        );
        claim.insert(
            format!("{room_path}/joinerId"),
            Value::String(self.identity.peer_id.to_string()),
        );
        claim.insert(
            format!("{room_path}/joinerDurableId"),
            Value::String(self.identity.durable_id.to_string()),
        );
        claim.insert(format!("{room_path}/answer"), encode(&room_path, &answer)?);
        self.store.update("", claim).await?;

        let claimed = match self.read_room(room_id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return Err(SessionError::RoomDataMissing(room_id.clone())),
            Err(e) => {
                // The claim may stand with nobody behind it; the creator must not
                // connect to it.
                warn!("Could not verify claim on room {}, closing it: {}", room_id, e);
                if let Err(close_err) = close_room(self.store.as_ref(), room_id).await {
                    warn!("Failed to close room {}: {}", room_id, close_err);
                }
                return Err(e);
            }
        };
        let won = claimed.joiner_id.as_ref() == Some(&self.identity.peer_id)
            && claimed.answer.as_ref() == Some(&answer);
        if !won {
            self.lost_claims.fetch_add(1, Ordering::SeqCst);
            warn!(
                "Claim on room {} lost to {:?}",
                room_id,
                claimed.joiner_id.as_ref().map(|id| id.as_str())
            );
            return Err(SessionError::ClaimConflict(room_id.clone()));
        }

        info!("Peer {} joined room {} as callee", self.identity.peer_id, room_id);
        Ok(RoomBinding {
            room_id: room_id.clone(),
            role: Role::Callee,
            peer_durable_id: room.creator_durable_id,
        })
    }

    /// Publish a new room with the offer embedded, plus its waiting entry.
    pub async fn create_as_caller(
        &self,
        negotiator: &dyn Negotiator,
    ) -> Result<RoomBinding, SessionError> {
        self.purge_own_records().await;

        let room_id = RoomId::from(self.store.new_key());
        let offer = negotiator.create_offer().await?;
        negotiator.set_local_description(offer.clone()).await?;

        let record = RoomRecord::waiting(&self.identity, offer, now_millis());
        let room_path = paths::room(&room_id);
        let waiting_path = paths::waiting_room(&room_id);

        let mut publish = Map::new();
        publish.insert(room_path.clone(), encode(&room_path, &record)?);
        publish.insert(waiting_path.clone(), encode(&waiting_path, &record.waiting_entry())?);
        self.store.update("", publish).await?;

        info!("Peer {} created room {} as caller", self.identity.peer_id, room_id);
        Ok(RoomBinding {
            room_id,
            role: Role::Caller,
            peer_durable_id: None,
        })
    }

    /// Remove rooms the local peer created or joined, and waiting entries it
    /// created. Leftovers of a crashed earlier session. Best-effort.
    pub async fn purge_own_records(&self) {
        let own_id = self.identity.peer_id.as_str();
        let is_own = |record: &Value, fields: &[&str]| {
            fields
                .iter()
                .any(|field| record.get(*field).and_then(Value::as_str) == Some(own_id))
        };

        let mut doomed = Vec::new();
        for (collection, fields) in [
            (paths::ROOMS, &["creatorId", "joinerId"][..]),
            (paths::WAITING_ROOMS, &["creatorId"][..]),
        ] {
            match self.store.get(collection).await {
                Ok(Some(Value::Object(records))) => doomed.extend(
                    records
                        .iter()
                        .filter(|(_, record)| is_own(record, fields))
                        .map(|(key, _)| format!("{collection}/{key}")),
                ),
                Ok(_) => {}
                Err(e) => warn!("Could not scan '{}' for own records: {}", collection, e),
            }
        }

        for path in doomed {
            debug!("Removing leftover record '{}'", path);
            self.remove_quietly(&path).await;
        }
    }

    async fn read_room(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, SessionError> {
        let room_path = paths::room(room_id);
        let Some(value) = self.store.get(&room_path).await? else {
            return Ok(None);
        };
        match decode(&room_path, value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring malformed room {}: {}", room_id, e);
                Ok(None)
            }
        }
    }

    async fn remove_quietly(&self, path: &str) {
        if let Err(e) = self.store.remove(path).await {
            warn!("Failed to remove '{}': {}", path, e);
        }
    }
}

/// Delete a room and its waiting entry in one write. Already-gone records are fine.
pub async fn close_room(store: &dyn RendezvousStore, room_id: &RoomId) -> Result<(), StoreError> {
    let mut fields = Map::new();
    fields.insert(paths::room(room_id), Value::Null);
    fields.insert(paths::waiting_room(room_id), Value::Null);
    store.update("", fields).await
}
