//! Exclusive playback across asset cards.
//!
//! Each card owns its own [`PlaybackBackend`]; the coordinator guarantees
//! that at most one of them is audible and tracks which asset is active.

mod rodio_backend;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use rodio_backend::{AudioOutput, RodioBackend};

use crate::catalog::AssetId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("No audio output available: {0}")]
    Output(String),
    #[error("Could not decode audio: {0}")]
    Decode(String),
    #[error("Could not load audio: {0}")]
    Load(String),
    #[error("No card registered for asset {0}")]
    UnknownAsset(AssetId),
}

/// Audio for a single card.
pub trait PlaybackBackend {
    /// Begin or resume output from the current position.
    fn start(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    /// Move the position back to the beginning without starting.
    fn rewind(&mut self);
    /// True once the audio has played through to its end.
    fn is_finished(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CardState {
    #[default]
    Stopped,
    Playing,
}

struct Card {
    backend: Box<dyn PlaybackBackend>,
    state: CardState,
}

/// Coordinator shared by every card on the owner thread.
pub type SharedPlayback = Rc<RefCell<PlaybackCoordinator>>;

#[derive(Default)]
pub struct PlaybackCoordinator {
    cards: HashMap<AssetId, Card>,
    active: Option<AssetId>,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedPlayback {
        Rc::new(RefCell::new(self))
    }

    /// Attach a card. Re-registering an id silences and replaces its backend.
    pub fn register(&mut self, id: AssetId, backend: Box<dyn PlaybackBackend>) {
        if let Some(mut previous) = self.cards.insert(
            id.clone(),
            Card {
                backend,
                state: CardState::Stopped,
            },
        ) {
            previous.backend.pause();
            if self.active.as_ref() == Some(&id) {
                self.active = None;
            }
        }
    }

    pub fn unregister(&mut self, id: &AssetId) {
        if let Some(mut card) = self.cards.remove(id) {
            card.backend.pause();
        }
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }

    /// Start `id`, silencing and rewinding every other playing card first.
    pub fn play(&mut self, id: &AssetId) -> Result<(), PlaybackError> {
        if !self.cards.contains_key(id) {
            return Err(PlaybackError::UnknownAsset(id.clone()));
        }
        for (other_id, card) in self.cards.iter_mut() {
            if other_id != id && card.state == CardState::Playing {
                card.backend.pause();
                card.backend.rewind();
                card.state = CardState::Stopped;
                tracing::debug!(id = %other_id, "Superseded playback");
            }
        }
        let Some(card) = self.cards.get_mut(id) else {
            return Err(PlaybackError::UnknownAsset(id.clone()));
        };
        match card.backend.start() {
            Ok(()) => {
                card.state = CardState::Playing;
                self.active = Some(id.clone());
                Ok(())
            }
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "Playback failed to start");
                card.state = CardState::Stopped;
                self.active = None;
                Err(err)
            }
        }
    }

    /// Pause `id`, keeping its position.
    pub fn stop(&mut self, id: &AssetId) {
        if let Some(card) = self.cards.get_mut(id)
            && card.state == CardState::Playing
        {
            card.backend.pause();
            card.state = CardState::Stopped;
        }
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }

    /// Play/pause button: returns the card's resulting state.
    pub fn toggle(&mut self, id: &AssetId) -> Result<CardState, PlaybackError> {
        match self.state(id) {
            Some(CardState::Playing) => {
                self.stop(id);
                Ok(CardState::Stopped)
            }
            Some(CardState::Stopped) => self.play(id).map(|()| CardState::Playing),
            None => Err(PlaybackError::UnknownAsset(id.clone())),
        }
    }

    /// Move cards whose audio ran out back to `Stopped`; returns their ids.
    pub fn poll_finished(&mut self) -> Vec<AssetId> {
        let mut ended = Vec::new();
        for (id, card) in self.cards.iter_mut() {
            if card.state == CardState::Playing && card.backend.is_finished() {
                card.state = CardState::Stopped;
                ended.push(id.clone());
            }
        }
        if let Some(active) = &self.active
            && ended.contains(active)
        {
            self.active = None;
        }
        ended
    }

    pub fn state(&self, id: &AssetId) -> Option<CardState> {
        self.cards.get(id).map(|card| card.state)
    }

    pub fn active(&self) -> Option<&AssetId> {
        self.active.as_ref()
    }

    pub fn playing_count(&self) -> usize {
        self.cards
            .values()
            .filter(|card| card.state == CardState::Playing)
            .count()
    }
}
