/// Per-job face tracker.
///
/// Matches each frame's observations to existing tracks by nearest center
/// (first match wins, not a globally optimal assignment), keeps a short
/// position history per track, and decides where every live track should
/// be rendered: at its detected position, at a linearly extrapolated
/// position while it is moving and unseen, or at its last known position
/// until it expires.
///
/// All state lives in the instance. A tracker is created for one job and
/// dropped with it; identical observation sequences always produce
/// identical ids, events, and render targets.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::shared::geometry::NormalizedRect;

use super::face_observation::FaceObservation;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.15;
pub const DEFAULT_MOVEMENT_THRESHOLD: f64 = 0.01;
pub const DEFAULT_MAX_AGE: usize = 5;
pub const DEFAULT_HISTORY_LEN: usize = 10;
pub const DEFAULT_ACTIVE_WINDOW: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Max center distance (normalized) for an observation to match a track.
    pub match_threshold: f64,
    /// Speed (normalized units per update) above which a track is moving.
    pub movement_threshold: f64,
    /// Frames a track may go unmatched before it is evicted.
    pub max_age: usize,
    pub history_len: usize,
    /// Frames since last match during which a stationary track is Active.
    pub active_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            movement_threshold: DEFAULT_MOVEMENT_THRESHOLD,
            max_age: DEFAULT_MAX_AGE,
            history_len: DEFAULT_HISTORY_LEN,
            active_window: DEFAULT_ACTIVE_WINDOW,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    /// Matched recently; rendered at its detected position.
    Active,
    /// Unmatched but moving; rendered at an extrapolated position.
    Predicted,
    /// Unmatched and stationary; rendered at its last known position.
    Stale,
    /// Past `max_age`; never rendered again.
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackEvent {
    Created { id: u32, frame: usize },
    Updated { id: u32, frame: usize },
    /// The observation's nearest track was already updated this frame.
    Absorbed { id: u32, frame: usize },
    Evicted { id: u32, frame: usize },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTarget {
    pub track_id: u32,
    pub rect: NormalizedRect,
    pub state: TrackState,
}

#[derive(Clone, Debug)]
pub struct TrackedFace {
    id: u32,
    history: VecDeque<NormalizedRect>,
    velocity: (f64, f64),
    last_seen_frame: usize,
    confidence: f64,
    is_moving: bool,
}

impl TrackedFace {
    fn new(id: u32, observation: &FaceObservation, frame: usize, history_len: usize) -> Self {
        let mut history = VecDeque::with_capacity(history_len.max(1));
        history.push_back(observation.bbox);
        Self {
            id,
            history,
            velocity: (0.0, 0.0),
            last_seen_frame: frame,
            confidence: observation.confidence,
            is_moving: false,
        }
    }

    fn observe(&mut self, observation: &FaceObservation, frame: usize, config: &TrackerConfig) {
        self.history.push_back(observation.bbox);
        while self.history.len() > config.history_len.max(1) {
            self.history.pop_front();
        }

        self.velocity = match (self.history.iter().rev().nth(1), self.history.back()) {
            (Some(prev), Some(last)) => {
                let (px, py) = prev.center();
                let (lx, ly) = last.center();
                (lx - px, ly - py)
            }
            _ => (0.0, 0.0),
        };
        self.is_moving = self.speed() > config.movement_threshold;
        self.last_seen_frame = frame;
        self.confidence = self.confidence.max(observation.confidence);
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn history(&self) -> &VecDeque<NormalizedRect> {
        &self.history
    }

    pub fn last_position(&self) -> Option<&NormalizedRect> {
        self.history.back()
    }

    pub fn velocity(&self) -> (f64, f64) {
        self.velocity
    }

    pub fn speed(&self) -> f64 {
        self.velocity.0.hypot(self.velocity.1)
    }

    pub fn last_seen_frame(&self) -> usize {
        self.last_seen_frame
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    pub fn state_at(&self, frame: usize, config: &TrackerConfig) -> TrackState {
        let age = frame.saturating_sub(self.last_seen_frame);
        if age > config.max_age {
            TrackState::Expired
        } else if age == 0 {
            TrackState::Active
        } else if self.is_moving {
            TrackState::Predicted
        } else if age < config.active_window {
            TrackState::Active
        } else {
            TrackState::Stale
        }
    }

    /// Where this track should be drawn at `frame`, or `None` once expired.
    pub fn render_target_at(&self, frame: usize, config: &TrackerConfig) -> Option<RenderTarget> {
        let last = *self.last_position()?;
        let state = self.state_at(frame, config);
        let rect = match state {
            TrackState::Expired => return None,
            TrackState::Predicted => {
                let steps = frame.saturating_sub(self.last_seen_frame) as f64;
                last.translated(self.velocity.0 * steps, self.velocity.1 * steps)
            }
            TrackState::Active | TrackState::Stale => last,
        };
        Some(RenderTarget {
            track_id: self.id,
            rect,
            state,
        })
    }
}

pub struct FaceTracker {
    config: TrackerConfig,
    tracks: Vec<TrackedFace>,
    next_id: u32,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live tracks in creation order.
    pub fn tracks(&self) -> &[TrackedFace] {
        &self.tracks
    }

    /// Folds one frame's observations into the track set.
    ///
    /// Tracks already past `max_age` are evicted before matching, so an
    /// expired face that reappears starts a new track.
    pub fn update(&mut self, frame: usize, observations: &[FaceObservation]) -> Vec<TrackEvent> {
        let mut events = Vec::new();
        self.evict_expired(frame, &mut events);

        let mut claimed: Vec<u32> = Vec::with_capacity(observations.len());
        for observation in observations {
            match self.nearest_track(&observation.bbox) {
                Some(idx) => {
                    let id = self.tracks[idx].id;
                    if claimed.contains(&id) {
                        events.push(TrackEvent::Absorbed { id, frame });
                    } else {
                        self.tracks[idx].observe(observation, frame, &self.config);
                        claimed.push(id);
                        events.push(TrackEvent::Updated { id, frame });
                    }
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.push(TrackedFace::new(
                        id,
                        observation,
                        frame,
                        self.config.history_len,
                    ));
                    claimed.push(id);
                    events.push(TrackEvent::Created { id, frame });
                }
            }
        }

        self.evict_expired(frame, &mut events);
        events
    }

    /// Rectangles to pixelate at `frame`, in track creation order.
    pub fn render_targets(&self, frame: usize) -> Vec<RenderTarget> {
        self.tracks
            .iter()
            .filter_map(|t| t.render_target_at(frame, &self.config))
            .collect()
    }

    /// `update` followed by `render_targets` for the same frame.
    pub fn process(&mut self, frame: usize, observations: &[FaceObservation]) -> Vec<RenderTarget> {
        self.update(frame, observations);
        self.render_targets(frame)
    }

    /// Index of the closest track within the match threshold. Ties go to the
    /// earliest-created track.
    fn nearest_track(&self, bbox: &NormalizedRect) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, track) in self.tracks.iter().enumerate() {
            let Some(last) = track.last_position() else {
                continue;
            };
            let distance = last.center_distance(bbox);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }
        best.filter(|&(_, d)| d < self.config.match_threshold)
            .map(|(idx, _)| idx)
    }

    fn evict_expired(&mut self, frame: usize, events: &mut Vec<TrackEvent>) {
        let max_age = self.config.max_age;
        self.tracks.retain(|t| {
            let keep = frame.saturating_sub(t.last_seen_frame) <= max_age;
            if !keep {
                log::debug!("Track {} expired at frame {frame}", t.id);
                events.push(TrackEvent::Evicted { id: t.id, frame });
            }
            keep
        });
    }
}

impl Default for FaceTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
