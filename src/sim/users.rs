//! Bounded pool of simulated user sessions.

use crate::sim::behavior::Behavior;
use rand::Rng;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Probability a new session spawns on a pool tick with free capacity.
const SPAWN_PROBABILITY: f64 = 0.3;

/// Momentum traders react to a large trade with this probability.
const MOMENTUM_REACTION_PROBABILITY: f64 = 0.3;

/// One live simulated user.
#[derive(Debug, Clone)]
pub struct UserSession {
    /// Synthetic user identity.
    pub user_id: String,
    /// The population this user belongs to.
    pub behavior: Behavior,
    started: Instant,
    duration: Duration,
}

impl UserSession {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.duration
    }
}

/// A bounded set of concurrent sessions. New sessions spawn
/// probabilistically while capacity remains; sessions age out on their
/// duration.
pub struct UserPool {
    max_sessions: usize,
    sessions: Mutex<Vec<UserSession>>,
    next_user: AtomicU64,
}

impl UserPool {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            sessions: Mutex::new(Vec::new()),
            next_user: AtomicU64::new(1),
        }
    }

    /// Expire aged sessions and maybe spawn a new one.
    pub fn tick<R: Rng + ?Sized>(&self, rng: &mut R) {
        let now = Instant::now();
        let mut sessions = self.lock();
        sessions.retain(|session| {
            let keep = !session.expired(now);
            if !keep {
                trace!(user_id = %session.user_id, "session aged out");
            }
            keep
        });

        if sessions.len() < self.max_sessions && rng.random_bool(SPAWN_PROBABILITY) {
            let id = self.next_user.fetch_add(1, Ordering::Relaxed);
            let behavior = Behavior::random(rng);
            let session = UserSession {
                user_id: format!("sim-user-{id}"),
                behavior,
                started: now,
                duration: Behavior::draw_session_duration(rng),
            };
            trace!(user_id = %session.user_id, %behavior, "session spawned");
            sessions.push(session);
        }
    }

    /// Pick one live session uniformly, if any exist.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<UserSession> {
        let sessions = self.lock();
        if sessions.is_empty() {
            return None;
        }
        Some(sessions[rng.random_range(0..sessions.len())].clone())
    }

    /// Sessions reacting to a price move of `change_pct` percent. Only
    /// moves beyond one percent provoke anyone; each session reacts with
    /// its behavior's reactivity probability.
    pub fn price_move_reactors<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        change_pct: f64,
    ) -> Vec<UserSession> {
        if change_pct.abs() <= 1.0 {
            return Vec::new();
        }
        self.lock()
            .iter()
            .filter(|session| rng.random_bool(session.behavior.price_reactivity()))
            .cloned()
            .collect()
    }

    /// Momentum sessions reacting to a large trade.
    pub fn large_trade_reactors<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<UserSession> {
        self.lock()
            .iter()
            .filter(|session| {
                session.behavior == Behavior::Momentum
                    && rng.random_bool(MOMENTUM_REACTION_PROBABILITY)
            })
            .cloned()
            .collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UserSession>> {
        self.sessions.lock().expect("user pool lock poisoned")
    }
}
