use std::time::Duration;

const ONE_SECOND: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    Ready,
    Cooling(u32),
}

/// Client-side cooldown between accepted placements.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: CooldownState,
    cooldown_seconds: u32,
    // Elapsed time not yet converted into a whole-second tick
    carry: Duration,
}

impl RateLimiter {
    pub fn new(cooldown_seconds: u32) -> Self {
        Self {
            state: CooldownState::Ready,
            cooldown_seconds,
            carry: Duration::ZERO,
        }
    }

    pub fn state(&self) -> CooldownState {
        self.state
    }

    pub fn can_place(&self) -> bool {
        self.state == CooldownState::Ready
    }

    pub fn remaining(&self) -> u32 {
        match self.state {
            CooldownState::Ready => 0,
            CooldownState::Cooling(remaining) => remaining,
        }
    }

    /// Enters the cooldown after an accepted placement.
    pub fn start(&mut self) {
        self.carry = Duration::ZERO;
        self.state = if self.cooldown_seconds == 0 {
            CooldownState::Ready
        } else {
            CooldownState::Cooling(self.cooldown_seconds)
        };
    }

    /// One second passes. Reaching zero means ready on the same evaluation.
    pub fn tick(&mut self) {
        self.state = match self.state {
            CooldownState::Ready => CooldownState::Ready,
            CooldownState::Cooling(remaining) if remaining <= 1 => CooldownState::Ready,
            CooldownState::Cooling(remaining) => CooldownState::Cooling(remaining - 1),
        };
    }

    /// Feeds wall-clock time in; whole seconds become ticks.
    pub fn advance(&mut self, dt: Duration) {
        if self.can_place() {
            self.carry = Duration::ZERO;
            return;
        }

        self.carry += dt;
        while self.carry >= ONE_SECOND && !self.can_place() {
            self.carry -= ONE_SECOND;
            self.tick();
        }
    }
}
