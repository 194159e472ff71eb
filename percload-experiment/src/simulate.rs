//! Display-free collaborators for piloting a session end to end.
//!
//! The presenter writes the current letters to a shared screen; the
//! simulated participant looks at that screen, waits a sampled reaction time
//! on the session timer and presses a key.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::info;
use percload_core::{AssetId, ExperimentError, TARGET_LETTER};
use percload_timing::Timer;
use rand::Rng;

use crate::response::{KeyMap, ResponseEvent};
use crate::run::{Presenter, Responder};

/// What is currently visible: the letter string, if any.
pub type SharedScreen = Rc<RefCell<Option<String>>>;

pub struct HeadlessPresenter<T: Timer> {
    timer: T,
    screen: SharedScreen,
    /// Sleep through fixation instead of skipping it.
    pub pace_fixation: bool,
    pub presented: Vec<(AssetId, String)>,
}

impl<T: Timer> HeadlessPresenter<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            screen: Rc::new(RefCell::new(None)),
            pace_fixation: false,
            presented: Vec::new(),
        }
    }

    pub fn screen(&self) -> SharedScreen {
        Rc::clone(&self.screen)
    }
}

impl<T: Timer> Presenter for HeadlessPresenter<T> {
    fn show_fixation(&mut self, duration: Duration) -> Result<(), ExperimentError> {
        *self.screen.borrow_mut() = None;
        if self.pace_fixation {
            self.timer.sleep(duration);
        }
        Ok(())
    }

    fn present(&mut self, background: &AssetId, letters: &str) -> Result<u64, ExperimentError> {
        *self.screen.borrow_mut() = Some(letters.to_string());
        self.presented.push((background.clone(), letters.to_string()));
        info!("[headless] {} over {}", letters, background);
        Ok(self.timer.now())
    }
}

pub struct SimulatedParticipant<T: Timer, R: Rng> {
    timer: T,
    rng: R,
    screen: SharedScreen,
    keys: KeyMap,
    /// Probability of pressing the right key.
    pub accuracy: f64,
    /// Probability of not answering at all.
    pub miss_rate: f64,
    pub rt_range_ms: (u64, u64),
}

impl<T: Timer, R: Rng> SimulatedParticipant<T, R> {
    pub fn new(timer: T, rng: R, screen: SharedScreen, keys: KeyMap) -> Self {
        Self {
            timer,
            rng,
            screen,
            keys,
            accuracy: 0.9,
            miss_rate: 0.0,
            rt_range_ms: (350, 900),
        }
    }
}

impl<T: Timer, R: Rng> Responder for SimulatedParticipant<T, R> {
    fn await_response(&mut self, onset_ns: u64, timeout: Option<Duration>) -> ResponseEvent {
        let remaining = timeout.map(|t| t.saturating_sub(self.timer.elapsed(onset_ns)));
        let (lo, hi) = self.rt_range_ms;
        let rt = Duration::from_millis(self.rng.random_range(lo..=hi.max(lo)));
        let wait = rt.saturating_sub(self.timer.elapsed(onset_ns));

        let misses = self.rng.random_bool(self.miss_rate.clamp(0.0, 1.0));
        if let Some(remaining) = remaining {
            if misses || wait >= remaining {
                self.timer.sleep(remaining);
                return ResponseEvent::Timeout;
            }
        }
        self.timer.sleep(wait);

        let target_seen = self
            .screen
            .borrow()
            .as_deref()
            .is_some_and(|letters| letters.contains(TARGET_LETTER));
        let right = self.rng.random_bool(self.accuracy.clamp(0.0, 1.0));
        let key = if target_seen == right {
            &self.keys.target
        } else {
            &self.keys.non_target
        };
        ResponseEvent::key(key.clone(), self.timer.elapsed(onset_ns))
    }
}
