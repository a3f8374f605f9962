//! Control loop state
//!
//! Owns the parameter store, the phase clock and the collaborators it
//! pushes results into: the record store, the strip and the outbound
//! message sink.

use dusklight_gradient_lib::payload::{announce_clock, announce_params};
use dusklight_gradient_lib::persist::{load_params, read_boundary};
use dusklight_gradient_lib::{
    parse_message, Announcement, Command, Frame, KeyValueStore, ParameterStore, ParamsError,
    PersistWrite, Phase, PhaseBoundary, PhaseClock, PhaseTracker, Topic, UpdateOutcome,
};
use log::{debug, info, warn};
use smart_leds::{SmartLedsWrite, RGBW};
use std::fmt::Debug;

use crate::broker::Publish;
use crate::config::Config;
use crate::strip::write_frame;

fn announce<P: Publish + ?Sized>(out: &mut P, announcement: &Announcement) {
    out.publish(&announcement.topic.state_topic(), &announcement.payload);
}

pub struct Controller<S, W> {
    params: ParameterStore,
    clock: PhaseClock,
    tracker: PhaseTracker,
    clock_synced: bool,
    storage: S,
    strip: W,
}

impl<S, W> Controller<S, W>
where
    S: KeyValueStore,
    W: SmartLedsWrite<Color = RGBW<u8>>,
    W::Error: Debug,
{
    /// Load both parameter sets and the phase boundaries from `storage`.
    ///
    /// Nothing is rendered yet; the first [`Self::poll_clock`] activates the
    /// starting phase.
    pub fn new(
        config: &Config,
        storage: S,
        strip: W,
        now: Option<f32>,
    ) -> Result<Self, ParamsError> {
        let (day_defaults, night_defaults) = config.default_params()?;
        let clock = PhaseClock::new(
            read_boundary(&storage, Phase::Day, config.day_start).into_inner(),
            read_boundary(&storage, Phase::Night, config.night_start).into_inner(),
        );
        let day = load_params(&storage, Phase::Day, &day_defaults);
        let night = load_params(&storage, Phase::Night, &night_defaults);

        let active = match now {
            Some(now) => clock.phase_at(now),
            None => {
                warn!("Clock: time of day unknown, starting in night phase");
                Phase::Night
            }
        };
        info!(
            "Controller: day starts {}, night starts {}, starting in {active} phase",
            clock.day_start(),
            clock.night_start()
        );

        Ok(Self {
            params: ParameterStore::new(day, night, active),
            clock,
            tracker: PhaseTracker::new(),
            clock_synced: false,
            storage,
            strip,
        })
    }

    pub const fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    #[cfg(test)]
    pub const fn clock(&self) -> &PhaseClock {
        &self.clock
    }

    #[cfg(test)]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[cfg(test)]
    pub const fn strip(&self) -> &W {
        &self.strip
    }

    fn show(&mut self, frame: &Frame) {
        if let Err(e) = write_frame(&mut self.strip, frame) {
            warn!("Strip: failed to write frame: {e:?}");
        }
    }

    fn persist(&mut self, write: PersistWrite) {
        if let Err(e) = write.apply(&mut self.storage) {
            warn!(
                "Storage: failed to write {}/{}: {e}",
                write.namespace, write.key
            );
        }
    }

    fn activate<P: Publish + ?Sized>(&mut self, phase: Phase, out: &mut P) {
        let activation = self.params.activate(phase);
        self.show(&activation.frame);
        for announcement in &activation.announcements {
            announce(out, announcement);
        }
    }

    /// Check the time of day and switch parameter sets on a phase edge.
    ///
    /// `now` is `None` while the time is unknown. Until it becomes known the
    /// starting phase is shown once; when it does, the phase is evaluated
    /// afresh.
    pub fn poll_clock<P: Publish + ?Sized>(&mut self, now: Option<f32>, out: &mut P) {
        let Some(now) = now else {
            if self.clock_synced {
                warn!("Clock: time of day lost");
                self.clock_synced = false;
            }
            if let Some(phase) = self.tracker.observe(self.params.active_phase()) {
                self.activate(phase, out);
            }
            return;
        };
        if !self.clock_synced {
            info!("Clock: time of day known");
            self.clock_synced = true;
            self.tracker.reset();
        }
        if let Some(phase) = self.tracker.observe(self.clock.phase_at(now)) {
            info!("Clock: {phase} phase begins");
            self.activate(phase, out);
        }
    }

    /// Handle one inbound message. Rejected messages change nothing.
    pub fn handle_message<P: Publish + ?Sized>(
        &mut self,
        topic: &str,
        payload: &str,
        out: &mut P,
    ) {
        let command = match parse_message(topic, payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("Rejected message on {topic} ({payload:?}): {e}");
                return;
            }
        };
        debug!("Message on {topic}: {command:?}");

        match command {
            Command::Set(value) => match self.params.apply_update(value) {
                Ok(UpdateOutcome::Unchanged) => {}
                Ok(UpdateOutcome::Changed(change)) => {
                    self.show(&change.frame);
                    self.persist(change.write);
                    announce(out, &change.announcement);
                }
                Err(e) => warn!("Rejected message on {topic} ({payload:?}): {e}"),
            },
            Command::SetBoundary { phase, boundary } => self.set_boundary(phase, boundary, out),
            Command::Announce => self.announce_all(out),
        }
    }

    fn set_boundary<P: Publish + ?Sized>(
        &mut self,
        phase: Phase,
        boundary: PhaseBoundary,
        out: &mut P,
    ) {
        let old = match phase {
            Phase::Day => self.clock.day_start(),
            Phase::Night => self.clock.night_start(),
        };
        if old == boundary {
            debug!("Clock: {phase} start unchanged at {boundary}");
            return;
        }
        match phase {
            Phase::Day => self.clock.set_day_start(boundary),
            Phase::Night => self.clock.set_night_start(boundary),
        }
        info!("Clock: {phase} start: {old} -> {boundary}");
        self.persist(PersistWrite::boundary(phase, boundary));
        let topic = match phase {
            Phase::Day => Topic::DayStart,
            Phase::Night => Topic::NightStart,
        };
        announce(
            out,
            &Announcement {
                topic,
                payload: boundary.to_string(),
            },
        );
    }

    /// Publish the active phase, every field of its set and both boundaries
    pub fn announce_all<P: Publish + ?Sized>(&mut self, out: &mut P) {
        let phase = self.params.active_phase();
        for announcement in announce_params(phase, self.params.active()) {
            announce(out, &announcement);
        }
        for announcement in announce_clock(&self.clock) {
            announce(out, &announcement);
        }
    }

    /// Frame for `phase` without switching to it
    pub fn preview(&self, phase: Phase) -> Frame {
        dusklight_gradient_lib::render(&self.params.set(phase).params)
    }
}
