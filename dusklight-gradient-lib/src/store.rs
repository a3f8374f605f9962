//! Day and night parameter sets with an active-phase selector
//!
//! The store owns both sets. Activation and updates are synchronous and
//! return everything the caller must push outward (frame, announcements,
//! storage write); the store itself performs no I/O.

use log::{debug, info};

use crate::params::{FieldValue, ParamsError, RenderParams};
use crate::payload::{self, Announcement, Topic};
use crate::persist::PersistWrite;
use crate::phase::Phase;
use crate::render::{render, Frame};

/// A phase tag plus its full parameter set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    pub phase: Phase,
    pub params: RenderParams,
}

/// Result of [`ParameterStore::activate`]
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub phase: Phase,
    pub params: RenderParams,
    pub frame: Frame,
    /// Active phase plus every field of the newly active set
    pub announcements: Vec<Announcement>,
}

/// A field update that actually changed something
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub phase: Phase,
    pub old: FieldValue,
    pub new: FieldValue,
    pub frame: Frame,
    pub write: PersistWrite,
    pub announcement: Announcement,
}

/// Result of [`ParameterStore::apply_update`]
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The new value equals the current one; nothing to render or persist
    Unchanged,
    Changed(Change),
}

#[derive(Debug, Clone)]
pub struct ParameterStore {
    day: ParameterSet,
    night: ParameterSet,
    active: Phase,
}

impl ParameterStore {
    #[must_use]
    pub const fn new(day: RenderParams, night: RenderParams, active: Phase) -> Self {
        Self {
            day: ParameterSet {
                phase: Phase::Day,
                params: day,
            },
            night: ParameterSet {
                phase: Phase::Night,
                params: night,
            },
            active,
        }
    }

    #[must_use]
    pub const fn active_phase(&self) -> Phase {
        self.active
    }

    #[must_use]
    pub const fn set(&self, phase: Phase) -> &ParameterSet {
        match phase {
            Phase::Day => &self.day,
            Phase::Night => &self.night,
        }
    }

    fn set_mut(&mut self, phase: Phase) -> &mut ParameterSet {
        match phase {
            Phase::Day => &mut self.day,
            Phase::Night => &mut self.night,
        }
    }

    /// Parameters currently in force
    #[must_use]
    pub const fn active(&self) -> &RenderParams {
        &self.set(self.active).params
    }

    /// Render the active parameter set
    #[must_use]
    pub fn render(&self) -> Frame {
        render(self.active())
    }

    /// Make `phase` active, render it and announce it.
    pub fn activate(&mut self, phase: Phase) -> Activation {
        if phase == self.active {
            debug!("Parameters: re-activating {phase} set");
        } else {
            info!("Parameters: switching from {} to {phase} set", self.active);
        }
        self.active = phase;
        let params = *self.active();
        Activation {
            phase,
            params,
            frame: render(&params),
            announcements: payload::announce_params(phase, &params),
        }
    }

    /// Replace one field of the active set.
    ///
    /// An equal value is a no-op. Out-of-range values are rejected and the
    /// active set stays as it was.
    pub fn apply_update(&mut self, value: FieldValue) -> Result<UpdateOutcome, ParamsError> {
        let phase = self.active;
        let field = value.field();
        let current = *self.active();
        let old = current.get(field);
        if old == value {
            debug!("Parameters: {phase} {field} unchanged at {value}");
            return Ok(UpdateOutcome::Unchanged);
        }

        let updated = current.with(value)?;
        self.set_mut(phase).params = updated;
        info!("Parameters: {phase} {field}: {old} -> {value}");

        Ok(UpdateOutcome::Changed(Change {
            phase,
            old,
            new: value,
            frame: render(&updated),
            write: PersistWrite::field(phase, value),
            announcement: Announcement {
                topic: Topic::for_field(field),
                payload: payload::encode_field(value),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Field, RawRenderParams};
    use crate::persist::{field_key, StoredValue};
    use rgb::RGB8;

    fn day() -> RenderParams {
        RenderParams::new(RawRenderParams {
            pixel_count: 41,
            status: true,
            brightness: 70,
            amplifier: 0,
            tau: 5.125,
            color_bottom: RGB8::new(194, 255, 0),
            color_top: RGB8::new(0, 193, 255),
            white_target: 20,
        })
        .unwrap()
    }

    fn night() -> RenderParams {
        RenderParams::new(RawRenderParams {
            pixel_count: 41,
            status: true,
            brightness: 30,
            amplifier: -40,
            tau: 5.125,
            color_bottom: RGB8::new(118, 0, 255),
            color_top: RGB8::new(255, 0, 119),
            white_target: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_activate_swaps_whole_set() {
        let mut store = ParameterStore::new(day(), night(), Phase::Day);
        assert_eq!(*store.active(), day());

        let activation = store.activate(Phase::Night);
        assert_eq!(store.active_phase(), Phase::Night);
        assert_eq!(activation.params, night());
        assert_eq!(activation.frame, render(&night()));
        assert_eq!(activation.announcements[0].payload, "night");
        assert!(activation
            .announcements
            .iter()
            .any(|a| a.topic == Topic::Amplifier && a.payload == "-40"));
    }

    #[test]
    fn test_equal_update_is_noop() {
        let mut store = ParameterStore::new(day(), night(), Phase::Day);
        let before = store.render();
        for field in Field::ALL {
            let current = store.active().get(field);
            assert_eq!(store.apply_update(current), Ok(UpdateOutcome::Unchanged));
        }
        assert_eq!(*store.active(), day());
        assert_eq!(store.render(), before);
    }

    #[test]
    fn test_change_renders_and_persists_once() {
        let mut store = ParameterStore::new(day(), night(), Phase::Night);
        let outcome = store.apply_update(FieldValue::Brightness(60)).unwrap();
        let UpdateOutcome::Changed(change) = outcome else {
            panic!("expected a change");
        };
        assert_eq!(change.phase, Phase::Night);
        assert_eq!(change.old, FieldValue::Brightness(30));
        assert_eq!(change.new, FieldValue::Brightness(60));
        assert_eq!(change.write.namespace, "night");
        assert_eq!(change.write.key, field_key(Field::Brightness));
        assert_eq!(change.write.value, StoredValue::Int(60));
        assert_eq!(change.announcement.topic, Topic::Brightness);
        assert_eq!(change.announcement.payload, "60");
        assert_eq!(change.frame, render(store.active()));

        // Only the active set changed
        assert_eq!(store.set(Phase::Night).params.brightness(), 60);
        assert_eq!(store.set(Phase::Day).params, day());

        // Repeating the same value is now a no-op
        assert_eq!(
            store.apply_update(FieldValue::Brightness(60)),
            Ok(UpdateOutcome::Unchanged)
        );
    }

    #[test]
    fn test_update_survives_phase_round_trip() {
        let mut store = ParameterStore::new(day(), night(), Phase::Day);
        store.apply_update(FieldValue::Amplifier(55)).unwrap();
        store.activate(Phase::Night);
        store.activate(Phase::Day);
        assert_eq!(store.active().amplifier(), 55);
    }

    #[test]
    fn test_rejected_update_keeps_state() {
        let mut store = ParameterStore::new(day(), night(), Phase::Day);
        assert!(store.apply_update(FieldValue::WhiteTarget(101)).is_err());
        assert!(store.apply_update(FieldValue::Tau(0.0)).is_err());
        assert_eq!(*store.active(), day());
    }

    #[test]
    fn test_status_off_renders_dark() {
        let mut store = ParameterStore::new(day(), night(), Phase::Day);
        let UpdateOutcome::Changed(change) = store.apply_update(FieldValue::Status(false)).unwrap()
        else {
            panic!("expected a change");
        };
        assert!(change.frame.is_dark());
        assert_eq!(change.frame.len(), 41);
    }
}
