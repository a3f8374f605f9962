//! Persisted state layout
//!
//! One record per field, keyed by an opaque sequential identifier and
//! namespaced per phase (`day`, `night`). Phase boundaries live in the
//! `clock` namespace. The storage itself is a collaborator behind
//! [`KeyValueStore`]; this module only knows the layout and how to encode
//! and decode values.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use derive_more::{Display, Error};
use log::{debug, info, warn};
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::params::{Field, FieldValue, RenderParams};
use crate::phase::{Phase, PhaseBoundary};

/// Namespace holding both phase boundaries
pub const CLOCK_NAMESPACE: &str = "clock";

/// A single persisted record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Int(i64),
    Float(f32),
}

impl fmt::Display for StoredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.3}"),
        }
    }
}

/// A record that does not decode into the field it was read for
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum StoredValueError {
    #[display("record {key} holds {found}, expected an integer")]
    NotInteger { key: &'static str, found: StoredValue },
    #[display("record {key} holds {found}, which is out of range")]
    OutOfRange { key: &'static str, found: StoredValue },
}

/// Result of a read: the stored value, or the supplied default when the record is absent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stored<T> {
    Present(T),
    Defaulted(T),
}

impl<T> Stored<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Present(v) | Self::Defaulted(v) => v,
        }
    }

    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Namespaced key-value storage collaborator
pub trait KeyValueStore {
    type Error: fmt::Display;

    /// `None` when the record does not exist
    fn read(&self, namespace: &str, key: &str) -> Option<StoredValue>;

    fn write(&mut self, namespace: &str, key: &str, value: StoredValue) -> Result<(), Self::Error>;
}

/// In-memory [`KeyValueStore`]; serializes as `{ namespace: { key: value } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    namespaces: BTreeMap<String, BTreeMap<String, StoredValue>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all namespaces
    #[must_use]
    pub fn len(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    type Error = Infallible;

    fn read(&self, namespace: &str, key: &str) -> Option<StoredValue> {
        self.namespaces.get(namespace)?.get(key).copied()
    }

    fn write(&mut self, namespace: &str, key: &str, value: StoredValue) -> Result<(), Self::Error> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Record key of a parameter field within its phase namespace
#[must_use]
pub const fn field_key(field: Field) -> &'static str {
    match field {
        Field::Status => "Value01",
        Field::Brightness => "Value02",
        Field::Amplifier => "Value03",
        Field::Tau => "Value04",
        Field::ColorBottom => "Value05",
        Field::ColorTop => "Value06",
        Field::WhiteTarget => "Value07",
    }
}

/// Record key of a phase's start boundary within [`CLOCK_NAMESPACE`]
#[must_use]
pub const fn boundary_key(phase: Phase) -> &'static str {
    match phase {
        Phase::Day => "Value01",
        Phase::Night => "Value02",
    }
}

const fn pack_color(color: RGB8) -> i64 {
    ((color.r as i64) << 16) | ((color.g as i64) << 8) | color.b as i64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn unpack_color(packed: i64) -> RGB8 {
    // Callers check 0..=0xFF_FFFF first, so each masked byte fits
    RGB8 {
        r: ((packed >> 16) & 0xFF) as u8,
        g: ((packed >> 8) & 0xFF) as u8,
        b: (packed & 0xFF) as u8,
    }
}

/// Encode a field value as a record. Colors pack into `0xRRGGBB`.
#[must_use]
pub fn to_stored(value: FieldValue) -> StoredValue {
    match value {
        FieldValue::Status(on) => StoredValue::Int(i64::from(on)),
        FieldValue::Brightness(v) | FieldValue::WhiteTarget(v) => StoredValue::Int(i64::from(v)),
        FieldValue::Amplifier(v) => StoredValue::Int(i64::from(v)),
        FieldValue::Tau(v) => StoredValue::Float(v),
        FieldValue::ColorBottom(c) | FieldValue::ColorTop(c) => StoredValue::Int(pack_color(c)),
    }
}

/// Decode and validate a record read for `field`.
pub fn from_stored(field: Field, stored: StoredValue) -> Result<FieldValue, StoredValueError> {
    let key = field_key(field);
    let out_of_range = || StoredValueError::OutOfRange { key, found: stored };

    #[allow(clippy::cast_precision_loss)]
    let value = match (field, stored) {
        (Field::Tau, StoredValue::Float(tau)) => FieldValue::Tau(tau),
        (Field::Tau, StoredValue::Int(tau)) => FieldValue::Tau(tau as f32),
        (_, StoredValue::Float(_)) => {
            return Err(StoredValueError::NotInteger { key, found: stored })
        }
        (Field::Status, StoredValue::Int(0)) => FieldValue::Status(false),
        (Field::Status, StoredValue::Int(1)) => FieldValue::Status(true),
        (Field::Status, StoredValue::Int(_)) => return Err(out_of_range()),
        (Field::Brightness, StoredValue::Int(v)) => {
            FieldValue::Brightness(u8::try_from(v).map_err(|_| out_of_range())?)
        }
        (Field::WhiteTarget, StoredValue::Int(v)) => {
            FieldValue::WhiteTarget(u8::try_from(v).map_err(|_| out_of_range())?)
        }
        (Field::Amplifier, StoredValue::Int(v)) => {
            FieldValue::Amplifier(i8::try_from(v).map_err(|_| out_of_range())?)
        }
        (Field::ColorBottom | Field::ColorTop, StoredValue::Int(v)) => {
            if !(0..=0xFF_FFFF).contains(&v) {
                return Err(out_of_range());
            }
            if field == Field::ColorBottom {
                FieldValue::ColorBottom(unpack_color(v))
            } else {
                FieldValue::ColorTop(unpack_color(v))
            }
        }
    };
    value.validate().map_err(|_| out_of_range())?;
    Ok(value)
}

/// Read one field of `phase`, falling back to `default` (which also names the field).
///
/// An undecodable record is logged and treated as absent.
pub fn read_field<S: KeyValueStore + ?Sized>(
    store: &S,
    phase: Phase,
    default: FieldValue,
) -> Stored<FieldValue> {
    let field = default.field();
    let key = field_key(field);
    match store.read(phase.namespace(), key) {
        Some(raw) => match from_stored(field, raw) {
            Ok(value) => {
                debug!("Storage: {phase} {field} ({key}) read with value {value}");
                Stored::Present(value)
            }
            Err(e) => {
                warn!("Storage: ignoring {phase} {field}: {e}, using default {default}");
                Stored::Defaulted(default)
            }
        },
        None => {
            info!("Storage: {phase} {field} ({key}) does not exist, using default {default}");
            Stored::Defaulted(default)
        }
    }
}

/// Load a full parameter set for `phase`; absent fields come from `defaults`.
pub fn load_params<S: KeyValueStore + ?Sized>(
    store: &S,
    phase: Phase,
    defaults: &RenderParams,
) -> RenderParams {
    Field::ALL.iter().fold(*defaults, |params, &field| {
        let value = read_field(store, phase, defaults.get(field)).into_inner();
        // from_stored already validated the value
        params.with(value).unwrap_or(params)
    })
}

/// Read the start boundary of `phase` from [`CLOCK_NAMESPACE`].
pub fn read_boundary<S: KeyValueStore + ?Sized>(
    store: &S,
    phase: Phase,
    default: PhaseBoundary,
) -> Stored<PhaseBoundary> {
    let key = boundary_key(phase);
    let decoded = store.read(CLOCK_NAMESPACE, key).map(|raw| match raw {
        StoredValue::Int(minutes) => u16::try_from(minutes)
            .ok()
            .and_then(|m| PhaseBoundary::from_minutes(m).ok())
            .ok_or(StoredValueError::OutOfRange { key, found: raw }),
        StoredValue::Float(_) => Err(StoredValueError::NotInteger { key, found: raw }),
    });
    match decoded {
        Some(Ok(boundary)) => {
            debug!("Storage: {phase} start ({key}) read with value {boundary}");
            Stored::Present(boundary)
        }
        Some(Err(e)) => {
            warn!("Storage: ignoring {phase} start: {e}, using default {default}");
            Stored::Defaulted(default)
        }
        None => {
            info!("Storage: {phase} start ({key}) does not exist, using default {default}");
            Stored::Defaulted(default)
        }
    }
}

/// A single record write requested by the core, for the caller to perform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistWrite {
    pub namespace: &'static str,
    pub key: &'static str,
    pub value: StoredValue,
}

impl PersistWrite {
    /// Write of one parameter field, tagged with its phase
    #[must_use]
    pub fn field(phase: Phase, value: FieldValue) -> Self {
        Self {
            namespace: phase.namespace(),
            key: field_key(value.field()),
            value: to_stored(value),
        }
    }

    /// Write of a phase start boundary, as minutes since midnight
    #[must_use]
    pub fn boundary(phase: Phase, boundary: PhaseBoundary) -> Self {
        Self {
            namespace: CLOCK_NAMESPACE,
            key: boundary_key(phase),
            value: StoredValue::Int(i64::from(boundary.minutes_since_midnight())),
        }
    }

    pub fn apply<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), S::Error> {
        debug!(
            "Storage: writing {}/{} = {}",
            self.namespace, self.key, self.value
        );
        store.write(self.namespace, self.key, self.value)
    }
}
