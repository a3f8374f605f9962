//! Gradient rendering core for the Dusklight strip controller
//!
//! This library holds everything that does not touch hardware or the
//! network: the gradient renderer, the day/night phase clock, the two
//! parameter sets, the message payload grammar and the persisted record
//! layout. It is hardware-agnostic and can be tested on the host.
//!
//! ```
//! use dusklight_gradient_lib::{render, RawRenderParams, RenderParams, RGB8};
//!
//! let params = RenderParams::new(RawRenderParams {
//!     pixel_count: 5,
//!     status: true,
//!     brightness: 100,
//!     amplifier: 0,
//!     tau: 1.0,
//!     color_bottom: RGB8::new(0, 0, 0),
//!     color_top: RGB8::new(255, 255, 255),
//!     white_target: 100,
//! })
//! .unwrap();
//! let frame = render(&params);
//! assert_eq!(frame.len(), 5);
//! assert_eq!(frame.pixels()[4].w, 255);
//! ```

pub mod color;
pub mod params;
pub mod payload;
pub mod persist;
pub mod phase;
pub mod render;
pub mod store;

pub use rgb::RGB8;

pub use color::Rgbw;
pub use params::{Field, FieldValue, ParamsError, RawRenderParams, RenderParams};
pub use payload::{parse_message, Announcement, Command, PayloadError, Topic};
pub use persist::{KeyValueStore, MemoryStore, PersistWrite, Stored, StoredValue};
pub use phase::{is_day, Phase, PhaseBoundary, PhaseClock, PhaseTracker};
pub use render::{render, Frame};
pub use store::{Activation, Change, ParameterSet, ParameterStore, UpdateOutcome};
