//! Text payload grammar for the messaging interface
//!
//! Every inbound message carries one value. Parsing either yields a typed
//! [`Command`] or a [`PayloadError`]; nothing is mutated on failure.
//!
//! | Topic | Payload |
//! |---|---|
//! | `LEDStatus` | `0` or `1` |
//! | `LEDBrightness`, `LEDWhite` | `0`..=`100` |
//! | `LEDAmplifier` | optional `-`, then `0`..=`100` |
//! | `LEDTau` | tau × 1000 as a decimal integer |
//! | `LEDColorBottom`, `LEDColorTop` | `[ddd,ddd,ddd]`, each channel a fixed 3-character field padded with spaces |
//! | `LEDDayStart`, `LEDNightStart` | `H:MM`, no leading zero on the hour |
//! | `LEDUpdate` | ignored; requests a full announcement |

use derive_more::{Display, Error};
use rgb::RGB8;

use crate::params::{Field, FieldValue, RenderParams, PERCENT_MAX};
use crate::phase::{Phase, PhaseBoundary, PhaseClock};

/// Largest accepted scaled tau (tau = 1000.0)
pub const TAU_SCALED_MAX: u32 = 1_000_000;

/// Grammar rejection of an inbound payload
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum PayloadError {
    #[display("payload is empty")]
    Empty,
    #[display("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },
    #[display("malformed payload, expected {expected}")]
    Malformed { expected: &'static str },
    #[display("value {value} is outside {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[display("unknown topic {topic:?}")]
    UnknownTopic { topic: String },
}

/// Messaging topics, inbound and announced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Status,
    Brightness,
    Amplifier,
    Tau,
    ColorBottom,
    ColorTop,
    WhiteTarget,
    DayStart,
    NightStart,
    /// Announce-only: the active phase
    Phase,
    /// Inbound-only: request a full announcement
    Update,
}

impl Topic {
    /// Topics a client may publish to
    pub const INBOUND: [Self; 10] = [
        Self::Status,
        Self::Brightness,
        Self::Amplifier,
        Self::Tau,
        Self::ColorBottom,
        Self::ColorTop,
        Self::WhiteTarget,
        Self::DayStart,
        Self::NightStart,
        Self::Update,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Status => "LEDStatus",
            Self::Brightness => "LEDBrightness",
            Self::Amplifier => "LEDAmplifier",
            Self::Tau => "LEDTau",
            Self::ColorBottom => "LEDColorBottom",
            Self::ColorTop => "LEDColorTop",
            Self::WhiteTarget => "LEDWhite",
            Self::DayStart => "LEDDayStart",
            Self::NightStart => "LEDNightStart",
            Self::Phase => "LEDPhase",
            Self::Update => "LEDUpdate",
        }
    }

    /// Inbound topic with this name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::INBOUND.into_iter().find(|t| t.name() == name)
    }

    #[must_use]
    pub const fn for_field(field: Field) -> Self {
        match field {
            Field::Status => Self::Status,
            Field::Brightness => Self::Brightness,
            Field::Amplifier => Self::Amplifier,
            Field::Tau => Self::Tau,
            Field::ColorBottom => Self::ColorBottom,
            Field::ColorTop => Self::ColorTop,
            Field::WhiteTarget => Self::WhiteTarget,
        }
    }

    /// Topic the current value is announced on
    #[must_use]
    pub fn state_topic(self) -> String {
        format!("{}/state", self.name())
    }
}

/// A parsed inbound message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Replace one field of the active parameter set
    Set(FieldValue),
    /// Move the start of a phase
    SetBoundary {
        phase: Phase,
        boundary: PhaseBoundary,
    },
    /// Publish the full active state
    Announce,
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub topic: Topic,
    pub payload: String,
}

impl Announcement {
    fn new(topic: Topic, payload: String) -> Self {
        Self { topic, payload }
    }
}

/// Parse one inbound message into a [`Command`].
pub fn parse_message(topic: &str, payload: &str) -> Result<Command, PayloadError> {
    let topic = Topic::from_name(topic).ok_or_else(|| PayloadError::UnknownTopic {
        topic: topic.to_string(),
    })?;
    let command = match topic {
        Topic::Status => Command::Set(FieldValue::Status(parse_status(payload)?)),
        Topic::Brightness => Command::Set(FieldValue::Brightness(parse_percent(payload)?)),
        Topic::WhiteTarget => Command::Set(FieldValue::WhiteTarget(parse_percent(payload)?)),
        Topic::Amplifier => Command::Set(FieldValue::Amplifier(parse_amplifier(payload)?)),
        Topic::Tau => Command::Set(FieldValue::Tau(parse_tau(payload)?)),
        Topic::ColorBottom => Command::Set(FieldValue::ColorBottom(parse_color(payload)?)),
        Topic::ColorTop => Command::Set(FieldValue::ColorTop(parse_color(payload)?)),
        Topic::DayStart => Command::SetBoundary {
            phase: Phase::Day,
            boundary: parse_boundary(payload)?,
        },
        Topic::NightStart => Command::SetBoundary {
            phase: Phase::Night,
            boundary: parse_boundary(payload)?,
        },
        Topic::Update => Command::Announce,
        // Announce-only topics are not part of INBOUND
        Topic::Phase => {
            return Err(PayloadError::UnknownTopic {
                topic: topic.name().to_string(),
            })
        }
    };
    Ok(command)
}

/// Accumulate a run of ASCII digits. `offset` is the position of `digits`
/// inside the full payload, for error reporting.
fn parse_digits(digits: &str, offset: usize) -> Result<u32, PayloadError> {
    if digits.is_empty() {
        return Err(PayloadError::Empty);
    }
    let mut value: u32 = 0;
    for (i, ch) in digits.char_indices() {
        let digit = ch.to_digit(10).ok_or(PayloadError::UnexpectedChar {
            found: ch,
            offset: offset + i,
        })?;
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit))
            .ok_or(PayloadError::OutOfRange {
                value: i64::from(u32::MAX),
                min: 0,
                max: i64::from(u32::MAX),
            })?;
    }
    Ok(value)
}

fn check_max(value: u32, min: u32, max: u32) -> Result<u32, PayloadError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(PayloadError::OutOfRange {
            value: i64::from(value),
            min: i64::from(min),
            max: i64::from(max),
        })
    }
}

/// Split surrounding whitespace off, keeping the offset of the remainder
fn trimmed(payload: &str) -> (&str, usize) {
    let start = payload.len() - payload.trim_start().len();
    (payload.trim(), start)
}

/// `0` or `1`
pub fn parse_status(payload: &str) -> Result<bool, PayloadError> {
    let (s, offset) = trimmed(payload);
    let value = check_max(parse_digits(s, offset)?, 0, 1)?;
    Ok(value == 1)
}

/// Decimal percentage `0..=100`
pub fn parse_percent(payload: &str) -> Result<u8, PayloadError> {
    let (s, offset) = trimmed(payload);
    let value = check_max(parse_digits(s, offset)?, 0, u32::from(PERCENT_MAX))?;
    Ok(u8::try_from(value).unwrap_or(PERCENT_MAX))
}

/// Optional leading `-`, then a magnitude `0..=100`
pub fn parse_amplifier(payload: &str) -> Result<i8, PayloadError> {
    let (s, offset) = trimmed(payload);
    let (negative, digits, offset) = match s.strip_prefix('-') {
        Some(rest) => (true, rest, offset + 1),
        None => (false, s, offset),
    };
    let magnitude = parse_digits(digits, offset)?;
    let max = u32::from(PERCENT_MAX);
    if magnitude > max {
        let signed = i64::from(magnitude);
        return Err(PayloadError::OutOfRange {
            value: if negative { -signed } else { signed },
            min: -i64::from(max),
            max: i64::from(max),
        });
    }
    let magnitude = i8::try_from(magnitude).unwrap_or(i8::MAX);
    Ok(if negative { -magnitude } else { magnitude })
}

/// tau × 1000 as a decimal integer; zero is rejected
#[allow(clippy::cast_precision_loss)]
pub fn parse_tau(payload: &str) -> Result<f32, PayloadError> {
    let (s, offset) = trimmed(payload);
    let scaled = check_max(parse_digits(s, offset)?, 1, TAU_SCALED_MAX)?;
    // scaled <= 1_000_000 is exactly representable in f32
    Ok(scaled as f32 / 1000.0)
}

/// Total width of a color payload, `[ddd,ddd,ddd]`
const COLOR_WIDTH: usize = 13;

/// Byte offsets of the three channel fields inside a color payload
const COLOR_FIELDS: [usize; 3] = [1, 5, 9];

/// `[ddd,ddd,ddd]`: three fixed-width fields of 3 characters at offsets
/// 1, 5 and 9. Digits within a field may be padded with spaces on either
/// side; a field of spaces only is rejected.
pub fn parse_color(payload: &str) -> Result<RGB8, PayloadError> {
    const EXPECTED: &str = "[ddd,ddd,ddd] with channels 0..=255";
    let (s, offset) = trimmed(payload);
    if s.is_empty() {
        return Err(PayloadError::Empty);
    }
    let bytes = s.as_bytes();
    let framed = bytes.len() == COLOR_WIDTH
        && bytes[0] == b'['
        && bytes[4] == b','
        && bytes[8] == b','
        && bytes[12] == b']';
    if !framed {
        return Err(PayloadError::Malformed { expected: EXPECTED });
    }

    let mut channels = [0u8; 3];
    for (slot, start) in channels.iter_mut().zip(COLOR_FIELDS) {
        // None on a multi-byte character straddling the field
        let field = s
            .get(start..start + 3)
            .ok_or(PayloadError::Malformed { expected: EXPECTED })?;
        let lead = field.len() - field.trim_start_matches(' ').len();
        let digits = field.trim_matches(' ');
        if digits.is_empty() {
            return Err(PayloadError::Malformed { expected: EXPECTED });
        }
        let value = check_max(parse_digits(digits, offset + start + lead)?, 0, 255)?;
        *slot = u8::try_from(value).unwrap_or(u8::MAX);
    }
    Ok(RGB8::new(channels[0], channels[1], channels[2]))
}

/// `H:MM`, hour `0..=23` without a leading zero, minute `00..=59`
pub fn parse_boundary(payload: &str) -> Result<PhaseBoundary, PayloadError> {
    const EXPECTED: &str = "H:MM";
    let (s, offset) = trimmed(payload);
    if s.is_empty() {
        return Err(PayloadError::Empty);
    }
    let (hour, minute) = s
        .split_once(':')
        .ok_or(PayloadError::Malformed { expected: EXPECTED })?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return Err(PayloadError::Malformed { expected: EXPECTED });
    }
    if hour.len() == 2 && hour.starts_with('0') {
        return Err(PayloadError::UnexpectedChar { found: '0', offset });
    }
    let hour = check_max(parse_digits(hour, offset)?, 0, 23)?;
    let minute = check_max(parse_digits(minute, offset + s.len() - 2)?, 0, 59)?;
    let hour = u8::try_from(hour).unwrap_or(u8::MAX);
    let minute = u8::try_from(minute).unwrap_or(u8::MAX);
    PhaseBoundary::new(hour, minute).map_err(|_| PayloadError::Malformed { expected: EXPECTED })
}

/// `[  r,  g,  b]`, each channel right-aligned in width 3
#[must_use]
pub fn format_color(color: RGB8) -> String {
    format!("[{:>3},{:>3},{:>3}]", color.r, color.g, color.b)
}

/// `H:MM` with zero-padded minutes
#[must_use]
pub fn format_boundary(boundary: PhaseBoundary) -> String {
    format!("{}:{:02}", boundary.hour(), boundary.minute())
}

/// tau × 1000, rounded to an integer
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn format_tau(tau: f32) -> String {
    // Validated tau is positive and finite
    let scaled = (f64::from(tau) * 1000.0).round().max(0.0) as u64;
    scaled.to_string()
}

/// Payload for a field value, in the inbound grammar
#[must_use]
pub fn encode_field(value: FieldValue) -> String {
    match value {
        FieldValue::Tau(tau) => format_tau(tau),
        other => other.to_string(),
    }
}

/// Announcements for the active phase and every field of its parameter set
#[must_use]
pub fn announce_params(phase: Phase, params: &RenderParams) -> Vec<Announcement> {
    let mut out = Vec::with_capacity(Field::ALL.len() + 1);
    out.push(Announcement::new(Topic::Phase, phase.to_string()));
    out.extend(Field::ALL.iter().map(|&field| {
        Announcement::new(Topic::for_field(field), encode_field(params.get(field)))
    }));
    out
}

/// Announcements for both phase boundaries
#[must_use]
pub fn announce_clock(clock: &PhaseClock) -> Vec<Announcement> {
    vec![
        Announcement::new(Topic::DayStart, format_boundary(clock.day_start())),
        Announcement::new(Topic::NightStart, format_boundary(clock.night_start())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RawRenderParams;

    #[test]
    fn test_color_round_trip() {
        let color = parse_color("[  5, 55,255]").unwrap();
        assert_eq!(color, RGB8::new(5, 55, 255));
        assert_eq!(format_color(color), "[  5, 55,255]");
    }

    #[test]
    fn test_color_fixed_width_fields() {
        assert_eq!(parse_color("[255,255,255]").unwrap(), RGB8::new(255, 255, 255));
        assert_eq!(parse_color("[  0,193,255]").unwrap(), RGB8::new(0, 193, 255));
        // Padding may sit on either side of the digits inside a field
        assert_eq!(parse_color("[5  ,55 ,  0]").unwrap(), RGB8::new(5, 55, 0));
        assert_eq!(parse_color("[ 5 , 55,255]\r\n").unwrap(), RGB8::new(5, 55, 255));
    }

    #[test]
    fn test_color_rejects_wrong_width() {
        for payload in [
            "[1,2,3]",
            "[0,193,255]",
            "[0005,055,255]",
            "[  5,55,255 ]",
            "[  5, 55,255 ]",
            "(  5, 55,255)",
            "[  5; 55;255]",
            "[  5, 55,255,",
        ] {
            assert!(
                matches!(parse_color(payload), Err(PayloadError::Malformed { .. })),
                "{payload:?} should be malformed"
            );
        }
        assert_eq!(
            parse_color("[  5,5 5,255]"),
            Err(PayloadError::UnexpectedChar {
                found: ' ',
                offset: 6
            })
        );
    }

    #[test]
    fn test_color_rejects_malformed() {
        assert_eq!(parse_color(""), Err(PayloadError::Empty));
        assert!(matches!(
            parse_color("  5, 55,255"),
            Err(PayloadError::Malformed { .. })
        ));
        assert!(matches!(
            parse_color("[  5, 55]"),
            Err(PayloadError::Malformed { .. })
        ));
        assert!(matches!(
            parse_color("[  5, 55,255,  1]"),
            Err(PayloadError::Malformed { .. })
        ));
        assert!(matches!(
            parse_color("[   , 55,255]"),
            Err(PayloadError::Malformed { .. })
        ));
        assert_eq!(
            parse_color("[256,  0,  0]"),
            Err(PayloadError::OutOfRange {
                value: 256,
                min: 0,
                max: 255
            })
        );
        assert_eq!(
            parse_color("[  5, x5,255]"),
            Err(PayloadError::UnexpectedChar {
                found: 'x',
                offset: 6
            })
        );
    }

    #[test]
    fn test_status() {
        assert_eq!(parse_status("0"), Ok(false));
        assert_eq!(parse_status("1"), Ok(true));
        assert!(parse_status("2").is_err());
        assert!(parse_status("").is_err());
        assert!(parse_status("on").is_err());
    }

    #[test]
    fn test_percent() {
        assert_eq!(parse_percent("0"), Ok(0));
        assert_eq!(parse_percent("70"), Ok(70));
        assert_eq!(parse_percent(" 100\r\n"), Ok(100));
        assert_eq!(
            parse_percent("101"),
            Err(PayloadError::OutOfRange {
                value: 101,
                min: 0,
                max: 100
            })
        );
        assert!(parse_percent("-5").is_err());
        assert!(parse_percent("99999999999").is_err());
    }

    #[test]
    fn test_amplifier() {
        assert_eq!(parse_amplifier("0"), Ok(0));
        assert_eq!(parse_amplifier("-0"), Ok(0));
        assert_eq!(parse_amplifier("45"), Ok(45));
        assert_eq!(parse_amplifier("-100"), Ok(-100));
        assert_eq!(
            parse_amplifier("-101"),
            Err(PayloadError::OutOfRange {
                value: -101,
                min: -100,
                max: 100
            })
        );
        assert_eq!(parse_amplifier("-"), Err(PayloadError::Empty));
        assert_eq!(
            parse_amplifier("--5"),
            Err(PayloadError::UnexpectedChar {
                found: '-',
                offset: 1
            })
        );
    }

    #[test]
    fn test_tau() {
        assert!((parse_tau("5125").unwrap() - 5.125).abs() < f32::EPSILON);
        assert!((parse_tau("1").unwrap() - 0.001).abs() < f32::EPSILON);
        assert!(parse_tau("0").is_err());
        assert!(parse_tau("1000001").is_err());
        assert!(parse_tau("5.125").is_err());
        assert_eq!(format_tau(5.125), "5125");
        assert_eq!(format_tau(8.2), "8200");
    }

    #[test]
    fn test_boundary() {
        assert_eq!(
            parse_boundary("13:30").unwrap(),
            PhaseBoundary::new(13, 30).unwrap()
        );
        assert_eq!(
            parse_boundary("6:05").unwrap(),
            PhaseBoundary::new(6, 5).unwrap()
        );
        assert_eq!(
            parse_boundary("0:05").unwrap(),
            PhaseBoundary::new(0, 5).unwrap()
        );
        assert_eq!(
            parse_boundary("06:05"),
            Err(PayloadError::UnexpectedChar {
                found: '0',
                offset: 0
            })
        );
        assert!(parse_boundary("00:30").is_err());
        assert!(parse_boundary("123:00").is_err());
        assert!(parse_boundary("24:00").is_err());
        assert!(parse_boundary("12:60").is_err());
        assert!(parse_boundary("12:5").is_err());
        assert!(parse_boundary("1230").is_err());
        assert!(parse_boundary(":30").is_err());
        assert_eq!(format_boundary(PhaseBoundary::new(6, 5).unwrap()), "6:05");
    }

    #[test]
    fn test_parse_message_dispatch() {
        assert_eq!(
            parse_message("LEDBrightness", "70"),
            Ok(Command::Set(FieldValue::Brightness(70)))
        );
        assert_eq!(
            parse_message("LEDWhite", "20"),
            Ok(Command::Set(FieldValue::WhiteTarget(20)))
        );
        assert_eq!(
            parse_message("LEDColorBottom", "[118,  0,255]"),
            Ok(Command::Set(FieldValue::ColorBottom(RGB8::new(118, 0, 255))))
        );
        assert_eq!(
            parse_message("LEDNightStart", "23:30"),
            Ok(Command::SetBoundary {
                phase: Phase::Night,
                boundary: PhaseBoundary::new(23, 30).unwrap()
            })
        );
        assert_eq!(parse_message("LEDUpdate", ""), Ok(Command::Announce));
        assert_eq!(
            parse_message("LEDQuickness", "5"),
            Err(PayloadError::UnknownTopic {
                topic: "LEDQuickness".to_string()
            })
        );
        assert!(parse_message("LEDPhase", "day").is_err());
    }

    #[test]
    fn test_announced_payloads_parse_back() {
        let params = RenderParams::new(RawRenderParams {
            pixel_count: 41,
            status: true,
            brightness: 30,
            amplifier: -25,
            tau: 5.125,
            color_bottom: RGB8::new(118, 0, 255),
            color_top: RGB8::new(255, 0, 119),
            white_target: 10,
        })
        .unwrap();
        let announcements = announce_params(Phase::Night, &params);
        assert_eq!(announcements.len(), Field::ALL.len() + 1);
        assert_eq!(announcements[0].topic, Topic::Phase);
        assert_eq!(announcements[0].payload, "night");
        for a in &announcements[1..] {
            match parse_message(a.topic.name(), &a.payload).unwrap() {
                Command::Set(value) => assert_eq!(params.get(value.field()), value),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_state_topic() {
        assert_eq!(Topic::Brightness.state_topic(), "LEDBrightness/state");
        assert_eq!(Topic::from_name("LEDTau"), Some(Topic::Tau));
        assert_eq!(Topic::from_name("LEDPhase"), None);
    }
}
