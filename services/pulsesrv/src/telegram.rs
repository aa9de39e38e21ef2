//! S0 pulse counter telegram codec
//!
//! The transmitter emits one ASCII line per interval. Fields are separated
//! by `:`. A data line has exactly 19 fields:
//!
//! ```text
//! ID:<device_id>:_:<interval>:_:<p0>:<t0>:_:<p1>:<t1>:_:<p2>:<t2>:_:<p3>:<t3>:_:<p4>:<t4>
//! ```
//!
//! where `p<i>` is the pulse count of channel `i` since the previous
//! telegram, `t<i>` the device-side lifetime total and `_` a reserved field
//! that is required to be present but never interpreted. The device also
//! emits a two-field header line `/42001:<anything>` that carries no data.

use std::fmt;

use thiserror::Error;

/// Number of independently counted channels
pub const CHANNEL_COUNT: usize = 5;

/// Leading token of the informational header line
pub const HEADER_TOKEN: &str = "/42001";

/// Leading token of a data line
pub const TELEGRAM_TOKEN: &str = "ID";

/// Number of `:`-separated fields in a data line
pub const TELEGRAM_FIELDS: usize = 19;

const HEADER_FIELDS: usize = 2;
const FIELD_SEPARATOR: char = ':';
const DEVICE_ID_FIELD: usize = 1;
const INTERVAL_FIELD: usize = 3;
const FIRST_CHANNEL_FIELD: usize = 5;
const CHANNEL_STRIDE: usize = 3;

/// One decoded status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telegram {
    /// Transmitting device
    pub device_id: u64,
    /// Seconds covered by this telegram
    pub interval: u64,
    /// Pulses per channel since the previous telegram
    pub pulses: [u64; CHANNEL_COUNT],
    /// Device-side lifetime totals per channel (informational)
    pub pulses_total: [u64; CHANNEL_COUNT],
}

impl Telegram {
    /// Sum of pulses across all channels
    pub fn pulse_sum(&self) -> u64 {
        self.pulses.iter().fold(0u64, |acc, p| acc.saturating_add(*p))
    }
}

impl fmt::Display for Telegram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &[u64]| {
            values
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        write!(
            f,
            "Telegram(device_id={}; interval={}; pulses={}; total={})",
            self.device_id,
            self.interval,
            join(&self.pulses),
            join(&self.pulses_total)
        )
    }
}

/// Result of decoding one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Periodic header line, no payload
    Header,
    /// Data line
    Telegram(Telegram),
}

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// First field is neither the header nor the data token
    LeadingToken(String),
    /// Data line without exactly 19 fields
    FieldCount(usize),
    /// A numeric position holds something that is not a non-negative integer
    NotNumeric { field: usize, value: String },
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::LeadingToken(token) => write!(f, "unexpected leading token {token:?}"),
            DecodeErrorKind::FieldCount(count) => {
                write!(f, "expected {TELEGRAM_FIELDS} fields, got {count}")
            },
            DecodeErrorKind::NotNumeric { field, value } => {
                write!(f, "field {field} is not a non-negative integer: {value:?}")
            },
        }
    }
}

/// A line that is neither a header nor a well-formed telegram
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("illegal input: {line:?} ({kind})")]
pub struct DecodeError {
    /// The offending line, trailing whitespace removed
    pub line: String,
    pub kind: DecodeErrorKind,
}

/// Decode one line of telegram text.
///
/// Trailing whitespace (including `\r\n`) is ignored. Pure function.
pub fn decode(line: &str) -> Result<Frame, DecodeError> {
    let line = line.trim_end();
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let reject = |kind| DecodeError {
        line: line.to_string(),
        kind,
    };

    if fields.len() == HEADER_FIELDS && fields[0] == HEADER_TOKEN {
        return Ok(Frame::Header);
    }
    if fields[0] != TELEGRAM_TOKEN {
        return Err(reject(DecodeErrorKind::LeadingToken(fields[0].to_string())));
    }
    if fields.len() != TELEGRAM_FIELDS {
        return Err(reject(DecodeErrorKind::FieldCount(fields.len())));
    }

    let number = |field: usize| -> Result<u64, DecodeError> {
        let value = fields[field];
        value.trim().parse::<u64>().map_err(|_| {
            reject(DecodeErrorKind::NotNumeric {
                field,
                value: value.to_string(),
            })
        })
    };

    let mut pulses = [0u64; CHANNEL_COUNT];
    let mut pulses_total = [0u64; CHANNEL_COUNT];
    for channel in 0..CHANNEL_COUNT {
        let base = FIRST_CHANNEL_FIELD + CHANNEL_STRIDE * channel;
        pulses[channel] = number(base)?;
        pulses_total[channel] = number(base + 1)?;
    }

    Ok(Frame::Telegram(Telegram {
        device_id: number(DEVICE_ID_FIELD)?,
        interval: number(INTERVAL_FIELD)?,
        pulses,
        pulses_total,
    }))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "ID:7:X:60:X:3:103:X:0:50:X:1:21:X:0:9:X:2:77";

    /// Wire form of `telegram` with `_` in every reserved position
    fn encode(telegram: &Telegram) -> String {
        let mut fields = vec![
            TELEGRAM_TOKEN.to_string(),
            telegram.device_id.to_string(),
            "_".to_string(),
            telegram.interval.to_string(),
        ];
        for channel in 0..CHANNEL_COUNT {
            fields.push("_".to_string());
            fields.push(telegram.pulses[channel].to_string());
            fields.push(telegram.pulses_total[channel].to_string());
        }
        fields.join(":")
    }

    fn expect_telegram(line: &str) -> Telegram {
        match decode(line) {
            Ok(Frame::Telegram(t)) => t,
            other => panic!("expected telegram for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_sample_telegram() {
        let telegram = expect_telegram(SAMPLE);
        assert_eq!(telegram.device_id, 7);
        assert_eq!(telegram.interval, 60);
        assert_eq!(telegram.pulses, [3, 0, 1, 0, 2]);
        assert_eq!(telegram.pulses_total, [103, 50, 21, 9, 77]);
        assert_eq!(telegram.pulse_sum(), 6);
    }

    #[test]
    fn test_decode_strips_line_terminator() {
        let telegram = expect_telegram(&format!("{SAMPLE}\r\n"));
        assert_eq!(telegram.pulses, [3, 0, 1, 0, 2]);
    }

    #[test]
    fn test_decode_accepts_padded_fields() {
        let line = "ID:8237:I:10:M1: 3:103:M2:0:50:M3:1:21:M4:0:9:M5:00002:77";
        let telegram = expect_telegram(line);
        assert_eq!(telegram.device_id, 8237);
        assert_eq!(telegram.pulses, [3, 0, 1, 0, 2]);
    }

    #[test]
    fn test_decode_header() {
        assert_eq!(decode("/42001:S0 pulse counter"), Ok(Frame::Header));
        assert_eq!(decode("/42001:\n"), Ok(Frame::Header));
    }

    #[test]
    fn test_header_token_with_extra_fields_is_rejected() {
        let err = decode("/42001:a:b").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::LeadingToken("/42001".to_string()));
    }

    #[test]
    fn test_wrong_leading_token() {
        let line = SAMPLE.replacen("ID", "XX", 1);
        let err = decode(&line).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::LeadingToken("XX".to_string()));
        assert_eq!(err.line, line);
    }

    #[test]
    fn test_wrong_field_count() {
        let err = decode("ID:7:X:60").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::FieldCount(4));

        let err = decode(&format!("{SAMPLE}:extra")).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::FieldCount(20));
    }

    #[test]
    fn test_empty_line_is_rejected() {
        let err = decode("").unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::LeadingToken(String::new()));
    }

    #[test]
    fn test_non_numeric_and_negative_fields() {
        let err = decode("ID:7:X:60:X:3:103:X:zero:50:X:1:21:X:0:9:X:2:77").unwrap_err();
        assert_eq!(
            err.kind,
            DecodeErrorKind::NotNumeric {
                field: 8,
                value: "zero".to_string()
            }
        );

        let err = decode("ID:7:X:60:X:-3:103:X:0:50:X:1:21:X:0:9:X:2:77").unwrap_err();
        assert!(matches!(err.kind, DecodeErrorKind::NotNumeric { field: 5, .. }));
    }

    #[test]
    fn test_reserved_fields_are_not_validated() {
        let line = "ID:7:anything:60::3:103:??:0:50:!:1:21::0:9:x:2:77";
        let telegram = expect_telegram(line);
        assert_eq!(telegram.pulses, [3, 0, 1, 0, 2]);
    }

    #[test]
    fn test_error_message_names_line() {
        let err = decode("garbage").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("illegal input"));
        assert!(message.contains("garbage"));
    }

    fn telegram_strategy() -> impl Strategy<Value = Telegram> {
        (
            any::<u64>(),
            any::<u64>(),
            prop::array::uniform5(any::<u64>()),
            prop::array::uniform5(any::<u64>()),
        )
            .prop_map(|(device_id, interval, pulses, pulses_total)| Telegram {
                device_id,
                interval,
                pulses,
                pulses_total,
            })
    }

    /// Positions holding numbers in a data line
    fn numeric_positions() -> Vec<usize> {
        let mut positions = vec![DEVICE_ID_FIELD, INTERVAL_FIELD];
        for channel in 0..CHANNEL_COUNT {
            let base = FIRST_CHANNEL_FIELD + CHANNEL_STRIDE * channel;
            positions.push(base);
            positions.push(base + 1);
        }
        positions
    }

    proptest! {
        #[test]
        fn prop_encode_then_decode_is_identity(telegram in telegram_strategy()) {
            prop_assert_eq!(decode(&encode(&telegram)), Ok(Frame::Telegram(telegram)));
        }

        #[test]
        fn prop_wrong_field_count_is_rejected(
            count in (1usize..40).prop_filter("data line length", |n| *n != TELEGRAM_FIELDS),
            value in 0u64..1000,
        ) {
            let mut fields = vec![TELEGRAM_TOKEN.to_string()];
            fields.extend((1..count).map(|_| value.to_string()));
            let err = decode(&fields.join(":"));
            let rejected = matches!(
                &err,
                Err(DecodeError { kind: DecodeErrorKind::FieldCount(n), .. }) if *n == count
            );
            prop_assert!(rejected, "{} fields should be rejected, got {:?}", count, err);
        }

        #[test]
        fn prop_non_numeric_field_is_rejected(
            telegram in telegram_strategy(),
            slot in 0usize..12,
            junk in "[a-zA-Z]{1,8}",
        ) {
            let position = numeric_positions()[slot];
            let mut fields: Vec<String> = encode(&telegram).split(':').map(str::to_string).collect();
            fields[position] = junk;
            let err = decode(&fields.join(":"));
            let rejected = matches!(
                &err,
                Err(DecodeError { kind: DecodeErrorKind::NotNumeric { field, .. }, .. }) if *field == position
            );
            prop_assert!(rejected, "field {} should be rejected, got {:?}", position, err);
        }

        #[test]
        fn prop_wrong_leading_token_is_rejected(
            telegram in telegram_strategy(),
            token in "[a-zA-Z/0-9]{0,8}".prop_filter("not a known token", |t| t != TELEGRAM_TOKEN && t != HEADER_TOKEN),
        ) {
            let line = encode(&telegram).replacen(TELEGRAM_TOKEN, &token, 1);
            let err = decode(&line);
            prop_assert!(
                matches!(err, Err(DecodeError { kind: DecodeErrorKind::LeadingToken(_), .. })),
                "line {:?} should be rejected", line
            );
        }
    }
}
