//! Line decoder for the device's ASCII record protocol
//!
//! Each received line is classified by its first two characters and split on
//! commas. Decoding never fails: anything malformed degrades to
//! [`Record::Unrecognized`] carrying the original text and the reason.
//!
//! | Line                 | Record                                 |
//! |----------------------|----------------------------------------|
//! | `PI,12,0x1F`         | `ValueUpdate { index: 12, raw: "0x1F" }` |
//! | `MB,100,3.5`         | `BufferSample { Primary, 100, 3.5 }`   |
//! | `MB,5000,0`          | `BufferEnd { Primary }` (capacity 5000) |
//! | `BK,7,-1e3`          | `BufferSample { Secondary, 7, -1000.0 }` |
//! | `hello`              | `Unrecognized { reason: Unclassified }` |

use crate::config::BufferConfig;
use crate::types::{Channel, DecodeIssue, Record, DEFAULT_BUFFER_CAPACITY};

/// Stateless classifier of received lines
///
/// The only configuration is the capacity of each channel's buffer, used to
/// recognise the end-of-stream sentinel (an address past the last slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDecoder {
    capacities: [usize; 2],
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_BUFFER_CAPACITY)
    }
}

impl LineDecoder {
    /// Create a decoder for the given buffer capacities
    pub fn new(primary_capacity: usize, secondary_capacity: usize) -> Self {
        Self {
            capacities: [primary_capacity, secondary_capacity],
        }
    }

    /// Create a decoder matching a buffer configuration
    pub fn from_config(config: &BufferConfig) -> Self {
        Self::new(config.primary_capacity, config.secondary_capacity)
    }

    /// Capacity of a channel's buffer
    pub fn capacity(&self, channel: Channel) -> usize {
        self.capacities[channel.index()]
    }

    /// Classify one received line
    ///
    /// Returns `None` for empty or whitespace-only input, and exactly one
    /// record otherwise.
    pub fn decode(&self, line: &str) -> Option<Record> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut fields = line.split(',');
        let _tag_field = fields.next();
        let (first, second) = match (fields.next(), fields.next()) {
            (Some(first), Some(second)) => (first, second),
            _ => return Some(Record::unclassified(line)),
        };

        let record = match line.get(..2) {
            Some("PI") => match parse_index(first) {
                Ok(index) => Record::ValueUpdate {
                    index,
                    raw_value: second.to_string(),
                },
                Err(reason) => unrecognized(line, reason),
            },
            Some("MB") => self.decode_sample(Channel::Primary, line, first, second),
            Some("BK") => self.decode_sample(Channel::Secondary, line, first, second),
            _ => Record::unclassified(line),
        };

        Some(record)
    }

    fn decode_sample(&self, channel: Channel, line: &str, address: &str, value: &str) -> Record {
        let address = match parse_index(address) {
            Ok(address) => address,
            Err(reason) => return unrecognized(line, reason),
        };

        if address >= self.capacity(channel) {
            return Record::BufferEnd { channel };
        }

        let trimmed = value.trim();
        match trimmed.parse::<f64>() {
            Ok(value) => Record::BufferSample {
                channel,
                address,
                value,
            },
            Err(e) => unrecognized(
                line,
                DecodeIssue::InvalidFloat {
                    field: trimmed.to_string(),
                    message: e.to_string(),
                },
            ),
        }
    }
}

fn parse_index(field: &str) -> Result<usize, DecodeIssue> {
    let trimmed = field.trim();
    trimmed
        .parse::<usize>()
        .map_err(|e| DecodeIssue::InvalidInteger {
            field: trimmed.to_string(),
            message: e.to_string(),
        })
}

fn unrecognized(line: &str, reason: DecodeIssue) -> Record {
    Record::Unrecognized {
        text: line.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> Option<Record> {
        LineDecoder::default().decode(line)
    }

    #[test]
    fn test_empty_lines_produce_nothing() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("   "), None);
        assert_eq!(decode("\r\n"), None);
    }

    #[test]
    fn test_value_update() {
        assert_eq!(
            decode("PI,12,FFFFFFFF"),
            Some(Record::ValueUpdate {
                index: 12,
                raw_value: "FFFFFFFF".to_string()
            })
        );
    }

    #[test]
    fn test_value_update_keeps_raw_text() {
        // Only the whole line is trimmed; the raw value is not interpreted
        assert_eq!(
            decode("  PI, 3 ,  1.5V  "),
            Some(Record::ValueUpdate {
                index: 3,
                raw_value: "  1.5V".to_string()
            })
        );
    }

    #[test]
    fn test_value_update_bad_index() {
        match decode("PI,abc,1") {
            Some(Record::Unrecognized { text, reason }) => {
                assert_eq!(text, "PI,abc,1");
                assert!(matches!(reason, DecodeIssue::InvalidInteger { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_negative_index_is_unrecognized() {
        assert!(decode("PI,-1,1").unwrap().is_unrecognized());
        assert!(decode("MB,-1,1").unwrap().is_unrecognized());
    }

    #[test]
    fn test_primary_sample() {
        assert_eq!(
            decode("MB,100,3.5"),
            Some(Record::BufferSample {
                channel: Channel::Primary,
                address: 100,
                value: 3.5
            })
        );
    }

    #[test]
    fn test_secondary_sample() {
        assert_eq!(
            decode("BK,7,-1e3"),
            Some(Record::BufferSample {
                channel: Channel::Secondary,
                address: 7,
                value: -1000.0
            })
        );
    }

    #[test]
    fn test_buffer_end_at_capacity() {
        assert_eq!(
            decode("MB,5000,0"),
            Some(Record::BufferEnd {
                channel: Channel::Primary
            })
        );
        assert_eq!(
            decode("BK,9999,garbage"),
            Some(Record::BufferEnd {
                channel: Channel::Secondary
            })
        );
        assert!(matches!(
            decode("MB,4999,1"),
            Some(Record::BufferSample { address: 4999, .. })
        ));
    }

    #[test]
    fn test_custom_capacity() {
        let decoder = LineDecoder::new(10, 20);
        assert_eq!(
            decoder.decode("MB,10,1"),
            Some(Record::BufferEnd {
                channel: Channel::Primary
            })
        );
        assert!(matches!(
            decoder.decode("BK,10,1"),
            Some(Record::BufferSample { address: 10, .. })
        ));
    }

    #[test]
    fn test_bad_float() {
        match decode("MB,1,abc") {
            Some(Record::Unrecognized { reason, .. }) => {
                assert!(matches!(reason, DecodeIssue::InvalidFloat { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unclassified_lines() {
        for line in ["hello", "PI,1", "MB", "XX,1,2", "0=A", "ÄÖ,1,2", "P"] {
            assert_eq!(
                decode(line),
                Some(Record::unclassified(line)),
                "line {:?}",
                line
            );
        }
    }

    #[test]
    fn test_extra_commas_are_ignored() {
        assert_eq!(
            decode("MB,1,2.0,extra,fields"),
            Some(Record::BufferSample {
                channel: Channel::Primary,
                address: 1,
                value: 2.0
            })
        );
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_decode_never_panics(line in ".*") {
            let _ = LineDecoder::default().decode(&line);
        }

        #[test]
        fn test_non_empty_lines_yield_one_record(line in "[ -~]{0,40}") {
            let decoded = LineDecoder::default().decode(&line);
            prop_assert_eq!(decoded.is_none(), line.trim().is_empty());
        }

        #[test]
        fn test_value_update_round_trip(index in 0usize..1_000_000, value in "[A-Za-z0-9.]{1,12}") {
            let line = format!("PI,{},{}", index, value);
            prop_assert_eq!(
                LineDecoder::default().decode(&line),
                Some(Record::ValueUpdate { index, raw_value: value })
            );
        }

        #[test]
        fn test_primary_sample_round_trip(address in 0usize..5000, value in -1.0e6f64..1.0e6) {
            let line = format!("MB,{},{}", address, value);
            prop_assert_eq!(
                LineDecoder::default().decode(&line),
                Some(Record::BufferSample { channel: Channel::Primary, address, value })
            );
        }

        #[test]
        fn test_out_of_range_is_buffer_end(address in 5000usize..1_000_000, value in ".*") {
            let line = format!("BK,{},{}", address, value.replace(',', ""));
            prop_assert_eq!(
                LineDecoder::default().decode(&line),
                Some(Record::BufferEnd { channel: Channel::Secondary })
            );
        }
    }
}
