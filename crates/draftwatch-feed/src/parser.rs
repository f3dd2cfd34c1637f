//! Transaction record parsing.
//!
//! Converts one raw feed record into a typed `AuctionEvent`. The payload is
//! a pipe-delimited string of the form `player_id|amount|` (trailing
//! separator included). Parsing is pure and deterministic; a malformed
//! record fails alone and never halts a batch.

use crate::error::{FeedError, FeedResult};
use draftwatch_core::{AuctionEvent, PlayerId, RawTransactionRecord};
use tracing::warn;

/// Payload field separator.
const SEP: char = '|';

/// Parse a single raw record into a typed event.
///
/// Validates the field count and that the amount is a non-negative integer.
pub fn parse_record(record: &RawTransactionRecord) -> FeedResult<AuctionEvent> {
    let fields: Vec<&str> = record.payload.split(SEP).collect();

    // `player|amount|` splits into [player, amount, ""].
    if fields.len() != 3 || !fields[2].is_empty() {
        return Err(FeedError::malformed(
            format!("expected 2 fields with trailing separator, got {}", fields.len() - 1),
            &record.payload,
        ));
    }

    let player = fields[0];
    if player.is_empty() {
        return Err(FeedError::malformed("empty player id", &record.payload));
    }

    let amount: u64 = fields[1]
        .parse()
        .map_err(|_| FeedError::malformed(format!("invalid amount {:?}", fields[1]), &record.payload))?;

    Ok(AuctionEvent {
        event_type: record.event_type,
        player: PlayerId::new(player),
        amount,
        actor_id: record.actor_id.clone(),
        timestamp_ms: record.timestamp_ms,
    })
}

/// Parse a batch, skipping malformed records with a warning.
///
/// Returns the surviving events and how many records were skipped.
pub fn parse_batch(records: &[RawTransactionRecord]) -> (Vec<AuctionEvent>, usize) {
    let mut events = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for record in records {
        match parse_record(record) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(
                    event_type = %record.event_type,
                    timestamp_ms = record.timestamp_ms,
                    error = %e,
                    "Skipping malformed feed record"
                );
                skipped += 1;
            }
        }
    }

    (events, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftwatch_core::EventType;

    fn record(event_type: EventType, payload: &str, timestamp_ms: i64) -> RawTransactionRecord {
        RawTransactionRecord {
            event_type,
            actor_id: "manager_7".to_string(),
            payload: payload.to_string(),
            timestamp_ms,
        }
    }

    #[test]
    fn test_parse_init_record() {
        let event = parse_record(&record(EventType::Init, "14835|425000|", 1_000)).unwrap();

        assert_eq!(event.event_type, EventType::Init);
        assert_eq!(event.player, PlayerId::new("14835"));
        assert_eq!(event.amount, 425_000);
        assert_eq!(event.actor_id, "manager_7");
        assert_eq!(event.timestamp_ms, 1_000);
    }

    #[test]
    fn test_parse_zero_amount() {
        let event = parse_record(&record(EventType::Bid, "99|0|", 5)).unwrap();
        assert_eq!(event.amount, 0);
    }

    #[test]
    fn test_missing_trailing_separator_rejected() {
        let err = parse_record(&record(EventType::Bid, "14835|425000", 1)).unwrap_err();
        assert!(matches!(err, FeedError::MalformedPayload { .. }));
    }

    #[test]
    fn test_wrong_field_count_rejected() {
        for payload in ["14835|", "14835|1|extra|", "", "|||"] {
            let err = parse_record(&record(EventType::Bid, payload, 1)).unwrap_err();
            assert!(matches!(err, FeedError::MalformedPayload { .. }), "payload {payload:?}");
        }
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = parse_record(&record(EventType::Bid, "14835|-50|", 1)).unwrap_err();
        assert!(matches!(err, FeedError::MalformedPayload { .. }));
    }

    #[test]
    fn test_non_numeric_amount_rejected() {
        let err = parse_record(&record(EventType::Won, "14835|lots|", 1)).unwrap_err();
        assert!(matches!(err, FeedError::MalformedPayload { .. }));
    }

    #[test]
    fn test_empty_player_rejected() {
        let err = parse_record(&record(EventType::Init, "|100|", 1)).unwrap_err();
        assert!(matches!(err, FeedError::MalformedPayload { .. }));
    }

    #[test]
    fn test_batch_skips_bad_records_and_continues() {
        let records = vec![
            record(EventType::Init, "1|100|", 1),
            record(EventType::Bid, "garbage", 2),
            record(EventType::Bid, "1|150|", 3),
        ];

        let (events, skipped) = parse_batch(&records);
        assert_eq!(events.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(events[1].amount, 150);
    }
}
