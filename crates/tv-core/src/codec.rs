//! Line-delimited JSON trace format.
//!
//! One entry per line, `{"op": {"kind": "...", ...}, "state": {...}}`, with
//! operations tagged by `kind` in snake_case. Blank lines are ignored.

use serde::Serialize;

use crate::domain::{Domain, DomainTrace};
use crate::error::IngestError;
use crate::trace::{Trace, TraceEntry};

/// Decode and validate a trace of domain `D`.
///
/// Errors name the 1-based line of the offending record. Traces with more
/// than `max_entries` records are rejected before any decoding.
pub fn from_ndjson<D: Domain>(text: &str, max_entries: usize) -> Result<DomainTrace<D>, IngestError> {
    let count = text.lines().filter(|line| !line.trim().is_empty()).count();
    if count > max_entries {
        return Err(IngestError::TooLong {
            count,
            max: max_entries,
        });
    }

    let mut entries = Vec::with_capacity(count);
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let entry: TraceEntry<D::Operation, D::State> =
            serde_json::from_str(raw).map_err(|source| IngestError::Malformed { line, source })?;
        D::check_schema(&entry.state).map_err(|reason| IngestError::Schema { line, reason })?;
        entries.push(entry);
    }
    Ok(entries.into_iter().collect())
}

/// Encode a trace, one entry per line, each line newline-terminated.
pub fn to_ndjson<O, S>(trace: &Trace<O, S>) -> Result<String, IngestError>
where
    O: Serialize,
    S: Serialize,
{
    let mut out = String::new();
    for (index, entry) in trace.iter().enumerate() {
        let line =
            serde_json::to_string(entry).map_err(|source| IngestError::Encode { index, source })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::bounded_queue::{BoundedQueue, QueueOp};

    const TWO_PUTS: &str = r#"
{"op":{"kind":"put","thread":1,"item":"A"},"state":{"buffer":["A"],"capacity":2}}

{"op":{"kind":"put","thread":2,"item":"B"},"state":{"buffer":["A","B"],"capacity":2,"blocked_producers":{},"blocked_consumers":[]}}
"#;

    #[test]
    fn test_blank_lines_skipped_and_defaults_filled() {
        let trace = from_ndjson::<BoundedQueue>(TWO_PUTS, 16).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(
            trace.at(1).map(|e| &e.op),
            Some(&QueueOp::Put {
                thread: 2,
                item: "B".to_string()
            })
        );
        assert!(trace.at(0).unwrap().state.blocked_producers.is_empty());
    }

    #[test]
    fn test_malformed_line_is_located() {
        let text = "{\"op\":{\"kind\":\"put\",\"thread\":1,\"item\":\"A\"},\"state\":{\"buffer\":[],\"capacity\":1}}\n{\"op\":{\"kind\":\"teleport\"}}\n";
        match from_ndjson::<BoundedQueue>(text, 16) {
            Err(IngestError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_violation_is_located() {
        let text = "\n{\"op\":{\"kind\":\"get_blocked\",\"thread\":1},\"state\":{\"buffer\":[],\"capacity\":0}}";
        match from_ndjson::<BoundedQueue>(text, 16) {
            Err(IngestError::Schema { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected schema violation, got {:?}", other),
        }
    }

    #[test]
    fn test_too_long() {
        assert!(matches!(
            from_ndjson::<BoundedQueue>(TWO_PUTS, 1),
            Err(IngestError::TooLong { count: 2, max: 1 })
        ));
    }

    #[test]
    fn test_round_trip() {
        let trace = from_ndjson::<BoundedQueue>(TWO_PUTS, 16).unwrap();
        let text = to_ndjson(&trace).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(from_ndjson::<BoundedQueue>(&text, 16).unwrap(), trace);
    }
}
