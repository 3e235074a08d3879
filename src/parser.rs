// MIT License
// Rust translation of lib/radiora2.js

use std::collections::HashMap;

use tracing::trace;

use crate::event::BridgeEvent;
use crate::protocol::{Response, parse_line};

/// Translates the controller's post-login text stream into domain events.
///
/// A single read may carry several protocol lines, or end mid-line; the
/// parser processes complete lines in arrival order and buffers a trailing
/// partial line until the next chunk. It also keeps the last reported level
/// per integration ID so redundant `~OUTPUT` reports emit nothing.
#[derive(Debug, Default)]
pub struct ResponseParser {
    /// Last reported level per integration ID. Absent = never reported,
    /// which counts as a change on the first report.
    levels: HashMap<u32, u8>,
    /// Unterminated tail of the previous chunk.
    partial: String,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known level for an output, if it has ever reported one.
    pub fn level(&self, id: u32) -> Option<u8> {
        self.levels.get(&id).copied()
    }

    /// Forget all recorded levels and any buffered partial line.
    ///
    /// State is rebuilt from the controller's own reports, so this is only
    /// needed if a caller wants first-report semantics again.
    pub fn reset(&mut self) {
        self.levels.clear();
        self.partial.clear();
    }

    /// Discard any buffered partial line. Called when the connection drops:
    /// levels survive a reconnect (the controller re-reports state), a
    /// half-received line does not.
    pub fn drop_partial(&mut self) {
        self.partial.clear();
    }

    /// Process a raw text chunk, returning the events it produced in order.
    pub fn handle_chunk(&mut self, data: &str) -> Vec<BridgeEvent> {
        let mut events = Vec::new();

        let mut buffer = std::mem::take(&mut self.partial);
        buffer.push_str(data);

        while let Some(newline) = buffer.find('\n') {
            let line: String = buffer.drain(..=newline).collect();
            self.handle_line(line.trim_end_matches(['\r', '\n']), &mut events);
        }
        self.partial = buffer;

        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<BridgeEvent>) {
        let Some(response) = parse_line(line) else {
            if !line.is_empty() {
                trace!("Ignoring unrecognized line: {line}");
            }
            return;
        };

        match response {
            Response::OutputLevel { id, level } => self.handle_output(id, level, events),
            Response::DeviceAction {
                id,
                button,
                action,
                led,
            } => match action {
                3 => events.push(BridgeEvent::ButtonPress { device: id, button }),
                4 => events.push(BridgeEvent::ButtonReleased { device: id, button }),
                9 => {
                    if led == Some(0) {
                        events.push(BridgeEvent::KeypadLedOff { device: id, button });
                    } else {
                        events.push(BridgeEvent::KeypadLedOn { device: id, button });
                    }
                }
                other => {
                    events.push(BridgeEvent::Info(format!(
                        "Unexpected button action '{other}'"
                    )));
                }
            },
            Response::GroupState { id, state } => match state {
                3 => events.push(BridgeEvent::GroupOccupied(id)),
                4 => events.push(BridgeEvent::GroupUnoccupied(id)),
                _ => events.push(BridgeEvent::GroupUnknown(id)),
            },
        }
    }

    /// Level report handling with transition suppression.
    ///
    /// `OutputStatus` fires unconditionally so correlated queries always get
    /// their reply; the On/Off/Level events only fire on a change, with On
    /// reserved for 0 (or never-seen) to non-zero transitions.
    fn handle_output(&mut self, id: u32, level: u8, events: &mut Vec<BridgeEvent>) {
        events.push(BridgeEvent::OutputStatus { id, level });

        let previous = self.levels.insert(id, level);
        if previous == Some(level) {
            return;
        }

        if level == 0 {
            events.push(BridgeEvent::Off(id));
        } else {
            if previous.unwrap_or(0) == 0 {
                events.push(BridgeEvent::On(id));
            }
            events.push(BridgeEvent::Level { id, level });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_events(events: Vec<BridgeEvent>) -> Vec<BridgeEvent> {
        events
            .into_iter()
            .filter(|e| !matches!(e, BridgeEvent::OutputStatus { .. }))
            .collect()
    }

    #[test]
    fn test_first_report_emits_on_then_level() {
        let mut parser = ResponseParser::new();
        let events = domain_events(parser.handle_chunk("~OUTPUT,7,1,50\r\n"));
        assert_eq!(
            events,
            vec![BridgeEvent::On(7), BridgeEvent::Level { id: 7, level: 50 }]
        );

        // Reprocessing the identical line emits nothing further
        let events = domain_events(parser.handle_chunk("~OUTPUT,7,1,50\r\n"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_zero_transition_emits_off_only() {
        let mut parser = ResponseParser::new();
        parser.handle_chunk("~OUTPUT,7,1,50\n");

        let events = domain_events(parser.handle_chunk("~OUTPUT,7,1,0\n"));
        assert_eq!(events, vec![BridgeEvent::Off(7)]);

        let events = domain_events(parser.handle_chunk("~OUTPUT,7,1,0\n"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_first_ever_zero_emits_off() {
        let mut parser = ResponseParser::new();
        let events = domain_events(parser.handle_chunk("~OUTPUT,9,1,0\n"));
        assert_eq!(events, vec![BridgeEvent::Off(9)]);
    }

    #[test]
    fn test_nonzero_to_nonzero_emits_level_only() {
        let mut parser = ResponseParser::new();
        parser.handle_chunk("~OUTPUT,7,1,50\n");

        let events = domain_events(parser.handle_chunk("~OUTPUT,7,1,80\n"));
        assert_eq!(events, vec![BridgeEvent::Level { id: 7, level: 80 }]);
    }

    #[test]
    fn test_output_status_always_emitted() {
        let mut parser = ResponseParser::new();
        parser.handle_chunk("~OUTPUT,7,1,50\n");
        let events = parser.handle_chunk("~OUTPUT,7,1,50\n");
        assert_eq!(events, vec![BridgeEvent::OutputStatus { id: 7, level: 50 }]);
    }

    #[test]
    fn test_multi_line_chunk_preserves_order() {
        let mut parser = ResponseParser::new();
        let events = domain_events(parser.handle_chunk("~OUTPUT,1,1,10\n~GROUP,2,3,3\n"));
        assert_eq!(
            events,
            vec![
                BridgeEvent::On(1),
                BridgeEvent::Level { id: 1, level: 10 },
                BridgeEvent::GroupOccupied(2),
            ]
        );
    }

    #[test]
    fn test_partial_line_spans_chunks() {
        let mut parser = ResponseParser::new();
        assert!(parser.handle_chunk("~OUTPUT,1").is_empty());
        let events = domain_events(parser.handle_chunk(",1,25\r\n"));
        assert_eq!(
            events,
            vec![BridgeEvent::On(1), BridgeEvent::Level { id: 1, level: 25 }]
        );
    }

    #[test]
    fn test_button_actions() {
        let mut parser = ResponseParser::new();
        assert_eq!(
            parser.handle_chunk("~DEVICE,21,2,3\n"),
            vec![BridgeEvent::ButtonPress {
                device: 21,
                button: 2
            }]
        );
        assert_eq!(
            parser.handle_chunk("~DEVICE,21,2,4\n"),
            vec![BridgeEvent::ButtonReleased {
                device: 21,
                button: 2
            }]
        );
        assert_eq!(
            parser.handle_chunk("~DEVICE,21,2,9,0\n"),
            vec![BridgeEvent::KeypadLedOff {
                device: 21,
                button: 2
            }]
        );
        assert_eq!(
            parser.handle_chunk("~DEVICE,21,2,9,1\n"),
            vec![BridgeEvent::KeypadLedOn {
                device: 21,
                button: 2
            }]
        );
    }

    #[test]
    fn test_unexpected_button_action_is_info() {
        let mut parser = ResponseParser::new();
        let events = parser.handle_chunk("~DEVICE,21,2,7\n");
        assert_eq!(
            events,
            vec![BridgeEvent::Info("Unexpected button action '7'".to_string())]
        );
    }

    #[test]
    fn test_group_states() {
        let mut parser = ResponseParser::new();
        assert_eq!(
            parser.handle_chunk("~GROUP,6,3,3\n"),
            vec![BridgeEvent::GroupOccupied(6)]
        );
        assert_eq!(
            parser.handle_chunk("~GROUP,6,3,4\n"),
            vec![BridgeEvent::GroupUnoccupied(6)]
        );
        assert_eq!(
            parser.handle_chunk("~GROUP,6,3,255\n"),
            vec![BridgeEvent::GroupUnknown(6)]
        );
    }

    #[test]
    fn test_unrecognized_lines_ignored() {
        let mut parser = ResponseParser::new();
        assert!(parser.handle_chunk("~TIMECLOCK,1,1\nnot a protocol line\n").is_empty());
    }

    #[test]
    fn test_level_lookup_and_reset() {
        let mut parser = ResponseParser::new();
        parser.handle_chunk("~OUTPUT,3,1,40\n");
        assert_eq!(parser.level(3), Some(40));
        assert_eq!(parser.level(4), None);

        parser.reset();
        assert_eq!(parser.level(3), None);
    }
}
