// MIT License
// Rust translation of lib/radiora2.js

/// All events that can be emitted by a controller session.
///
/// Users subscribe via `session.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<BridgeEvent>`. Delivery order matches
/// the arrival order of the controller's protocol lines.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Authentication completed; emitted once per connection, on the first
    /// ready banner after login.
    LoggedIn,
    /// A command was written to the transport.
    Sent(String),
    /// Diagnostic text (raw inbound data, mostly).
    Debug(String),
    /// Informational notice, e.g. an unexpected button action value.
    Info(String),
    /// Protocol-level error, e.g. an unexpected login prompt.
    Error(String),
    /// The connection closed; a reconnect attempt follows automatically.
    Closed(String),
    /// Output transitioned from 0 to a non-zero level.
    On(u32),
    /// Output transitioned to 0.
    Off(u32),
    /// Output level changed to a non-zero value.
    Level { id: u32, level: u8 },
    /// Keypad/remote button pressed (action 3).
    ButtonPress { device: u32, button: u32 },
    /// Keypad/remote button released (action 4).
    ButtonReleased { device: u32, button: u32 },
    /// Keypad button LED turned on (action 9, value non-zero).
    KeypadLedOn { device: u32, button: u32 },
    /// Keypad button LED turned off (action 9, value 0).
    KeypadLedOff { device: u32, button: u32 },
    /// Occupancy group reported occupied (state 3).
    GroupOccupied(u32),
    /// Occupancy group reported unoccupied (state 4).
    GroupUnoccupied(u32),
    /// Occupancy group reported an unrecognized state.
    GroupUnknown(u32),
    /// Raw chunk received from the controller, before line splitting.
    MessageReceived(String),
    /// Level report for an output, emitted for every `~OUTPUT` line even
    /// when the change-suppression logic emits nothing else. This is the
    /// reply that `query_output` correlates on.
    OutputStatus { id: u32, level: u8 },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<BridgeEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<BridgeEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
