// MIT License
// Rust translation of lib/radiora2.js

use std::collections::VecDeque;

use crate::event::BridgeEvent;
use crate::protocol::{LINE_TERMINATOR, LOGIN_PROMPT, PASSWORD_PROMPT, is_ready_banner, terminate};

/// Connection phase. Transitions only move forward, except a transport
/// close which resets to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No connection, or connection lost.
    Disconnected,
    /// TCP connected, waiting for the `login: ` prompt.
    AwaitingUsername,
    /// Username written, waiting for the `password: ` prompt.
    AwaitingPassword,
    /// Password written. Also the busy state: one command is in flight,
    /// awaiting the next ready banner as acknowledgment.
    Authenticated,
    /// Ready banner seen with nothing in flight; the next command is
    /// written immediately.
    ReadyForCommand,
}

/// Side effects requested by a machine transition. The caller (the session
/// task) performs the I/O; the machine itself never touches a socket.
#[derive(Debug, Default)]
pub struct Effects {
    /// Byte strings to write to the transport, in order.
    pub writes: Vec<String>,
    /// Events to broadcast, in order.
    pub events: Vec<BridgeEvent>,
    /// Close the transport (unexpected prompt during login). Closing routes
    /// into the normal reconnect path rather than stalling half-logged-in.
    pub close: bool,
    /// Post-login payload to hand to the response parser.
    pub parse: Option<String>,
}

/// Login and command-queue state machine.
///
/// Pure core of the session: each input chunk (or submitted command) maps
/// to a new phase plus [`Effects`]. Credentials are stored here so that
/// every automatic reconnect can replay the login exchange unchanged.
///
/// Queued-but-unsent commands survive a disconnect and are dispatched once
/// the session is ready again; a command already in flight when the
/// connection drops is not resent.
#[derive(Debug)]
pub struct SessionMachine {
    phase: Phase,
    logged_in: bool,
    username: String,
    password: String,
    queue: VecDeque<String>,
}

impl SessionMachine {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            phase: Phase::Disconnected,
            logged_in: false,
            username: username.into(),
            password: password.into(),
            queue: VecDeque::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Transport connected; expect the username prompt next.
    pub fn on_connect(&mut self) {
        self.phase = Phase::AwaitingUsername;
        self.logged_in = false;
    }

    /// Transport closed. The queue is preserved; the in-flight slot (if
    /// any) is implicitly cleared, so that command is lost.
    pub fn on_close(&mut self) {
        self.phase = Phase::Disconnected;
        self.logged_in = false;
    }

    /// Feed one received chunk through the machine.
    pub fn handle_chunk(&mut self, data: &str) -> Effects {
        let mut effects = Effects::default();

        match self.phase {
            Phase::Disconnected => {
                // Data races a close notification; nothing sensible to do.
            }
            Phase::AwaitingUsername => {
                if data == LOGIN_PROMPT {
                    effects.writes.push(format!("{}{LINE_TERMINATOR}", self.username));
                    self.phase = Phase::AwaitingPassword;
                } else {
                    effects
                        .events
                        .push(BridgeEvent::Error(format!("Bad initial response /{data}/")));
                    effects.close = true;
                }
            }
            Phase::AwaitingPassword => {
                if data == PASSWORD_PROMPT {
                    effects.writes.push(format!("{}{LINE_TERMINATOR}", self.password));
                    self.phase = Phase::Authenticated;
                } else {
                    effects
                        .events
                        .push(BridgeEvent::Error(format!("Bad login response /{data}/")));
                    effects.close = true;
                }
            }
            Phase::Authenticated | Phase::ReadyForCommand => {
                // A single read may coalesce status lines and the ready
                // banner into one chunk; handle each line separately so an
                // embedded banner still releases the queue and only real
                // protocol lines reach the parser.
                let mut parse = String::new();
                let mut rest = data;
                while !rest.is_empty() {
                    let (segment, remainder) = match rest.find('\n') {
                        Some(i) => rest.split_at(i + 1),
                        None => (rest, ""),
                    };
                    if is_ready_banner(segment) {
                        if !self.logged_in {
                            self.logged_in = true;
                            effects.events.push(BridgeEvent::LoggedIn);
                        }
                        // The banner is the flow-control signal: dispatch
                        // at most one queued command, or go idle.
                        if let Some(command) = self.queue.pop_front() {
                            self.phase = Phase::Authenticated;
                            effects.events.push(BridgeEvent::Sent(command.clone()));
                            effects.writes.push(command);
                        } else {
                            self.phase = Phase::ReadyForCommand;
                        }
                    } else {
                        parse.push_str(segment);
                    }
                    rest = remainder;
                }
                if !parse.is_empty() {
                    effects.parse = Some(parse);
                }
            }
        }

        effects
    }

    /// Submit an outbound command. Written immediately when ready (marking
    /// the session busy until the next banner), queued FIFO otherwise.
    pub fn send_command(&mut self, command: &str) -> Effects {
        let mut effects = Effects::default();
        let command = terminate(command);

        if self.phase == Phase::ReadyForCommand {
            self.phase = Phase::Authenticated;
            effects.events.push(BridgeEvent::Sent(command.clone()));
            effects.writes.push(command);
        } else {
            self.queue.push_back(command);
        }

        effects
    }
}
