// MIT License
// Rust translation of lib/radiora2.js

//! Wire grammar for the RadioRA2 integration protocol.
//!
//! Outbound command lines (CRLF-terminated by the session):
//!
//! ```text
//! #OUTPUT,<id>,1,<level>[,<fade>[,<delay>]]   set output level
//! ?OUTPUT,<id>,1                              query output level
//! #DEVICE,<id>,<button>,3                     button press
//! #DEVICE,<id>,<button>,4                     button release
//! ?DEVICE,<id>,<button>,9                     query button LED state
//! ?GROUP,<groupId>,3                          query occupancy state
//! ```
//!
//! Inbound lines are comma-separated and keyed by their leading tag
//! (`~OUTPUT`, `~DEVICE`, `~GROUP`); anything else is ignored.

/// Username prompt sent by the controller. Must match exactly.
pub const LOGIN_PROMPT: &str = "login: ";

/// Password prompt sent by the controller. Must match exactly.
pub const PASSWORD_PROMPT: &str = "password: ";

/// Leading token of the ready banner (`GNET> `).
pub const READY_TOKEN: &str = "GNET>";

/// Line terminator for outbound commands.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Whether a chunk is the controller's ready banner: the `GNET>` sentinel
/// followed by whitespace.
pub fn is_ready_banner(data: &str) -> bool {
    data.strip_prefix(READY_TOKEN)
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_whitespace)
}

/// Append the line terminator unless the command already carries one.
pub fn terminate(command: &str) -> String {
    if command.ends_with(LINE_TERMINATOR) {
        command.to_string()
    } else {
        format!("{command}{LINE_TERMINATOR}")
    }
}

/// Commands that can be sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `#OUTPUT,<id>,1,<level>[,<fade>[,<delay>]]` — set an output to a
    /// level (0-100), optionally with fade and delay times in seconds.
    SetOutputLevel {
        id: u32,
        level: u8,
        fade: Option<u32>,
        delay: Option<u32>,
    },
    /// `?OUTPUT,<id>,1` — query an output's current level. The controller
    /// replies asynchronously with a `~OUTPUT` line.
    QueryOutputLevel { id: u32 },
    /// `#DEVICE,<id>,<button>,3` — press a keypad/remote button.
    PressButton { id: u32, button: u32 },
    /// `#DEVICE,<id>,<button>,4` — release a keypad/remote button.
    ReleaseButton { id: u32, button: u32 },
    /// `?DEVICE,<id>,<button>,9` — query a keypad button's LED state.
    QueryButtonLed { id: u32, button: u32 },
    /// `?GROUP,<groupId>,3` — query an occupancy group's state.
    QueryGroupState { id: u32 },
    /// Raw command line (for any unlisted directives).
    Raw(String),
}

impl Command {
    /// Convert the command to its wire string (without terminator).
    pub fn to_wire_string(&self) -> String {
        match self {
            Command::SetOutputLevel {
                id,
                level,
                fade,
                delay,
            } => {
                let mut cmd = format!("#OUTPUT,{id},1,{level}");
                if let Some(fade) = fade {
                    cmd.push_str(&format!(",{fade}"));
                    if let Some(delay) = delay {
                        cmd.push_str(&format!(",{delay}"));
                    }
                }
                cmd
            }
            Command::QueryOutputLevel { id } => format!("?OUTPUT,{id},1"),
            Command::PressButton { id, button } => format!("#DEVICE,{id},{button},3"),
            Command::ReleaseButton { id, button } => format!("#DEVICE,{id},{button},4"),
            Command::QueryButtonLed { id, button } => format!("?DEVICE,{id},{button},9"),
            Command::QueryGroupState { id } => format!("?GROUP,{id},3"),
            Command::Raw(s) => s.clone(),
        }
    }
}

/// A classified inbound protocol line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// `~OUTPUT,<id>,1,<level>` — output level report. Levels may carry
    /// decimals on the wire ("75.00"); they are rounded to 0-100.
    OutputLevel { id: u32, level: u8 },
    /// `~DEVICE,<id>,<button>,<action>[,<led>]` — button/LED report.
    DeviceAction {
        id: u32,
        button: u32,
        action: u32,
        led: Option<u32>,
    },
    /// `~GROUP,<id>,3,<state>` — occupancy group state report.
    GroupState { id: u32, state: u32 },
}

/// Parse one inbound line into a [`Response`]. Returns `None` for lines
/// with an unrecognized leading tag or malformed fields; those are ignored
/// by design, not errors.
pub fn parse_line(line: &str) -> Option<Response> {
    let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
    match parts.first().copied() {
        Some("~OUTPUT") => {
            // Only action 1 (level) is a level report
            if parts.len() >= 4 && parts[2].trim() == "1" {
                let id = parts[1].trim().parse().ok()?;
                let level: f32 = parts[3].trim().parse().ok()?;
                Some(Response::OutputLevel {
                    id,
                    level: level.round().clamp(0.0, 100.0) as u8,
                })
            } else {
                None
            }
        }
        Some("~DEVICE") => {
            if parts.len() >= 4 {
                let id = parts[1].trim().parse().ok()?;
                let button = parts[2].trim().parse().ok()?;
                let action = parts[3].trim().parse().ok()?;
                let led = parts.get(4).and_then(|s| s.trim().parse().ok());
                Some(Response::DeviceAction {
                    id,
                    button,
                    action,
                    led,
                })
            } else {
                None
            }
        }
        Some("~GROUP") => {
            if parts.len() >= 4 {
                let id = parts[1].trim().parse().ok()?;
                let state = parts[3].trim().parse().ok()?;
                Some(Response::GroupState { id, state })
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_strings() {
        assert_eq!(
            Command::SetOutputLevel {
                id: 12,
                level: 75,
                fade: None,
                delay: None
            }
            .to_wire_string(),
            "#OUTPUT,12,1,75"
        );
        assert_eq!(
            Command::SetOutputLevel {
                id: 12,
                level: 75,
                fade: Some(4),
                delay: Some(2)
            }
            .to_wire_string(),
            "#OUTPUT,12,1,75,4,2"
        );
        assert_eq!(
            Command::QueryOutputLevel { id: 3 }.to_wire_string(),
            "?OUTPUT,3,1"
        );
        assert_eq!(
            Command::PressButton { id: 21, button: 2 }.to_wire_string(),
            "#DEVICE,21,2,3"
        );
        assert_eq!(
            Command::ReleaseButton { id: 21, button: 2 }.to_wire_string(),
            "#DEVICE,21,2,4"
        );
        assert_eq!(
            Command::QueryButtonLed { id: 21, button: 2 }.to_wire_string(),
            "?DEVICE,21,2,9"
        );
        assert_eq!(
            Command::QueryGroupState { id: 6 }.to_wire_string(),
            "?GROUP,6,3"
        );
    }

    #[test]
    fn test_delay_requires_fade() {
        // A delay without a fade cannot be expressed on the wire
        assert_eq!(
            Command::SetOutputLevel {
                id: 1,
                level: 50,
                fade: None,
                delay: Some(9)
            }
            .to_wire_string(),
            "#OUTPUT,1,1,50"
        );
    }

    #[test]
    fn test_terminate() {
        assert_eq!(terminate("X"), "X\r\n");
        assert_eq!(terminate("Y\r\n"), "Y\r\n");
    }

    #[test]
    fn test_ready_banner() {
        assert!(is_ready_banner("GNET> "));
        assert!(is_ready_banner("GNET>\t"));
        assert!(!is_ready_banner("GNET>"));
        assert!(!is_ready_banner("GNET>x"));
        assert!(!is_ready_banner("~OUTPUT,1,1,50"));
        assert!(!is_ready_banner(" GNET> "));
    }

    #[test]
    fn test_parse_output_level() {
        assert_eq!(
            parse_line("~OUTPUT,12,1,75"),
            Some(Response::OutputLevel { id: 12, level: 75 })
        );
        // Fractional levels round
        assert_eq!(
            parse_line("~OUTPUT,12,1,74.50\r"),
            Some(Response::OutputLevel { id: 12, level: 75 })
        );
        // Non-level output actions are ignored
        assert_eq!(parse_line("~OUTPUT,12,29,6"), None);
    }

    #[test]
    fn test_parse_device_action() {
        assert_eq!(
            parse_line("~DEVICE,21,2,3"),
            Some(Response::DeviceAction {
                id: 21,
                button: 2,
                action: 3,
                led: None
            })
        );
        assert_eq!(
            parse_line("~DEVICE,21,2,9,1"),
            Some(Response::DeviceAction {
                id: 21,
                button: 2,
                action: 9,
                led: Some(1)
            })
        );
    }

    #[test]
    fn test_parse_group_state() {
        assert_eq!(
            parse_line("~GROUP,6,3,3"),
            Some(Response::GroupState { id: 6, state: 3 })
        );
    }

    #[test]
    fn test_parse_ignores_unknown_tags() {
        assert!(parse_line("~TIMECLOCK,1,1").is_none());
        assert!(parse_line("~ERROR,6").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("~OUTPUT,notanid,1,50").is_none());
    }
}
