//! # Typed Command Decoder
//!
//! Interprets the opaque body of an accepted [`Packet`] into a typed domain
//! command. The link engine itself is agnostic to command semantics; this
//! decoder is the downstream consumer of the shared identifier namespace
//! declared in [`constants`](crate::constants).
//!
//! Text payloads decode as lossy UTF-8 and stop at the first NUL, so
//! fixed-width senders that pad with zeros produce clean strings.

use crate::constants::{
    CMD_BACK, CMD_ENTER, CMD_ERR, CMD_INIT, CMD_INIT_COMP, CMD_MOVE_DOWN, CMD_MOVE_LEFT,
    CMD_MOVE_RIGHT, CMD_MOVE_UP, CMD_MSG, CMD_PAGE, CMD_POWER, CMD_WARN, INIT_MESSAGE_CAPACITY,
};
use crate::error::LinkError;
use crate::link::frame::Packet;
use serde::Serialize;

/// A decoded InterLink command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    /// Power instruction for the peer (on/off/standby, peer-defined code)
    Power { instruction: u8 },
    /// Switch the peer UI to a page
    Page { page: u8 },
    /// Informational text message
    Message(String),
    /// Warning text message
    Warning(String),
    /// Error text message
    Error(String),
    /// Initialisation progress report
    Init { percent: u8, message: String },
    /// Initialisation finished
    InitComplete,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Back,
    Enter,
}

impl Command {
    /// The wire identifier this command travels under.
    pub fn id(&self) -> u16 {
        match self {
            Command::Power { .. } => CMD_POWER,
            Command::Page { .. } => CMD_PAGE,
            Command::Message(_) => CMD_MSG,
            Command::Warning(_) => CMD_WARN,
            Command::Error(_) => CMD_ERR,
            Command::Init { .. } => CMD_INIT,
            Command::InitComplete => CMD_INIT_COMP,
            Command::MoveLeft => CMD_MOVE_LEFT,
            Command::MoveRight => CMD_MOVE_RIGHT,
            Command::MoveUp => CMD_MOVE_UP,
            Command::MoveDown => CMD_MOVE_DOWN,
            Command::Back => CMD_BACK,
            Command::Enter => CMD_ENTER,
        }
    }
}

/// Decode an accepted packet's body according to its command identifier.
pub fn parse_command(packet: &Packet) -> Result<Command, LinkError> {
    match packet.cmd {
        CMD_POWER => Ok(Command::Power {
            instruction: first_byte(packet, "power instruction")?,
        }),
        CMD_PAGE => Ok(Command::Page {
            page: first_byte(packet, "page number")?,
        }),
        CMD_MSG => Ok(Command::Message(text(&packet.body))),
        CMD_WARN => Ok(Command::Warning(text(&packet.body))),
        CMD_ERR => Ok(Command::Error(text(&packet.body))),
        CMD_INIT => {
            let percent = first_byte(packet, "init percent")?;
            let raw = &packet.body[1..];
            let capped = &raw[..raw.len().min(INIT_MESSAGE_CAPACITY)];
            Ok(Command::Init {
                percent,
                message: text(capped),
            })
        }
        CMD_INIT_COMP => Ok(Command::InitComplete),
        CMD_MOVE_LEFT => Ok(Command::MoveLeft),
        CMD_MOVE_RIGHT => Ok(Command::MoveRight),
        CMD_MOVE_UP => Ok(Command::MoveUp),
        CMD_MOVE_DOWN => Ok(Command::MoveDown),
        CMD_BACK => Ok(Command::Back),
        CMD_ENTER => Ok(Command::Enter),
        other => Err(LinkError::UnknownCommand(other)),
    }
}

fn first_byte(packet: &Packet, what: &str) -> Result<u8, LinkError> {
    packet
        .body
        .first()
        .copied()
        .ok_or_else(|| LinkError::MalformedCommand(format!("missing {what} byte")))
}

// Lossy UTF-8, terminated at the first NUL.
fn text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
