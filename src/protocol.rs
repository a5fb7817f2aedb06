//! Line-delimited JSON protocol between `padlinkd` and a chat bridge.
//!
//! One request per line, one response line per request.

use crate::action::SymbolicAction;
use crate::daemon::DaemonState;
use crate::input::DrainPolicy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ADDR: &str = "127.0.0.1:9877";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// A chat message as received by the bridge.
    Message {
        #[serde(default)]
        guild: Option<String>,
        #[serde(default)]
        channel: Option<String>,
        content: String,
    },
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// The message was accepted. `delete` tells the bridge to remove it
    /// from the channel.
    Handled {
        action: SymbolicAction,
        delete: bool,
    },
    /// The message was not addressed to this daemon; leave it alone.
    Ignored { reason: String },
    Status(StatusSnapshot),
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StatusSnapshot {
    pub state: DaemonState,
    #[serde(default)]
    pub program: Option<String>,
    pub frames: u64,
    pub queued: usize,
    pub policy: DrainPolicy,
    pub target_fps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Button, SymbolicAction};

    #[test]
    fn message_request_parses_with_optional_scope() {
        let req: Request = serde_json::from_str(r#"{"type":"Message","content":" A "}"#).unwrap();
        assert_eq!(
            req,
            Request::Message {
                guild: None,
                channel: None,
                content: " A ".to_string(),
            }
        );
    }

    #[test]
    fn handled_response_shape() {
        let resp = Response::Handled {
            action: SymbolicAction::Input(Button::Start),
            delete: true,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "Handled");
        assert_eq!(json["action"]["input"], "start");
        assert_eq!(json["delete"], true);
    }
}
