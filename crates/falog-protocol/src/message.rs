//! Protocol message types.

use falog_core::Enrollee;

/// Wire keywords sent by devices. The casing is fixed by the scanner
/// firmware; do not "fix" it.
pub const KW_DISCONNECT: &str = "disconnect";
pub const KW_ENROLL_FINGER: &str = "enrollFinger";
pub const KW_SCAN_FINGER: &str = "scanFinger";

/// Wire keywords sent to devices.
pub const KW_ENROLL: &str = "enroll";
pub const KW_REBOOT: &str = "reboot";

/// Classification of one line received from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Device requests a clean close.
    Disconnect,
    /// Device begins an enrollment upload; 8 payload lines follow.
    EnrollFinger,
    /// Device reports a fingerprint scan; 1 payload line follows.
    ScanFinger,
    /// Anything else. Logged verbatim, no state change.
    Chatter(String),
}

impl DeviceMessage {
    /// Classifies a single line. The line must already be stripped of
    /// its trailing newline.
    pub fn classify(line: &str) -> Self {
        match line {
            KW_DISCONNECT => DeviceMessage::Disconnect,
            KW_ENROLL_FINGER => DeviceMessage::EnrollFinger,
            KW_SCAN_FINGER => DeviceMessage::ScanFinger,
            other => DeviceMessage::Chatter(other.to_string()),
        }
    }
}

/// A command the server sends to a device.
///
/// Each command is one keyword line plus zero or more payload lines.
/// The enroll payload order (fingerprint id first, then the seven
/// captured fields) matches what the scanner firmware reads back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    Enroll(Enrollee),
    Disconnect,
    Reboot,
}

impl ServerCommand {
    /// Renders the command as the line sequence to send, without
    /// trailing newlines.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            ServerCommand::Enroll(e) => vec![
                KW_ENROLL.to_string(),
                e.fingerprint_id.to_string(),
                e.first_name.clone(),
                e.middle_name.clone(),
                e.last_name.clone(),
                e.age.to_string(),
                e.gender.clone(),
                e.phone_number.clone(),
                e.address.clone(),
            ],
            ServerCommand::Disconnect => vec![KW_DISCONNECT.to_string()],
            ServerCommand::Reboot => vec![KW_REBOOT.to_string()],
        }
    }
}
