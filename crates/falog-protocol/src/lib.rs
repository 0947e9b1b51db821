//! falog Protocol - the scanner device wire protocol
//!
//! Devices speak newline-terminated UTF-8 text over TCP: no framing
//! beyond `\n`, no length prefix, no authentication. A message is one
//! keyword line, optionally followed by a fixed number of payload
//! lines in a fixed order.
//!
//! This crate classifies inbound lines ([`DeviceMessage`]), assembles
//! multi-line payloads ([`EnrollmentPayload`], [`ScanPayload`]), and
//! renders outbound commands as line sequences ([`ServerCommand`]).

pub mod message;
pub mod payload;

pub use message::{DeviceMessage, ServerCommand};
pub use payload::{EnrollmentPayload, ProtocolError, ScanPayload, ENROLLMENT_FIELD_COUNT};
