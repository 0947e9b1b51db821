//! Static operator command table.
//!
//! One table, read-only after startup. Matching walks the table in
//! order and the first structural match wins, so references that are
//! prefixes of other references (`export` under `export date` and
//! `export event`) MUST come after the longer forms. Keep that
//! ordering when editing.

/// Identifies a command definition for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    StartServer,
    StopServer,
    Enroll,
    Disconnect,
    ListClients,
    Reboot,
    InitTables,
    ExportDate,
    ExportEvent,
    /// Bare `export` with no mode; always reported as missing
    /// arguments, kept in the table so the mistake gets a usage line
    /// instead of "unknown command".
    ExportBare,
    ShowEvent,
    SetEvent,
}

/// One immutable command definition.
#[derive(Debug, Clone, Copy)]
pub struct CommandDef {
    pub id: CommandId,
    pub description: &'static str,
    pub syntax: &'static str,
    pub reference: &'static str,
}

/// All operator commands, in match order.
pub const COMMANDS: &[CommandDef] = &[
    CommandDef {
        id: CommandId::StartServer,
        description: "Starts the server.",
        syntax: "start server",
        reference: "start server",
    },
    CommandDef {
        id: CommandId::StopServer,
        description: "Stops the server.",
        syntax: "stop server",
        reference: "stop server",
    },
    CommandDef {
        id: CommandId::Enroll,
        description: "Register a fingerprint on a selected scanner client.",
        syntax: "enroll <client-name>",
        reference: "enroll",
    },
    CommandDef {
        id: CommandId::Disconnect,
        description: "Disconnect a scanner client from the server.",
        syntax: "disconnect <client-name>",
        reference: "disconnect",
    },
    CommandDef {
        id: CommandId::ListClients,
        description: "Show the name and address of every connected client.",
        syntax: "clients info",
        reference: "clients info",
    },
    CommandDef {
        id: CommandId::Reboot,
        description: "Reboot a scanner client.",
        syntax: "reboot <client-name>",
        reference: "reboot",
    },
    CommandDef {
        id: CommandId::InitTables,
        description: "Create the storage tables if they do not exist.",
        syntax: "init tables",
        reference: "init tables",
    },
    // Longer export forms before the bare prefix.
    CommandDef {
        id: CommandId::ExportDate,
        description: "Export attendance records for one date.",
        syntax: "export date <yyyy-mm-dd>",
        reference: "export date",
    },
    CommandDef {
        id: CommandId::ExportEvent,
        description: "Export attendance records for one event.",
        syntax: "export event <name>",
        reference: "export event",
    },
    CommandDef {
        id: CommandId::ExportBare,
        description: "Export attendance records.",
        syntax: "export <date|event> <args>",
        reference: "export",
    },
    CommandDef {
        id: CommandId::ShowEvent,
        description: "Show the current event name and location.",
        syntax: "event see",
        reference: "event see",
    },
    CommandDef {
        id: CommandId::SetEvent,
        description: "Set the current event name and location.",
        syntax: "event new <name> <location>",
        reference: "event new",
    },
];

/// Whole-word prefix match: the reference tokens must equal the first
/// input tokens. Token-wise, so the amount of whitespace between words
/// is irrelevant.
pub fn matches_reference(input: &str, reference: &str) -> bool {
    let mut input_tokens = input.split_whitespace();
    reference
        .split_whitespace()
        .all(|token| input_tokens.next() == Some(token))
}

/// Finds the first definition the input structurally matches.
pub fn find_command(input: &str) -> Option<&'static CommandDef> {
    COMMANDS.iter().find(|def| matches_reference(input, def.reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_references_match() {
        assert_eq!(find_command("start server").map(|d| d.id), Some(CommandId::StartServer));
        assert_eq!(find_command("clients info").map(|d| d.id), Some(CommandId::ListClients));
        assert_eq!(find_command("event see").map(|d| d.id), Some(CommandId::ShowEvent));
    }

    #[test]
    fn word_boundary_is_enforced() {
        // "enrollFinger" is a device keyword, not the operator command.
        assert!(find_command("enrollFinger").is_none());
        assert!(find_command("disconnected").is_none());
        assert!(find_command("exporting now").is_none());
    }

    #[test]
    fn longer_export_forms_win_over_bare_export() {
        assert_eq!(
            find_command("export date 2024-01-05").map(|d| d.id),
            Some(CommandId::ExportDate)
        );
        assert_eq!(
            find_command("export event Orientation").map(|d| d.id),
            Some(CommandId::ExportEvent)
        );
        assert_eq!(find_command("export").map(|d| d.id), Some(CommandId::ExportBare));
        // Unknown mode falls through to the bare definition.
        assert_eq!(find_command("export all").map(|d| d.id), Some(CommandId::ExportBare));
    }

    #[test]
    fn extra_whitespace_between_words_is_ignored() {
        assert_eq!(
            find_command("export  date 2024-01-05").map(|d| d.id),
            Some(CommandId::ExportDate)
        );
        assert_eq!(
            find_command("start   server").map(|d| d.id),
            Some(CommandId::StartServer)
        );
        assert_eq!(
            find_command("event  new Orientation Main-Hall").map(|d| d.id),
            Some(CommandId::SetEvent)
        );
    }

    #[test]
    fn arguments_do_not_break_matching() {
        assert_eq!(find_command("enroll AbCd1234").map(|d| d.id), Some(CommandId::Enroll));
        assert_eq!(
            find_command("event new Orientation Main-Hall").map(|d| d.id),
            Some(CommandId::SetEvent)
        );
    }

    #[test]
    fn unknown_input_matches_nothing() {
        assert!(find_command("restart server").is_none());
        assert!(find_command("help").is_none());
    }
}
