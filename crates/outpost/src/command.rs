//! Operator commands: parsing a console line into a [`Command`].
//!
//! A line is split on its first whitespace run into a verb and a raw
//! remainder. The verb is matched case-insensitively against two disjoint
//! tables: commands that take no arguments and commands that do. Each
//! argument-taking command parses its remainder into typed fields here,
//! so handlers never split strings themselves.

use outpost_protocol::GiftedItem;

use crate::ConsoleError;

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // -- No arguments -----------------------------------------------------
    Help,
    Settings,
    Reload,
    Status,
    EventList,
    Chat,
    List,
    Settlements,
    BanList,
    AdminList,
    Whitelist,
    Wipe,
    Clear,
    Exit,

    // -- With arguments ---------------------------------------------------
    Say { text: String },
    Broadcast { text: String },
    Notify { username: String, text: String },
    Invoke { username: String, event: String },
    Plague { event: String },
    Investigate { username: String },
    Kick { username: String },
    Ban { username: String },
    Pardon { username: String },
    Promote { username: String },
    Demote { username: String },
    GiveItem { username: String, item: GiftedItem },
    GiveItemAll { item: GiftedItem },
    Protect { username: String },
    Deprotect { username: String },
    Immunize { username: String },
    Deimmunize { username: String },
}

/// Commands that ignore anything after the verb.
const SIMPLE: &[(&str, Command)] = &[
    ("help", Command::Help),
    ("settings", Command::Settings),
    ("reload", Command::Reload),
    ("status", Command::Status),
    ("eventlist", Command::EventList),
    ("chat", Command::Chat),
    ("list", Command::List),
    ("settlements", Command::Settlements),
    ("banlist", Command::BanList),
    ("adminlist", Command::AdminList),
    ("whitelist", Command::Whitelist),
    ("wipe", Command::Wipe),
    ("clear", Command::Clear),
    ("exit", Command::Exit),
];

/// Verbs of commands that need arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgVerb {
    Say,
    Broadcast,
    Notify,
    Invoke,
    Plague,
    Investigate,
    Kick,
    Ban,
    Pardon,
    Promote,
    Demote,
    GiveItem,
    GiveItemAll,
    Protect,
    Deprotect,
    Immunize,
    Deimmunize,
}

const WITH_ARGS: &[(&str, ArgVerb)] = &[
    ("say", ArgVerb::Say),
    ("broadcast", ArgVerb::Broadcast),
    ("notify", ArgVerb::Notify),
    ("invoke", ArgVerb::Invoke),
    ("plague", ArgVerb::Plague),
    ("investigate", ArgVerb::Investigate),
    ("kick", ArgVerb::Kick),
    ("ban", ArgVerb::Ban),
    ("pardon", ArgVerb::Pardon),
    ("promote", ArgVerb::Promote),
    ("demote", ArgVerb::Demote),
    ("giveitem", ArgVerb::GiveItem),
    ("giveitemall", ArgVerb::GiveItemAll),
    ("protect", ArgVerb::Protect),
    ("deprotect", ArgVerb::Deprotect),
    ("immunize", ArgVerb::Immunize),
    ("deimmunize", ArgVerb::Deimmunize),
];

impl ArgVerb {
    fn usage(self) -> &'static str {
        match self {
            Self::Say => "say [message]",
            Self::Broadcast => "broadcast [text]",
            Self::Notify => "notify [username] [text]",
            Self::Invoke => "invoke [username] [eventID]",
            Self::Plague => "plague [eventID]",
            Self::Investigate => "investigate [username]",
            Self::Kick => "kick [username]",
            Self::Ban => "ban [username]",
            Self::Pardon => "pardon [username]",
            Self::Promote => "promote [username]",
            Self::Demote => "demote [username]",
            Self::GiveItem => "giveitem [username] [itemID] [itemQuantity] [itemQuality]",
            Self::GiveItemAll => "giveitemall [itemID] [itemQuantity] [itemQuality]",
            Self::Protect => "protect [username]",
            Self::Deprotect => "deprotect [username]",
            Self::Immunize => "immunize [username]",
            Self::Deimmunize => "deimmunize [username]",
        }
    }

    fn parse(self, rest: &str) -> Result<Command, ConsoleError> {
        let missing = || ConsoleError::MissingArguments {
            usage: self.usage(),
        };
        let words: Vec<&str> = rest.split_whitespace().collect();

        // Single username argument.
        let username = || words.first().map(|w| w.to_string()).ok_or_else(missing);
        // First word, then everything after it verbatim.
        let head_and_text = || -> Result<(String, String), ConsoleError> {
            let (head, text) = split_first_word(rest);
            if head.is_empty() || text.is_empty() {
                return Err(missing());
            }
            Ok((head.to_string(), text.to_string()))
        };

        Ok(match self {
            Self::Say | Self::Broadcast if rest.is_empty() => return Err(missing()),
            Self::Say => Command::Say {
                text: rest.to_string(),
            },
            Self::Broadcast => Command::Broadcast {
                text: rest.to_string(),
            },
            Self::Notify => {
                let (username, text) = head_and_text()?;
                Command::Notify { username, text }
            }
            Self::Invoke => match words.as_slice() {
                [username, event, ..] => Command::Invoke {
                    username: username.to_string(),
                    event: event.to_string(),
                },
                _ => return Err(missing()),
            },
            Self::Plague => Command::Plague {
                event: words.first().map(|w| w.to_string()).ok_or_else(missing)?,
            },
            Self::Investigate => Command::Investigate { username: username()? },
            Self::Kick => Command::Kick { username: username()? },
            Self::Ban => Command::Ban { username: username()? },
            Self::Pardon => Command::Pardon { username: username()? },
            Self::Promote => Command::Promote { username: username()? },
            Self::Demote => Command::Demote { username: username()? },
            Self::Protect => Command::Protect { username: username()? },
            Self::Deprotect => Command::Deprotect { username: username()? },
            Self::Immunize => Command::Immunize { username: username()? },
            Self::Deimmunize => Command::Deimmunize { username: username()? },
            Self::GiveItem => match words.as_slice() {
                [username, id, quantity, quality, ..] => Command::GiveItem {
                    username: username.to_string(),
                    item: gift(id, quantity, quality)?,
                },
                _ => return Err(missing()),
            },
            Self::GiveItemAll => match words.as_slice() {
                [id, quantity, quality, ..] => Command::GiveItemAll {
                    item: gift(id, quantity, quality)?,
                },
                _ => return Err(missing()),
            },
        })
    }
}

fn gift(id: &str, quantity: &str, quality: &str) -> Result<GiftedItem, ConsoleError> {
    let quantity = quantity
        .parse()
        .map_err(|_| ConsoleError::InvalidArgument {
            value: quantity.to_string(),
            reason: "item quantity must be a whole number",
        })?;
    Ok(GiftedItem {
        item_id: id.to_string(),
        quantity,
        quality: quality.to_string(),
    })
}

/// Splits off the first whitespace-delimited word; the remainder is trimmed.
fn split_first_word(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(at) => (&line[..at], line[at..].trim_start()),
        None => (line, ""),
    }
}

impl Command {
    /// Parses one console line.
    ///
    /// Returns `Ok(None)` for a blank line.
    ///
    /// # Errors
    /// [`ConsoleError::UnknownCommand`] when the verb is in neither table;
    /// [`ConsoleError::MissingArguments`] / [`ConsoleError::InvalidArgument`]
    /// when an argument-taking command's remainder does not fit.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = split_first_word(line);
        let verb = verb.to_lowercase();

        if let Some((_, command)) = SIMPLE.iter().find(|(name, _)| *name == verb) {
            return Ok(Some(command.clone()));
        }
        if let Some((_, arg_verb)) = WITH_ARGS.iter().find(|(name, _)| *name == verb) {
            return arg_verb.parse(rest).map(Some);
        }
        Err(ConsoleError::UnknownCommand(line.to_string()))
    }
}
