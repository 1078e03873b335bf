//! Text commands recognized in group chats.

/// Reply sent when a command cannot be served.
pub const ERROR_REPLY: &str = "エラーが発生しました。もう一度お試しください。";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `問題`: push a problem now.
    PushProblem,
    /// `解説`: tabulate and push the editorial now.
    PushEditorial,
    /// `地図` or `地図 <tag>`: a random catalog entry, optionally filtered.
    Map(String),
    /// `匿名`: flip the sender's "hide my name" flag.
    TogglePrivacy,
}

impl Command {
    /// Parse a message. Anything else is ordinary chat and yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            "問題" => return Some(Self::PushProblem),
            "解説" => return Some(Self::PushEditorial),
            "匿名" => return Some(Self::TogglePrivacy),
            _ => {}
        }
        let rest = text.strip_prefix("地図")?;
        if rest.is_empty() {
            return Some(Self::Map(String::new()));
        }
        // The tag must be separated by a space (ASCII or ideographic).
        if rest.starts_with(char::is_whitespace) {
            Some(Self::Map(rest.trim().to_string()))
        } else {
            None
        }
    }

    /// Commands that run a broadcast job.
    pub fn is_manual_trigger(&self) -> bool {
        matches!(self, Self::PushProblem | Self::PushEditorial)
    }
}

/// Reply to a privacy toggle.
pub fn privacy_reply(hidden: bool) -> &'static str {
    if hidden {
        "名前を非表示にしました。集計結果には「匿名」として表示されます。"
    } else {
        "名前を表示するように戻しました。"
    }
}

/// Reply when no catalog entry matches.
pub fn no_map_reply(tag: &str) -> String {
    if tag.is_empty() {
        ERROR_REPLY.to_string()
    } else {
        format!("「{tag}」に該当する地図が見つかりませんでした。")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("問題"), Some(Command::PushProblem));
        assert_eq!(Command::parse(" 解説\n"), Some(Command::PushEditorial));
        assert_eq!(Command::parse("匿名"), Some(Command::TogglePrivacy));
        assert_eq!(Command::parse("地図"), Some(Command::Map(String::new())));
        assert_eq!(Command::parse("地図 リレー"), Some(Command::Map("リレー".into())));
        assert_eq!(Command::parse("地図　スプリント"), Some(Command::Map("スプリント".into())));
    }

    #[test]
    fn test_ordinary_chat_ignored() {
        assert_eq!(Command::parse("問題むずかしい"), None);
        assert_eq!(Command::parse("地図帳"), None);
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_manual_trigger_flag() {
        assert!(Command::PushProblem.is_manual_trigger());
        assert!(Command::PushEditorial.is_manual_trigger());
        assert!(!Command::TogglePrivacy.is_manual_trigger());
        assert!(!Command::Map(String::new()).is_manual_trigger());
    }

    #[test]
    fn test_replies() {
        assert_eq!(no_map_reply(""), ERROR_REPLY);
        assert!(no_map_reply("リレー").contains("リレー"));
        assert_ne!(privacy_reply(true), privacy_reply(false));
    }
}
