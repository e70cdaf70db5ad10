use console::{Style, StyledObject};

const RULE_WIDTH: usize = 50;

/// Kind of console message, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A prompt for user input.
    Prompt,
    /// Informational text and hints.
    Info,
    /// A step that completed.
    Success,
    /// Model output.
    Assistant,
    /// An error message.
    Error,
}

/// Styles a string of text according to the specified `MessageType`.
pub fn style_text(text: &str, kind: MessageType) -> StyledObject<&str> {
    let style = match kind {
        MessageType::Prompt => Style::new().blue().bold(),
        MessageType::Info => Style::new().yellow(),
        MessageType::Success => Style::new().green(),
        MessageType::Assistant => Style::new().white().bright(),
        MessageType::Error => Style::new().red().bold(),
    };
    style.apply_to(text)
}

/// A horizontal rule made of `ch`.
pub fn rule(ch: char) -> String {
    ch.to_string().repeat(RULE_WIDTH)
}
