#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Login(Option<String>),
    Google,
    Open(Option<String>),
    Logout,
    WhoAmI,
    Bookings,
    Password,
    Clear,
    Quit,
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut words = trimmed.split_whitespace();
    let command = words.next().unwrap_or(trimmed).to_string();
    let argument = words.next().map(ToString::to_string);

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/login" => SlashCommand::Login(argument),
        "/google" => SlashCommand::Google,
        "/open" => SlashCommand::Open(argument),
        "/logout" => SlashCommand::Logout,
        "/whoami" => SlashCommand::WhoAmI,
        "/bookings" => SlashCommand::Bookings,
        "/password" => SlashCommand::Password,
        "/clear" => SlashCommand::Clear,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}
