use std::io::{self, Write};
use std::sync::Arc;

use concierge::routes::guard;
use concierge::{AuthError, ChatController, PaymentOutcome, Route, SendError};
use concierge_api::{BookingStatus, PasswordChange, UserProfile};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use session_store::{MemorySessionStore, SessionStorage, SessionStoreError, ACCESS_TOKEN_KEY, USER_KEY};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::commands::{parse_slash_command, SlashCommand};
use crate::interrupt::Interrupts;
use crate::render::TurnRenderer;

pub const HELP_TEXT: &str = "Commands: /help, /login <user>, /google, /open <path>, /logout, /whoami, /bookings, /password, /clear, /quit\nAnything else is sent to the concierge.";
pub const PROMPT: &str = "> ";
const LOGIN_REQUIRED: &str = "Please /login before chatting.";
const PASSWORD_MISMATCH: &str = "New passwords do not match.";
const OFFLINE_TOKEN: &str = "offline";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Where the shell reads its next line from.
pub trait LineSource: Send {
    /// `None` at end of input.
    fn next_line(&mut self) -> BoxFuture<'_, io::Result<Option<String>>>;
}

pub struct StdinLines {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinLines {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for StdinLines {
    fn next_line(&mut self) -> BoxFuture<'_, io::Result<Option<String>>> {
        self.lines.next_line().boxed()
    }
}

/// Session for the offline mock transport: a placeholder token and guest user.
pub fn offline_storage() -> Result<Arc<dyn SessionStorage>, SessionStoreError> {
    let storage = MemorySessionStore::new();
    storage.set(ACCESS_TOKEN_KEY, OFFLINE_TOKEN)?;
    let guest = serde_json::json!({ "username": "guest", "email": "" });
    storage.set(USER_KEY, &guest.to_string())?;
    Ok(Arc::new(storage))
}

/// Line-oriented host over one [`ChatController`].
pub struct App {
    chat: Arc<ChatController>,
    interrupts: Interrupts,
    download_base: Option<String>,
}

impl App {
    pub fn new(
        chat: Arc<ChatController>,
        interrupts: Interrupts,
        download_base: Option<String>,
    ) -> Self {
        Self {
            chat,
            interrupts,
            download_base,
        }
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    pub async fn run<L, W>(&self, input: &mut L, out: &mut W) -> io::Result<()>
    where
        L: LineSource,
        W: Write + Send,
    {
        writeln!(out, "Travel concierge ({} transport). Type /help for commands.", self.chat.transport_name())?;
        if let Some(user) = self.chat.auth().current_user() {
            writeln!(out, "Signed in as {}.", user.display_name())?;
        }

        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;
            let Some(line) = input.next_line().await? else {
                writeln!(out)?;
                break;
            };
            if self.handle_line(&line, input, out).await? == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    pub async fn handle_line<L, W>(&self, line: &str, input: &mut L, out: &mut W) -> io::Result<Flow>
    where
        L: LineSource,
        W: Write + Send,
    {
        let Some(command) = parse_slash_command(line) else {
            let message = line.trim();
            if !message.is_empty() {
                self.send(message, out).await?;
            }
            return Ok(Flow::Continue);
        };

        match command {
            SlashCommand::Help => writeln!(out, "{HELP_TEXT}")?,
            SlashCommand::Login(None) => writeln!(out, "Usage: /login <username>")?,
            SlashCommand::Login(Some(username)) => {
                let Some(password) = prompt(input, out, "Password: ").await? else {
                    return Ok(Flow::Exit);
                };
                let result = self.chat.auth().login(&username, &password).await;
                self.report_sign_in(result.map(|_| ()), out)?;
            }
            SlashCommand::Google => match self.chat.auth().oauth_login_url().await {
                Ok(url) => {
                    writeln!(out, "Open this address to sign in with Google:\n{url}")?;
                    writeln!(out, "Then paste the address you land on with /open <address>.")?;
                }
                Err(error) => writeln!(out, "{error}")?,
            },
            SlashCommand::Open(None) => writeln!(out, "Usage: /open <path>")?,
            SlashCommand::Open(Some(target)) => self.open(&target, out).await?,
            SlashCommand::Logout => {
                self.chat.auth().logout();
                writeln!(out, "Signed out.")?;
            }
            SlashCommand::WhoAmI => self.whoami(out).await?,
            SlashCommand::Bookings => self.bookings(out).await?,
            SlashCommand::Password => return self.change_password(input, out).await,
            SlashCommand::Clear => match self.chat.clear() {
                Ok(()) => writeln!(out, "Conversation cleared.")?,
                Err(error) => writeln!(out, "{error}")?,
            },
            SlashCommand::Quit => return Ok(Flow::Exit),
            SlashCommand::Unknown(command) => {
                writeln!(out, "Unknown command {command}. Type /help for commands.")?
            }
        }
        Ok(Flow::Continue)
    }

    async fn send<W: Write + Send>(&self, message: &str, out: &mut W) -> io::Result<()> {
        if guard(Route::Home, self.chat.auth()) == Route::Login {
            writeln!(out, "{LOGIN_REQUIRED}")?;
            return Ok(());
        }

        let mut renderer = TurnRenderer::new();
        let mut write_error = None;
        self.interrupts.begin_stream();
        let result = self
            .chat
            .send_with(message, Some(self.interrupts.cancel_signal()), |turn| {
                let text = renderer.update(turn);
                if text.is_empty() || write_error.is_some() {
                    return;
                }
                if let Err(error) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
                    write_error = Some(error);
                }
            })
            .await;
        self.interrupts.end_stream();
        if let Some(error) = write_error {
            return Err(error);
        }

        match result {
            Ok(outcome) => write!(out, "{}", renderer.finish(&outcome))?,
            Err(SendError::NotAuthenticated) => writeln!(out, "{LOGIN_REQUIRED}")?,
            Err(error @ SendError::Busy) => writeln!(out, "{error}")?,
        }
        Ok(())
    }

    async fn open<W: Write + Send>(&self, target: &str, out: &mut W) -> io::Result<()> {
        let route = guard(Route::parse(target), self.chat.auth());
        match &route {
            Route::AuthCallback { code } => {
                let result = self.chat.auth().login_via_oauth(code).await;
                self.report_sign_in(result.map(|_| ()), out)?;
            }
            Route::PaymentSuccess | Route::PaymentFailure => {
                let query = target.split_once('?').map(|(_, query)| query).unwrap_or("");
                if let Some(outcome) = PaymentOutcome::from_query(&route, query) {
                    self.report_payment(&outcome, out)?;
                }
            }
            Route::Bookings => self.bookings(out).await?,
            Route::Login => writeln!(out, "Sign in with /login <user> or /google.")?,
            Route::Landing | Route::Home | Route::Preferences => self.whoami(out).await?,
            Route::NotFound(path) => writeln!(out, "Nothing lives at {path}.")?,
        }
        Ok(())
    }

    async fn whoami<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if !self.chat.auth().is_authenticated() {
            return writeln!(out, "Not signed in.");
        }
        match self.chat.auth().refresh_user().await {
            Ok(user) => write_user(&user, out),
            Err(AuthError::Unauthorized) => {
                writeln!(out, "Your session has expired. Please /login again.")
            }
            Err(error) => {
                writeln!(out, "{error}")?;
                match self.chat.auth().current_user() {
                    Some(user) => write_user(&user, out),
                    None => Ok(()),
                }
            }
        }
    }

    async fn bookings<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let bookings = match self.chat.auth().fetch_bookings().await {
            Ok(bookings) => bookings,
            Err(error) => return writeln!(out, "{}", auth_message(&error)),
        };
        if bookings.is_empty() {
            return writeln!(out, "No bookings yet.");
        }
        for booking in bookings {
            writeln!(
                out,
                "{:<10} {:<12} {:<24} {:>10} {}",
                booking.id,
                booking.date,
                booking.destination,
                booking.amount,
                booking.status.as_str()
            )?;
            if booking.status == BookingStatus::Confirmed {
                if let Some(url) = self
                    .download_base
                    .as_deref()
                    .and_then(|base| booking.download_url(base))
                {
                    writeln!(out, "           invoice: {url}")?;
                }
            }
        }
        Ok(())
    }

    async fn change_password<L, W>(&self, input: &mut L, out: &mut W) -> io::Result<Flow>
    where
        L: LineSource,
        W: Write + Send,
    {
        let mut answers = Vec::with_capacity(3);
        for label in ["Current password: ", "New password: ", "Repeat new password: "] {
            match prompt(input, out, label).await? {
                Some(answer) => answers.push(answer),
                None => return Ok(Flow::Exit),
            }
        }
        if answers[1] != answers[2] {
            writeln!(out, "{PASSWORD_MISMATCH}")?;
            return Ok(Flow::Continue);
        }

        let change = PasswordChange::new(answers[0].clone(), answers[1].clone());
        match self.chat.auth().change_password(&change).await {
            Ok(()) => writeln!(out, "Password updated.")?,
            Err(error) => writeln!(out, "{}", auth_message(&error))?,
        }
        Ok(Flow::Continue)
    }

    fn report_sign_in<W: Write>(&self, result: Result<(), AuthError>, out: &mut W) -> io::Result<()> {
        match result {
            Ok(()) => match self.chat.auth().current_user() {
                Some(user) => writeln!(out, "Signed in as {}.", user.display_name()),
                None => writeln!(out, "Signed in."),
            },
            Err(error) => writeln!(out, "{}", auth_message(&error)),
        }
    }

    fn report_payment<W: Write>(&self, outcome: &PaymentOutcome, out: &mut W) -> io::Result<()> {
        match outcome {
            PaymentOutcome::Success { .. } => writeln!(out, "Payment successful.")?,
            PaymentOutcome::Failure { message, .. } => writeln!(out, "Payment failed: {message}")?,
        }
        if let Some(id) = outcome.transaction_id() {
            writeln!(out, "Transaction: {id}")?;
        }
        if let Some(url) = self
            .download_base
            .as_deref()
            .and_then(|base| outcome.download_url(base))
        {
            writeln!(out, "Invoice: {url}")?;
        }
        Ok(())
    }
}

async fn prompt<L, W>(input: &mut L, out: &mut W, label: &str) -> io::Result<Option<String>>
where
    L: LineSource,
    W: Write,
{
    write!(out, "{label}")?;
    out.flush()?;
    Ok(input
        .next_line()
        .await?
        .map(|line| line.trim_end_matches(['\r', '\n']).to_string()))
}

fn write_user<W: Write>(user: &UserProfile, out: &mut W) -> io::Result<()> {
    if user.email.is_empty() {
        writeln!(out, "[{}] {} ({})", user.initial(), user.display_name(), user.username)
    } else {
        writeln!(
            out,
            "[{}] {} ({}) <{}>",
            user.initial(),
            user.display_name(),
            user.username,
            user.email
        )
    }
}

fn auth_message(error: &AuthError) -> String {
    match error {
        AuthError::Unauthorized => "Your session has expired. Please /login again.".to_string(),
        AuthError::NotAuthenticated => "Not signed in.".to_string(),
        other => other.to_string(),
    }
}
