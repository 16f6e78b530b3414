//! Line-oriented terminal front end over the client core.

use crate::auth::{AuthFormView, FormMessage, LoginInput, MessageKind, RegisterInput};
use crate::chat::SUGGESTIONS;
use crate::host::UiHost;
use crate::models::UploadFile;
use crate::state::EntryKind;
use crate::view::render_page;
use crate::App;
use anyhow::Context;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::runtime::Runtime;

const HELP: &str = "\
Commands:
  /login <email> <password>
  /register <email> <username> <password> [zh|en|ms]
  /sessions                 list chats
  /open <session_id>        open a chat
  /new                      start a new chat
  /delete <session_id>      delete a chat
  /rename <session_id> <title>
  /attach <path>...         queue files for the next message
  /detach <n>               drop Attachment-<n>
  /attachments              list queued files
  /suggest <n>              send a welcome suggestion
  /prefs                    show preferences
  /prefs set <lang> [topic,...]
  /topics [lang]            list math topics
  /profile <username> <email>
  /password <current> <new> <confirm>
  /theme                    toggle light/dark
  /html                     dump the page markup
  /quit
Anything else is sent as a message.";

/// [`UiHost`] for the terminal: alerts go to stderr, confirmations read a
/// y/n answer from stdin.
#[derive(Debug)]
pub struct TerminalHost {
    url: Mutex<String>,
}

impl Default for TerminalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalHost {
    pub fn new() -> Self {
        Self {
            url: Mutex::new("/".to_string()),
        }
    }

    pub fn current_url(&self) -> String {
        self.url.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl UiHost for TerminalHost {
    fn alert(&self, message: &str) {
        eprintln!("! {}", message);
    }

    fn confirm(&self, message: &str) -> bool {
        ask(&mut io::stdout(), &mut io::stdin().lock(), message)
    }

    fn navigate(&self, href: &str) {
        println!("-> {}", href);
        if let Ok(mut url) = self.url.lock() {
            *url = href.to_string();
        }
    }

    fn push_url(&self, path: &str) {
        log::debug!("URL is now {}", path);
        if let Ok(mut url) = self.url.lock() {
            *url = path.to_string();
        }
    }
}

/// Writes a y/n prompt and reads the answer. Anything but yes is a no.
fn ask(out: &mut impl Write, input: &mut impl BufRead, message: &str) -> bool {
    if let Err(e) = write!(out, "{} [y/N] ", message).and_then(|_| out.flush()) {
        log::warn!("Could not write prompt: {}", e);
    }
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(e) => {
            log::warn!("Could not read confirmation: {}", e);
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Register(RegisterInput),
    Sessions,
    Open(String),
    New,
    Delete(String),
    Rename { session_id: String, title: String },
    Attach(Vec<PathBuf>),
    Detach(usize),
    Attachments,
    Suggest(usize),
    ShowPreferences,
    SetPreferences { language: String, topics: Vec<String> },
    Topics(Option<String>),
    Profile { username: String, email: String },
    Password { current: String, new: String, confirm: String },
    Theme,
    Html,
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim();
        if !line.starts_with('/') {
            return Command::Send(line.to_string());
        }
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        let usage = || Command::Invalid(format!("bad arguments for {}, try /help", name));

        match (name, args.as_slice()) {
            ("/login", [email, password]) => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            ("/register", [email, username, password, rest @ ..]) if rest.len() <= 1 => {
                Command::Register(RegisterInput {
                    email: email.to_string(),
                    username: username.to_string(),
                    password: password.to_string(),
                    confirm_password: password.to_string(),
                    language: rest.first().unwrap_or(&"zh").to_string(),
                })
            }
            ("/sessions", []) => Command::Sessions,
            ("/open", [id]) => Command::Open(id.to_string()),
            ("/new", []) => Command::New,
            ("/delete", [id]) => Command::Delete(id.to_string()),
            ("/rename", [id, title @ ..]) if !title.is_empty() => Command::Rename {
                session_id: id.to_string(),
                title: title.join(" "),
            },
            ("/attach", paths) if !paths.is_empty() => {
                Command::Attach(paths.iter().map(PathBuf::from).collect())
            }
            ("/detach", [n]) => n.parse().map(Command::Detach).unwrap_or_else(|_| usage()),
            ("/attachments", []) => Command::Attachments,
            ("/suggest", [n]) => n.parse().map(Command::Suggest).unwrap_or_else(|_| usage()),
            ("/prefs", []) => Command::ShowPreferences,
            ("/prefs", ["set", language, topics @ ..]) if topics.len() <= 1 => {
                Command::SetPreferences {
                    language: language.to_string(),
                    topics: topics
                        .first()
                        .map(|t| {
                            t.split(',')
                                .filter(|t| !t.is_empty())
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            }
            ("/topics", []) => Command::Topics(None),
            ("/topics", [lang]) => Command::Topics(Some(lang.to_string())),
            ("/profile", [username, email]) => Command::Profile {
                username: username.to_string(),
                email: email.to_string(),
            },
            ("/password", [current, new, confirm]) => Command::Password {
                current: current.to_string(),
                new: new.to_string(),
                confirm: confirm.to_string(),
            },
            ("/theme", []) => Command::Theme,
            ("/html", []) => Command::Html,
            ("/help", []) => Command::Help,
            ("/quit", []) | ("/exit", []) => Command::Quit,
            ("/login" | "/register" | "/open" | "/delete" | "/rename" | "/attach" | "/detach"
            | "/suggest" | "/prefs" | "/topics" | "/profile" | "/password", _) => usage(),
            _ => Command::Invalid(format!("unknown command {}, try /help", name)),
        }
    }
}

fn print_form(view: &AuthFormView) {
    for (field, message) in &view.field_errors {
        println!("  {:?}: {}", field, message);
    }
    if let Some(message) = &view.message {
        print_message(message);
    }
}

fn print_message(message: &FormMessage) {
    match message.kind {
        MessageKind::Success => println!("  {}", message.text),
        MessageKind::Error => println!("  error: {}", message.text),
    }
}

/// Prints the transcript entries added since the last call.
fn print_transcript(app: &App, shown: &mut usize) {
    let entries = app.chat.state().transcript.entries();
    if entries.len() < *shown {
        *shown = 0;
    }
    for entry in &entries[*shown..] {
        match entry.kind {
            EntryKind::User => println!("you> {}", entry.content),
            EntryKind::Assistant => println!("mentor> {}\n", entry.content),
            EntryKind::Error | EntryKind::Notice => println!("   * {}", entry.content),
            EntryKind::Loading => {}
        }
    }
    *shown = entries.len();
}

async fn read_files(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadFile::from_name(name, bytes));
    }
    Ok(files)
}

/// Executes one command. Returns `false` when the shell should exit.
async fn execute(app: &mut App, command: Command) -> bool {
    match command {
        Command::Login { email, password } => {
            let view = app.auth.login(&LoginInput { email, password }).await;
            print_form(&view);
            if view.redirected {
                app.chat.load_session_list().await;
            }
        }
        Command::Register(input) => {
            let view = app.auth.register(&input).await;
            print_form(&view);
            if view.redirected {
                app.chat.load_session_list().await;
            }
        }
        Command::Sessions => {
            app.chat.load_session_list().await;
            match &app.chat.state().sidebar {
                crate::state::Sidebar::Error(message) => println!("  {}", message),
                crate::state::Sidebar::Items(items) if items.is_empty() => println!("  (no chats)"),
                crate::state::Sidebar::Items(items) => {
                    for item in items {
                        let marker = if item.active { "*" } else { " " };
                        println!("{} {}  {}", marker, item.session_id, item.title);
                    }
                }
            }
        }
        Command::Open(session_id) => app.chat.open_session(&session_id).await,
        Command::New => app.chat.new_chat().await,
        Command::Delete(session_id) => app.chat.delete_session(&session_id).await,
        Command::Rename { session_id, title } => {
            app.chat.rename_session(&session_id, &title).await
        }
        Command::Attach(paths) => match read_files(&paths).await {
            Ok(files) => {
                let queued = app.chat.attach_files(files);
                println!("  queued {} file(s)", queued.len());
            }
            Err(e) => println!("  error: {:#}", e),
        },
        Command::Detach(ordinal) => {
            if app.chat.state_mut().uploads.remove_ordinal(ordinal).is_none() {
                println!("  no Attachment-{}", ordinal);
            }
        }
        Command::Attachments => {
            for item in app.chat.state().uploads.items() {
                println!("  {}  {} ({})", item.label(), item.file.name, item.file.mime);
            }
        }
        Command::Suggest(n) => match n.checked_sub(1).and_then(|i| SUGGESTIONS.get(i)) {
            Some(suggestion) => app.chat.send_suggestion(suggestion).await,
            None => println!("  pick 1-{}", SUGGESTIONS.len()),
        },
        Command::ShowPreferences => {
            let theme = app.theme.current().await.unwrap_or_default();
            if let Some(view) = app.chat.load_preferences(theme).await {
                println!("  language: {} ({})", view.language_name(), view.language);
                println!("  topics:   {}", view.math_topics.join(", "));
                println!("  theme:    {}", view.theme);
                if let Some(message) = &view.message {
                    print_message(message);
                }
            }
            app.chat.click_outside();
        }
        Command::SetPreferences { language, topics } => {
            if let Some(message) = app.chat.save_preferences(&language, topics).await {
                print_message(&message);
            }
        }
        Command::Topics(lang) => {
            let lang = lang.unwrap_or_else(|| {
                app.chat
                    .state()
                    .preferences()
                    .map(|p| p.language.clone())
                    .unwrap_or_else(crate::models::default_language)
            });
            for (key, name) in app.chat.math_topics(&lang).await {
                println!("  {:<16} {}", key, name);
            }
        }
        Command::Profile { username, email } => {
            if let Some(message) = app.chat.update_profile(&username, &email).await {
                print_message(&message);
            }
        }
        Command::Password {
            current,
            new,
            confirm,
        } => {
            if let Some(message) = app.chat.change_password(&current, &new, &confirm).await {
                print_message(&message);
            }
        }
        Command::Theme => match app.theme.toggle().await {
            Ok(view) => println!("  {} ({})", view.body_class, view.stylesheet),
            Err(e) => println!("  error: {}", e),
        },
        Command::Html => println!("{}", render_page(app.chat.state())),
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
        Command::Send(text) => {
            if text.is_empty() && app.chat.state().uploads.is_empty() {
                return true;
            }
            app.chat.set_composer_text(text);
            app.chat.send_message().await;
        }
        Command::Invalid(message) => println!("  {}", message),
    }
    true
}

/// Reads commands from stdin until `/quit` or end of input.
pub fn run_shell(runtime: &Runtime, app: &mut App, host: &TerminalHost) -> anyhow::Result<()> {
    println!("MathMentor. Type /help for commands.");
    let mut shown = 0;
    print_transcript(app, &mut shown);

    loop {
        print!("{}> ", host.current_url());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        if read == 0 {
            break;
        }

        let command = Command::parse(&line);
        let keep_going = runtime.block_on(execute(app, command));
        for handle in app.chat.state_mut().uploads.take_released() {
            log::debug!("Released preview {}", handle);
        }
        print_transcript(app, &mut shown);
        if !keep_going {
            break;
        }
    }
    log::info!("Shell closed");
    Ok(())
}
