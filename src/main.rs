use std::io::{self, Write};
use std::sync::Arc;

use dotenvy::dotenv;
use lazy_static::lazy_static;
use regex::Regex;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

use savol_relay::bot::admin;
use savol_relay::bot::handlers::{self, Command};
use savol_relay::bot::state::{PanelSession, RelayDialogue, State};
use savol_relay::config::Settings;
use savol_relay::storage::Database;

lazy_static! {
    static ref RE_TOKEN1: Regex =
        Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/[^'\s]*)").unwrap();
    static ref RE_TOKEN2: Regex = Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})").unwrap();
    static ref RE_TOKEN3: Regex = Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+").unwrap();
}

fn redact(input: &str) -> String {
    let mut output = input.to_string();
    output = RE_TOKEN1
        .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
        .to_string();
    output = RE_TOKEN2.replace_all(&output, "[TELEGRAM_TOKEN]").to_string();
    output = RE_TOKEN3.replace_all(&output, "$1[TELEGRAM_TOKEN]").to_string();
    output
}

struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> RedactingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<F> RedactingMakeWriter<F> {
    fn new(make_inner: F) -> Self {
        Self { make_inner }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)())
    }
}

// Command menu and bot profile texts, installed best-effort at startup.
async fn setup_bot_meta(bot: &Bot) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("failed to install the command menu: {e}");
    }

    let description = "👋🏻 Xush kelibsiz!\n\
        Savollaringizni navbatchi shifokorlarga yetkazib beraman.\n\n\
        Undan oldin kanalga a'zo bo'lishingiz SHART!\n\n\
        Muammo va savollaringizni matn, video, rasm yoki hujjat shaklida \
        yuborib batafsil yozing.";
    if let Err(e) = bot.set_my_description().description(description).await {
        warn!("failed to set bot description: {e}");
    }
    if let Err(e) = bot
        .set_my_short_description()
        .short_description("Tibbiy savollar uchun navbatchi shifokorlar bilan aloqa")
        .await
    {
        warn!("failed to set short description: {e}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Setup logging with token redaction
    let make_writer = RedactingMakeWriter::new(io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();

    info!("Starting Savol Relay bot...");

    let settings = match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if settings.telegram_token.is_empty() {
        error!("TELEGRAM_TOKEN is not set; add it to the environment or .env");
        std::process::exit(1);
    }

    let db = match Database::new(&settings.database_file) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialise the database: {}", e);
            std::process::exit(1);
        }
    };

    let bot = Bot::new(settings.telegram_token.clone());
    let settings = Arc::new(settings);

    setup_bot_meta(&bot).await;

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(
            |bot: Bot, q: CallbackQuery, db: Arc<Database>, settings: Arc<Settings>| async move {
                if let Err(e) = handlers::handle_callback(bot, q, db, settings).await {
                    error!("Callback handler error: {e:#}");
                }
                respond(())
            },
        ))
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<State>, State>()
                .branch(dptree::entry().filter_command::<Command>().endpoint(
                    |bot: Bot,
                     msg: Message,
                     cmd: Command,
                     dialogue: RelayDialogue,
                     db: Arc<Database>,
                     settings: Arc<Settings>| async move {
                        let res = match cmd {
                            Command::Start => handlers::start(bot, msg, db, settings).await,
                            Command::Help => handlers::help(bot, msg, db, settings).await,
                            Command::MyQuestions => {
                                handlers::my_questions(bot, msg, db, settings).await
                            }
                            Command::Admin => admin::admin_command(bot, msg, dialogue).await,
                            Command::SetDoctor => handlers::set_doctor_deprecated(bot, msg).await,
                        };
                        if let Err(e) = res {
                            error!("Command error: {e:#}");
                        }
                        respond(())
                    },
                ))
                .branch(dptree::case![State::AwaitingLogin].endpoint(
                    |bot: Bot, msg: Message, dialogue: RelayDialogue| async move {
                        if let Err(e) = admin::handle_login(bot, msg, dialogue).await {
                            error!("Login handler error: {e:#}");
                        }
                        respond(())
                    },
                ))
                .branch(dptree::case![State::AwaitingPassword].endpoint(
                    |bot: Bot, msg: Message, dialogue: RelayDialogue, db: Arc<Database>| async move {
                        if let Err(e) = admin::handle_password(bot, msg, dialogue, db).await {
                            error!("Password handler error: {e:#}");
                        }
                        respond(())
                    },
                ))
                .branch(dptree::case![State::Authorized(panel)].endpoint(
                    |bot: Bot,
                     msg: Message,
                     panel: PanelSession,
                     dialogue: RelayDialogue,
                     db: Arc<Database>,
                     settings: Arc<Settings>| async move {
                        if let Err(e) =
                            admin::handle_panel(bot, msg, panel, dialogue, db, settings).await
                        {
                            error!("Admin panel handler error: {e:#}");
                        }
                        respond(())
                    },
                ))
                .branch(dptree::case![State::AwaitingAddResponder(panel)].endpoint(
                    |bot: Bot,
                     msg: Message,
                     panel: PanelSession,
                     dialogue: RelayDialogue,
                     db: Arc<Database>,
                     settings: Arc<Settings>| async move {
                        if let Err(e) =
                            admin::handle_add_responder(bot, msg, panel, dialogue, db, settings)
                                .await
                        {
                            error!("Add responder handler error: {e:#}");
                        }
                        respond(())
                    },
                ))
                .branch(dptree::case![State::AwaitingRemoveResponder(panel)].endpoint(
                    |bot: Bot,
                     msg: Message,
                     panel: PanelSession,
                     dialogue: RelayDialogue,
                     db: Arc<Database>| async move {
                        if let Err(e) =
                            admin::handle_remove_responder(bot, msg, panel, dialogue, db).await
                        {
                            error!("Remove responder handler error: {e:#}");
                        }
                        respond(())
                    },
                ))
                .branch(dptree::case![State::AwaitingPasswordChange(panel)].endpoint(
                    |bot: Bot,
                     msg: Message,
                     panel: PanelSession,
                     dialogue: RelayDialogue,
                     db: Arc<Database>| async move {
                        if let Err(e) =
                            admin::handle_password_change(bot, msg, panel, dialogue, db).await
                        {
                            error!("Password change handler error: {e:#}");
                        }
                        respond(())
                    },
                ))
                .branch(
                    dptree::case![State::Idle]
                        .branch(
                            Update::filter_message()
                                .filter(|msg: Message| msg.reply_to_message().is_some())
                                .endpoint(|bot: Bot, msg: Message, db: Arc<Database>| async move {
                                    if let Err(e) =
                                        handlers::handle_responder_reply(bot, msg, db).await
                                    {
                                        error!("Reply handler error: {e:#}");
                                    }
                                    respond(())
                                }),
                        )
                        .branch(Update::filter_message().endpoint(
                            |bot: Bot,
                             msg: Message,
                             db: Arc<Database>,
                             settings: Arc<Settings>| async move {
                                if let Err(e) =
                                    handlers::handle_user_message(bot, msg, db, settings).await
                                {
                                    error!("Message handler error: {e:#}");
                                }
                                respond(())
                            },
                        )),
                ),
        );

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![db, settings, InMemStorage::<State>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
