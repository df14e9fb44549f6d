//! Admin panel dialogue: login, roster management and password changes.
//!
//! The whole flow lives in the per-chat dialogue state; nothing here is
//! durable except the final roster/password mutation. Validation failures
//! keep the dialogue in its current state and re-prompt, with no attempt
//! limit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use teloxide::{
    prelude::*,
    types::{
        ButtonRequest, ChatMemberStatus, KeyboardButton, KeyboardMarkup, KeyboardRemove,
        MessageId, ParseMode, Recipient,
    },
};
use tracing::{debug, error, info, warn};

use crate::bot::gate;
use crate::bot::handlers;
use crate::bot::state::{PanelSession, RelayDialogue, State};
use crate::config::Settings;
use crate::storage::Database;
use crate::utils::normalize_phone;

/// Fixed login expected before the password prompt.
const ADMIN_LOGIN: &str = "admin";

const BTN_ADD_RESPONDER: &str = "➕ Shifokor qo'shish";
const BTN_REMOVE_RESPONDER: &str = "➖ Shifokorni olib tashlash";
const BTN_LIST_RESPONDERS: &str = "📋 Shifokorlar ro'yxati";
const BTN_SEARCH_CHANNEL: &str = "🔍 Kanalda qidirish";
const BTN_CHANGE_PASSWORD: &str = "🔑 Parolni o'zgartirish";
const BTN_LOGOUT: &str = "🚪 Chiqish";

fn login_accepted(input: &str) -> bool {
    input.trim() == ADMIN_LOGIN
}

/// Numeric identity, bare or with the `ID:` marker.
fn parse_identity(text: &str) -> Option<i64> {
    let t = text.trim();
    let t = t.strip_prefix("ID:").unwrap_or(t).trim();
    t.parse().ok()
}

/// New password, bare or with the `parol:` marker; at least 3 characters.
fn parse_new_password(text: &str) -> Option<String> {
    let t = text.trim();
    let t = t.strip_prefix("parol:").unwrap_or(t).trim();
    (t.chars().count() >= 3).then(|| t.to_string())
}

fn status_label(status: ChatMemberStatus) -> &'static str {
    match status {
        ChatMemberStatus::Owner => "creator",
        ChatMemberStatus::Administrator => "administrator",
        ChatMemberStatus::Member => "member",
        ChatMemberStatus::Restricted => "restricted",
        ChatMemberStatus::Left => "left",
        ChatMemberStatus::Banned => "banned",
    }
}

fn compose_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    match (first, last) {
        (Some(f), Some(l)) => Some(format!("{f} {l}")),
        (Some(f), None) => Some(f.to_string()),
        _ => None,
    }
}

fn panel_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(BTN_ADD_RESPONDER),
            KeyboardButton::new(BTN_REMOVE_RESPONDER),
        ],
        vec![
            KeyboardButton::new(BTN_LIST_RESPONDERS),
            KeyboardButton::new(BTN_SEARCH_CHANNEL),
        ],
        vec![
            KeyboardButton::new(BTN_CHANGE_PASSWORD),
            KeyboardButton::new(BTN_LOGOUT),
        ],
    ])
    .resize_keyboard()
}

fn contact_request_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new("📱 Kontaktni yuborish").request(ButtonRequest::Contact),
    ]])
    .resize_keyboard()
    .one_time_keyboard()
}

async fn show_panel(bot: &Bot, chat_id: ChatId) -> Result<Message> {
    let sent = bot
        .send_message(
            chat_id,
            "🔐 <b>Admin panel</b>\n\nQuyidagi tugmalardan birini tanlang:",
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(panel_keyboard())
        .await?;
    Ok(sent)
}

/// `/admin`: already-authorized sessions jump straight to the panel,
/// everyone else starts the login exchange.
pub async fn admin_command(bot: Bot, msg: Message, dialogue: RelayDialogue) -> Result<()> {
    let state = dialogue
        .get()
        .await
        .map_err(|e| anyhow!(e.to_string()))?
        .unwrap_or_default();
    match state {
        State::Authorized(mut panel)
        | State::AwaitingAddResponder(mut panel)
        | State::AwaitingRemoveResponder(mut panel)
        | State::AwaitingPasswordChange(mut panel) => {
            let sent = show_panel(&bot, msg.chat.id).await?;
            panel.remember(sent.id);
            dialogue
                .update(State::Authorized(panel))
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
        }
        _ => {
            dialogue
                .update(State::AwaitingLogin)
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            bot.send_message(
                msg.chat.id,
                "🔐 <b>Admin panel</b>\n\nKirish uchun loginni kiriting:",
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(KeyboardRemove::new())
            .await?;
        }
    }
    Ok(())
}

pub async fn handle_login(bot: Bot, msg: Message, dialogue: RelayDialogue) -> Result<()> {
    match msg.text() {
        Some(text) if login_accepted(text) => {
            dialogue
                .update(State::AwaitingPassword)
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            bot.send_message(
                msg.chat.id,
                "✅ Login qabul qilindi.\n\nEndi parolni kiriting:",
            )
            .await?;
        }
        Some(_) => {
            bot.send_message(
                msg.chat.id,
                "❌ Noto'g'ri login! Qayta urinib ko'ring.\n\nLoginni kiriting:",
            )
            .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "❌ Iltimos, loginni matn shaklida kiriting.")
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_password(
    bot: Bot,
    msg: Message,
    dialogue: RelayDialogue,
    db: Arc<Database>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "❌ Iltimos, parolni matn shaklida kiriting.")
            .await?;
        return Ok(());
    };
    if text.trim() == db.admin_password().await? {
        let mut panel = PanelSession::default();
        let sent = show_panel(&bot, msg.chat.id).await?;
        panel.remember(sent.id);
        dialogue
            .update(State::Authorized(panel))
            .await
            .map_err(|e| anyhow!(e.to_string()))?;
        info!("admin session opened for chat {}", msg.chat.id);
    } else {
        bot.send_message(
            msg.chat.id,
            "❌ Noto'g'ri parol! Qayta urinib ko'ring.\n\nParolni kiriting:",
        )
        .await?;
    }
    Ok(())
}

/// Authorized panel: routes menu buttons; anything else falls through to
/// the regular request flow.
pub async fn handle_panel(
    bot: Bot,
    msg: Message,
    mut panel: PanelSession,
    dialogue: RelayDialogue,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let text = msg.text().map(str::to_string);

    match text.as_deref() {
        Some(BTN_ADD_RESPONDER) => {
            let sent = bot
                .send_message(
                    chat_id,
                    "➕ <b>Shifokor qo'shish</b>\n\n\
                     Quyidagi usullardan birini tanlang:\n\n\
                     1️⃣ <b>Kontakt orqali (tavsiya etiladi):</b>\n\
                     \u{20}  Quyidagi tugmani bosing va shifokor o'z kontaktini yuborsin.\n\n\
                     2️⃣ <b>Username orqali:</b>\n\
                     \u{20}  Username ni yuboring (masalan: @username)\n\n\
                     3️⃣ <b>User ID orqali:</b>\n\
                     \u{20}  User ID ni yuboring (masalan: <code>ID:123456789</code> yoki shunchaki raqam)\n\n\
                     ⚠️ <b>Eslatma:</b> Telegram Bot API telefon raqami orqali user ID ni aniqlash imkonini bermaydi.",
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(contact_request_keyboard())
                .await?;
            panel.remember(sent.id);
            dialogue
                .update(State::AwaitingAddResponder(panel))
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
        }
        Some(BTN_REMOVE_RESPONDER) => {
            let sent = bot
                .send_message(
                    chat_id,
                    "➖ <b>Shifokorni olib tashlash</b>\n\n\
                     Olib tashlash uchun shifokor ID sini yuboring:\n\n\
                     Format: <code>ID:123456789</code>\n\n\
                     Yoki shunchaki ID raqamini yuboring.",
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(KeyboardRemove::new())
                .await?;
            panel.remember(sent.id);
            dialogue
                .update(State::AwaitingRemoveResponder(panel))
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
        }
        Some(BTN_LIST_RESPONDERS) => {
            list_roster(&bot, chat_id, &db, &mut panel).await?;
            let sent = show_panel(&bot, chat_id).await?;
            panel.remember(sent.id);
            dialogue
                .update(State::Authorized(panel))
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
        }
        Some(BTN_SEARCH_CHANNEL) => {
            list_channel_admins(&bot, chat_id, &settings, &mut panel).await?;
            let sent = show_panel(&bot, chat_id).await?;
            panel.remember(sent.id);
            dialogue
                .update(State::Authorized(panel))
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
        }
        Some(BTN_CHANGE_PASSWORD) => {
            let sent = bot
                .send_message(
                    chat_id,
                    "🔑 <b>Parolni o'zgartirish</b>\n\n\
                     Yangi parolni yuboring:\n\n\
                     Format: <code>parol:yangi_parol</code>\n\n\
                     Yoki shunchaki yangi parolni yuboring.",
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(KeyboardRemove::new())
                .await?;
            panel.remember(sent.id);
            dialogue
                .update(State::AwaitingPasswordChange(panel))
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
        }
        Some(BTN_LOGOUT) => {
            logout(bot, msg, panel, dialogue, db, settings).await?;
        }
        _ => {
            // Not a menu action: treat it as an ordinary request.
            return handlers::handle_user_message(bot, msg, db, settings).await;
        }
    }
    Ok(())
}

async fn logout(
    bot: Bot,
    msg: Message,
    panel: PanelSession,
    dialogue: RelayDialogue,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let mut deleted = 0usize;
    for mid in &panel.messages {
        match bot.delete_message(chat_id, MessageId(*mid)).await {
            Ok(_) => deleted += 1,
            Err(e) => debug!("could not delete panel message {mid}: {e}"),
        }
    }
    info!("admin session closed for chat {chat_id}, {deleted} panel messages cleared");

    dialogue
        .update(State::Idle)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    bot.send_message(
        chat_id,
        "✅ Siz admin paneldan chiqdingiz.\n\n\
         💬 Yangi suhbatni boshlash uchun /start buyrug'ini yuboring.",
    )
    .reply_markup(KeyboardRemove::new())
    .await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    handlers::start(bot, msg, db, settings).await
}

/// Data entry after "add responder": a shared contact, a resolvable
/// handle, or a numeric id. Phone-like input gets guidance instead.
pub async fn handle_add_responder(
    bot: Bot,
    msg: Message,
    mut panel: PanelSession,
    dialogue: RelayDialogue,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let mut target_id: Option<i64> = None;
    let mut username: Option<String> = None;
    let mut full_name: Option<String> = None;
    let mut phone: Option<String> = None;

    if let Some(contact) = msg.contact() {
        if let Some(uid) = contact.user_id {
            target_id = Some(uid.0 as i64);
            full_name = Some(match &contact.last_name {
                Some(last) => format!("{} {last}", contact.first_name),
                None => contact.first_name.clone(),
            });
            phone = normalize_phone(&contact.phone_number);
        } else {
            // A contact without a platform identity cannot be added directly.
            match normalize_phone(&contact.phone_number) {
                Some(valid) => {
                    bot.send_message(
                        chat_id,
                        format!(
                            "📱 Telefon raqami qabul qilindi: <code>{valid}</code>\n\n\
                             ⚠️ Bu kontakt Telegram hisobiga bog'lanmagan. User ID ni \
                             yuboring yoki shifokor o'z kontaktini yuborsin."
                        ),
                    )
                    .parse_mode(ParseMode::Html)
                    .await?;
                }
                None => {
                    bot.send_message(
                        chat_id,
                        "❌ Noto'g'ri telefon raqami formati.\n\n\
                         Iltimos, kontaktni yuboring yoki telefon raqamini to'g'ri \
                         formatda kiriting:\nMasalan: <code>+998901234567</code>",
                    )
                    .parse_mode(ParseMode::Html)
                    .await?;
                }
            }
            return Ok(());
        }
    } else if let Some(text) = msg.text() {
        if let Some(valid) = normalize_phone(text) {
            bot.send_message(
                chat_id,
                format!(
                    "📱 Telefon raqami qabul qilindi: <code>{valid}</code>\n\n\
                     ⚠️ <b>Muhim:</b> Telegram Bot API telefon raqami orqali user ID ni \
                     aniqlash imkonini bermaydi.\n\n\
                     Shifokorni qo'shish uchun:\n\
                     1️⃣ <b>Kontakt orqali:</b> quyidagi tugmani bosing va shifokor o'z kontaktini yuborsin\n\
                     2️⃣ <b>Username orqali:</b> username ni kiriting (masalan: @username)\n\
                     3️⃣ <b>User ID orqali:</b> user ID ni kiriting (masalan: 123456789)"
                ),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(contact_request_keyboard())
            .await?;
            return Ok(());
        }

        if let Some(id) = parse_identity(text) {
            target_id = Some(id);
        } else {
            let handle = text.trim().trim_start_matches('@').to_string();
            if !handle.is_empty() {
                match resolve_handle(&bot, &settings, &handle).await {
                    HandleLookup::Found {
                        user_id,
                        username: found_username,
                        full_name: found_name,
                        membership,
                    } => {
                        let sent = bot
                            .send_message(
                                chat_id,
                                format!(
                                    "✅ Foydalanuvchi topildi!\n\n\
                                     👤 Username: <code>@{handle}</code>\n\
                                     📝 Ism: {}\n\
                                     🆔 ID: <code>{user_id}</code>\n\
                                     {membership}",
                                    found_name
                                        .as_deref()
                                        .map(|n| html_escape::encode_text(n).into_owned())
                                        .unwrap_or_else(|| "Noma'lum".to_string()),
                                ),
                            )
                            .parse_mode(ParseMode::Html)
                            .await?;
                        panel.remember(sent.id);
                        target_id = Some(user_id);
                        username = found_username;
                        full_name = found_name;
                    }
                    HandleLookup::NotAUser => {
                        bot.send_message(
                            chat_id,
                            format!(
                                "❌ <code>@{handle}</code> - bu kanal yoki guruh, foydalanuvchi emas.\n\n\
                                 Iltimos, shifokor username ni kiriting (masalan: @username)."
                            ),
                        )
                        .parse_mode(ParseMode::Html)
                        .await?;
                        return Ok(());
                    }
                    HandleLookup::NotFound => {
                        bot.send_message(
                            chat_id,
                            format!(
                                "❌ Foydalanuvchi <code>@{handle}</code> topilmadi.\n\n\
                                 Iltimos, quyidagilarni tekshiring:\n\
                                 • Username to'g'ri kiritilganligi\n\
                                 • Foydalanuvchi botga yozgan bo'lishi kerak\n\n\
                                 Yoki boshqa usulni tanlang."
                            ),
                        )
                        .parse_mode(ParseMode::Html)
                        .await?;
                        return Ok(());
                    }
                }
            }
        }
    }

    let Some(target_id) = target_id else {
        bot.send_message(
            chat_id,
            "❌ User ID topilmadi.\n\n\
             Iltimos, quyidagi usullardan birini tanlang:\n\n\
             1️⃣ <b>Kontakt orqali (tavsiya etiladi):</b>\n\
             \u{20}  Quyidagi tugmani bosing va shifokor o'z kontaktini yuborsin.\n\n\
             2️⃣ <b>User ID orqali:</b>\n\
             \u{20}  User ID ni kiriting (masalan: 123456789)",
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(contact_request_keyboard())
        .await?;
        return Ok(());
    };

    // Fill still-missing contact fields from the platform, best effort.
    if username.is_none() || full_name.is_none() {
        match bot.get_chat(Recipient::Id(ChatId(target_id))).await {
            Ok(chat) => {
                if username.is_none() {
                    username = chat.username().map(str::to_string);
                }
                if full_name.is_none() {
                    full_name = compose_name(chat.first_name(), chat.last_name());
                }
            }
            Err(e) => warn!("could not fetch profile for {target_id}: {e}"),
        }
    }

    if db
        .add_responder(target_id, username.clone(), full_name.clone())
        .await
    {
        let mut text = format!(
            "✅ Shifokor qo'shildi!\n\n\
             👤 ID: <code>{target_id}</code>\n\
             📝 Ism: {}\n\
             🔗 Username: @{}",
            full_name
                .as_deref()
                .map(|n| html_escape::encode_text(n).into_owned())
                .unwrap_or_else(|| "Noma'lum".to_string()),
            username.as_deref().unwrap_or("yo'q"),
        );
        if let Some(p) = phone {
            text.push_str(&format!("\n📱 Telefon: <code>{p}</code>"));
        }
        let sent = bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await?;
        panel.remember(sent.id);
    } else {
        let sent = bot
            .send_message(chat_id, "❌ Xatolik yuz berdi. Shifokor qo'shilmadi.")
            .await?;
        panel.remember(sent.id);
    }

    let sent = show_panel(&bot, chat_id).await?;
    panel.remember(sent.id);
    dialogue
        .update(State::Authorized(panel))
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

enum HandleLookup {
    Found {
        user_id: i64,
        username: Option<String>,
        full_name: Option<String>,
        membership: String,
    },
    NotAUser,
    NotFound,
}

// Best-effort handle resolution. Only works when the platform can see the
// account (it has talked to the bot or shares the channel).
async fn resolve_handle(bot: &Bot, settings: &Settings, handle: &str) -> HandleLookup {
    let chat = match bot
        .get_chat(Recipient::ChannelUsername(format!("@{handle}")))
        .await
    {
        Ok(chat) => chat,
        Err(e) => {
            warn!("handle lookup failed for @{handle}: {e}");
            return HandleLookup::NotFound;
        }
    };
    if !chat.is_private() {
        return HandleLookup::NotAUser;
    }

    let user_id = chat.id.0;
    let membership = match gate::channel_recipient(settings) {
        Some(channel) => match bot.get_chat_member(channel, UserId(user_id as u64)).await {
            Ok(member) => format!("📢 Kanalda: Ha (status: {})", status_label(member.status())),
            Err(_) => "⚠️ Kanalda: Topilmadi (lekin qo'shish mumkin)".to_string(),
        },
        None => "⚠️ Kanal sozlanmagan".to_string(),
    };

    HandleLookup::Found {
        user_id,
        username: chat.username().map(str::to_string),
        full_name: compose_name(chat.first_name(), chat.last_name()),
        membership,
    }
}

pub async fn handle_remove_responder(
    bot: Bot,
    msg: Message,
    mut panel: PanelSession,
    dialogue: RelayDialogue,
    db: Arc<Database>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let Some(target) = parse_identity(msg.text().unwrap_or("")) else {
        bot.send_message(chat_id, "❌ Noto'g'ri format. ID raqamini yuboring.")
            .await?;
        return Ok(());
    };

    let sent = if db.remove_responder(target).await {
        bot.send_message(
            chat_id,
            format!("✅ Shifokor olib tashlandi!\n\n👤 ID: <code>{target}</code>"),
        )
        .parse_mode(ParseMode::Html)
        .await?
    } else {
        bot.send_message(
            chat_id,
            format!(
                "❌ Shifokor topilmadi yoki allaqachon olib tashlangan.\n\n\
                 👤 ID: <code>{target}</code>"
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?
    };
    panel.remember(sent.id);

    let sent = show_panel(&bot, chat_id).await?;
    panel.remember(sent.id);
    dialogue
        .update(State::Authorized(panel))
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

pub async fn handle_password_change(
    bot: Bot,
    msg: Message,
    mut panel: PanelSession,
    dialogue: RelayDialogue,
    db: Arc<Database>,
) -> Result<()> {
    let chat_id = msg.chat.id;
    let Some(new_password) = parse_new_password(msg.text().unwrap_or("")) else {
        bot.send_message(
            chat_id,
            "❌ Parol kamida 3 belgidan iborat bo'lishi kerak.",
        )
        .await?;
        return Ok(());
    };

    let sent = if db.set_admin_password(new_password.clone()).await {
        bot.send_message(
            chat_id,
            format!(
                "✅ Parol muvaffaqiyatli o'zgartirildi!\n\n\
                 Yangi parol: <code>{}</code>",
                html_escape::encode_text(&new_password)
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?
    } else {
        bot.send_message(chat_id, "❌ Xatolik yuz berdi. Parol o'zgartirilmadi.")
            .await?
    };
    panel.remember(sent.id);

    let sent = show_panel(&bot, chat_id).await?;
    panel.remember(sent.id);
    dialogue
        .update(State::Authorized(panel))
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

async fn list_roster(
    bot: &Bot,
    chat_id: ChatId,
    db: &Database,
    panel: &mut PanelSession,
) -> Result<()> {
    let roster = db.responders().await?;
    if roster.is_empty() {
        let sent = bot
            .send_message(chat_id, "📭 Hozircha shifokorlar yo'q.")
            .reply_markup(KeyboardRemove::new())
            .await?;
        panel.remember(sent.id);
        return Ok(());
    }

    let mut text = format!("👨‍⚕️ <b>Barcha shifokorlar ({}):</b>\n\n", roster.len());
    for (i, responder) in roster.iter().enumerate() {
        let username = responder
            .username
            .as_deref()
            .map(|u| format!("@{u}"))
            .unwrap_or_else(|| "Username yo'q".to_string());
        let name = responder.full_name.as_deref().unwrap_or("Ism yo'q");
        text.push_str(&format!(
            "{}. <b>{}</b>\n   ID: <code>{}</code>\n   Username: {}\n\n",
            i + 1,
            html_escape::encode_text(name),
            responder.user_id,
            username,
        ));
    }

    let sent = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(KeyboardRemove::new())
        .await?;
    panel.remember(sent.id);
    Ok(())
}

async fn list_channel_admins(
    bot: &Bot,
    chat_id: ChatId,
    settings: &Settings,
    panel: &mut PanelSession,
) -> Result<()> {
    let Some(channel) = gate::channel_recipient(settings) else {
        let sent = bot
            .send_message(chat_id, "❌ Kanal ID o'rnatilmagan.")
            .reply_markup(KeyboardRemove::new())
            .await?;
        panel.remember(sent.id);
        return Ok(());
    };

    match bot.get_chat_administrators(channel).await {
        Ok(admins) if admins.is_empty() => {
            let sent = bot
                .send_message(chat_id, "📭 Kanalda administratorlar topilmadi.")
                .reply_markup(KeyboardRemove::new())
                .await?;
            panel.remember(sent.id);
        }
        Ok(admins) => {
            let mut text = format!("👥 <b>Kanal administratorlari ({}):</b>\n\n", admins.len());
            for (i, admin) in admins.iter().enumerate() {
                let username = admin
                    .user
                    .username
                    .as_deref()
                    .map(|u| format!("@{u}"))
                    .unwrap_or_else(|| "Username yo'q".to_string());
                text.push_str(&format!(
                    "{}. <b>{}</b>\n   ID: <code>{}</code>\n   Username: {}\n   Status: {}\n\n",
                    i + 1,
                    html_escape::encode_text(&admin.user.full_name()),
                    admin.user.id,
                    username,
                    status_label(admin.status()),
                ));
            }
            text.push_str(
                "💡 <b>Maslahat:</b> Shifokor kanalda administrator bo'lsa, \
                 uning ID sini ko'chirib qo'shishingiz mumkin.",
            );
            let sent = bot
                .send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(KeyboardRemove::new())
                .await?;
            panel.remember(sent.id);
        }
        Err(e) => {
            error!("failed to list channel administrators: {e}");
            let sent = bot
                .send_message(
                    chat_id,
                    "❌ Xatolik yuz berdi. Bot kanalda administrator ekanligini tekshiring.",
                )
                .reply_markup(KeyboardRemove::new())
                .await?;
            panel.remember(sent.id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_matches_only_the_fixed_literal() {
        assert!(login_accepted("admin"));
        assert!(login_accepted("  admin  "));
        assert!(!login_accepted("Admin"));
        assert!(!login_accepted("administrator"));
        assert!(!login_accepted(""));
    }

    #[test]
    fn identity_parses_bare_and_marked_forms() {
        assert_eq!(parse_identity("123456789"), Some(123456789));
        assert_eq!(parse_identity("ID:123456789"), Some(123456789));
        assert_eq!(parse_identity("ID: 123456789 "), Some(123456789));
        assert_eq!(parse_identity("abc"), None);
        assert_eq!(parse_identity("ID:abc"), None);
        assert_eq!(parse_identity(""), None);
    }

    #[test]
    fn new_password_requires_three_characters() {
        assert_eq!(parse_new_password("yangi").as_deref(), Some("yangi"));
        assert_eq!(
            parse_new_password("parol:sirli parol").as_deref(),
            Some("sirli parol")
        );
        assert_eq!(parse_new_password("ab"), None);
        assert_eq!(parse_new_password("parol:ab"), None);
        assert_eq!(parse_new_password("   "), None);
    }

    #[test]
    fn member_status_labels_cover_all_variants() {
        assert_eq!(status_label(ChatMemberStatus::Owner), "creator");
        assert_eq!(status_label(ChatMemberStatus::Member), "member");
    }

    #[test]
    fn name_composition_prefers_both_parts() {
        assert_eq!(
            compose_name(Some("Olim"), Some("Karimov")).as_deref(),
            Some("Olim Karimov")
        );
        assert_eq!(compose_name(Some("Olim"), None).as_deref(), Some("Olim"));
        assert_eq!(compose_name(None, Some("Karimov")), None);
    }
}
