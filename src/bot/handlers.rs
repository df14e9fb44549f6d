use std::sync::Arc;

use anyhow::Result;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardMarkup, InputFile, MaybeInaccessibleMessage, ParseMode},
    utils::command::BotCommands,
};
use tracing::{error, info, warn};

use crate::bot::gate::{self, SubscriptionStatus};
use crate::config::Settings;
use crate::relay;
use crate::storage::{Database, RequestStatus, Role};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Mavjud buyruqlar:")]
pub enum Command {
    #[command(description = "Botni ishga tushirish")]
    Start,
    #[command(description = "Mening savollarim")]
    MyQuestions,
    #[command(description = "Yordam")]
    Help,
    #[command(description = "Admin panel", hide)]
    Admin,
    #[command(description = "Eskirgan buyruq", hide)]
    SetDoctor,
}

fn requester_welcome() -> &'static str {
    "👋🏻 <b>Xush kelibsiz!</b>\n\n\
     Savollaringizni navbatchi shifokorlarga yetkazib beraman.\n\n\
     📝 <b>Muammo va savollaringizni</b> matn, video, rasm yoki hujjat \
     shaklida yuborib batafsil yozing 👇🏻\n\n\
     ⏱ Javob biroz kechikishi mumkin, lekin barcha xabarlarga albatta javob beriladi 😊\n\n\
     📋 <b>Mavjud buyruqlar:</b>\n\
     /myquestions - Mening savollarim\n\
     /help - Yordam"
}

fn responder_welcome() -> &'static str {
    "👨‍⚕️ <b>Assalomu alaykum, shifokor!</b>\n\n\
     Siz bemorlardan keladigan savollarni olasiz va ularga javob berishingiz mumkin.\n\n\
     📋 <b>Qanday ishlaydi:</b>\n\
     1. Bemor savol yuboradi\n\
     2. Sizga savol bilan xabar keladi\n\
     3. Xabarga javob (Reply) bering\n\
     4. Javob bemorga avtomatik yuboriladi\n\n\
     💡 <b>Maslahat:</b> Savol bilan kelgan xabarga javob bering - javob bemorga yuboriladi."
}

fn blocked_text(status: &SubscriptionStatus) -> String {
    format!(
        "⚠️ <b>Botdan foydalanish uchun quyidagi platformalarga obuna bo'lishingiz kerak:</b>\n\n\
         {}\n\n\
         Yuqoridagi tugmalarni bosib obuna bo'ling va tasdiqlang!",
        gate::missing_list(status)
    )
}

async fn send_gate_prompt(
    bot: &Bot,
    chat_id: ChatId,
    status: &SubscriptionStatus,
    settings: &Settings,
) -> Result<()> {
    bot.send_message(chat_id, blocked_text(status))
        .parse_mode(ParseMode::Html)
        .reply_markup(gate::subscribe_keyboard(status, settings))
        .await?;
    Ok(())
}

pub async fn start(
    bot: Bot,
    msg: Message,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    db.ensure_user(user_id, user.username.clone(), Some(user.full_name()))
        .await;

    let status = gate::evaluate(&bot, &settings, &db, user.id).await;
    if !status.all_satisfied() {
        let text = format!(
            "👋🏻 <b>Xush kelibsiz!</b>\n\n\
             Savollaringizni navbatchi shifokorlarga yetkazib beraman.\n\n\
             ⚠️ <b>Undan oldin quyidagi platformalarga a'zo bo'lishingiz SHART:</b>\n\n\
             {}\n\n\
             Yuqoridagi tugmalarni bosib obuna bo'ling va tasdiqlang!",
            gate::platform_checklist(&status, &settings)
        );
        bot.send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(gate::subscribe_keyboard(&status, &settings))
            .await?;
        return Ok(());
    }

    let role = db
        .get_user(user_id)
        .await?
        .map(|u| u.role)
        .unwrap_or(Role::Regular);
    let greeting = match role {
        Role::Responder => responder_welcome(),
        Role::Regular => requester_welcome(),
    };
    bot.send_message(msg.chat.id, greeting)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn help(
    bot: Bot,
    msg: Message,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let status = gate::evaluate(&bot, &settings, &db, user.id).await;
    if !status.all_satisfied() {
        return send_gate_prompt(&bot, msg.chat.id, &status, &settings).await;
    }

    let help_text = "📖 <b>Botdan foydalanish bo'yicha yordam</b>\n\n\
         👋 <b>Savol qanday beriladi:</b>\n\
         Savolingizni botga matn, rasm, video yoki hujjat shaklida yuboring.\n\n\
         📋 <b>Mavjud buyruqlar:</b>\n\
         /start - Bot bilan ishlashni boshlash\n\
         /myquestions - Sizning savollaringizni ko'rish\n\
         /help - Bu yordam\n\n\
         ⏱ <b>Qanday ishlaydi:</b>\n\
         1. Siz savol yuborasiz\n\
         2. Savol shifokorlarga yuboriladi\n\
         3. Shifokor sizning savolingizga javob beradi\n\
         4. Siz javobni botda olasiz";
    bot.send_message(msg.chat.id, help_text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// `/myquestions`: the caller's ten most recent requests, newest first.
pub async fn my_questions(
    bot: Bot,
    msg: Message,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let status = gate::evaluate(&bot, &settings, &db, user.id).await;
    if !status.all_satisfied() {
        return send_gate_prompt(&bot, msg.chat.id, &status, &settings).await;
    }

    let listed = db.user_requests(user.id.0 as i64, 10).await?;
    if listed.is_empty() {
        bot.send_message(
            msg.chat.id,
            "📭 Sizda hozircha savollar yo'q.\n\n\
             Savolingizni botga yuboring, shifokor sizga javob beradi.",
        )
        .await?;
        return Ok(());
    }

    let mut text = String::from("📋 <b>Sizning savollaringiz:</b>\n\n");
    for req in &listed {
        let (glyph, label) = match req.status {
            RequestStatus::Answered => ("✅", "Javob berildi"),
            RequestStatus::Pending => ("⏳", "Javob kutilmoqda"),
        };
        text.push_str(&format!(
            "{glyph} <b>Savol #{}</b> ({label})\n   {}\n\n",
            req.request_id,
            html_escape::encode_text(&relay::preview(&req.body, 50)),
        ));
    }
    if listed.len() == 10 {
        text.push_str("\n(Oxirgi 10 ta savol ko'rsatilmoqda)");
    }
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn set_doctor_deprecated(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(
        msg.chat.id,
        "⚠️ Bu buyruq eskirgan. Iltimos, /admin buyrug'idan foydalaning.",
    )
    .await?;
    Ok(())
}

/// Plain message intake: persist the request and fan it out to the
/// responder pool.
pub async fn handle_user_message(
    bot: Bot,
    msg: Message,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    db.ensure_user(user_id, user.username.clone(), Some(user.full_name()))
        .await;

    let status = gate::evaluate(&bot, &settings, &db, user.id).await;
    if !status.all_satisfied() {
        return send_gate_prompt(&bot, msg.chat.id, &status, &settings).await;
    }

    let text = msg.text().or(msg.caption());
    let has_media = msg.photo().is_some() || msg.video().is_some() || msg.document().is_some();
    if text.is_none() && !has_media {
        bot.send_message(
            msg.chat.id,
            "❓ Iltimos, savolingizni matn, rasm, video yoki hujjat shaklida yuboring.",
        )
        .await?;
        return Ok(());
    }
    let body = text.unwrap_or("Media-xabar").to_string();

    let request_id = db.add_request(user_id, msg.id.0, body.clone()).await?;

    let responders = db.responders().await?;
    if responders.is_empty() {
        bot.send_message(
            msg.chat.id,
            format!(
                "⏳ <b>Shifokorlar hozircha mavjud emas</b>\n\n\
                 📝 Savolingiz saqlandi (ID: <code>{request_id}</code>)\n\
                 Shifokor mavjud bo'lgach, sizga javob beradi.\n\n\
                 💡 Savollaringiz holatini kuzatish uchun /myquestions buyrug'idan foydalaning."
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let envelope = relay::render_request_envelope(&user.full_name(), user_id, &body, request_id);

    // Best effort per responder: one failed delivery must not starve the rest.
    let mut delivered = 0usize;
    for responder in &responders {
        match copy_content(&bot, ChatId(responder.user_id), &msg, &envelope).await {
            Ok(()) => delivered += 1,
            Err(e) => error!(
                "failed to forward request {request_id} to responder {}: {e}",
                responder.user_id
            ),
        }
    }
    info!(
        "request {request_id} relayed to {delivered}/{} responders",
        responders.len()
    );

    bot.send_message(
        msg.chat.id,
        format!(
            "✅ <b>Savolingiz shifokorlarga yuborildi!</b>\n\n\
             📝 Savol ID: <code>{request_id}</code>\n\
             ⏱ Shifokor sizga tez orada javob beradi.\n\n\
             💡 Savollaringiz holatini ko'rish uchun /myquestions buyrug'idan foydalaning."
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

/// A responder replying to a forwarded envelope. Anything else that
/// arrives as a reply is deliberately swallowed.
pub async fn handle_responder_reply(bot: Bot, msg: Message, db: Arc<Database>) -> Result<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let responder_id = user.id.0 as i64;
    match db.get_user(responder_id).await? {
        Some(profile) if profile.role == Role::Responder => {}
        _ => return Ok(()),
    }
    let Some(replied) = msg.reply_to_message() else {
        return Ok(());
    };

    let quoted = replied.text().or(replied.caption()).unwrap_or_default();
    let Some(request_id) = relay::extract_request_id(quoted) else {
        bot.send_message(
            msg.chat.id,
            "Savolni aniqlab bo'lmadi. Savol bilan kelgan xabarga javob bering.",
        )
        .await?;
        return Ok(());
    };
    let Some(request) = db.get_request(request_id).await? else {
        bot.send_message(msg.chat.id, "Savol topilmadi.").await?;
        return Ok(());
    };

    let body = msg
        .text()
        .or(msg.caption())
        .unwrap_or("Media-xabar")
        .to_string();
    db.add_response(request_id, responder_id, msg.id.0, body.clone())
        .await?;

    let answer = relay::render_answer(&user.full_name(), &request.body, &body);
    match copy_content(&bot, ChatId(request.user_id), &msg, &answer).await {
        Ok(()) => {
            bot.send_message(msg.chat.id, "✅ Javob bemorga yuborildi.")
                .await?;
        }
        Err(e) => {
            error!("failed to deliver answer for request {request_id}: {e}");
            bot.send_message(
                msg.chat.id,
                "❌ Javob yuborishda xatolik yuz berdi. Keyinroq urinib ko'ring.",
            )
            .await?;
        }
    }
    Ok(())
}

// Forwards the original content kind (photo/video/document/text) with the
// rendered HTML attached as caption or body.
async fn copy_content(
    bot: &Bot,
    chat_id: ChatId,
    source: &Message,
    html: &str,
) -> Result<(), teloxide::RequestError> {
    if let Some(photo) = source.photo().and_then(|p| p.last()) {
        bot.send_photo(chat_id, InputFile::file_id(photo.file.id.clone()))
            .caption(html.to_string())
            .parse_mode(ParseMode::Html)
            .await?;
    } else if let Some(video) = source.video() {
        bot.send_video(chat_id, InputFile::file_id(video.file.id.clone()))
            .caption(html.to_string())
            .parse_mode(ParseMode::Html)
            .await?;
    } else if let Some(document) = source.document() {
        bot.send_document(chat_id, InputFile::file_id(document.file.id.clone()))
            .caption(html.to_string())
            .parse_mode(ParseMode::Html)
            .await?;
    } else {
        bot.send_message(chat_id, html.to_string())
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

/// Gate keyboard callbacks: invite link, membership re-check and the
/// self-reported platform confirmations.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    db: Arc<Database>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let user_id = q.from.id;
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(user_id.0 as i64));

    match data {
        gate::CB_INVITE_LINK => match gate::invite_link(&bot, &settings, user_id).await {
            Some(link) => {
                bot.answer_callback_query(q.id.clone())
                    .text("Havola yuborildi! ✅")
                    .await?;
                bot.send_message(
                    chat_id,
                    format!(
                        "🔗 <b>Sizning maxsus havolangiz:</b>\n\n\
                         {link}\n\n\
                         📢 Ushbu havola orqali kanalga obuna bo'ling.\n\
                         Obuna bo'lgach, <b>\"✅ Telegram kanalga obuna bo'ldim\"</b> tugmasini bosing."
                    ),
                )
                .parse_mode(ParseMode::Html)
                .await?;
            }
            None => {
                bot.answer_callback_query(q.id.clone())
                    .text("Havola yaratishda xatolik yuz berdi")
                    .show_alert(true)
                    .await?;
            }
        },
        gate::CB_CHECK_TELEGRAM => {
            if gate::is_channel_member(&bot, &settings, user_id).await {
                bot.answer_callback_query(q.id.clone())
                    .text("Telegram kanalga obuna tasdiqlandi! ✅")
                    .await?;
                update_subscription_status(&bot, &db, &settings, user_id, q.message.clone())
                    .await?;
            } else {
                bot.answer_callback_query(q.id.clone())
                    .text("❌ Siz hali kanalga obuna bo'lmadingiz")
                    .show_alert(true)
                    .await?;
                let status = gate::evaluate(&bot, &settings, &db, user_id).await;
                let text = match gate::invite_link(&bot, &settings, user_id).await {
                    Some(link) => format!(
                        "❌ <b>Obuna tekshiruvi</b>\n\n\
                         Siz hali kanalga obuna bo'lmadingiz.\n\n\
                         🔗 <b>Yangi maxsus havola:</b>\n\n\
                         {link}\n\n\
                         📢 Iltimos, ushbu havola orqali kanalga obuna bo'ling."
                    ),
                    None => "❌ <b>Obuna tekshiruvi</b>\n\n\
                             Siz hali kanalga obuna bo'lmadingiz.\n\n\
                             Iltimos, kanalga obuna bo'ling va qayta urinib ko'ring."
                        .to_string(),
                };
                send_or_edit(
                    &bot,
                    chat_id,
                    q.message.clone(),
                    text,
                    Some(gate::subscribe_keyboard(&status, &settings)),
                )
                .await?;
            }
        }
        gate::CB_CONFIRM_INSTAGRAM => {
            db.set_social_subscription(user_id.0 as i64, gate::PLATFORM_INSTAGRAM, true)
                .await;
            bot.answer_callback_query(q.id.clone())
                .text("Instagramga obuna tasdiqlandi! ✅")
                .await?;
            update_subscription_status(&bot, &db, &settings, user_id, q.message.clone()).await?;
        }
        gate::CB_CONFIRM_YOUTUBE => {
            db.set_social_subscription(user_id.0 as i64, gate::PLATFORM_YOUTUBE, true)
                .await;
            bot.answer_callback_query(q.id.clone())
                .text("YouTubega obuna tasdiqlandi! ✅")
                .await?;
            update_subscription_status(&bot, &db, &settings, user_id, q.message.clone()).await?;
        }
        _ => {
            bot.answer_callback_query(q.id.clone()).await?;
        }
    }
    Ok(())
}

async fn update_subscription_status(
    bot: &Bot,
    db: &Database,
    settings: &Settings,
    user_id: UserId,
    message: Option<MaybeInaccessibleMessage>,
) -> Result<()> {
    let status = gate::evaluate(bot, settings, db, user_id).await;
    let chat_id = message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(user_id.0 as i64));

    if status.all_satisfied() {
        let text = format!(
            "✅ <b>Barcha platformalarga obuna bo'ldingiz!</b>\n\n{}",
            requester_welcome()
        );
        send_or_edit(bot, chat_id, message, text, None).await
    } else {
        send_or_edit(
            bot,
            chat_id,
            message,
            blocked_text(&status),
            Some(gate::subscribe_keyboard(&status, settings)),
        )
        .await
    }
}

// Edits the originating gate message in place when it is still reachable,
// otherwise sends a fresh one.
async fn send_or_edit(
    bot: &Bot,
    chat_id: ChatId,
    message: Option<MaybeInaccessibleMessage>,
    text: String,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    if let Some(original) = message.as_ref().and_then(|m| m.regular_message()) {
        let mut req = bot
            .edit_message_text(chat_id, original.id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(kb) = markup.clone() {
            req = req.reply_markup(kb);
        }
        if req.await.is_ok() {
            return Ok(());
        }
        warn!("could not edit gate message in chat {chat_id}, sending a new one");
    }

    let mut req = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if let Some(kb) = markup {
        req = req.reply_markup(kb);
    }
    req.await?;
    Ok(())
}
