//! Subscription gate: one decision aggregated from the live channel
//! membership check and the self-reported social platform flags.

use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, InlineKeyboardButton, InlineKeyboardMarkup, Recipient};
use tracing::{error, warn};
use url::Url;

use crate::config::Settings;
use crate::storage::Database;

pub const PLATFORM_INSTAGRAM: &str = "instagram";
pub const PLATFORM_YOUTUBE: &str = "youtube";

// Callback payloads for the gate keyboard.
pub const CB_INVITE_LINK: &str = "get_invite_link";
pub const CB_CHECK_TELEGRAM: &str = "check_telegram_sub";
pub const CB_CONFIRM_INSTAGRAM: &str = "confirm_instagram";
pub const CB_CONFIRM_YOUTUBE: &str = "confirm_youtube";

/// Per-platform gate result. Platforms that are not configured are
/// vacuously satisfied and never appear in prompts.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionStatus {
    pub telegram: bool,
    pub instagram: bool,
    pub youtube: bool,
}

impl SubscriptionStatus {
    pub fn all_satisfied(&self) -> bool {
        self.telegram && self.instagram && self.youtube
    }
}

/// Configured channel as an API recipient: numeric ids verbatim,
/// usernames with the `@` prefix normalised on.
pub fn channel_recipient(settings: &Settings) -> Option<Recipient> {
    let raw = settings.channel_id.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(id) = raw.parse::<i64>() {
        Some(Recipient::Id(ChatId(id)))
    } else {
        Some(Recipient::ChannelUsername(format!(
            "@{}",
            raw.trim_start_matches('@')
        )))
    }
}

/// Live channel membership check. Vacuously true without a configured
/// channel; fail-closed when the API call errors.
pub async fn is_channel_member(bot: &Bot, settings: &Settings, user_id: UserId) -> bool {
    let Some(channel) = channel_recipient(settings) else {
        return true;
    };
    match bot.get_chat_member(channel, user_id).await {
        Ok(member) => matches!(
            member.status(),
            ChatMemberStatus::Member | ChatMemberStatus::Administrator | ChatMemberStatus::Owner
        ),
        Err(e) => {
            error!("channel membership check failed for {user_id}: {e}");
            false
        }
    }
}

/// Evaluates every configured platform for one user. Pure read; callers
/// decide what to show based on the result.
pub async fn evaluate(
    bot: &Bot,
    settings: &Settings,
    db: &Database,
    user_id: UserId,
) -> SubscriptionStatus {
    let telegram = is_channel_member(bot, settings, user_id).await;
    let instagram = if settings.instagram_url.is_some() {
        stored_flag(db, user_id, PLATFORM_INSTAGRAM).await
    } else {
        true
    };
    let youtube = if settings.youtube_url.is_some() {
        stored_flag(db, user_id, PLATFORM_YOUTUBE).await
    } else {
        true
    };
    SubscriptionStatus {
        telegram,
        instagram,
        youtube,
    }
}

async fn stored_flag(db: &Database, user_id: UserId, platform: &str) -> bool {
    match db.social_subscription(user_id.0 as i64, platform).await {
        Ok(subscribed) => subscribed,
        Err(e) => {
            error!("failed to read {platform} flag for {user_id}: {e}");
            false
        }
    }
}

/// Creates a personal single-use invite link for the configured channel,
/// falling back to the best public link available when the API refuses.
pub async fn invite_link(bot: &Bot, settings: &Settings, user_id: UserId) -> Option<String> {
    let raw = settings.channel_id.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    let username = raw.trim_start_matches('@');

    let chat_id = if let Ok(id) = raw.parse::<i64>() {
        ChatId(id)
    } else {
        match bot
            .get_chat(Recipient::ChannelUsername(format!("@{username}")))
            .await
        {
            Ok(chat) => chat.id,
            Err(e) => {
                warn!("could not resolve channel @{username}: {e}");
                return Some(format!("https://t.me/{username}"));
            }
        }
    };

    match bot
        .create_chat_invite_link(Recipient::Id(chat_id))
        .name(format!("user-{user_id}"))
        .member_limit(1)
        .await
    {
        Ok(link) => Some(link.invite_link),
        Err(e) => {
            error!("failed to create invite link for {user_id}: {e}");
            if username.starts_with("http") {
                Some(username.to_string())
            } else {
                Some(format!("https://t.me/{username}"))
            }
        }
    }
}

/// Inline keyboard offering subscribe/confirm actions for every platform
/// still missing.
pub fn subscribe_keyboard(
    status: &SubscriptionStatus,
    settings: &Settings,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    if !status.telegram {
        rows.push(vec![InlineKeyboardButton::callback(
            "📢 Telegram kanalga obuna bo'lish",
            CB_INVITE_LINK,
        )]);
        rows.push(vec![InlineKeyboardButton::callback(
            "✅ Telegram kanalga obuna bo'ldim",
            CB_CHECK_TELEGRAM,
        )]);
    }
    if !status.instagram {
        if let Some(url) = settings.instagram_url.as_deref().and_then(parse_url) {
            rows.push(vec![InlineKeyboardButton::url("📷 Instagram", url)]);
        }
        rows.push(vec![InlineKeyboardButton::callback(
            "✅ Instagramga obuna bo'ldim",
            CB_CONFIRM_INSTAGRAM,
        )]);
    }
    if !status.youtube {
        if let Some(url) = settings.youtube_url.as_deref().and_then(parse_url) {
            rows.push(vec![InlineKeyboardButton::url("📺 YouTube", url)]);
        }
        rows.push(vec![InlineKeyboardButton::callback(
            "✅ YouTubega obuna bo'ldim",
            CB_CONFIRM_YOUTUBE,
        )]);
    }

    InlineKeyboardMarkup::new(rows)
}

fn parse_url(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("ignoring malformed platform url {raw:?}: {e}");
            None
        }
    }
}

/// Bulleted list of the platforms still missing.
pub fn missing_list(status: &SubscriptionStatus) -> String {
    let mut lines = Vec::new();
    if !status.telegram {
        lines.push("• 📢 Telegram kanal");
    }
    if !status.instagram {
        lines.push("• 📷 Instagram");
    }
    if !status.youtube {
        lines.push("• 📺 YouTube");
    }
    lines.join("\n")
}

/// Checklist of every configured platform with its current mark, shown
/// in the first greeting.
pub fn platform_checklist(status: &SubscriptionStatus, settings: &Settings) -> String {
    let mark = |ok: bool| if ok { "✅" } else { "❌" };
    let mut lines = Vec::new();
    if channel_recipient(settings).is_some() {
        lines.push(format!("• {} 📢 Telegram kanal", mark(status.telegram)));
    }
    if settings.instagram_url.is_some() {
        lines.push(format!("• {} 📷 Instagram", mark(status.instagram)));
    }
    if settings.youtube_url.is_some() {
        lines.push(format!("• {} 📺 YouTube", mark(status.youtube)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(channel: Option<&str>) -> Settings {
        Settings {
            telegram_token: "token".into(),
            channel_id: channel.map(str::to_string),
            instagram_url: Some("https://instagram.com/example".into()),
            youtube_url: Some("https://youtube.com/@example".into()),
            database_file: "unused.db".into(),
        }
    }

    #[test]
    fn recipient_parses_numeric_and_username_channels() {
        let by_id = channel_recipient(&settings(Some("-1001234567890")));
        assert!(matches!(by_id, Some(Recipient::Id(ChatId(-1001234567890)))));

        let by_name = channel_recipient(&settings(Some("mychannel")));
        assert!(
            matches!(by_name, Some(Recipient::ChannelUsername(ref u)) if u.as_str() == "@mychannel")
        );
        let prefixed = channel_recipient(&settings(Some("@mychannel")));
        assert!(
            matches!(prefixed, Some(Recipient::ChannelUsername(ref u)) if u.as_str() == "@mychannel")
        );
    }

    #[test]
    fn recipient_absent_without_configuration() {
        assert!(channel_recipient(&settings(None)).is_none());
        assert!(channel_recipient(&settings(Some(""))).is_none());
    }

    #[test]
    fn all_satisfied_is_logical_and() {
        let status = SubscriptionStatus {
            telegram: true,
            instagram: true,
            youtube: false,
        };
        assert!(!status.all_satisfied());
        let status = SubscriptionStatus {
            telegram: true,
            instagram: true,
            youtube: true,
        };
        assert!(status.all_satisfied());
    }

    #[test]
    fn missing_list_names_only_unsatisfied_platforms() {
        let status = SubscriptionStatus {
            telegram: false,
            instagram: true,
            youtube: false,
        };
        let list = missing_list(&status);
        assert!(list.contains("Telegram"));
        assert!(!list.contains("Instagram"));
        assert!(list.contains("YouTube"));
    }
}
