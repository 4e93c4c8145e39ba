//! Telegram menu flow.
//!
//! `/start` → user sends a photo → inline keyboards walk product → color →
//! print → the completed selection goes to the orchestrator and the outcome
//! comes back as a photo, a "come back tomorrow" notice, or an error message.
//!
//! Selection progress is kept per user in memory; a restart button clears it.
//! Handler failures are logged and answered with a generic message — the
//! dispatcher must keep running whatever a single update does.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, Outcome};
use crate::providers::TryOnJob;

// Callback data prefixes. Values carry the raw catalog key.
const CB_PRODUCT: &str = "tshirt:";
const CB_COLOR: &str = "color:";
const CB_PRINT: &str = "print:";
const CB_RESTART: &str = "restart";

/// Buttons per keyboard row.
const KEYBOARD_ROW: usize = 2;

/// Where a user currently is in the selection flow.
#[derive(Debug, Default, Clone)]
struct PendingSelection {
    photo_path: Option<PathBuf>,
    product: Option<String>,
    color: Option<String>,
}

/// Shared state behind the dispatcher.
pub struct TelegramChannel {
    catalog: Catalog,
    orchestrator: Orchestrator,
    pending: DashMap<u64, PendingSelection>,
}

impl TelegramChannel {
    pub fn new(catalog: Catalog, orchestrator: Orchestrator) -> Self {
        Self {
            catalog,
            orchestrator,
            pending: DashMap::new(),
        }
    }

    /// Run the long-polling dispatcher until shutdown.
    pub async fn run(self: Arc<Self>, token: &str) {
        let bot = Bot::new(token);
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_callback_query().endpoint(on_callback));

        info!("Telegram channel starting (polling)");
        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![self])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    /// Forget menu progress but keep the uploaded photo.
    fn reset_flow(&self, user: u64) {
        if let Some(mut entry) = self.pending.get_mut(&user) {
            entry.product = None;
            entry.color = None;
        }
    }
}

/// Build an inline keyboard from catalog keys plus the restart button.
fn build_keyboard(items: &[&str], prefix: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = items
        .chunks(KEYBOARD_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|item| {
                    InlineKeyboardButton::callback(item.to_string(), format!("{prefix}{item}"))
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "↻ start over",
        CB_RESTART.to_string(),
    )]);
    InlineKeyboardMarkup::new(rows)
}

async fn on_message(bot: Bot, msg: Message, state: Arc<TelegramChannel>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref().map(|u| u.id.0) else {
        return Ok(());
    };

    if msg.text() == Some("/start") {
        state.reset_flow(user);
        bot.send_message(
            msg.chat.id,
            "Hi! Send me one photo of yourself and I'll walk you through \
             the try-on: T-shirt → color → print.",
        )
        .await?;
        return Ok(());
    }

    if msg.photo().is_some() {
        if let Err(e) = handle_photo(&bot, &msg, user, &state).await {
            error!(user = user, error = %e, "photo intake failed");
            bot.send_message(msg.chat.id, "Could not read that photo, please try again.")
                .await?;
        }
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Send a photo first 📸").await?;
    Ok(())
}

/// Download the largest photo variant and open the product menu.
async fn handle_photo(
    bot: &Bot,
    msg: &Message,
    user: u64,
    state: &TelegramChannel,
) -> Result<()> {
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };

    let file = bot.get_file(photo.file.id.clone()).await?;
    let path = std::env::temp_dir().join(format!("fitroom_user_{user}.jpg"));
    let mut dst = tokio::fs::File::create(&path).await?;
    bot.download_file(&file.path, &mut dst).await?;

    state.pending.insert(
        user,
        PendingSelection {
            photo_path: Some(path),
            ..Default::default()
        },
    );

    let keyboard = build_keyboard(&state.catalog.products(), CB_PRODUCT);
    bot.send_message(msg.chat.id, "Photo received ✅\nPick a T-shirt:")
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<TelegramChannel>,
) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let user = q.from.id.0;
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();
    let data = q.data.as_deref().unwrap_or_default().to_string();

    if data == CB_RESTART {
        state.reset_flow(user);
        let keyboard = build_keyboard(&state.catalog.products(), CB_PRODUCT);
        bot.edit_message_text(chat_id, message_id, "Ok, from the top. Pick a T-shirt:")
            .reply_markup(keyboard)
            .await?;
        return Ok(());
    }

    let has_photo = state
        .pending
        .get(&user)
        .map(|p| p.photo_path.is_some())
        .unwrap_or(false);
    if !has_photo {
        bot.edit_message_text(chat_id, message_id, "Send a photo first 📸")
            .await?;
        return Ok(());
    }

    if let Some(product) = data.strip_prefix(CB_PRODUCT) {
        if !state.catalog.has_product(product) {
            bot.edit_message_text(chat_id, message_id, "Unknown T-shirt, try again.")
                .await?;
            return Ok(());
        }
        if let Some(mut entry) = state.pending.get_mut(&user) {
            entry.product = Some(product.to_string());
            entry.color = None;
        }
        let keyboard = build_keyboard(&state.catalog.colors(product), CB_COLOR);
        bot.edit_message_text(
            chat_id,
            message_id,
            format!("T-shirt: {product}\nPick a color:"),
        )
        .reply_markup(keyboard)
        .await?;
        return Ok(());
    }

    if let Some(color) = data.strip_prefix(CB_COLOR) {
        // Clone the product out before awaiting anything; a map guard must
        // not live across an await point.
        let selected = state.pending.get(&user).and_then(|p| p.product.clone());
        let Some(product) = selected else {
            bot.edit_message_text(chat_id, message_id, "Pick a T-shirt first.")
                .await?;
            return Ok(());
        };
        if !state.catalog.colors(&product).contains(&color) {
            bot.edit_message_text(chat_id, message_id, "Unknown color, try again.")
                .await?;
            return Ok(());
        }
        if let Some(mut entry) = state.pending.get_mut(&user) {
            entry.color = Some(color.to_string());
        }
        let keyboard = build_keyboard(&state.catalog.prints(&product, color), CB_PRINT);
        bot.edit_message_text(
            chat_id,
            message_id,
            format!("T-shirt: {product}\nColor: {color}\nPick a print:"),
        )
        .reply_markup(keyboard)
        .await?;
        return Ok(());
    }

    if let Some(print) = data.strip_prefix(CB_PRINT) {
        let (photo_path, product, color) = {
            let Some(entry) = state.pending.get(&user) else {
                return Ok(());
            };
            match (
                entry.photo_path.clone(),
                entry.product.clone(),
                entry.color.clone(),
            ) {
                (Some(photo), Some(product), Some(color)) => (photo, product, color),
                _ => {
                    drop(entry);
                    bot.edit_message_text(chat_id, message_id, "Pick a T-shirt and color first.")
                        .await?;
                    return Ok(());
                }
            }
        };
        if !state.catalog.prints(&product, &color).contains(&print) {
            bot.edit_message_text(chat_id, message_id, "Unknown print, try again.")
                .await?;
            return Ok(());
        }

        bot.edit_message_text(
            chat_id,
            message_id,
            format!("Ok ✅\nT-shirt: {product}\nColor: {color}\nPrint: {print}\n\nGenerating…"),
        )
        .await?;

        let job = TryOnJob {
            user,
            photo_path,
            product,
            color,
            print: print.to_string(),
        };
        let summary = job.summary();

        match state.orchestrator.request_generation(job).await {
            Outcome::Delivered(image) => {
                bot.send_photo(chat_id, InputFile::memory(image.bytes))
                    .caption(format!("Done ✅\n{summary}"))
                    .await?;
            }
            Outcome::Denied {
                used,
                remaining: _,
                limit,
            } => {
                bot.send_message(
                    chat_id,
                    format!(
                        "Daily limit reached: {used} of {limit} generations used today. \
                         Come back tomorrow!"
                    ),
                )
                .await?;
            }
            Outcome::Failed(reason) => {
                warn!(user = user, reason = %reason, "generation request failed");
                bot.send_message(chat_id, format!("Generation error: {reason}"))
                    .await?;
            }
        }
        return Ok(());
    }

    bot.edit_message_text(
        chat_id,
        message_id,
        "Unknown button. Hit /start and try again.",
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_layout() {
        let kb = build_keyboard(&["a", "b", "c"], CB_PRODUCT);
        // Two item rows of up to KEYBOARD_ROW buttons, plus the restart row.
        assert_eq!(kb.inline_keyboard.len(), 3);
        assert_eq!(kb.inline_keyboard[0].len(), 2);
        assert_eq!(kb.inline_keyboard[1].len(), 1);
        assert_eq!(kb.inline_keyboard[2].len(), 1);
        assert_eq!(kb.inline_keyboard[0][0].text, "a");
    }

    #[test]
    fn test_keyboard_callback_data_carries_prefix() {
        let kb = build_keyboard(&["pocket_t_shirt"], CB_PRODUCT);
        match &kb.inline_keyboard[0][0].kind {
            teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                assert_eq!(data, "tshirt:pocket_t_shirt");
            }
            other => panic!("unexpected button kind: {:?}", other),
        }
    }

    #[test]
    fn test_callback_prefixes_are_distinct() {
        // Menu routing strips prefixes in order; none may shadow another.
        let prefixes = [CB_PRODUCT, CB_COLOR, CB_PRINT];
        for (i, a) in prefixes.iter().enumerate() {
            for (j, b) in prefixes.iter().enumerate() {
                if i != j {
                    assert!(!a.starts_with(b));
                }
            }
        }
    }
}
