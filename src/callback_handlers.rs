use super::*;

pub(super) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    let action = q.data.as_deref().and_then(MenuAction::parse);
    let (Some(message), Some(action)) = (q.message.clone(), action) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let action_result = handle_menu_action(&bot, &message, &state, action).await;

    let answer_result = bot.answer_callback_query(q.id).await;
    match action_result {
        Ok(()) => {
            answer_result?;
            Ok(())
        }
        Err(err) => {
            if let Err(answer_err) = answer_result {
                error!(
                    "answer callback query failed after menu callback error: {:#}",
                    answer_err
                );
            }
            Err(err)
        }
    }
}

async fn handle_menu_action(
    bot: &Bot,
    message: &Message,
    state: &std::sync::Arc<AppState>,
    action: MenuAction,
) -> Result<()> {
    let chat_id = message.chat.id.0;
    apply_menu_mode(state.store.as_ref(), chat_id, action).await;
    match action {
        MenuAction::SocialDownloader => {
            edit_menu(bot, message, SOCIAL_MENU_TEXT, Some(social_menu_keyboard())).await
        }
        MenuAction::TeraboxPlayer => edit_menu(bot, message, TERABOX_PROMPT_TEXT, None).await,
        MenuAction::SocialPlatform(platform) => {
            edit_menu(bot, message, &platform_prompt_text(platform), None).await
        }
        MenuAction::BackToMain => {
            edit_menu(bot, message, WELCOME_TEXT, Some(main_menu_keyboard())).await
        }
        MenuAction::SendMedia(kind) => {
            let sink = TelegramSink::new(bot.clone(), message.chat.id);
            send_remembered_media(&state.results, chat_id, kind, &sink).await;
            Ok(())
        }
    }
}

async fn edit_menu(
    bot: &Bot,
    message: &Message,
    text: &str,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    let mut request = bot
        .edit_message_text(message.chat.id, message.id, text)
        .parse_mode(ParseMode::Markdown);
    if let Some(keyboard) = keyboard {
        request = request.reply_markup(keyboard);
    }
    match request.await {
        Ok(_) => Ok(()),
        Err(err) if is_message_not_modified_error(&err) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn is_message_not_modified_error(err: &teloxide::RequestError) -> bool {
    err.to_string()
        .to_ascii_lowercase()
        .contains("message is not modified")
}
