use super::*;

pub(super) async fn handle_message(
    bot: Bot,
    msg: Message,
    state: std::sync::Arc<AppState>,
) -> Result<()> {
    let text = match msg.text() {
        Some(text) => text.to_string(),
        None => return Ok(()),
    };

    if parse_command(&text) == Some("start") {
        handle_start_command(&bot, msg.chat.id, &state).await?;
        return Ok(());
    }

    // Anything else, unknown commands included, is a candidate link.
    let sink = TelegramSink::new(bot, msg.chat.id);
    handle_link_message(&state, msg.chat.id.0, &text, &sink).await;
    Ok(())
}

async fn handle_start_command(
    bot: &Bot,
    chat_id: ChatId,
    state: &std::sync::Arc<AppState>,
) -> Result<()> {
    apply_menu_mode(state.store.as_ref(), chat_id.0, MenuAction::BackToMain).await;
    bot.send_message(chat_id, WELCOME_TEXT)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(main_menu_keyboard())
        .await?;
    Ok(())
}
