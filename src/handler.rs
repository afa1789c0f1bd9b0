use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{Activity, App, InputMode};
use crate::generator;
use crate::openai::{check_credentials, OpenAIClient};
use crate::session::ChatRole;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Popups eat the keyboard while open, most specific first
    if app.viewer_code.is_some() {
        handle_code_viewer(app, key);
        return Ok(());
    }
    if app.show_credentials_editor {
        handle_credentials_editor(app, key).await;
        return Ok(());
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await,
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Transcript selection
        KeyCode::Char('j') | KeyCode::Down => app.select_next_message(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev_message(),

        // Scrolling
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = app.chat_height / 2;
            for _ in 0..half {
                app.scroll_down();
            }
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let half = app.chat_height / 2;
            for _ in 0..half {
                app.scroll_up();
            }
        }

        // Per-message operators
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected_message(),
        KeyCode::Char('v') | KeyCode::Enter => app.view_selected_code(),

        // Chat-wide operators
        KeyCode::Char('C') => {
            app.clear_chat();
            app.notify_info("Chat cleared.");
        }
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('K') => app.open_credentials_editor(),
        KeyCode::Char('T') => test_connection(app).await,

        // Back to typing
        KeyCode::Char('i') | KeyCode::Char('/') | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.input_cursor = app.input.chars().count();
        }

        KeyCode::Esc => app.status = None,

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => send_message(app),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

/// The send operator: record the user turn, fire the generation task, let
/// the main loop pick up the result. One send in flight at a time.
fn send_message(app: &mut App) {
    if app.input.trim().is_empty() || app.activity != Activity::Idle {
        return;
    }

    let Some(client) = app.client.clone() else {
        app.notify_error("Credentials not configured. Press 'K' to set them.");
        return;
    };

    let user_message = app.input.clone();
    // Snapshot the conversation before recording the new turn; the prompt
    // wants prior history plus the fresh message exactly once.
    let messages = generator::build_messages(&app.history, &user_message);
    app.history.append(ChatRole::User, user_message);

    app.input.clear();
    app.input_cursor = 0;
    app.status = None;
    app.activity = Activity::Generating;
    app.scroll_to_bottom();

    let model = app.selected_model.clone();
    app.send_task = Some(tokio::spawn(async move {
        generator::generate(&client, &model, &messages).await
    }));
}

/// Single attempt against the model list; persists credentials on success.
/// Deliberately synchronous from the user's point of view.
async fn test_connection(app: &mut App) {
    let api_key = app.config.resolved_api_key().unwrap_or_default();
    let project_id = app.config.resolved_project_id().unwrap_or_default();
    let organization_id = app.config.resolved_organization_id().unwrap_or_default();

    run_connection_test(app, &api_key, &project_id, &organization_id, false).await;
}

async fn run_connection_test(
    app: &mut App,
    api_key: &str,
    project_id: &str,
    organization_id: &str,
    save_fields: bool,
) {
    if let Err(err) = check_credentials(api_key, project_id) {
        app.notify_error(err.to_string());
        return;
    }

    let client = OpenAIClient::new(api_key, project_id, Some(organization_id));
    match client.count_models().await {
        Ok(count) => {
            if save_fields {
                app.config.api_key = Some(api_key.to_string());
                app.config.project_id = Some(project_id.to_string());
                app.config.organization_id = if organization_id.is_empty() {
                    None
                } else {
                    Some(organization_id.to_string())
                };
            }
            if let Err(err) = app.config.save() {
                app.notify_error(format!("Connected, but saving config failed: {}", err));
            } else {
                app.notify_info(format!(
                    "Connection successful! {} models available.",
                    count
                ));
            }
            app.rebuild_client();
        }
        Err(err) => app.notify_error(format!("Connection failed: {}", err)),
    }
}

async fn handle_credentials_editor(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_credentials_editor(),
        KeyCode::Tab | KeyCode::Down => {
            app.cred_field = app.cred_field.next();
            app.cred_cursor = app.cred_field_value().chars().count();
        }
        KeyCode::Enter => {
            let api_key = app.cred_api_key.trim().to_string();
            let project_id = app.cred_project_id.trim().to_string();
            let organization_id = app.cred_organization_id.trim().to_string();
            run_connection_test(app, &api_key, &project_id, &organization_id, true).await;
            // Keep the editor open on failure so the fields can be fixed.
            if matches!(app.status, Some((crate::app::StatusKind::Info, _))) {
                app.close_credentials_editor();
            }
        }
        KeyCode::Backspace => {
            if app.cred_cursor > 0 {
                app.cred_cursor -= 1;
                let cursor = app.cred_cursor;
                let field = app.cred_field_value_mut();
                let byte_pos = char_to_byte_index(field, cursor);
                field.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cred_cursor = app.cred_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.cred_field_value().chars().count();
            app.cred_cursor = (app.cred_cursor + 1).min(char_count);
        }
        KeyCode::Char(c) => {
            let cursor = app.cred_cursor;
            let field = app.cred_field_value_mut();
            let byte_pos = char_to_byte_index(field, cursor);
            field.insert(byte_pos, c);
            app.cred_cursor += 1;
        }
        _ => {}
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_model_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn handle_code_viewer(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => {
            app.viewer_code = None;
            app.viewer_scroll = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.viewer_scroll = app.viewer_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.viewer_scroll = app.viewer_scroll.saturating_sub(1);
        }
        KeyCode::Char('g') => app.viewer_scroll = 0,
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if app.viewer_code.is_some() {
                app.viewer_scroll = app.viewer_scroll.saturating_add(3);
            } else {
                app.scroll_down();
                app.scroll_down();
                app.scroll_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if app.viewer_code.is_some() {
                app.viewer_scroll = app.viewer_scroll.saturating_sub(3);
            } else {
                app.scroll_up();
                app.scroll_up();
                app.scroll_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_to_byte_index_is_utf8_safe() {
        let s = "añadir cubo";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3); // 'ñ' is two bytes
        assert_eq!(char_to_byte_index(s, 100), s.len());
    }
}
