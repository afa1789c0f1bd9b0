use anyhow::Result;

mod app;
mod config;
mod error;
mod executor;
mod generator;
mod handler;
mod openai;
mod session;
mod tui;
mod ui;

use app::{Activity, App};

#[tokio::main]
async fn main() -> Result<()> {
    tui::install_panic_hook();

    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new()?;

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    loop {
        // Pick up finished generation/execution work before drawing, so the
        // frame reflects the newest state. Ticks guarantee this runs even
        // when the keyboard is idle.
        poll_tasks(app).await;

        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

async fn poll_tasks(app: &mut App) {
    if app.send_task.as_ref().is_some_and(|t| t.is_finished()) {
        if let Some(task) = app.send_task.take() {
            match task.await {
                Ok(result) => app.on_generation_finished(result),
                Err(err) => {
                    app.notify_error(format!("generation task failed: {}", err));
                    app.activity = Activity::Idle;
                }
            }
        }
    }

    if app.exec_task.as_ref().is_some_and(|t| t.is_finished()) {
        if let Some(task) = app.exec_task.take() {
            match task.await {
                Ok(result) => app.on_execution_finished(result),
                Err(err) => {
                    app.notify_error(format!("execution task failed: {}", err));
                    app.activity = Activity::Idle;
                }
            }
        }
    }
}
