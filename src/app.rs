use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use crate::config::Config;
use crate::error::ChatError;
use crate::executor::{RunReport, ScriptRunner};
use crate::openai::OpenAIClient;
use crate::session::{ChatHistory, ChatRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Per-send state machine. One request in flight at a time; `Generating`
/// covers the LLM call, `Running` the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Generating,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Error,
}

/// Field focus inside the credentials editor popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredField {
    ApiKey,
    ProjectId,
    OrganizationId,
}

impl CredField {
    pub fn next(self) -> Self {
        match self {
            CredField::ApiKey => CredField::ProjectId,
            CredField::ProjectId => CredField::OrganizationId,
            CredField::OrganizationId => CredField::ApiKey,
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub activity: Activity,

    // Chat transcript
    pub history: ChatHistory,
    pub selected_message: Option<usize>,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Message input
    pub input: String,
    pub input_cursor: usize,

    // Status notification line
    pub status: Option<(StatusKind, String)>,

    // In-flight work
    pub send_task: Option<JoinHandle<Result<String, ChatError>>>,
    pub exec_task: Option<JoinHandle<Result<RunReport, ChatError>>>,

    // Animation state
    pub animation_frame: u8,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,
    pub selected_model: String,

    // Credentials editor state
    pub show_credentials_editor: bool,
    pub cred_field: CredField,
    pub cred_api_key: String,
    pub cred_project_id: String,
    pub cred_organization_id: String,
    pub cred_cursor: usize,

    // Code viewer popup
    pub viewer_code: Option<String>,
    pub viewer_scroll: u16,

    // Wiring
    pub config: Config,
    pub client: Option<OpenAIClient>,
    pub runner: ScriptRunner,
}

impl App {
    pub fn new() -> anyhow::Result<Self> {
        let config = Config::load().unwrap_or_else(|_| Config::new());

        let client = build_client(&config);
        let runner = ScriptRunner::new(&config.runner);

        let selected_model = config
            .default_model
            .clone()
            .unwrap_or_else(|| "gpt-4o".to_string());

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            activity: Activity::Idle,

            history: ChatHistory::new(),
            selected_message: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            input: String::new(),
            input_cursor: 0,

            status: None,

            send_task: None,
            exec_task: None,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),
            selected_model,

            show_credentials_editor: false,
            cred_field: CredField::ApiKey,
            cred_api_key: String::new(),
            cred_project_id: String::new(),
            cred_organization_id: String::new(),
            cred_cursor: 0,

            viewer_code: None,
            viewer_scroll: 0,

            config,
            client,
            runner,
        })
    }

    pub fn rebuild_client(&mut self) {
        self.client = build_client(&self.config);
    }

    // Status notifications

    pub fn notify_info(&mut self, message: impl Into<String>) {
        self.status = Some((StatusKind::Info, message.into()));
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.status = Some((StatusKind::Error, message.into()));
    }

    // Transcript selection

    pub fn select_next_message(&mut self) {
        let len = self.history.len();
        if len > 0 {
            let i = self.selected_message.map(|i| (i + 1).min(len - 1)).unwrap_or(0);
            self.selected_message = Some(i);
        }
    }

    pub fn select_prev_message(&mut self) {
        if let Some(i) = self.selected_message {
            self.selected_message = Some(i.saturating_sub(1));
        } else if !self.history.is_empty() {
            self.selected_message = Some(self.history.len() - 1);
        }
    }

    /// Remove the selected turn and keep the selection on a live index.
    pub fn delete_selected_message(&mut self) {
        if let Some(i) = self.selected_message {
            if self.history.remove(i).is_some() {
                if self.history.is_empty() {
                    self.selected_message = None;
                } else if i >= self.history.len() {
                    self.selected_message = Some(self.history.len() - 1);
                }
            }
        }
    }

    pub fn clear_chat(&mut self) {
        self.history.clear();
        self.selected_message = None;
        self.chat_scroll = 0;
    }

    /// Open the code viewer for the selected turn when it is an assistant
    /// turn (user turns hold prose, not code).
    pub fn view_selected_code(&mut self) {
        if let Some(msg) = self.selected_message.and_then(|i| self.history.get(i)) {
            if msg.role == ChatRole::Assistant {
                self.viewer_code = Some(msg.content.clone());
                self.viewer_scroll = 0;
            }
        }
    }

    // Chat scrolling

    pub fn scroll_down(&mut self) {
        let max_scroll = self.transcript_lines().saturating_sub(self.chat_height);
        if self.chat_scroll < max_scroll {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Pin the view to the newest turn so the busy indicator stays visible.
    pub fn scroll_to_bottom(&mut self) {
        let total = self.transcript_lines() + 2; // indicator line + role line
        let visible = if self.chat_height > 0 { self.chat_height } else { 20 };
        if total > visible {
            self.chat_scroll = total - visible;
        } else {
            self.chat_scroll = 0;
        }
    }

    /// Rendered line count of the transcript at the current chat width,
    /// counting wrapped lines the way the chat paragraph breaks them.
    pub fn transcript_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for msg in self.history.iter() {
            total += 1; // role line
            for line in msg.content.lines() {
                let char_count = line.chars().count();
                if char_count == 0 {
                    total += 1;
                } else {
                    total += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total += 1; // blank line after message
        }
        total
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.activity != Activity::Idle {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Model picker

    pub fn open_model_picker(&mut self) {
        self.available_models = OpenAIClient::picker_models();
        let current = self
            .available_models
            .iter()
            .position(|m| m == &self.selected_model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.selected_model = model.clone();
                self.show_model_picker = false;
                let _ = Config::save_default_model(&self.selected_model);
            }
        }
    }

    // Credentials editor

    pub fn open_credentials_editor(&mut self) {
        self.cred_api_key = self.config.api_key.clone().unwrap_or_default();
        self.cred_project_id = self.config.project_id.clone().unwrap_or_default();
        self.cred_organization_id = self.config.organization_id.clone().unwrap_or_default();
        self.cred_field = CredField::ApiKey;
        self.cred_cursor = self.cred_api_key.chars().count();
        self.show_credentials_editor = true;
    }

    pub fn close_credentials_editor(&mut self) {
        self.show_credentials_editor = false;
        self.cred_api_key.clear();
        self.cred_project_id.clear();
        self.cred_organization_id.clear();
        self.cred_cursor = 0;
    }

    pub fn cred_field_value_mut(&mut self) -> &mut String {
        match self.cred_field {
            CredField::ApiKey => &mut self.cred_api_key,
            CredField::ProjectId => &mut self.cred_project_id,
            CredField::OrganizationId => &mut self.cred_organization_id,
        }
    }

    pub fn cred_field_value(&self) -> &str {
        match self.cred_field {
            CredField::ApiKey => &self.cred_api_key,
            CredField::ProjectId => &self.cred_project_id,
            CredField::OrganizationId => &self.cred_organization_id,
        }
    }

    // Task completion, called from the main loop

    /// Assistant reply arrived (or failed). On success the snippet is
    /// recorded as the assistant turn and handed to the interpreter.
    pub fn on_generation_finished(&mut self, result: Result<String, ChatError>) {
        match result {
            Ok(code) => {
                self.history.append(ChatRole::Assistant, code.clone());
                self.scroll_to_bottom();
                let runner = self.runner.clone();
                self.activity = Activity::Running;
                self.exec_task = Some(tokio::spawn(async move { runner.run(&code).await }));
            }
            Err(err) => {
                // The user turn stays in history; only the assistant turn is
                // withheld on failure.
                self.notify_error(err.to_string());
                self.activity = Activity::Idle;
            }
        }
    }

    pub fn on_execution_finished(&mut self, result: Result<RunReport, ChatError>) {
        match result {
            Ok(report) => {
                let out = report.stdout.trim();
                if out.is_empty() {
                    self.notify_info("Code executed.");
                } else {
                    let first = out.lines().next().unwrap_or(out);
                    self.notify_info(format!("Code executed: {}", first));
                }
            }
            Err(err) => {
                // Failed code stays in history so Show Code can inspect it.
                self.notify_error(err.to_string());
            }
        }
        self.activity = Activity::Idle;
    }
}

fn build_client(config: &Config) -> Option<OpenAIClient> {
    let api_key = config.resolved_api_key()?;
    let project_id = config.resolved_project_id()?;
    let organization_id = config.resolved_organization_id();
    Some(OpenAIClient::new(
        &api_key,
        &project_id,
        organization_id.as_deref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        let config = Config::new();
        let runner = ScriptRunner::new(&config.runner);
        App {
            should_quit: false,
            input_mode: InputMode::Editing,
            activity: Activity::Idle,
            history: ChatHistory::new(),
            selected_message: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            input: String::new(),
            input_cursor: 0,
            status: None,
            send_task: None,
            exec_task: None,
            animation_frame: 0,
            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),
            selected_model: "gpt-4o".to_string(),
            show_credentials_editor: false,
            cred_field: CredField::ApiKey,
            cred_api_key: String::new(),
            cred_project_id: String::new(),
            cred_organization_id: String::new(),
            cred_cursor: 0,
            viewer_code: None,
            viewer_scroll: 0,
            config,
            client: None,
            runner,
        }
    }

    #[test]
    fn delete_keeps_selection_on_a_live_index() {
        let mut app = test_app();
        app.history.append(ChatRole::User, "one");
        app.history.append(ChatRole::Assistant, "two");
        app.history.append(ChatRole::User, "three");

        app.selected_message = Some(2);
        app.delete_selected_message();
        assert_eq!(app.history.len(), 2);
        assert_eq!(app.selected_message, Some(1));

        app.delete_selected_message();
        app.delete_selected_message();
        assert!(app.history.is_empty());
        assert_eq!(app.selected_message, None);
    }

    #[tokio::test]
    async fn failed_generation_keeps_user_turn_and_reports() {
        let mut app = test_app();
        app.history.append(ChatRole::User, "add a cube at the origin");
        app.activity = Activity::Generating;

        app.on_generation_finished(Err(ChatError::NoCode));

        assert_eq!(app.history.len(), 1);
        assert_eq!(app.activity, Activity::Idle);
        let (kind, msg) = app.status.clone().unwrap();
        assert_eq!(kind, StatusKind::Error);
        assert!(msg.contains("No code generated"));
    }

    #[tokio::test]
    async fn successful_generation_appends_assistant_turn_and_runs_it() {
        let mut app = test_app();
        app.runner = ScriptRunner::new(&["sh".to_string()]);
        app.history.append(ChatRole::User, "add a cube at the origin");
        app.activity = Activity::Generating;

        app.on_generation_finished(Ok("true".to_string()));

        assert_eq!(app.history.len(), 2);
        assert_eq!(app.history.get(1).unwrap().role, ChatRole::Assistant);
        assert_eq!(app.history.get(1).unwrap().content, "true");
        assert_eq!(app.activity, Activity::Running);

        let result = app.exec_task.take().unwrap().await.unwrap();
        app.on_execution_finished(result);
        assert_eq!(app.activity, Activity::Idle);
        assert_eq!(app.status.as_ref().unwrap().0, StatusKind::Info);
    }

    #[tokio::test]
    async fn execution_failure_reports_but_keeps_the_code() {
        let mut app = test_app();
        app.history.append(ChatRole::User, "break something");
        app.history.append(ChatRole::Assistant, "boom()");
        app.activity = Activity::Running;

        app.on_execution_finished(Err(ChatError::Execution(
            "NameError: name 'boom' is not defined".to_string(),
        )));

        assert_eq!(app.activity, Activity::Idle);
        assert_eq!(app.history.len(), 2);
        let (kind, msg) = app.status.clone().unwrap();
        assert_eq!(kind, StatusKind::Error);
        assert!(msg.contains("NameError"));

        // Show Code still reaches the failed snippet.
        app.selected_message = Some(1);
        app.view_selected_code();
        assert_eq!(app.viewer_code.as_deref(), Some("boom()"));
    }
}
