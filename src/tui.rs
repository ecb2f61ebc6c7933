use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::loader::LatestOnly;
use crate::models::{
    ApplicationFilter, ApplicationStatus, JobApplication, NewApplication, SortField,
};
use crate::store::{ApplicationStore, StoreResult};
use crate::truncate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Search,
    ConfirmDelete,
}

/// What the event loop has to do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Reload,
    SetStatus(String, ApplicationStatus),
    Delete(String),
}

struct AppState {
    applications: Vec<JobApplication>,
    filter: ApplicationFilter,
    selected: usize,
    scroll_offset: u16,
    mode: Mode,
    loading: bool,
    message: Option<String>,
}

impl AppState {
    fn new(filter: ApplicationFilter) -> Self {
        Self {
            applications: Vec::new(),
            filter,
            selected: 0,
            scroll_offset: 0,
            mode: Mode::Normal,
            loading: true,
            message: None,
        }
    }

    fn current(&self) -> Option<&JobApplication> {
        self.applications.get(self.selected)
    }

    /// Replaces the list with a fresh load, keeping the selected record when
    /// it is still there.
    fn apply_list(&mut self, applications: Vec<JobApplication>) {
        let selected_id = self.current().map(|a| a.id.clone());
        self.applications = applications;
        self.loading = false;

        let position = selected_id
            .and_then(|id| self.applications.iter().position(|a| a.id == id));
        match position {
            Some(idx) => self.selected = idx,
            None => {
                self.selected = self.selected.min(self.applications.len().saturating_sub(1));
                self.scroll_offset = 0;
            }
        }
    }

    fn next(&mut self) {
        if !self.applications.is_empty() && self.selected < self.applications.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn handle_key(&mut self, code: KeyCode) -> Action {
        match self.mode {
            Mode::Search => self.handle_search_key(code),
            Mode::ConfirmDelete => {
                self.mode = Mode::Normal;
                let id = self.current().map(|a| a.id.clone());
                match (code, id) {
                    (KeyCode::Char('y'), Some(id)) => Action::Delete(id),
                    _ => {
                        self.message = Some("Delete cancelled".to_string());
                        Action::None
                    }
                }
            }
            Mode::Normal => self.handle_normal_key(code),
        }
    }

    fn handle_search_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Enter | KeyCode::Esc => {
                self.mode = Mode::Normal;
                Action::None
            }
            KeyCode::Backspace => {
                self.filter.search.pop();
                Action::Reload
            }
            KeyCode::Char(c) => {
                self.filter.search.push(c);
                Action::Reload
            }
            _ => Action::None,
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode) -> Action {
        self.message = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Down | KeyCode::Char('j') => {
                self.next();
                Action::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.prev();
                Action::None
            }
            KeyCode::Char('J') | KeyCode::PageDown => {
                self.scroll_down();
                Action::None
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                self.scroll_up();
                Action::None
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                Action::None
            }
            KeyCode::Char('s') => {
                self.filter.status = self.filter.status.next();
                Action::Reload
            }
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.filter.sort_on(SortField::ALL[idx]);
                Action::Reload
            }
            KeyCode::Char('r') => Action::Reload,
            KeyCode::Char('d') => {
                if self.current().is_some() {
                    self.mode = Mode::ConfirmDelete;
                }
                Action::None
            }
            KeyCode::Char(c) => match (status_for_key(c), self.current()) {
                (Some(status), Some(app)) if app.status != status => {
                    Action::SetStatus(app.id.clone(), status)
                }
                _ => Action::None,
            },
            _ => Action::None,
        }
    }
}

fn status_for_key(c: char) -> Option<ApplicationStatus> {
    match c {
        'a' => Some(ApplicationStatus::Applied),
        'i' => Some(ApplicationStatus::Interview),
        'o' => Some(ApplicationStatus::Offer),
        'x' => Some(ApplicationStatus::Rejected),
        'w' => Some(ApplicationStatus::Withdrawn),
        _ => None,
    }
}

/// Owns the store side of the browser. Loads run in the background and only
/// the newest one is delivered.
struct Browser {
    store: Arc<dyn ApplicationStore>,
    latest: LatestOnly,
    loaded_tx: mpsc::UnboundedSender<StoreResult<Vec<JobApplication>>>,
}

impl Browser {
    fn reload(&self, state: &mut AppState) {
        let store = Arc::clone(&self.store);
        let filter = state.filter.clone();
        let load = self.latest.run(async move { store.list(&filter).await });
        let tx = self.loaded_tx.clone();
        tokio::spawn(async move {
            if let Some(result) = load.await {
                // the browser may have quit meanwhile
                let _ = tx.send(result);
            }
        });
        state.loading = true;
    }

    async fn set_status(&self, state: &mut AppState, id: &str, status: ApplicationStatus) {
        let Some(app) = state.applications.iter().find(|a| a.id == id) else {
            return;
        };
        let mut fields = NewApplication::from(app);
        fields.status = status;
        state.message = Some(match self.store.update(id, &fields).await {
            Ok(updated) => format!("{} marked {}", updated.company, status),
            Err(e) => {
                warn!(id, error = %e, "status update failed");
                format!("Failed to update status: {}", e)
            }
        });
        self.reload(state);
    }

    async fn delete(&self, state: &mut AppState, id: &str) {
        state.message = Some(match self.store.delete(id).await {
            Ok(true) => "Application deleted".to_string(),
            Ok(false) => "Application was already gone".to_string(),
            Err(e) => {
                warn!(id, error = %e, "delete failed");
                format!("Failed to delete application: {}", e)
            }
        });
        self.reload(state);
    }
}

pub async fn run_browse(store: Arc<dyn ApplicationStore>, filter: ApplicationFilter) -> Result<()> {
    let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
    let browser = Browser {
        store,
        latest: LatestOnly::new(),
        loaded_tx,
    };
    let mut state = AppState::new(filter);
    browser.reload(&mut state);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &browser, loaded_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    browser: &Browser,
    mut loaded_rx: mpsc::UnboundedReceiver<StoreResult<Vec<JobApplication>>>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        while let Ok(result) = loaded_rx.try_recv() {
            match result {
                Ok(applications) => {
                    debug!(count = applications.len(), "browser list refreshed");
                    state.apply_list(applications);
                }
                Err(e) => {
                    state.loading = false;
                    state.message = Some(format!("Failed to load applications: {}", e));
                }
            }
        }

        list_state.select((!state.applications.is_empty()).then_some(state.selected));
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        match state.handle_key(code) {
            Action::None => {}
            Action::Quit => break,
            Action::Reload => browser.reload(state),
            Action::SetStatus(id, status) => browser.set_status(state, &id, status).await,
            Action::Delete(id) => browser.delete(state, &id).await,
        }
    }
    Ok(())
}

fn status_icon(status: ApplicationStatus) -> &'static str {
    match status {
        ApplicationStatus::Applied => " ",
        ApplicationStatus::Interview => "*",
        ApplicationStatus::Offer => "+",
        ApplicationStatus::Rejected => "x",
        ApplicationStatus::Withdrawn => "-",
    }
}

fn status_style(status: ApplicationStatus) -> Style {
    match status {
        ApplicationStatus::Applied => Style::default().fg(Color::Cyan),
        ApplicationStatus::Interview => Style::default().fg(Color::Yellow),
        ApplicationStatus::Offer => Style::default().fg(Color::Green),
        ApplicationStatus::Rejected => Style::default().fg(Color::Red),
        ApplicationStatus::Withdrawn => Style::default().fg(Color::DarkGray),
    }
}

fn list_title(state: &AppState) -> String {
    let mut title = format!(
        " Applications ({}) status:{} sort:{} {} ",
        state.applications.len(),
        state.filter.status,
        state.filter.sort_by,
        state.filter.sort_direction
    );
    if !state.filter.search.is_empty() {
        title.push_str(&format!("search:\"{}\" ", state.filter.search));
    }
    if state.loading {
        title.push_str("(loading) ");
    }
    title
}

fn footer(state: &AppState) -> String {
    match state.mode {
        Mode::Search => format!(" /{}_   enter/esc:done", state.filter.search),
        Mode::ConfirmDelete => " Delete this application? y:yes  any other key:no".to_string(),
        Mode::Normal => match &state.message {
            Some(message) => format!(" {}", message),
            None => " j/k:navigate  J/K:scroll  /:search s:status 1-4:sort  a/i/o/x/w:set status  d:delete  q:quit"
                .to_string(),
        },
    }
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    // Left panel: application list
    let items: Vec<ListItem> = state
        .applications
        .iter()
        .map(|app| {
            ListItem::new(format!(
                "{} {} {} | {}",
                status_icon(app.status),
                app.date_applied.format("%m/%d"),
                truncate(&app.company, 20),
                truncate(&app.job_title, 30)
            ))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(list_title(state)))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: detail
    let detail_widget = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    let help = Paragraph::new(footer(state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[1]);
}

fn build_detail(state: &AppState) -> Text<'_> {
    let Some(app) = state.current() else {
        let empty = if state.loading {
            "Loading..."
        } else {
            "No applications match"
        };
        return Text::raw(empty);
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(&app.job_title, bold)));
    lines.push(Line::from(format!("at {}", app.company)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", app.status),
        status_style(app.status),
    )));
    lines.push(Line::from(format!("Applied: {}", app.date_applied)));
    if !app.source.is_empty() {
        lines.push(Line::from(format!("Source: {}", app.source)));
    }

    let optional = [
        ("Recruiter", &app.recruiter),
        ("Firm", &app.recruiting_firm),
        ("Email", &app.contact_email),
        ("Phone", &app.contact_phone),
        ("URL", &app.application_url),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            lines.push(Line::from(format!("{}: {}", label, value)));
        }
    }

    lines.push(Line::from(Span::styled(
        format!(
            "Created {}  Updated {}",
            app.created_at.format("%Y-%m-%d %H:%M"),
            app.updated_at.format("%Y-%m-%d %H:%M")
        ),
        dim,
    )));
    lines.push(Line::from(""));

    if app.job_description.is_empty() {
        lines.push(Line::from(Span::styled("(No description)", dim)));
    } else {
        lines.push(Line::from(Span::styled("Description", bold)));
        for line in textwrap::fill(&app.job_description, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    if let Some(notes) = &app.notes {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Notes", bold)));
        for line in textwrap::fill(notes, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SortDirection, StatusFilter};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn app(id: &str, status: ApplicationStatus) -> JobApplication {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        JobApplication {
            id: id.to_string(),
            company: format!("Company {}", id),
            job_title: "Engineer".to_string(),
            job_description: String::new(),
            date_applied: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status,
            notes: None,
            source: "LinkedIn".to_string(),
            recruiter: None,
            recruiting_firm: None,
            contact_email: None,
            contact_phone: None,
            application_url: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn loaded(ids: &[&str]) -> AppState {
        let mut state = AppState::new(ApplicationFilter::default());
        state.apply_list(ids.iter().map(|id| app(id, ApplicationStatus::Applied)).collect());
        state
    }

    #[test]
    fn test_reload_keeps_selected_record() {
        let mut state = loaded(&["a", "b", "c"]);
        state.next();
        state.next();
        assert_eq!(state.current().unwrap().id, "c");

        state.apply_list(vec![
            app("c", ApplicationStatus::Offer),
            app("a", ApplicationStatus::Applied),
        ]);
        assert_eq!(state.current().unwrap().id, "c");
        assert!(!state.loading);
    }

    #[test]
    fn test_reload_clamps_when_selected_record_gone() {
        let mut state = loaded(&["a", "b", "c"]);
        state.next();
        state.next();
        state.apply_list(vec![app("a", ApplicationStatus::Applied)]);
        assert_eq!(state.selected, 0);

        state.apply_list(Vec::new());
        assert!(state.current().is_none());
    }

    #[test]
    fn test_sort_keys_toggle_direction() {
        let mut state = loaded(&["a"]);
        assert_eq!(state.handle_key(KeyCode::Char('1')), Action::Reload);
        assert_eq!(state.filter.sort_by, SortField::DateApplied);
        assert_eq!(state.filter.sort_direction, SortDirection::Asc);

        state.handle_key(KeyCode::Char('2'));
        assert_eq!(state.filter.sort_by, SortField::Company);
        assert_eq!(state.filter.sort_direction, SortDirection::Asc);
        state.handle_key(KeyCode::Char('2'));
        assert_eq!(state.filter.sort_direction, SortDirection::Desc);
    }

    #[test]
    fn test_status_filter_and_search_keys() {
        let mut state = loaded(&["a"]);
        assert_eq!(state.handle_key(KeyCode::Char('s')), Action::Reload);
        assert_eq!(
            state.filter.status,
            StatusFilter::Only(ApplicationStatus::Applied)
        );

        state.handle_key(KeyCode::Char('/'));
        assert_eq!(state.handle_key(KeyCode::Char('g')), Action::Reload);
        // 'q' is text while searching
        assert_eq!(state.handle_key(KeyCode::Char('q')), Action::Reload);
        assert_eq!(state.filter.search, "gq");
        state.handle_key(KeyCode::Backspace);
        state.handle_key(KeyCode::Enter);
        assert_eq!(state.filter.search, "g");
        assert_eq!(state.handle_key(KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn test_status_keys() {
        let mut state = loaded(&["a"]);
        assert_eq!(
            state.handle_key(KeyCode::Char('i')),
            Action::SetStatus("a".to_string(), ApplicationStatus::Interview)
        );
        // already applied
        assert_eq!(state.handle_key(KeyCode::Char('a')), Action::None);
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut state = loaded(&["a"]);
        assert_eq!(state.handle_key(KeyCode::Char('d')), Action::None);
        assert_eq!(state.mode, Mode::ConfirmDelete);
        assert_eq!(state.handle_key(KeyCode::Char('n')), Action::None);
        assert_eq!(state.mode, Mode::Normal);

        state.handle_key(KeyCode::Char('d'));
        assert_eq!(
            state.handle_key(KeyCode::Char('y')),
            Action::Delete("a".to_string())
        );
    }
}
