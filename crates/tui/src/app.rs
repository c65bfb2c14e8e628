use std::{io, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as TrackLine},
        Block, Borders, List, ListItem, ListState, Paragraph, Wrap,
    },
    Frame, Terminal,
};
use tokio::{spawn, sync::mpsc};
use tracing::{error, info};
use yardsim_core::{
    parse_hex_color, Advisor, AdvisoryRequest, AdvisoryResponse, LocationId, MoveOutcome,
    TrainStatus, YardSimulation, YardSnapshot, YardStatus,
};

const TICK_RATE: Duration = Duration::from_millis(50);
const BOUNDS_PADDING: f64 = 40.0;

enum AppEvent {
    Input(Event),
    Tick,
    Advice(Result<AdvisoryResponse>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Trains,
    Targets,
}

/// Terminal front end: renders snapshots and issues commands.
pub struct YardApp {
    simulation: YardSimulation,
    advisor: Arc<Advisor>,
    snapshot: YardSnapshot,
    yard_status: YardStatus,
    focus: Focus,
    train_cursor: usize,
    target_cursor: usize,
    advice: Option<AdvisoryResponse>,
    pending_advice: bool,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    status: String,
    should_quit: bool,
}

impl YardApp {
    pub fn new(simulation: YardSimulation, advisor: Arc<Advisor>) -> Self {
        let snapshot = simulation.snapshot();
        let yard_status =
            YardStatus::collect(simulation.topology(), &snapshot, Utc::now());
        let status = format!(
            "Loaded {} locations and {} trains; advice from {}",
            simulation.topology().locations().len(),
            snapshot.trains.len(),
            advisor.describe()
        );
        Self {
            simulation,
            advisor,
            snapshot,
            yard_status,
            focus: Focus::Trains,
            train_cursor: 0,
            target_cursor: 0,
            advice: None,
            pending_advice: false,
            event_tx: None,
            status,
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        while !self.should_quit {
            terminal.draw(|frame| self.draw(frame))?;
            match event_rx.recv().await {
                Some(event) => self.process_app_event(event),
                None => break,
            }
        }

        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        self.simulation.stop();
        Ok(())
    }

    fn process_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key)
            }
            AppEvent::Input(_) => {}
            AppEvent::Tick => self.snapshot = self.simulation.snapshot(),
            AppEvent::Advice(result) => {
                self.pending_advice = false;
                match result {
                    Ok(batch) => {
                        info!(assignments = batch.assignments.len(), "Advice received");
                        self.status = format!(
                            "{} suggestion(s) from {}; press 'a' to apply",
                            batch.assignments.len(),
                            self.advisor.describe()
                        );
                        self.advice = Some(batch);
                    }
                    Err(err) => {
                        error!(?err, "Advice request failed");
                        self.status = format!("Advice failed: {err:#}");
                    }
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let trains = self.snapshot.trains.len();
        let targets = self.simulation.topology().locations().len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Tab | KeyCode::Left | KeyCode::Right => {
                self.focus = match self.focus {
                    Focus::Trains => Focus::Targets,
                    Focus::Targets => Focus::Trains,
                }
            }
            KeyCode::Up => match self.focus {
                Focus::Trains => self.train_cursor = step(self.train_cursor, trains, -1),
                Focus::Targets => self.target_cursor = step(self.target_cursor, targets, -1),
            },
            KeyCode::Down => match self.focus {
                Focus::Trains => self.train_cursor = step(self.train_cursor, trains, 1),
                Focus::Targets => self.target_cursor = step(self.target_cursor, targets, 1),
            },
            KeyCode::Enter => self.move_selected(),
            KeyCode::Char('m') => self.toggle_maintenance(),
            KeyCode::Char('o') => self.request_advice(),
            KeyCode::Char('a') => self.apply_advice(),
            KeyCode::Char('s') => {
                self.yard_status = YardStatus::collect(
                    self.simulation.topology(),
                    &self.snapshot,
                    Utc::now(),
                );
                self.status = "Yard status refreshed".to_string();
            }
            _ => {}
        }
    }

    fn move_selected(&mut self) {
        let Some(train) = self.snapshot.trains.get(self.train_cursor) else {
            return;
        };
        let Some(target) = self
            .simulation
            .topology()
            .locations()
            .get(self.target_cursor)
        else {
            return;
        };
        let outcome = self.simulation.commands().move_train(&train.id, &target.id);
        self.status = match outcome {
            MoveOutcome::Accepted => format!("{} → {}", train.id, target.label),
            MoveOutcome::Busy => "Another train is moving; wait for it to arrive".to_string(),
            MoveOutcome::UnknownTrain | MoveOutcome::UnknownLocation => {
                format!("Move of {} ignored ({outcome:?})", train.id)
            }
        };
    }

    fn toggle_maintenance(&mut self) {
        let Some(train) = self.snapshot.trains.get(self.train_cursor) else {
            return;
        };
        let hold = train.status == TrainStatus::Idle;
        if self.simulation.store().set_maintenance(&train.id, hold) {
            self.status = if hold {
                format!("{} held for maintenance", train.id)
            } else {
                format!("{} released from maintenance", train.id)
            };
        } else {
            self.status = format!("{} is moving; maintenance unchanged", train.id);
        }
    }

    fn request_advice(&mut self) {
        if self.pending_advice {
            return;
        }
        let Some(sender) = self.event_tx.clone() else {
            error!("event_channel_missing");
            return;
        };
        self.pending_advice = true;
        self.status = format!("Requesting advice from {}…", self.advisor.describe());
        let advisor = self.advisor.clone();
        let request = AdvisoryRequest::from_snapshot(&self.snapshot);
        spawn(async move {
            let result = advisor.propose(&request).await;
            let _ = sender.send(AppEvent::Advice(result)).await;
        });
    }

    fn apply_advice(&mut self) {
        let Some(batch) = self.advice.take() else {
            self.status = "No advice to apply; press 'o' first".to_string();
            return;
        };
        let outcomes = self
            .simulation
            .commands()
            .apply_assignments(&batch.assignments);
        let accepted = outcomes.iter().filter(|outcome| outcome.is_accepted()).count();
        self.status = format!("Applied {accepted}/{} suggestion(s)", outcomes.len());
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(10), Constraint::Length(3)])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(rows[0]);
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(35),
                Constraint::Percentage(35),
            ])
            .split(columns[1]);

        self.render_yard(frame, columns[0]);
        self.render_trains(frame, side[0]);
        self.render_targets(frame, side[1]);
        self.render_details(frame, side[2]);
        self.render_status(frame, rows[1]);
    }

    fn render_yard(&self, frame: &mut Frame, area: Rect) {
        let topology = self.simulation.topology();
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for location in topology.locations() {
            min_x = min_x.min(location.point.x);
            max_x = max_x.max(location.point.x);
            min_y = min_y.min(location.point.y);
            max_y = max_y.max(location.point.y);
        }
        if topology.locations().is_empty() {
            (min_x, max_x, min_y, max_y) = (0.0, 1.0, 0.0, 1.0);
        }

        let title = if self.snapshot.is_animating {
            "Yard · movement in progress"
        } else {
            "Yard"
        };
        // Layout y grows downwards; the canvas y grows upwards.
        let canvas = Canvas::default()
            .block(Block::default().borders(Borders::ALL).title(title))
            .x_bounds([min_x - BOUNDS_PADDING, max_x + BOUNDS_PADDING])
            .y_bounds([-max_y - BOUNDS_PADDING, -min_y + BOUNDS_PADDING])
            .paint(|ctx| {
                for connection in topology.connections() {
                    for pair in connection.waypoints.windows(2) {
                        ctx.draw(&TrackLine {
                            x1: pair[0].x,
                            y1: -pair[0].y,
                            x2: pair[1].x,
                            y2: -pair[1].y,
                            color: Color::DarkGray,
                        });
                    }
                }
                ctx.layer();
                for location in topology.locations() {
                    ctx.print(
                        location.point.x,
                        -location.point.y,
                        Span::styled("●", Style::default().fg(hex_color(location.category.color()))),
                    );
                }
                for train in &self.snapshot.trains {
                    ctx.print(
                        train.rendered.x,
                        -train.rendered.y,
                        Span::styled(
                            "■",
                            Style::default()
                                .fg(hex_color(&train.color))
                                .add_modifier(Modifier::BOLD),
                        ),
                    );
                }
            });
        frame.render_widget(canvas, area);
    }

    fn render_trains(&self, frame: &mut Frame, area: Rect) {
        let topology = self.simulation.topology();
        let label = |id: &LocationId| {
            topology
                .location(id)
                .map(|location| location.label.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let items: Vec<ListItem> = self
            .snapshot
            .trains
            .iter()
            .map(|train| {
                let mut spans = vec![
                    Span::styled("■ ", Style::default().fg(hex_color(&train.color))),
                    Span::raw(format!("{} ", train.id)),
                    Span::styled(
                        format!("[{}] ", train.status.label()),
                        Style::default().fg(hex_color(train.status.color())),
                    ),
                    Span::raw(label(&train.current)),
                ];
                if let Some(target) = &train.target {
                    spans.push(Span::styled(
                        format!(" → {}", label(target)),
                        Style::default().fg(Color::Cyan),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(self.train_cursor));
        let list = List::new(items)
            .block(focus_block("Trains", self.focus == Focus::Trains))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_targets(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .simulation
            .topology()
            .locations()
            .iter()
            .map(|location| {
                ListItem::new(Line::from(vec![
                    Span::styled("● ", Style::default().fg(hex_color(location.category.color()))),
                    Span::raw(location.label.clone()),
                    Span::styled(
                        format!(" · {}", location.category.label()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();
        let mut state = ListState::default();
        state.select(Some(self.target_cursor));
        let list = List::new(items)
            .block(focus_block("Destinations", self.focus == Focus::Targets))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_details(&self, frame: &mut Frame, area: Rect) {
        let status = &self.yard_status;
        let mut lines = vec![
            Line::from(format!(
                "Weather: {} {}°C, wind {} km/h",
                status.weather.condition, status.weather.temperature, status.weather.wind_speed
            )),
            Line::from(format!(
                "Tracks: {}/{} operational · Signals: {}/{}",
                status.infrastructure.tracks.operational,
                status.infrastructure.tracks.total,
                status.infrastructure.signals.operational,
                status.infrastructure.signals.total
            )),
            Line::from(format!(
                "Capacity: {}/{} ({:.1}%)",
                status.capacity.occupied, status.capacity.total_spots, status.capacity.utilization
            )),
        ];
        for alert in &status.alerts {
            lines.push(Line::from(Span::styled(
                format!("! {}", alert.message),
                Style::default().fg(Color::Yellow),
            )));
        }
        if let Some(batch) = &self.advice {
            lines.push(Line::from(Span::styled(
                format!(
                    "Advice ({}, confidence {:.0}%):",
                    batch.metadata.algorithm,
                    batch.metadata.confidence * 100.0
                ),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for assignment in &batch.assignments {
                lines.push(Line::from(format!(
                    "P{} {} → {} · {}",
                    assignment.priority,
                    assignment.train_id,
                    assignment.target_node,
                    assignment.reason
                )));
            }
        }
        let panel = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Yard status"))
            .wrap(Wrap { trim: true });
        frame.render_widget(panel, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let help = "Tab focus · ↑↓ select · Enter move · m maintenance · o advise · a apply · s status · q quit";
        let lines = vec![
            Line::from(self.status.clone()),
            Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))),
        ];
        let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::TOP));
        frame.render_widget(paragraph, area);
    }
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn step(cursor: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    (cursor as isize + delta).rem_euclid(len as isize) as usize
}

fn hex_color(value: &str) -> Color {
    match parse_hex_color(value) {
        Some([r, g, b]) => Color::Rgb(r, g, b),
        None => Color::White,
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_both_ways() {
        assert_eq!(step(0, 4, -1), 3);
        assert_eq!(step(3, 4, 1), 0);
        assert_eq!(step(1, 4, 1), 2);
        assert_eq!(step(5, 0, 1), 0);
    }

    #[test]
    fn parses_hex_colours() {
        assert_eq!(hex_color("#3b82f6"), Color::Rgb(0x3b, 0x82, 0xf6));
        assert_eq!(hex_color("#EF4444"), Color::Rgb(0xef, 0x44, 0x44));
        assert_eq!(hex_color("#xyz"), Color::White);
        assert_eq!(hex_color("#gg0000"), Color::White);
        assert_eq!(hex_color("#1é234"), Color::White);
    }
}
