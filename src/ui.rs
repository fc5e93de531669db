use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
};

use crate::command::{Action, Command};
use crate::dashboard::{ChartRow, ChartTable, Surface, View};

pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    pub fn enter() -> Result<Tui, anyhow::Error> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        undo_on_error(Tui::setup(), reset_terminal)
    }

    fn setup() -> Result<Tui, anyhow::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let mut terminal =
            Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")?;
        terminal.clear()?;
        Ok(Tui { terminal })
    }

    pub fn restore(&mut self) -> Result<(), anyhow::Error> {
        reset_terminal()?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Leaves raw mode and the alternate screen. Safe to call when neither is active.
pub fn reset_terminal() -> Result<(), anyhow::Error> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
        .context("Failed to leave alternate screen")?;
    Ok(())
}

/// Resets the terminal before the previous hook prints the panic message.
pub fn install_panic_hook() {
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Err(e) = reset_terminal() {
            log::error!("{e:#}");
        }
        hook(info);
    }));
}

fn undo_on_error<T>(
    result: Result<T, anyhow::Error>,
    undo: impl FnOnce() -> Result<(), anyhow::Error>,
) -> Result<T, anyhow::Error> {
    if result.is_err() {
        if let Err(e) = undo() {
            log::warn!("Failed to roll back terminal setup: {e:#}");
        }
    }
    result
}

impl Surface for Tui {
    fn actions(&mut self) -> Result<Vec<Action>, anyhow::Error> {
        let mut actions = Vec::new();
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    actions.extend(action_for(key));
                }
            }
        }
        Ok(actions)
    }

    fn draw(&mut self, view: &View) -> Result<(), anyhow::Error> {
        self.terminal.draw(|f| render(f, view))?;
        Ok(())
    }
}

pub fn action_for(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('1') => Some(Action::Send(Command::AlertOn)),
        KeyCode::Char('0') => Some(Action::Send(Command::AlertOff)),
        KeyCode::Char('e') => Some(Action::Export),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

pub fn render(f: &mut Frame, view: &View) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(f.size());

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(columns[0]);

    render_status(f, view, left[0]);
    render_last_reading(f, view, left[1]);
    render_commands(f, view, left[2]);
    render_download(f, view, left[3]);
    render_chart(f, view.chart.as_ref(), columns[1]);
}

fn block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(title, Style::default().add_modifier(Modifier::BOLD)))
}

fn metric<'a>(label: &'a str, value: String, color: Color) -> Line<'a> {
    Line::from(vec![
        Span::raw(format!("{label:<16}")),
        Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])
}

fn info(text: &str) -> Line<'_> {
    Line::from(Span::styled(text, Style::default().fg(Color::Cyan)))
}

fn format_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1} {unit}"),
        None => "-".to_string(),
    }
}

fn render_status(f: &mut Frame, view: &View, area: Rect) {
    let (connected, color) = if view.connected {
        ("Yes", Color::Green)
    } else {
        ("No", Color::Red)
    };
    let lines = vec![
        metric("MQTT Connected", connected.to_string(), color),
        metric("Broker", view.broker.clone(), Color::White),
    ];
    f.render_widget(
        Paragraph::new(lines).block(block("Connection Status")),
        area,
    );
}

fn render_last_reading(f: &mut Frame, view: &View, area: Rect) {
    let lines = match &view.last_reading {
        Some(reading) => vec![
            metric("Time", reading.timestamp.clone(), Color::White),
            metric("Temperature", format_value(reading.temperature, "°C"), Color::Red),
            metric("Humidity", format_value(reading.humidity, "%"), Color::Blue),
        ],
        None => vec![info("Waiting for data...")],
    };
    f.render_widget(
        Paragraph::new(lines).block(block("Last Sensor Reading")),
        area,
    );
}

fn render_commands(f: &mut Frame, view: &View, area: Rect) {
    let mut lines = vec![
        Line::from(vec![
            Span::styled("1", Style::default().fg(Color::Cyan)),
            Span::raw("  Send ALERT_ON"),
        ]),
        Line::from(vec![
            Span::styled("0", Style::default().fg(Color::Cyan)),
            Span::raw("  Send ALERT_OFF"),
        ]),
    ];
    if let Some(confirmation) = &view.confirmation {
        lines.push(Line::from(Span::styled(
            confirmation.as_str(),
            Style::default().fg(Color::Green),
        )));
    }
    f.render_widget(
        Paragraph::new(lines).block(block("Manual Command")),
        area,
    );
}

fn render_download(f: &mut Frame, view: &View, area: Rect) {
    let mut lines = vec![Line::from(vec![
        Span::styled("e", Style::default().fg(Color::Cyan)),
        Span::raw(format!("  Download CSV ({} rows)", view.log_len)),
    ])];
    if let Some(status) = &view.export_status {
        lines.push(Line::from(status.as_str()));
    }
    f.render_widget(
        Paragraph::new(lines)
            .block(block("Download Logs"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn series(table: &ChartTable, pick: impl Fn(&ChartRow) -> Option<f64>) -> Vec<(f64, f64)> {
    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| pick(row).map(|v| (i as f64, v)))
        .collect()
}

fn y_bounds(temp: &[(f64, f64)], hum: &[(f64, f64)]) -> [f64; 2] {
    let values = temp.iter().chain(hum).map(|&(_, v)| v);
    let min = values.clone().fold(f64::INFINITY, f64::min);
    let max = values.fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return [0.0, 1.0];
    }
    let pad = ((max - min) * 0.1).max(1.0);
    [min - pad, max + pad]
}

fn render_chart(f: &mut Frame, chart: Option<&ChartTable>, area: Rect) {
    let block = block("Realtime Chart (Temp & Humidity)");

    let Some(table) = chart else {
        f.render_widget(
            Paragraph::new(info("No data yet. Waiting for sensor...")).block(block),
            area,
        );
        return;
    };

    let temp = series(table, |row| row.temp);
    let hum = series(table, |row| row.hum);
    let [y_min, y_max] = y_bounds(&temp, &hum);
    let x_max = table.rows.len().saturating_sub(1).max(1) as f64;

    let first = table.rows.first().map(|r| r.ts.clone()).unwrap_or_default();
    let last = table.rows.last().map(|r| r.ts.clone()).unwrap_or_default();

    let datasets = vec![
        Dataset::default()
            .name("temp")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&temp),
        Dataset::default()
            .name("hum")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Blue))
            .data(&hum),
    ];

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title("ts")
                .bounds([0.0, x_max])
                .labels(vec![Span::raw(first), Span::raw(last)]),
        )
        .y_axis(
            Axis::default()
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::raw(format!("{y_min:.1}")),
                    Span::raw(format!("{y_max:.1}")),
                ]),
        );
    f.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::reading::Reading;

    fn view() -> View {
        View {
            connected: false,
            broker: "broker.hivemq.com".to_string(),
            last_reading: None,
            confirmation: None,
            export_status: None,
            log_len: 0,
            chart: None,
        }
    }

    fn draw(view: &View) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| render(f, view)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_empty_session() {
        let screen = draw(&view());
        assert!(screen.contains("Waiting for data..."));
        assert!(screen.contains("No data yet"));
        assert!(screen.contains("broker.hivemq.com"));
    }

    #[test]
    fn test_render_reading_and_chart() {
        let row = |ts: &str, temp, hum| ChartRow {
            ts: ts.to_string(),
            temp: Some(temp),
            hum: Some(hum),
        };
        let screen = draw(&View {
            connected: true,
            last_reading: Some(Reading {
                timestamp: "10:00:01".to_string(),
                temperature: Some(22.0),
                humidity: Some(55.0),
            }),
            confirmation: Some("Sent ALERT_ON".to_string()),
            log_len: 2,
            chart: Some(ChartTable {
                rows: vec![row("10:00:00", 20.0, 50.0), row("10:00:01", 22.0, 55.0)],
            }),
            ..view()
        });
        assert!(screen.contains("Yes"));
        assert!(screen.contains("22.0 °C"));
        assert!(screen.contains("Sent ALERT_ON"));
        assert!(!screen.contains("No data yet"));
    }

    #[test]
    fn test_key_bindings() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(
            action_for(key(KeyCode::Char('1'))),
            Some(Action::Send(Command::AlertOn))
        );
        assert_eq!(
            action_for(key(KeyCode::Char('0'))),
            Some(Action::Send(Command::AlertOff))
        );
        assert_eq!(action_for(key(KeyCode::Char('e'))), Some(Action::Export));
        assert_eq!(action_for(key(KeyCode::Esc)), Some(Action::Quit));
        assert_eq!(
            action_for(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(action_for(key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_failed_setup_is_rolled_back() {
        let undone = std::cell::Cell::new(0);
        let undo = || {
            undone.set(undone.get() + 1);
            Ok(())
        };

        let failed: Result<(), anyhow::Error> = Err(anyhow::anyhow!("no tty"));
        let err = undo_on_error(failed, undo).unwrap_err();
        assert_eq!(err.to_string(), "no tty");
        assert_eq!(undone.get(), 1);

        assert_eq!(undo_on_error(Ok(3), undo).unwrap(), 3);
        assert_eq!(undone.get(), 1);
    }

    #[test]
    fn test_y_bounds() {
        assert_eq!(y_bounds(&[], &[]), [0.0, 1.0]);
        assert_eq!(y_bounds(&[(0.0, 20.0)], &[(0.0, 20.0)]), [19.0, 21.0]);
        assert_eq!(y_bounds(&[(0.0, 20.0)], &[(1.0, 60.0)]), [16.0, 64.0]);
    }
}
