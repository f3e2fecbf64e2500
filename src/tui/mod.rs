// src/tui/mod.rs
use crate::core::engine::InstrumentHandle;
use crate::types::{EngineStatus, InstrumentView, Metric, TrendClass};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
    Terminal,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::{io, time::Duration};

pub struct App {
    pub instruments: Vec<InstrumentHandle>,
    pub focused: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(instruments: Vec<InstrumentHandle>) -> Self {
        Self {
            instruments,
            focused: 0,
            should_quit: false,
        }
    }

    pub fn on_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab if !self.instruments.is_empty() => {
                self.focused = (self.focused + 1) % self.instruments.len();
            }
            KeyCode::Right => self.with_focused(|h| h.cycle_interval(1)),
            KeyCode::Left => self.with_focused(|h| h.cycle_interval(-1)),
            KeyCode::Char('r') => self.with_focused(|h| h.request_refresh()),
            _ => {}
        }
    }

    fn with_focused(&self, f: impl FnOnce(&InstrumentHandle)) {
        if let Some(handle) = self.instruments.get(self.focused) {
            f(handle);
        }
    }
}

pub async fn run(instruments: Vec<InstrumentHandle>) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(instruments);

    while !app.should_quit {
        let views: Vec<InstrumentView> = app.instruments.iter().map(|h| h.view()).collect();
        terminal.draw(|f| ui(f, &views, app.focused))?;

        // crossterm polling blocks, keep it off the runtime workers
        let key = tokio::task::block_in_place(|| -> io::Result<Option<KeyCode>> {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    return Ok(Some(key.code));
                }
            }
            Ok(None)
        })?;
        if let Some(code) = key {
            app.on_key(code);
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

fn trend_color(class: TrendClass) -> Color {
    match class {
        TrendClass::Up => Color::Green,
        TrendClass::Down => Color::Red,
        TrendClass::Neutral => Color::Gray,
    }
}

/// Statistic lines for one instrument, arrow after the value.
pub fn statistic_lines(view: &InstrumentView) -> Vec<Line<'static>> {
    let Some(stats) = view.daily_statistics else {
        return vec![Line::from("Waiting for data...")];
    };
    Metric::ALL
        .iter()
        .map(|&metric| {
            let class = view.trends.get(metric);
            Line::from(vec![
                Span::raw(format!("{:<9}", metric.label())),
                Span::styled(
                    format!("{} {}", stats.get(metric), class.arrow()),
                    Style::default()
                        .fg(trend_color(class))
                        .add_modifier(Modifier::BOLD),
                ),
            ])
        })
        .collect()
}

/// Sparkline wants unsigned bars, so prices are shifted to the window
/// minimum and scaled to hundredths.
pub fn sparkline_points(prices: &[Decimal]) -> Vec<u64> {
    let Some(min) = prices.iter().min().copied() else {
        return Vec::new();
    };
    prices
        .iter()
        .map(|p| ((*p - min) * Decimal::ONE_HUNDRED).to_u64().unwrap_or(0))
        .collect()
}

fn ui(f: &mut ratatui::Frame, views: &[InstrumentView], focused: usize) {
    let mut constraints: Vec<Constraint> = views
        .iter()
        .map(|_| Constraint::Ratio(1, views.len().max(1) as u32))
        .collect();
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(f.size());

    for (idx, view) in views.iter().enumerate() {
        render_instrument(f, chunks[idx], view, idx == focused);
    }

    let help = Paragraph::new(Line::from(Span::styled(
        "Tab: switch  ←/→: interval  r: refresh  q: quit",
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(help, chunks[views.len()]);
}

fn render_instrument(f: &mut ratatui::Frame, area: Rect, view: &InstrumentView, focused: bool) {
    let interval = view
        .selected_interval
        .as_ref()
        .map(|i| i.to_string())
        .unwrap_or_default();
    let status = match view.status {
        EngineStatus::Uninitialized => "connecting",
        EngineStatus::Ready => "live",
    };
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!("{} [{}] {}", view.name, interval, status));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(10)].as_ref())
        .split(inner);

    f.render_widget(Paragraph::new(statistic_lines(view)), columns[0]);

    let prices: Vec<Decimal> = view.data.iter().map(|p| p.price).collect();
    let points = sparkline_points(&prices);
    let chart = Sparkline::default()
        .data(&points)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(chart, columns[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DailyStatistics, Interval, MetricTrends, Trigger};
    use std::str::FromStr;
    use std::sync::Arc;
    use tokio::sync::{mpsc, watch};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn sparkline_is_relative_to_window_minimum() {
        assert!(sparkline_points(&[]).is_empty());
        assert_eq!(
            sparkline_points(&[d("32.10"), d("32.00"), d("32.255")]),
            vec![10, 0, 25]
        );
    }

    #[test]
    fn statistic_lines_carry_arrows() {
        let mut view = InstrumentView::default();
        assert_eq!(statistic_lines(&view).len(), 1);

        view.daily_statistics = Some(DailyStatistics {
            high_24h: d("105"),
            low_24h: d("90"),
            latest_price: d("95"),
        });
        view.trends = MetricTrends {
            high: TrendClass::Up,
            ..Default::default()
        };
        let lines = statistic_lines(&view);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].spans[1].content, "105 ▲");
        assert_eq!(lines[1].spans[1].content, "90 ");
    }

    #[test]
    fn keys_route_to_focused_instrument() {
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let (_view_a, view_rx_a) = watch::channel(InstrumentView::default());
        let (_view_b, view_rx_b) = watch::channel(InstrumentView::default());
        let interval_a = Arc::new(watch::channel(Interval::from("15m")).0);
        let interval_b = Arc::new(watch::channel(Interval::from("15m")).0);
        let intervals = vec![Interval::from("15m"), Interval::from("1h")];

        let mut app = App::new(vec![
            InstrumentHandle::new("a", intervals.clone(), tx_a, interval_a.clone(), view_rx_a),
            InstrumentHandle::new("b", intervals, tx_b, interval_b.clone(), view_rx_b),
        ]);

        app.on_key(KeyCode::Char('r'));
        app.on_key(KeyCode::Tab);
        app.on_key(KeyCode::Right);
        app.on_key(KeyCode::Char('q'));

        assert_eq!(rx_a.try_recv().ok(), Some(Trigger::Poll));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
        assert_eq!(*interval_a.borrow(), Interval::from("15m"));
        assert_eq!(*interval_b.borrow(), Interval::from("1h"));
        assert!(app.should_quit);
    }
}
