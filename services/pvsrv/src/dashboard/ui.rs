//! Dashboard drawing
//!
//! Pure rendering of a [`MonitorView`]; no state is read from anywhere else.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

use super::resample::{self, Bucket, Intensity, LoadTier, ResampledSeries, NO_DATA_GLYPH};
use crate::core::snapshot::Snapshot;
use crate::core::status::{self, AlarmLevel, Severity};
use crate::runtime::shared::MonitorView;

/// Width of the Y-axis label gutter, including the separator
const Y_LABEL_WIDTH: u16 = 8;

/// Toggles driven by key presses
#[derive(Debug, Clone, Copy, Default)]
pub struct UiState {
    pub show_breakdown: bool,
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::Gray,
        Severity::Ok => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Critical => Color::Red,
    }
}

fn alarm_color(level: AlarmLevel) -> Color {
    match level {
        AlarmLevel::None => Color::Green,
        AlarmLevel::Warning => Color::Yellow,
        AlarmLevel::Critical => Color::Red,
    }
}

fn load_color(load: LoadTier) -> Color {
    match load {
        LoadTier::Low => Color::Green,
        LoadTier::Medium => Color::Yellow,
        LoadTier::High => Color::Red,
    }
}

fn panel(title: &str) -> Block<'_> {
    Block::default().borders(Borders::ALL).title(title)
}

fn label_value(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<10}", label), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
    ])
}

/// Draw the whole dashboard
pub fn draw(f: &mut Frame, view: &MonitorView, ui: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Length(6),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(f.area());

    draw_header(f, chunks[0], view);
    draw_metrics(f, chunks[1], &view.snapshot);
    draw_status(f, chunks[2], &view.snapshot);
    if ui.show_breakdown {
        draw_alarm_breakdown(f, chunks[3], &view.snapshot);
    } else {
        draw_chart(f, chunks[3], view);
    }
    draw_last_error(f, chunks[4], view.last_error.as_deref());
    draw_footer(f, chunks[5], view);
}

fn draw_header(f: &mut Frame, area: Rect, view: &MonitorView) {
    let (marker, color) = if view.link.up {
        ("●", Color::Green)
    } else {
        ("○", Color::Red)
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} {}", marker, view.link.message),
            Style::default().fg(color),
        ),
        Span::raw(format!("  │  Last reading: {}", view.snapshot.timestamp_label())),
    ]);
    let header = Paragraph::new(line).block(panel(" PV Inverter Monitor "));
    f.render_widget(header, area);
}

fn draw_metrics(f: &mut Frame, area: Rect, snap: &Snapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(28),
            Constraint::Percentage(26),
            Constraint::Percentage(20),
            Constraint::Percentage(26),
        ])
        .split(area);

    let device = vec![
        label_value("Model", snap.model.clone()),
        label_value("SN", snap.sn.clone()),
        label_value("Firmware", snap.firmware_version.clone()),
        label_value("State", snap.device_status_label.clone()),
        label_value("Temp", format!("{:.1} °C", snap.internal_temperature)),
    ];
    f.render_widget(Paragraph::new(device).block(panel(" Device ")), cols[0]);

    let power = vec![
        Line::from(vec![
            Span::styled(
                format!("{:<10}", "Active"),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                format!("{:.0} W", snap.active_power),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        label_value("Input", format!("{:.0} W", snap.input_power)),
        label_value("Source", snap.power.source.as_str().to_string()),
        label_value("Effic.", format!("{:.2} %", snap.efficiency)),
        label_value("Freq", format!("{:.2} Hz", snap.grid_frequency)),
    ];
    f.render_widget(Paragraph::new(power).block(panel(" Power ")), cols[1]);

    let energy = vec![
        label_value("Today", format!("{:.2} kWh", snap.daily_energy)),
        label_value("Total", format!("{:.2} kWh", snap.accumulated_energy)),
    ];
    f.render_widget(Paragraph::new(energy).block(panel(" Energy ")), cols[2]);

    let grid: Vec<Line> = ["A", "B", "C"]
        .iter()
        .enumerate()
        .map(|(i, phase)| {
            label_value(
                &format!("Phase {}", phase),
                format!(
                    "{:.1} V  {:.3} A",
                    snap.phase_voltages[i], snap.phase_currents[i]
                ),
            )
        })
        .collect();
    f.render_widget(Paragraph::new(grid).block(panel(" Grid ")), cols[3]);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &Snapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let strings: Vec<Line> = snap
        .pv_strings
        .iter()
        .enumerate()
        .map(|(i, pv)| {
            label_value(
                &format!("PV{}", i + 1),
                format!(
                    "{:.1} V  {:.2} A  {:.0} W",
                    pv.voltage,
                    pv.current,
                    pv.power()
                ),
            )
        })
        .collect();
    f.render_widget(Paragraph::new(strings).block(panel(" PV Strings ")), cols[0]);

    let line = snap.status_line();
    let alarms = snap.alarm_summary();
    let fault = status::fault_category(snap.fault_code);
    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{:<10}", "Status"), Style::default().fg(Color::DarkGray)),
            Span::styled(
                line.to_string(),
                Style::default()
                    .fg(severity_color(line.severity()))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled(format!("{:<10}", "Alarms"), Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!(
                    "{} ({} critical, {} active)",
                    alarms.level.as_str().to_uppercase(),
                    alarms.critical_count,
                    alarms.notable_count
                ),
                Style::default().fg(alarm_color(alarms.level)),
            ),
        ]),
        label_value(
            "Words",
            format!(
                "S {:04X} {:04X} {:04X}  A {:04X} {:04X} {:04X}",
                snap.status_words[0],
                snap.status_words[1],
                snap.status_words[2],
                snap.alarm_words[0],
                snap.alarm_words[1],
                snap.alarm_words[2]
            ),
        ),
        label_value("Fault", format!("{} ({})", snap.fault_code, fault.label())),
    ];
    f.render_widget(Paragraph::new(lines).block(panel(" Status ")), cols[1]);
}

fn draw_alarm_breakdown(f: &mut Frame, area: Rect, snap: &Snapshot) {
    let entries = status::alarm_breakdown(&snap.alarm_words);
    let header = Row::new(["Word", "Bit", "Severity", "Name", "Description"])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .height(1);
    let rows: Vec<Row> = entries
        .iter()
        .map(|e| {
            Row::new([
                e.word.to_string(),
                e.bit.to_string(),
                e.severity.as_str().to_string(),
                e.name.to_string(),
                e.description.to_string(),
            ])
            .style(Style::default().fg(severity_color(e.severity)))
        })
        .collect();

    let widths = [
        Constraint::Length(5),
        Constraint::Length(4),
        Constraint::Length(9),
        Constraint::Length(24),
        Constraint::Min(20),
    ];
    let title = format!(" Active alarms ({}) [a] back to chart ", entries.len());
    let table = Table::new(rows, widths).header(header).block(panel(&title));
    f.render_widget(table, area);
}

/// Text rows of a column chart `height` cells tall
///
/// Each cell is filled by how much of its slice of the column the bucket
/// ratio covers, using the same bands as single-row intensity.
pub fn chart_rows(series: &ResampledSeries, height: usize) -> Vec<String> {
    (0..height)
        .map(|row| {
            let level = (height - 1 - row) as f64;
            series
                .buckets
                .iter()
                .map(|bucket| match bucket {
                    Bucket::NoData if row == height - 1 => NO_DATA_GLYPH,
                    Bucket::NoData => ' ',
                    Bucket::Sample { ratio, .. } => {
                        let fill = (ratio * height as f64 - level).clamp(0.0, 1.0);
                        Intensity::from_ratio(fill).glyph()
                    },
                })
                .collect()
        })
        .collect()
}

fn y_label(value: f64) -> String {
    if value >= 1000.0 {
        format!("{:>5.1}k", value / 1000.0)
    } else {
        format!("{:>5.0}W", value)
    }
}

fn draw_chart(f: &mut Frame, area: Rect, view: &MonitorView) {
    let block = panel(" Active power history ");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height < 2 || inner.width <= Y_LABEL_WIDTH {
        return;
    }

    let width = usize::from(inner.width - Y_LABEL_WIDTH);
    let height = usize::from(inner.height - 1);
    let series = resample::resample(&view.history, width);
    let color = Style::default().fg(load_color(series.load));

    let mut lines: Vec<Line> = chart_rows(&series, height)
        .into_iter()
        .enumerate()
        .map(|(row, cells)| {
            let label = if row == 0 {
                y_label(series.scale_max)
            } else if row == height / 2 && height > 2 {
                y_label(series.scale_max / 2.0)
            } else if row == height - 1 {
                y_label(0.0)
            } else {
                String::new()
            };
            Line::from(vec![
                Span::styled(
                    format!("{:>6} │", label),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(cells, color),
            ])
        })
        .collect();

    let first = series.buckets.first().and_then(Bucket::timestamp);
    let last = series.buckets.last().and_then(Bucket::timestamp);
    let axis = match (first, last) {
        (Some(first), Some(last)) => {
            let left = first.format("%H:%M:%S").to_string();
            let right = last.format("%H:%M:%S").to_string();
            let gap = width.saturating_sub(left.len() + right.len()).max(1);
            format!("{}{}{}", left, " ".repeat(gap), right)
        },
        _ => format!("waiting for data ({} samples)", series.sample_count),
    };
    lines.push(Line::from(vec![
        Span::raw(" ".repeat(usize::from(Y_LABEL_WIDTH))),
        Span::styled(axis, Style::default().fg(Color::DarkGray)),
    ]));

    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_last_error(f: &mut Frame, area: Rect, error: Option<&str>) {
    let (text, style) = match error {
        Some(e) => (e.to_string(), Style::default().fg(Color::Red)),
        None => ("none".to_string(), Style::default().fg(Color::DarkGray)),
    };
    let widget = Paragraph::new(text)
        .style(style)
        .wrap(Wrap { trim: true })
        .block(panel(" Last error "));
    f.render_widget(widget, area);
}

fn draw_footer(f: &mut Frame, area: Rect, view: &MonitorView) {
    let text = format!(
        " Polls ok: {}  failed: {}  connects: {}  history: {}  │  [q]uit [r]efresh [a]larms",
        view.stats.successful_polls,
        view.stats.failed_polls,
        view.stats.connect_attempts,
        view.history.len()
    );
    f.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(Color::Cyan))
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::runtime::history::HistorySample;
    use crate::runtime::shared::SharedState;
    use chrono::Local;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(view: &MonitorView, ui: UiState, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, view, &ui)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn sample(value: f64) -> HistorySample {
        HistorySample {
            timestamp: Local::now(),
            value,
        }
    }

    #[test]
    fn test_chart_rows_fill_from_bottom() {
        let series = resample::resample(&[sample(0.0), sample(500.0), sample(1000.0)], 3);
        let rows = chart_rows(&series, 2);
        // Half-height column fills the bottom cell only
        assert_eq!(rows, vec!["  █".to_string(), " ██".to_string()]);
    }

    #[test]
    fn test_chart_rows_mark_missing_data_on_baseline() {
        let series = resample::resample(&[], 4);
        let rows = chart_rows(&series, 3);
        assert_eq!(rows[0], "    ");
        assert_eq!(rows[2], "····");
    }

    #[test]
    fn test_placeholder_view_renders() {
        let view = SharedState::new().view();
        let screen = render(&view, UiState::default(), 120, 40);
        assert!(screen.contains("PV Inverter Monitor"));
        assert!(screen.contains("Starting..."));
        assert!(screen.contains("N/A"));
        assert!(screen.contains("waiting for data"));
    }

    #[test]
    fn test_breakdown_lists_active_alarms() {
        let state = SharedState::new();
        state.publish(Snapshot {
            timestamp: Some(Local::now()),
            alarm_words: [0x0001, 0, 0],
            ..Default::default()
        });
        let view = state.view();

        let screen = render(&view, UiState { show_breakdown: true }, 140, 40);
        assert!(screen.contains("Active alarms (1)"));
        assert!(screen.contains("CRITICAL"));
    }

    #[test]
    fn test_small_terminal_does_not_panic() {
        let state = SharedState::new();
        state.publish(Snapshot {
            timestamp: Some(Local::now()),
            active_power: 2000.0,
            ..Default::default()
        });
        render(&state.view(), UiState::default(), 20, 10);
    }
}
