use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::render::{Frame, ItemView, Presenter, StatsView, Theme};
use crate::task::Priority;

/// Writes frames as an aligned table, or as JSON.
#[derive(Debug)]
pub struct TerminalPresenter<W> {
    out: W,
    color: bool,
    json: bool,
}

impl TerminalPresenter<io::Stdout> {
    pub fn stdout(cfg: &Config, json: bool) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true) && io::stdout().is_terminal();
        Ok(Self::new(io::stdout(), color, json))
    }
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, color: bool, json: bool) -> Self {
        Self { out, color, json }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_stats(&mut self, stats: &StatsView) -> io::Result<()> {
        if self.json {
            let raw = serde_json::to_string_pretty(stats).map_err(io::Error::other)?;
            return writeln!(self.out, "{raw}");
        }
        writeln!(self.out, "{}", stats.lines().join(" | "))
    }

    pub fn print_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    fn priority_code(theme: Theme, priority: Priority) -> &'static str {
        match (theme, priority) {
            (Theme::Light, Priority::High) => "31",
            (Theme::Light, Priority::Medium) => "33",
            (Theme::Light, Priority::Low) => "32",
            (Theme::Dark, Priority::High) => "91",
            (Theme::Dark, Priority::Medium) => "93",
            (Theme::Dark, Priority::Low) => "92",
        }
    }

    fn row(&self, item: &ItemView, theme: Theme) -> Vec<String> {
        let mark = if item.completed { "[x]" } else { "[ ]" };
        let text = if item.completed {
            self.paint(&item.text, "2;9")
        } else {
            item.text.clone()
        };
        let due = match &item.due_label {
            Some(label) if item.overdue => self.paint(label, "31"),
            Some(label) => label.clone(),
            None => String::new(),
        };

        vec![
            self.paint(&item.id.to_string(), "33"),
            mark.to_string(),
            text,
            format!("({})", item.category_label),
            self.paint(&item.priority_label, Self::priority_code(theme, item.priority)),
            due,
        ]
    }

    fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        if self.json {
            let raw = serde_json::to_string_pretty(frame).map_err(io::Error::other)?;
            return writeln!(self.out, "{raw}");
        }

        let title = match frame.theme {
            Theme::Dark => self.paint(&frame.chrome.title, "1;7"),
            Theme::Light => self.paint(&frame.chrome.title, "1"),
        };
        writeln!(self.out, "{title}")?;

        let rows: Vec<Vec<String>> = frame
            .items
            .iter()
            .map(|item| self.row(item, frame.theme))
            .collect();
        write_rows(&mut self.out, rows)?;

        writeln!(self.out)?;
        writeln!(self.out, "{}", frame.stats.lines().join(" | "))
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present(&mut self, frame: &Frame) -> io::Result<()> {
        self.write_frame(frame)?;
        self.out.flush()
    }
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
}

/// Left-aligns every column to its widest cell, measuring what the
/// terminal shows rather than bytes.
fn write_rows<W: Write>(mut writer: W, rows: Vec<Vec<String>>) -> io::Result<()> {
    let mut widths: Vec<usize> = Vec::new();
    for row in &rows {
        if widths.len() < row.len() {
            widths.resize(row.len(), 0);
        }
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    for row in &rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let pad = width.saturating_sub(visible_width(cell));
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

/// Drops SGR sequences (`ESC [ ... m`).
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            chars.by_ref().find(|c| *c == 'm');
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{TerminalPresenter, strip_ansi};
    use crate::filter::ViewFilter;
    use crate::i18n::{Catalog, Localizer};
    use crate::render::{Presenter, RenderContext, Theme, render};
    use crate::store::TaskStore;
    use crate::task::{Category, Priority};

    #[test]
    fn table_aligns_wide_characters() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
            .single()
            .expect("valid now");
        let mut store = TaskStore::new();
        store
            .create("Süt al", Category::Shopping, Priority::Low, None, now)
            .expect("create");
        let id = store
            .create("Rapor", Category::Work, Priority::High, NaiveDate::from_ymd_opt(2026, 11, 2), now)
            .expect("create")
            .id;
        store.toggle_complete(id).expect("toggle");

        let localizer = Localizer::new(Catalog::builtin(), Some("tr"));
        let visible: Vec<_> = store.iter().collect();
        let frame = render(
            &store,
            &visible,
            &ViewFilter::default(),
            RenderContext {
                localizer: &localizer,
                theme: Theme::Light,
                today: NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"),
            },
        );

        let mut presenter = TerminalPresenter::new(Vec::new(), false, false);
        presenter.present(&frame).expect("present");
        let text = String::from_utf8(presenter.into_inner()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Gelişmiş To-Do List");
        assert!(lines[1].contains("[ ] Süt al (Alışveriş)"));
        assert!(lines[2].contains("[x] Rapor"));
        assert!(lines[2].ends_with("Tarih: 02.11.2026"));
        assert_eq!(lines[1].find("[ ]"), lines[2].find("[x]"));
        assert_eq!(lines.last().copied(), Some("Toplam Görev: 2 | Tamamlanan: 1 | Bekleyen: 1"));
    }

    #[test]
    fn strip_ansi_removes_escape_codes() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
