//! Line-oriented terminal picker and notifier

use riskwise_core::suggest::{PresentedOption, Selection, SelectionMode};
use riskwise_core::{FieldType, Notifier, SuggestionView, ToastLevel};
use std::io::{self, BufRead, Write};
use unicode_width::UnicodeWidthStr;

const MAX_LABEL_WIDTH: usize = 48;

/// Renders options on stderr and reads the pick from a line of input
pub struct TerminalView<R> {
    input: R,
}

impl TerminalView<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl<R: BufRead> TerminalView<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

impl<R: BufRead> SuggestionView for TerminalView<R> {
    fn choose(
        &mut self,
        field: FieldType,
        options: &[PresentedOption],
        mode: SelectionMode,
    ) -> Selection {
        eprintln!();
        eprintln!("  Suggestions for {}", field.label());
        for line in render_options(options) {
            eprintln!("{}", line);
        }
        eprintln!();
        match mode {
            SelectionMode::Single => eprint!("  Pick a number (Enter = recommended, q = cancel): "),
            SelectionMode::Multi => {
                eprint!("  Pick numbers, comma separated (Enter = recommended, q = cancel): ")
            }
        }
        let _ = io::stderr().flush();

        match self.read_line() {
            Some(line) => parse_choice(&line, options, mode),
            None => Selection::Dismissed,
        }
    }

    fn show_empty(&mut self, _field: FieldType, message: &str) {
        eprintln!();
        eprintln!("  {}", message);
    }
}

/// One line per option, labels padded to a common display width
pub fn render_options(options: &[PresentedOption]) -> Vec<String> {
    let labels: Vec<String> = options
        .iter()
        .map(|o| truncate_to_width(&o.label, MAX_LABEL_WIDTH))
        .collect();
    let width = labels.iter().map(|l| l.width()).max().unwrap_or(0);

    options
        .iter()
        .zip(labels)
        .map(|(option, label)| {
            let marker = if option.recommended { "*" } else { " " };
            let pad = " ".repeat(width.saturating_sub(label.width()));
            match &option.detail {
                Some(detail) => format!(
                    "  {} {}) {}{}  {}",
                    marker,
                    option.index + 1,
                    label,
                    pad,
                    detail
                ),
                None => format!("  {} {}) {}", marker, option.index + 1, label),
            }
        })
        .collect()
}

fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for ch in s.chars() {
        if (out.as_str().width() + ch.to_string().as_str().width()) >= max {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}

/// Turn typed input into a selection. Numbers are 1-based.
pub fn parse_choice(input: &str, options: &[PresentedOption], mode: SelectionMode) -> Selection {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") {
        return Selection::Dismissed;
    }
    if input.is_empty() {
        return match options.iter().find(|o| o.recommended) {
            Some(o) if mode == SelectionMode::Multi => Selection::Multi(vec![o.index]),
            Some(o) => Selection::Single(o.index),
            None => Selection::Dismissed,
        };
    }

    let picks: Vec<usize> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<usize>().ok())
        .filter(|n| (1..=options.len()).contains(n))
        .map(|n| n - 1)
        .collect();

    match (mode, picks.first()) {
        (_, None) => Selection::Dismissed,
        (SelectionMode::Single, Some(first)) => Selection::Single(*first),
        (SelectionMode::Multi, Some(_)) => Selection::Multi(picks),
    }
}

/// Toasts and field acknowledgments on stderr
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn acknowledge(&self, field_id: &str) {
        eprintln!("  + {} updated", field_id);
    }

    fn toast(&self, message: &str, level: ToastLevel) {
        let prefix = match level {
            ToastLevel::Info => " ",
            ToastLevel::Success => "+",
            ToastLevel::Warning => "!",
            ToastLevel::Error => "x",
        };
        eprintln!("  {} {}", prefix, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(index: usize, label: &str, recommended: bool) -> PresentedOption {
        PresentedOption {
            index,
            label: label.to_string(),
            detail: None,
            recommended,
        }
    }

    fn options() -> Vec<PresentedOption> {
        vec![
            option(0, "Data Breach", false),
            option(1, "Ransomware Attack", true),
            option(2, "Vendor Failure", false),
        ]
    }

    #[test]
    fn test_enter_takes_recommended() {
        assert_eq!(
            parse_choice("\n", &options(), SelectionMode::Single),
            Selection::Single(1)
        );
        assert_eq!(
            parse_choice("", &options(), SelectionMode::Multi),
            Selection::Multi(vec![1])
        );
    }

    #[test]
    fn test_numbers_are_one_based() {
        assert_eq!(
            parse_choice("3", &options(), SelectionMode::Single),
            Selection::Single(2)
        );
        assert_eq!(
            parse_choice("1, 3", &options(), SelectionMode::Multi),
            Selection::Multi(vec![0, 2])
        );
    }

    #[test]
    fn test_cancel_and_garbage_dismiss() {
        assert_eq!(
            parse_choice("q", &options(), SelectionMode::Single),
            Selection::Dismissed
        );
        assert_eq!(
            parse_choice("9", &options(), SelectionMode::Single),
            Selection::Dismissed
        );
        assert_eq!(
            parse_choice("abc", &options(), SelectionMode::Multi),
            Selection::Dismissed
        );
    }

    #[test]
    fn test_render_aligns_details() {
        let mut opts = options();
        opts[0].detail = Some("customer data".to_string());
        opts[1].detail = Some("encryption".to_string());
        let lines = render_options(&opts);
        assert_eq!(lines.len(), 3);
        let col = |line: &str, needle: &str| line.find(needle).unwrap();
        assert_eq!(col(&lines[0], "customer"), col(&lines[1], "encryption"));
        assert!(lines[1].starts_with("  * 2)"));
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let long = "x".repeat(80);
        let truncated = truncate_to_width(&long, MAX_LABEL_WIDTH);
        assert!(truncated.width() <= MAX_LABEL_WIDTH);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn test_view_reads_from_input() {
        let mut view = TerminalView::new("2\n".as_bytes());
        let picked = view.choose(FieldType::Title, &options(), SelectionMode::Single);
        assert_eq!(picked, Selection::Single(1));

        let mut closed = TerminalView::new("".as_bytes());
        assert_eq!(
            closed.choose(FieldType::Title, &options(), SelectionMode::Single),
            Selection::Dismissed
        );
    }
}
