//! Script replay: dispatch a JSON array of engine commands headlessly.
//!
//! Usage: cellgrid replay script.json [--yes] [--print A1:C10]
//!
//! Each command goes through the confirmation flow, so a destructive merge
//! is asked about on stdin (or accepted outright with `--yes`) and then
//! re-dispatched with `force`. Rejections are reported on stderr and the
//! replay carries on with the next command.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use cellgrid_config::Settings;
use cellgrid_core::Zone;
use cellgrid_engine::{Command, Model, Notification, NotificationKind};

use crate::exit_codes::{EXIT_REJECTED, EXIT_SUCCESS};
use crate::CliError;

/// Outcome of a replay, before anything is printed.
#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub dispatched: usize,
    pub rejected: usize,
}

/// Parse a script: a JSON array of command objects.
///
/// Malformed elements are kept as errors so the replay can report them in
/// sequence with the commands that did parse.
pub fn parse_script(text: &str) -> Result<Vec<Result<Command, String>>, CliError> {
    let items: Vec<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| CliError::args(format!("script is not a JSON array of commands: {}", e)))?;
    Ok(items.into_iter().map(|item| serde_json::from_value(item).map_err(|e| e.to_string())).collect())
}

fn notification_line(n: &Notification) -> String {
    let kind = match n.kind {
        NotificationKind::Info => "info",
        NotificationKind::Warning => "warning",
        NotificationKind::Error => "error",
    };
    format!("[{}] {}", kind, n.text)
}

fn ask(question: &str) -> bool {
    eprint!("{} [y/N] ", question);
    let _ = io::stderr().flush();
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
    }
}

/// Dispatch every command of `script` into `model`.
pub fn replay(model: &mut Model, script: Vec<Result<Command, String>>) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for (index, item) in script.into_iter().enumerate() {
        summary.dispatched += 1;
        let cmd = match item {
            Ok(cmd) => cmd,
            Err(message) => {
                eprintln!("command {}: invalid payload: {}", index + 1, message);
                summary.rejected += 1;
                continue;
            }
        };
        let name = cmd.name();
        if let Err(cancelled) = model.dispatch_with_confirmation(cmd) {
            log::debug!("command {} ({}) rejected with {:?}", index + 1, name, cancelled.reasons);
            eprintln!("command {} ({}): {}", index + 1, name, cancelled);
            summary.rejected += 1;
        }
    }
    summary
}

/// Evaluated grid of `zone` on the active sheet as TSV, clamped to the sheet.
pub fn render_zone(model: &Model, zone: Zone) -> String {
    let getters = model.getters();
    let sheet = getters.active_sheet();
    let Some(zone) = getters.sheet_size(sheet).and_then(|(rows, cols)| zone.clamp_to(rows, cols)) else {
        return String::new();
    };
    let mut out = String::new();
    for row in zone.top..=zone.bottom {
        let line: Vec<String> = (zone.left..=zone.right)
            .map(|col| getters.formatted_value(sheet, cellgrid_core::Position::new(row, col)))
            .collect();
        out.push_str(&line.join("\t"));
        out.push('\n');
    }
    out
}

pub struct ReplayOptions<'a> {
    pub script: &'a Path,
    pub yes: bool,
    pub print: Option<Zone>,
    pub settings: Settings,
}

pub fn run(options: ReplayOptions<'_>) -> Result<u8, CliError> {
    let text = std::fs::read_to_string(options.script)
        .map_err(|e| CliError::io(format!("{}: {}", options.script.display(), e)))?;
    let script = parse_script(&text)?;

    let mut model = Model::new(options.settings);
    let printed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&printed);
    model.set_notify(Box::new(move |n: &Notification| sink.borrow_mut().push(notification_line(n))));
    if options.yes {
        model.set_confirm(Box::new(|_: &str| true));
    } else {
        model.set_confirm(Box::new(ask));
    }

    let summary = replay(&mut model, script);
    for line in printed.borrow().iter() {
        println!("{}", line);
    }
    if let Some(zone) = options.print {
        print!("{}", render_zone(&model, zone));
    }
    log::info!("replayed {} commands, {} rejected", summary.dispatched, summary.rejected);

    Ok(if summary.rejected == 0 { EXIT_SUCCESS } else { EXIT_REJECTED })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(text: &str) -> Vec<Result<Command, String>> {
        parse_script(text).unwrap()
    }

    #[test]
    fn test_parse_script_keeps_bad_elements() {
        let items = script(r#"[{"type":"EVALUATE_ALL"},{"type":"NOPE"},{"type":"SELECT_CELL","sheet_id":1,"position":"B2"}]"#);
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
        assert!(items[2].is_ok());
        assert!(parse_script("{}").is_err());
    }

    #[test]
    fn test_replay_counts_rejections_and_continues() {
        let mut model = Model::default();
        let items = script(
            r#"[
                {"type":"UPDATE_CELL","sheet_id":1,"position":"A1","content":"2"},
                {"type":"DELETE_SHEET","sheet_id":1},
                {"type":"UPDATE_CELL","sheet_id":1,"position":"B1","content":"=A1*21"}
            ]"#,
        );
        let summary = replay(&mut model, items);
        assert_eq!((summary.dispatched, summary.rejected), (3, 1));
        assert_eq!(render_zone(&model, Zone::parse("A1:B1").unwrap()), "2\t42\n");
    }

    #[test]
    fn test_render_zone_clamps_to_sheet() {
        let model = Model::default();
        let out = render_zone(&model, Zone::parse("Z99:AD120").unwrap());
        assert_eq!(out.lines().count(), 2);
        assert_eq!(out.lines().next(), Some(""));
    }
}
