mod common;

use std::cell::RefCell;
use std::rc::Rc;

use cellgrid_core::{Position, SheetId, Zone};
use cellgrid_engine::plugins::find_replace::SearchOptions;
use cellgrid_engine::plugins::sheet::MAX_COLS;
use cellgrid_engine::{CancelledReason, Command, EffectCollector};
use common::*;

fn seeded() -> cellgrid_engine::Model {
    let mut m = model();
    set(&mut m, "A1", "1").unwrap();
    set(&mut m, "A2", "=A1+1").unwrap();
    set(&mut m, "B1", "text").unwrap();
    m
}

#[test]
fn test_rejected_command_changes_nothing() {
    let mut m = seeded();
    let before = observable(&m);
    let revision = m.revision();
    let cases = vec![
        (Command::DeleteSheet { sheet_id: S1 }, CancelledReason::NotEnoughSheets),
        (Command::UpdateCell { sheet_id: S1, position: pos("AA1"), content: "x".into() }, CancelledReason::TargetOutOfSheet),
        (Command::InsertRows { sheet_id: S1, start: 0, count: 0 }, CancelledReason::InvalidCount),
        (Command::Paste { sheet_id: S1, target: pos("C1"), values_only: false }, CancelledReason::EmptyClipboard),
        (Command::RenameSheet { sheet_id: SheetId::from_raw(9), name: "x".into() }, CancelledReason::InvalidSheetId),
    ];
    for (cmd, reason) in cases {
        let err = m.dispatch(cmd).unwrap_err();
        assert!(err.reasons.contains(&reason), "{:?} not in {:?}", reason, err.reasons);
        assert_eq!(observable(&m), before);
    }
    assert_eq!(m.revision(), revision);
}

#[test]
fn test_reasons_from_every_plugin_are_aggregated() {
    let mut m = seeded();
    set(&mut m, "D1", "x").unwrap();
    // Out of the sheet and destructive at once
    let err = m.dispatch(Command::AddMerge { sheet_id: S1, zone: zone("C1:AA2"), force: false }).unwrap_err();
    assert_eq!(err.reasons, vec![CancelledReason::TargetOutOfSheet, CancelledReason::MergeIsDestructive]);
    assert!(!err.is_confirmable());
}

#[test]
fn test_batch_rolls_back_when_a_later_element_fails() {
    let mut m = seeded();
    let collector = Rc::new(RefCell::new(EffectCollector::new()));
    m.set_notify(EffectCollector::sink(&collector));
    let before = snapshot(&m);

    let batch = Command::Batch {
        commands: vec![
            Command::UpdateCell { sheet_id: S1, position: pos("A1"), content: "100".into() },
            Command::InsertRows { sheet_id: S1, start: 0, count: 3 },
            Command::TrimWhitespace { sheet_id: S1, zones: vec![zone("A1:C10")] },
            Command::DeleteSheet { sheet_id: SheetId::from_raw(42) },
        ],
    };
    let err = m.dispatch(batch).unwrap_err();
    assert!(err.reasons.contains(&CancelledReason::InvalidSheetId));
    assert_eq!(snapshot(&m), before);
    assert_eq!(value(&m, "A2"), cellgrid_engine::Value::Number(2.0));
    // Notifications of a rolled back transaction are never delivered
    assert!(collector.borrow().is_empty());
    assert_eq!(m.history().undo_label(), Some("UPDATE_CELL"));
}

#[test]
fn test_batch_commits_as_one_history_entry() {
    let mut m = seeded();
    let before = snapshot(&m);
    m.dispatch(Command::Batch {
        commands: vec![
            Command::UpdateCell { sheet_id: S1, position: pos("A1"), content: "5".into() },
            Command::UpdateCell { sheet_id: S1, position: pos("C1"), content: "=A2*2".into() },
        ],
    })
    .unwrap();
    assert_eq!(value(&m, "C1"), cellgrid_engine::Value::Number(12.0));
    m.undo().unwrap();
    assert_eq!(snapshot(&m), before);
}

#[test]
fn test_paste_that_does_not_fit_is_rejected() {
    let mut m = seeded();
    m.dispatch(Command::Copy { sheet_id: S1, zone: zone("A1:B2") }).unwrap();
    let before = snapshot(&m);
    // The anchor fits but the copied block does not
    let err = m.dispatch(Command::Paste { sheet_id: S1, target: pos("Z100"), values_only: false }).unwrap_err();
    assert_eq!(err.reasons, vec![CancelledReason::TargetOutOfSheet]);
    assert_eq!(snapshot(&m), before);
}

/// A workbook with every kind of transient state set.
fn busy() -> cellgrid_engine::Model {
    let mut m = seeded();
    let s2 = SheetId::from_raw(2);
    m.dispatch(Command::CreateSheet { sheet_id: s2, name: "Other".into(), position: None, rows: None, cols: None })
        .unwrap();
    m.dispatch(Command::SelectCell { sheet_id: S1, position: pos("B2") }).unwrap();
    m.dispatch(Command::Copy { sheet_id: S1, zone: zone("A1:A2") }).unwrap();
    m.dispatch(Command::UpdateSearch { query: "text".into(), options: SearchOptions::default() }).unwrap();
    m.dispatch(Command::EnableSelectionInput { id: INPUT.into(), ranges: vec!["A1:A2".into()], max_ranges: None })
        .unwrap();
    m.dispatch(Command::FocusSelectionInput { id: INPUT.into(), index: 0 }).unwrap();
    m.dispatch(Command::SetViewport { sheet_id: S1, zone: zone("A1:H20") }).unwrap();
    m
}

#[test]
fn test_rejected_batch_restores_transient_state() {
    let firsts = vec![
        Command::SelectCell { sheet_id: S1, position: pos("C3") },
        Command::MoveSelection { sheet_id: S1, d_row: 2, d_col: 1, extend: true },
        Command::StartEdition { text: Some("=1".into()) },
        Command::UpdateSearch { query: "1".into(), options: SearchOptions::default() },
        Command::ClearSearch,
        Command::Copy { sheet_id: S1, zone: zone("B1:B2") },
        Command::Cut { sheet_id: S1, zone: zone("A1") },
        Command::Paste { sheet_id: S1, target: pos("D1"), values_only: false },
        Command::ActivateSheet { sheet_id: SheetId::from_raw(2) },
        Command::CreateSheet { sheet_id: SheetId::from_raw(7), name: "New".into(), position: None, rows: None, cols: None },
        Command::SetViewport { sheet_id: S1, zone: zone("B2:C3") },
        Command::AddInputRange { id: INPUT.into() },
        Command::DisableSelectionInput { id: INPUT.into() },
        Command::AutoFill { sheet_id: S1, source: zone("A1:A2"), target: zone("A1:A4") },
        Command::Batch {
            commands: vec![
                Command::StartEdition { text: Some("queued".into()) },
                Command::StopEdition { cancel: false },
            ],
        },
    ];
    for first in firsts {
        let name = first.name();
        let mut m = busy();
        let before = observable(&m);
        let err = m
            .dispatch(Command::Batch { commands: vec![first, Command::DeleteSheet { sheet_id: SheetId::from_raw(42) }] })
            .unwrap_err();
        assert!(err.reasons.contains(&CancelledReason::InvalidSheetId), "{}: {:?}", name, err.reasons);
        assert_eq!(observable(&m), before, "rollback after {}", name);
    }
}

#[test]
fn test_extreme_payloads_are_rejected_not_panicking() {
    let mut m = busy();
    let before = observable(&m);
    let far = Zone::new(0, 0, usize::MAX, usize::MAX);
    let cases = vec![
        (Command::DeleteRows { sheet_id: S1, start: 5, count: usize::MAX }, CancelledReason::TargetOutOfSheet),
        (Command::DeleteCols { sheet_id: S1, start: usize::MAX, count: 1 }, CancelledReason::TargetOutOfSheet),
        (Command::SetRowsHidden { sheet_id: S1, start: 5, count: usize::MAX, hidden: true }, CancelledReason::TargetOutOfSheet),
        (Command::SetColsHidden { sheet_id: S1, start: usize::MAX, count: 2, hidden: false }, CancelledReason::TargetOutOfSheet),
        (Command::InsertRows { sheet_id: S1, start: 5, count: usize::MAX }, CancelledReason::InvalidCount),
        (Command::InsertCols { sheet_id: S1, start: 0, count: MAX_COLS }, CancelledReason::InvalidCount),
        (
            Command::CreateSheet { sheet_id: SheetId::from_raw(9), name: "Huge".into(), position: None, rows: Some(usize::MAX), cols: None },
            CancelledReason::InvalidCount,
        ),
        (Command::Paste { sheet_id: S1, target: Position::new(usize::MAX, 0), values_only: false }, CancelledReason::TargetOutOfSheet),
        (
            Command::Paste { sheet_id: S1, target: Position::new(usize::MAX, usize::MAX), values_only: true },
            CancelledReason::TargetOutOfSheet,
        ),
        (Command::AutoFill { sheet_id: S1, source: zone("A1:A2"), target: Zone::new(0, 0, usize::MAX, 0) }, CancelledReason::TargetOutOfSheet),
        (
            Command::AutoFill { sheet_id: S1, source: Zone::new(usize::MAX, 0, usize::MAX, 0), target: zone("A1") },
            CancelledReason::TargetOutOfSheet,
        ),
        (Command::AddMerge { sheet_id: S1, zone: far, force: true }, CancelledReason::TargetOutOfSheet),
        (Command::SetViewport { sheet_id: S1, zone: far }, CancelledReason::TargetOutOfSheet),
        (Command::MoveSheet { sheet_id: S1, delta: i64::MAX }, CancelledReason::WrongSheetPosition),
        (Command::MoveSheet { sheet_id: S1, delta: i64::MIN }, CancelledReason::WrongSheetPosition),
    ];
    for (cmd, reason) in cases {
        let name = cmd.name();
        let err = m.dispatch(cmd).unwrap_err();
        assert!(err.reasons.contains(&reason), "{}: {:?} not in {:?}", name, reason, err.reasons);
        assert_eq!(observable(&m), before, "{}", name);
    }

    let err = m
        .dispatch_json(r#"{"type":"DELETE_ROWS","sheet_id":1,"start":5,"count":18446744073709551615}"#)
        .unwrap_err();
    assert_eq!(err.reasons, vec![CancelledReason::TargetOutOfSheet]);
    assert_eq!(observable(&m), before);
}

#[test]
fn test_extreme_selection_moves_clamp_to_the_sheet() {
    let mut m = seeded();
    m.dispatch(Command::SelectCell { sheet_id: S1, position: pos("C3") }).unwrap();
    m.dispatch(Command::MoveSelection { sheet_id: S1, d_row: i64::MAX, d_col: i64::MIN, extend: false }).unwrap();
    let (rows, _) = m.getters().sheet_size(S1).unwrap();
    assert_eq!(m.getters().selection(S1).anchor, Position::new(rows - 1, 0));
}
