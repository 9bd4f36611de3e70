//! End-to-end flows over a live session.

use jiukisidian::board::BoardOptions;
use jiukisidian::file_io::ProjectFile;
use jiukisidian::storage::{DirStorage, MemoryStorage};
use jiukisidian::{
    BoardError, CanvasSnapshot, Delivery, MarkupDocument, NoteAction, NoteCommand, RichText, Session, ShapeId,
    ShapeKind,
};
use pretty_assertions::assert_eq;

fn open() -> Session<MemoryStorage> {
    Session::open(MemoryStorage::new(), BoardOptions::default()).unwrap()
}

fn note_content(session: &Session<MemoryStorage>, id: ShapeId) -> String {
    session.board().doc().shape(id).unwrap().as_note().unwrap().content.clone()
}

#[test]
fn draft_hello_survives_save_delete_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open();
    session.create_project("Draft").unwrap();

    let board = session.board_mut();
    let id = board.create_note().unwrap();
    board
        .edit_note(id, |editor| *editor = MarkupDocument::from_markup("<p>Hello</p>"))
        .unwrap();
    assert_eq!(note_content(&session, id), "<p>Hello</p>");

    let path = tokio_test::block_on(session.save_project_to_file(dir.path())).unwrap();
    assert_eq!(path.file_name().unwrap(), "Draft.jiukisidian");

    let board = session.board_mut();
    board.select_all();
    board.delete_selection().unwrap();
    assert_eq!(board.doc().shapes().count(), 0);
    assert_eq!(board.mounted_notes().count(), 0);

    let meta = tokio_test::block_on(session.load_project_from_file(&path)).unwrap();
    assert_eq!(meta.name, "Draft");
    assert_eq!(meta.app, "jiukisidian");

    let notes: Vec<_> = session.board().doc().shapes().filter(|s| s.is_note()).collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, id);
    assert!(note_content(&session, id).contains("Hello"));
    let bridge = session.board().bridge(id).unwrap();
    assert_eq!(bridge.editor().plain_text(), "Hello");
}

#[test]
fn file_round_trip_is_deep_equal() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open();
    let board = session.board_mut();
    let a = board.create_note().unwrap();
    board.dispatch(NoteCommand::new(a, NoteAction::Bold)).unwrap();
    board.dispatch(NoteCommand::with_value(a, NoteAction::Align, "center")).unwrap();
    board.create_page("Second").unwrap();
    board.create_note().unwrap();
    board.toggle_grid().unwrap();
    let before = session.board().snapshot();

    let path = tokio_test::block_on(session.save_project_to_file(dir.path())).unwrap();
    session.board_mut().clear_page().unwrap();
    tokio_test::block_on(session.load_project_from_file(&path)).unwrap();

    assert_eq!(session.board().snapshot(), before);
}

fn scatter_text_shapes(session: &mut Session<MemoryStorage>) {
    let board = session.board_mut();
    let ids: Vec<ShapeId> = (1..=300)
        .map(|n| {
            let x = f64::from(n) / 7.0 * 1.000000123 * 1e5;
            let y = -f64::from(n) / 3.0 * 0.999999871;
            board.add_shape(x, y, ShapeKind::Text { text: format!("t{n}") }).unwrap()
        })
        .collect();
    for id in ids {
        let x = board.doc().shape(id).unwrap().x;
        board.select(&[id]);
        board.rotate_selection(x / 11.0).unwrap();
    }
    board.select_none();
}

#[test]
fn file_round_trip_keeps_exact_positions() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open();
    scatter_text_shapes(&mut session);
    let before = session.board().snapshot();

    let path = tokio_test::block_on(session.save_project_to_file(dir.path())).unwrap();
    session.board_mut().clear_page().unwrap();
    tokio_test::block_on(session.load_project_from_file(&path)).unwrap();

    assert_eq!(session.board().snapshot(), before);
}

#[test]
fn stored_snapshot_keeps_exact_positions() {
    let mut session = open();
    scatter_text_shapes(&mut session);
    let before = session.board().snapshot();
    session.save().unwrap();

    let storage = session.storage().clone();
    let reopened = Session::open(storage, BoardOptions::default()).unwrap();
    assert_eq!(reopened.board().snapshot().shapes, before.shapes);
}

#[test]
fn malformed_import_leaves_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open();
    session.board_mut().create_note().unwrap();
    let before = serde_json::to_string(&session.board().snapshot()).unwrap();

    let snapshot = serde_json::to_value(CanvasSnapshot::default()).unwrap();
    let cases = [
        ("not-json.jiukisidian", "{{{".to_string()),
        (
            "no-data.jiukisidian",
            serde_json::json!({ "version": 1, "meta": { "name": "x" } }).to_string(),
        ),
        (
            "no-meta.jiukisidian",
            serde_json::json!({ "version": 1, "data": snapshot }).to_string(),
        ),
        (
            "bad-snapshot.jiukisidian",
            serde_json::json!({ "version": 1, "meta": { "name": "x" }, "data": { "pages": 3 } }).to_string(),
        ),
    ];
    for (name, body) in cases {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        let result = tokio_test::block_on(session.load_project_from_file(&path));
        assert!(matches!(result, Err(BoardError::Format(_))), "{name}: {result:?}");
        let after = serde_json::to_string(&session.board().snapshot()).unwrap();
        assert_eq!(after, before, "{name}");
    }

    let missing = dir.path().join("missing.jiukisidian");
    let result = tokio_test::block_on(session.load_project_from_file(&missing));
    assert!(matches!(result, Err(BoardError::Io(_))));
    assert_eq!(serde_json::to_string(&session.board().snapshot()).unwrap(), before);
}

#[test]
fn snapshot_with_undersized_note_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = open();
    let id = session.board_mut().create_note().unwrap();
    let mut snapshot = session.board().snapshot();
    let shape = snapshot.shapes.iter_mut().find(|s| s.id == id).unwrap();
    shape.as_note_mut().unwrap().w = 10.0;

    let path = dir.path().join("tiny.jiukisidian");
    std::fs::write(&path, ProjectFile::new("tiny", snapshot).encode().unwrap()).unwrap();
    let result = tokio_test::block_on(session.load_project_from_file(&path));
    assert!(matches!(result, Err(BoardError::Format(_))));
    assert_eq!(session.board().doc().shape(id).unwrap().as_note().unwrap().w, 350.0);
}

#[test]
fn command_reaches_exactly_one_note_or_none() {
    let mut session = open();
    let board = session.board_mut();
    let a = board.create_note().unwrap();
    let b = board.create_note().unwrap();
    let b_before = note_content(&session, b);

    let delivery = session
        .board_mut()
        .dispatch(NoteCommand::with_value(a, NoteAction::Color, "#ff0000"))
        .unwrap();
    assert_eq!(delivery, Delivery::Delivered);
    assert!(note_content(&session, a).contains("color: #ff0000"));
    assert_eq!(note_content(&session, b), b_before);

    let before = session.board().snapshot();
    let delivery = session
        .board_mut()
        .dispatch(NoteCommand::new(ShapeId::new(), NoteAction::Italic))
        .unwrap();
    assert_eq!(delivery, Delivery::Dropped);
    assert_eq!(session.board().snapshot(), before);
}

#[test]
fn projects_persist_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let (project, note) = {
        let mut session = Session::open(DirStorage::new(dir.path()), BoardOptions::default()).unwrap();
        let project = session.create_project("Kept").unwrap();
        let note = session.board_mut().create_note().unwrap();
        assert!(session.autosave().unwrap());
        (project, note)
    };

    let session = Session::open(DirStorage::new(dir.path()), BoardOptions::default()).unwrap();
    assert_eq!(session.active_project().id, project);
    assert_eq!(session.active_project().name, "Kept");
    assert!(session.board().doc().shape(note).is_some());
    assert!(session.board().bridge(note).is_some());
}
