use anyhow::Result;
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use versewright_agent::{CHUNK_COUNT_HINT, EditingController, Session, SessionOutcome};
use versewright_core::{Action, EOT_MARKER, Key};
use versewright_local_ml::{SampleRequest, TokenCodec};
use versewright_observe::Observer;
use versewright_store::SaveGateway;
use versewright_testkit::{Frame, ScriptedConsole, ScriptedSampler, WordCodec};

const PROMPT: &str = "The sea";

fn request() -> SampleRequest {
    SampleRequest {
        batch_size: 2,
        length: 1,
        temperature: 1.0,
        top_k: 0,
        top_p: 0.0,
    }
}

fn run_session(
    codec: &WordCodec,
    sampler: &mut ScriptedSampler,
    console: &mut ScriptedConsole,
    out: &Path,
) -> Result<SessionOutcome> {
    let gateway = SaveGateway::new(out);
    EditingController::new(codec, sampler, console, &gateway, request()).run(PROMPT)
}

fn marked(text: &str) -> String {
    format!("{EOT_MARKER}{text}")
}

#[test]
fn accepted_candidates_build_the_document() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" at", " is"])
        .push_texts(&codec, &[" night"])
        .push_texts(&codec, &[" dawn"])
        .push_texts(&codec, &[" x"]);
    let mut console =
        ScriptedConsole::new().keys([Key::Enter, Key::Backspace, Key::Enter, Key::Char('q')]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();

    assert_eq!(outcome.document, "The sea at dawn");
    assert_eq!(outcome.rounds, 4);
    assert!(outcome.saved.is_empty());
    assert_eq!(sampler.contexts[0], codec.ids(&marked(PROMPT)));
    assert_eq!(sampler.contexts[1], sampler.contexts[2]);
    assert_eq!(
        console.presented(),
        vec![
            ("The sea".to_string(), " at".to_string()),
            ("The sea at".to_string(), " night".to_string()),
            ("The sea at".to_string(), " dawn".to_string()),
            ("The sea at dawn".to_string(), " x".to_string()),
        ]
    );
}

#[test]
fn rejecting_moves_through_the_batch_in_order() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" one", " two"])
        .push_texts(&codec, &[" end"]);
    let mut console =
        ScriptedConsole::new().keys([Key::Delete, Key::Enter, Key::Char('q')]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();
    assert_eq!(outcome.document, "The sea two");
    assert_eq!(sampler.contexts.len(), 2);
}

#[test]
fn backslash_deletes_recent_chunks() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" at"])
        .push_texts(&codec, &[" x"])
        .push_texts(&codec, &[" y"]);
    let mut console = ScriptedConsole::new()
        .keys([Key::Enter, Key::Char('\\'), Key::Char('q')])
        .lines(["abc", "2"]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();

    assert_eq!(outcome.document, "The");
    assert_eq!(sampler.contexts[2], codec.ids(&marked("The")));

    let listed: Vec<(usize, String)> = console
        .frames
        .iter()
        .find_map(|frame| match frame {
            Frame::Chunks(chunks) => Some(
                chunks
                    .iter()
                    .map(|c| (c.index, c.text.clone()))
                    .collect(),
            ),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        listed,
        vec![
            (2, "The".to_string()),
            (1, " sea".to_string()),
            (0, " at".to_string()),
        ]
    );
    assert!(
        console
            .frames
            .contains(&Frame::Notice(CHUNK_COUNT_HINT.to_string()))
    );
}

#[test]
fn oversized_deletion_keeps_the_boundary_marker() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" x"])
        .push_texts(&codec, &[" y"]);
    let mut console = ScriptedConsole::new()
        .keys([Key::Char('\\'), Key::Char('q')])
        .lines(["99"]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();
    assert_eq!(outcome.document, "");
    assert_eq!(sampler.contexts[1], codec.boundary_tokens().unwrap());
}

#[test]
fn zero_chunk_deletion_still_starts_a_new_round() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" x", " unused"])
        .push_texts(&codec, &[" y"]);
    let mut console = ScriptedConsole::new()
        .keys([Key::Char('\\'), Key::Char('q')])
        .lines(["0"]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();
    assert_eq!(outcome.document, PROMPT);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(sampler.contexts[0], sampler.contexts[1]);
}

#[test]
fn reset_restores_the_starting_prompt() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" at"])
        .push_texts(&codec, &[" x"])
        .push_texts(&codec, &[" y"]);
    let mut console =
        ScriptedConsole::new().keys([Key::Enter, Key::Char('r'), Key::Char('q')]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();
    assert_eq!(outcome.document, PROMPT);
    assert_eq!(sampler.contexts[2], sampler.contexts[0]);
}

#[test]
fn custom_text_replaces_the_candidate() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" x"])
        .push_texts(&codec, &[" y"])
        .push_texts(&codec, &[" z"]);
    let mut console = ScriptedConsole::new()
        .keys([Key::Escape, Key::Left, Key::Char('q')])
        .lines(["", " waves"]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();
    assert_eq!(outcome.document, "The sea\n waves");
}

#[test]
fn save_writes_the_visible_document_without_changing_context() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" x"])
        .push_texts(&codec, &[" y"]);
    let mut console = ScriptedConsole::new()
        .keys([Key::Char('s'), Key::Char('q')])
        .lines(["poem"]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();

    let path = out.path().join("poem.txt");
    assert_eq!(outcome.saved, vec![path.clone()]);
    assert_eq!(fs::read_to_string(path).unwrap(), PROMPT);
    assert_eq!(sampler.contexts[0], sampler.contexts[1]);
}

#[test]
fn control_chords_quit_with_the_current_document() {
    for key in [Key::Ctrl('c'), Key::Ctrl('z')] {
        let out = tempfile::tempdir().unwrap();
        let codec = WordCodec::new();
        let mut sampler = ScriptedSampler::new();
        sampler.push_texts(&codec, &[" x"]);
        let mut console = ScriptedConsole::new().keys([key]);

        let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();
        assert_eq!(outcome.document, PROMPT);
        assert_eq!(outcome.rounds, 1);
    }
}

#[test]
fn unknown_key_redraws_an_identical_frame() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" at"])
        .push_texts(&codec, &[" x"]);
    let mut console = ScriptedConsole::new().keys([
        Key::Char('x'),
        Key::Char('k'),
        Key::Enter,
        Key::Char('q'),
    ]);

    let outcome = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap();
    assert_eq!(outcome.document, "The sea at");
    assert_eq!(console.frames[1], Frame::Help);
    assert_eq!(console.frames[0], console.frames[2]);
}

#[test]
fn closed_input_stream_is_an_error() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler.push_texts(&codec, &[" x"]);
    let mut console = ScriptedConsole::new();

    let err = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap_err();
    assert!(err.to_string().contains("input stream closed"));
}

#[test]
fn sampler_failure_is_propagated() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    let mut console = ScriptedConsole::new();
    let err = run_session(&codec, &mut sampler, &mut console, out.path()).unwrap_err();
    assert!(err.to_string().contains("scripted sampler exhausted"));
}

#[test]
fn failed_save_keeps_the_session_and_its_document() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("out");
    fs::write(&blocker, "occupied").unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" at"])
        .push_texts(&codec, &[" x"])
        .push_texts(&codec, &[" y"]);
    let mut console = ScriptedConsole::new()
        .keys([Key::Enter, Key::Char('s'), Key::Char('q')])
        .lines(["poem"]);

    let outcome = run_session(&codec, &mut sampler, &mut console, &blocker).unwrap();

    assert_eq!(outcome.document, "The sea at");
    assert!(outcome.saved.is_empty());
    assert_eq!(outcome.rounds, 3);
    assert_eq!(sampler.contexts[1], sampler.contexts[2]);
    assert!(console.frames.iter().any(|frame| matches!(
        frame,
        Frame::Notice(text) if text.ends_with("document not saved")
    )));
}

#[test]
fn multi_token_candidate_extends_the_context_by_its_encoding() {
    let out = tempfile::tempdir().unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" upon a time"])
        .push_texts(&codec, &[" x"]);
    let mut console = ScriptedConsole::new().keys([Key::Enter, Key::Char('q')]);
    let gateway = SaveGateway::new(out.path());

    let outcome =
        EditingController::new(&codec, &mut sampler, &mut console, &gateway, request())
            .run("Once")
            .unwrap();

    let continuation = codec.encode(" upon a time").unwrap();
    assert_eq!(continuation.len(), 3);
    let mut expected = codec.ids(&marked("Once"));
    expected.extend(&continuation);
    assert_eq!(sampler.contexts[1], expected);
    assert_eq!(outcome.document, "Once upon a time");
}

#[test]
fn observer_records_session_events() {
    let workspace = tempfile::tempdir().unwrap();
    let observer = Observer::new(workspace.path()).unwrap();
    let codec = WordCodec::new();
    let mut sampler = ScriptedSampler::new();
    sampler
        .push_texts(&codec, &[" at"])
        .push_texts(&codec, &[" x"]);
    let mut console = ScriptedConsole::new().keys([Key::Enter, Key::Char('q')]);
    let gateway = SaveGateway::new(workspace.path());

    EditingController::new(&codec, &mut sampler, &mut console, &gateway, request())
        .with_observer(&observer)
        .run(PROMPT)
        .unwrap();

    let log = fs::read_to_string(observer.log_path()).unwrap();
    assert!(log.contains("SessionStartedV1"));
    assert!(log.contains("ContinuationAcceptedV1"));
    assert!(log.contains("SessionEndedV1"));
    assert_eq!(log.lines().count(), 5);
}

fn edit_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|w| Action::Accept(format!(" {w}"))),
        "[a-z]{1,6}".prop_map(|w| Action::CustomText(format!("\n{w}"))),
        (0usize..12).prop_map(Action::DeleteChunk),
    ]
}

proptest! {
    #[test]
    fn deletion_never_eats_the_boundary_marker(
        edits in prop::collection::vec(edit_strategy(), 0..10),
        n in 0usize..40,
    ) {
        let codec = WordCodec::new();
        let mut session = Session::start(&codec, PROMPT).unwrap();
        for edit in &edits {
            session.apply(&codec, edit).unwrap();
        }
        let before = session.context().len();
        let removed = session.apply(&codec, &Action::DeleteChunk(n)).unwrap();
        prop_assert_eq!(removed, n.min(before - session.eot_len()));
        prop_assert!(session.context().len() >= session.eot_len());
        prop_assert!(session.context().starts_with(&codec.boundary_tokens().unwrap()));
    }

    #[test]
    fn reset_always_restores_the_marked_prompt(
        prompt in "[a-z ]{0,20}",
        edits in prop::collection::vec(edit_strategy(), 0..10),
    ) {
        let codec = WordCodec::new();
        let mut session = Session::start(&codec, &prompt).unwrap();
        for edit in &edits {
            session.apply(&codec, edit).unwrap();
        }
        session.apply(&codec, &Action::ResetPrompt).unwrap();
        prop_assert_eq!(session.context().to_vec(), codec.ids(&marked(&prompt)));
        prop_assert_eq!(session.visible_text(&codec).unwrap(), prompt);
    }

    #[test]
    fn word_codec_round_trips(text in "[a-zA-Z \n\t]{0,40}") {
        let codec = WordCodec::new();
        let ids = codec.encode(&text).unwrap();
        prop_assert_eq!(codec.decode(&ids).unwrap(), text);
    }
}
