use super::*;
use crate::parser::parse;
use crate::runtime::{Event, RecordingRuntime};
use crate::types::{Character, Value};

fn script(text: &str) -> Vec<Command> {
    parse(text).expect("script should parse")
}

fn play(commands: &[Command]) -> Play<'_, RecordingRuntime> {
    Play::new(commands, RecordingRuntime::new())
}

/// Drives a play to the end, answering menus from `choices` in order.
fn run_to_end(play: &mut Play<'_, RecordingRuntime>, choices: &[usize]) {
    let mut choices = choices.iter().copied();
    let mut input = None;
    for _ in 0..1000 {
        if play.step(input.take()) == Step::Done {
            return;
        }
        if play.is_waiting_for_choice() {
            input = choices.next().map(Input::Choice);
        } else if play.is_waiting_for_input() {
            input = Some(Input::Continue);
        }
    }
    panic!("script did not finish");
}

fn say(speaker: &str, text: &str) -> Event {
    Event::Dialogue {
        speaker: speaker.into(),
        text: text.into(),
    }
}

fn narrate(text: &str) -> Event {
    Event::Narration { text: text.into() }
}

#[test]
fn test_dialogue_waits_then_finishes_on_return() {
    let commands = script("label start:\n  e \"Hi\"\n  return\n");
    let mut play = play(&commands);
    play.runtime_mut()
        .define_character("e", Character::new("Eileen"));
    play.runtime_mut().take_events();

    assert_eq!(play.step(None), Step::Continue);
    assert!(play.is_waiting_for_input());
    assert_eq!(play.runtime().events, vec![say("Eileen", "Hi")]);

    assert_eq!(play.step(Some(Input::Continue)), Step::Done);
    assert!(!play.is_waiting_for_input());
    assert!(play.is_finished());
    assert_eq!(play.runtime().events.len(), 1);
}

#[test]
fn test_waiting_step_without_input_is_idempotent() {
    let commands = script("\"One\"\n\"Two\"\n");
    let mut play = play(&commands);

    play.step(None);
    play.step(None);
    play.step(None);
    assert_eq!(play.runtime().events, vec![narrate("One")]);
    assert!(play.is_waiting_for_input());

    play.step(Some(Input::Continue));
    assert!(!play.is_waiting_for_input());
    play.step(None);
    assert_eq!(play.runtime().events, vec![narrate("One"), narrate("Two")]);
}

#[test]
fn test_menu_choice_runs_reaction() {
    let commands =
        script("menu:\n  \"Yes\":\n    $ mood = \"happy\"\n  \"No\":\n    $ mood = \"sad\"\n");
    let mut play = play(&commands);

    assert_eq!(play.step(None), Step::Continue);
    assert!(play.is_waiting_for_input());
    assert!(play.is_waiting_for_choice());
    assert_eq!(
        play.runtime().events,
        vec![Event::Choices {
            prompts: vec!["Yes".into(), "No".into()]
        }]
    );

    assert_eq!(play.step(Some(Input::Choice(1))), Step::Done);
    assert_eq!(
        play.runtime().get_variable("mood"),
        Some(Value::Str("sad".into()))
    );
}

#[test]
fn test_invalid_choice_keeps_waiting() {
    let commands = script("menu:\n  \"Only\":\n    \"picked\"\n");
    let mut play = play(&commands);

    play.step(None);
    play.step(Some(Input::Choice(5)));
    assert!(play.is_waiting_for_input());
    play.step(Some(Input::Continue));
    assert!(play.is_waiting_for_input());
    assert_eq!(play.runtime().events.len(), 1);

    play.step(Some(Input::Choice(0)));
    assert_eq!(play.runtime().events.last(), Some(&narrate("picked")));
}

#[test]
fn test_jump_never_reenters_source_label() {
    let commands = script("label a:\n  jump b\n  \"unreachable\"\nlabel b:\n  e \"there\"\n");
    let mut play = play(&commands);

    play.step(None);
    assert_eq!(play.runtime().events, vec![say("e", "there")]);

    assert_eq!(play.step(Some(Input::Continue)), Step::Done);
    assert_eq!(play.runtime().events, vec![say("e", "there")]);
}

#[test]
fn test_jump_from_nested_body_to_outer_label() {
    let commands = script(
        "label start:\n  menu:\n    \"Leave\":\n      jump ending\n  \"stayed\"\nlabel ending:\n  \"the end\"\n",
    );
    let mut play = play(&commands);
    run_to_end(&mut play, &[0]);

    let texts: Vec<_> = play
        .runtime()
        .events
        .iter()
        .filter(|e| matches!(e, Event::Narration { .. }))
        .cloned()
        .collect();
    assert_eq!(texts, vec![narrate("the end")]);
}

#[test]
fn test_backward_jump_loops() {
    let commands = script(
        "label start:\n  $ count = 1\nlabel again:\n  \"tick\"\n  if count == 1:\n    $ count = 2\n    jump again\n  \"done\"\n",
    );
    let mut play = play(&commands);
    run_to_end(&mut play, &[]);

    let lines: Vec<_> = play
        .runtime()
        .events
        .iter()
        .filter(|e| matches!(e, Event::Narration { .. }))
        .cloned()
        .collect();
    assert_eq!(lines, vec![narrate("tick"), narrate("tick"), narrate("done")]);
}

#[test]
fn test_unknown_jump_is_skipped() {
    let commands = script("jump nowhere\n\"still here\"\n");
    let mut play = play(&commands);
    play.advance(None);
    assert_eq!(play.runtime().events, vec![narrate("still here")]);
}

#[test]
fn test_jump_does_not_see_labels_nested_elsewhere() {
    let commands =
        script("label a:\n  jump inner\n  \"fell through\"\nlabel b:\n  label inner:\n    \"inner\"\n");
    let mut play = play(&commands);
    run_to_end(&mut play, &[]);
    assert_eq!(
        play.runtime().events,
        vec![narrate("fell through"), narrate("inner")]
    );
}

#[test]
fn test_empty_label_completes_silently() {
    let commands = script("label empty:\n");
    let mut play = play(&commands);
    assert_eq!(play.step(None), Step::Done);
    assert!(play.runtime().events.is_empty());
}

#[test]
fn test_first_true_branch_only() {
    let text = r#"
$ score = 10
if score > 20:
    "high"
elif score >= 10:
    "middle"
elif score >= 0:
    "low"
else:
    "negative"
"end"
"#;
    let commands = script(text);
    let mut play = play(&commands);
    run_to_end(&mut play, &[]);

    let lines: Vec<_> = play
        .runtime()
        .events
        .iter()
        .filter(|e| matches!(e, Event::Narration { .. }))
        .cloned()
        .collect();
    assert_eq!(lines, vec![narrate("middle"), narrate("end")]);
}

#[test]
fn test_else_runs_when_nothing_matched() {
    let commands = script("if missing:\n  \"if\"\nelse:\n  \"else\"\n");
    let mut play = play(&commands);
    run_to_end(&mut play, &[]);
    assert_eq!(play.runtime().events, vec![narrate("else")]);
}

#[test]
fn test_separate_if_chains_are_independent() {
    let commands = script("if True:\n  \"first\"\nif True:\n  \"second\"\n");
    let mut play = play(&commands);
    run_to_end(&mut play, &[]);
    assert_eq!(
        play.runtime().events,
        vec![narrate("first"), narrate("second")]
    );
}

#[test]
fn test_condition_reads_store_changed_between_steps() {
    let commands = script("\"wait\"\nif flag:\n  \"flag set\"\n");
    let mut play = play(&commands);

    play.step(None);
    play.runtime_mut().set_variable("flag", Value::Bool(true));
    run_to_end(&mut play, &[]);
    assert_eq!(
        play.runtime().events.last(),
        Some(&narrate("flag set"))
    );
}

#[test]
fn test_effects_visit_in_source_order() {
    let text = "scene bg park with fade\nshow ella at left\nplay music \"a.ogg\" fadein 2\npause 1\nhide ella\nstop music\n";
    let commands = script(text);
    let mut play = play(&commands);

    let mut steps = 0;
    while play.step(None) != Step::Done {
        steps += 1;
    }
    assert_eq!(steps, 5);
    assert_eq!(
        play.runtime().events,
        vec![
            Event::Scene {
                image: "bg park".into(),
                transition: Some("fade".into())
            },
            Event::Show {
                image: "ella".into(),
                position: Some("left".into()),
                transition: None
            },
            Event::PlayMusic {
                file: "a.ogg".into(),
                fade_in: Some(2.0)
            },
            Event::Pause { seconds: Some(1.0) },
            Event::Hide {
                image: "ella".into(),
                transition: None
            },
            Event::StopMusic { fade_out: None },
        ]
    );
}

#[test]
fn test_unsupported_command_is_skipped() {
    let json = r#"[
        {"type": "voice", "file": "line.ogg"},
        {"type": "dialogue", "text": "after"}
    ]"#;
    let commands: Vec<Command> = serde_json::from_str(json).unwrap();
    assert_eq!(commands[0], Command::Unsupported);

    let mut play = play(&commands);
    play.advance(None);
    assert_eq!(play.runtime().events, vec![narrate("after")]);
}

#[test]
fn test_input_without_pending_wait_is_ignored() {
    let commands = script("menu:\n  \"A\":\n    \"a\"\n  \"B\":\n    \"b\"\n");
    let mut play = play(&commands);

    play.step(Some(Input::Choice(1)));
    assert!(play.is_waiting_for_input());
    assert_eq!(play.runtime().events.len(), 1);
}

#[test]
fn test_advance_stops_at_waits() {
    let commands = script("define e = Character(\"Eileen\")\nscene black\ne \"Hello\"\n\"Bye\"\n");
    let mut play = play(&commands);

    assert_eq!(play.advance(None), Step::Continue);
    assert_eq!(play.runtime().events.last(), Some(&say("Eileen", "Hello")));
    assert_eq!(play.advance(Some(Input::Continue)), Step::Continue);
    assert_eq!(play.runtime().events.last(), Some(&narrate("Bye")));
    assert_eq!(play.advance(Some(Input::Continue)), Step::Done);
}

#[test]
fn test_jump_cycle_is_bounded() {
    let commands = script("label a:\n  jump a\n");
    let options = EngineOptions { step_limit: 50 };
    let mut play = Play::with_options(&commands, RecordingRuntime::new(), options);

    assert_eq!(play.step(None), Step::Continue);
    assert_eq!(play.advance(None), Step::Continue);
    assert!(play.runtime().events.is_empty());
}

#[test]
fn test_restart_clears_store_and_rewinds() {
    let commands = script("$ seen = True\n\"line\"\n");
    let mut play = play(&commands);
    play.advance(None);
    assert_eq!(play.runtime().get_variable("seen"), Some(Value::Bool(true)));

    play.restart();
    assert!(play.runtime().get_variable("seen").is_none());
    assert!(!play.is_finished());
    play.advance(None);
    assert_eq!(
        play.runtime()
            .events
            .iter()
            .filter(|e| **e == narrate("line"))
            .count(),
        2
    );
}
