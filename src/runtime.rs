//! The surface the engine drives: presentation effects plus the session store.

use crate::ast::{Call, Define, Expr};
use crate::types::{Character, Store, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub trait Runtime {
    fn store(&self) -> &Store;
    fn store_mut(&mut self) -> &mut Store;

    /// `speaker` is the id as written in the script.
    fn show_dialogue(&mut self, speaker: &str, text: &str);
    fn show_narration(&mut self, text: &str);
    fn show_image(&mut self, image: &str, position: Option<&str>, transition: Option<&str>);
    fn hide_image(&mut self, image: &str, transition: Option<&str>);
    fn play_music(&mut self, file: &str, fade_in: Option<f64>);
    fn stop_music(&mut self, fade_out: Option<f64>);
    fn pause(&mut self, seconds: Option<f64>);
    /// The selected index arrives later through `Play::step`.
    fn show_choices(&mut self, prompts: &[&str]);

    fn show_scene(&mut self, image: &str, transition: Option<&str>) {
        self.show_image(image, None, transition);
    }

    fn define_character(&mut self, id: &str, character: Character) {
        self.store_mut().define_character(id, character);
    }

    fn get_variable(&self, name: &str) -> Option<Value> {
        self.store().get(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: Value) {
        self.store_mut().set(name, value);
    }

    fn execute_define(&mut self, define: &Define) {
        match &define.definition {
            Some(call) if define.is_character() => match character_from_call(call) {
                Some(character) => self.define_character(&define.name, character),
                None => warn!(id = %define.name, "character without a name, nothing defined"),
            },
            _ => {
                let value = Value::from_literal(&define.value);
                debug!(name = %define.name, %value, "set variable");
                self.set_variable(&define.name, value);
            }
        }
    }
}

/// Settings of a `Character(...)` call. The first positional string is the
/// display name, `name=` overrides it.
fn character_from_call(call: &Call) -> Option<Character> {
    let mut name = None;
    let mut color = None;
    let mut extra = Vec::new();

    for arg in &call.args {
        let Expr::Str(text) = &arg.value else {
            continue;
        };
        match arg.name.as_deref() {
            None if name.is_none() => name = Some(text.clone()),
            None => {}
            Some("name") => name = Some(text.clone()),
            Some("color") => color = Some(text.clone()),
            Some(key) => extra.push((key.to_string(), text.clone())),
        }
    }

    let mut character = Character::new(name?);
    if let Some(color) = color {
        character = character.with_color(color);
    }
    character.extra.extend(extra);
    Some(character)
}

/// Everything a [`RecordingRuntime`] saw, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Dialogue {
        speaker: String,
        text: String,
    },
    Narration {
        text: String,
    },
    Scene {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        transition: Option<String>,
    },
    Show {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        position: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        transition: Option<String>,
    },
    Hide {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        transition: Option<String>,
    },
    PlayMusic {
        file: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        fade_in: Option<f64>,
    },
    StopMusic {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        fade_out: Option<f64>,
    },
    Pause {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        seconds: Option<f64>,
    },
    Choices {
        prompts: Vec<String>,
    },
    DefineCharacter {
        id: String,
        name: String,
        color: String,
        #[serde(flatten)]
        extra: BTreeMap<String, String>,
    },
    SetVariable {
        name: String,
        value: Value,
    },
}

/// Runtime that renders nothing and keeps a transcript instead.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    pub store: Store,
    pub events: Vec<Event>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

impl Runtime for RecordingRuntime {
    fn store(&self) -> &Store {
        &self.store
    }

    fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    fn show_dialogue(&mut self, speaker: &str, text: &str) {
        let speaker = self.store.display_name(speaker).to_string();
        self.events.push(Event::Dialogue {
            speaker,
            text: text.to_string(),
        });
    }

    fn show_narration(&mut self, text: &str) {
        self.events.push(Event::Narration {
            text: text.to_string(),
        });
    }

    fn show_scene(&mut self, image: &str, transition: Option<&str>) {
        self.events.push(Event::Scene {
            image: image.to_string(),
            transition: transition.map(str::to_string),
        });
    }

    fn show_image(&mut self, image: &str, position: Option<&str>, transition: Option<&str>) {
        self.events.push(Event::Show {
            image: image.to_string(),
            position: position.map(str::to_string),
            transition: transition.map(str::to_string),
        });
    }

    fn hide_image(&mut self, image: &str, transition: Option<&str>) {
        self.events.push(Event::Hide {
            image: image.to_string(),
            transition: transition.map(str::to_string),
        });
    }

    fn play_music(&mut self, file: &str, fade_in: Option<f64>) {
        self.events.push(Event::PlayMusic {
            file: file.to_string(),
            fade_in,
        });
    }

    fn stop_music(&mut self, fade_out: Option<f64>) {
        self.events.push(Event::StopMusic { fade_out });
    }

    fn pause(&mut self, seconds: Option<f64>) {
        self.events.push(Event::Pause { seconds });
    }

    fn show_choices(&mut self, prompts: &[&str]) {
        self.events.push(Event::Choices {
            prompts: prompts.iter().map(|p| p.to_string()).collect(),
        });
    }

    fn define_character(&mut self, id: &str, character: Character) {
        self.events.push(Event::DefineCharacter {
            id: id.to_string(),
            name: character.name.clone(),
            color: character.color.clone(),
            extra: character.extra.clone(),
        });
        self.store.define_character(id, character);
    }

    fn set_variable(&mut self, name: &str, value: Value) {
        self.events.push(Event::SetVariable {
            name: name.to_string(),
            value: value.clone(),
        });
        self.store.set(name, value);
    }
}
