use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Label(Label),
    Scene(Scene),
    Dialogue(Dialogue),
    Menu(Menu),
    MenuChoice(MenuChoice),
    IfCondition(Conditional),
    ElifCondition(Conditional),
    Else(Else),
    Define(Define),
    PlayMusic(PlayMusic),
    StopMusic(StopMusic),
    Show(Show),
    Hide(Hide),
    Pause(Pause),
    Jump(Jump),
    Return,
    /// Produced only when deserializing a tree with a command kind this crate
    /// does not know about.
    #[serde(other)]
    Unsupported,
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Label(_) => "label",
            Command::Scene(_) => "scene",
            Command::Dialogue(_) => "dialogue",
            Command::Menu(_) => "menu",
            Command::MenuChoice(_) => "menu_choice",
            Command::IfCondition(_) => "if_condition",
            Command::ElifCondition(_) => "elif_condition",
            Command::Else(_) => "else",
            Command::Define(_) => "define",
            Command::PlayMusic(_) => "play_music",
            Command::StopMusic(_) => "stop_music",
            Command::Show(_) => "show",
            Command::Hide(_) => "hide",
            Command::Pause(_) => "pause",
            Command::Jump(_) => "jump",
            Command::Return => "return",
            Command::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    // None is narration
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speaker: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    #[serde(default)]
    pub choices: Vec<MenuChoice>,
}

impl Menu {
    pub fn prompts(&self) -> Vec<&str> {
        self.choices.iter().map(|c| c.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuChoice {
    pub text: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

/// Body of an `if` or `elif` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub condition: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Else {
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Define {
    pub name: String,
    /// Right-hand side exactly as written.
    pub value: String,
    /// Parsed right-hand side when it is a call such as `Character("Eileen")`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub definition: Option<Call>,
}

impl Define {
    pub fn is_character(&self) -> bool {
        self.definition
            .as_ref()
            .map(|d| d.name == "Character")
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    // None for positional arguments
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expr {
    Str(String),
    Number(f64),
    Name(String),
    Call(Call),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayMusic {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fade_in: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopMusic {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fade_out: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hide {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pause {
    // bare `pause`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jump {
    pub label: String,
}
