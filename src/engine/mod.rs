//! Resumable stepper over a command tree
//!
//! A [`Play`] holds a stack of frames, one per command sequence being walked:
//! - the root frame walks the whole script
//! - entering a label, a true branch or a chosen menu reaction pushes a frame
//! - an exhausted frame is popped and its parent moves past the command that
//!   spawned it
//!
//! A compound command keeps its frame's cursor on itself while its body runs,
//! so the cursor moves exactly once per command. Parents are referenced by
//! index into the frame stack.

use crate::ast::{Command, Conditional, Dialogue, Menu};
use crate::condition;
use crate::runtime::Runtime;
use tracing::{debug, trace, warn};

#[cfg(test)]
mod tests;

/* ===================== Public types ===================== */

/// Input supplied by the host with a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Dismiss the dialogue line on screen.
    Continue,
    /// Pick a menu choice, 0-based.
    Choice(usize),
}

/// Result of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work or input is pending
    Continue,
    /// The script has finished
    Done,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on steps for [`Play::advance`] and on label hops within one step.
    pub step_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { step_limit: 10_000 }
    }
}

/* ===================== Frames ===================== */

#[derive(Debug, Clone)]
struct Frame<'a> {
    commands: &'a [Command],
    cursor: usize,
    parent: Option<usize>,
    waiting: bool,
    /// A member of the current if/elif/else group already ran.
    branch_taken: bool,
}

impl<'a> Frame<'a> {
    fn new(commands: &'a [Command], parent: Option<usize>) -> Self {
        Self {
            commands,
            cursor: 0,
            parent,
            waiting: false,
            branch_taken: false,
        }
    }

    fn current(&self) -> Option<&'a Command> {
        self.commands.get(self.cursor)
    }

    fn label_position(&self, name: &str) -> Option<usize> {
        self.commands
            .iter()
            .position(|c| matches!(c, Command::Label(label) if label.name == name))
    }
}

/// What the command just executed left for the rest of the step.
enum Flow {
    Yield,
    /// A frame was pushed or rewound; execute at the new top.
    Delegate,
}

/* ===================== Play ===================== */

pub struct Play<'a, R: Runtime> {
    script: &'a [Command],
    runtime: R,
    frames: Vec<Frame<'a>>,
    options: EngineOptions,
}

impl<'a, R: Runtime> Play<'a, R> {
    pub fn new(script: &'a [Command], runtime: R) -> Self {
        Self::with_options(script, runtime, EngineOptions::default())
    }

    pub fn with_options(script: &'a [Command], runtime: R, options: EngineOptions) -> Self {
        Self {
            script,
            runtime,
            frames: vec![Frame::new(script, None)],
            options,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Changes made here are seen by the next step.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    pub fn is_waiting_for_input(&self) -> bool {
        self.frames.iter().any(|f| f.waiting)
    }

    /// The pending input is a menu choice rather than a continue.
    pub fn is_waiting_for_choice(&self) -> bool {
        self.frames
            .last()
            .map(|f| f.waiting && matches!(f.current(), Some(Command::Menu(_))))
            .unwrap_or(false)
    }

    pub fn is_finished(&self) -> bool {
        self.frames.is_empty()
    }

    /// Rewinds to the top of the script and clears the session store.
    pub fn restart(&mut self) {
        debug!("restart");
        self.frames = vec![Frame::new(self.script, None)];
        self.runtime.store_mut().reset();
    }

    /// Executes one command, descending into any body it opens.
    pub fn step(&mut self, input: Option<Input>) -> Step {
        self.settle();

        let mut input = input;
        if input.is_some() && !self.is_waiting_for_input() {
            debug!(?input, "nothing is waiting for input, ignored");
            input = None;
        }

        let mut hops = 0;
        while let Flow::Delegate = self.execute(input.take()) {
            hops += 1;
            if hops >= self.options.step_limit {
                warn!(hops, "too many jumps within one step, pausing here");
                break;
            }
        }

        self.settle();
        if self.is_finished() {
            Step::Done
        } else {
            Step::Continue
        }
    }

    /// Steps until the script waits for input or finishes.
    pub fn advance(&mut self, input: Option<Input>) -> Step {
        let mut input = input;
        for _ in 0..self.options.step_limit {
            let step = self.step(input.take());
            if step == Step::Done || self.is_waiting_for_input() {
                return step;
            }
        }
        warn!(limit = self.options.step_limit, "step limit reached");
        Step::Continue
    }

    /* ===================== Execution ===================== */

    fn execute(&mut self, input: Option<Input>) -> Flow {
        let Some(idx) = self.frames.len().checked_sub(1) else {
            return Flow::Yield;
        };
        let Some(command) = self.frames[idx].current() else {
            return Flow::Yield;
        };
        trace!(depth = idx, cursor = self.frames[idx].cursor, kind = command.kind(), "execute");

        if !matches!(
            command,
            Command::IfCondition(_) | Command::ElifCondition(_) | Command::Else(_)
        ) {
            self.frames[idx].branch_taken = false;
        }

        match command {
            Command::Label(label) => {
                debug!(label = %label.name, "enter label");
                self.enter(&label.commands)
            }
            Command::Dialogue(dialogue) => self.dialogue(idx, dialogue, input),
            Command::Menu(menu) => self.menu(idx, menu, input),
            Command::IfCondition(branch) => {
                self.frames[idx].branch_taken = false;
                self.branch(idx, branch)
            }
            Command::ElifCondition(branch) => {
                if self.frames[idx].branch_taken {
                    return self.next(idx);
                }
                self.branch(idx, branch)
            }
            Command::Else(branch) => {
                if self.frames[idx].branch_taken {
                    return self.next(idx);
                }
                self.frames[idx].branch_taken = true;
                self.enter(&branch.commands)
            }
            Command::Jump(jump) => self.jump(idx, &jump.label),
            Command::Return => {
                debug!("return");
                self.frames.clear();
                Flow::Yield
            }
            Command::Scene(scene) => {
                self.runtime
                    .show_scene(&scene.image, scene.transition.as_deref());
                self.next(idx)
            }
            Command::Show(show) => {
                self.runtime.show_image(
                    &show.image,
                    show.position.as_deref(),
                    show.transition.as_deref(),
                );
                self.next(idx)
            }
            Command::Hide(hide) => {
                self.runtime
                    .hide_image(&hide.image, hide.transition.as_deref());
                self.next(idx)
            }
            Command::PlayMusic(music) => {
                self.runtime.play_music(&music.file, music.fade_in);
                self.next(idx)
            }
            Command::StopMusic(music) => {
                self.runtime.stop_music(music.fade_out);
                self.next(idx)
            }
            Command::Pause(pause) => {
                self.runtime.pause(pause.duration);
                self.next(idx)
            }
            Command::Define(define) => {
                self.runtime.execute_define(define);
                self.next(idx)
            }
            Command::MenuChoice(choice) => {
                warn!(text = %choice.text, "menu choice outside a menu, skipped");
                self.next(idx)
            }
            Command::Unsupported => {
                warn!("unsupported command, skipped");
                self.next(idx)
            }
        }
    }

    fn next(&mut self, idx: usize) -> Flow {
        self.frames[idx].cursor += 1;
        Flow::Yield
    }

    fn enter(&mut self, commands: &'a [Command]) -> Flow {
        let parent = self.frames.len().checked_sub(1);
        self.frames.push(Frame::new(commands, parent));
        Flow::Delegate
    }

    fn dialogue(&mut self, idx: usize, dialogue: &Dialogue, input: Option<Input>) -> Flow {
        if self.frames[idx].waiting {
            if input.is_some() {
                self.frames[idx].waiting = false;
                return self.next(idx);
            }
            return Flow::Yield;
        }

        match &dialogue.speaker {
            Some(speaker) => self.runtime.show_dialogue(speaker, &dialogue.text),
            None => self.runtime.show_narration(&dialogue.text),
        }
        self.frames[idx].waiting = true;
        Flow::Yield
    }

    fn menu(&mut self, idx: usize, menu: &'a Menu, input: Option<Input>) -> Flow {
        if menu.choices.is_empty() {
            warn!("menu without choices, skipped");
            return self.next(idx);
        }

        if !self.frames[idx].waiting {
            self.runtime.show_choices(&menu.prompts());
            self.frames[idx].waiting = true;
            return Flow::Yield;
        }

        match input {
            Some(Input::Choice(index)) => match menu.choices.get(index) {
                Some(choice) => {
                    debug!(index, text = %choice.text, "menu choice");
                    self.frames[idx].waiting = false;
                    self.enter(&choice.commands)
                }
                None => {
                    warn!(index, available = menu.choices.len(), "no such menu choice");
                    Flow::Yield
                }
            },
            Some(Input::Continue) | None => Flow::Yield,
        }
    }

    fn branch(&mut self, idx: usize, branch: &'a Conditional) -> Flow {
        let runtime = &self.runtime;
        let holds = condition::evaluate(&branch.condition, &|name| runtime.get_variable(name));
        debug!(condition = %branch.condition, holds, "branch");

        if !holds {
            return self.next(idx);
        }
        self.frames[idx].branch_taken = true;
        self.enter(&branch.commands)
    }

    /// Finds the label in this frame or an ancestor, drops every frame
    /// below the owner and points the owner at the label.
    fn jump(&mut self, idx: usize, target: &str) -> Flow {
        let mut at = Some(idx);
        let mut found = None;
        while let Some(i) = at {
            if let Some(position) = self.frames[i].label_position(target) {
                found = Some((i, position));
                break;
            }
            at = self.frames[i].parent;
        }

        let Some((owner, position)) = found else {
            warn!(label = target, "jump target not found, skipped");
            return self.next(idx);
        };

        debug!(label = target, depth = owner, "jump");
        self.frames.truncate(owner + 1);
        let frame = &mut self.frames[owner];
        frame.cursor = position;
        frame.waiting = false;
        Flow::Delegate
    }

    /// Pops exhausted frames and runs a `return` sitting at the cursor.
    fn settle(&mut self) {
        while let Some(frame) = self.frames.last() {
            if frame.waiting {
                return;
            }
            match frame.current() {
                None => {
                    let parent = frame.parent;
                    self.frames.pop();
                    if let Some(parent) = parent {
                        self.frames[parent].cursor += 1;
                    }
                }
                Some(Command::Return) => {
                    debug!("return");
                    self.frames.clear();
                }
                Some(_) => return,
            }
        }
    }
}
