#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
use pyo3::prelude::*;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod ast;
pub mod condition;
pub mod engine;
pub mod error;
pub mod expression;
pub mod parser;
pub mod runtime;
pub mod types;

pub use ast::Command;
pub use engine::{EngineOptions, Input, Play, Step};
pub use error::{ParseError, Result};
pub use parser::{parse, parse_file, parse_with_options, ParseOptions};
pub use runtime::{Event, RecordingRuntime, Runtime};
pub use types::{Character, Store, Value};

use tracing::warn;

/// Parses a script and returns its command tree as pretty JSON.
pub fn parse_text_json(text: &str) -> Result<String> {
    let commands = parse(text)?;
    Ok(serde_json::to_string_pretty(&commands)?)
}

/// Loads a command tree previously written by [`parse_text_json`].
pub fn parse_tree_json(json: &str) -> Result<Vec<Command>> {
    Ok(serde_json::from_str(json)?)
}

/// Plays `script` without a presentation layer: every dialogue line is
/// dismissed and menus are answered from `choices` in order. Stops early
/// when the choices run out.
pub fn record(script: &[Command], choices: &[usize], options: EngineOptions) -> Vec<Event> {
    let mut play = Play::with_options(script, RecordingRuntime::new(), options);
    let mut choices = choices.iter().copied();
    let mut input = None;

    while play.advance(input.take()) != Step::Done {
        if play.is_waiting_for_choice() {
            match choices.next() {
                Some(index) => input = Some(Input::Choice(index)),
                None => {
                    warn!("menu reached with no choices left");
                    break;
                }
            }
        } else if play.is_waiting_for_input() {
            input = Some(Input::Continue);
        } else {
            break;
        }
    }

    play.into_runtime().events
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
#[pyfunction]
fn parse_text(text: String) -> PyResult<String> {
    parse_text_json(&text)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
#[pyfunction]
#[pyo3(signature = (text, choices = Vec::new()))]
fn record_text(text: String, choices: Vec<usize>) -> PyResult<String> {
    let to_py = |e: String| PyErr::new::<pyo3::exceptions::PyValueError, _>(e);
    let commands = parse(&text).map_err(|e| to_py(e.to_string()))?;
    let events = record(&commands, &choices, EngineOptions::default());
    serde_json::to_string_pretty(&events).map_err(|e| to_py(e.to_string()))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn parse_text_wasm(text: &str) -> std::result::Result<String, JsValue> {
    parse_text_json(text).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn record_text_wasm(text: &str, choices: &[u32]) -> std::result::Result<String, JsValue> {
    let commands = parse(text).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let choices: Vec<usize> = choices.iter().map(|c| *c as usize).collect();
    let events = record(&commands, &choices, EngineOptions::default());
    serde_json::to_string_pretty(&events).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(all(feature = "python", not(target_arch = "wasm32")))]
#[pymodule]
fn rpy_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(parse_text, m)?)?;
    m.add_function(wrap_pyfunction!(record_text, m)?)?;
    Ok(())
}
