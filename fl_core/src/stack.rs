//! Textual stack traces.
//!
//! A trace is one symbol line per frame, innermost call first:
//!
//! ```text
//!    0: plugin_x::combat::tick
//!    1: main
//! ```
//!
//! The parser also understands `std::backtrace::Backtrace` output, which
//! interleaves `at file:line:col` location lines and may carry symbol hashes.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::Frame;

/// Crates that make up the platform. Frames inside them are never blamed.
pub const SYSTEM_COMPONENTS: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

static FRAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+:\s+(\S.*)$").expect("frame line pattern"));

static SYMBOL_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("symbol hash pattern"));

pub fn is_system_component(component: &str) -> bool {
    SYSTEM_COMPONENTS.contains(&component)
}

/// Parse frames out of a textual trace. Lines that are not symbol lines are skipped.
pub fn parse(text: &str) -> Vec<Frame> {
    text.lines()
        .filter_map(|line| FRAME_LINE.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|symbol| parse_symbol(symbol.as_str().trim()))
        .collect()
}

fn parse_symbol(symbol: &str) -> Frame {
    let symbol = SYMBOL_HASH.replace(symbol, "");
    if symbol == "<unknown>" {
        return Frame::unresolved(symbol.to_string());
    }

    match utils::root_segment(&symbol) {
        Some(component) if symbol.starts_with('<') => {
            Frame::new(component, &*symbol)
        }
        Some(component) => {
            let function = symbol[component.len() + 2..].to_string();
            Frame::new(component, function)
        }
        None => Frame::unresolved(symbol.to_string()),
    }
}

/// Render frames in the canonical symbol-line format.
pub fn render(frames: &[Frame]) -> String {
    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| match &frame.component {
            Some(component) if !frame.function.starts_with('<') => {
                format!("{index:>4}: {component}::{}", frame.function)
            }
            _ => format!("{index:>4}: {}", frame.function),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
