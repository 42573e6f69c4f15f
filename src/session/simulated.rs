//! In-memory device emulating a hierarchical running configuration.
//!
//! The emulation is deliberately small: configuration lines live in a tree
//! whose inner nodes are context headers (`interface X`, `cable rpd X`, ...),
//! `no X` removes what `X` set, and a set line replaces a sibling with the
//! same keyword skeleton. It is enough to round-trip rendered commands
//! through `show running-config`, and it can be scripted to reject commands,
//! stall or drop the connection.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::dialect::Platform;
use super::transport::{Transport, TransportError, TransportResult};
use crate::error::{Error, Result};

const DEFAULT_CONTEXTS: &[&str] = &[
    r"^interface \S+$",
    r"^cable rpd \S+$",
    r"^ptp domain \d+$",
    r"^port \d+$",
    r"^router \S+( \S+)?$",
    r"^address-family .+$",
    r"^vrf( definition)? \S+$",
    r"^route-map \S+( (permit|deny) \d+)?$",
    r"^ip access-list (standard|extended) \S+$",
    r"^line .+$",
];

/// Keywords whose argument is free text: the line is keyed on the keyword
/// alone.
const FREE_TEXT: &[&str] = &["description", "hostname", "alias", "name", "remark"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
    children: Vec<Line>,
}

impl Line {
    fn leaf(text: &str) -> Self {
        Self {
            text: text.to_string(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct State {
    platform: Platform,
    contexts: Vec<Regex>,
    root: Vec<Line>,
    committed: Vec<Line>,
    config_mode: bool,
    path: Vec<usize>,
    history: Vec<String>,
    rejects: Vec<Regex>,
    delay: Option<Duration>,
    remaining: Option<usize>,
    closed: bool,
}

impl State {
    fn candidate(&self) -> bool {
        matches!(self.platform, Platform::CiscoIosXr | Platform::JuniperJunos)
    }

    fn level(&mut self) -> &mut Vec<Line> {
        let mut level = &mut self.root;
        for &i in &self.path {
            level = &mut level[i].children;
        }
        level
    }

    fn is_context(&self, line: &str) -> bool {
        self.contexts.iter().any(|re| re.is_match(line))
    }

    fn leave_config(&mut self) {
        self.config_mode = false;
        self.path.clear();
    }

    fn handle(&mut self, raw: &str) -> TransportResult<String> {
        if self.closed {
            return Err(TransportError::Closed("simulated device is closed".to_string()));
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                self.closed = true;
                return Err(TransportError::Closed("simulated disconnect".to_string()));
            }
            *remaining -= 1;
        }

        let line = raw.trim();
        self.history.push(line.to_string());
        if self.rejects.iter().any(|re| re.is_match(line)) {
            return Ok(format!("{}\n", self.platform.invalid_input_message()));
        }
        if line.is_empty() || line.starts_with('!') {
            return Ok(String::new());
        }
        if let Some(filter) = show_filter(line) {
            return Ok(render(&self.root, filter));
        }

        if !self.config_mode && !self.platform.enter_config().is_empty() {
            return Ok(self.exec_mode(line));
        }
        Ok(self.config_line(line))
    }

    fn exec_mode(&mut self, line: &str) -> String {
        if matches!(line, "configure" | "configure terminal" | "configure private") {
            self.config_mode = true;
            self.path.clear();
            self.committed = self.root.clone();
        }
        String::new()
    }

    fn config_line(&mut self, line: &str) -> String {
        match line {
            "end" | "commit and-quit" | "exit configuration-mode" => {
                self.leave_config();
                return String::new();
            }
            "commit" => {
                self.committed = self.root.clone();
                return String::new();
            }
            "abort" | "rollback 0" => {
                if self.candidate() {
                    self.root = self.committed.clone();
                }
                if line == "abort" {
                    self.leave_config();
                }
                return String::new();
            }
            "exit" | "up" => {
                if self.path.pop().is_none() && line == "exit" {
                    self.leave_config();
                }
                return String::new();
            }
            _ => {}
        }
        if is_control(line) {
            return String::new();
        }

        if let Some(target) = line.strip_prefix("no ") {
            self.negate(target.trim());
        } else if self.is_context(line) {
            let negated = format!("no {}", line);
            let level = self.level();
            level.retain(|l| l.text != negated);
            let index = match level.iter().position(|l| l.text == line) {
                Some(i) => i,
                None => {
                    level.push(Line::leaf(line));
                    level.len() - 1
                }
            };
            self.path.push(index);
        } else {
            self.set(line);
        }
        String::new()
    }

    fn negate(&mut self, target: &str) {
        let prefix = format!("{} ", target);
        let block = self.is_context(target);
        let level = self.level();
        let before = level.len();
        let mut exact = false;
        level.retain(|l| {
            let hit = l.text == target || l.text.starts_with(&prefix);
            exact |= l.text == target && l.children.is_empty();
            !hit
        });
        let removed = before - level.len();
        let negated = format!("no {}", target);
        if !block && (removed == 0 || exact) && !level.iter().any(|l| l.text == negated) {
            level.push(Line::leaf(&negated));
        }
    }

    fn set(&mut self, line: &str) {
        let level = self.level();
        if level.iter().any(|l| l.text == line) {
            return;
        }
        level.retain(|l| match l.text.strip_prefix("no ") {
            Some(k) => !(line == k || line.starts_with(&format!("{} ", k))),
            None => true,
        });
        let shape = skeleton(line);
        match level
            .iter()
            .position(|l| l.children.is_empty() && skeleton(&l.text) == shape)
        {
            Some(i) => level[i].text = line.to_string(),
            None => level.push(Line::leaf(line)),
        }
    }
}

fn is_control(line: &str) -> bool {
    line.starts_with("terminal ")
        || line.starts_with("set cli ")
        || line == "page-off"
        || line.starts_with("system shell ")
}

fn show_filter(line: &str) -> Option<&str> {
    let line = line.strip_prefix("do ").unwrap_or(line);
    ["show running-config", "show configuration", "configuration show"]
        .iter()
        .find_map(|cmd| {
            let rest = line.strip_prefix(cmd)?;
            if rest.is_empty() || rest.starts_with(' ') {
                Some(rest.trim())
            } else {
                None
            }
        })
}

fn is_value(token: &str) -> bool {
    token
        .chars()
        .any(|c| c.is_ascii_digit() || matches!(c, '.' | ':' | '/'))
}

/// Keyword shape of a leaf line: value tokens after the first become
/// placeholders.
fn skeleton(line: &str) -> Vec<Option<&str>> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next();
    if first.is_some_and(|f| FREE_TEXT.contains(&f)) {
        return vec![first];
    }
    first
        .into_iter()
        .map(Some)
        .chain(tokens.map(|t| if is_value(t) { None } else { Some(t) }))
        .collect()
}

fn render(lines: &[Line], filter: &str) -> String {
    let mut out = String::new();
    for line in lines {
        let selected = filter.is_empty()
            || line.text == filter
            || line.text.starts_with(&format!("{} ", filter));
        if selected {
            render_line(line, 0, &mut out);
        }
    }
    out
}

fn render_line(line: &Line, depth: usize, out: &mut String) {
    out.push_str(&" ".repeat(depth));
    out.push_str(&line.text);
    out.push('\n');
    for child in &line.children {
        render_line(child, depth + 1, out);
    }
}

fn parse_tree(text: &str) -> Vec<Line> {
    let mut root: Vec<Line> = Vec::new();
    // (indent, path) of the currently open blocks
    let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();
    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "!" {
            continue;
        }
        let indent = raw.len() - raw.trim_start().len();
        while stack.last().is_some_and(|(i, _)| *i >= indent) {
            stack.pop();
        }
        let path = stack.last().map(|(_, p)| p.clone()).unwrap_or_default();
        let mut level = &mut root;
        for &i in &path {
            level = &mut level[i].children;
        }
        level.push(Line::leaf(trimmed));
        let mut child = path;
        child.push(level.len() - 1);
        stack.push((indent, child));
    }
    root
}

/// Simulated device. Use [`SimulatedDevice::handle`] to inspect and script it
/// after handing it to a session.
#[derive(Debug)]
pub struct SimulatedDevice {
    name: String,
    state: Arc<Mutex<State>>,
}

/// Shared view of a [`SimulatedDevice`].
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    state: Arc<Mutex<State>>,
}

impl SimulatedDevice {
    /// Empty device speaking `platform`.
    pub fn new(name: impl Into<String>, platform: Platform) -> Self {
        let contexts = DEFAULT_CONTEXTS
            .iter()
            .map(|p| Regex::new(p).expect("Invalid context regex"))
            .collect();
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(State {
                platform,
                contexts,
                root: Vec::new(),
                committed: Vec::new(),
                config_mode: false,
                path: Vec::new(),
                history: Vec::new(),
                rejects: Vec::new(),
                delay: None,
                remaining: None,
                closed: false,
            })),
        }
    }

    /// Seed the running configuration from indented text.
    pub fn with_config(self, text: &str) -> Self {
        self.handle().load_config(text);
        self
    }

    /// Treat lines matching `pattern` as context headers.
    pub fn with_context(self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|e| Error::pattern(pattern, e.to_string()))?;
        self.state.lock().contexts.push(re);
        Ok(self)
    }

    /// Shared handle for inspection and scripting.
    pub fn handle(&self) -> SimulatedHandle {
        SimulatedHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl SimulatedHandle {
    /// Replace the running configuration with indented text.
    pub fn load_config(&self, text: &str) {
        let tree = parse_tree(text);
        let mut state = self.state.lock();
        state.committed = tree.clone();
        state.root = tree;
    }

    /// Current running configuration.
    pub fn running_config(&self) -> String {
        render(&self.state.lock().root, "")
    }

    /// Every line received so far.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    /// Answer commands matching `pattern` with the platform's invalid-input
    /// message.
    pub fn reject_matching(&self, pattern: &str) -> Result<()> {
        let re = Regex::new(pattern).map_err(|e| Error::pattern(pattern, e.to_string()))?;
        self.state.lock().rejects.push(re);
        Ok(())
    }

    /// Delay every response.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// Drop the connection after `n` more commands.
    pub fn disconnect_after(&self, n: usize) {
        self.state.lock().remaining = Some(n);
    }

    /// True while the device is in configuration mode.
    pub fn in_config_mode(&self) -> bool {
        self.state.lock().config_mode
    }
}

#[async_trait]
impl Transport for SimulatedDevice {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, command: &str) -> TransportResult<String> {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let response = self.state.lock().handle(command);
        trace!(device = %self.name, command = %command, ok = response.is_ok(), "simulated exchange");
        response
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}
