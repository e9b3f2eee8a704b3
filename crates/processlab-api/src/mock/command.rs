//! Small command vocabulary understood by the in-memory edit service.

use std::sync::LazyLock;

use processlab_core::bpmn::{ElementType, PatchOp};
use regex::Regex;

static ADD_TASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^add (?:an? )?(user |service )?task (?:called|named) (.+)$")
        .expect("valid add-task pattern")
});

static ADD_EVENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^add (?:an? )?(start|end) event(?: (?:called|named) (.+))?$")
        .expect("valid add-event pattern")
});

static ADD_GATEWAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^add (?:an? )?(exclusive|parallel) gateway(?: (?:called|named) (.+))?$")
        .expect("valid add-gateway pattern")
});

static CONNECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^connect (.+?) to (.+)$").expect("valid connect pattern")
});

static RENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^rename (.+?) to (.+)$").expect("valid rename pattern")
});

static CONVERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^convert (.+?) to (?:an? )?(user task|service task|task|exclusive gateway|parallel gateway|gateway)$")
        .expect("valid convert pattern")
});

static REMOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:remove|delete) (.+)$").expect("valid remove pattern")
});

/// Translates a command into a patch operation, or `None` if it is not understood.
pub fn interpret(command: &str) -> Option<PatchOp> {
    let command = command.trim().trim_end_matches('.');

    if let Some(caps) = ADD_TASK.captures(command) {
        let kind = match caps.get(1).map(|m| m.as_str().trim().to_lowercase()).as_deref() {
            Some("user") => ElementType::UserTask,
            Some("service") => ElementType::ServiceTask,
            _ => ElementType::Task,
        };
        return Some(PatchOp::AddNode {
            id: None,
            kind,
            name: Some(unquote(&caps[2])),
            lane_id: None,
        });
    }

    if let Some(caps) = ADD_EVENT.captures(command) {
        let start = caps[1].eq_ignore_ascii_case("start");
        let (kind, default_name) = if start {
            (ElementType::StartEvent, "Start")
        } else {
            (ElementType::EndEvent, "End")
        };
        let name = caps
            .get(2)
            .map(|m| unquote(m.as_str()))
            .unwrap_or_else(|| default_name.to_owned());
        return Some(PatchOp::AddNode {
            id: None,
            kind,
            name: Some(name),
            lane_id: None,
        });
    }

    if let Some(caps) = ADD_GATEWAY.captures(command) {
        let kind = if caps[1].eq_ignore_ascii_case("parallel") {
            ElementType::ParallelGateway
        } else {
            ElementType::ExclusiveGateway
        };
        return Some(PatchOp::AddNode {
            id: None,
            kind,
            name: caps.get(2).map(|m| unquote(m.as_str())),
            lane_id: None,
        });
    }

    if let Some(caps) = CONNECT.captures(command) {
        return Some(PatchOp::Connect {
            source: unquote(&caps[1]),
            target: unquote(&caps[2]),
            name: None,
        });
    }

    if let Some(caps) = CONVERT.captures(command) {
        let kind = match caps[2].to_lowercase().as_str() {
            "user task" => ElementType::UserTask,
            "service task" => ElementType::ServiceTask,
            "task" => ElementType::Task,
            "parallel gateway" => ElementType::ParallelGateway,
            _ => ElementType::ExclusiveGateway,
        };
        return Some(PatchOp::Convert {
            target: unquote(&caps[1]),
            kind,
        });
    }

    if let Some(caps) = RENAME.captures(command) {
        return Some(PatchOp::Rename {
            target: unquote(&caps[1]),
            name: unquote(&caps[2]),
        });
    }

    REMOVE.captures(command).map(|caps| PatchOp::Remove {
        target: unquote(&caps[1]),
    })
}

fn unquote(text: &str) -> String {
    text.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
        .trim()
        .to_owned()
}
