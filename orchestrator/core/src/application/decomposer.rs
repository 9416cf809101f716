// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Decomposer
//!
//! Turns a natural-language task into an ordered list of subtasks with
//! declared dependencies. The first rule whose keyword occurs in the
//! (lowercased) description expands into a fixed template; anything else
//! becomes a single subtask whose type is inferred from its verbs and whose
//! data is the raw context.
//!
//! | Rule | Keywords | Shape |
//! |------|----------|-------|
//! | login | 登录, login, sign in | 5 steps, strict chain |
//! | search | 搜索, search, 查找 | 6 steps, results verified and analyzed in parallel |
//! | send message | 发送, 发消息, send, message | 5 steps, strict chain |
//! | open app | 打开, 启动, open, launch | 3 steps, strict chain |
//! | browse | 浏览, 滑动, browse, scroll | 3 steps, strict chain |
//!
//! Output depends only on the description and context.

use tracing::debug;

use crate::domain::context::{ContextMap, ContextValue};
use crate::domain::subtask::{SubTask, TaskType};

type TemplateFn = fn(&str, &ContextMap) -> Vec<SubTask>;

struct DecompositionRule {
    name: &'static str,
    keywords: &'static [&'static str],
    build: TemplateFn,
}

const RULES: &[DecompositionRule] = &[
    DecompositionRule {
        name: "login",
        keywords: &["登录", "login", "log in", "sign in"],
        build: login_steps,
    },
    DecompositionRule {
        name: "search",
        keywords: &["搜索", "查找", "search"],
        build: search_steps,
    },
    DecompositionRule {
        name: "send_message",
        keywords: &["发消息", "发送", "send", "message"],
        build: send_message_steps,
    },
    DecompositionRule {
        name: "open_app",
        keywords: &["打开", "启动", "open", "launch"],
        build: open_app_steps,
    },
    DecompositionRule {
        name: "browse",
        keywords: &["浏览", "滑动", "browse", "scroll"],
        build: browse_steps,
    },
];

/// Verb table for the fallback path, checked in order. ASCII verbs match
/// whole words, others match anywhere in the description.
const VERBS: &[(TaskType, &[&str])] = &[
    (TaskType::Click, &["点击", "按", "click", "tap", "press"]),
    (TaskType::Input, &["输入", "填写", "input", "type", "enter"]),
    (TaskType::Scroll, &["滚动", "swipe"]),
    (TaskType::Wait, &["等待", "wait"]),
    (TaskType::Verify, &["确认", "验证", "检查", "verify", "check"]),
    (TaskType::Analyze, &["分析", "识别", "analyze", "analyse", "read"]),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskDecomposer;

impl TaskDecomposer {
    pub fn new() -> Self {
        Self
    }

    /// Empty for a blank description, at least one subtask otherwise.
    pub fn decompose(&self, description: &str, context: &ContextMap) -> Vec<SubTask> {
        let description = description.trim();
        if description.is_empty() {
            return Vec::new();
        }

        let lowered = description.to_lowercase();
        match self.matching_rule(&lowered) {
            Some(rule) => {
                debug!(rule = rule.name, "Decomposing with template");
                (rule.build)(description, context)
            }
            None => vec![fallback_step(description, &lowered, context)],
        }
    }

    /// Name of the template that would handle `description`, if any.
    pub fn rule_for(&self, description: &str) -> Option<&'static str> {
        self.matching_rule(&description.trim().to_lowercase())
            .map(|rule| rule.name)
    }

    fn matching_rule(&self, lowered: &str) -> Option<&'static DecompositionRule> {
        RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
    }
}

pub fn infer_task_type(lowered: &str) -> TaskType {
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mentions = |verb: &str| {
        if verb.is_ascii() {
            words.contains(&verb)
        } else {
            lowered.contains(verb)
        }
    };

    VERBS
        .iter()
        .find(|(_, verbs)| verbs.iter().any(|v| mentions(v)))
        .map(|(ty, _)| *ty)
        .unwrap_or(TaskType::Composite)
}

fn ctx_str(context: &ContextMap, key: &str, default: &str) -> String {
    match context.get(key) {
        Some(ContextValue::String(s)) => s.clone(),
        Some(other) if !matches!(other, ContextValue::List(_) | ContextValue::Map(_)) => other.to_string(),
        _ => default.to_string(),
    }
}

fn ctx_int(context: &ContextMap, key: &str, default: i64) -> i64 {
    context.get(key).and_then(ContextValue::as_int).unwrap_or(default)
}

fn click(id: &str, description: &str, target: impl Into<ContextValue>) -> SubTask {
    SubTask::new(id, TaskType::Click, description)
        .with_complexity(2)
        .with_data("target", target)
}

fn input(id: &str, description: &str, target: &str, text: String) -> SubTask {
    SubTask::new(id, TaskType::Input, description)
        .with_complexity(3)
        .with_data("target", target)
        .with_data("text", text)
}

fn login_steps(_description: &str, context: &ContextMap) -> Vec<SubTask> {
    vec![
        click("click_username", "Tap the username field", "username_field").with_priority(8),
        input("input_username", "Enter the username", "username_field", ctx_str(context, "username", ""))
            .with_priority(8)
            .with_dependency("click_username"),
        click("click_password", "Tap the password field", "password_field")
            .with_priority(8)
            .with_dependency("input_username"),
        input("input_password", "Enter the password", "password_field", ctx_str(context, "password", ""))
            .with_priority(8)
            .with_dependency("click_password"),
        click("click_login", "Tap the login button", "login_button")
            .with_priority(10)
            .with_dependency("input_password"),
    ]
}

fn search_steps(description: &str, context: &ContextMap) -> Vec<SubTask> {
    let query = ctx_str(context, "query", &ctx_str(context, "keyword", description));
    vec![
        click("click_search_box", "Tap the search box", "search_box").with_priority(7),
        input("input_query", "Enter the search query", "search_box", query)
            .with_priority(7)
            .with_dependency("click_search_box"),
        click("submit_search", "Submit the search", "search_button")
            .with_priority(8)
            .with_dependency("input_query"),
        SubTask::new("wait_results", TaskType::Wait, "Wait for results to load")
            .with_priority(5)
            .with_data("duration", ctx_int(context, "wait_ms", 1_500))
            .with_dependency("submit_search"),
        SubTask::new("verify_results", TaskType::Verify, "Check that results are shown")
            .with_complexity(4)
            .with_priority(6)
            .with_data("condition", "search results visible")
            .with_dependency("wait_results"),
        SubTask::new("analyze_results", TaskType::Analyze, "Read the result list")
            .with_complexity(5)
            .with_priority(4)
            .with_dependency("wait_results"),
    ]
}

fn send_message_steps(_description: &str, context: &ContextMap) -> Vec<SubTask> {
    vec![
        click("open_chat", "Open the conversation", ctx_str(context, "contact", "chat_list"))
            .with_complexity(3)
            .with_priority(7),
        click("click_message_input", "Tap the message box", "message_input")
            .with_priority(7)
            .with_dependency("open_chat"),
        input("input_message", "Type the message", "message_input", ctx_str(context, "message", ""))
            .with_priority(8)
            .with_dependency("click_message_input"),
        click("click_send", "Tap send", "send_button")
            .with_priority(9)
            .with_dependency("input_message"),
        SubTask::new("verify_sent", TaskType::Verify, "Check that the message was sent")
            .with_complexity(4)
            .with_priority(6)
            .with_data("condition", "message sent")
            .with_dependency("click_send"),
    ]
}

fn open_app_steps(description: &str, context: &ContextMap) -> Vec<SubTask> {
    let app = ctx_str(context, "app", description);
    vec![
        click("click_app_icon", "Tap the app icon", app).with_priority(8),
        SubTask::new("wait_launch", TaskType::Wait, "Wait for the app to start")
            .with_priority(5)
            .with_data("duration", ctx_int(context, "wait_ms", 2_000))
            .with_dependency("click_app_icon"),
        SubTask::new("verify_launched", TaskType::Verify, "Check that the app is in front")
            .with_complexity(3)
            .with_priority(7)
            .with_data("condition", "app launched")
            .with_dependency("wait_launch"),
    ]
}

fn browse_steps(_description: &str, context: &ContextMap) -> Vec<SubTask> {
    vec![
        SubTask::new("scroll_page", TaskType::Scroll, "Scroll the page")
            .with_complexity(2)
            .with_priority(4)
            .with_data("direction", ctx_str(context, "direction", "down"))
            .with_data("distance", ctx_int(context, "distance", 800)),
        SubTask::new("wait_render", TaskType::Wait, "Let the content settle")
            .with_priority(3)
            .with_data("duration", 500i64)
            .with_dependency("scroll_page"),
        SubTask::new("analyze_content", TaskType::Analyze, "Read the visible content")
            .with_complexity(5)
            .with_priority(5)
            .with_dependency("wait_render"),
    ]
}

fn fallback_step(description: &str, lowered: &str, context: &ContextMap) -> SubTask {
    let task_type = infer_task_type(lowered);
    let complexity = if task_type == TaskType::Composite { 5 } else { 3 };
    SubTask::new("task_1", task_type, description)
        .with_complexity(complexity)
        .with_data_map(context.clone())
}
