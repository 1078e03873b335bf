//! Flex bubble renderers for the problem and editorial cards.

use quizcast_core::error::{QuizError, Result};
use quizcast_core::traits::Template;
use quizcast_core::types::{EditorialCard, OptionResult, ProblemCard};
use serde_json::{Value, json};

const ACCENT: &str = "#1DB446";
const MUTED: &str = "#888888";

/// Render `template` with its JSON args into a flex bubble.
pub fn render(template: Template, args: &Value) -> Result<Value> {
    match template {
        Template::Problem => {
            let card: ProblemCard = serde_json::from_value(args.clone())
                .map_err(|e| QuizError::Channel(format!("bad problem card args: {e}")))?;
            Ok(problem_bubble(&card))
        }
        Template::Editorial => {
            let card: EditorialCard = serde_json::from_value(args.clone())
                .map_err(|e| QuizError::Channel(format!("bad editorial card args: {e}")))?;
            Ok(editorial_bubble(&card))
        }
    }
}

fn hero(url: &str, aspect_ratio: &str) -> Value {
    json!({
        "type": "image",
        "url": url,
        "size": "full",
        "aspectMode": "fit",
        "aspectRatio": if aspect_ratio.is_empty() { "1:1" } else { aspect_ratio },
    })
}

/// Wrapped body text. LINE rejects empty text components, so blanks are dropped.
fn text(content: &str) -> Option<Value> {
    (!content.trim().is_empty()).then(|| json!({"type": "text", "text": content, "wrap": true, "size": "sm"}))
}

fn stars(difficulty: i64) -> String {
    let filled = difficulty.clamp(0, 5) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub fn problem_bubble(card: &ProblemCard) -> Value {
    let mut body = vec![
        json!({"type": "text", "text": "今日の1レッグ", "weight": "bold", "color": ACCENT, "size": "sm"}),
    ];
    body.extend(text(&card.text));
    body.push(json!({
            "type": "box",
            "layout": "horizontal",
            "margin": "md",
            "contents": [
                {"type": "text", "text": format!("難易度 {}", stars(card.difficulty)), "size": "xs", "color": MUTED},
                {"type": "text", "text": format!("出題: {}", card.setter), "size": "xs", "color": MUTED, "align": "end"},
            ],
        }));
    for (i, option) in card.options.iter().enumerate() {
        body.push(json!({
            "type": "text",
            "text": format!("{}. {option}", i + 1),
            "size": "sm",
            "wrap": true,
        }));
    }

    let mut bubble = json!({
        "type": "bubble",
        "hero": hero(&card.image_url, &card.image_aspect_ratio),
        "body": {"type": "box", "layout": "vertical", "spacing": "sm", "contents": body},
    });

    if !card.liff_url.is_empty() {
        bubble["footer"] = json!({
            "type": "box",
            "layout": "vertical",
            "contents": [{
                "type": "button",
                "style": "primary",
                "color": ACCENT,
                "action": {"type": "uri", "label": "回答する", "uri": card.liff_url},
            }],
        });
    }
    bubble
}

fn result_row(result: &OptionResult) -> Value {
    let weight = if result.is_majority { "bold" } else { "regular" };
    let mut contents = vec![json!({
        "type": "box",
        "layout": "horizontal",
        "contents": [
            {"type": "text", "text": result.option, "size": "sm", "weight": weight, "flex": 4, "wrap": true},
            {"type": "text", "text": format!("{}% ({})", result.rate, result.count), "size": "sm", "weight": weight, "align": "end", "flex": 2},
        ],
    })];
    if !result.respondents.is_empty() {
        contents.push(json!({"type": "text", "text": result.respondents, "size": "xxs", "color": MUTED, "wrap": true}));
    }
    json!({"type": "box", "layout": "vertical", "margin": "md", "contents": contents})
}

pub fn editorial_bubble(card: &EditorialCard) -> Value {
    let mut body = vec![
        json!({"type": "text", "text": "今日の1レッグ（解説）", "weight": "bold", "color": ACCENT, "size": "sm"}),
        json!({"type": "text", "text": format!("回答数 {}", card.total), "size": "xs", "color": MUTED}),
    ];
    body.extend(card.results.iter().map(result_row));
    body.push(json!({"type": "separator", "margin": "lg"}));
    body.extend(text(&card.editorial));

    if !card.comments.is_empty() {
        body.push(json!({"type": "separator", "margin": "lg"}));
        for comment in &card.comments {
            body.push(json!({
                "type": "text",
                "text": format!("{}: {}", comment.user_name, comment.text),
                "size": "xs",
                "wrap": true,
            }));
        }
    }

    let mut bubble = json!({
        "type": "bubble",
        "body": {"type": "box", "layout": "vertical", "spacing": "sm", "contents": body},
    });
    if !card.image_url.is_empty() {
        bubble["hero"] = hero(&card.image_url, &card.image_aspect_ratio);
    }
    bubble
}
