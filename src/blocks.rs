//! Markdown to Notion block translation.
//!
//! A pure function from a note's Markdown content to the JSON block objects
//! the Notion append-children endpoint accepts. Inline formatting is
//! flattened to plain rich text; unsupported constructs degrade to
//! paragraphs rather than failing the push.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};
use serde_json::{json, Value};

/// Notion rejects append requests with more than 100 children.
pub const MAX_BLOCKS_PER_APPEND: usize = 100;

/// Converts Markdown content into a flat sequence of Notion block objects.
pub fn markdown_to_blocks(markdown: &str) -> Vec<Value> {
    let parser = Parser::new(markdown);
    let mut blocks: Vec<Value> = Vec::new();

    let mut text = String::new();
    let mut heading_level = 1u8;
    let mut in_quote = false;
    let mut in_code_block = false;
    let mut code_language = String::new();
    // true per level means ordered
    let mut list_stack: Vec<bool> = Vec::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                text.clear();
                heading_level = heading_level_to_int(level).min(3);
            }
            Event::End(TagEnd::Heading(_)) => {
                let block_type = format!("heading_{}", heading_level);
                push_text_block(&mut blocks, &block_type, &mut text);
            }
            Event::Start(Tag::Paragraph) => {
                // Inside a list item or quote the enclosing End event emits
                // the block, so the paragraph boundary is ignored there.
                if list_stack.is_empty() && !in_quote {
                    text.clear();
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if list_stack.is_empty() && !in_quote {
                    push_text_block(&mut blocks, "paragraph", &mut text);
                }
            }
            Event::Start(Tag::List(first_index)) => {
                list_stack.push(first_index.is_some());
            }
            Event::End(TagEnd::List(_)) => {
                list_stack.pop();
            }
            Event::Start(Tag::Item) => {
                text.clear();
            }
            Event::End(TagEnd::Item) => {
                let ordered = list_stack.last().copied().unwrap_or(false);
                let block_type = if ordered {
                    "numbered_list_item"
                } else {
                    "bulleted_list_item"
                };
                push_text_block(&mut blocks, block_type, &mut text);
            }
            Event::Start(Tag::BlockQuote(_)) => {
                in_quote = true;
                text.clear();
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                in_quote = false;
                push_text_block(&mut blocks, "quote", &mut text);
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                text.clear();
                code_language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .unwrap_or("plain text")
                        .to_string(),
                    CodeBlockKind::Indented => "plain text".to_string(),
                };
                if code_language.is_empty() {
                    code_language = "plain text".to_string();
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let content = text.trim_end().to_string();
                text.clear();
                blocks.push(json!({
                    "object": "block",
                    "type": "code",
                    "code": {
                        "rich_text": rich_text(&content),
                        "language": code_language,
                    }
                }));
            }
            Event::Rule => {
                blocks.push(json!({
                    "object": "block",
                    "type": "divider",
                    "divider": {}
                }));
            }
            Event::Text(t) | Event::Code(t) => {
                text.push_str(&t);
            }
            Event::SoftBreak | Event::HardBreak => {
                if in_code_block {
                    text.push('\n');
                } else {
                    text.push(' ');
                }
            }
            _ => {}
        }
    }

    blocks
}

fn heading_level_to_int(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

fn push_text_block(blocks: &mut Vec<Value>, block_type: &str, text: &mut String) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        blocks.push(json!({
            "object": "block",
            "type": block_type,
            block_type: { "rich_text": rich_text(trimmed) }
        }));
    }
    text.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_types(blocks: &[Value]) -> Vec<String> {
        blocks
            .iter()
            .map(|b| b["type"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn empty_content_yields_no_blocks() {
        assert!(markdown_to_blocks("").is_empty());
    }

    #[test]
    fn translates_common_block_shapes() {
        let markdown = "# Plan\n\nA paragraph.\n\n- first\n- second\n\n> quoted\n\n---\n";
        let blocks = markdown_to_blocks(markdown);

        assert_eq!(
            block_types(&blocks),
            vec![
                "heading_1",
                "paragraph",
                "bulleted_list_item",
                "bulleted_list_item",
                "quote",
                "divider",
            ]
        );
        assert_eq!(
            blocks[0]["heading_1"]["rich_text"][0]["text"]["content"],
            "Plan"
        );
    }

    #[test]
    fn deep_headings_clamp_to_level_three() {
        let blocks = markdown_to_blocks("##### Deep\n");
        assert_eq!(block_types(&blocks), vec!["heading_3"]);
    }

    #[test]
    fn ordered_list_items_are_numbered() {
        let blocks = markdown_to_blocks("1. one\n2. two\n");
        assert_eq!(
            block_types(&blocks),
            vec!["numbered_list_item", "numbered_list_item"]
        );
        assert_eq!(
            blocks[1]["numbered_list_item"]["rich_text"][0]["text"]["content"],
            "two"
        );
    }

    #[test]
    fn fenced_code_keeps_its_language() {
        let blocks = markdown_to_blocks("```rust\nfn main() {}\n```\n");
        assert_eq!(block_types(&blocks), vec!["code"]);
        assert_eq!(blocks[0]["code"]["language"], "rust");
        assert_eq!(
            blocks[0]["code"]["rich_text"][0]["text"]["content"],
            "fn main() {}"
        );
    }

    #[test]
    fn bare_fence_defaults_to_plain_text() {
        let blocks = markdown_to_blocks("```\nraw\n```\n");
        assert_eq!(blocks[0]["code"]["language"], "plain text");
    }

    #[test]
    fn many_paragraphs_exceed_one_append_chunk() {
        let markdown = (0..120)
            .map(|i| format!("paragraph {}", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let blocks = markdown_to_blocks(&markdown);
        assert_eq!(blocks.len(), 120);
        assert!(blocks.len() > MAX_BLOCKS_PER_APPEND);
    }
}
